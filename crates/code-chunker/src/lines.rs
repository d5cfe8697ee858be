use std::ops::Range;

/// Byte offsets of line starts, for mapping spans and rows back to source text
#[derive(Debug, Clone)]
pub struct LineIndex {
    starts: Vec<usize>,
    len: usize,
}

impl LineIndex {
    pub fn new(content: &str) -> Self {
        let mut starts = vec![0];
        starts.extend(
            content
                .bytes()
                .enumerate()
                .filter(|&(_, b)| b == b'\n')
                .map(|(idx, _)| idx + 1),
        );
        Self {
            starts,
            len: content.len(),
        }
    }

    /// 1-based line containing `offset`
    pub fn line_of(&self, offset: usize) -> usize {
        let offset = offset.min(self.len);
        match self.starts.binary_search(&offset) {
            Ok(idx) => idx + 1,
            Err(idx) => idx,
        }
    }

    /// 1-based line of the last byte of a non-empty `start..end` span
    pub fn last_line_of(&self, start: usize, end: usize) -> usize {
        if end > start {
            self.line_of(end - 1)
        } else {
            self.line_of(start)
        }
    }

    /// Number of lines, counting a trailing partial line
    pub fn line_count(&self) -> usize {
        if self.len > 0 && self.starts.last() == Some(&self.len) {
            self.starts.len() - 1
        } else {
            self.starts.len()
        }
    }

    /// Exact text of 0-based rows `start_row..=end_row`, without the final line break
    pub fn slice_rows<'a>(&self, content: &'a str, start_row: usize, end_row: usize) -> &'a str {
        &content[self.row_span(content, start_row, end_row)]
    }

    /// Byte range of [`Self::slice_rows`]
    pub fn row_span(&self, content: &str, start_row: usize, end_row: usize) -> Range<usize> {
        let last = self.starts.len() - 1;
        let start_row = start_row.min(last);
        let end_row = end_row.clamp(start_row, last);

        let start = self.starts[start_row];
        let mut end = self
            .starts
            .get(end_row + 1)
            .copied()
            .unwrap_or(content.len());
        let bytes = content.as_bytes();
        if end > start && bytes[end - 1] == b'\n' {
            end -= 1;
            if end > start && bytes[end - 1] == b'\r' {
                end -= 1;
            }
        }
        start..end
    }
}
