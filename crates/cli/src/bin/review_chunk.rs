use anyhow::Result;

#[tokio::main]
async fn main() -> Result<()> {
    review_cli::main_entry().await
}
