use assert_cmd::Command;
use predicates::prelude::*;
use serde_json::Value;
use std::fs;
use tempfile::tempdir;

#[allow(deprecated)]
fn cli() -> Command {
    let mut cmd = Command::cargo_bin("review-chunk").expect("binary");
    cmd.env("RUST_LOG", "warn");
    cmd
}

fn setup_project() -> tempfile::TempDir {
    let temp = tempdir().unwrap();
    let root = temp.path();
    fs::create_dir_all(root.join("src/routes/blog")).unwrap();
    fs::create_dir_all(root.join("src/lib")).unwrap();
    fs::write(
        root.join("src/routes/+page.svelte"),
        "<script>\n  export let data;\n</script>\n\n<h1>{data.title}</h1>\n",
    )
    .unwrap();
    fs::write(
        root.join("src/routes/blog/+page.server.ts"),
        "export const load = async () => {\n  return { posts: [] };\n};\n",
    )
    .unwrap();
    fs::write(
        root.join("src/lib/math.ts"),
        "export function add(a: number, b: number) {\n  return a + b;\n}\n",
    )
    .unwrap();
    fs::write(
        root.join("README.md"),
        "## Setup\n\nInstall.\n\n## Usage\n\nRun it.\n",
    )
    .unwrap();
    temp
}

fn parse_lines(stdout: &[u8]) -> Vec<Value> {
    String::from_utf8_lossy(stdout)
        .lines()
        .map(|line| serde_json::from_str(line).expect("json line"))
        .collect()
}

#[test]
fn chunk_writes_json_lines_to_stdout() {
    let temp = setup_project();
    let output = cli()
        .arg("chunk")
        .arg(temp.path())
        .arg("--batch-size")
        .arg("2")
        .output()
        .expect("command run");

    assert!(output.status.success());
    let records = parse_lines(&output.stdout);
    assert_eq!(records.len(), 5);
    assert!(records.iter().all(|r| r["id"].as_str().is_some_and(|id| id.len() == 32)));

    let page = records
        .iter()
        .find(|r| r["metadata"]["filePath"] == "src/routes/+page.svelte")
        .expect("page record");
    assert_eq!(page["metadata"]["type"], "sveltekit-page");
    assert_eq!(page["metadata"]["route"], "/");

    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("Chunks: 5"), "stderr: {stderr}");
    assert!(stderr.contains("in 3 batches"), "stderr: {stderr}");
}

#[test]
fn chunk_writes_to_output_file() {
    let temp = setup_project();
    let out_dir = tempdir().unwrap();
    let out_file = out_dir.path().join("chunks.jsonl");

    cli()
        .arg("chunk")
        .arg(temp.path())
        .arg("--output")
        .arg(&out_file)
        .assert()
        .success()
        .stdout(predicate::str::is_empty())
        .stderr(predicate::str::contains("Chunks: 5"));

    let written = fs::read(&out_file).unwrap();
    assert_eq!(parse_lines(&written).len(), 5);
}

#[test]
fn chunk_rejects_missing_root() {
    let temp = tempdir().unwrap();
    cli()
        .arg("chunk")
        .arg(temp.path().join("missing"))
        .assert()
        .failure()
        .stderr(predicate::str::contains("not a directory"));
}

#[test]
fn custom_config_with_bad_glob_fails_before_scanning() {
    let temp = setup_project();
    let config = temp.path().join("chunker.toml");
    fs::write(
        &config,
        r#"
[[pattern_sets]]
name = "broken"
framework = "custom"
parser = "module"

[[pattern_sets.patterns]]
glob = "src/[oops"
label = "broken"
type = "broken"
"#,
    )
    .unwrap();

    cli()
        .arg("chunk")
        .arg(temp.path())
        .arg("--config")
        .arg(&config)
        .assert()
        .failure()
        .stdout(predicate::str::is_empty())
        .stderr(predicate::str::contains("Invalid glob"));
}

#[test]
fn patterns_lists_builtin_sets_in_order() {
    let output = cli().arg("patterns").output().expect("command run");
    assert!(output.status.success());

    let stdout = String::from_utf8_lossy(&output.stdout);
    let components = stdout.find("sveltekit-components").expect("components set");
    let knowledge = stdout.find("knowledge\tmarkdown").expect("knowledge set");
    assert!(components < knowledge);
    assert!(stdout.contains("src/routes/**/+page.svelte"));
}

#[test]
fn route_reports_the_claiming_pattern() {
    let output = cli()
        .args(["route", "src/routes/(app)/settings/+page.server.ts"])
        .output()
        .expect("command run");
    assert!(output.status.success());

    let body: Value = serde_json::from_slice(&output.stdout).expect("json");
    assert_eq!(body["claimed"], true);
    assert_eq!(body["set"], "sveltekit-modules");
    assert_eq!(body["type"], "sveltekit-server-load");
    assert_eq!(body["metadata"]["route"], "/settings");
}

#[test]
fn route_reports_unclaimed_paths() {
    cli()
        .args(["route", "Cargo.toml"])
        .assert()
        .success()
        .stdout(predicate::str::contains("\"claimed\": false"));
}

#[test]
fn review_preset_is_accepted() {
    let temp = setup_project();
    cli()
        .arg("chunk")
        .arg(temp.path())
        .args(["--preset", "review", "--output"])
        .arg(temp.path().join("out.jsonl"))
        .assert()
        .success();
}
