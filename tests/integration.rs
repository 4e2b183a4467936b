use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;
use tempfile::TempDir;

const HEADER: &str =
    "date,shift,factory,machine,issue,root_cause,correction,corrective_action,reported_by\n";

fn ncx_binary() -> PathBuf {
    let mut path = std::env::current_exe().unwrap();
    path.pop(); // remove test binary name
    path.pop(); // remove deps/
    path.push("ncx");
    path
}

fn setup_test_env(csv_body: &str) -> (TempDir, PathBuf) {
    let tmp = TempDir::new().unwrap();
    let root = tmp.path().to_path_buf();

    let config_dir = root.join("config");
    fs::create_dir_all(&config_dir).unwrap();
    let data_dir = root.join("data");
    fs::create_dir_all(&data_dir).unwrap();

    fs::write(data_dir.join("nc_log.csv"), format!("{}{}", HEADER, csv_body)).unwrap();

    // The key variable is never set, so every run is credential-free unless
    // --api-key is passed.
    let config_content = format!(
        r#"[data]
csv_path = "{}/data/nc_log.csv"

[retrieval]
top_k = 3
mode = "lexical"

[credentials]
api_key_env = "NCX_INTEGRATION_TEST_KEY_UNSET"

[embedding]
base_url = "http://127.0.0.1:9/v1"
timeout_secs = 5

[generation]
base_url = "http://127.0.0.1:9/v1"
timeout_secs = 5
"#,
        root.display()
    );

    let config_path = config_dir.join("ncx.toml");
    fs::write(&config_path, config_content).unwrap();

    (tmp, config_path)
}

fn sample_rows() -> &'static str {
    "2024-01-02,Day,Line1,PressA,burr on edge,dull die,deburr parts,replace die,ann\n\
     2024-01-05,Night,Line2,Welder3,porosity in weld seam,contaminated shielding gas,regrind seam,replace gas bottle,bo\n\
     2024-02-11,Swing,Line1,Lathe,surface chatter marks,loose tool holder,re-machine,torque check at setup,cy\n"
}

fn run_ncx(config_path: &Path, args: &[&str]) -> (String, String, bool) {
    let binary = ncx_binary();
    let output = Command::new(&binary)
        .arg("--config")
        .arg(config_path.to_str().unwrap())
        .args(args)
        .env("RUST_LOG", "warn")
        .output()
        .unwrap_or_else(|e| panic!("Failed to run ncx binary at {:?}: {}", binary, e));

    let stdout = String::from_utf8_lossy(&output.stdout).to_string();
    let stderr = String::from_utf8_lossy(&output.stderr).to_string();
    let success = output.status.success();
    (stdout, stderr, success)
}

#[test]
fn test_records_lists_log() {
    let (_tmp, config_path) = setup_test_env(sample_rows());

    let (stdout, stderr, success) = run_ncx(&config_path, &["records"]);
    assert!(success, "records failed: stdout={}, stderr={}", stdout, stderr);
    assert!(stdout.contains("Records:  3"));
    assert!(stdout.contains("porosity in weld seam"));
}

#[test]
fn test_records_missing_file_fails() {
    let (tmp, config_path) = setup_test_env(sample_rows());
    fs::remove_file(tmp.path().join("data/nc_log.csv")).unwrap();

    let (_, stderr, success) = run_ncx(&config_path, &["records"]);
    assert!(!success);
    assert!(stderr.contains("data source error"), "stderr: {}", stderr);
}

#[test]
fn test_search_lexical_finds_record() {
    let (_tmp, config_path) = setup_test_env(sample_rows());

    let (stdout, stderr, success) = run_ncx(&config_path, &["search", "Line1 PressA burr"]);
    assert!(success, "search failed: stdout={}, stderr={}", stdout, stderr);
    assert!(stdout.contains("Mode: lexical"));
    let first = stdout.lines().find(|l| l.starts_with("1.")).unwrap();
    assert!(first.contains("burr on edge"), "first result: {}", first);
}

#[test]
fn test_search_json() {
    let (_tmp, config_path) = setup_test_env(sample_rows());

    let (stdout, stderr, success) = run_ncx(
        &config_path,
        &["search", "weld porosity", "--json", "--top-k", "2"],
    );
    assert!(success, "search failed: stderr={}", stderr);
    let json: serde_json::Value = serde_json::from_str(&stdout).unwrap();
    assert_eq!(json["mode"], "lexical");
    let results = json["results"].as_array().unwrap();
    assert_eq!(results.len(), 2);
    assert_eq!(results[0]["root_cause"], "contaminated shielding gas");
    assert!(results[0]["score"].as_f64().unwrap() > 0.0);
    assert!(results[0]["score"].as_f64().unwrap() >= results[1]["score"].as_f64().unwrap());
}

#[test]
fn test_search_deterministic() {
    let (_tmp, config_path) = setup_test_env(sample_rows());

    let (a, _, _) = run_ncx(&config_path, &["search", "Line1 surface", "--json"]);
    let (b, _, _) = run_ncx(&config_path, &["search", "Line1 surface", "--json"]);
    assert_eq!(a, b);
}

#[test]
fn test_search_empty_query_fails() {
    let (_tmp, config_path) = setup_test_env(sample_rows());

    let (_, stderr, success) = run_ncx(&config_path, &["search", "   "]);
    assert!(!success);
    assert!(stderr.contains("must not be empty"));
}

#[test]
fn test_search_unknown_mode_fails() {
    let (_tmp, config_path) = setup_test_env(sample_rows());

    let (_, stderr, success) = run_ncx(&config_path, &["search", "burr", "--mode", "hybrid"]);
    assert!(!success);
    assert!(stderr.contains("Unknown search mode"));
}

#[test]
fn test_semantic_search_with_unreachable_service_surfaces_error() {
    let (_tmp, config_path) = setup_test_env(sample_rows());

    let (stdout, stderr, success) = run_ncx(
        &config_path,
        &["--api-key", "sk-test", "search", "burr", "--mode", "semantic"],
    );
    assert!(!success, "expected failure, got stdout={}", stdout);
    assert!(stderr.contains("embedding service error"), "stderr: {}", stderr);
    assert!(!stdout.contains("burr on edge"));
}

#[test]
fn test_analyze_templated_json() {
    let (_tmp, config_path) = setup_test_env(sample_rows());

    let (stdout, stderr, success) = run_ncx(
        &config_path,
        &[
            "analyze", "--factory", "Line1", "--machine", "PressA", "--shift", "night", "--issue",
            "burr", "--json",
        ],
    );
    assert!(success, "analyze failed: stderr={}", stderr);
    let json: serde_json::Value = serde_json::from_str(&stdout).unwrap();
    assert_eq!(json["search"]["status"], "matched");
    assert_eq!(json["evidence"][0]["root_cause"], "dull die");
    assert!(json["capa"].as_str().unwrap().contains("dull die"));
    assert!(json["expanded_root_cause"]
        .as_str()
        .unwrap()
        .starts_with("[No LLM key provided]"));
    assert_eq!(json["narrative_source"], "template");
    assert_eq!(json["context"]["shift"], "Night");
}

#[test]
fn test_analyze_empty_log_uses_sentinel() {
    let (_tmp, config_path) = setup_test_env("");

    let (stdout, stderr, success) = run_ncx(
        &config_path,
        &[
            "analyze", "--factory", "Line9", "--machine", "Robot", "--issue", "misfeed",
        ],
    );
    assert!(success, "analyze failed: stderr={}", stderr);
    assert!(stdout.contains("No close matches found in the log."));
    assert!(stdout.contains("Not found in historical logs"));
}

#[test]
fn test_analyze_writes_pdf_into_directory() {
    let (tmp, config_path) = setup_test_env(sample_rows());
    let out_dir = tmp.path().join("reports");
    fs::create_dir_all(&out_dir).unwrap();

    let (_, stderr, success) = run_ncx(
        &config_path,
        &[
            "analyze",
            "--factory",
            "Line1",
            "--machine",
            "PressA",
            "--issue",
            "burr",
            "--pdf",
            out_dir.to_str().unwrap(),
        ],
    );
    assert!(success, "analyze failed: stderr={}", stderr);

    let files: Vec<_> = fs::read_dir(&out_dir)
        .unwrap()
        .map(|e| e.unwrap().file_name().to_string_lossy().to_string())
        .collect();
    assert_eq!(files.len(), 1);
    assert!(files[0].starts_with("NC_Report_") && files[0].ends_with(".pdf"));

    let bytes = fs::read(out_dir.join(&files[0])).unwrap();
    assert!(bytes.starts_with(b"%PDF"));
    assert!(lopdf::Document::load_mem(&bytes).is_ok());
}
