// Drives the compiled binary end to end. Every test runs in its own temporary
// directory so a local .priming-toolbox.toml never leaks in.

use std::fs;

use assert_cmd::Command;
use tempfile::TempDir;

fn toolbox(dir: &TempDir) -> Command {
    let mut cmd = Command::cargo_bin("priming-toolbox").unwrap();
    cmd.current_dir(dir.path())
        .env_remove("PRIMEX_API_URL")
        .env_remove("PRIMEX_API_KEY")
        .env_remove("RUST_LOG");
    cmd
}

fn stdout_of(cmd: &mut Command) -> String {
    let output = cmd.output().unwrap();
    assert!(
        output.status.success(),
        "stderr: {}",
        String::from_utf8_lossy(&output.stderr)
    );
    String::from_utf8(output.stdout).unwrap()
}

#[test]
fn generate_json_lists_every_trial() {
    let dir = TempDir::new().unwrap();
    let out = stdout_of(toolbox(&dir).args(["generate", "--preset", "number:masked", "--seed", "5", "--json"]));
    let trials: Vec<serde_json::Value> = serde_json::from_str(&out).unwrap();
    assert_eq!(trials.len(), 48);
    assert!(trials
        .iter()
        .all(|t| t["condition"]["paradigm"] == "numberPriming"));
}

#[test]
fn generate_is_reproducible_with_a_seed() {
    let dir = TempDir::new().unwrap();
    let args = ["generate", "--preset", "stroop:en:de", "--seed", "42", "--json"];
    let a = stdout_of(toolbox(&dir).args(args));
    let b = stdout_of(toolbox(&dir).args(args));
    assert_eq!(a, b);
}

#[test]
fn simulate_writes_result_and_summary_csv() {
    let dir = TempDir::new().unwrap();
    let out = stdout_of(toolbox(&dir).args([
        "simulate",
        "--preset",
        "stroop:en:he",
        "--seed",
        "1",
        "--csv",
        "results.csv",
        "--summary-csv",
        "summary.csv",
    ]));
    assert!(out.contains("Stroop Language Dominance"), "{out}");
    assert!(out.contains("Effect:"), "{out}");

    let results = fs::read_to_string(dir.path().join("results.csv")).unwrap();
    assert_eq!(results.lines().count(), 49);
    assert!(results.starts_with("\u{feff}Trial,Language,Word,Word Meaning,Ink Color"));

    let summary = fs::read_to_string(dir.path().join("summary.csv")).unwrap();
    assert!(summary.contains("Dominant Language,"), "{summary}");
}

#[test]
fn simulate_json_without_bom() {
    let dir = TempDir::new().unwrap();
    let out = stdout_of(toolbox(&dir).args([
        "simulate",
        "--preset",
        "generic",
        "--seed",
        "8",
        "--accuracy",
        "1.0",
        "--json",
        "--csv",
        "r.csv",
        "--no-bom",
    ]));
    let report: serde_json::Value = serde_json::from_str(&out).unwrap();
    assert_eq!(report["summary"]["totalTrials"], 20);
    assert_eq!(report["summary"]["paradigm"], "genericPriming");
    assert!(report["participantId"].as_str().unwrap().starts_with("p_"));

    let csv = fs::read_to_string(dir.path().join("r.csv")).unwrap();
    assert!(csv.starts_with("Trial,Prime,Target,Condition,Baseline"));
}

#[test]
fn link_round_trips_through_inspect_link() {
    let dir = TempDir::new().unwrap();
    let link = stdout_of(toolbox(&dir).args([
        "link",
        "--preset",
        "number:explicit",
        "--email",
        "lab@example.org",
        "--experiment-id",
        "pilot-1",
        "--base-url",
        "https://lab.example.org/run.html",
    ]));
    let link = link.trim();
    assert!(link.starts_with("https://lab.example.org/run.html?exp="), "{link}");

    let shown = stdout_of(toolbox(&dir).args(["inspect-link", link]));
    assert!(shown.contains("lab@example.org"), "{shown}");
    assert!(shown.contains("pilot-1"), "{shown}");
    assert!(shown.contains("number_priming_explicit"), "{shown}");
}

#[test]
fn undecodable_link_falls_back_to_default_setup() {
    let dir = TempDir::new().unwrap();
    let shown = stdout_of(toolbox(&dir).args(["inspect-link", "https://x.org/?exp=not-a-token"]));
    assert!(shown.contains("stroop_lang_en_he"), "{shown}");
}

#[test]
fn link_rejects_short_experiment_id() {
    let dir = TempDir::new().unwrap();
    toolbox(&dir)
        .args([
            "link",
            "--preset",
            "number:masked",
            "--email",
            "lab@example.org",
            "--experiment-id",
            "p1",
        ])
        .assert()
        .failure()
        .code(1);
}

#[test]
fn new_experiment_file_feeds_simulate() {
    let dir = TempDir::new().unwrap();
    stdout_of(toolbox(&dir).args(["new-experiment", "--preset", "number:masked", "-o", "study.toml"]));
    assert!(dir.path().join("study.toml").exists());

    toolbox(&dir)
        .args(["new-experiment", "--preset", "number:masked", "-o", "study.toml"])
        .assert()
        .failure();

    let out = stdout_of(toolbox(&dir).args(["simulate", "--experiment", "study.toml", "--seed", "3"]));
    assert!(out.contains("Number Priming"), "{out}");
}

#[test]
fn init_config_writes_settings_once() {
    let dir = TempDir::new().unwrap();
    stdout_of(toolbox(&dir).arg("init-config"));
    let text = fs::read_to_string(dir.path().join(".priming-toolbox.toml")).unwrap();
    assert!(text.contains("[simulation]"));

    toolbox(&dir).arg("init-config").assert().failure();
    stdout_of(toolbox(&dir).args(["init-config", "--force"]));
}

#[test]
fn save_without_endpoint_is_an_error() {
    let dir = TempDir::new().unwrap();
    toolbox(&dir)
        .args(["simulate", "--preset", "number:masked", "--save"])
        .assert()
        .failure()
        .code(1);
}

#[test]
fn experiment_requesting_save_needs_an_endpoint() {
    let dir = TempDir::new().unwrap();
    stdout_of(toolbox(&dir).args(["new-experiment", "--preset", "number:masked", "-o", "study.toml"]));
    let text = fs::read_to_string(dir.path().join("study.toml")).unwrap();
    let saving = text.replace("[experiment.data]\nsave = false", "[experiment.data]\nsave = true");
    assert_ne!(text, saving, "{text}");
    fs::write(dir.path().join("study.toml"), saving).unwrap();

    let output = toolbox(&dir)
        .args(["simulate", "--experiment", "study.toml", "--seed", "3"])
        .output()
        .unwrap();
    assert_eq!(output.status.code(), Some(1));
    assert!(String::from_utf8_lossy(&output.stderr).contains("needs a database URL"));
}

#[test]
fn simulate_writes_raw_data_and_summary_sheets() {
    use calamine::{Data, Reader, Xlsx};

    let dir = TempDir::new().unwrap();
    stdout_of(toolbox(&dir).args(["simulate", "--preset", "number:masked", "--seed", "2", "--xlsx", "run.xlsx"]));

    let mut book: Xlsx<_> = calamine::open_workbook(dir.path().join("run.xlsx")).unwrap();
    assert_eq!(book.sheet_names(), vec!["Raw Data".to_string(), "Summary".to_string()]);
    let raw = book.worksheet_range("Raw Data").unwrap();
    assert_eq!(raw.height(), 49);
    assert_eq!(raw.get_value((0, 1)), Some(&Data::String("Prime".into())));
    assert!(matches!(raw.get_value((1, 3)), Some(Data::Bool(_))));
}

#[test]
fn results_without_endpoint_is_an_error() {
    let dir = TempDir::new().unwrap();
    toolbox(&dir)
        .args(["results", "--email", "lab@example.org", "--experiment-id", "pilot-1"])
        .assert()
        .failure()
        .code(1);
}

#[test]
fn results_reports_an_unreachable_database() {
    let dir = TempDir::new().unwrap();
    let output = toolbox(&dir)
        .args([
            "results",
            "--email",
            "lab@example.org",
            "--experiment-id",
            "pilot-1",
            "--api-url",
            "http://127.0.0.1:9",
            "--api-key",
            "key",
        ])
        .output()
        .unwrap();
    assert_eq!(output.status.code(), Some(1));
    assert!(String::from_utf8_lossy(&output.stderr).contains("persistence failure"));
}
