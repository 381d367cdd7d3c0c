//! Black-box tests of the `infraprobe` binary
//!
//! The provider is a wiremock server reached through `--api-base`, with a
//! fixed access token so no credentials are needed.

use serde_json::json;
use std::path::{Path, PathBuf};
use std::process::Output;
use tempfile::TempDir;
use tokio::process::Command;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const OUTPUT_JSON: &str = r#"{
    "main_vpc_id": {"sensitive": false, "type": "string", "value": "main-vpc"},
    "alb_arn": {"sensitive": false, "type": "string", "value": "web-lb"}
}"#;

const ASSERTIONS_YAML: &str = r#"
settings:
  project: test-project
  retry:
    max_attempts: 2
    base_delay_ms: 1
assertions:
  - description: main VPC is available
    kind: network
    id_from: main_vpc_id
    expect:
      state: available
  - description: load balancer exists
    kind: load_balancer
    id_from: alb_arn
"#;

struct Workspace {
    dir: TempDir,
}

impl Workspace {
    fn new(outputs: &str, assertions: &str) -> Self {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("output.json"), outputs).unwrap();
        std::fs::write(dir.path().join("assertions.yaml"), assertions).unwrap();
        Self { dir }
    }

    fn file(&self, name: &str) -> PathBuf {
        self.dir.path().join(name)
    }

    async fn run(&self, extra: &[&str]) -> Output {
        Command::new(env!("CARGO_BIN_EXE_infraprobe"))
            .arg("run")
            .arg("--input")
            .arg(self.file("output.json"))
            .arg("--config")
            .arg(self.file("assertions.yaml"))
            .args(extra)
            .env("XDG_CONFIG_HOME", self.dir.path())
            .env("HOME", self.dir.path())
            .env("INFRAPROBE_ACCESS_TOKEN", "test-token")
            .output()
            .await
            .expect("binary should run")
    }
}

async fn mock_network(server: &MockServer) {
    Mock::given(method("GET"))
        .and(path("/compute/v1/projects/test-project/global/networks/main-vpc"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"name": "main-vpc"})))
        .mount(server)
        .await;
}

fn stdout(output: &Output) -> String {
    String::from_utf8_lossy(&output.stdout).into_owned()
}

#[tokio::test]
async fn test_all_assertions_pass() {
    let server = MockServer::start().await;
    mock_network(&server).await;
    Mock::given(method("GET"))
        .and(path("/compute/v1/projects/test-project/global/forwardingRules/web-lb"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"name": "web-lb"})))
        .mount(&server)
        .await;

    let ws = Workspace::new(OUTPUT_JSON, ASSERTIONS_YAML);
    let output = ws.run(&["--api-base", &server.uri()]).await;

    assert_eq!(output.status.code(), Some(0), "{}", stdout(&output));
    let text = stdout(&output);
    assert!(text.contains("PASS  main VPC is available"));
    assert!(text.contains("PASS  load balancer exists"));
    assert!(text.contains("2 assertions, 2 passed, 0 failed"));
}

#[tokio::test]
async fn test_missing_resource_exits_one() {
    let server = MockServer::start().await;
    mock_network(&server).await;

    let ws = Workspace::new(OUTPUT_JSON, ASSERTIONS_YAML);
    let output = ws.run(&["--api-base", &server.uri(), "--parallel"]).await;

    assert_eq!(output.status.code(), Some(1));
    assert!(stdout(&output).contains("FAIL  load balancer exists (resource not found)"));
}

#[tokio::test]
async fn test_json_report() {
    let server = MockServer::start().await;
    mock_network(&server).await;

    let ws = Workspace::new(OUTPUT_JSON, ASSERTIONS_YAML);
    let output = ws.run(&["--api-base", &server.uri(), "--format", "json"]).await;

    let report: serde_json::Value = serde_json::from_slice(&output.stdout).expect("valid JSON report");
    assert_eq!(report["provider"], "gcp");
    assert_eq!(report["summary"]["total"], 2);
    assert_eq!(report["summary"]["exit_code"], 1);
    assert_eq!(report["results"][0]["passed"], true);
    assert!(report["run_id"].as_str().is_some());
}

#[tokio::test]
async fn test_missing_declared_key_exits_two() {
    let ws = Workspace::new(r#"{"main_vpc_id": {"value": "main-vpc"}}"#, ASSERTIONS_YAML);
    let output = ws.run(&["--api-base", "http://127.0.0.1:9"]).await;

    assert_eq!(output.status.code(), Some(2));
    assert!(stdout(&output).is_empty());
    assert!(String::from_utf8_lossy(&output.stderr).contains("alb_arn"));
}

#[tokio::test]
async fn test_malformed_outputs_exit_two() {
    let ws = Workspace::new("{\"main_vpc_id\": ", ASSERTIONS_YAML);
    let output = ws.run(&[]).await;

    assert_eq!(output.status.code(), Some(2));
    assert!(String::from_utf8_lossy(&output.stderr).contains("failed to parse"));
}

#[tokio::test]
async fn test_missing_input_file_exits_two() {
    let ws = Workspace::new(OUTPUT_JSON, ASSERTIONS_YAML);
    let missing: &Path = &ws.file("nope.json");
    let output = Command::new(env!("CARGO_BIN_EXE_infraprobe"))
        .args(["run", "--config"])
        .arg(ws.file("assertions.yaml"))
        .arg("--input")
        .arg(missing)
        .env("XDG_CONFIG_HOME", ws.dir.path())
        .output()
        .await
        .unwrap();

    assert_eq!(output.status.code(), Some(2));
}

#[tokio::test]
async fn test_invalid_user_config_is_reported() {
    let ws = Workspace::new(OUTPUT_JSON, ASSERTIONS_YAML);
    let config_dir = ws.file("infraprobe");
    std::fs::create_dir_all(&config_dir).unwrap();
    std::fs::write(config_dir.join("config.json"), "{not json").unwrap();

    let output = Command::new(env!("CARGO_BIN_EXE_infraprobe"))
        .arg("kinds")
        .env("XDG_CONFIG_HOME", ws.dir.path())
        .env("HOME", ws.dir.path())
        .output()
        .await
        .unwrap();

    assert!(output.status.success());
    assert!(String::from_utf8_lossy(&output.stderr).contains("ignoring invalid config"));
}

#[tokio::test]
async fn test_kinds_lists_resource_kinds() {
    let output = Command::new(env!("CARGO_BIN_EXE_infraprobe"))
        .arg("kinds")
        .output()
        .await
        .unwrap();

    assert!(output.status.success());
    let text = stdout(&output);
    assert!(text.lines().any(|l| l == "network"));
    assert!(text.lines().any(|l| l == "load_balancer"));
}
