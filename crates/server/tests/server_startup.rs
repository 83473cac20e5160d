use std::io::Write;
use std::net::TcpListener;
use std::time::Duration;

use reqwest::Client;
use tempfile::{NamedTempFile, TempDir};
use tokio::time::{sleep, timeout};

/// Find an available port
fn get_available_port() -> u16 {
    TcpListener::bind("127.0.0.1:0")
        .unwrap()
        .local_addr()
        .unwrap()
        .port()
}

/// Create a minimal valid config
fn minimal_config(port: u16, temp_dir: &std::path::Path) -> String {
    format!(
        r#"
[auth]
method = "none"

[server]
host = "127.0.0.1"
port = {}
temp_dir = "{}"

[distribution]
uploader_url = "http://127.0.0.1:9/upload"
notifications_url = "http://127.0.0.1:9/notifications"
service_token = "svc-token"
"#,
        port,
        temp_dir.display()
    )
}

fn write_config(content: &str) -> NamedTempFile {
    let mut temp_file = NamedTempFile::new().unwrap();
    temp_file.write_all(content.as_bytes()).unwrap();
    temp_file.flush().unwrap();
    temp_file
}

/// Spawn the server and return a handle
async fn spawn_server(config_path: &std::path::Path) -> tokio::process::Child {
    tokio::process::Command::new(env!("CARGO_BIN_EXE_play-signer"))
        .env("PLAYSIGNER_CONFIG", config_path)
        .env("RUST_LOG", "error") // Quiet logs during tests
        .kill_on_drop(true)
        .spawn()
        .expect("Failed to spawn server")
}

/// Wait for server to be ready
async fn wait_for_server(port: u16, max_attempts: u32) -> bool {
    let client = Client::new();
    for _ in 0..max_attempts {
        if client
            .get(format!("http://127.0.0.1:{}/healthcheck", port))
            .send()
            .await
            .is_ok()
        {
            return true;
        }
        sleep(Duration::from_millis(50)).await;
    }
    false
}

/// Run the binary to completion with the given config path.
async fn run_to_exit(config_path: &std::path::Path) -> std::process::Output {
    timeout(
        Duration::from_secs(5),
        tokio::process::Command::new(env!("CARGO_BIN_EXE_play-signer"))
            .env("PLAYSIGNER_CONFIG", config_path)
            .env("RUST_LOG", "error")
            .output(),
    )
    .await
    .expect("Command timed out")
    .expect("Failed to execute command")
}

#[tokio::test]
async fn test_healthcheck_endpoint() {
    let port = get_available_port();
    let work_dir = TempDir::new().unwrap();
    let temp_file = write_config(&minimal_config(port, &work_dir.path().join("bundles")));

    let mut server = spawn_server(temp_file.path()).await;

    assert!(
        wait_for_server(port, 40).await,
        "Server did not start in time"
    );

    let client = Client::new();
    let response = client
        .get(format!("http://127.0.0.1:{}/healthcheck", port))
        .send()
        .await
        .expect("Failed to send request");

    assert!(response.status().is_success());
    assert_eq!(response.text().await.unwrap(), "OK");

    // Staging directory is created at startup
    assert!(work_dir.path().join("bundles").is_dir());

    server.kill().await.ok();
}

#[tokio::test]
async fn test_metrics_endpoint_is_public() {
    let port = get_available_port();
    let work_dir = TempDir::new().unwrap();
    let temp_file = write_config(&minimal_config(port, work_dir.path()));

    let mut server = spawn_server(temp_file.path()).await;

    assert!(
        wait_for_server(port, 40).await,
        "Server did not start in time"
    );

    let response = Client::new()
        .get(format!("http://127.0.0.1:{}/metrics", port))
        .send()
        .await
        .expect("Failed to send request");

    assert!(response.status().is_success());
    let body = response.text().await.unwrap();
    assert!(body.contains("playsigner_dispatcher_workers"));

    server.kill().await.ok();
}

#[tokio::test]
async fn test_missing_config_file_exits_with_error() {
    let result = run_to_exit(std::path::Path::new("/nonexistent/config.toml")).await;
    assert!(!result.status.success());
}

#[tokio::test]
async fn test_missing_auth_section_exits_with_error() {
    let temp_file = write_config(
        r#"
[server]
port = 8080

[distribution]
uploader_url = "http://127.0.0.1:9/upload"
notifications_url = "http://127.0.0.1:9/notifications"
service_token = "svc-token"
"#,
    );

    let result = run_to_exit(temp_file.path()).await;
    assert!(!result.status.success());
}

#[tokio::test]
async fn test_empty_service_token_exits_with_error() {
    let temp_file = write_config(
        r#"
[auth]
method = "none"

[distribution]
uploader_url = "http://127.0.0.1:9/upload"
notifications_url = "http://127.0.0.1:9/notifications"
service_token = ""
"#,
    );

    let result = run_to_exit(temp_file.path()).await;
    assert!(!result.status.success());
}

#[tokio::test]
async fn test_invalid_signing_key_exits_with_error() {
    let temp_file = write_config(
        r#"
[auth]
method = "none"

[distribution]
uploader_url = "http://127.0.0.1:9/upload"
notifications_url = "http://127.0.0.1:9/notifications"
signing_key = "not a pem"
"#,
    );

    let result = run_to_exit(temp_file.path()).await;
    assert!(!result.status.success());
}
