// CLI integration tests: the `bagsdk` binary against the loopback mock service.
mod support;

use std::process::{Command, Output};

use serde_json::{Value, json};
use support::{Canned, MockServer, closed_port_url};

fn cmd(api_url: &str) -> Command {
    let mut command = Command::new(env!("CARGO_BIN_EXE_bagsdk"));
    command
        .env_remove("BAGSDK_TOKEN")
        .env_remove("BAGSDK_CONTENT_URL")
        .env_remove("BAGSDK_LOG")
        .env_remove("BAGSDK_TIMEOUT_MS")
        .env("BAGSDK_API_URL", api_url);
    command
}

fn parse_json_line(output: &[u8]) -> Value {
    let text = String::from_utf8_lossy(output);
    let line = text.lines().next().expect("json line");
    serde_json::from_str(line).expect("valid json")
}

fn run(command: &mut Command) -> Output {
    command.output().expect("spawn bagsdk")
}

#[test]
fn get_prints_the_json_response() {
    let server = MockServer::start();
    server.route("GET", "/views/v1", Canned::json(200, json!({"id": "v1"})));

    let output = run(cmd(server.base_url()).args(["--token", "tok", "get", "/views/v1"]));
    assert!(output.status.success());
    assert_eq!(parse_json_line(&output.stdout), json!({"id": "v1"}));
    assert_eq!(server.last_request().header("authorization"), Some("Bearer tok"));
}

#[test]
fn post_sends_data_flag_as_json() {
    let server = MockServer::start();
    server.route("POST", "/bags/b1/views", Canned::json(201, json!({"id": "v2"})));

    let output = run(cmd(server.base_url()).args([
        "post",
        "bags/b1/views",
        "--data",
        r#"{"name":"readers"}"#,
    ]));
    assert!(output.status.success());
    assert_eq!(parse_json_line(&output.stdout), json!({"id": "v2"}));
    let seen = server.last_request();
    assert_eq!(seen.json(), json!({"name": "readers"}));
    assert_eq!(seen.header("content-type"), Some("application/json"));
}

#[test]
fn delete_reports_success() {
    let server = MockServer::start();
    server.route("DELETE", "/views/v1", Canned::empty(204));

    let output = run(cmd(server.base_url()).args(["delete", "/views/v1"]));
    assert!(output.status.success());
    assert_eq!(parse_json_line(&output.stdout), json!({"deleted": true}));
}

#[test]
fn status_error_is_json_on_stderr() {
    let server = MockServer::start();

    let output = run(cmd(server.base_url()).args(["get", "/views/nope"]));
    assert_eq!(output.status.code(), Some(1));
    let err = parse_json_line(&output.stderr);
    assert_eq!(err["error"]["kind"], "Status");
    assert_eq!(err["error"]["status"], 404);
    assert_eq!(err["error"]["entries"][0]["title"], "Not Found");
}

#[test]
fn invalid_data_is_a_usage_error() {
    let server = MockServer::start();
    let output = run(cmd(server.base_url()).args(["put", "/x", "--data", "{nope"]));
    assert_eq!(output.status.code(), Some(2));
    assert!(server.requests().is_empty());
}

#[test]
fn missing_api_url_is_a_usage_error() {
    let mut command = cmd("unused");
    command.env_remove("BAGSDK_API_URL");
    let output = run(command.args(["get", "/views/v1"]));
    assert_eq!(output.status.code(), Some(2));
    let err = parse_json_line(&output.stderr);
    assert_eq!(err["error"]["kind"], "Usage");
}

#[test]
fn unreachable_host_exits_with_transport_code() {
    let output = run(cmd(&closed_port_url()).args(["get", "/views/v1"]));
    assert_eq!(output.status.code(), Some(3));
    let err = parse_json_line(&output.stderr);
    assert_eq!(err["error"]["kind"], "Transport");
}

#[test]
fn api_url_flag_overrides_environment() {
    let server = MockServer::start();
    server.route("GET", "/views/v1", Canned::json(200, json!({"id": "v1"})));

    let output = run(cmd(&closed_port_url()).args([
        "--api-url",
        server.base_url(),
        "get",
        "/views/v1",
    ]));
    assert!(output.status.success());
}

#[test]
fn ls_lists_folder_entries() {
    let server = MockServer::start();
    server.route(
        "GET",
        "/views/v1/folders",
        Canned::json(200, json!([{"name": "a.txt", "path": "/a.txt", "kind": "file"}])),
    );

    let output = run(cmd(server.base_url()).args(["ls", "v1"]));
    assert!(output.status.success());
    let entries = parse_json_line(&output.stdout);
    assert_eq!(entries[0]["name"], "a.txt");
    assert_eq!(server.last_request().query.as_deref(), Some("path=%2F"));
}

#[test]
fn download_writes_raw_bytes() {
    let server = MockServer::start();
    let bytes: Vec<u8> = vec![0, 159, 146, 150, 255, 10];
    server.route(
        "GET",
        "/views/v1/files",
        Canned::bytes(200, "application/octet-stream", bytes.clone()),
    );

    let stdout = run(cmd(server.base_url()).args(["download", "v1", "/blob.bin"]));
    assert!(stdout.status.success());
    assert_eq!(stdout.stdout, bytes);

    let temp = tempfile::tempdir().expect("tempdir");
    let out = temp.path().join("blob.bin");
    let output = run(cmd(server.base_url()).args([
        "download",
        "v1",
        "/blob.bin",
        "--out",
        out.to_str().expect("utf8 path"),
    ]));
    assert!(output.status.success());
    assert_eq!(parse_json_line(&output.stdout)["bytes"], 6);
    assert_eq!(std::fs::read(&out).expect("read"), bytes);
}

#[test]
fn upload_sends_a_local_file() {
    let server = MockServer::start();
    server.route(
        "POST",
        "/views/v1/uploads",
        Canned::json(200, json!({"upload_id": "u1", "upload_url": "/presigned/u1"})),
    );
    server.route("PUT", "/presigned/u1", Canned::empty(200));
    server.route("POST", "/views/v1/uploads/u1/complete", Canned::empty(204));

    let temp = tempfile::tempdir().expect("tempdir");
    let local = temp.path().join("note.txt");
    std::fs::write(&local, b"from the cli").expect("write");

    let output = run(cmd(server.base_url()).args([
        "upload",
        "v1",
        local.to_str().expect("utf8 path"),
        "/note.txt",
    ]));
    assert!(output.status.success());
    assert_eq!(parse_json_line(&output.stdout)["upload_id"], "u1");
    assert_eq!(server.requests_to("PUT", "/presigned/u1")[0].body, b"from the cli");
}

#[test]
fn request_logging_goes_to_stderr() {
    let server = MockServer::start();
    server.route("GET", "/views/v1", Canned::json(200, json!({"id": "v1"})));

    let output = run(cmd(server.base_url())
        .env_remove("RUST_LOG")
        .args(["--log-level", "single", "get", "/views/v1"]));
    assert!(output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("GET"), "{stderr}");
    assert!(stderr.contains("200"), "{stderr}");
    assert_eq!(parse_json_line(&output.stdout), json!({"id": "v1"}));
}
