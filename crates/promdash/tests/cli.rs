use std::io::{Read, Write};
use std::net::{TcpListener, TcpStream};
use std::path::{Path, PathBuf};
use std::process::{Child, Command, Output, Stdio};
use std::time::{Duration, Instant};

fn bin() -> &'static str {
    env!("CARGO_BIN_EXE_promdash")
}

fn free_port() -> u16 {
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    listener.local_addr().unwrap().port()
}

fn command(temp: &Path) -> Command {
    let mut cmd = Command::new(bin());
    cmd.env("PROMDASH_CONFIG", temp.join("missing.toml"))
        .env("PROMDASH_RETRY_BACKOFF", "1ms")
        .env("PROMDASH_FETCH_TIMEOUT", "2s")
        .env_remove("PROMDASH_SCRAPE_URL")
        .env_remove("PROMDASH_COMMIT_UNTYPED")
        .env_remove("OTEL_EXPORTER_OTLP_ENDPOINT");
    cmd
}

fn write_fixture(temp: &Path, name: &str, body: &str) -> PathBuf {
    let path = temp.join(name);
    std::fs::write(&path, body).unwrap();
    path
}

fn show(temp: &Path, args: &[&str]) -> Output {
    command(temp).arg("show").args(args).output().unwrap()
}

fn stdout_json(output: &Output) -> serde_json::Value {
    assert!(
        output.status.success(),
        "stderr: {}",
        String::from_utf8_lossy(&output.stderr)
    );
    serde_json::from_slice(&output.stdout).unwrap()
}

fn metric_names(payload: &serde_json::Value) -> Vec<String> {
    payload["metrics"]
        .as_array()
        .unwrap()
        .iter()
        .map(|m| m["name"].as_str().unwrap().to_string())
        .collect()
}

#[test]
fn show_exposition_file_as_payload() {
    let temp = tempfile::tempdir().unwrap();
    let file = write_fixture(temp.path(), "metrics.txt", testkit::EXPOSITION_TEXT);

    let payload = stdout_json(&show(
        temp.path(),
        &["--file", file.to_str().unwrap(), "--output", "payload"],
    ));
    let names = metric_names(&payload);
    assert_eq!(
        names,
        vec![
            "process_resident_memory_bytes",
            "memory_usage_percent",
            "http_requests_total",
            "incidents_open",
            "db_query_duration_seconds",
        ]
    );
    assert_eq!(payload["metrics"][2]["type"], "counter");
    assert_eq!(payload["metrics"][2]["values"][0]["labels"]["method"], "GET");
    assert_eq!(payload["metrics"][2]["values"][0]["value"], "1027");
}

#[test]
fn commit_untyped_keeps_help_only_metric() {
    let temp = tempfile::tempdir().unwrap();
    let file = write_fixture(temp.path(), "metrics.txt", testkit::EXPOSITION_TEXT);

    let payload = stdout_json(&show(
        temp.path(),
        &[
            "--file",
            file.to_str().unwrap(),
            "--output",
            "payload",
            "--commit-untyped",
        ],
    ));
    let orphan = payload["metrics"]
        .as_array()
        .unwrap()
        .iter()
        .find(|m| m["name"] == "orphan_metric")
        .unwrap();
    assert_eq!(orphan["type"], "unknown");
    assert_eq!(orphan["values"][0]["value"], "1");
}

#[test]
fn only_filters_by_glob() {
    let temp = tempfile::tempdir().unwrap();
    let file = write_fixture(temp.path(), "metrics.txt", testkit::EXPOSITION_TEXT);

    let payload = stdout_json(&show(
        temp.path(),
        &[
            "--file",
            file.to_str().unwrap(),
            "--output",
            "payload",
            "--only",
            "http_*",
        ],
    ));
    assert_eq!(metric_names(&payload), vec!["http_requests_total"]);
}

#[test]
fn json_view_groups_canonical_payload() {
    let temp = tempfile::tempdir().unwrap();
    let file = write_fixture(temp.path(), "metrics.json", testkit::JSON_CANONICAL);

    let view = stdout_json(&show(
        temp.path(),
        &["--file", file.to_str().unwrap(), "--output", "json"],
    ));
    assert_eq!(view["timestamp"], "2026-02-01T00:00:00Z");
    let groups = view["groups"].as_array().unwrap();
    assert_eq!(groups.len(), 5);

    let http = &groups[1];
    assert_eq!(http["title"], "HTTP Metrics");
    let latency = &http["metrics"][0];
    assert_eq!(latency["name"], "http_request_duration_seconds");
    assert_eq!(latency["presentation"]["kind"], "histogram");
    let bounds: Vec<&str> = latency["presentation"]["buckets"]
        .as_array()
        .unwrap()
        .iter()
        .map(|b| b["bucket"].as_str().unwrap())
        .collect();
    assert_eq!(bounds, vec!["100.00ms", "500.00ms", "+Inf"]);

    let business = &groups[2];
    assert_eq!(business["metrics"][0]["name"], "active_sessions");
}

#[test]
fn flat_json_becomes_gauges() {
    let temp = tempfile::tempdir().unwrap();
    let file = write_fixture(temp.path(), "flat.json", testkit::JSON_FLAT);

    let payload = stdout_json(&show(
        temp.path(),
        &["--file", file.to_str().unwrap(), "--output", "payload"],
    ));
    let cpu = payload["metrics"]
        .as_array()
        .unwrap()
        .iter()
        .find(|m| m["name"] == "cpu_usage")
        .unwrap();
    assert_eq!(cpu["type"], "gauge");
    assert_eq!(cpu["values"][0]["value"], "42");
}

#[test]
fn prom_output_reencodes_exposition() {
    let temp = tempfile::tempdir().unwrap();
    let mut child = command(temp.path())
        .args(["show", "--stdin", "--output", "prom"])
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .spawn()
        .unwrap();
    child
        .stdin
        .take()
        .unwrap()
        .write_all(testkit::EXPOSITION_TEXT.as_bytes())
        .unwrap();
    let output = child.wait_with_output().unwrap();
    assert!(output.status.success());

    let text = String::from_utf8_lossy(&output.stdout);
    assert!(text.contains("# TYPE http_requests_total counter"));
    assert!(text.contains("http_requests_total{method=\"POST\",route=\"/api/incidents\"} 31"));
    assert!(!text.contains("orphan_metric"));
}

#[test]
fn human_output_shows_groups() {
    let temp = tempfile::tempdir().unwrap();
    let file = write_fixture(temp.path(), "metrics.txt", testkit::EXPOSITION_TEXT);

    let output = show(temp.path(), &["--file", file.to_str().unwrap()]);
    assert!(output.status.success());
    let text = String::from_utf8_lossy(&output.stdout);
    assert!(text.contains("System Metrics"));
    assert!(text.contains("73%"));
    assert!(text.contains("Database Metrics"));
    assert!(text.contains("4.20ms"));
}

#[test]
fn unreachable_url_fails_with_fetch_error() {
    let temp = tempfile::tempdir().unwrap();
    let url = format!("http://127.0.0.1:{}/api/prometheus-metrics", free_port());

    let output = command(temp.path())
        .env("PROMDASH_FETCH_ATTEMPTS", "2")
        .args(["show", "--url", &url])
        .output()
        .unwrap();
    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("fetch error"), "stderr: {stderr}");
    assert!(stderr.contains("after 2 attempts"), "stderr: {stderr}");
}

#[test]
fn bad_config_file_is_reported() {
    let temp = tempfile::tempdir().unwrap();
    let cfg = write_fixture(temp.path(), "config.toml", "fetch_attempts = 0\n");
    let file = write_fixture(temp.path(), "metrics.txt", testkit::EXPOSITION_TEXT);

    let output = command(temp.path())
        .arg("--config")
        .arg(&cfg)
        .args(["show", "--file", file.to_str().unwrap()])
        .output()
        .unwrap();
    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("configuration error"), "stderr: {stderr}");
}

struct ServeGuard(Child);

impl Drop for ServeGuard {
    fn drop(&mut self) {
        let _ = self.0.kill();
        let _ = self.0.wait();
    }
}

fn http_get(port: u16, path: &str) -> Option<(u16, String)> {
    let mut stream = TcpStream::connect(("127.0.0.1", port)).ok()?;
    stream
        .set_read_timeout(Some(Duration::from_secs(2)))
        .ok()?;
    write!(
        stream,
        "GET {path} HTTP/1.1\r\nHost: 127.0.0.1\r\nConnection: close\r\n\r\n"
    )
    .ok()?;
    let mut raw = String::new();
    stream.read_to_string(&mut raw).ok()?;
    let status = raw.split_whitespace().nth(1)?.parse().ok()?;
    let body = raw.split_once("\r\n\r\n").map(|(_, b)| b.to_string())?;
    Some((status, body))
}

fn wait_for_poll(port: u16) -> String {
    let deadline = Instant::now() + Duration::from_secs(10);
    while Instant::now() < deadline {
        if let Some((200, body)) = http_get(port, "/health")
            && !body.contains("\"sequence\":0")
        {
            return body;
        }
        std::thread::sleep(Duration::from_millis(50));
    }
    panic!("serve did not complete a poll in time");
}

#[test]
fn serve_reports_unavailable_until_first_success() {
    let temp = tempfile::tempdir().unwrap();
    let view_port = free_port();
    let upstream = format!("http://127.0.0.1:{}/metrics", free_port());

    let child = command(temp.path())
        .env("PROMDASH_FETCH_ATTEMPTS", "1")
        .args([
            "serve",
            "--url",
            &upstream,
            "--addr",
            &format!("127.0.0.1:{view_port}"),
            "--interval",
            "1h",
        ])
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .spawn()
        .unwrap();
    let _guard = ServeGuard(child);

    let health = wait_for_poll(view_port);
    assert!(health.contains("\"has_payload\":false"));

    let (status, body) = http_get(view_port, "/api/prometheus-metrics").unwrap();
    assert_eq!(status, 503);
    assert!(body.contains("fetch error"));

    let (status, body) = http_get(view_port, "/api/metrics/view").unwrap();
    assert_eq!(status, 200);
    assert!(body.contains("\"view\":null"));
}
