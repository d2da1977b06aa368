use docvec::client::ApiClient;
use std::io::{Cursor, Write};
use std::net::TcpListener;
use std::path::{Path, PathBuf};
use std::process::{Child, Command, Output, Stdio};
use std::thread;
use std::time::{Duration, Instant};
use tempfile::{tempdir, TempDir};
use zip::write::SimpleFileOptions;

fn docvec(home: &Path) -> Command {
    let mut command = Command::new(env!("CARGO_BIN_EXE_docvec"));
    command
        .env("HOME", home)
        .env("DOCVEC_HOME", home.join("state"))
        .env_remove("DOCVEC_API_BASE")
        .env_remove("DOCVEC_API_KEY");
    command
}

fn run(home: &Path, args: &[&str]) -> Output {
    docvec(home).args(args).output().expect("run docvec")
}

fn stdout(output: &Output) -> String {
    String::from_utf8_lossy(&output.stdout).into_owned()
}

fn stderr(output: &Output) -> String {
    String::from_utf8_lossy(&output.stderr).into_owned()
}

fn free_port() -> u16 {
    let listener = TcpListener::bind("127.0.0.1:0").expect("bind");
    listener.local_addr().expect("addr").port()
}

fn write_zip(dir: &Path, files: &[(&str, &str)]) -> PathBuf {
    let mut writer = zip::ZipWriter::new(Cursor::new(Vec::new()));
    for (name, body) in files {
        writer
            .start_file(*name, SimpleFileOptions::default())
            .expect("start file");
        writer.write_all(body.as_bytes()).expect("write entry");
    }
    let path = dir.join("docs.zip");
    std::fs::write(&path, writer.finish().expect("finish").into_inner()).expect("write zip");
    path
}

/// A `docvec serve` child process that is killed on drop.
struct ServeProcess {
    child: Child,
    api_base: String,
}

impl Drop for ServeProcess {
    fn drop(&mut self) {
        let _ = self.child.kill();
        let _ = self.child.wait();
    }
}

fn spawn_serve(home: &TempDir) -> ServeProcess {
    let port = free_port();
    let child = docvec(home.path())
        .args(["serve", "--port", &port.to_string()])
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .spawn()
        .expect("spawn serve");
    let api_base = format!("http://127.0.0.1:{port}");
    let process = ServeProcess { child, api_base };

    let client = ApiClient::new(&process.api_base, Duration::from_secs(2)).expect("client");
    let deadline = Instant::now() + Duration::from_secs(30);
    while client.health().is_err() {
        assert!(Instant::now() < deadline, "service did not start");
        thread::sleep(Duration::from_millis(50));
    }
    process
}

#[test]
fn help_lists_commands_and_model_presets() {
    let home = tempdir().expect("tempdir");
    let output = run(home.path(), &["help"]);
    assert!(output.status.success());
    let text = stdout(&output);
    assert!(text.starts_with("docvec\n"));
    assert!(text.contains("Commands:"));
    assert!(text.contains("submit <archive>"));
    assert!(text.contains("local-hash"));
}

#[test]
fn unknown_command_fails_with_hint() {
    let home = tempdir().expect("tempdir");
    let output = run(home.path(), &["frobnicate"]);
    assert!(!output.status.success());
    assert!(stderr(&output).contains("unknown command `frobnicate`; run `docvec help`"));
}

#[test]
fn submit_without_archive_prints_usage() {
    let home = tempdir().expect("tempdir");
    let output = run(home.path(), &["submit"]);
    assert!(!output.status.success());
    assert!(stderr(&output).starts_with("usage: docvec submit <archive>"));
}

#[test]
fn invalid_form_is_reported_without_contacting_the_service() {
    let home = tempdir().expect("tempdir");
    let output = run(
        home.path(),
        &[
            "submit",
            "missing.rar",
            "--max-tokens",
            "zero",
            "--api-base",
            "http://127.0.0.1:9",
        ],
    );
    assert!(!output.status.success());
    let err = stderr(&output);
    assert!(err.contains("modelType: please select a model type"));
    assert!(err.contains("file: only .zip, .tar, .tar.gz, .tgz and .gz archives are supported"));
    assert!(err.contains("maxTokensPerChunk: must be a positive integer"));
    assert!(!err.contains("network error"));
}

#[test]
fn unreachable_service_reports_network_error() {
    let home = tempdir().expect("tempdir");
    let api_base = format!("http://127.0.0.1:{}", free_port());
    let output = run(home.path(), &["task", "abc", "--api-base", &api_base]);
    assert!(!output.status.success());
    assert!(stderr(&output).contains("network error, please check your connection"));
}

#[test]
fn malformed_config_file_is_rejected() {
    let home = tempdir().expect("tempdir");
    let config = home.path().join("bad.yaml");
    std::fs::write(&config, "client:\n  nonsense: true\n").expect("write config");
    let output = run(
        home.path(),
        &["tasks", "--config", config.to_str().expect("utf8 path")],
    );
    assert!(!output.status.success());
    assert!(stderr(&output).contains("nonsense"));
}

#[test]
fn submit_follows_a_local_task_and_downloads_it() {
    let home = tempdir().expect("tempdir");
    let server = spawn_serve(&home);
    let archive = write_zip(
        home.path(),
        &[("guide.md", "# Guide\n\nfirst paragraph.\n\nsecond paragraph.")],
    );
    let out_dir = home.path().join("out");

    let output = run(
        home.path(),
        &[
            "submit",
            archive.to_str().expect("utf8 path"),
            "--model",
            "local-hash",
            "--api-base",
            &server.api_base,
            "--download",
            "--out",
            out_dir.to_str().expect("utf8 path"),
        ],
    );
    assert!(output.status.success(), "stderr: {}", stderr(&output));
    let text = stdout(&output);
    assert!(text.contains("status=COMPLETED"));
    let task_id = text
        .lines()
        .find_map(|line| line.strip_prefix("task_id="))
        .expect("task id line")
        .to_string();
    assert!(out_dir.join("docs_vectors.json").is_file());
    assert!(stderr(&output).contains(&format!("submitted task {task_id}")));

    let listed = run(home.path(), &["tasks", "--api-base", &server.api_base]);
    assert!(listed.status.success());
    assert!(stdout(&listed).contains(&task_id));

    let shown = run(home.path(), &["task", &task_id, "--api-base", &server.api_base]);
    assert!(stdout(&shown).contains("status=COMPLETED"));

    let cancelled = run(home.path(), &["cancel", &task_id, "--api-base", &server.api_base]);
    assert!(!cancelled.status.success());
    assert!(stderr(&cancelled).contains("the task has already finished"));
}
