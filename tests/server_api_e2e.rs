use docvec::client::{
    ApiClient, ClientError, FlowControl, FlowEvent, PollPolicy, Submission, SubmissionFlow,
    SubmissionForm, SubmissionOutcome,
};
use docvec::config::Settings;
use docvec::embedding::hashing::embed_text;
use docvec::embedding::{
    DefaultEmbedderFactory, Embedder, EmbedderFactory, EmbedderSpec, EmbeddingError,
    EmbeddingStore,
};
use docvec::runtime::StatePaths;
use docvec::server::{serve, AppState};
use docvec::task::{Task, TaskStatus};
use std::io::{Cursor, Write};
use std::path::{Path, PathBuf};
use std::sync::mpsc;
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};
use tempfile::{tempdir, TempDir};
use zip::write::SimpleFileOptions;

struct TestServer {
    client: ApiClient,
    dir: TempDir,
}

fn start_server(embedders: Arc<dyn EmbedderFactory>) -> TestServer {
    let dir = tempdir().expect("tempdir");
    let paths = StatePaths::new(dir.path().join("state"));
    let state = Arc::new(
        AppState::with_embedders(Settings::default(), &paths, embedders).expect("app state"),
    );

    let (addr_tx, addr_rx) = mpsc::channel();
    thread::spawn(move || {
        let runtime = tokio::runtime::Builder::new_multi_thread()
            .worker_threads(2)
            .enable_all()
            .build()
            .expect("runtime");
        runtime.block_on(async move {
            let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
                .await
                .expect("bind");
            addr_tx
                .send(listener.local_addr().expect("local addr"))
                .expect("send addr");
            serve(state, listener, std::future::pending::<()>())
                .await
                .expect("serve");
        });
    });
    let addr = addr_rx
        .recv_timeout(Duration::from_secs(10))
        .expect("server address");
    let client = ApiClient::new(&format!("http://{addr}"), Duration::from_secs(10))
        .expect("client");
    TestServer { client, dir }
}

fn write_zip(dir: &Path, name: &str, files: &[(&str, &str)]) -> PathBuf {
    let mut writer = zip::ZipWriter::new(Cursor::new(Vec::new()));
    for (entry, body) in files {
        writer
            .start_file(*entry, SimpleFileOptions::default())
            .expect("start file");
        writer.write_all(body.as_bytes()).expect("write entry");
    }
    let bytes = writer.finish().expect("finish").into_inner();
    let path = dir.join(name);
    std::fs::write(&path, bytes).expect("write archive");
    path
}

fn local_submission(file: PathBuf) -> Submission {
    Submission {
        model_type: "local-hash".to_string(),
        base_url: String::new(),
        api_key: String::new(),
        file,
        max_tokens_per_chunk: 16,
        overlap_tokens: 2,
    }
}

fn long_markdown() -> String {
    (0..60)
        .map(|i| format!("paragraph {i} explains how chunks become vectors."))
        .collect::<Vec<_>>()
        .join("\n\n")
}

fn wait_terminal(client: &ApiClient, task_id: &str) -> Task {
    let deadline = Instant::now() + Duration::from_secs(30);
    loop {
        let task = client.get_task(task_id).expect("get task");
        if task.is_terminal() {
            return task;
        }
        assert!(Instant::now() < deadline, "task {task_id} never finished");
        thread::sleep(Duration::from_millis(25));
    }
}

fn api_status_and_code(err: &ClientError) -> (u16, Option<&str>) {
    match err {
        ClientError::Api { status, code, .. } => (*status, code.as_deref()),
        other => panic!("expected an api error, got {other:?}"),
    }
}

struct SlowEmbedder;

impl Embedder for SlowEmbedder {
    fn model_name(&self) -> &str {
        "slow"
    }

    fn embed(&self, text: &str) -> Result<Vec<f32>, EmbeddingError> {
        thread::sleep(Duration::from_millis(30));
        Ok(embed_text(text))
    }
}

struct RejectingEmbedder;

impl Embedder for RejectingEmbedder {
    fn model_name(&self) -> &str {
        "rejecting"
    }

    fn embed(&self, _text: &str) -> Result<Vec<f32>, EmbeddingError> {
        Err(EmbeddingError::InvalidApiKey("status 401: key revoked".to_string()))
    }
}

struct RejectingFactory;

impl EmbedderFactory for RejectingFactory {
    fn build(&self, _spec: &EmbedderSpec) -> Box<dyn Embedder> {
        Box::new(RejectingEmbedder)
    }
}

fn flow_form(archive: PathBuf) -> SubmissionForm {
    SubmissionForm {
        model_type: Some("local-hash".to_string()),
        file: Some(archive),
        max_tokens_per_chunk: Some("32".to_string()),
        overlap_tokens: Some("4".to_string()),
        ..SubmissionForm::default()
    }
}

struct SlowFactory;

impl EmbedderFactory for SlowFactory {
    fn build(&self, _spec: &EmbedderSpec) -> Box<dyn Embedder> {
        Box::new(SlowEmbedder)
    }
}

#[test]
fn health_reports_status_and_version() {
    let server = start_server(Arc::new(DefaultEmbedderFactory));
    let health = server.client.health().expect("health");
    assert_eq!(health.status, "healthy");
    assert_eq!(health.version, env!("CARGO_PKG_VERSION"));
}

#[test]
fn submitted_archive_completes_and_downloads_with_checksum() {
    let server = start_server(Arc::new(DefaultEmbedderFactory));
    let body = long_markdown();
    let archive = write_zip(
        server.dir.path(),
        "docs.zip",
        &[("guide.md", body.as_str()), ("items/a.json", r#"{"sku":"A-1"}"#)],
    );
    let submission = local_submission(archive);

    let tested = server.client.test_config(&submission).expect("test config");
    assert!(tested.has_source_files);
    assert!(tested.api_tested);

    let process = server.client.submit(&submission).expect("submit");
    assert!(!process.synchronous);
    let task = wait_terminal(&server.client, &process.task_id);
    assert_eq!(task.status, TaskStatus::Completed);
    assert_eq!(task.progress, 100);
    assert!(task.segment_count.unwrap_or(0) > 2);

    let listed = server.client.list_tasks().expect("list");
    assert!(listed.iter().any(|t| t.id.as_str() == process.task_id));

    let out = server.dir.path().join("downloads");
    let artifact = server
        .client
        .download(&process.task_id, &out)
        .expect("download");
    assert!(artifact.verified);
    assert_eq!(Some(artifact.sha256.as_str()), task.artifact_sha256.as_deref());
    assert_eq!(artifact.path, out.join("docs_vectors.json"));
    let store = EmbeddingStore::load(&artifact.path).expect("stored vectors");
    assert_eq!(Some(store.len() as u64), task.segment_count);
}

#[test]
fn archive_of_empty_documents_finishes_synchronously() {
    let server = start_server(Arc::new(DefaultEmbedderFactory));
    let archive = write_zip(server.dir.path(), "blank.zip", &[("empty.md", "  \n")]);
    let process = server
        .client
        .submit(&local_submission(archive))
        .expect("submit");
    assert!(process.synchronous);
    let task = server.client.get_task(&process.task_id).expect("task");
    assert_eq!(task.status, TaskStatus::Completed);
    assert_eq!(task.segment_count, Some(0));
}

#[test]
fn invalid_submissions_are_rejected_with_codes() {
    let server = start_server(Arc::new(DefaultEmbedderFactory));
    let archive = write_zip(server.dir.path(), "docs.zip", &[("a.md", "hello")]);

    let mut overlap = local_submission(archive.clone());
    overlap.max_tokens_per_chunk = 10;
    overlap.overlap_tokens = 10;
    let err = server.client.submit(&overlap).expect_err("overlap too large");
    assert_eq!(api_status_and_code(&err), (400, Some("6003")));

    let mut keyless = local_submission(archive);
    keyless.model_type = "text-embedding-v1".to_string();
    keyless.base_url = "http://127.0.0.1:9".to_string();
    let err = server.client.submit(&keyless).expect_err("missing key");
    assert_eq!(api_status_and_code(&err).1, Some("4004"));

    let no_sources = write_zip(server.dir.path(), "text.zip", &[("notes.txt", "plain")]);
    let err = server
        .client
        .test_config(&local_submission(no_sources))
        .expect_err("no sources");
    assert_eq!(api_status_and_code(&err), (400, Some("1006")));

    let escaping = write_zip(server.dir.path(), "escape.zip", &[("../outside.md", "# out")]);
    let err = server
        .client
        .test_config(&local_submission(escaping))
        .expect_err("unsafe entry");
    assert_eq!(api_status_and_code(&err).1, Some("1005"));
}

#[test]
fn unknown_task_is_not_found() {
    let server = start_server(Arc::new(DefaultEmbedderFactory));
    let err = server.client.get_task("no-such-task").expect_err("missing");
    assert_eq!(api_status_and_code(&err), (404, Some("7001")));
    assert_eq!(err.user_message(), "task not found");

    let err = server
        .client
        .download("no-such-task", server.dir.path())
        .expect_err("missing download");
    assert_eq!(api_status_and_code(&err).1, Some("7001"));
}

#[test]
fn running_task_can_be_cancelled_once() {
    let server = start_server(Arc::new(SlowFactory));
    let body = long_markdown();
    let archive = write_zip(server.dir.path(), "slow.zip", &[("guide.md", body.as_str())]);
    let process = server
        .client
        .submit(&local_submission(archive))
        .expect("submit");

    let err = server
        .client
        .download(&process.task_id, server.dir.path())
        .expect_err("not ready");
    assert_eq!(api_status_and_code(&err), (404, Some("1002")));

    server.client.cancel_task(&process.task_id).expect("cancel");
    let task = wait_terminal(&server.client, &process.task_id);
    assert_eq!(task.status, TaskStatus::Cancelled);

    let err = server
        .client
        .cancel_task(&process.task_id)
        .expect_err("second cancel");
    assert_eq!(api_status_and_code(&err), (409, Some("7004")));
}

#[test]
fn submission_flow_follows_task_to_completion() {
    let server = start_server(Arc::new(DefaultEmbedderFactory));
    let body = long_markdown();
    let archive = write_zip(server.dir.path(), "flow.zip", &[("guide.md", body.as_str())]);
    let form = flow_form(archive);
    let policy = PollPolicy::new(Duration::from_millis(20), Duration::from_millis(200), 5);
    let flow = SubmissionFlow::new(server.client.clone(), policy);

    let mut events = Vec::new();
    let outcome = flow
        .run(&form, &FlowControl::new(), |event| {
            events.push(match event {
                FlowEvent::Tested(_) => "tested",
                FlowEvent::Submitted { .. } => "submitted",
                FlowEvent::Progress { .. } => "progress",
                FlowEvent::PollFailed { .. } => "poll-failed",
            })
        })
        .expect("flow");

    let SubmissionOutcome::Completed { task, download_url } = outcome else {
        panic!("expected completion, got {outcome:?}");
    };
    assert_eq!(task.status, TaskStatus::Completed);
    assert_eq!(download_url, server.client.download_url(task.id.as_str()));
    assert_eq!(&events[..2], &["tested", "submitted"]);
    assert_eq!(events.last(), Some(&"progress"));
    assert!(!events.contains(&"poll-failed"));
}

#[test]
fn submission_flow_cancel_stops_following_the_task() {
    let server = start_server(Arc::new(SlowFactory));
    let body = long_markdown();
    let archive = write_zip(server.dir.path(), "cancel.zip", &[("guide.md", body.as_str())]);
    let policy = PollPolicy::new(Duration::from_millis(20), Duration::from_millis(200), 5);
    let flow = SubmissionFlow::new(server.client.clone(), policy);
    let control = FlowControl::new();

    let (outcome, cancelled) = thread::scope(|scope| {
        let canceller = scope.spawn(|| {
            let deadline = Instant::now() + Duration::from_secs(10);
            while control.task_id().is_none() {
                assert!(Instant::now() < deadline, "flow never followed a task");
                thread::sleep(Duration::from_millis(5));
            }
            control.cancel(&server.client)
        });
        let outcome = flow.run(&flow_form(archive), &control, |_| {});
        (outcome, canceller.join().expect("canceller thread"))
    });

    let task_id = cancelled.expect("cancel request").expect("followed task");
    assert_eq!(
        outcome.expect("flow"),
        SubmissionOutcome::Cancelled {
            task_id: task_id.clone()
        }
    );
    assert_eq!(control.task_id(), None);
    let task = wait_terminal(&server.client, &task_id);
    assert_eq!(task.status, TaskStatus::Cancelled);
    assert_eq!(control.cancel(&server.client).expect("nothing held"), None);
}

#[test]
fn submission_flow_reports_job_failure_message() {
    let server = start_server(Arc::new(RejectingFactory));
    let body = long_markdown();
    let archive = write_zip(server.dir.path(), "reject.zip", &[("guide.md", body.as_str())]);
    let policy = PollPolicy::new(Duration::from_millis(20), Duration::from_millis(200), 5);
    let mut flow = SubmissionFlow::new(server.client.clone(), policy);
    flow.run_test = false;

    let outcome = flow
        .run(&flow_form(archive), &FlowControl::new(), |_| {})
        .expect("flow");
    let SubmissionOutcome::Failed { task, message } = outcome else {
        panic!("expected failure, got {outcome:?}");
    };
    assert_eq!(task.status, TaskStatus::Failed);
    assert_eq!(task.error_code.as_deref(), Some("4004"));
    assert_eq!(Some(message.as_str()), task.error_message.as_deref());
}
