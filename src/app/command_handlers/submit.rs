use crate::app::command_support::{
    api_client, download_dir, load_context, parse_args, submission_form,
};
use crate::client::{
    model_preset, ApiClient, FlowControl, FlowEvent, PollPolicy, SubmissionFlow,
    SubmissionOutcome,
};
use std::sync::Arc;
use std::thread;

/// Exit status used when ctrl-c arrives before any task is being followed.
const INTERRUPTED_EXIT: i32 = 130;

const SUBMIT_SWITCHES: [&str; 3] = ["no-test", "no-wait", "download"];
const SUBMIT_USAGE: &str =
    "docvec submit <archive> --model <type> [--base-url <url>] [--api-key <key>] [--max-tokens <n>] [--overlap <n>]";

fn render_event(event: &FlowEvent) -> Option<String> {
    match event {
        FlowEvent::Tested(data) => Some(format!("test: {}", data.message)),
        FlowEvent::Submitted {
            task_id,
            synchronous,
        } => Some(if *synchronous {
            format!("submitted task {task_id} (finished during submission)")
        } else {
            format!("submitted task {task_id}")
        }),
        FlowEvent::Progress { task, board } => Some(format!(
            "[{}] {} {}%",
            task.status,
            board
                .active()
                .map(|step| step.title)
                .unwrap_or(task.current_stage.as_str()),
            board.overall
        )),
        FlowEvent::PollFailed { message } => Some(format!("poll failed, retrying: {message}")),
    }
}

pub fn cmd_submit(args: &[String]) -> Result<String, String> {
    let args = parse_args(args, &SUBMIT_SWITCHES)?;
    if args.positional(0).is_none() && args.option("file").is_none() {
        return Err(format!("usage: {SUBMIT_USAGE}"));
    }
    let ctx = load_context(&args)?;
    let client = api_client(&ctx, &args)?;
    let form = submission_form(&args);

    if let Some(warning) = form
        .model_type
        .as_deref()
        .and_then(model_preset)
        .and_then(|preset| preset.warning)
    {
        eprintln!("{warning}\n");
    }

    let mut flow = SubmissionFlow::new(client.clone(), PollPolicy::progress(&ctx.settings.client));
    flow.run_test = !args.switch("no-test");
    flow.wait = !args.switch("no-wait");

    let control = Arc::new(FlowControl::new());
    if flow.wait {
        cancel_on_interrupt(Arc::clone(&control), client.clone())?;
    }
    let mut last_line = String::new();
    let outcome = flow
        .run(&form, &control, |event| {
            if let Some(line) = render_event(event) {
                if line != last_line {
                    eprintln!("{line}");
                    last_line = line;
                }
            }
        })
        .map_err(|err| err.user_message())?;

    match outcome {
        SubmissionOutcome::Completed { task, download_url } => {
            let mut lines = vec![
                "status=COMPLETED".to_string(),
                format!("task_id={}", task.id),
                format!("segments={}", task.segment_count.unwrap_or(0)),
                format!("download_url={download_url}"),
            ];
            if args.switch("download") {
                let artifact = client
                    .download(task.id.as_str(), &download_dir(&ctx, &args))
                    .map_err(|e| e.user_message())?;
                lines.push(format!("saved={}", artifact.path.display()));
                lines.push(format!("sha256={}", artifact.sha256));
            }
            Ok(lines.join("\n"))
        }
        SubmissionOutcome::Failed { task, message } => Err(format!(
            "task {} failed: {message}{}",
            task.id,
            task.error_code
                .as_deref()
                .map(|code| format!(" (code {code})"))
                .unwrap_or_default()
        )),
        SubmissionOutcome::Cancelled { task_id } => {
            Ok(format!("status=CANCELLED\ntask_id={task_id}\ntask cancelled"))
        }
        SubmissionOutcome::PollingAborted { task_id, message } => Err(format!(
            "stopped following task {task_id}: {message}\nresume with `docvec task {task_id}`"
        )),
        SubmissionOutcome::Detached { task_id } => Ok(format!(
            "status=RUNNING\ntask_id={task_id}\nfollow with `docvec task {task_id}`"
        )),
    }
}

/// Turns ctrl-c into a cancel of the followed task, which ends the flow with
/// [`SubmissionOutcome::Cancelled`]. Without a followed task the process
/// exits as an interrupted command would.
fn cancel_on_interrupt(control: Arc<FlowControl>, client: ApiClient) -> Result<(), String> {
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .map_err(|e| format!("failed to start signal runtime: {e}"))?;
    thread::Builder::new()
        .name("submit-interrupt".to_string())
        .spawn(move || {
            let interrupted = runtime.block_on(tokio::signal::ctrl_c()).is_ok();
            if !interrupted {
                return;
            }
            match control.cancel(&client) {
                Ok(Some(task_id)) => eprintln!("cancel requested for task {task_id}"),
                Ok(None) => std::process::exit(INTERRUPTED_EXIT),
                Err(err) => {
                    eprintln!("cancel failed: {}", err.user_message());
                    std::process::exit(INTERRUPTED_EXIT);
                }
            }
        })
        .map_err(|e| format!("failed to start interrupt handler: {e}"))?;
    Ok(())
}

pub fn cmd_test(args: &[String]) -> Result<String, String> {
    let args = parse_args(args, &[])?;
    let ctx = load_context(&args)?;
    let client = api_client(&ctx, &args)?;
    let submission = submission_form(&args)
        .validate()
        .map_err(|errors| crate::client::render_field_errors(&errors))?;
    let data = client
        .test_config(&submission)
        .map_err(|e| e.user_message())?;
    Ok(format!(
        "{}\nhas_source_files={}\napi_tested={}",
        data.message, data.has_source_files, data.api_tested
    ))
}
