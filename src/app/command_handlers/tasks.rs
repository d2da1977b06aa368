use crate::app::command_support::{api_client, download_dir, load_context, parse_args};
use crate::client::{PollPolicy, StageBoard, TaskBoard};
use crate::task::Task;

fn render_task(task: &Task) -> String {
    let mut lines = vec![
        format!("task_id={}", task.id),
        format!("file_name={}", task.file_name),
        format!("model_type={}", task.model_type),
        format!("status={}", task.status),
        format!("stage={}", task.stage.as_str()),
        format!("created={}", task.create_time.to_rfc3339()),
        format!("updated={}", task.update_time.to_rfc3339()),
    ];
    if let Some(count) = task.segment_count {
        lines.push(format!("segments={count}"));
    }
    if let Some(sha) = &task.artifact_sha256 {
        lines.push(format!("sha256={sha}"));
    }
    if let Some(code) = &task.error_code {
        lines.push(format!("error_code={code}"));
    }
    if let Some(message) = &task.error_message {
        lines.push(format!("error_message={message}"));
    }
    lines.push(StageBoard::from_task(task).render());
    lines.join("\n")
}

pub fn cmd_tasks(args: &[String]) -> Result<String, String> {
    let args = parse_args(args, &["tui"])?;
    let ctx = load_context(&args)?;
    let client = api_client(&ctx, &args)?;
    let mut board = TaskBoard::new(client);
    if args.switch("tui") {
        return crate::tui::task_manager::run_task_manager(
            board,
            PollPolicy::task_list(&ctx.settings.client),
            download_dir(&ctx, &args),
        );
    }
    board.refresh().map_err(|e| e.user_message())?;
    Ok(board.render())
}

pub fn cmd_task(args: &[String]) -> Result<String, String> {
    let args = parse_args(args, &[])?;
    let task_id = args.require_positional(0, "docvec task <id>")?;
    let ctx = load_context(&args)?;
    let client = api_client(&ctx, &args)?;
    let task = client.get_task(task_id).map_err(|e| e.user_message())?;
    Ok(render_task(&task))
}

pub fn cmd_cancel(args: &[String]) -> Result<String, String> {
    let args = parse_args(args, &[])?;
    let task_id = args.require_positional(0, "docvec cancel <id>")?;
    let ctx = load_context(&args)?;
    let client = api_client(&ctx, &args)?;
    client.cancel_task(task_id).map_err(|e| e.user_message())?;
    Ok(format!("cancelled\ntask_id={task_id}"))
}

pub fn cmd_download(args: &[String]) -> Result<String, String> {
    let args = parse_args(args, &[])?;
    let task_id = args.require_positional(0, "docvec download <id> [--out <dir>]")?;
    let ctx = load_context(&args)?;
    let client = api_client(&ctx, &args)?;
    let artifact = client
        .download(task_id, &download_dir(&ctx, &args))
        .map_err(|e| e.user_message())?;
    Ok(format!(
        "saved={}\nbytes={}\nsha256={}\nverified={}",
        artifact.path.display(),
        artifact.bytes,
        artifact.sha256,
        artifact.verified
    ))
}
