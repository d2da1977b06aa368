use crate::client::presets::preset_lines;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CliVerb {
    Serve,
    Submit,
    Test,
    Tasks,
    Task,
    Cancel,
    Download,
    Help,
    Unknown,
}

pub fn parse_cli_verb(input: &str) -> CliVerb {
    match input {
        "serve" => CliVerb::Serve,
        "submit" => CliVerb::Submit,
        "test" => CliVerb::Test,
        "tasks" => CliVerb::Tasks,
        "task" => CliVerb::Task,
        "cancel" => CliVerb::Cancel,
        "download" => CliVerb::Download,
        "help" | "--help" | "-h" => CliVerb::Help,
        _ => CliVerb::Unknown,
    }
}

pub fn cli_help_lines() -> Vec<String> {
    vec![
        "Commands:".to_string(),
        "  serve [--bind <addr>] [--port <n>]   Run the vectorization service".to_string(),
        "  submit <archive> --model <m> ...     Validate, test, submit and follow a task"
            .to_string(),
        "  test <archive> --model <m> ...       Check the archive and model settings only"
            .to_string(),
        "  tasks [--tui]                        List tasks (interactive table with --tui)"
            .to_string(),
        "  task <id>                            Show one task and its stage progress".to_string(),
        "  cancel <id>                          Cancel a running task".to_string(),
        "  download <id> [--out <dir>]          Save the vector file of a completed task"
            .to_string(),
        "  help                                 Show this help".to_string(),
        String::new(),
        "Submission options:".to_string(),
        "  --model <type>  --base-url <url>  --api-key <key> (or DOCVEC_API_KEY)".to_string(),
        "  --max-tokens <n> (default 1000)  --overlap <n> (default 10)".to_string(),
        "  --no-test  skip the pre-flight test    --no-wait  return after submission".to_string(),
        "  --download  save the vector file when the task completes".to_string(),
        String::new(),
        "Global options:".to_string(),
        "  --config <path>  settings file (default $DOCVEC_HOME/config.yaml)".to_string(),
        "  --api-base <url> service origin (default from config or DOCVEC_API_BASE)".to_string(),
    ]
}

pub(crate) fn help_text() -> String {
    let mut lines = cli_help_lines();
    lines.push(String::new());
    lines.extend(preset_lines());
    lines.join("\n")
}
