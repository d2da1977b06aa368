use crate::app::cli::{help_text, parse_cli_verb, CliVerb};

pub mod serve;
pub mod submit;
pub mod tasks;

pub fn run_cli(args: Vec<String>) -> Result<String, String> {
    if args.is_empty() {
        return Ok(help_text());
    }

    let rest = &args[1..];
    match parse_cli_verb(args[0].as_str()) {
        CliVerb::Serve => serve::cmd_serve(rest),
        CliVerb::Submit => submit::cmd_submit(rest),
        CliVerb::Test => submit::cmd_test(rest),
        CliVerb::Tasks => tasks::cmd_tasks(rest),
        CliVerb::Task => tasks::cmd_task(rest),
        CliVerb::Cancel => tasks::cmd_cancel(rest),
        CliVerb::Download => tasks::cmd_download(rest),
        CliVerb::Help => Ok(help_text()),
        CliVerb::Unknown => Err(format!(
            "unknown command `{}`; run `docvec help`",
            args[0]
        )),
    }
}
