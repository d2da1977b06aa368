use crate::client::{ApiClient, SubmissionForm};
use crate::config::{default_global_config_path, load_settings_from, ConfigError, Settings, API_KEY_ENV};
use crate::runtime::{bootstrap_state_root, default_state_root_path, StatePaths};
use std::collections::{BTreeMap, BTreeSet};
use std::path::PathBuf;

pub fn map_config_err(err: ConfigError) -> String {
    err.to_string()
}

/// Positional arguments plus `--name value`, `--name=value` options and
/// bare `--switch` flags.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommandArgs {
    pub positionals: Vec<String>,
    pub options: BTreeMap<String, String>,
    pub switches: BTreeSet<String>,
}

impl CommandArgs {
    pub fn option(&self, name: &str) -> Option<&str> {
        self.options
            .get(name)
            .map(String::as_str)
            .filter(|value| !value.trim().is_empty())
    }

    pub fn switch(&self, name: &str) -> bool {
        self.switches.contains(name)
    }

    pub fn positional(&self, index: usize) -> Option<&str> {
        self.positionals.get(index).map(String::as_str)
    }

    pub fn require_positional(&self, index: usize, usage: &str) -> Result<&str, String> {
        self.positional(index)
            .ok_or_else(|| format!("usage: {usage}"))
    }
}

/// `switches` names the flags that take no value.
pub fn parse_args(args: &[String], switches: &[&str]) -> Result<CommandArgs, String> {
    let mut parsed = CommandArgs::default();
    let mut iter = args.iter();
    while let Some(arg) = iter.next() {
        let Some(name) = arg.strip_prefix("--") else {
            parsed.positionals.push(arg.clone());
            continue;
        };
        if let Some((key, value)) = name.split_once('=') {
            parsed.options.insert(key.to_string(), value.to_string());
            continue;
        }
        if switches.contains(&name) {
            parsed.switches.insert(name.to_string());
            continue;
        }
        let value = iter
            .next()
            .ok_or_else(|| format!("option `--{name}` requires a value"))?;
        parsed.options.insert(name.to_string(), value.clone());
    }
    Ok(parsed)
}

#[derive(Debug, Clone)]
pub struct CommandContext {
    pub settings: Settings,
    pub config_path: PathBuf,
}

pub fn load_context(args: &CommandArgs) -> Result<CommandContext, String> {
    let config_path = match args.option("config") {
        Some(path) => PathBuf::from(path),
        None => default_global_config_path().map_err(map_config_err)?,
    };
    let settings = load_settings_from(&config_path).map_err(map_config_err)?;
    Ok(CommandContext {
        settings,
        config_path,
    })
}

pub fn ensure_state_root() -> Result<StatePaths, String> {
    let root = default_state_root_path().map_err(|e| e.to_string())?;
    let paths = StatePaths::new(root);
    bootstrap_state_root(&paths).map_err(|e| e.to_string())?;
    Ok(paths)
}

pub fn api_client(ctx: &CommandContext, args: &CommandArgs) -> Result<ApiClient, String> {
    let base = args
        .option("api-base")
        .map(str::to_string)
        .unwrap_or_else(|| ctx.settings.client.resolved_api_base());
    ApiClient::new(&base, ctx.settings.client.request_timeout()).map_err(|e| e.user_message())
}

pub fn submission_form(args: &CommandArgs) -> SubmissionForm {
    let api_key = args
        .option("api-key")
        .map(str::to_string)
        .or_else(|| std::env::var(API_KEY_ENV).ok());
    SubmissionForm {
        model_type: args.option("model").map(str::to_string),
        base_url: args.option("base-url").map(str::to_string),
        api_key,
        file: args
            .positional(0)
            .or_else(|| args.option("file"))
            .map(PathBuf::from),
        max_tokens_per_chunk: args.option("max-tokens").map(str::to_string),
        overlap_tokens: args.option("overlap").map(str::to_string),
    }
}

pub fn download_dir(ctx: &CommandContext, args: &CommandArgs) -> PathBuf {
    args.option("out")
        .map(PathBuf::from)
        .unwrap_or_else(|| ctx.settings.client.download_dir.clone())
}
