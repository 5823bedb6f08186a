use std::ffi::OsString;
use std::io::IsTerminal;
use std::path::PathBuf;

use anyhow::anyhow;
use chrono::NaiveDate;
use clap::{ArgAction, Parser};
use tracing::{debug, warn};
use tracing_subscriber::EnvFilter;

use crate::config::Config;
use crate::datetime::{format_iso, parse_iso_date};
use crate::labels::Language;

/// Checked before `RUST_LOG`.
const LOG_ENV_VAR: &str = "CASEBOX_LOG";

#[derive(Debug, Clone)]
pub struct PreprocessedArgs {
    pub cleaned_args: Vec<OsString>,
    pub rc_overrides: Vec<(String, String)>,
}

/// One `--rc` setting, written `KEY=VALUE` or `KEY:VALUE`.
#[derive(Debug, Clone)]
pub struct KeyVal {
    pub key: String,
    pub value: String,
}

impl std::str::FromStr for KeyVal {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (key, value) = split_setting(s)
            .ok_or_else(|| anyhow!("expected KEY=VALUE or KEY:VALUE, got: {s}"))?;
        Ok(Self {
            key: key.to_string(),
            value: value.to_string(),
        })
    }
}

#[derive(Parser, Debug, Clone)]
#[command(
    name = "casebox",
    version,
    about = "Confirmed-case dashboard: case boxes grouped by recency, and case cards",
    disable_help_subcommand = true,
    arg_required_else_help = false
)]
pub struct GlobalCli {
    #[arg(short = 'v', long = "verbose", action = ArgAction::Count)]
    pub verbose: u8,

    #[arg(short = 'q', long = "quiet", action = ArgAction::Count)]
    pub quiet: u8,

    #[arg(
        long = "rc",
        value_parser = clap::builder::ValueParser::new(|s: &str| s.parse::<KeyVal>()),
        action = ArgAction::Append
    )]
    pub rc_overrides: Vec<KeyVal>,

    #[arg(long = "caseboxrc")]
    pub caseboxrc: Option<PathBuf>,

    #[arg(long = "data")]
    pub data: Option<PathBuf>,

    /// Display language for labels and bilingual case text (`zh` or `en`).
    #[arg(
        short = 'l',
        long = "lang",
        value_parser = clap::builder::ValueParser::new(|s: &str| s.parse::<Language>())
    )]
    pub lang: Option<Language>,

    /// Earliest date the box grid reaches back to.
    #[arg(
        long = "start",
        value_name = "YYYY-MM-DD",
        value_parser = clap::builder::ValueParser::new(parse_iso_date)
    )]
    pub start: Option<NaiveDate>,

    #[arg(long = "no-color")]
    pub no_color: bool,

    #[arg(trailing_var_arg = true, allow_hyphen_values = true)]
    pub rest: Vec<OsString>,
}

impl GlobalCli {
    /// Config overrides from flags, in the order they apply; `--lang`,
    /// `--start` and `--no-color` win over `--rc`.
    pub fn setting_overrides(&self) -> Vec<(String, String)> {
        let mut out: Vec<(String, String)> = self
            .rc_overrides
            .iter()
            .map(|kv| (kv.key.clone(), kv.value.clone()))
            .collect();
        if let Some(lang) = self.lang {
            out.push(("language".to_string(), lang.key().to_string()));
        }
        if let Some(start) = self.start {
            out.push(("start.date".to_string(), format_iso(start)));
        }
        if self.no_color {
            out.push(("color".to_string(), "off".to_string()));
        }
        out
    }
}

fn default_log_level(verbose: u8, quiet: u8) -> &'static str {
    match (quiet, verbose) {
        (2.., _) => "error",
        (1, _) => "warn",
        (0, 3..) => "trace",
        (0, 2) => "debug",
        (0, 1) => "info",
        (0, 0) => "warn",
    }
}

pub fn init_tracing(verbose: u8, quiet: u8) -> anyhow::Result<()> {
    let default_level = default_log_level(verbose, quiet);

    let env_filter = EnvFilter::try_from_env(LOG_ENV_VAR)
        .or_else(|_| EnvFilter::try_from_default_env())
        .or_else(|_| EnvFilter::try_new(default_level))
        .map_err(|e| anyhow!("invalid {LOG_ENV_VAR} / RUST_LOG filter: {e}"))?;

    let init_result = tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr)
        .with_target(true)
        .with_level(true)
        .with_ansi(std::io::stderr().is_terminal())
        .try_init();

    if let Err(err) = init_result {
        debug!(error = %err, "tracing subscriber already set, continuing");
    }

    Ok(())
}

/// Pulls positional `rc.KEY=VALUE` / `rc.KEY:VALUE` overrides out before clap
/// sees the arguments. A bare `rc.` prefix with no key is an error.
#[tracing::instrument(skip_all)]
pub fn preprocess_args(raw: &[OsString]) -> anyhow::Result<PreprocessedArgs> {
    let mut cleaned = Vec::with_capacity(raw.len());
    let mut overrides: Vec<(String, String)> = Vec::new();

    let mut iter = raw.iter().cloned();
    if let Some(bin) = iter.next() {
        cleaned.push(bin);
    }

    for arg in iter {
        let text = arg.to_string_lossy();
        let Some(rest) = text.strip_prefix("rc.") else {
            cleaned.push(arg);
            continue;
        };

        if rest.starts_with(['=', ':']) {
            return Err(anyhow!("missing setting name in '{text}'"));
        }
        match split_setting(rest) {
            Some((key, value)) => {
                debug!(key, value, "captured positional rc override");
                overrides.push((format!("rc.{key}"), value.to_string()));
            }
            None => cleaned.push(arg.clone()),
        }
    }

    Ok(PreprocessedArgs {
        cleaned_args: cleaned,
        rc_overrides: overrides,
    })
}

/// Splits at the first `=`, or failing that the first `:`. The key must be
/// non-empty; both halves are trimmed.
fn split_setting(raw: &str) -> Option<(&str, &str)> {
    let (key, value) = raw.split_once('=').or_else(|| raw.split_once(':'))?;
    let key = key.trim();
    (!key.is_empty()).then(|| (key, value.trim()))
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Invocation {
    pub filter_terms: Vec<String>,
    pub command: String,
    pub command_args: Vec<String>,
}

impl Invocation {
    #[tracing::instrument(skip(cfg, rest))]
    pub fn parse(cfg: &Config, rest: Vec<OsString>) -> anyhow::Result<Self> {
        let tokens: Vec<String> = rest
            .into_iter()
            .map(|arg| arg.to_string_lossy().to_string())
            .collect();

        let default_command = cfg
            .get("default.command")
            .unwrap_or_else(|| "boxes".to_string());

        if tokens.is_empty() {
            debug!(command = %default_command, "no explicit command, using default");
            return Ok(Self {
                filter_terms: vec![],
                command: default_command,
                command_args: vec![],
            });
        }

        if tokens.len() == 1 && tokens[0].trim_start_matches('#').parse::<u32>().is_ok() {
            debug!(token = %tokens[0], "single case number interpreted as card query");
            return Ok(Self {
                filter_terms: vec![],
                command: "card".to_string(),
                command_args: vec![tokens[0].clone()],
            });
        }

        let split = split_filter_command(&tokens);
        let Some((filter_terms, command, command_args)) = split else {
            warn!(
                command = %default_command,
                "no command detected, treated all terms as filter for default command"
            );
            return Ok(Self {
                filter_terms: tokens,
                command: default_command,
                command_args: vec![],
            });
        };

        Ok(Self {
            filter_terms,
            command,
            command_args,
        })
    }
}

fn split_filter_command(tokens: &[String]) -> Option<(Vec<String>, String, Vec<String>)> {
    let known = crate::commands::known_command_names();

    for (i, token) in tokens.iter().enumerate() {
        if let Some(full) = crate::commands::expand_command_abbrev(token, &known) {
            debug!(
                token = %token,
                expanded = %full,
                split_index = i,
                "resolved command token"
            );
            return Some((
                tokens[..i].to_vec(),
                full.to_string(),
                tokens[i + 1..].to_vec(),
            ));
        }
    }

    None
}
