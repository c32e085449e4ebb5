//! Gate decision engine CLI.
//!
//! `hookgate hook` is invoked by the orchestration host once per lifecycle
//! event; `state` and `scan` are operator tools over the same session store
//! and pattern detector.

use std::fs;
use std::io::Read;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand};
use tracing::error;

use hookgate::core::detector::detect;
use hookgate::core::output::Host;
use hookgate::exit_codes;
use hookgate::hook::{HookRequest, run_hook};
use hookgate::io::config::{DEFAULT_CONFIG_PATH, HookgateConfig, resolve_config};
use hookgate::io::session_store::SessionStore;
use hookgate::logging;

const CONFIG_ENV: &str = "HOOKGATE_CONFIG";

#[derive(Parser)]
#[command(
    name = "hookgate",
    version,
    about = "Gate decision engine for agent lifecycle hooks"
)]
struct Cli {
    /// Config file (default: `$HOOKGATE_CONFIG`, then `.hookgate/config.toml`).
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Evaluate one host event read from stdin and print the decision JSON.
    Hook {
        /// Event name; overrides the payload's `hook_event_name`.
        event: Option<String>,
        /// Response dialect of the calling host.
        #[arg(long, value_enum, default_value_t = Host::Claude)]
        host: Host,
    },
    /// Inspect or edit persisted session state.
    State {
        #[command(subcommand)]
        action: StateAction,
    },
    /// Scan files (or stdin) for fallback patterns.
    Scan {
        /// Files to scan; reads stdin when empty.
        files: Vec<PathBuf>,
    },
}

#[derive(Subcommand)]
enum StateAction {
    /// Print a flag (or string value) for a session.
    Get {
        #[arg(long)]
        session: String,
        key: String,
    },
    /// Set a flag (`true`/`false`) or a string value for a session.
    Set {
        #[arg(long)]
        session: String,
        key: String,
        #[arg(long, default_value = "true")]
        value: String,
    },
    /// Set a flag to false; does nothing when the session has no record.
    Clear {
        #[arg(long)]
        session: String,
        key: String,
    },
}

fn main() {
    logging::init();
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(err) if err.use_stderr() && invoked_hook() => {
            // Hosts treat a failing hook as a block; usage errors must still allow.
            eprintln!("{err}");
            println!("{{}}");
            std::process::exit(exit_codes::OK);
        }
        Err(err) => err.exit(),
    };
    let config_path = config_path(cli.config);
    let code = match cli.command {
        Command::Hook { event, host } => cmd_hook(&config_path, event, host),
        Command::State { action } => report(cmd_state(&config_path, action)),
        Command::Scan { files } => report(cmd_scan(&files)),
    };
    std::process::exit(code);
}

fn invoked_hook() -> bool {
    std::env::args().skip(1).any(|arg| arg == "hook")
}

fn config_path(flag: Option<PathBuf>) -> PathBuf {
    flag.or_else(|| std::env::var_os(CONFIG_ENV).map(PathBuf::from))
        .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_PATH))
}

fn report(result: Result<i32>) -> i32 {
    result.unwrap_or_else(|err| {
        eprintln!("{err:#}");
        exit_codes::INVALID
    })
}

fn load(config_path: &Path) -> Result<HookgateConfig> {
    resolve_config(config_path).with_context(|| format!("load config {}", config_path.display()))
}

/// The host must always receive a JSON object and a non-blocking exit status,
/// even when configuration fails.
fn cmd_hook(config_path: &Path, event: Option<String>, host: Host) -> i32 {
    let config = match load(config_path) {
        Ok(config) => config,
        Err(err) => {
            error!(error = %format!("{err:#}"), "invalid configuration; allowing");
            println!("{{}}");
            return exit_codes::OK;
        }
    };
    let mut input = String::new();
    if let Err(err) = std::io::stdin().read_to_string(&mut input) {
        error!(error = %err, "read hook input");
    }
    let outcome = run_hook(&input, &HookRequest { event, host }, &config);
    println!("{}", outcome.output);
    outcome.exit_code
}

fn cmd_state(config_path: &Path, action: StateAction) -> Result<i32> {
    let config = load(config_path)?;
    let store = SessionStore::new(&config.state_dir);
    match action {
        StateAction::Get { session, key } => {
            let record = store.load(&session)?;
            let value = record.and_then(|record| match record.flags.get(&key) {
                Some(flag) => Some(flag.to_string()),
                None => record.values.get(&key).cloned(),
            });
            println!("{}", value.unwrap_or_else(|| "false".to_string()));
        }
        StateAction::Set {
            session,
            key,
            value,
        } => {
            if key.trim().is_empty() {
                bail!("state key must be non-empty");
            }
            store.update(&session, |record| match value.as_str() {
                "true" | "false" => {
                    record.flags.insert(key.clone(), value == "true");
                }
                _ => {
                    record.values.insert(key.clone(), value.clone());
                }
            })?;
        }
        StateAction::Clear { session, key } => {
            store.clear(&session, &key)?;
        }
    }
    Ok(exit_codes::OK)
}

fn cmd_scan(files: &[PathBuf]) -> Result<i32> {
    let sources: Vec<(String, String)> = if files.is_empty() {
        let mut text = String::new();
        std::io::stdin()
            .read_to_string(&mut text)
            .context("read stdin")?;
        vec![("<stdin>".to_string(), text)]
    } else {
        files
            .iter()
            .map(|path| {
                fs::read_to_string(path)
                    .with_context(|| format!("read {}", path.display()))
                    .map(|text| (path.display().to_string(), text))
            })
            .collect::<Result<_>>()?
    };

    let mut found = 0usize;
    for (label, text) in &sources {
        for violation in detect(text) {
            found += 1;
            println!(
                "{}:{}: [{} {}] {}",
                label, violation.line, violation.rule, violation.pattern, violation.message
            );
        }
    }
    Ok(if found > 0 {
        exit_codes::VIOLATIONS
    } else {
        exit_codes::OK
    })
}
