//! Command-line interface parsing and handling
//!
//! This module handles parsing command-line arguments and executing the appropriate commands.

pub mod control;
pub mod say;

use std::error::Error;
use std::path::PathBuf;
use std::sync::LazyLock;

use clap::{Parser, Subcommand};
use tracing::debug;

use crate::api::{GitContext, StreamOptions, StreamRequest};
use crate::core::client::ChatClient;
use crate::core::config::data::ConfigKey;
use crate::core::config::{Config, ConnectionSettings};
use crate::core::resume::ResumeParams;
use crate::utils::logging::{init_tracing, TranscriptLog};

static LONG_VERSION: LazyLock<String> = LazyLock::new(|| {
    let describe = option_env!("VERGEN_GIT_DESCRIBE").unwrap_or("unknown");
    format!("{} ({describe})", env!("CARGO_PKG_VERSION"))
});

#[derive(Parser)]
#[command(name = "chatrelay")]
#[command(version, long_version = LONG_VERSION.as_str())]
#[command(about = "Stream, resume and cancel chat answers from the command line")]
#[command(
    long_about = "Chatrelay talks to a chat backend that streams answers incrementally. \
Answers can be resumed after an interruption without re-sending text already shown, \
recovered when no stream is attached, and cancelled on the server.\n\n\
Environment Variables:\n\
  CHATRELAY_BASE_URL   API root (defaults to http://localhost:8000/api)\n\
  CHATRELAY_TOKEN      Bearer token attached to every request\n\
  RUST_LOG             Diagnostic log filter (defaults to warn)\n\n\
Controls:\n\
  Ctrl+C               Stop reading the current answer"
)]
pub struct Args {
    #[command(subcommand)]
    pub command: Commands,

    /// API root, overriding CHATRELAY_BASE_URL and the config file
    #[arg(long, global = true, value_name = "URL")]
    pub base_url: Option<String>,

    /// Bearer token, overriding CHATRELAY_TOKEN
    #[arg(long, global = true, value_name = "TOKEN")]
    pub token: Option<String>,

    /// Append prompts and answers to this file
    #[arg(short = 'l', long, global = true, value_name = "FILE")]
    pub log: Option<PathBuf>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Send a message and stream the answer
    Say {
        /// Team to talk to (defaults to the configured default-team)
        #[arg(long)]
        team: Option<i64>,
        /// Continue an existing task instead of starting a new one
        #[arg(long)]
        task: Option<i64>,
        /// Model override for this message
        #[arg(short = 'm', long)]
        model: Option<String>,
        /// Use the model override even if the bot pins its own model
        #[arg(long, requires = "model")]
        force_model: bool,
        /// Enable web search for this message
        #[arg(long)]
        web_search: bool,
        /// Search engine to use with --web-search
        #[arg(long, requires = "web_search")]
        search_engine: Option<String>,
        /// Let the model ask clarification questions first
        #[arg(long)]
        clarify: bool,
        /// Attachment previously uploaded to the backend
        #[arg(long)]
        attachment: Option<i64>,
        /// Branch to record alongside the message
        #[arg(long)]
        branch: Option<String>,
        /// Repository URL to record alongside the message
        #[arg(long)]
        git_url: Option<String>,
        /// On Ctrl+C, also tell the server to stop and keep the partial answer
        #[arg(long)]
        stop_on_interrupt: bool,
        /// Message text
        #[arg(required = true, trailing_var_arg = true)]
        prompt: Vec<String>,
    },
    /// Re-attach to an answer that is still being produced
    Resume {
        subtask: i64,
        /// Characters already shown; only text after this point is replayed
        #[arg(long, default_value_t = 0, conflicts_with = "recover")]
        offset: u64,
        /// Print the recovered transcript first and resume after it
        #[arg(long)]
        recover: bool,
        #[arg(long)]
        team: Option<i64>,
        #[arg(long)]
        stop_on_interrupt: bool,
    },
    /// Print the best available transcript of a subtask
    Content { subtask: i64 },
    /// Tell the server to stop producing an answer
    Cancel {
        subtask: i64,
        /// Partial answer to keep as the final result
        #[arg(long)]
        partial: Option<String>,
    },
    /// List search engines the backend offers
    Engines,
    /// Check whether a team supports direct chat
    Check { team: i64 },
    /// Set a configuration value
    Set {
        /// One of base-url, default-team, timeout-secs
        key: String,
        #[arg(required = true, trailing_var_arg = true)]
        value: Vec<String>,
    },
    /// Unset a configuration value
    Unset { key: String },
    /// Print the current configuration
    Config,
}

pub fn main() -> Result<(), Box<dyn Error>> {
    init_tracing();
    tokio::runtime::Runtime::new()?.block_on(async_main())
}

async fn async_main() -> Result<(), Box<dyn Error>> {
    let args = Args::parse();
    let config = Config::load()?;

    match args.command {
        Commands::Set { key, value } => {
            let key = ConfigKey::parse(&key)?;
            let mut config = config;
            config.set_value(key, &value.join(" "))?;
            config.save()?;
            println!("✅ Set {}", key.name());
            return Ok(());
        }
        Commands::Unset { key } => {
            let key = ConfigKey::parse(&key)?;
            let mut config = config;
            config.unset_value(key);
            config.save()?;
            println!("✅ Unset {}", key.name());
            return Ok(());
        }
        Commands::Config => {
            config.print_all();
            return Ok(());
        }
        _ => {}
    }

    let settings =
        ConnectionSettings::from_env(&config, args.base_url.as_deref(), args.token.as_deref());
    let client = ChatClient::from_settings(&settings)?;
    let log = match &args.log {
        Some(path) => TranscriptLog::new(path)?,
        None => TranscriptLog::disabled(),
    };
    if let Some(path) = log.path() {
        debug!(path = %path.display(), "appending transcript log");
    }

    match args.command {
        Commands::Say {
            team,
            task,
            model,
            force_model,
            web_search,
            search_engine,
            clarify,
            attachment,
            branch,
            git_url,
            stop_on_interrupt,
            prompt,
        } => {
            let request = StreamRequest {
                message: prompt.join(" "),
                team_id: resolve_team(team, &config)?,
                task_id: task,
                subtask_id: None,
                offset: None,
                options: StreamOptions {
                    model_id: model,
                    force_override_bot_model: force_model,
                    attachment_id: attachment,
                    enable_web_search: web_search,
                    search_engine,
                    enable_clarification: clarify,
                    git: GitContext {
                        git_url,
                        branch_name: branch,
                        ..GitContext::default()
                    },
                },
            };
            say::run_say(&client, request, &log, stop_on_interrupt).await
        }
        Commands::Resume {
            subtask,
            offset,
            recover,
            team,
            stop_on_interrupt,
        } => {
            let params = ResumeParams {
                subtask_id: subtask,
                offset,
                team_id: resolve_team(team, &config)?,
            };
            say::run_resume(&client, params, recover, &log, stop_on_interrupt).await
        }
        Commands::Content { subtask } => control::run_content(&client, subtask).await,
        Commands::Cancel { subtask, partial } => {
            control::run_cancel(&client, subtask, partial).await
        }
        Commands::Engines => control::run_engines(&client).await,
        Commands::Check { team } => control::run_check(&client, team).await,
        Commands::Set { .. } | Commands::Unset { .. } | Commands::Config => Ok(()),
    }
}

fn resolve_team(flag: Option<i64>, config: &Config) -> Result<i64, Box<dyn Error>> {
    flag.or(config.default_team).ok_or_else(|| {
        "No team given. Pass --team <id> or run 'chatrelay set default-team <id>'.".into()
    })
}
