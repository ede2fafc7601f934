//! `toolgate` binary: a tool-call console behind the human-in-the-loop gateway.

use clap::Parser;
use std::path::PathBuf;
use toolgate_cli::{default_history_path, run_cli, Console, TerminalPrompter};
use toolgate_core::{ArcadeProvider, Gateway, GatewayConfig};
use tracing_subscriber::EnvFilter;

/// Call agent tools with per-user authorization and point-of-use confirmation.
#[derive(Parser, Debug)]
#[command(name = "toolgate", version, about)]
struct Cli {
    /// Path to a JSON configuration file.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// The user tools run on behalf of.
    #[arg(short, long, env = "ARCADE_USER_ID")]
    user: Option<String>,

    /// Toolkit to load (repeatable); replaces the configured toolkits.
    #[arg(long = "toolkit")]
    toolkits: Vec<String>,

    /// Individual tool to load, e.g. Gmail.SendEmail (repeatable).
    #[arg(long = "tool")]
    tools: Vec<String>,

    /// Seconds to wait for the user to complete a grant.
    #[arg(long, value_name = "SECS")]
    auth_max_wait: Option<u64>,

    /// Milliseconds between grant status checks.
    #[arg(long, value_name = "MS")]
    auth_poll_interval: Option<u64>,

    /// Seconds to wait for an answer to a confirmation prompt.
    #[arg(long, value_name = "SECS")]
    confirm_timeout: Option<u64>,
}

impl Cli {
    /// File, then environment, then flags
    async fn gateway_config(&self) -> anyhow::Result<GatewayConfig> {
        let config = match &self.config {
            Some(path) => GatewayConfig::load(path).await?,
            None => GatewayConfig::default(),
        };
        let mut config = config.apply_env()?;

        if let Some(user) = &self.user {
            config.user_id = Some(user.clone());
        }
        if !self.toolkits.is_empty() {
            config.toolkits = self.toolkits.clone();
        }
        if !self.tools.is_empty() {
            config.tools = self.tools.clone();
        }
        if let Some(secs) = self.auth_max_wait {
            config.authorization.max_wait_secs = secs;
        }
        if let Some(ms) = self.auth_poll_interval {
            config.authorization.poll_interval_ms = ms;
        }
        if let Some(secs) = self.confirm_timeout {
            config.confirmation.timeout_secs = Some(secs);
        }
        Ok(config)
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Logs go to stderr so they never interleave with prompts.
    // Override with RUST_LOG=toolgate_core=debug.
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let config = cli.gateway_config().await?;

    let console = Console::open(default_history_path())?;
    let gateway = Gateway::builder()
        .provider(ArcadeProvider::from_env()?)
        .prompter(TerminalPrompter::new(console.handle()))
        .config(config)
        .build()
        .await?;

    run_cli(gateway, console).await?;
    Ok(())
}
