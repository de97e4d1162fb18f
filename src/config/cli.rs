use crate::config::BotConfig;
use clap::Parser;
use std::path::PathBuf;

#[derive(Debug, Clone, Parser)]
#[command(name = "weatherbot")]
#[command(about = "Posts weather updates with a rendered widget image to Twitter")]
pub struct CliArgs {
    /// TOML configuration file; environment variables are used when omitted
    #[arg(short, long, env = "WEATHERBOT_CONFIG")]
    pub config: Option<PathBuf>,

    /// Port to listen on (overrides PORT)
    #[arg(short, long)]
    pub port: Option<u16>,

    /// Tokio worker threads (overrides WORKER_THREADS)
    #[arg(long)]
    pub worker_threads: Option<usize>,

    /// Compose and render but never post
    #[arg(long)]
    pub dry_run: bool,

    /// Run the tweet task once and exit instead of serving HTTP
    #[arg(long)]
    pub run_once: bool,

    #[arg(short, long, help = "Enable verbose output")]
    pub verbose: bool,

    /// Emit JSON log lines
    #[arg(long)]
    pub json_logs: bool,
}

impl CliArgs {
    /// Applies command line overrides on top of a loaded configuration.
    pub fn apply(&self, config: &mut BotConfig) {
        if let Some(port) = self.port {
            config.server.port = port;
        }
        if let Some(threads) = self.worker_threads {
            config.server.worker_threads = threads;
        }
        if self.dry_run {
            config.twitter.enabled = false;
        }
    }
}
