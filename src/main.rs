use anyhow::Context;
use clap::Parser;
use std::sync::Arc;
use weatherbot::core::TaskRunner;
use weatherbot::server::{self, AppState};
use weatherbot::utils::{logger, validation::Validate};
use weatherbot::{BotConfig, BotTask, CliArgs, TaskOutcome};

fn main() -> anyhow::Result<()> {
    let args = CliArgs::parse();

    logger::init_logger(args.verbose, args.json_logs);

    tracing::info!("Starting weatherbot");

    let mut config = match BotConfig::load(args.config.as_deref()) {
        Ok(config) => config,
        Err(e) => {
            tracing::error!("❌ Failed to load configuration: {}", e);
            eprintln!("❌ {}", e.user_friendly_message());
            eprintln!("💡 {}", e.recovery_suggestion());
            std::process::exit(1);
        }
    };
    args.apply(&mut config);
    if args.verbose {
        tracing::debug!("Configuration: {:?}", config);
    }

    if let Err(e) = config.validate() {
        tracing::error!("❌ Configuration validation failed: {}", e);
        tracing::error!("💡 Suggestion: {}", e.recovery_suggestion());
        eprintln!("❌ {}", e.user_friendly_message());
        std::process::exit(1);
    }

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .worker_threads(config.server.worker_threads)
        .thread_name("weatherbot-worker")
        .enable_all()
        .build()
        .context("Failed to initialize runtime")?;

    runtime.block_on(run(args, config))
}

async fn run(args: CliArgs, config: BotConfig) -> anyhow::Result<()> {
    let task = BotTask::from_config(&config).context("Failed to set up the tweet task")?;

    if args.run_once {
        match task.run().await {
            Ok(TaskOutcome::Posted { tweet_id, .. }) => {
                println!("✅ Tweet posted (id {})", tweet_id);
            }
            Ok(TaskOutcome::Skipped { text }) => {
                println!("🔍 Test mode, tweet not posted:\n{}", text);
            }
            Err(e) => {
                eprintln!("❌ {}", e.user_friendly_message());
                eprintln!("💡 {}", e.recovery_suggestion());
                std::process::exit(2);
            }
        }
        return Ok(());
    }

    let state = Arc::new(AppState::new(Arc::new(task), config.mode_label()));
    let listener = server::bind(config.server.port).await?;
    server::serve(listener, state).await
}
