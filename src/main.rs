use std::sync::Arc;

use chrono::Local;
use clap::{Parser, Subcommand};
use colored::Colorize;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing_subscriber::EnvFilter;

use audit_feed::config::{
    ENV_API_URL, ENV_LATENCY_THRESHOLD_MS, ENV_POLL_SECS, ENV_TIMEOUT_SECS,
};
use audit_feed::{
    AuditClient, AuditFeedController, FeedConfig, FeedError, FeedState, HttpAuditClient,
    MemoryCredentialStore, Renderer, Result, SignalBus,
};

#[derive(Parser)]
#[command(
    name = "audit-feed",
    about = "audit-feed — live audit stream for the guardrails API",
    version
)]
struct Cli {
    /// Base URL of the guardrails API (e.g. https://host/api/v1)
    #[arg(long, env = ENV_API_URL)]
    api_url: Option<String>,

    /// API key sent in the x-api-key header
    #[arg(long, env = "AUDIT_FEED_API_KEY", hide_env_values = true)]
    api_key: Option<String>,

    /// Safety-net poll period in seconds
    #[arg(long, env = ENV_POLL_SECS, default_value_t = 60)]
    poll_secs: u64,

    /// Latency (ms) above which rows are flagged
    #[arg(long, env = ENV_LATENCY_THRESHOLD_MS, default_value_t = 200.0)]
    latency_threshold_ms: f64,

    /// HTTP request timeout in seconds
    #[arg(long, env = ENV_TIMEOUT_SECS, default_value_t = 10)]
    timeout_secs: u64,

    /// Disable colored output
    #[arg(long)]
    no_color: bool,

    /// Log refresh activity to stderr
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Follow the audit log live (Enter or `r` refreshes, `q` quits)
    Watch,
    /// Fetch the audit log once and print it
    Once {
        /// Print raw entries as JSON instead of a table
        #[arg(long)]
        json: bool,
    },
    /// Show aggregated usage statistics
    Stats,
}

impl Cli {
    fn config(&self) -> FeedConfig {
        FeedConfig {
            base_url: self.api_url.clone().unwrap_or_default(),
            poll_interval_secs: self.poll_secs,
            latency_threshold_ms: self.latency_threshold_ms,
            request_timeout_secs: self.timeout_secs,
            ..Default::default()
        }
    }
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let log_level = if cli.verbose { "info" } else { "warn" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(log_level)),
        )
        .with_writer(std::io::stderr)
        .without_time()
        .init();

    if cli.no_color {
        colored::control::set_override(false);
    }

    if let Err(e) = run(cli).await {
        eprintln!("{} {e}", "[audit-feed]".red().bold());
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<()> {
    let config = cli.config();
    let client = Arc::new(HttpAuditClient::new(config.clone())?);
    let renderer = Renderer::local().with_latency_threshold(config.latency_threshold_ms);
    let color = !cli.no_color;

    match cli.command {
        Commands::Watch => {
            // without a key the feed stays empty until one is supplied
            let credentials = Arc::new(MemoryCredentialStore::from_option(cli.api_key));
            let controller = Arc::new(AuditFeedController::from_config(
                client,
                credentials,
                &config,
            ));
            watch(controller, &renderer, color).await
        }
        Commands::Once { json } => {
            let api_key = cli.api_key.ok_or(FeedError::MissingCredential)?;
            let entries = client.fetch_logs(&api_key).await?;
            if json {
                println!("{}", serde_json::to_string_pretty(&entries)?);
            } else {
                print!("{}", renderer.feed(&entries).to_table(color));
            }
            Ok(())
        }
        Commands::Stats => {
            let api_key = cli.api_key.ok_or(FeedError::MissingCredential)?;
            let stats = client.fetch_stats(&api_key).await?;
            println!("{:<16} {}", "Total requests", stats.total_requests);
            println!(
                "{:<16} {} ({:.1}%)",
                "Blocked", stats.blocked_requests, stats.block_rate
            );
            println!("{:<16} {:.2}ms", "Avg latency", stats.avg_latency);
            Ok(())
        }
    }
}

async fn watch(
    controller: Arc<AuditFeedController>,
    renderer: &Renderer<Local>,
    color: bool,
) -> Result<()> {
    let bus = SignalBus::new();
    let mut changes = controller.watch();
    let handle = controller.activate(&bus);

    println!(
        "{} Live Audit Stream (auto refresh every {}s; Enter/r = refresh, q = quit)",
        "→".cyan(),
        controller.poll_interval().as_secs()
    );

    // empty state shows until the first successful fetch
    draw(renderer, &controller.snapshot(), color);

    let mut stdin = BufReader::new(tokio::io::stdin()).lines();
    let mut stdin_open = true;

    loop {
        tokio::select! {
            changed = changes.changed() => {
                if changed.is_err() {
                    break;
                }
                let state = changes.borrow_and_update().clone();
                draw(renderer, &state, color);
            }
            line = stdin.next_line(), if stdin_open => match line {
                Ok(Some(cmd)) => match cmd.trim() {
                    "" | "r" => {
                        handle.refresh_now();
                    }
                    "q" => break,
                    other => eprintln!("unknown command '{other}' (Enter/r = refresh, q = quit)"),
                },
                Ok(None) => stdin_open = false,
                Err(e) => {
                    tracing::warn!(error = %e, "stdin closed");
                    stdin_open = false;
                }
            },
            _ = tokio::signal::ctrl_c() => break,
        }
    }

    println!("\n{} stopping audit feed...", "→".yellow());
    handle.deactivate().await;
    Ok(())
}

fn draw(renderer: &Renderer<Local>, state: &FeedState, color: bool) {
    let updated = state
        .last_updated
        .map(|t| t.with_timezone(&Local).format("%H:%M:%S").to_string())
        .unwrap_or_else(|| "never".to_string());

    println!();
    println!(
        "{} {} entries, updated {}",
        "■".purple(),
        state.len(),
        updated
    );
    print!("{}", renderer.feed(&state.entries).to_table(color));
}
