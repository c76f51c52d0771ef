use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use chrono::NaiveDate;
use clap::{Parser, Subcommand};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use ml_digest::config::Config;
use ml_digest::db::Database;
use ml_digest::digest::{source_from_config, Clock, SystemClock};
use ml_digest::export::export_digest;
use ml_digest::routes::{app, AppState};
use ml_digest::subscribe::{HttpSubscriberApi, SubscriptionSubmitter};

#[derive(Parser)]
#[command(name = "ml-digest", version, about = "ML newsletter landing site and digest viewer")]
struct Cli {
    /// Config file; falls back to $DIGEST_CONFIG, then digest.toml
    #[arg(long, short)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Run the web server (default)
    Serve,
    /// Write the latest news items to a dated JSON file for static mode
    Export {
        /// Digest date, YYYY-MM-DD; defaults to today
        #[arg(long)]
        date: Option<NaiveDate>,
        /// Output directory; defaults to digest.dir from the config
        #[arg(long)]
        dir: Option<PathBuf>,
    },
    /// Subscribe an address through a running server's API
    Subscribe {
        email: String,
        #[arg(long, default_value = "http://localhost:5000")]
        api_url: String,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "ml_digest=info,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let cli = Cli::parse();

    // Load configuration
    let config_path = cli
        .config
        .or_else(|| std::env::var_os("DIGEST_CONFIG").map(PathBuf::from))
        .unwrap_or_else(|| PathBuf::from("digest.toml"));
    let config = Config::load_or_default(&config_path)?.apply_env();

    match cli.command.unwrap_or(Command::Serve) {
        Command::Serve => serve(config).await,
        Command::Export { date, dir } => {
            let db = open_database(&config).await?;
            let date = date.unwrap_or_else(|| SystemClock.today());
            let dir = dir.unwrap_or_else(|| config.digest.dir.clone());
            let path = export_digest(&db, &dir, date).await?;
            println!("{}", path.display());
            Ok(())
        }
        Command::Subscribe { email, api_url } => {
            let api = HttpSubscriberApi::new(&api_url, Duration::from_secs(config.digest.timeout_secs))?;
            let mut submitter = SubscriptionSubmitter::new(api);
            let subscriber = submitter.submit(&email).await?;
            println!("Subscribed {} (id {})", subscriber.email, subscriber.id);
            Ok(())
        }
    }
}

async fn open_database(config: &Config) -> anyhow::Result<Database> {
    let db = Database::new(&config.database_url).await?;
    db.initialize().await?;
    info!("Database initialized");
    Ok(db)
}

async fn serve(config: Config) -> anyhow::Result<()> {
    let db = Arc::new(open_database(&config).await?);
    let clock: Arc<dyn Clock> = Arc::new(SystemClock);
    let digest = source_from_config(&config.digest, db.clone(), config.news_limit, clock.clone())?;

    // Create app state
    let state = Arc::new(AppState {
        db,
        digest,
        clock,
        news_limit: config.news_limit,
    });

    let router = app(state, &config.static_dir);

    // Start server
    let listener = tokio::net::TcpListener::bind(&config.listen_addr).await?;
    info!("Server starting on http://{}", config.listen_addr);

    axum::serve(listener, router).await?;

    Ok(())
}
