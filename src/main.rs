use std::fs::OpenOptions;
use std::io::{self, BufRead, Write};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use swipetui::config::Config;
use swipetui::feeds::home_timeline::{base_url, build_client};
use swipetui::feeds::oauth::{Consumer, Linker};
use swipetui::settings::SettingsStore;
use swipetui::store::PostStore;

#[derive(Parser)]
#[command(name = "swipetui")]
#[command(
    about = "Swipe through your home timeline and sort tweets into liked and disliked piles",
    long_about = None
)]
#[command(version)]
struct Cli {
    /// Path to config file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Directory for stored tweets, settings and the image cache
    #[arg(long)]
    data_dir: Option<PathBuf>,

    /// Log filter used when RUST_LOG is not set (e.g. "debug")
    #[arg(long)]
    log_level: Option<String>,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Start the interactive UI (default)
    Run,
    /// Authorize access to a Twitter account with a PIN
    Link,
    /// Forget the stored access token
    Unlink,
    /// Print pile sizes without starting the UI
    Stats,
}

fn init_logging(data_dir: &Path, level: &str) -> Result<()> {
    std::fs::create_dir_all(data_dir)
        .with_context(|| format!("Failed to create {}", data_dir.display()))?;
    let log_path = data_dir.join("swipetui.log");
    let file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(&log_path)
        .with_context(|| format!("Failed to open log file {}", log_path.display()))?;

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(Mutex::new(file))
        .with_ansi(false)
        .init();
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let config_path = cli.config.unwrap_or_else(Config::default_path);
    let mut config = Config::load(&config_path)
        .with_context(|| format!("Failed to load config from {}", config_path.display()))?;
    if let Some(dir) = cli.data_dir {
        config.storage.data_dir = Some(dir);
    }
    let data_dir = config.data_dir();

    let level = cli
        .log_level
        .or_else(|| config.log_level.clone())
        .unwrap_or_else(|| "info".to_string());
    init_logging(&data_dir, &level)?;
    info!(config = %config_path.display(), data_dir = %data_dir.display(), "starting");

    let settings = SettingsStore::open(&data_dir).context("Failed to read settings")?;

    match cli.command.unwrap_or(Command::Run) {
        Command::Run => swipetui::app::run(&config, settings),
        Command::Link => link(&config, settings).await,
        Command::Unlink => unlink(settings),
        Command::Stats => stats(&data_dir, &settings),
    }
}

async fn link(config: &Config, mut settings: SettingsStore) -> Result<()> {
    if !config.has_consumer_keys() {
        bail!(
            "No consumer key configured. Set [twitter] consumer_key and consumer_secret in {} \
             or the {} / {} environment variables.",
            Config::default_path().display(),
            swipetui::config::CONSUMER_KEY_ENV,
            swipetui::config::CONSUMER_SECRET_ENV,
        );
    }

    let consumer = Consumer {
        key: config.twitter.consumer_key.clone(),
        secret: config.twitter.consumer_secret.clone(),
    };
    let linker = Linker::new(build_client(), base_url(&config.twitter.api_host), consumer);

    let request = linker
        .request_token()
        .await
        .context("Failed to obtain a request token")?;
    let url = linker.authorize_url(&request);
    println!("Open this page and authorize the application:\n\n  {}\n", url);
    if let Err(e) = open::that(&url) {
        warn!("could not open browser: {}", e);
    }

    print!("PIN: ");
    io::stdout().flush()?;
    let mut pin = String::new();
    io::stdin().lock().read_line(&mut pin)?;
    if pin.trim().is_empty() {
        bail!("No PIN entered");
    }

    let account = linker
        .access_token(&request, &pin)
        .await
        .context("Failed to exchange the PIN for an access token")?;
    settings.set_account(&account.user_id, &account.screen_name, &account.credentials);
    settings.save().context("Failed to save settings")?;
    println!("Linked as @{}", account.screen_name);
    Ok(())
}

fn unlink(mut settings: SettingsStore) -> Result<()> {
    settings.clear_credentials();
    settings.save().context("Failed to save settings")?;
    println!("Access token removed.");
    Ok(())
}

fn stats(data_dir: &Path, settings: &SettingsStore) -> Result<()> {
    let mut store = PostStore::new(data_dir, settings.user_id());
    let snapshot = store.load().context("Failed to read stored tweets")?;
    let account = match settings.screen_name() {
        "" => "(not linked)".to_string(),
        name => format!("@{}", name),
    };
    println!("account   {}", account);
    println!("data      {}", store.dir().display());
    println!("incoming  {}", snapshot.incoming.len());
    println!("liked     {}", snapshot.liked.len());
    println!("disliked  {}", snapshot.disliked.len());
    println!("words     {}", snapshot.words.len());
    Ok(())
}
