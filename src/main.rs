mod api;
mod app;
mod audio;
mod chart;
mod config;
mod diff;
mod learning;
mod models;
mod session;
mod test_flow;
mod ui;

use clap::Parser;

use std::error::Error;
use std::fs::File;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use api::BackendClient;
use app::App;
use config::Settings;

#[derive(Parser, Debug)]
#[command(version, about = "Dyslexia screening and spelling practice in the terminal")]
struct Args {
    /// Backend base URL, overrides the stored setting
    #[arg(short, long, env = "DYSCOVER_SERVER")]
    server: Option<String>,
    /// Request timeout in seconds, overrides the stored setting
    #[arg(long)]
    timeout_secs: Option<u64>,
    #[arg(long, default_value = "dyscover.log")]
    log_file: PathBuf,
    /// Settings file to use instead of the platform config dir
    #[arg(short, long)]
    config: Option<PathBuf>,
    /// Shuffle practice words
    #[arg(long)]
    shuffle: bool,
}

fn init_logging(path: &Path) -> Result<(), Box<dyn Error>> {
    let file = File::create(path)?;
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("dyscover=info")),
        )
        .with_writer(Mutex::new(file))
        .with_ansi(false)
        .init();
    Ok(())
}

fn main() -> Result<(), Box<dyn Error>> {
    let args = Args::parse();
    init_logging(&args.log_file)?;

    let settings = Settings::load(args.config.as_deref())?;
    let (server, timeout) = settings.connection(args.server.as_deref(), args.timeout_secs);

    let runtime = tokio::runtime::Runtime::new()?;
    let client = BackendClient::new(&server, timeout)?;
    tracing::info!(server = %client.base_url(), "starting dyscover");

    let mut app = App::new(
        settings,
        args.config,
        client,
        runtime.handle().clone(),
        args.shuffle,
    );
    app.run()
}
