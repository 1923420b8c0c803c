#![cfg(not(tarpaulin_include))]

use clap::Parser;
use ophtatrack::app;
use ophtatrack::config::Settings;
use std::path::PathBuf;

/// JSON API over the patient records
#[derive(Parser, Debug)]
#[command(name = "website", version)]
struct Args {
    /// Settings file (JSON)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Patients workbook or CSV file
    #[arg(short, long)]
    data: Option<PathBuf>,

    /// Address to listen on, e.g. 0.0.0.0:8080
    #[arg(short, long)]
    bind: Option<String>,
}

/// Main entry point for the web server
///
/// Settings come from the optional config file, then `OPHTATRACK_*`
/// environment variables, then the command line.
#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let args = Args::parse();

    let mut settings = match &args.config {
        Some(path) => Settings::load(path)?,
        None => Settings::default(),
    }
    .with_env();

    if let Some(data) = args.data {
        settings.patients_path = data;
    }
    if let Some(bind) = args.bind {
        settings.bind = bind;
    }

    app::run(settings).await
}
