//! postwire: submit one message described by a JSON job file.
//!
//! ```text
//! postwire [job.json]
//! ```
//!
//! Without an argument the job is read from `<config dir>/postwire/job.json`.

mod job;

use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::Result;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "postwire=info,postwire_smtp=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    match run().await {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::FAILURE,
        Err(err) => {
            error!("{err:#}");
            ExitCode::FAILURE
        }
    }
}

async fn run() -> Result<bool> {
    let path = std::env::args_os()
        .nth(1)
        .map_or_else(job::default_path, PathBuf::from);
    info!("Loading job from {}", path.display());

    let job = job::load(&path).await?;
    let options = job.options();
    let message = job.message().await?;

    info!(
        host = %options.config.host,
        port = options.config.port,
        recipients = job.to.len() + job.cc.len() + job.bcc.len(),
        "Submitting message"
    );
    let status = postwire_smtp::send(&options, &message).await?;

    for line in &status.lines {
        println!("{line}");
    }
    println!("{}", status.action);
    Ok(status.is_ok)
}
