// src/main.rs
use std::process::ExitCode;

use anyhow::Context;
use campus_checkin::checkin::{self, Outcome};
use campus_checkin::config::Config;
use campus_checkin::confirm::Prompt;
use campus_checkin::trace::RealtimePacer;
use campus_checkin::transport::HttpTransport;
use campus_checkin::Error;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<ExitCode> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let config = match Config::from_env() {
        Ok(config) => config,
        Err(e) => {
            error!("{e}");
            return Ok(ExitCode::FAILURE);
        }
    };
    info!(ass_id = %config.ass_id, url = %config.api_url, "configuration loaded");

    let transport = HttpTransport::new(&config).context("building HTTP client")?;
    let mut prompt = Prompt::stdio();

    match checkin::run(&config, &transport, &mut prompt, RealtimePacer::new()).await {
        Ok(Outcome::Completed) => Ok(ExitCode::SUCCESS),
        Ok(Outcome::Declined(step)) => {
            info!(?step, "stopped at user request");
            Ok(ExitCode::SUCCESS)
        }
        Ok(Outcome::Interrupted) => Ok(ExitCode::SUCCESS),
        Err(e @ Error::CheckInRejected { .. }) => {
            error!("check-in failed: {e}");
            Ok(ExitCode::FAILURE)
        }
        Err(e) => {
            error!("{e}");
            if matches!(e, Error::Transport(_) | Error::Protocol(_)) {
                error!("check UTOKEN and network connectivity");
            }
            Ok(ExitCode::FAILURE)
        }
    }
}
