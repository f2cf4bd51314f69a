//! Generation job worker binary.
//!
//! Reads one job payload from the file named by the first argument, or from
//! stdin when no argument (or `-`) is given, and writes the JSON job output to
//! stdout. Logs go to stderr.

use std::io::{Read, Write};

use tracing::{error, info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use avgen_media::init_frame_environment;
use avgen_storage::Publisher;
use avgen_worker::{handler, metrics, ArtifactMode, JobPipeline, WorkerConfig};

#[tokio::main]
async fn main() {
    // Load environment variables
    dotenvy::dotenv().ok();

    init_tracing();

    // Install rustls crypto provider (required for TLS/HTTPS)
    if rustls::crypto::ring::default_provider()
        .install_default()
        .is_err()
    {
        warn!("rustls crypto provider already installed");
    }

    info!("Starting avgen-worker");

    let config = WorkerConfig::from_env();
    info!("Worker config: {:?}", config);

    if config.artifact_mode == ArtifactMode::Frames {
        if let Err(e) = init_frame_environment(&config.frame_cache_dir) {
            warn!("Frame encoder environment unavailable: {}", e);
        }
    }

    let publisher = Publisher::from_env(config.upload_prefix.clone()).await;

    let output = match JobPipeline::new(config, publisher) {
        Ok(pipeline) => match read_payload() {
            Ok(payload) => handler::handle_json(&pipeline, &payload).await,
            Err(e) => {
                error!("Failed to read job payload: {}", e);
                handler::reject(format!("failed to read payload: {}", e))
            }
        },
        Err(e) => {
            error!("Failed to create job pipeline: {}", e);
            let output = e.into_output(None);
            metrics::record_job(&output, 0.0);
            output
        }
    };

    info!(outcome = output.outcome(), "Job finished");

    let mut stdout = std::io::stdout().lock();
    let written = serde_json::to_writer(&mut stdout, &output)
        .map_err(std::io::Error::from)
        .and_then(|_| writeln!(stdout));
    if let Err(e) = written {
        error!("Failed to write job output: {}", e);
        std::process::exit(1);
    }
}

fn init_tracing() {
    let use_json = std::env::var("LOG_FORMAT")
        .map(|v| v.to_lowercase() == "json")
        .unwrap_or(false);

    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("avgen=info"));

    if use_json {
        tracing_subscriber::registry()
            .with(fmt::layer().json().with_writer(std::io::stderr))
            .with(env_filter)
            .init();
    } else {
        tracing_subscriber::registry()
            .with(
                fmt::layer()
                    .with_writer(std::io::stderr)
                    .with_ansi(true)
                    .with_target(true)
                    .with_thread_ids(false)
                    .with_file(false)
                    .with_line_number(false),
            )
            .with(env_filter)
            .init();
    }
}

fn read_payload() -> std::io::Result<String> {
    match std::env::args().nth(1) {
        Some(path) if path != "-" => std::fs::read_to_string(path),
        _ => {
            let mut payload = String::new();
            std::io::stdin().read_to_string(&mut payload)?;
            Ok(payload)
        }
    }
}
