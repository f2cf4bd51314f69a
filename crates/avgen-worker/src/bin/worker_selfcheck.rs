use std::path::Path;

use avgen_media::{init_frame_environment, Workspace};
use avgen_storage::{R2Client, R2Config};
use avgen_worker::{ArtifactMode, WorkerConfig};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let _ = rustls::crypto::ring::default_provider().install_default();

    let config = WorkerConfig::from_env();

    println!(
        "worker-selfcheck: starting with scratch_root={}",
        config.scratch_root.display()
    );
    ensure_scratch_root(&config.scratch_root).await?;
    ensure_generator(&config)?;
    if config.artifact_mode == ArtifactMode::Frames {
        ensure_frame_environment(&config.frame_cache_dir)?;
    }
    report_store().await?;

    println!("worker-selfcheck: ok");
    Ok(())
}

async fn ensure_scratch_root(path: &Path) -> anyhow::Result<()> {
    let workspace = Workspace::allocate(path)
        .await
        .map_err(|e| anyhow::anyhow!("scratch root not writable: {}", e))?;
    workspace.release().await?;
    Ok(())
}

fn ensure_generator(config: &WorkerConfig) -> anyhow::Result<()> {
    let path = config
        .generator
        .resolve()
        .map_err(|e| anyhow::anyhow!("generator not available: {}", e))?;
    println!("worker-selfcheck: generator at {}", path.display());
    Ok(())
}

fn ensure_frame_environment(cache_dir: &Path) -> anyhow::Result<()> {
    let env = init_frame_environment(cache_dir)
        .map_err(|e| anyhow::anyhow!("frame encoder not available: {}", e))?;
    println!("worker-selfcheck: ffmpeg at {}", env.ffmpeg.display());
    Ok(())
}

async fn report_store() -> anyhow::Result<()> {
    let config = match R2Config::from_env() {
        Ok(config) => config,
        Err(e) => {
            println!("worker-selfcheck: object store not configured ({}), uploads will be skipped", e);
            return Ok(());
        }
    };

    let client = R2Client::new(config).await?;
    client
        .check_connectivity()
        .await
        .map_err(|e| anyhow::anyhow!("object store unreachable: {}", e))?;
    println!("worker-selfcheck: object store bucket {} reachable", client.bucket());
    Ok(())
}
