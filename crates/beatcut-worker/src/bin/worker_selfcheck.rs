use std::path::Path;

use beatcut_media::{check_ffmpeg, check_ffprobe};
use beatcut_queue::RedisJobStore;
use beatcut_storage::R2Client;
use beatcut_worker::WorkerConfig;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    rustls::crypto::ring::default_provider()
        .install_default()
        .map_err(|_| anyhow::anyhow!("failed to install rustls crypto provider"))?;
    dotenvy::dotenv().ok();

    let config = WorkerConfig::from_env();

    println!(
        "worker-selfcheck: starting with work_dir={}",
        config.work_dir.display()
    );
    ensure_workdir(&config.work_dir).await?;
    ensure_tools(&config)?;
    ensure_env_present(&[
        "REDIS_URL",
        "R2_ENDPOINT_URL",
        "R2_ACCESS_KEY_ID",
        "R2_SECRET_ACCESS_KEY",
        "R2_BUCKET_NAME",
    ])?;

    RedisJobStore::from_env()?
        .check_connectivity()
        .await
        .map_err(|e| anyhow::anyhow!("redis not reachable: {}", e))?;
    R2Client::from_env()?
        .check_connectivity()
        .await
        .map_err(|e| anyhow::anyhow!("bucket not reachable: {}", e))?;

    println!("worker-selfcheck: ok");
    Ok(())
}

async fn ensure_workdir<P: AsRef<Path>>(path: P) -> anyhow::Result<()> {
    let path = path.as_ref();
    tokio::fs::create_dir_all(path).await?;
    let probe = path.join(".selfcheck");
    tokio::fs::write(&probe, b"ok").await?;
    tokio::fs::remove_file(&probe).await?;
    Ok(())
}

fn ensure_tools(config: &WorkerConfig) -> anyhow::Result<()> {
    let ffmpeg = check_ffmpeg(&config.media)?;
    let ffprobe = check_ffprobe(&config.media)?;
    println!(
        "worker-selfcheck: ffmpeg={} ffprobe={}",
        ffmpeg.display(),
        ffprobe.display()
    );
    Ok(())
}

fn ensure_env_present(vars: &[&str]) -> anyhow::Result<()> {
    for var in vars {
        if std::env::var(var).is_err() {
            return Err(anyhow::anyhow!("missing required env var {}", var));
        }
    }
    Ok(())
}
