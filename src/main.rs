//! Local server binary.
//!
//! Wires up:
//! - filesystem bucket for archives
//! - Redis records when `REDIS_URL` is set, in-memory records otherwise
//! - ffmpeg and zip run as subprocesses

use framezip::adapters::local::{FsStore, InMemoryRepository};
use framezip::server::{self, BoxError};
use tracing::{info, warn};

#[tokio::main]
async fn main() -> Result<(), BoxError> {
    let config = server::bootstrap();

    tokio::fs::create_dir_all(&config.storage_dir).await?;
    let store = FsStore::new(config.storage_dir.clone());

    match config.redis_url.clone() {
        #[cfg(feature = "local")]
        Some(url) => {
            use framezip::adapters::local::redis::RedisRepository;

            let repo = RedisRepository::new(&url)?;
            repo.ping().await?;
            info!("using redis for video records");
            let result = server::run(&config, repo.clone(), store).await;
            repo.close();
            result
        }
        #[cfg(not(feature = "local"))]
        Some(_) => {
            warn!("REDIS_URL is set but the `local` feature is disabled");
            server::run(&config, InMemoryRepository::new(), store).await
        }
        None => {
            warn!("REDIS_URL not set, video records will not survive a restart");
            server::run(&config, InMemoryRepository::new(), store).await
        }
    }
}
