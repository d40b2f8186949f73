//! Redis adapter for local deployment.
//!
//! Provides a Redis-backed `VideoRepository`:
//! - one JSON document per video
//! - a list of video ids per owner (insertion order)
//! - a set of video ids per status

mod error;
mod pool;
mod repository;

pub use error::RedisStoreError;
pub use pool::RedisPool;

pub type RedisRepository = RedisPool;

/// Redis key constants
const VIDEO_PREFIX: &str = "framezip:video:";
const OWNER_PREFIX: &str = "framezip:owner:";
const STATUS_PREFIX: &str = "framezip:status:";
