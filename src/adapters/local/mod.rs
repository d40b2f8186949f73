//! Local adapters for single-server deployment.

pub mod fs;
pub mod memory;
pub mod process;

#[cfg(feature = "local")]
pub mod redis;

pub use fs::FsStore;
pub use memory::InMemoryRepository;
pub use process::TokioCommandRunner;
