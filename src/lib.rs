//! Framezip - turns uploaded MP4 videos into zip archives of still frames.
//!
//! Hexagonal Architecture:
//! - domain/: Pure business logic (video status, validation, frames, archive)
//! - ports/: Trait definitions
//! - adapters/: Concrete implementations
//! - application/: Pipeline, cleanup pool and crash reconciliation
//! - config: Environment configuration
//!
//! # Features
//! - `local`: Redis-backed records for single-server deployment
//! - `aws`: S3 archives and DynamoDB records
//! - `full`: All features

pub mod adapters;
pub mod application;
pub mod config;
pub mod domain;
pub mod ports;
pub mod server;

#[cfg(feature = "aws")]
pub use config::AwsConfig;

pub use config::AppConfig;
