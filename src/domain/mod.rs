//! Domain layer - Pure business logic.

pub mod archive;
pub mod frames;
pub mod validation;
pub mod video;
pub mod workspace;
