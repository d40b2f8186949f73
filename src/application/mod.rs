//! Application layer - Services that use ports.

pub mod cleanup;
pub mod pipeline;
pub mod reconcile;
