//! Ports - Trait definitions the application layer depends on.

pub mod auth;
pub mod command;
pub mod repository;
pub mod storage;
