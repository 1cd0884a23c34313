// Library root: re-exports all modules so integration tests and the batch
// runner binary can access the crate's public API.

pub mod config;
pub mod context;
pub mod db;
pub mod engine;
pub mod model;
pub mod performance;
pub mod snapshot;
