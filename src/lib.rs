// Library module for r2sync
// Re-exports modules for use in integration tests and external crates

pub mod config;
pub mod store;
pub mod sync;
