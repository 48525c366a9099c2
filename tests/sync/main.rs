// Integration tests for the sync orchestrator, run against the in-memory store

mod common;

mod concurrency_tests;
mod delete_tests;
mod filter_tests;
mod upload_tests;
