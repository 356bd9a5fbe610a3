// Library root: exposes internal modules for integration tests in `tests/`.
// Production entry point remains `src/main.rs`.

pub mod api;
pub mod error;
pub mod metrics;
pub mod monitor;
pub mod scheduler;
pub mod services;

// Startup-only modules, used by the binary.
pub mod cli;
pub mod config;
pub mod logging;
