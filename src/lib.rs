// Library surface shared by the binary and the headless integration tests.
pub mod app;
pub mod app_dirs;
pub mod config;
pub mod connectivity;
pub mod countdown;
pub mod difficulty;
pub mod error;
pub mod exercise;
pub mod export;
pub mod loader;
pub mod logging;
pub mod metrics;
pub mod provider;
pub mod record;
pub mod remote;
pub mod runtime;
pub mod sampler;
pub mod session;
pub mod store;
pub mod sync;
pub mod timer;
pub mod ui;
pub mod util;
