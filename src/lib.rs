pub mod application;
pub mod cli;
pub mod config;
pub mod domain;
pub mod intake;
pub mod io;
pub mod storage;

pub use application::DebtTracker;
pub use domain::*;
pub use storage::Repository;

/// Install the global tracing subscriber. `RUST_LOG` overrides `log_level`.
pub fn init_tracing(log_level: &str) {
    use tracing_subscriber::{EnvFilter, fmt, prelude::*};

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(log_level));

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(filter)
        .init();
}
