pub mod cli;
pub mod config;
pub mod error;
pub mod extension;
pub mod graph;
pub mod probe;
pub mod probes;

pub use error::{Result, TopoprobeError};

pub const VERSION: &str = env!("CARGO_PKG_VERSION");
