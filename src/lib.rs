pub mod client;
pub mod commands;
pub mod error;
pub mod output;
pub mod security;
pub mod transport;
pub mod utils;

pub use client::{Config, Delivery, Exchange, RelayClient};
pub use error::RelayError;

// Crate version exposed for runtime queries
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
