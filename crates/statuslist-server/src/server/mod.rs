pub mod config;
pub mod error;
pub mod fetch;
pub mod service;
pub mod signer;
pub mod telemetry;
