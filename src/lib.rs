// Library exports for jobtrail crate
// This allows tests and the binary to use the modules

pub mod config;
pub mod error;
pub mod fixture_store;
pub mod gmail_client;
pub mod identity;
pub mod pipeline;
pub mod report;
pub mod store;
pub mod trigger;

// Classification and statistics core
pub mod analysis;
