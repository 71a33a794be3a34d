pub mod app;
pub mod config;
pub mod constants;
pub mod errors;
pub mod graph;
pub mod managers;
pub mod mcp;
pub mod services;
#[cfg(test)]
pub(crate) mod testutil;
pub mod utils;
