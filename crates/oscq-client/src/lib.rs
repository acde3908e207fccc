//! OSCQuery client: discovery orchestration, the client state machine, and the
//! `oscq` command-line interface.

pub mod cli;
pub mod client;
pub mod commands;
pub mod config;
pub mod error;
pub mod query_service;

pub use cli::Cli;
pub use client::{ClientState, OscClient};
pub use config::ClientConfig;
pub use error::{ClientError, ClientResult};
pub use query_service::{OSC_JSON_SERVICE, OSC_SERVICE, QueryConfig, QueryService};
