//! Command-line interface definition.

use std::net::SocketAddr;
use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};
use oscq_core::Argument;

use crate::error::{ClientError, ClientResult};

/// oscq - talk OSC to a discovered OSCQuery peer
#[derive(Debug, Parser)]
#[command(name = "oscq")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Path to configuration file
    #[arg(long, short, env = "OSCQ_CONFIG")]
    pub config: Option<PathBuf>,

    /// Enable debug output
    #[arg(long, short = 'v')]
    pub debug: bool,

    // --- Connection flags ---
    /// Peer OSC endpoint; skips discovery
    #[arg(long, requires = "receive")]
    pub send: Option<SocketAddr>,

    /// Local OSC endpoint to listen on when --send is given
    #[arg(long, requires = "send")]
    pub receive: Option<SocketAddr>,

    /// Seconds to wait for a peer before giving up (0 waits forever)
    #[arg(long, default_value = "30")]
    pub timeout: u64,

    #[command(subcommand)]
    pub command: Command,
}

impl Cli {
    /// Fixed endpoints, if both were given.
    pub fn direct_endpoints(&self) -> Option<(SocketAddr, SocketAddr)> {
        self.send.zip(self.receive)
    }
}

/// Available commands.
#[derive(Debug, Subcommand)]
pub enum Command {
    /// Print messages, parameter changes, and avatar parameters until Ctrl-C
    Listen,

    /// Send a chatbox message
    Chat {
        text: String,

        /// Open the keyboard instead of sending immediately
        #[arg(long)]
        no_bypass_keyboard: bool,

        /// Play the notification sound
        #[arg(long)]
        notify: bool,
    },

    /// Set an avatar parameter
    Param {
        /// Parameter name without the `/avatar/parameters/` prefix
        name: String,

        value: String,

        /// How to interpret the value
        #[arg(long, value_enum, default_value_t = ValueKind::Float)]
        kind: ValueKind,
    },

    /// Print the current avatar's parameters
    Parameters,

    /// Configuration commands
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

/// Configuration actions.
#[derive(Debug, Subcommand)]
pub enum ConfigAction {
    /// Dump current configuration
    Dump,

    /// Validate configuration
    Validate,

    /// Show configuration file path
    Path,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ValueKind {
    Bool,
    Int,
    Float,
    String,
}

impl ValueKind {
    /// Parses `raw` as this kind.
    pub fn parse(self, raw: &str) -> ClientResult<Argument> {
        let invalid = || ClientError::InvalidArgument(format!("{:?} is not a valid {:?}", raw, self));
        match self {
            Self::Bool => match raw.to_ascii_lowercase().as_str() {
                "true" | "1" | "on" => Ok(Argument::Bool(true)),
                "false" | "0" | "off" => Ok(Argument::Bool(false)),
                _ => Err(invalid()),
            },
            Self::Int => raw.parse().map(Argument::Int).map_err(|_| invalid()),
            Self::Float => raw.parse().map(Argument::Float).map_err(|_| invalid()),
            Self::String => Ok(Argument::String(raw.to_string())),
        }
    }
}
