//! # octa-rest
//!
//! Minimal read path into the chain, independent of the CLI under test.
//!
//! ## Features
//!
//! - **ChainClient**: balances, published modules and transaction status from the node REST API
//! - **FaucetClient**: funds accounts on non-production networks
//! - **Transport**: pluggable HTTP layer, with a [`MockTransport`] for tests
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use octa_rest::{AccountAddress, ChainClient, RestError};
//! use std::time::Duration;
//!
//! fn main() -> Result<(), RestError> {
//!     let client = ChainClient::connect("http://127.0.0.1:8080", Duration::from_secs(10))?;
//!     let address = AccountAddress::from_hex("0x1")?;
//!
//!     match client.account_balance(&address) {
//!         Ok(balance) => println!("balance: {} octas", balance),
//!         Err(RestError::AccountNotFound(_)) => println!("never funded"),
//!         Err(e) => return Err(e),
//!     }
//!
//!     for module in client.account_modules(&address)? {
//!         println!("{}", module.qualified_name());
//!     }
//!     Ok(())
//! }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

mod client;
mod error;
mod faucet;
mod transport;
pub mod types;

// Re-export main types
pub use client::{ChainClient, DEFAULT_POLL_INTERVAL, NATIVE_COIN_STORE};
pub use error::RestError;
pub use faucet::FaucetClient;
pub use transport::{HttpResponse, Method, MockTransport};

/// Re-export Transport trait for custom implementations
pub use transport::Transport;

#[cfg(feature = "http")]
pub use transport::HttpTransport;

pub use types::{AccountAddress, AccountData, ModuleDescriptor, Transaction};
