//! Faucet client for funding test accounts

use std::time::Duration;

use crate::client::ChainClient;
use crate::transport::{MockTransport, Transport};
use crate::types::{AccountAddress, FaucetResponse};
use crate::RestError;

#[cfg(feature = "http")]
use crate::transport::HttpTransport;

/// Client for the faucet service of a non-production network
pub struct FaucetClient {
    transport: Box<dyn Transport>,
}

impl FaucetClient {
    /// Create a client talking HTTP to the faucet at `url`
    #[cfg(feature = "http")]
    pub fn connect(url: &str, timeout: Duration) -> Result<Self, RestError> {
        Ok(Self::with_transport(HttpTransport::new(url, timeout)?))
    }

    /// Create a client with mock transport (for testing)
    pub fn new_mock() -> (Self, MockTransport) {
        let transport = MockTransport::new();
        (Self::with_transport(transport.clone()), transport)
    }

    /// Create a client with a custom transport
    pub fn with_transport(transport: impl Transport + 'static) -> Self {
        Self {
            transport: Box::new(transport),
        }
    }

    /// Base URL of the faucet
    pub fn base_url(&self) -> &str {
        self.transport.base_url()
    }

    /// Path of the mint request for `address`
    pub fn mint_path(address: &AccountAddress, amount: u64) -> String {
        format!("/mint?amount={}&address={}", amount, address.to_hex())
    }

    /// Ask the faucet to mint `amount` octas to `address`
    ///
    /// Creates the account if it does not exist. Returns the hashes of the
    /// transactions the faucet submitted.
    pub fn fund_account(
        &self,
        address: &AccountAddress,
        amount: u64,
    ) -> Result<Vec<String>, RestError> {
        tracing::debug!(%address, amount, "requesting faucet funds");
        let response = self
            .transport
            .post(&Self::mint_path(address, amount), None)?;
        if !response.is_success() {
            return Err(response.into_error());
        }
        let hashes: FaucetResponse = response.decode()?;
        Ok(hashes.into_hashes())
    }

    /// Fund the account and wait until every faucet transaction is committed
    pub fn fund_and_wait(
        &self,
        chain: &ChainClient,
        address: &AccountAddress,
        amount: u64,
        timeout: Duration,
    ) -> Result<(), RestError> {
        for hash in self.fund_account(address, amount)? {
            chain.wait_for_transaction(&hash, timeout)?;
        }
        tracing::info!(%address, amount, "account funded");
        Ok(())
    }
}
