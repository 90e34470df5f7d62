//! ChainClient - read-only view of on-chain state

use std::thread;
use std::time::{Duration, Instant};

use crate::transport::{HttpResponse, MockTransport, Transport};
use crate::types::{
    AccountAddress, AccountData, CoinStoreResource, ModuleDescriptor, MoveModuleRecord,
    Transaction,
};
use crate::RestError;

#[cfg(feature = "http")]
use crate::transport::HttpTransport;

/// Resource type holding an account's native coin balance
pub const NATIVE_COIN_STORE: &str = "0x1::coin::CoinStore<0x1::aptos_coin::AptosCoin>";

/// Interval between polls while waiting for a transaction
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(500);

const ACCOUNT_NOT_FOUND: &str = "account_not_found";

/// Node REST client
///
/// Deliberately independent of the CLI: results read here are used to check
/// what the CLI reported.
pub struct ChainClient {
    transport: Box<dyn Transport>,
    poll_interval: Duration,
}

impl ChainClient {
    /// Create a client talking HTTP to the node at `url`
    #[cfg(feature = "http")]
    pub fn connect(url: &str, timeout: Duration) -> Result<Self, RestError> {
        Ok(Self::with_transport(HttpTransport::new(url, timeout)?))
    }

    /// Create a client with mock transport (for testing)
    pub fn new_mock() -> (Self, MockTransport) {
        let transport = MockTransport::new();
        let client = Self::with_transport(transport.clone()).with_poll_interval(Duration::ZERO);
        (client, transport)
    }

    /// Create a client with a custom transport
    pub fn with_transport(transport: impl Transport + 'static) -> Self {
        Self {
            transport: Box::new(transport),
            poll_interval: DEFAULT_POLL_INTERVAL,
        }
    }

    /// Override the transaction poll interval
    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    /// Base URL of the node
    pub fn base_url(&self) -> &str {
        self.transport.base_url()
    }

    fn get(&self, path: &str) -> Result<HttpResponse, RestError> {
        let response = self.transport.get(path)?;
        if response.is_success() {
            Ok(response)
        } else {
            Err(response.into_error())
        }
    }

    // ==================== Account Queries ====================

    /// Get the account's sequence number and authentication key
    pub fn account(&self, address: &AccountAddress) -> Result<AccountData, RestError> {
        let path = format!("/v1/accounts/{}", address);
        self.get(&path)
            .map_err(|e| not_found_as_account(e, address))?
            .decode()
    }

    /// Whether the account exists on chain
    pub fn account_exists(&self, address: &AccountAddress) -> Result<bool, RestError> {
        match self.account(address) {
            Ok(_) => Ok(true),
            Err(RestError::AccountNotFound(_)) => Ok(false),
            Err(e) => Err(e),
        }
    }

    /// Get the native coin balance in octas
    ///
    /// Fails with [`RestError::AccountNotFound`] for an address that was never
    /// created or funded. An existing account without a coin store has balance 0.
    pub fn account_balance(&self, address: &AccountAddress) -> Result<u64, RestError> {
        let path = format!("/v1/accounts/{}/resource/{}", address, NATIVE_COIN_STORE);
        match self.get(&path) {
            Ok(response) => {
                let resource: CoinStoreResource = response.decode()?;
                Ok(resource.data.coin.value)
            }
            Err(RestError::Http {
                status: 404,
                error_code,
                ..
            }) => {
                if error_code.as_deref() == Some(ACCOUNT_NOT_FOUND) {
                    return Err(RestError::AccountNotFound(*address));
                }
                // resource_not_found is ambiguous, ask for the account itself
                self.account(address)?;
                Ok(0)
            }
            Err(e) => Err(e),
        }
    }

    /// List modules published under the account
    pub fn account_modules(
        &self,
        address: &AccountAddress,
    ) -> Result<Vec<ModuleDescriptor>, RestError> {
        let path = format!("/v1/accounts/{}/modules", address);
        let records: Vec<MoveModuleRecord> = self
            .get(&path)
            .map_err(|e| not_found_as_account(e, address))?
            .decode()?;

        Ok(records.into_iter().filter_map(|record| record.abi).collect())
    }

    /// Whether a module with `name` is published under the account
    pub fn has_module(&self, address: &AccountAddress, name: &str) -> Result<bool, RestError> {
        let modules = self.account_modules(address)?;
        Ok(modules
            .iter()
            .any(|module| module.address == *address && module.name == name))
    }

    // ==================== Transactions ====================

    /// Look up a transaction, `None` while the node has not seen it
    pub fn transaction_by_hash(&self, hash: &str) -> Result<Option<Transaction>, RestError> {
        let path = format!("/v1/transactions/by_hash/{}", hash);
        match self.get(&path) {
            Ok(response) => Ok(Some(response.decode()?)),
            Err(e) if e.is_not_found() => Ok(None),
            Err(e) => Err(e),
        }
    }

    /// Poll until the transaction is committed
    ///
    /// Fails with [`RestError::TransactionFailed`] if it committed unsuccessfully
    /// and [`RestError::Timeout`] if it is still pending after `timeout`.
    pub fn wait_for_transaction(
        &self,
        hash: &str,
        timeout: Duration,
    ) -> Result<Transaction, RestError> {
        // No representable deadline means wait indefinitely
        let deadline = Instant::now().checked_add(timeout);
        loop {
            if let Some(txn) = self.transaction_by_hash(hash)? {
                if !txn.is_pending() {
                    if txn.success == Some(false) {
                        return Err(RestError::TransactionFailed {
                            hash: txn.hash,
                            vm_status: txn.vm_status.unwrap_or_default(),
                        });
                    }
                    return Ok(txn);
                }
            }

            if matches!(deadline, Some(deadline) if Instant::now() >= deadline) {
                return Err(RestError::Timeout(format!(
                    "transaction {} still pending after {:?}",
                    hash, timeout
                )));
            }
            tracing::trace!(hash, "transaction pending");
            thread::sleep(self.poll_interval);
        }
    }
}

fn not_found_as_account(e: RestError, address: &AccountAddress) -> RestError {
    match e {
        RestError::Http { status: 404, .. } => RestError::AccountNotFound(*address),
        other => other,
    }
}
