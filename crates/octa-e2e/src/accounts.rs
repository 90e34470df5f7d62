//! Test identities and the provisioner that hands them out per role
//!
//! A role (`"primary"`, `"secondary"`, ...) names a slot: asking for the same
//! role twice yields the same identity, different roles yield distinct ones.

use ed25519_dalek::SigningKey;
use octa_rest::{AccountAddress, ChainClient, FaucetClient, RestError};
use parking_lot::Mutex;
use rand::rngs::OsRng;
use serde::Deserialize;
use sha3::{Digest, Sha3_256};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;
use zeroize::Zeroizing;

/// Role of the account the CLI profile signs with
pub const PRIMARY: &str = "primary";

/// Conventional second slot for tests that need a counterparty
pub const SECONDARY: &str = "secondary";

/// Authentication key scheme byte for legacy Ed25519 accounts
const ED25519_SCHEME: u8 = 0x00;

/// Length of an Ed25519 private key seed
const PRIVATE_KEY_LENGTH: usize = 32;

/// Errors while creating or funding test identities
#[derive(Debug, thiserror::Error)]
pub enum ProvisioningError {
    /// The faucet could not fund a fresh account
    #[error("faucet funding failed for {address}: {source}")]
    Faucet {
        /// Account being funded
        address: AccountAddress,
        /// Underlying REST error
        #[source]
        source: RestError,
    },

    /// The CLI profile could not be read
    #[error("cannot load profile '{profile}' from {}: {message}", .path.display())]
    Profile {
        /// Config file path
        path: PathBuf,
        /// Profile name
        profile: String,
        /// What went wrong
        message: String,
    },

    /// Malformed private key
    #[error("invalid private key: {0}")]
    InvalidKey(String),
}

/// Test identity: address plus signing material
///
/// Immutable once created. The private key is zeroized on drop and never
/// printed by `Debug`.
#[derive(Clone)]
pub struct AccountInfo {
    address: AccountAddress,
    private_key: Zeroizing<String>,
    public_key: Option<String>,
}

impl AccountInfo {
    /// Create a fresh random Ed25519 identity
    pub fn generate() -> Self {
        Self::from_signing_key(&SigningKey::generate(&mut OsRng))
    }

    /// Create from a known private key (hex, with or without `0x`)
    pub fn from_private_key_hex(hex_key: &str) -> Result<Self, ProvisioningError> {
        let stripped = hex_key.strip_prefix("0x").unwrap_or(hex_key);
        let bytes = Zeroizing::new(
            hex::decode(stripped).map_err(|e| ProvisioningError::InvalidKey(e.to_string()))?,
        );
        if bytes.len() != PRIVATE_KEY_LENGTH {
            return Err(ProvisioningError::InvalidKey(format!(
                "expected {} bytes, got {}",
                PRIVATE_KEY_LENGTH,
                bytes.len()
            )));
        }
        let mut seed = Zeroizing::new([0u8; PRIVATE_KEY_LENGTH]);
        seed.copy_from_slice(&bytes);
        Ok(Self::from_signing_key(&SigningKey::from_bytes(&seed)))
    }

    /// Read the account a CLI profile signs with
    ///
    /// `path` is the CLI's `config.yaml`. The CLI stores the address in bare hex
    /// under `account` and keys as `0x`-prefixed hex.
    pub fn from_cli_profile(path: &Path, profile: &str) -> Result<Self, ProvisioningError> {
        let profile_err = |message: String| ProvisioningError::Profile {
            path: path.to_path_buf(),
            profile: profile.to_string(),
            message,
        };

        let content = std::fs::read_to_string(path).map_err(|e| profile_err(e.to_string()))?;
        let config: CliConfigFile =
            serde_yaml::from_str(&content).map_err(|e| profile_err(e.to_string()))?;
        let entry = config
            .profiles
            .get(profile)
            .ok_or_else(|| profile_err("profile not present".to_string()))?;

        let account = entry
            .account
            .as_deref()
            .ok_or_else(|| profile_err("no account address".to_string()))?;
        let private_key = entry
            .private_key
            .as_deref()
            .ok_or_else(|| profile_err("no private key".to_string()))?;
        let address = AccountAddress::from_hex(account).map_err(|e| profile_err(e.to_string()))?;

        Ok(Self {
            address,
            private_key: Zeroizing::new(private_key.to_string()),
            public_key: entry.public_key.clone(),
        })
    }

    fn from_signing_key(key: &SigningKey) -> Self {
        let public_key = key.verifying_key().to_bytes();
        let seed = Zeroizing::new(key.to_bytes());

        Self {
            address: derive_address(&public_key),
            private_key: Zeroizing::new(format!("0x{}", hex::encode(&seed[..]))),
            public_key: Some(format!("0x{}", hex::encode(public_key))),
        }
    }

    /// Account address
    pub fn address(&self) -> AccountAddress {
        self.address
    }

    /// Address in the bare-hex form the CLI takes
    pub fn account_address(&self) -> String {
        self.address.to_hex()
    }

    /// Private key, `0x`-prefixed hex
    pub fn private_key(&self) -> &str {
        &self.private_key
    }

    /// Public key, `0x`-prefixed hex, when known
    pub fn public_key(&self) -> Option<&str> {
        self.public_key.as_deref()
    }
}

impl std::fmt::Debug for AccountInfo {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AccountInfo")
            .field("address", &self.address.to_hex_literal())
            .field("public_key", &self.public_key)
            .finish_non_exhaustive()
    }
}

/// Authentication key of an Ed25519 public key: `sha3_256(pubkey || 0x00)`
///
/// For an account that never rotated its key this is also the address, which
/// is what the CLI's `init` writes to its profile.
pub fn derive_address(public_key: &[u8; 32]) -> AccountAddress {
    let mut hasher = Sha3_256::new();
    hasher.update(public_key);
    hasher.update([ED25519_SCHEME]);
    AccountAddress::new(hasher.finalize().into())
}

#[derive(Debug, Deserialize)]
struct CliConfigFile {
    #[serde(default)]
    profiles: HashMap<String, CliProfile>,
}

#[derive(Debug, Deserialize)]
struct CliProfile {
    private_key: Option<String>,
    public_key: Option<String>,
    account: Option<String>,
}

/// Fixed identities with hardcoded keys, identical on every run
pub mod well_known {
    use super::{AccountInfo, ProvisioningError};

    /// Role under which the first well-known account is registered
    pub const OTHER_ACCOUNT_ONE: &str = "other_account_one";

    /// Private key of the first well-known account
    pub const OTHER_ACCOUNT_ONE_KEY: &str =
        "0x37368b46ce665362562c6d1d4ec01a08c8644c488690df5a17e13ba163e20221";

    /// Address of the first well-known account
    pub const OTHER_ACCOUNT_ONE_ADDRESS: &str =
        "585fc9f0f0c54183b039ffc770ca282ebd87307916c215a3e692f2f8e4305e82";

    /// Public key of the first well-known account
    pub const OTHER_ACCOUNT_ONE_PUBLIC_KEY: &str =
        "0x25caf00522e4d4664ec0a27166a69e8a32b5078959d0fc398da70d40d2893e8f";

    /// The first well-known account
    pub fn other_account_one() -> Result<AccountInfo, ProvisioningError> {
        AccountInfo::from_private_key_hex(OTHER_ACCOUNT_ONE_KEY)
    }

    /// Every well-known account with its role
    pub fn all() -> Result<Vec<(&'static str, AccountInfo)>, ProvisioningError> {
        Ok(vec![(OTHER_ACCOUNT_ONE, other_account_one()?)])
    }
}

/// Something that can put funds into a fresh account
pub trait Funder: Send + Sync {
    /// Fund `address` with `amount` octas and return once the funds are visible
    fn fund(&self, address: &AccountAddress, amount: u64) -> Result<(), RestError>;
}

/// [`Funder`] backed by the network faucet
pub struct FaucetFunder {
    faucet: FaucetClient,
    chain: ChainClient,
    wait_timeout: Duration,
}

impl FaucetFunder {
    /// Create a funder; `chain` is used to wait for the faucet's transactions
    pub fn new(faucet: FaucetClient, chain: ChainClient, wait_timeout: Duration) -> Self {
        Self {
            faucet,
            chain,
            wait_timeout,
        }
    }
}

impl Funder for FaucetFunder {
    fn fund(&self, address: &AccountAddress, amount: u64) -> Result<(), RestError> {
        self.faucet
            .fund_and_wait(&self.chain, address, amount, self.wait_timeout)
    }
}

/// Hands out one identity per role, funding fresh ones through a [`Funder`]
pub struct AccountProvisioner {
    funder: Box<dyn Funder>,
    fund_amount: u64,
    slots: Mutex<HashMap<String, AccountInfo>>,
}

impl AccountProvisioner {
    /// Create a provisioner funding new accounts with `fund_amount` octas
    pub fn new(funder: impl Funder + 'static, fund_amount: u64) -> Self {
        Self {
            funder: Box::new(funder),
            fund_amount,
            slots: Mutex::new(HashMap::new()),
        }
    }

    /// Amount new accounts are funded with
    pub fn fund_amount(&self) -> u64 {
        self.fund_amount
    }

    /// Install a known identity for `role` without funding it
    ///
    /// Returns the identity previously held by the role, if any.
    pub fn register(&self, role: &str, info: AccountInfo) -> Option<AccountInfo> {
        tracing::debug!(role, address = %info.address(), "registering account");
        self.slots.lock().insert(role.to_string(), info)
    }

    /// Identity held by `role`, if one was created or registered
    pub fn get(&self, role: &str) -> Option<AccountInfo> {
        self.slots.lock().get(role).cloned()
    }

    /// Identity for `role`, generating and funding one on first use
    ///
    /// If funding fails the role stays empty, so a later call starts over.
    pub fn get_or_create_account(&self, role: &str) -> Result<AccountInfo, ProvisioningError> {
        if let Some(existing) = self.get(role) {
            return Ok(existing);
        }

        let info = AccountInfo::generate();
        self.funder
            .fund(&info.address(), self.fund_amount)
            .map_err(|source| ProvisioningError::Faucet {
                address: info.address(),
                source,
            })?;
        tracing::info!(role, address = %info.address(), "provisioned funded account");

        Ok(self.insert_if_absent(role, info))
    }

    /// Identity for `role`, generating one on first use without funding it
    ///
    /// The address does not exist on chain until something creates it.
    pub fn get_or_create_unfunded_account(&self, role: &str) -> AccountInfo {
        if let Some(existing) = self.get(role) {
            return existing;
        }
        let info = AccountInfo::generate();
        tracing::info!(role, address = %info.address(), "provisioned unfunded account");
        self.insert_if_absent(role, info)
    }

    /// Roles currently holding an identity, sorted
    pub fn roles(&self) -> Vec<String> {
        let mut roles: Vec<String> = self.slots.lock().keys().cloned().collect();
        roles.sort();
        roles
    }

    fn insert_if_absent(&self, role: &str, info: AccountInfo) -> AccountInfo {
        self.slots
            .lock()
            .entry(role.to_string())
            .or_insert(info)
            .clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    #[derive(Clone, Default)]
    struct CountingFunder {
        calls: Arc<AtomicUsize>,
        fail: bool,
    }

    impl Funder for CountingFunder {
        fn fund(&self, _address: &AccountAddress, _amount: u64) -> Result<(), RestError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.fail {
                Err(RestError::Transport("connection refused".to_string()))
            } else {
                Ok(())
            }
        }
    }

    #[test]
    fn test_well_known_account_is_reproducible() {
        let first = well_known::other_account_one().unwrap();
        let second = well_known::other_account_one().unwrap();

        assert_eq!(first.account_address(), well_known::OTHER_ACCOUNT_ONE_ADDRESS);
        assert_eq!(first.address(), second.address());
        assert_eq!(first.private_key(), well_known::OTHER_ACCOUNT_ONE_KEY);
        assert_eq!(
            first.public_key(),
            Some(well_known::OTHER_ACCOUNT_ONE_PUBLIC_KEY)
        );
    }

    #[test]
    fn test_address_derivation_from_fixed_seed() {
        let info = AccountInfo::from_private_key_hex(
            "0000000000000000000000000000000000000000000000000000000000000001",
        )
        .unwrap();
        assert_eq!(
            info.public_key().unwrap(),
            "0x4cb5abf6ad79fbf5abbccafcc269d85cd2651ed4b885b5869f241aedf0a5ba29"
        );
        assert_eq!(
            info.account_address(),
            "f90391c81027f03cdea491ed8b36ffaced26b6df208a9b569e5baf2590eb9b16"
        );
    }

    #[test]
    fn test_generated_account_matches_its_key() {
        let generated = AccountInfo::generate();
        let reloaded = AccountInfo::from_private_key_hex(generated.private_key()).unwrap();
        assert_eq!(generated.address(), reloaded.address());
        assert_eq!(generated.public_key(), reloaded.public_key());
        assert_ne!(generated.address(), AccountInfo::generate().address());
    }

    #[test]
    fn test_invalid_private_key() {
        assert!(matches!(
            AccountInfo::from_private_key_hex("0xnothex"),
            Err(ProvisioningError::InvalidKey(_))
        ));
        assert!(matches!(
            AccountInfo::from_private_key_hex(&"00".repeat(31)),
            Err(ProvisioningError::InvalidKey(_))
        ));
        assert!(matches!(
            AccountInfo::from_private_key_hex(&"00".repeat(33)),
            Err(ProvisioningError::InvalidKey(_))
        ));
    }

    #[test]
    fn test_debug_redacts_private_key() {
        let info = well_known::other_account_one().unwrap();
        let debug = format!("{:?}", info);
        assert!(debug.contains(well_known::OTHER_ACCOUNT_ONE_ADDRESS));
        assert!(!debug.contains("37368b46"));
    }

    #[test]
    fn test_same_role_same_identity() {
        let funder = CountingFunder::default();
        let provisioner = AccountProvisioner::new(funder.clone(), 1_000);

        let a = provisioner.get_or_create_account(PRIMARY).unwrap();
        let b = provisioner.get_or_create_account(PRIMARY).unwrap();
        let c = provisioner.get_or_create_account(SECONDARY).unwrap();

        assert_eq!(a.address(), b.address());
        assert_ne!(a.address(), c.address());
        assert_eq!(funder.calls.load(Ordering::SeqCst), 2);
        assert_eq!(provisioner.roles(), vec![PRIMARY.to_string(), SECONDARY.to_string()]);
    }

    #[test]
    fn test_faucet_failure_leaves_slot_empty() {
        let funder = CountingFunder {
            fail: true,
            ..Default::default()
        };
        let provisioner = AccountProvisioner::new(funder.clone(), 1_000);

        let err = provisioner.get_or_create_account(PRIMARY).unwrap_err();
        assert!(matches!(err, ProvisioningError::Faucet { .. }));
        assert!(provisioner.get(PRIMARY).is_none());

        // A retry goes back to the faucet
        assert!(provisioner.get_or_create_account(PRIMARY).is_err());
        assert_eq!(funder.calls.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_unfunded_account_skips_faucet() {
        let funder = CountingFunder::default();
        let provisioner = AccountProvisioner::new(funder.clone(), 1_000);

        let a = provisioner.get_or_create_unfunded_account("target");
        let b = provisioner.get_or_create_unfunded_account("target");
        assert_eq!(a.address(), b.address());
        assert_eq!(funder.calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_registered_account_is_not_funded() {
        let funder = CountingFunder::default();
        let provisioner = AccountProvisioner::new(funder.clone(), 1_000);
        let known = well_known::other_account_one().unwrap();

        assert!(provisioner
            .register(well_known::OTHER_ACCOUNT_ONE, known.clone())
            .is_none());
        let got = provisioner
            .get_or_create_account(well_known::OTHER_ACCOUNT_ONE)
            .unwrap();
        assert_eq!(got.address(), known.address());
        assert_eq!(funder.calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_from_cli_profile() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.yaml");
        std::fs::write(
            &path,
            r#"---
profiles:
  default:
    private_key: "0x37368b46ce665362562c6d1d4ec01a08c8644c488690df5a17e13ba163e20221"
    public_key: "0x25caf00522e4d4664ec0a27166a69e8a32b5078959d0fc398da70d40d2893e8f"
    account: 585fc9f0f0c54183b039ffc770ca282ebd87307916c215a3e692f2f8e4305e82
    rest_url: "http://127.0.0.1:8080"
    faucet_url: "http://127.0.0.1:8081"
"#,
        )
        .unwrap();

        let info = AccountInfo::from_cli_profile(&path, "default").unwrap();
        assert_eq!(
            info.account_address(),
            "585fc9f0f0c54183b039ffc770ca282ebd87307916c215a3e692f2f8e4305e82"
        );
        assert_eq!(
            info.public_key(),
            Some("0x25caf00522e4d4664ec0a27166a69e8a32b5078959d0fc398da70d40d2893e8f")
        );

        // The profile the CLI wrote and the key it holds name the same account
        let derived = AccountInfo::from_private_key_hex(info.private_key()).unwrap();
        assert_eq!(derived.address(), info.address());
        assert_eq!(derived.public_key(), info.public_key());

        assert!(matches!(
            AccountInfo::from_cli_profile(&path, "missing"),
            Err(ProvisioningError::Profile { .. })
        ));
    }

    #[test]
    fn test_from_cli_profile_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let result = AccountInfo::from_cli_profile(&dir.path().join("nope.yaml"), "default");
        assert!(matches!(result, Err(ProvisioningError::Profile { .. })));
    }
}
