//! REST API types

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

use crate::RestError;

/// Length of an account address in bytes
pub const ADDRESS_LENGTH: usize = 32;

/// On-chain account address
///
/// Parsed from hex with or without the `0x` prefix. Short forms such as `0x1`
/// are left-padded with zeros.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct AccountAddress([u8; ADDRESS_LENGTH]);

impl AccountAddress {
    /// The zero address
    pub const ZERO: Self = Self([0u8; ADDRESS_LENGTH]);

    /// Create from raw bytes
    pub const fn new(bytes: [u8; ADDRESS_LENGTH]) -> Self {
        Self(bytes)
    }

    /// Parse from a hex string
    pub fn from_hex(s: &str) -> Result<Self, RestError> {
        let hex_part = s.strip_prefix("0x").unwrap_or(s);
        if hex_part.is_empty() || hex_part.len() > ADDRESS_LENGTH * 2 {
            return Err(RestError::InvalidAddress(s.to_string()));
        }

        let padded = format!("{:0>width$}", hex_part, width = ADDRESS_LENGTH * 2);
        let bytes = hex::decode(padded)?;
        let mut out = [0u8; ADDRESS_LENGTH];
        out.copy_from_slice(&bytes);
        Ok(Self(out))
    }

    /// Raw bytes
    pub fn as_bytes(&self) -> &[u8; ADDRESS_LENGTH] {
        &self.0
    }

    /// Full-length hex without prefix, the form the CLI takes for `--account`
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    /// Full-length hex with `0x` prefix, the form the REST API returns
    pub fn to_hex_literal(&self) -> String {
        format!("0x{}", self.to_hex())
    }
}

impl fmt::Display for AccountAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex_literal())
    }
}

impl fmt::Debug for AccountAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "AccountAddress({})", self.to_hex_literal())
    }
}

impl FromStr for AccountAddress {
    type Err = RestError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_hex(s)
    }
}

impl Serialize for AccountAddress {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_hex_literal())
    }
}

impl<'de> Deserialize<'de> for AccountAddress {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Self::from_hex(&s).map_err(serde::de::Error::custom)
    }
}

/// `GET /v1/accounts/{address}`
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct AccountData {
    /// Number of transactions sent by the account
    #[serde(deserialize_with = "u64_from_str_or_num")]
    pub sequence_number: u64,
    /// Authentication key, hex
    pub authentication_key: String,
}

/// Identity of a published module
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModuleDescriptor {
    /// Publishing account
    pub address: AccountAddress,
    /// Module name as declared in source
    pub name: String,
}

impl ModuleDescriptor {
    /// Fully-qualified `<address>::<name>` identifier
    pub fn qualified_name(&self) -> String {
        format!("{}::{}", self.address, self.name)
    }
}

/// One record of `GET /v1/accounts/{address}/modules`
#[derive(Debug, Clone, Deserialize)]
pub struct MoveModuleRecord {
    /// Module bytecode, hex
    #[serde(default)]
    pub bytecode: String,
    /// Decoded ABI, absent when the node could not decode the module
    #[serde(default)]
    pub abi: Option<ModuleDescriptor>,
}

#[derive(Debug, Clone, Deserialize)]
pub(crate) struct CoinStoreResource {
    pub data: CoinStoreData,
}

#[derive(Debug, Clone, Deserialize)]
pub(crate) struct CoinStoreData {
    pub coin: Coin,
}

#[derive(Debug, Clone, Deserialize)]
pub(crate) struct Coin {
    #[serde(deserialize_with = "u64_from_str_or_num")]
    pub value: u64,
}

/// Transaction as returned by `GET /v1/transactions/by_hash/{hash}`
#[derive(Debug, Clone, Deserialize)]
pub struct Transaction {
    /// `pending_transaction`, `user_transaction`, ...
    #[serde(rename = "type")]
    pub kind: String,
    /// Transaction hash
    pub hash: String,
    /// Execution success, absent while pending
    #[serde(default)]
    pub success: Option<bool>,
    /// VM status string, absent while pending
    #[serde(default)]
    pub vm_status: Option<String>,
}

impl Transaction {
    /// Whether the transaction is still waiting to be committed
    pub fn is_pending(&self) -> bool {
        self.kind == "pending_transaction"
    }
}

/// Error body returned by the node on non-success responses
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ApiErrorBody {
    /// Human-readable message
    #[serde(default)]
    pub message: String,
    /// Machine-readable code such as `account_not_found`
    #[serde(default)]
    pub error_code: Option<String>,
}

/// Faucet `/mint` returns a bare array of hashes, `/fund` wraps them
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub(crate) enum FaucetResponse {
    Hashes(Vec<String>),
    Wrapped { txn_hashes: Vec<String> },
}

impl FaucetResponse {
    pub fn into_hashes(self) -> Vec<String> {
        match self {
            FaucetResponse::Hashes(hashes) => hashes,
            FaucetResponse::Wrapped { txn_hashes } => txn_hashes,
        }
    }
}

/// The API encodes u64 values as decimal strings
fn u64_from_str_or_num<'de, D: Deserializer<'de>>(deserializer: D) -> Result<u64, D::Error> {
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum StrOrNum {
        Str(String),
        Num(u64),
    }

    match StrOrNum::deserialize(deserializer)? {
        StrOrNum::Str(s) => s.parse().map_err(serde::de::Error::custom),
        StrOrNum::Num(n) => Ok(n),
    }
}
