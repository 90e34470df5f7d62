//! Bundled CLI test cases
//!
//! Each case is a plain function taking the harness and its own name. The
//! suite is assembled by [`registry`] in execution order.

pub mod account;
pub mod package;

use crate::harness::TestHarness;
use crate::runner::{RegistryError, TestRegistry};

/// The bundled suite, in execution order
///
/// `test_account_create` runs before `test_account_create_is_idempotent`, which
/// repeats the same creation.
pub fn registry() -> Result<TestRegistry<TestHarness>, RegistryError> {
    TestRegistry::<TestHarness>::new()
        .with("test_account_fund_with_faucet", account::test_account_fund_with_faucet)?
        .with("test_account_create", account::test_account_create)?
        .with(
            "test_account_create_is_idempotent",
            account::test_account_create_is_idempotent,
        )?
        .with("test_account_lookup_address", account::test_account_lookup_address)?
        .with("test_move_publish", package::test_move_publish)?
        .with("test_move_compile", package::test_move_compile)?
        .with("test_move_compile_script", package::test_move_compile_script)?
        .with("test_move_compile_malformed", package::test_move_compile_malformed)
}
