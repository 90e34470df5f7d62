//! `aptos account ...`

use octa_rest::RestError;

use crate::accounts::{well_known, AccountInfo};
use crate::check;
use crate::harness::{TestHarness, CLI_NAME};
use crate::{E2EError, E2EResult};

/// Amount requested from the faucet through the CLI
pub const FAUCET_AMOUNT: u64 = 100_000_000_000;

/// Fresh account funded through the CLI must hold exactly the requested amount
pub fn test_account_fund_with_faucet(harness: &TestHarness, test_name: &str) -> E2EResult<()> {
    let account = harness.unfunded_account(test_name);
    let address = account.address();

    match harness.api_client().account_balance(&address) {
        Err(RestError::AccountNotFound(_)) => {}
        Ok(balance) => {
            return Err(E2EError::assertion(format!(
                "account {} exists before funding with balance {}",
                address, balance
            )))
        }
        Err(e) => return Err(e.into()),
    }

    harness.run_command(
        test_name,
        [
            CLI_NAME.to_string(),
            "account".to_string(),
            "fund-with-faucet".to_string(),
            "--account".to_string(),
            account.account_address(),
            "--amount".to_string(),
            FAUCET_AMOUNT.to_string(),
        ],
    )?;

    let balance = harness.api_client().account_balance(&address)?;
    check!(
        balance == FAUCET_AMOUNT,
        "account {} has balance {}, expected {}",
        address,
        balance,
        FAUCET_AMOUNT
    );
    Ok(())
}

/// Creating the well-known account leaves it on chain with zero balance
pub fn test_account_create(harness: &TestHarness, test_name: &str) -> E2EResult<()> {
    let other = other_account_one(harness)?;
    create_account(harness, test_name, &other)?;

    let balance = harness.api_client().account_balance(&other.address())?;
    check!(
        balance == 0,
        "account {} has balance {}, expected 0",
        other.address(),
        balance
    );
    Ok(())
}

/// Creating an existing account again fails with a message or does nothing
pub fn test_account_create_is_idempotent(harness: &TestHarness, test_name: &str) -> E2EResult<()> {
    let other = other_account_one(harness)?;
    let address = other.address();

    if !harness.api_client().account_exists(&address)? {
        create_account(harness, test_name, &other)?;
    }
    let before = harness.api_client().account_balance(&address)?;

    let repeat = harness.run_command_unchecked(test_name, create_argv(&other))?;
    if !repeat.success() {
        check!(
            !(repeat.stderr.trim().is_empty() && repeat.stdout.trim().is_empty()),
            "repeated create exited with {} without explaining why",
            repeat.exit_code
        );
    }

    let after = harness.api_client().account_balance(&address)?;
    check!(
        after == before,
        "balance of {} changed from {} to {} after repeated create",
        address,
        before,
        after
    );
    Ok(())
}

/// A fresh account's authentication key resolves to its own address
pub fn test_account_lookup_address(harness: &TestHarness, test_name: &str) -> E2EResult<()> {
    let primary = harness.get_account_info()?;
    let address = primary.account_address();

    let result = harness.run_command(
        test_name,
        [
            CLI_NAME,
            "account",
            "lookup-address",
            "--auth-key",
            address.as_str(),
        ],
    )?;

    check!(
        result.stdout.contains(&address),
        "lookup-address output does not mention {}",
        address
    );
    Ok(())
}

fn other_account_one(harness: &TestHarness) -> E2EResult<AccountInfo> {
    match harness.provisioner().get(well_known::OTHER_ACCOUNT_ONE) {
        Some(info) => Ok(info),
        None => Ok(well_known::other_account_one()?),
    }
}

fn create_argv(account: &AccountInfo) -> Vec<String> {
    vec![
        CLI_NAME.to_string(),
        "account".to_string(),
        "create".to_string(),
        "--account".to_string(),
        account.account_address(),
        "--assume-yes".to_string(),
    ]
}

fn create_account(harness: &TestHarness, test_name: &str, account: &AccountInfo) -> E2EResult<()> {
    harness.run_command(test_name, create_argv(account))?;
    Ok(())
}
