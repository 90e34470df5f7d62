//! `aptos move ...`

use octa_rest::types::{ModuleDescriptor, MoveModuleRecord};
use serde::de::DeserializeOwned;
use serde::Deserialize;

use crate::check;
use crate::harness::{TestHarness, CLI_NAME};
use crate::workspace::MALFORMED_PACKAGE;
use crate::{E2EError, E2EResult};

/// Module declared by the bundled package
pub const MODULE_NAME: &str = "cli_e2e_tests";

/// The CLI's JSON envelope on success
#[derive(Debug, Deserialize)]
struct CliResponse<T> {
    #[serde(rename = "Result")]
    result: T,
}

/// Published module is visible both through the CLI and through the REST API
pub fn test_move_publish(harness: &TestHarness, test_name: &str) -> E2EResult<()> {
    let primary = harness.get_account_info()?;
    let account = primary.account_address();
    let package_dir = harness.package_dir().display().to_string();

    harness.run_command(
        test_name,
        [
            CLI_NAME,
            "move",
            "publish",
            "--assume-yes",
            "--package-dir",
            package_dir.as_str(),
            "--named-addresses",
            named_address(&account).as_str(),
        ],
    )?;

    let expected = ModuleDescriptor {
        address: primary.address(),
        name: MODULE_NAME.to_string(),
    };

    let listing = harness.run_command(
        test_name,
        [
            CLI_NAME,
            "account",
            "list",
            "--account",
            account.as_str(),
            "--query",
            "modules",
        ],
    )?;
    let records: Vec<MoveModuleRecord> = parse_cli_result(&listing.stdout)?;
    check!(
        records.iter().any(|r| r.abi.as_ref() == Some(&expected)),
        "module {} published but missing from the CLI listing",
        expected.qualified_name()
    );

    let on_chain = harness.api_client().account_modules(&primary.address())?;
    check!(
        on_chain.contains(&expected),
        "module {} published but missing from the REST listing",
        expected.qualified_name()
    );
    Ok(())
}

/// Compiling the bundled package names its module
pub fn test_move_compile(harness: &TestHarness, test_name: &str) -> E2EResult<()> {
    let account = harness.get_account_info()?.account_address();
    let result = compile(
        harness,
        test_name,
        "compile",
        &harness.package_dir().display().to_string(),
        &account,
    )?;

    let qualified = format!("{}::{}", account, MODULE_NAME);
    check!(
        result.contains(&qualified),
        "compile output does not mention {}",
        qualified
    );
    Ok(())
}

/// Compiling the bundled script reports its hash
pub fn test_move_compile_script(harness: &TestHarness, test_name: &str) -> E2EResult<()> {
    let account = harness.get_account_info()?.account_address();
    let result = compile(
        harness,
        test_name,
        "compile-script",
        &harness.package_dir().display().to_string(),
        &account,
    )?;

    check!(
        result.contains("script_hash"),
        "compile-script output has no script_hash"
    );
    Ok(())
}

/// Compiling a package with a syntax error exits nonzero
pub fn test_move_compile_malformed(harness: &TestHarness, test_name: &str) -> E2EResult<()> {
    let account = harness.get_account_info()?.account_address();
    let package_dir = harness.package_dir_of(MALFORMED_PACKAGE).display().to_string();

    let result = harness.run_command_unchecked(
        test_name,
        [
            CLI_NAME,
            "move",
            "compile",
            "--package-dir",
            package_dir.as_str(),
            "--named-addresses",
            named_address(&account).as_str(),
        ],
    )?;

    check!(
        !result.success(),
        "malformed package compiled with exit code 0"
    );
    Ok(())
}

/// Run `move <subcommand>` against a package and return its stdout
fn compile(
    harness: &TestHarness,
    test_name: &str,
    subcommand: &str,
    package_dir: &str,
    account: &str,
) -> E2EResult<String> {
    let result = harness.run_command(
        test_name,
        [
            CLI_NAME,
            "move",
            subcommand,
            "--package-dir",
            package_dir,
            "--named-addresses",
            named_address(account).as_str(),
        ],
    )?;
    Ok(result.stdout)
}

fn named_address(account: &str) -> String {
    format!("addr={}", account)
}

/// Decode the `Result` field of the CLI's JSON output
///
/// Anything printed before the JSON object is skipped.
fn parse_cli_result<T: DeserializeOwned>(stdout: &str) -> E2EResult<T> {
    let start = stdout
        .find('{')
        .ok_or_else(|| E2EError::assertion("CLI printed no JSON"))?;
    let response: CliResponse<T> = serde_json::from_str(stdout[start..].trim_end())?;
    Ok(response.result)
}
