//! CLI smoke tests. Each invocation runs the real binary against a scratch
//! data directory passed through the environment, so nothing leaks between
//! tests or into ./tmp.

use assert_cmd::Command;
use tempfile::TempDir;

fn rustcoin(dir: &TempDir, node_id: &str) -> Command {
    let mut cmd = Command::cargo_bin("rustcoin").expect("binary built");
    cmd.env("DATA_DIR", dir.path());
    cmd.env("NODE_ID", node_id);
    cmd
}

fn create_wallet(dir: &TempDir, node_id: &str) -> String {
    let output = rustcoin(dir, node_id)
        .args(["createwallet"])
        .output()
        .expect("run createwallet");
    assert!(output.status.success());
    let stdout = String::from_utf8(output.stdout).expect("utf8 stdout");
    stdout
        .lines()
        .find_map(|line| line.strip_prefix("New address: "))
        .expect("address printed")
        .trim()
        .to_string()
}

#[test]
fn createwallet_then_listaddresses() {
    let dir = TempDir::new().expect("temp dir");
    let address = create_wallet(&dir, "3801");

    rustcoin(&dir, "3801")
        .args(["listaddresses"])
        .assert()
        .success()
        .stdout(predicates::str::contains(address));
}

#[test]
fn createchain_balance_and_reindex() {
    let dir = TempDir::new().expect("temp dir");
    let address = create_wallet(&dir, "3802");

    rustcoin(&dir, "3802")
        .args(["createchain", "-a", &address])
        .assert()
        .success();

    rustcoin(&dir, "3802")
        .args(["balance", "-a", &address])
        .assert()
        .success()
        .stdout(predicates::str::contains(format!(
            "Balance of {}: 20",
            address
        )));

    rustcoin(&dir, "3802")
        .args(["reindexutxo"])
        .assert()
        .success()
        .stdout(predicates::str::contains(
            "There are 1 transactions in the UTXO set.",
        ));

    rustcoin(&dir, "3802")
        .args(["print"])
        .assert()
        .success()
        .stdout(predicates::str::contains("PoW valid: true"));
}

#[test]
fn createchain_twice_fails() {
    let dir = TempDir::new().expect("temp dir");
    let address = create_wallet(&dir, "3803");

    rustcoin(&dir, "3803")
        .args(["createchain", "-a", &address])
        .assert()
        .success();

    rustcoin(&dir, "3803")
        .args(["createchain", "-a", &address])
        .assert()
        .failure()
        .stderr(predicates::str::contains("already exists"));
}

#[test]
fn send_with_mine_updates_both_balances() {
    let dir = TempDir::new().expect("temp dir");
    let from = create_wallet(&dir, "3804");
    let to = create_wallet(&dir, "3804");

    rustcoin(&dir, "3804")
        .args(["createchain", "-a", &from])
        .assert()
        .success();

    rustcoin(&dir, "3804")
        .args(["send", "-f", &from, "-t", &to, "--amount", "7", "--mine"])
        .assert()
        .success();

    // 20 - 7 change + 20 reward for the mined block.
    rustcoin(&dir, "3804")
        .args(["balance", "-a", &from])
        .assert()
        .success()
        .stdout(predicates::str::contains(format!(
            "Balance of {}: 33",
            from
        )));

    rustcoin(&dir, "3804")
        .args(["balance", "-a", &to])
        .assert()
        .success()
        .stdout(predicates::str::contains(format!("Balance of {}: 7", to)));
}

#[test]
fn send_more_than_the_balance_fails() {
    let dir = TempDir::new().expect("temp dir");
    let from = create_wallet(&dir, "3805");
    let to = create_wallet(&dir, "3805");

    rustcoin(&dir, "3805")
        .args(["createchain", "-a", &from])
        .assert()
        .success();

    rustcoin(&dir, "3805")
        .args(["send", "-f", &from, "-t", &to, "--amount", "1000", "--mine"])
        .assert()
        .failure()
        .stderr(predicates::str::contains("Insufficient funds"));
}

#[test]
fn invalid_address_is_fatal() {
    let dir = TempDir::new().expect("temp dir");
    rustcoin(&dir, "3806")
        .args(["createchain", "-a", "not-a-real-address"])
        .assert()
        .failure()
        .stderr(predicates::str::contains("Invalid address"));
}

#[test]
fn balance_without_a_chain_fails() {
    let dir = TempDir::new().expect("temp dir");
    let address = create_wallet(&dir, "3807");

    rustcoin(&dir, "3807")
        .args(["balance", "-a", &address])
        .assert()
        .failure()
        .stderr(predicates::str::contains("No chain database"));
}

#[test]
fn startnode_without_node_id_fails() {
    let dir = TempDir::new().expect("temp dir");
    let mut cmd = Command::cargo_bin("rustcoin").expect("binary built");
    cmd.env("DATA_DIR", dir.path());
    cmd.env_remove("NODE_ID");
    cmd.args(["startnode"])
        .assert()
        .failure()
        .stderr(predicates::str::contains("NODE_ID"));
}
