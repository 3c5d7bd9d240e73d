//! Smoke test that the match-runner binary builds cleanly against the
//! current workspace crates.

use std::process::Command;

#[test]
fn cli_compiles_without_warnings() {
    let status = Command::new(env!("CARGO"))
        .current_dir(env!("CARGO_MANIFEST_DIR"))
        .args(["check", "--quiet", "--bin", "blastgrid"])
        .status()
        .expect("failed to invoke cargo check for the blastgrid binary");

    assert!(status.success(), "cargo check --bin blastgrid should succeed");
}
