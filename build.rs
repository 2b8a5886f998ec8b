use anyhow::{anyhow, Context};
use std::env;
use std::process::Command;

fn main() -> anyhow::Result<()> {
    println!("cargo:rerun-if-changed=build.rs");
    println!("cargo:rerun-if-env-changed=RUSTC");

    // Extensions must be built by the same compiler as the host: the
    // constructor convention passes Rust types across the module boundary.
    let rustc = env::var("RUSTC").unwrap_or_else(|_| "rustc".to_string());
    let output = Command::new(&rustc)
        .arg("--version")
        .output()
        .with_context(|| format!("Failed to run {} --version", rustc))?;

    if !output.status.success() {
        return Err(anyhow!("{} --version exited with {}", rustc, output.status));
    }

    let version = String::from_utf8(output.stdout)?;
    let version = version.trim();
    if version.is_empty() {
        return Err(anyhow!("{} --version produced no output", rustc));
    }

    println!("cargo:rustc-env=TOPOPROBE_RUSTC_VERSION={}", version);
    Ok(())
}
