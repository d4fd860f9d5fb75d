use std::process::Command;

// Short commit hash for `slotwise --version`; "unknown" outside a git checkout.
fn main() {
    let sha = Command::new("git")
        .args(["rev-parse", "--short", "HEAD"])
        .output()
        .ok()
        .filter(|out| out.status.success())
        .and_then(|out| String::from_utf8(out.stdout).ok())
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .unwrap_or_else(|| "unknown".to_string());

    println!("cargo:rustc-env=SLOTWISE_BUILD_SHA={sha}");
    println!("cargo:rerun-if-changed=../.git/HEAD");
}
