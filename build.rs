//! Build script to stamp the git commit into the `--version` string

use std::process::Command;

fn main() {
    // Source tarballs have no .git; allow the packager to pass the hash in
    let git_hash = std::env::var("SIGNWATCH_GIT_HASH").ok().unwrap_or_else(|| {
        match Command::new("git").args(["rev-parse", "--short", "HEAD"]).output() {
            Ok(output) if output.status.success() => {
                String::from_utf8_lossy(&output.stdout).trim().to_string()
            }
            _ => String::from("unknown"),
        }
    });

    println!("cargo:rustc-env=GIT_HASH={}", git_hash);

    println!("cargo:rerun-if-env-changed=SIGNWATCH_GIT_HASH");
    println!("cargo:rerun-if-changed=.git/HEAD");
}
