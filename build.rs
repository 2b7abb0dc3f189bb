//! Build script: embed the git hash and pre-flight GPU feature flags.
//!
//! The GPU checks run before whisper-rs-sys compiles so that a missing
//! toolkit fails with a clear message instead of a wall of cmake errors.

use std::process::Command;

fn main() {
    // Embed git short hash for version string
    if let Ok(output) = Command::new("git")
        .args(["rev-parse", "--short=7", "HEAD"])
        .output()
        && output.status.success()
    {
        let hash = String::from_utf8_lossy(&output.stdout).trim().to_string();
        println!("cargo:rustc-env=GIT_HASH={}", hash);
    }
    println!("cargo:rerun-if-changed=.git/HEAD");
    println!("cargo:rerun-if-changed=.git/refs/heads/");

    if cfg!(feature = "cuda") {
        require_tool(
            "nvcc",
            &["--version"],
            "CUDA toolkit is not installed.\n\
             Install: https://developer.nvidia.com/cuda-downloads\n\
             Or build without CUDA: cargo build --release",
        );
    }
    if cfg!(feature = "vulkan") {
        require_tool(
            "vulkaninfo",
            &["--summary"],
            "Vulkan SDK is not installed.\n\
             Install: https://vulkan.lunarg.com/\n\
             Or build without Vulkan: cargo build --release",
        );
    }
    if cfg!(feature = "hipblas") {
        require_tool(
            "rocminfo",
            &[],
            "ROCm is not installed.\n\
             Install: https://rocm.docs.amd.com/\n\
             Or build without HipBLAS: cargo build --release",
        );
    }
}

/// Panic with guidance if a required build-time tool cannot be executed.
fn require_tool(tool: &str, args: &[&str], help: &str) {
    if Command::new(tool).args(args).output().is_err() {
        panic!("\n\n`{}` not found — {}\n", tool, help);
    }
    println!("cargo::warning={} detected", tool);
}
