//! Build script for tether-core
//!
//! This script checks build requirements before compilation:
//! - Minimum Rust version (let-else and `Option::is_some_and` need Rust 1.70.0+)
//! - Target platform (only Windows has an OS backend)
//!
//! ## Requirements
//!
//! - **Rust**: 1.70.0 or newer
//! - **Windows**: any version with `IsWow64Process` (XP SP2 / Server 2003 SP1 and later)
//! - **Other targets**: build fine, but `create_attachment()` returns `UnsupportedPlatform`

fn main()
{
    println!("cargo:rerun-if-changed=build.rs");

    check_rust_version();
    check_target_os();
}

fn check_rust_version()
{
    let min_rust_version = rustc_version::Version::new(1, 70, 0);

    match rustc_version::version() {
        Ok(rustc_version) => {
            if rustc_version < min_rust_version {
                panic!("tether-core requires Rust {min_rust_version} or newer, found {rustc_version}");
            }
        }
        Err(_) => {
            // If we can't get version (e.g., in some build environments), just warn
            println!("cargo:warning=could not verify Rust version");
        }
    }
}

fn check_target_os()
{
    // Build scripts run on the host, so the target comes from cargo, not cfg!
    let target_os = std::env::var("CARGO_CFG_TARGET_OS").unwrap_or_default();
    if target_os != "windows" {
        println!(
            "cargo:warning=tether-core has no OS backend for target_os=\"{target_os}\"; only the platform-independent core is built"
        );
    }
}
