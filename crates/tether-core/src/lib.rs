//! # tether-core
//!
//! Process attachment and architecture-correct native queries for Tether.
//!
//! This crate attaches a controller process to a target process and picks the
//! right way to read the target's native structures, whichever of these it is
//! running on:
//! - a native 32-bit OS
//! - a native 64-bit OS (x64 or ARM64), with a 64-bit or a WOW64 target
//! - a 64-bit OS with the controller itself running under WOW64
//!
//! On top of that it derives two security properties of the target: whether
//! DEP is enabled and whether it is a protected process.
//!
//! ## Platform Support
//!
//! - **Windows**: `OpenProcess`, `IsWow64Process`, `GetNativeSystemInfo` and
//!   the `ntdll` information queries
//! - **Everything else**: the core builds and runs against any
//!   [`Platform`](platform::Platform) implementation, but there is no OS
//!   backend
//!
//! ## Why unsafe code is needed
//!
//! The Windows backend calls the Win32 and `ntdll` APIs directly, and two of
//! the `ntdll` entry points are only reachable through function pointers
//! looked up at runtime. Those calls are wrapped in the safe
//! [`Platform`](platform::Platform) trait; nothing else in the crate is
//! `unsafe`.

#![allow(unsafe_code)] // Required for the Win32 / ntdll FFI in platform::win32

pub mod attachment;
pub mod error;
pub mod handle;
pub mod imports;
pub mod native;
pub mod platform;
pub mod prelude;
pub mod probe;
pub mod types;

// Re-export commonly used types
pub use attachment::ProcessAttachment;
pub use error::{TetherError, TetherResult};
pub use imports::DynamicImports;
pub use native::{NativeInterface, NativeKind, NativeQuery};
#[cfg(windows)]
pub use platform::win32::Win32Platform;
pub use platform::{create_attachment, Platform};
pub use types::{ProcessAccess, ProcessId, RawHandle};
