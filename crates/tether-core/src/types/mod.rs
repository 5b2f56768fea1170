//! # Types
//!
//! Platform-agnostic types used throughout the attachment core.
//!
//! These types keep Win32 details (`HANDLE`, `NTSTATUS`, `SYSTEM_INFO`) out of
//! the public API, so the selection and lifecycle logic can run, and be tested,
//! without a Windows machine.

pub mod arch;
pub mod process;
pub mod status;

// Re-export all public types
pub use arch::{ArchitectureInfo, BarrierKind, NativeArchitecture, PointerWidth, Wow64Barrier};
pub use process::{ProcessAccess, ProcessId, RawHandle};
pub use status::NtStatus;
