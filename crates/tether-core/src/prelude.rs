//! Common module for library exports

pub use crate::attachment::ProcessAttachment;
pub use crate::error::{TetherError, TetherResult};
pub use crate::imports::{DepFlags, DepPolicy, DepPolicyQuery, DynamicImports};
pub use crate::native::{ExtendedProcessFlags, NativeInterface, NativeKind, NativeQuery, ProcessInfoClass};
pub use crate::platform::{create_attachment, default_platform, Platform};
pub use crate::types::{
    ArchitectureInfo, BarrierKind, NativeArchitecture, NtStatus, PointerWidth, ProcessAccess, ProcessId, RawHandle, Wow64Barrier,
};
