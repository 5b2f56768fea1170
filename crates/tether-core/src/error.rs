//! # Error Types
//!
//! General error handling for the attachment core.
//!
//! We use `thiserror` to automatically generate `Error` trait implementations
//! and nice error messages.
//!
//! Only a handful of operations can fail. Several operations that could be
//! thought of as failures are deliberately *not* errors: attaching to our own
//! process, closing twice, and asking a detached attachment whether its target
//! is protected all degrade to safe defaults instead.

use std::io;

use thiserror::Error;

use crate::native::ProcessInfoClass;
use crate::types::{NativeArchitecture, NtStatus, PointerWidth, ProcessId};

/// Main error type for attachment operations
///
/// ## Error Categories
///
/// 1. **Attach errors**: AttachFailed, TargetArchitectureUnknown, UnsupportedArchitectureCombination
/// 2. **Query errors**: QueryFailed, BufferTooSmall, NotAttached
/// 3. **Platform errors**: UnsupportedPlatform
/// 4. **I/O errors**: Io
#[derive(Error, Debug)]
pub enum TetherError
{
    /// The OS refused to hand out a process handle
    ///
    /// This happens when:
    /// - The caller lacks the requested access rights (`ERROR_ACCESS_DENIED`, 5)
    /// - The PID does not exist (`ERROR_INVALID_PARAMETER`, 87)
    /// - The target exited between enumeration and attach
    ///
    /// The OS error code is kept verbatim in `source`; use
    /// [`io::Error::raw_os_error`] to get at it.
    #[error("Failed to attach to process {pid}: {source}")]
    AttachFailed
    {
        /// The process we tried to open
        pid: ProcessId,
        /// The OS error, code preserved
        #[source]
        source: io::Error,
    },

    /// The target's bitness could not be determined
    ///
    /// `IsWow64Process` failed on the freshly opened handle, usually because
    /// it was opened without `QUERY_INFORMATION` or
    /// `QUERY_LIMITED_INFORMATION`. The handle is released.
    #[error("Failed to determine the architecture of process {pid}: {source}")]
    TargetArchitectureUnknown
    {
        /// The process that was opened
        pid: ProcessId,
        /// The OS error, code preserved
        #[source]
        source: io::Error,
    },

    /// The controller/target/OS bitness combination has no native-query variant
    ///
    /// Raised instead of guessing a structure layout, since a variant reading
    /// structures of the wrong width returns garbage rather than failing.
    /// Covers unknown processor architectures and combinations that can not
    /// occur on a healthy system (for example a 32-bit controller on a 64-bit
    /// OS that does not report WOW64).
    #[error(
        "Unsupported architecture combination: {native} OS, {controller_width} controller \
         (wow64: {controller_wow64}), target wow64: {target_wow64}"
    )]
    UnsupportedArchitectureCombination
    {
        native: NativeArchitecture,
        controller_wow64: bool,
        controller_width: PointerWidth,
        target_wow64: bool,
    },

    /// A native information query returned an error status
    ///
    /// The status is surfaced as returned by the OS; nothing is retried.
    #[error("Query for {class} failed: {status}")]
    QueryFailed
    {
        /// Information class that was queried
        class: ProcessInfoClass,
        /// Status returned by the native API
        status: NtStatus,
    },

    /// A structure could not be decoded because the buffer is too short
    #[error("Buffer too small: need {needed} bytes, got {actual}")]
    BufferTooSmall
    {
        needed: usize,
        actual: usize,
    },

    /// Operation requires an active attachment
    ///
    /// ## Solution
    ///
    /// Call `open(pid, access)` before performing typed queries.
    #[error("Not attached to a process")]
    NotAttached,

    /// No OS backend exists for the platform this was built for
    #[error("Process attachment is not supported on {0}")]
    UnsupportedPlatform(&'static str),

    /// I/O error
    #[error("IO error: {0}")]
    Io(#[from] io::Error),
}

impl TetherError
{
    /// The raw OS error code of an `AttachFailed` or `TargetArchitectureUnknown` error.
    pub fn raw_os_error(&self) -> Option<i32>
    {
        match self {
            TetherError::AttachFailed { source, .. } | TetherError::TargetArchitectureUnknown { source, .. } => {
                source.raw_os_error()
            }
            TetherError::Io(err) => err.raw_os_error(),
            _ => None,
        }
    }
}

/// Convenience type alias for `Result<T, TetherError>`
///
/// ```rust
/// use tether_core::error::TetherResult;
/// fn foo() -> TetherResult<()>
/// {
///     Ok(())
/// }
/// ```
pub type TetherResult<T> = std::result::Result<T, TetherError>;
