//! # Platform Backends
//!
//! The attachment core never calls the OS directly. Everything it needs from
//! the kernel goes through the [`Platform`] trait, and each OS backend
//! implements it with that OS's native APIs:
//!
//! - **Windows**: `OpenProcess`, `IsWow64Process`, `GetNativeSystemInfo` and
//!   the `ntdll` information queries (see [`win32`])
//!
//! Tests implement `Platform` with an in-memory fake, which lets the selection
//! policy, the lifecycle and the structure decoding run on any host.
//!
//! ## Thread Safety
//!
//! Backends are shared between an attachment and its native-query variant
//! through `Arc<dyn Platform>`, so they must be `Send + Sync`. They hold no
//! per-attachment state.

use std::io;
use std::sync::Arc;

use crate::attachment::ProcessAttachment;
use crate::error::TetherResult;
use crate::imports::DynamicImports;
use crate::native::ProcessInfoClass;
use crate::types::{NativeArchitecture, NtStatus, PointerWidth, ProcessAccess, ProcessId, RawHandle};

#[cfg(windows)]
pub mod win32;

/// The OS surface used by the attachment core
///
/// Each method maps onto one OS call. Methods are synchronous and may block
/// briefly inside the kernel; none of them retry.
pub trait Platform: Send + Sync
{
    /// Identifier of the calling (controller) process.
    fn current_process_id(&self) -> ProcessId;

    /// Pseudo handle for the calling process.
    ///
    /// Always valid, needs no access check and must never be closed.
    fn current_process(&self) -> RawHandle;

    /// Open a handle to another process.
    ///
    /// ## Errors
    ///
    /// The OS error, with its code intact (`raw_os_error()`).
    fn open_process(&self, pid: ProcessId, access: ProcessAccess) -> io::Result<RawHandle>;

    /// Close a handle returned by [`Platform::open_process`].
    fn close_handle(&self, handle: RawHandle) -> io::Result<()>;

    /// Native processor architecture of the OS.
    fn native_architecture(&self) -> NativeArchitecture;

    /// Pointer width of the controller.
    ///
    /// The width this crate was compiled for; only test backends that stand
    /// in for a different controller override it.
    fn controller_width(&self) -> PointerWidth
    {
        PointerWidth::current()
    }

    /// Whether the process behind `handle` runs under WOW64.
    fn is_wow64_process(&self, handle: RawHandle) -> io::Result<bool>;

    /// `NtQueryInformationProcess` in the controller's own bitness.
    ///
    /// Fills `buffer` and returns the number of bytes written.
    fn query_information_process(
        &self,
        handle: RawHandle,
        class: ProcessInfoClass,
        buffer: &mut [u8],
    ) -> Result<u32, NtStatus>;

    /// `NtWow64QueryInformationProcess64`: query 64-bit structures from a
    /// WOW64 controller.
    ///
    /// Only meaningful when the controller runs under WOW64. Backends that
    /// can not provide the thunk return [`NtStatus::PROCEDURE_NOT_FOUND`].
    fn wow64_query_information_process64(
        &self,
        handle: RawHandle,
        class: ProcessInfoClass,
        buffer: &mut [u8],
    ) -> Result<u32, NtStatus>;
}

/// Get the OS backend for the platform this was built for
///
/// ## Platform Support
///
/// - ✅ Windows: Returns `Win32Platform`
/// - ❌ Everything else: `UnsupportedPlatform`
pub fn default_platform() -> TetherResult<Arc<dyn Platform>>
{
    #[cfg(windows)]
    {
        Ok(Arc::new(win32::Win32Platform::new()))
    }

    #[cfg(not(windows))]
    {
        Err(crate::error::TetherError::UnsupportedPlatform(std::env::consts::OS))
    }
}

/// Resolve the optional OS entry points for the platform this was built for
///
/// On Windows this looks up `GetProcessDEPPolicy` once per process. Elsewhere
/// no entry points exist and the result is empty.
pub fn default_imports() -> DynamicImports
{
    #[cfg(windows)]
    {
        win32::resolve_dynamic_imports()
    }

    #[cfg(not(windows))]
    {
        DynamicImports::none()
    }
}

/// Create a detached attachment wired to the real OS backend
///
/// This is the main entry point for creating an attachment. It picks the
/// backend for the current platform and resolves the optional entry points.
///
/// ## Example
///
/// ```rust,no_run
/// use tether_core::platform::create_attachment;
/// use tether_core::types::{ProcessAccess, ProcessId};
///
/// let mut attachment = create_attachment()?;
/// attachment.open(ProcessId::from(4242), ProcessAccess::DEFAULT)?;
/// println!("protected: {}", attachment.is_protected());
/// # Ok::<(), tether_core::error::TetherError>(())
/// ```
pub fn create_attachment() -> TetherResult<ProcessAttachment>
{
    let platform = default_platform()?;
    Ok(ProcessAttachment::new(platform, default_imports()))
}
