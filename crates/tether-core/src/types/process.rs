//! Process identifiers, handles, and access rights.

use std::fmt;

use bitflags::bitflags;

/// Process identifier (PID)
///
/// A PID is a number assigned to each running process by the operating
/// system. On Windows, PIDs are 32-bit values that are always multiples of 4;
/// `0` is the System Idle Process and is never a valid attach target, so
/// [`ProcessAttachment`](crate::attachment::ProcessAttachment) uses
/// `ProcessId(0)` to mean "detached".
///
/// ## Example
///
/// ```rust
/// use tether_core::types::ProcessId;
///
/// let pid = ProcessId::from(4242);
/// assert_eq!(u32::from(pid), 4242);
/// assert!(!pid.is_none());
/// assert!(ProcessId::NONE.is_none());
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct ProcessId(pub u32);

impl ProcessId
{
    /// The identifier of a detached attachment.
    pub const NONE: ProcessId = ProcessId(0);

    /// Returns `true` for `ProcessId(0)`.
    pub const fn is_none(self) -> bool
    {
        self.0 == 0
    }
}

impl From<u32> for ProcessId
{
    fn from(pid: u32) -> Self
    {
        ProcessId(pid)
    }
}

impl From<ProcessId> for u32
{
    fn from(pid: ProcessId) -> Self
    {
        pid.0
    }
}

impl fmt::Display for ProcessId
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result
    {
        write!(f, "{}", self.0)
    }
}

/// Raw OS process handle value
///
/// This is a read-only view of a handle. It carries no ownership: the handle
/// behind it is owned by a [`ProcessHandle`](crate::handle::ProcessHandle) and
/// closed when that guard is dropped. Collaborators (memory readers, injectors)
/// receive a `RawHandle` and must not close it.
///
/// The value is pointer sized, matching the Windows `HANDLE` type. The current
/// process pseudo handle is `-1`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RawHandle(pub isize);

impl RawHandle
{
    /// The pseudo handle returned by `GetCurrentProcess()`.
    pub const CURRENT_PROCESS: RawHandle = RawHandle(-1);

    /// Get the raw value of the handle.
    pub const fn raw(self) -> isize
    {
        self.0
    }

    /// Returns `true` for the null handle.
    pub const fn is_null(self) -> bool
    {
        self.0 == 0
    }
}

impl fmt::Display for RawHandle
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result
    {
        write!(f, "0x{:x}", self.0)
    }
}

bitflags! {
    /// Access rights requested when opening a process handle
    ///
    /// The names mirror the Win32 `PROCESS_*` constants. The mask is opaque to
    /// the attachment core: it is handed to the OS unchanged, and bits without
    /// a name here are kept (see [`ProcessAccess::from_bits_retain`]).
    ///
    /// See: [Process Security and Access Rights](https://learn.microsoft.com/en-us/windows/win32/procthread/process-security-and-access-rights)
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct ProcessAccess: u32
    {
        const TERMINATE = 0x0000_0001;
        const CREATE_THREAD = 0x0000_0002;
        const SET_SESSIONID = 0x0000_0004;
        const VM_OPERATION = 0x0000_0008;
        const VM_READ = 0x0000_0010;
        const VM_WRITE = 0x0000_0020;
        const DUP_HANDLE = 0x0000_0040;
        const CREATE_PROCESS = 0x0000_0080;
        const SET_QUOTA = 0x0000_0100;
        const SET_INFORMATION = 0x0000_0200;
        const QUERY_INFORMATION = 0x0000_0400;
        const SUSPEND_RESUME = 0x0000_0800;
        const QUERY_LIMITED_INFORMATION = 0x0000_1000;
        const SET_LIMITED_INFORMATION = 0x0000_2000;
        const DELETE = 0x0001_0000;
        const READ_CONTROL = 0x0002_0000;
        const WRITE_DAC = 0x0004_0000;
        const WRITE_OWNER = 0x0008_0000;
        const SYNCHRONIZE = 0x0010_0000;

        /// `PROCESS_ALL_ACCESS` on Vista and later.
        const ALL = 0x001F_FFFF;

        /// Rights needed by the usual collaborators: query, memory access,
        /// thread creation, suspension and termination.
        const DEFAULT = Self::QUERY_INFORMATION.bits()
            | Self::VM_READ.bits()
            | Self::VM_WRITE.bits()
            | Self::VM_OPERATION.bits()
            | Self::CREATE_THREAD.bits()
            | Self::SET_QUOTA.bits()
            | Self::TERMINATE.bits()
            | Self::SUSPEND_RESUME.bits()
            | Self::DUP_HANDLE.bits();
    }
}

impl Default for ProcessAccess
{
    fn default() -> Self
    {
        ProcessAccess::DEFAULT
    }
}

impl fmt::Display for ProcessAccess
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result
    {
        write!(f, "0x{:08x}", self.bits())
    }
}
