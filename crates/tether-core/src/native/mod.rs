//! # Native Query Interface
//!
//! Architecture-correct access to typed process information.
//!
//! Which structure layout and which `ntdll` entry point are correct depends on
//! the OS, on the controller, and (for the layout of pointers read back) on the
//! target. Three implementations cover every supported combination:
//!
//! | Variant             | Controller            | Entry point                          | Layout |
//! |---------------------|-----------------------|--------------------------------------|--------|
//! | [`NativeX86`]       | 32-bit on a 32-bit OS | `NtQueryInformationProcess`          | 32-bit |
//! | [`NativeX64`]       | 64-bit on a 64-bit OS | `NtQueryInformationProcess`          | 64-bit |
//! | [`NativeWow64Bridge`] | 32-bit under WOW64  | `NtWow64QueryInformationProcess64`   | 64-bit |
//!
//! Only the controller decides the variant: a 64-bit controller reads 64-bit
//! structures for 32-bit targets too, and a WOW64 controller needs the 64-bit
//! thunks to read native structures of any target. A variant is chosen once,
//! by [`select_variant`], when the attachment opens, and stored in a
//! [`NativeInterface`] for the attachment's lifetime.
//!
//! A variant reading structures of the wrong width does not fail loudly, it
//! returns garbage. That is why selection rejects combinations it does not
//! understand instead of falling back to a default.

use std::fmt;
use std::sync::Arc;

use tracing::debug;

use crate::error::{TetherError, TetherResult};
use crate::platform::Platform;
use crate::types::{ArchitectureInfo, NativeArchitecture, NtStatus, PointerWidth, RawHandle, Wow64Barrier};

pub mod layout;
mod wow64;
mod x64;
mod x86;

pub use layout::{ExtendedBasicInformation, ExtendedProcessFlags, ProcessBasicInformation};
pub use wow64::NativeWow64Bridge;
pub use x64::NativeX64;
pub use x86::NativeX86;

/// `PROCESSINFOCLASS` values used with the native query
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ProcessInfoClass
{
    /// `ProcessBasicInformation` (0), also used for the extended structure
    BasicInformation,
    /// `ProcessWow64Information` (26)
    Wow64Information,
    /// `ProcessImageFileName` (27)
    ImageFileName,
    /// `ProcessProtectionInformation` (61)
    ProtectionInformation,
    /// Any other class, by raw value
    Other(u32),
}

impl ProcessInfoClass
{
    /// Raw `PROCESSINFOCLASS` value.
    pub const fn as_raw(self) -> u32
    {
        match self {
            ProcessInfoClass::BasicInformation => 0,
            ProcessInfoClass::Wow64Information => 26,
            ProcessInfoClass::ImageFileName => 27,
            ProcessInfoClass::ProtectionInformation => 61,
            ProcessInfoClass::Other(raw) => raw,
        }
    }
}

impl From<u32> for ProcessInfoClass
{
    fn from(raw: u32) -> Self
    {
        match raw {
            0 => ProcessInfoClass::BasicInformation,
            26 => ProcessInfoClass::Wow64Information,
            27 => ProcessInfoClass::ImageFileName,
            61 => ProcessInfoClass::ProtectionInformation,
            other => ProcessInfoClass::Other(other),
        }
    }
}

impl fmt::Display for ProcessInfoClass
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result
    {
        match self {
            ProcessInfoClass::BasicInformation => write!(f, "ProcessBasicInformation"),
            ProcessInfoClass::Wow64Information => write!(f, "ProcessWow64Information"),
            ProcessInfoClass::ImageFileName => write!(f, "ProcessImageFileName"),
            ProcessInfoClass::ProtectionInformation => write!(f, "ProcessProtectionInformation"),
            ProcessInfoClass::Other(raw) => write!(f, "PROCESSINFOCLASS({raw})"),
        }
    }
}

/// Which native-query implementation an attachment uses
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NativeKind
{
    /// Direct 64-bit queries from a native 64-bit controller
    X64,
    /// Direct 32-bit queries on a 32-bit OS
    X86,
    /// 64-bit queries from a WOW64 controller through the WOW64 thunks
    Wow64Bridge,
}

impl NativeKind
{
    /// Width of the structures this variant reads.
    pub const fn pointer_width(self) -> PointerWidth
    {
        match self {
            NativeKind::X64 | NativeKind::Wow64Bridge => PointerWidth::Bits64,
            NativeKind::X86 => PointerWidth::Bits32,
        }
    }
}

impl fmt::Display for NativeKind
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result
    {
        match self {
            NativeKind::X64 => write!(f, "native-x64"),
            NativeKind::X86 => write!(f, "native-x86"),
            NativeKind::Wow64Bridge => write!(f, "wow64-bridge"),
        }
    }
}

/// Pick the native-query variant for a controller/target/OS combination
///
/// ## Selection
///
/// - 32-bit OS, 32-bit controller, target not WOW64 → [`NativeKind::X86`]
/// - 64-bit OS, 64-bit controller → [`NativeKind::X64`], whatever the target
/// - 64-bit OS, WOW64 controller → [`NativeKind::Wow64Bridge`], whatever the target
///
/// ## Errors
///
/// `UnsupportedArchitectureCombination` for everything else: unknown
/// processor architectures, WOW64 flags on a 32-bit OS, a 64-bit controller
/// on a 32-bit OS, and a 32-bit controller on a 64-bit OS that does not report
/// WOW64 (it would have no way to read a 64-bit target's structures).
///
/// ## Example
///
/// ```rust
/// use tether_core::native::{select_variant, NativeKind};
/// use tether_core::types::{ArchitectureInfo, NativeArchitecture, PointerWidth};
///
/// let wow64_controller = ArchitectureInfo {
///     native: NativeArchitecture::X64,
///     controller_wow64: true,
///     controller_width: PointerWidth::Bits32,
/// };
/// assert_eq!(select_variant(&wow64_controller, false)?, NativeKind::Wow64Bridge);
/// # Ok::<(), tether_core::error::TetherError>(())
/// ```
pub fn select_variant(arch: &ArchitectureInfo, target_wow64: bool) -> TetherResult<NativeKind>
{
    let selected = match (arch.native, arch.controller_width, arch.controller_wow64) {
        (NativeArchitecture::X86, PointerWidth::Bits32, false) if !target_wow64 => Some(NativeKind::X86),
        (NativeArchitecture::X64 | NativeArchitecture::Arm64, PointerWidth::Bits64, false) => Some(NativeKind::X64),
        (NativeArchitecture::X64 | NativeArchitecture::Arm64, PointerWidth::Bits32, true) => {
            Some(NativeKind::Wow64Bridge)
        }
        _ => None,
    };

    match selected {
        Some(kind) => {
            debug!(native = %arch.native, controller_wow64 = arch.controller_wow64, target_wow64, %kind, "selected native query variant");
            Ok(kind)
        }
        None => Err(TetherError::UnsupportedArchitectureCombination {
            native: arch.native,
            controller_wow64: arch.controller_wow64,
            controller_width: arch.controller_width,
            target_wow64,
        }),
    }
}

/// Map a raw query result onto the crate's error type.
fn query_result(class: ProcessInfoClass, result: Result<u32, NtStatus>) -> TetherResult<u32>
{
    result.map_err(|status| TetherError::QueryFailed { class, status })
}

/// Typed process-information queries against one target
///
/// Implemented by each architecture variant and by [`NativeInterface`], which
/// dispatches to the variant selected at attach time. Collaborators that need
/// further native queries (memory readers, injectors) use this trait on the
/// attachment's interface.
pub trait NativeQuery
{
    /// The variant behind this interface.
    fn kind(&self) -> NativeKind;

    /// The target's handle (read-only view).
    fn handle(&self) -> RawHandle;

    /// The WOW64 barrier between controller and target.
    fn barrier(&self) -> &Wow64Barrier;

    /// Width of the structures this interface reads and writes.
    fn pointer_width(&self) -> PointerWidth
    {
        self.kind().pointer_width()
    }

    /// Raw information query.
    ///
    /// Fills `buffer` with the structure for `class`, in
    /// [`pointer_width`](NativeQuery::pointer_width) layout, and returns the
    /// number of bytes written.
    ///
    /// ## Errors
    ///
    /// `QueryFailed` with the status returned by the OS.
    fn query_process_info(&self, class: ProcessInfoClass, buffer: &mut [u8]) -> TetherResult<u32>;

    /// Query `PROCESS_BASIC_INFORMATION`.
    ///
    /// ## Errors
    ///
    /// `QueryFailed` if the OS rejects the query.
    fn basic_information(&self) -> TetherResult<ProcessBasicInformation>
    {
        let width = self.pointer_width();
        let mut buffer = vec![0u8; layout::basic_size(width)];
        self.query_process_info(ProcessInfoClass::BasicInformation, &mut buffer)?;
        layout::decode_basic(width, &buffer)
    }

    /// Query `PROCESS_EXTENDED_BASIC_INFORMATION`.
    ///
    /// ## Errors
    ///
    /// `QueryFailed` if the OS rejects the query (Windows Vista and later
    /// support the extended structure).
    fn extended_basic_information(&self) -> TetherResult<ExtendedBasicInformation>
    {
        let width = self.pointer_width();
        let mut buffer = vec![0u8; layout::extended_size(width)];
        layout::prepare_extended(width, &mut buffer)?;
        self.query_process_info(ProcessInfoClass::BasicInformation, &mut buffer)?;
        layout::decode_extended(width, &buffer)
    }
}

/// The native-query variant owned by an attachment
///
/// A tagged union over the three implementations, selected once in
/// [`ProcessAttachment::open`](crate::attachment::ProcessAttachment::open).
#[derive(Debug)]
pub enum NativeInterface
{
    X64(NativeX64),
    X86(NativeX86),
    Wow64(NativeWow64Bridge),
}

impl NativeInterface
{
    /// Construct the variant for `kind`.
    pub fn new(kind: NativeKind, platform: Arc<dyn Platform>, handle: RawHandle, barrier: Wow64Barrier) -> Self
    {
        match kind {
            NativeKind::X64 => NativeInterface::X64(NativeX64::new(platform, handle, barrier)),
            NativeKind::X86 => NativeInterface::X86(NativeX86::new(platform, handle, barrier)),
            NativeKind::Wow64Bridge => NativeInterface::Wow64(NativeWow64Bridge::new(platform, handle, barrier)),
        }
    }

    fn inner(&self) -> &dyn NativeQuery
    {
        match self {
            NativeInterface::X64(native) => native,
            NativeInterface::X86(native) => native,
            NativeInterface::Wow64(native) => native,
        }
    }
}

impl NativeQuery for NativeInterface
{
    fn kind(&self) -> NativeKind
    {
        self.inner().kind()
    }

    fn handle(&self) -> RawHandle
    {
        self.inner().handle()
    }

    fn barrier(&self) -> &Wow64Barrier
    {
        self.inner().barrier()
    }

    fn query_process_info(&self, class: ProcessInfoClass, buffer: &mut [u8]) -> TetherResult<u32>
    {
        self.inner().query_process_info(class, buffer)
    }
}
