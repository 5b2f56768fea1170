//! # Architecture Types
//!
//! Three binary worlds can coexist on a Windows machine:
//!
//! - a native 32-bit OS running 32-bit processes,
//! - a native 64-bit OS running 64-bit processes,
//! - a 64-bit OS running 32-bit processes under WOW64.
//!
//! Process information structures change width between these worlds, and the
//! controller itself may be a WOW64 process. The types here describe which
//! world the OS, the controller, and the target belong to.
//!
//! See: [WOW64 Implementation Details](https://learn.microsoft.com/en-us/windows/win32/winprog64/wow64-implementation-details)

use std::fmt;

/// Processor architecture of the operating system
///
/// This is the *native* architecture as reported by `GetNativeSystemInfo()`,
/// not the architecture the controller was compiled for. A 32-bit controller
/// running under WOW64 still sees `X64` here.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NativeArchitecture
{
    /// `PROCESSOR_ARCHITECTURE_INTEL` (0): 32-bit x86 OS
    X86,
    /// `PROCESSOR_ARCHITECTURE_AMD64` (9): 64-bit x86 OS
    X64,
    /// `PROCESSOR_ARCHITECTURE_ARM64` (12): 64-bit ARM OS
    ///
    /// 32-bit x86 processes run under WOW64 here too, so it behaves like
    /// `X64` for variant selection.
    Arm64,
    /// Any other `wProcessorArchitecture` value
    ///
    /// The raw value is preserved for diagnostics. Unknown architectures are
    /// rejected by variant selection rather than guessed at.
    Unknown(u16),
}

impl NativeArchitecture
{
    /// `PROCESSOR_ARCHITECTURE_INTEL`
    pub const PROCESSOR_ARCHITECTURE_INTEL: u16 = 0;
    /// `PROCESSOR_ARCHITECTURE_AMD64`
    pub const PROCESSOR_ARCHITECTURE_AMD64: u16 = 9;
    /// `PROCESSOR_ARCHITECTURE_ARM64`
    pub const PROCESSOR_ARCHITECTURE_ARM64: u16 = 12;

    /// Map a raw `wProcessorArchitecture` value.
    ///
    /// ```rust
    /// use tether_core::types::NativeArchitecture;
    ///
    /// assert_eq!(NativeArchitecture::from_raw(9), NativeArchitecture::X64);
    /// assert_eq!(NativeArchitecture::from_raw(6), NativeArchitecture::Unknown(6));
    /// ```
    pub const fn from_raw(value: u16) -> Self
    {
        match value {
            Self::PROCESSOR_ARCHITECTURE_INTEL => NativeArchitecture::X86,
            Self::PROCESSOR_ARCHITECTURE_AMD64 => NativeArchitecture::X64,
            Self::PROCESSOR_ARCHITECTURE_ARM64 => NativeArchitecture::Arm64,
            other => NativeArchitecture::Unknown(other),
        }
    }

    /// Returns `true` if the OS kernel is 64-bit.
    pub const fn is_64bit(self) -> bool
    {
        matches!(self, NativeArchitecture::X64 | NativeArchitecture::Arm64)
    }
}

impl fmt::Display for NativeArchitecture
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result
    {
        match self {
            NativeArchitecture::X86 => write!(f, "x86"),
            NativeArchitecture::X64 => write!(f, "x64"),
            NativeArchitecture::Arm64 => write!(f, "arm64"),
            NativeArchitecture::Unknown(raw) => write!(f, "unknown({raw})"),
        }
    }
}

/// Pointer width of a binary or of a structure layout
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PointerWidth
{
    /// 4-byte pointers
    Bits32,
    /// 8-byte pointers
    Bits64,
}

impl PointerWidth
{
    /// Pointer width of the running controller binary.
    ///
    /// Decided at compile time: a 32-bit build is `Bits32` even when it runs
    /// under WOW64 on a 64-bit OS.
    pub const fn current() -> Self
    {
        #[cfg(target_pointer_width = "64")]
        {
            PointerWidth::Bits64
        }

        #[cfg(not(target_pointer_width = "64"))]
        {
            PointerWidth::Bits32
        }
    }

    /// Size of a pointer in bytes.
    pub const fn bytes(self) -> usize
    {
        match self {
            PointerWidth::Bits32 => 4,
            PointerWidth::Bits64 => 8,
        }
    }
}

impl fmt::Display for PointerWidth
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result
    {
        match self {
            PointerWidth::Bits32 => write!(f, "32-bit"),
            PointerWidth::Bits64 => write!(f, "64-bit"),
        }
    }
}

/// Result of the architecture probe
///
/// Describes the OS and the controller. The target is probed separately once
/// a handle to it exists (see [`crate::probe::is_target_wow64`]).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ArchitectureInfo
{
    /// Native processor architecture of the OS.
    pub native: NativeArchitecture,
    /// Whether the controller runs under WOW64.
    pub controller_wow64: bool,
    /// Pointer width the controller was compiled for.
    pub controller_width: PointerWidth,
}

impl ArchitectureInfo
{
    /// Returns `true` if the OS is 64-bit.
    pub const fn native_is_x64(&self) -> bool
    {
        self.native.is_64bit()
    }
}

/// Where the WOW64 boundary lies between the controller and the target
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BarrierKind
{
    /// 32-bit OS: both sides are native 32-bit
    Native32,
    /// 64-bit OS: both sides are native 64-bit
    Native64,
    /// 64-bit OS: both sides run under WOW64
    Wow64ToWow64,
    /// 64-bit OS: WOW64 controller, native 64-bit target
    Wow64ToNative64,
    /// 64-bit OS: native 64-bit controller, WOW64 target
    Native64ToWow64,
}

/// The WOW64 barrier between controller and target
///
/// Collaborators use this to decide how to talk to the target: a `mismatch`
/// means controller and target pointer widths differ, so pointers read out of
/// the target can not be used directly by the controller.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Wow64Barrier
{
    pub kind: BarrierKind,
    pub controller_wow64: bool,
    pub target_wow64: bool,
    pub x86_os: bool,
    pub mismatch: bool,
}

impl Wow64Barrier
{
    /// Compute the barrier from the probe results.
    ///
    /// On a 32-bit OS nothing runs under WOW64, so both flags are reported as
    /// `false` regardless of input.
    pub fn new(arch: &ArchitectureInfo, target_wow64: bool) -> Self
    {
        if !arch.native_is_x64() {
            return Self {
                kind: BarrierKind::Native32,
                controller_wow64: false,
                target_wow64: false,
                x86_os: true,
                mismatch: false,
            };
        }

        let controller_wow64 = arch.controller_wow64;
        let kind = match (controller_wow64, target_wow64) {
            (false, false) => BarrierKind::Native64,
            (true, true) => BarrierKind::Wow64ToWow64,
            (true, false) => BarrierKind::Wow64ToNative64,
            (false, true) => BarrierKind::Native64ToWow64,
        };

        Self {
            kind,
            controller_wow64,
            target_wow64,
            x86_os: false,
            mismatch: controller_wow64 != target_wow64,
        }
    }

    /// Pointer width of the target process.
    pub const fn target_width(&self) -> PointerWidth
    {
        if self.x86_os || self.target_wow64 {
            PointerWidth::Bits32
        } else {
            PointerWidth::Bits64
        }
    }
}
