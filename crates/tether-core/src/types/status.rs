//! # NTSTATUS Values
//!
//! Native (`ntdll`) APIs return `NTSTATUS` values: 32-bit signed integers whose
//! two high bits encode the severity: success (`00`), informational (`01`),
//! warning (`10`) and error (`11`). `NT_SUCCESS()` only accepts the first two,
//! which is the same as "non-negative".
//!
//! ## References
//!
//! - [NTSTATUS values](https://learn.microsoft.com/en-us/openspecs/windows_protocols/ms-erref/596a1078-e883-4972-9bbc-49e60bebca55)

use std::fmt;

/// An `NTSTATUS` code returned by a native API
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NtStatus(pub i32);

impl NtStatus
{
    /// `STATUS_SUCCESS` (0x00000000)
    pub const SUCCESS: NtStatus = NtStatus(0);
    /// `STATUS_NOT_IMPLEMENTED` (0xC0000002)
    pub const NOT_IMPLEMENTED: NtStatus = NtStatus(0xC000_0002_u32 as i32);
    /// `STATUS_INFO_LENGTH_MISMATCH` (0xC0000004)
    ///
    /// The buffer handed to a query does not have the size the kernel expects
    /// for the requested information class. This is what a native query
    /// returns when a structure of the wrong pointer width is passed in.
    pub const INFO_LENGTH_MISMATCH: NtStatus = NtStatus(0xC000_0004_u32 as i32);
    /// `STATUS_INVALID_HANDLE` (0xC0000008)
    pub const INVALID_HANDLE: NtStatus = NtStatus(0xC000_0008_u32 as i32);
    /// `STATUS_INVALID_PARAMETER` (0xC000000D)
    pub const INVALID_PARAMETER: NtStatus = NtStatus(0xC000_000D_u32 as i32);
    /// `STATUS_ACCESS_DENIED` (0xC0000022)
    pub const ACCESS_DENIED: NtStatus = NtStatus(0xC000_0022_u32 as i32);
    /// `STATUS_PROCEDURE_NOT_FOUND` (0xC000007A)
    ///
    /// Used when a native entry point could not be resolved at runtime.
    pub const PROCEDURE_NOT_FOUND: NtStatus = NtStatus(0xC000_007A_u32 as i32);

    /// Returns `true` for success and informational codes (`NT_SUCCESS`).
    pub const fn is_success(self) -> bool
    {
        self.0 >= 0
    }

    /// Returns `true` for error codes (severity bits `11`).
    pub const fn is_error(self) -> bool
    {
        (self.0 as u32) >> 30 == 0b11
    }

    /// The unsigned representation, as printed by debuggers.
    pub const fn code(self) -> u32
    {
        self.0 as u32
    }

    /// Convert into a `Result`, keeping the status as the error value.
    pub fn ok(self) -> Result<(), NtStatus>
    {
        if self.is_success() {
            Ok(())
        } else {
            Err(self)
        }
    }
}

impl From<i32> for NtStatus
{
    fn from(code: i32) -> Self
    {
        NtStatus(code)
    }
}

impl fmt::Display for NtStatus
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result
    {
        let name = match *self {
            NtStatus::SUCCESS => Some("STATUS_SUCCESS"),
            NtStatus::NOT_IMPLEMENTED => Some("STATUS_NOT_IMPLEMENTED"),
            NtStatus::INFO_LENGTH_MISMATCH => Some("STATUS_INFO_LENGTH_MISMATCH"),
            NtStatus::INVALID_HANDLE => Some("STATUS_INVALID_HANDLE"),
            NtStatus::INVALID_PARAMETER => Some("STATUS_INVALID_PARAMETER"),
            NtStatus::ACCESS_DENIED => Some("STATUS_ACCESS_DENIED"),
            NtStatus::PROCEDURE_NOT_FOUND => Some("STATUS_PROCEDURE_NOT_FOUND"),
            _ => None,
        };

        match name {
            Some(name) => write!(f, "{name} (0x{:08X})", self.code()),
            None => write!(f, "NTSTATUS 0x{:08X}", self.code()),
        }
    }
}
