//! # Process Information Layouts
//!
//! Byte layouts of the two structures the core reads through
//! `NtQueryInformationProcess(ProcessBasicInformation)`, in both pointer widths.
//!
//! ```c
//! typedef struct _PROCESS_BASIC_INFORMATION {
//!     NTSTATUS  ExitStatus;                   // padded to pointer size
//!     PPEB      PebBaseAddress;
//!     ULONG_PTR AffinityMask;
//!     KPRIORITY BasePriority;                 // padded to pointer size
//!     ULONG_PTR UniqueProcessId;
//!     ULONG_PTR InheritedFromUniqueProcessId;
//! } PROCESS_BASIC_INFORMATION;
//!
//! typedef struct _PROCESS_EXTENDED_BASIC_INFORMATION {
//!     SIZE_T Size;                            // set by the caller
//!     PROCESS_BASIC_INFORMATION BasicInfo;
//!     ULONG Flags;                            // padded to pointer size
//! } PROCESS_EXTENDED_BASIC_INFORMATION;
//! ```
//!
//! Every field occupies one pointer-sized slot, so the basic structure is six
//! slots (24 / 48 bytes) and the extended one eight slots (32 / 64 bytes). The
//! kernel tells the two apart by buffer length, and the extended request must
//! carry its own size in `Size` or the call fails with
//! `STATUS_INFO_LENGTH_MISMATCH`.
//!
//! All values are little endian.

use bitflags::bitflags;

use crate::error::{TetherError, TetherResult};
use crate::types::{NtStatus, PointerWidth};

const BASIC_SLOTS: usize = 6;
const EXTENDED_SLOTS: usize = 8;

bitflags! {
    /// `PROCESS_EXTENDED_BASIC_INFORMATION::Flags`
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct ExtendedProcessFlags: u32
    {
        const IS_PROTECTED_PROCESS = 1 << 0;
        const IS_WOW64_PROCESS = 1 << 1;
        const IS_PROCESS_DELETING = 1 << 2;
        const IS_CROSS_SESSION_CREATE = 1 << 3;
        const IS_FROZEN = 1 << 4;
        const IS_BACKGROUND = 1 << 5;
        const IS_STRONGLY_NAMED = 1 << 6;
        const IS_SECURE_PROCESS = 1 << 7;
        const IS_SUBSYSTEM_PROCESS = 1 << 8;
    }
}

/// `PROCESS_BASIC_INFORMATION`, widened to 64-bit fields
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProcessBasicInformation
{
    /// Exit status, `STATUS_PENDING` (0x103) while the process is running
    pub exit_status: NtStatus,
    /// Address of the PEB in the target's address space
    pub peb_base_address: u64,
    pub affinity_mask: u64,
    pub base_priority: i32,
    pub unique_process_id: u64,
    /// Parent process id
    pub inherited_from_unique_process_id: u64,
}

/// `PROCESS_EXTENDED_BASIC_INFORMATION`, widened to 64-bit fields
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExtendedBasicInformation
{
    pub basic: ProcessBasicInformation,
    pub flags: ExtendedProcessFlags,
}

impl ExtendedBasicInformation
{
    /// Returns `true` if the OS marks the process as protected.
    pub const fn is_protected(&self) -> bool
    {
        self.flags.contains(ExtendedProcessFlags::IS_PROTECTED_PROCESS)
    }
}

/// Size of `PROCESS_BASIC_INFORMATION` in the given width.
pub const fn basic_size(width: PointerWidth) -> usize
{
    BASIC_SLOTS * width.bytes()
}

/// Size of `PROCESS_EXTENDED_BASIC_INFORMATION` in the given width.
pub const fn extended_size(width: PointerWidth) -> usize
{
    EXTENDED_SLOTS * width.bytes()
}

fn ensure_len(bytes: &[u8], needed: usize) -> TetherResult<()>
{
    if bytes.len() < needed {
        return Err(TetherError::BufferTooSmall {
            needed,
            actual: bytes.len(),
        });
    }
    Ok(())
}

fn read_u32(bytes: &[u8], offset: usize) -> u32
{
    let mut raw = [0u8; 4];
    raw.copy_from_slice(&bytes[offset..offset + 4]);
    u32::from_le_bytes(raw)
}

fn read_slot(bytes: &[u8], slot: usize, width: PointerWidth) -> u64
{
    let offset = slot * width.bytes();
    match width {
        PointerWidth::Bits32 => u64::from(read_u32(bytes, offset)),
        PointerWidth::Bits64 => {
            let mut raw = [0u8; 8];
            raw.copy_from_slice(&bytes[offset..offset + 8]);
            u64::from_le_bytes(raw)
        }
    }
}

fn write_slot(bytes: &mut [u8], slot: usize, width: PointerWidth, value: u64)
{
    let offset = slot * width.bytes();
    match width {
        // Truncation is the layout: 32-bit slots hold 32-bit values
        PointerWidth::Bits32 => bytes[offset..offset + 4].copy_from_slice(&(value as u32).to_le_bytes()),
        PointerWidth::Bits64 => bytes[offset..offset + 8].copy_from_slice(&value.to_le_bytes()),
    }
}

fn decode_basic_at(bytes: &[u8], first: usize, width: PointerWidth) -> ProcessBasicInformation
{
    let slot = |i: usize| read_slot(bytes, first + i, width);
    let low = |i: usize| read_u32(bytes, (first + i) * width.bytes());

    ProcessBasicInformation {
        exit_status: NtStatus(low(0) as i32),
        peb_base_address: slot(1),
        affinity_mask: slot(2),
        base_priority: low(3) as i32,
        unique_process_id: slot(4),
        inherited_from_unique_process_id: slot(5),
    }
}

fn encode_basic_at(bytes: &mut [u8], first: usize, width: PointerWidth, info: &ProcessBasicInformation)
{
    // The two 32-bit fields are written zero-extended so their padding is zero
    write_slot(bytes, first, width, u64::from(info.exit_status.code()));
    write_slot(bytes, first + 1, width, info.peb_base_address);
    write_slot(bytes, first + 2, width, info.affinity_mask);
    write_slot(bytes, first + 3, width, u64::from(info.base_priority as u32));
    write_slot(bytes, first + 4, width, info.unique_process_id);
    write_slot(bytes, first + 5, width, info.inherited_from_unique_process_id);
}

/// Decode `PROCESS_BASIC_INFORMATION`.
///
/// ## Errors
///
/// `BufferTooSmall` if `bytes` is shorter than [`basic_size`].
pub fn decode_basic(width: PointerWidth, bytes: &[u8]) -> TetherResult<ProcessBasicInformation>
{
    ensure_len(bytes, basic_size(width))?;
    Ok(decode_basic_at(bytes, 0, width))
}

/// Encode `PROCESS_BASIC_INFORMATION`, as the kernel would fill it in.
///
/// ## Errors
///
/// `BufferTooSmall` if `bytes` is shorter than [`basic_size`].
pub fn encode_basic(width: PointerWidth, info: &ProcessBasicInformation, bytes: &mut [u8]) -> TetherResult<()>
{
    ensure_len(bytes, basic_size(width))?;
    encode_basic_at(bytes, 0, width, info);
    Ok(())
}

/// Zero an extended request buffer and stamp its `Size` field.
///
/// ## Errors
///
/// `BufferTooSmall` if `bytes` is shorter than [`extended_size`].
pub fn prepare_extended(width: PointerWidth, bytes: &mut [u8]) -> TetherResult<()>
{
    let size = extended_size(width);
    ensure_len(bytes, size)?;
    bytes.fill(0);
    write_slot(bytes, 0, width, size as u64);
    Ok(())
}

/// Read the `Size` field of an extended request buffer.
///
/// ## Errors
///
/// `BufferTooSmall` if `bytes` can not hold the field.
pub fn extended_request_size(width: PointerWidth, bytes: &[u8]) -> TetherResult<u64>
{
    ensure_len(bytes, width.bytes())?;
    Ok(read_slot(bytes, 0, width))
}

/// Decode `PROCESS_EXTENDED_BASIC_INFORMATION`.
///
/// ## Errors
///
/// `BufferTooSmall` if `bytes` is shorter than [`extended_size`].
pub fn decode_extended(width: PointerWidth, bytes: &[u8]) -> TetherResult<ExtendedBasicInformation>
{
    ensure_len(bytes, extended_size(width))?;

    let flags = read_u32(bytes, (1 + BASIC_SLOTS) * width.bytes());
    Ok(ExtendedBasicInformation {
        basic: decode_basic_at(bytes, 1, width),
        flags: ExtendedProcessFlags::from_bits_retain(flags),
    })
}

/// Encode `PROCESS_EXTENDED_BASIC_INFORMATION`, including its `Size` field.
///
/// ## Errors
///
/// `BufferTooSmall` if `bytes` is shorter than [`extended_size`].
pub fn encode_extended(width: PointerWidth, info: &ExtendedBasicInformation, bytes: &mut [u8]) -> TetherResult<()>
{
    prepare_extended(width, bytes)?;
    encode_basic_at(bytes, 1, width, &info.basic);
    write_slot(bytes, 1 + BASIC_SLOTS, width, u64::from(info.flags.bits()));
    Ok(())
}
