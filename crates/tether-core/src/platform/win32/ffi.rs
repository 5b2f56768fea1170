//! # Dynamically Resolved Entry Points
//!
//! `ntdll` exports the information queries the native-query variants need, but
//! they are not part of the documented Win32 surface, and
//! `NtWow64QueryInformationProcess64` only exists in the WOW64 `ntdll`.
//! `GetProcessDEPPolicy` is missing on older systems. All three are looked up
//! by name, once per process, and cached.
//!
//! A lookup that fails is cached as `None` and reported by the caller as an
//! absent capability or [`NtStatus::PROCEDURE_NOT_FOUND`].

use std::ffi::c_void;

use ::windows::core::{s, w, PCSTR, PCWSTR};
use ::windows::Win32::Foundation::{BOOL, HANDLE};
use ::windows::Win32::System::LibraryLoader::{GetModuleHandleW, GetProcAddress};
use once_cell::sync::OnceCell;

use crate::types::NtStatus;

/// `NtQueryInformationProcess` / `NtWow64QueryInformationProcess64`
pub type QueryInformationProcessFn = unsafe extern "system" fn(
    process: HANDLE,
    class: u32,
    buffer: *mut c_void,
    length: u32,
    return_length: *mut u32,
) -> i32;

/// `GetProcessDEPPolicy`
pub type GetProcessDepPolicyFn = unsafe extern "system" fn(process: HANDLE, flags: *mut u32, permanent: *mut BOOL) -> BOOL;

static NT_QUERY_INFORMATION_PROCESS: OnceCell<Option<QueryInformationProcessFn>> = OnceCell::new();
static NT_WOW64_QUERY_INFORMATION_PROCESS64: OnceCell<Option<QueryInformationProcessFn>> = OnceCell::new();
static GET_PROCESS_DEP_POLICY: OnceCell<Option<GetProcessDepPolicyFn>> = OnceCell::new();

/// Look up `name` in an already loaded module.
///
/// ## Safety
///
/// `F` must be the function pointer type matching the export's real signature.
unsafe fn resolve<F: Copy>(module: PCWSTR, name: PCSTR) -> Option<F>
{
    debug_assert_eq!(std::mem::size_of::<F>(), std::mem::size_of::<usize>());

    let module = unsafe { GetModuleHandleW(module) }.ok()?;
    let address = unsafe { GetProcAddress(module, name) }?;
    // SAFETY: both are plain function pointers; the caller vouches for the signature
    Some(unsafe { std::mem::transmute_copy::<_, F>(&address) })
}

pub fn nt_query_information_process() -> Result<QueryInformationProcessFn, NtStatus>
{
    let function = *NT_QUERY_INFORMATION_PROCESS.get_or_init(|| unsafe { resolve(w!("ntdll.dll"), s!("NtQueryInformationProcess")) });
    function.ok_or(NtStatus::PROCEDURE_NOT_FOUND)
}

pub fn nt_wow64_query_information_process64() -> Result<QueryInformationProcessFn, NtStatus>
{
    let function = *NT_WOW64_QUERY_INFORMATION_PROCESS64
        .get_or_init(|| unsafe { resolve(w!("ntdll.dll"), s!("NtWow64QueryInformationProcess64")) });
    function.ok_or(NtStatus::PROCEDURE_NOT_FOUND)
}

pub fn get_process_dep_policy() -> Option<GetProcessDepPolicyFn>
{
    *GET_PROCESS_DEP_POLICY.get_or_init(|| unsafe { resolve(w!("kernel32.dll"), s!("GetProcessDEPPolicy")) })
}
