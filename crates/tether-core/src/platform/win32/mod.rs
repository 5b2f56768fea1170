//! # Windows Backend
//!
//! [`Platform`] implementation on top of the `windows` crate.
//!
//! ## APIs Used
//!
//! - `OpenProcess` / `CloseHandle`: handle lifecycle
//! - `GetCurrentProcess` / `GetCurrentProcessId`: self-attach
//! - `GetNativeSystemInfo`: processor architecture of the OS (not of the
//!   WOW64 view)
//! - `IsWow64Process`: WOW64 state of a process
//! - `NtQueryInformationProcess` / `NtWow64QueryInformationProcess64`:
//!   resolved from `ntdll` at runtime (see [`ffi`])
//!
//! ## Error Codes
//!
//! Failures of `OpenProcess` and friends come back from the `windows` crate as
//! `HRESULT`s wrapping the Win32 error. They are unwrapped again, so callers see
//! the plain Win32 code (`ERROR_ACCESS_DENIED` is 5, not `0x80070005`).

use std::ffi::c_void;
use std::io;

use ::windows::Win32::Foundation::{CloseHandle, BOOL, HANDLE};
use ::windows::Win32::System::SystemInformation::{GetNativeSystemInfo, SYSTEM_INFO};
use ::windows::Win32::System::Threading::{
    GetCurrentProcess, GetCurrentProcessId, IsWow64Process, OpenProcess, PROCESS_ACCESS_RIGHTS,
};
use tracing::debug;

use crate::imports::{DepFlags, DepPolicy, DynamicImports};
use crate::native::ProcessInfoClass;
use crate::platform::Platform;
use crate::types::{NativeArchitecture, NtStatus, ProcessAccess, ProcessId, RawHandle};

pub mod ffi;

/// `FACILITY_WIN32` HRESULTs: `0x8007xxxx`
const FACILITY_WIN32_MASK: u32 = 0xFFFF_0000;
const FACILITY_WIN32_PREFIX: u32 = 0x8007_0000;

/// The Windows OS backend
///
/// Stateless; every call goes straight to the OS. Cheap to create, but usually
/// created once through [`default_platform`](crate::platform::default_platform).
#[derive(Debug, Default, Clone, Copy)]
pub struct Win32Platform;

impl Win32Platform
{
    pub fn new() -> Self
    {
        Self
    }
}

fn to_handle(raw: RawHandle) -> HANDLE
{
    HANDLE(raw.raw() as *mut c_void)
}

fn from_handle(handle: HANDLE) -> RawHandle
{
    RawHandle(handle.0 as isize)
}

/// Convert a `windows` crate error back into the Win32 error it wraps.
fn os_error(err: ::windows::core::Error) -> io::Error
{
    let hresult = err.code().0 as u32;
    if hresult & FACILITY_WIN32_MASK == FACILITY_WIN32_PREFIX {
        io::Error::from_raw_os_error((hresult & 0xFFFF) as i32)
    } else {
        io::Error::from_raw_os_error(hresult as i32)
    }
}

fn buffer_length(buffer: &[u8]) -> Result<u32, NtStatus>
{
    u32::try_from(buffer.len()).map_err(|_| NtStatus::INVALID_PARAMETER)
}

fn query_with(
    function: ffi::QueryInformationProcessFn,
    handle: RawHandle,
    class: ProcessInfoClass,
    buffer: &mut [u8],
) -> Result<u32, NtStatus>
{
    let length = buffer_length(buffer)?;
    let mut returned = 0u32;
    // SAFETY: the buffer is valid for `length` bytes and outlives the call
    let status = unsafe {
        function(
            to_handle(handle),
            class.as_raw(),
            buffer.as_mut_ptr().cast::<c_void>(),
            length,
            &mut returned,
        )
    };
    NtStatus(status).ok()?;
    Ok(returned)
}

impl Platform for Win32Platform
{
    fn current_process_id(&self) -> ProcessId
    {
        ProcessId(unsafe { GetCurrentProcessId() })
    }

    fn current_process(&self) -> RawHandle
    {
        from_handle(unsafe { GetCurrentProcess() })
    }

    fn open_process(&self, pid: ProcessId, access: ProcessAccess) -> io::Result<RawHandle>
    {
        let handle = unsafe { OpenProcess(PROCESS_ACCESS_RIGHTS(access.bits()), false, pid.0) }.map_err(os_error)?;
        debug!(%pid, %access, handle = ?handle.0, "opened process");
        Ok(from_handle(handle))
    }

    fn close_handle(&self, handle: RawHandle) -> io::Result<()>
    {
        unsafe { CloseHandle(to_handle(handle)) }.map_err(os_error)
    }

    fn native_architecture(&self) -> NativeArchitecture
    {
        let mut info = SYSTEM_INFO::default();
        unsafe { GetNativeSystemInfo(&mut info) };
        // SAFETY: GetNativeSystemInfo always fills the architecture arm of the union
        let raw = unsafe { info.Anonymous.Anonymous.wProcessorArchitecture.0 };
        NativeArchitecture::from_raw(raw)
    }

    fn is_wow64_process(&self, handle: RawHandle) -> io::Result<bool>
    {
        let mut wow64 = BOOL::default();
        unsafe { IsWow64Process(to_handle(handle), &mut wow64) }.map_err(os_error)?;
        Ok(wow64.as_bool())
    }

    fn query_information_process(
        &self,
        handle: RawHandle,
        class: ProcessInfoClass,
        buffer: &mut [u8],
    ) -> Result<u32, NtStatus>
    {
        query_with(ffi::nt_query_information_process()?, handle, class, buffer)
    }

    fn wow64_query_information_process64(
        &self,
        handle: RawHandle,
        class: ProcessInfoClass,
        buffer: &mut [u8],
    ) -> Result<u32, NtStatus>
    {
        query_with(ffi::nt_wow64_query_information_process64()?, handle, class, buffer)
    }
}

/// `GetProcessDEPPolicy` wrapped as a [`DepPolicyQuery`](crate::imports::DepPolicyQuery)
fn query_dep_policy(function: ffi::GetProcessDepPolicyFn, handle: RawHandle) -> io::Result<DepPolicy>
{
    let mut flags = 0u32;
    let mut permanent = BOOL::default();
    // SAFETY: both out-pointers are valid locals
    let ok = unsafe { function(to_handle(handle), &mut flags, &mut permanent) };
    if !ok.as_bool() {
        return Err(io::Error::last_os_error());
    }

    Ok(DepPolicy {
        flags: DepFlags::from_bits_retain(flags),
        permanent: permanent.as_bool(),
    })
}

/// Resolve the optional entry points of this system
///
/// Lookups happen once per process; later calls reuse the cached result.
pub fn resolve_dynamic_imports() -> DynamicImports
{
    match ffi::get_process_dep_policy() {
        Some(function) => {
            DynamicImports::none().with_dep_policy(move |handle: RawHandle| -> io::Result<DepPolicy> {
                query_dep_policy(function, handle)
            })
        }
        None => {
            debug!("GetProcessDEPPolicy is not exported by kernel32");
            DynamicImports::none()
        }
    }
}
