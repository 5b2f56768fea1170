//! In-memory `Platform` used by the integration tests
//!
//! Simulates one OS with a fixed processor architecture, a controller of a
//! fixed width (optionally under WOW64) and a table of target processes. It
//! hands out fake handles, records every open/close, and answers the
//! basic-information queries the way the kernel does: only buffers in the
//! layout the caller is allowed to see are accepted, anything else gets
//! `STATUS_INFO_LENGTH_MISMATCH`.

#![allow(dead_code)]

use std::collections::HashMap;
use std::io;
use std::sync::{Arc, Mutex};

use tether_core::native::layout;
use tether_core::native::{ExtendedBasicInformation, ExtendedProcessFlags, ProcessBasicInformation, ProcessInfoClass};
use tether_core::types::{NativeArchitecture, NtStatus, PointerWidth, ProcessAccess, ProcessId, RawHandle};
use tether_core::Platform;

/// `ERROR_ACCESS_DENIED`
pub const ERROR_ACCESS_DENIED: i32 = 5;
/// `ERROR_INVALID_HANDLE`
pub const ERROR_INVALID_HANDLE: i32 = 6;
/// `ERROR_INVALID_PARAMETER`, returned by `OpenProcess` for unknown pids
pub const ERROR_INVALID_PARAMETER: i32 = 87;

/// Rights that allow `IsWow64Process` on a handle
const QUERY_RIGHTS: ProcessAccess =
    ProcessAccess::QUERY_INFORMATION.union(ProcessAccess::QUERY_LIMITED_INFORMATION);

/// PEB addresses reported by the mock, per target bitness
pub const PEB_64: u64 = 0x0000_00F3_2A8C_1000;
pub const PEB_32: u64 = 0x7EFD_E000;

/// A simulated target process
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MockTarget
{
    pub wow64: bool,
    pub protected: bool,
    /// Win32 error `OpenProcess` fails with
    pub open_error: Option<i32>,
    /// Status every information query fails with
    pub query_status: Option<NtStatus>,
    pub parent: u32,
}

impl MockTarget
{
    pub fn native() -> Self
    {
        Self {
            wow64: false,
            protected: false,
            open_error: None,
            query_status: None,
            parent: 4,
        }
    }

    pub fn wow64() -> Self
    {
        Self {
            wow64: true,
            ..Self::native()
        }
    }

    pub fn protected(mut self) -> Self
    {
        self.protected = true;
        self
    }

    pub fn denied(mut self) -> Self
    {
        self.open_error = Some(ERROR_ACCESS_DENIED);
        self
    }

    pub fn failing_queries(mut self, status: NtStatus) -> Self
    {
        self.query_status = Some(status);
        self
    }
}

/// Which query entry point was called
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueryApi
{
    Native,
    Wow64Thunk,
}

/// Something the code under test asked the mock to do
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Event
{
    Open
    {
        pid: ProcessId,
        access: ProcessAccess,
        handle: RawHandle,
    },
    OpenFailed
    {
        pid: ProcessId,
    },
    Close
    {
        handle: RawHandle,
    },
    Query
    {
        api: QueryApi,
        handle: RawHandle,
        length: usize,
    },
}

#[derive(Default)]
struct MockState
{
    next_handle: isize,
    open: HashMap<isize, (ProcessId, ProcessAccess)>,
    events: Vec<Event>,
}

pub struct MockPlatform
{
    native: NativeArchitecture,
    controller_width: PointerWidth,
    controller_wow64: bool,
    self_pid: ProcessId,
    targets: HashMap<u32, MockTarget>,
    state: Mutex<MockState>,
}

impl MockPlatform
{
    pub const SELF_PID: ProcessId = ProcessId(1000);

    pub fn new(native: NativeArchitecture, controller_width: PointerWidth, controller_wow64: bool) -> Self
    {
        Self {
            native,
            controller_width,
            controller_wow64,
            self_pid: Self::SELF_PID,
            targets: HashMap::new(),
            state: Mutex::new(MockState {
                next_handle: 0x100,
                ..MockState::default()
            }),
        }
    }

    /// 64-bit controller on 64-bit Windows
    pub fn x64_native() -> Self
    {
        Self::new(NativeArchitecture::X64, PointerWidth::Bits64, false)
    }

    /// 32-bit controller under WOW64 on 64-bit Windows
    pub fn x64_wow64_controller() -> Self
    {
        Self::new(NativeArchitecture::X64, PointerWidth::Bits32, true)
    }

    /// 32-bit controller on 32-bit Windows
    pub fn x86() -> Self
    {
        Self::new(NativeArchitecture::X86, PointerWidth::Bits32, false)
    }

    pub fn with_target(mut self, pid: u32, target: MockTarget) -> Self
    {
        self.targets.insert(pid, target);
        self
    }

    pub fn into_arc(self) -> Arc<Self>
    {
        Arc::new(self)
    }

    pub fn events(&self) -> Vec<Event>
    {
        self.lock().events.clone()
    }

    pub fn opened(&self) -> usize
    {
        self.lock().events.iter().filter(|event| matches!(event, Event::Open { .. })).count()
    }

    pub fn closed(&self) -> usize
    {
        self.lock().events.iter().filter(|event| matches!(event, Event::Close { .. })).count()
    }

    /// Handles opened and not yet closed
    pub fn open_handles(&self) -> usize
    {
        self.lock().open.len()
    }

    pub fn queries(&self) -> Vec<(QueryApi, usize)>
    {
        self.lock()
            .events
            .iter()
            .filter_map(|event| match event {
                Event::Query { api, length, .. } => Some((*api, *length)),
                _ => None,
            })
            .collect()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, MockState>
    {
        self.state.lock().unwrap()
    }

    fn self_target(&self) -> MockTarget
    {
        MockTarget {
            wow64: self.controller_wow64,
            ..MockTarget::native()
        }
    }

    /// Resolve a handle to the pid and target it refers to.
    fn resolve(&self, handle: RawHandle) -> Option<(ProcessId, MockTarget)>
    {
        if handle == RawHandle::CURRENT_PROCESS {
            return Some((self.self_pid, self.self_target()));
        }
        let (pid, _) = *self.lock().open.get(&handle.raw())?;
        let target = self.targets.get(&pid.0).copied()?;
        Some((pid, target))
    }

    /// Answer a basic-information query in `width` layout.
    fn answer(&self, api: QueryApi, width: PointerWidth, handle: RawHandle, class: ProcessInfoClass, buffer: &mut [u8]) -> Result<u32, NtStatus>
    {
        self.lock().events.push(Event::Query {
            api,
            handle,
            length: buffer.len(),
        });

        let (pid, target) = self.resolve(handle).ok_or(NtStatus::INVALID_HANDLE)?;
        if let Some(status) = target.query_status {
            return Err(status);
        }
        if class != ProcessInfoClass::BasicInformation {
            return Err(NtStatus::NOT_IMPLEMENTED);
        }

        let target_32bit = target.wow64 || self.native == NativeArchitecture::X86;
        let basic = ProcessBasicInformation {
            exit_status: NtStatus(0x103),
            peb_base_address: if target_32bit && width == PointerWidth::Bits32 {
                PEB_32
            } else {
                PEB_64
            },
            affinity_mask: 0xF,
            base_priority: 8,
            unique_process_id: u64::from(pid.0),
            inherited_from_unique_process_id: u64::from(target.parent),
        };

        let mut flags = ExtendedProcessFlags::empty();
        flags.set(ExtendedProcessFlags::IS_PROTECTED_PROCESS, target.protected);
        flags.set(ExtendedProcessFlags::IS_WOW64_PROCESS, target.wow64);

        if buffer.len() == layout::basic_size(width) {
            layout::encode_basic(width, &basic, buffer).map_err(|_| NtStatus::INFO_LENGTH_MISMATCH)?;
            return Ok(buffer.len() as u32);
        }

        let size_ok = buffer.len() == layout::extended_size(width)
            && layout::extended_request_size(width, buffer).ok() == Some(layout::extended_size(width) as u64);
        if size_ok {
            let info = ExtendedBasicInformation { basic, flags };
            layout::encode_extended(width, &info, buffer).map_err(|_| NtStatus::INFO_LENGTH_MISMATCH)?;
            return Ok(buffer.len() as u32);
        }

        Err(NtStatus::INFO_LENGTH_MISMATCH)
    }
}

impl Platform for MockPlatform
{
    fn current_process_id(&self) -> ProcessId
    {
        self.self_pid
    }

    fn current_process(&self) -> RawHandle
    {
        RawHandle::CURRENT_PROCESS
    }

    fn open_process(&self, pid: ProcessId, access: ProcessAccess) -> io::Result<RawHandle>
    {
        let mut state = self.lock();
        let target = match self.targets.get(&pid.0) {
            Some(target) => target,
            None => {
                state.events.push(Event::OpenFailed { pid });
                return Err(io::Error::from_raw_os_error(ERROR_INVALID_PARAMETER));
            }
        };
        if let Some(code) = target.open_error {
            state.events.push(Event::OpenFailed { pid });
            return Err(io::Error::from_raw_os_error(code));
        }

        state.next_handle += 4;
        let handle = RawHandle(state.next_handle);
        state.open.insert(handle.raw(), (pid, access));
        state.events.push(Event::Open { pid, access, handle });
        Ok(handle)
    }

    fn close_handle(&self, handle: RawHandle) -> io::Result<()>
    {
        let mut state = self.lock();
        if state.open.remove(&handle.raw()).is_none() {
            return Err(io::Error::from_raw_os_error(ERROR_INVALID_HANDLE));
        }
        state.events.push(Event::Close { handle });
        Ok(())
    }

    fn native_architecture(&self) -> NativeArchitecture
    {
        self.native
    }

    fn controller_width(&self) -> PointerWidth
    {
        self.controller_width
    }

    fn is_wow64_process(&self, handle: RawHandle) -> io::Result<bool>
    {
        // IsWow64Process needs one of the query rights on a real handle
        let access = self.lock().open.get(&handle.raw()).map(|(_, access)| *access);
        if access.is_some_and(|access| !access.intersects(QUERY_RIGHTS)) {
            return Err(io::Error::from_raw_os_error(ERROR_ACCESS_DENIED));
        }

        match self.resolve(handle) {
            Some((_, target)) => Ok(target.wow64),
            None => Err(io::Error::from_raw_os_error(ERROR_INVALID_HANDLE)),
        }
    }

    fn query_information_process(&self, handle: RawHandle, class: ProcessInfoClass, buffer: &mut [u8]) -> Result<u32, NtStatus>
    {
        // The direct query always answers in the caller's own layout
        self.answer(QueryApi::Native, self.controller_width, handle, class, buffer)
    }

    fn wow64_query_information_process64(
        &self,
        handle: RawHandle,
        class: ProcessInfoClass,
        buffer: &mut [u8],
    ) -> Result<u32, NtStatus>
    {
        if !self.controller_wow64 {
            return Err(NtStatus::PROCEDURE_NOT_FOUND);
        }
        self.answer(QueryApi::Wow64Thunk, PointerWidth::Bits64, handle, class, buffer)
    }
}
