use std::fmt;
use std::sync::Arc;

use super::{query_result, NativeKind, NativeQuery, ProcessInfoClass};
use crate::error::TetherResult;
use crate::platform::Platform;
use crate::types::{RawHandle, Wow64Barrier};

/// Native queries from a WOW64 controller through the 64-bit thunks
///
/// A 32-bit process on a 64-bit OS only sees the emulated 32-bit view of other
/// processes. `NtWow64QueryInformationProcess64` crosses the barrier and fills
/// the native 64-bit structures instead, which is the only view that is right
/// for 64-bit targets and the one the rest of the core expects for WOW64
/// targets too.
pub struct NativeWow64Bridge
{
    handle: RawHandle,
    barrier: Wow64Barrier,
    platform: Arc<dyn Platform>,
}

impl NativeWow64Bridge
{
    pub fn new(platform: Arc<dyn Platform>, handle: RawHandle, barrier: Wow64Barrier) -> Self
    {
        Self {
            handle,
            barrier,
            platform,
        }
    }
}

impl NativeQuery for NativeWow64Bridge
{
    fn kind(&self) -> NativeKind
    {
        NativeKind::Wow64Bridge
    }

    fn handle(&self) -> RawHandle
    {
        self.handle
    }

    fn barrier(&self) -> &Wow64Barrier
    {
        &self.barrier
    }

    fn query_process_info(&self, class: ProcessInfoClass, buffer: &mut [u8]) -> TetherResult<u32>
    {
        query_result(class, self.platform.wow64_query_information_process64(self.handle, class, buffer))
    }
}

impl fmt::Debug for NativeWow64Bridge
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result
    {
        f.debug_struct("NativeWow64Bridge")
            .field("handle", &self.handle)
            .field("barrier", &self.barrier)
            .finish_non_exhaustive()
    }
}
