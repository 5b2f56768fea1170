use std::fmt;
use std::sync::Arc;

use super::{query_result, NativeKind, NativeQuery, ProcessInfoClass};
use crate::error::TetherResult;
use crate::platform::Platform;
use crate::types::{RawHandle, Wow64Barrier};

/// Native queries on a 32-bit OS
///
/// Every process on a 32-bit OS is 32-bit, so `NtQueryInformationProcess`
/// fills 32-bit structures.
pub struct NativeX86
{
    handle: RawHandle,
    barrier: Wow64Barrier,
    platform: Arc<dyn Platform>,
}

impl NativeX86
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

impl NativeQuery for NativeX86
{
    fn kind(&self) -> NativeKind
    {
        NativeKind::X86
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
        query_result(class, self.platform.query_information_process(self.handle, class, buffer))
    }
}

impl fmt::Debug for NativeX86
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result
    {
        f.debug_struct("NativeX86")
            .field("handle", &self.handle)
            .field("barrier", &self.barrier)
            .finish_non_exhaustive()
    }
}
