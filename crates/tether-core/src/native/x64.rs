use std::fmt;
use std::sync::Arc;

use super::{query_result, NativeKind, NativeQuery, ProcessInfoClass};
use crate::error::TetherResult;
use crate::platform::Platform;
use crate::types::{RawHandle, Wow64Barrier};

/// Native queries from a 64-bit controller on a 64-bit OS
///
/// Calls `NtQueryInformationProcess` directly. The controller's own structures
/// are the OS's native ones, so the layout is 64-bit for every target,
/// including WOW64 targets.
pub struct NativeX64
{
    handle: RawHandle,
    barrier: Wow64Barrier,
    platform: Arc<dyn Platform>,
}

impl NativeX64
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

impl NativeQuery for NativeX64
{
    fn kind(&self) -> NativeKind
    {
        NativeKind::X64
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

impl fmt::Debug for NativeX64
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result
    {
        f.debug_struct("NativeX64")
            .field("handle", &self.handle)
            .field("barrier", &self.barrier)
            .finish_non_exhaustive()
    }
}
