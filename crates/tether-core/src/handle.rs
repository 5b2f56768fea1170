//! # Owned Process Handles
//!
//! RAII guard that owns one OS process handle and closes it when dropped.
//!
//! A process handle must be closed exactly once. Holding it in a guard means it
//! is released on every exit path: normal return, early `?` return, or panic
//! unwind. The pseudo handle for the controller's own process is wrapped too,
//! but flagged so it is never passed to `CloseHandle`.

use std::fmt;
use std::sync::Arc;

use tracing::{trace, warn};

use crate::error::TetherResult;
use crate::platform::Platform;
use crate::types::RawHandle;

/// Owned OS process handle
///
/// Created by [`ProcessAttachment::open`](crate::attachment::ProcessAttachment::open);
/// collaborators only ever see the [`RawHandle`] view.
pub struct ProcessHandle
{
    raw: RawHandle,
    pseudo: bool,
    active: bool,
    platform: Arc<dyn Platform>,
}

impl ProcessHandle
{
    /// Take ownership of a handle returned by `Platform::open_process`.
    pub fn owned(platform: Arc<dyn Platform>, raw: RawHandle) -> Self
    {
        Self {
            raw,
            pseudo: false,
            active: true,
            platform,
        }
    }

    /// Wrap the current-process pseudo handle. Dropping it is a no-op.
    pub fn pseudo(platform: Arc<dyn Platform>) -> Self
    {
        let raw = platform.current_process();
        Self {
            raw,
            pseudo: true,
            active: true,
            platform,
        }
    }

    /// Read-only view of the handle.
    pub fn raw(&self) -> RawHandle
    {
        self.raw
    }

    /// Returns `true` for the current-process pseudo handle.
    pub fn is_pseudo(&self) -> bool
    {
        self.pseudo
    }

    /// Close the handle now instead of on drop.
    ///
    /// ## Errors
    ///
    /// `Io` if `CloseHandle` fails. The guard is spent either way, so the
    /// handle is never closed twice.
    pub fn close(mut self) -> TetherResult<()>
    {
        self.release()
    }

    fn release(&mut self) -> TetherResult<()>
    {
        if !self.active {
            return Ok(());
        }
        self.active = false;

        if self.pseudo {
            return Ok(());
        }

        trace!(handle = %self.raw, "closing process handle");
        self.platform.close_handle(self.raw)?;
        Ok(())
    }
}

impl Drop for ProcessHandle
{
    fn drop(&mut self)
    {
        // Best effort close - nothing sensible to do with the error here
        if let Err(err) = self.release() {
            warn!(handle = %self.raw, error = %err, "failed to close process handle");
        }
    }
}

impl fmt::Debug for ProcessHandle
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result
    {
        f.debug_struct("ProcessHandle")
            .field("raw", &self.raw)
            .field("pseudo", &self.pseudo)
            .field("active", &self.active)
            .finish_non_exhaustive()
    }
}
