//! # Process Attachment
//!
//! Binds the controller to one target process at a time.
//!
//! An attachment is either detached, or bound to a target through three
//! things that only make sense together: the target's pid, an owned handle to
//! it, and the native-query variant that matches the controller/target/OS
//! combination. They are stored as one [`Option`] so they can never get out of
//! step.
//!
//! ## Lifecycle
//!
//! ```text
//! Detached ──open(pid)──▶ Attached ──close()──▶ Detached
//!              ▲              │
//!              └──open(pid2)──┘   (the old binding is released first)
//! ```
//!
//! Failures leave the attachment detached; a handle acquired before the
//! failure is released on the way out.
//!
//! ## Example
//!
//! ```rust,no_run
//! use tether_core::native::NativeQuery;
//! use tether_core::platform::create_attachment;
//! use tether_core::types::{ProcessAccess, ProcessId};
//!
//! let mut attachment = create_attachment()?;
//! attachment.open(ProcessId::from(4242), ProcessAccess::DEFAULT)?;
//!
//! if let Some(native) = attachment.native() {
//!     println!("variant: {}, barrier: {:?}", native.kind(), native.barrier().kind);
//! }
//! println!("dep: {}, protected: {}", attachment.dep_enabled(), attachment.is_protected());
//!
//! attachment.close();
//! # Ok::<(), tether_core::error::TetherError>(())
//! ```

use std::sync::Arc;
use std::{fmt, io};

use tracing::{debug, info, warn};

use crate::error::{TetherError, TetherResult};
use crate::handle::ProcessHandle;
use crate::imports::{DepPolicy, DynamicImports};
use crate::native::{self, ExtendedProcessFlags, NativeInterface, NativeQuery, ProcessBasicInformation};
use crate::platform::Platform;
use crate::probe;
use crate::types::{ArchitectureInfo, ProcessAccess, ProcessId, RawHandle, Wow64Barrier};

/// `ERROR_INVALID_PARAMETER`
const ERROR_INVALID_PARAMETER: i32 = 87;

/// Everything that exists only while attached
///
/// Field order matters: the native interface refers to the handle, so it is
/// declared (and therefore dropped) first.
struct Binding
{
    native: NativeInterface,
    handle: ProcessHandle,
    pid: ProcessId,
    architecture: ArchitectureInfo,
    dep_enabled: bool,
    dep_policy: Option<DepPolicy>,
}

/// One controller-to-target binding
///
/// Open/close take `&mut self`, so an attachment is used from one thread at a
/// time. Independent attachments may target the same process.
pub struct ProcessAttachment
{
    platform: Arc<dyn Platform>,
    imports: DynamicImports,
    binding: Option<Binding>,
}

impl ProcessAttachment
{
    /// Create a detached attachment.
    ///
    /// `imports` carries the optional DEP-policy capability; pass
    /// [`DynamicImports::none()`] when it is not available.
    pub fn new(platform: Arc<dyn Platform>, imports: DynamicImports) -> Self
    {
        Self {
            platform,
            imports,
            binding: None,
        }
    }

    /// Attach to `pid`
    ///
    /// Any existing binding is released first. Attaching to the controller's
    /// own pid uses the current-process pseudo handle and ignores `access`.
    ///
    /// ## Errors
    ///
    /// - `AttachFailed` if `pid` is [`ProcessId::NONE`] or the OS refuses the
    ///   handle; the OS error code is kept in the error's source.
    /// - `TargetArchitectureUnknown` if the target's WOW64 state can not be queried
    ///   on a 64-bit OS. The handle is released.
    /// - `UnsupportedArchitectureCombination` if no native-query variant fits
    ///   the controller/target/OS combination. The handle is released.
    ///
    /// The attachment is detached after any error.
    pub fn open(&mut self, pid: ProcessId, access: ProcessAccess) -> TetherResult<()>
    {
        self.close();

        let handle = self.acquire_handle(pid, access)?;

        let architecture = probe::probe(self.platform.as_ref());
        // `handle` drops (and closes) on the early returns below
        let target_wow64 = if architecture.native_is_x64() {
            probe::is_target_wow64(self.platform.as_ref(), handle.raw())
                .map_err(|source| TetherError::TargetArchitectureUnknown { pid, source })?
        } else {
            false
        };

        let kind = native::select_variant(&architecture, target_wow64)?;

        let barrier = Wow64Barrier::new(&architecture, target_wow64);
        let native = NativeInterface::new(kind, Arc::clone(&self.platform), handle.raw(), barrier);
        let (dep_enabled, dep_policy) = self.derive_dep(&barrier, handle.raw());

        info!(
            %pid,
            handle = %handle.raw(),
            variant = %kind,
            barrier = ?barrier.kind,
            dep_enabled,
            "attached to process"
        );

        self.binding = Some(Binding {
            native,
            handle,
            pid,
            architecture,
            dep_enabled,
            dep_policy,
        });
        Ok(())
    }

    /// Release the binding, if any
    ///
    /// Drops the native interface, then closes the handle (the pseudo handle
    /// for the controller's own process is never closed). Calling this on a
    /// detached attachment does nothing.
    pub fn close(&mut self)
    {
        let Some(binding) = self.binding.take() else {
            return;
        };

        let Binding {
            native, handle, pid, ..
        } = binding;
        drop(native);

        if let Err(err) = handle.close() {
            warn!(%pid, error = %err, "failed to close process handle");
        }
        info!(%pid, "detached from process");
    }

    /// Returns `true` while bound to a target.
    pub fn is_attached(&self) -> bool
    {
        self.binding.is_some()
    }

    /// Target pid, [`ProcessId::NONE`] when detached.
    pub fn pid(&self) -> ProcessId
    {
        self.binding.as_ref().map_or(ProcessId::NONE, |binding| binding.pid)
    }

    /// Read-only view of the target's handle.
    pub fn handle(&self) -> Option<RawHandle>
    {
        self.binding.as_ref().map(|binding| binding.handle.raw())
    }

    /// The native-query variant selected for the target.
    pub fn native(&self) -> Option<&NativeInterface>
    {
        self.binding.as_ref().map(|binding| &binding.native)
    }

    /// The WOW64 barrier between controller and target.
    pub fn barrier(&self) -> Option<&Wow64Barrier>
    {
        self.binding.as_ref().map(|binding| binding.native.barrier())
    }

    /// Architecture probed when the target was opened.
    pub fn architecture(&self) -> Option<&ArchitectureInfo>
    {
        self.binding.as_ref().map(|binding| &binding.architecture)
    }

    /// Whether DEP is enabled for the target
    ///
    /// Always on for native processes. For WOW64 targets this is the result
    /// of the DEP-policy query, or `false` if it was unavailable. `false`
    /// while detached.
    pub fn dep_enabled(&self) -> bool
    {
        self.binding.as_ref().is_some_and(|binding| binding.dep_enabled)
    }

    /// The DEP policy reported for a WOW64 target, if it was queried.
    pub fn dep_policy(&self) -> Option<DepPolicy>
    {
        self.binding.as_ref().and_then(|binding| binding.dep_policy)
    }

    /// Whether the target is a protected process
    ///
    /// `false` while detached and when the query fails (the failure is
    /// logged). Use [`extended_flags`](Self::extended_flags) to see the error.
    pub fn is_protected(&self) -> bool
    {
        match self.extended_flags() {
            Ok(flags) => flags.contains(ExtendedProcessFlags::IS_PROTECTED_PROCESS),
            Err(TetherError::NotAttached) => false,
            Err(err) => {
                warn!(pid = %self.pid(), error = %err, "extended basic information query failed");
                false
            }
        }
    }

    /// The target's extended process flags
    ///
    /// ## Errors
    ///
    /// - `NotAttached` while detached
    /// - `QueryFailed` if the OS rejects the query
    pub fn extended_flags(&self) -> TetherResult<ExtendedProcessFlags>
    {
        let binding = self.binding.as_ref().ok_or(TetherError::NotAttached)?;
        let info = binding.native.extended_basic_information()?;
        Ok(info.flags)
    }

    /// The target's basic process information
    ///
    /// ## Errors
    ///
    /// - `NotAttached` while detached
    /// - `QueryFailed` if the OS rejects the query
    pub fn basic_information(&self) -> TetherResult<ProcessBasicInformation>
    {
        let binding = self.binding.as_ref().ok_or(TetherError::NotAttached)?;
        binding.native.basic_information()
    }

    fn acquire_handle(&self, pid: ProcessId, access: ProcessAccess) -> TetherResult<ProcessHandle>
    {
        // Pid 0 is the idle process; OpenProcess rejects it the same way
        if pid.is_none() {
            return Err(TetherError::AttachFailed {
                pid,
                source: io::Error::from_raw_os_error(ERROR_INVALID_PARAMETER),
            });
        }

        if pid == self.platform.current_process_id() {
            debug!(%pid, "attaching to own process through the pseudo handle");
            return Ok(ProcessHandle::pseudo(Arc::clone(&self.platform)));
        }

        let raw = self
            .platform
            .open_process(pid, access)
            .map_err(|source| TetherError::AttachFailed { pid, source })?;
        Ok(ProcessHandle::owned(Arc::clone(&self.platform), raw))
    }

    fn derive_dep(&self, barrier: &Wow64Barrier, handle: RawHandle) -> (bool, Option<DepPolicy>)
    {
        // DEP is always on for native 32- and 64-bit processes
        if !barrier.target_wow64 {
            return (true, None);
        }

        let Some(query) = self.imports.dep_policy() else {
            warn!(%handle, "GetProcessDEPPolicy is unavailable, reporting DEP as disabled");
            return (false, None);
        };

        match query.query_dep_policy(handle) {
            Ok(policy) => (policy.enabled(), Some(policy)),
            Err(err) => {
                warn!(%handle, error = %err, "DEP policy query failed, reporting DEP as disabled");
                (false, None)
            }
        }
    }
}

impl Drop for ProcessAttachment
{
    fn drop(&mut self)
    {
        self.close();
    }
}

impl fmt::Debug for ProcessAttachment
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result
    {
        f.debug_struct("ProcessAttachment")
            .field("pid", &self.pid())
            .field("handle", &self.handle())
            .field("native", &self.native().map(|native| native.kind()))
            .field("dep_enabled", &self.dep_enabled())
            .field("imports", &self.imports)
            .finish_non_exhaustive()
    }
}
