//! # Architecture Probe
//!
//! Detects the native OS architecture, whether the controller runs under
//! WOW64, and whether a given target does.
//!
//! Probing only queries the OS. A failed WOW64 query on the controller is
//! logged and read as "not WOW64"; selection then rejects any combination
//! that does not fit. A failed query on a target is returned to the caller,
//! since the target's bitness decides its structure layouts and DEP state.

use std::io;

use tracing::{debug, warn};

use crate::platform::Platform;
use crate::types::{ArchitectureInfo, RawHandle};

/// Probe the OS and the calling process
///
/// ## Example
///
/// ```rust,no_run
/// use tether_core::platform::default_platform;
/// use tether_core::probe::probe;
///
/// let platform = default_platform()?;
/// let info = probe(platform.as_ref());
/// println!("{} OS, controller wow64: {}", info.native, info.controller_wow64);
/// # Ok::<(), tether_core::error::TetherError>(())
/// ```
pub fn probe(platform: &dyn Platform) -> ArchitectureInfo
{
    let native = platform.native_architecture();
    let controller_wow64 = match platform.is_wow64_process(platform.current_process()) {
        Ok(wow64) => wow64,
        Err(err) => {
            warn!(error = %err, "IsWow64Process failed on the controller, assuming native process");
            false
        }
    };

    let info = ArchitectureInfo {
        native,
        controller_wow64,
        controller_width: platform.controller_width(),
    };
    debug!(
        native = %info.native,
        controller_wow64 = info.controller_wow64,
        controller_width = %info.controller_width,
        "probed architecture"
    );
    info
}

/// Whether the target behind `handle` runs under WOW64
///
/// ## Errors
///
/// The OS error from `IsWow64Process`, for example `ERROR_ACCESS_DENIED` when
/// the handle lacks `QUERY_(LIMITED_)INFORMATION`.
pub fn is_target_wow64(platform: &dyn Platform, handle: RawHandle) -> io::Result<bool>
{
    let wow64 = platform.is_wow64_process(handle)?;
    debug!(%handle, wow64, "probed target");
    Ok(wow64)
}
