//! # Dynamic Imports
//!
//! Some OS entry points do not exist on every Windows version. They are looked
//! up by name once, at startup, by a symbol resolver, and handed to the
//! attachment as a capability value. An absent entry point is a normal
//! condition, not an error.
//!
//! The only optional entry point the core consumes is the per-process DEP
//! policy query (`GetProcessDEPPolicy`, Windows XP SP3 / Vista SP1 and later).
//!
//! ## Example
//!
//! ```rust
//! use tether_core::imports::{DepFlags, DepPolicy, DynamicImports};
//! use tether_core::types::RawHandle;
//!
//! // A resolver for tests: every process has DEP on, permanently.
//! let imports = DynamicImports::none().with_dep_policy(|_handle: RawHandle| -> std::io::Result<DepPolicy> {
//!     Ok(DepPolicy { flags: DepFlags::ENABLE, permanent: true })
//! });
//! assert!(imports.dep_policy().is_some());
//! ```

use std::fmt;
use std::io;
use std::sync::Arc;

use bitflags::bitflags;

use crate::types::RawHandle;

bitflags! {
    /// Flags reported by `GetProcessDEPPolicy`
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct DepFlags: u32
    {
        /// `PROCESS_DEP_ENABLE`
        const ENABLE = 0x0000_0001;
        /// `PROCESS_DEP_DISABLE_ATL_THUNK_EMULATION`
        const DISABLE_ATL_THUNK_EMULATION = 0x0000_0002;
    }
}

/// Per-process DEP policy
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct DepPolicy
{
    /// DEP flags of the process.
    pub flags: DepFlags,
    /// Whether the policy is locked for the lifetime of the process.
    pub permanent: bool,
}

impl DepPolicy
{
    /// Returns `true` if `PROCESS_DEP_ENABLE` is set.
    pub const fn enabled(&self) -> bool
    {
        self.flags.contains(DepFlags::ENABLE)
    }
}

/// Capability to query a process's DEP policy
///
/// Implemented for any `Fn(RawHandle) -> io::Result<DepPolicy>`, so tests can
/// pass a closure.
pub trait DepPolicyQuery: Send + Sync
{
    /// Query the DEP policy of the process behind `handle`.
    fn query_dep_policy(&self, handle: RawHandle) -> io::Result<DepPolicy>;
}

impl<F> DepPolicyQuery for F
where
    F: Fn(RawHandle) -> io::Result<DepPolicy> + Send + Sync,
{
    fn query_dep_policy(&self, handle: RawHandle) -> io::Result<DepPolicy>
    {
        self(handle)
    }
}

/// Optional OS entry points, resolved once and passed into the attachment
#[derive(Clone, Default)]
pub struct DynamicImports
{
    dep_policy: Option<Arc<dyn DepPolicyQuery>>,
}

impl DynamicImports
{
    /// No optional entry points were resolved.
    pub fn none() -> Self
    {
        Self::default()
    }

    /// Attach a DEP policy query capability.
    #[must_use]
    pub fn with_dep_policy<Q>(mut self, query: Q) -> Self
    where
        Q: DepPolicyQuery + 'static,
    {
        self.dep_policy = Some(Arc::new(query));
        self
    }

    /// The DEP policy query, if it was resolved.
    pub fn dep_policy(&self) -> Option<&dyn DepPolicyQuery>
    {
        self.dep_policy.as_deref()
    }
}

impl fmt::Debug for DynamicImports
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result
    {
        f.debug_struct("DynamicImports")
            .field("dep_policy", &self.dep_policy.is_some())
            .finish()
    }
}
