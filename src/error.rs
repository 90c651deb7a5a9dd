// SPDX-License-Identifier: Parity-7.0.0 OR PolyForm-Noncommercial-1.0.0
//! Error types shared across the crate.
//!
//! The cache and the allocator are plain containers: they hand creation errors back to the caller
//! untouched. Only the lifecycle tracker builds composite errors, by collecting every individual
//! recreation failure from one reset sweep into a [RecoveryError].

use crate::lifecycle::ResourceId;
use std::fmt::{Display, Formatter};

/// A native object (state object, descriptor heap, render target) could not be created.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[non_exhaustive]
pub enum CreationError {
    #[error("out of device memory creating {what}")]
    OutOfMemory { what: String },
    #[error("device rejected {what}: {reason}")]
    Rejected { what: String, reason: String },
    #[error("device is lost")]
    DeviceLost,
}

/// A resource was used after the device was lost and before it was recreated.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("'{name}' was used while its native handle is released (device lost)")]
pub struct StaleHandle {
    pub name: String,
}

impl StaleHandle {
    pub fn new(name: impl Into<String>) -> Self {
        StaleHandle { name: name.into() }
    }
}

/// A state descriptor that no device could ever create.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid {kind} state: {reason}")]
pub struct InvalidState {
    pub kind: &'static str,
    pub reason: String,
}

/// One resource that failed to come back during a reset sweep.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResourceFailure {
    /// `None` for objects the tracker doesn't know about, such as the predefined samplers.
    pub id: Option<ResourceId>,
    pub name: String,
    pub error: CreationError,
}

impl Display for ResourceFailure {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self.id {
            Some(id) => write!(f, "{} ({id:?}): {}", self.name, self.error),
            None => write!(f, "{}: {}", self.name, self.error),
        }
    }
}

/// Aggregated failures from one device-reset sweep.
///
/// Every other resource was still recreated; the listed ones stay released until
/// [crate::lifecycle::DeviceLifecycleTracker::recreate] succeeds for them.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub struct RecoveryError {
    pub failures: Vec<ResourceFailure>,
}

impl Display for RecoveryError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} resource(s) failed to recover", self.failures.len())?;
        for failure in &self.failures {
            write!(f, "; {failure}")?;
        }
        Ok(())
    }
}

/// Errors from [crate::descriptor::DescriptorAllocator].
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[non_exhaustive]
pub enum AllocationError {
    #[error("cannot allocate zero descriptors")]
    ZeroCount,
    #[error("requested {requested} descriptors but a heap only holds {capacity}")]
    TooLarge { requested: u32, capacity: u32 },
    #[error("allocator has been disposed")]
    Disposed,
    #[error("can't create descriptor heap: {0}")]
    Heap(#[from] CreationError),
}

/// Top-level error for [crate::context::GraphicsContext] operations.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[non_exhaustive]
pub enum Error {
    #[error("Creation failed: {0}")]
    Creation(#[from] CreationError),
    #[error("Stale handle: {0}")]
    Stale(#[from] StaleHandle),
    #[error("Invalid state: {0}")]
    Invalid(#[from] InvalidState),
    #[error("Descriptor allocation failed: {0}")]
    Allocation(#[from] AllocationError),
    #[error("Recovery failed: {0}")]
    Recovery(#[from] RecoveryError),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn recovery_error_lists_every_failure() {
        let err = RecoveryError {
            failures: vec![
                ResourceFailure {
                    id: Some(ResourceId::from_raw(1)),
                    name: "shadow map".to_string(),
                    error: CreationError::DeviceLost,
                },
                ResourceFailure {
                    id: None,
                    name: "gbuffer".to_string(),
                    error: CreationError::OutOfMemory {
                        what: "render target".to_string(),
                    },
                },
            ],
        };
        let text = err.to_string();
        assert!(text.starts_with("2 resource(s) failed to recover"));
        assert!(text.ends_with("; gbuffer: out of device memory creating render target"));
        assert!(text.contains("shadow map"));
        assert!(text.contains("out of device memory creating render target"));
    }

    #[test]
    fn errors_convert_into_top_level() {
        let e: Error = StaleHandle::new("target").into();
        assert!(matches!(e, Error::Stale(_)));
        let e: Error = AllocationError::ZeroCount.into();
        assert!(matches!(e, Error::Allocation(AllocationError::ZeroCount)));
    }
}
