// SPDX-License-Identifier: Parity-7.0.0 OR PolyForm-Noncommercial-1.0.0
use crate::error::CreationError;
use std::fmt::Display;

#[derive(Debug, thiserror::Error)]
pub(crate) enum Error {
    NoSuchAdapter(#[from] wgpu::RequestAdapterError),
    RequestDeviceError(#[from] wgpu::RequestDeviceError),
}

impl Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Error::NoSuchAdapter(e) => write!(f, "No such adapter: {}", e),
            Error::RequestDeviceError(e) => write!(f, "{}", e),
        }
    }
}

/**
Runs `create` inside validation and out-of-memory error scopes.

wgpu reports creation failures asynchronously through error scopes rather than through the
return value. Natively the scopes resolve as soon as they are popped.
*/
pub(super) fn scoped<T>(
    device: &wgpu::Device,
    what: &str,
    create: impl FnOnce() -> T,
) -> Result<T, CreationError> {
    device.push_error_scope(wgpu::ErrorFilter::OutOfMemory);
    device.push_error_scope(wgpu::ErrorFilter::Validation);
    let value = create();
    let validation = test_executors::spin_on(device.pop_error_scope());
    let out_of_memory = test_executors::spin_on(device.pop_error_scope());
    if out_of_memory.is_some() {
        return Err(CreationError::OutOfMemory {
            what: what.to_string(),
        });
    }
    if let Some(e) = validation {
        return Err(CreationError::Rejected {
            what: what.to_string(),
            reason: e.to_string(),
        });
    }
    Ok(value)
}
