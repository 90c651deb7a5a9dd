// SPDX-License-Identifier: Parity-7.0.0 OR PolyForm-Noncommercial-1.0.0
//!Platform-independent entrypoint implementation
use crate::imp;
use std::fmt::Formatter;

#[derive(Debug)]
pub struct EntryPoint(pub(crate) crate::imp::EntryPoint);
///platform-independent error type
#[derive(Debug)]
pub struct EntryPointError(imp::Error);
impl std::fmt::Display for EntryPointError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        std::fmt::Display::fmt(&self.0, f)
    }
}
impl std::error::Error for EntryPointError {}

impl EntryPoint {
    ///Creates the backend instance. Backend selection honors the usual `WGPU_*` environment variables.
    pub async fn new() -> Result<Self, EntryPointError> {
        crate::imp::EntryPoint::new()
            .await
            .map(EntryPoint)
            .map_err(EntryPointError)
    }
}
