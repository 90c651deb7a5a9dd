// SPDX-License-Identifier: Parity-7.0.0 OR PolyForm-Noncommercial-1.0.0
//at the moment we only support wgpu; without it, HeadlessDevice is the only device
//wgpu handles are !Send on wasm32, which GraphicsDevice requires

#[cfg(all(feature = "backend_wgpu", not(target_arch = "wasm32")))]
mod wgpu;

#[cfg(all(feature = "backend_wgpu", not(target_arch = "wasm32")))]
pub use wgpu::*;
