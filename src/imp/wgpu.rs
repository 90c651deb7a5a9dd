// SPDX-License-Identifier: Parity-7.0.0 OR PolyForm-Noncommercial-1.0.0
mod bound_device;
mod entry_point;
mod error;
mod heap;
mod pixel_format;
mod render_target;
mod sampler;
mod state;
mod unbound_device;

pub use bound_device::BoundDevice;
pub use entry_point::EntryPoint;
pub(crate) use error::Error;
pub use heap::{DESCRIPTOR_STRIDE, NativeHeap};
pub(crate) use render_target::create_render_target;
pub use render_target::NativeRenderTarget;
pub(crate) use sampler::create_sampler;
pub(crate) use heap::create_heap;
pub(crate) use state::{create_blend, create_depth_stencil, create_rasterizer};
pub use state::{NativeBlend, NativeDepthStencil, NativeRasterizer};
pub use unbound_device::UnboundDevice;
