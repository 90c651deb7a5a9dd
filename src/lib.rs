// SPDX-License-Identifier: Parity-7.0.0 OR PolyForm-Noncommercial-1.0.0
/*! gpu_state_cache keeps GPU pipeline state, descriptor slots and render targets alive across
the life of a graphics device, including its death.

Three pieces do the work:

| Piece                                    | Job                                                                 |
|------------------------------------------|---------------------------------------------------------------------|
| [cache::StateCache]                      | One native object per distinct state descriptor                     |
| [descriptor::DescriptorAllocator]        | Bump allocation of descriptor slots from fixed-size heaps           |
| [lifecycle::DeviceLifecycleTracker]      | Drives every registered resource through device loss and recovery   |

[context::GraphicsContext] ties them to one [backend::GraphicsDevice] and is where most users
start.

# Device loss

GPU devices disappear: drivers reset, adapters get unplugged, the OS reclaims the GPU. When that
happens every native handle is garbage. Resources here separate their *logical* configuration,
which survives, from their *native* handles, which are released on loss and rebuilt on reset.
Recovery is best-effort: every resource is attempted and failures are reported together.

```
use gpu_state_cache::context::GraphicsContext;
use gpu_state_cache::headless::HeadlessDevice;
use gpu_state_cache::pixel_formats::PixelFormat;
use gpu_state_cache::render_target::RenderTargetConfig;
use gpu_state_cache::state::SamplerState;

let mut context = GraphicsContext::new(HeadlessDevice::new()).unwrap();
let target = context
    .create_render_target(RenderTargetConfig::new("scene", 1280, 720, PixelFormat::RGBA8UNorm))
    .unwrap();

context.device().simulate_loss();
context.poll_device();
assert!(context.sampler(&SamplerState::WRAPPING).is_err());

let replacement = context.device().successor();
context.device_reset(replacement).unwrap();
assert!(target.lock().native().is_ok());
```

# Backends

With the default `backend_wgpu` feature, [device::BoundDevice] implements
[backend::GraphicsDevice] on top of [wgpu](https://wgpu.rs). [headless::HeadlessDevice] is always
available and needs no GPU.

wgpu objects cannot cross threads on wasm32, while [backend::GraphicsDevice] must be
`Send + Sync`, so the wgpu backend is native-only. On wasm32 [headless::HeadlessDevice] is the
only device.
*/

pub mod backend;
pub mod cache;
pub mod context;
pub mod descriptor;
#[cfg(all(feature = "backend_wgpu", not(target_arch = "wasm32")))]
pub mod device;
#[cfg(all(feature = "backend_wgpu", not(target_arch = "wasm32")))]
pub mod entry_point;
pub mod error;
pub mod headless;
mod imp;
pub mod lifecycle;
pub mod pixel_formats;
pub mod render_target;
pub mod state;
mod sys;

pub use context::GraphicsContext;
pub use error::Error;
