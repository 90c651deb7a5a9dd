// SPDX-License-Identifier: Parity-7.0.0 OR PolyForm-Noncommercial-1.0.0
/*!
Pipeline state descriptors.

A descriptor is a plain value describing one immutable piece of GPU pipeline configuration.
Two descriptors are the same state exactly when all their fields compare equal; that is what
[crate::cache::StateCache] deduplicates on.

Each family ships with the named presets most renderers reach for, e.g. [SamplerState::DEFAULT]
or [RasterizerState::CULL_BACK_FACE].
*/

mod blend;
mod depth_stencil;
mod rasterizer;
mod sampler;

pub use blend::{BlendComponent, BlendFactor, BlendOperation, BlendState, ColorWriteMask, TargetBlendState};
pub use depth_stencil::{DepthStencilState, StencilFace, StencilOperation};
pub use rasterizer::{CullingMode, FillMode, RasterizerState};
pub use sampler::{AddressMode, BorderColor, FilterMode, SamplerState};

use crate::error::InvalidState;
use std::fmt::Debug;

/// Maximum number of simultaneously bound render targets a blend state describes.
pub const MAX_RENDER_TARGETS: usize = 8;

/**
A value-comparable description of pipeline state.

Implementors must use structural equality. Reference identity has no meaning for a descriptor.
*/
pub trait StateDescriptor: Clone + PartialEq + Debug + Send + Sync + 'static {
    /// Human-readable family name, used in debug labels and errors.
    const KIND: &'static str;

    /// Rejects configurations no device could create.
    fn validate(&self) -> Result<(), InvalidState> {
        Ok(())
    }
}

/// Comparison used by depth, stencil and comparison-sampler tests.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CompareFunction {
    Never,
    Less,
    Equal,
    LessEqual,
    Greater,
    NotEqual,
    GreaterEqual,
    Always,
}

pub(crate) fn invalid<D: StateDescriptor>(reason: impl Into<String>) -> InvalidState {
    InvalidState {
        kind: D::KIND,
        reason: reason.into(),
    }
}
