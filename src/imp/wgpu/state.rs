// SPDX-License-Identifier: Parity-7.0.0 OR PolyForm-Noncommercial-1.0.0
/*!
Blend, rasterizer and depth-stencil state for wgpu.

wgpu has no standalone objects for these; they are plain values baked into a render pipeline.
The "native" state here is the converted value, checked against the device's features so that
pipeline creation does not fail on it later.
*/

use super::BoundDevice;
use super::sampler::compare;
use crate::error::CreationError;
use crate::state::{
    BlendComponent, BlendFactor, BlendOperation, BlendState, CullingMode, DepthStencilState,
    FillMode, MAX_RENDER_TARGETS, RasterizerState, StencilFace, StencilOperation,
};

fn require(
    bound_device: &BoundDevice,
    feature: wgpu::Features,
    label: &str,
    what: &str,
) -> Result<(), CreationError> {
    if bound_device.device().features().contains(feature) {
        Ok(())
    } else {
        Err(CreationError::Rejected {
            what: label.to_string(),
            reason: format!("{what} is not supported by this device"),
        })
    }
}

fn ensure_alive(bound_device: &BoundDevice) -> Result<(), CreationError> {
    if bound_device.is_lost() {
        Err(CreationError::DeviceLost)
    } else {
        Ok(())
    }
}

/// Blend state for every color target slot.
#[derive(Debug, Clone, PartialEq)]
pub struct NativeBlend {
    pub label: String,
    pub alpha_to_coverage: bool,
    pub targets: [(Option<wgpu::BlendState>, wgpu::ColorWrites); MAX_RENDER_TARGETS],
}

impl NativeBlend {
    /// The color target for `slot` rendering to `format`, or `None` past the last slot.
    pub fn color_target(
        &self,
        slot: usize,
        format: wgpu::TextureFormat,
    ) -> Option<wgpu::ColorTargetState> {
        let &(blend, write_mask) = self.targets.get(slot)?;
        Some(wgpu::ColorTargetState {
            format,
            blend,
            write_mask,
        })
    }
}

fn factor(factor: BlendFactor) -> wgpu::BlendFactor {
    match factor {
        BlendFactor::Zero => wgpu::BlendFactor::Zero,
        BlendFactor::One => wgpu::BlendFactor::One,
        BlendFactor::SourceColor => wgpu::BlendFactor::Src,
        BlendFactor::InverseSourceColor => wgpu::BlendFactor::OneMinusSrc,
        BlendFactor::SourceAlpha => wgpu::BlendFactor::SrcAlpha,
        BlendFactor::InverseSourceAlpha => wgpu::BlendFactor::OneMinusSrcAlpha,
        BlendFactor::DestinationColor => wgpu::BlendFactor::Dst,
        BlendFactor::InverseDestinationColor => wgpu::BlendFactor::OneMinusDst,
        BlendFactor::DestinationAlpha => wgpu::BlendFactor::DstAlpha,
        BlendFactor::InverseDestinationAlpha => wgpu::BlendFactor::OneMinusDstAlpha,
        BlendFactor::SourceAlphaSaturate => wgpu::BlendFactor::SrcAlphaSaturated,
        BlendFactor::BlendFactor => wgpu::BlendFactor::Constant,
        BlendFactor::InverseBlendFactor => wgpu::BlendFactor::OneMinusConstant,
    }
}

fn component(c: &BlendComponent) -> wgpu::BlendComponent {
    let operation = match c.operation {
        BlendOperation::Add => wgpu::BlendOperation::Add,
        BlendOperation::Subtract => wgpu::BlendOperation::Subtract,
        BlendOperation::ReverseSubtract => wgpu::BlendOperation::ReverseSubtract,
        BlendOperation::Min => wgpu::BlendOperation::Min,
        BlendOperation::Max => wgpu::BlendOperation::Max,
    };
    match operation {
        //wgpu insists on One for min/max, which ignore the factors anyway
        wgpu::BlendOperation::Min | wgpu::BlendOperation::Max => wgpu::BlendComponent {
            src_factor: wgpu::BlendFactor::One,
            dst_factor: wgpu::BlendFactor::One,
            operation,
        },
        _ => wgpu::BlendComponent {
            src_factor: factor(c.src_factor),
            dst_factor: factor(c.dst_factor),
            operation,
        },
    }
}

pub(crate) fn create_blend(
    bound_device: &BoundDevice,
    state: &BlendState,
    label: &str,
) -> Result<NativeBlend, CreationError> {
    ensure_alive(bound_device)?;
    let targets = state.effective_targets().map(|target| {
        let blend = target.enabled.then(|| wgpu::BlendState {
            color: component(&target.color),
            alpha: component(&target.alpha),
        });
        let write_mask = wgpu::ColorWrites::from_bits_truncate(u32::from(target.write_mask.0));
        (blend, write_mask)
    });
    Ok(NativeBlend {
        label: label.to_string(),
        alpha_to_coverage: state.alpha_to_coverage,
        targets,
    })
}

#[derive(Debug, Clone, PartialEq)]
pub struct NativeRasterizer {
    pub label: String,
    pub primitive: wgpu::PrimitiveState,
    pub bias: wgpu::DepthBiasState,
    pub multisample: bool,
}

pub(crate) fn create_rasterizer(
    bound_device: &BoundDevice,
    state: &RasterizerState,
    label: &str,
) -> Result<NativeRasterizer, CreationError> {
    ensure_alive(bound_device)?;
    let polygon_mode = match state.fill_mode {
        FillMode::Solid => wgpu::PolygonMode::Fill,
        FillMode::Wireframe => {
            require(bound_device, wgpu::Features::POLYGON_MODE_LINE, label, "wireframe fill")?;
            wgpu::PolygonMode::Line
        }
    };
    if !state.depth_clipping {
        require(bound_device, wgpu::Features::DEPTH_CLIP_CONTROL, label, "disabling depth clipping")?;
    }
    let cull_mode = match state.culling_mode {
        CullingMode::None => None,
        CullingMode::Front => Some(wgpu::Face::Front),
        CullingMode::Back => Some(wgpu::Face::Back),
    };
    let front_face = if state.front_counter_clockwise {
        wgpu::FrontFace::Ccw
    } else {
        wgpu::FrontFace::Cw
    };
    Ok(NativeRasterizer {
        label: label.to_string(),
        primitive: wgpu::PrimitiveState {
            topology: wgpu::PrimitiveTopology::TriangleList,
            strip_index_format: None,
            front_face,
            cull_mode,
            unclipped_depth: !state.depth_clipping,
            polygon_mode,
            conservative: false,
        },
        bias: wgpu::DepthBiasState {
            constant: state.depth_bias,
            slope_scale: state.slope_scaled_depth_bias,
            clamp: state.depth_bias_clamp,
        },
        multisample: state.multisampling,
    })
}

#[derive(Debug, Clone, PartialEq)]
pub struct NativeDepthStencil {
    pub label: String,
    pub depth_write_enabled: bool,
    pub depth_compare: wgpu::CompareFunction,
    pub stencil: wgpu::StencilState,
}

impl NativeDepthStencil {
    /// Combines with the depth buffer format and the rasterizer's bias into pipeline state.
    pub fn for_format(
        &self,
        format: wgpu::TextureFormat,
        bias: wgpu::DepthBiasState,
    ) -> wgpu::DepthStencilState {
        wgpu::DepthStencilState {
            format,
            depth_write_enabled: self.depth_write_enabled,
            depth_compare: self.depth_compare,
            stencil: self.stencil.clone(),
            bias,
        }
    }
}

fn stencil_operation(operation: StencilOperation) -> wgpu::StencilOperation {
    match operation {
        StencilOperation::Keep => wgpu::StencilOperation::Keep,
        StencilOperation::Zero => wgpu::StencilOperation::Zero,
        StencilOperation::Replace => wgpu::StencilOperation::Replace,
        StencilOperation::IncrementClamp => wgpu::StencilOperation::IncrementClamp,
        StencilOperation::DecrementClamp => wgpu::StencilOperation::DecrementClamp,
        StencilOperation::Invert => wgpu::StencilOperation::Invert,
        StencilOperation::IncrementWrap => wgpu::StencilOperation::IncrementWrap,
        StencilOperation::DecrementWrap => wgpu::StencilOperation::DecrementWrap,
    }
}

fn stencil_face(face: &StencilFace) -> wgpu::StencilFaceState {
    wgpu::StencilFaceState {
        compare: compare(face.comparison),
        fail_op: stencil_operation(face.fail_operation),
        depth_fail_op: stencil_operation(face.depth_fail_operation),
        pass_op: stencil_operation(face.pass_operation),
    }
}

pub(crate) fn create_depth_stencil(
    bound_device: &BoundDevice,
    state: &DepthStencilState,
    label: &str,
) -> Result<NativeDepthStencil, CreationError> {
    ensure_alive(bound_device)?;
    let (depth_write_enabled, depth_compare) = if state.depth_enabled {
        (state.depth_write, compare(state.depth_comparison))
    } else {
        (false, wgpu::CompareFunction::Always)
    };
    let stencil = if state.stencil_enabled {
        wgpu::StencilState {
            front: stencil_face(&state.front_face),
            back: stencil_face(&state.back_face),
            read_mask: u32::from(state.stencil_read_mask),
            write_mask: u32::from(state.stencil_write_mask),
        }
    } else {
        wgpu::StencilState::default()
    };
    Ok(NativeDepthStencil {
        label: label.to_string(),
        depth_write_enabled,
        depth_compare,
        stencil,
    })
}
