// SPDX-License-Identifier: Parity-7.0.0 OR PolyForm-Noncommercial-1.0.0
use super::BoundDevice;
use super::error::scoped;
use crate::error::CreationError;
use crate::state::{AddressMode, BorderColor, CompareFunction, FilterMode, SamplerState};

fn filter(mode: FilterMode) -> wgpu::FilterMode {
    match mode {
        FilterMode::Nearest => wgpu::FilterMode::Nearest,
        FilterMode::Linear => wgpu::FilterMode::Linear,
    }
}

fn address(mode: AddressMode) -> wgpu::AddressMode {
    match mode {
        AddressMode::Clamp => wgpu::AddressMode::ClampToEdge,
        AddressMode::Wrap => wgpu::AddressMode::Repeat,
        AddressMode::Mirror => wgpu::AddressMode::MirrorRepeat,
        AddressMode::Border => wgpu::AddressMode::ClampToBorder,
    }
}

fn border(color: BorderColor) -> wgpu::SamplerBorderColor {
    match color {
        BorderColor::TransparentBlack => wgpu::SamplerBorderColor::TransparentBlack,
        BorderColor::OpaqueBlack => wgpu::SamplerBorderColor::OpaqueBlack,
        BorderColor::OpaqueWhite => wgpu::SamplerBorderColor::OpaqueWhite,
    }
}

pub(super) fn compare(function: CompareFunction) -> wgpu::CompareFunction {
    match function {
        CompareFunction::Never => wgpu::CompareFunction::Never,
        CompareFunction::Less => wgpu::CompareFunction::Less,
        CompareFunction::Equal => wgpu::CompareFunction::Equal,
        CompareFunction::LessEqual => wgpu::CompareFunction::LessEqual,
        CompareFunction::Greater => wgpu::CompareFunction::Greater,
        CompareFunction::NotEqual => wgpu::CompareFunction::NotEqual,
        CompareFunction::GreaterEqual => wgpu::CompareFunction::GreaterEqual,
        CompareFunction::Always => wgpu::CompareFunction::Always,
    }
}

pub(crate) fn create_sampler(
    bound_device: &BoundDevice,
    state: &SamplerState,
    label: &str,
) -> Result<wgpu::Sampler, CreationError> {
    if bound_device.is_lost() {
        return Err(CreationError::DeviceLost);
    }
    let modes = [state.address_u, state.address_v, state.address_w];
    let uses_border = modes.contains(&AddressMode::Border);
    if uses_border
        && !bound_device
            .device()
            .features()
            .contains(wgpu::Features::ADDRESS_MODE_CLAMP_TO_BORDER)
    {
        return Err(CreationError::Rejected {
            what: label.to_string(),
            reason: "border addressing is not supported by this device".to_string(),
        });
    }
    let descriptor = wgpu::SamplerDescriptor {
        label: Some(label),
        address_mode_u: address(state.address_u),
        address_mode_v: address(state.address_v),
        address_mode_w: address(state.address_w),
        mag_filter: filter(state.mag_filter),
        min_filter: filter(state.min_filter),
        mipmap_filter: filter(state.mipmap_filter),
        lod_min_clamp: state.min_lod,
        lod_max_clamp: state.max_lod,
        compare: state.comparison.map(compare),
        anisotropy_clamp: state.max_anisotropy,
        border_color: uses_border.then(|| border(state.border_color)),
    };
    scoped(bound_device.device(), label, || {
        bound_device.device().create_sampler(&descriptor)
    })
}
