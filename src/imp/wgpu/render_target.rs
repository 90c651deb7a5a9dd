// SPDX-License-Identifier: Parity-7.0.0 OR PolyForm-Noncommercial-1.0.0
use super::BoundDevice;
use super::error::scoped;
use super::pixel_format::texture_format;
use crate::descriptor::DescriptorHandle;
use crate::error::CreationError;
use crate::render_target::RenderTargetConfig;

/// An offscreen color texture and its view.
#[derive(Debug)]
pub struct NativeRenderTarget {
    texture: wgpu::Texture,
    view: wgpu::TextureView,
    descriptor: DescriptorHandle,
}

impl NativeRenderTarget {
    pub fn texture(&self) -> &wgpu::Texture {
        &self.texture
    }
    pub fn view(&self) -> &wgpu::TextureView {
        &self.view
    }
    pub fn descriptor(&self) -> DescriptorHandle {
        self.descriptor
    }
}

impl Drop for NativeRenderTarget {
    fn drop(&mut self) {
        self.texture.destroy();
    }
}

pub(crate) fn create_render_target(
    bound_device: &BoundDevice,
    config: &RenderTargetConfig,
    descriptor: DescriptorHandle,
) -> Result<NativeRenderTarget, CreationError> {
    if bound_device.is_lost() {
        return Err(CreationError::DeviceLost);
    }
    let max = bound_device.device().limits().max_texture_dimension_2d;
    if config.width > max || config.height > max {
        return Err(CreationError::Rejected {
            what: config.name.clone(),
            reason: format!("{}x{} exceeds {max}", config.width, config.height),
        });
    }
    let format = texture_format(config.format);
    let allowed = bound_device
        .adapter()
        .get_texture_format_features(format)
        .allowed_usages;
    if !allowed.contains(wgpu::TextureUsages::RENDER_ATTACHMENT) {
        return Err(CreationError::Rejected {
            what: config.name.clone(),
            reason: format!("{format:?} is not renderable on this adapter"),
        });
    }
    let texture = scoped(bound_device.device(), &config.name, || {
        bound_device.device().create_texture(&wgpu::TextureDescriptor {
            label: Some(&config.name),
            size: wgpu::Extent3d {
                width: config.width,
                height: config.height,
                depth_or_array_layers: 1,
            },
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format,
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT | wgpu::TextureUsages::TEXTURE_BINDING,
            view_formats: &[],
        })
    })?;
    let view = texture.create_view(&wgpu::TextureViewDescriptor {
        label: Some(&config.name),
        ..Default::default()
    });
    Ok(NativeRenderTarget {
        texture,
        view,
        descriptor,
    })
}
