// SPDX-License-Identifier: Parity-7.0.0 OR PolyForm-Noncommercial-1.0.0
use crate::pixel_formats::PixelFormat;

pub(super) const fn texture_format(format: PixelFormat) -> wgpu::TextureFormat {
    match format {
        PixelFormat::R8UNorm => wgpu::TextureFormat::R8Unorm,
        PixelFormat::R16Float => wgpu::TextureFormat::R16Float,
        PixelFormat::R32Float => wgpu::TextureFormat::R32Float,
        PixelFormat::R32SInt => wgpu::TextureFormat::R32Sint,
        PixelFormat::RGFloat => wgpu::TextureFormat::Rg32Float,
        PixelFormat::RGBA8UNorm => wgpu::TextureFormat::Rgba8Unorm,
        PixelFormat::RGBA8UnormSRGB => wgpu::TextureFormat::Rgba8UnormSrgb,
        PixelFormat::BGRA8UNormSRGB => wgpu::TextureFormat::Bgra8UnormSrgb,
        PixelFormat::RGBA16Unorm => wgpu::TextureFormat::Rgba16Unorm,
        PixelFormat::RGBA32Float => wgpu::TextureFormat::Rgba32Float,
    }
}
