// SPDX-License-Identifier: Parity-7.0.0 OR PolyForm-Noncommercial-1.0.0
//! Pixel formats a render target can be created with.
//!
//! Formats are a runtime value here: a render target keeps its format across device loss and
//! recreates its native texture from it, so the format has to be stored, not encoded in a type.

/// Color formats usable as render targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PixelFormat {
    /// 8-bit normalized single channel.
    R8UNorm,
    R16Float,
    R32Float,
    R32SInt,
    /// Two 32-bit float channels.
    RGFloat,
    RGBA8UNorm,
    RGBA8UnormSRGB,
    /// Typical swapchain format.
    BGRA8UNormSRGB,
    RGBA16Unorm,
    RGBA32Float,
}

impl PixelFormat {
    pub const fn bytes_per_pixel(self) -> u8 {
        match self {
            PixelFormat::R8UNorm => 1,
            PixelFormat::R16Float => 2,
            PixelFormat::R32Float | PixelFormat::R32SInt => 4,
            PixelFormat::RGBA8UNorm | PixelFormat::RGBA8UnormSRGB | PixelFormat::BGRA8UNormSRGB => 4,
            PixelFormat::RGFloat | PixelFormat::RGBA16Unorm => 8,
            PixelFormat::RGBA32Float => 16,
        }
    }

    pub const fn is_srgb(self) -> bool {
        matches!(self, PixelFormat::RGBA8UnormSRGB | PixelFormat::BGRA8UNormSRGB)
    }

    /// Bytes needed for a `width` x `height` image, or `None` on overflow.
    pub fn image_size(self, width: u32, height: u32) -> Option<u64> {
        u64::from(width)
            .checked_mul(u64::from(height))?
            .checked_mul(u64::from(self.bytes_per_pixel()))
    }
}
