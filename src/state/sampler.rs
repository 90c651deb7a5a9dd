// SPDX-License-Identifier: Parity-7.0.0 OR PolyForm-Noncommercial-1.0.0
use super::{CompareFunction, StateDescriptor, invalid};
use crate::error::InvalidState;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FilterMode {
    Nearest,
    Linear,
}

/// How texture coordinates outside `[0,1]` are resolved.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AddressMode {
    Clamp,
    Wrap,
    Mirror,
    Border,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BorderColor {
    TransparentBlack,
    OpaqueBlack,
    OpaqueWhite,
}

/// Texture sampler configuration.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SamplerState {
    pub min_filter: FilterMode,
    pub mag_filter: FilterMode,
    pub mipmap_filter: FilterMode,
    pub address_u: AddressMode,
    pub address_v: AddressMode,
    pub address_w: AddressMode,
    ///Only consulted when an address mode is [AddressMode::Border].
    pub border_color: BorderColor,
    ///1 disables anisotropic filtering.
    pub max_anisotropy: u16,
    ///When set, the sampler is a comparison sampler.
    pub comparison: Option<CompareFunction>,
    pub min_lod: f32,
    pub max_lod: f32,
}

impl SamplerState {
    pub const MAX_ANISOTROPY: u16 = 16;

    /// Linear filtering, clamped coordinates.
    pub const DEFAULT: SamplerState = SamplerState {
        min_filter: FilterMode::Linear,
        mag_filter: FilterMode::Linear,
        mipmap_filter: FilterMode::Linear,
        address_u: AddressMode::Clamp,
        address_v: AddressMode::Clamp,
        address_w: AddressMode::Clamp,
        border_color: BorderColor::TransparentBlack,
        max_anisotropy: 1,
        comparison: None,
        min_lod: 0.0,
        max_lod: 32.0,
    };

    /// Linear filtering, wrapped coordinates.
    pub const WRAPPING: SamplerState = SamplerState {
        address_u: AddressMode::Wrap,
        address_v: AddressMode::Wrap,
        address_w: AddressMode::Wrap,
        ..Self::DEFAULT
    };

    pub const ANISOTROPIC_FILTERING: SamplerState = SamplerState {
        max_anisotropy: Self::MAX_ANISOTROPY,
        ..Self::DEFAULT
    };

    /// Nearest-neighbour filtering, clamped coordinates. The usual choice for pixel art.
    pub const POINT_FILTERING: SamplerState = SamplerState {
        min_filter: FilterMode::Nearest,
        mag_filter: FilterMode::Nearest,
        mipmap_filter: FilterMode::Nearest,
        ..Self::DEFAULT
    };

    pub const POINT_FILTERING_WRAPPING: SamplerState = SamplerState {
        address_u: AddressMode::Wrap,
        address_v: AddressMode::Wrap,
        address_w: AddressMode::Wrap,
        ..Self::POINT_FILTERING
    };

    /// The samplers every context creates up front.
    pub const PREDEFINED: [SamplerState; 5] = [
        Self::DEFAULT,
        Self::WRAPPING,
        Self::ANISOTROPIC_FILTERING,
        Self::POINT_FILTERING,
        Self::POINT_FILTERING_WRAPPING,
    ];
}

impl Default for SamplerState {
    fn default() -> Self {
        Self::DEFAULT
    }
}

impl StateDescriptor for SamplerState {
    const KIND: &'static str = "Sampler";

    fn validate(&self) -> Result<(), InvalidState> {
        if !(1..=Self::MAX_ANISOTROPY).contains(&self.max_anisotropy) {
            return Err(invalid::<Self>(format!(
                "max_anisotropy must be in 1..={}, got {}",
                Self::MAX_ANISOTROPY,
                self.max_anisotropy
            )));
        }
        if self.max_anisotropy > 1
            && (self.min_filter != FilterMode::Linear
                || self.mag_filter != FilterMode::Linear
                || self.mipmap_filter != FilterMode::Linear)
        {
            return Err(invalid::<Self>("anisotropic filtering requires linear filters"));
        }
        if self.min_lod.is_nan() || self.max_lod.is_nan() || self.min_lod < 0.0 {
            return Err(invalid::<Self>("level-of-detail clamps must be non-negative numbers"));
        }
        if self.min_lod > self.max_lod {
            return Err(invalid::<Self>(format!(
                "min_lod {} exceeds max_lod {}",
                self.min_lod, self.max_lod
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn presets_validate() {
        for preset in SamplerState::PREDEFINED {
            assert_eq!(preset.validate(), Ok(()), "{preset:?}");
        }
    }

    #[test]
    fn presets_are_distinct() {
        let p = SamplerState::PREDEFINED;
        for (i, a) in p.iter().enumerate() {
            for b in &p[i + 1..] {
                assert_ne!(a, b);
            }
        }
    }

    #[test]
    fn anisotropy_needs_linear_filters() {
        let s = SamplerState {
            max_anisotropy: 8,
            ..SamplerState::POINT_FILTERING
        };
        let err = s.validate().unwrap_err();
        assert_eq!(err.kind, "Sampler");
    }

    #[test]
    fn inverted_lod_range_is_rejected() {
        let s = SamplerState {
            min_lod: 4.0,
            max_lod: 1.0,
            ..SamplerState::DEFAULT
        };
        assert!(s.validate().is_err());
        let s = SamplerState {
            max_lod: f32::NAN,
            ..SamplerState::DEFAULT
        };
        assert!(s.validate().is_err());
    }
}
