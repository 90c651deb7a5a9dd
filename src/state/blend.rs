// SPDX-License-Identifier: Parity-7.0.0 OR PolyForm-Noncommercial-1.0.0
use super::{MAX_RENDER_TARGETS, StateDescriptor, invalid};
use crate::error::InvalidState;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BlendFactor {
    Zero,
    One,
    SourceColor,
    InverseSourceColor,
    SourceAlpha,
    InverseSourceAlpha,
    DestinationColor,
    InverseDestinationColor,
    DestinationAlpha,
    InverseDestinationAlpha,
    SourceAlphaSaturate,
    BlendFactor,
    InverseBlendFactor,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BlendOperation {
    Add,
    Subtract,
    ReverseSubtract,
    Min,
    Max,
}

/// `source * src_factor (op) destination * dst_factor`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BlendComponent {
    pub src_factor: BlendFactor,
    pub dst_factor: BlendFactor,
    pub operation: BlendOperation,
}

impl BlendComponent {
    pub const REPLACE: BlendComponent = BlendComponent {
        src_factor: BlendFactor::One,
        dst_factor: BlendFactor::Zero,
        operation: BlendOperation::Add,
    };
}

/// Bitmask of writable color channels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ColorWriteMask(pub u8);

impl ColorWriteMask {
    pub const NONE: ColorWriteMask = ColorWriteMask(0);
    pub const RED: ColorWriteMask = ColorWriteMask(1);
    pub const GREEN: ColorWriteMask = ColorWriteMask(2);
    pub const BLUE: ColorWriteMask = ColorWriteMask(4);
    pub const ALPHA: ColorWriteMask = ColorWriteMask(8);
    pub const ALL: ColorWriteMask = ColorWriteMask(0xF);

    pub const fn is_empty(self) -> bool {
        self.0 & Self::ALL.0 == 0
    }
}

/// Blending for a single render target slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TargetBlendState {
    pub enabled: bool,
    pub color: BlendComponent,
    pub alpha: BlendComponent,
    pub write_mask: ColorWriteMask,
}

impl TargetBlendState {
    pub const OPAQUE: TargetBlendState = TargetBlendState {
        enabled: false,
        color: BlendComponent::REPLACE,
        alpha: BlendComponent::REPLACE,
        write_mask: ColorWriteMask::ALL,
    };

    const fn blended(src: BlendFactor, dst: BlendFactor) -> TargetBlendState {
        TargetBlendState {
            enabled: true,
            color: BlendComponent {
                src_factor: src,
                dst_factor: dst,
                operation: BlendOperation::Add,
            },
            alpha: BlendComponent::REPLACE,
            write_mask: ColorWriteMask::ALL,
        }
    }
}

/**
Output-merger blend configuration.

When `independent_blend` is false only `render_targets[0]` is meaningful and it applies to every
bound target.
*/
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BlendState {
    pub alpha_to_coverage: bool,
    pub independent_blend: bool,
    pub render_targets: [TargetBlendState; MAX_RENDER_TARGETS],
}

impl BlendState {
    const fn uniform(target: TargetBlendState) -> BlendState {
        BlendState {
            alpha_to_coverage: false,
            independent_blend: false,
            render_targets: [target; MAX_RENDER_TARGETS],
        }
    }

    pub const NO_BLENDING: BlendState = Self::uniform(TargetBlendState::OPAQUE);
    /// Classic alpha blending.
    pub const MODULATED: BlendState = Self::uniform(TargetBlendState::blended(
        BlendFactor::SourceAlpha,
        BlendFactor::InverseSourceAlpha,
    ));
    pub const ADDITIVE: BlendState =
        Self::uniform(TargetBlendState::blended(BlendFactor::SourceAlpha, BlendFactor::One));
    /// For colors already multiplied by their alpha.
    pub const PREMULTIPLIED: BlendState = Self::uniform(TargetBlendState::blended(
        BlendFactor::One,
        BlendFactor::InverseSourceAlpha,
    ));
    /// Inverts the destination where the source is bright.
    pub const INVERTED: BlendState = Self::uniform(TargetBlendState::blended(
        BlendFactor::InverseDestinationColor,
        BlendFactor::InverseSourceColor,
    ));

    /// The blend settings that actually apply to `slot`, or `None` past [MAX_RENDER_TARGETS].
    pub fn target(&self, slot: usize) -> Option<&TargetBlendState> {
        if slot >= MAX_RENDER_TARGETS {
            None
        } else if self.independent_blend {
            self.render_targets.get(slot)
        } else {
            self.render_targets.first()
        }
    }

    /// The blend settings that apply to every slot, with shared blending expanded.
    pub fn effective_targets(&self) -> [TargetBlendState; MAX_RENDER_TARGETS] {
        if self.independent_blend {
            self.render_targets
        } else {
            [self.render_targets[0]; MAX_RENDER_TARGETS]
        }
    }
}

impl Default for BlendState {
    fn default() -> Self {
        Self::NO_BLENDING
    }
}

impl StateDescriptor for BlendState {
    const KIND: &'static str = "Blend";

    fn validate(&self) -> Result<(), InvalidState> {
        let used = if self.independent_blend {
            &self.render_targets[..]
        } else {
            &self.render_targets[..1]
        };
        if used.iter().all(|t| t.write_mask.is_empty()) {
            return Err(invalid::<Self>("no render target has a writable channel"));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn presets_validate() {
        for preset in [
            BlendState::NO_BLENDING,
            BlendState::MODULATED,
            BlendState::ADDITIVE,
            BlendState::PREMULTIPLIED,
            BlendState::INVERTED,
        ] {
            assert_eq!(preset.validate(), Ok(()));
        }
    }

    #[test]
    fn shared_blend_reads_slot_zero() {
        let mut state = BlendState::ADDITIVE;
        state.render_targets[3] = TargetBlendState::OPAQUE;
        assert_eq!(state.target(3), Some(&state.render_targets[0]));
        assert_eq!(state.effective_targets()[3], state.render_targets[0]);
        state.independent_blend = true;
        assert_eq!(state.target(3), Some(&TargetBlendState::OPAQUE));
        assert_eq!(state.effective_targets()[3], TargetBlendState::OPAQUE);
        assert_eq!(state.target(MAX_RENDER_TARGETS), None);
    }

    #[test]
    fn blended_presets_keep_source_alpha() {
        for preset in [
            BlendState::MODULATED,
            BlendState::ADDITIVE,
            BlendState::PREMULTIPLIED,
            BlendState::INVERTED,
        ] {
            assert_eq!(preset.render_targets[0].alpha, BlendComponent::REPLACE);
        }
        let inverted = BlendState::INVERTED.render_targets[0].color;
        assert_eq!(inverted.src_factor, BlendFactor::InverseDestinationColor);
        assert_eq!(inverted.dst_factor, BlendFactor::InverseSourceColor);
    }

    #[test]
    fn fully_masked_state_is_rejected() {
        let mut state = BlendState::NO_BLENDING;
        state.render_targets[0].write_mask = ColorWriteMask::NONE;
        assert!(state.validate().is_err());
        // an independent target that still writes rescues it
        state.independent_blend = true;
        state.render_targets[0].write_mask = ColorWriteMask::NONE;
        for t in &mut state.render_targets[1..] {
            t.write_mask = ColorWriteMask::NONE;
        }
        state.render_targets[5].write_mask = ColorWriteMask::RED;
        assert_eq!(state.validate(), Ok(()));
    }
}
