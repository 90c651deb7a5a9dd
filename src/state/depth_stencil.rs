// SPDX-License-Identifier: Parity-7.0.0 OR PolyForm-Noncommercial-1.0.0
use super::{CompareFunction, StateDescriptor, invalid};
use crate::error::InvalidState;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StencilOperation {
    Keep,
    Zero,
    Replace,
    IncrementClamp,
    DecrementClamp,
    Invert,
    IncrementWrap,
    DecrementWrap,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct StencilFace {
    pub fail_operation: StencilOperation,
    pub depth_fail_operation: StencilOperation,
    pub pass_operation: StencilOperation,
    pub comparison: CompareFunction,
}

impl StencilFace {
    pub const KEEP: StencilFace = StencilFace {
        fail_operation: StencilOperation::Keep,
        depth_fail_operation: StencilOperation::Keep,
        pass_operation: StencilOperation::Keep,
        comparison: CompareFunction::Always,
    };
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DepthStencilState {
    pub depth_enabled: bool,
    pub depth_write: bool,
    pub depth_comparison: CompareFunction,
    pub stencil_enabled: bool,
    pub stencil_read_mask: u8,
    pub stencil_write_mask: u8,
    pub front_face: StencilFace,
    pub back_face: StencilFace,
}

impl DepthStencilState {
    pub const DISABLED: DepthStencilState = DepthStencilState {
        depth_enabled: false,
        depth_write: false,
        depth_comparison: CompareFunction::Always,
        stencil_enabled: false,
        stencil_read_mask: 0xFF,
        stencil_write_mask: 0xFF,
        front_face: StencilFace::KEEP,
        back_face: StencilFace::KEEP,
    };

    pub const DEPTH_ENABLED: DepthStencilState = DepthStencilState {
        depth_enabled: true,
        depth_write: true,
        depth_comparison: CompareFunction::Less,
        ..Self::DISABLED
    };

    /// Depth-tested but read-only, e.g. for transparent geometry.
    pub const DEPTH_ENABLED_NO_WRITE: DepthStencilState = DepthStencilState {
        depth_write: false,
        ..Self::DEPTH_ENABLED
    };
}

impl Default for DepthStencilState {
    fn default() -> Self {
        Self::DISABLED
    }
}

impl StateDescriptor for DepthStencilState {
    const KIND: &'static str = "Depth/Stencil";

    fn validate(&self) -> Result<(), InvalidState> {
        if self.depth_write && !self.depth_enabled {
            return Err(invalid::<Self>("depth writes require depth testing"));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn write_without_test_is_rejected() {
        let s = DepthStencilState {
            depth_write: true,
            ..DepthStencilState::DISABLED
        };
        assert_eq!(s.validate().unwrap_err().kind, "Depth/Stencil");
        assert_eq!(DepthStencilState::DEPTH_ENABLED_NO_WRITE.validate(), Ok(()));
    }
}
