// SPDX-License-Identifier: Parity-7.0.0 OR PolyForm-Noncommercial-1.0.0
use super::{StateDescriptor, invalid};
use crate::error::InvalidState;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CullingMode {
    None,
    Front,
    Back,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FillMode {
    Wireframe,
    Solid,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RasterizerState {
    pub culling_mode: CullingMode,
    pub fill_mode: FillMode,
    pub front_counter_clockwise: bool,
    pub depth_bias: i32,
    pub depth_bias_clamp: f32,
    pub slope_scaled_depth_bias: f32,
    pub depth_clipping: bool,
    pub antialiased_lines: bool,
    pub multisampling: bool,
    pub scissor_testing: bool,
}

impl RasterizerState {
    pub const CULL_BACK_FACE: RasterizerState = RasterizerState {
        culling_mode: CullingMode::Back,
        fill_mode: FillMode::Solid,
        front_counter_clockwise: false,
        depth_bias: 0,
        depth_bias_clamp: 0.0,
        slope_scaled_depth_bias: 0.0,
        depth_clipping: true,
        antialiased_lines: false,
        multisampling: false,
        scissor_testing: false,
    };

    pub const CULL_FRONT_FACE: RasterizerState = RasterizerState {
        culling_mode: CullingMode::Front,
        ..Self::CULL_BACK_FACE
    };

    pub const NO_CULLING: RasterizerState = RasterizerState {
        culling_mode: CullingMode::None,
        ..Self::CULL_BACK_FACE
    };

    pub const WIREFRAME: RasterizerState = RasterizerState {
        fill_mode: FillMode::Wireframe,
        ..Self::NO_CULLING
    };
}

impl Default for RasterizerState {
    fn default() -> Self {
        Self::CULL_BACK_FACE
    }
}

impl StateDescriptor for RasterizerState {
    const KIND: &'static str = "Rasterizer";

    fn validate(&self) -> Result<(), InvalidState> {
        if !self.depth_bias_clamp.is_finite() || !self.slope_scaled_depth_bias.is_finite() {
            return Err(invalid::<Self>("depth bias terms must be finite"));
        }
        Ok(())
    }
}
