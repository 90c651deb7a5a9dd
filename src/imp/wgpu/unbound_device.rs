// SPDX-License-Identifier: Parity-7.0.0 OR PolyForm-Noncommercial-1.0.0
use crate::entry_point::EntryPoint;

#[derive(Debug)]
pub struct UnboundDevice {
    pub(crate) adapter: wgpu::Adapter,
}

impl UnboundDevice {
    /// Picks an adapter. No surface is involved; render targets are offscreen textures.
    pub async fn pick(entry_point: &EntryPoint) -> Result<UnboundDevice, super::Error> {
        let options = wgpu::RequestAdapterOptions {
            power_preference: wgpu::PowerPreference::from_env().unwrap_or_default(),
            force_fallback_adapter: false,
            compatible_surface: None,
        };
        let adapter = entry_point.0.0.request_adapter(&options).await?;
        logwise::info_sync!(
            "picked adapter {info}",
            info = logwise::privacy::LogIt(&adapter.get_info())
        );
        Ok(UnboundDevice { adapter })
    }
}
