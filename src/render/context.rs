//! GPU 上下文
//!
//! 持有设备与队列，记录设备丢失状态，并提供输出表面的合成模式选择。

use crate::core::error::{RenderError, RenderResult};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

/// 设备丢失状态，由设备丢失回调写入
#[derive(Default)]
struct LostState {
    flag: AtomicBool,
    reason: Mutex<Option<String>>,
}

/// GPU 上下文
pub struct GpuContext {
    pub device: wgpu::Device,
    pub queue: wgpu::Queue,
    adapter_info: Option<wgpu::AdapterInfo>,
    lost: Arc<LostState>,
}

impl GpuContext {
    /// 创建无窗口的上下文
    ///
    /// # 返回
    ///
    /// 没有可用适配器时返回 `RenderError::NoAdapter`
    pub async fn new_headless() -> RenderResult<Self> {
        let instance = wgpu::Instance::new(wgpu::InstanceDescriptor::default());
        let adapter = instance
            .request_adapter(&wgpu::RequestAdapterOptions {
                power_preference: wgpu::PowerPreference::HighPerformance,
                compatible_surface: None,
                force_fallback_adapter: false,
            })
            .await
            .ok_or(RenderError::NoAdapter)?;

        let info = adapter.get_info();
        tracing::info!(
            target: "particle_render",
            "Using adapter {} ({:?})",
            info.name,
            info.backend
        );

        let (device, queue) = adapter
            .request_device(
                &wgpu::DeviceDescriptor {
                    label: Some("Particle Device"),
                    required_features: wgpu::Features::empty(),
                    required_limits: adapter.limits(),
                },
                None,
            )
            .await
            .map_err(|e| RenderError::DeviceRequest(e.to_string()))?;

        let mut ctx = Self::from_parts(device, queue);
        ctx.adapter_info = Some(info);
        Ok(ctx)
    }

    /// 使用嵌入程序已有的设备与队列
    pub fn from_parts(device: wgpu::Device, queue: wgpu::Queue) -> Self {
        let lost = Arc::new(LostState::default());
        let callback_state = Arc::clone(&lost);
        device.set_device_lost_callback(move |reason, message| {
            // 正常释放设备时也会触发
            if matches!(reason, wgpu::DeviceLostReason::Dropped) {
                tracing::debug!(target: "particle_render", "GPU device dropped");
                return;
            }
            tracing::error!(
                target: "particle_render",
                "GPU device lost ({:?}): {}",
                reason,
                message
            );
            if let Ok(mut slot) = callback_state.reason.lock() {
                *slot = Some(format!("{reason:?}: {message}"));
            }
            callback_state.flag.store(true, Ordering::Release);
        });

        Self {
            device,
            queue,
            adapter_info: None,
            lost,
        }
    }

    /// 设备是否已丢失
    pub fn is_lost(&self) -> bool {
        self.lost.flag.load(Ordering::Acquire)
    }

    /// 设备丢失时返回 `RenderError::DeviceLost`
    pub fn check_lost(&self) -> RenderResult<()> {
        if !self.is_lost() {
            return Ok(());
        }
        let reason = self
            .lost
            .reason
            .lock()
            .ok()
            .and_then(|slot| slot.clone())
            .unwrap_or_else(|| "unknown".to_string());
        Err(RenderError::DeviceLost(reason))
    }

    /// 由嵌入程序标记设备丢失（例如宿主使上下文失效）
    pub fn mark_lost(&self, reason: impl Into<String>) {
        if let Ok(mut slot) = self.lost.reason.lock() {
            *slot = Some(reason.into());
        }
        self.lost.flag.store(true, Ordering::Release);
    }

    pub fn adapter_info(&self) -> Option<&wgpu::AdapterInfo> {
        self.adapter_info.as_ref()
    }
}

/// 选择输出表面的合成模式
///
/// 外部采集软件需要直通（非预乘）alpha，因此只接受 `PostMultiplied`；
/// 不可用时返回错误，而不是退回到预乘模式。
pub fn capture_alpha_mode(
    supported: &[wgpu::CompositeAlphaMode],
) -> RenderResult<wgpu::CompositeAlphaMode> {
    if supported.contains(&wgpu::CompositeAlphaMode::PostMultiplied) {
        Ok(wgpu::CompositeAlphaMode::PostMultiplied)
    } else {
        Err(RenderError::UnsupportedAlphaMode(format!(
            "supported modes: {supported:?}"
        )))
    }
}

/// 采集兼容的表面配置
///
/// 使用直通 alpha，并要求绘制时以 `LoadOp::Load` 保留上一帧内容。
pub fn capture_surface_config(
    alpha_modes: &[wgpu::CompositeAlphaMode],
    format: wgpu::TextureFormat,
    width: u32,
    height: u32,
) -> RenderResult<wgpu::SurfaceConfiguration> {
    let alpha_mode = capture_alpha_mode(alpha_modes)?;
    Ok(wgpu::SurfaceConfiguration {
        usage: wgpu::TextureUsages::RENDER_ATTACHMENT | wgpu::TextureUsages::COPY_SRC,
        format,
        width: width.max(1),
        height: height.max(1),
        present_mode: wgpu::PresentMode::Fifo,
        alpha_mode,
        view_formats: vec![],
        desired_maximum_frame_latency: 2,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_capture_alpha_mode_prefers_straight_alpha() {
        let modes = [
            wgpu::CompositeAlphaMode::Opaque,
            wgpu::CompositeAlphaMode::PreMultiplied,
            wgpu::CompositeAlphaMode::PostMultiplied,
        ];
        assert_eq!(
            capture_alpha_mode(&modes).unwrap(),
            wgpu::CompositeAlphaMode::PostMultiplied
        );
    }

    #[test]
    fn test_capture_alpha_mode_rejects_premultiplied_only() {
        let modes = [
            wgpu::CompositeAlphaMode::Opaque,
            wgpu::CompositeAlphaMode::PreMultiplied,
        ];
        assert!(matches!(
            capture_alpha_mode(&modes),
            Err(RenderError::UnsupportedAlphaMode(_))
        ));
    }

    #[test]
    fn test_capture_surface_config() {
        let modes = [wgpu::CompositeAlphaMode::PostMultiplied];
        let config =
            capture_surface_config(&modes, wgpu::TextureFormat::Bgra8Unorm, 0, 720).unwrap();
        assert_eq!(config.alpha_mode, wgpu::CompositeAlphaMode::PostMultiplied);
        assert_eq!(config.width, 1);
    }
}
