//! 离屏渲染目标
//!
//! 无窗口时的输出纹理，可以回读像素用于采集或测试。

use super::context::GpuContext;
use crate::core::error::{RenderError, RenderResult};
use wgpu::{Device, Texture, TextureFormat, TextureUsages, TextureView};

/// 离屏渲染目标
pub struct OffscreenTarget {
    /// 纹理
    pub texture: Texture,
    /// 纹理视图
    pub view: TextureView,
    /// 宽度
    pub width: u32,
    /// 高度
    pub height: u32,
    /// 格式
    pub format: TextureFormat,
}

impl OffscreenTarget {
    /// 默认格式：8 位 RGBA，直通 alpha
    pub const DEFAULT_FORMAT: TextureFormat = TextureFormat::Rgba8Unorm;

    /// 创建新的离屏渲染目标
    pub fn new(device: &Device, width: u32, height: u32, format: TextureFormat) -> Self {
        let texture = Self::create_texture(device, width, height, format);
        let view = texture.create_view(&wgpu::TextureViewDescriptor::default());

        Self {
            texture,
            view,
            width,
            height,
            format,
        }
    }

    fn create_texture(device: &Device, width: u32, height: u32, format: TextureFormat) -> Texture {
        device.create_texture(&wgpu::TextureDescriptor {
            label: Some("Particle Offscreen Target"),
            size: wgpu::Extent3d {
                width: width.max(1),
                height: height.max(1),
                depth_or_array_layers: 1,
            },
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format,
            usage: TextureUsages::RENDER_ATTACHMENT
                | TextureUsages::TEXTURE_BINDING
                | TextureUsages::COPY_SRC,
            view_formats: &[],
        })
    }

    /// 调整大小
    pub fn resize(&mut self, device: &Device, width: u32, height: u32) {
        if self.width == width && self.height == height {
            return;
        }

        self.width = width;
        self.height = height;
        self.texture = Self::create_texture(device, width, height, self.format);
        self.view = self
            .texture
            .create_view(&wgpu::TextureViewDescriptor::default());
    }

    /// 分辨率（像素）
    pub fn resolution(&self) -> [f32; 2] {
        [self.width as f32, self.height as f32]
    }

    /// 阻塞回读全部像素
    ///
    /// # 返回
    ///
    /// 按行紧密排列的像素字节（每像素 4 字节）
    pub fn read_pixels(&self, ctx: &GpuContext) -> RenderResult<Vec<u8>> {
        let bytes_per_pixel = self
            .format
            .block_copy_size(None)
            .ok_or_else(|| RenderError::InvalidState(format!("unreadable format {:?}", self.format)))?;
        let unpadded = self.width * bytes_per_pixel;
        let align = wgpu::COPY_BYTES_PER_ROW_ALIGNMENT;
        let padded = unpadded.div_ceil(align) * align;

        let buffer = ctx.device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("Offscreen Readback"),
            size: (padded * self.height) as wgpu::BufferAddress,
            usage: wgpu::BufferUsages::MAP_READ | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });

        let mut encoder = ctx
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("Offscreen Readback Encoder"),
            });
        encoder.copy_texture_to_buffer(
            self.texture.as_image_copy(),
            wgpu::ImageCopyBuffer {
                buffer: &buffer,
                layout: wgpu::ImageDataLayout {
                    offset: 0,
                    bytes_per_row: Some(padded),
                    rows_per_image: Some(self.height),
                },
            },
            wgpu::Extent3d {
                width: self.width,
                height: self.height,
                depth_or_array_layers: 1,
            },
        );
        ctx.queue.submit(Some(encoder.finish()));

        let data = map_blocking(ctx, &buffer)?;
        let mut pixels = Vec::with_capacity((unpadded * self.height) as usize);
        for row in data.chunks(padded as usize) {
            pixels.extend_from_slice(&row[..unpadded as usize]);
        }
        Ok(pixels)
    }
}

/// 阻塞映射整个缓冲区并复制内容
pub(crate) fn map_blocking(ctx: &GpuContext, buffer: &wgpu::Buffer) -> RenderResult<Vec<u8>> {
    let slice = buffer.slice(..);
    let (tx, rx) = std::sync::mpsc::channel();
    slice.map_async(wgpu::MapMode::Read, move |result| {
        let _ = tx.send(result);
    });
    ctx.device.poll(wgpu::Maintain::Wait);

    match rx.recv() {
        Ok(Ok(())) => {}
        Ok(Err(e)) => return Err(RenderError::BufferMap(e.to_string())),
        Err(_) => return Err(RenderError::BufferMap("map callback dropped".to_string())),
    }

    let data = slice.get_mapped_range().to_vec();
    buffer.unmap();
    Ok(data)
}
