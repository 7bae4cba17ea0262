//! 缓冲区打包
//!
//! 将 `ParticleStore` 的活跃部分写入渲染器要求的固定布局。
//! 输出缓冲区由调用方持有并按容量预先分配，打包过程不分配内存。

use super::wgpu_modules::types::{GpuParticle, RasterInstance};
use crate::simulation::ParticleStore;

/// 缓冲区打包器
pub struct BufferPacker;

impl BufferPacker {
    /// 打包光栅化路径的实例数据与形状流
    ///
    /// # 参数
    ///
    /// * `store` - 已经压缩过的粒子存储
    /// * `instances` - 每实例 32 字节的输出
    /// * `shapes` - 与 `instances` 一一对应的形状编号输出
    ///
    /// # 返回
    ///
    /// 写入的实例数量，即绘制调用的实例数
    ///
    /// # Panics
    ///
    /// 活跃粒子数超过任一输出长度时触发断言。
    pub fn pack_raster(
        store: &ParticleStore,
        instances: &mut [RasterInstance],
        shapes: &mut [u32],
    ) -> usize {
        let live = store.live_count();
        assert!(
            live <= instances.len() && live <= shapes.len(),
            "live particle count {} exceeds packed buffer capacity {}",
            live,
            instances.len().min(shapes.len())
        );

        let cols = store.columns();
        let mut written = 0;
        for i in 0..live {
            // 未压缩的死亡粒子不进入绘制
            if cols.lifespan[i] <= 0.0 {
                continue;
            }
            let p = cols.positions[i];
            instances[written] = RasterInstance {
                position: [p.x, p.y],
                size: cols.size[i],
                alpha: cols.alpha[i],
                hue: cols.hue[i],
                saturation: cols.saturation[i],
                brightness: cols.brightness[i],
                rotation: cols.rotation[i],
            };
            shapes[written] = cols.shape[i];
            written += 1;
        }
        written
    }

    /// 打包为设备端粒子结构
    ///
    /// 用于计算路径的生成上传以及诊断回读。
    pub fn pack_device(store: &ParticleStore, out: &mut [GpuParticle]) -> usize {
        let live = store.live_count();
        assert!(
            live <= out.len(),
            "live particle count {} exceeds device buffer capacity {}",
            live,
            out.len()
        );

        let cols = store.columns();
        let mut written = 0;
        for i in 0..live {
            if cols.lifespan[i] <= 0.0 {
                continue;
            }
            let p = cols.positions[i];
            let v = cols.velocities[i];
            out[written] = GpuParticle {
                position: [p.x, p.y],
                velocity: [v.x, v.y],
                size: cols.size[i],
                hue: cols.hue[i],
                saturation: cols.saturation[i],
                brightness: cols.brightness[i],
                alpha: cols.alpha[i],
                lifespan: cols.lifespan[i],
                decay: cols.decay[i],
                rotation: cols.rotation[i],
                rotation_speed: cols.rotation_speed[i],
                mass: cols.mass[i],
                burst_state: cols.burst[i].as_raw(),
                burst_delay: cols.burst_delay[i],
                spawn_time: cols.spawn_time[i],
                spiral_state: cols.spiral[i] as u32,
                spiral_delay: cols.spiral_delay[i],
                shape: cols.shape[i],
                id: cols.ids[i].0,
                _padding: [0.0; 3],
            };
            written += 1;
        }
        written
    }
}
