//! 颜色模型
//!
//! 色相/饱和度/亮度 (HSB) 到线性 RGB 的转换。主机端与着色器使用同一公式，
//! 保证 CPU 预处理结果与 GPU 着色结果一致。

use glam::Vec3;

/// HSB → RGB 转换
pub struct ColorModel;

impl ColorModel {
    /// 将 HSB 转换为线性 RGB
    ///
    /// # 参数
    ///
    /// * `hue` - 色相，度数，任意值会回绕到 [0, 360)
    /// * `saturation` - 饱和度 [0, 100]
    /// * `brightness` - 亮度 [0, 100]
    ///
    /// # 返回
    ///
    /// 每个分量位于 [0, 1] 的 RGB。
    pub fn hsb_to_rgb(hue: f32, saturation: f32, brightness: f32) -> Vec3 {
        let h = fract(hue / 360.0);
        let s = (saturation / 100.0).clamp(0.0, 1.0);
        let v = (brightness / 100.0).clamp(0.0, 1.0);

        let k = Vec3::new(
            fract(h),
            fract(h + 2.0 / 3.0),
            fract(h + 1.0 / 3.0),
        );
        let p = ((k * 6.0 - Vec3::splat(3.0)).abs() - Vec3::ONE).clamp(Vec3::ZERO, Vec3::ONE);

        v * Vec3::ONE.lerp(p, s)
    }
}

/// 与 WGSL `fract` 相同的定义
#[inline]
fn fract(x: f32) -> f32 {
    x - x.floor()
}

/// 着色器端颜色模型
pub const COLOR_MODEL_WGSL: &str = r#"
fn hsb_to_rgb(hue: f32, saturation: f32, brightness: f32) -> vec3<f32> {
    let h = fract(hue / 360.0);
    let s = clamp(saturation / 100.0, 0.0, 1.0);
    let v = clamp(brightness / 100.0, 0.0, 1.0);
    let k = fract(vec3<f32>(h, h + 2.0 / 3.0, h + 1.0 / 3.0));
    let p = clamp(abs(k * 6.0 - vec3<f32>(3.0)) - vec3<f32>(1.0), vec3<f32>(0.0), vec3<f32>(1.0));
    return v * mix(vec3<f32>(1.0), p, vec3<f32>(s));
}
"#;
