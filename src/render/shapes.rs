//! 形状库
//!
//! 每个片元根据粒子形状计算覆盖率（基于有向距离函数）以及圆形粒子的发光项。
//! `SHAPE_LIBRARY_WGSL` 是着色器端实现，`ShapeLibrary` 是与之逐式对应的主机端版本，
//! 用于测试与命中判断。
//!
//! 片元坐标 `uv` 位于 [-1, 1]²，y 轴向下（与像素坐标一致）。

use glam::Vec2;

/// 片元 alpha 低于此值时丢弃
pub const ALPHA_EPSILON: f32 = 0.01;

/// 有向距离边缘的抗锯齿宽度
const EDGE_WIDTH: f32 = 0.04;

/// 粒子形状
#[repr(u32)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ShapeType {
    #[default]
    Circle = 0,
    Heart = 1,
    Star = 2,
    Paw = 3,
    Spiral = 4,
}

impl ShapeType {
    /// 所有形状
    pub const ALL: [ShapeType; 5] = [
        ShapeType::Circle,
        ShapeType::Heart,
        ShapeType::Star,
        ShapeType::Paw,
        ShapeType::Spiral,
    ];

    /// 从 GPU 编码还原，未知值回退为圆形
    pub fn from_raw(raw: u32) -> Self {
        match raw {
            1 => Self::Heart,
            2 => Self::Star,
            3 => Self::Paw,
            4 => Self::Spiral,
            _ => Self::Circle,
        }
    }

    /// GPU 编码
    #[inline]
    pub fn as_raw(self) -> u32 {
        self as u32
    }
}

/// 主机端形状库
pub struct ShapeLibrary;

impl ShapeLibrary {
    /// 计算片元覆盖率 [0, 1]
    ///
    /// `shape` 为原始编码，超出范围时按圆形处理。
    pub fn coverage(shape: u32, uv: Vec2) -> f32 {
        match ShapeType::from_raw(shape) {
            ShapeType::Circle => circle_coverage(uv),
            ShapeType::Heart => fill(sd_heart(Vec2::new(uv.x, -uv.y) * 0.85 + Vec2::new(0.0, 0.55))),
            ShapeType::Star => fill(sd_star5(Vec2::new(uv.x, -uv.y), 0.95, 0.45)),
            ShapeType::Paw => fill(sd_paw(uv)),
            ShapeType::Spiral => spiral_coverage(uv),
        }
    }

    /// 圆形核心发光项，其它形状为 0
    pub fn glow(shape: u32, uv: Vec2, strength: f32) -> f32 {
        match ShapeType::from_raw(shape) {
            ShapeType::Circle => strength * (1.0 - smoothstep(0.0, 0.5, uv.length())),
            _ => 0.0,
        }
    }

    /// 片元最终 alpha；返回 `None` 表示丢弃该片元
    pub fn fragment_alpha(shape: u32, uv: Vec2, alpha: f32) -> Option<f32> {
        let a = alpha * Self::coverage(shape, uv);
        if a < ALPHA_EPSILON {
            None
        } else {
            Some(a)
        }
    }
}

fn circle_coverage(uv: Vec2) -> f32 {
    1.0 - smoothstep(0.6, 1.0, uv.length())
}

fn spiral_coverage(uv: Vec2) -> f32 {
    let r = uv.length();
    let a = uv.y.atan2(uv.x);
    let band = 0.5 + 0.5 * (2.0 * a - 12.0 * r).sin();
    smoothstep(0.35, 0.75, band) * (1.0 - smoothstep(0.8, 1.0, r))
}

fn fill(d: f32) -> f32 {
    1.0 - smoothstep(-0.5 * EDGE_WIDTH, 0.5 * EDGE_WIDTH, d)
}

fn sd_heart(p: Vec2) -> f32 {
    let p = Vec2::new(p.x.abs(), p.y);
    if p.y + p.x > 1.0 {
        return (p - Vec2::new(0.25, 0.75)).length() - std::f32::consts::SQRT_2 / 4.0;
    }
    let a = (p - Vec2::new(0.0, 1.0)).length_squared();
    let b = (p - Vec2::splat(0.5 * (p.x + p.y).max(0.0))).length_squared();
    a.min(b).sqrt() * sign(p.x - p.y)
}

fn sd_star5(p: Vec2, r: f32, rf: f32) -> f32 {
    let k1 = Vec2::new(0.809_017, -0.587_785);
    let k2 = Vec2::new(-k1.x, k1.y);
    let mut p = Vec2::new(p.x.abs(), p.y);
    p -= 2.0 * k1.dot(p).max(0.0) * k1;
    p -= 2.0 * k2.dot(p).max(0.0) * k2;
    p.x = p.x.abs();
    p.y -= r;
    let ba = rf * Vec2::new(-k1.y, k1.x) - Vec2::new(0.0, 1.0);
    let h = (p.dot(ba) / ba.dot(ba)).clamp(0.0, r);
    (p - ba * h).length() * sign(p.y * ba.x - p.x * ba.y)
}

/// 主掌垫加四个趾垫
const PAW_PADS: [(f32, f32, f32); 5] = [
    (0.0, 0.3, 0.42),
    (-0.62, -0.12, 0.2),
    (-0.24, -0.55, 0.21),
    (0.24, -0.55, 0.21),
    (0.62, -0.12, 0.2),
];

fn sd_paw(p: Vec2) -> f32 {
    PAW_PADS
        .iter()
        .map(|&(x, y, r)| (p - Vec2::new(x, y)).length() - r)
        .fold(f32::MAX, f32::min)
}

/// 与 WGSL `sign` 相同：0 的符号为 0
#[inline]
fn sign(x: f32) -> f32 {
    if x > 0.0 {
        1.0
    } else if x < 0.0 {
        -1.0
    } else {
        0.0
    }
}

/// 与 WGSL `smoothstep` 相同
#[inline]
fn smoothstep(edge0: f32, edge1: f32, x: f32) -> f32 {
    let t = ((x - edge0) / (edge1 - edge0)).clamp(0.0, 1.0);
    t * t * (3.0 - 2.0 * t)
}

/// 着色器端形状库
pub const SHAPE_LIBRARY_WGSL: &str = r#"
const ALPHA_EPSILON: f32 = 0.01;
const EDGE_WIDTH: f32 = 0.04;

fn dot2(v: vec2<f32>) -> f32 {
    return dot(v, v);
}

fn fill(d: f32) -> f32 {
    return 1.0 - smoothstep(-0.5 * EDGE_WIDTH, 0.5 * EDGE_WIDTH, d);
}

fn circle_coverage(uv: vec2<f32>) -> f32 {
    return 1.0 - smoothstep(0.6, 1.0, length(uv));
}

fn spiral_coverage(uv: vec2<f32>) -> f32 {
    let r = length(uv);
    let a = atan2(uv.y, uv.x);
    let band = 0.5 + 0.5 * sin(2.0 * a - 12.0 * r);
    return smoothstep(0.35, 0.75, band) * (1.0 - smoothstep(0.8, 1.0, r));
}

fn sd_heart(p_in: vec2<f32>) -> f32 {
    let p = vec2<f32>(abs(p_in.x), p_in.y);
    if (p.y + p.x > 1.0) {
        return length(p - vec2<f32>(0.25, 0.75)) - sqrt(2.0) / 4.0;
    }
    let a = dot2(p - vec2<f32>(0.0, 1.0));
    let b = dot2(p - vec2<f32>(0.5 * max(p.x + p.y, 0.0)));
    return sqrt(min(a, b)) * sign(p.x - p.y);
}

fn sd_star5(p_in: vec2<f32>, r: f32, rf: f32) -> f32 {
    let k1 = vec2<f32>(0.809017, -0.587785);
    let k2 = vec2<f32>(-k1.x, k1.y);
    var p = vec2<f32>(abs(p_in.x), p_in.y);
    p = p - 2.0 * max(dot(k1, p), 0.0) * k1;
    p = p - 2.0 * max(dot(k2, p), 0.0) * k2;
    p.x = abs(p.x);
    p.y = p.y - r;
    let ba = rf * vec2<f32>(-k1.y, k1.x) - vec2<f32>(0.0, 1.0);
    let h = clamp(dot(p, ba) / dot(ba, ba), 0.0, r);
    return length(p - ba * h) * sign(p.y * ba.x - p.x * ba.y);
}

fn sd_paw(p: vec2<f32>) -> f32 {
    var d = length(p - vec2<f32>(0.0, 0.3)) - 0.42;
    d = min(d, length(p - vec2<f32>(-0.62, -0.12)) - 0.2);
    d = min(d, length(p - vec2<f32>(-0.24, -0.55)) - 0.21);
    d = min(d, length(p - vec2<f32>(0.24, -0.55)) - 0.21);
    d = min(d, length(p - vec2<f32>(0.62, -0.12)) - 0.2);
    return d;
}

// 未知形状回退为圆形
fn shape_coverage(shape: u32, uv: vec2<f32>) -> f32 {
    var coverage: f32;
    switch shape {
        case 1u: {
            coverage = fill(sd_heart(vec2<f32>(uv.x, -uv.y) * 0.85 + vec2<f32>(0.0, 0.55)));
        }
        case 2u: {
            coverage = fill(sd_star5(vec2<f32>(uv.x, -uv.y), 0.95, 0.45));
        }
        case 3u: {
            coverage = fill(sd_paw(uv));
        }
        case 4u: {
            coverage = spiral_coverage(uv);
        }
        default: {
            coverage = circle_coverage(uv);
        }
    }
    return coverage;
}

fn shape_glow(shape: u32, uv: vec2<f32>, strength: f32) -> f32 {
    if (shape == 0u || shape > 4u) {
        return strength * (1.0 - smoothstep(0.0, 0.5, length(uv)));
    }
    return 0.0;
}
"#;
