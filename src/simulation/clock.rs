//! 模拟时钟
//!
//! 总时长以 f64 累计。交给积分器与着色器的 f32 时间相对于一个纪元，
//! 相对时间达到 `REBASE_INTERVAL` 时纪元前移整数秒，已存储的生成时间随之平移。

/// 相对时间达到该值（秒）时前移纪元
pub const REBASE_INTERVAL: f64 = 1024.0;

/// 单次推进的结果
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct ClockTick {
    /// 相对纪元的帧时间
    pub time: f32,
    /// 本次纪元前移量，已存储的生成时间需减去该值
    pub shift: f32,
}

/// 模拟时钟
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct SimulationClock {
    elapsed: f64,
    epoch: f64,
}

impl SimulationClock {
    pub fn new() -> Self {
        Self::default()
    }

    /// 推进一个时间步
    pub fn advance(&mut self, delta_time: f32) -> ClockTick {
        self.elapsed += delta_time as f64;

        let relative = self.elapsed - self.epoch;
        let shift = if relative >= REBASE_INTERVAL {
            let whole = relative.floor();
            self.epoch += whole;
            tracing::debug!(target: "particles", "Clock epoch moved to {:.0}s", self.epoch);
            whole as f32
        } else {
            0.0
        };

        ClockTick {
            time: self.now(),
            shift,
        }
    }

    /// 相对纪元的当前时间，用作新粒子的生成时间
    pub fn now(&self) -> f32 {
        (self.elapsed - self.epoch) as f32
    }

    /// 启动以来的总时长（秒）
    pub fn elapsed(&self) -> f64 {
        self.elapsed
    }

    pub fn reset(&mut self) {
        *self = Self::default();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_long_session_keeps_frame_spacing() {
        const DT: f32 = 1.0 / 60.0;
        const FRAMES: u64 = 10 * 3600 * 60;

        let mut clock = SimulationClock::new();
        let mut previous = 0.0f32;
        let mut rebases = 0;
        for _ in 0..FRAMES {
            let tick = clock.advance(DT);
            if tick.shift > 0.0 {
                rebases += 1;
                assert_eq!(tick.shift.fract(), 0.0);
            }
            // 在同一纪元下比较相邻两帧
            let step = tick.time + tick.shift - previous;
            assert!((step - DT).abs() < 5e-4, "frame step drifted to {step}");
            assert!((tick.time as f64) < REBASE_INTERVAL);
            previous = tick.time;
        }

        let expected = FRAMES as f64 * DT as f64;
        assert!((clock.elapsed() - expected).abs() < 1e-4);
        assert_eq!(rebases, (expected / REBASE_INTERVAL) as u32);
    }

    #[test]
    fn test_rebase_moves_whole_seconds() {
        let mut clock = SimulationClock::new();
        assert_eq!(clock.advance(1000.5).shift, 0.0);

        let tick = clock.advance(24.0);
        assert_eq!(tick.shift, 1024.0);
        assert!((tick.time - 0.5).abs() < 1e-6);
        assert!((clock.elapsed() - 1024.5).abs() < 1e-9);
        assert_eq!(clock.now(), tick.time);

        clock.reset();
        assert_eq!(clock.elapsed(), 0.0);
    }
}
