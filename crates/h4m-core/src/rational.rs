//! 有理数类型, 用于时间基 (time_base) 和帧率.
//!
//! 对标 FFmpeg 的 `AVRational`.

use std::fmt;

/// 有理数, 由分子和分母组成
///
/// HVQM4 的视频时间基为 `frame_usec / 1_000_000`, 即每个 pts 单位是一帧.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Rational {
    /// 分子
    pub num: i32,
    /// 分母
    pub den: i32,
}

/// 每秒微秒数
const USEC_PER_SEC: i64 = 1_000_000;

impl Rational {
    /// 创建新的有理数
    pub const fn new(num: i32, den: i32) -> Self {
        Self { num, den }
    }

    /// 未定义 (分母为 0)
    pub const UNDEFINED: Self = Self { num: 0, den: 0 };

    /// 常用时间基: 微秒 (1/1_000_000)
    pub const MICRO: Self = Self {
        num: 1,
        den: 1_000_000,
    };

    /// 以帧时长 (微秒) 构造时间基, 并约分
    ///
    /// 例如 33333us → 33333/1000000, 40000us → 1/25.
    pub fn from_frame_duration_usec(frame_usec: u32) -> Self {
        if frame_usec == 0 || frame_usec > i32::MAX as u32 {
            return Self::UNDEFINED;
        }
        Self::new(frame_usec as i32, USEC_PER_SEC as i32).reduce()
    }

    /// 判断是否有效 (分母不为 0)
    pub const fn is_valid(&self) -> bool {
        self.den != 0
    }

    /// 转换为 f64 浮点数
    ///
    /// 如果分母为 0, 返回 `f64::NAN`.
    pub fn to_f64(self) -> f64 {
        if self.den == 0 {
            return f64::NAN;
        }
        f64::from(self.num) / f64::from(self.den)
    }

    /// 对有理数进行约分, 保证分母为正
    pub fn reduce(self) -> Self {
        if self.den == 0 {
            return self;
        }
        let g = gcd(self.num.unsigned_abs(), self.den.unsigned_abs());
        if g == 0 {
            return self;
        }
        let g = g as i32;
        let sign = if self.den < 0 { -1 } else { 1 };
        Self {
            num: sign * self.num / g,
            den: sign * self.den / g,
        }
    }

    /// 求倒数 (时间基 ↔ 帧率)
    pub const fn invert(self) -> Self {
        Self {
            num: self.den,
            den: self.num,
        }
    }
}

impl fmt::Display for Rational {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.num, self.den)
    }
}

/// 求最大公约数 (欧几里得算法)
fn gcd(mut a: u32, mut b: u32) -> u32 {
    while b != 0 {
        let t = b;
        b = a % b;
        a = t;
    }
    a
}
