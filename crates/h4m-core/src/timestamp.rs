//! 以 time_base 为单位的时间点.
//!
//! HVQM4 的包时间戳以帧为单位 (time_base = frame_usec / 1e6),
//! 与秒或微秒之间的换算都经过这里.

use crate::rational::Rational;
use std::fmt;

/// 表示"未定义"的时间戳值
pub const NOPTS_VALUE: i64 = i64::MIN;

/// 时间戳: `value` 个 `time_base`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Timestamp {
    pub value: i64,
    pub time_base: Rational,
}

impl Timestamp {
    pub const fn new(value: i64, time_base: Rational) -> Self {
        Self { value, time_base }
    }

    /// 值不是 `NOPTS_VALUE` 且时间基有效
    pub const fn is_valid(&self) -> bool {
        self.value != NOPTS_VALUE && self.time_base.is_valid()
    }

    /// 换算为秒
    pub fn seconds(&self) -> Option<f64> {
        self.is_valid()
            .then(|| self.value as f64 * self.time_base.to_f64())
    }

    /// 换算到另一个时间基, 结果向下取整
    ///
    /// 例如把 1.0s (`1_000_000` 个微秒) 换算为 33367us 一帧的帧号得到 29.
    pub fn rescale(&self, time_base: Rational) -> Option<Self> {
        if !self.is_valid() || !time_base.is_valid() {
            return None;
        }
        let num = i128::from(self.value) * i128::from(self.time_base.num) * i128::from(time_base.den);
        let den = i128::from(self.time_base.den) * i128::from(time_base.num);
        if den == 0 {
            return None;
        }
        let value = i64::try_from(num.div_euclid(den)).ok()?;
        Some(Self { value, time_base })
    }
}

impl fmt::Display for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.seconds() {
            Some(s) => write!(f, "{s:.6}s"),
            None => write!(f, "NOPTS"),
        }
    }
}
