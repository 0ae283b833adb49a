//! # h4m-core
//!
//! h4m 核心库, 提供 HVQM4 解封装/解码共用的基础类型和错误处理.
//!
//! 本 crate 对标 FFmpeg 的 libavutil 中与本项目相关的部分.

pub mod error;
pub mod media_type;
pub mod pixel_format;
pub mod rational;
pub mod timestamp;

// 重导出常用类型
pub use error::{H4mError, H4mResult};
pub use media_type::MediaType;
pub use pixel_format::{ChromaSubsampling, PixelFormat};
pub use rational::Rational;
pub use timestamp::Timestamp;
