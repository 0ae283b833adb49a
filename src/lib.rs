//! # h4m
//!
//! 纯 Rust 实现的 HVQM4 (Hudson) 容器解封装与视频参考帧管理.
//!
//! - **解封装**: 解析 `.h4m` 文件头和 GOP 结构, 输出带时间戳的音视频包, 支持按时间戳和 GOP 定位
//! - **解码框架**: I/P/B 参考帧调度, 输出帧组装, 图像重建通过 trait 可替换
//! - **日志**: 基于 tracing 的控制台与按日期滚动的文件日志
//!
//! # 快速开始
//!
//! ```rust,no_run
//! use h4m::format::IoContext;
//!
//! let formats = h4m::default_format_registry();
//! let codecs = h4m::default_codec_registry();
//!
//! let mut io = IoContext::open_read("movie.h4m")?;
//! let mut demuxer = formats.open_input(&mut io, Some("movie.h4m"))?;
//! let stream = &demuxer.streams()[0];
//! let mut decoder = codecs.create_decoder(stream.codec_id)?;
//! decoder.open(&stream.codec_parameters())?;
//!
//! while let Ok(packet) = demuxer.read_packet(&mut io) {
//!     if packet.stream_index != 0 {
//!         continue;
//!     }
//!     decoder.send_packet(&packet)?;
//!     if let Ok(frame) = decoder.receive_frame() {
//!         println!("pts={} {:?}", frame.pts, frame.picture_type);
//!     }
//! }
//! # Ok::<(), h4m::core::H4mError>(())
//! ```
//!
//! # Crate 结构
//!
//! | Crate | 功能 |
//! |-------|------|
//! | `h4m-core` | 错误类型, 有理数, 像素格式与子采样 |
//! | `h4m-codec` | 包, 帧, 解码器 trait 与 HVQM4 参考帧解码器 |
//! | `h4m-format` | I/O 上下文, 探测, HVQM4 解封装器 |

/// 核心类型与工具
pub use h4m_core as core;

/// 编解码框架
pub use h4m_codec as codec;

/// 容器格式框架
pub use h4m_format as format;

pub mod logging;

/// 获取版本号
pub fn version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}

/// 创建已注册所有内置解码器的注册表
pub fn default_codec_registry() -> h4m_codec::CodecRegistry {
    let mut registry = h4m_codec::CodecRegistry::new();
    h4m_codec::register_all(&mut registry);
    registry
}

/// 创建已注册所有内置容器格式的注册表
pub fn default_format_registry() -> h4m_format::FormatRegistry {
    let mut registry = h4m_format::FormatRegistry::new();
    h4m_format::register_all(&mut registry);
    registry
}
