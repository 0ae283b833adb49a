//! # h4m-format
//!
//! h4m 容器格式库, 提供解封装框架和 HVQM4 解封装器.
//!
//! 本 crate 对标 FFmpeg 的 libavformat, 负责解析 HVQM4 容器,
//! 按解码顺序输出带 I/P/B 标记的数据包.

pub mod demuxer;
pub mod demuxers;
pub mod format_id;
pub mod io;
pub mod probe;
pub mod registry;
pub mod stream;

// 重导出常用类型
pub use demuxer::{Demuxer, SeekFlags};
pub use format_id::FormatId;
pub use io::IoContext;
pub use probe::ProbeResult;
pub use registry::FormatRegistry;
pub use stream::Stream;

/// 注册所有内置容器格式
pub fn register_all(registry: &mut FormatRegistry) {
    demuxers::register_all_demuxers(registry);
}
