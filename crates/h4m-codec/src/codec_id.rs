//! 编解码器标识符.
//!
//! 对标 FFmpeg 的 `AVCodecID`.

use std::fmt;
use h4m_core::MediaType;

/// 编解码器标识符
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[non_exhaustive]
pub enum CodecId {
    /// 未知编解码器 (HVQM4 音频轨没有对应的解码器)
    None,
    /// Hudson HVQM4 视频
    Hvqm4,
}

impl CodecId {
    /// 获取编解码器对应的媒体类型
    pub const fn media_type(&self) -> MediaType {
        match self {
            Self::None => MediaType::Data,
            Self::Hvqm4 => MediaType::Video,
        }
    }

    /// 获取编解码器的名称
    pub const fn name(&self) -> &'static str {
        match self {
            Self::None => "none",
            Self::Hvqm4 => "hvqm4",
        }
    }

    /// 获取编解码器的描述
    pub const fn long_name(&self) -> &'static str {
        match self {
            Self::None => "未知",
            Self::Hvqm4 => "Hudson HVQM4 video",
        }
    }
}

impl fmt::Display for CodecId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}
