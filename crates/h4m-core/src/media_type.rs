//! 媒体类型定义.
//!
//! 对标 FFmpeg 的 `AVMediaType`.

use std::fmt;

/// 媒体流类型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MediaType {
    /// 视频流
    Video,
    /// 音频流
    Audio,
    /// 数据流
    Data,
}

impl MediaType {
    /// 从 HVQM4 帧记录中的 media_type 字段解析
    ///
    /// 0 = 音频, 1 = 视频, 其他值无效.
    pub const fn from_hvqm4_tag(tag: u16) -> Option<Self> {
        match tag {
            0 => Some(Self::Audio),
            1 => Some(Self::Video),
            _ => None,
        }
    }

    /// 转换为 HVQM4 帧记录中的 media_type 字段
    pub const fn hvqm4_tag(&self) -> Option<u16> {
        match self {
            Self::Audio => Some(0),
            Self::Video => Some(1),
            Self::Data => None,
        }
    }
}

impl fmt::Display for MediaType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Video => "视频",
            Self::Audio => "音频",
            Self::Data => "数据",
        };
        write!(f, "{name}")
    }
}
