//! 压缩数据包 (Packet).
//!
//! 对标 FFmpeg 的 `AVPacket`, 表示从 HVQM4 容器中读取的一帧压缩数据.

use bytes::Bytes;
use h4m_core::{Rational, Timestamp};

use crate::frame::PictureType;

/// 压缩数据包
///
/// 每个 HVQM4 帧记录对应一个 Packet. 数据只包含负载, 帧类型标签
/// 放在 `picture_type` 中.
#[derive(Debug, Clone)]
pub struct Packet {
    /// 压缩数据
    pub data: Bytes,
    /// 显示时间戳 (PTS)
    pub pts: i64,
    /// 解码时间戳 (DTS)
    pub dts: i64,
    /// 数据包时长 (以 time_base 为单位)
    pub duration: i64,
    /// 时间基
    pub time_base: Rational,
    /// 所属流的索引
    pub stream_index: usize,
    /// 是否为关键帧 (I 帧)
    pub is_keyframe: bool,
    /// 图片类型 (视频 I/P/B, 音频为 None)
    pub picture_type: PictureType,
    /// 帧记录在容器中的字节偏移量 (-1 表示未知)
    pub pos: i64,
}

impl Packet {
    /// 创建空数据包
    pub fn empty() -> Self {
        Self {
            data: Bytes::new(),
            pts: h4m_core::timestamp::NOPTS_VALUE,
            dts: h4m_core::timestamp::NOPTS_VALUE,
            duration: 0,
            time_base: Rational::UNDEFINED,
            stream_index: 0,
            is_keyframe: false,
            picture_type: PictureType::None,
            pos: -1,
        }
    }

    /// 从数据创建数据包
    pub fn from_data(data: impl Into<Bytes>) -> Self {
        Self {
            data: data.into(),
            ..Self::empty()
        }
    }

    /// 创建指定图片类型的视频数据包
    pub fn video(data: impl Into<Bytes>, picture_type: PictureType) -> Self {
        Self {
            data: data.into(),
            is_keyframe: picture_type == PictureType::I,
            picture_type,
            ..Self::empty()
        }
    }

    /// 数据大小 (字节)
    pub fn size(&self) -> usize {
        self.data.len()
    }

    /// 是否为空包 (flush packet)
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// 显示时间戳
    pub fn pts_timestamp(&self) -> Timestamp {
        Timestamp::new(self.pts, self.time_base)
    }

    /// 是否可丢弃 (B 帧不会被其他帧参考)
    pub fn is_disposable(&self) -> bool {
        self.picture_type == PictureType::B
    }
}
