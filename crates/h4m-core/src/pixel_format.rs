//! 像素格式与色度子采样定义.
//!
//! 对标 FFmpeg 的 `AVPixelFormat`. HVQM4 码流通过文件头中的
//! `h_samp`/`v_samp` 描述色度子采样, 目前只有 (2, 2) 即 4:2:0 有效.

use std::fmt;

use crate::error::{H4mError, H4mResult};

/// 像素格式
///
/// 命名规则: 颜色空间 + 子采样 + 排列方式 (P=Planar).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[non_exhaustive]
pub enum PixelFormat {
    /// 未指定
    None,
    /// YUV 4:2:0 平面格式, 8 位 (Y, U, V 三个平面依次存放)
    Yuv420p,
}

impl PixelFormat {
    /// 获取色度子采样 (log2 水平, log2 垂直)
    pub const fn chroma_subsampling(&self) -> (u32, u32) {
        match self {
            Self::Yuv420p => (1, 1),
            Self::None => (0, 0),
        }
    }

    /// 平面数量
    pub const fn plane_count(&self) -> u32 {
        match self {
            Self::None => 0,
            Self::Yuv420p => 3,
        }
    }

    /// 计算指定平面紧密排列时每行的字节数
    ///
    /// # 返回
    /// - `Some(bytes)`: 该平面每行的字节数
    /// - `None`: 格式为 None 或平面索引超出范围
    pub fn plane_linesize(&self, plane: usize, width: u32) -> Option<usize> {
        if plane >= self.plane_count() as usize {
            return None;
        }
        let (sub_h, _) = self.chroma_subsampling();
        let w = width as usize;
        Some(if plane == 0 { w } else { w >> sub_h })
    }

    /// 计算指定平面的行数
    pub fn plane_height(&self, plane: usize, height: u32) -> Option<usize> {
        if plane >= self.plane_count() as usize {
            return None;
        }
        let (_, sub_v) = self.chroma_subsampling();
        let h = height as usize;
        Some(if plane == 0 { h } else { h >> sub_v })
    }

    /// 计算指定平面紧密排列时的字节数
    pub fn plane_size(&self, plane: usize, width: u32, height: u32) -> Option<usize> {
        Some(self.plane_linesize(plane, width)? * self.plane_height(plane, height)?)
    }

    /// 计算整帧紧密排列时的字节数
    ///
    /// YUV420P: `w*h + 2 * (w/2)*(h/2)`, 偶数尺寸下即 `w*h*3/2`.
    pub fn frame_size(&self, width: u32, height: u32) -> Option<usize> {
        if *self == Self::None {
            return None;
        }
        let mut total = 0usize;
        for plane in 0..self.plane_count() as usize {
            total += self.plane_size(plane, width, height)?;
        }
        Some(total)
    }
}

impl fmt::Display for PixelFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::None => "none",
            Self::Yuv420p => "yuv420p",
        };
        write!(f, "{name}")
    }
}

/// HVQM4 色度子采样因子
///
/// 对应文件头中的 `h_samp`/`v_samp` 字节, 也作为视频流的 extra_data 传给解码器.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ChromaSubsampling {
    /// 水平子采样因子
    pub h_samp: u8,
    /// 垂直子采样因子
    pub v_samp: u8,
}

impl ChromaSubsampling {
    /// 4:2:0 (两个方向都是 2 倍子采样)
    pub const YUV420: Self = Self {
        h_samp: 2,
        v_samp: 2,
    };

    /// 创建子采样描述
    pub const fn new(h_samp: u8, v_samp: u8) -> Self {
        Self { h_samp, v_samp }
    }

    /// 映射到像素格式
    ///
    /// 只有 (2, 2) 被支持, 其他组合返回 `Unsupported`.
    pub fn pixel_format(&self) -> H4mResult<PixelFormat> {
        match (self.h_samp, self.v_samp) {
            (2, 2) => Ok(PixelFormat::Yuv420p),
            (h, v) => Err(H4mError::Unsupported(format!(
                "不支持的色度子采样 h_samp={h} v_samp={v}, 仅支持 4:2:0 (2, 2)"
            ))),
        }
    }

    /// 从视频流 extra_data 中解析 (前两个字节为 h_samp, v_samp)
    pub fn from_extra_data(extra_data: &[u8]) -> Option<Self> {
        match extra_data {
            [h, v, ..] => Some(Self::new(*h, *v)),
            _ => None,
        }
    }

    /// 序列化为视频流 extra_data
    pub const fn to_extra_data(&self) -> [u8; 2] {
        [self.h_samp, self.v_samp]
    }
}

impl fmt::Display for ChromaSubsampling {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{}", self.h_samp, self.v_samp)
    }
}
