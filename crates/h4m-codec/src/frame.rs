//! 解码后的帧数据 (Frame).
//!
//! 对标 FFmpeg 的 `AVFrame`, 表示解码后的原始视频数据.

use h4m_core::{H4mError, H4mResult, PixelFormat, Rational, Timestamp};

/// 视频帧
///
/// 包含解码后的原始像素数据, 每个平面单独存储.
/// YUV420P 有 3 个平面: Y, U, V. 平面的 linesize 可以大于可见宽度 (带填充).
#[derive(Debug, Clone)]
pub struct VideoFrame {
    /// 各平面的像素数据
    pub data: Vec<Vec<u8>>,
    /// 各平面每行的字节数 (linesize / stride)
    pub linesize: Vec<usize>,
    /// 宽度 (像素)
    pub width: u32,
    /// 高度 (像素)
    pub height: u32,
    /// 像素格式
    pub pixel_format: PixelFormat,
    /// 显示时间戳 (PTS)
    pub pts: i64,
    /// 解码时间戳 (DTS), 即解码顺序
    pub dts: i64,
    /// 时间基
    pub time_base: Rational,
    /// 帧时长 (以 time_base 为单位)
    pub duration: i64,
    /// 是否为关键帧
    pub is_keyframe: bool,
    /// 图片类型 (I/P/B 帧)
    pub picture_type: PictureType,
}

impl VideoFrame {
    /// 创建空的视频帧 (平面尚未分配)
    pub fn new(width: u32, height: u32, pixel_format: PixelFormat) -> Self {
        let plane_count = pixel_format.plane_count() as usize;
        Self {
            data: vec![Vec::new(); plane_count],
            linesize: vec![0; plane_count],
            width,
            height,
            pixel_format,
            pts: h4m_core::timestamp::NOPTS_VALUE,
            dts: h4m_core::timestamp::NOPTS_VALUE,
            time_base: Rational::UNDEFINED,
            duration: 0,
            is_keyframe: false,
            picture_type: PictureType::None,
        }
    }

    /// 按对齐要求分配各平面
    ///
    /// 每个平面的 linesize 向上对齐到 `align` 字节, `align` 为 0 或 1 时紧密排列.
    pub fn alloc_planes(&mut self, align: usize) -> H4mResult<()> {
        let align = align.max(1);
        if !align.is_power_of_two() {
            return Err(H4mError::InvalidArgument(format!(
                "linesize 对齐必须是 2 的幂, 实际 {align}"
            )));
        }
        for plane in 0..self.pixel_format.plane_count() as usize {
            let width = self
                .pixel_format
                .plane_linesize(plane, self.width)
                .ok_or_else(|| H4mError::InvalidArgument(format!("无法计算平面 {plane} 的宽度")))?;
            let rows = self
                .pixel_format
                .plane_height(plane, self.height)
                .ok_or_else(|| H4mError::InvalidArgument(format!("无法计算平面 {plane} 的高度")))?;
            let stride = width.next_multiple_of(align);
            self.linesize[plane] = stride;
            self.data[plane] = vec![0u8; stride * rows];
        }
        Ok(())
    }

    /// 显示时间戳
    pub fn timestamp(&self) -> Timestamp {
        Timestamp::new(self.pts, self.time_base)
    }

    /// 读取指定平面第 `row` 行的可见像素
    pub fn row(&self, plane: usize, row: usize) -> Option<&[u8]> {
        let width = self.pixel_format.plane_linesize(plane, self.width)?;
        let start = row.checked_mul(*self.linesize.get(plane)?)?;
        self.data.get(plane)?.get(start..start + width)
    }
}

/// 图片类型 (I/P/B 帧)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum PictureType {
    /// 未指定 (音频包)
    #[default]
    None,
    /// I 帧 (帧内编码, 不需要参考帧)
    I,
    /// P 帧 (前向预测, 一个参考帧)
    P,
    /// B 帧 (双向预测, 两个参考帧, 自身不作为参考)
    B,
}

impl PictureType {
    /// 从 HVQM4 帧记录中的 frame_type 字段解析
    ///
    /// 0x10 = I, 0x20 = P, 0x30 = B.
    pub const fn from_hvqm4_tag(tag: u16) -> Option<Self> {
        match tag {
            0x10 => Some(Self::I),
            0x20 => Some(Self::P),
            0x30 => Some(Self::B),
            _ => None,
        }
    }

    /// 转换为 HVQM4 帧记录中的 frame_type 字段
    pub const fn hvqm4_tag(&self) -> u16 {
        match self {
            Self::I => 0x10,
            Self::P => 0x20,
            Self::B => 0x30,
            Self::None => 0,
        }
    }

    /// 是否为锚点帧 (I/P), 锚点帧解码后会成为后续帧的参考
    pub const fn is_anchor(&self) -> bool {
        matches!(self, Self::I | Self::P)
    }

    /// 解码该类型需要的参考帧数量
    pub const fn reference_count(&self) -> usize {
        match self {
            Self::I | Self::None => 0,
            Self::P => 1,
            Self::B => 2,
        }
    }
}
