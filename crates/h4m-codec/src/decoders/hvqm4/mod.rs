//! HVQM4 视频解码器.
//!
//! 负责序列对象的生命周期, I/P/B 帧的参考帧调度和输出帧组装.
//! 图像重建本身由 [`PictureReconstructor`] 完成, 默认使用
//! [`ReferenceCopyReconstructor`].
//!
//! 解码流程:
//! 1. `open()` 根据流参数 (尺寸, extra_data 中的子采样) 创建序列对象和三个参考缓冲区
//! 2. 每个视频包按 `picture_type` 选择参考帧并调用重建器
//! 3. 重建结果复制到新分配的 [`VideoFrame`], 锚点帧轮转参考角色

pub mod output;
pub mod picture;
pub mod reference;
pub mod sequence;


use log::{debug, trace, warn};

use h4m_core::{ChromaSubsampling, H4mError, H4mResult, PixelFormat};

use crate::codec_id::CodecId;
use crate::codec_parameters::CodecParameters;
use crate::decoder::Decoder;
use crate::frame::{PictureType, VideoFrame};
use crate::packet::Packet;

pub use output::copy_planar_to_frame;
pub use picture::{PictureReconstructor, PlanarBuffer, ReferenceCopyReconstructor};
pub use reference::{ReferenceSlots, SlotRole};
pub use sequence::SequenceObject;

/// 解码器配置
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Hvqm4DecoderConfig {
    /// 输出帧每个平面 linesize 的对齐字节数 (2 的幂, 1 表示紧密排列)
    pub linesize_align: usize,
}

impl Default for Hvqm4DecoderConfig {
    fn default() -> Self {
        Self { linesize_align: 1 }
    }
}

/// HVQM4 解码器
pub struct Hvqm4Decoder {
    config: Hvqm4DecoderConfig,
    reconstructor: Box<dyn PictureReconstructor>,
    /// 序列对象, open() 时创建
    sequence: Option<SequenceObject>,
    /// 三个参考缓冲区, open() 时分配
    slots: Option<ReferenceSlots>,
    width: u32,
    height: u32,
    pixel_format: PixelFormat,
    /// 已解码待取出的帧
    pending: Option<VideoFrame>,
    /// 是否已收到刷新信号 (空包)
    flushing: bool,
    /// 已输出的帧数
    frame_count: u64,
}

impl Hvqm4Decoder {
    /// 使用默认重建器创建解码器
    pub fn new() -> Self {
        Self::with_reconstructor(Box::new(ReferenceCopyReconstructor))
    }

    /// 使用指定的图像重建器创建解码器
    pub fn with_reconstructor(reconstructor: Box<dyn PictureReconstructor>) -> Self {
        Self {
            config: Hvqm4DecoderConfig::default(),
            reconstructor,
            sequence: None,
            slots: None,
            width: 0,
            height: 0,
            pixel_format: PixelFormat::None,
            pending: None,
            flushing: false,
            frame_count: 0,
        }
    }

    /// 设置解码器配置
    pub fn with_config(mut self, config: Hvqm4DecoderConfig) -> Self {
        self.config = config;
        self
    }

    /// 工厂函数 (注册表使用)
    pub fn create() -> H4mResult<Box<dyn Decoder>> {
        Ok(Box::new(Self::new()))
    }

    /// 序列对象 (未打开时为 None)
    pub fn sequence(&self) -> Option<&SequenceObject> {
        self.sequence.as_ref()
    }

    /// 参考帧集合 (未打开时为 None)
    pub fn reference_slots(&self) -> Option<&ReferenceSlots> {
        self.slots.as_ref()
    }

    /// 已输出的帧数
    pub fn frame_count(&self) -> u64 {
        self.frame_count
    }

    /// 解码一个视频包
    ///
    /// # 返回
    /// - `Ok(Some(frame))`: 解码成功
    /// - `Ok(None)`: 缺少参考帧, 该包被丢弃
    /// - `Err(..)`: 包无效或重建失败, 参考帧状态不变
    pub fn decode_packet(&mut self, packet: &Packet) -> H4mResult<Option<VideoFrame>> {
        let (Some(sequence), Some(slots)) = (self.sequence.as_mut(), self.slots.as_mut()) else {
            return Err(H4mError::Codec("解码器未打开, 请先调用 open()".into()));
        };

        let picture_type = packet.picture_type;
        if picture_type == PictureType::None {
            return Err(H4mError::InvalidData(
                "HVQM4: 视频包缺少 I/P/B 帧类型".into(),
            ));
        }
        if !slots.can_decode(picture_type) {
            warn!(
                "HVQM4: 丢弃 {:?} 帧 (dts={}), 参考帧不足 ({} 个锚点)",
                picture_type,
                packet.dts,
                slots.anchor_count()
            );
            return Ok(None);
        }

        let index = slots.decode(
            picture_type,
            sequence,
            &packet.data,
            self.reconstructor.as_mut(),
        )?;
        let decoded = slots
            .slot(index)
            .ok_or_else(|| H4mError::Codec(format!("HVQM4: 无效的缓冲区索引 {index}")))?;

        let mut frame = VideoFrame::new(self.width, self.height, self.pixel_format);
        frame.alloc_planes(self.config.linesize_align)?;
        copy_planar_to_frame(decoded, &mut frame)?;
        frame.pts = packet.pts;
        frame.dts = packet.dts;
        frame.time_base = packet.time_base;
        frame.duration = packet.duration;
        frame.is_keyframe = picture_type == PictureType::I;
        frame.picture_type = picture_type;

        self.frame_count += 1;
        trace!(
            "HVQM4: 输出第 {} 帧 {:?}, pts={} ({}), dts={}",
            self.frame_count,
            picture_type,
            frame.pts,
            frame.timestamp(),
            frame.dts
        );
        Ok(Some(frame))
    }
}

impl Default for Hvqm4Decoder {
    fn default() -> Self {
        Self::new()
    }
}

impl Decoder for Hvqm4Decoder {
    fn codec_id(&self) -> CodecId {
        CodecId::Hvqm4
    }

    fn name(&self) -> &str {
        "hvqm4"
    }

    fn open(&mut self, params: &CodecParameters) -> H4mResult<()> {
        let video = params.video().ok_or_else(|| {
            H4mError::InvalidArgument("hvqm4 解码器需要视频参数".into())
        })?;

        let subsampling = match params.chroma_subsampling() {
            Some(sub) => sub,
            None => {
                debug!("HVQM4: extra_data 中没有子采样信息, 按 4:2:0 处理");
                ChromaSubsampling::YUV420
            }
        };

        // 先校验再分配参考缓冲区
        let sequence = SequenceObject::new(video.width, video.height, subsampling)?;
        let slots = ReferenceSlots::new(video.width, video.height);

        self.width = video.width;
        self.height = video.height;
        self.pixel_format = sequence.pixel_format();
        self.sequence = Some(sequence);
        self.slots = Some(slots);
        self.pending = None;
        self.flushing = false;
        self.frame_count = 0;

        debug!(
            "打开 hvqm4 解码器: {}x{}, 子采样={}, 格式={}, linesize 对齐={}",
            self.width, self.height, subsampling, self.pixel_format, self.config.linesize_align,
        );
        Ok(())
    }

    fn send_packet(&mut self, packet: &Packet) -> H4mResult<()> {
        if self.sequence.is_none() {
            return Err(H4mError::Codec("解码器未打开, 请先调用 open()".into()));
        }
        if self.pending.is_some() {
            return Err(H4mError::NeedMoreData);
        }

        // 空包 = flush (带帧类型的空负载交给重建器报错)
        if packet.is_empty() && packet.picture_type == PictureType::None {
            self.flushing = true;
            return Ok(());
        }

        self.pending = self.decode_packet(packet)?;
        Ok(())
    }

    fn receive_frame(&mut self) -> H4mResult<VideoFrame> {
        if let Some(frame) = self.pending.take() {
            return Ok(frame);
        }
        if self.flushing {
            return Err(H4mError::Eof);
        }
        Err(H4mError::NeedMoreData)
    }

    fn flush(&mut self) {
        self.pending = None;
        self.flushing = false;
        if let Some(slots) = self.slots.as_mut() {
            slots.reset();
        }
        debug!("HVQM4: 解码器已刷新, 等待下一个 I 帧");
    }
}
