//! 流信息定义.
//!
//! 对标 FFmpeg 的 `AVStream`, 描述容器中的一条音视频流.

use h4m_codec::{AudioCodecParams, CodecId, CodecParameters, CodecParamsType, VideoCodecParams};
use h4m_core::{MediaType, PixelFormat, Rational};

/// 流信息
///
/// 描述容器格式中的一条流 (视频流/音频流).
#[derive(Debug, Clone)]
pub struct Stream {
    /// 流索引 (在容器中的位置, 从 0 开始)
    pub index: usize,
    /// 媒体类型
    pub media_type: MediaType,
    /// 编解码器标识 (音频为 `CodecId::None`, 不解码)
    pub codec_id: CodecId,
    /// 时间基
    pub time_base: Rational,
    /// 流时长 (以 time_base 为单位, -1 表示未知)
    pub duration: i64,
    /// 起始时间 (以 time_base 为单位)
    pub start_time: i64,
    /// 总帧数 (0 表示未知)
    pub nb_frames: u64,
    /// 编解码器私有数据 (HVQM4 视频: `[h_samp, v_samp]`)
    pub extra_data: Vec<u8>,
    /// 流特定参数
    pub params: StreamParams,
    /// 元数据
    pub metadata: Vec<(String, String)>,
}

/// 流特定参数
#[derive(Debug, Clone)]
pub enum StreamParams {
    /// 视频流参数
    Video(VideoStreamParams),
    /// 音频流参数
    Audio(AudioStreamParams),
    /// 其他
    Other,
}

/// 视频流参数
#[derive(Debug, Clone)]
pub struct VideoStreamParams {
    /// 宽度 (像素)
    pub width: u32,
    /// 高度 (像素)
    pub height: u32,
    /// 像素格式
    pub pixel_format: PixelFormat,
    /// 帧率
    pub frame_rate: Rational,
}

/// 音频流参数
#[derive(Debug, Clone)]
pub struct AudioStreamParams {
    /// 采样率 (Hz)
    pub sample_rate: u32,
    /// 声道数
    pub channels: u32,
    /// 每个采样的位数
    pub bits_per_sample: u32,
    /// 每个音频帧的字节数 (来自文件头, 0 表示未知)
    pub frame_size: u32,
}

impl Stream {
    /// 转换为解码器所需的编解码器参数
    pub fn codec_parameters(&self) -> CodecParameters {
        let params = match &self.params {
            StreamParams::Video(v) => CodecParamsType::Video(VideoCodecParams {
                width: v.width,
                height: v.height,
                pixel_format: v.pixel_format,
                frame_rate: v.frame_rate,
            }),
            StreamParams::Audio(a) => CodecParamsType::Audio(AudioCodecParams {
                sample_rate: a.sample_rate,
                channels: a.channels,
                bits_per_sample: a.bits_per_sample,
            }),
            StreamParams::Other => CodecParamsType::None,
        };
        CodecParameters {
            codec_id: self.codec_id,
            extra_data: self.extra_data.clone(),
            bit_rate: 0,
            params,
        }
    }
}
