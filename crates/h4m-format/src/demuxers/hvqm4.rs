//! HVQM4 容器解封装器.
//!
//! HVQM4 是 Hudson Soft 在 GameCube 上使用的视频容器, 所有整数均为大端序.
//!
//! # 文件结构
//! ```text
//! File Header (0x44 bytes):
//!   0   Signature (16 bytes): "HVQM4 1.3" / "HVQM4 1.5", NUL 填充
//!   16  header_size (4): 固定 0x44
//!   20  body_size (4)
//!   24  gop_count (4)
//!   28  video_frames (4)
//!   32  audio_frames (4)
//!   36  frame_usec (4): 每帧时长 (微秒)
//!   40  max_frame_size (4)
//!   44  reserved (4)
//!   48  audio_frame_size (4)
//!   52  width (2), 54 height (2)
//!   56  h_samp (1), 57 v_samp (1), 58 video_mode (1), 59 reserved (1)
//!   60  audio_channels (1), 61 audio_bitdepth (1), 62 reserved (2)
//!   64  audio_sample_rate (4)
//!
//! GOP Header (20 bytes):
//!   prev_gop_size (4), next_gop_size (4)
//!   video_frames (4), audio_frames (4)
//!   marker (4): 固定 0x01000000
//!
//! Frame Record (紧跟 GOP 头部, video_frames + audio_frames 个):
//!   media_type (2): 0=audio, 1=video
//!   frame_type (2): 0x10=I, 0x20=P, 0x30=B
//!   size (4)
//!   payload (size bytes), 视频负载前 4 字节为显示序号
//! ```
//!
//! # 时间戳
//! - dts: 每条流独立的解码顺序计数
//! - 视频 pts: `1 + GOP 首帧 dts + 显示序号`
//! - 音频 pts: 等于 dts

use byteorder::{BigEndian, ByteOrder};
use bytes::Bytes;
use log::{debug, trace, warn};

use h4m_codec::{CodecId, Packet, PictureType};
use h4m_core::{ChromaSubsampling, H4mError, H4mResult, MediaType, PixelFormat, Rational};

use crate::demuxer::{Demuxer, SeekFlags};
use crate::format_id::FormatId;
use crate::io::IoContext;
use crate::probe::{FormatProbe, ProbeScore, SCORE_EXTENSION, SCORE_MAX};
use crate::stream::{AudioStreamParams, Stream, StreamParams, VideoStreamParams};

/// 签名长度
pub const SIGNATURE_SIZE: usize = 16;

/// 文件头长度 (含签名), 也是 header_size 字段的唯一合法值
pub const HEADER_SIZE: u32 = 0x44;

/// GOP 头部长度
pub const GOP_HEADER_SIZE: usize = 20;

/// GOP 头部末尾的固定标记
pub const GOP_MARKER: u32 = 0x0100_0000;

/// 帧记录头部长度 (media_type + frame_type + size)
pub const FRAME_RECORD_HEADER_SIZE: usize = 8;

/// 文件头字节数
const FILE_HEADER_SIZE: usize = HEADER_SIZE as usize;

/// 签名中的版本前缀
const SIGNATURE_PREFIX: &[u8] = b"HVQM4 ";

/// HVQM4 版本
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Hvqm4Version {
    /// "HVQM4 1.3"
    V1_3,
    /// "HVQM4 1.5"
    V1_5,
}

impl Hvqm4Version {
    /// 从 16 字节签名解析版本
    ///
    /// 版本号之后的字节必须是 NUL 或空格填充.
    pub fn from_signature(sig: &[u8]) -> Option<Self> {
        if sig.len() < SIGNATURE_SIZE || !sig.starts_with(SIGNATURE_PREFIX) {
            return None;
        }
        let version = match &sig[6..9] {
            b"1.3" => Self::V1_3,
            b"1.5" => Self::V1_5,
            _ => return None,
        };
        sig[9..SIGNATURE_SIZE]
            .iter()
            .all(|&b| b == 0 || b == b' ')
            .then_some(version)
    }

    /// 版本号字符串
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::V1_3 => "1.3",
            Self::V1_5 => "1.5",
        }
    }

    /// 生成 NUL 填充的签名
    pub fn signature(&self) -> [u8; SIGNATURE_SIZE] {
        let mut sig = [0u8; SIGNATURE_SIZE];
        sig[..6].copy_from_slice(SIGNATURE_PREFIX);
        sig[6..9].copy_from_slice(self.as_str().as_bytes());
        sig
    }
}

/// 文件头
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileHeader {
    /// 版本
    pub version: Hvqm4Version,
    /// 文件体长度 (文件头之后的字节数)
    pub body_size: u32,
    /// GOP 数量
    pub gop_count: u32,
    /// 视频帧总数
    pub video_frame_count: u32,
    /// 音频帧总数
    pub audio_frame_count: u32,
    /// 每帧时长 (微秒)
    pub frame_duration_usec: u32,
    /// 最大帧记录长度
    pub max_frame_size: u32,
    /// 音频帧长度
    pub audio_frame_size: u32,
    /// 宽度
    pub width: u16,
    /// 高度
    pub height: u16,
    /// 水平色度子采样
    pub h_samp: u8,
    /// 垂直色度子采样
    pub v_samp: u8,
    /// 视频模式
    pub video_mode: u8,
    /// 音频声道数
    pub audio_channels: u8,
    /// 音频位深
    pub audio_bitdepth: u8,
    /// 音频采样率
    pub audio_sample_rate: u32,
}

impl FileHeader {
    /// 文件头字节数
    pub const SIZE: usize = FILE_HEADER_SIZE;

    /// 从完整的 0x44 字节解析
    ///
    /// 签名或 header_size 不合法时返回 `InvalidData`.
    pub fn parse(buf: &[u8]) -> H4mResult<Self> {
        if buf.len() < Self::SIZE {
            return Err(H4mError::truncated(format!(
                "HVQM4 文件头需要 {} 字节, 只有 {}",
                Self::SIZE,
                buf.len()
            )));
        }
        let version = Hvqm4Version::from_signature(&buf[..SIGNATURE_SIZE])
            .ok_or_else(|| H4mError::InvalidData("不是 HVQM4 文件 (签名不匹配)".into()))?;
        let header_size = BigEndian::read_u32(&buf[16..]);
        if header_size != HEADER_SIZE {
            return Err(H4mError::InvalidData(format!(
                "HVQM4: header_size 应为 0x{HEADER_SIZE:X}, 实际 0x{header_size:X}"
            )));
        }
        Ok(Self {
            version,
            body_size: BigEndian::read_u32(&buf[20..]),
            gop_count: BigEndian::read_u32(&buf[24..]),
            video_frame_count: BigEndian::read_u32(&buf[28..]),
            audio_frame_count: BigEndian::read_u32(&buf[32..]),
            frame_duration_usec: BigEndian::read_u32(&buf[36..]),
            max_frame_size: BigEndian::read_u32(&buf[40..]),
            audio_frame_size: BigEndian::read_u32(&buf[48..]),
            width: BigEndian::read_u16(&buf[52..]),
            height: BigEndian::read_u16(&buf[54..]),
            h_samp: buf[56],
            v_samp: buf[57],
            video_mode: buf[58],
            audio_channels: buf[60],
            audio_bitdepth: buf[61],
            audio_sample_rate: BigEndian::read_u32(&buf[64..]),
        })
    }

    /// 从 I/O 读取并解析文件头
    pub fn read(io: &mut IoContext) -> H4mResult<Self> {
        let buf = io.read_array::<FILE_HEADER_SIZE>()?;
        Self::parse(&buf)
    }

    /// 序列化为 0x44 字节 (保留字段写 0)
    pub fn to_bytes(&self) -> [u8; FILE_HEADER_SIZE] {
        let mut buf = [0u8; FILE_HEADER_SIZE];
        buf[..SIGNATURE_SIZE].copy_from_slice(&self.version.signature());
        BigEndian::write_u32(&mut buf[16..], HEADER_SIZE);
        BigEndian::write_u32(&mut buf[20..], self.body_size);
        BigEndian::write_u32(&mut buf[24..], self.gop_count);
        BigEndian::write_u32(&mut buf[28..], self.video_frame_count);
        BigEndian::write_u32(&mut buf[32..], self.audio_frame_count);
        BigEndian::write_u32(&mut buf[36..], self.frame_duration_usec);
        BigEndian::write_u32(&mut buf[40..], self.max_frame_size);
        BigEndian::write_u32(&mut buf[48..], self.audio_frame_size);
        BigEndian::write_u16(&mut buf[52..], self.width);
        BigEndian::write_u16(&mut buf[54..], self.height);
        buf[56] = self.h_samp;
        buf[57] = self.v_samp;
        buf[58] = self.video_mode;
        buf[60] = self.audio_channels;
        buf[61] = self.audio_bitdepth;
        BigEndian::write_u32(&mut buf[64..], self.audio_sample_rate);
        buf
    }

    /// 追加写入到缓冲区
    pub fn write(&self, out: &mut Vec<u8>) {
        out.extend_from_slice(&self.to_bytes());
    }

    /// 色度子采样
    pub fn subsampling(&self) -> ChromaSubsampling {
        ChromaSubsampling::new(self.h_samp, self.v_samp)
    }

    /// 视频帧的时间基 (frame_usec / 1_000_000)
    pub fn frame_time_base(&self) -> Rational {
        Rational::from_frame_duration_usec(self.frame_duration_usec)
    }

    /// 视频总时长 (秒)
    pub fn duration_seconds(&self) -> f64 {
        f64::from(self.video_frame_count) * f64::from(self.frame_duration_usec) / 1_000_000.0
    }
}

/// GOP 头部
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct GopHeader {
    /// 上一个 GOP 的长度 (含头部)
    pub prev_gop_size: u32,
    /// 下一个 GOP 的长度 (含头部)
    pub next_gop_size: u32,
    /// 本 GOP 的视频帧数
    pub video_frame_count: u32,
    /// 本 GOP 的音频帧数
    pub audio_frame_count: u32,
    /// 固定标记
    pub marker: u32,
}

impl GopHeader {
    /// GOP 头部字节数
    pub const SIZE: usize = GOP_HEADER_SIZE;

    /// 创建带正确标记的 GOP 头部
    pub fn new(video_frame_count: u32, audio_frame_count: u32) -> Self {
        Self {
            video_frame_count,
            audio_frame_count,
            marker: GOP_MARKER,
            ..Self::default()
        }
    }

    /// 从 20 字节解析 (不校验标记)
    pub fn parse(buf: &[u8; GOP_HEADER_SIZE]) -> Self {
        Self {
            prev_gop_size: BigEndian::read_u32(&buf[0..]),
            next_gop_size: BigEndian::read_u32(&buf[4..]),
            video_frame_count: BigEndian::read_u32(&buf[8..]),
            audio_frame_count: BigEndian::read_u32(&buf[12..]),
            marker: BigEndian::read_u32(&buf[16..]),
        }
    }

    /// 从 I/O 读取 GOP 头部并校验标记
    pub fn read(io: &mut IoContext) -> H4mResult<Self> {
        let header = Self::parse(&io.read_array()?);
        header.validate()?;
        Ok(header)
    }

    /// 校验固定标记
    pub fn validate(&self) -> H4mResult<()> {
        if self.marker != GOP_MARKER {
            return Err(H4mError::InvalidData(format!(
                "HVQM4: GOP 标记应为 0x{GOP_MARKER:08X}, 实际 0x{:08X}",
                self.marker
            )));
        }
        Ok(())
    }

    /// 本 GOP 的帧记录总数
    pub fn frame_count(&self) -> u64 {
        u64::from(self.video_frame_count) + u64::from(self.audio_frame_count)
    }

    /// 序列化为 20 字节
    pub fn to_bytes(&self) -> [u8; GOP_HEADER_SIZE] {
        let mut buf = [0u8; GOP_HEADER_SIZE];
        BigEndian::write_u32(&mut buf[0..], self.prev_gop_size);
        BigEndian::write_u32(&mut buf[4..], self.next_gop_size);
        BigEndian::write_u32(&mut buf[8..], self.video_frame_count);
        BigEndian::write_u32(&mut buf[12..], self.audio_frame_count);
        BigEndian::write_u32(&mut buf[16..], self.marker);
        buf
    }

    /// 追加写入到缓冲区
    pub fn write(&self, out: &mut Vec<u8>) {
        out.extend_from_slice(&self.to_bytes());
    }
}

/// 已解析 GOP 的索引条目, 用于 seek
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GopIndexEntry {
    /// GOP 头部的字节偏移
    pub pos: u64,
    /// GOP 内第一个视频帧的 dts
    pub video_dts: i64,
    /// GOP 内第一个音频帧的 dts
    pub audio_dts: i64,
    /// 视频帧数
    pub video_frame_count: u32,
    /// 音频帧数
    pub audio_frame_count: u32,
}

impl GopIndexEntry {
    /// 指定媒体类型在本 GOP 内的 dts 范围 [start, end)
    fn dts_range(&self, media_type: MediaType) -> (i64, i64) {
        match media_type {
            MediaType::Audio => (
                self.audio_dts,
                self.audio_dts + i64::from(self.audio_frame_count),
            ),
            _ => (
                self.video_dts,
                self.video_dts + i64::from(self.video_frame_count),
            ),
        }
    }
}

/// HVQM4 解封装器
pub struct Hvqm4Demuxer {
    /// 文件头
    header: Option<FileHeader>,
    /// 流信息
    streams: Vec<Stream>,
    /// 视频流索引
    video_stream: Option<usize>,
    /// 音频流索引
    audio_stream: Option<usize>,
    /// 元数据
    metadata: Vec<(String, String)>,
    /// 第一个 GOP 的字节偏移
    first_gop_pos: u64,
    /// 已解析的 GOP, 按文件顺序
    gop_index: Vec<GopIndexEntry>,
    /// 下一个要读取的 GOP 序号
    next_gop: u32,
    /// 当前 GOP 头部
    gop: GopHeader,
    /// 当前 GOP 内已读取的视频帧数
    gop_video_read: u32,
    /// 当前 GOP 内已读取的音频帧数
    gop_audio_read: u32,
    /// 当前 GOP 首个视频帧的 dts
    gop_video_dts: i64,
    /// 下一个视频包的 dts
    video_dts: i64,
    /// 下一个音频包的 dts
    audio_dts: i64,
}

impl Hvqm4Demuxer {
    /// 创建未打开的解封装器
    pub fn new() -> Self {
        Self {
            header: None,
            streams: Vec::new(),
            video_stream: None,
            audio_stream: None,
            metadata: Vec::new(),
            first_gop_pos: u64::from(HEADER_SIZE),
            gop_index: Vec::new(),
            next_gop: 0,
            gop: GopHeader::default(),
            gop_video_read: 0,
            gop_audio_read: 0,
            gop_video_dts: 0,
            video_dts: 0,
            audio_dts: 0,
        }
    }

    /// 创建 HVQM4 解封装器实例 (工厂函数)
    pub fn create() -> H4mResult<Box<dyn Demuxer>> {
        Ok(Box::new(Self::new()))
    }

    /// 文件头 (open 之后可用)
    pub fn header(&self) -> Option<&FileHeader> {
        self.header.as_ref()
    }

    /// 已解析的 GOP 索引
    pub fn gop_index(&self) -> &[GopIndexEntry] {
        &self.gop_index
    }

    /// 当前所在 GOP 的序号 (尚未读取任何 GOP 时为 None)
    pub fn current_gop(&self) -> Option<u32> {
        self.next_gop.checked_sub(1)
    }

    /// 定位到指定 GOP 的头部, 返回其字节偏移
    ///
    /// 已索引的 GOP 直接跳转, 之后的 GOP 从最后一个已索引 GOP 开始
    /// 逐个读取头部并跳过帧记录. 之后的 `read_packet` 从该 GOP 的第一帧开始.
    pub fn seek_to_gop(&mut self, io: &mut IoContext, index: u32) -> H4mResult<u64> {
        let header = self
            .header
            .as_ref()
            .ok_or_else(|| H4mError::InvalidArgument("HVQM4: 解封装器尚未打开".into()))?;
        if index >= header.gop_count {
            return Err(H4mError::InvalidArgument(format!(
                "HVQM4: GOP 序号 {index} 超出范围 (共 {} 个)",
                header.gop_count
            )));
        }
        if !io.is_seekable() {
            return Err(H4mError::Unsupported("HVQM4: 输入流不支持 seek".into()));
        }

        let indexed = self.gop_index.len() as u32;
        if index < indexed {
            return self.restore_gop(io, index);
        }

        // 从最后一个已索引的 GOP (或第一个 GOP) 向前扫描
        self.restore_gop(io, indexed.saturating_sub(1))?;
        loop {
            let number = self.next_gop;
            self.enter_gop(io)?;
            if number == index {
                break;
            }
            self.skip_gop_records(io)?;
        }
        self.restore_gop(io, index)
    }

    /// 解析文件头并创建流
    fn read_header(&mut self, io: &mut IoContext) -> H4mResult<()> {
        let header = FileHeader::read(io)?;
        let has_video = header.video_frame_count > 0;
        let has_audio = header.audio_frame_count > 0;

        let pixel_format = if has_video {
            header.subsampling().pixel_format()?
        } else {
            PixelFormat::None
        };

        debug!(
            "HVQM4 {}: {}x{} 子采样={} gops={} video={} audio={} frame_usec={}",
            header.version.as_str(),
            header.width,
            header.height,
            header.subsampling(),
            header.gop_count,
            header.video_frame_count,
            header.audio_frame_count,
            header.frame_duration_usec,
        );

        let time_base = header.frame_time_base();
        let mut streams = Vec::new();
        if has_video {
            let frame_rate = if time_base.is_valid() && time_base.num != 0 {
                time_base.invert()
            } else {
                Rational::UNDEFINED
            };
            self.video_stream = Some(streams.len());
            streams.push(Stream {
                index: streams.len(),
                media_type: MediaType::Video,
                codec_id: CodecId::Hvqm4,
                time_base,
                duration: i64::from(header.video_frame_count),
                start_time: 0,
                nb_frames: u64::from(header.video_frame_count),
                extra_data: header.subsampling().to_extra_data().to_vec(),
                params: StreamParams::Video(VideoStreamParams {
                    width: u32::from(header.width),
                    height: u32::from(header.height),
                    pixel_format,
                    frame_rate,
                }),
                metadata: Vec::new(),
            });
        }
        if has_audio {
            self.audio_stream = Some(streams.len());
            streams.push(Stream {
                index: streams.len(),
                media_type: MediaType::Audio,
                codec_id: CodecId::None,
                time_base,
                duration: i64::from(header.audio_frame_count),
                start_time: 0,
                nb_frames: u64::from(header.audio_frame_count),
                extra_data: Vec::new(),
                params: StreamParams::Audio(AudioStreamParams {
                    sample_rate: header.audio_sample_rate,
                    channels: u32::from(header.audio_channels),
                    bits_per_sample: u32::from(header.audio_bitdepth),
                    frame_size: header.audio_frame_size,
                }),
                metadata: Vec::new(),
            });
        }

        self.metadata = vec![
            ("version".into(), header.version.as_str().into()),
            ("video_mode".into(), header.video_mode.to_string()),
            ("max_frame_size".into(), header.max_frame_size.to_string()),
            ("audio_frame_size".into(), header.audio_frame_size.to_string()),
            ("audio_bitdepth".into(), header.audio_bitdepth.to_string()),
        ];
        self.first_gop_pos = io.position()?;
        self.streams = streams;
        self.header = Some(header);
        Ok(())
    }

    /// 读取下一个 GOP 头部, 记录到索引并重置 GOP 内计数
    fn enter_gop(&mut self, io: &mut IoContext) -> H4mResult<()> {
        let number = self.next_gop;
        let pos = io.position()?;
        let gop = GopHeader::read(io)?;

        let entry = GopIndexEntry {
            pos,
            video_dts: self.video_dts,
            audio_dts: self.audio_dts,
            video_frame_count: gop.video_frame_count,
            audio_frame_count: gop.audio_frame_count,
        };
        match self.gop_index.get(number as usize) {
            None => self.gop_index.push(entry),
            Some(known) if *known != entry => {
                warn!("HVQM4: GOP {number} 与已索引的信息不一致: {known:?} vs {entry:?}");
            }
            Some(_) => {}
        }

        debug!(
            "HVQM4: GOP {}/{} @ {pos}: video={} audio={}",
            number + 1,
            self.gop_count(),
            gop.video_frame_count,
            gop.audio_frame_count
        );
        self.gop = gop;
        self.next_gop = number + 1;
        self.gop_video_read = 0;
        self.gop_audio_read = 0;
        self.gop_video_dts = self.video_dts;
        Ok(())
    }

    /// 当前 GOP 的帧记录是否已全部读取
    fn gop_exhausted(&self) -> bool {
        self.gop_video_read >= self.gop.video_frame_count
            && self.gop_audio_read >= self.gop.audio_frame_count
    }

    fn gop_count(&self) -> u32 {
        self.header.as_ref().map_or(0, |h| h.gop_count)
    }

    /// 读取帧记录头部并按媒体类型扣减本 GOP 的帧预算
    fn read_record_header(&mut self, io: &mut IoContext) -> H4mResult<(MediaType, u16, u32)> {
        let media_tag = io.read_u16_be()?;
        let frame_tag = io.read_u16_be()?;
        let size = io.read_u32_be()?;

        let media_type = MediaType::from_hvqm4_tag(media_tag).ok_or_else(|| {
            H4mError::InvalidData(format!("HVQM4: 未知的媒体类型 {media_tag}"))
        })?;
        let (read, budget) = match media_type {
            MediaType::Audio => (&mut self.gop_audio_read, self.gop.audio_frame_count),
            _ => (&mut self.gop_video_read, self.gop.video_frame_count),
        };
        if *read >= budget {
            return Err(H4mError::InvalidData(format!(
                "HVQM4: GOP {} 中的 {media_type} 帧超过头部声明的 {budget} 个",
                self.next_gop
            )));
        }
        *read += 1;
        Ok((media_type, frame_tag, size))
    }

    /// 跳过当前 GOP 剩余的帧记录, 只推进 dts 计数
    fn skip_gop_records(&mut self, io: &mut IoContext) -> H4mResult<()> {
        while !self.gop_exhausted() {
            let (media_type, _, size) = self.read_record_header(io)?;
            io.skip(size as usize)?;
            match media_type {
                MediaType::Audio => self.audio_dts += 1,
                _ => self.video_dts += 1,
            }
        }
        Ok(())
    }

    /// 回到指定 GOP 的起点, 恢复该 GOP 开始时的计数状态
    ///
    /// 没有任何索引时回到第一个 GOP.
    fn restore_gop(&mut self, io: &mut IoContext, number: u32) -> H4mResult<u64> {
        let (pos, video_dts, audio_dts) = match self.gop_index.get(number as usize) {
            Some(entry) => (entry.pos, entry.video_dts, entry.audio_dts),
            None if number == 0 => (self.first_gop_pos, 0, 0),
            None => {
                return Err(H4mError::Unsupported(format!(
                    "HVQM4: GOP {number} 尚未解析, 无法定位"
                )));
            }
        };
        io.seek_to(pos)?;
        self.next_gop = number;
        self.gop = GopHeader::default();
        self.gop_video_read = 0;
        self.gop_audio_read = 0;
        self.video_dts = video_dts;
        self.audio_dts = audio_dts;
        self.gop_video_dts = video_dts;
        debug!("HVQM4: 定位到 GOP {number} @ {pos}");
        Ok(pos)
    }
}

impl Default for Hvqm4Demuxer {
    fn default() -> Self {
        Self::new()
    }
}

impl Demuxer for Hvqm4Demuxer {
    fn format_id(&self) -> FormatId {
        FormatId::Hvqm4
    }

    fn name(&self) -> &str {
        "hvqm4"
    }

    fn open(&mut self, io: &mut IoContext) -> H4mResult<()> {
        *self = Self::new();
        self.read_header(io)
    }

    fn streams(&self) -> &[Stream] {
        &self.streams
    }

    fn read_packet(&mut self, io: &mut IoContext) -> H4mResult<Packet> {
        if self.header.is_none() {
            return Err(H4mError::InvalidArgument("HVQM4: 解封装器尚未打开".into()));
        }

        // 跳过空 GOP
        while self.gop_exhausted() {
            if self.next_gop >= self.gop_count() {
                trace!("HVQM4: 所有 GOP 已读完");
                return Err(H4mError::Eof);
            }
            self.enter_gop(io)?;
        }

        let pos = io.position()?;
        let (media_type, frame_tag, size) = self.read_record_header(io)?;
        let stream_index = match media_type {
            MediaType::Audio => self.audio_stream,
            _ => self.video_stream,
        }
        .ok_or_else(|| {
            H4mError::InvalidData(format!("HVQM4: 文件头没有声明 {media_type} 流"))
        })?;

        let picture_type = match media_type {
            MediaType::Video => PictureType::from_hvqm4_tag(frame_tag).ok_or_else(|| {
                H4mError::InvalidData(format!("HVQM4: 未知的视频帧类型 0x{frame_tag:04X}"))
            })?,
            _ => PictureType::None,
        };

        let end = pos + FRAME_RECORD_HEADER_SIZE as u64 + u64::from(size);
        if io.size().is_some_and(|total| end > total) {
            return Err(H4mError::truncated(format!(
                "HVQM4: 帧记录 @ {pos} 声明 {size} 字节, 超出数据末尾"
            )));
        }
        let payload = io.read_bytes(size as usize)?;

        let (dts, pts) = match media_type {
            MediaType::Audio => {
                let dts = self.audio_dts;
                self.audio_dts += 1;
                (dts, dts)
            }
            _ => {
                let dts = self.video_dts;
                self.video_dts += 1;
                let pts = match payload.get(..4) {
                    Some(id) => 1 + self.gop_video_dts + i64::from(BigEndian::read_u32(id)),
                    None => dts + 1,
                };
                (dts, pts)
            }
        };

        trace!(
            "HVQM4: {media_type} 包 #{dts} {picture_type:?} pts={pts} size={size} @ {pos}"
        );

        let stream = &self.streams[stream_index];
        Ok(Packet {
            data: Bytes::from(payload),
            pts,
            dts,
            duration: 1,
            time_base: stream.time_base,
            stream_index,
            is_keyframe: media_type == MediaType::Audio || picture_type == PictureType::I,
            picture_type,
            pos: pos as i64,
        })
    }

    fn seek(
        &mut self,
        io: &mut IoContext,
        stream_index: usize,
        timestamp: i64,
        _flags: SeekFlags,
    ) -> H4mResult<()> {
        if !io.is_seekable() {
            return Err(H4mError::Unsupported("HVQM4: 输入流不支持 seek".into()));
        }
        let media_type = self
            .streams
            .get(stream_index)
            .ok_or(H4mError::StreamNotFound(stream_index))?
            .media_type;

        if self.gop_index.is_empty() {
            if timestamp > 0 {
                return Err(H4mError::Unsupported(format!(
                    "HVQM4: 时间戳 {timestamp} 所在的 GOP 尚未解析"
                )));
            }
            self.restore_gop(io, 0)?;
            return Ok(());
        }

        // 目标所在的已解析 GOP (第一个结束位置大于目标的 GOP)
        let target = self
            .gop_index
            .iter()
            .position(|entry| timestamp < entry.dts_range(media_type).1)
            .ok_or_else(|| {
                H4mError::Unsupported(format!(
                    "HVQM4: 时间戳 {timestamp} 超出已解析的 GOP, 只能定位到已读取过的 GOP"
                ))
            })?;
        self.restore_gop(io, target as u32)?;
        Ok(())
    }

    fn duration(&self) -> Option<f64> {
        let header = self.header.as_ref()?;
        (header.video_frame_count > 0 && header.frame_duration_usec > 0)
            .then(|| header.duration_seconds())
    }

    fn metadata(&self) -> &[(String, String)] {
        &self.metadata
    }
}

/// HVQM4 格式探测器
pub struct Hvqm4Probe;

impl FormatProbe for Hvqm4Probe {
    fn probe(&self, data: &[u8], filename: Option<&str>) -> Option<ProbeScore> {
        if Hvqm4Version::from_signature(data).is_some() {
            return Some(SCORE_MAX);
        }

        // 扩展名
        if let Some(name) = filename {
            if let Some((_, ext)) = name.rsplit_once('.') {
                if ext.eq_ignore_ascii_case("h4m") {
                    return Some(SCORE_EXTENSION);
                }
            }
        }

        None
    }

    fn format_id(&self) -> FormatId {
        FormatId::Hvqm4
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::io::StreamBackend;

    /// 测试用帧记录
    enum Rec {
        Video(PictureType, u32),
        Audio(usize),
    }

    fn header(gop_count: u32, video: u32, audio: u32) -> FileHeader {
        FileHeader {
            version: Hvqm4Version::V1_5,
            body_size: 0,
            gop_count,
            video_frame_count: video,
            audio_frame_count: audio,
            frame_duration_usec: 33_367,
            max_frame_size: 64,
            audio_frame_size: 16,
            width: 16,
            height: 8,
            h_samp: 2,
            v_samp: 2,
            video_mode: 0,
            audio_channels: 2,
            audio_bitdepth: 4,
            audio_sample_rate: 32_000,
        }
    }

    fn push_record(out: &mut Vec<u8>, media: u16, frame: u16, payload: &[u8]) {
        out.extend_from_slice(&media.to_be_bytes());
        out.extend_from_slice(&frame.to_be_bytes());
        out.extend_from_slice(&(payload.len() as u32).to_be_bytes());
        out.extend_from_slice(payload);
    }

    /// 按 GOP 构造完整文件, 视频负载 = 显示序号 (4 字节) + 4 字节填充
    fn build_file(gops: &[Vec<Rec>]) -> Vec<u8> {
        let video: usize = gops
            .iter()
            .map(|g| g.iter().filter(|r| matches!(r, Rec::Video(..))).count())
            .sum();
        let audio: usize = gops.iter().map(Vec::len).sum::<usize>() - video;
        let mut out = Vec::new();
        header(gops.len() as u32, video as u32, audio as u32).write(&mut out);
        for gop in gops {
            let v = gop.iter().filter(|r| matches!(r, Rec::Video(..))).count() as u32;
            GopHeader::new(v, gop.len() as u32 - v).write(&mut out);
            for rec in gop {
                match rec {
                    Rec::Video(pt, disp) => {
                        let mut payload = disp.to_be_bytes().to_vec();
                        payload.extend_from_slice(&[0xEE; 4]);
                        push_record(&mut out, 1, pt.hvqm4_tag(), &payload);
                    }
                    Rec::Audio(len) => push_record(&mut out, 0, 0, &vec![0xAA; *len]),
                }
            }
        }
        out
    }

    fn two_gop_file() -> Vec<u8> {
        use PictureType::{B, I, P};
        build_file(&[
            vec![
                Rec::Video(I, 0),
                Rec::Audio(8),
                Rec::Video(P, 2),
                Rec::Video(B, 1),
                Rec::Audio(8),
            ],
            vec![
                Rec::Video(I, 0),
                Rec::Video(P, 1),
                Rec::Audio(8),
            ],
        ])
    }

    fn open(data: Vec<u8>) -> (Hvqm4Demuxer, IoContext) {
        let mut io = IoContext::from_memory(data);
        let mut demuxer = Hvqm4Demuxer::new();
        demuxer.open(&mut io).unwrap();
        (demuxer, io)
    }

    fn read_all(demuxer: &mut Hvqm4Demuxer, io: &mut IoContext) -> Vec<Packet> {
        let mut packets = Vec::new();
        loop {
            match demuxer.read_packet(io) {
                Ok(pkt) => packets.push(pkt),
                Err(H4mError::Eof) => return packets,
                Err(e) => panic!("读取失败: {e}"),
            }
        }
    }

    #[test]
    fn test_file_header_round_trip() {
        let hdr = header(3, 10, 4);
        let bytes = hdr.to_bytes();
        assert_eq!(bytes.len(), 0x44);
        assert_eq!(&bytes[..9], b"HVQM4 1.5");
        assert_eq!(&bytes[16..20], &[0, 0, 0, 0x44]);
        assert_eq!(FileHeader::parse(&bytes).unwrap(), hdr);

        let gop = GopHeader::new(5, 2);
        assert_eq!(GopHeader::parse(&gop.to_bytes()), gop);
        assert_eq!(&gop.to_bytes()[16..], &[1, 0, 0, 0]);
    }

    #[test]
    fn test_signature_variants() {
        let mut sig = *b"HVQM4 1.3       ";
        assert_eq!(Hvqm4Version::from_signature(&sig), Some(Hvqm4Version::V1_3));
        sig[12] = 0;
        assert_eq!(Hvqm4Version::from_signature(&sig), Some(Hvqm4Version::V1_3));
        assert_eq!(
            Hvqm4Version::from_signature(&Hvqm4Version::V1_5.signature()),
            Some(Hvqm4Version::V1_5)
        );
        assert_eq!(Hvqm4Version::from_signature(b"HVQM4 1.4\0\0\0\0\0\0\0"), None);
        assert_eq!(Hvqm4Version::from_signature(b"HVQM4 1.3X\0\0\0\0\0\0"), None);
        assert_eq!(Hvqm4Version::from_signature(b"HVQM4 1.3"), None);
    }

    #[test]
    fn test_open_creates_streams() {
        let (demuxer, _) = open(two_gop_file());
        let streams = demuxer.streams();
        assert_eq!(streams.len(), 2);

        let video = &streams[0];
        assert_eq!(video.media_type, MediaType::Video);
        assert_eq!(video.codec_id, CodecId::Hvqm4);
        assert_eq!(video.time_base, Rational::new(33_367, 1_000_000));
        assert_eq!(video.nb_frames, 5);
        assert_eq!(video.duration, 5);
        assert_eq!(video.extra_data, vec![2, 2]);
        match &video.params {
            StreamParams::Video(v) => {
                assert_eq!((v.width, v.height), (16, 8));
                assert_eq!(v.pixel_format, PixelFormat::Yuv420p);
            }
            other => panic!("期望视频参数, 实际 {other:?}"),
        }

        let audio = &streams[1];
        assert_eq!(audio.media_type, MediaType::Audio);
        assert_eq!(audio.codec_id, CodecId::None);
        assert_eq!(audio.nb_frames, 3);
        match &audio.params {
            StreamParams::Audio(a) => {
                assert_eq!(a.sample_rate, 32_000);
                assert_eq!(a.channels, 2);
                assert_eq!(a.bits_per_sample, 4);
            }
            other => panic!("期望音频参数, 实际 {other:?}"),
        }

        let duration = demuxer.duration().unwrap();
        assert!((duration - 5.0 * 0.033_367).abs() < 1e-9);
        assert!(demuxer
            .metadata()
            .contains(&("version".to_string(), "1.5".to_string())));
    }

    #[test]
    fn test_bad_signature_creates_no_streams() {
        let mut data = two_gop_file();
        data[0] = b'X';
        let mut io = IoContext::from_memory(data);
        let mut demuxer = Hvqm4Demuxer::new();
        let err = demuxer.open(&mut io).unwrap_err();
        assert!(matches!(err, H4mError::InvalidData(_)));
        assert!(demuxer.streams().is_empty());
    }

    #[test]
    fn test_bad_header_size_creates_no_streams() {
        let mut data = two_gop_file();
        data[19] = 0x40;
        let mut io = IoContext::from_memory(data);
        let mut demuxer = Hvqm4Demuxer::new();
        assert!(matches!(
            demuxer.open(&mut io),
            Err(H4mError::InvalidData(_))
        ));
        assert!(demuxer.streams().is_empty());
    }

    #[test]
    fn test_unsupported_subsampling_rejected() {
        let mut data = two_gop_file();
        data[56] = 1;
        data[57] = 1;
        let mut io = IoContext::from_memory(data);
        let mut demuxer = Hvqm4Demuxer::new();
        assert!(matches!(
            demuxer.open(&mut io),
            Err(H4mError::Unsupported(_))
        ));
        assert!(demuxer.streams().is_empty());
    }

    #[test]
    fn test_audio_only_file_ignores_subsampling() {
        let mut out = Vec::new();
        let mut hdr = header(1, 0, 1);
        hdr.h_samp = 0;
        hdr.v_samp = 0;
        hdr.write(&mut out);
        GopHeader::new(0, 1).write(&mut out);
        push_record(&mut out, 0, 0, &[1, 2, 3]);

        let (mut demuxer, mut io) = open(out);
        assert_eq!(demuxer.streams().len(), 1);
        assert_eq!(demuxer.streams()[0].media_type, MediaType::Audio);
        assert!(demuxer.duration().is_none());
        let pkt = demuxer.read_packet(&mut io).unwrap();
        assert_eq!(pkt.stream_index, 0);
        assert_eq!(&pkt.data[..], &[1, 2, 3]);
    }

    #[test]
    fn test_packet_counts_and_routing() {
        let (mut demuxer, mut io) = open(two_gop_file());
        let packets = read_all(&mut demuxer, &mut io);
        assert_eq!(packets.len(), 8);

        let video: Vec<_> = packets.iter().filter(|p| p.stream_index == 0).collect();
        let audio: Vec<_> = packets.iter().filter(|p| p.stream_index == 1).collect();
        assert_eq!(video.len(), 5);
        assert_eq!(audio.len(), 3);

        let types: Vec<_> = video.iter().map(|p| p.picture_type).collect();
        use PictureType::{B, I, P};
        assert_eq!(types, vec![I, P, B, I, P]);
        assert!(video[0].is_keyframe && !video[1].is_keyframe);
        assert!(audio.iter().all(|p| p.picture_type == PictureType::None));
        assert_eq!(demuxer.gop_index().len(), 2);

        // 读完之后继续返回 Eof
        assert!(matches!(demuxer.read_packet(&mut io), Err(H4mError::Eof)));
    }

    #[test]
    fn test_timestamps() {
        let (mut demuxer, mut io) = open(two_gop_file());
        let packets = read_all(&mut demuxer, &mut io);
        let video: Vec<_> = packets.iter().filter(|p| p.stream_index == 0).collect();
        let dts: Vec<_> = video.iter().map(|p| p.dts).collect();
        let pts: Vec<_> = video.iter().map(|p| p.pts).collect();
        assert_eq!(dts, vec![0, 1, 2, 3, 4]);
        // GOP 0: 1 + 0 + disp; GOP 1: 1 + 3 + disp
        assert_eq!(pts, vec![1, 3, 2, 4, 5]);

        let audio: Vec<_> = packets.iter().filter(|p| p.stream_index == 1).collect();
        assert_eq!(audio.iter().map(|p| p.dts).collect::<Vec<_>>(), vec![0, 1, 2]);
        assert!(audio.iter().all(|p| p.pts == p.dts));
        assert!(packets.iter().all(|p| p.duration == 1));
    }

    #[test]
    fn test_payload_excludes_record_header() {
        let (mut demuxer, mut io) = open(two_gop_file());
        let pkt = demuxer.read_packet(&mut io).unwrap();
        assert_eq!(pkt.size(), 8);
        assert_eq!(&pkt.data[4..], &[0xEE; 4]);
        // 文件头 0x44 + GOP 头 20
        assert_eq!(pkt.pos, 0x44 + 20);
    }

    #[test]
    fn test_short_payload_is_io_error() {
        let mut data = two_gop_file();
        data.truncate(0x44 + 20 + 8 + 3);
        let (mut demuxer, mut io) = open(data);
        match demuxer.read_packet(&mut io) {
            Err(H4mError::Io(e)) => assert_eq!(e.kind(), std::io::ErrorKind::UnexpectedEof),
            other => panic!("期望 Io 错误, 实际 {other:?}"),
        }
    }

    #[test]
    fn test_missing_gop_is_io_error() {
        let mut out = Vec::new();
        header(2, 1, 0).write(&mut out);
        GopHeader::new(1, 0).write(&mut out);
        push_record(&mut out, 1, 0x10, &[0, 0, 0, 0]);
        let (mut demuxer, mut io) = open(out);
        demuxer.read_packet(&mut io).unwrap();
        assert!(matches!(
            demuxer.read_packet(&mut io),
            Err(H4mError::Io(_))
        ));
    }

    #[test]
    fn test_bad_gop_marker() {
        let mut data = two_gop_file();
        data[0x44 + 16] = 0x02;
        let (mut demuxer, mut io) = open(data);
        assert!(matches!(
            demuxer.read_packet(&mut io),
            Err(H4mError::InvalidData(_))
        ));
    }

    #[test]
    fn test_bad_media_type() {
        let mut out = Vec::new();
        header(1, 1, 0).write(&mut out);
        GopHeader::new(1, 0).write(&mut out);
        push_record(&mut out, 7, 0x10, &[0, 0, 0, 0]);
        let (mut demuxer, mut io) = open(out);
        assert!(matches!(
            demuxer.read_packet(&mut io),
            Err(H4mError::InvalidData(_))
        ));
    }

    #[test]
    fn test_bad_video_frame_type() {
        let mut out = Vec::new();
        header(1, 1, 0).write(&mut out);
        GopHeader::new(1, 0).write(&mut out);
        push_record(&mut out, 1, 0x40, &[0, 0, 0, 0]);
        let (mut demuxer, mut io) = open(out);
        assert!(matches!(
            demuxer.read_packet(&mut io),
            Err(H4mError::InvalidData(_))
        ));
    }

    #[test]
    fn test_record_beyond_gop_budget() {
        let mut out = Vec::new();
        header(1, 1, 1).write(&mut out);
        GopHeader::new(1, 1).write(&mut out);
        push_record(&mut out, 1, 0x10, &[0, 0, 0, 0]);
        push_record(&mut out, 1, 0x20, &[0, 0, 0, 1]);
        let (mut demuxer, mut io) = open(out);
        demuxer.read_packet(&mut io).unwrap();
        assert!(matches!(
            demuxer.read_packet(&mut io),
            Err(H4mError::InvalidData(_))
        ));
    }

    #[test]
    fn test_empty_gop_is_skipped() {
        let mut out = Vec::new();
        header(3, 2, 0).write(&mut out);
        GopHeader::new(1, 0).write(&mut out);
        push_record(&mut out, 1, 0x10, &[0, 0, 0, 0]);
        GopHeader::new(0, 0).write(&mut out);
        GopHeader::new(1, 0).write(&mut out);
        push_record(&mut out, 1, 0x10, &[0, 0, 0, 0]);
        let (mut demuxer, mut io) = open(out);
        let packets = read_all(&mut demuxer, &mut io);
        assert_eq!(packets.len(), 2);
        assert_eq!(packets[1].pts, 2);
        assert_eq!(demuxer.gop_index().len(), 3);
    }

    #[test]
    fn test_seek_restarts_current_gop() {
        let (mut demuxer, mut io) = open(two_gop_file());
        let first = read_all(&mut demuxer, &mut io);

        // 回到第二个 GOP 的起点
        demuxer.seek(&mut io, 0, 3, SeekFlags::default()).unwrap();
        assert_eq!(demuxer.gop_index().len(), 2);
        let again = read_all(&mut demuxer, &mut io);
        assert_eq!(again.len(), 3);
        for (a, b) in again.iter().zip(&first[5..]) {
            assert_eq!((a.dts, a.pts, a.stream_index), (b.dts, b.pts, b.stream_index));
            assert_eq!(a.data, b.data);
        }
    }

    #[test]
    fn test_seek_back_to_earlier_gop() {
        let (mut demuxer, mut io) = open(two_gop_file());
        let first = read_all(&mut demuxer, &mut io);

        demuxer.seek(&mut io, 0, 1, SeekFlags::default()).unwrap();
        let again = read_all(&mut demuxer, &mut io);
        assert_eq!(again.len(), first.len());
        assert_eq!(again[0].pos, first[0].pos);
        assert_eq!(again[0].dts, 0);

        // 按音频时间戳定位
        demuxer.seek(&mut io, 1, 2, SeekFlags::default()).unwrap();
        let pkt = demuxer.read_packet(&mut io).unwrap();
        assert_eq!((pkt.stream_index, pkt.dts), (0, 3));
    }

    #[test]
    fn test_seek_to_unparsed_gop_unsupported() {
        let (mut demuxer, mut io) = open(two_gop_file());
        assert!(matches!(
            demuxer.seek(&mut io, 0, 4, SeekFlags::default()),
            Err(H4mError::Unsupported(_))
        ));

        demuxer.read_packet(&mut io).unwrap();
        assert!(matches!(
            demuxer.seek(&mut io, 0, 3, SeekFlags::default()),
            Err(H4mError::Unsupported(_))
        ));
        assert!(matches!(
            demuxer.seek(&mut io, 5, 0, SeekFlags::default()),
            Err(H4mError::StreamNotFound(5))
        ));
    }

    #[test]
    fn test_seek_before_first_read() {
        let (mut demuxer, mut io) = open(two_gop_file());
        demuxer.seek(&mut io, 0, 0, SeekFlags::default()).unwrap();
        assert_eq!(read_all(&mut demuxer, &mut io).len(), 8);
    }

    #[test]
    fn test_seek_to_gop_forward_and_back() {
        let (mut demuxer, mut io) = open(two_gop_file());
        let second_gop_pos = 0x44 + 20 + 5 * 8 + 3 * 8 + 2 * 8;

        let pos = demuxer.seek_to_gop(&mut io, 1).unwrap();
        assert_eq!(pos, second_gop_pos as u64);
        assert_eq!(demuxer.gop_index().len(), 2);
        let pkt = demuxer.read_packet(&mut io).unwrap();
        assert_eq!((pkt.dts, pkt.pts, pkt.picture_type), (3, 4, PictureType::I));

        let pos = demuxer.seek_to_gop(&mut io, 0).unwrap();
        assert_eq!(pos, 0x44);
        let pkt = demuxer.read_packet(&mut io).unwrap();
        assert_eq!((pkt.dts, pkt.picture_type), (0, PictureType::I));

        assert!(matches!(
            demuxer.seek_to_gop(&mut io, 2),
            Err(H4mError::InvalidArgument(_))
        ));
    }

    #[test]
    fn test_non_seekable_input() {
        let data: &'static [u8] = Box::leak(two_gop_file().into_boxed_slice());
        let mut io = IoContext::new(Box::new(StreamBackend::new(data)));
        let mut demuxer = Hvqm4Demuxer::new();
        demuxer.open(&mut io).unwrap();
        assert_eq!(read_all(&mut demuxer, &mut io).len(), 8);
        assert!(matches!(
            demuxer.seek(&mut io, 0, 0, SeekFlags::default()),
            Err(H4mError::Unsupported(_))
        ));
        assert!(matches!(
            demuxer.seek_to_gop(&mut io, 0),
            Err(H4mError::Unsupported(_))
        ));
    }

    #[test]
    fn test_probe() {
        let probe = Hvqm4Probe;
        let data = two_gop_file();
        assert_eq!(probe.probe(&data, None), Some(SCORE_MAX));
        assert_eq!(probe.probe(b"RIFF....", Some("movie.H4M")), Some(SCORE_EXTENSION));
        assert_eq!(probe.probe(b"RIFF....", Some("movie.thp")), None);
        assert_eq!(probe.probe(&data[..8], None), None);
    }
}
