//! 平面图像缓冲区与图像重建器接口.
//!
//! HVQM4 的熵解码与运动补偿算法不在本 crate 内实现, 由 [`PictureReconstructor`]
//! 接入. 解码器按帧类型调用对应方法, 并负责提供参考帧和输出缓冲区.

use h4m_core::{H4mError, H4mResult, PixelFormat};

use super::sequence::SequenceObject;

/// 中性灰度值 (Y/U/V 均为 128)
pub const NEUTRAL_SAMPLE: u8 = 0x80;

/// 连续存放的 YUV420P 平面缓冲区
///
/// 内存布局: Y (w*h), 紧接 U ((w/2)*(h/2)), 再接 V ((w/2)*(h/2)).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PlanarBuffer {
    data: Vec<u8>,
    width: u32,
    height: u32,
}

impl PlanarBuffer {
    /// 创建以中性灰填充的缓冲区
    pub fn new(width: u32, height: u32) -> Self {
        let size = PixelFormat::Yuv420p
            .frame_size(width, height)
            .unwrap_or_default();
        Self {
            data: vec![NEUTRAL_SAMPLE; size],
            width,
            height,
        }
    }

    /// 宽度
    pub fn width(&self) -> u32 {
        self.width
    }

    /// 高度
    pub fn height(&self) -> u32 {
        self.height
    }

    /// 全部平面数据
    pub fn as_bytes(&self) -> &[u8] {
        &self.data
    }

    /// 可写的全部平面数据
    pub fn as_bytes_mut(&mut self) -> &mut [u8] {
        &mut self.data
    }

    /// 字节数
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// 是否为空
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// 平面在连续缓冲区中的字节范围
    fn plane_range(&self, plane: usize) -> std::ops::Range<usize> {
        let pf = PixelFormat::Yuv420p;
        let mut start = 0;
        for p in 0..plane {
            start += pf.plane_size(p, self.width, self.height).unwrap_or(0);
        }
        let len = pf.plane_size(plane, self.width, self.height).unwrap_or(0);
        start..start + len
    }

    /// 读取单个平面 (0=Y, 1=U, 2=V), 索引越界时返回空切片
    pub fn plane(&self, plane: usize) -> &[u8] {
        let range = self.plane_range(plane);
        &self.data[range]
    }

    /// 同时取得三个平面的可写引用
    pub fn planes_mut(&mut self) -> (&mut [u8], &mut [u8], &mut [u8]) {
        let y_len = self.plane_range(0).len();
        let u_len = self.plane_range(1).len();
        let (y, rest) = self.data.split_at_mut(y_len);
        let (u, v) = rest.split_at_mut(u_len);
        (y, u, v)
    }

    /// 用指定的 Y/U/V 值填充
    pub fn fill(&mut self, y: u8, u: u8, v: u8) {
        let (yp, up, vp) = self.planes_mut();
        yp.fill(y);
        up.fill(u);
        vp.fill(v);
    }

    /// 从同尺寸缓冲区复制
    pub fn copy_from(&mut self, other: &PlanarBuffer) -> H4mResult<()> {
        if self.len() != other.len() {
            return Err(H4mError::InvalidArgument(format!(
                "平面缓冲区尺寸不一致: {}x{} vs {}x{}",
                self.width, self.height, other.width, other.height
            )));
        }
        self.data.copy_from_slice(&other.data);
        Ok(())
    }
}

/// 图像重建器
///
/// 三个方法按参考帧数量区分 (0/1/2). 输出缓冲区与参考帧永远是不同的缓冲区.
/// 负载损坏时返回 `InvalidData`, 此时解码器不会轮转参考帧.
pub trait PictureReconstructor: Send {
    /// 重建 I 帧 (无参考)
    fn decode_i(
        &mut self,
        seq: &mut SequenceObject,
        payload: &[u8],
        out: &mut PlanarBuffer,
    ) -> H4mResult<()>;

    /// 重建 P 帧 (参考 `past`)
    fn decode_p(
        &mut self,
        seq: &mut SequenceObject,
        payload: &[u8],
        past: &PlanarBuffer,
        out: &mut PlanarBuffer,
    ) -> H4mResult<()>;

    /// 重建 B 帧 (参考 `past` 与 `future`)
    fn decode_b(
        &mut self,
        seq: &mut SequenceObject,
        payload: &[u8],
        past: &PlanarBuffer,
        future: &PlanarBuffer,
        out: &mut PlanarBuffer,
    ) -> H4mResult<()>;
}

/// 参考复制重建器
///
/// 不解析 HVQ 码流, 只按参考关系生成画面: I 帧输出中性灰,
/// P 帧复制 `past`, B 帧取 `past` 与 `future` 的四舍五入平均.
/// 用于在没有接入真实算法时走通整条解码管线.
#[derive(Debug, Default, Clone, Copy)]
pub struct ReferenceCopyReconstructor;

impl ReferenceCopyReconstructor {
    fn check(seq: &SequenceObject, payload: &[u8], out: &PlanarBuffer) -> H4mResult<()> {
        if payload.is_empty() {
            return Err(H4mError::InvalidData("HVQM4: 图像负载为空".into()));
        }
        if payload.len() > seq.max_payload_size() {
            return Err(H4mError::InvalidData(format!(
                "HVQM4: 图像负载 {} 字节超过上限 {}",
                payload.len(),
                seq.max_payload_size()
            )));
        }
        if out.len() != seq.frame_size() {
            return Err(H4mError::InvalidArgument(format!(
                "HVQM4: 输出缓冲区 {} 字节, 序列需要 {} 字节",
                out.len(),
                seq.frame_size()
            )));
        }
        Ok(())
    }
}

impl PictureReconstructor for ReferenceCopyReconstructor {
    fn decode_i(
        &mut self,
        seq: &mut SequenceObject,
        payload: &[u8],
        out: &mut PlanarBuffer,
    ) -> H4mResult<()> {
        Self::check(seq, payload, out)?;
        out.fill(NEUTRAL_SAMPLE, NEUTRAL_SAMPLE, NEUTRAL_SAMPLE);
        Ok(())
    }

    fn decode_p(
        &mut self,
        seq: &mut SequenceObject,
        payload: &[u8],
        past: &PlanarBuffer,
        out: &mut PlanarBuffer,
    ) -> H4mResult<()> {
        Self::check(seq, payload, out)?;
        out.copy_from(past)
    }

    fn decode_b(
        &mut self,
        seq: &mut SequenceObject,
        payload: &[u8],
        past: &PlanarBuffer,
        future: &PlanarBuffer,
        out: &mut PlanarBuffer,
    ) -> H4mResult<()> {
        Self::check(seq, payload, out)?;
        if past.len() != out.len() || future.len() != out.len() {
            return Err(H4mError::InvalidArgument("HVQM4: 参考帧尺寸不一致".into()));
        }
        for ((dst, &a), &b) in out
            .as_bytes_mut()
            .iter_mut()
            .zip(past.as_bytes())
            .zip(future.as_bytes())
        {
            *dst = ((u16::from(a) + u16::from(b) + 1) >> 1) as u8;
        }
        Ok(())
    }
}
