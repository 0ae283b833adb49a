//! HVQM4 序列对象.
//!
//! 保存整条视频流共用的配置 (尺寸, 色度子采样) 和重建过程使用的工作缓冲区.
//! 在解码器 `open()` 时按容器头部创建一次, 解码器销毁时释放.

use h4m_core::{ChromaSubsampling, H4mError, H4mResult, PixelFormat};

/// 重建工作区中每个 4x4 块保留的状态字节数
const BLOCK_STATE_BYTES: usize = 4;

/// HVQ 的基本块边长 (像素)
const BLOCK_SIZE: usize = 4;

/// 序列对象
#[derive(Debug)]
pub struct SequenceObject {
    width: u32,
    height: u32,
    subsampling: ChromaSubsampling,
    pixel_format: PixelFormat,
    /// 重建器使用的工作区
    work: Vec<u8>,
}

impl SequenceObject {
    /// 创建序列对象
    ///
    /// 尺寸为 0 返回 `InvalidArgument`, 非 4:2:0 子采样返回 `Unsupported`.
    /// 两种情况都不会分配工作区.
    pub fn new(width: u32, height: u32, subsampling: ChromaSubsampling) -> H4mResult<Self> {
        if width == 0 || height == 0 {
            return Err(H4mError::InvalidArgument(format!(
                "HVQM4: 无效的图像尺寸 {width}x{height}"
            )));
        }
        let pixel_format = subsampling.pixel_format()?;
        let work = vec![0u8; Self::work_buffer_size(width, height, subsampling)];
        Ok(Self {
            width,
            height,
            subsampling,
            pixel_format,
            work,
        })
    }

    /// 计算工作区大小
    ///
    /// 亮度平面和两个色度平面的 4x4 块数之和, 每块 `BLOCK_STATE_BYTES` 字节.
    pub fn work_buffer_size(width: u32, height: u32, subsampling: ChromaSubsampling) -> usize {
        let blocks = |w: usize, h: usize| w.div_ceil(BLOCK_SIZE) * h.div_ceil(BLOCK_SIZE);
        let (w, h) = (width as usize, height as usize);
        let h_samp = usize::from(subsampling.h_samp.max(1));
        let v_samp = usize::from(subsampling.v_samp.max(1));
        let luma = blocks(w, h);
        let chroma = blocks(w.div_ceil(h_samp), h.div_ceil(v_samp));
        (luma + 2 * chroma) * BLOCK_STATE_BYTES
    }

    /// 图像宽度
    pub fn width(&self) -> u32 {
        self.width
    }

    /// 图像高度
    pub fn height(&self) -> u32 {
        self.height
    }

    /// 色度子采样
    pub fn subsampling(&self) -> ChromaSubsampling {
        self.subsampling
    }

    /// 像素格式 (始终为 YUV420P)
    pub fn pixel_format(&self) -> PixelFormat {
        self.pixel_format
    }

    /// 一帧平面数据的字节数
    pub fn frame_size(&self) -> usize {
        self.pixel_format
            .frame_size(self.width, self.height)
            .unwrap_or_default()
    }

    /// 单帧压缩负载的上限 (未压缩帧大小的两倍)
    pub fn max_payload_size(&self) -> usize {
        self.frame_size().saturating_mul(2)
    }

    /// 工作区
    pub fn work_buffer(&self) -> &[u8] {
        &self.work
    }

    /// 可写工作区
    pub fn work_buffer_mut(&mut self) -> &mut [u8] {
        &mut self.work
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sequence_object_sizes() {
        let seq = SequenceObject::new(640, 480, ChromaSubsampling::YUV420).unwrap();
        assert_eq!(seq.frame_size(), 640 * 480 * 3 / 2);
        // 亮度 160x120 块, 色度 80x60 块 x2
        let expected = (160 * 120 + 2 * 80 * 60) * BLOCK_STATE_BYTES;
        assert_eq!(seq.work_buffer().len(), expected);
        assert_eq!(seq.pixel_format(), PixelFormat::Yuv420p);
    }

    #[test]
    fn test_sequence_object_rejects_unsupported_subsampling() {
        let err = SequenceObject::new(64, 64, ChromaSubsampling::new(1, 1)).unwrap_err();
        assert!(matches!(err, H4mError::Unsupported(_)));
    }

    #[test]
    fn test_sequence_object_rejects_zero_size() {
        let err = SequenceObject::new(0, 64, ChromaSubsampling::YUV420).unwrap_err();
        assert!(matches!(err, H4mError::InvalidArgument(_)));
    }

    #[test]
    fn test_work_buffer_rounds_partial_blocks() {
        // 10x6: 亮度 3x2 块, 色度 5x3 像素 → 2x1 块
        let size = SequenceObject::work_buffer_size(10, 6, ChromaSubsampling::YUV420);
        assert_eq!(size, (3 * 2 + 2 * 2) * BLOCK_STATE_BYTES);
    }
}
