//! 输出帧组装.
//!
//! 把连续存放的 YUV420P 缓冲区逐行复制到目标帧, 目标平面的 linesize 可以带填充.

use h4m_core::{H4mError, H4mResult, PixelFormat};

use super::picture::PlanarBuffer;
use crate::frame::VideoFrame;

/// 将平面缓冲区复制到视频帧
///
/// 目标帧必须是 YUV420P 且尺寸与源一致. 任一平面 linesize 小于平面宽度,
/// 或平面数据不足以容纳全部行时返回 `InvalidArgument`.
pub fn copy_planar_to_frame(src: &PlanarBuffer, dst: &mut VideoFrame) -> H4mResult<()> {
    if dst.pixel_format != PixelFormat::Yuv420p {
        return Err(H4mError::InvalidArgument(format!(
            "输出帧像素格式必须是 yuv420p, 实际 {}",
            dst.pixel_format
        )));
    }
    if dst.width != src.width() || dst.height != src.height() {
        return Err(H4mError::InvalidArgument(format!(
            "输出帧尺寸 {}x{} 与解码尺寸 {}x{} 不一致",
            dst.width,
            dst.height,
            src.width(),
            src.height()
        )));
    }
    if dst.data.len() < 3 || dst.linesize.len() < 3 {
        return Err(H4mError::InvalidArgument("输出帧缺少平面".into()));
    }

    let pf = PixelFormat::Yuv420p;
    for plane in 0..3 {
        let width = pf.plane_linesize(plane, src.width()).unwrap_or(0);
        let rows = pf.plane_height(plane, src.height()).unwrap_or(0);
        let stride = dst.linesize[plane];
        if stride < width {
            return Err(H4mError::InvalidArgument(format!(
                "平面 {plane} 的 linesize {stride} 小于宽度 {width}"
            )));
        }
        if rows > 0 && dst.data[plane].len() < stride * (rows - 1) + width {
            return Err(H4mError::InvalidArgument(format!(
                "平面 {plane} 数据不足: {} 字节, 需要 {}x{} (stride {stride})",
                dst.data[plane].len(),
                width,
                rows
            )));
        }

        let source = src.plane(plane);
        if width == 0 {
            continue;
        }
        for (row, line) in source.chunks_exact(width).take(rows).enumerate() {
            let start = row * stride;
            dst.data[plane][start..start + width].copy_from_slice(line);
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn gradient(width: u32, height: u32) -> PlanarBuffer {
        let mut buf = PlanarBuffer::new(width, height);
        for (i, b) in buf.as_bytes_mut().iter_mut().enumerate() {
            *b = i as u8;
        }
        buf
    }

    #[test]
    fn test_copy_tightly_packed() {
        let src = gradient(4, 2);
        let mut frame = VideoFrame::new(4, 2, PixelFormat::Yuv420p);
        frame.alloc_planes(1).unwrap();
        copy_planar_to_frame(&src, &mut frame).unwrap();
        assert_eq!(frame.data[0], vec![0, 1, 2, 3, 4, 5, 6, 7]);
        assert_eq!(frame.data[1], vec![8, 9]);
        assert_eq!(frame.data[2], vec![10, 11]);
    }

    #[test]
    fn test_copy_with_padded_stride() {
        let src = gradient(4, 4);
        let mut frame = VideoFrame::new(4, 4, PixelFormat::Yuv420p);
        frame.alloc_planes(8).unwrap();
        copy_planar_to_frame(&src, &mut frame).unwrap();

        assert_eq!(frame.linesize[0], 8);
        for row in 0..4 {
            let expected: Vec<u8> = (row * 4..row * 4 + 4).map(|v| v as u8).collect();
            assert_eq!(frame.row(0, row as usize).unwrap(), &expected[..]);
        }
        // 填充字节保持不变
        assert_eq!(&frame.data[0][4..8], &[0, 0, 0, 0]);
        assert_eq!(frame.row(1, 1).unwrap(), &[18, 19]);
        assert_eq!(frame.row(2, 0).unwrap(), &[20, 21]);
    }

    #[test]
    fn test_rejects_short_stride() {
        let src = gradient(4, 4);
        let mut frame = VideoFrame::new(4, 4, PixelFormat::Yuv420p);
        frame.alloc_planes(1).unwrap();
        frame.linesize[1] = 1;
        let err = copy_planar_to_frame(&src, &mut frame).unwrap_err();
        assert!(matches!(err, H4mError::InvalidArgument(_)));
    }

    #[test]
    fn test_rejects_small_plane() {
        let src = gradient(4, 4);
        let mut frame = VideoFrame::new(4, 4, PixelFormat::Yuv420p);
        frame.alloc_planes(1).unwrap();
        frame.data[0].truncate(10);
        assert!(copy_planar_to_frame(&src, &mut frame).is_err());
    }
}
