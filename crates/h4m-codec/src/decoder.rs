//! 解码器 trait 定义.
//!
//! 所有解码器实现必须实现 `Decoder` trait.

use h4m_core::H4mResult;

use crate::codec_id::CodecId;
use crate::codec_parameters::CodecParameters;
use crate::frame::VideoFrame;
use crate::packet::Packet;

/// 解码器 trait
///
/// 解码流程:
/// 1. 调用 `open()` 传入解封装器给出的流参数
/// 2. 调用 `send_packet()` 送入压缩数据 (按解码顺序)
/// 3. 调用 `receive_frame()` 取出解码后的帧
/// 4. 送入空包 (flush) 表示输入结束
///
/// 一个解码器实例只服务一条流, 所有调用必须串行.
pub trait Decoder: Send {
    /// 获取解码器标识
    fn codec_id(&self) -> CodecId;

    /// 获取解码器名称
    fn name(&self) -> &str;

    /// 使用参数配置解码器, 分配序列对象和参考帧缓冲区
    fn open(&mut self, params: &CodecParameters) -> H4mResult<()>;

    /// 送入一个压缩数据包进行解码
    ///
    /// # 返回
    /// - `Ok(())`: 数据包已接受 (可能因缺少参考帧被丢弃)
    /// - `Err(H4mError::NeedMoreData)`: 上一帧尚未取出
    fn send_packet(&mut self, packet: &Packet) -> H4mResult<()>;

    /// 从解码器取出一帧解码数据
    ///
    /// # 返回
    /// - `Ok(frame)`: 成功取出一帧
    /// - `Err(H4mError::NeedMoreData)`: 需要送入更多数据包
    /// - `Err(H4mError::Eof)`: 已刷新且所有帧已取出
    fn receive_frame(&mut self) -> H4mResult<VideoFrame>;

    /// 刷新解码器, 清空参考帧状态
    ///
    /// 用于 seek 后重置解码器状态.
    fn flush(&mut self);
}
