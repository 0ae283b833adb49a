//! # h4m-codec
//!
//! h4m 编解码器库, 提供 Packet/Frame 抽象、解码器框架和 HVQM4 视频解码器.
//!
//! 本 crate 对标 FFmpeg 的 libavcodec. HVQM4 的熵解码与运动补偿算法
//! 通过 [`decoders::hvqm4::PictureReconstructor`] 接入, 本 crate 负责
//! I/P/B 帧的参考帧调度和输出平面拼装.
//!
//! ## 使用示例
//!
//! ```rust
//! use h4m_codec::{CodecId, CodecRegistry};
//!
//! let mut reg = CodecRegistry::new();
//! h4m_codec::register_all(&mut reg);
//!
//! let decoder = reg.create_decoder(CodecId::Hvqm4).unwrap();
//! assert_eq!(decoder.name(), "hvqm4");
//! ```

pub mod codec_id;
pub mod codec_parameters;
pub mod decoder;
pub mod decoders;
pub mod frame;
pub mod packet;
pub mod registry;

// 重导出常用类型
pub use codec_id::CodecId;
pub use codec_parameters::{AudioCodecParams, CodecParameters, CodecParamsType, VideoCodecParams};
pub use decoder::Decoder;
pub use frame::{PictureType, VideoFrame};
pub use packet::Packet;
pub use registry::CodecRegistry;

/// 注册所有内置编解码器
pub fn register_all(registry: &mut CodecRegistry) {
    decoders::register_all_decoders(registry);
}
