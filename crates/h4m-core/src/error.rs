//! 统一错误类型定义.
//!
//! 所有 h4m crate 共用的错误类型, 支持跨模块传播.

use thiserror::Error;

/// h4m 统一错误类型
#[derive(Debug, Error)]
pub enum H4mError {
    /// 无效参数 (调用方传入的配置或缓冲区不合法)
    #[error("无效参数: {0}")]
    InvalidArgument(String),

    /// 不支持的操作或格式 (色度子采样, 不可 seek 的流等)
    #[error("不支持的操作: {0}")]
    Unsupported(String),

    /// 编解码器状态错误
    #[error("编解码器错误: {0}")]
    Codec(String),

    /// I/O 错误, 包括声明长度之内的短读
    #[error("I/O 错误: {0}")]
    Io(#[from] std::io::Error),

    /// 数据不足, 需要更多输入
    #[error("数据不足, 需要更多输入")]
    NeedMoreData,

    /// 已到达流末尾
    #[error("已到达流末尾")]
    Eof,

    /// 未找到指定的编解码器
    #[error("未找到编解码器: {0}")]
    CodecNotFound(String),

    /// 未找到指定的容器格式
    #[error("未找到容器格式: {0}")]
    FormatNotFound(String),

    /// 未找到指定的流
    #[error("未找到流: 索引 {0}")]
    StreamNotFound(usize),

    /// 无效数据 (结构错误或损坏的码流)
    #[error("无效数据: {0}")]
    InvalidData(String),
}

impl H4mError {
    /// 构造 "数据被截断" 的 I/O 错误
    ///
    /// 用于区分 GOP 边界处的正常结束和记录中途的短读.
    pub fn truncated(what: impl Into<String>) -> Self {
        Self::Io(std::io::Error::new(
            std::io::ErrorKind::UnexpectedEof,
            what.into(),
        ))
    }

    /// 是否为结构性错误 (签名、头部大小、GOP 标记等)
    pub fn is_structural(&self) -> bool {
        matches!(self, Self::InvalidData(_))
    }
}

/// h4m 统一 Result 类型
pub type H4mResult<T> = Result<T, H4mError>;
