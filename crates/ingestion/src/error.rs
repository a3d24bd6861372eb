//! Ingestion 错误类型

use contracts::{ContractError, NodeId};
use thiserror::Error;

/// Ingestion 错误
#[derive(Debug, Error)]
pub enum IngestionError {
    /// 缓冲区短于记录头
    #[error("buffer too short: {len} bytes, need at least {min}")]
    BufferTooShort {
        /// 实际字节数
        len: usize,
        /// 最少字节数
        min: usize,
    },

    /// 字节序签名无法识别
    #[error("bad byte-order signature: {found:#x}")]
    BadSignature {
        /// 读到的签名值
        found: u32,
    },

    /// 声明长度超出实际数据
    #[error("record truncated: declared {declared} bytes, {available} available")]
    Truncated {
        /// 声明的字节数
        declared: usize,
        /// 可用字节数
        available: usize,
    },

    /// 不支持的缓冲类型
    #[error("unsupported buffer type {type_code}")]
    UnsupportedType {
        /// 类型码
        type_code: u16,
    },

    /// 节点未配置
    #[error("no queue for node {node}")]
    UnknownNode {
        /// 节点 ID
        node: NodeId,
    },

    /// 缓冲头中的节点与数据源不符
    #[error("buffer from node {found} arrived on the source of node {expected}")]
    NodeMismatch {
        /// 数据源所属节点
        expected: NodeId,
        /// 缓冲头中的节点
        found: NodeId,
    },

    /// 契约层错误 (例如 EventTooSmall)
    #[error(transparent)]
    Contract(#[from] ContractError),
}

impl IngestionError {
    /// 指标标签
    pub fn kind_label(&self) -> &'static str {
        match self {
            Self::BufferTooShort { .. } => "buffer_too_short",
            Self::BadSignature { .. } => "bad_signature",
            Self::Truncated { .. } => "truncated",
            Self::UnsupportedType { .. } => "unsupported_type",
            Self::UnknownNode { .. } => "unknown_node",
            Self::NodeMismatch { .. } => "node_mismatch",
            Self::Contract(err) => err.kind_label(),
        }
    }
}

/// Ingestion Result 类型别名
pub type Result<T> = std::result::Result<T, IngestionError>;
