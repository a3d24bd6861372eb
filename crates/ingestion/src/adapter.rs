//! 节点适配器 trait

use std::sync::Arc;

use async_channel::Sender;
use contracts::{Fragment, NodeId};

use crate::error::IngestionError;
use crate::counters::IngestionMetrics;

/// 适配器发往消费端的消息
#[derive(Debug)]
pub enum SourceEvent {
    /// 一个缓冲解码出的片段 (可能为空)
    Fragments {
        node: NodeId,
        fragments: Vec<Fragment>,
    },

    /// 整个缓冲被拒绝
    Failed { node: NodeId, error: IngestionError },
}

impl SourceEvent {
    pub fn node(&self) -> NodeId {
        match self {
            Self::Fragments { node, .. } | Self::Failed { node, .. } => *node,
        }
    }
}

/// 节点适配器 trait
///
/// 每个节点一个适配器，负责：
/// 1. 向数据源注册回调
/// 2. 解码原始缓冲
/// 3. 封装为 `SourceEvent` 发送到通道
pub trait NodeAdapter: Send + Sync {
    fn node_id(&self) -> NodeId;

    /// 启动数据采集
    ///
    /// # Arguments
    /// * `tx` - 事件发送通道
    /// * `metrics` - 共享的 ingestion 指标
    fn start(&self, tx: Sender<SourceEvent>, metrics: Arc<IngestionMetrics>);

    fn stop(&self);

    fn is_listening(&self) -> bool;

    /// 数据源是否已发送完毕
    fn is_finished(&self) -> bool;
}
