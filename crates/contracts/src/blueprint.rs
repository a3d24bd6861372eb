//! DaqBlueprint - Config Loader 输出
//!
//! 描述完整的采集配置：前端节点、关联器参数、输出限制、模拟数据源、输出路由。

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use validator::Validate;

use crate::{CorrelatorConfig, NodeDescriptor, NodeId, DEFAULT_PRUNE_THRESHOLD_MS};

/// 配置版本
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ConfigVersion {
    #[default]
    V1,
}

/// 完整的采集配置蓝图
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct DaqBlueprint {
    /// 配置版本
    #[serde(default)]
    pub version: ConfigVersion,

    /// 前端节点列表 (有序)
    #[validate(length(min = 1), nested)]
    pub nodes: Vec<NodeConfig>,

    /// 关联器参数
    #[serde(default)]
    #[validate(nested)]
    pub correlator: CorrelatorSettings,

    /// 输出限制
    #[serde(default)]
    #[validate(nested)]
    pub output: OutputConfig,

    /// 模拟数据源参数
    #[serde(default)]
    #[validate(nested)]
    pub source: SourceConfig,

    /// 输出路由配置
    #[serde(default)]
    #[validate(nested)]
    pub sinks: Vec<SinkConfig>,
}

/// 前端节点配置
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct NodeConfig {
    /// 16 位节点 ID
    pub id: u16,

    /// 节点名称 (唯一)
    #[validate(length(min = 1))]
    pub name: String,

    /// 是否为触发节点
    #[serde(default)]
    pub trigger: bool,

    /// 匹配窗口半宽 (时间戳刻度)，必须 > 0
    #[serde(default = "default_window_width")]
    #[validate(range(min = 1))]
    pub window_width: u32,

    /// 时间戳偏移 (可选，回绕加法)
    #[serde(default)]
    pub offset: Option<i32>,
}

fn default_window_width() -> u32 {
    10
}

/// 关联器参数
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct CorrelatorSettings {
    /// 未完成事件的最大存活时间 (毫秒)
    #[serde(default = "default_prune_threshold_ms")]
    #[validate(range(min = 1))]
    pub prune_threshold_ms: u64,
}

impl Default for CorrelatorSettings {
    fn default() -> Self {
        Self {
            prune_threshold_ms: default_prune_threshold_ms(),
        }
    }
}

fn default_prune_threshold_ms() -> u64 {
    DEFAULT_PRUNE_THRESHOLD_MS
}

/// 输出限制
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct OutputConfig {
    /// 单个事件的最大字节数
    #[serde(default = "default_max_event_bytes")]
    #[validate(range(min = 1))]
    pub max_event_bytes: usize,

    /// 可接受的缓冲类型码 (为空表示全部接受)
    #[serde(default)]
    pub accepted_types: Vec<u16>,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            max_event_bytes: default_max_event_bytes(),
            accepted_types: Vec::new(),
        }
    }
}

fn default_max_event_bytes() -> usize {
    64 * 1024
}

/// 字节序
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ByteOrder {
    #[default]
    Little,
    Big,
}

/// 模拟数据源参数
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct SourceConfig {
    /// 每秒发送的缓冲数
    #[serde(default = "default_rate_hz")]
    #[validate(range(min = 0.001))]
    pub rate_hz: f64,

    /// 每个缓冲内的物理事件数
    #[serde(default = "default_events_per_buffer")]
    #[validate(range(min = 1))]
    pub events_per_buffer: u16,

    /// 相邻触发之间的时间戳步长
    #[serde(default = "default_tick_step")]
    pub tick_step: u32,

    /// 非触发节点的时间戳抖动 (±)
    #[serde(default)]
    pub jitter_ticks: u32,

    /// 线上字节序
    #[serde(default)]
    pub byte_order: ByteOrder,

    /// 每 N 个缓冲插入一个计数器缓冲 (0 表示不插入)
    #[serde(default)]
    pub scaler_every: u32,

    /// 每个节点发送的缓冲总数 (不含运行开始/结束)
    #[serde(default = "default_buffers_per_run")]
    pub buffers_per_run: u32,

    /// 起始时间戳
    #[serde(default)]
    pub start_timestamp: u32,
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            rate_hz: default_rate_hz(),
            events_per_buffer: default_events_per_buffer(),
            tick_step: default_tick_step(),
            jitter_ticks: 0,
            byte_order: ByteOrder::default(),
            scaler_every: 0,
            buffers_per_run: default_buffers_per_run(),
            start_timestamp: 0,
        }
    }
}

fn default_rate_hz() -> f64 {
    100.0
}

fn default_events_per_buffer() -> u16 {
    8
}

fn default_tick_step() -> u32 {
    1000
}

fn default_buffers_per_run() -> u32 {
    100
}

/// Sink 输出配置
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct SinkConfig {
    /// Sink 名称
    #[validate(length(min = 1))]
    pub name: String,

    /// Sink 类型
    pub sink_type: SinkType,

    /// 队列容量
    #[serde(default = "default_queue_capacity")]
    #[validate(range(min = 1))]
    pub queue_capacity: usize,

    /// 类型特定参数
    #[serde(default)]
    pub params: HashMap<String, String>,
}

fn default_queue_capacity() -> usize {
    100
}

/// Sink 类型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SinkType {
    /// 日志输出
    Log,
    /// 文件输出
    File,
}

impl DaqBlueprint {
    /// 构建关联器配置
    pub fn to_correlator_config(&self) -> CorrelatorConfig {
        CorrelatorConfig {
            nodes: self.nodes.iter().map(NodeConfig::to_descriptor).collect(),
            prune_threshold_ms: self.correlator.prune_threshold_ms,
        }
    }

    /// 触发节点 (若恰好配置了一个)
    pub fn trigger_node(&self) -> Option<&NodeConfig> {
        let mut triggers = self.nodes.iter().filter(|n| n.trigger);
        match (triggers.next(), triggers.next()) {
            (Some(node), None) => Some(node),
            _ => None,
        }
    }

    pub fn node_ids(&self) -> Vec<NodeId> {
        self.nodes.iter().map(|n| NodeId::new(n.id)).collect()
    }
}

impl NodeConfig {
    pub fn to_descriptor(&self) -> NodeDescriptor {
        NodeDescriptor {
            id: NodeId::new(self.id),
            name: self.name.clone(),
            is_trigger: self.trigger,
            window_width: self.window_width,
            offset: self.offset,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn node(id: u16, name: &str, trigger: bool) -> NodeConfig {
        NodeConfig {
            id,
            name: name.into(),
            trigger,
            window_width: 4,
            offset: None,
        }
    }

    fn sample_blueprint() -> DaqBlueprint {
        DaqBlueprint {
            version: ConfigVersion::V1,
            nodes: vec![
                node(0x5555, "trigger", true),
                node(0xaaaa, "tdc", false),
                node(0xbbbb, "adc", false),
            ],
            correlator: CorrelatorSettings::default(),
            output: OutputConfig::default(),
            source: SourceConfig::default(),
            sinks: vec![],
        }
    }

    #[test]
    fn correlator_config_keeps_node_order() {
        let mut blueprint = sample_blueprint();
        blueprint.nodes[1].offset = Some(-3);
        blueprint.correlator.prune_threshold_ms = 500;

        let config = blueprint.to_correlator_config();
        assert_eq!(config.prune_threshold_ms, 500);
        assert_eq!(config.nodes.len(), 3);
        assert_eq!(config.nodes[0].id, NodeId::new(0x5555));
        assert!(config.nodes[0].is_trigger);
        assert_eq!(config.nodes[1].offset, Some(-3));
        assert_eq!(config.nodes[2].name, "adc");
    }

    #[test]
    fn trigger_node_requires_exactly_one() {
        let mut blueprint = sample_blueprint();
        assert_eq!(blueprint.trigger_node().map(|n| n.id), Some(0x5555));

        blueprint.nodes[2].trigger = true;
        assert!(blueprint.trigger_node().is_none());

        blueprint.nodes.iter_mut().for_each(|n| n.trigger = false);
        assert!(blueprint.trigger_node().is_none());
    }

    #[test]
    fn derive_validation_catches_zero_window() {
        let mut blueprint = sample_blueprint();
        assert!(blueprint.validate().is_ok());

        blueprint.nodes[1].window_width = 0;
        assert!(blueprint.validate().is_err());
    }
}
