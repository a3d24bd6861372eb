//! Event Builder 指标收集模块
//!
//! 按事件记录 Prometheus 指标，并在内存中聚合出运行摘要。
//! 关联器内部的计数器 (`evb_fragments_total` 等) 由 event_builder 直接发出。

use std::collections::BTreeMap;

use contracts::{AssembledEvent, CorrelatorStats, EventBody, NodeId};
use metrics::{counter, gauge, histogram};

/// 记录一个已提交事件的指标
///
/// # Example
///
/// ```ignore
/// use observability::metrics::record_event_metrics;
///
/// record_event_metrics(&event);
/// forwarder.submit(event)?;
/// ```
pub fn record_event_metrics(event: &AssembledEvent) {
    counter!("evb_events_output_total", "type" => event.type_code.to_string()).increment(1);
    histogram!("evb_event_bytes").record(event.encoded_len() as f64);

    if let EventBody::Physics {
        reference_timestamp,
        ..
    } = &event.body
    {
        histogram!("evb_event_contributors").record(event.contributors.len() as f64);
        gauge!("evb_last_reference_timestamp").set(f64::from(*reference_timestamp));
    }
    gauge!("evb_last_event_id").set(event.event_id as f64);
}

/// 记录一个已解码的缓冲
pub fn record_buffer_decoded(node: NodeId, fragments: usize) {
    counter!("evb_buffers_decoded_total", "node" => node.to_string()).increment(1);
    histogram!("evb_fragments_per_buffer", "node" => node.to_string()).record(fragments as f64);
}

/// 记录整个缓冲被拒绝
pub fn record_decode_error(node: NodeId, kind: &'static str) {
    counter!(
        "evb_decode_errors_total",
        "node" => node.to_string(),
        "kind" => kind
    )
    .increment(1);
}

/// 记录节点队列深度
pub fn record_queue_depth(node: NodeId, depth: usize) {
    gauge!("evb_node_queue_depth", "node" => node.to_string()).set(depth as f64);
}

/// 以仪表形式发布关联器累计统计
pub fn record_correlator_stats(stats: &CorrelatorStats) {
    gauge!("evb_stats_fragments").set(stats.total_fragments() as f64);
    gauge!("evb_stats_completed").set(stats.total_completed() as f64);
    gauge!("evb_stats_discarded").set(stats.total_discarded() as f64);
    gauge!("evb_stats_unmatched").set(stats.total_unmatched() as f64);
    gauge!("evb_stats_rejected").set(stats.total_rejected() as f64);
}

/// 事件指标聚合器
///
/// 在内存中聚合输出事件，便于运行结束时打印摘要。
#[derive(Debug, Clone, Default)]
pub struct EventMetricsAggregator {
    /// 事件总数
    pub total_events: u64,

    /// 各类型事件数
    pub events_by_type: BTreeMap<u16, u64>,

    /// 各节点参与的物理事件数
    pub contributions: BTreeMap<NodeId, u64>,

    /// 物理事件大小 (字节)
    pub physics_bytes: RunningStats,

    /// 每个物理事件的参与节点数
    pub contributor_stats: RunningStats,

    /// 相邻物理事件参考时间戳之差 (回绕安全)
    pub timestamp_gap: RunningStats,

    last_reference: Option<u32>,
}

impl EventMetricsAggregator {
    pub fn new() -> Self {
        Self::default()
    }

    /// 更新聚合统计
    pub fn update(&mut self, event: &AssembledEvent) {
        self.total_events += 1;
        *self.events_by_type.entry(event.type_code).or_insert(0) += 1;

        let EventBody::Physics {
            reference_timestamp,
            records,
        } = &event.body
        else {
            return;
        };

        for node in &event.contributors {
            *self.contributions.entry(*node).or_insert(0) += 1;
        }
        self.physics_bytes.push(records.len() as f64);
        self.contributor_stats.push(event.contributors.len() as f64);

        if let Some(last) = self.last_reference {
            self.timestamp_gap
                .push(f64::from(reference_timestamp.wrapping_sub(last)));
        }
        self.last_reference = Some(*reference_timestamp);
    }

    /// 生成摘要报告
    pub fn summary(&self) -> MetricsSummary {
        let physics = self.contributor_stats.count();
        MetricsSummary {
            total_events: self.total_events,
            physics_events: physics,
            events_by_type: self.events_by_type.clone(),
            node_participation: self
                .contributions
                .iter()
                .map(|(&node, &count)| {
                    let rate = if physics > 0 {
                        count as f64 / physics as f64 * 100.0
                    } else {
                        0.0
                    };
                    (node, rate)
                })
                .collect(),
            physics_bytes: StatsSummary::from(&self.physics_bytes),
            contributors: StatsSummary::from(&self.contributor_stats),
            timestamp_gap: StatsSummary::from(&self.timestamp_gap),
        }
    }

    pub fn reset(&mut self) {
        *self = Self::default();
    }
}

/// 指标摘要
#[derive(Debug, Clone, Default)]
pub struct MetricsSummary {
    pub total_events: u64,
    pub physics_events: u64,
    pub events_by_type: BTreeMap<u16, u64>,
    /// 每个节点参与物理事件的百分比
    pub node_participation: BTreeMap<NodeId, f64>,
    pub physics_bytes: StatsSummary,
    pub contributors: StatsSummary,
    pub timestamp_gap: StatsSummary,
}

impl std::fmt::Display for MetricsSummary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "=== Event Builder Summary ===")?;
        writeln!(f, "Total events: {}", self.total_events)?;
        writeln!(f, "Physics events: {}", self.physics_events)?;
        for (type_code, count) in &self.events_by_type {
            writeln!(f, "  type {:>2}: {}", type_code, count)?;
        }
        writeln!(f, "Event size (bytes): {}", self.physics_bytes)?;
        writeln!(f, "Contributors per event: {}", self.contributors)?;
        writeln!(f, "Reference timestamp gap: {}", self.timestamp_gap)?;

        if !self.node_participation.is_empty() {
            writeln!(f, "Node participation:")?;
            for (node, rate) in &self.node_participation {
                writeln!(f, "  {}: {:.2}%", node, rate)?;
            }
        }

        Ok(())
    }
}

/// 统计摘要
#[derive(Debug, Clone, Default)]
pub struct StatsSummary {
    pub count: u64,
    pub min: f64,
    pub max: f64,
    pub mean: f64,
    pub std_dev: f64,
}

impl From<&RunningStats> for StatsSummary {
    fn from(stats: &RunningStats) -> Self {
        let (min, max) = stats.range().unwrap_or_default();
        Self {
            count: stats.count(),
            min,
            max,
            mean: stats.mean(),
            std_dev: stats.std_dev(),
        }
    }
}

impl std::fmt::Display for StatsSummary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.count == 0 {
            return write!(f, "N/A");
        }
        write!(
            f,
            "min={:.1}, max={:.1}, mean={:.2}, std={:.2} (n={})",
            self.min, self.max, self.mean, self.std_dev, self.count
        )
    }
}

/// 在线统计计算器 (Welford's algorithm)
#[derive(Debug, Clone, Default)]
pub struct RunningStats {
    count: u64,
    mean: f64,
    m2: f64,
    range: Option<(f64, f64)>,
}

impl RunningStats {
    pub fn push(&mut self, value: f64) {
        self.count += 1;
        self.range = Some(match self.range {
            None => (value, value),
            Some((lo, hi)) => (lo.min(value), hi.max(value)),
        });

        let delta = value - self.mean;
        self.mean += delta / self.count as f64;
        self.m2 += delta * (value - self.mean);
    }

    pub fn count(&self) -> u64 {
        self.count
    }

    pub fn mean(&self) -> f64 {
        self.mean
    }

    /// 样本方差
    pub fn variance(&self) -> f64 {
        if self.count < 2 {
            0.0
        } else {
            self.m2 / (self.count - 1) as f64
        }
    }

    pub fn std_dev(&self) -> f64 {
        self.variance().sqrt()
    }

    /// `(min, max)`，无样本时为 None
    pub fn range(&self) -> Option<(f64, f64)> {
        self.range
    }
}
