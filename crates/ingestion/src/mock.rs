//! Mock 节点数据源
//!
//! 用于没有真实前端硬件的运行和测试：在独立线程上按固定速率生成一次
//! 完整运行 (BeginRun、物理缓冲、可选计数器缓冲、EndRun) 的原始缓冲。

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use bytes::{BufMut, Bytes, BytesMut};
use contracts::{
    ByteOrder, NodeConfig, NodeId, NodeSource, PhysicsFragment, RawBufferCallback, ScalerFragment,
    ScalerKind, SourceConfig, TransitionFragment, TransitionKind,
};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tracing::{debug, trace};

use crate::codec::BufferEncoder;

/// Mock 节点配置
#[derive(Debug, Clone)]
pub struct MockNodeConfig {
    /// 节点 ID
    pub node: NodeId,

    /// 线上字节序
    pub byte_order: ByteOrder,

    /// 每秒发送的缓冲数
    pub rate_hz: f64,

    /// 每个缓冲内的物理事件数
    pub events_per_buffer: u16,

    /// 相邻事件的理想时间戳步长
    pub tick_step: u32,

    /// 时间戳随机抖动 (±)
    pub jitter_ticks: u32,

    /// 节点时钟相对触发节点的偏移；发出的原始时间戳已减去该值
    pub offset: i32,

    /// 每 N 个物理缓冲后插入一个计数器缓冲 (0 表示不插入)
    pub scaler_every: u32,

    /// 物理缓冲总数
    pub buffers_per_run: u32,

    /// 第一个事件的理想时间戳
    pub start_timestamp: u32,

    /// 每个事件的载荷字数
    pub payload_words: u16,

    pub run_number: u32,
    pub title: String,
}

impl Default for MockNodeConfig {
    fn default() -> Self {
        Self {
            node: NodeId::default(),
            byte_order: ByteOrder::Little,
            rate_hz: 100.0,
            events_per_buffer: 8,
            tick_step: 1000,
            jitter_ticks: 0,
            offset: 0,
            scaler_every: 0,
            buffers_per_run: 100,
            start_timestamp: 0,
            payload_words: 2,
            run_number: 1,
            title: "mock run".to_string(),
        }
    }
}

impl MockNodeConfig {
    /// 由蓝图中的节点与数据源参数构造；抖动只加在非触发节点上。
    pub fn from_blueprint(node: &NodeConfig, source: &SourceConfig) -> Self {
        Self {
            node: NodeId::new(node.id),
            byte_order: source.byte_order,
            rate_hz: source.rate_hz,
            events_per_buffer: source.events_per_buffer,
            tick_step: source.tick_step,
            jitter_ticks: if node.trigger { 0 } else { source.jitter_ticks },
            offset: node.offset.unwrap_or(0),
            scaler_every: source.scaler_every,
            buffers_per_run: source.buffers_per_run,
            start_timestamp: source.start_timestamp,
            ..Default::default()
        }
    }

    /// 一次运行发出的缓冲总数
    pub fn total_buffers(&self) -> u32 {
        let scalers = match self.scaler_every {
            0 => 0,
            n => self.buffers_per_run / n,
        };
        self.buffers_per_run + scalers + 2
    }
}

/// Mock 节点数据源
pub struct MockNodeSource {
    config: MockNodeConfig,
    running: Arc<AtomicBool>,
    finished: Arc<AtomicBool>,
}

impl MockNodeSource {
    pub fn new(config: MockNodeConfig) -> Self {
        Self {
            config,
            running: Arc::new(AtomicBool::new(false)),
            finished: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn config(&self) -> &MockNodeConfig {
        &self.config
    }
}

impl NodeSource for MockNodeSource {
    fn node_id(&self) -> NodeId {
        self.config.node
    }

    fn listen(&self, callback: RawBufferCallback) {
        if self.running.swap(true, Ordering::SeqCst) {
            return;
        }

        let config = self.config.clone();
        let running = self.running.clone();
        let finished = self.finished.clone();

        std::thread::spawn(move || {
            debug!(node = %config.node, "mock node source started");
            let mut run = MockRun::new(&config);
            let interval = Duration::from_secs_f64(1.0 / config.rate_hz);

            let mut complete = false;
            while running.load(Ordering::Relaxed) {
                let Some(buffer) = run.next_buffer() else {
                    complete = true;
                    break;
                };
                trace!(node = %config.node, bytes = buffer.len(), "mock buffer sent");
                callback(buffer);
                std::thread::sleep(interval);
            }

            running.store(false, Ordering::SeqCst);
            finished.store(complete, Ordering::SeqCst);
            debug!(node = %config.node, "mock node source stopped");
        });
    }

    fn stop(&self) {
        self.running.store(false, Ordering::SeqCst);
    }

    fn is_listening(&self) -> bool {
        self.running.load(Ordering::Relaxed)
    }

    fn is_finished(&self) -> bool {
        self.finished.load(Ordering::Relaxed)
    }
}

enum Phase {
    Begin,
    Physics,
    End,
    Done,
}

/// Buffer sequence of one run; pure so it can be stepped without a thread.
struct MockRun<'a> {
    config: &'a MockNodeConfig,
    encoder: BufferEncoder,
    rng: StdRng,
    phase: Phase,
    buffers_sent: u32,
    scaler_due: bool,
    event_index: u32,
    elapsed_secs: u32,
}

impl<'a> MockRun<'a> {
    fn new(config: &'a MockNodeConfig) -> Self {
        Self {
            config,
            encoder: BufferEncoder::new(config.node, config.byte_order),
            rng: StdRng::seed_from_u64(u64::from(config.node.get())),
            phase: Phase::Begin,
            buffers_sent: 0,
            scaler_due: false,
            event_index: 0,
            elapsed_secs: 0,
        }
    }

    fn next_buffer(&mut self) -> Option<Bytes> {
        match self.phase {
            Phase::Begin => {
                self.phase = if self.config.buffers_per_run == 0 {
                    Phase::End
                } else {
                    Phase::Physics
                };
                Some(self.transition(TransitionKind::Begin))
            }
            Phase::Physics if self.scaler_due => {
                self.scaler_due = false;
                if self.buffers_sent >= self.config.buffers_per_run {
                    self.phase = Phase::End;
                }
                Some(self.scaler())
            }
            Phase::Physics => {
                let buffer = self.physics();
                self.buffers_sent += 1;
                let every = self.config.scaler_every;
                self.scaler_due = every != 0 && self.buffers_sent % every == 0;
                if !self.scaler_due && self.buffers_sent >= self.config.buffers_per_run {
                    self.phase = Phase::End;
                }
                Some(buffer)
            }
            Phase::End => {
                self.phase = Phase::Done;
                Some(self.transition(TransitionKind::End))
            }
            Phase::Done => None,
        }
    }

    fn transition(&mut self, transition: TransitionKind) -> Bytes {
        self.encoder.transition(&TransitionFragment {
            transition,
            run_number: self.config.run_number,
            title: self.config.title.clone(),
            elapsed_time: self.elapsed_secs,
            absolute_time: 0,
        })
    }

    fn physics(&mut self) -> Bytes {
        let config = self.config;
        let mut events = Vec::with_capacity(usize::from(config.events_per_buffer));
        for _ in 0..config.events_per_buffer {
            let ideal = config
                .start_timestamp
                .wrapping_add(self.event_index.wrapping_mul(config.tick_step));
            let jitter = match config.jitter_ticks {
                0 => 0,
                j => {
                    let j = j.min(i32::MAX as u32) as i32;
                    self.rng.random_range(-j..=j)
                }
            };
            let timestamp = ideal
                .wrapping_add_signed(jitter)
                .wrapping_add_signed(config.offset.wrapping_neg());

            let mut payload = BytesMut::with_capacity(usize::from(config.payload_words) * 2);
            for word in 0..config.payload_words {
                payload.put_u16_le(match word {
                    0 => self.event_index as u16,
                    1 => config.node.get(),
                    _ => self.rng.random(),
                });
            }

            events.push(PhysicsFragment {
                timestamp,
                payload: payload.freeze(),
            });
            self.event_index = self.event_index.wrapping_add(1);
        }
        self.encoder.physics(&events)
    }

    fn scaler(&mut self) -> Bytes {
        let start = self.elapsed_secs;
        self.elapsed_secs += 1;
        self.encoder.scaler(&ScalerFragment {
            kind: ScalerKind::Scaler,
            interval_start: start,
            interval_end: self.elapsed_secs,
            values: vec![self.event_index, self.buffers_sent],
        })
    }
}
