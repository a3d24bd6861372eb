//! # Integration Tests
//!
//! 集成测试与端到端测试。
//!
//! 负责：
//! - 线上缓冲 -> 解码 -> 节点队列 -> 关联器 -> 转发器 -> sink 的确定性流程
//! - 基于 mock 节点数据源的多线程 e2e 测试
//! - 配置文件驱动的偏移量校正

#[cfg(test)]
mod contract_tests {
    #[test]
    fn test_contracts_compile() {
        let _ = contracts::ConfigVersion::V1;
        assert_eq!(contracts::NodeId::new(0x5555).to_string(), "0x5555");
    }
}

/// 单线程驱动：把编码好的缓冲逐个喂给关联器
#[cfg(test)]
mod wire_tests {
    use std::collections::HashMap;
    use std::time::Instant;

    use bytes::Bytes;
    use contracts::{
        ByteOrder, CorrelatorConfig, EventBody, NodeDescriptor, NodeId, OutputConfig,
        PhysicsFragment, SinkConfig, SinkType, SourceNotice, TransitionFragment, TransitionKind,
        TYPE_BEGIN_RUN, TYPE_END_RUN, TYPE_PHYSICS,
    };
    use dispatcher::{create_dispatcher, read_event_file, EventForwarder};
    use event_builder::Correlator;
    use ingestion::{decode_buffer, BufferEncoder, NodeQueues};

    const TRIGGER: NodeId = NodeId::new(0x5555);
    const TDC: NodeId = NodeId::new(0xaaaa);
    const ADC: NodeId = NodeId::new(0xbbbb);

    fn descriptor(id: NodeId, name: &str, trigger: bool) -> NodeDescriptor {
        NodeDescriptor {
            id,
            name: name.into(),
            is_trigger: trigger,
            window_width: 4,
            offset: None,
        }
    }

    fn correlator() -> Correlator {
        Correlator::new(CorrelatorConfig::new(vec![
            descriptor(TRIGGER, "trigger", true),
            descriptor(TDC, "tdc", false),
            descriptor(ADC, "adc", false),
        ]))
        .unwrap()
    }

    fn transition(kind: TransitionKind) -> TransitionFragment {
        TransitionFragment {
            transition: kind,
            run_number: 7,
            title: "e2e".into(),
            elapsed_time: 0,
            absolute_time: 0,
        }
    }

    fn physics(timestamp: u32, payload: &'static [u8]) -> PhysicsFragment {
        PhysicsFragment {
            timestamp,
            payload: Bytes::from_static(payload),
        }
    }

    /// Decode one wire buffer, queue it, and notify the correlator.
    fn deliver(
        buf: &[u8],
        queues: &mut NodeQueues,
        correlator: &mut Correlator,
        forwarder: &mut EventForwarder,
    ) {
        let decoded = decode_buffer(buf).unwrap();
        assert!(decoded.rejected.is_empty());
        let node = decoded.header.node;
        queues.push(node, decoded.fragments).unwrap();
        correlator.handle_notice(
            SourceNotice::NewFragments(node),
            queues,
            forwarder,
            Instant::now(),
        );
    }

    #[tokio::test]
    async fn test_three_node_event_through_file_sink() {
        let dir = tempfile::tempdir().unwrap();
        let (mut forwarder, event_rx) = EventForwarder::channel(&OutputConfig::default(), 64);
        let sink = SinkConfig {
            name: "file".into(),
            sink_type: SinkType::File,
            queue_capacity: 16,
            params: HashMap::from([(
                "base_path".to_string(),
                dir.path().display().to_string(),
            )]),
        };
        let dispatcher = create_dispatcher(vec![sink], event_rx).await.unwrap();
        let dispatcher_handle = dispatcher.spawn();

        let mut correlator = correlator();
        let mut queues = NodeQueues::new([TRIGGER, TDC, ADC]);
        let mut trigger = BufferEncoder::new(TRIGGER, ByteOrder::Little);
        let mut tdc = BufferEncoder::new(TDC, ByteOrder::Big);
        let mut adc = BufferEncoder::new(ADC, ByteOrder::Little);

        for encoder in [&mut trigger, &mut tdc, &mut adc] {
            let buf = encoder.transition(&transition(TransitionKind::Begin));
            deliver(&buf, &mut queues, &mut correlator, &mut forwarder);
        }

        // Members arrive before the trigger and wait in the unmatched queue.
        let buf = adc.physics(&[physics(0x1234_5677, &[5, 6, 7, 8])]);
        deliver(&buf, &mut queues, &mut correlator, &mut forwarder);
        let buf = tdc.physics(&[physics(0x1234_5679, &[3, 4])]);
        deliver(&buf, &mut queues, &mut correlator, &mut forwarder);
        assert_eq!(correlator.unmatched_len(), 2);

        let buf = trigger.physics(&[physics(0x1234_5678, &[1, 2])]);
        deliver(&buf, &mut queues, &mut correlator, &mut forwarder);
        assert_eq!(correlator.unmatched_len(), 0);
        assert_eq!(correlator.in_flight_len(), 0);

        for encoder in [&mut trigger, &mut tdc, &mut adc] {
            let buf = encoder.transition(&transition(TransitionKind::End));
            deliver(&buf, &mut queues, &mut correlator, &mut forwarder);
        }

        assert_eq!(forwarder.forwarded(), 3);
        drop(forwarder);
        let report = dispatcher_handle.await.unwrap();
        assert_eq!(report.events, 3);
        assert_eq!(report.sinks[0].1.write_count, 3);

        let events = read_event_file(dir.path().join("run-0007.evb")).unwrap();
        let types: Vec<u16> = events.iter().map(|e| e.type_code).collect();
        assert_eq!(types, vec![TYPE_BEGIN_RUN, TYPE_PHYSICS, TYPE_END_RUN]);

        let event = &events[1];
        assert_eq!(event.contributors, vec![TRIGGER, ADC, TDC]);
        let EventBody::Physics {
            reference_timestamp,
            ..
        } = &event.body
        else {
            panic!("expected physics body");
        };
        assert_eq!(*reference_timestamp, 0x1234_5678);

        let records = event.sub_records();
        let stamps: Vec<u32> = records.iter().map(|r| r.timestamp).collect();
        assert_eq!(stamps, vec![0x1234_5678, 0x1234_5677, 0x1234_5679]);
        // Big-endian payload words come out normalized.
        assert_eq!(records[2].payload.as_ref(), &[3, 4]);
        assert_eq!(records[1].payload.as_ref(), &[5, 6, 7, 8]);
    }

    #[test]
    fn test_oversized_event_is_counted_not_forwarded() {
        let output = OutputConfig {
            max_event_bytes: 16,
            accepted_types: vec![],
        };
        let (mut forwarder, _rx) = EventForwarder::channel(&output, 8);
        let mut correlator = correlator();
        let mut queues = NodeQueues::new([TRIGGER, TDC, ADC]);

        let mut encoders = [
            BufferEncoder::new(TRIGGER, ByteOrder::Little),
            BufferEncoder::new(TDC, ByteOrder::Little),
            BufferEncoder::new(ADC, ByteOrder::Little),
        ];
        for encoder in encoders.iter_mut() {
            let buf = encoder.physics(&[physics(1000, &[0; 8])]);
            deliver(&buf, &mut queues, &mut correlator, &mut forwarder);
        }

        let stats = correlator.statistics();
        assert_eq!(forwarder.forwarded(), 0);
        assert_eq!(stats.sink_rejected, 1);
        assert_eq!(stats.total_fragments(), 3);
        assert_eq!(correlator.in_flight_len(), 0);
    }
}

/// 多线程 mock 数据源 e2e
#[cfg(test)]
mod e2e_tests {
    use std::collections::HashMap;
    use std::time::{Duration, Instant};

    use config_loader::{ConfigFormat, ConfigLoader};
    use contracts::{
        CorrelatorConfig, DaqBlueprint, NodeId, SourceNotice, TYPE_BEGIN_RUN, TYPE_END_RUN,
        TYPE_PHYSICS, TYPE_SCALER,
    };
    use dispatcher::{create_dispatcher, read_event_file, DispatchReport, EventForwarder};
    use event_builder::Correlator;
    use ingestion::{IngestionPipeline, MockNodeConfig, MockNodeSource, NodeQueues, SourceEvent};
    use observability::EventMetricsAggregator;

    const CONFIG: &str = r#"
[[nodes]]
id = 0x5555
name = "trigger"
trigger = true
window_width = 8

[[nodes]]
id = 0xaaaa
name = "tdc"
window_width = 8
offset = 3

[[nodes]]
id = 0xbbbb
name = "adc"
window_width = 8
offset = -2

[source]
rate_hz = 500.0
events_per_buffer = 5
tick_step = 100
jitter_ticks = 2
buffers_per_run = 4
scaler_every = 2
start_timestamp = 0xFFFF_FF00
"#;

    struct RunOutcome {
        forwarded: u64,
        stats: contracts::CorrelatorStats,
        events: EventMetricsAggregator,
        report: DispatchReport,
    }

    /// Drive the blueprint's mock sources through the whole chain.
    async fn run_blueprint(
        blueprint: &DaqBlueprint,
        correlator_config: CorrelatorConfig,
        base_path: &std::path::Path,
    ) -> RunOutcome {
        let mut sink = contracts::SinkConfig {
            name: "file".into(),
            sink_type: contracts::SinkType::File,
            queue_capacity: 256,
            params: HashMap::new(),
        };
        sink.params
            .insert("base_path".into(), base_path.display().to_string());

        let (mut forwarder, event_rx) = EventForwarder::channel(&blueprint.output, 1024);
        let dispatcher = create_dispatcher(vec![sink], event_rx).await.unwrap();
        let dispatcher_handle = dispatcher.spawn();

        let mut correlator = Correlator::new(correlator_config).unwrap();
        let mut queues = NodeQueues::new(blueprint.node_ids());
        let mut ingestion = IngestionPipeline::new();
        for node in &blueprint.nodes {
            let config = MockNodeConfig::from_blueprint(node, &blueprint.source);
            ingestion.register_node_source(Box::new(MockNodeSource::new(config)));
        }
        let rx = ingestion.take_receiver().unwrap();
        ingestion.start_all();

        let deadline = Instant::now() + Duration::from_secs(10);
        while !(ingestion.all_finished() && rx.is_empty()) {
            assert!(Instant::now() < deadline, "mock sources did not finish");
            let event = match tokio::time::timeout(Duration::from_millis(50), rx.recv()).await {
                Ok(Ok(event)) => event,
                _ => continue,
            };
            if let SourceEvent::Fragments { node, fragments } = event {
                queues.push(node, fragments).unwrap();
                correlator.handle_notice(
                    SourceNotice::NewFragments(node),
                    &mut queues,
                    &mut forwarder,
                    Instant::now(),
                );
            }
        }
        ingestion.stop_all();
        correlator.handle_notice(
            SourceNotice::ShuttingDown,
            &mut queues,
            &mut forwarder,
            Instant::now(),
        );

        let forwarded = forwarder.forwarded();
        drop(forwarder);
        let report = dispatcher_handle.await.unwrap();

        let mut events = EventMetricsAggregator::new();
        for path in ["run-0001.evb", "orphans.evb"] {
            if let Ok(stored) = read_event_file(base_path.join(path)) {
                stored.iter().for_each(|e| events.update(e));
            }
        }

        RunOutcome {
            forwarded,
            stats: correlator.statistics(),
            events,
            report,
        }
    }

    #[tokio::test]
    async fn test_mock_run_builds_every_event() {
        let blueprint = ConfigLoader::load_from_str(CONFIG, ConfigFormat::Toml).unwrap();
        let dir = tempfile::tempdir().unwrap();

        let outcome = run_blueprint(&blueprint, blueprint.to_correlator_config(), dir.path()).await;

        // 4 buffers x 5 events, 2 scalers per node, one begin and one end.
        assert_eq!(outcome.events.events_by_type.get(&TYPE_PHYSICS), Some(&20));
        assert_eq!(outcome.events.events_by_type.get(&TYPE_SCALER), Some(&6));
        assert_eq!(outcome.events.events_by_type.get(&TYPE_BEGIN_RUN), Some(&1));
        assert_eq!(outcome.events.events_by_type.get(&TYPE_END_RUN), Some(&1));
        assert_eq!(outcome.forwarded, 28);
        assert_eq!(outcome.report.events, 28);
        assert_eq!(outcome.stats.total_discarded(), 0);
        assert_eq!(outcome.stats.total_unmatched(), 0);

        // Every physics event has all three nodes, and the reference clock
        // advances by one tick step across the wrap.
        let summary = outcome.events.summary();
        assert_eq!(summary.contributors.min, 3.0);
        assert_eq!(summary.contributors.max, 3.0);
        assert_eq!(summary.timestamp_gap.min, 100.0);
        assert_eq!(summary.timestamp_gap.max, 100.0);
    }

    #[tokio::test]
    async fn test_uncorrected_offset_discards_members() {
        let mut blueprint = ConfigLoader::load_from_str(CONFIG, ConfigFormat::Toml).unwrap();
        blueprint.source.jitter_ticks = 0;

        // The adc clock still runs 2 ticks ahead, but the correlator no longer
        // corrects for it, so its fragments never fit a window and are
        // flushed by the end-of-run barrier.
        let mut correlator_config = blueprint.to_correlator_config();
        correlator_config.nodes[2].offset = None;
        correlator_config.nodes[2].window_width = 1;

        let dir = tempfile::tempdir().unwrap();
        let outcome = run_blueprint(&blueprint, correlator_config, dir.path()).await;

        assert_eq!(outcome.events.events_by_type.get(&TYPE_PHYSICS), None);
        assert_eq!(outcome.events.events_by_type.get(&TYPE_END_RUN), Some(&1));
        assert_eq!(outcome.forwarded, 8);
        // 20 unmatched adc fragments plus 20 trigger+tdc assemblies
        assert_eq!(outcome.stats.discarded(NodeId::new(0xbbbb)), 20);
        assert_eq!(outcome.stats.discarded(NodeId::new(0x5555)), 20);
        assert_eq!(outcome.stats.total_discarded(), 60);
    }
}
