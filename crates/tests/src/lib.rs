//! # Integration Tests
//!
//! 集成测试与端到端测试。
//!
//! 负责：
//! - 示例配置可加载
//! - 模拟硬件 -> bridge -> 总线 -> monitor -> aggregator 的端到端链路
//! - 相机轮换与致命硬件错误

#[cfg(test)]
mod config_tests {
    use config_loader::{ConfigFormat, ConfigLoader};
    use contracts::GuardBlueprint;
    use std::path::Path;

    #[test]
    fn test_sample_config_loads() {
        let path = Path::new(env!("CARGO_MANIFEST_DIR")).join("../../config.toml");
        let blueprint = ConfigLoader::load_from_path(&path).unwrap();
        assert_eq!(blueprint.watchdog.sources.len(), 6);
        assert_eq!(blueprint.rotation.cameras.len(), 5);
        assert!(!blueprint.simulation.feeds.is_empty());
    }

    #[test]
    fn test_json_export_loads_back() {
        let json = ConfigLoader::to_json(&GuardBlueprint::default()).unwrap();
        let blueprint = ConfigLoader::load_from_str(&json, ConfigFormat::Json).unwrap();
        assert_eq!(
            blueprint.watchdog.sources,
            GuardBlueprint::default().watchdog.sources
        );
    }
}

#[cfg(test)]
mod e2e_tests {
    use std::collections::HashMap;
    use std::sync::Arc;
    use std::time::Duration;

    use acquisition::{
        AcquisitionBridge, AcquisitionError, RotationController, RotationPhase, RotationSettings,
        Scratch,
    };
    use contracts::{
        Envelope, GuardBlueprint, Header, InterruptLevel, Message, PayloadKind, Publisher,
        RangeScan, RawPayload, SharedPublisher, SinkConfig, SinkType, VbusIndex,
    };
    use dispatcher::{bus, BusPublisher, DispatcherBuilder, SinkSnapshot};
    use hardware::{
        DataSelection, FailurePoint, HardwareOp, HardwareTransport, MockGuidance,
        MockGuidanceConfig, TransportCall,
    };
    use tokio::sync::mpsc;
    use tokio::task::JoinHandle;
    use watchdog::{HeartbeatRegistry, ProximityFilter, SafetyAggregator, SafetyMonitor};

    /// Bus, dispatcher and watchdog wired as in `motion-guard run`
    struct Rig {
        bus: BusPublisher,
        publisher: SharedPublisher,
        aggregator: Arc<SafetyAggregator>,
        interrupts: mpsc::Receiver<Envelope>,
        dispatcher: JoinHandle<Vec<(String, SinkSnapshot)>>,
        monitor: JoinHandle<u64>,
    }

    impl Rig {
        async fn new(bp: &GuardBlueprint) -> Self {
            let (bus, rx) = bus(bp.bridge.bus_capacity);
            let publisher: SharedPublisher = Arc::new(bus.clone());

            let registry = Arc::new(HeartbeatRegistry::from_config(&bp.watchdog).unwrap());
            let filter = Arc::new(ProximityFilter::from_config(&bp.proximity));
            let aggregator = Arc::new(SafetyAggregator::new(
                registry,
                filter.clone(),
                publisher.clone(),
                bp.topics.interrupt.clone(),
            ));
            let monitor = SafetyMonitor::new(bp, filter, aggregator.clone()).unwrap();

            let mut builder = DispatcherBuilder::new(bp.sinks.clone(), rx);
            let watched = builder.subscribe(
                "monitor",
                monitor.topics().map(str::to_string).collect(),
                256,
            );
            let interrupts =
                builder.subscribe("interrupts", vec![bp.topics.interrupt.clone()], 1024);
            let dispatcher = builder.build().await.unwrap().spawn();
            let monitor = tokio::spawn(async move { monitor.run(watched).await });

            Self {
                bus,
                publisher,
                aggregator,
                interrupts,
                dispatcher,
                monitor,
            }
        }

        /// Close the bus and collect every interrupt level that went out
        async fn finish(mut self) -> (Vec<InterruptLevel>, Vec<(String, SinkSnapshot)>) {
            self.bus.close();
            let sinks = self.dispatcher.await.unwrap();
            self.monitor.await.unwrap();

            let mut levels = Vec::new();
            while let Some(envelope) = self.interrupts.recv().await {
                if let Message::Interrupt(msg) = envelope.message {
                    levels.push(msg.level);
                }
            }
            (levels, sinks)
        }
    }

    fn clear_scan(frame: &str) -> Message {
        Message::Range(RangeScan {
            header: Header::now(frame),
            ranges: vec![3.0; 5],
            intensities: vec![1.0; 5],
        })
    }

    fn mock(ultrasonic_mm: i16, failures: Vec<FailurePoint>) -> Arc<MockGuidance> {
        Arc::new(MockGuidance::new(MockGuidanceConfig {
            rate_hz: 200.0,
            ultrasonic_mm,
            failures,
            ..Default::default()
        }))
    }

    fn fast_rotation() -> RotationSettings {
        RotationSettings {
            settle_delay: Duration::from_millis(1),
            release_ack_delay: Duration::from_millis(1),
            cycle_timeout: Some(Duration::from_secs(2)),
            select_depth: false,
        }
    }

    /// Six sources at 0.5 s, velocity silent: STALE once velocity is 0.55 s old
    #[tokio::test(start_paused = true)]
    async fn test_silent_velocity_raises_stale_on_bus() {
        let bp = GuardBlueprint::default();
        let rig = Rig::new(&bp).await;

        let topics: Vec<String> = bp
            .watchdog
            .sources
            .iter()
            .filter(|s| s.name != "velocity")
            .map(|s| s.topic.clone())
            .collect();
        let feeder = {
            let publisher = rig.publisher.clone();
            tokio::spawn(async move {
                let mut interval = tokio::time::interval(Duration::from_millis(100));
                for _ in 0..10 {
                    interval.tick().await;
                    for topic in &topics {
                        publisher
                            .publish(Envelope::new(topic.as_str(), clear_scan("sim")))
                            .unwrap();
                    }
                }
            })
        };

        let ticks = rig
            .aggregator
            .clone()
            .run(
                bp.watchdog.cadence(),
                tokio::time::sleep(Duration::from_millis(1020)),
            )
            .await;
        feeder.await.unwrap();
        assert_eq!(ticks, 21);
        assert_eq!(rig.aggregator.current(), Some(InterruptLevel::Stale));

        let (levels, _) = rig.finish().await;
        assert_eq!(levels.len(), 21);
        // tick at 500 ms: age == threshold is still fresh
        assert_eq!(
            levels.iter().position(|l| *l == InterruptLevel::Stale),
            Some(11)
        );
        assert!(levels[11..].iter().all(|l| *l == InterruptLevel::Stale));
    }

    #[tokio::test]
    async fn test_mock_hardware_proximity_reaches_interrupt_topic() {
        let bp = GuardBlueprint::default();
        let mut rig = Rig::new(&bp).await;
        let guidance = mock(800, Vec::new());

        let scratch = Arc::new(Scratch::new(bp.rotation.descriptors().unwrap()[0].clone()));
        let bridge = Arc::new(AcquisitionBridge::new(
            rig.publisher.clone(),
            bp.topics.clone(),
            false,
            scratch,
        ));
        guidance.register_callback(bridge.callback()).unwrap();
        guidance
            .configure(&DataSelection::for_camera(VbusIndex::new(1).unwrap(), false))
            .unwrap();
        guidance.start().unwrap();

        let first = tokio::time::timeout(Duration::from_secs(2), rig.interrupts.recv())
            .await
            .expect("no interrupt within 2 s")
            .unwrap();
        let Message::Interrupt(msg) = first.message else {
            panic!("unexpected message on interrupt topic");
        };
        assert_eq!(msg.level, InterruptLevel::Proximity);
        assert_eq!(msg.data(), 2);

        guidance.stop().unwrap();
        bridge.detach();
        guidance.release().unwrap();

        let published = bridge.metrics().snapshot().messages_published;
        assert!(published >= 1);
        rig.finish().await;
    }

    #[tokio::test]
    async fn test_malformed_payload_dropped_but_cycle_signalled() {
        let bp = GuardBlueprint::default();
        let rig = Rig::new(&bp).await;
        let guidance = mock(3000, Vec::new());

        let scratch = Arc::new(Scratch::new(bp.rotation.descriptors().unwrap()[0].clone()));
        let bridge = Arc::new(AcquisitionBridge::new(
            rig.publisher.clone(),
            bp.topics.clone(),
            false,
            scratch,
        ));
        guidance.register_callback(bridge.callback()).unwrap();

        assert!(guidance.inject(RawPayload::new(PayloadKind::Ultrasonic, vec![1u8, 2, 3])));
        assert!(guidance.inject(RawPayload::empty(PayloadKind::Image)));

        let snapshot = bridge.metrics().snapshot();
        assert_eq!(snapshot.payloads_dropped, 2);
        assert_eq!(snapshot.messages_published, 0);
        assert_eq!(bridge.cycle().count(), 2);
        assert_eq!(rig.bus.metrics().counts(), (0, 0));
        rig.finish().await;
    }

    /// Five cameras: the n-th configure targets camera n mod 5
    #[tokio::test]
    async fn test_rotation_cycles_cameras_in_order() {
        let bp = GuardBlueprint::default();
        let rig = Rig::new(&bp).await;
        let guidance = mock(3000, Vec::new());
        let cameras = bp.rotation.descriptors().unwrap();

        let scratch = Arc::new(Scratch::new(cameras[0].clone()));
        let bridge = Arc::new(AcquisitionBridge::new(
            rig.publisher.clone(),
            bp.topics.clone(),
            false,
            scratch.clone(),
        ));
        let transport: Arc<dyn HardwareTransport> = guidance.clone();
        let mut rotation = RotationController::new(
            transport,
            cameras.clone(),
            scratch.clone(),
            bridge.cycle().clone(),
            fast_rotation(),
        )
        .unwrap();

        rotation.start(bridge.callback()).unwrap();
        let rotations = rotation
            .run_until(tokio::time::sleep(Duration::from_millis(300)))
            .await
            .unwrap();
        let last = rotation.state().unwrap();
        bridge.detach();
        rotation.shutdown().await.unwrap();

        assert!(rotations >= 5, "only {rotations} rotations");
        let configured = guidance.configured();
        assert_eq!(configured.len() as u64, rotations + 1);
        for (i, selection) in configured.iter().enumerate() {
            assert_eq!(selection.vbus, cameras[i % cameras.len()].vbus);
        }
        assert_eq!(last.active_index, (rotations as usize) % cameras.len());
        assert_eq!(scratch.active().frame_label, last.frame_label);
        assert_eq!(guidance.calls().last(), Some(&TransportCall::Release));

        let (_, sinks) = rig.finish().await;
        let monitor = sinks.iter().find(|(name, _)| name == "monitor").unwrap();
        assert!(monitor.1.written > 0);
    }

    #[tokio::test]
    async fn test_failed_restart_is_fatal() {
        let bp = GuardBlueprint::default();
        let guidance = mock(3000, vec![FailurePoint::new(HardwareOp::Start, 3)]);
        let cameras = bp.rotation.descriptors().unwrap();
        let scratch = Arc::new(Scratch::new(cameras[0].clone()));

        let (publisher, _rx) = bus(1024);
        let bridge = Arc::new(AcquisitionBridge::new(
            Arc::new(publisher),
            bp.topics.clone(),
            false,
            scratch.clone(),
        ));
        let transport: Arc<dyn HardwareTransport> = guidance.clone();
        let mut rotation =
            RotationController::new(transport, cameras, scratch, bridge.cycle().clone(), fast_rotation())
                .unwrap();

        rotation.start(bridge.callback()).unwrap();
        let err = rotation
            .run_until(std::future::pending())
            .await
            .unwrap_err();
        assert!(matches!(err, AcquisitionError::Hardware(ref e) if e.operation() == HardwareOp::Start));
        assert_eq!(rotation.phase(), RotationPhase::Inactive);
        assert_eq!(rotation.rotations(), 1);

        bridge.detach();
        rotation.shutdown().await.unwrap();
        assert_eq!(guidance.calls().last(), Some(&TransportCall::Release));
    }

    #[tokio::test]
    async fn test_file_sink_records_interrupt_levels() {
        let dir = tempfile::tempdir().unwrap();
        let mut bp = GuardBlueprint::default();
        let mut params = HashMap::new();
        params.insert(
            "base_path".to_string(),
            dir.path().to_string_lossy().into_owned(),
        );
        bp.sinks.push(SinkConfig {
            name: "recorder".to_string(),
            sink_type: SinkType::File,
            queue_capacity: 16,
            params,
            topics: vec![bp.topics.interrupt.clone()],
        });

        let rig = Rig::new(&bp).await;
        for _ in 0..3 {
            rig.aggregator.tick();
        }
        let (levels, sinks) = rig.finish().await;
        assert_eq!(levels, vec![InterruptLevel::Clear; 3]);

        let recorder = sinks.iter().find(|(name, _)| name == "recorder").unwrap();
        assert_eq!(recorder.1.written, 3);

        let text = std::fs::read_to_string(
            dir.path()
                .join("uav_nav_signal_interrupt")
                .join("messages.jsonl"),
        )
        .unwrap();
        let first: serde_json::Value = serde_json::from_str(text.lines().next().unwrap()).unwrap();
        assert_eq!(first["topic"], "uav_nav/signal_interrupt");
        assert_eq!(first["type"], "interrupt");
        assert_eq!(first["level"], "clear");
        assert_eq!(text.lines().count(), 3);
    }
}
