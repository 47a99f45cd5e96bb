//! Acquisition event bridge
//!
//! Entry point for every hardware callback. Demultiplexes by payload kind,
//! copies frames into the scratch area, converts ranges to metres and
//! republishes. The scratch lock covers decoding-to-message only; publishing
//! happens after it is released. Every callback ends by raising the
//! cycle-ready signal, including callbacks whose payload was dropped.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use bytes::Bytes;
use contracts::{
    Envelope, Header, ImageEncoding, ImageMessage, Message, PayloadKind, RangeScan, RawPayload,
    SharedPublisher, TopicConfig, CAMERA_PAIR_COUNT, IMAGE_HEIGHT, IMAGE_WIDTH,
};
use hardware::{HardwareCallback, ImageChannel, ImageFrame, ObstacleDistanceRaw, UltrasonicRaw};
use tracing::{debug, trace};

use crate::config::BridgeMetrics;
use crate::cycle::CycleSignal;
use crate::error::{AcquisitionError, Result};
use crate::scratch::Scratch;

/// Obstacle distance unit (cm) to metres
const CM_TO_M: f32 = 0.01;

/// Ultrasonic unit (mm) to metres
const MM_TO_M: f32 = 0.001;

/// Hardware callback handler
pub struct AcquisitionBridge {
    scratch: Arc<Scratch>,
    cycle: Arc<CycleSignal>,
    publisher: SharedPublisher,
    topics: TopicConfig,
    show_info: bool,
    attached: AtomicBool,
    metrics: Arc<BridgeMetrics>,
}

impl AcquisitionBridge {
    pub fn new(
        publisher: SharedPublisher,
        topics: TopicConfig,
        show_info: bool,
        scratch: Arc<Scratch>,
    ) -> Self {
        Self {
            scratch,
            cycle: Arc::new(CycleSignal::new()),
            publisher,
            topics,
            show_info,
            attached: AtomicBool::new(true),
            metrics: Arc::new(BridgeMetrics::new()),
        }
    }

    pub fn scratch(&self) -> &Arc<Scratch> {
        &self.scratch
    }

    pub fn cycle(&self) -> &Arc<CycleSignal> {
        &self.cycle
    }

    pub fn metrics(&self) -> &Arc<BridgeMetrics> {
        &self.metrics
    }

    /// Callback to install on the transport
    pub fn callback(self: &Arc<Self>) -> HardwareCallback {
        let bridge = self.clone();
        Arc::new(move |payload| bridge.handle(payload))
    }

    /// Ignore every later payload (transport torn down)
    pub fn detach(&self) {
        if self.attached.swap(false, Ordering::SeqCst) {
            debug!("acquisition bridge detached");
        }
    }

    /// Process one callback delivery
    pub fn handle(&self, payload: RawPayload) {
        if !self.attached.load(Ordering::Relaxed) {
            return;
        }

        let kind = payload.kind;
        self.metrics.record_received();
        observability::record_payload_received(kind.as_str());

        match self.translate(&payload) {
            Ok(envelopes) => {
                for envelope in envelopes {
                    self.publish(envelope);
                }
            }
            Err(e) => {
                self.metrics.record_dropped();
                let reason = match e {
                    AcquisitionError::MissingPayload { .. } => "missing",
                    _ => "decode",
                };
                observability::record_payload_dropped(kind.as_str(), reason);
                trace!(kind = %kind, error = %e, "payload dropped");
            }
        }

        self.cycle.signal();
    }

    /// Decode and transform under the scratch lock
    fn translate(&self, payload: &RawPayload) -> Result<Vec<Envelope>> {
        let kind = payload.kind;
        match kind {
            PayloadKind::Image => self.on_image(content(payload)?),
            PayloadKind::ObstacleDistance => self.on_obstacle_distance(content(payload)?),
            PayloadKind::Ultrasonic => self.on_ultrasonic(content(payload)?),
            other => {
                self.metrics.record_ignored();
                trace!(kind = %other, len = payload.len(), "payload kind not republished");
                Ok(Vec::new())
            }
        }
    }

    fn on_image(&self, data: &Bytes) -> Result<Vec<Envelope>> {
        let frame = ImageFrame::decode(data).map_err(|source| AcquisitionError::Decode {
            kind: PayloadKind::Image,
            source,
        })?;

        let mut out = Vec::with_capacity(3);
        let mut scratch = self.scratch.lock();
        let vbus = scratch.active.vbus;
        let label = scratch.active.frame_label.clone();

        let outputs = [
            (ImageChannel::Left, Some(&self.topics.left_image), ImageEncoding::Mono8),
            (ImageChannel::Right, Some(&self.topics.right_image), ImageEncoding::Mono8),
            (ImageChannel::Depth, self.topics.depth_image.as_ref(), ImageEncoding::Mono16),
        ];
        for (channel, topic, encoding) in outputs {
            let Some(pixels) = frame.get(channel, vbus) else {
                continue;
            };
            let buffer = scratch.buffer_mut(channel);
            buffer.copy_from_slice(pixels);
            if let Some(topic) = topic {
                out.push(Envelope::new(
                    topic.as_str(),
                    Message::Image(ImageMessage {
                        header: Header::now(label.as_str()),
                        width: IMAGE_WIDTH,
                        height: IMAGE_HEIGHT,
                        encoding,
                        data: Bytes::copy_from_slice(buffer.as_slice()),
                    }),
                ));
            }
        }
        scratch.frame_index = Some(frame.frame_index);
        drop(scratch);

        if self.show_info {
            debug!(
                frame_index = frame.frame_index,
                camera = %label,
                vbus = %vbus,
                frames = out.len(),
                "image payload"
            );
        }
        Ok(out)
    }

    fn on_obstacle_distance(&self, data: &Bytes) -> Result<Vec<Envelope>> {
        let raw = ObstacleDistanceRaw::decode(data).map_err(|source| AcquisitionError::Decode {
            kind: PayloadKind::ObstacleDistance,
            source,
        })?;
        let ranges: Vec<f32> = raw.distance.iter().map(|&d| CM_TO_M * f32::from(d)).collect();

        let label = self.scratch.lock().active.frame_label.clone();
        if self.show_info {
            debug!(
                frame_index = raw.frame_index,
                stamp = raw.time_stamp,
                ranges = ?ranges,
                "obstacle distance"
            );
        }

        Ok(vec![Envelope::new(
            self.topics.obstacle_distance.as_str(),
            Message::Range(RangeScan {
                header: Header::now(label),
                ranges,
                intensities: Vec::new(),
            }),
        )])
    }

    fn on_ultrasonic(&self, data: &Bytes) -> Result<Vec<Envelope>> {
        let raw = UltrasonicRaw::decode(data).map_err(|source| AcquisitionError::Decode {
            kind: PayloadKind::Ultrasonic,
            source,
        })?;
        let mut ranges = Vec::with_capacity(CAMERA_PAIR_COUNT);
        let mut intensities = Vec::with_capacity(CAMERA_PAIR_COUNT);
        for (&distance, &reliability) in raw.ultrasonic.iter().zip(&raw.reliability) {
            ranges.push(MM_TO_M * f32::from(distance));
            intensities.push(f32::from(reliability));
        }

        let label = self.scratch.lock().active.frame_label.clone();
        if self.show_info {
            debug!(
                frame_index = raw.frame_index,
                stamp = raw.time_stamp,
                ranges = ?ranges,
                reliability = ?raw.reliability,
                "ultrasonic"
            );
        }

        Ok(vec![Envelope::new(
            self.topics.ultrasonic.as_str(),
            Message::Range(RangeScan {
                header: Header::now(label),
                ranges,
                intensities,
            }),
        )])
    }

    fn publish(&self, envelope: Envelope) {
        let topic = envelope.topic.clone();
        match self.publisher.publish(envelope) {
            Ok(()) => self.metrics.record_published(),
            Err(e) => {
                self.metrics.record_publish_failure();
                trace!(topic = %topic, error = %e, "republish failed");
            }
        }
    }
}

fn content(payload: &RawPayload) -> Result<&Bytes> {
    payload
        .data
        .as_ref()
        .ok_or(AcquisitionError::MissingPayload { kind: payload.kind })
}

#[cfg(test)]
mod tests {
    use super::*;
    use contracts::{CameraDescriptor, ContractError, Publisher, VbusIndex, IMAGE_PIXELS};
    use hardware::encode_image;
    use rand::Rng;
    use std::sync::Mutex;

    #[derive(Default)]
    struct Recorder {
        sent: Mutex<Vec<Envelope>>,
    }

    impl Publisher for Recorder {
        fn publish(&self, envelope: Envelope) -> std::result::Result<(), ContractError> {
            self.sent.lock().unwrap().push(envelope);
            Ok(())
        }
    }

    struct Full;

    impl Publisher for Full {
        fn publish(&self, envelope: Envelope) -> std::result::Result<(), ContractError> {
            Err(ContractError::PublishQueueFull {
                topic: envelope.topic,
            })
        }
    }

    fn vbus(n: u8) -> VbusIndex {
        VbusIndex::new(n).unwrap()
    }

    fn bridge_with(publisher: SharedPublisher, topics: TopicConfig) -> AcquisitionBridge {
        let scratch = Arc::new(Scratch::new(CameraDescriptor::new(vbus(3), "rear")));
        AcquisitionBridge::new(publisher, topics, true, scratch)
    }

    fn recording_bridge() -> (AcquisitionBridge, Arc<Recorder>) {
        let recorder = Arc::new(Recorder::default());
        let bridge = bridge_with(recorder.clone(), TopicConfig::default());
        (bridge, recorder)
    }

    fn ultrasonic_payload(mm: [i16; 5], reliability: [u16; 5]) -> RawPayload {
        let raw = UltrasonicRaw {
            frame_index: 1,
            time_stamp: 10,
            ultrasonic: mm,
            reliability,
        };
        RawPayload::new(PayloadKind::Ultrasonic, raw.to_bytes())
    }

    #[test]
    fn test_ultrasonic_scaled_to_metres() {
        let (bridge, recorder) = recording_bridge();
        bridge.handle(ultrasonic_payload(
            [3000, 1200, 3000, 3000, 3000],
            [1, 1, 1, 0, 1],
        ));

        let sent = recorder.sent.lock().unwrap();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].topic, "uav_nav/guidance/ultrasonic");
        let Message::Range(scan) = &sent[0].message else {
            panic!("expected range scan");
        };
        assert_eq!(scan.header.frame_id, "rear");
        assert!((scan.ranges[1] - 1.2).abs() < 1e-6);
        assert_eq!(scan.intensities, vec![1.0, 1.0, 1.0, 0.0, 1.0]);
        assert_eq!(bridge.cycle().count(), 1);
    }

    #[test]
    fn test_obstacle_distance_scaled_to_metres() {
        let (bridge, recorder) = recording_bridge();
        let raw = ObstacleDistanceRaw {
            frame_index: 4,
            time_stamp: 40,
            distance: [150, 20, 1000, 0, 65535],
            _reserved: 0,
        };
        bridge.handle(RawPayload::new(PayloadKind::ObstacleDistance, raw.to_bytes()));

        let sent = recorder.sent.lock().unwrap();
        let Message::Range(scan) = &sent[0].message else {
            panic!("expected range scan");
        };
        assert!((scan.ranges[0] - 1.5).abs() < 1e-6);
        assert!((scan.ranges[2] - 10.0).abs() < 1e-5);
        assert!(scan.intensities.is_empty());
    }

    #[test]
    fn test_image_uses_active_camera_slot() {
        let (bridge, recorder) = recording_bridge();
        let other = vec![9u8; IMAGE_PIXELS];
        let left = vec![1u8; IMAGE_PIXELS];
        let right = vec![2u8; IMAGE_PIXELS];
        let depth = vec![3u8; IMAGE_PIXELS * 2];
        let data = encode_image(
            5,
            50,
            &[
                (ImageChannel::Left, vbus(1), other.as_slice()),
                (ImageChannel::Left, vbus(3), left.as_slice()),
                (ImageChannel::Right, vbus(3), right.as_slice()),
                (ImageChannel::Depth, vbus(3), depth.as_slice()),
            ],
        )
        .unwrap();
        bridge.handle(RawPayload::new(PayloadKind::Image, data));

        // Depth topic unset: depth copied to scratch but not published
        let sent = recorder.sent.lock().unwrap();
        assert_eq!(sent.len(), 2);
        let Message::Image(img) = &sent[0].message else {
            panic!("expected image");
        };
        assert_eq!(sent[0].topic, "uav_nav/guidance/left_image");
        assert_eq!(img.encoding, ImageEncoding::Mono8);
        assert_eq!((img.width, img.height), (320, 240));
        assert!(img.data.iter().all(|&b| b == 1));

        let scratch = bridge.scratch().lock();
        assert!(scratch.right.iter().all(|&b| b == 2));
        assert!(scratch.depth.iter().all(|&b| b == 3));
        assert_eq!(scratch.frame_index, Some(5));
    }

    #[test]
    fn test_depth_published_when_topic_set() {
        let recorder = Arc::new(Recorder::default());
        let topics = TopicConfig {
            depth_image: Some("uav_nav/guidance/depth_image".into()),
            ..Default::default()
        };
        let bridge = bridge_with(recorder.clone(), topics);
        let depth = vec![7u8; IMAGE_PIXELS * 2];
        let data = encode_image(1, 1, &[(ImageChannel::Depth, vbus(3), depth.as_slice())]).unwrap();
        bridge.handle(RawPayload::new(PayloadKind::Image, data));

        let sent = recorder.sent.lock().unwrap();
        assert_eq!(sent.len(), 1);
        let Message::Image(img) = &sent[0].message else {
            panic!("expected image");
        };
        assert_eq!(img.encoding, ImageEncoding::Mono16);
        assert_eq!(img.data.len(), IMAGE_PIXELS * 2);
    }

    #[test]
    fn test_missing_and_malformed_payloads_dropped_but_signalled() {
        let (bridge, recorder) = recording_bridge();
        bridge.handle(RawPayload::empty(PayloadKind::Ultrasonic));
        bridge.handle(RawPayload::new(PayloadKind::ObstacleDistance, vec![0u8; 3]));
        bridge.handle(RawPayload::new(PayloadKind::Image, vec![1u8; 30]));

        assert!(recorder.sent.lock().unwrap().is_empty());
        let snapshot = bridge.metrics().snapshot();
        assert_eq!(snapshot.payloads_received, 3);
        assert_eq!(snapshot.payloads_dropped, 3);
        assert_eq!(bridge.cycle().count(), 3);
    }

    #[test]
    fn test_random_garbage_never_panics() {
        let (bridge, _recorder) = recording_bridge();
        let mut rng = rand::rng();
        for _ in 0..200 {
            let len = rng.random_range(0..64);
            let bytes: Vec<u8> = (0..len).map(|_| rng.random()).collect();
            let kind = PayloadKind::from_code(rng.random_range(0..8));
            bridge.handle(RawPayload::new(kind, bytes));
        }
        assert_eq!(bridge.cycle().count(), 200);
    }

    #[test]
    fn test_other_kinds_ignored() {
        let (bridge, recorder) = recording_bridge();
        bridge.handle(RawPayload::new(PayloadKind::Imu, vec![0u8; 40]));
        bridge.handle(RawPayload::empty(PayloadKind::Unknown(99)));

        assert!(recorder.sent.lock().unwrap().is_empty());
        let snapshot = bridge.metrics().snapshot();
        assert_eq!(snapshot.payloads_ignored, 2);
        assert_eq!(snapshot.payloads_dropped, 0);
    }

    #[test]
    fn test_full_publisher_counts_failure() {
        let bridge = bridge_with(Arc::new(Full), TopicConfig::default());
        bridge.handle(ultrasonic_payload([500; 5], [1; 5]));
        let snapshot = bridge.metrics().snapshot();
        assert_eq!(snapshot.publish_failures, 1);
        assert_eq!(snapshot.messages_published, 0);
        assert_eq!(bridge.cycle().count(), 1);
    }

    #[test]
    fn test_detached_bridge_ignores_payloads() {
        let (bridge, recorder) = recording_bridge();
        bridge.detach();
        bridge.handle(ultrasonic_payload([500; 5], [1; 5]));
        assert!(recorder.sent.lock().unwrap().is_empty());
        assert_eq!(bridge.cycle().count(), 0);
    }
}
