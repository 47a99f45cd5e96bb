//! Mock stereo sensor transport
//!
//! Implements `HardwareTransport` with a background thread that emits image,
//! obstacle-distance and ultrasonic payloads for the selected camera pair.
//! Supports failure injection per operation and records every call.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU32, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::thread;
use std::time::{Duration, Instant};

use contracts::{PayloadKind, RawPayload, CAMERA_PAIR_COUNT, IMAGE_PIXELS};
use tracing::{debug, instrument, trace};

use crate::error::{HardwareError, HardwareOp, Result};
use crate::layout::{encode_image, ImageChannel, ObstacleDistanceRaw, UltrasonicRaw};
use crate::transport::{DataSelection, HardwareCallback, HardwareTransport, StereoCalibration};

/// Status code returned when starting without a selection or callback
pub const CODE_CONFIG_NOT_READY: i32 = 5;

/// Default status code for injected failures
pub const CODE_INJECTED: i32 = 8;

/// Inject a failure on the n-th call (1-based) of an operation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FailurePoint {
    pub operation: HardwareOp,
    pub on_call: u32,
    pub code: i32,
}

impl FailurePoint {
    pub fn new(operation: HardwareOp, on_call: u32) -> Self {
        Self {
            operation,
            on_call,
            code: CODE_INJECTED,
        }
    }
}

/// Mock transport configuration
#[derive(Debug, Clone)]
pub struct MockGuidanceConfig {
    /// Emission rate, one payload per selected kind per tick (Hz)
    pub rate_hz: f64,
    /// Reported obstacle distance (cm)
    pub obstacle_distance_cm: u16,
    /// Reported ultrasonic distance (mm)
    pub ultrasonic_mm: i16,
    /// Reported ultrasonic reliability
    pub reliability: u16,
    pub online: [bool; CAMERA_PAIR_COUNT],
    pub failures: Vec<FailurePoint>,
}

impl Default for MockGuidanceConfig {
    fn default() -> Self {
        Self {
            rate_hz: 20.0,
            obstacle_distance_cm: 500,
            ultrasonic_mm: 3000,
            reliability: 1,
            online: [true; CAMERA_PAIR_COUNT],
            failures: Vec::new(),
        }
    }
}

/// Recorded transport call
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportCall {
    Configure(DataSelection),
    Start,
    Stop,
    Release,
    RegisterCallback,
    OnlineStatus,
    StereoCalibration,
}

/// State shared with the emitter thread
struct Shared {
    callback: Mutex<Option<HardwareCallback>>,
    selection: Mutex<Option<DataSelection>>,
    ultrasonic: Mutex<([i16; CAMERA_PAIR_COUNT], [u16; CAMERA_PAIR_COUNT])>,
    obstacle_cm: Mutex<[u16; CAMERA_PAIR_COUNT]>,
    /// Bumped on every start/stop; an emitter exits once it is outdated
    generation: AtomicU64,
    /// Held for the duration of each callback; deliveries never overlap
    delivery: Mutex<()>,
    frame_index: AtomicU32,
    epoch: Instant,
}

impl Shared {
    fn callback(&self) -> Option<HardwareCallback> {
        self.callback
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn selection(&self) -> Option<DataSelection> {
        self.selection
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Outdate the running emitter and wait out its in-flight callback
    fn retire_emitter(&self) {
        self.generation.fetch_add(1, Ordering::SeqCst);
        drop(self.delivery.lock().unwrap_or_else(PoisonError::into_inner));
    }
}

/// Mock stereo sensor transport
///
/// Callbacks run one at a time. `stop` and `release` return only after the
/// callback in progress has finished, so they must not be called from inside it.
pub struct MockGuidance {
    config: MockGuidanceConfig,
    shared: Arc<Shared>,
    transferring: AtomicBool,
    released: AtomicBool,
    call_counts: Mutex<HashMap<HardwareOp, u32>>,
    calls: Mutex<Vec<TransportCall>>,
}

impl MockGuidance {
    pub fn new(config: MockGuidanceConfig) -> Self {
        let ultrasonic = (
            [config.ultrasonic_mm; CAMERA_PAIR_COUNT],
            [config.reliability; CAMERA_PAIR_COUNT],
        );
        let obstacle = [config.obstacle_distance_cm; CAMERA_PAIR_COUNT];
        Self {
            config,
            shared: Arc::new(Shared {
                callback: Mutex::new(None),
                selection: Mutex::new(None),
                ultrasonic: Mutex::new(ultrasonic),
                obstacle_cm: Mutex::new(obstacle),
                generation: AtomicU64::new(0),
                delivery: Mutex::new(()),
                frame_index: AtomicU32::new(0),
                epoch: Instant::now(),
            }),
            transferring: AtomicBool::new(false),
            released: AtomicBool::new(false),
            call_counts: Mutex::new(HashMap::new()),
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn with_defaults() -> Self {
        Self::new(MockGuidanceConfig::default())
    }

    /// Every call made so far, in order
    pub fn calls(&self) -> Vec<TransportCall> {
        self.calls
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Selections applied so far, in order
    pub fn configured(&self) -> Vec<DataSelection> {
        self.calls()
            .into_iter()
            .filter_map(|c| match c {
                TransportCall::Configure(s) => Some(s),
                _ => None,
            })
            .collect()
    }

    pub fn is_transferring(&self) -> bool {
        self.transferring.load(Ordering::SeqCst)
    }

    /// Change the ultrasonic reading reported from the next tick on
    pub fn set_ultrasonic(
        &self,
        distance_mm: [i16; CAMERA_PAIR_COUNT],
        reliability: [u16; CAMERA_PAIR_COUNT],
    ) {
        *self
            .shared
            .ultrasonic
            .lock()
            .unwrap_or_else(PoisonError::into_inner) = (distance_mm, reliability);
    }

    /// Change the obstacle distance reported from the next tick on
    pub fn set_obstacle_distance(&self, distance_cm: [u16; CAMERA_PAIR_COUNT]) {
        *self
            .shared
            .obstacle_cm
            .lock()
            .unwrap_or_else(PoisonError::into_inner) = distance_cm;
    }

    /// Deliver a payload through the registered callback on the caller's thread
    ///
    /// Returns false when no callback is registered.
    pub fn inject(&self, payload: RawPayload) -> bool {
        match self.shared.callback() {
            Some(callback) => {
                let _delivering = self
                    .shared
                    .delivery
                    .lock()
                    .unwrap_or_else(PoisonError::into_inner);
                callback(payload);
                true
            }
            None => false,
        }
    }

    /// Record the call and apply failure injection
    fn enter(&self, call: TransportCall, operation: HardwareOp) -> Result<()> {
        self.calls
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(call);

        if self.released.load(Ordering::SeqCst) {
            return Err(HardwareError::Released { operation });
        }

        let count = {
            let mut counts = self
                .call_counts
                .lock()
                .unwrap_or_else(PoisonError::into_inner);
            let count = counts.entry(operation).or_insert(0);
            *count += 1;
            *count
        };

        match self
            .config
            .failures
            .iter()
            .find(|f| f.operation == operation && f.on_call == count)
        {
            Some(failure) => {
                debug!(operation = %operation, call = count, code = failure.code, "injected failure");
                Err(HardwareError::call(operation, failure.code))
            }
            None => Ok(()),
        }
    }

    fn spawn_emitter(&self, generation: u64, interval: Duration) {
        let shared = self.shared.clone();

        thread::spawn(move || {
            debug!(generation, "mock guidance emitter started");
            while shared.generation.load(Ordering::SeqCst) == generation {
                let (Some(callback), Some(selection)) = (shared.callback(), shared.selection())
                else {
                    break;
                };
                for payload in Self::tick(&shared, &selection) {
                    let _delivering = shared
                        .delivery
                        .lock()
                        .unwrap_or_else(PoisonError::into_inner);
                    // checked under the lock so nothing is delivered after stop returns
                    if shared.generation.load(Ordering::SeqCst) != generation {
                        break;
                    }
                    callback(payload);
                }
                thread::sleep(interval);
            }
            debug!(generation, "mock guidance emitter stopped");
        });
    }

    /// Payloads for one tick of the current selection
    fn tick(shared: &Shared, selection: &DataSelection) -> Vec<RawPayload> {
        let frame_index = shared.frame_index.fetch_add(1, Ordering::Relaxed);
        let time_stamp = shared.epoch.elapsed().as_millis() as u32;
        let mut payloads = Vec::with_capacity(3);

        if selection.obstacle_distance {
            let distance = *shared
                .obstacle_cm
                .lock()
                .unwrap_or_else(PoisonError::into_inner);
            let raw = ObstacleDistanceRaw {
                frame_index,
                time_stamp,
                distance,
                _reserved: 0,
            };
            payloads.push(RawPayload::new(PayloadKind::ObstacleDistance, raw.to_bytes()));
        }

        if selection.ultrasonic {
            let (ultrasonic, reliability) = *shared
                .ultrasonic
                .lock()
                .unwrap_or_else(PoisonError::into_inner);
            let raw = UltrasonicRaw {
                frame_index,
                time_stamp,
                ultrasonic,
                reliability,
            };
            payloads.push(RawPayload::new(PayloadKind::Ultrasonic, raw.to_bytes()));
        }

        // image last: a rotation started mid-tick cuts off the image, not the ranges
        let shade = (frame_index as u8).wrapping_add(selection.vbus.get() * 40);
        let grey = vec![shade; IMAGE_PIXELS];
        let depth = vec![0u8; ImageChannel::Depth.frame_len()];
        let mut frames: Vec<(ImageChannel, _, &[u8])> = Vec::with_capacity(3);
        if selection.greyscale_left {
            frames.push((ImageChannel::Left, selection.vbus, grey.as_slice()));
        }
        if selection.greyscale_right {
            frames.push((ImageChannel::Right, selection.vbus, grey.as_slice()));
        }
        if selection.depth {
            frames.push((ImageChannel::Depth, selection.vbus, depth.as_slice()));
        }
        if !frames.is_empty() {
            if let Ok(data) = encode_image(frame_index, time_stamp, &frames) {
                payloads.push(RawPayload::new(PayloadKind::Image, data));
            }
        }

        trace!(frame_index, vbus = %selection.vbus, count = payloads.len(), "mock tick");
        payloads
    }
}

impl Default for MockGuidance {
    fn default() -> Self {
        Self::with_defaults()
    }
}

impl HardwareTransport for MockGuidance {
    #[instrument(name = "mock_guidance_configure", skip(self, selection), fields(vbus = %selection.vbus))]
    fn configure(&self, selection: &DataSelection) -> Result<()> {
        self.enter(TransportCall::Configure(selection.clone()), HardwareOp::Configure)?;
        *self
            .shared
            .selection
            .lock()
            .unwrap_or_else(PoisonError::into_inner) = Some(selection.clone());
        Ok(())
    }

    #[instrument(name = "mock_guidance_start", skip(self))]
    fn start(&self) -> Result<()> {
        self.enter(TransportCall::Start, HardwareOp::Start)?;
        if self.shared.callback().is_none() || self.shared.selection().is_none() {
            return Err(HardwareError::call(HardwareOp::Start, CODE_CONFIG_NOT_READY));
        }
        let interval = contracts::period_from_hz("rate_hz", self.config.rate_hz)
            .map_err(|_| HardwareError::call(HardwareOp::Start, CODE_CONFIG_NOT_READY))?;
        // Idempotent: already transferring
        if self.transferring.swap(true, Ordering::SeqCst) {
            return Ok(());
        }
        let generation = self.shared.generation.fetch_add(1, Ordering::SeqCst) + 1;
        self.spawn_emitter(generation, interval);
        Ok(())
    }

    #[instrument(name = "mock_guidance_stop", skip(self))]
    fn stop(&self) -> Result<()> {
        self.enter(TransportCall::Stop, HardwareOp::Stop)?;
        if self.transferring.swap(false, Ordering::SeqCst) {
            self.shared.retire_emitter();
        }
        Ok(())
    }

    #[instrument(name = "mock_guidance_release", skip(self))]
    fn release(&self) -> Result<()> {
        self.enter(TransportCall::Release, HardwareOp::Release)?;
        self.released.store(true, Ordering::SeqCst);
        if self.transferring.swap(false, Ordering::SeqCst) {
            self.shared.retire_emitter();
        }
        *self
            .shared
            .callback
            .lock()
            .unwrap_or_else(PoisonError::into_inner) = None;
        Ok(())
    }

    fn register_callback(&self, callback: HardwareCallback) -> Result<()> {
        self.enter(TransportCall::RegisterCallback, HardwareOp::RegisterCallback)?;
        *self
            .shared
            .callback
            .lock()
            .unwrap_or_else(PoisonError::into_inner) = Some(callback);
        Ok(())
    }

    fn online_status(&self) -> Result<[bool; CAMERA_PAIR_COUNT]> {
        self.enter(TransportCall::OnlineStatus, HardwareOp::OnlineStatus)?;
        Ok(self.config.online)
    }

    fn stereo_calibration(&self) -> Result<[StereoCalibration; CAMERA_PAIR_COUNT]> {
        self.enter(TransportCall::StereoCalibration, HardwareOp::StereoCalibration)?;
        Ok([StereoCalibration {
            cu: 160.0,
            cv: 120.0,
            focal: 240.0,
            baseline: 0.15,
        }; CAMERA_PAIR_COUNT])
    }
}
