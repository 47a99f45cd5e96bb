//! Camera rotation state machine
//!
//! Cycles the transport through a fixed ordered camera list. Each
//! cycle-ready event stops transfer, moves to the next camera (wrapping),
//! reconfigures and restarts. Any failing hardware call leaves the
//! controller `Inactive` and is returned to the caller as fatal.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use contracts::{CameraDescriptor, RotationConfig, RotationState};
use hardware::{DataSelection, HardwareCallback, HardwareTransport};
use tracing::{debug, info, instrument, warn};

use crate::cycle::CycleSignal;
use crate::error::{AcquisitionError, Result};
use crate::scratch::Scratch;

/// Rotation timing and selection
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RotationSettings {
    /// Pause after each restart before the next wait
    pub settle_delay: Duration,
    /// Wait between stop and release on shutdown
    pub release_ack_delay: Duration,
    /// Bound on the cycle-ready wait; `None` waits forever
    pub cycle_timeout: Option<Duration>,
    pub select_depth: bool,
}

impl RotationSettings {
    pub fn from_config(config: &RotationConfig) -> Self {
        Self {
            settle_delay: config.settle_delay(),
            release_ack_delay: config.release_ack_delay(),
            cycle_timeout: config.cycle_timeout(),
            select_depth: config.select_depth,
        }
    }
}

impl Default for RotationSettings {
    fn default() -> Self {
        Self::from_config(&RotationConfig::default())
    }
}

/// Controller state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RotationPhase {
    Inactive,
    /// Transferring from the camera at this index
    Acquiring(usize),
}

/// Source rotation controller
pub struct RotationController {
    transport: Arc<dyn HardwareTransport>,
    cameras: Vec<CameraDescriptor>,
    scratch: Arc<Scratch>,
    cycle: Arc<CycleSignal>,
    settings: RotationSettings,
    phase: RotationPhase,
    rotations: u64,
    released: bool,
}

impl RotationController {
    pub fn new(
        transport: Arc<dyn HardwareTransport>,
        cameras: Vec<CameraDescriptor>,
        scratch: Arc<Scratch>,
        cycle: Arc<CycleSignal>,
        settings: RotationSettings,
    ) -> Result<Self> {
        if cameras.is_empty() {
            return Err(AcquisitionError::EmptyRotation);
        }
        Ok(Self {
            transport,
            cameras,
            scratch,
            cycle,
            settings,
            phase: RotationPhase::Inactive,
            rotations: 0,
            released: false,
        })
    }

    pub fn phase(&self) -> RotationPhase {
        self.phase
    }

    /// Completed advances since start
    pub fn rotations(&self) -> u64 {
        self.rotations
    }

    pub fn cameras(&self) -> &[CameraDescriptor] {
        &self.cameras
    }

    /// Active camera, if acquiring
    pub fn state(&self) -> Option<RotationState> {
        match self.phase {
            RotationPhase::Inactive => None,
            RotationPhase::Acquiring(index) => Some(RotationState {
                active_index: index,
                frame_label: self.cameras[index].frame_label.clone(),
            }),
        }
    }

    /// Log which camera pairs are online and their calibration
    pub fn log_camera_info(&self) -> Result<()> {
        let online = self.transport.online_status()?;
        let calibration = self.transport.stereo_calibration()?;
        for camera in &self.cameras {
            let slot = camera.vbus.slot();
            let params = &calibration[slot];
            if online[slot] {
                info!(
                    camera = %camera.frame_label,
                    vbus = %camera.vbus,
                    cu = params.cu,
                    cv = params.cv,
                    focal = params.focal,
                    baseline = params.baseline,
                    "camera online"
                );
            } else {
                warn!(camera = %camera.frame_label, vbus = %camera.vbus, "camera offline");
            }
        }
        Ok(())
    }

    /// Install the callback and begin acquiring from the first camera
    #[instrument(name = "rotation_start", skip(self, callback))]
    pub fn start(&mut self, callback: HardwareCallback) -> Result<()> {
        if self.phase != RotationPhase::Inactive {
            return Ok(());
        }
        self.transport.register_callback(callback)?;
        self.enter(0)?;
        info!(
            camera = %self.cameras[0].frame_label,
            cameras = self.cameras.len(),
            "rotation started"
        );
        Ok(())
    }

    /// Handle one cycle-complete event
    pub fn advance(&mut self) -> Result<RotationState> {
        let RotationPhase::Acquiring(index) = self.phase else {
            return Err(AcquisitionError::NotAcquiring);
        };

        if let Err(e) = self.transport.stop() {
            self.phase = RotationPhase::Inactive;
            return Err(e.into());
        }
        // payloads of the camera just stopped must not count for the next one
        self.cycle.clear();

        let next = (index + 1) % self.cameras.len();
        self.enter(next)?;
        self.rotations += 1;

        let label = &self.cameras[next].frame_label;
        observability::record_rotation(label);
        debug!(from = index, to = next, camera = %label, "camera rotated");

        Ok(RotationState {
            active_index: next,
            frame_label: label.clone(),
        })
    }

    /// Configure and start one camera; leaves `Inactive` on failure
    fn enter(&mut self, index: usize) -> Result<()> {
        self.phase = RotationPhase::Inactive;
        let descriptor = self.cameras[index].clone();
        let selection = DataSelection::for_camera(descriptor.vbus, self.settings.select_depth);

        self.scratch.set_active(descriptor);
        self.transport.configure(&selection)?;
        self.transport.start()?;

        self.phase = RotationPhase::Acquiring(index);
        Ok(())
    }

    /// Rotate on every cycle-ready event until `shutdown` resolves
    ///
    /// Returns the number of completed advances. A hardware failure or a
    /// cycle timeout ends the loop with an error.
    pub async fn run_until<F>(&mut self, shutdown: F) -> Result<u64>
    where
        F: Future<Output = ()>,
    {
        let cycle = self.cycle.clone();
        let settle = self.settings.settle_delay;
        let timeout = self.settings.cycle_timeout;
        tokio::pin!(shutdown);

        loop {
            tokio::select! {
                biased;
                _ = &mut shutdown => break,
                waited = cycle.wait_for(timeout) => waited?,
            }

            self.advance()?;

            tokio::select! {
                biased;
                _ = &mut shutdown => break,
                _ = tokio::time::sleep(settle) => {}
            }
        }

        debug!(rotations = self.rotations, "rotation loop stopped");
        Ok(self.rotations)
    }

    /// Stop transfer, wait for the acknowledgement, release the transport
    #[instrument(name = "rotation_shutdown", skip(self))]
    pub async fn shutdown(&mut self) -> Result<()> {
        if self.released {
            return Ok(());
        }
        self.released = true;

        if self.phase != RotationPhase::Inactive {
            self.phase = RotationPhase::Inactive;
            self.transport.stop()?;
            tokio::time::sleep(self.settings.release_ack_delay).await;
        }
        self.transport.release()?;
        info!(rotations = self.rotations, "transport released");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use contracts::{RotationConfig, VbusIndex};
    use hardware::{
        FailurePoint, HardwareError, HardwareOp, MockGuidance, MockGuidanceConfig, TransportCall,
    };

    fn noop_callback() -> HardwareCallback {
        Arc::new(|_| {})
    }

    fn controller_with(mock: Arc<MockGuidance>) -> (RotationController, Arc<CycleSignal>) {
        let cameras = RotationConfig::default().descriptors().unwrap();
        let scratch = Arc::new(Scratch::new(cameras[0].clone()));
        let cycle = Arc::new(CycleSignal::new());
        let controller = RotationController::new(
            mock,
            cameras,
            scratch,
            cycle.clone(),
            RotationSettings::default(),
        )
        .unwrap();
        (controller, cycle)
    }

    fn mock() -> Arc<MockGuidance> {
        Arc::new(MockGuidance::with_defaults())
    }

    #[test]
    fn test_empty_camera_list_rejected() {
        let scratch = Arc::new(Scratch::new(CameraDescriptor::new(
            VbusIndex::new(1).unwrap(),
            "front",
        )));
        let result = RotationController::new(
            mock(),
            Vec::new(),
            scratch,
            Arc::new(CycleSignal::new()),
            RotationSettings::default(),
        );
        assert!(matches!(result, Err(AcquisitionError::EmptyRotation)));
    }

    #[test]
    fn test_four_events_reach_down_fifth_wraps_to_front() {
        let transport = mock();
        let (mut controller, _) = controller_with(transport.clone());
        controller.start(noop_callback()).unwrap();
        assert_eq!(controller.state().unwrap().frame_label, "front");

        for _ in 0..4 {
            controller.advance().unwrap();
        }
        assert_eq!(controller.state().unwrap().frame_label, "down");
        assert_eq!(controller.state().unwrap().active_index, 4);

        let state = controller.advance().unwrap();
        assert_eq!(state.frame_label, "front");
        assert_eq!(state.active_index, 0);
        assert_eq!(controller.rotations(), 5);

        let vbus: Vec<u8> = transport.configured().iter().map(|s| s.vbus.get()).collect();
        assert_eq!(vbus, vec![1, 2, 3, 4, 5, 1]);
    }

    #[test]
    fn test_full_cycle_visits_each_camera_once() {
        let (mut controller, _) = controller_with(mock());
        controller.start(noop_callback()).unwrap();

        let mut labels: Vec<String> = (0..5)
            .map(|_| controller.advance().unwrap().frame_label)
            .collect();
        assert_eq!(labels.pop().as_deref(), Some("front"));
        labels.sort();
        labels.dedup();
        assert_eq!(labels.len(), 4);
    }

    #[test]
    fn test_scratch_label_follows_rotation() {
        let transport = mock();
        let cameras = RotationConfig::default().descriptors().unwrap();
        let scratch = Arc::new(Scratch::new(cameras[0].clone()));
        let mut controller = RotationController::new(
            transport,
            cameras,
            scratch.clone(),
            Arc::new(CycleSignal::new()),
            RotationSettings::default(),
        )
        .unwrap();
        controller.start(noop_callback()).unwrap();
        controller.advance().unwrap();
        controller.advance().unwrap();
        assert_eq!(scratch.active().frame_label, "rear");
        assert_eq!(scratch.active().vbus.get(), 3);
    }

    #[test]
    fn test_configure_failure_halts_rotation() {
        let transport = Arc::new(MockGuidance::new(MockGuidanceConfig {
            failures: vec![FailurePoint::new(HardwareOp::Configure, 3)],
            ..Default::default()
        }));
        let (mut controller, _) = controller_with(transport.clone());
        controller.start(noop_callback()).unwrap();
        controller.advance().unwrap();

        let err = controller.advance().unwrap_err();
        assert!(matches!(
            err,
            AcquisitionError::Hardware(HardwareError::Call {
                operation: HardwareOp::Configure,
                ..
            })
        ));
        assert_eq!(controller.phase(), RotationPhase::Inactive);
        assert!(!transport.is_transferring());
        assert!(matches!(
            controller.advance(),
            Err(AcquisitionError::NotAcquiring)
        ));
    }

    #[test]
    fn test_start_failure_is_fatal() {
        let transport = Arc::new(MockGuidance::new(MockGuidanceConfig {
            failures: vec![FailurePoint::new(HardwareOp::Start, 1)],
            ..Default::default()
        }));
        let (mut controller, _) = controller_with(transport);
        assert!(controller.start(noop_callback()).is_err());
        assert_eq!(controller.phase(), RotationPhase::Inactive);
        assert!(controller.state().is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_run_until_advances_per_cycle_event() {
        let (mut controller, cycle) = controller_with(mock());
        controller.start(noop_callback()).unwrap();

        let signaller = tokio::spawn(async move {
            for _ in 0..3 {
                tokio::time::sleep(Duration::from_millis(100)).await;
                cycle.signal();
            }
        });

        let rotations = controller
            .run_until(tokio::time::sleep(Duration::from_secs(1)))
            .await
            .unwrap();
        signaller.await.unwrap();

        assert_eq!(rotations, 3);
        assert_eq!(controller.state().unwrap().frame_label, "left");
    }

    #[tokio::test(start_paused = true)]
    async fn test_advance_discards_cycle_event_of_previous_camera() {
        let (mut controller, cycle) = controller_with(mock());
        controller.start(noop_callback()).unwrap();

        cycle.signal();
        controller.advance().unwrap();
        assert_eq!(controller.state().unwrap().frame_label, "right");

        let err = cycle
            .wait_for(Some(Duration::from_millis(100)))
            .await
            .unwrap_err();
        assert!(matches!(err, AcquisitionError::CycleTimeout { .. }));
    }

    #[tokio::test(start_paused = true)]
    async fn test_cycle_timeout_is_fatal() {
        let transport = mock();
        let cameras = RotationConfig::default().descriptors().unwrap();
        let scratch = Arc::new(Scratch::new(cameras[0].clone()));
        let settings = RotationSettings {
            cycle_timeout: Some(Duration::from_millis(200)),
            ..Default::default()
        };
        let mut controller = RotationController::new(
            transport,
            cameras,
            scratch,
            Arc::new(CycleSignal::new()),
            settings,
        )
        .unwrap();
        controller.start(noop_callback()).unwrap();

        let err = controller
            .run_until(std::future::pending())
            .await
            .unwrap_err();
        assert!(matches!(err, AcquisitionError::CycleTimeout { timeout_ms: 200 }));
    }

    #[tokio::test(start_paused = true)]
    async fn test_shutdown_stops_then_releases_once() {
        let transport = mock();
        let (mut controller, _) = controller_with(transport.clone());
        controller.start(noop_callback()).unwrap();

        controller.shutdown().await.unwrap();
        controller.shutdown().await.unwrap();

        let calls = transport.calls();
        let tail = &calls[calls.len() - 2..];
        assert_eq!(tail, &[TransportCall::Stop, TransportCall::Release]);
        assert_eq!(
            calls.iter().filter(|c| **c == TransportCall::Release).count(),
            1
        );
        assert_eq!(controller.phase(), RotationPhase::Inactive);
    }

    #[test]
    fn test_camera_info_reads_status_and_calibration() {
        let transport = mock();
        let (controller, _) = controller_with(transport.clone());
        controller.log_camera_info().unwrap();
        let calls = transport.calls();
        assert!(calls.contains(&TransportCall::OnlineStatus));
        assert!(calls.contains(&TransportCall::StereoCalibration));
    }
}
