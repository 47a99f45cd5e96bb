//! Shared scratch buffers
//!
//! One mutex guards the active camera descriptor together with the latest
//! left/right/depth frames, so a reader never sees a frame half-written or a
//! frame paired with the wrong camera label.

use std::sync::{Mutex, MutexGuard, PoisonError};

use bytes::Bytes;
use contracts::{CameraDescriptor, IMAGE_PIXELS};
use hardware::ImageChannel;

/// Buffers behind the scratch lock
#[derive(Debug)]
pub struct ScratchBuffers {
    /// Camera the transport is currently configured for
    pub active: CameraDescriptor,
    pub left: Vec<u8>,
    pub right: Vec<u8>,
    pub depth: Vec<u8>,
    /// Hardware frame index of the last image written
    pub frame_index: Option<u32>,
}

impl ScratchBuffers {
    pub fn buffer_mut(&mut self, channel: ImageChannel) -> &mut Vec<u8> {
        match channel {
            ImageChannel::Left => &mut self.left,
            ImageChannel::Right => &mut self.right,
            ImageChannel::Depth => &mut self.depth,
        }
    }

    pub fn buffer(&self, channel: ImageChannel) -> &[u8] {
        match channel {
            ImageChannel::Left => &self.left,
            ImageChannel::Right => &self.right,
            ImageChannel::Depth => &self.depth,
        }
    }
}

/// Scratch area shared by the callback thread and the control loop
#[derive(Debug)]
pub struct Scratch {
    inner: Mutex<ScratchBuffers>,
}

impl Scratch {
    pub fn new(initial: CameraDescriptor) -> Self {
        Self {
            inner: Mutex::new(ScratchBuffers {
                active: initial,
                left: vec![0; IMAGE_PIXELS],
                right: vec![0; IMAGE_PIXELS],
                depth: vec![0; IMAGE_PIXELS * 2],
                frame_index: None,
            }),
        }
    }

    /// Enter the critical section
    ///
    /// A panic on another holder leaves plain byte buffers behind, so the
    /// poisoned state is taken over rather than propagated.
    pub fn lock(&self) -> MutexGuard<'_, ScratchBuffers> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn active(&self) -> CameraDescriptor {
        self.lock().active.clone()
    }

    pub fn set_active(&self, descriptor: CameraDescriptor) {
        self.lock().active = descriptor;
    }

    /// Consistent copy of one buffer with the label it was captured under
    pub fn preview(&self, channel: ImageChannel) -> (String, Bytes) {
        let guard = self.lock();
        (
            guard.active.frame_label.clone(),
            Bytes::copy_from_slice(guard.buffer(channel)),
        )
    }
}
