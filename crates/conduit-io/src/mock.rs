//! Deterministic backend and device for tests.

use std::collections::VecDeque;
use std::sync::Arc;

use parking_lot::Mutex;

use crate::backend::{
    AudioBackend, AudioDevice, BackendStreamConfig, ErrorCallback, OutputCallback, StreamHandle,
};
use crate::device::{OutputDevice, WriteRegion};
use crate::{Error, Result};

/// In-memory [`OutputDevice`] that records everything committed to it.
///
/// Each `begin_write` can be capped by a scripted grant, and a specific call
/// can be made to fail.
#[derive(Debug, Default)]
pub struct MockDevice {
    channels: usize,
    grants: VecDeque<usize>,
    fail_on_call: Option<usize>,
    calls: usize,
    scratch: Vec<f32>,
    open: bool,
    output: Vec<f32>,
}

impl MockDevice {
    /// Creates a device with `channels` interleaved channels.
    pub fn new(channels: usize) -> Self {
        Self {
            channels: channels.max(1),
            ..Self::default()
        }
    }

    /// Caps successive `begin_write` calls at these frame counts. Once the
    /// script runs out, requests are granted in full.
    pub fn with_grants(mut self, grants: &[usize]) -> Self {
        self.grants = grants.iter().copied().collect();
        self
    }

    /// Makes the `call`-th `begin_write` (0-based) fail.
    pub fn failing_on(mut self, call: usize) -> Self {
        self.fail_on_call = Some(call);
        self
    }

    /// Interleaved samples committed so far.
    pub fn output(&self) -> &[f32] {
        &self.output
    }

    /// Frames committed so far.
    pub fn frames(&self) -> usize {
        self.output.len() / self.channels
    }

    /// Samples of one channel, in frame order.
    pub fn channel(&self, channel: usize) -> Vec<f32> {
        self.output
            .iter()
            .skip(channel)
            .step_by(self.channels)
            .copied()
            .collect()
    }

    /// Number of `begin_write` calls so far.
    pub fn begin_calls(&self) -> usize {
        self.calls
    }
}

impl OutputDevice for MockDevice {
    fn channel_count(&self) -> usize {
        self.channels
    }

    fn begin_write(&mut self, frames: usize) -> Result<WriteRegion<'_>> {
        let call = self.calls;
        self.calls += 1;
        if self.fail_on_call == Some(call) {
            return Err(Error::Write(format!("mock failure on call {call}")));
        }
        let frames = self.grants.pop_front().map_or(frames, |g| g.min(frames));
        self.scratch.clear();
        self.scratch.resize(frames * self.channels, f32::NAN);
        self.open = true;
        Ok(WriteRegion::new(&mut self.scratch, self.channels))
    }

    fn end_write(&mut self) -> Result<()> {
        if !self.open {
            return Err(Error::Write("end_write without begin_write".to_owned()));
        }
        self.open = false;
        self.output.extend_from_slice(&self.scratch);
        Ok(())
    }
}

type Slot<T> = Arc<Mutex<Option<T>>>;

/// Clears the mock's callbacks when the stream handle is dropped.
struct MockStream {
    callback: Slot<OutputCallback>,
    error_callback: Slot<ErrorCallback>,
}

impl Drop for MockStream {
    fn drop(&mut self) {
        self.callback.lock().take();
        self.error_callback.lock().take();
    }
}

/// [`AudioBackend`] driven by hand: [`pump()`](Self::pump) plays the role of
/// the hardware calling back for a period.
#[derive(Default)]
pub struct MockBackend {
    callback: Slot<OutputCallback>,
    error_callback: Slot<ErrorCallback>,
    channels: Arc<Mutex<usize>>,
}

impl MockBackend {
    /// Creates a backend with no stream.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns true while a stream handle is alive.
    pub fn is_streaming(&self) -> bool {
        self.callback.lock().is_some()
    }

    /// Runs the stream callback for one period of `frames` frames and returns
    /// the interleaved output. `None` if no stream is alive.
    pub fn pump(&self, frames: usize) -> Option<Vec<f32>> {
        let channels = *self.channels.lock();
        let mut guard = self.callback.lock();
        let callback = guard.as_mut()?;
        let mut buffer = vec![0.0; frames * channels];
        callback(&mut buffer);
        Some(buffer)
    }

    /// Reports a stream error through the error callback.
    pub fn inject_error(&self, message: &str) {
        if let Some(cb) = self.error_callback.lock().as_mut() {
            cb(message);
        }
    }
}

impl AudioBackend for MockBackend {
    fn name(&self) -> &'static str {
        "mock"
    }

    fn list_devices(&self) -> Result<Vec<AudioDevice>> {
        Ok(vec![AudioDevice {
            name: "mock".to_owned(),
            default_sample_rate: 48000,
            channels: 2,
        }])
    }

    fn default_output_device(&self) -> Result<Option<AudioDevice>> {
        Ok(self.list_devices()?.into_iter().next())
    }

    fn build_output_stream(
        &self,
        config: &BackendStreamConfig,
        callback: OutputCallback,
        error_callback: ErrorCallback,
    ) -> Result<StreamHandle> {
        if self.is_streaming() {
            return Err(Error::Stream("mock backend already streaming".to_owned()));
        }
        *self.channels.lock() = usize::from(config.channels);
        *self.callback.lock() = Some(callback);
        *self.error_callback.lock() = Some(error_callback);
        tracing::info!(channels = config.channels, "mock output stream started");
        Ok(StreamHandle::new(MockStream {
            callback: Arc::clone(&self.callback),
            error_callback: Arc::clone(&self.error_callback),
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn device_grants_and_records() {
        let mut dev = MockDevice::new(2).with_grants(&[3]);
        {
            let mut region = dev.begin_write(8).unwrap();
            assert_eq!(region.frames(), 3);
            region.write_channel(0, &[1.0, 2.0, 3.0]);
            region.write_channel(1, &[4.0, 5.0, 6.0]);
        }
        dev.end_write().unwrap();
        assert_eq!(dev.frames(), 3);
        assert_eq!(dev.channel(1), vec![4.0, 5.0, 6.0]);
    }

    #[test]
    fn device_fails_on_request() {
        let mut dev = MockDevice::new(1).failing_on(0);
        assert!(dev.begin_write(4).is_err());
        assert!(dev.begin_write(4).is_ok());
    }

    #[test]
    fn backend_stream_lifecycle() {
        let backend = MockBackend::new();
        let config = BackendStreamConfig::default();
        let handle = backend
            .build_output_stream(
                &config,
                Box::new(|buf: &mut [f32]| buf.fill(0.5)),
                Box::new(|_: &str| {}),
            )
            .unwrap();
        assert!(backend.is_streaming());
        assert_eq!(backend.pump(4).unwrap(), vec![0.5; 8]);

        drop(handle);
        assert!(!backend.is_streaming());
        assert!(backend.pump(4).is_none());
    }
}
