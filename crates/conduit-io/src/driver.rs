//! Adapter between a backend period and the plugin graph.
//!
//! For each hardware request the driver repeatedly opens a region of at most
//! one graph block, runs one graph pass for exactly the frames the device
//! granted, copies the sink channels into the region and commits it.
//!
//! The graph is shared with the control thread behind a `parking_lot::Mutex`.
//! The driver only ever `try_lock`s it: if the control side holds the lock,
//! that block is written as silence and counted as skipped instead of
//! waiting. Skipped blocks do not advance the audio iteration.

use std::sync::Arc;

use conduit_core::{Graph, SharedState};
use parking_lot::Mutex;

use crate::backend::OutputCallback;
use crate::device::{OutputDevice, SliceDevice};
use crate::Result;

/// Renders the shared graph into [`OutputDevice`] regions.
pub struct AudioDriver {
    graph: Arc<Mutex<Graph>>,
    shared: Arc<SharedState>,
    block_size: usize,
}

impl AudioDriver {
    /// Creates a driver for `graph`, counting passes in `shared`.
    pub fn new(graph: Arc<Mutex<Graph>>, shared: Arc<SharedState>) -> Self {
        let block_size = graph.lock().block_size().max(1);
        Self {
            graph,
            shared,
            block_size,
        }
    }

    /// Largest chunk rendered per pass.
    pub fn block_size(&self) -> usize {
        self.block_size
    }

    /// Fills one backend request of up to `frame_count_max` frames.
    ///
    /// `frame_count_min` is accepted for backends that report it; the driver
    /// always offers up to the maximum and stops early only when the device
    /// grants zero frames. Returns the frames committed.
    ///
    /// A device error aborts the current request only: it is recorded in the
    /// shared last-error buffer and returned.
    pub fn render(
        &mut self,
        device: &mut dyn OutputDevice,
        frame_count_min: usize,
        frame_count_max: usize,
    ) -> Result<usize> {
        let _ = frame_count_min;
        let mut remaining = frame_count_max;
        let mut written = 0;

        while remaining > 0 {
            let want = remaining.min(self.block_size);
            let frames = match self.render_chunk(device, want) {
                Ok(0) => break,
                Ok(frames) => frames,
                Err(e) => {
                    self.shared.try_report_error(&e);
                    return Err(e);
                }
            };
            remaining -= frames.min(remaining);
            written += frames;
        }
        Ok(written)
    }

    fn render_chunk(&mut self, device: &mut dyn OutputDevice, want: usize) -> Result<usize> {
        let mut region = device.begin_write(want)?;
        let frames = region.frames();
        if frames == 0 {
            return Ok(0);
        }

        match self.graph.try_lock() {
            Some(mut graph) => {
                self.shared.advance_iteration();
                graph.run(frames);
                for channel in 0..region.channels() {
                    region.write_channel(channel, graph.output(channel));
                }
            }
            None => {
                self.shared.record_skipped_block();
                region.fill_silence();
            }
        }

        device.end_write()?;
        Ok(frames)
    }

    /// Wraps the driver as a stream callback for a `channels`-wide
    /// interleaved buffer. Frames the driver could not fill are silenced.
    pub fn into_callback(mut self, channels: usize) -> OutputCallback {
        Box::new(move |data: &mut [f32]| {
            let mut device = SliceDevice::new(data, channels);
            let frames = device.capacity_frames();
            // Errors are already recorded in the shared state.
            let _ = self.render(&mut device, frames, frames);
            device.silence_remaining();
        })
    }
}
