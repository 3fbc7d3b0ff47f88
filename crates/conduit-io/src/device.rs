//! Write-region contract between the driver and a backend period.
//!
//! A backend period is filled in chunks: [`OutputDevice::begin_write`] asks
//! for up to `n` frames and receives an interleaved region that may be
//! shorter, the caller fills it, and [`OutputDevice::end_write`] commits it.
//! A zero-frame region means the device wants nothing more this period.

use crate::{Error, Result};

/// Interleaved sample region handed out by [`OutputDevice::begin_write`].
///
/// Layout is `[c0f0, c1f0, ..., c0f1, c1f1, ...]`.
pub struct WriteRegion<'a> {
    samples: &'a mut [f32],
    channels: usize,
}

impl<'a> WriteRegion<'a> {
    /// Wraps an interleaved slice. Trailing samples that do not fill a whole
    /// frame are excluded.
    pub fn new(samples: &'a mut [f32], channels: usize) -> Self {
        let channels = channels.max(1);
        let whole = samples.len() / channels * channels;
        Self {
            samples: &mut samples[..whole],
            channels,
        }
    }

    /// Frames in this region.
    #[inline]
    pub fn frames(&self) -> usize {
        self.samples.len() / self.channels
    }

    /// Channels per frame.
    #[inline]
    pub fn channels(&self) -> usize {
        self.channels
    }

    /// Writes `src` into `channel`, zero-filling frames `src` does not cover.
    pub fn write_channel(&mut self, channel: usize, src: &[f32]) {
        if channel >= self.channels {
            return;
        }
        for (frame, slot) in self
            .samples
            .iter_mut()
            .skip(channel)
            .step_by(self.channels)
            .enumerate()
        {
            *slot = src.get(frame).copied().unwrap_or(0.0);
        }
    }

    /// Writes silence to every channel.
    pub fn fill_silence(&mut self) {
        self.samples.fill(0.0);
    }

    /// Raw interleaved samples.
    pub fn samples(&self) -> &[f32] {
        self.samples
    }
}

/// A sink for one backend period's worth of interleaved output.
pub trait OutputDevice {
    /// Channels per frame.
    fn channel_count(&self) -> usize;

    /// Opens a region of at most `frames` frames. May return fewer; zero
    /// ends the period.
    fn begin_write(&mut self, frames: usize) -> Result<WriteRegion<'_>>;

    /// Commits the region opened by the last `begin_write`.
    fn end_write(&mut self) -> Result<()>;
}

/// [`OutputDevice`] over a borrowed interleaved buffer, as handed to a
/// stream callback.
pub struct SliceDevice<'a> {
    buffer: &'a mut [f32],
    channels: usize,
    written: usize,
    open: usize,
}

impl<'a> SliceDevice<'a> {
    /// Wraps `buffer` holding `channels` interleaved channels.
    pub fn new(buffer: &'a mut [f32], channels: usize) -> Self {
        Self {
            buffer,
            channels: channels.max(1),
            written: 0,
            open: 0,
        }
    }

    /// Total frames the buffer holds.
    pub fn capacity_frames(&self) -> usize {
        self.buffer.len() / self.channels
    }

    /// Frames committed so far.
    pub fn frames_written(&self) -> usize {
        self.written
    }

    /// Zeroes every frame not yet committed.
    pub fn silence_remaining(&mut self) {
        self.buffer[self.written * self.channels..].fill(0.0);
    }
}

impl OutputDevice for SliceDevice<'_> {
    fn channel_count(&self) -> usize {
        self.channels
    }

    fn begin_write(&mut self, frames: usize) -> Result<WriteRegion<'_>> {
        if self.open != 0 {
            return Err(Error::Write("begin_write called twice".to_owned()));
        }
        let frames = frames.min(self.capacity_frames() - self.written);
        self.open = frames;
        let start = self.written * self.channels;
        Ok(WriteRegion::new(
            &mut self.buffer[start..start + frames * self.channels],
            self.channels,
        ))
    }

    fn end_write(&mut self) -> Result<()> {
        self.written += self.open;
        self.open = 0;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn region_writes_interleaved() {
        let mut buf = [9.0f32; 6];
        let mut region = WriteRegion::new(&mut buf, 2);
        assert_eq!(region.frames(), 3);
        region.write_channel(0, &[1.0, 2.0, 3.0]);
        region.write_channel(1, &[4.0]);
        assert_eq!(buf, [1.0, 4.0, 2.0, 0.0, 3.0, 0.0]);
    }

    #[test]
    fn slice_device_shrinks_last_region() {
        let mut buf = [0.0f32; 10];
        let mut dev = SliceDevice::new(&mut buf, 2);
        assert_eq!(dev.begin_write(4).unwrap().frames(), 4);
        dev.end_write().unwrap();
        assert_eq!(dev.begin_write(4).unwrap().frames(), 1);
        dev.end_write().unwrap();
        assert_eq!(dev.begin_write(4).unwrap().frames(), 0);
        assert_eq!(dev.frames_written(), 5);
    }

    #[test]
    fn silence_remaining_clears_tail() {
        let mut buf = [1.0f32; 4];
        let mut dev = SliceDevice::new(&mut buf, 1);
        dev.begin_write(1).unwrap();
        dev.end_write().unwrap();
        dev.silence_remaining();
        assert_eq!(buf, [1.0, 0.0, 0.0, 0.0]);
    }
}
