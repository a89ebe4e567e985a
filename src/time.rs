//! Frame timing

use std::collections::VecDeque;

/// Longest step a single frame may advance the simulation, in seconds
pub const MAX_FRAME_DELTA: f32 = 1.0;

/// Timing of the current frame, passed explicitly to everything animated
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct FrameTime {
    /// Seconds since the previous frame, clamped to [`MAX_FRAME_DELTA`]
    pub delta: f32,
    /// Seconds since the first frame
    pub elapsed: f32,
}

impl FrameTime {
    pub fn new(delta: f32, elapsed: f32) -> Self {
        Self {
            delta: delta.clamp(0.0, MAX_FRAME_DELTA),
            elapsed,
        }
    }

    /// Advance by a raw wall-clock delta
    pub fn advance(&self, raw_delta: f32) -> Self {
        let delta = raw_delta.clamp(0.0, MAX_FRAME_DELTA);
        Self {
            delta,
            elapsed: self.elapsed + delta,
        }
    }
}

const FPS_HISTORY: usize = 128;

/// Rolling frames-per-second statistics
#[derive(Debug, Clone)]
pub struct FrameStats {
    history: VecDeque<f32>,
}

impl Default for FrameStats {
    fn default() -> Self {
        Self {
            history: VecDeque::with_capacity(FPS_HISTORY),
        }
    }
}

impl FrameStats {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record one frame's delta; non-positive deltas are ignored
    pub fn record(&mut self, delta: f32) {
        if delta <= 0.0 {
            return;
        }
        if self.history.len() == FPS_HISTORY {
            self.history.pop_front();
        }
        self.history.push_back(1.0 / delta);
    }

    pub fn current(&self) -> f32 {
        self.history.back().copied().unwrap_or(0.0)
    }

    pub fn average(&self) -> f32 {
        if self.history.is_empty() {
            return 0.0;
        }
        self.history.iter().sum::<f32>() / self.history.len() as f32
    }

    pub fn min(&self) -> f32 {
        self.history.iter().copied().reduce(f32::min).unwrap_or(0.0)
    }

    pub fn max(&self) -> f32 {
        self.history.iter().copied().reduce(f32::max).unwrap_or(0.0)
    }

    /// Samples oldest first, for plotting
    pub fn history(&self) -> impl Iterator<Item = f32> + '_ {
        self.history.iter().copied()
    }

    pub fn len(&self) -> usize {
        self.history.len()
    }

    pub fn is_empty(&self) -> bool {
        self.history.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_delta_is_clamped() {
        let time = FrameTime::default().advance(5.0);
        assert_eq!(time.delta, 1.0);
        assert_eq!(time.elapsed, 1.0);
        assert_eq!(time.advance(0.5).elapsed, 1.5);
    }

    #[test]
    fn test_stats_ring_is_bounded() {
        let mut stats = FrameStats::new();
        stats.record(0.5);
        for _ in 0..200 {
            stats.record(0.01);
        }
        assert_eq!(stats.len(), 128);
        assert!((stats.min() - 100.0).abs() < 1e-3);
        assert!((stats.average() - 100.0).abs() < 1e-3);
    }

    #[test]
    fn test_stats_min_max() {
        let mut stats = FrameStats::new();
        stats.record(0.5);
        stats.record(0.25);
        stats.record(0.0);
        assert_eq!(stats.min(), 2.0);
        assert_eq!(stats.max(), 4.0);
        assert_eq!(stats.current(), 4.0);
        assert_eq!(stats.average(), 3.0);
    }
}
