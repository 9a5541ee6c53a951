//! Tick windows and transport state.
//!
//! All scheduling happens on an integer tick grid scaled by the project's
//! PPQ (pulses per quarter note). A [`TickWindow`] is a half-open interval
//! `[from, to)` on that grid; [`TransportState`] carries the tempo and the
//! audio sample rate needed to map ticks onto sample frames.

use serde::{Deserialize, Serialize};

/// Integer time unit, PPQ-scaled.
pub type Tick = i64;

/// Half-open tick interval `[from, to)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TickWindow {
    /// First tick inside the window.
    pub from: Tick,
    /// First tick after the window.
    pub to: Tick,
}

impl TickWindow {
    /// Creates a window. An inverted range collapses to an empty window at `from`.
    pub fn new(from: Tick, to: Tick) -> Self {
        Self {
            from,
            to: to.max(from),
        }
    }

    /// Number of ticks covered.
    pub fn len(&self) -> Tick {
        self.to - self.from
    }

    /// Returns true if the window covers no ticks.
    pub fn is_empty(&self) -> bool {
        self.to <= self.from
    }

    /// Returns true if `tick` lies inside the window.
    pub fn contains(&self, tick: Tick) -> bool {
        tick >= self.from && tick < self.to
    }

    /// Splits the window into consecutive batches of at most `batch` ticks.
    ///
    /// A zero batch size yields the window itself.
    pub fn batches(&self, batch: Tick) -> Vec<TickWindow> {
        if batch <= 0 || self.len() <= batch {
            return vec![*self];
        }
        let mut out = Vec::with_capacity((self.len() / batch + 1) as usize);
        let mut start = self.from;
        while start < self.to {
            let end = (start + batch).min(self.to);
            out.push(TickWindow::new(start, end));
            start = end;
        }
        out
    }

    /// Returns the same window shifted by `delta` ticks.
    pub fn shifted(&self, delta: Tick) -> Self {
        Self::new(self.from + delta, self.to + delta)
    }
}

impl core::fmt::Display for TickWindow {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "[{}, {})", self.from, self.to)
    }
}

/// Transport mode for the window being evaluated.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransportMode {
    /// Transport is stopped; cards may still be previewed.
    Stopped,
    /// Live playback.
    #[default]
    Playing,
    /// Offline (faster than real time) rendering.
    Offline,
}

/// Tempo and clock information valid for one tick window.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TransportState {
    /// Tempo in beats per minute.
    pub bpm: f64,
    /// Ticks per quarter note.
    pub ppq: u32,
    /// Playhead position in ticks.
    pub tick: Tick,
    /// Playback mode.
    pub mode: TransportMode,
    /// Audio sample rate in Hz used for audio-buffer values.
    pub sample_rate: u32,
}

impl Default for TransportState {
    fn default() -> Self {
        Self {
            bpm: 120.0,
            ppq: 96,
            tick: 0,
            mode: TransportMode::Playing,
            sample_rate: 48_000,
        }
    }
}

impl TransportState {
    /// Creates a transport at tick 0 with the given tempo and resolution.
    pub fn new(bpm: f64, ppq: u32) -> Self {
        Self {
            bpm,
            ppq,
            ..Self::default()
        }
    }

    /// Sets the sample rate.
    pub fn with_sample_rate(mut self, sample_rate: u32) -> Self {
        self.sample_rate = sample_rate;
        self
    }

    /// Sets the transport mode.
    pub fn with_mode(mut self, mode: TransportMode) -> Self {
        self.mode = mode;
        self
    }

    /// Returns a copy positioned at `tick`.
    pub fn at(mut self, tick: Tick) -> Self {
        self.tick = tick;
        self
    }

    /// Duration of one tick in seconds.
    pub fn seconds_per_tick(&self) -> f64 {
        if self.bpm <= 0.0 || self.ppq == 0 {
            return 0.0;
        }
        60.0 / (self.bpm * f64::from(self.ppq))
    }

    /// Converts an absolute tick to seconds from tick 0.
    pub fn tick_to_seconds(&self, tick: Tick) -> f64 {
        tick as f64 * self.seconds_per_tick()
    }

    /// Absolute sample frame at which `tick` starts.
    ///
    /// Frames are floored so that the frames of adjacent windows tile
    /// exactly: `frames(a..b) + frames(b..c) == frames(a..c)`.
    pub fn tick_to_frame(&self, tick: Tick) -> i64 {
        if self.bpm <= 0.0 || self.ppq == 0 {
            return 0;
        }
        // Divide last so whole-frame positions stay exact.
        let numerator = tick as f64 * 60.0 * f64::from(self.sample_rate);
        (numerator / (self.bpm * f64::from(self.ppq))).floor() as i64
    }

    /// Number of audio frames covered by `window`.
    pub fn frames_in(&self, window: &TickWindow) -> usize {
        (self.tick_to_frame(window.to) - self.tick_to_frame(window.from)).max(0) as usize
    }

    /// Ticks per beat subdivision (e.g. `per_beat = 4` gives sixteenth notes).
    pub fn ticks_per_division(&self, per_beat: u32) -> Tick {
        if per_beat == 0 {
            return Tick::from(self.ppq);
        }
        (Tick::from(self.ppq) / Tick::from(per_beat)).max(1)
    }
}
