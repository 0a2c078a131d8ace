//! Host clip control surface and a headless implementation of it.
//!
//! The runtime never touches a renderer directly; it drives clips through
//! [`ClipBackend`]. Unknown clip names are ignored by every method.

use indexmap::IndexMap;

/// Per-clip controls exposed by the animation host.
pub trait ClipBackend {
    /// Names of the clips the loaded asset provides, in asset order.
    fn clip_names(&self) -> Vec<String>;

    fn has_clip(&self, clip: &str) -> bool {
        self.clip_names().iter().any(|c| c == clip)
    }

    /// Start `clip` from its beginning.
    fn play(&mut self, clip: &str, looping: bool, speed: f32);
    fn pause(&mut self, clip: &str);
    fn stop(&mut self, clip: &str);
    fn set_weight(&mut self, clip: &str, weight: f32);
    fn set_speed(&mut self, clip: &str, speed: f32);
    fn set_loop(&mut self, clip: &str, looping: bool);

    /// Play cursor normalized to the clip length, in `[0, 1]`.
    fn progress(&self, clip: &str) -> f32;
    fn is_playing(&self, clip: &str) -> bool;
}

#[derive(Clone, Debug, PartialEq)]
pub struct SimClip {
    pub duration_ms: f32,
    pub cursor_ms: f32,
    pub speed: f32,
    pub looping: bool,
    pub playing: bool,
    pub weight: f32,
}

impl SimClip {
    fn new(duration_ms: f32) -> Self {
        Self {
            duration_ms,
            cursor_ms: 0.0,
            speed: 1.0,
            looping: false,
            playing: false,
            weight: 0.0,
        }
    }

    fn advance(&mut self, dt_ms: f32) {
        if !self.playing {
            return;
        }
        if self.duration_ms <= 0.0 {
            self.playing = self.looping;
            return;
        }
        let t = self.cursor_ms + dt_ms * self.speed;
        if self.looping {
            self.cursor_ms = fmod(t, self.duration_ms);
        } else if t >= self.duration_ms {
            self.cursor_ms = self.duration_ms;
            self.playing = false;
        } else {
            self.cursor_ms = t.max(0.0);
        }
    }
}

fn fmod(a: f32, b: f32) -> f32 {
    if b == 0.0 {
        return 0.0;
    }
    let m = a % b;
    if (m < 0.0 && b > 0.0) || (m > 0.0 && b < 0.0) {
        m + b
    } else {
        m
    }
}

/// Deterministic clip player without a renderer: play cursors advance with
/// speed and loop semantics, weights are recorded for inspection.
#[derive(Clone, Debug, Default)]
pub struct SimulatedClips {
    clips: IndexMap<String, SimClip>,
}

impl SimulatedClips {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_clip(mut self, name: &str, duration_ms: f32) -> Self {
        self.add_clip(name, duration_ms);
        self
    }

    pub fn add_clip(&mut self, name: &str, duration_ms: f32) {
        self.clips
            .insert(name.to_string(), SimClip::new(duration_ms.max(0.0)));
    }

    /// Advance every playing clip by `dt_ms` of host time.
    pub fn advance(&mut self, dt_ms: f32) {
        for clip in self.clips.values_mut() {
            clip.advance(dt_ms);
        }
    }

    pub fn clip(&self, name: &str) -> Option<&SimClip> {
        self.clips.get(name)
    }

    pub fn weight(&self, name: &str) -> Option<f32> {
        self.clips.get(name).map(|c| c.weight)
    }

    /// Clips currently playing, in asset order.
    pub fn playing(&self) -> Vec<&str> {
        self.clips
            .iter()
            .filter(|(_, c)| c.playing)
            .map(|(n, _)| n.as_str())
            .collect()
    }
}

impl ClipBackend for SimulatedClips {
    fn clip_names(&self) -> Vec<String> {
        self.clips.keys().cloned().collect()
    }

    fn has_clip(&self, clip: &str) -> bool {
        self.clips.contains_key(clip)
    }

    fn play(&mut self, clip: &str, looping: bool, speed: f32) {
        if let Some(c) = self.clips.get_mut(clip) {
            c.cursor_ms = 0.0;
            c.looping = looping;
            c.speed = speed;
            c.playing = true;
        }
    }

    fn pause(&mut self, clip: &str) {
        if let Some(c) = self.clips.get_mut(clip) {
            c.playing = false;
        }
    }

    fn stop(&mut self, clip: &str) {
        if let Some(c) = self.clips.get_mut(clip) {
            c.playing = false;
            c.cursor_ms = 0.0;
        }
    }

    fn set_weight(&mut self, clip: &str, weight: f32) {
        if let Some(c) = self.clips.get_mut(clip) {
            c.weight = weight;
        }
    }

    fn set_speed(&mut self, clip: &str, speed: f32) {
        if let Some(c) = self.clips.get_mut(clip) {
            c.speed = speed;
        }
    }

    fn set_loop(&mut self, clip: &str, looping: bool) {
        if let Some(c) = self.clips.get_mut(clip) {
            c.looping = looping;
        }
    }

    fn progress(&self, clip: &str) -> f32 {
        match self.clips.get(clip) {
            Some(c) if c.duration_ms > 0.0 => (c.cursor_ms / c.duration_ms).clamp(0.0, 1.0),
            _ => 0.0,
        }
    }

    fn is_playing(&self, clip: &str) -> bool {
        self.clips.get(clip).map_or(false, |c| c.playing)
    }
}
