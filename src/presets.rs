// Named parameter presets the caller chooses from at startup

use serde::{Deserialize, Serialize};

use crate::config::{SimParameters, TrailWeight};
use crate::error::ConfigError;

pub const DEFAULT_PRESET: &str = "strands";

/// A named parameter set. In config files the parameters sit next to `name`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Preset {
    pub name: String,
    #[serde(flatten)]
    pub params: SimParameters,
}

const fn preset(
    agent_count: usize,
    move_speed: f32,
    turn_speed: f32,
    fade_rate: f32,
    blur_rate: f32,
    sense_range: f32,
    sense_rotation: f32,
) -> SimParameters {
    SimParameters {
        agent_count,
        move_speed,
        turn_speed,
        fade_rate,
        blur_rate,
        sense_range,
        sense_rotation,
        trail_weight: TrailWeight::Max,
    }
}

/// Built-in presets, in display order.
pub const BUILTIN_PRESETS: [(&str, SimParameters); 10] = [
    ("test", preset(100, 50.0, 4.0, 0.2, 10.0, 60.0, 0.4)),
    ("slow", preset(1_000_000, 100.0, 4.0, 0.2, 10.0, 30.0, 0.2)),
    ("bloom", preset(1_000_000, 250.0, 6.0, 0.2, 10.0, 120.0, 0.4)),
    ("milk_vortex", preset(1_000_000, 400.0, 20.0, 0.2, 10.0, 100.0, 0.3)),
    ("fuzzy_chain", preset(1_000_000, 1000.0, 100.0, 0.2, 10.0, 100.0, 0.8)),
    ("static_noise", preset(1_000_000, 2000.0, 200.0, 0.6, 10.0, 100.0, 0.2)),
    ("spectral", preset(10_000, 5000.0, 200.0, 0.2, 10.0, 100.0, 0.2)),
    // ridiculously high speed
    ("strands", preset(10_000, 10_000.0, 50.0, 0.5, 10.0, 50.0, 0.8)),
    ("creepy", preset(100_000, 700.0, 20.0, 1.0, 0.0, 100.0, 0.5)),
    ("consistent", preset(250_000, 20.0, 1.0, 0.2, 3.0, 30.0, 0.61)),
];

/// Lookup table of presets. Later inserts replace earlier ones with the same name.
#[derive(Clone, Debug, Default)]
pub struct SettingsStore {
    presets: Vec<Preset>,
}

impl SettingsStore {
    pub fn builtin() -> Self {
        Self {
            presets: BUILTIN_PRESETS
                .iter()
                .map(|(name, params)| Preset {
                    name: (*name).to_owned(),
                    params: *params,
                })
                .collect(),
        }
    }

    pub fn insert(&mut self, preset: Preset) {
        match self.presets.iter_mut().find(|p| p.name == preset.name) {
            Some(existing) => *existing = preset,
            None => self.presets.push(preset),
        }
    }

    pub fn get(&self, name: &str) -> Option<&SimParameters> {
        self.presets
            .iter()
            .find(|p| p.name == name)
            .map(|p| &p.params)
    }

    pub fn resolve(&self, name: &str) -> Result<SimParameters, ConfigError> {
        self.get(name)
            .copied()
            .ok_or_else(|| ConfigError::UnknownPreset(name.to_owned()))
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.presets.iter().map(|p| p.name.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = &Preset> {
        self.presets.iter()
    }

    pub fn len(&self) -> usize {
        self.presets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.presets.is_empty()
    }
}
