// Global configuration and simulation parameters

use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::error::ConfigError;
use crate::palette::Palette;
use crate::presets::{Preset, SettingsStore, DEFAULT_PRESET};

/// Intensity a saturating deposit writes into a cell.
pub const SATURATION: f32 = 1.0;

/// Accepted range of a numeric trail weight.
pub const MIN_TRAIL_WEIGHT: f32 = 1e-6;
pub const MAX_TRAIL_WEIGHT: f32 = 1e6;

const DEFAULT_CONFIG_PATHS: [&str; 3] = ["config.yaml", "config.yml", "config.json"];

/// Amount of trail an agent lays per second.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "TrailWeightRepr", into = "TrailWeightRepr")]
pub enum TrailWeight {
    /// Additive deposit of `amount * dt`.
    Amount(f32),
    /// Saturate the cell to [`SATURATION`].
    Max,
}

// On disk a trail weight is either a number or the keyword `max`.
#[derive(Clone, Serialize, Deserialize)]
#[serde(untagged)]
enum TrailWeightRepr {
    Amount(f32),
    Keyword(String),
}

impl TryFrom<TrailWeightRepr> for TrailWeight {
    type Error = String;

    fn try_from(repr: TrailWeightRepr) -> Result<Self, Self::Error> {
        match repr {
            TrailWeightRepr::Amount(v) => Ok(TrailWeight::Amount(v)),
            TrailWeightRepr::Keyword(k) if k.eq_ignore_ascii_case("max") => Ok(TrailWeight::Max),
            TrailWeightRepr::Keyword(k) => Err(format!(
                "trail_weight must be a number or `max`, got `{}`",
                k
            )),
        }
    }
}

impl From<TrailWeight> for TrailWeightRepr {
    fn from(weight: TrailWeight) -> Self {
        match weight {
            TrailWeight::Amount(v) => TrailWeightRepr::Amount(v),
            TrailWeight::Max => TrailWeightRepr::Keyword("max".to_owned()),
        }
    }
}

/// Parameters of one run. Loaded once, never mutated while stepping.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct SimParameters {
    pub agent_count: usize,
    pub move_speed: f32,     // cells per second
    pub turn_speed: f32,     // radians per second
    pub fade_rate: f32,      // per second
    pub blur_rate: f32,      // per second
    pub sense_range: f32,    // cells
    pub sense_rotation: f32, // radians
    pub trail_weight: TrailWeight,
}

impl SimParameters {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.agent_count == 0 {
            return Err(ConfigError::ZeroAgents);
        }
        positive("move_speed", self.move_speed)?;
        non_negative("turn_speed", self.turn_speed)?;
        non_negative("fade_rate", self.fade_rate)?;
        non_negative("blur_rate", self.blur_rate)?;
        positive("sense_range", self.sense_range)?;
        non_negative("sense_rotation", self.sense_rotation)?;
        if let TrailWeight::Amount(amount) = self.trail_weight {
            if !(MIN_TRAIL_WEIGHT..=MAX_TRAIL_WEIGHT).contains(&amount) {
                return Err(ConfigError::OutOfRange {
                    name: "trail_weight",
                    expected: "between 1e-6 and 1e6, or `max`",
                    value: amount,
                });
            }
        }
        Ok(())
    }
}

fn positive(name: &'static str, value: f32) -> Result<(), ConfigError> {
    if value.is_finite() && value > 0.0 {
        Ok(())
    } else {
        Err(ConfigError::OutOfRange {
            name,
            expected: "finite and > 0",
            value,
        })
    }
}

fn non_negative(name: &'static str, value: f32) -> Result<(), ConfigError> {
    if value.is_finite() && value >= 0.0 {
        Ok(())
    } else {
        Err(ConfigError::OutOfRange {
            name,
            expected: "finite and >= 0",
            value,
        })
    }
}

/// Initial placement of the swarm.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SpawnMode {
    /// Uniform position and heading.
    #[default]
    Random,
    /// Everyone starts at the grid centre with a uniform heading.
    Center,
    /// Uniform in a disc around the centre, facing inwards.
    InwardCircle,
}

/// Run configuration: grid, preset selection, seeding and output.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct SimulationConfig {
    // Grid/display
    pub width: usize,
    pub height: usize,

    // Parameter selection
    pub preset: String,
    pub parameters: Option<SimParameters>,
    pub presets: Vec<Preset>,

    // Initialization
    pub spawn: SpawnMode,
    pub seed: Option<u64>,

    // Output
    pub palette: Palette,

    // Timing
    pub time_step: f32,
    pub max_frame_time: f32,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            width: 640,
            height: 360,
            preset: DEFAULT_PRESET.to_owned(),
            parameters: None,
            presets: Vec::new(),
            spawn: SpawnMode::Random,
            seed: None,
            palette: Palette::default(),
            time_step: 1.0 / 60.0,
            max_frame_time: 1.0 / 30.0,
        }
    }
}

impl SimulationConfig {
    /// Load from a YAML (`.yaml`/`.yml`) or JSON (`.json`) file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let display = path.display().to_string();
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: display.clone(),
            source,
        })?;
        let is_json = path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.eq_ignore_ascii_case("json"))
            .unwrap_or(false);
        if is_json {
            Self::from_json_str(&text).map_err(|e| with_path(e, &display))
        } else {
            Self::from_yaml_str(&text).map_err(|e| with_path(e, &display))
        }
    }

    pub fn from_yaml_str(text: &str) -> Result<Self, ConfigError> {
        serde_yaml::from_str(text).map_err(|e| ConfigError::Parse {
            path: "<yaml>".to_owned(),
            message: e.to_string(),
        })
    }

    pub fn from_json_str(text: &str) -> Result<Self, ConfigError> {
        serde_json::from_str(text).map_err(|e| ConfigError::Parse {
            path: "<json>".to_owned(),
            message: e.to_string(),
        })
    }

    /// First readable config in the working directory, or the defaults.
    pub fn from_default_paths() -> Self {
        for candidate in DEFAULT_CONFIG_PATHS {
            if !Path::new(candidate).exists() {
                continue;
            }
            match Self::from_file(candidate) {
                Ok(config) => {
                    log::info!("loaded configuration from {}", candidate);
                    return config;
                }
                Err(e) => log::warn!("ignoring {}: {}", candidate, e),
            }
        }
        Self::default()
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.width == 0 || self.height == 0 {
            return Err(ConfigError::EmptyGrid {
                width: self.width,
                height: self.height,
            });
        }
        if self.width.checked_mul(self.height).is_none() {
            return Err(ConfigError::GridTooLarge {
                width: self.width,
                height: self.height,
            });
        }
        positive("time_step", self.time_step)?;
        positive("max_frame_time", self.max_frame_time)?;
        Ok(())
    }

    /// Built-in presets with this config's user presets layered on top.
    pub fn settings_store(&self) -> SettingsStore {
        let mut store = SettingsStore::builtin();
        for preset in &self.presets {
            store.insert(preset.clone());
        }
        store
    }

    /// The active parameter set: inline `parameters` win over the named preset.
    pub fn resolve_parameters(&self) -> Result<SimParameters, ConfigError> {
        let params = match self.parameters {
            Some(params) => params,
            None => self.settings_store().resolve(&self.preset)?,
        };
        params.validate()?;
        Ok(params)
    }

    /// Grid size as a window texture size. Textures are limited to 16-bit sides.
    pub fn texture_size(&self) -> Result<(u16, u16), ConfigError> {
        let too_large = || ConfigError::TextureTooLarge {
            width: self.width,
            height: self.height,
        };
        let width = u16::try_from(self.width).map_err(|_| too_large())?;
        let height = u16::try_from(self.height).map_err(|_| too_large())?;
        Ok((width, height))
    }

    pub fn aspect_ratio(&self) -> f32 {
        self.width as f32 / self.height.max(1) as f32
    }

    /// World-space extent of a view `view_height` tall at this aspect ratio.
    pub fn world_size(&self, view_height: f32) -> (f32, f32) {
        (self.aspect_ratio() * view_height, view_height)
    }
}

fn with_path(err: ConfigError, path: &str) -> ConfigError {
    match err {
        ConfigError::Parse { message, .. } => ConfigError::Parse {
            path: path.to_owned(),
            message,
        },
        other => other,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn params() -> SimParameters {
        SimParameters {
            agent_count: 10,
            move_speed: 1.0,
            turn_speed: 0.0,
            fade_rate: 0.0,
            blur_rate: 0.0,
            sense_range: 1.0,
            sense_rotation: 0.4,
            trail_weight: TrailWeight::Amount(1.0),
        }
    }

    #[test]
    fn test_validate_accepts_minimal_params() {
        assert!(params().validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_zero_agents() {
        let p = SimParameters {
            agent_count: 0,
            ..params()
        };
        assert!(matches!(p.validate(), Err(ConfigError::ZeroAgents)));
    }

    #[test]
    fn test_validate_rejects_negative_rates() {
        let p = SimParameters {
            fade_rate: -0.1,
            ..params()
        };
        match p.validate() {
            Err(ConfigError::OutOfRange { name, .. }) => assert_eq!(name, "fade_rate"),
            other => panic!("unexpected: {other:?}"),
        }

        let p = SimParameters {
            blur_rate: f32::NAN,
            ..params()
        };
        assert!(p.validate().is_err());

        let p = SimParameters {
            trail_weight: TrailWeight::Amount(0.0),
            ..params()
        };
        assert!(p.validate().is_err());
    }

    #[test]
    fn test_validate_bounds_trail_weight() {
        for amount in [1e13, 1e-9, f32::INFINITY, f32::NAN, -1.0] {
            let p = SimParameters {
                trail_weight: TrailWeight::Amount(amount),
                ..params()
            };
            match p.validate() {
                Err(ConfigError::OutOfRange { name, .. }) => assert_eq!(name, "trail_weight"),
                other => panic!("{amount} accepted: {other:?}"),
            }
        }
        for amount in [MIN_TRAIL_WEIGHT, 0.5, MAX_TRAIL_WEIGHT] {
            let p = SimParameters {
                trail_weight: TrailWeight::Amount(amount),
                ..params()
            };
            assert!(p.validate().is_ok(), "{amount} rejected");
        }
    }

    #[test]
    fn test_texture_size_limits() {
        let config = SimulationConfig::default();
        assert_eq!(config.texture_size().unwrap(), (640, 360));

        let wide = SimulationConfig {
            width: 70_000,
            height: 10,
            ..SimulationConfig::default()
        };
        assert!(wide.validate().is_ok());
        assert!(matches!(
            wide.texture_size(),
            Err(ConfigError::TextureTooLarge { width: 70_000, .. })
        ));
    }

    #[test]
    fn test_validate_rejects_empty_grid() {
        let config = SimulationConfig {
            width: 0,
            ..SimulationConfig::default()
        };
        assert!(matches!(
            config.validate(),
            Err(ConfigError::EmptyGrid { width: 0, .. })
        ));

        let config = SimulationConfig {
            width: usize::MAX,
            height: 2,
            ..SimulationConfig::default()
        };
        assert!(matches!(
            config.validate(),
            Err(ConfigError::GridTooLarge { .. })
        ));
    }

    #[test]
    fn test_default_is_sixteen_by_nine() {
        let config = SimulationConfig::default();
        assert!(config.validate().is_ok());
        assert!((config.aspect_ratio() - 16.0 / 9.0).abs() < 1e-6);
        let (w, h) = config.world_size(10.0);
        assert!((w - 160.0 / 9.0).abs() < 1e-4);
        assert_eq!(h, 10.0);
    }

    #[test]
    fn test_yaml_trail_weight_forms() {
        let yaml = r#"
width: 32
height: 18
preset: custom
seed: 7
spawn: inward_circle
presets:
  - name: custom
    agent_count: 50
    move_speed: 20.0
    turn_speed: 2.0
    fade_rate: 0.2
    blur_rate: 3.0
    sense_range: 5.0
    sense_rotation: 0.5
    trail_weight: max
  - name: additive
    agent_count: 5
    move_speed: 1
    turn_speed: 0
    fade_rate: 0
    blur_rate: 0
    sense_range: 1
    sense_rotation: 0
    trail_weight: 2.5
"#;
        let config = SimulationConfig::from_yaml_str(yaml).unwrap();
        assert_eq!(config.width, 32);
        assert_eq!(config.seed, Some(7));
        assert_eq!(config.spawn, SpawnMode::InwardCircle);
        let params = config.resolve_parameters().unwrap();
        assert_eq!(params.agent_count, 50);
        assert_eq!(params.trail_weight, TrailWeight::Max);
        let store = config.settings_store();
        assert_eq!(
            store.resolve("additive").unwrap().trail_weight,
            TrailWeight::Amount(2.5)
        );
    }

    #[test]
    fn test_yaml_rejects_bad_keyword() {
        let yaml = r#"
parameters:
  agent_count: 5
  move_speed: 1
  turn_speed: 0
  fade_rate: 0
  blur_rate: 0
  sense_range: 1
  sense_rotation: 0
  trail_weight: lots
"#;
        assert!(matches!(
            SimulationConfig::from_yaml_str(yaml),
            Err(ConfigError::Parse { .. })
        ));
    }

    #[test]
    fn test_json_inline_parameters_override_preset() {
        let json = r#"{
            "preset": "bloom",
            "parameters": {
                "agent_count": 3,
                "move_speed": 1.0,
                "turn_speed": 0.0,
                "fade_rate": 0.0,
                "blur_rate": 0.0,
                "sense_range": 1.0,
                "sense_rotation": 0.4,
                "trail_weight": 1
            }
        }"#;
        let config = SimulationConfig::from_json_str(json).unwrap();
        assert_eq!(config.width, 640);
        let params = config.resolve_parameters().unwrap();
        assert_eq!(params.agent_count, 3);
        assert_eq!(params.trail_weight, TrailWeight::Amount(1.0));
    }

    #[test]
    fn test_unknown_preset() {
        let config = SimulationConfig {
            preset: "nope".to_owned(),
            ..SimulationConfig::default()
        };
        assert!(matches!(
            config.resolve_parameters(),
            Err(ConfigError::UnknownPreset(name)) if name == "nope"
        ));
    }

    #[test]
    fn test_from_file_roundtrips_through_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(&path, r#"{ "width": 48, "height": 27 }"#).unwrap();
        let config = SimulationConfig::from_file(&path).unwrap();
        assert_eq!((config.width, config.height), (48, 27));

        let missing = SimulationConfig::from_file(dir.path().join("missing.yaml"));
        assert!(matches!(missing, Err(ConfigError::Io { .. })));
    }
}
