//! Agent-based trail simulation in the style of Physarum slime mould.
//!
//! A fixed swarm of agents moves over a 2D grid, senses the trail ahead of it,
//! steers toward the strongest reading and deposits more trail where it lands.
//! After every agent pass the field is blurred and faded. Both passes are flat
//! data-parallel loops over [rayon].
//!
//! The host owns the loop: build a [`Simulation`] with
//! [`Simulation::initialize`], call [`Simulation::tick`] with the frame time,
//! and hand [`Simulation::render`] output to a [`Presenter`].

pub mod agent;
pub mod config;
pub mod error;
pub mod field;
pub mod palette;
pub mod presenter;
pub mod presets;
pub mod simulation;

pub use agent::{Agent, AgentPool};
pub use config::{SimParameters, SimulationConfig, SpawnMode, TrailWeight, SATURATION};
pub use error::{ConfigError, SimError};
pub use field::TrailField;
pub use palette::{Frame, Palette};
pub use presenter::{PngSnapshot, Presenter};
pub use presets::{Preset, SettingsStore, DEFAULT_PRESET};
pub use simulation::{Phase, SimStats, Simulation};
