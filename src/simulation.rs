use ::rand as external_rand;
use external_rand::rngs::StdRng;
use external_rand::SeedableRng;

use crate::agent::{Agent, AgentPool};
use crate::config::{SimParameters, SimulationConfig};
use crate::error::{ConfigError, SimError};
use crate::field::TrailField;
use crate::palette::{Frame, Palette};
use crate::presenter::Presenter;

/// The two passes of a tick, in the order they run.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Phase {
    /// Every agent senses, steers, moves and queues a deposit.
    AgentUpdate,
    /// Blur then fade over the whole field.
    FieldPostProcess,
}

impl Phase {
    pub const ORDER: [Phase; 2] = [Phase::AgentUpdate, Phase::FieldPostProcess];
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct SimStats {
    pub tick_index: u64,
    pub elapsed: f64,
    pub agent_count: usize,
    pub total_intensity: f64,
    pub max_intensity: f32,
}

// Simulation - owns the field, the swarm and the clock
pub struct Simulation {
    params: SimParameters,
    field: TrailField,
    agents: AgentPool,
    palette: Palette,
    elapsed: f64,
    tick_index: u64,
}

impl Simulation {
    /// Validate, allocate and seed a run from `config` with the resolved `params`.
    pub fn initialize(config: &SimulationConfig, params: SimParameters) -> Result<Self, SimError> {
        config.validate()?;
        params.validate()?;
        let mut rng = match config.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        let field = TrailField::new(config.width, config.height)?;
        let agents = AgentPool::spawn(
            params.agent_count,
            config.width,
            config.height,
            config.spawn,
            &mut rng,
        )?;
        log::info!(
            "initialized {}x{} field with {} agents ({:?} spawn)",
            config.width,
            config.height,
            agents.len(),
            config.spawn
        );
        Ok(Self {
            params,
            field,
            agents,
            palette: config.palette.clone(),
            elapsed: 0.0,
            tick_index: 0,
        })
    }

    /// Start from explicit agent states instead of random seeding. There must
    /// be exactly `params.agent_count` agents, all inside the grid.
    pub fn with_agents(
        width: usize,
        height: usize,
        params: SimParameters,
        agents: Vec<Agent>,
    ) -> Result<Self, SimError> {
        params.validate()?;
        if agents.len() != params.agent_count {
            return Err(ConfigError::AgentCountMismatch {
                expected: params.agent_count,
                actual: agents.len(),
            }
            .into());
        }
        if let Some((index, a)) = agents
            .iter()
            .enumerate()
            .find(|(_, a)| !a.is_inside(width as f32, height as f32))
        {
            return Err(ConfigError::AgentOutOfBounds {
                index,
                x: a.x,
                y: a.y,
            }
            .into());
        }
        Ok(Self {
            params,
            field: TrailField::new(width, height)?,
            agents: AgentPool::from_agents(agents),
            palette: Palette::default(),
            elapsed: 0.0,
            tick_index: 0,
        })
    }

    /// Advance the whole simulation by `dt` seconds. Non-finite or negative
    /// steps are treated as zero.
    pub fn tick(&mut self, dt: f32) {
        let dt = if dt.is_finite() && dt >= 0.0 {
            dt
        } else {
            log::warn!("ignoring invalid time step {}", dt);
            0.0
        };
        for phase in Phase::ORDER {
            self.run_phase(phase, dt);
        }
        self.elapsed += dt as f64;
        self.tick_index += 1;
        log::trace!("tick {} done (dt = {})", self.tick_index, dt);
    }

    fn run_phase(&mut self, phase: Phase, dt: f32) {
        match phase {
            Phase::AgentUpdate => {
                self.agents.update(&self.field, &self.params, dt);
                // Barrier: nothing reads the field until every deposit is folded in.
                self.field.commit_deposits();
            }
            Phase::FieldPostProcess => {
                self.field
                    .post_process(self.params.blur_rate, self.params.fade_rate, dt);
            }
        }
    }

    /// One tick followed by handing the rendered frame to `presenter`.
    pub fn tick_and_present<P: Presenter>(
        &mut self,
        dt: f32,
        frame: &mut Frame,
        presenter: &mut P,
    ) -> Result<(), P::Error> {
        self.tick(dt);
        self.render(frame);
        presenter.present(frame)
    }

    pub fn current_field(&self) -> &TrailField {
        &self.field
    }

    /// Mutable access for seeding the field before a run.
    pub fn field_mut(&mut self) -> &mut TrailField {
        &mut self.field
    }

    pub fn agents(&self) -> &[Agent] {
        self.agents.agents()
    }

    pub fn params(&self) -> &SimParameters {
        &self.params
    }

    pub fn palette(&self) -> &Palette {
        &self.palette
    }

    pub fn set_palette(&mut self, palette: Palette) {
        self.palette = palette;
    }

    pub fn elapsed(&self) -> f64 {
        self.elapsed
    }

    pub fn tick_index(&self) -> u64 {
        self.tick_index
    }

    /// A frame sized to the field.
    pub fn new_frame(&self) -> Frame {
        Frame::new(self.field.width(), self.field.height())
    }

    pub fn render(&self, frame: &mut Frame) {
        self.palette.render_into(&self.field, self.elapsed, frame);
    }

    pub fn stats(&self) -> SimStats {
        SimStats {
            tick_index: self.tick_index,
            elapsed: self.elapsed,
            agent_count: self.agents.len(),
            total_intensity: self.field.total_intensity(),
            max_intensity: self.field.max_intensity(),
        }
    }

    /// Release all buffers and report how the run ended.
    pub fn shutdown(self) -> SimStats {
        let stats = self.stats();
        log::info!(
            "shutting down after {} ticks ({:.2}s simulated, total intensity {:.3})",
            stats.tick_index,
            stats.elapsed,
            stats.total_intensity
        );
        stats
    }
}
