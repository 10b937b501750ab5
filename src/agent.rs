// Agents: sense the trail, steer, move, bounce off the edges, deposit

use ::rand as external_rand;
use external_rand::Rng;
use rayon::prelude::*;
use std::f32::consts::{PI, TAU};

use crate::config::{SimParameters, SpawnMode, TrailWeight};
use crate::error::{try_alloc_with, SimError};
use crate::field::TrailField;

// Agents are handed to rayon in blocks of this size.
const AGENT_WORKGROUP: usize = 256;

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Agent {
    pub x: f32,
    pub y: f32,
    pub angle: f32, // radians, 0 = +x
}

impl Agent {
    pub fn new(x: f32, y: f32, angle: f32) -> Self {
        Self { x, y, angle }
    }

    #[inline]
    pub fn heading(&self) -> (f32, f32) {
        (self.angle.cos(), self.angle.sin())
    }

    /// Whether the position is finite and within `[0, width) x [0, height)`.
    pub fn is_inside(&self, width: f32, height: f32) -> bool {
        let within = |v: f32, edge: f32| v.is_finite() && v >= 0.0 && v < edge;
        within(self.x, width) && within(self.y, height)
    }
}

/// Trail readings at the three probes of one agent.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct SensorReading {
    pub left: f32,
    pub center: f32,
    pub right: f32,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Steer {
    Straight,
    Left,
    Right,
}

/// Read the field straight ahead and at `±sense_rotation`, `sense_range` away.
/// Left is the counter-clockwise side (`angle + sense_rotation`).
pub fn sense(agent: &Agent, field: &TrailField, params: &SimParameters) -> SensorReading {
    let probe = |offset: f32| {
        let a = agent.angle + offset;
        field.sample(
            agent.x + a.cos() * params.sense_range,
            agent.y + a.sin() * params.sense_range,
        )
    };
    SensorReading {
        left: probe(params.sense_rotation),
        center: probe(0.0),
        right: probe(-params.sense_rotation),
    }
}

/// Strongest probe wins; ties prefer straight ahead, then left.
pub fn choose_steer(reading: SensorReading) -> Steer {
    let SensorReading {
        left,
        center,
        right,
    } = reading;
    if center >= left && center >= right {
        Steer::Straight
    } else if left >= right {
        Steer::Left
    } else {
        Steer::Right
    }
}

/// Advance one agent by `dt`. Reads only committed field cells; the deposit is
/// queued and becomes visible after the stepper commits.
pub fn step_agent(agent: &mut Agent, field: &TrailField, params: &SimParameters, dt: f32) -> bool {
    let recovered = sanitize(agent, field.width(), field.height());

    let max_turn = params.turn_speed * dt;
    match choose_steer(sense(agent, field, params)) {
        Steer::Straight => {}
        Steer::Left => agent.angle += max_turn,
        Steer::Right => agent.angle -= max_turn,
    }

    let (dx, dy) = agent.heading();
    let distance = params.move_speed * dt;
    agent.x += dx * distance;
    agent.y += dy * distance;
    bounce(agent, field.width() as f32, field.height() as f32);

    match params.trail_weight {
        TrailWeight::Amount(weight) => field.deposit(agent.x, agent.y, weight * dt),
        TrailWeight::Max => field.saturate(agent.x, agent.y),
    }
    recovered
}

/// Reflect the heading component that left the grid and clamp back inside.
fn bounce(agent: &mut Agent, width: f32, height: f32) {
    if agent.x < 0.0 || agent.x >= width {
        agent.x = agent.x.clamp(0.0, below(width));
        agent.angle = PI - agent.angle;
    }
    if agent.y < 0.0 || agent.y >= height {
        agent.y = agent.y.clamp(0.0, below(height));
        agent.angle = -agent.angle;
    }
    agent.angle = agent.angle.rem_euclid(TAU);
}

// Largest float strictly below a positive `edge`. A fixed margin stops
// working once the edge is too large for it to change the value.
#[inline]
fn below(edge: f32) -> f32 {
    f32::from_bits(edge.to_bits() - 1)
}

// Degenerate state is replaced locally instead of spreading NaN through later ticks.
fn sanitize(agent: &mut Agent, width: usize, height: usize) -> bool {
    let mut recovered = false;
    if !agent.angle.is_finite() {
        agent.angle = 0.0;
        recovered = true;
    }
    if !agent.x.is_finite() || !agent.y.is_finite() {
        agent.x = width as f32 / 2.0;
        agent.y = height as f32 / 2.0;
        recovered = true;
    }
    recovered
}

/// Fixed-size swarm. Never grows or shrinks after construction.
pub struct AgentPool {
    agents: Vec<Agent>,
}

impl AgentPool {
    pub fn from_agents(agents: Vec<Agent>) -> Self {
        Self { agents }
    }

    pub fn spawn<R: Rng>(
        count: usize,
        width: usize,
        height: usize,
        mode: SpawnMode,
        rng: &mut R,
    ) -> Result<Self, SimError> {
        let (w, h) = (width as f32, height as f32);
        let (cx, cy) = (w / 2.0, h / 2.0);
        let radius = w.min(h) * 0.45;
        let mut agents = try_alloc_with("agents", count, || Agent::new(cx, cy, 0.0))?;
        for agent in &mut agents {
            *agent = match mode {
                SpawnMode::Random => Agent::new(
                    rng.gen_range(0.0..w),
                    rng.gen_range(0.0..h),
                    rng.gen_range(0.0..TAU),
                ),
                SpawnMode::Center => Agent::new(cx, cy, rng.gen_range(0.0..TAU)),
                SpawnMode::InwardCircle => {
                    let theta = rng.gen_range(0.0..TAU);
                    let r = radius * rng.gen::<f32>().sqrt();
                    let x = cx + theta.cos() * r;
                    let y = cy + theta.sin() * r;
                    Agent::new(x, y, (cy - y).atan2(cx - x).rem_euclid(TAU))
                }
            };
        }
        Ok(Self { agents })
    }

    pub fn len(&self) -> usize {
        self.agents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.agents.is_empty()
    }

    pub fn agents(&self) -> &[Agent] {
        &self.agents
    }

    /// Run every agent once against the committed field. Returns how many
    /// agents had to be recovered from non-finite state.
    pub fn update(&mut self, field: &TrailField, params: &SimParameters, dt: f32) -> usize {
        let recovered: usize = self
            .agents
            .par_iter_mut()
            .with_min_len(AGENT_WORKGROUP)
            .map(|agent| step_agent(agent, field, params, dt) as usize)
            .sum();
        if recovered > 0 {
            log::warn!("recovered {} agents from non-finite state", recovered);
        }
        recovered
    }
}
