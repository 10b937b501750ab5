// Error taxonomy: configuration is rejected before allocation, allocation
// failures surface as-is. Nothing is reported mid-run.

use std::collections::TryReserveError;
use thiserror::Error;

/// Invalid or unreadable configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("agent_count must be greater than zero")]
    ZeroAgents,
    #[error("grid dimensions must be positive, got {width}x{height}")]
    EmptyGrid { width: usize, height: usize },
    #[error("grid {width}x{height} has too many cells")]
    GridTooLarge { width: usize, height: usize },
    #[error("grid {width}x{height} exceeds the 65535 pixel texture limit")]
    TextureTooLarge { width: usize, height: usize },
    #[error("expected {expected} agents, got {actual}")]
    AgentCountMismatch { expected: usize, actual: usize },
    #[error("agent {index} starts outside the grid at ({x}, {y})")]
    AgentOutOfBounds { index: usize, x: f32, y: f32 },
    #[error("{name} must be {expected}, got {value}")]
    OutOfRange {
        name: &'static str,
        expected: &'static str,
        value: f32,
    },
    #[error("unknown preset `{0}`")]
    UnknownPreset(String),
    #[error("failed to read {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse {path}: {message}")]
    Parse { path: String, message: String },
}

/// Fatal setup error for a simulation.
#[derive(Debug, Error)]
pub enum SimError {
    #[error("invalid configuration: {0}")]
    Config(#[from] ConfigError),
    #[error("failed to allocate {what} ({count} elements)")]
    Allocation {
        what: &'static str,
        count: usize,
        #[source]
        source: TryReserveError,
    },
}

/// Allocate a buffer of exactly `count` elements or fail without a partial fallback.
pub(crate) fn try_alloc_with<T, F>(what: &'static str, count: usize, fill: F) -> Result<Vec<T>, SimError>
where
    F: FnMut() -> T,
{
    let mut buf = Vec::new();
    buf.try_reserve_exact(count)
        .map_err(|source| SimError::Allocation {
            what,
            count,
            source,
        })?;
    buf.resize_with(count, fill);
    log::debug!("allocated {} ({} elements)", what, count);
    Ok(buf)
}
