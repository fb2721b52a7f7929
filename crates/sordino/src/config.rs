use anyhow::{Context, Result, bail};
use serde::{Deserialize, Serialize};
use sordino_core::{
    move_queue::{AXIS_COUNT, Axis, MoveQueue},
    shaper::ShaperConfig,
};
use std::{fs, path::Path};

/// A shaping job: per-axis shaper settings plus the planned move list.
///
/// Job files use human units (seconds, mm/s, mm/s²); conversion to the
/// engine's millisecond base happens when the queue is built.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobConfig {
    /// Shaper configuration per axis; unconfigured axes are skipped.
    #[serde(default)]
    pub shaper: ShaperAxes,

    /// Planned moves, in order.
    #[serde(default)]
    pub moves: Vec<MoveSpec>,

    /// Move queue capacity (rounded up to a power of two).
    #[serde(default = "default_queue_capacity")]
    pub queue_capacity: usize,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ShaperAxes {
    pub x: Option<ShaperConfig>,
    pub y: Option<ShaperConfig>,
    pub z: Option<ShaperConfig>,
    pub e: Option<ShaperConfig>,
}

/// One trapezoidal segment as planned.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MoveSpec {
    /// Duration in seconds.
    pub duration: f64,

    /// Start velocity in mm/s.
    #[serde(default)]
    pub start_v: f64,

    /// Acceleration in mm/s².
    #[serde(default)]
    pub accel: f64,

    /// Per-axis share of the move direction.
    pub axis_r: [f64; AXIS_COUNT],
}

fn default_queue_capacity() -> usize {
    64
}

impl JobConfig {
    /// Load a job file (TOML or JSON, by extension).
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("failed to read job file {}", path.display()))?;
        let config = match path.extension().and_then(|e| e.to_str()) {
            Some("json") => serde_json::from_str(&content)
                .with_context(|| format!("failed to parse JSON job {}", path.display()))?,
            _ => toml::from_str(&content)
                .with_context(|| format!("failed to parse TOML job {}", path.display()))?,
        };
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.moves.is_empty() {
            bail!("job contains no moves");
        }
        for (i, spec) in self.moves.iter().enumerate() {
            if !(spec.duration > 0.0) {
                bail!("move {i}: duration must be positive, got {}", spec.duration);
            }
            if spec.axis_r.iter().any(|r| !r.is_finite()) {
                bail!("move {i}: axis_r must be finite");
            }
        }
        Ok(())
    }

    /// Configured axes, in canonical order.
    pub fn axes(&self) -> Vec<(Axis, ShaperConfig)> {
        [
            (Axis::X, &self.shaper.x),
            (Axis::Y, &self.shaper.y),
            (Axis::Z, &self.shaper.z),
            (Axis::E, &self.shaper.e),
        ]
        .into_iter()
        .filter_map(|(axis, cfg)| cfg.as_ref().map(|c| (axis, *c)))
        .collect()
    }

    /// Build the move queue, converting to engine units. Returns the
    /// queue and the index range of the pushed moves.
    pub fn build_queue(&self) -> Result<(MoveQueue, usize, usize)> {
        let mut queue = MoveQueue::new(self.queue_capacity);
        let mut first = None;
        let mut last = 0;
        for spec in &self.moves {
            let index = queue
                .push_move(
                    spec.duration * 1e3,
                    spec.start_v * 1e-3,
                    spec.accel * 1e-6,
                    spec.axis_r,
                )
                .context("move queue overflow; raise queue_capacity")?;
            first.get_or_insert(index);
            last = index;
        }
        let first = first.context("job contains no moves")?;
        Ok((queue, first, last))
    }
}
