//! Simulation stepping
//!
//! A step injects the requested inputs once, then runs `num_ticks` fixed
//! ticks, each bracketed by unpause/pause. Pause toggles the engine refuses
//! are logged and the step carries on.

use crate::engine::{InputSystem, WorldId};
use e2l_core::{Result, StepRequest};
use tracing::{debug, warn};

/// Resolved step parameters
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StepTiming {
    pub delta_time: f64,
    pub num_ticks: u32,
}

impl StepTiming {
    /// Fill in whatever the request leaves out
    pub fn resolve(request: &StepRequest, default_delta_time: f64, default_num_ticks: u32) -> Self {
        Self {
            delta_time: request.delta_time.unwrap_or(default_delta_time),
            num_ticks: request.num_ticks.unwrap_or(default_num_ticks),
        }
    }
}

/// Apply inputs and advance `world`
pub fn step<E: InputSystem + ?Sized>(
    engine: &mut E,
    world: WorldId,
    request: &StepRequest,
    timing: StepTiming,
) -> Result<()> {
    debug!(
        delta_time = timing.delta_time,
        num_ticks = timing.num_ticks,
        axes = request.axes.len(),
        actions = request.actions.len(),
        "step"
    );

    for (key, value) in &request.axes {
        debug!(key = %key, value, "axis input");
        engine.input_axis(world, key, *value, timing.delta_time)?;
    }
    for (key, pressed) in &request.actions {
        debug!(key = %key, pressed, "action input");
        engine.input_key(world, key, *pressed)?;
    }

    for _ in 0..timing.num_ticks {
        if !engine.set_paused(world, false) {
            warn!("un-pausing game for next tick was not successful");
        }
        engine.tick(world, timing.delta_time)?;
        if !engine.set_paused(world, true) {
            warn!("re-pausing game after tick was not successful");
        }
    }
    Ok(())
}

/// Restart the level; the caller is responsible for the deferred pause
pub fn reset<E: InputSystem + ?Sized>(engine: &mut E, world: WorldId) -> Result<()> {
    debug!(world, "resetting level");
    engine.restart_level(world)
}

/// Pause `world` unless it already is
pub fn pause<E: InputSystem + ?Sized>(engine: &mut E, world: WorldId) {
    let paused = engine.is_paused(world);
    debug!(world, paused, "pausing the game");
    if !paused && !engine.set_paused(world, true) {
        warn!(world, "game could not be paused");
    }
}

/// Set the engine's global random seed
pub fn seed<E: InputSystem + ?Sized>(engine: &mut E, value: i64) -> i64 {
    engine.set_random_seed(value);
    value
}
