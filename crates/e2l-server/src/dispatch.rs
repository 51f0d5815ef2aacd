//! Command dispatcher
//!
//! Owns the engine, the observation map and the settings, and turns each
//! decoded request into exactly one [`Response`]. Errors never escape:
//! they are folded into `{status: "error", message}`.

use crate::engine::{Engine, WorldId};
use crate::observer::compile_observations;
use crate::resolver::apply_setters;
use crate::settings::BridgeSettings;
use crate::space::{action_space, observation_space};
use crate::stepper::{self, StepTiming};
use e2l_core::{BridgeError, Command, ObservationMap, Response, Result, Value};
use tracing::{debug, warn};

/// Single owner of all state a command touches
pub struct CommandDispatcher<E: Engine> {
    engine: E,
    observations: ObservationMap,
    settings: BridgeSettings,
    /// Set by `reset`; cleared once the world has been paused
    pending_pause: bool,
}

impl<E: Engine> CommandDispatcher<E> {
    pub fn new(engine: E, settings: BridgeSettings) -> Self {
        Self {
            engine,
            observations: ObservationMap::new(),
            settings,
            pending_pause: false,
        }
    }

    pub fn engine(&self) -> &E {
        &self.engine
    }

    pub fn engine_mut(&mut self) -> &mut E {
        &mut self.engine
    }

    pub fn settings(&self) -> &BridgeSettings {
        &self.settings
    }

    pub fn observations(&self) -> &ObservationMap {
        &self.observations
    }

    /// Whether a post-reset pause is still outstanding
    pub fn has_pending_pause(&self) -> bool {
        self.pending_pause
    }

    /// Carry out the post-reset pause if one is outstanding
    pub fn apply_pending_pause(&mut self) {
        if !std::mem::take(&mut self.pending_pause) {
            return;
        }
        match self.engine.playing_world() {
            Some(world) => stepper::pause(&mut self.engine, world),
            None => warn!("no playing world to pause after reset"),
        }
    }

    /// Decode, run and answer one request message
    pub fn handle_message(&mut self, message: &Value) -> Response {
        match Command::parse(message) {
            Ok(command) => self.handle(command),
            Err(e) => {
                warn!(error = %e, "rejected request");
                Response::error(e.to_string())
            }
        }
    }

    /// Run one command; never fails
    pub fn handle(&mut self, command: Command) -> Response {
        let cmd = command.name();
        self.apply_pending_pause();

        match self.execute(command) {
            Ok(response) => {
                debug!(cmd, "command ok");
                response
            }
            Err(e) => {
                warn!(cmd, error = %e, "command failed");
                Response::error(e.to_string())
            }
        }
    }

    fn execute(&mut self, command: Command) -> Result<Response> {
        match command {
            Command::Step(request) => {
                let world = self.playing_world()?;
                let timing = StepTiming::resolve(
                    &request,
                    self.settings.default_delta_time,
                    self.settings.default_num_ticks,
                );
                stepper::step(&mut self.engine, world, &request, timing)?;
                self.observe()
            }
            Command::Reset => {
                let world = self.playing_world()?;
                stepper::reset(&mut self.engine, world)?;
                self.pending_pause = true;
                self.observe()
            }
            Command::Seed(value) => Ok(Response::Seeded {
                new_seed: stepper::seed(&mut self.engine, value),
            }),
            Command::Set(setters) => {
                let world = self.playing_world()?;
                let writes = apply_setters(&mut self.engine, world, &setters)?;
                debug!(setters = setters.len(), writes, "set applied");
                self.observe()
            }
            Command::GetSpec => Ok(Response::Spec {
                action_space: action_space(&self.engine),
                observation_space: observation_space(&mut self.engine, &self.settings)?,
            }),
        }
    }

    fn playing_world(&self) -> Result<WorldId> {
        self.engine.playing_world().ok_or(BridgeError::NoActiveWorld)
    }

    fn observe(&mut self) -> Result<Response> {
        compile_observations(&mut self.engine, &mut self.observations, &self.settings)
            .map(Response::Observation)
    }
}
