use crate::controller::{Control, Effect, ModeController, UserInputError};
use crate::markers::MarkerBoard;
use crate::registry::{EntityRegistry, DEFAULT_RESET_GRACE};
use crate::scene::Renderer;
use crate::EngineError;
use skylink_protocol::{ActorEntry, Inbound, Outbound, ServerConfig};
use std::time::Duration;
use tracing::{debug, info, warn};

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SessionOptions {
    pub seed: u64,
    /// How long state updates for ids swept by a reset are tolerated.
    pub reset_grace: Duration,
}

impl Default for SessionOptions {
    fn default() -> Self {
        Self {
            seed: 0,
            reset_grace: DEFAULT_RESET_GRACE,
        }
    }
}

/// Work the session cannot do itself and hands back to the runtime.
#[derive(Debug, Clone, PartialEq)]
pub enum Output {
    Send(Outbound),
    FetchActors,
}

/// One client's view of the link: the entity mirror, the markers, the mode.
///
/// Everything is driven from a single task; handlers run to completion one at
/// a time in arrival order.
pub struct Session<R: Renderer> {
    registry: EntityRegistry,
    markers: MarkerBoard,
    controller: ModeController,
    scene: R,
}

impl<R: Renderer> Session<R> {
    pub fn new(mut scene: R, options: SessionOptions) -> Self {
        let markers = MarkerBoard::new(&mut scene);
        Self {
            registry: EntityRegistry::new(options.reset_grace),
            markers,
            controller: ModeController::new(options.seed),
            scene,
        }
    }

    pub fn registry(&self) -> &EntityRegistry {
        &self.registry
    }

    pub fn markers(&self) -> &MarkerBoard {
        &self.markers
    }

    pub fn controller(&self) -> &ModeController {
        &self.controller
    }

    pub fn scene(&self) -> &R {
        &self.scene
    }

    pub fn into_scene(self) -> R {
        self.scene
    }

    /// Decodes and dispatches one text frame. Undecodable frames are dropped.
    pub fn handle_text(&mut self, text: &str) -> Result<(), EngineError> {
        match Inbound::parse(text) {
            Ok(msg) => self.handle(msg),
            Err(e) => {
                warn!(error = %e, "ignoring malformed message");
                Ok(())
            }
        }
    }

    pub fn handle(&mut self, msg: Inbound) -> Result<(), EngineError> {
        match msg {
            Inbound::AddDrone(add) => {
                let display = add.display_options.unwrap_or_default();
                self.registry
                    .add_or_replace(&mut self.scene, &add.id, add.origin, add.model, display);
            }
            Inbound::SetDroneState(update) => {
                self.registry
                    .update_state(&mut self.scene, &update.id, update.data)?;
            }
            Inbound::RemoveDrone(r) => self.registry.remove(&mut self.scene, &r.id),
            Inbound::Status(status) => self.controller.on_status(&status),
            Inbound::EvaluationStopped => self.controller.on_evaluation_stopped(),
            Inbound::Unknown { channel } => debug!(channel = %channel, "ignoring unknown channel"),
        }
        Ok(())
    }

    /// Applies a user control and returns what the runtime must do next.
    pub fn control(&mut self, control: Control) -> Result<Vec<Output>, UserInputError> {
        let effects = self.controller.apply(control)?;
        Ok(self.run_effects(effects))
    }

    fn run_effects(&mut self, effects: Vec<Effect>) -> Vec<Output> {
        let mut out = Vec::new();
        for effect in effects {
            match effect {
                Effect::Send(cmd) => out.push(Output::Send(cmd)),
                Effect::FetchActors => out.push(Output::FetchActors),
                Effect::ClearEntities => {
                    self.registry.reset(&mut self.scene);
                }
                Effect::ShowMarkers(mode) => {
                    self.markers.set_visibility(&mut self.scene, true);
                    self.markers.show_for_mode(&mut self.scene, mode);
                }
                Effect::HideMarkers => self.markers.set_visibility(&mut self.scene, false),
            }
        }
        out
    }

    pub fn on_config_loaded(&mut self, config: &ServerConfig) {
        if self.markers.load(&mut self.scene, config) {
            self.controller.set_legend_target(config.target_position);
        }
    }

    pub fn on_actors(&mut self, actors: Result<Vec<ActorEntry>, String>) {
        self.controller.on_actors(actors);
    }

    pub fn on_disconnect(&mut self, clean: bool) {
        info!(clean, drones = self.registry.len(), "link closed");
        self.controller.on_disconnect();
    }
}
