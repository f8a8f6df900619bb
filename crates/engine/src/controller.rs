//! High-level application mode and the controls that are legal in each mode.
//!
//! The controller never touches the registry or the marker board. Every
//! control yields a list of [`Effect`]s that the session carries out, in order.

use skylink_protocol::{ActorEntry, Outbound, Status, TrainingMode, Vec3};
use tracing::{info, warn};

#[derive(Debug, Clone, PartialEq)]
pub enum AppMode {
    Idle,
    Training(TrainingMode),
    /// Terminal: training reported `finished`.
    Finished,
    EvaluationSetup,
    Evaluating { actor: String },
}

/// User-facing controls, one per UI entry point.
#[derive(Debug, Clone, PartialEq)]
pub enum Control {
    SetSeed(u64),
    StartTraining(TrainingMode),
    OpenEvaluation,
    SelectActor(String),
    RestartEvaluation,
    StopEvaluation,
    ExitEvaluation,
}

impl Control {
    pub fn name(&self) -> &'static str {
        match self {
            Self::SetSeed(_) => "set-seed",
            Self::StartTraining(TrainingMode::Hover) => "start-hover",
            Self::StartTraining(TrainingMode::PositionToPosition) => "start-position-to-position",
            Self::OpenEvaluation => "open-evaluation",
            Self::SelectActor(_) => "select-actor",
            Self::RestartEvaluation => "restart-evaluation",
            Self::StopEvaluation => "stop-evaluation",
            Self::ExitEvaluation => "exit-evaluation",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Effect {
    Send(Outbound),
    /// Drop every mirrored drone before the server repopulates them.
    ClearEntities,
    ShowMarkers(Option<TrainingMode>),
    HideMarkers,
    FetchActors,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum UserInputError {
    #[error("Please select an actor first")]
    NoActorSelected,
    #[error("Unknown actor `{0}`")]
    UnknownActor(String),
    #[error("No evaluation is running")]
    NotEvaluating,
    #[error("`{control}` is not available right now")]
    ControlDisabled { control: &'static str },
}

#[derive(Debug, Clone, PartialEq, Default)]
pub enum ActorOptions {
    #[default]
    NotLoaded,
    Loading,
    Failed,
    Available(Vec<ActorEntry>),
}

impl ActorOptions {
    pub fn placeholder(&self) -> &'static str {
        match self {
            Self::NotLoaded | Self::Loading => "Loading actors...",
            Self::Failed => "Error loading actors",
            Self::Available(list) if list.is_empty() => "No actors available",
            Self::Available(_) => "Select an actor...",
        }
    }

    pub fn find(&self, path: &str) -> Option<&ActorEntry> {
        match self {
            Self::Available(list) => list.iter().find(|a| a.path == path),
            _ => None,
        }
    }
}

/// What the user currently sees, minus the 3-D scene.
#[derive(Debug, Clone, PartialEq)]
pub struct View {
    pub controls_visible: bool,
    pub start_hover_enabled: bool,
    pub start_position_enabled: bool,
    pub open_evaluation_enabled: bool,
    pub seed_input_visible: bool,
    pub evaluation_panel_visible: bool,
    pub legend_visible: bool,
    pub legend_target: Option<String>,
    pub progress_text: Option<String>,
    pub elapsed_secs: Option<f64>,
    pub evaluation_info: Option<String>,
    pub actor_options: ActorOptions,
    pub selected_actor: Option<String>,
    pub canvas_visible: bool,
    pub result_text: Option<String>,
    pub prompt: Option<String>,
}

impl Default for View {
    fn default() -> Self {
        Self {
            controls_visible: true,
            start_hover_enabled: true,
            start_position_enabled: true,
            open_evaluation_enabled: true,
            seed_input_visible: true,
            evaluation_panel_visible: false,
            legend_visible: false,
            legend_target: None,
            progress_text: None,
            elapsed_secs: None,
            evaluation_info: None,
            actor_options: ActorOptions::NotLoaded,
            selected_actor: None,
            canvas_visible: true,
            result_text: None,
            prompt: None,
        }
    }
}

#[derive(Debug)]
pub struct ModeController {
    mode: AppMode,
    seed: u64,
    finished: bool,
    view: View,
}

impl ModeController {
    pub fn new(seed: u64) -> Self {
        Self {
            mode: AppMode::Idle,
            seed,
            finished: false,
            view: View::default(),
        }
    }

    pub fn mode(&self) -> &AppMode {
        &self.mode
    }

    pub fn view(&self) -> &View {
        &self.view
    }

    pub fn seed(&self) -> u64 {
        self.seed
    }

    pub fn is_evaluating(&self) -> bool {
        matches!(self.mode, AppMode::Evaluating { .. })
    }

    fn in_evaluation_panel(&self) -> bool {
        matches!(
            self.mode,
            AppMode::EvaluationSetup | AppMode::Evaluating { .. }
        )
    }

    /// Runs a user control. On error nothing changes except the prompt.
    pub fn apply(&mut self, control: Control) -> Result<Vec<Effect>, UserInputError> {
        let name = control.name();
        match self.transition(control) {
            Ok(effects) => {
                self.view.prompt = None;
                info!(control = name, mode = ?self.mode, "control applied");
                Ok(effects)
            }
            Err(e) => {
                warn!(control = name, error = %e, "control rejected");
                self.view.prompt = Some(e.to_string());
                Err(e)
            }
        }
    }

    fn transition(&mut self, control: Control) -> Result<Vec<Effect>, UserInputError> {
        let disabled = UserInputError::ControlDisabled {
            control: control.name(),
        };
        match control {
            Control::SetSeed(seed) => {
                if self.mode != AppMode::Idle {
                    return Err(disabled);
                }
                self.seed = seed;
                Ok(Vec::new())
            }
            Control::StartTraining(mode) => {
                if self.mode != AppMode::Idle {
                    return Err(disabled);
                }
                self.mode = AppMode::Training(mode);
                self.view.seed_input_visible = false;
                self.view.start_hover_enabled = false;
                self.view.start_position_enabled = false;
                self.view.open_evaluation_enabled = false;
                self.view.legend_visible = true;
                Ok(vec![
                    Effect::ShowMarkers(Some(mode)),
                    Effect::Send(Outbound::start_training(self.seed, mode)),
                ])
            }
            Control::OpenEvaluation => {
                if self.mode != AppMode::Idle {
                    return Err(disabled);
                }
                self.mode = AppMode::EvaluationSetup;
                self.view.controls_visible = false;
                self.view.evaluation_panel_visible = true;
                self.view.actor_options = ActorOptions::Loading;
                self.view.legend_visible = true;
                Ok(vec![
                    Effect::FetchActors,
                    Effect::ShowMarkers(Some(TrainingMode::PositionToPosition)),
                ])
            }
            Control::SelectActor(path) => {
                if !self.in_evaluation_panel() {
                    return Err(disabled);
                }
                if path.is_empty() {
                    self.view.selected_actor = None;
                    return Ok(Vec::new());
                }
                if self.view.actor_options.find(&path).is_none() {
                    return Err(UserInputError::UnknownActor(path));
                }
                self.view.selected_actor = Some(path);
                Ok(Vec::new())
            }
            Control::RestartEvaluation => {
                if !self.in_evaluation_panel() {
                    return Err(disabled);
                }
                let Some(actor) = self.view.selected_actor.clone() else {
                    return Err(UserInputError::NoActorSelected);
                };
                self.view.evaluation_info =
                    Some(format!("Starting evaluation with actor: {actor}"));
                self.mode = AppMode::Evaluating {
                    actor: actor.clone(),
                };
                Ok(vec![
                    Effect::ClearEntities,
                    Effect::Send(Outbound::restart_evaluation(actor)),
                ])
            }
            Control::StopEvaluation => {
                if !self.is_evaluating() {
                    return Err(UserInputError::NotEvaluating);
                }
                self.mode = AppMode::EvaluationSetup;
                self.view.evaluation_info = None;
                Ok(vec![
                    Effect::Send(Outbound::stop_evaluation()),
                    Effect::ClearEntities,
                ])
            }
            Control::ExitEvaluation => {
                if !self.in_evaluation_panel() {
                    return Err(disabled);
                }
                let mut effects = Vec::new();
                if self.is_evaluating() {
                    effects.push(Effect::Send(Outbound::stop_evaluation()));
                    effects.push(Effect::ClearEntities);
                }
                effects.push(Effect::HideMarkers);
                self.mode = AppMode::Idle;
                self.view = View {
                    legend_target: self.view.legend_target.take(),
                    progress_text: self.view.progress_text.take(),
                    elapsed_secs: self.view.elapsed_secs,
                    ..View::default()
                };
                Ok(effects)
            }
        }
    }

    pub fn on_status(&mut self, status: &Status) {
        if self.is_evaluating() {
            self.view.evaluation_info = Some("Evaluating actor...".to_string());
            return;
        }
        let pct = (status.progress * 100.0).round();
        self.view.progress_text = Some(format!("Training progress: {pct}%"));
        self.view.elapsed_secs = status.time;
        if status.finished && !self.finished {
            self.finished = true;
            self.mode = AppMode::Finished;
            self.view.canvas_visible = false;
            self.view.controls_visible = false;
            self.view.result_text = Some("Finished".to_string());
            info!("training finished");
        }
    }

    pub fn on_evaluation_stopped(&mut self) {
        self.view.evaluation_info = None;
        if self.is_evaluating() {
            self.mode = AppMode::EvaluationSetup;
        }
    }

    pub fn on_actors(&mut self, actors: Result<Vec<ActorEntry>, String>) {
        if !self.in_evaluation_panel() {
            return;
        }
        self.view.actor_options = match actors {
            Ok(list) => ActorOptions::Available(list),
            Err(e) => {
                warn!(error = %e, "failed to load actors");
                ActorOptions::Failed
            }
        };
        let still_listed = self
            .view
            .selected_actor
            .as_deref()
            .is_some_and(|p| self.view.actor_options.find(p).is_some());
        if !still_listed {
            self.view.selected_actor = None;
        }
    }

    /// No further status will arrive for an evaluation once the link is gone.
    pub fn on_disconnect(&mut self) {
        if self.is_evaluating() {
            self.mode = AppMode::EvaluationSetup;
            self.view.evaluation_info = None;
        }
    }

    pub fn set_legend_target(&mut self, target: Vec3) {
        self.view.legend_target = Some(format!("({}, {}, {})", target.x, target.y, target.z));
    }
}
