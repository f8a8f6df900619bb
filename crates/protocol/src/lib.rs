//! Wire types shared by the skylink client and the training server.
//!
//! Every message on the live link is an [`Envelope`]: a channel name plus an
//! arbitrary JSON `data` object, sent as a JSON text frame in both directions.

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use tracing::warn;

#[cfg(test)]
mod tests;

pub mod channels {
    pub const ADD_DRONE: &str = "addDrone";
    pub const SET_DRONE_STATE: &str = "setDroneState";
    pub const REMOVE_DRONE: &str = "removeDrone";
    pub const STATUS: &str = "status";
    pub const EVALUATION_STOPPED: &str = "evaluationStopped";
    pub const START_TRAINING: &str = "startTraining";
    pub const EVALUATE_ACTOR: &str = "evaluateActor";
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Envelope {
    pub channel: String,
    #[serde(default)]
    pub data: Value,
}

#[derive(Debug, thiserror::Error)]
pub enum DecodeError {
    #[error("malformed envelope: {0}")]
    Envelope(#[source] serde_json::Error),
    #[error("malformed `{channel}` payload: {source}")]
    Payload {
        channel: String,
        #[source]
        source: serde_json::Error,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum TrainingMode {
    Hover,
    PositionToPosition,
}

impl TrainingMode {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Hover => "hover",
            Self::PositionToPosition => "position-to-position",
        }
    }
}

impl std::fmt::Display for TrainingMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DisplayOptions {
    #[serde(default = "default_true", deserialize_with = "null_as_false")]
    pub display_global_coordinate_system: bool,
    #[serde(
        default = "default_true",
        deserialize_with = "null_as_false",
        rename = "displayIMUCoordinateSystem"
    )]
    pub display_imu_coordinate_system: bool,
    #[serde(default = "default_true", deserialize_with = "null_as_false")]
    pub display_actions: bool,
}

fn default_true() -> bool {
    true
}

// A missing flag means on; an explicit null means off.
fn null_as_false<'de, D: Deserializer<'de>>(de: D) -> Result<bool, D::Error> {
    Ok(Option::<bool>::deserialize(de)?.unwrap_or(false))
}

impl Default for DisplayOptions {
    fn default() -> Self {
        Self {
            display_global_coordinate_system: true,
            display_imu_coordinate_system: true,
            display_actions: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AddDrone {
    pub id: String,
    #[serde(default)]
    pub origin: [f64; 3],
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub display_options: Option<DisplayOptions>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SetDroneState {
    pub id: String,
    /// Pose/telemetry blob. Opaque here; handed to the renderer as-is.
    #[serde(default)]
    pub data: Value,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EntityRef {
    pub id: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Status {
    #[serde(default)]
    pub progress: f64,
    #[serde(default)]
    pub finished: bool,
    /// Seconds since training started.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub time: Option<f64>,
}

/// Server → client messages, one variant per known channel.
#[derive(Debug, Clone, PartialEq)]
pub enum Inbound {
    AddDrone(AddDrone),
    SetDroneState(SetDroneState),
    RemoveDrone(EntityRef),
    Status(Status),
    EvaluationStopped,
    /// A channel this client does not know. Kept so callers can log it.
    Unknown { channel: String },
}

impl Inbound {
    pub fn parse(text: &str) -> Result<Self, DecodeError> {
        let envelope: Envelope = serde_json::from_str(text).map_err(DecodeError::Envelope)?;
        Self::from_envelope(envelope)
    }

    pub fn from_envelope(envelope: Envelope) -> Result<Self, DecodeError> {
        let Envelope { channel, data } = envelope;
        let decoded = match channel.as_str() {
            channels::ADD_DRONE => serde_json::from_value(data).map(Inbound::AddDrone),
            channels::SET_DRONE_STATE => serde_json::from_value(data).map(Inbound::SetDroneState),
            channels::REMOVE_DRONE => serde_json::from_value(data).map(Inbound::RemoveDrone),
            channels::STATUS => serde_json::from_value(data).map(Inbound::Status),
            channels::EVALUATION_STOPPED => Ok(Inbound::EvaluationStopped),
            _ => {
                return Ok(Inbound::Unknown {
                    channel: channel.clone(),
                })
            }
        };
        decoded.map_err(|source| DecodeError::Payload { channel, source })
    }

    pub fn channel(&self) -> &str {
        match self {
            Self::AddDrone(_) => channels::ADD_DRONE,
            Self::SetDroneState(_) => channels::SET_DRONE_STATE,
            Self::RemoveDrone(_) => channels::REMOVE_DRONE,
            Self::Status(_) => channels::STATUS,
            Self::EvaluationStopped => channels::EVALUATION_STOPPED,
            Self::Unknown { channel } => channel,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EvalAction {
    Restart,
    Stop,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StartTraining {
    pub seed: u64,
    pub mode: TrainingMode,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvaluateActor {
    #[serde(
        default,
        rename = "actorPath",
        skip_serializing_if = "Option::is_none"
    )]
    pub actor_path: Option<String>,
    pub action: EvalAction,
}

/// Client → server commands. Fire-and-forget: effects show up later as
/// unsolicited inbound messages.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "channel", content = "data", rename_all = "camelCase")]
pub enum Outbound {
    StartTraining(StartTraining),
    EvaluateActor(EvaluateActor),
}

impl Outbound {
    pub fn start_training(seed: u64, mode: TrainingMode) -> Self {
        Self::StartTraining(StartTraining { seed, mode })
    }

    pub fn restart_evaluation(actor_path: impl Into<String>) -> Self {
        Self::EvaluateActor(EvaluateActor {
            actor_path: Some(actor_path.into()),
            action: EvalAction::Restart,
        })
    }

    pub fn stop_evaluation() -> Self {
        Self::EvaluateActor(EvaluateActor {
            actor_path: None,
            action: EvalAction::Stop,
        })
    }

    pub fn channel(&self) -> &'static str {
        match self {
            Self::StartTraining(_) => channels::START_TRAINING,
            Self::EvaluateActor(_) => channels::EVALUATE_ACTOR,
        }
    }

    pub fn to_text(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Vec3 {
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

impl Vec3 {
    pub const ZERO: Self = Self {
        x: 0.0,
        y: 0.0,
        z: 0.0,
    };

    pub fn new(x: f64, y: f64, z: f64) -> Self {
        Self { x, y, z }
    }

    pub fn to_array(self) -> [f64; 3] {
        [self.x, self.y, self.z]
    }
}

impl From<[f64; 3]> for Vec3 {
    fn from([x, y, z]: [f64; 3]) -> Self {
        Self { x, y, z }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Cylinder {
    pub x: f64,
    pub y: f64,
    pub z_min: f64,
    pub z_max: f64,
    pub radius: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum Obstacle {
    Cylinder(Cylinder),
}

/// Payload of `GET /config`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServerConfig {
    pub target_position: Vec3,
    #[serde(default, deserialize_with = "lenient_obstacles")]
    pub obstacles: Vec<Obstacle>,
}

impl ServerConfig {
    /// Used whenever `/config` is unreachable or unreadable.
    pub fn fallback() -> Self {
        Self {
            target_position: Vec3::ZERO,
            obstacles: Vec::new(),
        }
    }
}

// Unknown obstacle kinds are dropped one by one so a newer server does not
// take the whole config down with it.
fn lenient_obstacles<'de, D>(deserializer: D) -> Result<Vec<Obstacle>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw: Option<Vec<Value>> = Option::deserialize(deserializer)?;
    Ok(raw
        .unwrap_or_default()
        .into_iter()
        .enumerate()
        .filter_map(|(idx, v)| match serde_json::from_value::<Obstacle>(v) {
            Ok(o) => Some(o),
            Err(e) => {
                warn!(index = idx, error = %e, "skipping unsupported obstacle entry");
                None
            }
        })
        .collect())
}

/// One entry of `GET /actors`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActorEntry {
    pub name: String,
    pub path: String,
}
