//! Client-side core of the skylink training link.
//!
//! Everything here is synchronous and owned by a single [`Session`]: the
//! runtime feeds it inbound frames, config results and user controls, and gets
//! back the commands it has to send.

pub mod controller;
pub mod markers;
pub mod registry;
pub mod scene;
pub mod session;


pub use controller::{AppMode, Control, ModeController, UserInputError, View};
pub use markers::{MarkerBoard, MarkerRole, TargetKind};
pub use registry::{DroneEntity, EntityRegistry};
pub use scene::{HeadlessScene, Renderer, Visual, VisualId};
pub use session::{Output, Session, SessionOptions};

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum EngineError {
    /// The server updated a drone this client never saw. The mirror is out of
    /// sync and there is no local way to recover.
    #[error("state update for unknown entity `{0}`")]
    UnknownEntity(String),
}
