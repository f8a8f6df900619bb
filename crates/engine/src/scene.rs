//! The rendering collaborator seam.
//!
//! The engine only ever speaks four verbs to whatever draws the scene; it makes
//! no assumption about the graphics backend behind them.

use crate::markers::{MarkerId, MarkerSpec};
use serde_json::Value;
use std::collections::BTreeMap;
use tracing::{debug, trace, warn};

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum VisualId {
    Drone(String),
    /// Origin frame owned by the registry, correlated with its drone by id.
    Frame(String),
    Marker(MarkerId),
    MarkerGroup,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Visual {
    Drone {
        origin: [f64; 3],
        model: Value,
        show_imu_frame: bool,
        show_actions: bool,
    },
    OriginFrame {
        origin: [f64; 3],
        scale: f64,
        line_width: f64,
    },
    Marker(MarkerSpec),
}

pub trait Renderer {
    fn add_visual(&mut self, id: VisualId, visual: Visual);
    fn update_pose(&mut self, id: &VisualId, state: &Value);
    fn remove_visual(&mut self, id: &VisualId);
    fn set_visible(&mut self, id: &VisualId, visible: bool);
}

/// Quadrotor descriptor used when the server does not send one with `addDrone`.
pub fn default_model() -> Value {
    serde_json::json!({
        "kind": "quadrotor",
        "mass": 0.027,
        "arm_length": 0.028,
        "rotors": [
            {"position": [0.028, -0.028, 0.0], "spin": "ccw"},
            {"position": [-0.028, -0.028, 0.0], "spin": "cw"},
            {"position": [-0.028, 0.028, 0.0], "spin": "ccw"},
            {"position": [0.028, 0.028, 0.0], "spin": "cw"}
        ]
    })
}

#[derive(Debug, Clone, PartialEq)]
pub struct SceneNode {
    pub visual: Visual,
    pub pose: Option<Value>,
    pub visible: bool,
}

/// In-memory [`Renderer`] that just keeps the live visual set.
///
/// Used by the command-line client (which has no screen) and by tests.
#[derive(Debug, Clone)]
pub struct HeadlessScene {
    nodes: BTreeMap<VisualId, SceneNode>,
    marker_group_visible: bool,
}

impl Default for HeadlessScene {
    fn default() -> Self {
        Self::new()
    }
}

impl HeadlessScene {
    pub fn new() -> Self {
        Self {
            nodes: BTreeMap::new(),
            marker_group_visible: true,
        }
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn contains(&self, id: &VisualId) -> bool {
        self.nodes.contains_key(id)
    }

    pub fn get(&self, id: &VisualId) -> Option<&SceneNode> {
        self.nodes.get(id)
    }

    pub fn pose(&self, id: &VisualId) -> Option<&Value> {
        self.nodes.get(id).and_then(|n| n.pose.as_ref())
    }

    pub fn ids(&self) -> impl Iterator<Item = &VisualId> {
        self.nodes.keys()
    }

    pub fn marker_group_visible(&self) -> bool {
        self.marker_group_visible
    }

    /// Whether the node would actually be drawn: its own flag, and for markers
    /// also the group flag.
    pub fn is_shown(&self, id: &VisualId) -> bool {
        let Some(node) = self.nodes.get(id) else {
            return false;
        };
        match id {
            VisualId::Marker(_) => node.visible && self.marker_group_visible,
            _ => node.visible,
        }
    }
}

impl Renderer for HeadlessScene {
    fn add_visual(&mut self, id: VisualId, visual: Visual) {
        trace!(?id, "add visual");
        let node = SceneNode {
            visual,
            pose: None,
            visible: true,
        };
        if self.nodes.insert(id.clone(), node).is_some() {
            warn!(?id, "visual added twice; previous one dropped");
        }
    }

    fn update_pose(&mut self, id: &VisualId, state: &Value) {
        match self.nodes.get_mut(id) {
            Some(node) => node.pose = Some(state.clone()),
            None => debug!(?id, "pose update for missing visual"),
        }
    }

    fn remove_visual(&mut self, id: &VisualId) {
        trace!(?id, "remove visual");
        self.nodes.remove(id);
    }

    fn set_visible(&mut self, id: &VisualId, visible: bool) {
        if *id == VisualId::MarkerGroup {
            self.marker_group_visible = visible;
            return;
        }
        if let Some(node) = self.nodes.get_mut(id) {
            node.visible = visible;
        }
    }
}
