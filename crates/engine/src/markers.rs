//! Guidance markers: spawn zone, training targets and obstacle proxies.
//!
//! The board starts `Unloaded` with only the spawn markers, and becomes
//! `Loaded` exactly once, when the server configuration arrives. Which target
//! markers are shown depends on the training mode; everything else is always
//! shown once it exists.

use crate::scene::{Renderer, Visual, VisualId};
use skylink_protocol::{Obstacle, ServerConfig, TrainingMode, Vec3};
use std::collections::BTreeSet;
use tracing::{debug, info, warn};

pub const SPAWN_AREA_EDGE: f64 = 0.4;
pub const ORIGIN_MARKER_RADIUS: f64 = 0.02;
pub const TARGET_SPHERE_RADIUS: f64 = 0.05;
pub const LABEL_LIFT: f64 = 0.15;

pub const AGGRESSIVE_TARGET: Vec3 = Vec3 {
    x: 2.0,
    y: 0.0,
    z: 1.0,
};
pub const CONSERVATIVE_TARGET: Vec3 = Vec3 {
    x: 0.5,
    y: 0.5,
    z: 0.8,
};

const SPAWN_COLOR: u32 = 0x00ff00;
const OBSTACLE_COLOR: u32 = 0x8899aa;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct MarkerId(pub u32);

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum TargetKind {
    /// Target position served by `/config`.
    Basic,
    Aggressive,
    Conservative,
}

impl TargetKind {
    pub const ALL: [TargetKind; 3] = [Self::Basic, Self::Aggressive, Self::Conservative];

    pub fn label(self) -> &'static str {
        match self {
            Self::Basic => "BASIC TARGET",
            Self::Aggressive => "AGGRESSIVE TARGET",
            Self::Conservative => "CONSERVATIVE TARGET",
        }
    }

    pub fn color(self) -> u32 {
        match self {
            Self::Basic => 0xff0000,
            Self::Aggressive => 0xff6600,
            Self::Conservative => 0xff9999,
        }
    }

    /// Success radius drawn as a wire shell around the target.
    pub fn radius(self) -> f64 {
        match self {
            Self::Basic => 0.2,
            Self::Aggressive => 0.15,
            Self::Conservative => 0.3,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MarkerRole {
    Spawn,
    Target(TargetKind),
    Obstacle,
}

#[derive(Debug, Clone, PartialEq)]
pub enum MarkerShape {
    WireBox { edge: f64 },
    Sphere { radius: f64 },
    WireSphere { radius: f64 },
    Cylinder { radius: f64, height: f64 },
    Label { text: String },
}

#[derive(Debug, Clone, PartialEq)]
pub struct MarkerSpec {
    pub role: MarkerRole,
    pub shape: MarkerShape,
    pub anchor: [f64; 3],
    pub color: u32,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Marker {
    pub id: MarkerId,
    pub spec: MarkerSpec,
    pub visible: bool,
}

#[derive(Debug, Clone, PartialEq)]
struct Loaded {
    target: Vec3,
    obstacles: Vec<Obstacle>,
}

#[derive(Debug)]
pub struct MarkerBoard {
    markers: Vec<Marker>,
    loaded: Option<Loaded>,
    mode: Option<TrainingMode>,
    group_visible: bool,
    next_id: u32,
}

fn is_relevant(role: MarkerRole, mode: Option<TrainingMode>) -> bool {
    match role {
        MarkerRole::Spawn | MarkerRole::Obstacle => true,
        MarkerRole::Target(kind) => {
            mode == Some(TrainingMode::PositionToPosition) && kind == TargetKind::Basic
        }
    }
}

fn coords(p: [f64; 3]) -> String {
    format!("({}, {}, {})", p[0], p[1], p[2])
}

impl MarkerBoard {
    /// Builds the spawn markers. The marker group starts hidden.
    pub fn new(scene: &mut dyn Renderer) -> Self {
        let mut board = Self {
            markers: Vec::new(),
            loaded: None,
            mode: None,
            group_visible: false,
            next_id: 0,
        };
        let origin = [0.0; 3];
        board.push(
            scene,
            MarkerRole::Spawn,
            MarkerShape::WireBox {
                edge: SPAWN_AREA_EDGE,
            },
            origin,
            SPAWN_COLOR,
        );
        board.push(
            scene,
            MarkerRole::Spawn,
            MarkerShape::Sphere {
                radius: ORIGIN_MARKER_RADIUS,
            },
            origin,
            SPAWN_COLOR,
        );
        board.push(
            scene,
            MarkerRole::Spawn,
            MarkerShape::Label {
                text: "SPAWN AREA\n(90% random ±0.2m, 10% at origin)".to_string(),
            },
            [0.0, -0.25, 0.0],
            SPAWN_COLOR,
        );
        scene.set_visible(&VisualId::MarkerGroup, false);
        board
    }

    fn push(
        &mut self,
        scene: &mut dyn Renderer,
        role: MarkerRole,
        shape: MarkerShape,
        anchor: [f64; 3],
        color: u32,
    ) {
        let id = MarkerId(self.next_id);
        self.next_id += 1;
        let spec = MarkerSpec {
            role,
            shape,
            anchor,
            color,
        };
        let visible = is_relevant(role, self.mode);
        scene.add_visual(VisualId::Marker(id), Visual::Marker(spec.clone()));
        scene.set_visible(&VisualId::Marker(id), visible);
        self.markers.push(Marker { id, spec, visible });
    }

    pub fn is_loaded(&self) -> bool {
        self.loaded.is_some()
    }

    pub fn target_position(&self) -> Option<Vec3> {
        self.loaded.as_ref().map(|l| l.target)
    }

    pub fn obstacles(&self) -> &[Obstacle] {
        self.loaded
            .as_ref()
            .map(|l| l.obstacles.as_slice())
            .unwrap_or(&[])
    }

    pub fn markers(&self) -> &[Marker] {
        &self.markers
    }

    pub fn mode(&self) -> Option<TrainingMode> {
        self.mode
    }

    pub fn group_visible(&self) -> bool {
        self.group_visible
    }

    /// Drawn = own flag and group flag.
    pub fn is_shown(&self, id: MarkerId) -> bool {
        self.group_visible
            && self
                .markers
                .iter()
                .any(|m| m.id == id && m.visible)
    }

    /// Target kinds that currently have at least one visible marker.
    pub fn visible_targets(&self) -> BTreeSet<TargetKind> {
        self.markers
            .iter()
            .filter(|m| m.visible)
            .filter_map(|m| match m.spec.role {
                MarkerRole::Target(kind) => Some(kind),
                _ => None,
            })
            .collect()
    }

    /// One-shot `Unloaded -> Loaded`. Returns false if already loaded.
    pub fn load(&mut self, scene: &mut dyn Renderer, config: &ServerConfig) -> bool {
        if self.loaded.is_some() {
            warn!("marker board already loaded; ignoring new configuration");
            return false;
        }
        let target = config.target_position;
        for kind in TargetKind::ALL {
            let pos = match kind {
                TargetKind::Basic => target,
                TargetKind::Aggressive => AGGRESSIVE_TARGET,
                TargetKind::Conservative => CONSERVATIVE_TARGET,
            }
            .to_array();
            let role = MarkerRole::Target(kind);
            self.push(
                scene,
                role,
                MarkerShape::Sphere {
                    radius: TARGET_SPHERE_RADIUS,
                },
                pos,
                kind.color(),
            );
            self.push(
                scene,
                role,
                MarkerShape::WireSphere {
                    radius: kind.radius(),
                },
                pos,
                kind.color(),
            );
            self.push(
                scene,
                role,
                MarkerShape::Label {
                    text: format!("{}\n{}", kind.label(), coords(pos)),
                },
                [pos[0], pos[1] + LABEL_LIFT, pos[2]],
                kind.color(),
            );
        }
        for obstacle in &config.obstacles {
            match obstacle {
                Obstacle::Cylinder(c) => self.push(
                    scene,
                    MarkerRole::Obstacle,
                    MarkerShape::Cylinder {
                        radius: c.radius,
                        height: c.z_max - c.z_min,
                    },
                    [c.x, c.y, (c.z_min + c.z_max) / 2.0],
                    OBSTACLE_COLOR,
                ),
            }
        }
        self.loaded = Some(Loaded {
            target,
            obstacles: config.obstacles.clone(),
        });
        info!(
            target_position = %coords(target.to_array()),
            obstacles = config.obstacles.len(),
            "markers loaded"
        );
        true
    }

    pub fn set_visibility(&mut self, scene: &mut dyn Renderer, visible: bool) {
        self.group_visible = visible;
        scene.set_visible(&VisualId::MarkerGroup, visible);
    }

    /// Applies the visibility policy for `mode`. Before the board is loaded
    /// the mode is remembered and applied by `load`.
    pub fn show_for_mode(&mut self, scene: &mut dyn Renderer, mode: Option<TrainingMode>) {
        self.mode = mode;
        if self.loaded.is_none() {
            warn!(
                mode = mode.map(TrainingMode::as_str).unwrap_or("none"),
                "target position not loaded yet; deferring marker visibility"
            );
            return;
        }
        for marker in &mut self.markers {
            let visible = is_relevant(marker.spec.role, mode);
            if marker.visible != visible {
                marker.visible = visible;
                scene.set_visible(&VisualId::Marker(marker.id), visible);
            }
        }
        debug!(visible_targets = ?self.visible_targets(), "marker visibility applied");
    }
}
