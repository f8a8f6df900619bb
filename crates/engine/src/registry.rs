use crate::scene::{default_model, Renderer, Visual, VisualId};
use crate::EngineError;
use serde_json::Value;
use skylink_protocol::DisplayOptions;
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::time::{Duration, Instant};
use tracing::debug;

pub const DEFAULT_RESET_GRACE: Duration = Duration::from_secs(2);

const FRAME_SCALE: f64 = 1.0;
const FRAME_LINE_WIDTH: f64 = 0.01;

#[derive(Debug, Clone, PartialEq)]
pub struct DroneEntity {
    pub id: String,
    pub origin: [f64; 3],
    pub model: Value,
    pub display: DisplayOptions,
    /// Last pose blob received, verbatim.
    pub state: Option<Value>,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct OriginFrame {
    pub origin: [f64; 3],
}

/// Local mirror of the server's drones. Sole owner of drone and frame visuals.
#[derive(Debug)]
pub struct EntityRegistry {
    drones: BTreeMap<String, DroneEntity>,
    frames: BTreeMap<String, OriginFrame>,
    // Ids swept by `reset`, with the sweep time.
    tombstones: HashMap<String, Instant>,
    grace: Duration,
}

impl Default for EntityRegistry {
    fn default() -> Self {
        Self::new(DEFAULT_RESET_GRACE)
    }
}

impl EntityRegistry {
    pub fn new(grace: Duration) -> Self {
        Self {
            drones: BTreeMap::new(),
            frames: BTreeMap::new(),
            tombstones: HashMap::new(),
            grace,
        }
    }

    pub fn len(&self) -> usize {
        self.drones.len()
    }

    pub fn is_empty(&self) -> bool {
        self.drones.is_empty()
    }

    pub fn contains(&self, id: &str) -> bool {
        self.drones.contains_key(id)
    }

    pub fn get(&self, id: &str) -> Option<&DroneEntity> {
        self.drones.get(id)
    }

    pub fn has_frame(&self, id: &str) -> bool {
        self.frames.contains_key(id)
    }

    pub fn frame(&self, id: &str) -> Option<&OriginFrame> {
        self.frames.get(id)
    }

    pub fn ids(&self) -> Vec<String> {
        self.drones.keys().cloned().collect()
    }

    /// Inserts a drone, first fully removing any previous one with the same id.
    pub fn add_or_replace(
        &mut self,
        scene: &mut dyn Renderer,
        id: &str,
        origin: [f64; 3],
        model: Option<Value>,
        display: DisplayOptions,
    ) {
        if self.drones.contains_key(id) || self.frames.contains_key(id) {
            debug!(id, "replacing existing drone");
            self.remove(scene, id);
        }
        self.tombstones.remove(id);

        let model = model.unwrap_or_else(default_model);
        scene.add_visual(
            VisualId::Drone(id.to_string()),
            Visual::Drone {
                origin,
                model: model.clone(),
                show_imu_frame: display.display_imu_coordinate_system,
                show_actions: display.display_actions,
            },
        );
        self.drones.insert(
            id.to_string(),
            DroneEntity {
                id: id.to_string(),
                origin,
                model,
                display,
                state: None,
            },
        );

        if display.display_global_coordinate_system {
            scene.add_visual(
                VisualId::Frame(id.to_string()),
                Visual::OriginFrame {
                    origin,
                    scale: FRAME_SCALE,
                    line_width: FRAME_LINE_WIDTH,
                },
            );
            self.frames.insert(id.to_string(), OriginFrame { origin });
        }
        debug!(id, drones = self.drones.len(), "drone added");
    }

    /// Overwrites the pose of a known drone. Identity never changes here.
    pub fn update_state(
        &mut self,
        scene: &mut dyn Renderer,
        id: &str,
        state: Value,
    ) -> Result<(), EngineError> {
        let Some(drone) = self.drones.get_mut(id) else {
            if self.in_grace(id) {
                debug!(id, "dropping state for drone swept by a recent reset");
                return Ok(());
            }
            self.prune_tombstones(Instant::now());
            return Err(EngineError::UnknownEntity(id.to_string()));
        };
        scene.update_pose(&VisualId::Drone(id.to_string()), &state);
        drone.state = Some(state);
        Ok(())
    }

    /// Removes the drone and its frame. Absent ids are a no-op.
    pub fn remove(&mut self, scene: &mut dyn Renderer, id: &str) {
        if self.drones.remove(id).is_some() {
            scene.remove_visual(&VisualId::Drone(id.to_string()));
        }
        if self.frames.remove(id).is_some() {
            scene.remove_visual(&VisualId::Frame(id.to_string()));
        }
    }

    /// Removes everything, iterating over a snapshot of the current ids.
    pub fn remove_all(&mut self, scene: &mut dyn Renderer) -> Vec<String> {
        let snapshot: BTreeSet<String> = self
            .drones
            .keys()
            .chain(self.frames.keys())
            .cloned()
            .collect();
        for id in &snapshot {
            self.remove(scene, id);
        }
        snapshot.into_iter().collect()
    }

    /// `remove_all` for optimistic UI resets: late state updates for the swept
    /// ids are dropped quietly for the grace window instead of erroring.
    pub fn reset(&mut self, scene: &mut dyn Renderer) -> usize {
        let now = Instant::now();
        self.prune_tombstones(now);
        let swept = self.remove_all(scene);
        let n = swept.len();
        for id in swept {
            self.tombstones.insert(id, now);
        }
        debug!(swept = n, "registry reset");
        n
    }

    /// Ids still inside the grace window after a reset.
    pub fn tombstone_count(&self) -> usize {
        self.tombstones.len()
    }

    fn prune_tombstones(&mut self, now: Instant) {
        let grace = self.grace;
        self.tombstones
            .retain(|_, swept_at| now.duration_since(*swept_at) < grace);
    }

    fn in_grace(&self, id: &str) -> bool {
        self.tombstones
            .get(id)
            .is_some_and(|swept_at| swept_at.elapsed() < self.grace)
    }
}
