use crate::analyze::AnalyzeImageOutput;
use crate::draw::layers::{LayerId, LayerStack, Transform};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::time::Duration;

/// Horizontal bands of the scene, top to bottom.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SceneZone {
    Sky,
    Trees,
    GreenLand,
    Water,
}

impl SceneZone {
    pub const ALL: [SceneZone; 4] = [
        SceneZone::Sky,
        SceneZone::Trees,
        SceneZone::GreenLand,
        SceneZone::Water,
    ];

    pub fn height_percent(self) -> u32 {
        match self {
            SceneZone::Sky => 25,
            SceneZone::Trees => 30,
            SceneZone::GreenLand => 27,
            SceneZone::Water => 18,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            SceneZone::Sky => "Sky",
            SceneZone::Trees => "Trees",
            SceneZone::GreenLand => "Green Land",
            SceneZone::Water => "Water",
        }
    }

    /// Rows `[top, bottom)` the zone covers in a scene of `scene_height`.
    /// The water band always reaches the bottom edge.
    pub fn band(self, scene_height: u32) -> (u32, u32) {
        let mut top = 0;
        for zone in SceneZone::ALL {
            let bottom = if zone == SceneZone::Water {
                scene_height
            } else {
                top + scene_height * zone.height_percent() / 100
            };
            if zone == self {
                return (top, bottom);
            }
            top = bottom;
        }
        (top, scene_height)
    }
}

pub fn zone_at(y: f32, scene_height: u32) -> Option<SceneZone> {
    if !(0.0..scene_height as f32).contains(&y) {
        return None;
    }
    let row = y.floor() as u32;
    SceneZone::ALL.into_iter().find(|zone| {
        let (top, bottom) = zone.band(scene_height);
        row >= top && row < bottom
    })
}

/// Zones an analysed image fits into, in scene order.
pub fn zones_for_analysis(output: &AnalyzeImageOutput) -> Vec<SceneZone> {
    SceneZone::ALL
        .into_iter()
        .filter(|zone| match zone {
            SceneZone::Sky => output.has_sky,
            SceneZone::Trees => output.has_trees,
            SceneZone::GreenLand => output.has_green_land,
            SceneZone::Water => output.has_water,
        })
        .collect()
}

/// Leftward scroll of the repeating background after `elapsed`, in
/// `[0, background_width)`. One full width passes every `period`.
pub fn scroll_offset(elapsed: Duration, background_width: f32, period: Duration) -> f32 {
    if background_width <= 0.0 || period.is_zero() {
        return 0.0;
    }
    let phase = (elapsed.as_secs_f64() % period.as_secs_f64()) / period.as_secs_f64();
    (phase as f32 * background_width).rem_euclid(background_width)
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WanderSettings {
    pub enabled: bool,
    pub multiplier: f32,
    /// Largest nudge per tick along each axis at multiplier 1.
    pub max_step: f32,
}

impl Default for WanderSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            multiplier: 1.0,
            max_step: 4.0,
        }
    }
}

/// Periodic task that nudges placed layers around the scene.
///
/// Only transforms change; raster content and history are never touched.
pub struct Wanderer<R = StdRng> {
    settings: WanderSettings,
    paused: HashSet<LayerId>,
    rng: R,
}

impl Wanderer<StdRng> {
    pub fn new(settings: WanderSettings) -> Self {
        Self::with_rng(settings, StdRng::from_entropy())
    }
}

impl<R: Rng> Wanderer<R> {
    pub fn with_rng(settings: WanderSettings, rng: R) -> Self {
        Self {
            settings,
            paused: HashSet::new(),
            rng,
        }
    }

    pub fn settings(&self) -> WanderSettings {
        self.settings
    }

    pub fn set_enabled(&mut self, enabled: bool) {
        self.settings.enabled = enabled;
    }

    /// Non-positive or non-finite multipliers are ignored.
    pub fn set_multiplier(&mut self, multiplier: f32) -> bool {
        if !(multiplier.is_finite() && multiplier > 0.0) {
            tracing::warn!(multiplier, "ignoring invalid wander multiplier");
            return false;
        }
        self.settings.multiplier = multiplier;
        true
    }

    pub fn pause(&mut self, id: LayerId) {
        self.paused.insert(id);
    }

    pub fn resume(&mut self, id: LayerId) {
        self.paused.remove(&id);
    }

    pub fn is_paused(&self, id: LayerId) -> bool {
        self.paused.contains(&id)
    }

    /// Drops per-layer state for a deleted layer.
    pub fn forget(&mut self, id: LayerId) {
        self.paused.remove(&id);
    }

    /// One timer tick: every visible, unpaused layer moves by a random step
    /// and is kept at least partly inside the stack. Returns how many layers
    /// moved.
    pub fn tick(&mut self, stack: &mut LayerStack) -> usize {
        let step = self.settings.max_step * self.settings.multiplier;
        if !self.settings.enabled || !(step.is_finite() && step > 0.0) {
            return 0;
        }
        let (width, height) = stack.size();
        let targets: Vec<(LayerId, Transform, (u32, u32))> = stack
            .layers()
            .iter()
            .filter(|layer| layer.is_visible() && !self.paused.contains(&layer.id()))
            .map(|layer| (layer.id(), layer.transform(), layer.surface().size()))
            .collect();

        let mut moved = 0;
        for (id, transform, (layer_w, layer_h)) in targets {
            let dx = self.rng.gen_range(-step..=step);
            let dy = self.rng.gen_range(-step..=step);
            let mut next = transform.translated(dx, dy);
            next.x = keep_overlapping(next.x, layer_w as f32 * next.scale, width as f32);
            next.y = keep_overlapping(next.y, layer_h as f32 * next.scale, height as f32);
            if stack.set_transform(id, next).is_ok() {
                moved += 1;
            }
        }
        tracing::trace!(moved, "wander tick");
        moved
    }
}

/// Clamps a layer origin so at least one output pixel of the layer stays on
/// the canvas.
fn keep_overlapping(origin: f32, extent: f32, canvas: f32) -> f32 {
    let max = canvas - 1.0;
    let min = (1.0 - extent).min(max);
    origin.clamp(min, max)
}
