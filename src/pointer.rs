//! Pointer tracking.
//!
//! Raw pointer events may arrive at any rate. They only update the tracker's raw
//! sample. Once per simulated frame, [`PointerTracker::update`] derives the
//! per-frame velocity and the smoothed hover value, and returns a
//! [`PointerState`] snapshot. The kernels read only that snapshot.
//!
//! Hover is exponentially smoothed toward 1 while the pointer is over the
//! window and toward 0 after it leaves, so pointer forces fade in and out
//! instead of switching.

use glam::{Vec2, Vec3};

use crate::camera::Projector;
use crate::config::PointerConfig;

/// Where the pointer rests before the first event: far outside the field.
pub const OFFSCREEN: Vec3 = Vec3::new(-1000.0, -1000.0, 0.0);

/// Per-frame pointer snapshot consumed by the velocity kernel.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PointerState {
    /// World-space position on the `z = 0` plane.
    pub position: Vec3,
    /// Displacement since the previous frame.
    pub velocity: Vec3,
    /// Smoothed interaction intensity in `[0, 1]`.
    pub hover: f32,
}

impl PointerState {
    /// A pointer that exerts no force.
    pub fn idle() -> Self {
        Self {
            position: OFFSCREEN,
            velocity: Vec3::ZERO,
            hover: 0.0,
        }
    }

    #[inline]
    pub fn speed(&self) -> f32 {
        self.velocity.length()
    }
}

impl Default for PointerState {
    fn default() -> Self {
        Self::idle()
    }
}

/// Converts a pixel position to normalized device coordinates.
///
/// Origin is at center of window. X increases to the right, Y increases upward.
pub fn pixel_to_ndc(pixel: Vec2, viewport: (u32, u32)) -> Option<Vec2> {
    let (w, h) = viewport;
    if w == 0 || h == 0 {
        return None;
    }
    Some(Vec2::new(
        (pixel.x / w as f32) * 2.0 - 1.0,
        1.0 - (pixel.y / h as f32) * 2.0, // Y flipped
    ))
}

/// Tracks the pointer and produces one [`PointerState`] per frame.
#[derive(Debug)]
pub struct PointerTracker {
    config: PointerConfig,
    /// Latest event position, unsmoothed.
    raw: Vec3,
    /// Position reported to the kernels.
    current: Vec3,
    /// `current` as of the previous frame.
    previous: Vec3,
    hover: f32,
    hover_target: f32,
    /// Set when the next event should reset the velocity baseline.
    needs_snap: bool,
}

impl PointerTracker {
    pub fn new(config: PointerConfig) -> Self {
        Self {
            config,
            raw: OFFSCREEN,
            current: OFFSCREEN,
            previous: OFFSCREEN,
            hover: 0.0,
            hover_target: 0.0,
            needs_snap: true,
        }
    }

    /// Record a pointer move in physical pixels.
    pub fn on_pointer_move(
        &mut self,
        pixel: Vec2,
        viewport: (u32, u32),
        projector: &impl Projector,
    ) {
        let Some(ndc) = pixel_to_ndc(pixel, viewport) else {
            return;
        };
        if let Some(world) = projector.ndc_to_plane(ndc) {
            self.set_world_position(world);
        }
    }

    /// Record a pointer position already in world space.
    pub fn set_world_position(&mut self, world: Vec3) {
        self.raw = world;
        if self.needs_snap {
            // Entering from outside: no velocity spike from the stale position.
            self.current = world;
            self.previous = world;
            self.needs_snap = false;
        }
        self.hover_target = 1.0;
    }

    /// The pointer left the window.
    pub fn on_pointer_leave(&mut self) {
        self.hover_target = 0.0;
        self.needs_snap = true;
    }

    /// Advance one frame and return the snapshot for this frame's kernels.
    pub fn update(&mut self) -> PointerState {
        self.current += (self.raw - self.current) * self.config.position_smoothing;
        let velocity = self.current - self.previous;
        self.previous = self.current;

        self.hover += (self.hover_target - self.hover) * self.config.hover_rate;

        PointerState {
            position: self.current,
            velocity,
            hover: self.hover,
        }
    }

    /// Current smoothed hover value.
    #[inline]
    pub fn hover(&self) -> f32 {
        self.hover
    }
}

impl Default for PointerTracker {
    fn default() -> Self {
        Self::new(PointerConfig::default())
    }
}
