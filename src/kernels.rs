//! Per-cell force and integration kernels.
//!
//! These are the CPU reference versions of the two GPU passes in
//! [`shader`](crate::shader). Each function handles one cell and does the same
//! arithmetic, in the same order, as its WGSL counterpart. The CPU backend
//! ([`CpuSimulation`](crate::CpuSimulation)) maps them over the grid.
//!
//! # Velocity kernel order
//!
//! 1. Variation noise from the rest position → pseudo-mass and damping offset
//! 2. Home-return spring
//! 3. Pointer field (ring band or radial), scaled by hover
//! 4. Damping
//! 5. Speed clamp

use glam::{Vec2, Vec3, Vec3Swizzles, Vec4, Vec4Swizzles};

use crate::config::{ForceConfig, InteractionModel};
use crate::noise::simplex3;
use crate::pointer::PointerState;

/// The pointer field is skipped below this hover value.
pub const HOVER_EPSILON: f32 = 1e-3;
/// The radial field ignores pointers slower than this (world units per frame).
pub const SPEED_EPSILON: f32 = 0.01;
/// Lower bound on distances used as divisors.
pub const MIN_DISTANCE: f32 = 1e-3;
/// Lower bound on pseudo-mass.
pub const MIN_MASS: f32 = 0.1;
/// Upper bound on effective damping, so velocity always decays.
pub const MAX_DAMPING: f32 = 0.999;
/// Spatial frequency of the ring-edge noise.
pub const EDGE_NOISE_FREQUENCY: f32 = 0.2;
/// Offset decorrelating the ring-edge noise from the variation noise.
pub const EDGE_NOISE_OFFSET: Vec2 = Vec2::new(18.4924, 72.9744);
/// Temporal frequency of the ring-edge noise.
pub const EDGE_NOISE_SPEED: f32 = 0.5;

/// Hermite smoothstep, matching WGSL for `low < high`.
#[inline]
pub fn smoothstep(low: f32, high: f32, x: f32) -> f32 {
    let t = ((x - low) / (high - low)).clamp(0.0, 1.0);
    t * t * (3.0 - 2.0 * t)
}

/// Per-particle variation sample for a rest position at `time`.
#[inline]
pub fn variation_noise(rest: Vec3, time: f32, params: &ForceConfig) -> f32 {
    simplex3((rest.xy() * params.noise_scale).extend(time * params.noise_speed))
}

/// Weight of the ring band at distance `d` (inner edge) and `d_edge` (noisy outer edge).
#[inline]
pub fn ring_weight(d: f32, d_edge: f32, radius: f32, width: f32) -> f32 {
    let rise = smoothstep(radius - width * 2.0, radius, d);
    let fall = smoothstep(radius, radius + width * 0.5, d_edge);
    (rise - fall).max(0.0)
}

/// Pointer force on a particle at `pos`, before mass, sign and hover.
///
/// Always points away from the pointer, or is zero.
pub fn pointer_force(
    pos: Vec3,
    noise: f32,
    pointer: &PointerState,
    time: f32,
    params: &ForceConfig,
) -> Vec3 {
    let offset = pos.xy() - pointer.position.xy();
    let d = offset.length();
    let dir = if d > MIN_DISTANCE {
        offset / d
    } else {
        Vec2::ZERO
    };

    let magnitude = match params.model {
        InteractionModel::Ring => {
            let edge = simplex3(
                (pos.xy() * EDGE_NOISE_FREQUENCY + EDGE_NOISE_OFFSET).extend(time * EDGE_NOISE_SPEED),
            );
            let d_edge = (pos.xy() + Vec2::splat(edge * params.edge_noise) - pointer.position.xy())
                .length();
            let w = ring_weight(d, d_edge, params.ring_radius, params.ring_width);
            if w > 0.0 {
                w.powf(params.ring_power) * params.displacement
            } else {
                0.0
            }
        }
        InteractionModel::Radial => {
            let speed = pointer.speed();
            let local_radius = (params.ring_radius * 2.0 + noise * params.radius_variance).max(0.0);
            if d < local_radius && speed > SPEED_EPSILON {
                let falloff = (1.0 - smoothstep(0.0, local_radius, d)).powf(params.falloff_power);
                let mut magnitude = params.displacement * speed * falloff / d.max(MIN_DISTANCE);
                let inner = (speed * params.shockwave_speed_scale).min(local_radius);
                if d < inner {
                    magnitude *= params.shockwave_boost;
                }
                magnitude
            } else {
                0.0
            }
        }
    };

    (dir * magnitude).extend(0.0)
}

/// Rescale `vel` so its length does not exceed `max_speed`.
#[inline]
pub fn clamp_speed(vel: Vec3, max_speed: f32) -> Vec3 {
    if !vel.is_finite() {
        return Vec3::ZERO;
    }
    let speed = vel.length();
    if speed > max_speed {
        vel * (max_speed / speed)
    } else {
        vel
    }
}

/// Velocity kernel for one cell.
///
/// `pos` and `vel` come from the source buffers, `rest` is `(home, variation)`.
/// Returns the texel written to the velocity target.
pub fn velocity_kernel(
    pos: Vec4,
    vel: Vec4,
    rest: Vec4,
    pointer: &PointerState,
    time: f32,
    params: &ForceConfig,
) -> Vec4 {
    let pos = pos.xyz();
    let mut vel = vel.xyz();
    let home = rest.xyz();
    let variation = rest.w;

    let noise = variation_noise(home, time, params);
    let mass = (1.0 + noise * params.mass_variance).max(MIN_MASS);

    let stiffness = params.return_strength + variation * params.return_jitter;
    vel += (home - pos) * stiffness / mass;

    if pointer.hover >= HOVER_EPSILON {
        let force = pointer_force(pos, noise, pointer, time, params);
        vel += force * (params.mode.sign() * pointer.hover / mass);
    }

    let damping = (params.damping + noise * params.damping_variance).clamp(0.0, MAX_DAMPING);
    vel *= damping;

    clamp_speed(vel, params.max_speed).extend(0.0)
}

/// Integrator kernel for one cell: explicit Euler plus packed speed.
#[inline]
pub fn position_kernel(pos: Vec4, vel: Vec4) -> Vec4 {
    let vel = vel.xyz();
    (pos.xyz() + vel).extend(vel.length())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ForceMode;

    fn ring_params(radius: f32, width: f32) -> ForceConfig {
        ForceConfig {
            ring_radius: radius,
            ring_width: width,
            displacement: 1.0,
            ..Default::default()
        }
    }

    fn pointer_at_origin(hover: f32) -> PointerState {
        PointerState {
            position: Vec3::ZERO,
            velocity: Vec3::ZERO,
            hover,
        }
    }

    #[test]
    fn test_smoothstep_edges() {
        assert_eq!(smoothstep(0.0, 1.0, -1.0), 0.0);
        assert_eq!(smoothstep(0.0, 1.0, 2.0), 1.0);
        assert!((smoothstep(0.0, 1.0, 0.5) - 0.5).abs() < 1e-6);
    }

    #[test]
    fn test_ring_force_zero_outside_band() {
        let params = ring_params(0.5, 0.1);
        let pos = Vec3::new(1.0, 0.0, 0.0);
        let force = pointer_force(pos, 0.0, &pointer_at_origin(1.0), 0.0, &params);
        assert_eq!(force, Vec3::ZERO);
    }

    #[test]
    fn test_ring_force_points_away_when_band_covers_particle() {
        let params = ring_params(1.0, 2.0);
        let pos = Vec3::new(1.0, 0.0, 0.0);
        let force = pointer_force(pos, 0.0, &pointer_at_origin(1.0), 0.0, &params);
        assert!(force.x > 0.0);
        assert!(force.y.abs() < 1e-6);
        assert_eq!(force.z, 0.0);
    }

    #[test]
    fn test_ring_is_an_annulus() {
        let params = ForceConfig {
            edge_noise: 0.0,
            ..ring_params(3.0, 0.5)
        };
        let pointer = pointer_at_origin(1.0);
        let at = |d: f32| pointer_force(Vec3::new(d, 0.0, 0.0), 0.0, &pointer, 0.0, &params).x;
        // Inside the hole, on the band, beyond the band.
        assert_eq!(at(1.0), 0.0);
        assert!(at(3.0) > 0.5);
        assert_eq!(at(4.0), 0.0);
    }

    #[test]
    fn test_attract_is_exact_inverse_of_repel() {
        let mut params = ring_params(1.0, 2.0);
        let pos = Vec4::new(0.8, 0.6, 0.0, 0.0);
        let rest = pos.xyz().extend(0.3);
        let pointer = pointer_at_origin(1.0);

        params.mode = ForceMode::Repel;
        let repel = velocity_kernel(pos, Vec4::ZERO, rest, &pointer, 0.0, &params);
        params.mode = ForceMode::Attract;
        let attract = velocity_kernel(pos, Vec4::ZERO, rest, &pointer, 0.0, &params);

        assert!(repel.length() > 0.0);
        assert!((repel + attract).length() < 1e-6);
        // Repel points away from the pointer at the origin.
        assert!(repel.xyz().dot(pos.xyz()) > 0.0);
    }

    #[test]
    fn test_no_pointer_force_without_hover() {
        let params = ring_params(1.0, 2.0);
        let pos = Vec4::new(1.0, 0.0, 0.0, 0.0);
        let rest = pos.xyz().extend(0.5);
        let vel = velocity_kernel(pos, Vec4::ZERO, rest, &pointer_at_origin(0.0), 0.0, &params);
        assert_eq!(vel, Vec4::ZERO);
    }

    #[test]
    fn test_radial_needs_pointer_motion() {
        let params = ForceConfig {
            model: InteractionModel::Radial,
            displacement: 1.0,
            ..Default::default()
        };
        let pos = Vec3::new(1.0, 0.0, 0.0);
        let still = pointer_at_origin(1.0);
        assert_eq!(pointer_force(pos, 0.0, &still, 0.0, &params), Vec3::ZERO);

        let moving = PointerState {
            velocity: Vec3::new(0.0, 0.5, 0.0),
            ..still
        };
        let force = pointer_force(pos, 0.0, &moving, 0.0, &params);
        assert!(force.x > 0.0);
    }

    #[test]
    fn test_radial_shockwave_boost() {
        let params = ForceConfig {
            model: InteractionModel::Radial,
            displacement: 1.0,
            shockwave_boost: 3.0,
            shockwave_speed_scale: 4.0,
            ..Default::default()
        };
        let base = ForceConfig {
            shockwave_boost: 1.0,
            ..params
        };
        let moving = PointerState {
            position: Vec3::ZERO,
            velocity: Vec3::new(0.5, 0.0, 0.0),
            hover: 1.0,
        };
        // Inner radius is min(0.5 * 4, local radius) = 2, so d = 1 is boosted.
        let pos = Vec3::new(0.0, 1.0, 0.0);
        let boosted = pointer_force(pos, 0.0, &moving, 0.0, &params).length();
        let plain = pointer_force(pos, 0.0, &moving, 0.0, &base).length();
        assert!((boosted - plain * 3.0).abs() < 1e-5);
    }

    #[test]
    fn test_clamp_holds_at_zero_distance() {
        let params = ForceConfig {
            model: InteractionModel::Radial,
            displacement: 1e6,
            max_speed: 0.75,
            ..Default::default()
        };
        let pointer = PointerState {
            position: Vec3::new(2.0, 2.0, 0.0),
            velocity: Vec3::new(100.0, -80.0, 0.0),
            hover: 1.0,
        };
        for offset in [0.0, 1e-7, 1e-4, 0.01, 0.5] {
            let pos = Vec4::new(2.0 + offset, 2.0, 0.0, 0.0);
            let vel = velocity_kernel(pos, Vec4::new(50.0, 50.0, 50.0, 0.0), pos, &pointer, 0.0, &params);
            assert!(vel.is_finite());
            assert!(vel.xyz().length() <= 0.75 + 1e-5);
        }
    }

    #[test]
    fn test_clamp_speed_resets_non_finite() {
        assert_eq!(clamp_speed(Vec3::new(f32::NAN, 0.0, 0.0), 1.0), Vec3::ZERO);
        assert_eq!(clamp_speed(Vec3::new(0.3, 0.4, 0.0), 1.0), Vec3::new(0.3, 0.4, 0.0));
        let clamped = clamp_speed(Vec3::new(3.0, 4.0, 0.0), 1.0);
        assert!((clamped.length() - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_spring_pulls_toward_home() {
        let params = ForceConfig::default();
        let home = Vec3::new(1.0, 1.0, 0.0);
        let pos = Vec4::new(2.0, 1.0, 0.0, 0.0);
        let vel = velocity_kernel(pos, Vec4::ZERO, home.extend(0.5), &PointerState::idle(), 0.0, &params);
        assert!(vel.x < 0.0);
        assert!(vel.y.abs() < 1e-6);
    }

    #[test]
    fn test_position_kernel_packs_speed() {
        let next = position_kernel(Vec4::new(1.0, 2.0, 3.0, 0.0), Vec4::new(0.3, 0.0, 0.4, 1.0));
        assert!((next.xyz() - Vec3::new(1.3, 2.0, 3.4)).length() < 1e-6);
        assert!((next.w - 0.5).abs() < 1e-6);
    }

    #[test]
    fn test_position_kernel_idempotent_at_zero_velocity() {
        let pos = Vec4::new(-4.0, 7.5, 0.25, 0.0);
        let once = position_kernel(pos, Vec4::ZERO);
        let twice = position_kernel(once, Vec4::ZERO);
        assert_eq!(once, pos);
        assert_eq!(twice, pos);
    }
}
