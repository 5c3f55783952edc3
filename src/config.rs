//! Simulation configuration.
//!
//! [`SimConfig`] collects every tunable parameter the simulation reads. It can be
//! serialized to JSON and loaded back, and missing sections fall back to their
//! defaults so partial files are accepted.
//!
//! ```ignore
//! let mut config = SimConfig::load("field.json")?;
//! config.forces.mode = ForceMode::Attract;
//! config.validate()?;
//! ```

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

use crate::error::ConfigError;
use crate::grid::GridSize;
use crate::kernels::{MAX_DAMPING, MIN_MASS};

/// How rest positions are laid out at startup.
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq)]
pub enum Distribution {
    /// Lattice cell centers plus bounded random jitter, spread over an
    /// `extent * aspect` by `extent` rectangle centered at the origin.
    Stratified {
        /// World-space height of the field.
        extent: f32,
        /// Width / height ratio of the field.
        aspect: f32,
        /// Jitter amplitude as a fraction of one lattice cell.
        jitter: f32,
    },
    /// Uniform angle, radius `U(0,1)^power * max_radius`. Dense core, sparse rim.
    Radial { max_radius: f32, power: f32 },
}

impl Default for Distribution {
    fn default() -> Self {
        Distribution::Stratified {
            extent: 30.0,
            aspect: 16.0 / 9.0,
            jitter: 0.8,
        }
    }
}

/// Shape of the pointer's influence region.
#[derive(Clone, Copy, Debug, Default, Serialize, Deserialize, PartialEq, Eq)]
pub enum InteractionModel {
    /// Annular band of influence centered on `ring_radius`.
    #[default]
    Ring,
    /// `1/distance` field scaled by pointer speed, with a boosted near field.
    Radial,
}

/// Direction of the pointer force. The two are exact sign inversions.
#[derive(Clone, Copy, Debug, Default, Serialize, Deserialize, PartialEq, Eq)]
pub enum ForceMode {
    /// Pull particles toward the pointer.
    Attract,
    /// Push particles away from the pointer.
    #[default]
    Repel,
}

impl ForceMode {
    /// +1 for repel, -1 for attract.
    #[inline]
    pub fn sign(self) -> f32 {
        match self {
            ForceMode::Attract => -1.0,
            ForceMode::Repel => 1.0,
        }
    }
}

/// Parameters of the velocity kernel.
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ForceConfig {
    pub mode: ForceMode,
    pub model: InteractionModel,
    /// Center of the ring band, and half the base radius of the radial field.
    pub ring_radius: f32,
    pub ring_width: f32,
    /// Exponent applied to the ring band weight. Below 1 widens, above 1 sharpens.
    pub ring_power: f32,
    /// Amplitude of the noise that roughens the ring's outer edge.
    pub edge_noise: f32,
    /// Pointer force multiplier.
    pub displacement: f32,
    /// Base spring constant pulling particles home.
    pub return_strength: f32,
    /// Extra spring constant scaled by each particle's variation scalar.
    pub return_jitter: f32,
    /// Per-frame velocity retention. Must be below 1.
    pub damping: f32,
    /// How far noise moves each particle's damping away from `damping`.
    pub damping_variance: f32,
    /// Hard velocity ceiling, in world units per frame.
    pub max_speed: f32,
    /// Noise-driven pseudo-mass spread around 1.
    pub mass_variance: f32,
    /// Spatial frequency of the variation noise over rest positions.
    pub noise_scale: f32,
    /// Temporal frequency of the variation noise. 0 keeps it frozen.
    pub noise_speed: f32,
    /// Noise-driven spread of the radial field's radius.
    pub radius_variance: f32,
    /// Exponent of the radial field's edge falloff.
    pub falloff_power: f32,
    /// Multiplier inside the radial field's speed-dependent inner radius.
    pub shockwave_boost: f32,
    /// Inner radius per unit of pointer speed.
    pub shockwave_speed_scale: f32,
}

impl Default for ForceConfig {
    fn default() -> Self {
        Self {
            mode: ForceMode::Repel,
            model: InteractionModel::Ring,
            ring_radius: 3.0,
            ring_width: 1.0,
            ring_power: 0.75,
            edge_noise: 0.2,
            displacement: 0.15,
            return_strength: 0.02,
            return_jitter: 0.02,
            damping: 0.9,
            damping_variance: 0.05,
            max_speed: 1.5,
            mass_variance: 0.5,
            noise_scale: 0.05,
            noise_speed: 0.0,
            radius_variance: 2.0,
            falloff_power: 4.0,
            shockwave_boost: 3.0,
            shockwave_speed_scale: 4.0,
        }
    }
}

/// Pointer tracker smoothing.
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct PointerConfig {
    /// Exponential rate at which hover approaches its target each frame.
    pub hover_rate: f32,
    /// Exponential rate at which the tracked position follows the raw pointer.
    /// 1.0 follows it exactly.
    pub position_smoothing: f32,
}

impl Default for PointerConfig {
    fn default() -> Self {
        Self {
            hover_rate: 0.1,
            position_smoothing: 1.0,
        }
    }
}

/// Point sprite appearance.
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct RenderConfig {
    pub point_size: f32,
    /// Color at rest.
    pub base_color: [f32; 3],
    /// Color at speed 1 and above.
    pub active_color: [f32; 3],
    pub background: [f32; 3],
    /// Upper bound on the window scale factor used for sizing points.
    pub max_pixel_ratio: f32,
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self {
            point_size: 1.8,
            base_color: [0.1, 0.5, 0.9],
            active_color: [0.4, 0.9, 1.0],
            background: [0.01, 0.01, 0.03],
            max_pixel_ratio: 2.0,
        }
    }
}

/// Fixed perspective camera looking at the origin down -Z.
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct CameraConfig {
    pub position: [f32; 3],
    pub fov_y_degrees: f32,
    pub near: f32,
    pub far: f32,
}

impl Default for CameraConfig {
    fn default() -> Self {
        Self {
            position: [0.0, 0.0, 45.0],
            fov_y_degrees: 35.0,
            near: 0.1,
            far: 1000.0,
        }
    }
}

/// Complete simulation configuration.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct SimConfig {
    pub grid: GridSize,
    /// Optional explicit particle count. Must equal `grid.width * grid.height`.
    pub particle_count: Option<u32>,
    /// Seed for the initial distribution. `None` picks one from the clock.
    pub seed: Option<u64>,
    pub distribution: Distribution,
    pub forces: ForceConfig,
    pub pointer: PointerConfig,
    pub render: RenderConfig,
    pub camera: CameraConfig,
}

impl Default for SimConfig {
    fn default() -> Self {
        Self {
            grid: GridSize::default(),
            particle_count: None,
            seed: None,
            distribution: Distribution::default(),
            forces: ForceConfig::default(),
            pointer: PointerConfig::default(),
            render: RenderConfig::default(),
            camera: CameraConfig::default(),
        }
    }
}

impl SimConfig {
    /// Save the configuration to a JSON file.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<(), ConfigError> {
        let json = serde_json::to_string_pretty(self)?;
        fs::write(path, json)?;
        Ok(())
    }

    /// Load a configuration from a JSON file and validate it.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let json = fs::read_to_string(path)?;
        Self::from_json(&json)
    }

    /// Parse and validate a configuration from a JSON string.
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        let config: SimConfig = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Reject configurations the simulation cannot run stably.
    ///
    /// Called before any GPU resource is created.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.grid.validate()?;
        if let Some(count) = self.particle_count {
            if count != self.grid.cell_count() {
                return Err(ConfigError::ParticleCountMismatch {
                    expected: self.grid.cell_count(),
                    actual: count,
                });
            }
        }

        match self.distribution {
            Distribution::Stratified {
                extent,
                aspect,
                jitter,
            } => {
                positive("extent", extent)?;
                positive("aspect", aspect)?;
                in_range("jitter", jitter, 0.0, 1.0)?;
            }
            Distribution::Radial { max_radius, power } => {
                positive("max_radius", max_radius)?;
                in_range("power", power, 1.0, 16.0)?;
            }
        }

        let f = &self.forces;
        non_negative("ring_radius", f.ring_radius)?;
        positive("ring_width", f.ring_width)?;
        positive("ring_power", f.ring_power)?;
        non_negative("edge_noise", f.edge_noise)?;
        non_negative("displacement", f.displacement)?;
        non_negative("return_strength", f.return_strength)?;
        non_negative("return_jitter", f.return_jitter)?;
        in_range("damping", f.damping, 0.0, 0.999)?;
        non_negative("damping_variance", f.damping_variance)?;
        positive("max_speed", f.max_speed)?;
        in_range("mass_variance", f.mass_variance, 0.0, 0.9)?;
        non_negative("noise_scale", f.noise_scale)?;
        non_negative("noise_speed", f.noise_speed)?;
        non_negative("radius_variance", f.radius_variance)?;
        positive("falloff_power", f.falloff_power)?;
        non_negative("shockwave_boost", f.shockwave_boost)?;
        non_negative("shockwave_speed_scale", f.shockwave_speed_scale)?;

        spring_is_stable(f)?;

        in_range("hover_rate", self.pointer.hover_rate, f32::EPSILON, 1.0)?;
        in_range(
            "position_smoothing",
            self.pointer.position_smoothing,
            f32::EPSILON,
            1.0,
        )?;

        non_negative("point_size", self.render.point_size)?;
        positive("max_pixel_ratio", self.render.max_pixel_ratio)?;
        for c in self
            .render
            .base_color
            .iter()
            .chain(&self.render.active_color)
            .chain(&self.render.background)
        {
            in_range("color", *c, 0.0, 1.0)?;
        }

        in_range("fov_y_degrees", self.camera.fov_y_degrees, 1.0, 179.0)?;
        positive("near", self.camera.near)?;
        in_range("far", self.camera.far, self.camera.near, f32::MAX)?;
        for c in self.camera.position {
            finite("camera.position", c)?;
        }

        Ok(())
    }
}

/// Largest `stiffness / mass` for which the damped spring still converges.
///
/// The velocity kernel updates `v' = d * (v - k x)` and then `x' = x + v'`.
/// Both eigenvalues stay inside the unit circle only while `d k < 2 (1 + d)`.
pub fn max_stable_stiffness(damping: f32) -> f32 {
    if damping <= 0.0 {
        return f32::INFINITY;
    }
    2.0 * (1.0 + damping) / damping
}

/// Checks the stiffest spring against the lightest mass at the highest damping.
fn spring_is_stable(f: &ForceConfig) -> Result<(), ConfigError> {
    let damping = (f.damping + f.damping_variance).min(MAX_DAMPING);
    let mass = (1.0 - f.mass_variance).max(MIN_MASS);
    let stiffness = (f.return_strength + f.return_jitter) / mass;
    let limit = max_stable_stiffness(damping);
    if stiffness >= limit {
        return Err(ConfigError::UnstableSpring { stiffness, limit });
    }
    Ok(())
}

fn finite(name: &'static str, value: f32) -> Result<(), ConfigError> {
    if value.is_finite() {
        Ok(())
    } else {
        Err(ConfigError::NonFinite { name })
    }
}

fn non_negative(name: &'static str, value: f32) -> Result<(), ConfigError> {
    finite(name, value)?;
    if value < 0.0 {
        return Err(ConfigError::Negative { name, value });
    }
    Ok(())
}

fn positive(name: &'static str, value: f32) -> Result<(), ConfigError> {
    non_negative(name, value)?;
    if value == 0.0 {
        return Err(ConfigError::OutOfRange {
            name,
            value,
            min: f32::MIN_POSITIVE,
            max: f32::MAX,
        });
    }
    Ok(())
}

fn in_range(name: &'static str, value: f32, min: f32, max: f32) -> Result<(), ConfigError> {
    finite(name, value)?;
    if value < min || value > max {
        return Err(ConfigError::OutOfRange {
            name,
            value,
            min,
            max,
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        SimConfig::default().validate().unwrap();
    }

    #[test]
    fn test_negative_radius_rejected() {
        let mut config = SimConfig::default();
        config.forces.ring_radius = -0.5;
        match config.validate() {
            Err(ConfigError::Negative { name, .. }) => assert_eq!(name, "ring_radius"),
            other => panic!("expected Negative error, got {:?}", other),
        }
    }

    #[test]
    fn test_stiff_spring_rejected() {
        let mut config = SimConfig::default();
        config.forces.return_strength = 5.0;
        config.forces.return_jitter = 0.0;
        config.forces.damping = 0.9;
        config.forces.damping_variance = 0.0;
        config.forces.mass_variance = 0.0;
        match config.validate() {
            Err(ConfigError::UnstableSpring { stiffness, limit }) => {
                assert_eq!(stiffness, 5.0);
                assert!((limit - 2.0 * 1.9 / 0.9).abs() < 1e-5);
            }
            other => panic!("expected UnstableSpring error, got {:?}", other),
        }

        config.forces.return_strength = 4.0;
        config.validate().unwrap();
    }

    #[test]
    fn test_spring_limit_uses_lightest_mass_and_highest_damping() {
        let mut config = SimConfig::default();
        config.forces.return_strength = 1.0;
        config.forces.return_jitter = 0.0;
        config.forces.damping = 0.9;
        config.forces.damping_variance = 0.0;
        config.forces.mass_variance = 0.0;
        config.validate().unwrap();

        // Lightest mass 0.2 makes the effective stiffness 5.
        config.forces.mass_variance = 0.8;
        assert!(matches!(
            config.validate(),
            Err(ConfigError::UnstableSpring { .. })
        ));
    }

    #[test]
    fn test_damping_must_stay_below_one() {
        let mut config = SimConfig::default();
        config.forces.damping = 1.0;
        assert!(matches!(
            config.validate(),
            Err(ConfigError::OutOfRange { name: "damping", .. })
        ));
    }

    #[test]
    fn test_particle_count_must_match_grid() {
        let mut config = SimConfig {
            grid: GridSize::SMALL,
            ..Default::default()
        };
        config.particle_count = Some(65_536);
        assert!(matches!(
            config.validate(),
            Err(ConfigError::ParticleCountMismatch {
                expected: 16_384,
                actual: 65_536
            })
        ));
        config.particle_count = Some(16_384);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_nan_rejected() {
        let mut config = SimConfig::default();
        config.forces.max_speed = f32::NAN;
        assert!(matches!(
            config.validate(),
            Err(ConfigError::NonFinite { name: "max_speed" })
        ));
    }

    #[test]
    fn test_partial_json_uses_defaults() {
        let config = SimConfig::from_json(
            r#"{ "grid": { "width": 128, "height": 128 }, "forces": { "mode": "Attract" } }"#,
        )
        .unwrap();
        assert_eq!(config.grid, GridSize::SMALL);
        assert_eq!(config.forces.mode, ForceMode::Attract);
        assert_eq!(config.forces.damping, ForceConfig::default().damping);
        assert_eq!(config.pointer, PointerConfig::default());
    }

    #[test]
    fn test_invalid_json_reports_parse_error() {
        assert!(matches!(
            SimConfig::from_json("{ not json"),
            Err(ConfigError::Parse(_))
        ));
    }

    #[test]
    fn test_radial_distribution_power_checked() {
        let config = SimConfig {
            distribution: Distribution::Radial {
                max_radius: 10.0,
                power: 0.5,
            },
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }
}
