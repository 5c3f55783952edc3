//! Error types for the particle field.
//!
//! Three families exist: configuration errors caught by
//! [`SimConfig::validate`](crate::SimConfig::validate) before any GPU work,
//! GPU/resource errors raised while building the device and textures, and the
//! top-level [`SimulationError`] returned by [`Simulation::run`](crate::Simulation::run).

use std::fmt;

/// Errors that can occur during GPU initialization or readback.
#[derive(Debug)]
pub enum GpuError {
    /// Failed to create a surface for rendering.
    SurfaceCreation(wgpu::CreateSurfaceError),
    /// No compatible GPU adapter found.
    NoAdapter,
    /// The surface reports no usable texture format for this adapter.
    IncompatibleSurface,
    /// Failed to create GPU device.
    DeviceCreation(wgpu::RequestDeviceError),
    /// The state textures would exceed the device's 2D texture limit.
    TextureTooLarge { width: u32, height: u32, max: u32 },
    /// Failed to map buffer for reading.
    BufferMapping(String),
    /// The grid or rest records handed to the GPU backend were rejected.
    Config(ConfigError),
}

impl fmt::Display for GpuError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GpuError::SurfaceCreation(e) => write!(f, "Failed to create GPU surface: {}", e),
            GpuError::NoAdapter => write!(f, "No compatible GPU adapter found. Ensure your system has a GPU with WebGPU/Vulkan/Metal/DX12 support."),
            GpuError::IncompatibleSurface => {
                write!(f, "The window surface has no format supported by the adapter")
            }
            GpuError::DeviceCreation(e) => write!(f, "Failed to create GPU device: {}", e),
            GpuError::TextureTooLarge { width, height, max } => write!(
                f,
                "State textures of {}x{} exceed the device limit of {} texels per side",
                width, height, max
            ),
            GpuError::BufferMapping(msg) => write!(f, "Failed to map GPU buffer: {}", msg),
            GpuError::Config(e) => write!(f, "Invalid simulation state: {}", e),
        }
    }
}

impl std::error::Error for GpuError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            GpuError::SurfaceCreation(e) => Some(e),
            GpuError::DeviceCreation(e) => Some(e),
            GpuError::Config(e) => Some(e),
            _ => None,
        }
    }
}

impl From<ConfigError> for GpuError {
    fn from(e: ConfigError) -> Self {
        GpuError::Config(e)
    }
}

impl From<wgpu::CreateSurfaceError> for GpuError {
    fn from(e: wgpu::CreateSurfaceError) -> Self {
        GpuError::SurfaceCreation(e)
    }
}

impl From<wgpu::RequestDeviceError> for GpuError {
    fn from(e: wgpu::RequestDeviceError) -> Self {
        GpuError::DeviceCreation(e)
    }
}

/// Errors found while loading or validating a [`SimConfig`](crate::SimConfig).
#[derive(Debug)]
pub enum ConfigError {
    /// Grid dimensions are zero or larger than the supported maximum.
    InvalidGrid { width: u32, height: u32 },
    /// An explicit particle count does not match `width * height`.
    ParticleCountMismatch { expected: u32, actual: u32 },
    /// A parameter that must be non-negative was negative.
    Negative { name: &'static str, value: f32 },
    /// A parameter was NaN or infinite.
    NonFinite { name: &'static str },
    /// A parameter fell outside its allowed range.
    OutOfRange {
        name: &'static str,
        value: f32,
        min: f32,
        max: f32,
    },
    /// The home-return spring is too stiff to settle at this damping.
    UnstableSpring { stiffness: f32, limit: f32 },
    /// Failed to read or write the config file.
    Io(std::io::Error),
    /// The config file was not valid JSON for this schema.
    Parse(serde_json::Error),
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::InvalidGrid { width, height } => {
                write!(f, "Invalid particle grid {}x{}", width, height)
            }
            ConfigError::ParticleCountMismatch { expected, actual } => write!(
                f,
                "Particle count {} does not match grid size ({} cells)",
                actual, expected
            ),
            ConfigError::Negative { name, value } => {
                write!(f, "Parameter `{}` must not be negative (got {})", name, value)
            }
            ConfigError::NonFinite { name } => write!(f, "Parameter `{}` must be finite", name),
            ConfigError::OutOfRange {
                name,
                value,
                min,
                max,
            } => write!(
                f,
                "Parameter `{}` = {} is outside the allowed range [{}, {}]",
                name, value, min, max
            ),
            ConfigError::UnstableSpring { stiffness, limit } => write!(
                f,
                "Spring stiffness per unit mass {} must stay below {} at this damping",
                stiffness, limit
            ),
            ConfigError::Io(e) => write!(f, "Failed to access config file: {}", e),
            ConfigError::Parse(e) => write!(f, "Failed to parse config: {}", e),
        }
    }
}

impl std::error::Error for ConfigError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ConfigError::Io(e) => Some(e),
            ConfigError::Parse(e) => Some(e),
            _ => None,
        }
    }
}

impl From<std::io::Error> for ConfigError {
    fn from(e: std::io::Error) -> Self {
        ConfigError::Io(e)
    }
}

impl From<serde_json::Error> for ConfigError {
    fn from(e: serde_json::Error) -> Self {
        ConfigError::Parse(e)
    }
}

/// Errors that can occur when running a simulation.
#[derive(Debug)]
pub enum SimulationError {
    /// Failed to create event loop.
    EventLoop(winit::error::EventLoopError),
    /// Failed to create window.
    Window(winit::error::OsError),
    /// GPU initialization failed.
    Gpu(GpuError),
    /// The configuration was rejected.
    Config(ConfigError),
}

impl fmt::Display for SimulationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SimulationError::EventLoop(e) => write!(f, "Failed to create event loop: {}", e),
            SimulationError::Window(e) => write!(f, "Failed to create window: {}", e),
            SimulationError::Gpu(e) => write!(f, "GPU error: {}", e),
            SimulationError::Config(e) => write!(f, "Configuration error: {}", e),
        }
    }
}

impl std::error::Error for SimulationError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            SimulationError::EventLoop(e) => Some(e),
            SimulationError::Window(e) => Some(e),
            SimulationError::Gpu(e) => Some(e),
            SimulationError::Config(e) => Some(e),
        }
    }
}

impl From<winit::error::EventLoopError> for SimulationError {
    fn from(e: winit::error::EventLoopError) -> Self {
        SimulationError::EventLoop(e)
    }
}

impl From<winit::error::OsError> for SimulationError {
    fn from(e: winit::error::OsError) -> Self {
        SimulationError::Window(e)
    }
}

impl From<GpuError> for SimulationError {
    fn from(e: GpuError) -> Self {
        SimulationError::Gpu(e)
    }
}

impl From<ConfigError> for SimulationError {
    fn from(e: ConfigError) -> Self {
        SimulationError::Config(e)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::error::Error;

    #[test]
    fn test_config_error_display_names_parameter() {
        let err = ConfigError::Negative {
            name: "ring_radius",
            value: -1.0,
        };
        let msg = err.to_string();
        assert!(msg.contains("ring_radius"));
        assert!(msg.contains("-1"));
    }

    #[test]
    fn test_gpu_error_carries_record_mismatch() {
        let err: GpuError = crate::GridSize::square(4)
            .and_then(|grid| grid.check_records(3))
            .unwrap_err()
            .into();
        assert!(matches!(
            err,
            GpuError::Config(ConfigError::ParticleCountMismatch { .. })
        ));
        assert!(err.source().is_some());
        assert!(err.to_string().contains("does not match"));
    }

    #[test]
    fn test_simulation_error_wraps_config_source() {
        let err: SimulationError = ConfigError::InvalidGrid {
            width: 0,
            height: 4,
        }
        .into();
        assert!(err.source().is_some());
        assert!(err.to_string().contains("0x4"));
    }
}
