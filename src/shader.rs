//! WGSL sources and the uniform blocks they read.
//!
//! The kernels are generated with `format!` so the numeric constants shared with
//! [`kernels`](crate::kernels) are injected from one place. Each kernel is a
//! separate module with a `main` compute entry point dispatched over 2D
//! workgroups, one invocation per grid cell.
//!
//! Bindings:
//!
//! | kernel   | 0        | 1               | 2               | 3    | 4                  |
//! |----------|----------|-----------------|-----------------|------|--------------------|
//! | velocity | uniforms | position source | velocity source | rest | velocity target    |
//! | position | position source | velocity target (read) | position target | | |
//! | render   | uniforms | position target | | | |

use bytemuck::{Pod, Zeroable};
use glam::Mat4;

use crate::config::{ForceConfig, InteractionModel, RenderConfig};
use crate::kernels::{
    EDGE_NOISE_FREQUENCY, EDGE_NOISE_OFFSET, EDGE_NOISE_SPEED, HOVER_EPSILON, MAX_DAMPING,
    MIN_DISTANCE, MIN_MASS, SPEED_EPSILON,
};
use crate::noise::SIMPLEX_WGSL;
use crate::pointer::PointerState;

/// Side of the square compute workgroup.
pub const WORKGROUP_SIZE: u32 = 8;

/// Per-frame parameters of the velocity kernel.
#[repr(C)]
#[derive(Copy, Clone, Debug, Pod, Zeroable)]
pub struct SimUniforms {
    /// xyz position, w hover.
    pub pointer: [f32; 4],
    /// xyz per-frame velocity, w speed.
    pub pointer_velocity: [f32; 4],
    pub time: f32,
    pub mode_sign: f32,
    pub model: u32,
    pub ring_radius: f32,
    pub ring_width: f32,
    pub ring_power: f32,
    pub edge_noise: f32,
    pub displacement: f32,
    pub return_strength: f32,
    pub return_jitter: f32,
    pub damping: f32,
    pub damping_variance: f32,
    pub max_speed: f32,
    pub mass_variance: f32,
    pub noise_scale: f32,
    pub noise_speed: f32,
    pub radius_variance: f32,
    pub falloff_power: f32,
    pub shockwave_boost: f32,
    pub shockwave_speed_scale: f32,
}

impl SimUniforms {
    pub fn new(forces: &ForceConfig, pointer: &PointerState, time: f32) -> Self {
        Self {
            pointer: pointer.position.extend(pointer.hover).to_array(),
            pointer_velocity: pointer.velocity.extend(pointer.speed()).to_array(),
            time,
            mode_sign: forces.mode.sign(),
            model: match forces.model {
                InteractionModel::Ring => 0,
                InteractionModel::Radial => 1,
            },
            ring_radius: forces.ring_radius,
            ring_width: forces.ring_width,
            ring_power: forces.ring_power,
            edge_noise: forces.edge_noise,
            displacement: forces.displacement,
            return_strength: forces.return_strength,
            return_jitter: forces.return_jitter,
            damping: forces.damping,
            damping_variance: forces.damping_variance,
            max_speed: forces.max_speed,
            mass_variance: forces.mass_variance,
            noise_scale: forces.noise_scale,
            noise_speed: forces.noise_speed,
            radius_variance: forces.radius_variance,
            falloff_power: forces.falloff_power,
            shockwave_boost: forces.shockwave_boost,
            shockwave_speed_scale: forces.shockwave_speed_scale,
        }
    }
}

/// Per-frame parameters of the point renderer.
#[repr(C)]
#[derive(Copy, Clone, Debug, Pod, Zeroable)]
pub struct RenderUniforms {
    pub view_proj: [[f32; 4]; 4],
    pub base_color: [f32; 4],
    pub active_color: [f32; 4],
    /// Surface size in physical pixels.
    pub viewport: [f32; 2],
    pub point_size: f32,
    pub pixel_ratio: f32,
}

impl RenderUniforms {
    pub fn new(
        view_proj: Mat4,
        render: &RenderConfig,
        viewport: (u32, u32),
        scale_factor: f32,
    ) -> Self {
        let [br, bg, bb] = render.base_color;
        let [ar, ag, ab] = render.active_color;
        Self {
            view_proj: view_proj.to_cols_array_2d(),
            base_color: [br, bg, bb, 1.0],
            active_color: [ar, ag, ab, 1.0],
            viewport: [viewport.0.max(1) as f32, viewport.1.max(1) as f32],
            point_size: render.point_size,
            pixel_ratio: scale_factor.min(render.max_pixel_ratio),
        }
    }
}

/// Velocity kernel: spring, pointer field, variation, damping, clamp.
pub fn velocity_kernel_wgsl() -> String {
    format!(
        r#"{SIMPLEX_WGSL}

const HOVER_EPSILON: f32 = {HOVER_EPSILON:?};
const SPEED_EPSILON: f32 = {SPEED_EPSILON:?};
const MIN_DISTANCE: f32 = {MIN_DISTANCE:?};
const MIN_MASS: f32 = {MIN_MASS:?};
const MAX_DAMPING: f32 = {MAX_DAMPING:?};
const EDGE_NOISE_FREQUENCY: f32 = {EDGE_NOISE_FREQUENCY:?};
const EDGE_NOISE_OFFSET: vec2<f32> = vec2<f32>({edge_x:?}, {edge_y:?});
const EDGE_NOISE_SPEED: f32 = {EDGE_NOISE_SPEED:?};

struct SimUniforms {{
    pointer: vec4<f32>,
    pointer_velocity: vec4<f32>,
    time: f32,
    mode_sign: f32,
    model: u32,
    ring_radius: f32,
    ring_width: f32,
    ring_power: f32,
    edge_noise: f32,
    displacement: f32,
    return_strength: f32,
    return_jitter: f32,
    damping: f32,
    damping_variance: f32,
    max_speed: f32,
    mass_variance: f32,
    noise_scale: f32,
    noise_speed: f32,
    radius_variance: f32,
    falloff_power: f32,
    shockwave_boost: f32,
    shockwave_speed_scale: f32,
}};

@group(0) @binding(0)
var<uniform> u: SimUniforms;

@group(0) @binding(1)
var position_src: texture_2d<f32>;

@group(0) @binding(2)
var velocity_src: texture_2d<f32>;

@group(0) @binding(3)
var rest_tex: texture_2d<f32>;

@group(0) @binding(4)
var velocity_dst: texture_storage_2d<rgba32float, write>;

fn ring_magnitude(pos: vec2<f32>, pointer: vec2<f32>, d: f32) -> f32 {{
    let edge = simplex3(vec3<f32>(pos * EDGE_NOISE_FREQUENCY + EDGE_NOISE_OFFSET, u.time * EDGE_NOISE_SPEED));
    let d_edge = length(pos + vec2<f32>(edge * u.edge_noise) - pointer);
    let rise = smoothstep(u.ring_radius - u.ring_width * 2.0, u.ring_radius, d);
    let fall = smoothstep(u.ring_radius, u.ring_radius + u.ring_width * 0.5, d_edge);
    let w = max(rise - fall, 0.0);
    if w > 0.0 {{
        return pow(w, u.ring_power) * u.displacement;
    }}
    return 0.0;
}}

fn radial_magnitude(d: f32, noise: f32) -> f32 {{
    let speed = u.pointer_velocity.w;
    let local_radius = max(u.ring_radius * 2.0 + noise * u.radius_variance, 0.0);
    if d >= local_radius || speed <= SPEED_EPSILON {{
        return 0.0;
    }}
    let base = 1.0 - smoothstep(0.0, local_radius, d);
    var falloff = 0.0;
    if base > 0.0 {{
        falloff = pow(base, u.falloff_power);
    }}
    var magnitude = u.displacement * speed * falloff / max(d, MIN_DISTANCE);
    let inner = min(speed * u.shockwave_speed_scale, local_radius);
    if d < inner {{
        magnitude *= u.shockwave_boost;
    }}
    return magnitude;
}}

fn pointer_force(pos: vec3<f32>, noise: f32) -> vec3<f32> {{
    let offset = pos.xy - u.pointer.xy;
    let d = length(offset);
    var dir = vec2<f32>(0.0);
    if d > MIN_DISTANCE {{
        dir = offset / d;
    }}
    var magnitude = 0.0;
    if u.model == 0u {{
        magnitude = ring_magnitude(pos.xy, u.pointer.xy, d);
    }} else {{
        magnitude = radial_magnitude(d, noise);
    }}
    return vec3<f32>(dir * magnitude, 0.0);
}}

fn clamp_speed(v: vec3<f32>, max_speed: f32) -> vec3<f32> {{
    let speed = length(v);
    if speed <= max_speed {{
        return v;
    }}
    if speed > max_speed && speed < 3.0e38 {{
        return v * (max_speed / speed);
    }}
    // NaN or infinite.
    return vec3<f32>(0.0);
}}

@compute @workgroup_size({WORKGROUP_SIZE}, {WORKGROUP_SIZE})
fn main(@builtin(global_invocation_id) id: vec3<u32>) {{
    let dims = textureDimensions(position_src);
    if id.x >= dims.x || id.y >= dims.y {{
        return;
    }}
    let texel = vec2<i32>(id.xy);

    let pos = textureLoad(position_src, texel, 0).xyz;
    var vel = textureLoad(velocity_src, texel, 0).xyz;
    let rest = textureLoad(rest_tex, texel, 0);
    let home = rest.xyz;

    let noise = simplex3(vec3<f32>(home.xy * u.noise_scale, u.time * u.noise_speed));
    let mass = max(1.0 + noise * u.mass_variance, MIN_MASS);

    let stiffness = u.return_strength + rest.w * u.return_jitter;
    vel += (home - pos) * stiffness / mass;

    let hover = u.pointer.w;
    if hover >= HOVER_EPSILON {{
        vel += pointer_force(pos, noise) * (u.mode_sign * hover / mass);
    }}

    let damping = clamp(u.damping + noise * u.damping_variance, 0.0, MAX_DAMPING);
    vel *= damping;

    textureStore(velocity_dst, texel, vec4<f32>(clamp_speed(vel, u.max_speed), 0.0));
}}
"#,
        edge_x = EDGE_NOISE_OFFSET.x,
        edge_y = EDGE_NOISE_OFFSET.y,
    )
}

/// Integrator: `(pos + vel, |vel|)`.
pub fn position_kernel_wgsl() -> String {
    format!(
        r#"@group(0) @binding(0)
var position_src: texture_2d<f32>;

@group(0) @binding(1)
var velocity_new: texture_2d<f32>;

@group(0) @binding(2)
var position_dst: texture_storage_2d<rgba32float, write>;

@compute @workgroup_size({WORKGROUP_SIZE}, {WORKGROUP_SIZE})
fn main(@builtin(global_invocation_id) id: vec3<u32>) {{
    let dims = textureDimensions(position_src);
    if id.x >= dims.x || id.y >= dims.y {{
        return;
    }}
    let texel = vec2<i32>(id.xy);

    let pos = textureLoad(position_src, texel, 0).xyz;
    let vel = textureLoad(velocity_new, texel, 0).xyz;

    textureStore(position_dst, texel, vec4<f32>(pos + vel, length(vel)));
}}
"#
    )
}

/// Point sprites: one instanced quad per reference UV.
pub fn render_shader_wgsl() -> String {
    r#"struct RenderUniforms {
    view_proj: mat4x4<f32>,
    base_color: vec4<f32>,
    active_color: vec4<f32>,
    viewport: vec2<f32>,
    point_size: f32,
    pixel_ratio: f32,
};

@group(0) @binding(0)
var<uniform> uniforms: RenderUniforms;

@group(0) @binding(1)
var positions: texture_2d<f32>;

struct VertexOutput {
    @builtin(position) clip_position: vec4<f32>,
    @location(0) color: vec3<f32>,
    @location(1) uv: vec2<f32>,
    @location(2) alpha: f32,
};

@vertex
fn vs_main(
    @builtin(vertex_index) vertex_index: u32,
    @location(0) reference_uv: vec2<f32>,
) -> VertexOutput {
    var quad_vertices = array<vec2<f32>, 6>(
        vec2<f32>(-1.0, -1.0),
        vec2<f32>( 1.0, -1.0),
        vec2<f32>(-1.0,  1.0),
        vec2<f32>(-1.0,  1.0),
        vec2<f32>( 1.0, -1.0),
        vec2<f32>( 1.0,  1.0),
    );

    let dims = textureDimensions(positions);
    let cell = min(vec2<u32>(floor(reference_uv * vec2<f32>(dims))), dims - vec2<u32>(1u));
    let state = textureLoad(positions, vec2<i32>(cell), 0);
    let speed = state.w;
    let t = clamp(speed, 0.0, 1.0);

    var clip = uniforms.view_proj * vec4<f32>(state.xyz, 1.0);
    let depth = max(clip.w, 1e-3);
    let size = uniforms.point_size * (1.0 + 2.0 * speed) * (100.0 / depth) * uniforms.pixel_ratio;

    let quad = quad_vertices[vertex_index];
    clip.x += quad.x * size / uniforms.viewport.x * clip.w;
    clip.y += quad.y * size / uniforms.viewport.y * clip.w;

    var out: VertexOutput;
    out.clip_position = clip;
    out.color = mix(uniforms.base_color.rgb, uniforms.active_color.rgb, t);
    out.uv = quad;
    out.alpha = 0.6 + 0.4 * t;
    return out;
}

@fragment
fn fs_main(in: VertexOutput) -> @location(0) vec4<f32> {
    let r = length(in.uv);
    if r > 1.0 {
        discard;
    }
    let a = in.alpha * (1.0 - smoothstep(0.5, 1.0, r));
    return vec4<f32>(in.color * a, a);
}
"#
    .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Validates WGSL code using naga.
    fn validate_wgsl(code: &str) -> Result<(), String> {
        let module = naga::front::wgsl::parse_str(code)
            .map_err(|e| format!("WGSL parse error: {:?}", e))?;

        let mut validator = naga::valid::Validator::new(
            naga::valid::ValidationFlags::all(),
            naga::valid::Capabilities::all(),
        );
        validator
            .validate(&module)
            .map_err(|e| format!("WGSL validation error: {:?}", e))?;

        Ok(())
    }

    #[test]
    fn test_velocity_kernel_validates() {
        let code = velocity_kernel_wgsl();
        if let Err(e) = validate_wgsl(&code) {
            panic!("{}\n\n{}", e, code);
        }
    }

    #[test]
    fn test_position_kernel_validates() {
        validate_wgsl(&position_kernel_wgsl()).unwrap();
    }

    #[test]
    fn test_render_shader_validates() {
        validate_wgsl(&render_shader_wgsl()).unwrap();
    }

    #[test]
    fn test_constants_injected() {
        let code = velocity_kernel_wgsl();
        assert!(code.contains("const MAX_DAMPING: f32 = 0.999;"));
        assert!(code.contains("@workgroup_size(8, 8)"));
        assert!(code.contains("fn simplex3("));
    }

    #[test]
    fn test_uniform_sizes_are_16_byte_multiples() {
        assert_eq!(std::mem::size_of::<SimUniforms>() % 16, 0);
        assert_eq!(std::mem::size_of::<SimUniforms>(), 112);
        assert_eq!(std::mem::size_of::<RenderUniforms>(), 112);
    }

    #[test]
    fn test_sim_uniforms_pack_pointer() {
        let pointer = PointerState {
            position: glam::Vec3::new(1.0, 2.0, 0.0),
            velocity: glam::Vec3::new(3.0, 4.0, 0.0),
            hover: 0.5,
        };
        let forces = ForceConfig {
            mode: crate::config::ForceMode::Attract,
            model: InteractionModel::Radial,
            ..Default::default()
        };
        let uniforms = SimUniforms::new(&forces, &pointer, 2.0);
        assert_eq!(uniforms.pointer, [1.0, 2.0, 0.0, 0.5]);
        assert_eq!(uniforms.pointer_velocity, [3.0, 4.0, 0.0, 5.0]);
        assert_eq!(uniforms.mode_sign, -1.0);
        assert_eq!(uniforms.model, 1);
    }

    #[test]
    fn test_render_uniforms_cap_pixel_ratio() {
        let render = RenderConfig::default();
        let uniforms = RenderUniforms::new(Mat4::IDENTITY, &render, (800, 600), 3.0);
        assert_eq!(uniforms.pixel_ratio, render.max_pixel_ratio);
        assert_eq!(uniforms.viewport, [800.0, 600.0]);
    }
}
