//! Glass composite pass
//!
//! Draws one shell's surfaces over the frame, refracting the capture of
//! everything behind it. Three rays per pixel give chromatic dispersion; the
//! march distance adapts to the captured depth under the fragment so thin
//! shells do not refract through distant geometry. A pipeline that fails
//! validation degrades to a magenta placeholder instead of killing the frame.

use bytemuck::{Pod, Zeroable};
use glam::Vec4;
use log::error;

use super::scene_pass::{instance_buffer_layout, probe_bind_group_layout, vertex_buffer_layout};
use super::RenderError;
use crate::probe::ProbeTexture;
use crate::resources::GlassUniformData;

pub const GLASS_SHADER: &str = r#"
struct CameraUniforms {
    view: mat4x4<f32>,
    proj: mat4x4<f32>,
    view_proj: mat4x4<f32>,
    inv_view: mat4x4<f32>,
    inv_proj: mat4x4<f32>,
    position: vec4<f32>,
    near_far: vec4<f32>,
}

struct GlassUniforms {
    // x=ior, y=chromatic aberration, z=transmission intensity, w=reflection intensity
    refraction: vec4<f32>,
    // x=threshold, y=smoothing, z=hdr filter toggle, w=env intensity
    brightness: vec4<f32>,
    // x=edge width, y=edge power, z=edge intensity, w=opacity
    edge: vec4<f32>,
    // xyz=absorption color, w=absorption intensity
    absorption: vec4<f32>,
    // x=absorption power, y=thickness, z=specular strength, w=shininess
    volume: vec4<f32>,
    // x=lighting, y=has curvature map, z=has position map, w=back face
    flags: vec4<u32>,
    // xy=output size in pixels, zw=reciprocal
    viewport: vec4<f32>,
}

struct LightData {
    position_range: vec4<f32>,
    color_intensity: vec4<f32>,
    direction_type: vec4<f32>,
}

struct LightUniforms {
    lights: array<LightData, 4>,
    count: vec4<u32>,
}

@group(0) @binding(0) var<uniform> camera: CameraUniforms;
@group(1) @binding(0) var<uniform> glass: GlassUniforms;
@group(1) @binding(1) var<uniform> lighting: LightUniforms;
@group(1) @binding(2) var curvature_map: texture_2d<f32>;
@group(1) @binding(3) var position_map: texture_2d<f32>;
@group(1) @binding(4) var map_sampler: sampler;
@group(2) @binding(0) var probe_texture: texture_cube<f32>;
@group(2) @binding(1) var probe_sampler: sampler;
@group(3) @binding(0) var capture_color: texture_2d<f32>;
@group(3) @binding(1) var capture_depth: texture_depth_2d;
@group(3) @binding(2) var capture_sampler: sampler;

struct VertexInput {
    @location(0) position: vec3<f32>,
    @location(1) normal: vec3<f32>,
    @location(2) uv: vec2<f32>,
    @location(3) tangent: vec4<f32>,
    @location(4) model_0: vec4<f32>,
    @location(5) model_1: vec4<f32>,
    @location(6) model_2: vec4<f32>,
    @location(7) model_3: vec4<f32>,
}

struct VertexOutput {
    @builtin(position) clip_position: vec4<f32>,
    @location(0) world_position: vec3<f32>,
    @location(1) world_normal: vec3<f32>,
    @location(2) uv: vec2<f32>,
}

@vertex
fn vs_main(input: VertexInput) -> VertexOutput {
    let model = mat4x4<f32>(input.model_0, input.model_1, input.model_2, input.model_3);
    var output: VertexOutput;
    let world_pos = model * vec4<f32>(input.position, 1.0);
    output.world_position = world_pos.xyz;
    output.clip_position = camera.view_proj * world_pos;
    output.world_normal = normalize((model * vec4<f32>(input.normal, 0.0)).xyz);
    output.uv = input.uv;
    return output;
}

fn luminance(color: vec3<f32>) -> f32 {
    return dot(color, vec3<f32>(0.2126, 0.7152, 0.0722));
}

fn linear_depth(d: f32) -> f32 {
    let near = camera.near_far.x;
    let far = camera.near_far.y;
    return near * far / max(far - d * (far - near), 1e-6);
}

fn capture_depth_at(uv: vec2<f32>) -> f32 {
    let dims = vec2<f32>(textureDimensions(capture_depth));
    let texel = vec2<i32>(clamp(uv, vec2<f32>(0.0), vec2<f32>(1.0)) * (dims - 1.0));
    return textureLoad(capture_depth, texel, 0);
}

// Refract one ray and sample the capture where it lands. Falls back to the
// straight-through sample when the ray leaves the capture rect or would land
// on geometry nearer than the shell itself.
fn refracted_sample(
    world_pos: vec3<f32>,
    normal: vec3<f32>,
    view_dir: vec3<f32>,
    ior: f32,
    march: f32,
    screen_uv: vec2<f32>,
    frag_depth: f32,
) -> vec3<f32> {
    var dir = refract(-view_dir, normal, 1.0 / max(ior, 1.0001));
    if (dot(dir, dir) < 1e-6) {
        // Total internal reflection; pass straight through.
        dir = -view_dir;
    }

    let target = world_pos + dir * march;
    let clip = camera.view_proj * vec4<f32>(target, 1.0);

    var uv = screen_uv;
    if (clip.w > 1e-4) {
        let ndc = clip.xy / clip.w;
        let refr_uv = ndc * vec2<f32>(0.5, -0.5) + 0.5;
        let inside = all(refr_uv >= vec2<f32>(0.0)) && all(refr_uv <= vec2<f32>(1.0));
        if (inside) {
            // Reject samples of geometry in front of the shell.
            let landed = linear_depth(capture_depth_at(refr_uv));
            if (landed + 1e-3 >= frag_depth) {
                uv = refr_uv;
            }
        }
    }

    return textureSampleLevel(capture_color, capture_sampler, uv, 0.0).rgb;
}

@fragment
fn fs_main(input: VertexOutput) -> @location(0) vec4<f32> {
    var normal = normalize(input.world_normal);
    if (glass.flags.w == 1u) {
        normal = -normal;
    }
    let view_dir = normalize(camera.position.xyz - input.world_position);
    let cos_theta = clamp(abs(dot(normal, view_dir)), 0.0, 1.0);

    let ior = glass.refraction.x;
    let f0 = pow((1.0 - ior) / (1.0 + ior), 2.0);
    let fresnel = f0 + (1.0 - f0) * pow(1.0 - cos_theta, 5.0);

    let screen_uv = input.clip_position.xy * glass.viewport.zw;
    let frag_depth = linear_depth(input.clip_position.z);

    // Adaptive march: bounded by the captured depth under this pixel and by
    // the shell thickness heuristic.
    let nearby = max(linear_depth(capture_depth_at(screen_uv)) - frag_depth, 0.0);
    let march = max(min(nearby * 0.8, glass.volume.y * 3.0), 1e-3);

    // Dispersion: one ray per channel at offset IORs.
    let spread = glass.refraction.y * 0.5;
    let r = refracted_sample(input.world_position, normal, view_dir, ior - spread, march, screen_uv, frag_depth).r;
    let g = refracted_sample(input.world_position, normal, view_dir, ior, march, screen_uv, frag_depth).g;
    let b = refracted_sample(input.world_position, normal, view_dir, ior + spread, march, screen_uv, frag_depth).b;
    var transmission = vec3<f32>(r, g, b);

    // Volume absorption, weighted by its intensity.
    let tint = pow(max(glass.absorption.rgb, vec3<f32>(1e-4)), vec3<f32>(glass.volume.x));
    transmission = mix(transmission, transmission * tint, clamp(glass.absorption.w, 0.0, 1.0));

    // Probe reflection, brightness-gated and masked to the silhouette edge.
    let reflect_dir = reflect(-view_dir, normal);
    var reflection = textureSampleLevel(probe_texture, probe_sampler, reflect_dir, 0.0).rgb
        * glass.brightness.w;
    if (glass.brightness.z > 0.5) {
        let gate = smoothstep(
            glass.brightness.x - glass.brightness.y,
            glass.brightness.x + glass.brightness.y,
            luminance(reflection),
        );
        reflection = reflection * gate;
    }
    var edge = pow(clamp((1.0 - cos_theta) * glass.edge.x, 0.0, 1.0), glass.edge.y);
    if (glass.flags.y == 1u) {
        edge = textureSampleLevel(curvature_map, map_sampler, input.uv, 0.0).r;
    }
    reflection = reflection * edge * glass.edge.z * glass.refraction.w;

    // Speculars and a faint diffuse brightening from the scene lights.
    var specular = vec3<f32>(0.0);
    var brightening = vec3<f32>(0.0);
    if (glass.flags.x == 1u) {
        for (var i = 0u; i < lighting.count.x; i = i + 1u) {
            let light = lighting.lights[i];
            var to_light: vec3<f32>;
            if (light.direction_type.w < 0.5) {
                to_light = normalize(light.position_range.xyz - input.world_position);
            } else {
                to_light = -normalize(light.direction_type.xyz);
            }
            let halfway = normalize(to_light + view_dir);
            let highlight = pow(max(dot(normal, halfway), 0.0), glass.volume.w);
            let energy = light.color_intensity.rgb * light.color_intensity.w;
            specular = specular + energy * highlight * glass.volume.z;
            brightening = brightening + energy * max(dot(normal, to_light), 0.0) * 0.005;
        }
    }

    var darkening = 1.0;
    if (glass.flags.z == 1u) {
        darkening = textureSampleLevel(position_map, map_sampler, input.uv, 0.0).r;
    }

    let color = (reflection
        + transmission * (1.0 - fresnel) * glass.refraction.z
        + specular
        + brightening) * darkening;

    return vec4<f32>(color, glass.edge.w);
}
"#;

const PLACEHOLDER_SHADER: &str = r#"
struct CameraUniforms {
    view: mat4x4<f32>,
    proj: mat4x4<f32>,
    view_proj: mat4x4<f32>,
    inv_view: mat4x4<f32>,
    inv_proj: mat4x4<f32>,
    position: vec4<f32>,
    near_far: vec4<f32>,
}

@group(0) @binding(0) var<uniform> camera: CameraUniforms;

struct VertexInput {
    @location(0) position: vec3<f32>,
    @location(1) normal: vec3<f32>,
    @location(2) uv: vec2<f32>,
    @location(3) tangent: vec4<f32>,
    @location(4) model_0: vec4<f32>,
    @location(5) model_1: vec4<f32>,
    @location(6) model_2: vec4<f32>,
    @location(7) model_3: vec4<f32>,
}

@vertex
fn vs_main(input: VertexInput) -> @builtin(position) vec4<f32> {
    let model = mat4x4<f32>(input.model_0, input.model_1, input.model_2, input.model_3);
    return camera.view_proj * model * vec4<f32>(input.position, 1.0);
}

@fragment
fn fs_main() -> @location(0) vec4<f32> {
    return vec4<f32>(1.0, 0.0, 1.0, 1.0);
}
"#;

/// The glass material uniform plus per-frame viewport data.
#[repr(C)]
#[derive(Debug, Clone, Copy, Pod, Zeroable)]
pub struct GlassPassUniforms {
    pub material: GlassUniformData,
    /// xy = output size in pixels, zw = reciprocal
    pub viewport: Vec4,
}

impl GlassPassUniforms {
    pub fn new(material: GlassUniformData, width: u32, height: u32) -> Self {
        let w = width.max(1) as f32;
        let h = height.max(1) as f32;
        Self {
            material,
            viewport: Vec4::new(w, h, 1.0 / w, 1.0 / h),
        }
    }
}

/// Glass composite pipeline with its bind group layouts.
pub struct GlassPass {
    pipeline: wgpu::RenderPipeline,
    degraded: bool,
    material_layout: wgpu::BindGroupLayout,
    probe_layout: wgpu::BindGroupLayout,
    capture_layout: wgpu::BindGroupLayout,
}

impl GlassPass {
    /// Build the glass pipeline; on validation failure fall back to the
    /// magenta placeholder so the frame still completes.
    pub fn new(
        device: &wgpu::Device,
        camera_layout: &wgpu::BindGroupLayout,
        color_format: wgpu::TextureFormat,
        depth_format: wgpu::TextureFormat,
    ) -> Self {
        let material_layout = Self::material_layout(device);
        let probe_layout = probe_bind_group_layout(device, "glass-probe-layout");
        let capture_layout = Self::capture_layout(device);

        let layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("glass-pipeline-layout"),
            bind_group_layouts: &[camera_layout, &material_layout, &probe_layout, &capture_layout],
            push_constant_ranges: &[],
        });

        let built = Self::build_pipeline(
            device,
            &layout,
            GLASS_SHADER,
            "glass-pipeline",
            color_format,
            depth_format,
        );

        let (pipeline, degraded) = match built {
            Ok(pipeline) => (pipeline, false),
            Err(err) => {
                error!("glass pipeline failed, degrading to placeholder: {}", err);
                let placeholder_layout =
                    device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
                        label: Some("glass-placeholder-layout"),
                        bind_group_layouts: &[camera_layout],
                        push_constant_ranges: &[],
                    });
                let pipeline = Self::build_placeholder(
                    device,
                    &placeholder_layout,
                    color_format,
                    depth_format,
                );
                (pipeline, true)
            }
        };

        Self {
            pipeline,
            degraded,
            material_layout,
            probe_layout,
            capture_layout,
        }
    }

    /// True when the placeholder pipeline is in use.
    pub fn is_degraded(&self) -> bool {
        self.degraded
    }

    pub fn pipeline(&self) -> &wgpu::RenderPipeline {
        &self.pipeline
    }

    fn build_pipeline(
        device: &wgpu::Device,
        layout: &wgpu::PipelineLayout,
        source: &str,
        label: &str,
        color_format: wgpu::TextureFormat,
        depth_format: wgpu::TextureFormat,
    ) -> Result<wgpu::RenderPipeline, RenderError> {
        device.push_error_scope(wgpu::ErrorFilter::Validation);

        let shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some(label),
            source: wgpu::ShaderSource::Wgsl(source.into()),
        });
        let pipeline = device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
            label: Some(label),
            layout: Some(layout),
            vertex: wgpu::VertexState {
                module: &shader,
                entry_point: "vs_main",
                buffers: &[vertex_buffer_layout(), instance_buffer_layout()],
                compilation_options: Default::default(),
            },
            fragment: Some(wgpu::FragmentState {
                module: &shader,
                entry_point: "fs_main",
                targets: &[Some(wgpu::ColorTargetState {
                    format: color_format,
                    blend: Some(wgpu::BlendState::ALPHA_BLENDING),
                    write_mask: wgpu::ColorWrites::ALL,
                })],
                compilation_options: Default::default(),
            }),
            primitive: wgpu::PrimitiveState {
                cull_mode: None,
                ..Default::default()
            },
            depth_stencil: Some(wgpu::DepthStencilState {
                format: depth_format,
                depth_write_enabled: false,
                depth_compare: wgpu::CompareFunction::LessEqual,
                stencil: Default::default(),
                bias: Default::default(),
            }),
            multisample: wgpu::MultisampleState::default(),
            multiview: None,
        });

        if let Some(err) = pollster::block_on(device.pop_error_scope()) {
            return Err(RenderError::PipelineBuild(err.to_string()));
        }
        Ok(pipeline)
    }

    fn build_placeholder(
        device: &wgpu::Device,
        layout: &wgpu::PipelineLayout,
        color_format: wgpu::TextureFormat,
        depth_format: wgpu::TextureFormat,
    ) -> wgpu::RenderPipeline {
        let shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("glass-placeholder-shader"),
            source: wgpu::ShaderSource::Wgsl(PLACEHOLDER_SHADER.into()),
        });
        device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
            label: Some("glass-placeholder-pipeline"),
            layout: Some(layout),
            vertex: wgpu::VertexState {
                module: &shader,
                entry_point: "vs_main",
                buffers: &[vertex_buffer_layout(), instance_buffer_layout()],
                compilation_options: Default::default(),
            },
            fragment: Some(wgpu::FragmentState {
                module: &shader,
                entry_point: "fs_main",
                targets: &[Some(wgpu::ColorTargetState {
                    format: color_format,
                    blend: None,
                    write_mask: wgpu::ColorWrites::ALL,
                })],
                compilation_options: Default::default(),
            }),
            primitive: wgpu::PrimitiveState {
                cull_mode: None,
                ..Default::default()
            },
            depth_stencil: Some(wgpu::DepthStencilState {
                format: depth_format,
                depth_write_enabled: false,
                depth_compare: wgpu::CompareFunction::LessEqual,
                stencil: Default::default(),
                bias: Default::default(),
            }),
            multisample: wgpu::MultisampleState::default(),
            multiview: None,
        })
    }

    fn material_layout(device: &wgpu::Device) -> wgpu::BindGroupLayout {
        let uniform = |binding| wgpu::BindGroupLayoutEntry {
            binding,
            visibility: wgpu::ShaderStages::FRAGMENT,
            ty: wgpu::BindingType::Buffer {
                ty: wgpu::BufferBindingType::Uniform,
                has_dynamic_offset: false,
                min_binding_size: None,
            },
            count: None,
        };
        let map = |binding| wgpu::BindGroupLayoutEntry {
            binding,
            visibility: wgpu::ShaderStages::FRAGMENT,
            ty: wgpu::BindingType::Texture {
                sample_type: wgpu::TextureSampleType::Float { filterable: true },
                view_dimension: wgpu::TextureViewDimension::D2,
                multisampled: false,
            },
            count: None,
        };
        device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("glass-material-layout"),
            entries: &[
                uniform(0),
                uniform(1),
                map(2),
                map(3),
                wgpu::BindGroupLayoutEntry {
                    binding: 4,
                    visibility: wgpu::ShaderStages::FRAGMENT,
                    ty: wgpu::BindingType::Sampler(wgpu::SamplerBindingType::Filtering),
                    count: None,
                },
            ],
        })
    }

    fn capture_layout(device: &wgpu::Device) -> wgpu::BindGroupLayout {
        device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("glass-capture-layout"),
            entries: &[
                wgpu::BindGroupLayoutEntry {
                    binding: 0,
                    visibility: wgpu::ShaderStages::FRAGMENT,
                    ty: wgpu::BindingType::Texture {
                        sample_type: wgpu::TextureSampleType::Float { filterable: true },
                        view_dimension: wgpu::TextureViewDimension::D2,
                        multisampled: false,
                    },
                    count: None,
                },
                wgpu::BindGroupLayoutEntry {
                    binding: 1,
                    visibility: wgpu::ShaderStages::FRAGMENT,
                    ty: wgpu::BindingType::Texture {
                        sample_type: wgpu::TextureSampleType::Depth,
                        view_dimension: wgpu::TextureViewDimension::D2,
                        multisampled: false,
                    },
                    count: None,
                },
                wgpu::BindGroupLayoutEntry {
                    binding: 2,
                    visibility: wgpu::ShaderStages::FRAGMENT,
                    ty: wgpu::BindingType::Sampler(wgpu::SamplerBindingType::Filtering),
                    count: None,
                },
            ],
        })
    }

    pub fn create_material_bind_group(
        &self,
        device: &wgpu::Device,
        uniforms: &wgpu::Buffer,
        lights: &wgpu::Buffer,
        curvature_map: &wgpu::TextureView,
        position_map: &wgpu::TextureView,
        map_sampler: &wgpu::Sampler,
    ) -> wgpu::BindGroup {
        device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("glass-material-bind-group"),
            layout: &self.material_layout,
            entries: &[
                wgpu::BindGroupEntry {
                    binding: 0,
                    resource: uniforms.as_entire_binding(),
                },
                wgpu::BindGroupEntry {
                    binding: 1,
                    resource: lights.as_entire_binding(),
                },
                wgpu::BindGroupEntry {
                    binding: 2,
                    resource: wgpu::BindingResource::TextureView(curvature_map),
                },
                wgpu::BindGroupEntry {
                    binding: 3,
                    resource: wgpu::BindingResource::TextureView(position_map),
                },
                wgpu::BindGroupEntry {
                    binding: 4,
                    resource: wgpu::BindingResource::Sampler(map_sampler),
                },
            ],
        })
    }

    pub fn create_probe_bind_group(
        &self,
        device: &wgpu::Device,
        probe: &ProbeTexture,
    ) -> wgpu::BindGroup {
        device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("glass-probe-bind-group"),
            layout: &self.probe_layout,
            entries: &[
                wgpu::BindGroupEntry {
                    binding: 0,
                    resource: wgpu::BindingResource::TextureView(&probe.view),
                },
                wgpu::BindGroupEntry {
                    binding: 1,
                    resource: wgpu::BindingResource::Sampler(&probe.sampler),
                },
            ],
        })
    }

    pub fn create_capture_bind_group(
        &self,
        device: &wgpu::Device,
        color: &wgpu::TextureView,
        depth: &wgpu::TextureView,
        sampler: &wgpu::Sampler,
    ) -> wgpu::BindGroup {
        device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("glass-capture-bind-group"),
            layout: &self.capture_layout,
            entries: &[
                wgpu::BindGroupEntry {
                    binding: 0,
                    resource: wgpu::BindingResource::TextureView(color),
                },
                wgpu::BindGroupEntry {
                    binding: 1,
                    resource: wgpu::BindingResource::TextureView(depth),
                },
                wgpu::BindGroupEntry {
                    binding: 2,
                    resource: wgpu::BindingResource::Sampler(sampler),
                },
            ],
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resources::GlassMaterial;

    #[test]
    fn test_pass_uniforms_viewport() {
        let u = GlassPassUniforms::new(GlassMaterial::default().uniform_data(false), 800, 600);
        assert_eq!(u.viewport.x, 800.0);
        assert!((u.viewport.z - 1.0 / 800.0).abs() < 1e-9);

        let u = GlassPassUniforms::new(GlassMaterial::default().uniform_data(false), 0, 0);
        assert_eq!(u.viewport.x, 1.0);
    }

    #[test]
    fn test_pass_uniforms_are_vec4_aligned() {
        assert_eq!(std::mem::size_of::<GlassPassUniforms>() % 16, 0);
    }
}
