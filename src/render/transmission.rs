//! Layered transmission rendering
//!
//! Each translucent shell is composited in its own pass: hide everything the
//! shell occludes, capture the remaining scene offscreen, then draw the shell
//! refracting that capture. The orchestration is a small state machine over a
//! `ShellStages` implementation; visibility changes live inside a guard whose
//! drop restores the scene on every path, including errors.

use glam::Vec4;
use log::debug;

use super::background::BackgroundPass;
use super::glass::{GlassPass, GlassPassUniforms};
use super::scene_pass::{camera_bind_group_layout, ScenePass};
use super::target::{OffscreenTarget, TargetSpec};
use super::RenderError;
use crate::batch::InstanceBatcher;
use crate::gpu::{GpuContext, GpuMesh};
use crate::probe::ProbeTexture;
use crate::resources::{GlassMaterial, Material};
use crate::scene::{
    gather_lights, InstanceSource, MaterialKind, Scene, ShellDescriptor,
};

/// Phases of one shell pass, in order. `Restored` is reached on every exit,
/// including the fast path when no surface matches the descriptor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShellPassState {
    Idle,
    Preparing,
    Captured,
    Compositing,
    Restored,
}

/// Scoped snapshot of every surface's visibility flag.
///
/// All hiding during a shell pass goes through this; dropping it rolls the
/// scene back regardless of how the pass ended.
pub struct VisibilityGuard<'a> {
    scene: &'a mut Scene,
    saved: Vec<bool>,
}

impl<'a> VisibilityGuard<'a> {
    pub fn new(scene: &'a mut Scene) -> Self {
        let saved = scene.surfaces.iter().map(|s| s.visible).collect();
        Self { scene, saved }
    }

    pub fn scene(&self) -> &Scene {
        self.scene
    }

    pub fn scene_mut(&mut self) -> &mut Scene {
        self.scene
    }
}

impl Drop for VisibilityGuard<'_> {
    fn drop(&mut self) {
        for (surface, &visible) in self.scene.surfaces.iter_mut().zip(self.saved.iter()) {
            surface.visible = visible;
        }
    }
}

/// The GPU work of a shell pass, separated so the orchestration is testable
/// without a device.
pub trait ShellStages {
    /// Render the capture for this shell: background plus whatever the guard
    /// left visible.
    fn capture(&mut self, scene: &Scene, shell: ShellDescriptor) -> Result<(), RenderError>;

    /// Draw the shell's own surfaces over the frame using the capture.
    fn composite(&mut self, scene: &Scene, shell: ShellDescriptor) -> Result<(), RenderError>;
}

/// Run the full state machine for one shell.
///
/// Returns the final state, which is `Restored` on every `Ok` path. Errors
/// from the stages propagate after the guard has already rolled visibility
/// back.
pub fn run_shell_pass<S: ShellStages>(
    scene: &mut Scene,
    stages: &mut S,
    shell: ShellDescriptor,
) -> Result<ShellPassState, RenderError> {
    let members = scene.surfaces_with_shell(shell);
    if members.is_empty() {
        // Nothing to composite; visibility is never touched.
        debug!("no surfaces match shell {:?}, skipping", shell);
        return Ok(ShellPassState::Restored);
    }

    let mut state = ShellPassState::Preparing;
    {
        let mut guard = VisibilityGuard::new(scene);

        for surface in &mut guard.scene_mut().surfaces {
            let occluded = surface
                .shell
                .map_or(false, |descriptor| shell.hides(descriptor));
            if occluded || surface.exclude_from_capture {
                surface.visible = false;
            }
        }
        debug!("shell {:?}: {:?}", shell, state);

        stages.capture(guard.scene(), shell)?;
        state = ShellPassState::Captured;
        debug!("shell {:?}: {:?}", shell, state);

        // The shell's own surfaces come back for compositing.
        for &index in &members {
            guard.scene_mut().surfaces[index].visible = true;
        }
        state = ShellPassState::Compositing;
        debug!("shell {:?}: {:?}", shell, state);
        stages.composite(guard.scene(), shell)?;
    }

    state = ShellPassState::Restored;
    debug!("shell {:?}: {:?}", shell, state);
    Ok(state)
}

/// Run every shell in the scene's composite order.
pub fn run_all_shells<S: ShellStages>(
    scene: &mut Scene,
    stages: &mut S,
) -> Result<(), RenderError> {
    for shell in scene.shell_schedule() {
        run_shell_pass(scene, stages, shell)?;
    }
    Ok(())
}

/// Everything a frame needs beyond the scene itself.
pub struct FrameAssets<'a> {
    pub meshes: &'a [GpuMesh],
    pub batcher: &'a InstanceBatcher,
    /// Per-variant instance buffers from `InstanceBatcher::upload`
    pub instance_buffers: &'a [Option<wgpu::Buffer>],
    pub probe: &'a ProbeTexture,
    pub metal_materials: &'a [Material],
    pub glass_materials: &'a [GlassMaterial],
}

/// GPU renderer for the layered transmission pipeline.
pub struct TransmissionRenderer {
    camera_layout: wgpu::BindGroupLayout,
    background: BackgroundPass,
    scene_pass: ScenePass,
    glass: GlassPass,
    target: OffscreenTarget,
    map_sampler: wgpu::Sampler,
    dummy_map: wgpu::TextureView,
}

impl TransmissionRenderer {
    pub fn new(ctx: &GpuContext, output_format: wgpu::TextureFormat, spec: TargetSpec) -> Self {
        let device = &ctx.device;
        let camera_layout = camera_bind_group_layout(device);

        let background = BackgroundPass::new(
            device,
            &camera_layout,
            OffscreenTarget::COLOR_FORMAT,
            Some(OffscreenTarget::DEPTH_FORMAT),
        );
        let scene_pass = ScenePass::new(
            device,
            &camera_layout,
            OffscreenTarget::COLOR_FORMAT,
            OffscreenTarget::DEPTH_FORMAT,
        );
        let glass = GlassPass::new(
            device,
            &camera_layout,
            output_format,
            OffscreenTarget::DEPTH_FORMAT,
        );
        let target = OffscreenTarget::new(device, spec);

        let map_sampler = device.create_sampler(&wgpu::SamplerDescriptor {
            label: Some("glass-map-sampler"),
            mag_filter: wgpu::FilterMode::Linear,
            min_filter: wgpu::FilterMode::Linear,
            ..Default::default()
        });
        let dummy_map = Self::create_dummy_map(ctx);

        Self {
            camera_layout,
            background,
            scene_pass,
            glass,
            target,
            map_sampler,
            dummy_map,
        }
    }

    /// Whether glass rendering is running on the placeholder pipeline.
    pub fn glass_degraded(&self) -> bool {
        self.glass.is_degraded()
    }

    /// Adopt a new capture spec; reallocates at most once.
    pub fn resize(&mut self, device: &wgpu::Device, spec: TargetSpec) -> bool {
        self.target.ensure(device, spec)
    }

    pub fn target(&self) -> &OffscreenTarget {
        &self.target
    }

    /// One 1x1 white texel standing in for absent curvature/position maps.
    fn create_dummy_map(ctx: &GpuContext) -> wgpu::TextureView {
        let texture = ctx.device.create_texture(&wgpu::TextureDescriptor {
            label: Some("dummy-map"),
            size: wgpu::Extent3d {
                width: 1,
                height: 1,
                depth_or_array_layers: 1,
            },
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: wgpu::TextureFormat::Rgba8Unorm,
            usage: wgpu::TextureUsages::TEXTURE_BINDING | wgpu::TextureUsages::COPY_DST,
            view_formats: &[],
        });
        ctx.queue.write_texture(
            wgpu::ImageCopyTexture {
                texture: &texture,
                mip_level: 0,
                origin: wgpu::Origin3d::ZERO,
                aspect: wgpu::TextureAspect::All,
            },
            &[255u8; 4],
            wgpu::ImageDataLayout {
                offset: 0,
                bytes_per_row: Some(4),
                rows_per_image: Some(1),
            },
            wgpu::Extent3d {
                width: 1,
                height: 1,
                depth_or_array_layers: 1,
            },
        );
        texture.create_view(&Default::default())
    }

    /// Render the whole frame: opaque base pass, then each shell in
    /// composite order through the state machine.
    pub fn render(
        &mut self,
        ctx: &GpuContext,
        scene: &mut Scene,
        assets: &FrameAssets,
        output: &wgpu::TextureView,
        output_depth: &wgpu::TextureView,
        output_size: (u32, u32),
    ) -> Result<(), RenderError> {
        self.target.ensure(
            &ctx.device,
            TargetSpec::new(output_size.0, output_size.1, self.target.spec().density),
        );

        let frame = FrameBindings::new(self, ctx, scene, assets, output_size);

        // Base pass: background and opaque surfaces straight into the output.
        {
            let mut encoder = ctx
                .device
                .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                    label: Some("base-pass-encoder"),
                });
            {
                let mut pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                    label: Some("base-pass"),
                    color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                        view: output,
                        resolve_target: None,
                        ops: wgpu::Operations {
                            load: wgpu::LoadOp::Clear(wgpu::Color::BLACK),
                            store: wgpu::StoreOp::Store,
                        },
                    })],
                    depth_stencil_attachment: Some(wgpu::RenderPassDepthStencilAttachment {
                        view: output_depth,
                        depth_ops: Some(wgpu::Operations {
                            load: wgpu::LoadOp::Clear(1.0),
                            store: wgpu::StoreOp::Store,
                        }),
                        stencil_ops: None,
                    }),
                    occlusion_query_set: None,
                    timestamp_writes: None,
                });
                self.background
                    .draw(&mut pass, &frame.camera_bind_group, &frame.background_bind_group);
                frame.draw_metal_surfaces(self, &mut pass, scene, assets);
            }
            ctx.queue.submit(Some(encoder.finish()));
        }

        let mut stages = GpuShellStages {
            renderer: self,
            ctx,
            assets,
            frame: &frame,
            output,
            output_depth,
        };
        run_all_shells(scene, &mut stages)
    }
}

/// Per-frame uniform buffers and bind groups shared by all passes.
struct FrameBindings {
    camera_bind_group: wgpu::BindGroup,
    background_bind_group: wgpu::BindGroup,
    scene_probe_bind_group: wgpu::BindGroup,
    glass_probe_bind_group: wgpu::BindGroup,
    capture_bind_group: wgpu::BindGroup,
    light_buffer: wgpu::Buffer,
    metal_bind_groups: Vec<wgpu::BindGroup>,
    /// Transient single-instance buffers, indexed by surface id
    single_buffers: Vec<Option<wgpu::Buffer>>,
    output_size: (u32, u32),
}

impl FrameBindings {
    fn new(
        renderer: &TransmissionRenderer,
        ctx: &GpuContext,
        scene: &Scene,
        assets: &FrameAssets,
        output_size: (u32, u32),
    ) -> Self {
        let device = &ctx.device;

        let camera_buffer =
            ctx.create_uniform("camera-uniforms", &scene.camera.uniform_data());
        let camera_bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("camera-bind-group"),
            layout: &renderer.camera_layout,
            entries: &[wgpu::BindGroupEntry {
                binding: 0,
                resource: camera_buffer.as_entire_binding(),
            }],
        });

        let light_buffer =
            ctx.create_uniform("light-uniforms", &gather_lights(scene.enabled_lights()));

        let background_params = ctx.create_uniform(
            "background-uniforms",
            &glam::Vec4::new(1.0, 0.0, 0.0, 0.0),
        );
        let background_bind_group =
            renderer
                .background
                .create_bind_group(device, assets.probe, &background_params);

        let scene_probe_bind_group = renderer
            .scene_pass
            .create_probe_bind_group(device, assets.probe);
        let glass_probe_bind_group = renderer.glass.create_probe_bind_group(device, assets.probe);

        let capture_sampler = device.create_sampler(&wgpu::SamplerDescriptor {
            label: Some("capture-sampler"),
            address_mode_u: wgpu::AddressMode::ClampToEdge,
            address_mode_v: wgpu::AddressMode::ClampToEdge,
            mag_filter: wgpu::FilterMode::Linear,
            min_filter: wgpu::FilterMode::Linear,
            ..Default::default()
        });
        let capture_bind_group = renderer.glass.create_capture_bind_group(
            device,
            &renderer.target.color_view,
            &renderer.target.depth_view,
            &capture_sampler,
        );

        let metal_bind_groups = assets
            .metal_materials
            .iter()
            .map(|material| {
                let buffer = ctx.create_uniform(
                    &format!("{}-uniforms", material.name),
                    &material.uniform_data(),
                );
                renderer
                    .scene_pass
                    .create_material_bind_group(device, &buffer, &light_buffer)
            })
            .collect();

        let single_buffers = scene
            .surfaces
            .iter()
            .map(|surface| match surface.source {
                InstanceSource::Single(transform) => Some(
                    ctx.create_uniform(&format!("{}-instance", surface.name), &transform.matrix()),
                ),
                InstanceSource::Batch(_) => None,
            })
            .collect();

        Self {
            camera_bind_group,
            background_bind_group,
            scene_probe_bind_group,
            glass_probe_bind_group,
            capture_bind_group,
            light_buffer,
            metal_bind_groups,
            single_buffers,
            output_size,
        }
    }

    /// Instance buffer and count for one surface, or None when it has no
    /// instances this frame.
    fn instances<'a>(
        &'a self,
        surface_id: usize,
        source: InstanceSource,
        assets: &'a FrameAssets,
    ) -> Option<(&'a wgpu::Buffer, u32)> {
        match source {
            InstanceSource::Single(_) => self.single_buffers[surface_id]
                .as_ref()
                .map(|buffer| (buffer, 1)),
            InstanceSource::Batch(variant) => assets
                .instance_buffers
                .get(variant)
                .and_then(|buffer| buffer.as_ref())
                .map(|buffer| (buffer, assets.batcher.instance_count(variant) as u32)),
        }
    }

    /// Draw every visible metal surface with the opaque pipeline.
    fn draw_metal_surfaces<'a>(
        &'a self,
        renderer: &'a TransmissionRenderer,
        pass: &mut wgpu::RenderPass<'a>,
        scene: &Scene,
        assets: &'a FrameAssets,
    ) {
        pass.set_pipeline(renderer.scene_pass.pipeline());
        pass.set_bind_group(0, &self.camera_bind_group, &[]);
        pass.set_bind_group(2, &self.scene_probe_bind_group, &[]);

        for (id, surface) in scene.surfaces.iter().enumerate() {
            if !surface.visible || surface.material != MaterialKind::Metal {
                continue;
            }
            let Some(mesh) = assets.meshes.get(surface.mesh_id) else {
                continue;
            };
            let Some(material) = self.metal_bind_groups.get(surface.material_id) else {
                continue;
            };
            let Some((instances, count)) = self.instances(id, surface.source, assets) else {
                continue;
            };

            pass.set_bind_group(1, material, &[]);
            pass.set_vertex_buffer(0, mesh.vertex_buffer.slice(..));
            pass.set_vertex_buffer(1, instances.slice(..));
            pass.set_index_buffer(mesh.index_buffer.slice(..), wgpu::IndexFormat::Uint32);
            pass.draw_indexed(0..mesh.index_count, 0, 0..count);
        }
    }
}

/// Background uniform for a shell capture: unit intensity with the glass
/// material's luminance gate, so the capture sees the same filtered
/// environment the glass will transmit.
pub fn capture_background_params(material: &GlassMaterial) -> Vec4 {
    Vec4::new(
        1.0,
        material.brightness_threshold,
        material.brightness_smoothing,
        if material.hdr_filter { 1.0 } else { 0.0 },
    )
}

/// `ShellStages` over the real device.
struct GpuShellStages<'a> {
    renderer: &'a TransmissionRenderer,
    ctx: &'a GpuContext,
    assets: &'a FrameAssets<'a>,
    frame: &'a FrameBindings,
    output: &'a wgpu::TextureView,
    output_depth: &'a wgpu::TextureView,
}

impl ShellStages for GpuShellStages<'_> {
    fn capture(&mut self, scene: &Scene, shell: ShellDescriptor) -> Result<(), RenderError> {
        // The capture background carries the shell's own brightness gate.
        let params = scene
            .surfaces_with_shell(shell)
            .first()
            .and_then(|&id| {
                self.assets
                    .glass_materials
                    .get(scene.surfaces[id].material_id)
            })
            .map(capture_background_params)
            .unwrap_or(Vec4::new(1.0, 0.0, 0.0, 0.0));
        let params_buffer = self
            .ctx
            .create_uniform("capture-background-uniforms", &params);
        let background_bind_group = self.renderer.background.create_bind_group(
            &self.ctx.device,
            self.assets.probe,
            &params_buffer,
        );

        let mut encoder =
            self.ctx
                .device
                .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                    label: Some("shell-capture-encoder"),
                });
        {
            let mut pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("shell-capture"),
                color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                    view: &self.renderer.target.color_view,
                    resolve_target: None,
                    ops: wgpu::Operations {
                        load: wgpu::LoadOp::Clear(wgpu::Color::BLACK),
                        store: wgpu::StoreOp::Store,
                    },
                })],
                depth_stencil_attachment: Some(wgpu::RenderPassDepthStencilAttachment {
                    view: &self.renderer.target.depth_view,
                    depth_ops: Some(wgpu::Operations {
                        load: wgpu::LoadOp::Clear(1.0),
                        store: wgpu::StoreOp::Store,
                    }),
                    stencil_ops: None,
                }),
                occlusion_query_set: None,
                timestamp_writes: None,
            });
            self.renderer.background.draw(
                &mut pass,
                &self.frame.camera_bind_group,
                &background_bind_group,
            );
            self.frame
                .draw_metal_surfaces(self.renderer, &mut pass, scene, self.assets);
        }
        self.ctx.queue.submit(Some(encoder.finish()));
        debug!("captured scene for shell {:?}", shell);
        Ok(())
    }

    fn composite(&mut self, scene: &Scene, shell: ShellDescriptor) -> Result<(), RenderError> {
        let device = &self.ctx.device;

        // One material bind group per surface of the shell; the back-face
        // flag comes from the descriptor.
        let mut draws: Vec<(usize, wgpu::BindGroup)> = Vec::new();
        for id in scene.surfaces_with_shell(shell) {
            let surface = &scene.surfaces[id];
            if !surface.visible {
                continue;
            }
            let Some(material) = self.assets.glass_materials.get(surface.material_id) else {
                continue;
            };
            let uniforms = GlassPassUniforms::new(
                material.uniform_data(shell.back_face),
                self.frame.output_size.0,
                self.frame.output_size.1,
            );
            let buffer = self
                .ctx
                .create_uniform(&format!("{}-glass-uniforms", surface.name), &uniforms);
            let bind_group = self.renderer.glass.create_material_bind_group(
                device,
                &buffer,
                &self.frame.light_buffer,
                &self.renderer.dummy_map,
                &self.renderer.dummy_map,
                &self.renderer.map_sampler,
            );
            draws.push((id, bind_group));
        }

        let mut encoder = device.create_command_encoder(&wgpu::CommandEncoderDescriptor {
            label: Some("shell-composite-encoder"),
        });
        {
            let mut pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("shell-composite"),
                color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                    view: self.output,
                    resolve_target: None,
                    ops: wgpu::Operations {
                        load: wgpu::LoadOp::Load,
                        store: wgpu::StoreOp::Store,
                    },
                })],
                depth_stencil_attachment: Some(wgpu::RenderPassDepthStencilAttachment {
                    view: self.output_depth,
                    depth_ops: Some(wgpu::Operations {
                        load: wgpu::LoadOp::Load,
                        store: wgpu::StoreOp::Store,
                    }),
                    stencil_ops: None,
                }),
                occlusion_query_set: None,
                timestamp_writes: None,
            });

            pass.set_pipeline(self.renderer.glass.pipeline());
            pass.set_bind_group(0, &self.frame.camera_bind_group, &[]);
            pass.set_bind_group(2, &self.frame.glass_probe_bind_group, &[]);
            pass.set_bind_group(3, &self.frame.capture_bind_group, &[]);

            for (id, bind_group) in &draws {
                let surface = &scene.surfaces[*id];
                let Some(mesh) = self.assets.meshes.get(surface.mesh_id) else {
                    continue;
                };
                let Some((instances, count)) =
                    self.frame.instances(*id, surface.source, self.assets)
                else {
                    continue;
                };
                pass.set_bind_group(1, bind_group, &[]);
                pass.set_vertex_buffer(0, mesh.vertex_buffer.slice(..));
                pass.set_vertex_buffer(1, instances.slice(..));
                pass.set_index_buffer(mesh.index_buffer.slice(..), wgpu::IndexFormat::Uint32);
                pass.draw_indexed(0..mesh.index_count, 0, 0..count);
            }
        }
        self.ctx.queue.submit(Some(encoder.finish()));
        Ok(())
    }
}
