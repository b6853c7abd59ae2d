//! Headless GPU context

use log::info;
use thiserror::Error;
use wgpu::util::DeviceExt;

use crate::resources::Mesh;

#[derive(Error, Debug)]
pub enum GpuError {
    #[error("no suitable GPU adapter found")]
    AdapterNotFound,
    #[error("device creation failed: {0}")]
    DeviceCreationFailed(#[from] wgpu::RequestDeviceError),
}

pub type GpuResult<T> = Result<T, GpuError>;

/// Device, queue, and adapter for headless rendering.
///
/// There is no surface; every pass renders into caller-supplied or offscreen
/// texture views.
pub struct GpuContext {
    pub adapter: wgpu::Adapter,
    pub device: wgpu::Device,
    pub queue: wgpu::Queue,
}

impl GpuContext {
    /// Blocking initialization
    pub fn new() -> GpuResult<Self> {
        pollster::block_on(Self::new_async())
    }

    pub async fn new_async() -> GpuResult<Self> {
        let instance = wgpu::Instance::new(wgpu::InstanceDescriptor {
            backends: wgpu::Backends::PRIMARY,
            ..Default::default()
        });

        let adapter = instance
            .request_adapter(&wgpu::RequestAdapterOptions {
                power_preference: wgpu::PowerPreference::HighPerformance,
                compatible_surface: None,
                force_fallback_adapter: false,
            })
            .await
            .ok_or(GpuError::AdapterNotFound)?;

        let adapter_info = adapter.get_info();
        info!(
            "using adapter: {} ({:?} backend)",
            adapter_info.name, adapter_info.backend
        );

        let (device, queue) = adapter
            .request_device(
                &wgpu::DeviceDescriptor {
                    label: Some("lustre device"),
                    required_features: wgpu::Features::empty(),
                    required_limits: wgpu::Limits::default(),
                },
                None,
            )
            .await?;

        Ok(Self {
            adapter,
            device,
            queue,
        })
    }

    /// Clamp a requested target size to the device's 2D texture limit,
    /// preserving aspect ratio.
    pub fn clamp_target_size(&self, width: u32, height: u32) -> (u32, u32) {
        clamp_size(self.device.limits().max_texture_dimension_2d, width, height)
    }

    /// Upload a mesh's vertex and index buffers.
    pub fn upload_mesh(&self, mesh: &Mesh) -> GpuMesh {
        let vertex_buffer = self
            .device
            .create_buffer_init(&wgpu::util::BufferInitDescriptor {
                label: Some(&format!("{}-vertices", mesh.name)),
                contents: mesh.vertex_bytes(),
                usage: wgpu::BufferUsages::VERTEX,
            });
        let index_buffer = self
            .device
            .create_buffer_init(&wgpu::util::BufferInitDescriptor {
                label: Some(&format!("{}-indices", mesh.name)),
                contents: mesh.index_bytes(),
                usage: wgpu::BufferUsages::INDEX,
            });
        GpuMesh {
            vertex_buffer,
            index_buffer,
            index_count: mesh.index_count() as u32,
        }
    }

    /// Create a uniform buffer from any `Pod` value.
    pub fn create_uniform<T: bytemuck::Pod>(&self, label: &str, value: &T) -> wgpu::Buffer {
        self.device
            .create_buffer_init(&wgpu::util::BufferInitDescriptor {
                label: Some(label),
                contents: bytemuck::bytes_of(value),
                usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
            })
    }
}

/// Mesh buffers resident on the device.
pub struct GpuMesh {
    pub vertex_buffer: wgpu::Buffer,
    pub index_buffer: wgpu::Buffer,
    pub index_count: u32,
}

/// Fit `width x height` inside `max_size` on both axes, preserving aspect
/// ratio, never returning zero.
pub fn clamp_size(max_size: u32, width: u32, height: u32) -> (u32, u32) {
    if width > max_size || height > max_size {
        let scale = (max_size as f32 / width as f32).min(max_size as f32 / height as f32);
        (
            ((width as f32 * scale) as u32).max(1),
            ((height as f32 * scale) as u32).max(1),
        )
    } else {
        (width.max(1), height.max(1))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clamp_size_preserves_aspect() {
        assert_eq!(clamp_size(4096, 1920, 1080), (1920, 1080));
        let (w, h) = clamp_size(4096, 8192, 4096);
        assert_eq!(w, 4096);
        assert_eq!(h, 2048);
    }

    #[test]
    fn test_clamp_size_never_zero() {
        assert_eq!(clamp_size(1024, 0, 0), (1, 1));
        let (w, h) = clamp_size(16, 100_000, 1);
        assert!(w >= 1 && w <= 16);
        assert!(h >= 1);
    }
}
