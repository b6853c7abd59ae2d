//! Environment probe building
//!
//! Turns one equirectangular Radiance HDR panorama into a mipped cube probe.
//! The resample and mip chain run on the CPU so they stay testable; the GPU
//! only ever sees the finished `Rgba16Float` cube. One probe is shared
//! read-only by the background, metal, and glass passes.

use std::path::{Path, PathBuf};

use glam::Vec3;
use half::f16;
use log::info;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ProbeError {
    #[error("failed to load probe image: {0}")]
    Image(#[from] image::ImageError),
    #[error("probe image has zero dimensions")]
    EmptyImage,
}

/// Decoded equirectangular panorama, linear RGBA f32.
pub struct EquirectImage {
    width: u32,
    height: u32,
    texels: Vec<f32>,
}

impl EquirectImage {
    pub fn load(path: &Path) -> Result<Self, ProbeError> {
        let image = image::open(path)?.to_rgba32f();
        let (width, height) = image.dimensions();
        Self::from_raw(width, height, image.into_raw())
    }

    pub fn from_raw(width: u32, height: u32, texels: Vec<f32>) -> Result<Self, ProbeError> {
        if width == 0 || height == 0 || texels.len() != (width * height * 4) as usize {
            return Err(ProbeError::EmptyImage);
        }
        Ok(Self {
            width,
            height,
            texels,
        })
    }

    fn texel(&self, x: u32, y: u32) -> [f32; 4] {
        let i = ((y * self.width + x) * 4) as usize;
        [
            self.texels[i],
            self.texels[i + 1],
            self.texels[i + 2],
            self.texels[i + 3],
        ]
    }

    /// Bilinear sample along a world direction: longitude wraps, latitude
    /// clamps at the poles.
    pub fn sample(&self, dir: Vec3) -> [f32; 4] {
        let dir = dir.normalize_or_zero();
        let u = dir.z.atan2(dir.x) / std::f32::consts::TAU + 0.5;
        let v = dir.y.clamp(-1.0, 1.0).acos() / std::f32::consts::PI;

        let x = u * self.width as f32 - 0.5;
        let y = (v * self.height as f32 - 0.5).clamp(0.0, self.height as f32 - 1.0);

        let x0 = x.floor();
        let y0 = y.floor();
        let fx = x - x0;
        let fy = y - y0;

        let wrap_x = |x: f32| -> u32 { (x.rem_euclid(self.width as f32)) as u32 % self.width };
        let clamp_y = |y: f32| -> u32 { (y.max(0.0) as u32).min(self.height - 1) };

        let (x0i, x1i) = (wrap_x(x0), wrap_x(x0 + 1.0));
        let (y0i, y1i) = (clamp_y(y0), clamp_y(y0 + 1.0));

        let mut out = [0.0f32; 4];
        let t00 = self.texel(x0i, y0i);
        let t10 = self.texel(x1i, y0i);
        let t01 = self.texel(x0i, y1i);
        let t11 = self.texel(x1i, y1i);
        for c in 0..4 {
            let top = t00[c] * (1.0 - fx) + t10[c] * fx;
            let bottom = t01[c] * (1.0 - fx) + t11[c] * fx;
            out[c] = top * (1.0 - fy) + bottom * fy;
        }
        out
    }
}

/// World direction through a cube face texel. `face` follows the cube layer
/// order (+X, -X, +Y, -Y, +Z, -Z); `u`/`v` run [-1, 1] across the face.
pub fn face_direction(face: u32, u: f32, v: f32) -> Vec3 {
    match face {
        0 => Vec3::new(1.0, -v, -u),
        1 => Vec3::new(-1.0, -v, u),
        2 => Vec3::new(u, 1.0, v),
        3 => Vec3::new(u, -1.0, -v),
        4 => Vec3::new(u, -v, 1.0),
        _ => Vec3::new(-u, -v, -1.0),
    }
}

/// CPU-side cube probe: per mip level, six faces of RGBA f16 texels.
pub struct CubeProbeData {
    pub face_size: u32,
    /// `levels[mip][face]` holds `size(mip)^2 * 4` half floats
    pub levels: Vec<[Vec<f16>; 6]>,
}

impl CubeProbeData {
    pub fn mip_count(&self) -> u32 {
        self.levels.len() as u32
    }

    pub fn mip_size(&self, mip: u32) -> u32 {
        (self.face_size >> mip).max(1)
    }
}

/// Resample the panorama onto cube faces and box-filter the full mip chain.
pub fn build_cube_data(equirect: &EquirectImage, face_size: u32) -> CubeProbeData {
    let face_size = face_size.max(1);
    let mip_count = 32 - face_size.leading_zeros();

    // Working chain in f32, packed to f16 at the end.
    let mut chain: Vec<[Vec<f32>; 6]> = Vec::with_capacity(mip_count as usize);

    let mut base: [Vec<f32>; 6] = Default::default();
    for (face, texels) in base.iter_mut().enumerate() {
        texels.reserve((face_size * face_size * 4) as usize);
        for y in 0..face_size {
            for x in 0..face_size {
                let u = (x as f32 + 0.5) / face_size as f32 * 2.0 - 1.0;
                let v = (y as f32 + 0.5) / face_size as f32 * 2.0 - 1.0;
                let sample = equirect.sample(face_direction(face as u32, u, v));
                texels.extend_from_slice(&sample);
            }
        }
    }
    chain.push(base);

    for mip in 1..mip_count {
        let src_size = (face_size >> (mip - 1)).max(1);
        let dst_size = (face_size >> mip).max(1);
        let prev = &chain[(mip - 1) as usize];

        let mut level: [Vec<f32>; 6] = Default::default();
        for (face, texels) in level.iter_mut().enumerate() {
            let src = &prev[face];
            texels.reserve((dst_size * dst_size * 4) as usize);
            for y in 0..dst_size {
                for x in 0..dst_size {
                    let x0 = (x * 2).min(src_size - 1);
                    let y0 = (y * 2).min(src_size - 1);
                    let x1 = (x0 + 1).min(src_size - 1);
                    let y1 = (y0 + 1).min(src_size - 1);
                    for c in 0..4usize {
                        let at = |px: u32, py: u32| src[((py * src_size + px) * 4) as usize + c];
                        texels.push(
                            (at(x0, y0) + at(x1, y0) + at(x0, y1) + at(x1, y1)) * 0.25,
                        );
                    }
                }
            }
        }
        chain.push(level);
    }

    let levels = chain
        .into_iter()
        .map(|faces| faces.map(|texels| texels.into_iter().map(f16::from_f32).collect()))
        .collect();

    CubeProbeData { face_size, levels }
}

/// Uploaded cube probe with its sampling state.
pub struct ProbeTexture {
    pub texture: wgpu::Texture,
    pub view: wgpu::TextureView,
    pub sampler: wgpu::Sampler,
}

/// Upload the probe as an `Rgba16Float` cube texture with its full mip chain
/// and a trilinear sampler.
pub fn upload_probe(
    device: &wgpu::Device,
    queue: &wgpu::Queue,
    data: &CubeProbeData,
) -> ProbeTexture {
    let texture = device.create_texture(&wgpu::TextureDescriptor {
        label: Some("environment-probe"),
        size: wgpu::Extent3d {
            width: data.face_size,
            height: data.face_size,
            depth_or_array_layers: 6,
        },
        mip_level_count: data.mip_count(),
        sample_count: 1,
        dimension: wgpu::TextureDimension::D2,
        format: wgpu::TextureFormat::Rgba16Float,
        usage: wgpu::TextureUsages::TEXTURE_BINDING | wgpu::TextureUsages::COPY_DST,
        view_formats: &[],
    });

    for (mip, faces) in data.levels.iter().enumerate() {
        let size = data.mip_size(mip as u32);
        for (face, texels) in faces.iter().enumerate() {
            queue.write_texture(
                wgpu::ImageCopyTexture {
                    texture: &texture,
                    mip_level: mip as u32,
                    origin: wgpu::Origin3d {
                        x: 0,
                        y: 0,
                        z: face as u32,
                    },
                    aspect: wgpu::TextureAspect::All,
                },
                bytemuck::cast_slice(texels),
                wgpu::ImageDataLayout {
                    offset: 0,
                    bytes_per_row: Some(size * 8),
                    rows_per_image: Some(size),
                },
                wgpu::Extent3d {
                    width: size,
                    height: size,
                    depth_or_array_layers: 1,
                },
            );
        }
    }

    let view = texture.create_view(&wgpu::TextureViewDescriptor {
        label: Some("environment-probe-view"),
        dimension: Some(wgpu::TextureViewDimension::Cube),
        ..Default::default()
    });

    let sampler = device.create_sampler(&wgpu::SamplerDescriptor {
        label: Some("environment-probe-sampler"),
        address_mode_u: wgpu::AddressMode::ClampToEdge,
        address_mode_v: wgpu::AddressMode::ClampToEdge,
        address_mode_w: wgpu::AddressMode::ClampToEdge,
        mag_filter: wgpu::FilterMode::Linear,
        min_filter: wgpu::FilterMode::Linear,
        mipmap_filter: wgpu::FilterMode::Linear,
        ..Default::default()
    });

    ProbeTexture {
        texture,
        view,
        sampler,
    }
}

/// Builds and caches the probe for the current panorama path.
pub struct ProbeBuilder {
    face_size: u32,
    loaded: Option<PathBuf>,
    texture: Option<ProbeTexture>,
}

impl ProbeBuilder {
    pub fn new(face_size: u32) -> Self {
        Self {
            face_size: face_size.max(1),
            loaded: None,
            texture: None,
        }
    }

    /// True when `load` would actually rebuild for this path.
    pub fn needs_rebuild(&self, path: &Path) -> bool {
        self.loaded.as_deref() != Some(path) || self.texture.is_none()
    }

    /// Load the panorama and (re)build the cube probe, reusing the cached
    /// texture when the path has not changed.
    pub fn load(
        &mut self,
        device: &wgpu::Device,
        queue: &wgpu::Queue,
        path: &Path,
    ) -> Result<&ProbeTexture, ProbeError> {
        if self.needs_rebuild(path) {
            let equirect = EquirectImage::load(path)?;
            let data = build_cube_data(&equirect, self.face_size);
            info!(
                "built environment probe from {:?}: {}px faces, {} mips",
                path,
                data.face_size,
                data.mip_count()
            );
            self.loaded = Some(path.to_path_buf());
            self.texture = Some(upload_probe(device, queue, &data));
        }
        // `needs_rebuild` is true whenever the texture is absent, so the
        // rebuild branch above guarantees one here.
        self.texture.as_ref().ok_or(ProbeError::EmptyImage)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn solid_equirect(width: u32, height: u32, value: [f32; 4]) -> EquirectImage {
        let texels = (0..width * height).flat_map(|_| value).collect();
        EquirectImage::from_raw(width, height, texels).unwrap()
    }

    #[test]
    fn test_face_centers_hit_axes() {
        assert_eq!(face_direction(0, 0.0, 0.0), Vec3::X);
        assert_eq!(face_direction(1, 0.0, 0.0), -Vec3::X);
        assert_eq!(face_direction(2, 0.0, 0.0), Vec3::Y);
        assert_eq!(face_direction(3, 0.0, 0.0), -Vec3::Y);
        assert_eq!(face_direction(4, 0.0, 0.0), Vec3::Z);
        assert_eq!(face_direction(5, 0.0, 0.0), -Vec3::Z);
    }

    #[test]
    fn test_equirect_cardinal_sampling() {
        // Top half white, bottom half black.
        let width = 8u32;
        let height = 8u32;
        let mut texels = Vec::new();
        for y in 0..height {
            let v = if y < height / 2 { 1.0 } else { 0.0 };
            for _ in 0..width {
                texels.extend_from_slice(&[v, v, v, 1.0]);
            }
        }
        let image = EquirectImage::from_raw(width, height, texels).unwrap();

        assert!(image.sample(Vec3::Y)[0] > 0.9);
        assert!(image.sample(-Vec3::Y)[0] < 0.1);
    }

    #[test]
    fn test_mip_chain_sizes() {
        let equirect = solid_equirect(4, 2, [0.5, 0.5, 0.5, 1.0]);
        let data = build_cube_data(&equirect, 8);
        assert_eq!(data.mip_count(), 4);
        assert_eq!(data.mip_size(0), 8);
        assert_eq!(data.mip_size(3), 1);
        for (mip, faces) in data.levels.iter().enumerate() {
            let size = data.mip_size(mip as u32);
            for face in faces {
                assert_eq!(face.len(), (size * size * 4) as usize);
            }
        }
    }

    #[test]
    fn test_mips_preserve_constant_color() {
        let equirect = solid_equirect(4, 2, [0.25, 0.5, 0.75, 1.0]);
        let data = build_cube_data(&equirect, 4);
        let last = &data.levels[data.mip_count() as usize - 1];
        for face in last {
            assert!((face[0].to_f32() - 0.25).abs() < 1e-2);
            assert!((face[1].to_f32() - 0.5).abs() < 1e-2);
            assert!((face[2].to_f32() - 0.75).abs() < 1e-2);
        }
    }

    #[test]
    fn test_needs_rebuild_tracks_path() {
        let builder = ProbeBuilder::new(16);
        assert!(builder.needs_rebuild(Path::new("a.hdr")));
        // The cached-path case needs a device; covered by the predicate shape:
        // a builder with no texture always reports a rebuild.
        assert!(builder.needs_rebuild(Path::new("b.hdr")));
    }

    #[test]
    fn test_zero_sized_image_rejected() {
        assert!(matches!(
            EquirectImage::from_raw(0, 4, vec![]),
            Err(ProbeError::EmptyImage)
        ));
        assert!(matches!(
            EquirectImage::from_raw(2, 2, vec![0.0; 3]),
            Err(ProbeError::EmptyImage)
        ));
    }
}
