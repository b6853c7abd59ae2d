//! Offscreen capture target
//!
//! One color + depth pair shared by every shell capture in a frame. The
//! textures are recreated only when the requested pixel size changes; a
//! resize therefore costs exactly one reallocation before the next composite.

use log::debug;

/// Requested capture resolution: the output framebuffer size scaled by a
/// density factor.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TargetSpec {
    pub width: u32,
    pub height: u32,
    /// Capture resolution relative to the framebuffer, (0, 1] in practice
    pub density: f32,
}

impl TargetSpec {
    pub fn new(width: u32, height: u32, density: f32) -> Self {
        Self {
            width,
            height,
            density,
        }
    }

    /// Concrete texture size: floor of the scaled framebuffer, never zero.
    pub fn pixel_size(&self) -> (u32, u32) {
        (
            ((self.width as f32 * self.density).floor() as u32).max(1),
            ((self.height as f32 * self.density).floor() as u32).max(1),
        )
    }

    /// Whether an existing allocation at `other` can serve this spec.
    pub fn matches(&self, other: &TargetSpec) -> bool {
        self.pixel_size() == other.pixel_size()
    }
}

/// The reusable capture render target.
pub struct OffscreenTarget {
    spec: TargetSpec,
    pub color: wgpu::Texture,
    pub color_view: wgpu::TextureView,
    pub depth: wgpu::Texture,
    pub depth_view: wgpu::TextureView,
    reallocations: u32,
}

impl OffscreenTarget {
    pub const COLOR_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Rgba16Float;
    pub const DEPTH_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Depth32Float;

    pub fn new(device: &wgpu::Device, spec: TargetSpec) -> Self {
        let (color, color_view, depth, depth_view) = Self::create_textures(device, spec);
        Self {
            spec,
            color,
            color_view,
            depth,
            depth_view,
            reallocations: 1,
        }
    }

    /// Reallocate if and only if the spec's pixel size stopped matching.
    /// Returns true when a reallocation happened.
    pub fn ensure(&mut self, device: &wgpu::Device, spec: TargetSpec) -> bool {
        let previous = self.spec.pixel_size();
        if !adopt_spec(&mut self.spec, spec) {
            return false;
        }
        debug!(
            "offscreen target resize {:?} -> {:?}",
            previous,
            self.spec.pixel_size()
        );
        let (color, color_view, depth, depth_view) = Self::create_textures(device, spec);
        self.color = color;
        self.color_view = color_view;
        self.depth = depth;
        self.depth_view = depth_view;
        self.spec = spec;
        self.reallocations += 1;
        true
    }

    pub fn spec(&self) -> TargetSpec {
        self.spec
    }

    /// Total allocations since creation, for tests and diagnostics.
    pub fn reallocations(&self) -> u32 {
        self.reallocations
    }

    fn create_textures(
        device: &wgpu::Device,
        spec: TargetSpec,
    ) -> (
        wgpu::Texture,
        wgpu::TextureView,
        wgpu::Texture,
        wgpu::TextureView,
    ) {
        let (width, height) = spec.pixel_size();
        let size = wgpu::Extent3d {
            width,
            height,
            depth_or_array_layers: 1,
        };

        let color = device.create_texture(&wgpu::TextureDescriptor {
            label: Some("transmission-capture-color"),
            size,
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: Self::COLOR_FORMAT,
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT | wgpu::TextureUsages::TEXTURE_BINDING,
            view_formats: &[],
        });
        let depth = device.create_texture(&wgpu::TextureDescriptor {
            label: Some("transmission-capture-depth"),
            size,
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: Self::DEPTH_FORMAT,
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT | wgpu::TextureUsages::TEXTURE_BINDING,
            view_formats: &[],
        });

        let color_view = color.create_view(&Default::default());
        let depth_view = depth.create_view(&Default::default());
        (color, color_view, depth, depth_view)
    }
}

/// Store `spec`, reporting whether the switch needs new textures. Split from
/// `ensure` so the reallocation accounting is testable without a device.
fn adopt_spec(current: &mut TargetSpec, spec: TargetSpec) -> bool {
    let realloc = !spec.matches(current);
    *current = spec;
    realloc
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pixel_size_floors_and_clamps() {
        assert_eq!(TargetSpec::new(1920, 1080, 0.5).pixel_size(), (960, 540));
        assert_eq!(TargetSpec::new(101, 51, 0.5).pixel_size(), (50, 25));
        assert_eq!(TargetSpec::new(3, 3, 0.1).pixel_size(), (1, 1));
        assert_eq!(TargetSpec::new(0, 0, 1.0).pixel_size(), (1, 1));
    }

    #[test]
    fn test_matches_compares_pixel_size() {
        let a = TargetSpec::new(100, 100, 0.5);
        let b = TargetSpec::new(50, 50, 1.0);
        assert!(a.matches(&b));

        let c = TargetSpec::new(100, 100, 1.0);
        assert!(!a.matches(&c));

        // Density change below the floor granularity does not force a realloc.
        let d = TargetSpec::new(100, 100, 0.509);
        assert!(a.matches(&d));
    }

    #[test]
    fn test_resize_costs_exactly_one_reallocation() {
        let mut spec = TargetSpec::new(800, 600, 1.0);
        // Counts as OffscreenTarget does: one for the initial allocation.
        let mut reallocations = 1u32;
        let frames = [
            TargetSpec::new(800, 600, 1.0),
            TargetSpec::new(800, 600, 1.0),
            TargetSpec::new(1024, 768, 1.0),
            TargetSpec::new(1024, 768, 1.0),
            TargetSpec::new(1024, 768, 1.0),
        ];
        for requested in frames {
            if adopt_spec(&mut spec, requested) {
                reallocations += 1;
            }
        }
        assert_eq!(reallocations, 2);
        assert_eq!(spec.pixel_size(), (1024, 768));
    }
}
