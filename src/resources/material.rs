//! Material definitions
//!
//! Two families: lit metal for the opaque fixture parts, and the glass
//! material whose parameters drive the transmission shader. Both are explicit
//! per-surface configuration; there is no global material state.

use bytemuck::{Pod, Zeroable};
use glam::{Vec3, Vec4};

/// Lit metal material for opaque surfaces
#[derive(Debug, Clone)]
pub struct Material {
    pub name: String,
    pub base_color: Vec4,
    pub metallic: f32,
    pub roughness: f32,
    pub emissive: Vec3,
    pub emissive_strength: f32,
}

impl Default for Material {
    fn default() -> Self {
        Self {
            name: "default".to_string(),
            base_color: Vec4::new(1.0, 1.0, 1.0, 1.0),
            metallic: 0.0,
            roughness: 0.5,
            emissive: Vec3::ZERO,
            emissive_strength: 1.0,
        }
    }
}

impl Material {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            ..Default::default()
        }
    }

    pub fn with_base_color(mut self, color: Vec4) -> Self {
        self.base_color = color;
        self
    }

    pub fn with_metallic(mut self, metallic: f32) -> Self {
        self.metallic = metallic;
        self
    }

    pub fn with_roughness(mut self, roughness: f32) -> Self {
        self.roughness = roughness;
        self
    }

    pub fn with_emissive(mut self, emissive: Vec3, strength: f32) -> Self {
        self.emissive = emissive;
        self.emissive_strength = strength;
        self
    }

    /// Create a uniform data struct for GPU
    pub fn uniform_data(&self) -> MaterialUniformData {
        MaterialUniformData {
            base_color: self.base_color,
            metallic_roughness: [self.metallic, self.roughness, 0.0, 0.0],
            emissive: self.emissive.extend(self.emissive_strength),
        }
    }

    pub fn metal(color: Vec3, roughness: f32) -> Self {
        Self::new("metal")
            .with_base_color(color.extend(1.0))
            .with_metallic(1.0)
            .with_roughness(roughness)
    }

    pub fn gold() -> Self {
        Self::metal(Vec3::new(1.0, 0.766, 0.336), 0.3)
    }

    pub fn silver() -> Self {
        Self::metal(Vec3::new(0.972, 0.960, 0.915), 0.2)
    }
}

/// Material uniform data for GPU
#[repr(C)]
#[derive(Debug, Clone, Copy, Pod, Zeroable)]
pub struct MaterialUniformData {
    pub base_color: Vec4,
    pub metallic_roughness: [f32; 4], // x=metallic, y=roughness, zw=padding
    pub emissive: Vec4,               // xyz=emissive, w=strength
}

/// Parameters of the layered glass shader.
///
/// Defaults give clear lead crystal under a bright probe.
#[derive(Debug, Clone)]
pub struct GlassMaterial {
    pub name: String,
    /// Index of refraction
    pub ior: f32,
    /// IOR spread between the red and blue refraction rays
    pub chromatic_aberration: f32,
    pub transmission_intensity: f32,
    pub reflection_intensity: f32,
    /// Luminance below which probe reflections are suppressed
    pub brightness_threshold: f32,
    /// Smoothstep half-width around the threshold
    pub brightness_smoothing: f32,
    /// Toggles the brightness gate entirely
    pub hdr_filter: bool,
    /// Silhouette window for edge reflections: width in view-angle terms
    pub edge_reflection_width: f32,
    pub edge_reflection_power: f32,
    pub edge_reflection_intensity: f32,
    pub absorption_color: Vec3,
    pub absorption_power: f32,
    pub absorption_intensity: f32,
    pub env_intensity: f32,
    pub opacity: f32,
    /// Nominal wall thickness, bounds the refraction march
    pub thickness: f32,
    pub specular_strength: f32,
    pub shininess: f32,
    pub lighting_enabled: bool,
    /// Optional texture overriding the silhouette edge factor
    pub curvature_map: Option<usize>,
    /// Optional texture darkening by object-space position
    pub position_map: Option<usize>,
}

impl Default for GlassMaterial {
    fn default() -> Self {
        Self {
            name: "glass".to_string(),
            ior: 1.5,
            chromatic_aberration: 0.05,
            transmission_intensity: 0.6,
            reflection_intensity: 1.0,
            brightness_threshold: 0.5,
            brightness_smoothing: 0.2,
            hdr_filter: true,
            edge_reflection_width: 3.0,
            edge_reflection_power: 3.0,
            edge_reflection_intensity: 3.0,
            absorption_color: Vec3::new(1.0, 1.0, 1.0),
            absorption_power: 2.0,
            absorption_intensity: 0.0,
            env_intensity: 2.0,
            opacity: 1.0,
            thickness: 0.04,
            specular_strength: 1.0,
            shininess: 1500.0,
            lighting_enabled: true,
            curvature_map: None,
            position_map: None,
        }
    }
}

impl GlassMaterial {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            ..Default::default()
        }
    }

    /// Pack for the glass shader. `back_face` comes from the shell being
    /// drawn, not from the material.
    pub fn uniform_data(&self, back_face: bool) -> GlassUniformData {
        GlassUniformData {
            refraction: Vec4::new(
                self.ior,
                self.chromatic_aberration,
                self.transmission_intensity,
                self.reflection_intensity,
            ),
            brightness: Vec4::new(
                self.brightness_threshold,
                self.brightness_smoothing,
                if self.hdr_filter { 1.0 } else { 0.0 },
                self.env_intensity,
            ),
            edge: Vec4::new(
                self.edge_reflection_width,
                self.edge_reflection_power,
                self.edge_reflection_intensity,
                self.opacity,
            ),
            absorption: self.absorption_color.extend(self.absorption_intensity),
            volume: Vec4::new(
                self.absorption_power,
                self.thickness,
                self.specular_strength,
                self.shininess,
            ),
            flags: [
                if self.lighting_enabled { 1 } else { 0 },
                if self.curvature_map.is_some() { 1 } else { 0 },
                if self.position_map.is_some() { 1 } else { 0 },
                if back_face { 1 } else { 0 },
            ],
        }
    }
}

/// Glass uniform data for GPU
#[repr(C)]
#[derive(Debug, Clone, Copy, Pod, Zeroable)]
pub struct GlassUniformData {
    /// x=ior, y=chromatic aberration, z=transmission intensity, w=reflection intensity
    pub refraction: Vec4,
    /// x=threshold, y=smoothing, z=hdr filter toggle, w=env intensity
    pub brightness: Vec4,
    /// x=edge width, y=edge power, z=edge intensity, w=opacity
    pub edge: Vec4,
    /// xyz=absorption color, w=absorption intensity
    pub absorption: Vec4,
    /// x=absorption power, y=thickness, z=specular strength, w=shininess
    pub volume: Vec4,
    /// x=lighting, y=has curvature map, z=has position map, w=back face
    pub flags: [u32; 4],
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metal_presets() {
        let gold = Material::gold();
        assert_eq!(gold.metallic, 1.0);
        assert!(gold.base_color.x > gold.base_color.z);

        let silver = Material::silver();
        assert!(silver.roughness < gold.roughness);
    }

    #[test]
    fn test_glass_uniform_packing() {
        let glass = GlassMaterial::default();
        let u = glass.uniform_data(true);
        assert_eq!(u.refraction.x, 1.5);
        assert_eq!(u.brightness.z, 1.0);
        assert_eq!(u.flags, [1, 0, 0, 1]);

        let mut dark = GlassMaterial::new("dark");
        dark.hdr_filter = false;
        dark.curvature_map = Some(3);
        let u = dark.uniform_data(false);
        assert_eq!(u.brightness.z, 0.0);
        assert_eq!(u.flags, [1, 1, 0, 0]);
    }

    #[test]
    fn test_glass_edge_reflection_defaults() {
        let glass = GlassMaterial::default();
        assert_eq!(glass.edge_reflection_width, 3.0);
        assert_eq!(glass.edge_reflection_intensity, 3.0);
        let u = glass.uniform_data(false);
        assert_eq!(u.edge.x, 3.0);
        assert_eq!(u.edge.z, 3.0);
    }

    #[test]
    fn test_uniform_size_is_vec4_aligned() {
        assert_eq!(std::mem::size_of::<GlassUniformData>() % 16, 0);
        assert_eq!(std::mem::size_of::<MaterialUniformData>() % 16, 0);
    }
}
