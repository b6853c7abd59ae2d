//! Light types and the fixed-capacity GPU light array

use bytemuck::{Pod, Zeroable};
use glam::{Vec3, Vec4};
use log::warn;

/// Size of the light array in the glass and metal shader uniforms.
pub const MAX_SHELL_LIGHTS: usize = 4;

/// A named scene light.
///
/// Names exist so a capture pass can enable a subset of lights for a
/// particular material without touching the scene.
#[derive(Debug, Clone)]
pub struct Light {
    pub name: String,
    pub kind: LightKind,
    pub color: Vec3,
    pub intensity: f32,
}

#[derive(Debug, Clone, Copy)]
pub enum LightKind {
    Point { position: Vec3, range: f32 },
    Directional { direction: Vec3 },
}

impl Light {
    pub fn point(name: impl Into<String>, position: Vec3, color: Vec3, intensity: f32) -> Self {
        Self {
            name: name.into(),
            kind: LightKind::Point {
                position,
                range: 10.0,
            },
            color,
            intensity,
        }
    }

    pub fn directional(
        name: impl Into<String>,
        direction: Vec3,
        color: Vec3,
        intensity: f32,
    ) -> Self {
        Self {
            name: name.into(),
            kind: LightKind::Directional {
                direction: direction.normalize(),
            },
            color,
            intensity,
        }
    }

    /// Convert to GPU data format
    pub fn to_gpu_data(&self) -> GpuLightData {
        match self.kind {
            LightKind::Point { position, range } => GpuLightData {
                position_range: position.extend(range),
                color_intensity: self.color.extend(self.intensity),
                direction_type: Vec4::new(0.0, 0.0, 0.0, 0.0),
            },
            LightKind::Directional { direction } => GpuLightData {
                position_range: Vec4::new(0.0, 0.0, 0.0, f32::INFINITY),
                color_intensity: self.color.extend(self.intensity),
                direction_type: direction.extend(1.0),
            },
        }
    }
}

/// GPU-friendly light data
#[repr(C)]
#[derive(Debug, Clone, Copy, Pod, Zeroable)]
pub struct GpuLightData {
    /// xyz = position, w = range (infinite for directional)
    pub position_range: Vec4,
    /// xyz = color, w = intensity
    pub color_intensity: Vec4,
    /// xyz = direction, w = light type (0 = point, 1 = directional)
    pub direction_type: Vec4,
}

/// Uniform block holding the active lights for one shading pass.
#[repr(C)]
#[derive(Debug, Clone, Copy, Pod, Zeroable)]
pub struct LightArrayData {
    pub lights: [GpuLightData; MAX_SHELL_LIGHTS],
    pub count: u32,
    pub _padding: [u32; 3],
}

/// Pack lights into the fixed-capacity array, truncating past capacity.
pub fn gather_lights<'a>(lights: impl IntoIterator<Item = &'a Light>) -> LightArrayData {
    let mut data = LightArrayData {
        lights: [GpuLightData::zeroed(); MAX_SHELL_LIGHTS],
        count: 0,
        _padding: [0; 3],
    };
    for light in lights {
        if data.count as usize == MAX_SHELL_LIGHTS {
            warn!(
                "more than {} lights active; dropping {:?}",
                MAX_SHELL_LIGHTS, light.name
            );
            continue;
        }
        data.lights[data.count as usize] = light.to_gpu_data();
        data.count += 1;
    }
    data
}

#[cfg(test)]
mod tests {
    use super::*;

    fn light(name: &str) -> Light {
        Light::point(name, Vec3::ZERO, Vec3::ONE, 1.0)
    }

    #[test]
    fn test_gather_packs_in_order() {
        let lights = vec![
            Light::point("a", Vec3::X, Vec3::ONE, 2.0),
            Light::directional("b", -Vec3::Y, Vec3::ONE, 1.0),
        ];
        let data = gather_lights(&lights);
        assert_eq!(data.count, 2);
        assert_eq!(data.lights[0].position_range.x, 1.0);
        assert_eq!(data.lights[0].direction_type.w, 0.0);
        assert_eq!(data.lights[1].direction_type.w, 1.0);
    }

    #[test]
    fn test_gather_truncates_at_capacity() {
        let lights: Vec<Light> = (0..6).map(|i| light(&format!("l{}", i))).collect();
        let data = gather_lights(&lights);
        assert_eq!(data.count as usize, MAX_SHELL_LIGHTS);
    }
}
