//! Scene data
//!
//! Plain data, no ECS: the composition is small and the transmission renderer
//! needs cheap whole-scene visibility snapshots, so surfaces live in one flat
//! vector indexed by stable ids.

mod camera;
pub mod classify;
mod light;
pub mod shell;
mod transform;

pub use camera::{Camera, CameraUniformData};
pub use classify::{
    chandelier_rules, Classification, ClassificationRule, ClassificationTable, MaterialKind,
    NameMatcher,
};
pub use light::{
    gather_lights, GpuLightData, Light, LightArrayData, LightKind, MAX_SHELL_LIGHTS,
};
pub use shell::{composite_order, validate_dense, ShellDescriptor, ShellError};
pub use transform::Transform;

use glam::Vec3;

/// Where a surface's instances come from.
#[derive(Debug, Clone, Copy)]
pub enum InstanceSource {
    /// One instance with its own transform
    Single(Transform),
    /// All instances of one batch produced by the instance batcher
    Batch(usize),
}

/// A renderable surface in the scene
#[derive(Debug, Clone)]
pub struct Surface {
    pub name: String,
    pub mesh_id: usize,
    pub material_id: usize,
    pub material: MaterialKind,
    /// Present on translucent shell surfaces
    pub shell: Option<ShellDescriptor>,
    pub visible: bool,
    /// Never appears in transmission captures (mirrors, debug helpers)
    pub exclude_from_capture: bool,
    pub source: InstanceSource,
}

impl Surface {
    pub fn new(name: impl Into<String>, mesh_id: usize, material_id: usize) -> Self {
        Self {
            name: name.into(),
            mesh_id,
            material_id,
            material: MaterialKind::Metal,
            shell: None,
            visible: true,
            exclude_from_capture: false,
            source: InstanceSource::Single(Transform::default()),
        }
    }

    pub fn with_shell(mut self, shell: ShellDescriptor) -> Self {
        self.shell = Some(shell);
        self.material = MaterialKind::Glass;
        self
    }

    pub fn with_source(mut self, source: InstanceSource) -> Self {
        self.source = source;
        self
    }

    pub fn excluded_from_capture(mut self) -> Self {
        self.exclude_from_capture = true;
        self
    }
}

/// The scene containing all renderable content
pub struct Scene {
    pub camera: Camera,
    pub lights: Vec<Light>,
    pub surfaces: Vec<Surface>,
    pub ambient_light: Vec3,
    /// When set, only lights whose names appear here contribute to shading.
    pub enabled_light_names: Option<Vec<String>>,
}

impl Scene {
    pub fn new() -> Self {
        Self {
            camera: Camera::default(),
            lights: Vec::new(),
            surfaces: Vec::new(),
            ambient_light: Vec3::new(0.03, 0.03, 0.03),
            enabled_light_names: None,
        }
    }

    /// Add a surface, returning its stable id
    pub fn add_surface(&mut self, surface: Surface) -> usize {
        let id = self.surfaces.len();
        self.surfaces.push(surface);
        id
    }

    /// Lights passing the optional name filter, in scene order.
    pub fn enabled_lights(&self) -> impl Iterator<Item = &Light> {
        self.lights.iter().filter(move |light| {
            self.enabled_light_names
                .as_ref()
                .map_or(true, |names| names.iter().any(|n| n == &light.name))
        })
    }

    /// Distinct shell descriptors present in the scene, in composite order.
    pub fn shell_schedule(&self) -> Vec<ShellDescriptor> {
        let descriptors: Vec<ShellDescriptor> =
            self.surfaces.iter().filter_map(|s| s.shell).collect();
        composite_order(&descriptors)
    }

    /// Indices of surfaces tagged with exactly this descriptor.
    pub fn surfaces_with_shell(&self, descriptor: ShellDescriptor) -> Vec<usize> {
        self.surfaces
            .iter()
            .enumerate()
            .filter(|(_, s)| s.shell == Some(descriptor))
            .map(|(i, _)| i)
            .collect()
    }
}

impl Default for Scene {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_shell_schedule_orders_and_dedups() {
        let mut scene = Scene::new();
        scene.add_surface(Surface::new("outer", 0, 0).with_shell(ShellDescriptor::front(1)));
        scene.add_surface(Surface::new("inner_back", 1, 0).with_shell(ShellDescriptor::back(0)));
        scene.add_surface(Surface::new("inner", 2, 0).with_shell(ShellDescriptor::front(0)));
        scene.add_surface(Surface::new("inner_b", 3, 0).with_shell(ShellDescriptor::front(0)));
        scene.add_surface(Surface::new("stem", 4, 1));

        assert_eq!(
            scene.shell_schedule(),
            vec![
                ShellDescriptor::front(0),
                ShellDescriptor::back(0),
                ShellDescriptor::front(1),
            ]
        );
        assert_eq!(scene.surfaces_with_shell(ShellDescriptor::front(0)), vec![2, 3]);
        assert!(scene.surfaces_with_shell(ShellDescriptor::back(1)).is_empty());
    }

    #[test]
    fn test_light_name_filter() {
        let mut scene = Scene::new();
        scene
            .lights
            .push(Light::point("key", Vec3::Y, Vec3::ONE, 1.0));
        scene
            .lights
            .push(Light::point("fill", Vec3::X, Vec3::ONE, 0.5));

        assert_eq!(scene.enabled_lights().count(), 2);

        scene.enabled_light_names = Some(vec!["key".to_owned()]);
        let names: Vec<&str> = scene.enabled_lights().map(|l| l.name.as_str()).collect();
        assert_eq!(names, vec!["key"]);
    }
}
