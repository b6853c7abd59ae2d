//! Mesh data and test geometry

use bytemuck::{Pod, Zeroable};
use glam::{Vec2, Vec3, Vec4};

/// Vertex layout shared by every pipeline in the crate.
#[repr(C)]
#[derive(Debug, Clone, Copy, Pod, Zeroable)]
pub struct Vertex {
    pub position: Vec3,
    pub normal: Vec3,
    pub uv: Vec2,
    /// xyz = tangent, w = handedness
    pub tangent: Vec4,
}

/// A mesh with vertex and index data
#[derive(Debug, Clone)]
pub struct Mesh {
    pub vertices: Vec<Vertex>,
    pub indices: Vec<u32>,
    pub name: String,
}

impl Mesh {
    pub fn new(name: &str) -> Self {
        Self {
            vertices: Vec::new(),
            indices: Vec::new(),
            name: name.to_string(),
        }
    }

    pub fn vertex_count(&self) -> usize {
        self.vertices.len()
    }

    pub fn index_count(&self) -> usize {
        self.indices.len()
    }

    pub fn triangle_count(&self) -> usize {
        self.indices.len() / 3
    }

    /// Get vertex data as bytes
    pub fn vertex_bytes(&self) -> &[u8] {
        bytemuck::cast_slice(&self.vertices)
    }

    /// Get index data as bytes
    pub fn index_bytes(&self) -> &[u8] {
        bytemuck::cast_slice(&self.indices)
    }

    /// Flip winding and normals, turning a front-face shell into its back-face
    /// counterpart.
    pub fn inverted(&self, name: &str) -> Self {
        let mut mesh = self.clone();
        mesh.name = name.to_string();
        for vertex in &mut mesh.vertices {
            vertex.normal = -vertex.normal;
        }
        for triangle in mesh.indices.chunks_exact_mut(3) {
            triangle.swap(1, 2);
        }
        mesh
    }

    /// UV sphere of the given radius, the stand-in for a glass shell layer.
    pub fn shell_sphere(radius: f32, segments: u32, rings: u32) -> Self {
        let mut mesh = Mesh::new("shell_sphere");

        let segment_angle = 2.0 * std::f32::consts::PI / segments as f32;
        let ring_angle = std::f32::consts::PI / rings as f32;

        for ring in 0..=rings {
            let phi = ring as f32 * ring_angle;
            let y = phi.cos();
            let ring_radius = phi.sin();

            for segment in 0..=segments {
                let theta = segment as f32 * segment_angle;
                let x = ring_radius * theta.cos();
                let z = ring_radius * theta.sin();

                let normal = Vec3::new(x, y, z).normalize_or_zero();
                let tangent = Vec3::new(-theta.sin(), 0.0, theta.cos());

                mesh.vertices.push(Vertex {
                    position: Vec3::new(x, y, z) * radius,
                    normal,
                    uv: Vec2::new(
                        segment as f32 / segments as f32,
                        ring as f32 / rings as f32,
                    ),
                    tangent: tangent.extend(1.0),
                });
            }
        }

        for ring in 0..rings {
            for segment in 0..segments {
                let current = ring * (segments + 1) + segment;
                let next = current + segments + 1;

                mesh.indices.extend_from_slice(&[
                    current,
                    next,
                    current + 1,
                    current + 1,
                    next,
                    next + 1,
                ]);
            }
        }

        mesh
    }

    /// Open cylinder along Y, the stand-in for a metal arm or stem.
    pub fn arm_cylinder(radius: f32, height: f32, segments: u32) -> Self {
        let mut mesh = Mesh::new("arm_cylinder");

        let half_height = height / 2.0;
        let angle_step = 2.0 * std::f32::consts::PI / segments as f32;

        for i in 0..=segments {
            let angle = i as f32 * angle_step;
            let normal = Vec3::new(angle.cos(), 0.0, angle.sin());
            let tangent = Vec4::new(-angle.sin(), 0.0, angle.cos(), 1.0);
            let u = i as f32 / segments as f32;

            mesh.vertices.push(Vertex {
                position: Vec3::new(normal.x * radius, -half_height, normal.z * radius),
                normal,
                uv: Vec2::new(u, 1.0),
                tangent,
            });
            mesh.vertices.push(Vertex {
                position: Vec3::new(normal.x * radius, half_height, normal.z * radius),
                normal,
                uv: Vec2::new(u, 0.0),
                tangent,
            });
        }

        for i in 0..segments {
            let base = i * 2;
            mesh.indices.extend_from_slice(&[
                base,
                base + 2,
                base + 1,
                base + 1,
                base + 2,
                base + 3,
            ]);
        }

        mesh
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_shell_sphere_counts() {
        let mesh = Mesh::shell_sphere(1.0, 16, 8);
        assert_eq!(mesh.vertex_count(), 17 * 9);
        assert_eq!(mesh.index_count(), 16 * 8 * 6);
        assert_eq!(mesh.triangle_count(), 16 * 8 * 2);
    }

    #[test]
    fn test_shell_sphere_radius() {
        let mesh = Mesh::shell_sphere(0.25, 8, 4);
        for v in &mesh.vertices {
            assert!((v.position.length() - 0.25).abs() < 1e-5);
        }
    }

    #[test]
    fn test_arm_cylinder_counts() {
        let mesh = Mesh::arm_cylinder(0.02, 0.5, 12);
        assert_eq!(mesh.vertex_count(), 13 * 2);
        assert_eq!(mesh.triangle_count(), 12 * 2);
    }

    #[test]
    fn test_inverted_flips_normals_and_winding() {
        let mesh = Mesh::shell_sphere(1.0, 8, 4);
        let inverted = mesh.inverted("back");
        assert_eq!(inverted.vertex_count(), mesh.vertex_count());
        assert_eq!(inverted.indices[1], mesh.indices[2]);
        assert_eq!(inverted.indices[2], mesh.indices[1]);
        for (a, b) in mesh.vertices.iter().zip(inverted.vertices.iter()) {
            assert_eq!(a.normal, -b.normal);
        }
    }

    #[test]
    fn test_vertex_bytes_length() {
        let mesh = Mesh::arm_cylinder(0.02, 0.5, 6);
        assert_eq!(
            mesh.vertex_bytes().len(),
            mesh.vertex_count() * std::mem::size_of::<Vertex>()
        );
        assert_eq!(mesh.index_bytes().len(), mesh.index_count() * 4);
    }
}
