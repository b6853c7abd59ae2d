//! Instance batching
//!
//! Collapses the per-slot layout into one draw per (variant, sub-mesh) pair.
//! All slots sharing a variant render as a single instanced draw; the batcher
//! owns the CPU-side instance arrays and uploads them as vertex buffers.

use bytemuck::{Pod, Zeroable};
use glam::Mat4;
use log::debug;
use wgpu::util::DeviceExt;

use crate::layout::{InstanceTransform, VariantAssignment};
use crate::scene::ShellDescriptor;

/// Per-instance vertex data: the model matrix, consumed by the vertex stage
/// as four vec4 attributes.
#[repr(C)]
#[derive(Debug, Clone, Copy, Pod, Zeroable)]
pub struct InstanceData {
    pub model: Mat4,
}

impl InstanceData {
    pub fn from_transform(t: &InstanceTransform) -> Self {
        Self {
            model: Mat4::from_rotation_translation(t.rotation, t.position),
        }
    }
}

/// One drawable piece of a fixture variant.
#[derive(Debug, Clone, Copy)]
pub struct SubMesh {
    pub mesh_id: usize,
    pub material_id: usize,
    /// Present on translucent pieces
    pub shell: Option<ShellDescriptor>,
}

/// Sub-mesh lists for every variant id, supplied by asset loading.
#[derive(Debug, Clone, Default)]
pub struct VariantAssets {
    sub_meshes: Vec<Vec<SubMesh>>,
}

impl VariantAssets {
    pub fn with_variant_count(count: usize) -> Self {
        Self {
            sub_meshes: vec![Vec::new(); count],
        }
    }

    pub fn push(&mut self, variant: usize, sub_mesh: SubMesh) {
        if variant >= self.sub_meshes.len() {
            self.sub_meshes.resize(variant + 1, Vec::new());
        }
        self.sub_meshes[variant].push(sub_mesh);
    }

    pub fn sub_meshes(&self, variant: usize) -> &[SubMesh] {
        self.sub_meshes.get(variant).map_or(&[], |v| v.as_slice())
    }

    pub fn variant_count(&self) -> usize {
        self.sub_meshes.len()
    }
}

/// One instanced draw: a sub-mesh plus the variant whose instance buffer it
/// shares.
#[derive(Debug, Clone, Copy)]
pub struct InstanceBatch {
    pub variant: usize,
    pub sub_mesh: SubMesh,
}

/// Groups layout slots into instanced draws.
#[derive(Debug, Default)]
pub struct InstanceBatcher {
    variant_instances: Vec<Vec<InstanceData>>,
    batches: Vec<InstanceBatch>,
}

impl InstanceBatcher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Rebuild all batches from scratch.
    ///
    /// Walks slots row-major; each slot's matrix lands at its variant's
    /// running offset, so instance order within a variant matches slot order.
    /// Variants with no slots produce no batch.
    pub fn rebuild(
        &mut self,
        assignment: &VariantAssignment,
        transforms: &[InstanceTransform],
        assets: &VariantAssets,
    ) {
        // Variant ids are not required to be contiguous, so size by the
        // highest id in play rather than the pool size.
        let variant_count = assets
            .variant_count()
            .max(assignment.iter().map(|v| v + 1).max().unwrap_or(0));
        self.variant_instances = vec![Vec::new(); variant_count];
        self.batches.clear();

        for (slot, variant) in assignment.iter().enumerate() {
            if let Some(transform) = transforms.get(slot) {
                self.variant_instances[variant].push(InstanceData::from_transform(transform));
            }
        }

        for variant in 0..variant_count {
            if self.variant_instances[variant].is_empty() {
                continue;
            }
            for &sub_mesh in assets.sub_meshes(variant) {
                self.batches.push(InstanceBatch { variant, sub_mesh });
            }
        }

        debug!(
            "rebuilt {} batches over {} instances",
            self.batches.len(),
            self.total_instances()
        );
    }

    pub fn batches(&self) -> &[InstanceBatch] {
        &self.batches
    }

    pub fn instances(&self, variant: usize) -> &[InstanceData] {
        self.variant_instances
            .get(variant)
            .map_or(&[], |v| v.as_slice())
    }

    pub fn instance_count(&self, variant: usize) -> usize {
        self.instances(variant).len()
    }

    pub fn total_instances(&self) -> usize {
        self.variant_instances.iter().map(Vec::len).sum()
    }

    /// Upload one instance vertex buffer per non-empty variant.
    pub fn upload(&self, device: &wgpu::Device) -> Vec<Option<wgpu::Buffer>> {
        self.variant_instances
            .iter()
            .enumerate()
            .map(|(variant, instances)| {
                if instances.is_empty() {
                    None
                } else {
                    Some(
                        device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
                            label: Some(&format!("instance-buffer-variant-{}", variant)),
                            contents: bytemuck::cast_slice(instances),
                            usage: wgpu::BufferUsages::VERTEX,
                        }),
                    )
                }
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::layout::{default_row_rules, generate, plan, LayoutConfig, VariantSet};

    fn assets_for(set: &VariantSet) -> VariantAssets {
        let mut assets = VariantAssets::with_variant_count(set.len());
        for variant in 0..set.len() {
            assets.push(
                variant,
                SubMesh {
                    mesh_id: variant * 2,
                    material_id: 0,
                    shell: None,
                },
            );
            assets.push(
                variant,
                SubMesh {
                    mesh_id: variant * 2 + 1,
                    material_id: 1,
                    shell: Some(ShellDescriptor::front(0)),
                },
            );
        }
        assets
    }

    fn build(slots_per_row: u32, row_count: u32) -> (VariantAssignment, Vec<crate::layout::InstanceTransform>, VariantSet) {
        let config = LayoutConfig {
            slots_per_row,
            row_count,
            seed: 5,
            ..Default::default()
        };
        let set = VariantSet::chandelier();
        let assignment = plan(&config, &set, default_row_rules(row_count));
        let transforms = generate(&config, &assignment);
        (assignment, transforms, set)
    }

    #[test]
    fn test_instance_counts_conserved() {
        let (assignment, transforms, set) = build(8, 3);
        let mut batcher = InstanceBatcher::new();
        batcher.rebuild(&assignment, &transforms, &assets_for(&set));
        assert_eq!(batcher.total_instances(), 24);
    }

    #[test]
    fn test_zero_count_variant_yields_no_batch() {
        let (assignment, transforms, set) = build(4, 1);
        let mut batcher = InstanceBatcher::new();
        batcher.rebuild(&assignment, &transforms, &assets_for(&set));
        for batch in batcher.batches() {
            assert!(batcher.instance_count(batch.variant) > 0);
        }
        // Two sub-meshes per variant that actually appears.
        let used: std::collections::HashSet<usize> = assignment.iter().collect();
        assert_eq!(batcher.batches().len(), used.len() * 2);
    }

    #[test]
    fn test_offsets_follow_slot_order() {
        let (assignment, transforms, set) = build(10, 2);
        let mut batcher = InstanceBatcher::new();
        batcher.rebuild(&assignment, &transforms, &assets_for(&set));

        let mut counters = vec![0usize; set.len()];
        for (slot, variant) in assignment.iter().enumerate() {
            let expected = InstanceData::from_transform(&transforms[slot]);
            let got = batcher.instances(variant)[counters[variant]];
            assert_eq!(got.model, expected.model);
            counters[variant] += 1;
        }
    }

    #[test]
    fn test_sparse_variant_ids() {
        // Nothing requires variant ids to be dense; a pool of one high id must
        // batch without touching ids below it.
        let config = LayoutConfig {
            slots_per_row: 6,
            row_count: 1,
            seed: 2,
            ..Default::default()
        };
        let set = VariantSet {
            long: vec![],
            regular: vec![9],
            centered: None,
        };
        let assignment = plan(&config, &set, default_row_rules(1));
        let transforms = generate(&config, &assignment);

        let mut assets = VariantAssets::default();
        assets.push(
            9,
            SubMesh {
                mesh_id: 0,
                material_id: 0,
                shell: None,
            },
        );

        let mut batcher = InstanceBatcher::new();
        batcher.rebuild(&assignment, &transforms, &assets);
        assert_eq!(batcher.instance_count(9), 6);
        assert_eq!(batcher.batches().len(), 1);
        assert_eq!(batcher.batches()[0].variant, 9);
    }

    #[test]
    fn test_rebuild_replaces_previous_state() {
        let (assignment, transforms, set) = build(8, 1);
        let mut batcher = InstanceBatcher::new();
        batcher.rebuild(&assignment, &transforms, &assets_for(&set));
        let first = batcher.total_instances();
        batcher.rebuild(&assignment, &transforms, &assets_for(&set));
        assert_eq!(batcher.total_instances(), first);
    }
}
