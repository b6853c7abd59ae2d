//! Instance transform generation
//!
//! Pure math: maps a validated config plus a variant assignment to one
//! world-space transform per slot. No randomness beyond the keyed radial
//! jitter, no mutation of inputs.

use std::f32::consts::{FRAC_PI_2, TAU};

use glam::{EulerRot, Quat, Vec3};

use super::config::LayoutConfig;
use super::planner::VariantAssignment;
use super::rng::{hash_range, STREAM_JITTER};

/// World-space placement of a single fixture instance.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct InstanceTransform {
    pub position: Vec3,
    pub rotation: Quat,
}

/// Generate one transform per assigned slot, row-major.
///
/// The assignment's length drives the output; an empty assignment yields an
/// empty vector regardless of config counts.
pub fn generate(config: &LayoutConfig, assignment: &VariantAssignment) -> Vec<InstanceTransform> {
    let spr = config.slots_per_row.max(1) as usize;
    let mut transforms = Vec::with_capacity(assignment.len());

    for slot in 0..assignment.len() {
        let row = (slot / spr) as u32;
        let col = slot % spr;
        let factors = config.row_factors(row);

        // Angle around the stem. The ring offset fades out toward edge rows so
        // the stack reads as one twisted column rather than sheared layers.
        let angle =
            col as f32 / spr as f32 * TAU + config.angle_offset * factors.middle;

        let fold_y = factors.spread * config.tilt_fold_y;

        // Base orientation: lie the fixture on its side (Z = pi/2), spin it to
        // its ring angle, then spread the tilt across rows.
        let base = Quat::from_euler(
            EulerRot::XYZ,
            config.tilt_base,
            angle + factors.spread * config.row_twist,
            FRAC_PI_2 + factors.spread * config.tilt_spread,
        );
        let folded = base
            * Quat::from_rotation_x(factors.spread * config.tilt_fold_x)
            * Quat::from_rotation_y(fold_y);
        let rotation = (Quat::from_rotation_y(config.overall_fold) * folded).normalize();

        // Radial direction, folded about the ring tangent so edge rows lean
        // with their fixtures.
        let outward = Vec3::new(angle.cos(), 0.0, angle.sin());
        let tangent = Vec3::new(-angle.sin(), 0.0, angle.cos());
        let direction = Quat::from_axis_angle(tangent, fold_y) * outward;

        // The centered variant sits exactly on its row's radius: same edge
        // term as everyone else, no jitter.
        let mut distance = factors.edge * config.base_edge_distance + config.radial_offset;
        if !assignment.is_centered(slot) {
            distance += hash_range(
                config
                    .seed
                    .wrapping_add(slot as i32)
                    .wrapping_add(STREAM_JITTER),
                0.0,
                0.1,
            );
        }

        transforms.push(InstanceTransform {
            position: direction * distance,
            rotation,
        });
    }

    transforms
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::layout::planner::{default_row_rules, plan, VariantSet};

    fn setup(slots_per_row: u32, row_count: u32) -> (LayoutConfig, VariantAssignment) {
        let config = LayoutConfig {
            slots_per_row,
            row_count,
            seed: 3,
            ..Default::default()
        };
        let assignment = plan(&config, &VariantSet::chandelier(), default_row_rules(row_count));
        (config, assignment)
    }

    #[test]
    fn test_generate_is_pure() {
        let (config, assignment) = setup(8, 3);
        let a = generate(&config, &assignment);
        let b = generate(&config, &assignment);
        assert_eq!(a.len(), 24);
        for (x, y) in a.iter().zip(b.iter()) {
            assert!((x.position - y.position).length() < 1e-6);
            assert!((x.rotation.dot(y.rotation)).abs() > 1.0 - 1e-6);
        }
    }

    #[test]
    fn test_empty_assignment_yields_no_transforms() {
        let (config, _) = setup(8, 1);
        let empty = plan(
            &LayoutConfig {
                slots_per_row: 0,
                ..config
            },
            &VariantSet::chandelier(),
            default_row_rules(1),
        );
        assert!(generate(&config, &empty).is_empty());
    }

    #[test]
    fn test_rotations_are_unit() {
        let (config, assignment) = setup(10, 4);
        for t in generate(&config, &assignment) {
            assert!((t.rotation.length() - 1.0).abs() < 1e-5);
        }
    }

    #[test]
    fn test_single_row_stays_in_plane() {
        // No folds configured: every fixture's anchor sits at y = 0.
        let (config, assignment) = setup(8, 1);
        for t in generate(&config, &assignment) {
            assert!(t.position.y.abs() < 1e-6);
        }
    }

    #[test]
    fn test_ring_angles_evenly_spaced() {
        let config = LayoutConfig {
            slots_per_row: 8,
            row_count: 1,
            seed: 3,
            radial_offset: 1.0,
            ..Default::default()
        };
        let assignment = plan(&config, &VariantSet::chandelier(), default_row_rules(1));
        let transforms = generate(&config, &assignment);

        let angle_of = |p: Vec3| p.z.atan2(p.x).rem_euclid(TAU);
        for i in 0..8 {
            let expected = i as f32 / 8.0 * TAU;
            let got = angle_of(transforms[i].position);
            let diff = (got - expected).abs();
            assert!(diff < 1e-4 || (diff - TAU).abs() < 1e-4, "slot {}: {}", i, got);
        }
    }

    #[test]
    fn test_jitter_offsets_radius_within_bounds() {
        let config = LayoutConfig {
            slots_per_row: 8,
            row_count: 1,
            seed: 9,
            radial_offset: 1.0,
            ..Default::default()
        };
        let assignment = plan(&config, &VariantSet::chandelier(), default_row_rules(1));
        for (slot, t) in generate(&config, &assignment).iter().enumerate() {
            let r = t.position.length();
            if assignment.is_centered(slot) {
                assert!((r - 1.0).abs() < 1e-5);
            } else {
                assert!((1.0..1.1).contains(&r), "slot {} radius {}", slot, r);
            }
        }
    }

    #[test]
    fn test_centered_variant_keeps_row_edge_term() {
        // Edge rows push every fixture outward, the centered variant included;
        // only the jitter distinguishes it.
        let mut saw_centered_on_edge_row = false;
        for seed in 0..5 {
            let config = LayoutConfig {
                slots_per_row: 8,
                row_count: 3,
                seed,
                radial_offset: 1.0,
                base_edge_distance: 2.0,
                ..Default::default()
            };
            let assignment =
                plan(&config, &VariantSet::chandelier(), default_row_rules(3));
            let transforms = generate(&config, &assignment);

            for (slot, t) in transforms.iter().enumerate() {
                let row = (slot / 8) as u32;
                let base = config.row_factors(row).edge * 2.0 + 1.0;
                let r = t.position.length();
                if assignment.is_centered(slot) {
                    assert!((r - base).abs() < 1e-5, "seed {} slot {}: {}", seed, slot, r);
                    saw_centered_on_edge_row |= row != 1;
                } else {
                    assert!(
                        r >= base - 1e-5 && r < base + 0.1,
                        "seed {} slot {}: {}",
                        seed,
                        slot,
                        r
                    );
                }
            }
        }
        assert!(saw_centered_on_edge_row);
    }

    #[test]
    fn test_overall_fold_rotates_whole_array() {
        let base = LayoutConfig {
            slots_per_row: 6,
            row_count: 1,
            seed: 2,
            radial_offset: 1.0,
            ..Default::default()
        };
        let folded = LayoutConfig {
            overall_fold: 0.5,
            ..base.clone()
        };
        let assignment = plan(&base, &VariantSet::chandelier(), default_row_rules(1));
        let a = generate(&base, &assignment);
        let b = generate(&folded, &assignment);
        // Positions ignore the overall fold (it is a rotation applied to the
        // fixtures, not the anchors); rotations must differ.
        for (x, y) in a.iter().zip(b.iter()) {
            assert!((x.position - y.position).length() < 1e-6);
            assert!(x.rotation.dot(y.rotation).abs() < 1.0 - 1e-4);
        }
    }
}
