//! Variant assignment planning
//!
//! Assigns one fixture variant to every slot of the radial lattice in two
//! deterministic passes: long variants are seeded along each row at intervals
//! drawn from the row's spacing rule, then the remaining slots are filled with
//! regular variants farthest-first from the already placed ones so short
//! fixtures do not clump.

use log::{debug, warn};

use super::config::{LayoutConfig, RowFactors};
use super::rng::{hash_index, hash_range, STREAM_INTERVAL, STREAM_LONG_PICK, STREAM_SHORT_PICK};

/// Below this weighted lattice distance two regular fixtures read as a clump.
/// The fill ordering biases against it but never leaves a slot empty.
const MIN_SHORT_SPACING: f32 = 2.0;

/// The fixed variant pool, partitioned into long and regular subsets.
#[derive(Debug, Clone)]
pub struct VariantSet {
    /// Variant ids of the long fixtures
    pub long: Vec<usize>,
    /// Variant ids of the regular (short) fixtures
    pub regular: Vec<usize>,
    /// Variant that always sits at the base radial distance, with no jitter
    pub centered: Option<usize>,
}

impl VariantSet {
    /// The reference chandelier pool: seven branch variants, the last two long,
    /// the first one always centered.
    pub fn chandelier() -> Self {
        Self {
            long: vec![5, 6],
            regular: vec![0, 1, 2, 3, 4],
            centered: Some(0),
        }
    }

    pub fn is_long(&self, variant: usize) -> bool {
        self.long.contains(&variant)
    }

    pub fn is_centered(&self, variant: usize) -> bool {
        self.centered == Some(variant)
    }

    /// Total number of distinct variants in the pool
    pub fn len(&self) -> usize {
        self.long.len() + self.regular.len()
    }

    pub fn is_empty(&self) -> bool {
        self.long.is_empty() && self.regular.is_empty()
    }
}

/// Interval range, in slots, between consecutive long variants within a row.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LongSpacing {
    pub min: u32,
    pub max: u32,
}

impl LongSpacing {
    /// Draw a countdown from [min, max], keyed deterministically.
    fn draw(&self, key: i32) -> u32 {
        let hi = self.max.max(self.min);
        hash_range(key, self.min as f32, (hi + 1) as f32) as u32
    }
}

/// Default per-row spacing: edge rows use a longer interval, rows near the
/// vertical middle a shorter one, so long branches read denser mid-array.
pub fn default_row_rules(row_count: u32) -> impl Fn(u32) -> LongSpacing {
    move |row| {
        let middle = RowFactors::new(row, row_count).middle;
        let min = 6.0 + (3.0 - 6.0) * middle;
        let max = 9.0 + (5.0 - 9.0) * middle;
        LongSpacing {
            min: min.round() as u32,
            max: max.round() as u32,
        }
    }
}

/// A complete slot-to-variant mapping.
///
/// Carries its variant set so downstream passes can ask about long/centered
/// membership without re-threading the pool.
#[derive(Debug, Clone, PartialEq)]
pub struct VariantAssignment {
    slots: Vec<usize>,
    set: VariantSet,
}

impl PartialEq for VariantSet {
    fn eq(&self, other: &Self) -> bool {
        self.long == other.long && self.regular == other.regular && self.centered == other.centered
    }
}

impl VariantAssignment {
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// Variant id assigned to a global slot index
    pub fn variant(&self, slot: usize) -> usize {
        self.slots[slot]
    }

    pub fn iter(&self) -> impl Iterator<Item = usize> + '_ {
        self.slots.iter().copied()
    }

    /// Number of slots assigned to the given variant
    pub fn count_of(&self, variant: usize) -> usize {
        self.slots.iter().filter(|&&v| v == variant).count()
    }

    pub fn is_long(&self, slot: usize) -> bool {
        self.set.is_long(self.slots[slot])
    }

    pub fn is_centered(&self, slot: usize) -> bool {
        self.set.is_centered(self.slots[slot])
    }

    pub fn set(&self) -> &VariantSet {
        &self.set
    }
}

/// Countdown draws are keyed by (row, draw ordinal) rather than by the slot a
/// long fixture landed on, so tightening a rule's lower bound can only add
/// long placements, never reshuffle them away.
fn spacing_key(seed: i32, row: u32, draw: u32) -> i32 {
    seed.wrapping_add(row as i32 * 1031)
        .wrapping_add(draw as i32 * 31)
        .wrapping_add(STREAM_INTERVAL)
}

/// Plan the variant for every slot of the lattice.
///
/// Deterministic: identical `(config, set, rules)` always yields an identical
/// assignment. A zero-slot lattice yields an empty assignment, not an error.
pub fn plan(
    config: &LayoutConfig,
    set: &VariantSet,
    rules: impl Fn(u32) -> LongSpacing,
) -> VariantAssignment {
    let spr = config.slots_per_row as usize;
    let rows = config.row_count as usize;
    let total = spr * rows;

    if total == 0 || set.is_empty() {
        if total > 0 {
            warn!("variant set is empty; producing an empty assignment");
        }
        return VariantAssignment {
            slots: Vec::new(),
            set: set.clone(),
        };
    }

    let mut slots: Vec<Option<usize>> = vec![None; total];

    // Pass 1: seed long variants along each row.
    if !set.long.is_empty() {
        for row in 0..config.row_count {
            let rule = rules(row);
            let mut draw = 0u32;
            let mut countdown = rule.draw(spacing_key(config.seed, row, draw));
            draw += 1;

            for col in 0..spr {
                let slot = row as usize * spr + col;
                if countdown == 0 {
                    let pick = hash_index(
                        config
                            .seed
                            .wrapping_add(slot as i32)
                            .wrapping_add(STREAM_LONG_PICK),
                        set.long.len(),
                    );
                    slots[slot] = Some(set.long[pick]);
                    countdown = rule.draw(spacing_key(config.seed, row, draw));
                    draw += 1;
                } else {
                    countdown -= 1;
                }
            }
        }
    }

    // Pass 2: fill the rest with regular variants, farthest-from-existing
    // shorts first. Column distance is circular (the lattice is a ring) and
    // weighted 1.5x over row distance to discourage horizontal clustering.
    let fill_pool: &[usize] = if set.regular.is_empty() {
        &set.long
    } else {
        &set.regular
    };

    let mut pending: Vec<usize> = (0..total).filter(|&s| slots[s].is_none()).collect();
    let mut placed: Vec<(i32, i32)> = Vec::with_capacity(pending.len());
    let spr_i = spr as i32;

    let lattice_distance = |a: (i32, i32), b: (i32, i32)| -> f32 {
        let dc = (a.1 - b.1).abs();
        let dc = dc.min(spr_i - dc);
        dc as f32 * 1.5 + (a.0 - b.0).abs() as f32
    };

    while !pending.is_empty() {
        let mut best = 0usize;
        let mut best_score = f32::NEG_INFINITY;
        for (i, &slot) in pending.iter().enumerate() {
            let at = ((slot / spr) as i32, (slot % spr) as i32);
            let score: f32 = placed.iter().map(|&p| lattice_distance(at, p)).sum();
            // Strict comparison in ascending slot order breaks ties toward the
            // lowest slot index, keeping the pass deterministic.
            if score > best_score {
                best_score = score;
                best = i;
            }
        }

        let slot = pending.remove(best);
        let at = ((slot / spr) as i32, (slot % spr) as i32);

        if let Some(nearest) = placed
            .iter()
            .map(|&p| lattice_distance(at, p))
            .fold(None, |acc: Option<f32>, d| {
                Some(acc.map_or(d, |a| a.min(d)))
            })
        {
            if nearest < MIN_SHORT_SPACING {
                debug!(
                    "slot {} placed {} below the short-spacing threshold",
                    slot, nearest
                );
            }
        }

        let pick = hash_index(
            config
                .seed
                .wrapping_add(slot as i32)
                .wrapping_add(STREAM_SHORT_PICK),
            fill_pool.len(),
        );
        slots[slot] = Some(fill_pool[pick]);
        placed.push(at);
    }

    VariantAssignment {
        slots: slots.into_iter().map(|s| s.unwrap_or(0)).collect(),
        set: set.clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(slots_per_row: u32, row_count: u32, seed: i32) -> LayoutConfig {
        LayoutConfig {
            slots_per_row,
            row_count,
            seed,
            ..Default::default()
        }
    }

    #[test]
    fn test_every_slot_assigned() {
        let cfg = config(8, 4, 3);
        let set = VariantSet::chandelier();
        let assignment = plan(&cfg, &set, default_row_rules(cfg.row_count));
        assert_eq!(assignment.len(), 32);
        let total: usize = (0..set.len()).map(|v| assignment.count_of(v)).sum();
        assert_eq!(total, 32);
    }

    #[test]
    fn test_plan_is_deterministic() {
        let cfg = config(8, 1, 1);
        let set = VariantSet::chandelier();
        let a = plan(&cfg, &set, default_row_rules(cfg.row_count));
        let b = plan(&cfg, &set, default_row_rules(cfg.row_count));
        assert_eq!(a, b);
    }

    #[test]
    fn test_different_seeds_differ() {
        let set = VariantSet::chandelier();
        let a = plan(&config(10, 3, 1), &set, default_row_rules(3));
        let b = plan(&config(10, 3, 2), &set, default_row_rules(3));
        assert!(a.iter().zip(b.iter()).any(|(x, y)| x != y));
    }

    #[test]
    fn test_zero_slots_yields_empty() {
        let cfg = config(0, 5, 1);
        let set = VariantSet::chandelier();
        let assignment = plan(&cfg, &set, default_row_rules(cfg.row_count));
        assert!(assignment.is_empty());
    }

    #[test]
    fn test_denser_rule_places_at_least_as_many_longs() {
        let set = VariantSet::chandelier();
        let cfg = config(16, 4, 7);

        let sparse = |_row: u32| LongSpacing { min: 4, max: 6 };
        let dense = |_row: u32| LongSpacing { min: 2, max: 6 };

        let count_longs = |assignment: &VariantAssignment| {
            (0..assignment.len())
                .filter(|&s| assignment.is_long(s))
                .count()
        };

        let a = plan(&cfg, &set, sparse);
        let b = plan(&cfg, &set, dense);
        assert!(count_longs(&b) >= count_longs(&a));
    }

    #[test]
    fn test_long_picks_come_from_long_subset() {
        let cfg = config(12, 3, 5);
        let set = VariantSet::chandelier();
        let assignment = plan(&cfg, &set, |_| LongSpacing { min: 2, max: 3 });
        for slot in 0..assignment.len() {
            let v = assignment.variant(slot);
            assert!(set.long.contains(&v) || set.regular.contains(&v));
        }
        assert!((0..assignment.len()).any(|s| assignment.is_long(s)));
    }

    #[test]
    fn test_empty_variant_set() {
        let cfg = config(4, 2, 1);
        let set = VariantSet {
            long: vec![],
            regular: vec![],
            centered: None,
        };
        let assignment = plan(&cfg, &set, default_row_rules(cfg.row_count));
        assert!(assignment.is_empty());
    }

    #[test]
    fn test_default_rules_denser_in_middle() {
        let rules = default_row_rules(5);
        let edge = rules(0);
        let middle = rules(2);
        assert!(middle.min < edge.min);
        assert!(middle.max < edge.max);
    }
}
