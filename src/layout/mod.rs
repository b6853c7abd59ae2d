//! Procedural instance layout
//!
//! Turns a small set of authored fixture variants into a full chandelier
//! arrangement: a seeded plan decides which variant occupies each slot of the
//! radial lattice, and a pure generation pass places every slot in world
//! space. Everything here is CPU-side and deterministic per seed.

pub mod config;
pub mod generator;
pub mod planner;
pub mod rng;

pub use config::{ConfigError, LayoutConfig, RowFactors};
pub use generator::{generate, InstanceTransform};
pub use planner::{default_row_rules, plan, LongSpacing, VariantAssignment, VariantSet};

/// A planned and generated layout, ready for batching.
#[derive(Debug, Clone)]
pub struct Layout {
    pub assignment: VariantAssignment,
    pub transforms: Vec<InstanceTransform>,
}

impl Layout {
    /// Validate the config, then plan and generate in one step using the
    /// default per-row spacing rules.
    pub fn build(config: &LayoutConfig, set: &VariantSet) -> Result<Self, ConfigError> {
        config.validate()?;
        let assignment = plan(config, set, default_row_rules(config.row_count));
        let transforms = generate(config, &assignment);
        Ok(Self {
            assignment,
            transforms,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_build_validates_first() {
        let config = LayoutConfig {
            slots_per_row: 0,
            ..Default::default()
        };
        assert!(Layout::build(&config, &VariantSet::chandelier()).is_err());
    }

    #[test]
    fn test_build_produces_matching_lengths() {
        let config = LayoutConfig {
            slots_per_row: 8,
            row_count: 2,
            ..Default::default()
        };
        let layout = Layout::build(&config, &VariantSet::chandelier()).unwrap();
        assert_eq!(layout.assignment.len(), 16);
        assert_eq!(layout.transforms.len(), 16);
    }
}
