//! Layout configuration and derived per-row factors

use thiserror::Error;

/// Configuration error type
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("slots_per_row must be at least 1")]
    ZeroSlotsPerRow,
    #[error("row_count must be at least 1")]
    ZeroRowCount,
    #[error("{0} must be finite")]
    NonFinite(&'static str),
}

/// Immutable parameters for one layout generation pass.
///
/// Angles are radians. The defaults reproduce the reference composition:
/// eight branches in a single ring.
#[derive(Debug, Clone)]
pub struct LayoutConfig {
    /// Number of fixture slots in each radial row
    pub slots_per_row: u32,
    /// Number of stacked rows
    pub row_count: u32,
    /// Seed for all layout randomness
    pub seed: i32,
    /// Base tilt applied to every fixture (euler X of the base rotation)
    pub tilt_base: f32,
    /// Per-row tilt spread; scales with the row's spread factor into the
    /// euler-Z component of the base rotation
    pub tilt_spread: f32,
    /// Local-X fold correction per unit of spread
    pub tilt_fold_x: f32,
    /// Local-Y fold correction per unit of spread; also folds the inward
    /// direction used for positioning
    pub tilt_fold_y: f32,
    /// Per-row angular twist; scales with spread into the base rotation's
    /// euler-Y component
    pub row_twist: f32,
    /// Constant world-Y fold shared by every slot, applied last
    pub overall_fold: f32,
    /// Rotation offset around the stem, fully applied at the middle row and
    /// tapering to zero at edge rows
    pub angle_offset: f32,
    /// Base radial distance added to every slot
    pub radial_offset: f32,
    /// Extra radial distance at full edge factor
    pub base_edge_distance: f32,
}

impl Default for LayoutConfig {
    fn default() -> Self {
        Self {
            slots_per_row: 8,
            row_count: 1,
            seed: 1,
            tilt_base: 0.145,
            tilt_spread: 0.3,
            tilt_fold_x: 0.0,
            tilt_fold_y: 0.0,
            row_twist: 0.0,
            overall_fold: 0.0,
            angle_offset: 0.0,
            radial_offset: 0.0,
            base_edge_distance: 0.4,
        }
    }
}

impl LayoutConfig {
    /// Total number of instance slots
    pub fn slot_count(&self) -> usize {
        self.slots_per_row as usize * self.row_count as usize
    }

    /// Validate counts and reject non-finite scalars.
    ///
    /// This is the configuration boundary: the planner and generator assume a
    /// validated config and contain no clamping of their own.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.slots_per_row == 0 {
            return Err(ConfigError::ZeroSlotsPerRow);
        }
        if self.row_count == 0 {
            return Err(ConfigError::ZeroRowCount);
        }
        let fields: [(&'static str, f32); 9] = [
            ("tilt_base", self.tilt_base),
            ("tilt_spread", self.tilt_spread),
            ("tilt_fold_x", self.tilt_fold_x),
            ("tilt_fold_y", self.tilt_fold_y),
            ("row_twist", self.row_twist),
            ("overall_fold", self.overall_fold),
            ("angle_offset", self.angle_offset),
            ("radial_offset", self.radial_offset),
            ("base_edge_distance", self.base_edge_distance),
        ];
        for (name, value) in fields {
            if !value.is_finite() {
                return Err(ConfigError::NonFinite(name));
            }
        }
        Ok(())
    }

    /// Derived factors for one row
    pub fn row_factors(&self, row: u32) -> RowFactors {
        RowFactors::new(row, self.row_count)
    }
}

/// Per-row derived values.
///
/// `spread` runs from -0.5 at the first row to +0.5 at the last, symmetric
/// about the middle row; a single row sits exactly in the middle.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RowFactors {
    pub spread: f32,
    /// |spread| * 2, 0 at the middle row, 1 at the edges
    pub edge: f32,
    /// 1 - edge, 1 at the middle row, 0 at the edges
    pub middle: f32,
}

impl RowFactors {
    pub fn new(row: u32, row_count: u32) -> Self {
        let spread = if row_count <= 1 {
            0.0
        } else {
            row as f32 / (row_count - 1) as f32 - 0.5
        };
        let edge = spread.abs() * 2.0;
        Self {
            spread,
            edge,
            middle: 1.0 - edge,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_validates() {
        assert!(LayoutConfig::default().validate().is_ok());
    }

    #[test]
    fn test_zero_counts_rejected() {
        let mut config = LayoutConfig::default();
        config.slots_per_row = 0;
        assert!(matches!(
            config.validate(),
            Err(ConfigError::ZeroSlotsPerRow)
        ));

        let mut config = LayoutConfig::default();
        config.row_count = 0;
        assert!(matches!(config.validate(), Err(ConfigError::ZeroRowCount)));
    }

    #[test]
    fn test_nan_rejected_not_clamped() {
        let mut config = LayoutConfig::default();
        config.tilt_fold_y = f32::NAN;
        assert!(matches!(
            config.validate(),
            Err(ConfigError::NonFinite("tilt_fold_y"))
        ));

        let mut config = LayoutConfig::default();
        config.radial_offset = f32::INFINITY;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_single_row_has_no_spread() {
        let f = RowFactors::new(0, 1);
        assert_eq!(f.spread, 0.0);
        assert_eq!(f.edge, 0.0);
        assert_eq!(f.middle, 1.0);
    }

    #[test]
    fn test_spread_symmetric_about_middle() {
        let rows = 5;
        for row in 0..rows {
            let a = RowFactors::new(row, rows);
            let b = RowFactors::new(rows - 1 - row, rows);
            assert!((a.spread + b.spread).abs() < 1e-6);
            assert!((-0.5..=0.5).contains(&a.spread));
            assert!((0.0..=1.0).contains(&a.edge));
        }
        // Middle row of an odd count sits exactly at zero spread.
        let mid = RowFactors::new(2, 5);
        assert_eq!(mid.spread, 0.0);
        assert_eq!(mid.middle, 1.0);
    }

    #[test]
    fn test_edge_rows_at_extremes() {
        let first = RowFactors::new(0, 4);
        let last = RowFactors::new(3, 4);
        assert_eq!(first.spread, -0.5);
        assert_eq!(last.spread, 0.5);
        assert_eq!(first.edge, 1.0);
        assert_eq!(last.edge, 1.0);
    }
}
