//! Shell layering for composited translucent objects
//!
//! A translucent fixture is split into concentric shells; each shell surface
//! is either the front or the back faces of one layer. The transmission
//! renderer composites shells inside-out, and while capturing the scene for a
//! shell it must hide every surface that sits in front of (or at) it so the
//! capture only contains what light would actually pass through.

use thiserror::Error;

#[derive(Error, Debug, PartialEq, Eq)]
pub enum ShellError {
    #[error("shell layers must be dense from 0; layer {0} is missing")]
    SparseLayers(u32),
    #[error("no shell surfaces to validate")]
    Empty,
}

/// Identifies one renderable shell: a layer index and which face set it is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ShellDescriptor {
    /// 0 is the innermost layer
    pub layer: u32,
    /// True for the back-face half of the layer
    pub back_face: bool,
}

impl ShellDescriptor {
    pub fn front(layer: u32) -> Self {
        Self {
            layer,
            back_face: false,
        }
    }

    pub fn back(layer: u32) -> Self {
        Self {
            layer,
            back_face: true,
        }
    }

    /// Whether a capture for `self` must hide a surface tagged `other`.
    ///
    /// Front faces at layer k hide everything at layers <= k, themselves
    /// included. Back faces at layer k hide everything strictly inside plus
    /// the front half of their own layer, but not themselves: their capture is
    /// what is seen through the far wall of the layer.
    pub fn hides(&self, other: ShellDescriptor) -> bool {
        if self.back_face {
            other.layer < self.layer || (other.layer == self.layer && !other.back_face)
        } else {
            other.layer <= self.layer
        }
    }

    /// Composite ordering key: ascending layer, front half before back half.
    fn order_key(&self) -> (u32, bool) {
        (self.layer, self.back_face)
    }
}

/// Sort descriptors into composite order, dropping duplicates.
pub fn composite_order(descriptors: &[ShellDescriptor]) -> Vec<ShellDescriptor> {
    let mut ordered: Vec<ShellDescriptor> = descriptors.to_vec();
    ordered.sort_by_key(|d| d.order_key());
    ordered.dedup();
    ordered
}

/// Check that the layers of one composited object run densely from 0.
///
/// A gap means some shell would capture through a layer that does not exist,
/// which silently breaks the inside-out composite.
pub fn validate_dense(descriptors: &[ShellDescriptor]) -> Result<(), ShellError> {
    if descriptors.is_empty() {
        return Err(ShellError::Empty);
    }
    let max_layer = descriptors.iter().map(|d| d.layer).max().unwrap_or(0);
    for layer in 0..=max_layer {
        if !descriptors.iter().any(|d| d.layer == layer) {
            return Err(ShellError::SparseLayers(layer));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_front_hides_own_layer_and_inward() {
        let front1 = ShellDescriptor::front(1);
        assert!(front1.hides(ShellDescriptor::front(0)));
        assert!(front1.hides(ShellDescriptor::back(0)));
        assert!(front1.hides(ShellDescriptor::front(1)));
        assert!(front1.hides(ShellDescriptor::back(1)));
        assert!(!front1.hides(ShellDescriptor::front(2)));
        assert!(!front1.hides(ShellDescriptor::back(2)));
    }

    #[test]
    fn test_back_does_not_hide_itself() {
        let back1 = ShellDescriptor::back(1);
        assert!(back1.hides(ShellDescriptor::front(0)));
        assert!(back1.hides(ShellDescriptor::back(0)));
        assert!(back1.hides(ShellDescriptor::front(1)));
        assert!(!back1.hides(ShellDescriptor::back(1)));
        assert!(!back1.hides(ShellDescriptor::front(2)));
    }

    #[test]
    fn test_innermost_front_hides_only_itself() {
        let front0 = ShellDescriptor::front(0);
        assert!(front0.hides(ShellDescriptor::front(0)));
        assert!(front0.hides(ShellDescriptor::back(0)));
        assert!(!front0.hides(ShellDescriptor::front(1)));
    }

    #[test]
    fn test_composite_order() {
        let ordered = composite_order(&[
            ShellDescriptor::back(1),
            ShellDescriptor::front(0),
            ShellDescriptor::back(0),
            ShellDescriptor::front(1),
            ShellDescriptor::front(0),
        ]);
        assert_eq!(
            ordered,
            vec![
                ShellDescriptor::front(0),
                ShellDescriptor::back(0),
                ShellDescriptor::front(1),
                ShellDescriptor::back(1),
            ]
        );
    }

    #[test]
    fn test_dense_validation() {
        assert!(validate_dense(&[
            ShellDescriptor::front(0),
            ShellDescriptor::back(0),
            ShellDescriptor::front(1),
        ])
        .is_ok());

        assert_eq!(
            validate_dense(&[ShellDescriptor::front(0), ShellDescriptor::front(2)]),
            Err(ShellError::SparseLayers(1))
        );

        assert_eq!(validate_dense(&[]), Err(ShellError::Empty));
    }
}
