//! 2D transform operations and list blending.
//!
//! A style carries an ordered list of transform operations. Two lists blend
//! pairwise: like-typed operations interpolate componentwise, a missing
//! operand is padded with the present operation's identity, and mismatched
//! operation types do not interpolate; the destination takes the target
//! operation, combined through its own identity rule.

use serde::{Deserialize, Serialize};

/// A single transform operation.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum TransformOperation {
    Translate { x: f64, y: f64 },
    Scale { x: f64, y: f64 },
    Rotate { degrees: f64 },
    Skew { x: f64, y: f64 },
}

fn lerp(a: f64, b: f64, t: f64) -> f64 {
    a + (b - a) * t
}

impl TransformOperation {
    /// The identity operation of the same kind as `self`.
    pub fn identity(&self) -> TransformOperation {
        match self {
            Self::Translate { .. } => Self::Translate { x: 0.0, y: 0.0 },
            Self::Scale { .. } => Self::Scale { x: 1.0, y: 1.0 },
            Self::Rotate { .. } => Self::Rotate { degrees: 0.0 },
            Self::Skew { .. } => Self::Skew { x: 0.0, y: 0.0 },
        }
    }

    pub fn is_same_kind(&self, other: &TransformOperation) -> bool {
        std::mem::discriminant(self) == std::mem::discriminant(other)
    }

    /// Blend with `self` as the target operation. A missing or differently
    /// typed `from` operand is replaced by this operation's identity. With
    /// `blend_to_identity` set the interpolation runs from `self` toward its
    /// identity instead (used when the target list is the shorter one).
    pub fn blend(
        &self,
        from: Option<&TransformOperation>,
        progress: f64,
        blend_to_identity: bool,
    ) -> TransformOperation {
        let from = match from {
            Some(op) if op.is_same_kind(self) => *op,
            _ => self.identity(),
        };
        let (a, b) = if blend_to_identity {
            (*self, self.identity())
        } else {
            (from, *self)
        };
        match (a, b) {
            (Self::Translate { x: ax, y: ay }, Self::Translate { x: bx, y: by }) => {
                Self::Translate {
                    x: lerp(ax, bx, progress),
                    y: lerp(ay, by, progress),
                }
            }
            (Self::Scale { x: ax, y: ay }, Self::Scale { x: bx, y: by }) => Self::Scale {
                x: lerp(ax, bx, progress),
                y: lerp(ay, by, progress),
            },
            (Self::Rotate { degrees: ad }, Self::Rotate { degrees: bd }) => Self::Rotate {
                degrees: lerp(ad, bd, progress),
            },
            (Self::Skew { x: ax, y: ay }, Self::Skew { x: bx, y: by }) => Self::Skew {
                x: lerp(ax, bx, progress),
                y: lerp(ay, by, progress),
            },
            // Kinds were normalized above.
            (_, b) => b,
        }
    }
}

/// An ordered list of transform operations.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct TransformList {
    pub operations: Vec<TransformOperation>,
}

impl TransformList {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, op: TransformOperation) -> Self {
        self.operations.push(op);
        self
    }

    pub fn is_empty(&self) -> bool {
        self.operations.is_empty()
    }

    pub fn len(&self) -> usize {
        self.operations.len()
    }

    /// Blend two lists pairwise, padding the shorter list by identity.
    pub fn blend(from: &TransformList, to: &TransformList, progress: f64) -> TransformList {
        let size = from.operations.len().max(to.operations.len());
        let mut result = TransformList::new();
        for i in 0..size {
            let from_op = from.operations.get(i);
            let to_op = to.operations.get(i);
            let blended = match (from_op, to_op) {
                (_, Some(to_op)) => to_op.blend(from_op, progress, false),
                (Some(from_op), None) => from_op.blend(None, progress, true),
                (None, None) => continue,
            };
            result.operations.push(blended);
        }
        result
    }
}
