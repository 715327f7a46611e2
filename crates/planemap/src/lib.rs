//! planemap: small value algebra for the screen <-> plane coordinate map.
//!
//! - `AffineMap` holds six coefficients `(a, b, c, d, tx, ty)` and maps
//!   `[x', y'] = [a c; b d] * [x, y] + [tx, ty]`.
//! - Composition reads left to right: `compose(A, B)` applies `A` first, then `B`.
//!   This lets gesture deltas be chained onto a base map in the order they happen.
//! - `decompose` splits the linear part into `rotation(alpha) * diag(p, q) * rotation(beta)`
//!   plus the translation, which is how scale and angle are read back out of raw coefficients.
//!
//! Points and vectors are plain `glam::DVec2`; its `+`, `-`, `*`, `/` and negation are the
//! vector half of the algebra.

mod affine;
mod decompose;

pub use affine::{compose, compose_all, AffineMap, SINGULAR_EPSILON};
pub use decompose::Decomposition;
pub use glam::DVec2;

/// A location in either screen or plane space.
pub type Point = DVec2;

/// A displacement in either screen or plane space.
pub type Vector = DVec2;

/// Failures of the numerical operations on `AffineMap`.
#[derive(Debug, Clone, Copy, PartialEq, thiserror::Error)]
pub enum TransformError {
    /// The linear part cannot be inverted.
    #[error("singular transform (determinant {determinant:e})")]
    Singular { determinant: f64 },
    /// Decomposition would have produced a meaningless or non-finite result.
    #[error("degenerate decomposition: {reason}")]
    Degenerate { reason: &'static str },
    /// One of the coefficients is NaN or infinite.
    #[error("transform has non-finite coefficients")]
    NonFinite,
}

#[cfg(test)]
mod tests {
    use super::*;

    // The vector algebra is glam's; these pin down the laws the viewport relies on.
    #[test]
    fn vector_addition_laws() {
        let p = Point::new(1.5, -2.0);
        let q = Vector::new(0.25, 4.0);
        let r = Vector::new(-3.0, 0.5);

        assert_eq!(p + q, q + p);
        assert_eq!((p + q) + r, p + (q + r));
        assert_eq!(p - q + q, p);
        assert_eq!(-(-p), p);
        assert_eq!(p - p, Vector::ZERO);
    }

    #[test]
    fn scalar_multiplication_distributes() {
        let p = Vector::new(1.5, -2.0);
        let q = Vector::new(0.25, 4.0);
        let s = 2.5;

        assert!(((p + q) * s - (p * s + q * s)).length() < 1e-12);
        assert!(((p * s) / s - p).length() < 1e-12);
        assert_eq!(p * -1.0, -p);
    }
}
