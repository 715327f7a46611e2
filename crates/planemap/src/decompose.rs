use crate::{AffineMap, TransformError, Vector};
use glam::DVec2;

/// `map ~ rotation(alpha) * diag(p, q) * rotation(beta) + shift`.
///
/// `p >= |q|`; a negative `q` means the map contains a reflection.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Decomposition {
    pub p: f64,
    pub q: f64,
    pub alpha: f64,
    pub beta: f64,
    pub shift: Vector,
}

impl Decomposition {
    /// Principal scales `(p, q)`.
    #[inline]
    pub fn scale(&self) -> DVec2 {
        DVec2::new(self.p, self.q)
    }

    /// Total rotation `alpha + beta`; exact for conformal (uniform-scale) maps.
    #[inline]
    pub fn rotation(&self) -> f64 {
        self.alpha + self.beta
    }

    pub fn to_map(&self) -> AffineMap {
        AffineMap::from_rotation(self.beta)
            .then(AffineMap::from_diagonal(self.p, self.q))
            .then(AffineMap::from_rotation(self.alpha))
            .translate(self.shift)
    }
}

/// Recovers `r` from `(num, other) = r * (cos, sin)` of `angle`.
///
/// Divides by whichever of `cos`/`sin` is larger in magnitude, so the divisor never drops
/// below `1/sqrt(2)` and a vanishing `cos(phi)` or `cos(psi)` cannot blow up the result.
#[inline]
fn radius(num: f64, other: f64, angle: f64) -> f64 {
    let (sin, cos) = angle.sin_cos();
    if cos.abs() >= sin.abs() {
        num / cos
    } else {
        other / sin
    }
}

impl AffineMap {
    /// Closed-form rotation-scale-rotation split of the linear part.
    ///
    /// With `phi = alpha + beta` and `psi = alpha - beta`:
    /// `a + d = (p + q) cos(phi)`, `b - c = (p + q) sin(phi)`,
    /// `a - d = (p - q) cos(psi)`, `b + c = (p - q) sin(psi)`.
    pub fn decompose(self) -> Result<Decomposition, TransformError> {
        if !self.is_finite() {
            return Err(TransformError::NonFinite);
        }
        // Rank-deficient maps still split, but their angles are arbitrary and
        // nothing downstream can use them.
        self.invert()?;

        let (a, b, c, d) = (self.a, self.b, self.c, self.d);
        let phi = (b - c).atan2(a + d);
        let psi = (b + c).atan2(a - d);
        let u = radius(a + d, b - c, phi);
        let v = radius(a - d, b + c, psi);

        let out = Decomposition {
            p: (u + v) / 2.0,
            q: (u - v) / 2.0,
            alpha: (phi + psi) / 2.0,
            beta: (phi - psi) / 2.0,
            shift: self.translation(),
        };

        if [out.p, out.q, out.alpha, out.beta].iter().all(|x| x.is_finite()) {
            Ok(out)
        } else {
            Err(TransformError::Degenerate {
                reason: "non-finite decomposition component",
            })
        }
    }
}
