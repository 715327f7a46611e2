use crate::{Point, TransformError, Vector};
use glam::{DAffine2, DMat2, DVec2};

/// Relative threshold below which a determinant counts as zero.
///
/// Compared against `|det| / m^2` where `m` is the largest linear coefficient, so a
/// deep-zoom map (scale ~1e-8, det ~1e-16) is still invertible while a rank-one map is not.
pub const SINGULAR_EPSILON: f64 = 1e-12;

/// 2D affine map `[x', y'] = [a c; b d] * [x, y] + [tx, ty]`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AffineMap {
    pub a: f64,
    pub b: f64,
    pub c: f64,
    pub d: f64,
    pub tx: f64,
    pub ty: f64,
}

impl Default for AffineMap {
    fn default() -> Self {
        Self::IDENTITY
    }
}

impl AffineMap {
    pub const IDENTITY: Self = Self::new(1.0, 0.0, 0.0, 1.0, 0.0, 0.0);

    #[inline]
    pub const fn new(a: f64, b: f64, c: f64, d: f64, tx: f64, ty: f64) -> Self {
        Self { a, b, c, d, tx, ty }
    }

    /// Uniform scale about the origin.
    #[inline]
    pub fn from_scale(s: f64) -> Self {
        Self::from_diagonal(s, s)
    }

    #[inline]
    pub fn from_diagonal(p: f64, q: f64) -> Self {
        Self::new(p, 0.0, 0.0, q, 0.0, 0.0)
    }

    #[inline]
    pub fn from_translation(delta: Vector) -> Self {
        Self::new(1.0, 0.0, 0.0, 1.0, delta.x, delta.y)
    }

    /// Counter-clockwise rotation by `angle` radians (for a y-up plane).
    #[inline]
    pub fn from_rotation(angle: f64) -> Self {
        let (sin, cos) = angle.sin_cos();
        Self::new(cos, sin, -sin, cos, 0.0, 0.0)
    }

    /// Builds a map from the packed `[a, b, c, d, tx, ty]` layout.
    #[inline]
    pub fn from_coefficients(m: [f64; 6]) -> Self {
        Self::new(m[0], m[1], m[2], m[3], m[4], m[5])
    }

    /// Packed `[a, b, c, d, tx, ty]`, the column layout the compute kernel consumes.
    #[inline]
    pub fn to_coefficients(self) -> [f64; 6] {
        [self.a, self.b, self.c, self.d, self.tx, self.ty]
    }

    #[inline]
    pub fn translation(self) -> Vector {
        DVec2::new(self.tx, self.ty)
    }

    /// The same map with its translation dropped.
    #[inline]
    pub fn linear(self) -> Self {
        Self { tx: 0.0, ty: 0.0, ..self }
    }

    #[inline]
    pub fn determinant(self) -> f64 {
        self.a * self.d - self.b * self.c
    }

    pub fn is_finite(self) -> bool {
        self.to_coefficients().iter().all(|v| v.is_finite())
    }

    /// Maps a point, translation included.
    #[inline]
    pub fn apply(self, p: Point) -> Point {
        DVec2::new(
            self.a * p.x + self.c * p.y + self.tx,
            self.b * p.x + self.d * p.y + self.ty,
        )
    }

    /// Maps a displacement through the 2x2 part only.
    #[inline]
    pub fn apply_linear(self, v: Vector) -> Vector {
        DVec2::new(self.a * v.x + self.c * v.y, self.b * v.x + self.d * v.y)
    }

    /// Applies `self` first, then `next`.
    pub fn then(self, next: AffineMap) -> AffineMap {
        AffineMap {
            a: next.a * self.a + next.c * self.b,
            b: next.b * self.a + next.d * self.b,
            c: next.a * self.c + next.c * self.d,
            d: next.b * self.c + next.d * self.d,
            tx: next.a * self.tx + next.c * self.ty + next.tx,
            ty: next.b * self.tx + next.d * self.ty + next.ty,
        }
    }

    /// `self` followed by a uniform scale about the origin.
    #[inline]
    pub fn scale(self, s: f64) -> AffineMap {
        self.then(Self::from_scale(s))
    }

    /// `self` followed by a translation.
    #[inline]
    pub fn translate(self, delta: Vector) -> AffineMap {
        self.then(Self::from_translation(delta))
    }

    /// Exact algebraic inverse, refusing maps whose linear part is (numerically) singular.
    pub fn invert(self) -> Result<AffineMap, TransformError> {
        if !self.is_finite() {
            return Err(TransformError::NonFinite);
        }

        let det = self.determinant();
        let m = self.a.abs().max(self.b.abs()).max(self.c.abs()).max(self.d.abs());
        if m == 0.0 || det.abs() <= SINGULAR_EPSILON * m * m {
            return Err(TransformError::Singular { determinant: det });
        }

        let inv_det = det.recip();
        let a = self.d * inv_det;
        let b = -self.b * inv_det;
        let c = -self.c * inv_det;
        let d = self.a * inv_det;

        Ok(AffineMap {
            a,
            b,
            c,
            d,
            tx: -(a * self.tx + c * self.ty),
            ty: -(b * self.tx + d * self.ty),
        })
    }
}

/// Applies `first`, then `second`.
#[inline]
pub fn compose(first: AffineMap, second: AffineMap) -> AffineMap {
    first.then(second)
}

/// Folds a sequence of maps left to right; an empty sequence is the identity.
pub fn compose_all<I>(maps: I) -> AffineMap
where
    I: IntoIterator<Item = AffineMap>,
{
    maps.into_iter().fold(AffineMap::IDENTITY, AffineMap::then)
}

impl From<AffineMap> for DAffine2 {
    fn from(m: AffineMap) -> Self {
        DAffine2::from_mat2_translation(
            DMat2::from_cols(DVec2::new(m.a, m.b), DVec2::new(m.c, m.d)),
            m.translation(),
        )
    }
}

impl From<DAffine2> for AffineMap {
    fn from(m: DAffine2) -> Self {
        let x = m.matrix2.x_axis;
        let y = m.matrix2.y_axis;
        AffineMap::new(x.x, x.y, y.x, y.y, m.translation.x, m.translation.y)
    }
}
