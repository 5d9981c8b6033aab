use crate::traits::Scalar;
use num_traits::{Float, FromPrimitive, Num, NumCast, One, ToPrimitive, Zero};
use std::cmp::Ordering;
use std::ops::{
    Add, AddAssign, Div, DivAssign, Mul, MulAssign, Neg, Rem, RemAssign, Sub, SubAssign,
};

/// Dual number for forward-mode AD, generic over the real part.
/// val: real part
/// eps: infinitesimal part
///
/// `Dual<f64>` carries first derivatives. Nesting, `Dual<Dual<f64>>`, carries
/// mixed second derivatives in `eps.eps`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Dual<T = f64> {
    pub val: T,
    pub eps: T,
}

impl<T: Scalar> Dual<T> {
    pub fn new(val: T, eps: T) -> Self {
        Self { val, eps }
    }

    /// A value with no derivative part.
    pub fn constant(val: T) -> Self {
        Self::new(val, T::zero())
    }

    /// Applies the chain rule for a unary function with value `f` and
    /// derivative `df` at `self.val`.
    #[inline]
    fn chain(self, f: T, df: T) -> Self {
        Self::new(f, df * self.eps)
    }
}

impl<T: Scalar> PartialOrd for Dual<T> {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        self.val.partial_cmp(&other.val)
    }
}

impl<T: Scalar> Zero for Dual<T> {
    fn zero() -> Self {
        Self::new(T::zero(), T::zero())
    }
    fn is_zero(&self) -> bool {
        self.val.is_zero() && self.eps.is_zero()
    }
}

impl<T: Scalar> One for Dual<T> {
    fn one() -> Self {
        Self::constant(T::one())
    }
}

impl<T: Scalar> Add for Dual<T> {
    type Output = Self;
    fn add(self, rhs: Self) -> Self {
        Self::new(self.val + rhs.val, self.eps + rhs.eps)
    }
}

impl<T: Scalar> Sub for Dual<T> {
    type Output = Self;
    fn sub(self, rhs: Self) -> Self {
        Self::new(self.val - rhs.val, self.eps - rhs.eps)
    }
}

impl<T: Scalar> Mul for Dual<T> {
    type Output = Self;
    fn mul(self, rhs: Self) -> Self {
        Self::new(self.val * rhs.val, self.val * rhs.eps + self.eps * rhs.val)
    }
}

impl<T: Scalar> Div for Dual<T> {
    type Output = Self;
    fn div(self, rhs: Self) -> Self {
        let denom = rhs.val * rhs.val;
        Self::new(
            self.val / rhs.val,
            (self.eps * rhs.val - self.val * rhs.eps) / denom,
        )
    }
}

impl<T: Scalar> Neg for Dual<T> {
    type Output = Self;
    fn neg(self) -> Self {
        Self::new(-self.val, -self.eps)
    }
}

impl<T: Scalar> Rem for Dual<T> {
    type Output = Self;
    fn rem(self, rhs: Self) -> Self {
        // d(a mod b) = da - trunc(a / b) db away from the jumps.
        let q = (self.val / rhs.val).trunc();
        Self::new(self.val % rhs.val, self.eps - q * rhs.eps)
    }
}

impl<T: Scalar> AddAssign for Dual<T> {
    fn add_assign(&mut self, rhs: Self) {
        *self = *self + rhs;
    }
}
impl<T: Scalar> SubAssign for Dual<T> {
    fn sub_assign(&mut self, rhs: Self) {
        *self = *self - rhs;
    }
}
impl<T: Scalar> MulAssign for Dual<T> {
    fn mul_assign(&mut self, rhs: Self) {
        *self = *self * rhs;
    }
}
impl<T: Scalar> DivAssign for Dual<T> {
    fn div_assign(&mut self, rhs: Self) {
        *self = *self / rhs;
    }
}
impl<T: Scalar> RemAssign for Dual<T> {
    fn rem_assign(&mut self, rhs: Self) {
        *self = *self % rhs;
    }
}

impl<T: Scalar> Num for Dual<T> {
    type FromStrRadixErr = T::FromStrRadixErr;
    fn from_str_radix(str: &str, radix: u32) -> Result<Self, Self::FromStrRadixErr> {
        T::from_str_radix(str, radix).map(Self::constant)
    }
}

impl<T: Scalar> ToPrimitive for Dual<T> {
    fn to_i64(&self) -> Option<i64> {
        self.val.to_i64()
    }
    fn to_u64(&self) -> Option<u64> {
        self.val.to_u64()
    }
    fn to_f64(&self) -> Option<f64> {
        self.val.to_f64()
    }
}

impl<T: Scalar> FromPrimitive for Dual<T> {
    fn from_i64(n: i64) -> Option<Self> {
        T::from_i64(n).map(Self::constant)
    }
    fn from_u64(n: u64) -> Option<Self> {
        T::from_u64(n).map(Self::constant)
    }
    fn from_f64(n: f64) -> Option<Self> {
        T::from_f64(n).map(Self::constant)
    }
}

impl<T: Scalar> NumCast for Dual<T> {
    fn from<N: ToPrimitive>(n: N) -> Option<Self> {
        <T as NumCast>::from(n).map(Self::constant)
    }
}

impl<T: Scalar> Float for Dual<T> {
    fn nan() -> Self {
        Self::constant(T::nan())
    }
    fn infinity() -> Self {
        Self::constant(T::infinity())
    }
    fn neg_infinity() -> Self {
        Self::constant(T::neg_infinity())
    }
    fn neg_zero() -> Self {
        Self::new(T::neg_zero(), T::neg_zero())
    }
    fn min_value() -> Self {
        Self::constant(T::min_value())
    }
    fn min_positive_value() -> Self {
        Self::constant(T::min_positive_value())
    }
    fn max_value() -> Self {
        Self::constant(T::max_value())
    }
    fn epsilon() -> Self {
        Self::constant(T::epsilon())
    }
    fn is_nan(self) -> bool {
        self.val.is_nan()
    }
    fn is_infinite(self) -> bool {
        self.val.is_infinite()
    }
    fn is_finite(self) -> bool {
        self.val.is_finite()
    }
    fn is_normal(self) -> bool {
        self.val.is_normal()
    }
    fn classify(self) -> std::num::FpCategory {
        self.val.classify()
    }
    fn floor(self) -> Self {
        Self::constant(self.val.floor())
    }
    fn ceil(self) -> Self {
        Self::constant(self.val.ceil())
    }
    fn round(self) -> Self {
        Self::constant(self.val.round())
    }
    fn trunc(self) -> Self {
        Self::constant(self.val.trunc())
    }
    fn fract(self) -> Self {
        Self::new(self.val.fract(), self.eps)
    }
    fn abs(self) -> Self {
        if self.val >= T::zero() {
            self
        } else {
            -self
        }
    }
    fn signum(self) -> Self {
        Self::constant(self.val.signum())
    }
    fn is_sign_positive(self) -> bool {
        self.val.is_sign_positive()
    }
    fn is_sign_negative(self) -> bool {
        self.val.is_sign_negative()
    }
    fn mul_add(self, a: Self, b: Self) -> Self {
        self * a + b
    }
    fn recip(self) -> Self {
        let r = self.val.recip();
        self.chain(r, -r * r)
    }

    fn powi(self, n: i32) -> Self {
        if n == 0 {
            return Self::one();
        }
        let n_t = T::lit(n as f64);
        self.chain(self.val.powi(n), n_t * self.val.powi(n - 1))
    }

    fn powf(self, n: Self) -> Self {
        let val_pow = self.val.powf(n.val);
        let mut eps_new = n.val * self.val.powf(n.val - T::one()) * self.eps;
        // Only pay for ln(x) when the exponent itself carries a derivative,
        // so that negative bases with constant exponents stay finite.
        if !n.eps.is_zero() {
            eps_new = eps_new + val_pow * self.val.ln() * n.eps;
        }
        Self::new(val_pow, eps_new)
    }

    fn sqrt(self) -> Self {
        let s = self.val.sqrt();
        self.chain(s, (T::lit(2.0) * s).recip())
    }

    fn exp(self) -> Self {
        let e = self.val.exp();
        self.chain(e, e)
    }

    fn exp2(self) -> Self {
        let e = self.val.exp2();
        self.chain(e, e * T::lit(std::f64::consts::LN_2))
    }
    fn ln(self) -> Self {
        self.chain(self.val.ln(), self.val.recip())
    }
    fn log(self, base: Self) -> Self {
        self.ln() / base.ln()
    }
    fn log2(self) -> Self {
        self.chain(
            self.val.log2(),
            (self.val * T::lit(std::f64::consts::LN_2)).recip(),
        )
    }
    fn log10(self) -> Self {
        self.chain(
            self.val.log10(),
            (self.val * T::lit(std::f64::consts::LN_10)).recip(),
        )
    }

    fn max(self, other: Self) -> Self {
        if self.val > other.val {
            self
        } else {
            other
        }
    }
    fn min(self, other: Self) -> Self {
        if self.val < other.val {
            self
        } else {
            other
        }
    }

    fn abs_sub(self, other: Self) -> Self {
        if self.val <= other.val {
            Self::zero()
        } else {
            self - other
        }
    }

    fn cbrt(self) -> Self {
        let c = self.val.cbrt();
        self.chain(c, (T::lit(3.0) * c * c).recip())
    }
    fn hypot(self, other: Self) -> Self {
        let h = self.val.hypot(other.val);
        Self::new(h, (self.val * self.eps + other.val * other.eps) / h)
    }

    fn sin(self) -> Self {
        self.chain(self.val.sin(), self.val.cos())
    }
    fn cos(self) -> Self {
        self.chain(self.val.cos(), -self.val.sin())
    }
    fn tan(self) -> Self {
        let t = self.val.tan();
        self.chain(t, T::one() + t * t)
    }
    fn asin(self) -> Self {
        let d = (T::one() - self.val * self.val).sqrt().recip();
        self.chain(self.val.asin(), d)
    }
    fn acos(self) -> Self {
        let d = -(T::one() - self.val * self.val).sqrt().recip();
        self.chain(self.val.acos(), d)
    }
    fn atan(self) -> Self {
        let d = (T::one() + self.val * self.val).recip();
        self.chain(self.val.atan(), d)
    }
    /// `self` is y, `other` is x.
    fn atan2(self, other: Self) -> Self {
        let (y, x) = (self.val, other.val);
        let denom = x * x + y * y;
        Self::new(y.atan2(x), (x * self.eps - y * other.eps) / denom)
    }
    fn sin_cos(self) -> (Self, Self) {
        (self.sin(), self.cos())
    }

    fn exp_m1(self) -> Self {
        self.chain(self.val.exp_m1(), self.val.exp())
    }
    fn ln_1p(self) -> Self {
        self.chain(self.val.ln_1p(), (T::one() + self.val).recip())
    }
    fn sinh(self) -> Self {
        self.chain(self.val.sinh(), self.val.cosh())
    }
    fn cosh(self) -> Self {
        self.chain(self.val.cosh(), self.val.sinh())
    }
    fn tanh(self) -> Self {
        let t = self.val.tanh();
        self.chain(t, T::one() - t * t)
    }
    fn asinh(self) -> Self {
        let d = (self.val * self.val + T::one()).sqrt().recip();
        self.chain(self.val.asinh(), d)
    }
    fn acosh(self) -> Self {
        let d = (self.val * self.val - T::one()).sqrt().recip();
        self.chain(self.val.acosh(), d)
    }
    fn atanh(self) -> Self {
        let d = (T::one() - self.val * self.val).recip();
        self.chain(self.val.atanh(), d)
    }

    fn integer_decode(self) -> (u64, i16, i8) {
        self.val.integer_decode()
    }
}

// --- Derivatives of scalar fields on R^3 ---

/// First-order dual used for gradients.
pub type Dual1 = Dual<f64>;
/// Nested dual used for Hessians.
pub type Dual2 = Dual<Dual<f64>>;

fn unit(i: usize, j: usize) -> f64 {
    if i == j {
        1.0
    } else {
        0.0
    }
}

/// Value and gradient of `f` at `x`, one forward pass per coordinate.
pub fn value_and_gradient<F>(f: F, x: &[f64; 3]) -> (f64, [f64; 3])
where
    F: Fn(&[Dual1; 3]) -> Dual1,
{
    let mut value = 0.0;
    let mut grad = [0.0; 3];
    for j in 0..3 {
        let seeded: [Dual1; 3] = std::array::from_fn(|i| Dual::new(x[i], unit(i, j)));
        let out = f(&seeded);
        value = out.val;
        grad[j] = out.eps;
    }
    (value, grad)
}

/// Gradient of `f` at `x`.
pub fn gradient<F>(f: F, x: &[f64; 3]) -> [f64; 3]
where
    F: Fn(&[Dual1; 3]) -> Dual1,
{
    value_and_gradient(f, x).1
}

/// Hessian of `f` at `x` from the nested dual `eps.eps` parts.
/// Only the upper triangle is evaluated; the result is symmetric.
pub fn hessian<F>(f: F, x: &[f64; 3]) -> [[f64; 3]; 3]
where
    F: Fn(&[Dual2; 3]) -> Dual2,
{
    let mut hess = [[0.0; 3]; 3];
    for i in 0..3 {
        for j in i..3 {
            let seeded: [Dual2; 3] = std::array::from_fn(|k| {
                Dual::new(Dual::new(x[k], unit(k, j)), Dual::new(unit(k, i), 0.0))
            });
            let h = f(&seeded).eps.eps;
            hess[i][j] = h;
            hess[j][i] = h;
        }
    }
    hess
}

#[cfg(test)]
mod tests {
    use super::*;

    fn d(f: impl Fn(Dual1) -> Dual1, x: f64) -> f64 {
        f(Dual::new(x, 1.0)).eps
    }

    fn assert_close(a: f64, b: f64, tol: f64) {
        assert!((a - b).abs() <= tol, "{a} != {b} (tol {tol})");
    }

    #[test]
    fn elementary_derivatives_match_closed_forms() {
        let x = 0.37;
        assert_close(d(|v| v.sin(), x), x.cos(), 1e-14);
        assert_close(d(|v| v.acos(), x), -1.0 / (1.0 - x * x).sqrt(), 1e-14);
        assert_close(d(|v| v.asin(), x), 1.0 / (1.0 - x * x).sqrt(), 1e-14);
        assert_close(d(|v| v.ln_1p(), x), 1.0 / (1.0 + x), 1e-14);
        assert_close(d(|v| v.cbrt(), x), 1.0 / (3.0 * x.cbrt().powi(2)), 1e-13);
        assert_close(d(|v| v.powi(3), x), 3.0 * x * x, 1e-14);
        assert_close(d(|v| v.tanh(), x), 1.0 - x.tanh().powi(2), 1e-14);
        assert_close(d(|v| v.log10(), x), 1.0 / (x * std::f64::consts::LN_10), 1e-13);
    }

    #[test]
    fn powf_handles_constant_exponent_on_negative_base() {
        let x = Dual::new(-2.0, 1.0);
        let y = x.powf(Dual::constant(2.0));
        assert_close(y.val, 4.0, 1e-14);
        assert_close(y.eps, -4.0, 1e-14);
    }

    #[test]
    fn atan2_partials_match_geometry() {
        let (x, y) = (1.5, -0.5);
        let r2 = x * x + y * y;
        let dy = Dual::new(y, 1.0).atan2(Dual::constant(x)).eps;
        let dx = Dual::constant(y).atan2(Dual::new(x, 1.0)).eps;
        assert_close(dy, x / r2, 1e-14);
        assert_close(dx, -y / r2, 1e-14);
    }

    #[test]
    fn gradient_and_hessian_of_polynomial() {
        // f = x^2 y + y z^3
        let f1 = |q: &[Dual1; 3]| q[0] * q[0] * q[1] + q[1] * q[2].powi(3);
        let f2 = |q: &[Dual2; 3]| q[0] * q[0] * q[1] + q[1] * q[2].powi(3);
        let x = [1.0, 2.0, 3.0];

        let (value, grad) = value_and_gradient(f1, &x);
        assert_close(value, 2.0 + 54.0, 1e-12);
        assert_close(grad[0], 4.0, 1e-12);
        assert_close(grad[1], 1.0 + 27.0, 1e-12);
        assert_close(grad[2], 2.0 * 27.0, 1e-12);

        let h = hessian(f2, &x);
        let expected = [[4.0, 2.0, 0.0], [2.0, 0.0, 27.0], [0.0, 27.0, 36.0]];
        for i in 0..3 {
            for j in 0..3 {
                assert_close(h[i][j], expected[i][j], 1e-12);
            }
        }
    }

    #[test]
    fn nested_dual_second_derivative_of_transcendental() {
        // d2/dx2 [ln(1 + x) / x] at x = 0.8
        let x = 0.8_f64;
        let v: Dual2 = Dual::new(Dual::new(x, 1.0), Dual::new(1.0, 0.0));
        let out = (v.ln_1p() / v).eps.eps;
        let expected = -1.0 / (x * (1.0 + x).powi(2)) - 2.0 / (x * x * (1.0 + x))
            + 2.0 * x.ln_1p() / x.powi(3);
        assert_close(out, expected, 1e-12);
    }
}
