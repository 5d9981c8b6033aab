//! Spherical-harmonic multipole expansions.
//!
//! With s = r / r_s and Y_lm = N_lm P_l^m(cos θ) e^{imφ},
//!
//! Φ = (G m / r_s) Σ_{l ≤ l_max} Σ_{m ≤ l} f_l(s) (S_lm Re Y_lm + T_lm Im Y_lm)
//!
//! where f_l(s) = s^l for the inner expansion and s^-(l+1) for the outer
//! one. The associated Legendre functions carry no Condon-Shortley phase.
//!
//! The harmonics are evaluated in Cartesian form,
//! P_l^m(cos θ) e^{imφ} = Q_l^m(z / r) ((x + iy) / r)^m with Q_l^m a
//! polynomial, so derivatives stay finite on the z axis.

use super::{radius, Potential};
use crate::error::Result;
use crate::params::{CoefficientParameter, ParamInput, Parameter};
use crate::traits::Scalar;
use crate::units::{Dimension, UnitSystem};
use num_complex::Complex;
use std::f64::consts::PI;

#[inline]
fn tril(l: usize, m: usize) -> usize {
    l * (l + 1) / 2 + m
}

/// Parameters and precomputed normalisations shared by every expansion.
#[derive(Debug, Clone)]
struct Expansion {
    m_tot: Parameter,
    r_s: Parameter,
    l_max: usize,
    norms: Vec<f64>,
}

impl Expansion {
    fn new(
        m_tot: impl Into<ParamInput>,
        r_s: impl Into<ParamInput>,
        l_max: usize,
        units: &UnitSystem,
    ) -> Result<Self> {
        let m_tot = m_tot.into().resolve("m_tot", Dimension::MASS, units)?;
        let r_s = r_s.into().resolve("r_s", Dimension::LENGTH, units)?;
        let mut norms = vec![0.0; tril(l_max + 1, 0)];
        for l in 0..=l_max {
            for m in 0..=l {
                // (l - m)! / (l + m)!
                let ratio: f64 = ((l - m + 1)..=(l + m)).map(|k| 1.0 / k as f64).product();
                norms[tril(l, m)] = ((2 * l + 1) as f64 / (4.0 * PI) * ratio).sqrt();
            }
        }
        Ok(Self {
            m_tot,
            r_s,
            l_max,
            norms,
        })
    }

    fn amplitude(&self, units: &UnitSystem, t: f64) -> f64 {
        units.g() * self.m_tot.value(t) / self.r_s.value(t)
    }

    /// Normalised radius and the Y_lm table for m ≥ 0, in lower-triangular order.
    fn harmonics<T: Scalar>(&self, q: &[T; 3], t: f64) -> (T, Vec<Complex<T>>) {
        let r = radius(q);
        let s = r / T::lit(self.r_s.value(t));
        let cos_theta = q[2] / r;
        let polynomial = associated_legendre(self.l_max, cos_theta, T::one());

        // ((x + iy) / r)^m = sin^m θ e^{imφ}
        let w = Complex::new(q[0] / r, q[1] / r);
        let mut w_pow = vec![Complex::new(T::one(), T::zero()); self.l_max + 1];
        for m in 1..=self.l_max {
            w_pow[m] = w_pow[m - 1] * w;
        }

        let mut ylm = Vec::with_capacity(polynomial.len());
        for l in 0..=self.l_max {
            for m in 0..=l {
                let nq = T::lit(self.norms[tril(l, m)]) * polynomial[tril(l, m)];
                ylm.push(w_pow[m].scale(nq));
            }
        }
        (s, ylm)
    }
}

/// P_l^m(x) for 0 ≤ m ≤ l ≤ l_max, without the Condon-Shortley phase.
/// With `sin_theta` = 1 this yields the polynomial part Q_l^m(x).
fn associated_legendre<T: Scalar>(l_max: usize, x: T, sin_theta: T) -> Vec<T> {
    let mut p = vec![T::zero(); tril(l_max + 1, 0)];
    let mut pmm = T::one();
    for m in 0..=l_max {
        if m > 0 {
            pmm = pmm * T::lit((2 * m - 1) as f64) * sin_theta;
        }
        p[tril(m, m)] = pmm;
        if m == l_max {
            break;
        }
        p[tril(m + 1, m)] = x * T::lit((2 * m + 1) as f64) * pmm;
        for l in (m + 2)..=l_max {
            let a = T::lit((2 * l - 1) as f64) * x * p[tril(l - 1, m)];
            let b = T::lit((l + m - 1) as f64) * p[tril(l - 2, m)];
            p[tril(l, m)] = (a - b) / T::lit((l - m) as f64);
        }
    }
    p
}

fn weighted_sum<T: Scalar>(
    l_max: usize,
    ylm: &[Complex<T>],
    radial: impl Fn(usize) -> T,
    slm: &nalgebra::DMatrix<f64>,
    tlm: &nalgebra::DMatrix<f64>,
) -> T {
    let mut total = T::zero();
    for l in 0..=l_max {
        let f = radial(l);
        for m in 0..=l {
            let (s, t) = (slm[(l, m)], tlm[(l, m)]);
            if s == 0.0 && t == 0.0 {
                continue;
            }
            let y = &ylm[tril(l, m)];
            total = total + f * (T::lit(s) * y.re + T::lit(t) * y.im);
        }
    }
    total
}

/// Interior expansion, regular at the origin: terms grow as s^l.
#[derive(Debug, Clone)]
pub struct MultipoleInnerPotential {
    expansion: Expansion,
    pub slm: CoefficientParameter,
    pub tlm: CoefficientParameter,
    units: UnitSystem,
}

impl MultipoleInnerPotential {
    pub fn new(
        m_tot: impl Into<ParamInput>,
        r_s: impl Into<ParamInput>,
        l_max: usize,
        slm: CoefficientParameter,
        tlm: CoefficientParameter,
        units: UnitSystem,
    ) -> Result<Self> {
        let expansion = Expansion::new(m_tot, r_s, l_max, &units)?;
        slm.check_shape("Slm", l_max + 1)?;
        tlm.check_shape("Tlm", l_max + 1)?;
        Ok(Self {
            expansion,
            slm,
            tlm,
            units,
        })
    }

    pub fn l_max(&self) -> usize {
        self.expansion.l_max
    }
}

impl Potential for MultipoleInnerPotential {
    fn units(&self) -> &UnitSystem {
        &self.units
    }

    fn energy<T: Scalar>(&self, q: &[T; 3], t: f64) -> T {
        let (s, ylm) = self.expansion.harmonics(q, t);
        let sum = weighted_sum(
            self.expansion.l_max,
            &ylm,
            |l| s.powi(l as i32),
            &self.slm.value(t),
            &self.tlm.value(t),
        );
        T::lit(self.expansion.amplitude(&self.units, t)) * sum
    }
}

/// Exterior expansion, regular at infinity: terms decay as s^-(l+1).
#[derive(Debug, Clone)]
pub struct MultipoleOuterPotential {
    expansion: Expansion,
    pub slm: CoefficientParameter,
    pub tlm: CoefficientParameter,
    units: UnitSystem,
}

impl MultipoleOuterPotential {
    pub fn new(
        m_tot: impl Into<ParamInput>,
        r_s: impl Into<ParamInput>,
        l_max: usize,
        slm: CoefficientParameter,
        tlm: CoefficientParameter,
        units: UnitSystem,
    ) -> Result<Self> {
        let expansion = Expansion::new(m_tot, r_s, l_max, &units)?;
        slm.check_shape("Slm", l_max + 1)?;
        tlm.check_shape("Tlm", l_max + 1)?;
        Ok(Self {
            expansion,
            slm,
            tlm,
            units,
        })
    }

    pub fn l_max(&self) -> usize {
        self.expansion.l_max
    }
}

impl Potential for MultipoleOuterPotential {
    fn units(&self) -> &UnitSystem {
        &self.units
    }

    fn energy<T: Scalar>(&self, q: &[T; 3], t: f64) -> T {
        let (s, ylm) = self.expansion.harmonics(q, t);
        let sum = weighted_sum(
            self.expansion.l_max,
            &ylm,
            |l| s.powi(-(l as i32 + 1)),
            &self.slm.value(t),
            &self.tlm.value(t),
        );
        T::lit(self.expansion.amplitude(&self.units, t)) * sum
    }
}

/// Inner and outer expansions sharing m_tot, r_s and l_max.
#[derive(Debug, Clone)]
pub struct MultipolePotential {
    expansion: Expansion,
    pub is_lm: CoefficientParameter,
    pub it_lm: CoefficientParameter,
    pub os_lm: CoefficientParameter,
    pub ot_lm: CoefficientParameter,
    units: UnitSystem,
}

impl MultipolePotential {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        m_tot: impl Into<ParamInput>,
        r_s: impl Into<ParamInput>,
        l_max: usize,
        is_lm: CoefficientParameter,
        it_lm: CoefficientParameter,
        os_lm: CoefficientParameter,
        ot_lm: CoefficientParameter,
        units: UnitSystem,
    ) -> Result<Self> {
        let expansion = Expansion::new(m_tot, r_s, l_max, &units)?;
        is_lm.check_shape("ISlm", l_max + 1)?;
        it_lm.check_shape("ITlm", l_max + 1)?;
        os_lm.check_shape("OSlm", l_max + 1)?;
        ot_lm.check_shape("OTlm", l_max + 1)?;
        Ok(Self {
            expansion,
            is_lm,
            it_lm,
            os_lm,
            ot_lm,
            units,
        })
    }

    pub fn l_max(&self) -> usize {
        self.expansion.l_max
    }
}

impl Potential for MultipolePotential {
    fn units(&self) -> &UnitSystem {
        &self.units
    }

    fn energy<T: Scalar>(&self, q: &[T; 3], t: f64) -> T {
        let (s, ylm) = self.expansion.harmonics(q, t);
        let l_max = self.expansion.l_max;
        let inner = weighted_sum(
            l_max,
            &ylm,
            |l| s.powi(l as i32),
            &self.is_lm.value(t),
            &self.it_lm.value(t),
        );
        let outer = weighted_sum(
            l_max,
            &ylm,
            |l| s.powi(-(l as i32 + 1)),
            &self.os_lm.value(t),
            &self.ot_lm.value(t),
        );
        T::lit(self.expansion.amplitude(&self.units, t)) * (inner + outer)
    }
}
