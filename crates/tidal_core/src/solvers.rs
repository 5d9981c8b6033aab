use crate::traits::{AdaptiveSteppable, DynamicalSystem, Scalar, Steppable};

/// Classic Runge-Kutta 4th Order Solver
pub struct RK4<T: Scalar> {
    k1: Vec<T>,
    k2: Vec<T>,
    k3: Vec<T>,
    k4: Vec<T>,
    tmp: Vec<T>,
}

impl<T: Scalar> RK4<T> {
    pub fn new(dim: usize) -> Self {
        let z = T::zero();
        Self {
            k1: vec![z; dim],
            k2: vec![z; dim],
            k3: vec![z; dim],
            k4: vec![z; dim],
            tmp: vec![z; dim],
        }
    }
}

impl<T: Scalar> Steppable<T> for RK4<T> {
    fn step(&mut self, system: &impl DynamicalSystem<T>, t: &mut T, state: &mut [T], dt: T) {
        let half = T::lit(0.5);
        let sixth = T::lit(1.0 / 6.0);
        let two = T::lit(2.0);

        let t0 = *t;

        // k1 = f(t, y)
        system.apply(t0, state, &mut self.k1);

        // k2 = f(t + dt/2, y + dt*k1/2)
        for i in 0..state.len() {
            self.tmp[i] = state[i] + dt * self.k1[i] * half;
        }
        system.apply(t0 + dt * half, &self.tmp, &mut self.k2);

        // k3 = f(t + dt/2, y + dt*k2/2)
        for i in 0..state.len() {
            self.tmp[i] = state[i] + dt * self.k2[i] * half;
        }
        system.apply(t0 + dt * half, &self.tmp, &mut self.k3);

        // k4 = f(t + dt, y + dt*k3)
        for i in 0..state.len() {
            self.tmp[i] = state[i] + dt * self.k3[i];
        }
        system.apply(t0 + dt, &self.tmp, &mut self.k4);

        // y_next = y + dt/6 * (k1 + 2k2 + 2k3 + k4)
        for i in 0..state.len() {
            state[i] = state[i]
                + dt * sixth * (self.k1[i] + two * self.k2[i] + two * self.k3[i] + self.k4[i]);
        }

        *t = t0 + dt;
    }
}

// Tsitouras (2011) 5(4) tableau.
const C: [f64; 6] = [0.0, 0.161, 0.327, 0.9, 0.9800255409045097, 1.0];

const A: [[f64; 5]; 6] = [
    [0.0, 0.0, 0.0, 0.0, 0.0],
    [0.161, 0.0, 0.0, 0.0, 0.0],
    [-0.008480655492356989, 0.335480655492357, 0.0, 0.0, 0.0],
    [2.897153057105493, -6.359448489975075, 4.3622954328695815, 0.0, 0.0],
    [
        5.325864828439257,
        -11.748883564062828,
        7.4955393428898365,
        -0.09249506636175525,
        0.0,
    ],
    [
        5.86145544294642,
        -12.92096931784711,
        8.159367898576159,
        -0.071584973281401,
        -0.028269050394068383,
    ],
];

// 5th order weights (FSAL: also the 7th stage row).
const B: [f64; 6] = [
    0.09646076681806523,
    0.01,
    0.4798896504144996,
    1.379008574103742,
    -3.290069515436081,
    2.324710524099774,
];

// Difference between the 5th and embedded 4th order weights, stages 1..=7.
const BTILDE: [f64; 7] = [
    -0.00178001105222577714,
    -0.0008164344596567469,
    0.007880878010261995,
    -0.1447110071732629,
    0.5823571654525552,
    -0.45808210592918697,
    1.0 / 66.0,
];

/// Tsitouras 5/4 Solver
pub struct Tsit5<T: Scalar> {
    k: [Vec<T>; 7],
    tmp: Vec<T>,
    next: Vec<T>,
}

impl<T: Scalar> Tsit5<T> {
    pub fn new(dim: usize) -> Self {
        let z = T::zero();
        Self {
            k: std::array::from_fn(|_| vec![z; dim]),
            tmp: vec![z; dim],
            next: vec![z; dim],
        }
    }

    /// Evaluates stages k1..k6 and writes the 5th order solution into `out`.
    fn stages(&mut self, system: &impl DynamicalSystem<T>, t0: T, state: &[T], dt: T, out: &mut [T]) {
        let n = state.len();
        system.apply(t0, state, &mut self.k[0]);
        for s in 1..6 {
            for i in 0..n {
                let mut acc = T::zero();
                for (j, &a) in A[s][..s].iter().enumerate() {
                    acc = acc + T::lit(a) * self.k[j][i];
                }
                self.tmp[i] = state[i] + dt * acc;
            }
            system.apply(t0 + T::lit(C[s]) * dt, &self.tmp, &mut self.k[s]);
        }
        for i in 0..n {
            let mut acc = T::zero();
            for (j, &b) in B.iter().enumerate() {
                acc = acc + T::lit(b) * self.k[j][i];
            }
            out[i] = state[i] + dt * acc;
        }
    }
}

impl<T: Scalar> Steppable<T> for Tsit5<T> {
    fn step(&mut self, system: &impl DynamicalSystem<T>, t: &mut T, state: &mut [T], dt: T) {
        let t0 = *t;
        let mut next = std::mem::take(&mut self.next);
        self.stages(system, t0, state, dt, &mut next);
        state.copy_from_slice(&next);
        self.next = next;
        *t = t0 + dt;
    }
}

impl<T: Scalar> AdaptiveSteppable<T> for Tsit5<T> {
    fn trial_step(
        &mut self,
        system: &impl DynamicalSystem<T>,
        t: T,
        state: &[T],
        dt: T,
        rtol: T,
        atol: T,
        out: &mut [T],
    ) -> T {
        self.stages(system, t, state, dt, out);
        system.apply(t + dt, out, &mut self.k[6]);

        let n = state.len();
        let mut sum = T::zero();
        for i in 0..n {
            let mut err = T::zero();
            for (j, &bt) in BTILDE.iter().enumerate() {
                err = err + T::lit(bt) * self.k[j][i];
            }
            let scale = atol + rtol * state[i].abs().max(out[i].abs());
            let e = dt * err / scale;
            sum = sum + e * e;
        }
        (sum / T::lit(n as f64)).sqrt()
    }
}
