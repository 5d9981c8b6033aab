use num_traits::{Float, FromPrimitive};
use std::fmt::Debug;

/// A trait for types that can be used as scalars in potentials and integrators.
/// Implemented by `f64` and by the dual numbers in [`crate::autodiff`], so a
/// scalar field written once can be evaluated, differentiated and
/// twice-differentiated.
pub trait Scalar: Float + FromPrimitive + Debug + Send + Sync + 'static {
    /// Lifts an `f64` constant into this scalar type (zero derivative part).
    fn lit(value: f64) -> Self {
        Self::from_f64(value).unwrap_or_else(Self::nan)
    }
}

impl<T: Float + FromPrimitive + Debug + Send + Sync + 'static> Scalar for T {}

/// A first-order system of ODEs, dx/dt = f(t, x).
pub trait DynamicalSystem<T: Scalar> {
    /// Returns the dimension of the state space.
    fn dimension(&self) -> usize;

    /// Evaluates the vector field.
    /// t: current time
    /// x: current state
    /// out: buffer to write dx/dt into
    fn apply(&self, t: T, x: &[T], out: &mut [T]);
}

/// A trait for solvers that can step a system forward.
pub trait Steppable<T: Scalar> {
    /// Performs one step of size dt (which may be negative).
    /// t: current time (updated after step)
    /// state: current state (updated after step)
    fn step(&mut self, system: &impl DynamicalSystem<T>, t: &mut T, state: &mut [T], dt: T);
}

/// A stepper with an embedded lower-order solution.
pub trait AdaptiveSteppable<T: Scalar>: Steppable<T> {
    /// Performs one trial step of size dt, writing the candidate state into
    /// `out` and returning the RMS error norm scaled by `atol + rtol * |x|`.
    /// The caller decides whether to accept the candidate.
    #[allow(clippy::too_many_arguments)]
    fn trial_step(
        &mut self,
        system: &impl DynamicalSystem<T>,
        t: T,
        state: &[T],
        dt: T,
        rtol: T,
        atol: T,
        out: &mut [T],
    ) -> T;
}
