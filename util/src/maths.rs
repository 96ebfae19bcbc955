//! Utility maths functions

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

use num_traits::Float;

// ---------------------------------------------------------------------------
// PUBLIC FUNCTIONS
// ---------------------------------------------------------------------------

/// Calculates the least nonnegative remainder of `lhs (mod rhs)`.
/// 
/// This function is taken from the std library as num is missing it.
///
/// In particular, the return value `r` satisfies `0.0 <= r < rhs.abs()` in
/// most cases. However, due to a floating point round-off error it can
/// result in `r == rhs.abs()` if `lhs` is much smaller than `rhs.abs()` in
/// magnitude and `lhs < 0.0`.
pub fn rem_euclid<T>(lhs: T, rhs: T) -> T
where
    T: Float
{
    let r = lhs % rhs;
    if r < T::zero() { r + rhs.abs() } else { r }
}

/// Wrap an angle into the half-open range (-pi, pi].
pub fn wrap_pi<T>(angle: T) -> T
where
    T: Float
{
    let pi_t: T = T::from(std::f64::consts::PI).unwrap();
    let tau_t: T = T::from(std::f64::consts::TAU).unwrap();

    let r = rem_euclid(angle + pi_t, tau_t) - pi_t;

    // -pi is excluded, as is the pi + epsilon produced by rem_euclid's round-off
    if r <= -pi_t || r > pi_t {
        pi_t
    }
    else {
        r
    }
}

/// Evaluate the probability density of a normal distribution with the given
/// `mean` and standard deviation `sigma` at `x`.
pub fn gaussian_pdf<T>(x: T, mean: T, sigma: T) -> T
where
    T: Float
{
    let two_t: T = T::from(2.0).unwrap();
    let sqrt_tau_t: T = T::from(std::f64::consts::TAU.sqrt()).unwrap();

    let z = (x - mean) / sigma;

    (-(z * z) / two_t).exp() / (sigma * sqrt_tau_t)
}

// ---------------------------------------------------------------------------
// TESTS
// ---------------------------------------------------------------------------
