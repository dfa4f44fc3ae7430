// Numeric approximations

/// Linearly interpolate between `a` and `b`.
///
/// Parameters:
/// - `a` - The value at `t = 0`
/// - `b` - The value at `t = 1`
/// - `t` - The interpolation fraction
pub fn lerp(a: f64, b: f64, t: f64) -> f64 {
    a * (1.0 - t) + b * t
}

/// Cubic interpolation through four consecutive samples using a Catmull-Rom
/// spline. The curve passes through `b` at `t = 0` and `c` at `t = 1`.
///
/// Catmull-Rom overshoots near sharp gradients, so the result is clamped
/// to the range spanned by the four input samples.
///
/// Parameters:
/// - `a`, `b`, `c`, `d` - Four consecutive samples
/// - `t` - The fraction between `b` and `c`, in `[0, 1]`
///
/// Returns:
///     The interpolated value, within `[min(a..d), max(a..d)]`.
pub fn cerp(a: f64, b: f64, c: f64, d: f64, t: f64) -> f64 {
    let tsq = t * t;
    let tcu = tsq * t;

    let min_v = a.min(b).min(c).min(d);
    let max_v = a.max(b).max(c).max(d);

    let value = a * (0.0 - 0.5 * t + 1.0 * tsq - 0.5 * tcu)
        + b * (1.0 + 0.0 * t - 2.5 * tsq + 1.5 * tcu)
        + c * (0.0 + 0.5 * t + 2.0 * tsq - 1.5 * tcu)
        + d * (0.0 + 0.0 * t - 0.5 * tsq + 0.5 * tcu);

    value.clamp(min_v, max_v)
}

/// Smooth radial falloff. Maps `0` to `1` and `|x| >= 1` to `0`, following
/// `1 - x²(3 - 2x)` in between.
pub fn cubic_pulse(x: f64) -> f64 {
    let x = x.abs().min(1.0);
    1.0 - x * x * (3.0 - 2.0 * x)
}

/// Split a continuous coordinate into a base index and fraction for an axis
/// of `n` samples. The coordinate is clamped into `[0, n - 1]`, and the base
/// index never exceeds `n - 2` so the last node is reached with fraction 1.
pub fn split_coord(x: f64, n: usize) -> (usize, f64) {
    let max = n.saturating_sub(1) as f64;
    let x = if x.is_nan() { 0.0 } else { x.clamp(0.0, max) };
    let i = (x.floor() as usize).min(n.saturating_sub(2));

    (i, x - i as f64)
}
