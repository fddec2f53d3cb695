//! Waveform table: 360-entry sine lookup, one entry per degree.
//! Values are 100·sin(θ) rounded to the nearest integer, built at compile time.

/// Number of entries in the table (one per degree).
pub const TABLE_SIZE: usize = 360;

/// Peak magnitude of a table entry.
pub const AMPLITUDE: i32 = 100;

/// Precomputed sine table, `SINE_TABLE[d] == round(100 * sin(d°))`.
pub static SINE_TABLE: [i8; TABLE_SIZE] = {
    let mut table = [0i8; TABLE_SIZE];
    let mut i = 0;
    while i < TABLE_SIZE {
        let radians = (i as f64) * core::f64::consts::PI / 180.0;
        table[i] = round_to_i8(const_sin(radians) * AMPLITUDE as f64);
        i += 1;
    }
    table
};

/// Const-compatible sine approximation. Folds into [-π/2, π/2] first so the
/// Taylor series stays well below half a table step of error.
const fn const_sin(x: f64) -> f64 {
    use core::f64::consts::{FRAC_PI_2, PI};

    let mut x = x;
    while x > PI {
        x -= 2.0 * PI;
    }
    while x < -PI {
        x += 2.0 * PI;
    }
    // sin(x) = sin(π - x)
    if x > FRAC_PI_2 {
        x = PI - x;
    } else if x < -FRAC_PI_2 {
        x = -PI - x;
    }

    let x2 = x * x;
    let x3 = x2 * x;
    let x5 = x3 * x2;
    let x7 = x5 * x2;
    let x9 = x7 * x2;
    let x11 = x9 * x2;

    x - x3 / 6.0 + x5 / 120.0 - x7 / 5040.0 + x9 / 362_880.0 - x11 / 39_916_800.0
}

const fn round_to_i8(v: f64) -> i8 {
    if v >= 0.0 {
        (v + 0.5) as i8
    } else {
        (v - 0.5) as i8
    }
}

/// Sine of an angle in whole degrees, scaled to [-100, 100].
/// Any integer is accepted; negative angles wrap with a non-negative modulo.
#[inline]
pub fn sine(angle_degrees: i64) -> i32 {
    let idx = angle_degrees.rem_euclid(TABLE_SIZE as i64) as usize;
    SINE_TABLE[idx] as i32
}

/// Cosine in whole degrees, defined as `sine(angle + 90)`.
#[inline]
pub fn cosine(angle_degrees: i64) -> i32 {
    sine(angle_degrees.rem_euclid(TABLE_SIZE as i64) + 90)
}
