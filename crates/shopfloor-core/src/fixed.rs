use fixed::types::I32F32;

/// Q32.32 fixed-point: 32 integer bits, 32 fractional bits.
pub type Fixed64 = I32F32;

/// Cash amounts. Fixed-point so payroll and amortization are reproducible.
pub type Money = Fixed64;

/// Simulated days are the atomic unit of simulation time.
pub type Day = u32;

/// Convert an f64 to Fixed64. Use only for initialization, never in sim loop.
#[inline]
pub fn f64_to_fixed64(v: f64) -> Fixed64 {
    Fixed64::from_num(v)
}

/// Convert Fixed64 to f64. Use only for display, never in sim loop.
#[inline]
pub fn fixed64_to_f64(v: Fixed64) -> f64 {
    v.to_num::<f64>()
}

/// Convert a unit count into fixed-point, saturating above `i32::MAX`.
#[inline]
pub fn from_units(v: u32) -> Fixed64 {
    Fixed64::saturating_from_num(v)
}

/// Square root by Newton iteration on the fixed-point value.
///
/// Returns zero for non-positive inputs. Converges in a handful of steps for
/// the small magnitudes the simulation feeds it (worker counts).
pub fn sqrt(v: Fixed64) -> Fixed64 {
    if v <= Fixed64::ZERO {
        return Fixed64::ZERO;
    }
    let two = Fixed64::from_num(2);
    let mut x = if v > Fixed64::ONE { v / two } else { Fixed64::ONE };
    for _ in 0..32 {
        let next = (x + v / x) / two;
        if next == x {
            break;
        }
        x = next;
    }
    x
}

/// Clamp a motivation/morale style value into `[0, 100]`.
#[inline]
pub fn clamp_percent(v: Fixed64) -> Fixed64 {
    v.clamp(Fixed64::ZERO, Fixed64::from_num(100))
}
