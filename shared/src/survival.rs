//! Survivor projection and realized mortality

/// Project the survivor count of `estimated_quantity` specimens at
/// `mortality_percent` mortality: `floor(q * (1 - m / 100))`.
///
/// A negative or non-finite quantity, or a mortality outside `[0, 100]`,
/// yields 0 instead of an error. Planning forms call this on every
/// keystroke and must always have a value to show.
pub fn project(estimated_quantity: f64, mortality_percent: f64) -> u64 {
    if !estimated_quantity.is_finite()
        || !mortality_percent.is_finite()
        || estimated_quantity < 0.0
        || !(0.0..=100.0).contains(&mortality_percent)
    {
        return 0;
    }

    let survivors = estimated_quantity * (100.0 - mortality_percent) / 100.0;
    survivors
        .floor()
        .min(estimated_quantity.floor())
        .max(0.0) as u64
}

/// Mortality (percent) realized by a harvest of `actual` out of `estimated`.
///
/// Negative when more was harvested than estimated; 0 when nothing was
/// estimated.
pub fn realized_mortality(estimated: u64, actual: u64) -> f64 {
    if estimated == 0 {
        return 0.0;
    }
    (estimated as f64 - actual as f64) / estimated as f64 * 100.0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fifteen_percent_mortality() {
        assert_eq!(project(1000.0, 15.0), 850);
    }

    #[test]
    fn test_floor_applied() {
        // 999 * 0.85 = 849.15
        assert_eq!(project(999.0, 15.0), 849);
        assert_eq!(project(10.0, 33.3), 6);
    }

    #[test]
    fn test_boundaries() {
        assert_eq!(project(500.0, 0.0), 500);
        assert_eq!(project(500.0, 100.0), 0);
        assert_eq!(project(0.0, 20.0), 0);
    }

    /// Invalid input yields 0 rather than an error; live-editing forms rely on it.
    #[test]
    fn test_invalid_input_defaults_to_zero() {
        assert_eq!(project(-10.0, 15.0), 0);
        assert_eq!(project(1000.0, -1.0), 0);
        assert_eq!(project(1000.0, 100.5), 0);
        assert_eq!(project(f64::NAN, 15.0), 0);
        assert_eq!(project(1000.0, f64::INFINITY), 0);
    }

    #[test]
    fn test_realized_mortality() {
        assert!((realized_mortality(1000, 800) - 20.0).abs() < 1e-9);
        assert!((realized_mortality(1000, 1100) + 10.0).abs() < 1e-9);
        assert_eq!(realized_mortality(0, 10), 0.0);
    }

    /// Any mortality above zero drops a single specimen below a whole survivor
    #[test]
    fn test_tiny_mortality_still_floors() {
        assert_eq!(project(1.0, 5e-11), 0);
        assert_eq!(project(1000.0, 1e-9), 999);
        assert_eq!(project(2000.0, 10.0), 1800);
    }
}
