//! Lookup and rounding helpers shared by the generators.

/// Metrics are stored with millesimal precision.
pub fn round(value: f64) -> f64 {
    (value * 1000.0).round() / 1000.0
}

/// First `(key, capacity)` whose capacity covers `demand`.
pub fn first_covering<K: Copy>(table: &[(K, f64)], demand: f64) -> Option<(K, f64)> {
    table.iter().copied().find(|(_, capacity)| *capacity >= demand)
}

/// Flow velocity in m/s of `flow_m3_s` through a round section of `diameter_mm`.
pub fn velocity(flow_m3_s: f64, diameter_mm: f64) -> f64 {
    let d = diameter_mm / 1000.0;
    let area = std::f64::consts::PI * d * d / 4.0;
    if area > 0.0 {
        flow_m3_s / area
    } else {
        f64::INFINITY
    }
}

/// Smallest diameter keeping velocity at or below `max_velocity`.
pub fn size_round_section(diameters_mm: &[f64], flow_m3_s: f64, max_velocity: f64) -> Option<(f64, f64)> {
    diameters_mm
        .iter()
        .map(|d| (*d, velocity(flow_m3_s, *d)))
        .find(|(_, v)| *v <= max_velocity)
}

/// Display helper for calculation tables.
pub fn fmt(value: f64, decimals: usize) -> String {
    format!("{value:.decimals$}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_round() {
        assert_eq!(round(1.23456), 1.235);
        assert_eq!(round(-0.0004), -0.0);
    }

    #[test]
    fn test_first_covering() {
        let table = [(10, 1.0), (20, 2.0), (30, 3.0)];
        assert_eq!(first_covering(&table, 1.5), Some((20, 2.0)));
        assert_eq!(first_covering(&table, 2.0), Some((20, 2.0)));
        assert_eq!(first_covering(&table, 3.5), None);
    }

    #[test]
    fn test_size_round_section() {
        // 0.9 l/s needs at least 24 mm at 2 m/s
        let (d, v) = size_round_section(&[16.0, 20.0, 25.0, 32.0], 0.0009, 2.0).expect("size");
        assert_eq!(d, 25.0);
        assert!(v < 2.0 && v > 1.8);
        assert!(size_round_section(&[16.0], 0.01, 2.0).is_none());
    }

    #[test]
    fn test_fmt() {
        assert_eq!(fmt(3.14159, 2), "3.14");
        assert_eq!(fmt(2.0, 0), "2");
    }
}
