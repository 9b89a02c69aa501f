use rand::RngCore;

use crate::config::{COIN_DECIMALS, UNITS_PER_COIN};

// Generate an opaque id of the form `<prefix>_<hex>`
pub fn generate_id(prefix: &str) -> String {
    let mut bytes = [0u8; 8];
    rand::thread_rng().fill_bytes(&mut bytes);
    format!("{}_{}", prefix, hex::encode(bytes))
}

// Convert a decimal UI amount into atomic units.
// Rejects non-finite, negative and overflowing inputs.
pub fn from_ui_amount(value: f64) -> Option<u64> {
    if !value.is_finite() || value < 0.0 {
        return None;
    }
    let units = value * UNITS_PER_COIN as f64;
    if units > u64::MAX as f64 {
        return None;
    }
    Some(units.round() as u64)
}

pub fn to_ui_amount(units: u64) -> f64 {
    units as f64 / UNITS_PER_COIN as f64
}

// Format an atomic amount with full decimals, trimming trailing zeros
pub fn format_amount(units: u64) -> String {
    let whole = units / UNITS_PER_COIN;
    let frac = units % UNITS_PER_COIN;
    if frac == 0 {
        return whole.to_string();
    }
    let frac = format!("{:0width$}", frac, width = COIN_DECIMALS as usize);
    format!("{}.{}", whole, frac.trim_end_matches('0'))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn id_has_prefix_and_entropy() {
        let a = generate_id("wal");
        let b = generate_id("wal");
        assert!(a.starts_with("wal_"));
        assert_ne!(a, b);
    }

    #[test]
    fn ui_amount_round_trip() {
        assert_eq!(from_ui_amount(1.5), Some(1_500_000_000));
        assert_eq!(from_ui_amount(0.000000001), Some(1));
        assert_eq!(from_ui_amount(-1.0), None);
        assert_eq!(from_ui_amount(f64::NAN), None);
        assert_eq!(to_ui_amount(2_000_000_000), 2.0);
    }

    #[test]
    fn amount_formatting() {
        assert_eq!(format_amount(1_000_000_000), "1");
        assert_eq!(format_amount(1_500_000_000), "1.5");
        assert_eq!(format_amount(1), "0.000000001");
    }
}
