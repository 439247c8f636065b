//! Value transforms between capability values and protocol attributes
//!
//! Pure functions, no state. Forward transforms take an `Option<f64>`
//! (missing or non-numeric capability values arrive as `None`) and return
//! `None` for those, which the caller maps to the protocol's null. Every
//! forward transform clamps to its output range.

/// Minimum LevelControl level
pub const LEVEL_MIN: u8 = 1;
/// Maximum LevelControl level
pub const LEVEL_MAX: u8 = 254;
/// Maximum hue / saturation value
pub const COLOR_MAX: u8 = 254;
/// Coolest supported color temperature (6500 K)
pub const MIREDS_MIN: u16 = 153;
/// Warmest supported color temperature (2000 K)
pub const MIREDS_MAX: u16 = 500;
/// Lowest representable temperature in hundredths of a degree (absolute zero)
pub const TEMPERATURE_MIN_100THS: i16 = -27315;
/// Fully closed lift position
pub const LIFT_CLOSED_100THS: u16 = 10000;
/// Maximum length of identity strings handed to the gateway
pub const MAX_LABEL_BYTES: usize = 32;
/// Marker appended to truncated labels
pub const ELLIPSIS: &str = "...";

/// Linearly rescale `value` from `[in_min, in_max]` to `[out_min, out_max]`
///
/// The input is clamped to its range first. A degenerate input range maps
/// everything to `out_min`.
pub fn scale(value: f64, in_min: f64, in_max: f64, out_min: f64, out_max: f64) -> f64 {
    if in_max <= in_min {
        return out_min;
    }
    let v = value.clamp(in_min, in_max);
    out_min + (v - in_min) * (out_max - out_min) / (in_max - in_min)
}

/// Round and clamp to an integer range
pub fn round_clamp(value: f64, min: i64, max: i64) -> i64 {
    (value.round() as i64).clamp(min, max)
}

fn finite(value: Option<f64>) -> Option<f64> {
    value.filter(|v| v.is_finite())
}

/// `dim` fraction (0..1) to LevelControl level (1..254)
pub fn dim_to_level(dim: Option<f64>) -> Option<u8> {
    finite(dim).map(|d| round_clamp(d * LEVEL_MAX as f64, LEVEL_MIN as i64, LEVEL_MAX as i64) as u8)
}

/// LevelControl level to `dim` fraction
pub fn level_to_dim(level: u8) -> f64 {
    (level.min(LEVEL_MAX) as f64 / LEVEL_MAX as f64).clamp(0.0, 1.0)
}

/// `light_hue` fraction (0..1) to hue degrees (0..360)
pub fn hue_to_degrees(hue: f64) -> f64 {
    hue.clamp(0.0, 1.0) * 360.0
}

/// `light_hue` fraction to ColorControl currentHue (0..254), via degrees
pub fn hue_to_protocol(hue: Option<f64>) -> Option<u8> {
    finite(hue).map(|h| {
        let degrees = hue_to_degrees(h);
        round_clamp(scale(degrees, 0.0, 360.0, 0.0, COLOR_MAX as f64), 0, COLOR_MAX as i64) as u8
    })
}

/// ColorControl hue to `light_hue` fraction
pub fn protocol_to_hue(hue: u8) -> f64 {
    let degrees = scale(hue as f64, 0.0, COLOR_MAX as f64, 0.0, 360.0);
    degrees / 360.0
}

/// `light_saturation` fraction to ColorControl currentSaturation (0..254)
pub fn saturation_to_protocol(saturation: Option<f64>) -> Option<u8> {
    finite(saturation).map(|s| round_clamp(s * COLOR_MAX as f64, 0, COLOR_MAX as i64) as u8)
}

/// ColorControl saturation to `light_saturation` fraction
pub fn protocol_to_saturation(saturation: u8) -> f64 {
    scale(saturation as f64, 0.0, COLOR_MAX as f64, 0.0, 1.0)
}

/// `light_temperature` fraction (0 = coolest) to mireds
pub fn temperature_to_mireds(temperature: Option<f64>) -> Option<u16> {
    finite(temperature).map(|t| {
        let mireds = scale(t, 0.0, 1.0, MIREDS_MIN as f64, MIREDS_MAX as f64);
        round_clamp(mireds, MIREDS_MIN as i64, MIREDS_MAX as i64) as u16
    })
}

/// Mireds to `light_temperature` fraction
pub fn mireds_to_temperature(mireds: u16) -> f64 {
    scale(mireds as f64, MIREDS_MIN as f64, MIREDS_MAX as f64, 0.0, 1.0)
}

/// Degrees Celsius to hundredths (TemperatureMeasurement / Thermostat)
pub fn celsius_to_100ths(celsius: Option<f64>) -> Option<i16> {
    finite(celsius)
        .map(|c| round_clamp(c * 100.0, TEMPERATURE_MIN_100THS as i64, i16::MAX as i64) as i16)
}

/// Hundredths of a degree to degrees Celsius
pub fn hundredths_to_celsius(value: i16) -> f64 {
    value as f64 / 100.0
}

/// Relative humidity percent to hundredths (0..10000)
pub fn humidity_to_100ths(percent: Option<f64>) -> Option<u16> {
    finite(percent).map(|p| round_clamp(p * 100.0, 0, 10000) as u16)
}

/// `windowcoverings_set` fraction (1 = open) to lift percent100ths (0 = open)
pub fn cover_to_lift(position: Option<f64>) -> Option<u16> {
    finite(position).map(|p| {
        round_clamp((1.0 - p.clamp(0.0, 1.0)) * LIFT_CLOSED_100THS as f64, 0, LIFT_CLOSED_100THS as i64)
            as u16
    })
}

/// Lift percent100ths to `windowcoverings_set` fraction
pub fn lift_to_cover(percent_100ths: u16) -> f64 {
    1.0 - (percent_100ths.min(LIFT_CLOSED_100THS) as f64 / LIFT_CLOSED_100THS as f64)
}

/// Truncate a label to [`MAX_LABEL_BYTES`], marking the cut with [`ELLIPSIS`]
///
/// Cuts on a char boundary so multi-byte names stay valid UTF-8.
pub fn truncate_label(label: &str) -> String {
    truncate_with_ellipsis(label, MAX_LABEL_BYTES)
}

/// Truncate to at most `max_bytes` bytes including the ellipsis
pub fn truncate_with_ellipsis(label: &str, max_bytes: usize) -> String {
    if label.len() <= max_bytes {
        return label.to_string();
    }
    let budget = max_bytes.saturating_sub(ELLIPSIS.len());
    let mut cut = budget;
    while cut > 0 && !label.is_char_boundary(cut) {
        cut -= 1;
    }
    format!("{}{}", &label[..cut], ELLIPSIS)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dim_mid_scale() {
        assert_eq!(dim_to_level(Some(0.5)), Some(127));
        assert_eq!(dim_to_level(Some(1.0)), Some(254));
        assert_eq!(dim_to_level(Some(0.0)), Some(1));
    }

    #[test]
    fn test_dim_clamping() {
        assert_eq!(dim_to_level(Some(1.5)), Some(LEVEL_MAX));
        assert_eq!(dim_to_level(Some(-3.0)), Some(LEVEL_MIN));
        assert_eq!(hue_to_protocol(Some(7.0)), Some(COLOR_MAX));
        assert_eq!(temperature_to_mireds(Some(2.0)), Some(MIREDS_MAX));
        assert_eq!(humidity_to_100ths(Some(150.0)), Some(10000));
        assert_eq!(celsius_to_100ths(Some(1000.0)), Some(i16::MAX));
        assert_eq!(celsius_to_100ths(Some(-500.0)), Some(TEMPERATURE_MIN_100THS));
    }

    #[test]
    fn test_unknown_stays_unknown() {
        assert_eq!(dim_to_level(None), None);
        assert_eq!(dim_to_level(Some(f64::NAN)), None);
        assert_eq!(hue_to_protocol(None), None);
        assert_eq!(celsius_to_100ths(Some(f64::INFINITY)), None);
    }

    #[test]
    fn test_level_round_trip_within_one_unit() {
        for level in LEVEL_MIN..=LEVEL_MAX {
            let back = dim_to_level(Some(level_to_dim(level))).unwrap();
            assert!((back as i16 - level as i16).abs() <= 1, "level {level} -> {back}");
        }
    }

    #[test]
    fn test_hue_round_trip() {
        for hue in 0..=COLOR_MAX {
            let back = hue_to_protocol(Some(protocol_to_hue(hue))).unwrap();
            assert!((back as i16 - hue as i16).abs() <= 1);
        }
        assert_eq!(hue_to_protocol(Some(0.5)), Some(127));
    }

    #[test]
    fn test_mireds_round_trip() {
        for mireds in [MIREDS_MIN, 250, 370, MIREDS_MAX] {
            let back = temperature_to_mireds(Some(mireds_to_temperature(mireds))).unwrap();
            assert!((back as i32 - mireds as i32).abs() <= 1);
        }
    }

    #[test]
    fn test_cover_inverts_direction() {
        assert_eq!(cover_to_lift(Some(1.0)), Some(0));
        assert_eq!(cover_to_lift(Some(0.0)), Some(LIFT_CLOSED_100THS));
        assert!((lift_to_cover(2500) - 0.75).abs() < 1e-9);
    }

    #[test]
    fn test_truncate_label() {
        assert_eq!(truncate_label("Kitchen"), "Kitchen");

        let long = "Living Room Ceiling Light Above The Sofa";
        let truncated = truncate_label(long);
        assert_eq!(truncated.len(), MAX_LABEL_BYTES);
        assert!(truncated.ends_with(ELLIPSIS));
        assert!(long.starts_with(truncated.trim_end_matches(ELLIPSIS)));
    }

    #[test]
    fn test_truncate_label_char_boundary() {
        let label = "Lampe à côté du canapé dans le séjour";
        let truncated = truncate_label(label);
        assert!(truncated.len() <= MAX_LABEL_BYTES);
        assert!(truncated.ends_with(ELLIPSIS));
    }

    #[test]
    fn test_scale_degenerate_range() {
        assert_eq!(scale(5.0, 1.0, 1.0, 10.0, 20.0), 10.0);
        assert_eq!(scale(0.5, 0.0, 1.0, 0.0, 360.0), 180.0);
    }
}
