//! Volume curve mapper
//!
//! Two pure, stateless responsibilities:
//! - map the linear 0-100 UI volume to a perceptual (log-family) slot gain
//! - evaluate crossfade transition curves: for a progress ratio `t` in
//!   [0, 1], produce the `(outgoing, incoming)` gain pair for the selected
//!   style
//!
//! Power-preserving styles keep `out² + in²` at 1.0 across the whole
//! transition so the crossfade has no audible loudness dip. Dipped is the
//! deliberate exception: its combined power sags around the midpoint for a
//! ducking effect.

use serde::{Deserialize, Serialize};
use std::f32::consts::FRAC_PI_2;

/// Shaping base for the volume-to-gain mapping.
///
/// `(B^x - 1) / (B - 1)` over normalized volume x gives an approximately
/// perceptually linear control with exact 0.0 and 1.0 endpoints. B = 30
/// spans roughly 30 dB of useful travel.
const VOLUME_CURVE_BASE: f32 = 30.0;

/// Steepness of the exponential transition ramps
const EXPONENTIAL_K: f32 = 3.0;

/// Map UI volume (0-100 linear) to perceptual slot gain (0.0-1.0)
///
/// Monotonic, with exact endpoints: 0 maps to silence, 100 to full gain.
pub fn volume_to_gain(volume: u8) -> f32 {
    let x = volume.min(100) as f32 / 100.0;
    if x <= 0.0 {
        0.0
    } else {
        (VOLUME_CURVE_BASE.powf(x) - 1.0) / (VOLUME_CURVE_BASE - 1.0)
    }
}

/// Crossfade transition curve styles
///
/// Each style provides a different perceptual quality:
/// - Linear: complementary straight ramps (sum of gains constant at 1)
/// - EqualPower: sin/cos quarter-cycle, constant combined power
/// - ConstantPower: square-root ramps, constant combined power
/// - ConstantPowerSlowFade: constant power, outgoing track lingers longer
/// - ConstantPowerSlowCut: constant power, outgoing track sheds level early
/// - SCurve: smoothstep-shaped constant-power fade, gentle at both ends
/// - Dipped: quadratic ramps that duck the combined level at the midpoint
/// - Exponential: slow-start/fast-finish exponential ramps
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CrossfadeCurve {
    Linear,
    #[default]
    EqualPower,
    ConstantPower,
    ConstantPowerSlowFade,
    ConstantPowerSlowCut,
    SCurve,
    Dipped,
    Exponential,
}

impl CrossfadeCurve {
    /// Incoming-side gain at normalized transition position `t`
    ///
    /// `fade_in(0) = 0.0`, `fade_in(1) = 1.0`; input is clamped to [0, 1].
    pub fn fade_in(&self, position: f32) -> f32 {
        let t = position.clamp(0.0, 1.0);

        match self {
            CrossfadeCurve::Linear => t,
            CrossfadeCurve::EqualPower => (t * FRAC_PI_2).sin(),
            // Constant-power family: incoming = sqrt(shape), outgoing =
            // sqrt(1 - shape), so out² + in² == 1 for any monotone shape
            CrossfadeCurve::ConstantPower => t.sqrt(),
            CrossfadeCurve::ConstantPowerSlowFade => t.powf(1.6).sqrt(),
            CrossfadeCurve::ConstantPowerSlowCut => t.powf(0.6).sqrt(),
            CrossfadeCurve::SCurve => smoothstep(t).sqrt(),
            CrossfadeCurve::Dipped => t * t,
            CrossfadeCurve::Exponential => exp_ramp(t),
        }
    }

    /// Outgoing-side gain at normalized transition position `t`
    ///
    /// `fade_out(0) = 1.0`, `fade_out(1) = 0.0`; input is clamped to [0, 1].
    pub fn fade_out(&self, position: f32) -> f32 {
        let t = position.clamp(0.0, 1.0);

        match self {
            CrossfadeCurve::Linear => 1.0 - t,
            CrossfadeCurve::EqualPower => (t * FRAC_PI_2).cos(),
            CrossfadeCurve::ConstantPower => (1.0 - t).max(0.0).sqrt(),
            CrossfadeCurve::ConstantPowerSlowFade => (1.0 - t.powf(1.6)).max(0.0).sqrt(),
            CrossfadeCurve::ConstantPowerSlowCut => (1.0 - t.powf(0.6)).max(0.0).sqrt(),
            CrossfadeCurve::SCurve => (1.0 - smoothstep(t)).max(0.0).sqrt(),
            CrossfadeCurve::Dipped => (1.0 - t) * (1.0 - t),
            CrossfadeCurve::Exponential => exp_ramp(1.0 - t),
        }
    }

    /// `(outgoing, incoming)` gain pair at transition position `t`
    pub fn gain_pair(&self, position: f32) -> (f32, f32) {
        (self.fade_out(position), self.fade_in(position))
    }

    /// Whether this style holds combined power constant across the fade
    pub fn is_power_preserving(&self) -> bool {
        matches!(
            self,
            CrossfadeCurve::EqualPower
                | CrossfadeCurve::ConstantPower
                | CrossfadeCurve::ConstantPowerSlowFade
                | CrossfadeCurve::ConstantPowerSlowCut
                | CrossfadeCurve::SCurve
        )
    }

    /// Parse curve from a config-file string
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "linear" => Some(CrossfadeCurve::Linear),
            "equal_power" | "equalpower" => Some(CrossfadeCurve::EqualPower),
            "constant_power" | "constantpower" => Some(CrossfadeCurve::ConstantPower),
            "constant_power_slow_fade" => Some(CrossfadeCurve::ConstantPowerSlowFade),
            "constant_power_slow_cut" => Some(CrossfadeCurve::ConstantPowerSlowCut),
            "s_curve" | "scurve" | "s-curve" => Some(CrossfadeCurve::SCurve),
            "dipped" => Some(CrossfadeCurve::Dipped),
            "exponential" => Some(CrossfadeCurve::Exponential),
            _ => None,
        }
    }

    /// Config-file string representation
    pub fn as_str(&self) -> &'static str {
        match self {
            CrossfadeCurve::Linear => "linear",
            CrossfadeCurve::EqualPower => "equal_power",
            CrossfadeCurve::ConstantPower => "constant_power",
            CrossfadeCurve::ConstantPowerSlowFade => "constant_power_slow_fade",
            CrossfadeCurve::ConstantPowerSlowCut => "constant_power_slow_cut",
            CrossfadeCurve::SCurve => "s_curve",
            CrossfadeCurve::Dipped => "dipped",
            CrossfadeCurve::Exponential => "exponential",
        }
    }

    /// All styles, for settings enumeration and exhaustive tests
    pub fn all() -> [CrossfadeCurve; 8] {
        [
            CrossfadeCurve::Linear,
            CrossfadeCurve::EqualPower,
            CrossfadeCurve::ConstantPower,
            CrossfadeCurve::ConstantPowerSlowFade,
            CrossfadeCurve::ConstantPowerSlowCut,
            CrossfadeCurve::SCurve,
            CrossfadeCurve::Dipped,
            CrossfadeCurve::Exponential,
        ]
    }
}

/// Hermite smoothstep: 3t² - 2t³
fn smoothstep(t: f32) -> f32 {
    t * t * (3.0 - 2.0 * t)
}

/// Normalized exponential ramp with exact 0/1 endpoints
fn exp_ramp(t: f32) -> f32 {
    ((EXPONENTIAL_K * t).exp() - 1.0) / (EXPONENTIAL_K.exp() - 1.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE_POINTS: [f32; 5] = [0.0, 0.25, 0.5, 0.75, 1.0];

    #[test]
    fn test_volume_gain_endpoints() {
        assert_eq!(volume_to_gain(0), 0.0);
        assert!((volume_to_gain(100) - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_volume_gain_monotonic() {
        let mut previous = -1.0f32;
        for v in 0..=100u8 {
            let gain = volume_to_gain(v);
            assert!(
                gain > previous,
                "gain not strictly increasing at volume {v}: {gain} <= {previous}"
            );
            previous = gain;
        }
    }

    #[test]
    fn test_volume_gain_clamps_out_of_range() {
        assert_eq!(volume_to_gain(200), volume_to_gain(100));
    }

    #[test]
    fn test_volume_gain_perceptual_shape() {
        // Log-family mapping sits below the linear diagonal mid-scale
        assert!(volume_to_gain(50) < 0.5);
    }

    #[test]
    fn test_all_curves_endpoints() {
        for curve in CrossfadeCurve::all() {
            assert!(
                curve.fade_in(0.0).abs() < 1e-4,
                "{curve:?} fade_in(0) != 0"
            );
            assert!(
                (curve.fade_in(1.0) - 1.0).abs() < 1e-4,
                "{curve:?} fade_in(1) != 1"
            );
            assert!(
                (curve.fade_out(0.0) - 1.0).abs() < 1e-4,
                "{curve:?} fade_out(0) != 1"
            );
            assert!(
                curve.fade_out(1.0).abs() < 1e-4,
                "{curve:?} fade_out(1) != 0"
            );
        }
    }

    #[test]
    fn test_power_preserving_styles_hold_unit_power() {
        for curve in CrossfadeCurve::all() {
            if !curve.is_power_preserving() {
                continue;
            }
            for t in SAMPLE_POINTS {
                let (out_gain, in_gain) = curve.gain_pair(t);
                let power = out_gain * out_gain + in_gain * in_gain;
                assert!(
                    (power - 1.0).abs() <= 0.05,
                    "{curve:?} combined power {power} at t={t} outside tolerance"
                );
            }
        }
    }

    #[test]
    fn test_dipped_ducks_at_midpoint() {
        let (out_gain, in_gain) = CrossfadeCurve::Dipped.gain_pair(0.5);
        let power = out_gain * out_gain + in_gain * in_gain;
        assert!(power < 0.5, "dipped midpoint power {power} should sag well below 1");
    }

    #[test]
    fn test_fades_monotonic() {
        for curve in CrossfadeCurve::all() {
            let mut last_in = -1.0f32;
            let mut last_out = 2.0f32;
            for i in 0..=20 {
                let t = i as f32 / 20.0;
                let fade_in = curve.fade_in(t);
                let fade_out = curve.fade_out(t);
                assert!(fade_in >= last_in, "{curve:?} fade_in not monotonic at t={t}");
                assert!(fade_out <= last_out, "{curve:?} fade_out not monotonic at t={t}");
                last_in = fade_in;
                last_out = fade_out;
            }
        }
    }

    #[test]
    fn test_clamping() {
        let curve = CrossfadeCurve::Linear;
        assert_eq!(curve.fade_in(-0.5), 0.0);
        assert_eq!(curve.fade_in(1.5), 1.0);
        assert_eq!(curve.fade_out(-0.5), 1.0);
        assert_eq!(curve.fade_out(1.5), 0.0);
    }

    #[test]
    fn test_equal_power_midpoint() {
        // sin(π/4) == cos(π/4) ≈ 0.707
        let (out_gain, in_gain) = CrossfadeCurve::EqualPower.gain_pair(0.5);
        assert!((out_gain - 0.707).abs() < 0.01);
        assert!((in_gain - 0.707).abs() < 0.01);
    }

    #[test]
    fn test_slow_fade_lingers_and_slow_cut_drops() {
        let lingering = CrossfadeCurve::ConstantPowerSlowFade.fade_out(0.5);
        let dropping = CrossfadeCurve::ConstantPowerSlowCut.fade_out(0.5);
        let reference = CrossfadeCurve::ConstantPower.fade_out(0.5);
        // Slow-fade keeps the outgoing track louder at the midpoint,
        // slow-cut sheds it earlier
        assert!(lingering > reference);
        assert!(dropping < reference);
    }

    #[test]
    fn test_from_str_round_trip() {
        for curve in CrossfadeCurve::all() {
            assert_eq!(CrossfadeCurve::from_str(curve.as_str()), Some(curve));
        }
        assert_eq!(CrossfadeCurve::from_str("equalpower"), Some(CrossfadeCurve::EqualPower));
        assert_eq!(CrossfadeCurve::from_str("invalid"), None);
    }

    #[test]
    fn test_default_is_equal_power() {
        assert_eq!(CrossfadeCurve::default(), CrossfadeCurve::EqualPower);
    }
}
