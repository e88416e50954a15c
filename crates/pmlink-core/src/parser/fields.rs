// ── key=value body extraction ──
//
// Telemetry and interrupt lines carry comma-separated `key=value` pairs.
// Each field parses independently: a missing key or bad value only blanks
// that one field.

use crate::model::{AdcSample, IrqEvent};

/// Iterate the `key=value` pairs of a body. Pairs without `=` are skipped.
pub fn pairs(body: &str) -> impl Iterator<Item = (&str, &str)> {
    body.split(',')
        .filter_map(|pair| pair.split_once('='))
        .map(|(key, value)| (key.trim(), value.trim()))
}

/// Parse a finite number. `NaN`, infinities and garbage yield `None`.
pub fn parse_number(value: &str) -> Option<f64> {
    value.parse::<f64>().ok().filter(|v| v.is_finite())
}

/// Round half away from zero to `places` decimals.
pub fn round_to(value: f64, places: i32) -> f64 {
    let factor = 10f64.powi(places);
    (value * factor).round() / factor
}

/// Build an ADC sample from a `module_pmic_adc` body.
///
/// `ibat` arrives in amps and is published in milliamps.
pub fn parse_adc_sample(body: &str, timestamp: u64) -> AdcSample {
    let mut sample = AdcSample {
        timestamp,
        ..AdcSample::default()
    };

    for (key, value) in pairs(body) {
        let number = parse_number(value);
        match key {
            "vbat" => sample.vbat = number.map(|v| round_to(v, 2)),
            "ibat" => sample.ibat = number.map(|v| round_to(v * 1000.0, 2)),
            "tbat" => sample.tbat = number.map(|v| round_to(v, 1)),
            "soc" => sample.soc = number.map(|v| round_to(v, 1).clamp(0.0, 100.0)),
            "tte" => sample.tte = number,
            "ttf" => sample.ttf = number,
            _ => {}
        }
    }

    sample
}

/// Parse a `type=REGISTER,bit=BIT` interrupt body.
pub fn parse_irq(body: &str) -> Option<IrqEvent> {
    let mut register = None;
    let mut bit = None;
    for (key, value) in pairs(body) {
        match key {
            "type" => register = Some(value),
            "bit" => bit = Some(value),
            _ => {}
        }
    }

    match (register, bit) {
        (Some(register), Some(bit)) if !register.is_empty() && !bit.is_empty() => {
            Some(IrqEvent::new(register, bit))
        }
        _ => None,
    }
}

// ── Tests ────────────────────────────────────────────────────────────
