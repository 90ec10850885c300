use serde::{Deserialize, Serialize};
use telemon_ingest::Value;

use crate::element::style::paint;
use crate::element::{DEFAULT_LABEL_WIDTH, DEFAULT_WIDTH, ElementError, Render, TextStyle, number};

/// Columns taken by brackets, spacing and the unit gap around the bar.
const CHROME: usize = 13;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RangeBarConfig {
    pub label: String,
    pub min: f64,
    pub max: f64,
    pub unit: String,
    /// Multiplier applied to every incoming value before clamping.
    pub scale: f64,
    /// Decimal places in the numeric readout.
    pub digits: usize,
    pub width: usize,
    pub label_width: usize,
    /// Right-aligned width of the numeric readout.
    pub value_width: usize,
    pub marker: char,
    pub track: char,
    pub bar_style: Option<TextStyle>,
    pub text_style: Option<TextStyle>,
}

impl Default for RangeBarConfig {
    fn default() -> Self {
        Self {
            label: "Range".into(),
            min: 0.0,
            max: 100.0,
            unit: String::new(),
            scale: 1.0,
            digits: 2,
            width: DEFAULT_WIDTH,
            label_width: DEFAULT_LABEL_WIDTH,
            value_width: 6,
            marker: '|',
            track: '-',
            bar_style: None,
            text_style: None,
        }
    }
}

/// `label      [-------|------]  50.00 mm`
///
/// Starts at the middle of the range until the first update.
#[derive(Debug, Clone, PartialEq)]
pub struct RangeBar {
    config: RangeBarConfig,
    value: f64,
}

impl RangeBar {
    pub fn new(config: RangeBarConfig) -> Self {
        let value = (config.min + config.max) / 2.0;
        Self { config, value }
    }

    pub fn value(&self) -> f64 {
        self.value
    }

    /// Position of the value inside the range, `0.0` when the range is empty.
    pub fn ratio(&self) -> f64 {
        let span = self.config.max - self.config.min;
        if span.abs() < f64::EPSILON {
            return 0.0;
        }
        ((self.value - self.config.min) / span).clamp(0.0, 1.0)
    }

    pub fn bar_width(&self) -> usize {
        self.config
            .width
            .saturating_sub(self.config.label_width + self.config.value_width + CHROME)
    }

    /// Cell index of the marker, always inside the bar.
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss, clippy::cast_precision_loss, clippy::as_conversions)]
    pub fn marker_position(&self) -> usize {
        let width = self.bar_width();
        let cell = (width as f64 * self.ratio()).floor() as usize;
        cell.min(width.saturating_sub(1))
    }

    fn readout(&self) -> String {
        let numeric = format!(
            "{:>width$.digits$}",
            self.value,
            width = self.config.value_width,
            digits = self.config.digits
        );
        format!(
            "{:<width$}",
            format!("{numeric} {}", self.config.unit),
            width = self.config.value_width + self.config.unit.chars().count()
        )
    }
}

impl Render for RangeBar {
    fn update(&mut self, args: &[Value]) -> Result<(), ElementError> {
        let raw = number(args, 0, "value")?;
        let scaled = raw * self.config.scale;
        self.value = scaled.min(self.config.max).max(self.config.min);
        Ok(())
    }

    fn display(&self) -> String {
        let width = self.bar_width();
        let bar: String = if width == 0 {
            String::new()
        } else {
            let marker = self.marker_position();
            std::iter::repeat_n(self.config.track, marker)
                .chain(std::iter::once(self.config.marker))
                .chain(std::iter::repeat_n(self.config.track, width - marker - 1))
                .collect()
        };

        format!(
            "{label:<label_width$} [{bar}] {readout}",
            label = self.config.label,
            label_width = self.config.label_width,
            bar = paint(self.config.bar_style.as_ref(), &bar),
            readout = paint(self.config.text_style.as_ref(), &self.readout()),
        )
    }

    fn height(&self) -> usize {
        1
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn range(min: f64, max: f64) -> RangeBar {
        RangeBar::new(RangeBarConfig {
            min,
            max,
            ..RangeBarConfig::default()
        })
    }

    #[test]
    fn clamps_into_range() {
        let mut r = range(0.0, 100.0);
        r.update(&[Value::Int(150)]).unwrap();
        assert!((r.value() - 100.0).abs() < f64::EPSILON);
        r.update(&[Value::Int(-10)]).unwrap();
        assert!(r.value().abs() < f64::EPSILON);
    }

    #[test]
    fn starts_mid_range() {
        let r = range(-10.0, 10.0);
        assert!(r.value().abs() < f64::EPSILON);
    }

    #[test]
    fn renders_marker_and_readout() {
        let mut r = range(0.0, 100.0);
        r.update(&[Value::from("50")]).unwrap();
        let out = r.display();
        assert!(out.starts_with("Range      ["));
        assert!(out.contains('|'));
        assert!(out.contains('-'));
        assert!(out.contains(" 50.00"));
        // 60 - 10 - 6 - 13
        assert_eq!(r.bar_width(), 31);
        assert_eq!(r.marker_position(), 15);
    }

    #[test]
    fn marker_stays_inside_at_max() {
        let mut r = range(0.0, 1.0);
        r.update(&[Value::Float(1.0)]).unwrap();
        assert_eq!(r.marker_position(), r.bar_width() - 1);
    }

    #[test]
    fn scale_applies_before_clamp() {
        let mut r = RangeBar::new(RangeBarConfig {
            scale: 0.001,
            unit: "m".into(),
            ..RangeBarConfig::default()
        });
        r.update(&[Value::Int(42_000)]).unwrap();
        assert!((r.value() - 42.0).abs() < 1e-9);
        assert!(r.display().ends_with(" 42.00 m"));
    }

    #[test]
    fn empty_range_does_not_divide_by_zero() {
        let mut r = range(5.0, 5.0);
        r.update(&[Value::Int(7)]).unwrap();
        assert!((r.value() - 5.0).abs() < f64::EPSILON);
        assert_eq!(r.marker_position(), 0);
        assert!(r.display().contains('|'));
    }
}
