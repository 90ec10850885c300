use serde::{Deserialize, Serialize};
use telemon_ingest::Value;

use crate::element::style::paint;
use crate::element::{DEFAULT_LABEL_WIDTH, DEFAULT_WIDTH, ElementError, Render, TextStyle, number};

const FILLED: char = '█';
const EMPTY: char = '░';

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProgressBarConfig {
    pub label: String,
    pub total_steps: f64,
    pub width: usize,
    pub label_width: usize,
    pub bar_style: Option<TextStyle>,
    pub text_style: Option<TextStyle>,
}

impl Default for ProgressBarConfig {
    fn default() -> Self {
        Self {
            label: "Progress".into(),
            total_steps: 10.0,
            width: DEFAULT_WIDTH,
            label_width: DEFAULT_LABEL_WIDTH,
            bar_style: None,
            text_style: None,
        }
    }
}

/// `label      [█████░░░░░] 50.0%`
#[derive(Debug, Clone, PartialEq)]
pub struct ProgressBar {
    config: ProgressBarConfig,
    current_step: f64,
}

impl ProgressBar {
    pub fn new(config: ProgressBarConfig) -> Self {
        Self {
            config,
            current_step: 0.0,
        }
    }

    pub fn current_step(&self) -> f64 {
        self.current_step
    }

    /// Completed fraction in `[0, 1]`; zero when the total is not positive.
    pub fn fraction(&self) -> f64 {
        if self.config.total_steps > 0.0 {
            (self.current_step / self.config.total_steps).clamp(0.0, 1.0)
        } else {
            0.0
        }
    }
}

impl Render for ProgressBar {
    fn update(&mut self, args: &[Value]) -> Result<(), ElementError> {
        let value = number(args, 0, "current_step")?;
        self.current_step = value.min(self.config.total_steps).max(0.0);
        Ok(())
    }

    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss, clippy::cast_precision_loss, clippy::as_conversions)]
    fn display(&self) -> String {
        let fraction = self.fraction();
        let percent = format!("{:.1}%", fraction * 100.0);
        let bar_width = self
            .config
            .width
            .saturating_sub(self.config.label_width + percent.chars().count() + 6);
        let filled = ((bar_width as f64 * fraction).floor() as usize).min(bar_width);

        let bar: String = std::iter::repeat_n(FILLED, filled)
            .chain(std::iter::repeat_n(EMPTY, bar_width - filled))
            .collect();

        format!(
            "{label:<width$} [{bar}] {percent}",
            label = self.config.label,
            width = self.config.label_width,
            bar = paint(self.config.bar_style.as_ref(), &bar),
            percent = paint(self.config.text_style.as_ref(), &percent),
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
    use crate::element::visible_width;

    fn bar(total_steps: f64) -> ProgressBar {
        ProgressBar::new(ProgressBarConfig {
            label: "Loading".into(),
            total_steps,
            ..ProgressBarConfig::default()
        })
    }

    #[test]
    fn clamps_to_total_and_zero() {
        let mut p = bar(10.0);
        p.update(&[Value::Int(15)]).unwrap();
        assert!((p.current_step() - 10.0).abs() < f64::EPSILON);
        p.update(&[Value::Int(-5)]).unwrap();
        assert!(p.current_step().abs() < f64::EPSILON);
    }

    #[test]
    fn half_way_render() {
        let mut p = bar(10.0);
        p.update(&[Value::from("5")]).unwrap();
        let out = p.display();
        assert!(out.starts_with("Loading    ["));
        assert!(out.ends_with("] 50.0%"));
        // 60 - 10 - len("50.0%") - 6 = 39 cells, 19 filled.
        assert_eq!(out.matches(FILLED).count(), 19);
        assert_eq!(out.matches(EMPTY).count(), 20);
        assert_eq!(visible_width(&out), 58);
    }

    #[test]
    fn invalid_value_keeps_state() {
        let mut p = bar(10.0);
        p.update(&[Value::Int(3)]).unwrap();
        assert!(p.update(&[Value::from("abc")]).is_err());
        assert!((p.current_step() - 3.0).abs() < f64::EPSILON);
    }

    #[test]
    fn zero_total_renders_empty() {
        let p = bar(0.0);
        assert!(p.display().ends_with("0.0%"));
    }
}
