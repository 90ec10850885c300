use serde::{Deserialize, Serialize};
use telemon_ingest::Value;

use crate::element::{Color, DEFAULT_WIDTH, ElementError, Render, TextStyle, boolean, visible_width};

const GLYPH: &str = "●";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct IndicatorLampConfig {
    pub label: String,
    pub on_color: Color,
    pub off_color: Color,
    pub width: usize,
}

impl Default for IndicatorLampConfig {
    fn default() -> Self {
        Self {
            label: "Lamp".into(),
            on_color: Color::Green,
            off_color: Color::Red,
            width: DEFAULT_WIDTH,
        }
    }
}

/// `label: ●`, the dot coloured by state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndicatorLamp {
    config: IndicatorLampConfig,
    on: bool,
}

impl IndicatorLamp {
    pub fn new(config: IndicatorLampConfig) -> Self {
        Self { config, on: false }
    }

    pub fn is_on(&self) -> bool {
        self.on
    }
}

impl Render for IndicatorLamp {
    fn update(&mut self, args: &[Value]) -> Result<(), ElementError> {
        self.on = boolean(args, 0, "state")?;
        Ok(())
    }

    fn display(&self) -> String {
        let color = if self.on {
            self.config.on_color
        } else {
            self.config.off_color
        };
        let line = format!("{}: {}", self.config.label, TextStyle::fg(color).bold().paint(GLYPH));
        let pad = self.config.width.saturating_sub(visible_width(&line));
        format!("{line}{}", " ".repeat(pad))
    }

    fn height(&self) -> usize {
        1
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn colour_follows_state() {
        let mut lamp = IndicatorLamp::new(IndicatorLampConfig {
            label: "Test Lamp".into(),
            ..IndicatorLampConfig::default()
        });

        lamp.update(&[Value::Bool(true)]).unwrap();
        let on = lamp.display();
        assert!(on.starts_with("Test Lamp: "));
        assert_eq!(on, format!("Test Lamp: {}", TextStyle::fg(Color::Green).bold().paint(GLYPH)) + &" ".repeat(60 - 12));

        lamp.update(&[Value::from("off")]).unwrap();
        assert!(!lamp.is_on());
        assert!(lamp.display().contains(&TextStyle::fg(Color::Red).bold().paint(GLYPH)));
    }

    #[test]
    fn padded_to_width() {
        let lamp = IndicatorLamp::new(IndicatorLampConfig::default());
        assert_eq!(visible_width(&lamp.display()), DEFAULT_WIDTH);
    }

    #[test]
    fn non_boolean_is_refused() {
        let mut lamp = IndicatorLamp::new(IndicatorLampConfig::default());
        lamp.update(&[Value::Int(1)]).unwrap();
        assert!(lamp.update(&[Value::from("sometimes")]).is_err());
        assert!(lamp.is_on());
    }
}
