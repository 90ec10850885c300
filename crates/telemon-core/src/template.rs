//! Element templates.
//!
//! A template is the declarative form of an element: its kind plus the
//! kind's config. Templates deserialize straight from the `kind = "..."`
//! tables in the config file and can be stamped out any number of times,
//! which is how groups get independent copies of the same layout.

use serde::{Deserialize, Serialize};

use crate::element::{
    CoordinateText, CoordinateTextConfig, Element, IndicatorLamp, IndicatorLampConfig, LogMonitor,
    LogMonitorConfig, MachineState, MachineStateConfig, ProgressBar, ProgressBarConfig, RangeBar,
    RangeBarConfig, Table, TableConfig, TextElement, TextElementConfig, Widget,
};
use crate::error::CoreError;

/// Element kind plus its settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum WidgetSpec {
    Text(TextElementConfig),
    ProgressBar(ProgressBarConfig),
    RangeBar(RangeBarConfig),
    Table(TableConfig),
    LogMonitor(LogMonitorConfig),
    MachineState(MachineStateConfig),
    IndicatorLamp(IndicatorLampConfig),
    CoordinateText(CoordinateTextConfig),
}

impl WidgetSpec {
    /// Reject settings no element could render sensibly.
    pub fn validate(&self) -> Result<(), CoreError> {
        match self {
            Self::ProgressBar(c) => {
                if !(c.total_steps.is_finite() && c.total_steps > 0.0) {
                    return Err(CoreError::config(format!(
                        "progress_bar total_steps must be positive, got {}",
                        c.total_steps
                    )));
                }
            }
            Self::RangeBar(c) => {
                if !(c.min.is_finite() && c.max.is_finite()) || c.max < c.min {
                    return Err(CoreError::config(format!(
                        "range_bar needs finite min <= max, got {}..{}",
                        c.min, c.max
                    )));
                }
                if !c.scale.is_finite() {
                    return Err(CoreError::config("range_bar scale must be finite"));
                }
            }
            Self::LogMonitor(c) if c.max_logs == 0 => {
                return Err(CoreError::config("log_monitor max_logs must be at least 1"));
            }
            Self::Table(c) if c.headers.is_empty() || c.variables.is_empty() => {
                return Err(CoreError::config("table needs at least one header and one variable"));
            }
            _ => {}
        }
        Ok(())
    }

    /// Fresh widget in its initial state.
    pub fn build(&self) -> Widget {
        match self {
            Self::Text(c) => Widget::Text(TextElement::new(c.clone())),
            Self::ProgressBar(c) => Widget::Progress(ProgressBar::new(c.clone())),
            Self::RangeBar(c) => Widget::Range(RangeBar::new(c.clone())),
            Self::Table(c) => Widget::Table(Table::new(c.clone())),
            Self::LogMonitor(c) => Widget::Log(LogMonitor::new(c.clone())),
            Self::MachineState(c) => Widget::MachineState(MachineState::new(c.clone())),
            Self::IndicatorLamp(c) => Widget::Lamp(IndicatorLamp::new(c.clone())),
            Self::CoordinateText(c) => Widget::Coordinate(CoordinateText::new(c.clone())),
        }
    }
}

fn enabled_default() -> bool {
    true
}

/// A reusable element definition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ElementTemplate {
    /// Dispatch id for a standalone element, or the local name inside a group.
    pub id: String,
    #[serde(default = "enabled_default")]
    pub enabled: bool,
    #[serde(flatten)]
    pub spec: WidgetSpec,
}

impl ElementTemplate {
    pub fn new(id: impl Into<String>, spec: WidgetSpec) -> Self {
        Self {
            id: id.into(),
            enabled: true,
            spec,
        }
    }

    /// Build an element under `id`, which may differ from the template's own.
    pub fn build(&self, id: impl Into<String>) -> Result<Element, CoreError> {
        self.spec.validate()?;
        let mut element = Element::new(id, self.spec.build());
        element.enabled = self.enabled;
        Ok(element)
    }

    /// Build an element under the template's own id.
    pub fn instantiate(&self) -> Result<Element, CoreError> {
        self.build(self.id.clone())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::element::Render;
    use pretty_assertions::assert_eq;
    use telemon_ingest::Value;

    #[test]
    fn templates_deserialize_by_kind() {
        let json = r#"{"id": "pos", "kind": "range_bar", "label": "Pos", "min": -10, "max": 10}"#;
        let template: ElementTemplate = serde_json::from_str(json).unwrap();
        assert_eq!(template.id, "pos");
        assert!(template.enabled);
        let WidgetSpec::RangeBar(config) = &template.spec else {
            panic!("expected range_bar, got {:?}", template.spec);
        };
        assert_eq!(config.label, "Pos");
        assert!((config.min + 10.0).abs() < f64::EPSILON);
        assert_eq!(config.marker, '|');
    }

    #[test]
    fn unknown_kind_is_rejected() {
        let json = r#"{"id": "x", "kind": "gauge"}"#;
        assert!(serde_json::from_str::<ElementTemplate>(json).is_err());
    }

    #[test]
    fn each_build_is_independent() {
        let template = ElementTemplate::new(
            "lamp",
            WidgetSpec::IndicatorLamp(IndicatorLampConfig::default()),
        );
        let mut a = template.build("X.lamp").unwrap();
        let b = template.build("Y.lamp").unwrap();
        a.update(&[Value::Bool(true)]).unwrap();
        assert_ne!(a.display(), b.display());
        assert_eq!(a.id, "X.lamp");
    }

    #[test]
    fn invalid_settings_fail_build() {
        let template = ElementTemplate::new(
            "p",
            WidgetSpec::ProgressBar(ProgressBarConfig {
                total_steps: 0.0,
                ..ProgressBarConfig::default()
            }),
        );
        assert!(matches!(template.build("p"), Err(CoreError::Config { .. })));

        let template = ElementTemplate::new(
            "r",
            WidgetSpec::RangeBar(RangeBarConfig {
                min: 5.0,
                max: 1.0,
                ..RangeBarConfig::default()
            }),
        );
        assert!(template.instantiate().is_err());
    }

    #[test]
    fn disabled_flag_carries_over() {
        let json = r#"{"id": "t", "kind": "text", "enabled": false}"#;
        let template: ElementTemplate = serde_json::from_str(json).unwrap();
        assert!(!template.instantiate().unwrap().enabled);
    }
}
