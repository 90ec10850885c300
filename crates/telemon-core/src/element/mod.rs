//! Display elements.
//!
//! Every element kind implements [`Render`]: `update` mutates state from
//! decoded values, `display` renders it without side effects, `height`
//! reports how many terminal lines the render occupies. [`Widget`] is
//! the closed set of kinds; [`Element`] pairs a widget with its id.

mod border;
pub mod coordinate;
pub mod lamp;
pub mod log;
pub mod machine_state;
pub mod progress;
pub mod range;
pub mod style;
pub mod table;
pub mod text;

pub use border::add_border;
pub use coordinate::{CoordinateText, CoordinateTextConfig};
pub use lamp::{IndicatorLamp, IndicatorLampConfig};
pub use log::{LogMonitor, LogMonitorConfig};
pub use machine_state::{MachineState, MachineStateConfig};
pub use progress::{ProgressBar, ProgressBarConfig};
pub use range::{RangeBar, RangeBarConfig};
pub use style::{Color, TextStyle};
pub use table::{Table, TableConfig};
pub use text::{TextElement, TextElementConfig};

use telemon_ingest::Value;
use thiserror::Error;

/// Render width used when a config leaves it unset.
pub const DEFAULT_WIDTH: usize = 60;

/// Column reserved for labels on bar elements.
pub const DEFAULT_LABEL_WIDTH: usize = 10;

// ── Errors ───────────────────────────────────────────────────────────

/// Why an update was refused. The element keeps its previous state.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ElementError {
    #[error("expected at least {expected} argument(s), got {got}")]
    MissingArgument { expected: usize, got: usize },

    #[error("{field}: cannot use {value:?} as {expected}")]
    InvalidValue {
        field: &'static str,
        value: String,
        expected: &'static str,
    },
}

// ── Render contract ──────────────────────────────────────────────────

pub trait Render {
    fn update(&mut self, args: &[Value]) -> Result<(), ElementError>;

    fn display(&self) -> String;

    fn height(&self) -> usize;
}

// ── Widget ───────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq)]
pub enum Widget {
    Text(TextElement),
    Progress(ProgressBar),
    Range(RangeBar),
    Table(Table),
    Log(LogMonitor),
    MachineState(MachineState),
    Lamp(IndicatorLamp),
    Coordinate(CoordinateText),
}

impl Widget {
    fn as_render(&self) -> &dyn Render {
        match self {
            Self::Text(w) => w,
            Self::Progress(w) => w,
            Self::Range(w) => w,
            Self::Table(w) => w,
            Self::Log(w) => w,
            Self::MachineState(w) => w,
            Self::Lamp(w) => w,
            Self::Coordinate(w) => w,
        }
    }

    fn as_render_mut(&mut self) -> &mut dyn Render {
        match self {
            Self::Text(w) => w,
            Self::Progress(w) => w,
            Self::Range(w) => w,
            Self::Table(w) => w,
            Self::Log(w) => w,
            Self::MachineState(w) => w,
            Self::Lamp(w) => w,
            Self::Coordinate(w) => w,
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Self::Text(_) => "text",
            Self::Progress(_) => "progress_bar",
            Self::Range(_) => "range_bar",
            Self::Table(_) => "table",
            Self::Log(_) => "log_monitor",
            Self::MachineState(_) => "machine_state",
            Self::Lamp(_) => "indicator_lamp",
            Self::Coordinate(_) => "coordinate_text",
        }
    }
}

impl Render for Widget {
    fn update(&mut self, args: &[Value]) -> Result<(), ElementError> {
        self.as_render_mut().update(args)
    }

    fn display(&self) -> String {
        self.as_render().display()
    }

    fn height(&self) -> usize {
        self.as_render().height()
    }
}

// ── Element ──────────────────────────────────────────────────────────

/// A widget under a dispatch id.
#[derive(Debug, Clone, PartialEq)]
pub struct Element {
    pub id: String,
    pub enabled: bool,
    pub widget: Widget,
}

impl Element {
    pub fn new(id: impl Into<String>, widget: Widget) -> Self {
        Self {
            id: id.into(),
            enabled: true,
            widget,
        }
    }

    pub fn disabled(mut self) -> Self {
        self.enabled = false;
        self
    }
}

impl Render for Element {
    fn update(&mut self, args: &[Value]) -> Result<(), ElementError> {
        self.widget.update(args)
    }

    fn display(&self) -> String {
        self.widget.display()
    }

    fn height(&self) -> usize {
        self.widget.height()
    }
}

// ── Argument helpers ─────────────────────────────────────────────────

pub(crate) fn arg(args: &[Value], index: usize) -> Result<&Value, ElementError> {
    args.get(index).ok_or(ElementError::MissingArgument {
        expected: index + 1,
        got: args.len(),
    })
}

pub(crate) fn number(args: &[Value], index: usize, field: &'static str) -> Result<f64, ElementError> {
    let value = arg(args, index)?;
    value
        .as_f64()
        .filter(|f| f.is_finite())
        .ok_or_else(|| invalid(field, value, "a number"))
}

pub(crate) fn integer(args: &[Value], index: usize, field: &'static str) -> Result<i64, ElementError> {
    let value = arg(args, index)?;
    value.as_i64().ok_or_else(|| invalid(field, value, "an integer"))
}

pub(crate) fn boolean(args: &[Value], index: usize, field: &'static str) -> Result<bool, ElementError> {
    let value = arg(args, index)?;
    value.as_bool().ok_or_else(|| invalid(field, value, "a boolean"))
}

pub(crate) fn invalid(field: &'static str, value: &Value, expected: &'static str) -> ElementError {
    ElementError::InvalidValue {
        field,
        value: value.to_string(),
        expected,
    }
}

/// Width in terminal columns, ignoring ANSI escapes.
pub(crate) fn visible_width(s: &str) -> usize {
    let mut width = 0;
    let mut chars = s.chars();
    while let Some(c) = chars.next() {
        if c == '\u{1b}' {
            // CSI: ESC [ params final-byte
            for c in chars.by_ref() {
                if c.is_ascii_alphabetic() {
                    break;
                }
            }
        } else {
            width += 1;
        }
    }
    width
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn visible_width_skips_escapes() {
        assert_eq!(visible_width("abc"), 3);
        assert_eq!(visible_width("\u{1b}[1;32m●\u{1b}[0m"), 1);
        assert_eq!(visible_width("█░"), 2);
    }

    #[test]
    fn helpers_report_missing_and_invalid() {
        let args = [Value::from("x")];
        assert_eq!(
            number(&args, 1, "value"),
            Err(ElementError::MissingArgument { expected: 2, got: 1 })
        );
        assert!(matches!(number(&args, 0, "value"), Err(ElementError::InvalidValue { .. })));
        assert_eq!(integer(&[Value::from("12")], 0, "bits"), Ok(12));
    }
}
