use serde::{Deserialize, Serialize};
use telemon_ingest::Value;

use crate::element::style::paint;
use crate::element::{ElementError, Render, TextStyle, arg};

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TextElementConfig {
    /// Initial text.
    pub text: String,
    /// Fixed prefix shown before the text.
    pub static_text: Option<String>,
    pub style: Option<TextStyle>,
}

/// Free text, replaced wholesale on every update.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TextElement {
    config: TextElementConfig,
    text: String,
}

impl TextElement {
    pub fn new(config: TextElementConfig) -> Self {
        let text = config.text.clone();
        Self { config, text }
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    fn full_text(&self) -> String {
        format!("{}{}", self.config.static_text.as_deref().unwrap_or_default(), self.text)
    }
}

impl Render for TextElement {
    /// Arguments are joined with single spaces.
    fn update(&mut self, args: &[Value]) -> Result<(), ElementError> {
        arg(args, 0)?;
        self.text = args
            .iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .join(" ");
        Ok(())
    }

    fn display(&self) -> String {
        paint(self.config.style.as_ref(), &self.full_text())
    }

    fn height(&self) -> usize {
        self.full_text().lines().count().max(1)
    }
}
