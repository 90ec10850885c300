//! ANSI styling for element text.

use owo_colors::{AnsiColors, OwoColorize, Style};
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

/// Terminal palette colour, named the way configs spell it.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case", ascii_case_insensitive)]
pub enum Color {
    Black,
    Red,
    Green,
    Yellow,
    Blue,
    Magenta,
    Cyan,
    White,
    BrightBlack,
    BrightRed,
    BrightGreen,
    BrightYellow,
    BrightBlue,
    BrightMagenta,
    BrightCyan,
    BrightWhite,
}

impl Color {
    fn ansi(self) -> AnsiColors {
        match self {
            Self::Black => AnsiColors::Black,
            Self::Red => AnsiColors::Red,
            Self::Green => AnsiColors::Green,
            Self::Yellow => AnsiColors::Yellow,
            Self::Blue => AnsiColors::Blue,
            Self::Magenta => AnsiColors::Magenta,
            Self::Cyan => AnsiColors::Cyan,
            Self::White => AnsiColors::White,
            Self::BrightBlack => AnsiColors::BrightBlack,
            Self::BrightRed => AnsiColors::BrightRed,
            Self::BrightGreen => AnsiColors::BrightGreen,
            Self::BrightYellow => AnsiColors::BrightYellow,
            Self::BrightBlue => AnsiColors::BrightBlue,
            Self::BrightMagenta => AnsiColors::BrightMagenta,
            Self::BrightCyan => AnsiColors::BrightCyan,
            Self::BrightWhite => AnsiColors::BrightWhite,
        }
    }
}

/// Foreground/background colour plus weight for a span of text.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TextStyle {
    pub fg: Option<Color>,
    pub bg: Option<Color>,
    pub bold: bool,
    pub dim: bool,
}

impl TextStyle {
    pub fn fg(color: Color) -> Self {
        Self {
            fg: Some(color),
            ..Self::default()
        }
    }

    pub fn bold(mut self) -> Self {
        self.bold = true;
        self
    }

    pub fn is_plain(&self) -> bool {
        *self == Self::default()
    }

    /// Wrap `text` in the escape sequences for this style.
    pub fn paint(&self, text: &str) -> String {
        if self.is_plain() {
            return text.to_owned();
        }
        let mut style = Style::new();
        if let Some(fg) = self.fg {
            style = style.color(fg.ansi());
        }
        if let Some(bg) = self.bg {
            style = style.on_color(bg.ansi());
        }
        if self.bold {
            style = style.bold();
        }
        if self.dim {
            style = style.dimmed();
        }
        text.style(style).to_string()
    }
}

/// Apply an optional style.
pub(crate) fn paint(style: Option<&TextStyle>, text: &str) -> String {
    style.map_or_else(|| text.to_owned(), |s| s.paint(text))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::element::visible_width;

    #[test]
    fn plain_style_leaves_text_alone() {
        assert_eq!(TextStyle::default().paint("abc"), "abc");
    }

    #[test]
    fn coloured_text_keeps_visible_width() {
        let painted = TextStyle::fg(Color::Green).bold().paint("ok");
        assert!(painted.contains('\u{1b}'));
        assert!(painted.contains("ok"));
        assert_eq!(visible_width(&painted), 2);
    }

    #[test]
    fn colour_names_parse() {
        assert_eq!("bright_red".parse::<Color>().unwrap(), Color::BrightRed);
        assert_eq!("Green".parse::<Color>().unwrap(), Color::Green);
        assert_eq!(Color::BrightCyan.to_string(), "bright_cyan");
    }
}
