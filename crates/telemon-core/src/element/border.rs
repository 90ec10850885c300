use crate::element::visible_width;

/// Box `content` in `+---+` / `| line |` framing.
///
/// The box is as wide as the longest line plus four, but never wider
/// than `max_width`; lines are padded to the inner width.
pub fn add_border(content: &str, max_width: usize) -> String {
    let longest = content.lines().map(visible_width).max().unwrap_or(0);
    let width = (longest + 4).min(max_width).max(4);
    let inner = width - 4;

    let edge = format!("+{}+", "-".repeat(width - 2));
    let mut out = Vec::with_capacity(content.lines().count() + 2);
    out.push(edge.clone());
    for line in content.lines() {
        let pad = inner.saturating_sub(visible_width(line));
        out.push(format!("| {line}{} |", " ".repeat(pad)));
    }
    out.push(edge);
    out.join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wraps_content() {
        let boxed = add_border("Test Content", 30);
        assert_eq!(boxed, "+--------------+\n| Test Content |\n+--------------+");
    }

    #[test]
    fn pads_short_lines() {
        let boxed = add_border("ab\nabcd", 60);
        let lines: Vec<_> = boxed.lines().collect();
        assert_eq!(lines[1], "| ab   |");
        assert_eq!(lines[2], "| abcd |");
    }
}
