/// Untouched text of one unit. `leading` holds attached comments (and, for
/// XML formats, the indentation before the element); it is dropped together
/// with `raw` when the unit is left out of a written file.
#[derive(Debug, Clone, Default)]
pub(crate) struct UnitSpan {
    pub leading: String,
    pub raw: String,
}

#[derive(Debug, Clone)]
pub(crate) enum Segment {
    Text(String),
    Unit(usize),
}

/// A file cut into free text and units, in file order.
#[derive(Debug, Clone, Default)]
pub(crate) struct Document {
    pub segments: Vec<Segment>,
    pub units: Vec<UnitSpan>,
}

impl Document {
    pub fn push_text(&mut self, text: &str) {
        if text.is_empty() {
            return;
        }
        if let Some(Segment::Text(prev)) = self.segments.last_mut() {
            prev.push_str(text);
        } else {
            self.segments.push(Segment::Text(text.to_string()));
        }
    }

    pub fn push_unit(&mut self, span: UnitSpan) -> usize {
        let idx = self.units.len();
        self.units.push(span);
        self.segments.push(Segment::Unit(idx));
        idx
    }

    /// Detach the trailing text of the previous segment starting at its last
    /// newline, so an XML element can own the indentation before it.
    pub fn take_line_prefix(&mut self) -> String {
        if let Some(Segment::Text(prev)) = self.segments.last_mut() {
            if let Some(pos) = prev.rfind('\n') {
                let tail = prev.split_off(pos);
                if prev.is_empty() {
                    self.segments.pop();
                }
                return tail;
            }
        }
        String::new()
    }
}

/// Line terminator used by `raw`, defaulting to `\n`.
pub(crate) fn line_ending(raw: &str) -> &'static str {
    if raw.contains("\r\n") {
        "\r\n"
    } else {
        "\n"
    }
}

/// Split on `\n`, keeping terminators, so concatenating the pieces gives the
/// input back.
pub(crate) fn physical_lines(text: &str) -> Vec<&str> {
    text.split_inclusive('\n').collect()
}

/// A physical line without its terminator.
pub(crate) fn content(line: &str) -> &str {
    line.trim_end_matches(['\n', '\r'])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn physical_lines_keep_terminators() {
        let lines = physical_lines("a\r\nb\n\nc");
        assert_eq!(lines, vec!["a\r\n", "b\n", "\n", "c"]);
        assert_eq!(lines.concat(), "a\r\nb\n\nc");
        assert_eq!(content(lines[0]), "a");
    }

    #[test]
    fn take_line_prefix_moves_indentation() {
        let mut doc = Document::default();
        doc.push_text("<resources>\n    ");
        assert_eq!(doc.take_line_prefix(), "\n    ");
        match &doc.segments[0] {
            Segment::Text(t) => assert_eq!(t, "<resources>"),
            Segment::Unit(_) => panic!("expected text"),
        }
    }
}
