//! Plain-text rendering of diagnostics against their template source.

use stencil_core::span::LineIndex;

use crate::error::Diagnostic;

/// Lines of context shown before and after the labeled lines.
const CONTEXT_LINES: usize = 2;

impl Diagnostic {
    /// Render this diagnostic as a terminal-style report.
    ///
    /// The header line is followed by the lines around the primary label,
    /// each prefixed with a line-number gutter. The labeled text is marked
    /// with `^`: a span crossing lines is underlined from its start to the end
    /// of the first line, fully on lines in between, and up to its end on the
    /// last line. An empty span gets a single caret.
    pub fn render(&self, source: &str) -> String {
        let mut out = self.to_string();

        if let Some(label) = self.labels().iter().find(|label| label.is_primary()) {
            let index = LineIndex::new(source);
            let start = label.span().start().min(source.len());
            let end = label.span().end().min(source.len()).max(start);

            let first = index.line_of(start);
            let last = if end > start {
                index.line_of(end - 1)
            } else {
                first
            };
            let from = first.saturating_sub(CONTEXT_LINES);
            let to = (last + CONTEXT_LINES).min(index.line_count() - 1);
            let width = (to + 1).to_string().len();

            for line in from..=to {
                push_line(&mut out, &format!("{:>width$}", line + 1), index.line_text(line));

                if line < first || line > last {
                    continue;
                }

                let range = index.line_range(line);
                let marked_start = if line == first {
                    start.clamp(range.start, range.end)
                } else {
                    range.start
                };
                let marked_end = if line == last {
                    end.clamp(marked_start, range.end)
                } else {
                    range.end
                };

                let padding: String = source[range.start..marked_start]
                    .chars()
                    .map(|c| if c == '\t' { '\t' } else { ' ' })
                    .collect();
                let mut carets = source[marked_start..marked_end].chars().count();
                if first == last && carets == 0 {
                    carets = 1;
                }
                if carets == 0 {
                    continue;
                }

                let mut marker = format!("{padding}{}", "^".repeat(carets));
                if line == last && !label.message().is_empty() {
                    marker.push(' ');
                    marker.push_str(label.message());
                }
                push_line(&mut out, &" ".repeat(width), &marker);
            }
        }

        if let Some(help) = self.help() {
            out.push_str("\n  = help: ");
            out.push_str(help);
        }

        out
    }
}

fn push_line(out: &mut String, gutter: &str, text: &str) {
    out.push_str("\n  ");
    out.push_str(gutter);
    out.push_str(" | ");
    out.push_str(text);
    let trimmed = out.trim_end_matches([' ', '\t']).len();
    out.truncate(trimmed);
}
