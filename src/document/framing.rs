/*!
 * Line framing: the markdown syntax around the translatable body of a line.
 *
 * Indentation, blockquote markers, list markers, task boxes and heading
 * hashes are peeled off before translation and re-attached afterwards, so
 * the oracle only ever sees prose.
 */

use once_cell::sync::Lazy;
use regex::Regex;

static PREFIX_REGEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"^([ \t]*(?:>[ \t]?)*[ \t]*(?:(?:[-*+]|\d{1,9}[.)])[ \t]+(?:\[[ xX]\][ \t]+)?|#{1,6}[ \t]+)?)",
    )
    .expect("Invalid line prefix regex")
});

/// One line split into prefix, body and trailing whitespace
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct LineFrame {
    pub prefix: String,
    pub body: String,
    pub suffix: String,
}

impl LineFrame {
    /// Split a line; the body never starts or ends with whitespace
    pub fn split(line: &str) -> Self {
        let prefix_len = PREFIX_REGEX.find(line).map(|m| m.end()).unwrap_or(0);
        let (prefix, rest) = line.split_at(prefix_len);
        let body = rest.trim_end();
        let suffix = &rest[body.len()..];
        let leading = body.len() - body.trim_start().len();
        Self {
            prefix: format!("{}{}", prefix, &body[..leading]),
            body: body.trim_start().to_string(),
            suffix: suffix.to_string(),
        }
    }

    /// Split a table row; the outer border pipes stay in the frame
    pub fn split_table_row(line: &str) -> Self {
        let mut frame = Self::split(line);

        if let Some(rest) = frame.body.strip_prefix('|') {
            let inner = rest.trim_start();
            let border_len = frame.body.len() - inner.len();
            frame.prefix.push_str(&frame.body[..border_len]);
            frame.body = inner.to_string();
        }

        if frame.body.ends_with('|') && !frame.body.ends_with("\\|") {
            let inner_len = frame.body[..frame.body.len() - 1].trim_end().len();
            frame.suffix = format!("{}{}", &frame.body[inner_len..], frame.suffix);
            frame.body.truncate(inner_len);
        }
        frame
    }

    /// A line with nothing to translate
    pub fn is_blank(&self) -> bool {
        self.body.is_empty()
    }

    /// Rebuild the line around a new body
    pub fn wrap(&self, body: &str) -> String {
        if self.is_blank() && body.is_empty() {
            return format!("{}{}", self.prefix, self.suffix);
        }
        format!("{}{}{}", self.prefix, body, self.suffix)
    }
}

/// Frames for consecutive lines of one translation unit
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct FramedText {
    pub frames: Vec<LineFrame>,
}

impl FramedText {
    pub fn from_lines(lines: &[String]) -> Self {
        Self {
            frames: lines.iter().map(|l| LineFrame::split(l)).collect(),
        }
    }

    /// Frames for table rows, one per line
    pub fn from_table_rows(lines: &[String]) -> Self {
        Self {
            frames: lines.iter().map(|l| LineFrame::split_table_row(l)).collect(),
        }
    }

    pub fn len(&self) -> usize {
        self.frames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    /// Bodies joined by newlines, blank positions included as empty lines
    pub fn body_text(&self) -> String {
        self.frames
            .iter()
            .map(|f| f.body.as_str())
            .collect::<Vec<_>>()
            .join("\n")
    }

    /// Body length per line in characters, zero for blank positions
    pub fn body_widths(&self) -> Vec<usize> {
        self.frames.iter().map(|f| f.body.chars().count()).collect()
    }

    /// Whether every line is blank
    pub fn is_all_blank(&self) -> bool {
        self.frames.iter().all(LineFrame::is_blank)
    }

    /// Re-attach frames to translated bodies, one per line
    pub fn wrap_all(&self, bodies: &[String]) -> Vec<String> {
        self.frames
            .iter()
            .zip(bodies.iter())
            .map(|(frame, body)| frame.wrap(body))
            .collect()
    }
}
