//! Line segmentation
//!
//! Keeps every wire line within [`MAX_LINE_LEN`] characters. An over-long
//! chat line is cut into a first line of `MAX_LINE_LEN` characters and
//! continuation lines indented to sit under the text after the `"Name: "`
//! label. [`Reassembler`] undoes the cut on the receiving side.
//!
//! Lengths are counted in `char`s, never bytes, so a cut never lands
//! inside a UTF-8 sequence.

/// Per-line character limit of the wire protocol
pub const MAX_LINE_LEN: usize = 90;

/// Indent of a continuation line past the first colon: `": "` plus alignment.
const LABEL_PADDING: usize = 5;

/// Width of the continuation indent for a message whose first line is `line`.
///
/// The indent is the index of the first colon plus [`LABEL_PADDING`]. Lines
/// without a colon, or whose label is so wide that no text would fit after
/// the indent, fall back to zero indent.
pub fn continuation_indent(line: &str, limit: usize) -> usize {
    match line.chars().position(|c| c == ':') {
        Some(colon) if colon + LABEL_PADDING < limit => colon + LABEL_PADDING,
        _ => 0,
    }
}

/// Segment `line` with the protocol limit.
pub fn segment(line: &str) -> Vec<String> {
    let mut lines = Vec::new();
    segment_into(line, MAX_LINE_LEN, &mut lines);
    lines
}

/// Append the wire lines for `line` to `out`.
///
/// Short lines are pushed unchanged. Every produced line, indent included,
/// is at most `limit` characters when `limit > 0`.
pub fn segment_into(line: &str, limit: usize, out: &mut Vec<String>) {
    if line.chars().count() <= limit {
        out.push(line.to_owned());
        return;
    }

    let indent = continuation_indent(line, limit);
    let chunk = limit.saturating_sub(indent).max(1);
    let padding = " ".repeat(indent);

    let (first, mut rest) = split_at_char(line, limit.max(1));
    out.push(first.to_owned());

    while !rest.is_empty() {
        let (head, tail) = split_at_char(rest, chunk);
        let mut wire = String::with_capacity(padding.len() + head.len());
        wire.push_str(&padding);
        wire.push_str(head);
        out.push(wire);
        rest = tail;
    }
}

/// Split after the first `n` characters.
fn split_at_char(s: &str, n: usize) -> (&str, &str) {
    match s.char_indices().nth(n) {
        Some((idx, _)) => s.split_at(idx),
        None => (s, ""),
    }
}

/// Rebuilds whole messages from wire lines.
///
/// Each message arrives as one or more lines followed by a blank line.
/// The first line fixes the continuation indent; it is stripped from every
/// later line before concatenation.
#[derive(Debug)]
pub struct Reassembler {
    limit: usize,
    indent: usize,
    pending: Option<String>,
}

impl Reassembler {
    /// Create a reassembler for the given per-line limit
    pub fn new(limit: usize) -> Self {
        Self {
            limit,
            indent: 0,
            pending: None,
        }
    }

    /// Feed one wire line. Returns the full message once its blank
    /// terminator arrives. A blank line with nothing pending yields nothing.
    pub fn push(&mut self, line: String) -> Option<String> {
        if line.is_empty() {
            return self.pending.take();
        }

        match self.pending.as_mut() {
            None => {
                self.indent = continuation_indent(&line, self.limit);
                self.pending = Some(line);
            }
            Some(message) => message.push_str(strip_indent(&line, self.indent)),
        }
        None
    }

    /// Hand out a message cut short by end-of-stream.
    pub fn finish(&mut self) -> Option<String> {
        self.pending.take()
    }
}

impl Default for Reassembler {
    fn default() -> Self {
        Self::new(MAX_LINE_LEN)
    }
}

/// Remove at most `indent` leading spaces.
fn strip_indent(line: &str, indent: usize) -> &str {
    let spaces = line
        .bytes()
        .take(indent)
        .take_while(|b| *b == b' ')
        .count();
    &line[spaces..]
}

#[cfg(test)]
mod tests {
    use super::*;

    fn chat(label: &str, len: usize) -> String {
        let mut line = format!("{}: ", label);
        let letters = "abcdefghijklmnopqrstuvwxyz";
        while line.chars().count() < len {
            let i = line.len() % letters.len();
            line.push_str(&letters[i..i + 1]);
        }
        line
    }

    fn reassemble(lines: &[String]) -> String {
        let mut reassembler = Reassembler::default();
        for line in lines {
            assert!(reassembler.push(line.clone()).is_none());
        }
        reassembler.push(String::new()).expect("message complete")
    }

    #[test]
    fn test_short_line_unchanged() {
        let line = chat("Alice", 90);
        assert_eq!(segment(&line), vec![line.clone()]);
        assert_eq!(segment("Alice: hi"), vec!["Alice: hi".to_string()]);
        assert_eq!(segment(""), vec![String::new()]);
    }

    #[test]
    fn test_alice_200_chars() {
        let line = chat("Alice", 200);
        let lines = segment(&line);

        assert_eq!(lines.len(), 3);
        assert!(lines[0].starts_with("Alice: "));
        assert_eq!(lines[0].chars().count(), 90);
        for continuation in &lines[1..] {
            assert!(continuation.starts_with(&" ".repeat(10)));
        }
        assert!(lines.iter().all(|l| l.chars().count() <= MAX_LINE_LEN));

        let total: usize = lines[0].len() + lines[1..].iter().map(|l| l.len() - 10).sum::<usize>();
        assert_eq!(total, 200);
    }

    #[test]
    fn test_strip_indent_reconstructs() {
        for len in [91, 150, 179, 180, 181, 500] {
            let line = chat("Bob", len);
            let colon = line.find(':').unwrap();
            let lines = segment(&line);

            let mut rebuilt = lines[0].clone();
            for continuation in &lines[1..] {
                rebuilt.push_str(&continuation[colon + 5..]);
            }
            assert_eq!(rebuilt, line, "length {}", len);
            assert!(lines.iter().all(|l| l.chars().count() <= MAX_LINE_LEN));
        }
    }

    #[test]
    fn test_no_colon_uses_zero_indent() {
        let line = "x".repeat(200);
        let lines = segment(&line);

        assert_eq!(lines.len(), 3);
        assert_eq!(lines[1], "x".repeat(90));
        assert_eq!(lines[2], "x".repeat(20));
        assert_eq!(lines.concat(), line);
    }

    #[test]
    fn test_wide_label_uses_zero_indent() {
        let line = format!("{}: {}", "n".repeat(86), "t".repeat(100));
        assert_eq!(continuation_indent(&line, MAX_LINE_LEN), 0);

        let lines = segment(&line);
        assert!(lines.iter().all(|l| l.chars().count() <= MAX_LINE_LEN));
        assert_eq!(lines.concat(), line);
    }

    #[test]
    fn test_multibyte_split_on_char_boundary() {
        let line = format!("Zoë: {}", "é".repeat(120));
        let lines = segment(&line);

        assert!(lines.iter().all(|l| l.chars().count() <= MAX_LINE_LEN));
        assert_eq!(reassemble(&lines), line);
    }

    #[test]
    fn test_reassembler_round_trip() {
        let line = chat("Alice", 150);
        assert_eq!(reassemble(&segment(&line)), line);
    }

    #[test]
    fn test_reassembler_keeps_spaces_in_text() {
        let mut line = chat("Al", 90);
        line.push_str("   trailing text after a run of spaces at the cut");
        assert_eq!(reassemble(&segment(&line)), line);
    }

    #[test]
    fn test_reassembler_ignores_stray_blank_lines() {
        let mut reassembler = Reassembler::default();
        assert!(reassembler.push(String::new()).is_none());
        assert!(reassembler.push("LOGIN_SUCCESS".to_string()).is_none());
        assert_eq!(
            reassembler.push(String::new()).as_deref(),
            Some("LOGIN_SUCCESS")
        );
        assert!(reassembler.push(String::new()).is_none());
    }

    #[test]
    fn test_reassembler_finish_partial() {
        let mut reassembler = Reassembler::default();
        reassembler.push("Server is shutting down".to_string());
        assert_eq!(
            reassembler.finish().as_deref(),
            Some("Server is shutting down")
        );
        assert!(reassembler.finish().is_none());
    }

    #[test]
    fn test_segment_into_appends() {
        let mut buffer = vec!["earlier".to_string()];
        segment_into("Alice: hi", MAX_LINE_LEN, &mut buffer);
        assert_eq!(buffer, vec!["earlier".to_string(), "Alice: hi".to_string()]);
    }
}
