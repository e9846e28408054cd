use crate::char_stream::CharStream;

/// Line (1-based) and column (0-based, in characters) of a point in the source.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct TextPosition {
    pub line: usize,
    pub column: usize,
}

impl Default for TextPosition {
    fn default() -> Self {
        Self { line: 1, column: 0 }
    }
}

impl TextPosition {
    fn new_line(&mut self) {
        self.line += 1;
        self.column = 0;
    }
}

/// Per-character consumption step of a lexer: moves past one character and updates the position.
pub trait LineTracking {
    fn position(&self) -> TextPosition;

    fn consume<S>(&mut self, input: &mut S)
    where
        S: CharStream + ?Sized;

    fn reset(&mut self);
}

/// Counts `\n`, `\r\n` and a lone `\r` as one line break each.
///
/// In `\r\n` the break is attributed to the `\n`; the `\r` in front of it neither starts a line
/// nor advances the column.
#[derive(Debug, Clone, Default)]
pub struct CrAwareLineTracker {
    position: TextPosition,
}

impl LineTracking for CrAwareLineTracker {
    fn position(&self) -> TextPosition {
        self.position
    }

    fn consume<S>(&mut self, input: &mut S)
    where
        S: CharStream + ?Sized,
    {
        match input.lookahead(1) {
            Some('\n') => self.position.new_line(),
            Some('\r') => {
                if input.lookahead(2) != Some('\n') {
                    self.position.new_line();
                }
            }
            Some(_) => self.position.column += 1,
            None => return,
        }
        input.consume();
    }

    fn reset(&mut self) {
        self.position = TextPosition::default();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::char_stream::CodePointBuffer;

    fn positions<T>(text: &str) -> Vec<TextPosition>
    where
        T: LineTracking + Default,
    {
        let mut input = CodePointBuffer::new("", text);
        let mut tracker = T::default();
        let mut positions = vec![tracker.position()];
        while input.lookahead(1).is_some() {
            tracker.consume(&mut input);
            positions.push(tracker.position());
        }
        positions
    }

    #[test]
    fn mixed_line_endings() {
        let lines: Vec<_> = positions::<CrAwareLineTracker>("\r\n\r\r\n")
            .into_iter()
            .map(|p| p.line)
            .collect();
        assert_eq!(lines, [1, 1, 2, 3, 3, 4]);
    }

    #[test]
    fn carriage_return_before_line_feed_keeps_column() {
        let end = *positions::<CrAwareLineTracker>("ab\r\ncd").last().unwrap();
        assert_eq!(end, TextPosition { line: 2, column: 2 });
    }

    #[test]
    fn consuming_at_end_is_a_no_op() {
        let mut input = CodePointBuffer::new("", "");
        let mut tracker = CrAwareLineTracker::default();
        tracker.consume(&mut input);
        assert_eq!(tracker.position(), TextPosition::default());
    }
}
