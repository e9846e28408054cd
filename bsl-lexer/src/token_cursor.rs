use crate::token::{Channel, Kind, Token};

/// A cursor over a token list that only shows tokens of the selected channels.
///
/// The end of file token is visible regardless of its channel. If the list does not end with one,
/// one is synthesized after the last token, so that the cursor can always be peeked.
#[derive(Debug, Clone)]
pub struct TokenCursor<'a, K> {
    tokens: &'a [Token<K>],
    channels: Channel,
    position: usize,
    end: Token<K>,
}

impl<'a, K> TokenCursor<'a, K>
where
    K: Kind,
{
    pub fn new(tokens: &'a [Token<K>], channels: Channel) -> Self {
        let end = match tokens.last() {
            Some(last) if last.is_end_of_file() => last.clone(),
            Some(last) => last.end_of_file_after(),
            None => Token::end_of_file_at_start(),
        };
        let mut cursor = Self {
            tokens,
            channels,
            position: 0,
            end,
        };
        cursor.position = cursor.skip_filtered(0);
        cursor
    }

    /// A cursor over the parser-visible tokens.
    pub fn on_default_channel(tokens: &'a [Token<K>]) -> Self {
        Self::new(tokens, Channel::DEFAULT)
    }

    fn is_visible(&self, token: &Token<K>) -> bool {
        token.is_end_of_file() || self.channels.intersects(token.channel)
    }

    fn skip_filtered(&self, mut position: usize) -> usize {
        while let Some(token) = self.tokens.get(position) {
            if self.is_visible(token) {
                break;
            }
            position += 1;
        }
        position
    }

    fn token_at(&self, position: usize) -> &Token<K> {
        match self.tokens.get(position) {
            Some(token) if !token.is_end_of_file() => token,
            _ => &self.end,
        }
    }

    /// Index into the underlying token list of the next visible token.
    pub fn position(&self) -> usize {
        self.position
    }

    /// Moves back to an earlier [`TokenCursor::position`].
    pub fn seek(&mut self, position: usize) {
        self.position = self.skip_filtered(position.min(self.tokens.len()));
    }

    pub fn rewind(&mut self) {
        self.seek(0);
    }

    pub fn peek(&self) -> &Token<K> {
        self.token_at(self.position)
    }

    /// Peeks the `n`th visible token ahead, where `peek_nth(0)` is the same as `peek`.
    pub fn peek_nth(&self, n: usize) -> &Token<K> {
        let mut position = self.position;
        for _ in 0..n {
            if self.token_at(position).is_end_of_file() {
                break;
            }
            position = self.skip_filtered(position + 1);
        }
        self.token_at(position)
    }

    pub fn next(&mut self) -> Token<K> {
        let token = self.peek().clone();
        if !token.is_end_of_file() {
            self.position = self.skip_filtered(self.position + 1);
        }
        token
    }

    pub fn is_at_end(&self) -> bool {
        self.peek().is_end_of_file()
    }

    /// All underlying tokens, including filtered ones.
    pub fn tokens(&self) -> &'a [Token<K>] {
        self.tokens
    }
}
