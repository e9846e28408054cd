use bsl_lexer::Kind;

use crate::{node::Node, ParseError, Parser, PredictionMode};

/// What error recovery does when it reaches a token.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecoveryPoint {
    /// Skip the token and keep going.
    Skip,
    /// Stop, leaving the token for the enclosing rule.
    StopBefore,
    /// Keep the token as part of the recovered node and stop.
    StopAfter,
}

impl<'a, 't, K> Parser<'a, 't, K>
where
    K: Kind,
{
    /// Handles the result of a rule that started at token position `start`.
    ///
    /// In optimistic mode errors are propagated as is. In general mode the cursor is moved back to
    /// `start` and tokens are moved into `node` as error leaves until `sync` says to stop. At least
    /// one token is consumed so that the enclosing loop always makes progress.
    pub fn recover<T, R>(
        &mut self,
        result: Result<T, ParseError>,
        start: usize,
        node: &mut Node<R, K>,
        sync: impl Fn(K) -> RecoveryPoint,
    ) -> Result<Option<T>, ParseError>
    where
        R: Copy + PartialEq,
    {
        let error = match result {
            Ok(ok) => return Ok(Some(ok)),
            Err(error) => error,
        };
        if self.mode() == PredictionMode::Optimistic {
            return Err(error);
        }

        self.tokens.seek(start);
        loop {
            let kind = self.peek_kind();
            if kind == K::END_OF_FILE {
                break;
            }
            match sync(kind) {
                RecoveryPoint::StopBefore if self.tokens.position() != start => break,
                RecoveryPoint::StopAfter => {
                    node.add_token(self.next());
                    break;
                }
                _ => node.add_error_node(self.next()),
            }
        }
        Ok(None)
    }
}
