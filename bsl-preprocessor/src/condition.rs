use bsl_foundation::source::Span;
use thiserror::Error;
use tracing::trace;

#[derive(Debug, Clone, Copy)]
struct Frame {
    /// Every enclosing branch, this one included, is selected.
    compiled: bool,
    /// Some branch at this level has already been taken.
    matched: bool,
    /// The `#Если` that opened this level.
    opener: Span,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum ConditionError {
    #[error("`#ИначеЕсли` without a matching `#Если`")]
    UnmatchedElseIf,
    #[error("`#Иначе` without a matching `#Если`")]
    UnmatchedElse,
    #[error("`#КонецЕсли` without a matching `#Если`")]
    UnmatchedEndIf,
}

/// Nesting of `#Если` blocks. The bottom frame stands for the module itself and is always
/// compiled.
#[derive(Debug, Clone)]
pub struct ConditionStack {
    frames: Vec<Frame>,
}

impl Default for ConditionStack {
    fn default() -> Self {
        Self {
            frames: vec![Frame {
                compiled: true,
                matched: true,
                opener: Span::default(),
            }],
        }
    }
}

impl ConditionStack {
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether code at the current position is compiled.
    pub fn is_compiled(&self) -> bool {
        self.top().compiled
    }

    /// Number of open `#Если` blocks.
    pub fn depth(&self) -> usize {
        self.frames.len() - 1
    }

    fn top(&self) -> &Frame {
        // The root frame is never popped.
        &self.frames[self.frames.len() - 1]
    }

    fn parent_compiled(&self) -> bool {
        self.frames[self.frames.len() - 2].compiled
    }

    pub fn push_if(&mut self, selected: bool, opener: Span) {
        let compiled = self.is_compiled() && selected;
        self.frames.push(Frame {
            compiled,
            matched: selected,
            opener,
        });
        trace!(depth = self.depth(), compiled, "#Если");
    }

    pub fn else_if(&mut self, selected: bool) -> Result<(), ConditionError> {
        if self.depth() == 0 {
            return Err(ConditionError::UnmatchedElseIf);
        }
        let parent_compiled = self.parent_compiled();
        let top = self.frames.len() - 1;
        let frame = &mut self.frames[top];
        frame.compiled = parent_compiled && !frame.matched && selected;
        frame.matched |= selected;
        trace!(depth = top, compiled = frame.compiled, "#ИначеЕсли");
        Ok(())
    }

    pub fn else_branch(&mut self) -> Result<(), ConditionError> {
        if self.depth() == 0 {
            return Err(ConditionError::UnmatchedElse);
        }
        let parent_compiled = self.parent_compiled();
        let top = self.frames.len() - 1;
        let frame = &mut self.frames[top];
        frame.compiled = parent_compiled && !frame.matched;
        frame.matched = true;
        trace!(depth = top, compiled = frame.compiled, "#Иначе");
        Ok(())
    }

    pub fn end_if(&mut self) -> Result<(), ConditionError> {
        if self.depth() == 0 {
            return Err(ConditionError::UnmatchedEndIf);
        }
        self.frames.pop();
        trace!(depth = self.depth(), "#КонецЕсли");
        Ok(())
    }

    /// Openers of the blocks that are still open, outermost first.
    pub fn unclosed(&self) -> impl Iterator<Item = Span> + '_ {
        self.frames[1..].iter().map(|frame| frame.opener)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_selected_branch_wins() {
        let mut stack = ConditionStack::new();
        stack.push_if(false, Span::default());
        assert!(!stack.is_compiled());
        stack.else_if(true).unwrap();
        assert!(stack.is_compiled());
        stack.else_if(true).unwrap();
        assert!(!stack.is_compiled());
        stack.else_branch().unwrap();
        assert!(!stack.is_compiled());
        stack.end_if().unwrap();
        assert!(stack.is_compiled());
        assert_eq!(stack.depth(), 0);
    }

    #[test]
    fn nested_blocks_inherit_exclusion() {
        let mut stack = ConditionStack::new();
        stack.push_if(false, Span::default());
        stack.push_if(true, Span::default());
        assert!(!stack.is_compiled());
        stack.else_branch().unwrap();
        assert!(!stack.is_compiled());
        stack.end_if().unwrap();
        stack.else_branch().unwrap();
        assert!(stack.is_compiled());
    }

    #[test]
    fn root_frame_is_kept() {
        let mut stack = ConditionStack::new();
        assert_eq!(stack.end_if(), Err(ConditionError::UnmatchedEndIf));
        assert_eq!(stack.else_branch(), Err(ConditionError::UnmatchedElse));
        assert_eq!(stack.else_if(true), Err(ConditionError::UnmatchedElseIf));
        assert!(stack.is_compiled());

        let opener = Span { start: 3, end: 4 };
        stack.push_if(true, opener);
        assert_eq!(stack.unclosed().collect::<Vec<_>>(), [opener]);
    }
}
