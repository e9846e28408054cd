//! Where diagnostics go once the parser or the preprocessor has produced them.

use tracing::warn;

use crate::errors::Diagnostic;

/// Diagnostic sink - anything that can collect diagnostics for later display.
pub trait DiagnosticSink {
    fn emit(&mut self, diagnostic: Diagnostic);
}

impl DiagnosticSink for () {
    fn emit(&mut self, _: Diagnostic) {}
}

impl DiagnosticSink for Vec<Diagnostic> {
    fn emit(&mut self, diagnostic: Diagnostic) {
        self.push(diagnostic);
    }
}

/// Keeps only the most severe diagnostic.
impl DiagnosticSink for Option<Diagnostic> {
    #[track_caller]
    fn emit(&mut self, new: Diagnostic) {
        match self {
            Some(old) if new.severity <= old.severity => {
                warn!(message = %new.message, "new diagnostic dropped from Option<Diagnostic>");
            }
            _ => *self = Some(new),
        }
    }
}

pub fn pipe_all_diagnostics_into<I>(sink: &mut dyn DiagnosticSink, source: I)
where
    I: IntoIterator<Item = Diagnostic>,
{
    source
        .into_iter()
        .for_each(|diagnostic| sink.emit(diagnostic))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn option_sink_keeps_most_severe() {
        let mut sink: Option<Diagnostic> = None;
        sink.emit(Diagnostic::warning("first"));
        sink.emit(Diagnostic::error("second"));
        sink.emit(Diagnostic::error("third"));
        assert_eq!(sink.map(|d| d.message), Some("second".to_owned()));
    }

    #[test]
    fn piping() {
        let mut sink = vec![];
        pipe_all_diagnostics_into(
            &mut sink,
            [Diagnostic::error("a"), Diagnostic::warning("b")],
        );
        assert_eq!(sink.len(), 2);
    }
}
