mod sink;

use std::fmt;

pub use codespan_reporting::diagnostic::LabelStyle;
pub use codespan_reporting::diagnostic::Severity;
pub use codespan_reporting::files::Error as RenderError;
use codespan_reporting::term;
use codespan_reporting::term::termcolor::{ColorChoice, NoColor, StandardStream};

use crate::source::{SourceFile, Span, Spanned};

pub use sink::*;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Label {
    pub style: LabelStyle,
    pub span: Span,
    pub message: String,
}

impl Label {
    pub fn new(style: LabelStyle, spanned: &impl Spanned, message: impl Into<String>) -> Self {
        Self {
            style,
            span: spanned.span(),
            message: message.into(),
        }
    }

    pub fn primary(spanned: &impl Spanned, message: impl Into<String>) -> Self {
        Self::new(LabelStyle::Primary, spanned, message)
    }

    pub fn secondary(spanned: &impl Spanned, message: impl Into<String>) -> Self {
        Self::new(LabelStyle::Secondary, spanned, message)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoteKind {
    Note,
    /// Internal information, such as the parser's rule traceback.
    Debug,
}

impl fmt::Display for NoteKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            NoteKind::Note => "note",
            NoteKind::Debug => "debug",
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Note {
    pub kind: NoteKind,
    pub text: String,
}

impl From<String> for Note {
    fn from(text: String) -> Self {
        Self {
            kind: NoteKind::Note,
            text,
        }
    }
}

impl From<&str> for Note {
    fn from(text: &str) -> Self {
        Self::from(text.to_string())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Diagnostic {
    pub severity: Severity,
    pub message: String,
    pub labels: Vec<Label>,
    pub notes: Vec<Note>,
}

impl Diagnostic {
    pub fn new(severity: Severity, message: impl Into<String>) -> Self {
        Self {
            severity,
            message: message.into(),
            labels: vec![],
            notes: vec![],
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self::new(Severity::Error, message)
    }

    pub fn warning(message: impl Into<String>) -> Self {
        Self::new(Severity::Warning, message)
    }

    pub fn with_label(mut self, label: Label) -> Self {
        self.labels.push(label);
        self
    }

    pub fn with_note(mut self, note: impl Into<Note>) -> Self {
        self.notes.push(note.into());
        self
    }

    pub fn is_error(&self) -> bool {
        self.severity >= Severity::Error
    }

    pub fn to_codespan(&self) -> codespan_reporting::diagnostic::Diagnostic<()> {
        codespan_reporting::diagnostic::Diagnostic {
            severity: self.severity,
            code: None,
            message: self.message.clone(),
            labels: self
                .labels
                .iter()
                .map(|label| codespan_reporting::diagnostic::Label {
                    style: label.style,
                    file_id: (),
                    range: label.span.to_range(),
                    message: label.message.clone(),
                })
                .collect(),
            notes: self
                .notes
                .iter()
                .map(|note| format!("{}: {}", note.kind, note.text))
                .collect(),
        }
    }

    pub fn emit_to_stderr(&self, file: &SourceFile) -> Result<(), RenderError> {
        term::emit(
            &mut StandardStream::stderr(ColorChoice::Auto),
            &term::Config::default(),
            file,
            &self.to_codespan(),
        )
    }

    /// Renders the diagnostic without colors, as it would appear in a terminal.
    pub fn emit_to_string(&self, file: &SourceFile) -> Result<String, RenderError> {
        let mut output = NoColor::new(Vec::new());
        term::emit(
            &mut output,
            &term::Config::default(),
            file,
            &self.to_codespan(),
        )?;
        Ok(String::from_utf8_lossy(&output.into_inner()).into_owned())
    }
}
