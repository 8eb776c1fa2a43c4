use tracing::{error, warn};

use crate::span::Span;
use crate::syntax::token::{Token, TokenKind};

/// A front-end diagnostic (scan, parse or type error, or a warning).
#[derive(Clone, Debug, PartialEq)]
pub struct Diagnostic {
    pub severity: Severity,
    pub message: String,
    pub span: Span,
    pub notes: Vec<String>,
    pub help: Option<String>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Severity {
    Error,
    Warning,
}

impl Diagnostic {
    pub fn error(message: String, span: Span) -> Self {
        Self {
            severity: Severity::Error,
            message,
            span,
            notes: Vec::new(),
            help: None,
        }
    }

    pub fn warning(message: String, span: Span) -> Self {
        Self {
            severity: Severity::Warning,
            message,
            span,
            notes: Vec::new(),
            help: None,
        }
    }

    pub fn with_note(mut self, note: String) -> Self {
        self.notes.push(note);
        self
    }

    pub fn with_help(mut self, help: String) -> Self {
        self.help = Some(help);
        self
    }

    fn report<'a>(&self, filename: &'a str) -> ariadne::Report<'a, (&'a str, std::ops::Range<usize>)> {
        use ariadne::{Color, Config, Label, Report, ReportKind};

        let (kind, color) = match self.severity {
            Severity::Error => (ReportKind::Error, Color::Red),
            Severity::Warning => (ReportKind::Warning, Color::Yellow),
        };

        let range = self.span.start as usize..self.span.end.max(self.span.start) as usize;
        let mut report = Report::build(kind, filename, self.span.start as usize)
            .with_config(Config::default().with_color(false))
            .with_message(format!("[line {}] {}", self.span.line, self.message))
            .with_label(
                Label::new((filename, range))
                    .with_message(&self.message)
                    .with_color(color),
            );

        for note in &self.notes {
            report = report.with_note(note);
        }

        if let Some(help) = &self.help {
            report = report.with_help(help);
        }

        report.finish()
    }

    /// Render the diagnostic into a string, without colour codes.
    pub fn render_to_string(&self, filename: &str, source: &str) -> String {
        let mut out = Vec::new();
        match self
            .report(filename)
            .write((filename, ariadne::Source::from(source)), &mut out)
        {
            Ok(()) => String::from_utf8_lossy(&out).into_owned(),
            Err(_) => format!("[line {}] {}", self.span.line, self.message),
        }
    }
}

/// Render every diagnostic of a snippet against its source.
pub fn render_report(diagnostics: &[Diagnostic], filename: &str, source: &str) -> String {
    diagnostics
        .iter()
        .map(|d| d.render_to_string(filename, source))
        .collect::<Vec<_>>()
        .join("\n")
}

/// Collects the diagnostics of one compilation unit.
///
/// The scanner, parser and type checker all report through the same
/// handler; codegen checks [`ErrorHandler::has_error`] before emitting
/// anything for the unit.
#[derive(Debug)]
pub struct ErrorHandler {
    context: String,
    diagnostics: Vec<Diagnostic>,
}

impl ErrorHandler {
    pub fn new(context: impl Into<String>) -> Self {
        Self {
            context: context.into(),
            diagnostics: Vec::new(),
        }
    }

    /// Label of the unit being compiled, e.g. `Custom update 'reset'`.
    pub fn context(&self) -> &str {
        &self.context
    }

    pub fn error(&mut self, span: Span, message: impl Into<String>) {
        let message = message.into();
        error!(context = %self.context, "[line {}] Error: {}", span.line, message);
        self.diagnostics.push(Diagnostic::error(message, span));
    }

    /// Record an error located at a token.
    pub fn error_at(&mut self, token: &Token, message: impl Into<String>) {
        let message = message.into();
        let location = if token.kind == TokenKind::EndOfFile {
            " at end".to_string()
        } else {
            format!(" at '{}'", token.lexeme)
        };
        error!(
            context = %self.context,
            "[line {}] Error{}: {}", token.span.line, location, message
        );
        self.diagnostics
            .push(Diagnostic::error(message, token.span).with_note(format!("error{}", location)));
    }

    pub fn warning(&mut self, span: Span, message: impl Into<String>) {
        let message = message.into();
        warn!(context = %self.context, "[line {}] Warning: {}", span.line, message);
        self.diagnostics.push(Diagnostic::warning(message, span));
    }

    pub fn report(&mut self, diagnostic: Diagnostic) {
        if diagnostic.severity == Severity::Error {
            error!(context = %self.context, "[line {}] Error: {}", diagnostic.span.line, diagnostic.message);
        }
        self.diagnostics.push(diagnostic);
    }

    pub fn has_error(&self) -> bool {
        self.diagnostics
            .iter()
            .any(|d| d.severity == Severity::Error)
    }

    pub fn diagnostics(&self) -> &[Diagnostic] {
        &self.diagnostics
    }

    pub fn into_diagnostics(self) -> Vec<Diagnostic> {
        self.diagnostics
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_construction() {
        let span = Span::new(10, 15, 2);
        let d = Diagnostic::error("type mismatch".to_string(), span);
        assert_eq!(d.severity, Severity::Error);
        assert_eq!(d.message, "type mismatch");
        assert_eq!(d.span.line, 2);
        assert!(d.notes.is_empty());
        assert!(d.help.is_none());
    }

    #[test]
    fn test_chained_builders() {
        let d = Diagnostic::warning("hint".to_string(), Span::new(0, 5, 1))
            .with_note("note 1".to_string())
            .with_help("help text".to_string())
            .with_note("note 2".to_string());
        assert_eq!(d.notes.len(), 2);
        assert_eq!(d.help.as_deref(), Some("help text"));
    }

    #[test]
    fn test_handler_tracks_errors_only() {
        let mut handler = ErrorHandler::new("unit");
        handler.warning(Span::dummy(), "suspicious");
        assert!(!handler.has_error());
        handler.error(Span::new(0, 1, 3), "bad");
        assert!(handler.has_error());
        assert_eq!(handler.diagnostics().len(), 2);
        assert_eq!(handler.context(), "unit");
    }

    #[test]
    fn test_error_at_token_notes_lexeme() {
        let mut handler = ErrorHandler::new("unit");
        let token = Token::new(TokenKind::Identifier, "foo", Span::new(4, 7, 1));
        handler.error_at(&token, "unexpected identifier");
        let diag = &handler.diagnostics()[0];
        assert_eq!(diag.notes, vec!["error at 'foo'".to_string()]);

        let eof = Token::new(TokenKind::EndOfFile, "", Span::new(9, 9, 1));
        handler.error_at(&eof, "expected ';'");
        assert_eq!(handler.diagnostics()[1].notes[0], "error at end");
    }

    #[test]
    fn test_render_to_string_mentions_message() {
        let source = "int x = 1.0f +;\n";
        let d = Diagnostic::error("expected expression".to_string(), Span::new(14, 15, 1));
        let text = d.render_to_string("snippet", source);
        assert!(text.contains("expected expression"));
    }

    #[test]
    fn test_report_covers_every_diagnostic() {
        let source = "V = 1.0f;\nW = 2.0f;\n";
        let diagnostics = vec![
            Diagnostic::error("assignment to const".to_string(), Span::new(0, 1, 1)),
            Diagnostic::error("undefined identifier 'W'".to_string(), Span::new(10, 11, 2)),
        ];
        let report = render_report(&diagnostics, "update", source);
        assert!(report.contains("assignment to const"));
        assert!(report.contains("undefined identifier 'W'"));
        assert!(render_report(&[], "update", source).is_empty());
    }
}
