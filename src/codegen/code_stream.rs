//! Indented output buffer for generated C-like code.

use std::fmt;

const INDENT: &str = "    ";

/// Text sink that indents each line by its brace depth.
///
/// A line starting with `}` is dedented before it is written; depth then
/// follows the braces counted on the line.
#[derive(Debug, Default, Clone)]
pub struct CodeStream {
    text: String,
    depth: usize,
}

impl CodeStream {
    pub fn new() -> Self {
        Self::default()
    }

    /// Write one line, splitting on embedded newlines.
    pub fn line(&mut self, line: &str) {
        for part in line.split('\n') {
            self.write_line(part);
        }
    }

    /// Write an empty line.
    pub fn blank(&mut self) {
        self.text.push('\n');
    }

    /// Append text that is already indented relative to its own first line.
    ///
    /// Unlike [`CodeStream::line`], brace depth is not recounted; the block
    /// is shifted to the current depth as a whole.
    pub fn append_block(&mut self, block: &str) {
        let prefix = INDENT.repeat(self.depth);
        for line in block.lines() {
            if line.trim().is_empty() {
                self.text.push('\n');
            } else {
                self.text.push_str(&prefix);
                self.text.push_str(line);
                self.text.push('\n');
            }
        }
    }

    pub fn depth(&self) -> usize {
        self.depth
    }

    pub fn is_empty(&self) -> bool {
        self.text.is_empty()
    }

    pub fn as_str(&self) -> &str {
        &self.text
    }

    pub fn into_string(self) -> String {
        self.text
    }

    fn write_line(&mut self, line: &str) {
        let trimmed = line.trim();
        if trimmed.is_empty() {
            self.text.push('\n');
            return;
        }
        if trimmed.starts_with('}') {
            self.depth = self.depth.saturating_sub(1);
        }
        self.text.push_str(&INDENT.repeat(self.depth));
        self.text.push_str(trimmed);
        self.text.push('\n');

        let opens = trimmed.matches('{').count();
        let mut closes = trimmed.matches('}').count();
        if trimmed.starts_with('}') {
            closes -= 1;
        }
        self.depth = (self.depth + opens).saturating_sub(closes);
    }
}

impl fmt::Display for CodeStream {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.text)
    }
}
