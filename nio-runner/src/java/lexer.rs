// Copyright (c) The nio-inspector Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

use crate::errors::JavaParseError;

#[derive(Clone, Debug, Eq, PartialEq)]
pub(super) enum TokenKind {
    Ident(String),
    Punct(char),
    // String, char, text block or numeric literal. The contents are never needed.
    Literal,
}

#[derive(Clone, Debug, Eq, PartialEq)]
pub(super) struct Token {
    pub(super) kind: TokenKind,
    pub(super) line: usize,
}

impl Token {
    pub(super) fn is_punct(&self, c: char) -> bool {
        self.kind == TokenKind::Punct(c)
    }

    pub(super) fn ident(&self) -> Option<&str> {
        match &self.kind {
            TokenKind::Ident(ident) => Some(ident),
            _ => None,
        }
    }

    pub(super) fn is_ident(&self, s: &str) -> bool {
        self.ident() == Some(s)
    }
}

/// Splits Java source into tokens, dropping whitespace and comments.
pub(super) fn tokenize(source: &str) -> Result<Vec<Token>, JavaParseError> {
    let chars: Vec<char> = source.chars().collect();
    let mut tokens = Vec::new();
    let mut line = 1;
    let mut i = 0;

    while i < chars.len() {
        let c = chars[i];
        match c {
            '\n' => {
                line += 1;
                i += 1;
            }
            c if c.is_whitespace() => i += 1,
            '/' if chars.get(i + 1) == Some(&'/') => {
                while i < chars.len() && chars[i] != '\n' {
                    i += 1;
                }
            }
            '/' if chars.get(i + 1) == Some(&'*') => {
                let start = line;
                i += 2;
                loop {
                    match chars.get(i) {
                        None => return Err(JavaParseError::new(start, "unterminated comment")),
                        Some('*') if chars.get(i + 1) == Some(&'/') => {
                            i += 2;
                            break;
                        }
                        Some('\n') => line += 1,
                        Some(_) => {}
                    }
                    i += 1;
                }
            }
            '"' | '\'' => {
                let start = line;
                let text_block =
                    c == '"' && chars.get(i + 1) == Some(&'"') && chars.get(i + 2) == Some(&'"');
                i = if text_block {
                    skip_text_block(&chars, i + 3, &mut line)
                } else {
                    skip_quoted(&chars, i + 1, c)
                }
                .ok_or_else(|| JavaParseError::new(start, "unterminated literal"))?;
                tokens.push(Token {
                    kind: TokenKind::Literal,
                    line: start,
                });
            }
            c if c.is_ascii_digit() => {
                while i < chars.len()
                    && (chars[i].is_alphanumeric() || matches!(chars[i], '_' | '.'))
                {
                    i += 1;
                }
                tokens.push(Token {
                    kind: TokenKind::Literal,
                    line,
                });
            }
            c if is_ident_start(c) => {
                let start = i;
                while i < chars.len() && is_ident_part(chars[i]) {
                    i += 1;
                }
                tokens.push(Token {
                    kind: TokenKind::Ident(chars[start..i].iter().collect()),
                    line,
                });
            }
            c => {
                tokens.push(Token {
                    kind: TokenKind::Punct(c),
                    line,
                });
                i += 1;
            }
        }
    }
    Ok(tokens)
}

fn is_ident_start(c: char) -> bool {
    c.is_alphabetic() || c == '_' || c == '$'
}

fn is_ident_part(c: char) -> bool {
    c.is_alphanumeric() || c == '_' || c == '$'
}

// Returns the index just past the closing quote. Single-line literals cannot contain newlines.
fn skip_quoted(chars: &[char], mut i: usize, quote: char) -> Option<usize> {
    while let Some(&c) = chars.get(i) {
        match c {
            '\\' => i += 2,
            '\n' => return None,
            c if c == quote => return Some(i + 1),
            _ => i += 1,
        }
    }
    None
}

fn skip_text_block(chars: &[char], mut i: usize, line: &mut usize) -> Option<usize> {
    while let Some(&c) = chars.get(i) {
        match c {
            '\\' => {
                if chars.get(i + 1) == Some(&'\n') {
                    *line += 1;
                }
                i += 2;
            }
            '\n' => {
                *line += 1;
                i += 1;
            }
            '"' if chars.get(i + 1) == Some(&'"') && chars.get(i + 2) == Some(&'"') => {
                return Some(i + 3);
            }
            _ => i += 1,
        }
    }
    None
}

/// Tracks brace depth line by line, ignoring braces inside literals and comments.
#[derive(Clone, Debug, Default)]
pub struct BraceTracker {
    depth: usize,
    opened: bool,
    in_block_comment: bool,
    in_text_block: bool,
}

impl BraceTracker {
    /// Creates a tracker at depth zero.
    pub fn new() -> Self {
        Self::default()
    }

    /// Feeds one line. Returns true once the first opened brace has been closed again.
    ///
    /// Text after the closing brace on the same line is ignored.
    pub fn feed(&mut self, line: &str) -> bool {
        let chars: Vec<char> = line.chars().collect();
        let mut i = 0;
        while i < chars.len() {
            if self.in_block_comment {
                if chars[i] == '*' && chars.get(i + 1) == Some(&'/') {
                    self.in_block_comment = false;
                    i += 2;
                } else {
                    i += 1;
                }
                continue;
            }
            if self.in_text_block {
                match chars[i] {
                    '\\' => i += 2,
                    '"' if chars.get(i + 1) == Some(&'"') && chars.get(i + 2) == Some(&'"') => {
                        self.in_text_block = false;
                        i += 3;
                    }
                    _ => i += 1,
                }
                continue;
            }
            match chars[i] {
                '/' if chars.get(i + 1) == Some(&'/') => break,
                '/' if chars.get(i + 1) == Some(&'*') => {
                    self.in_block_comment = true;
                    i += 2;
                }
                '"' if chars.get(i + 1) == Some(&'"') && chars.get(i + 2) == Some(&'"') => {
                    self.in_text_block = true;
                    i += 3;
                }
                quote @ ('"' | '\'') => {
                    // An unterminated literal runs to the end of the line.
                    i = skip_quoted(&chars, i + 1, quote).unwrap_or(chars.len());
                }
                '{' => {
                    self.depth += 1;
                    self.opened = true;
                    i += 1;
                }
                '}' => {
                    self.depth = self.depth.saturating_sub(1);
                    i += 1;
                    if self.opened && self.depth == 0 {
                        return true;
                    }
                }
                _ => i += 1,
            }
        }
        false
    }

    /// Returns true if at least one brace has been opened.
    pub fn opened(&self) -> bool {
        self.opened
    }
}
