// Copyright (c) The nio-inspector Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

use super::lexer::{Token, TokenKind, tokenize};
use crate::errors::JavaParseError;

/// Parses Java source into a tree of declarations.
pub trait DeclarationParser {
    /// Parses a single compilation unit.
    fn parse(&self, source: &str) -> Result<CompilationUnit, JavaParseError>;
}

/// The parsed structure of one source file.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct CompilationUnit {
    /// The package name, if declared.
    pub package: Option<String>,

    /// Top-level type declarations, in source order.
    pub types: Vec<Declaration>,
}

/// A declaration with the 1-based, inclusive line range it spans.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Declaration {
    /// What kind of declaration this is.
    pub kind: DeclarationKind,

    /// The simple name.
    pub name: String,

    /// Modifier keywords such as `public` or `static`.
    pub modifiers: Vec<String>,

    /// The first line, including leading annotations.
    pub start_line: usize,

    /// The last line.
    pub end_line: usize,

    /// Nested types, methods and constructors. Always empty for methods and constructors.
    pub members: Vec<Declaration>,
}

impl Declaration {
    /// Returns true if the declaration has the given modifier.
    pub fn has_modifier(&self, modifier: &str) -> bool {
        self.modifiers.iter().any(|m| m == modifier)
    }
}

/// The kinds of declaration the parser reports.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub enum DeclarationKind {
    /// `class`
    Class,
    /// `interface`
    Interface,
    /// `enum`
    Enum,
    /// `record`
    Record,
    /// `@interface`
    Annotation,
    /// A method.
    Method,
    /// A constructor.
    Constructor,
}

impl DeclarationKind {
    /// Returns true for type declarations.
    pub fn is_type(self) -> bool {
        !matches!(self, Self::Method | Self::Constructor)
    }
}

/// The built-in Java declaration parser.
///
/// It only reads as much of the grammar as is needed to find type, method and constructor
/// boundaries. Bodies and initializers are skipped by bracket matching.
#[derive(Copy, Clone, Debug, Default)]
pub struct JavaDeclarationParser;

impl DeclarationParser for JavaDeclarationParser {
    fn parse(&self, source: &str) -> Result<CompilationUnit, JavaParseError> {
        let tokens = tokenize(source)?;
        Parser { tokens, pos: 0 }.compilation_unit()
    }
}

const MODIFIERS: &[&str] = &[
    "public",
    "protected",
    "private",
    "static",
    "final",
    "abstract",
    "native",
    "synchronized",
    "transient",
    "volatile",
    "strictfp",
    "default",
    "sealed",
];

struct Parser {
    tokens: Vec<Token>,
    pos: usize,
}

struct Header {
    modifiers: Vec<String>,
    start_line: usize,
}

impl Parser {
    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos)
    }

    fn peek_at(&self, offset: usize) -> Option<&Token> {
        self.tokens.get(self.pos + offset)
    }

    fn next(&mut self) -> Result<Token, JavaParseError> {
        let token = self
            .tokens
            .get(self.pos)
            .cloned()
            .ok_or_else(|| self.eof_error())?;
        self.pos += 1;
        Ok(token)
    }

    fn eof_error(&self) -> JavaParseError {
        let line = self.tokens.last().map_or(1, |token| token.line);
        JavaParseError::new(line, "unexpected end of file")
    }

    fn expect_ident(&mut self, what: &str) -> Result<String, JavaParseError> {
        let token = self.next()?;
        match token.kind {
            TokenKind::Ident(ident) => Ok(ident),
            _ => Err(JavaParseError::new(token.line, format!("expected {what}"))),
        }
    }

    fn compilation_unit(mut self) -> Result<CompilationUnit, JavaParseError> {
        let mut unit = CompilationUnit::default();
        loop {
            let Some(token) = self.peek() else {
                return Ok(unit);
            };
            if token.is_punct(';') {
                self.pos += 1;
            } else if token.is_ident("package") {
                self.pos += 1;
                unit.package = Some(self.qualified_name()?);
            } else if token.is_ident("import") {
                self.skip_past(';')?;
            } else {
                let header = self.header()?;
                // Annotations on a package declaration.
                if self.peek().is_some_and(|t| t.is_ident("package")) {
                    continue;
                }
                if !self.at_type_keyword() {
                    let line = self.peek().map_or(header.start_line, |t| t.line);
                    return Err(JavaParseError::new(line, "expected a type declaration"));
                }
                unit.types.push(self.type_declaration(header)?);
            }
        }
    }

    fn qualified_name(&mut self) -> Result<String, JavaParseError> {
        let mut name = self.expect_ident("a name")?;
        while self.peek().is_some_and(|t| t.is_punct('.')) {
            self.pos += 1;
            name.push('.');
            name.push_str(&self.expect_ident("a name")?);
        }
        self.skip_past(';')?;
        Ok(name)
    }

    // Reads annotations and modifiers.
    fn header(&mut self) -> Result<Header, JavaParseError> {
        let start_line = self.peek().ok_or_else(|| self.eof_error())?.line;
        let mut modifiers = Vec::new();
        loop {
            let Some(token) = self.peek() else {
                return Ok(Header {
                    modifiers,
                    start_line,
                });
            };
            if token.is_punct('@') && !self.peek_at(1).is_some_and(|t| t.is_ident("interface")) {
                self.pos += 1;
                self.expect_ident("an annotation name")?;
                while self.peek().is_some_and(|t| t.is_punct('.'))
                    && self.peek_at(1).is_some_and(|t| t.ident().is_some())
                {
                    self.pos += 2;
                }
                if self.peek().is_some_and(|t| t.is_punct('(')) {
                    self.skip_balanced()?;
                }
            } else if let Some(ident) = token.ident().filter(|ident| MODIFIERS.contains(ident)) {
                modifiers.push(ident.to_owned());
                self.pos += 1;
            } else if token.is_ident("non")
                && self.peek_at(1).is_some_and(|t| t.is_punct('-'))
                && self.peek_at(2).is_some_and(|t| t.is_ident("sealed"))
            {
                modifiers.push("non-sealed".to_owned());
                self.pos += 3;
            } else {
                return Ok(Header {
                    modifiers,
                    start_line,
                });
            }
        }
    }

    fn at_type_keyword(&self) -> bool {
        match self.peek() {
            Some(token) if token.is_punct('@') => {
                self.peek_at(1).is_some_and(|t| t.is_ident("interface"))
            }
            // `record` is a contextual keyword: only a declaration when followed by a name.
            Some(token) if token.is_ident("record") => {
                self.peek_at(1).is_some_and(|t| t.ident().is_some())
                    && self.peek_at(2).is_some_and(|t| t.is_punct('(') || t.is_punct('<'))
            }
            Some(token) => matches!(token.ident(), Some("class" | "interface" | "enum")),
            None => false,
        }
    }

    fn type_declaration(&mut self, header: Header) -> Result<Declaration, JavaParseError> {
        let keyword = self.next()?;
        let kind = match &keyword.kind {
            TokenKind::Punct('@') => {
                self.pos += 1;
                DeclarationKind::Annotation
            }
            TokenKind::Ident(ident) => match ident.as_str() {
                "class" => DeclarationKind::Class,
                "interface" => DeclarationKind::Interface,
                "enum" => DeclarationKind::Enum,
                "record" => DeclarationKind::Record,
                _ => return Err(JavaParseError::new(keyword.line, "expected a type keyword")),
            },
            _ => return Err(JavaParseError::new(keyword.line, "expected a type keyword")),
        };
        let name = self.expect_ident("a type name")?;

        // Type parameters, record components, extends, implements and permits.
        while !self.peek().ok_or_else(|| self.eof_error())?.is_punct('{') {
            if self.peek().is_some_and(|t| t.is_punct('(')) {
                self.skip_balanced()?;
            } else {
                self.pos += 1;
            }
        }
        self.pos += 1;

        let mut members = Vec::new();
        if kind == DeclarationKind::Enum {
            self.skip_enum_constants()?;
        }
        let end_line = self.type_body(&name, &mut members)?;

        Ok(Declaration {
            kind,
            name,
            modifiers: header.modifiers,
            start_line: header.start_line,
            end_line,
            members,
        })
    }

    // Skips enum constants, stopping after the `;` that ends them or before the closing brace.
    fn skip_enum_constants(&mut self) -> Result<(), JavaParseError> {
        loop {
            let token = self.peek().ok_or_else(|| self.eof_error())?;
            if token.is_punct('}') {
                return Ok(());
            }
            if token.is_punct(';') {
                self.pos += 1;
                return Ok(());
            }
            if token.is_punct('(') || token.is_punct('{') {
                self.skip_balanced()?;
            } else {
                self.pos += 1;
            }
        }
    }

    // Reads members up to and including the closing brace. Returns the closing brace's line.
    fn type_body(
        &mut self,
        type_name: &str,
        members: &mut Vec<Declaration>,
    ) -> Result<usize, JavaParseError> {
        loop {
            let token = self.peek().ok_or_else(|| self.eof_error())?;
            if token.is_punct('}') {
                let line = token.line;
                self.pos += 1;
                return Ok(line);
            }
            if token.is_punct(';') {
                self.pos += 1;
                continue;
            }

            let header = self.header()?;
            let token = self.peek().ok_or_else(|| self.eof_error())?;
            if token.is_punct('{') {
                // Initializer block.
                self.skip_balanced()?;
                continue;
            }
            if self.at_type_keyword() {
                members.push(self.type_declaration(header)?);
                continue;
            }
            if let Some(member) = self.member(type_name, header)? {
                members.push(member);
            }
        }
    }

    // Reads a method, constructor or field. Fields are skipped and return `None`.
    fn member(
        &mut self,
        type_name: &str,
        header: Header,
    ) -> Result<Option<Declaration>, JavaParseError> {
        if self.peek().is_some_and(|t| t.is_punct('<')) {
            self.skip_angle_brackets()?;
        }

        let mut before_name: Vec<Token> = Vec::new();
        loop {
            let token = self.peek().ok_or_else(|| self.eof_error())?.clone();
            if token.is_punct('(') {
                break;
            }
            if token.is_punct('{')
                && before_name.len() == 1
                && before_name[0].is_ident(type_name)
            {
                // Compact canonical record constructor.
                self.skip_balanced()?;
                let end_line = self.tokens[self.pos - 1].line;
                return Ok(Some(Declaration {
                    kind: DeclarationKind::Constructor,
                    name: type_name.to_owned(),
                    modifiers: header.modifiers,
                    start_line: header.start_line,
                    end_line,
                    members: Vec::new(),
                }));
            }
            if token.is_punct('=') || token.is_punct(';') {
                self.skip_field_rest()?;
                return Ok(None);
            }
            if token.is_punct('}') {
                return Err(JavaParseError::new(token.line, "unexpected `}` in member"));
            }
            if token.is_punct('<') {
                self.skip_angle_brackets()?;
                continue;
            }
            before_name.push(token);
            self.pos += 1;
        }

        let name_token = before_name
            .pop()
            .ok_or_else(|| JavaParseError::new(header.start_line, "expected a member name"))?;
        let name = name_token
            .ident()
            .ok_or_else(|| JavaParseError::new(name_token.line, "expected a member name"))?
            .to_owned();
        let kind = if before_name.is_empty() && name == type_name {
            DeclarationKind::Constructor
        } else {
            DeclarationKind::Method
        };

        self.skip_balanced()?;
        // `throws` clauses, array dimensions and annotation element defaults.
        let end_line = loop {
            let token = self.peek().ok_or_else(|| self.eof_error())?;
            if token.is_punct(';') {
                let line = token.line;
                self.pos += 1;
                break line;
            }
            if token.is_punct('{') {
                self.skip_balanced()?;
                break self.tokens[self.pos - 1].line;
            }
            if token.is_punct('(') || token.is_punct('[') {
                self.skip_balanced()?;
            } else {
                self.pos += 1;
            }
        };

        Ok(Some(Declaration {
            kind,
            name,
            modifiers: header.modifiers,
            start_line: header.start_line,
            end_line,
            members: Vec::new(),
        }))
    }

    fn skip_field_rest(&mut self) -> Result<(), JavaParseError> {
        loop {
            let token = self.peek().ok_or_else(|| self.eof_error())?;
            if token.is_punct(';') {
                self.pos += 1;
                return Ok(());
            }
            if token.is_punct('(') || token.is_punct('{') || token.is_punct('[') {
                self.skip_balanced()?;
            } else if token.is_punct('}') {
                return Err(JavaParseError::new(token.line, "unexpected `}` in field"));
            } else {
                self.pos += 1;
            }
        }
    }

    // Skips a bracketed group starting at the current `(`, `{` or `[`.
    fn skip_balanced(&mut self) -> Result<(), JavaParseError> {
        let mut stack = Vec::new();
        loop {
            let token = self.next()?;
            match token.kind {
                TokenKind::Punct(open @ ('(' | '{' | '[')) => stack.push(open),
                TokenKind::Punct(close @ (')' | '}' | ']')) => {
                    let expected = match stack.pop() {
                        Some('(') => ')',
                        Some('{') => '}',
                        Some('[') => ']',
                        _ => {
                            return Err(JavaParseError::new(
                                token.line,
                                format!("unbalanced `{close}`"),
                            ));
                        }
                    };
                    if close != expected {
                        return Err(JavaParseError::new(
                            token.line,
                            format!("expected `{expected}`, found `{close}`"),
                        ));
                    }
                    if stack.is_empty() {
                        return Ok(());
                    }
                }
                _ => {}
            }
        }
    }

    fn skip_angle_brackets(&mut self) -> Result<(), JavaParseError> {
        let mut depth = 0usize;
        loop {
            let token = self.next()?;
            if token.is_punct('<') {
                depth += 1;
            } else if token.is_punct('>') {
                depth = depth.saturating_sub(1);
                if depth == 0 {
                    return Ok(());
                }
            } else if token.is_punct('{') || token.is_punct(';') {
                return Err(JavaParseError::new(token.line, "unclosed `<`"));
            }
        }
    }

    fn skip_past(&mut self, c: char) -> Result<(), JavaParseError> {
        loop {
            if self.next()?.is_punct(c) {
                return Ok(());
            }
        }
    }
}
