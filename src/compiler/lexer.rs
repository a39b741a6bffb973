//! Lexer for the stack-language source surface (spec.md §6.2).
//!
//! Grounded in `examples/myuon-moca/src/compiler/lexer.rs` for overall
//! shape (char_indices-based scanner, `Span`, `Token`/`TokenKind`), and in
//! `examples/original_source/bootstrap/lexer/{lexer,token}.go` for the
//! token set itself (words are maximal runs of alphanumeric/`_`/leading
//! `-`, classified afterwards rather than matched character-by-character).

use crate::compiler::error::CompileError;

/// Source location information.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Span {
    pub line: usize,
    pub column: usize,
}

impl Span {
    pub fn new(line: usize, column: usize) -> Self {
        Self { line, column }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum TokenKind {
    Ident(String),
    /// Raw literal text including any sign and type suffix, e.g. `42u8`,
    /// `0x2Au32`, `-5i8`. Parsed and range-checked by the parser.
    Number(String),
    Str(String),
    Char(String),

    Fun,
    Let,
    If,
    Else,
    Import,
    Type,

    DotUnwrap,
    DotWrap,
    DotAddr,
    DotReturn,

    Colon,
    Semicolon,
    Comma,
    Equals,
    Hash,
    LParen,
    RParen,
    LBrace,
    RBrace,

    Eof,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Token {
    pub kind: TokenKind,
    pub span: Span,
}

impl Token {
    pub fn new(kind: TokenKind, span: Span) -> Self {
        Self { kind, span }
    }
}

pub struct Lexer<'a> {
    filename: &'a str,
    source: &'a str,
    chars: std::iter::Peekable<std::str::CharIndices<'a>>,
    line: usize,
    column: usize,
}

impl<'a> Lexer<'a> {
    pub fn new(filename: &'a str, source: &'a str) -> Self {
        Self {
            filename,
            source,
            chars: source.char_indices().peekable(),
            line: 1,
            column: 1,
        }
    }

    pub fn scan_tokens(&mut self) -> Result<Vec<Token>, CompileError> {
        let mut tokens = Vec::new();
        loop {
            self.skip_whitespace_and_comments();
            let span = Span::new(self.line, self.column);

            let Some((_, ch)) = self.peek() else {
                tokens.push(Token::new(TokenKind::Eof, span));
                break;
            };

            let kind = match ch {
                ':' => { self.advance(); TokenKind::Colon }
                ';' => { self.advance(); TokenKind::Semicolon }
                ',' => { self.advance(); TokenKind::Comma }
                '=' => { self.advance(); TokenKind::Equals }
                '#' => { self.advance(); TokenKind::Hash }
                '(' => { self.advance(); TokenKind::LParen }
                ')' => { self.advance(); TokenKind::RParen }
                '{' => { self.advance(); TokenKind::LBrace }
                '}' => { self.advance(); TokenKind::RBrace }
                '"' => self.scan_string(span)?,
                '\'' => self.scan_char(span)?,
                '.' => self.scan_dot_form(span)?,
                '-' => self.scan_number(span)?,
                '0'..='9' => self.scan_number(span)?,
                c if c.is_ascii_alphabetic() || c == '_' => self.scan_word(),
                other => {
                    return Err(self.error(span, &format!("unexpected character '{}'", other)))
                }
            };

            tokens.push(Token::new(kind, span));
        }
        Ok(tokens)
    }

    fn peek(&mut self) -> Option<(usize, char)> {
        self.chars.peek().copied()
    }

    fn advance(&mut self) -> Option<(usize, char)> {
        let result = self.chars.next();
        if let Some((_, ch)) = result {
            if ch == '\n' {
                self.line += 1;
                self.column = 1;
            } else {
                self.column += 1;
            }
        }
        result
    }

    fn skip_whitespace_and_comments(&mut self) {
        loop {
            match self.peek() {
                Some((_, ' ' | '\t' | '\r' | '\n')) => {
                    self.advance();
                }
                Some((_, '/')) => {
                    let mut lookahead = self.chars.clone();
                    lookahead.next();
                    if lookahead.peek().map(|(_, c)| *c) == Some('/') {
                        self.advance();
                        self.advance();
                        while let Some((_, ch)) = self.peek() {
                            if ch == '\n' {
                                break;
                            }
                            self.advance();
                        }
                    } else {
                        break;
                    }
                }
                _ => break,
            }
        }
    }

    /// Words are maximal runs of `[0-9a-zA-Z_]`, optionally led by a single
    /// `-`; classified afterwards by their first character.
    fn scan_word(&mut self) -> TokenKind {
        let start = self.peek().map(|(i, _)| i).unwrap_or(self.source.len());
        while let Some((_, ch)) = self.peek() {
            if ch.is_ascii_alphanumeric() || ch == '_' {
                self.advance();
            } else {
                break;
            }
        }
        let end = self.peek().map(|(i, _)| i).unwrap_or(self.source.len());
        let word = &self.source[start..end];
        match word {
            "fun" => TokenKind::Fun,
            "let" => TokenKind::Let,
            "if" => TokenKind::If,
            "else" => TokenKind::Else,
            "import" => TokenKind::Import,
            "type" => TokenKind::Type,
            _ => TokenKind::Ident(word.to_string()),
        }
    }

    fn scan_number(&mut self, span: Span) -> Result<TokenKind, CompileError> {
        let start = self.peek().map(|(i, _)| i).unwrap_or(self.source.len());
        if self.peek().map(|(_, c)| c) == Some('-') {
            self.advance();
        }
        while let Some((_, ch)) = self.peek() {
            if ch.is_ascii_alphanumeric() || ch == '_' {
                self.advance();
            } else {
                break;
            }
        }
        let end = self.peek().map(|(i, _)| i).unwrap_or(self.source.len());
        let text = &self.source[start..end];
        if text.is_empty() || text == "-" {
            return Err(self.error(span, "malformed number literal"));
        }
        Ok(TokenKind::Number(text.to_string()))
    }

    fn scan_string(&mut self, span: Span) -> Result<TokenKind, CompileError> {
        self.advance(); // opening quote
        let mut content = String::new();
        loop {
            match self.advance() {
                None => return Err(self.error(span, "unterminated string literal")),
                Some((_, '"')) => break,
                Some((_, '\\')) => match self.advance() {
                    Some((_, '\\')) => content.push('\\'),
                    Some((_, 'n')) => content.push('\n'),
                    Some((_, 'r')) => content.push('\r'),
                    Some((_, 't')) => content.push('\t'),
                    Some((_, '"')) => content.push('"'),
                    Some((_, other)) => {
                        return Err(self.error(span, &format!("invalid escape '\\{}'", other)))
                    }
                    None => return Err(self.error(span, "unterminated string literal")),
                },
                Some((_, ch)) => content.push(ch),
            }
        }
        Ok(TokenKind::Str(content))
    }

    fn scan_char(&mut self, span: Span) -> Result<TokenKind, CompileError> {
        self.advance(); // opening quote
        let mut content = String::new();
        loop {
            match self.advance() {
                None => return Err(self.error(span, "unterminated char literal")),
                Some((_, '\'')) => break,
                Some((_, '\\')) => match self.advance() {
                    Some((_, '\\')) => content.push('\\'),
                    Some((_, 'n')) => content.push('\n'),
                    Some((_, 'r')) => content.push('\r'),
                    Some((_, 't')) => content.push('\t'),
                    Some((_, '\'')) => content.push('\''),
                    Some((_, other)) => {
                        return Err(self.error(span, &format!("invalid escape '\\{}'", other)))
                    }
                    None => return Err(self.error(span, "unterminated char literal")),
                },
                Some((_, ch)) => content.push(ch),
            }
        }
        Ok(TokenKind::Char(content))
    }

    fn scan_dot_form(&mut self, span: Span) -> Result<TokenKind, CompileError> {
        self.advance(); // '.'
        let start = self.peek().map(|(i, _)| i).unwrap_or(self.source.len());
        while let Some((_, ch)) = self.peek() {
            if ch.is_ascii_alphabetic() {
                self.advance();
            } else {
                break;
            }
        }
        let end = self.peek().map(|(i, _)| i).unwrap_or(self.source.len());
        let word = &self.source[start..end];
        match word {
            "unwrap" => Ok(TokenKind::DotUnwrap),
            "wrap" => Ok(TokenKind::DotWrap),
            "addr" => Ok(TokenKind::DotAddr),
            "return" => Ok(TokenKind::DotReturn),
            other => Err(self.error(span, &format!("unknown prefixed form '.{}'", other))),
        }
    }

    fn error(&self, span: Span, message: &str) -> CompileError {
        CompileError::LexError {
            message: message.to_string(),
            file: self.filename.to_string(),
            line: span.line,
            column: span.column,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(src: &str) -> Vec<TokenKind> {
        let mut l = Lexer::new("t.stk", src);
        l.scan_tokens().unwrap().into_iter().map(|t| t.kind).collect()
    }

    #[test]
    fn punctuation_and_keywords() {
        assert_eq!(
            kinds("fun let if else import type : ; , = # ( ) { }"),
            vec![
                TokenKind::Fun,
                TokenKind::Let,
                TokenKind::If,
                TokenKind::Else,
                TokenKind::Import,
                TokenKind::Type,
                TokenKind::Colon,
                TokenKind::Semicolon,
                TokenKind::Comma,
                TokenKind::Equals,
                TokenKind::Hash,
                TokenKind::LParen,
                TokenKind::RParen,
                TokenKind::LBrace,
                TokenKind::RBrace,
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn numbers_with_suffixes_and_bases() {
        assert_eq!(
            kinds("42u8 0x2Au32 0b101u8 -5i8"),
            vec![
                TokenKind::Number("42u8".into()),
                TokenKind::Number("0x2Au32".into()),
                TokenKind::Number("0b101u8".into()),
                TokenKind::Number("-5i8".into()),
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn string_and_char_escapes() {
        assert_eq!(
            kinds(r#""a\nb\"c" 'x' '\t'"#),
            vec![
                TokenKind::Str("a\nb\"c".into()),
                TokenKind::Char("x".into()),
                TokenKind::Char("\t".into()),
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn dot_prefixed_forms() {
        assert_eq!(
            kinds(".unwrap .wrap .addr .return"),
            vec![
                TokenKind::DotUnwrap,
                TokenKind::DotWrap,
                TokenKind::DotAddr,
                TokenKind::DotReturn,
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn line_comment_is_skipped() {
        assert_eq!(
            kinds("1u8 // comment here\n2u8"),
            vec![
                TokenKind::Number("1u8".into()),
                TokenKind::Number("2u8".into()),
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn unterminated_string_is_lex_error() {
        let mut l = Lexer::new("t.stk", "\"abc");
        assert!(l.scan_tokens().is_err());
    }
}
