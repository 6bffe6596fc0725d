//! Character stream → token stream (`spec.md` §4.1).

use crate::error::{LexError, LexErrorKind};
use crate::token::{keyword_kind, Token, TokenKind};

pub struct Lexer<'a> {
    source: &'a [u8],
    pos: usize,
    line: u32,
    column: u32,
}

impl<'a> Lexer<'a> {
    pub fn new(source: &'a str) -> Self {
        Self {
            source: source.as_bytes(),
            pos: 0,
            line: 1,
            column: 1,
        }
    }

    /// Lexes the entire source, returning the token sequence terminated by
    /// `Eof`, or the first error encountered.
    pub fn tokenize(mut self) -> Result<Vec<Token>, LexError> {
        let mut tokens = Vec::new();
        loop {
            let token = self.next_token()?;
            let is_eof = token.kind == TokenKind::Eof;
            tokens.push(token);
            if is_eof {
                break;
            }
        }
        Ok(tokens)
    }

    fn peek(&self) -> Option<u8> {
        self.source.get(self.pos).copied()
    }

    fn peek_at(&self, offset: usize) -> Option<u8> {
        self.source.get(self.pos + offset).copied()
    }

    fn advance(&mut self) -> Option<u8> {
        let ch = self.peek()?;
        self.pos += 1;
        if ch == b'\n' {
            self.line += 1;
            self.column = 1;
        } else {
            // Tabs advance one column, like any other character (spec.md §4.1).
            self.column += 1;
        }
        Some(ch)
    }

    fn skip_whitespace_and_comments(&mut self) {
        loop {
            match self.peek() {
                Some(c) if c.is_ascii_whitespace() => {
                    self.advance();
                }
                Some(b'/') if self.peek_at(1) == Some(b'/') => {
                    while self.peek().is_some() && self.peek() != Some(b'\n') {
                        self.advance();
                    }
                }
                Some(b'/') if self.peek_at(1) == Some(b'*') => {
                    self.advance();
                    self.advance();
                    while !(self.peek() == Some(b'*') && self.peek_at(1) == Some(b'/')) {
                        if self.advance().is_none() {
                            break;
                        }
                    }
                    self.advance();
                    self.advance();
                }
                _ => break,
            }
        }
    }

    fn next_token(&mut self) -> Result<Token, LexError> {
        self.skip_whitespace_and_comments();
        let (line, column) = (self.line, self.column);

        let Some(c) = self.peek() else {
            return Ok(Token::new(TokenKind::Eof, "", line, column));
        };

        if c.is_ascii_digit() {
            return self.lex_number(line, column);
        }
        if c == b'_' || c.is_ascii_alphabetic() {
            return Ok(self.lex_identifier(line, column));
        }
        if c == b'"' || c == b'\'' {
            return self.lex_string(c, line, column);
        }

        self.lex_operator(line, column)
    }

    fn lex_identifier(&mut self, line: u32, column: u32) -> Token {
        let start = self.pos;
        while matches!(self.peek(), Some(c) if c == b'_' || c.is_ascii_alphanumeric()) {
            self.advance();
        }
        let text = String::from_utf8_lossy(&self.source[start..self.pos]).into_owned();

        let kind = match text.as_str() {
            "true" => TokenKind::BoolLiteral(true),
            "false" => TokenKind::BoolLiteral(false),
            _ => keyword_kind(&text).unwrap_or_else(|| TokenKind::Identifier(text.clone())),
        };
        Token::new(kind, text, line, column)
    }

    fn lex_number(&mut self, line: u32, column: u32) -> Result<Token, LexError> {
        let start = self.pos;
        while matches!(self.peek(), Some(c) if c.is_ascii_digit()) {
            self.advance();
        }
        let mut is_float = false;
        if self.peek() == Some(b'.') && matches!(self.peek_at(1), Some(c) if c.is_ascii_digit()) {
            is_float = true;
            self.advance();
            while matches!(self.peek(), Some(c) if c.is_ascii_digit()) {
                self.advance();
            }
        }
        let digits = String::from_utf8_lossy(&self.source[start..self.pos]).into_owned();

        if matches!(self.peek(), Some(b'f') | Some(b'F')) {
            is_float = true;
            self.advance();
        }

        let kind = if is_float {
            TokenKind::FloatLiteral(digits.parse().unwrap_or(0.0))
        } else {
            TokenKind::IntLiteral(digits.parse().unwrap_or(0))
        };
        Ok(Token::new(kind, digits, line, column))
    }

    fn lex_string(&mut self, quote: u8, line: u32, column: u32) -> Result<Token, LexError> {
        self.advance(); // opening quote
        let mut value = String::new();
        loop {
            match self.peek() {
                None => {
                    return Err(LexError {
                        kind: LexErrorKind::UnterminatedString,
                        line,
                        column,
                    })
                }
                Some(c) if c == quote => {
                    self.advance();
                    break;
                }
                Some(b'\\') => {
                    self.advance();
                    match self.advance() {
                        Some(b'n') => value.push('\n'),
                        Some(b't') => value.push('\t'),
                        Some(b'r') => value.push('\r'),
                        Some(c) => value.push(c as char),
                        None => {
                            return Err(LexError {
                                kind: LexErrorKind::UnterminatedString,
                                line,
                                column,
                            })
                        }
                    }
                }
                Some(_) => {
                    let ch_start = self.pos;
                    self.advance();
                    // Re-decode as UTF-8 in case of multi-byte characters.
                    let len = utf8_len(self.source[ch_start]);
                    for _ in 1..len {
                        self.advance();
                    }
                    value.push_str(&String::from_utf8_lossy(&self.source[ch_start..self.pos]));
                }
            }
        }
        Ok(Token::new(TokenKind::StringLiteral(value.clone()), value, line, column))
    }

    fn lex_operator(&mut self, line: u32, column: u32) -> Result<Token, LexError> {
        let three = (self.peek(), self.peek_at(1), self.peek_at(2));
        if three == (Some(b'<'), Some(b'<'), Some(b'=')) {
            return Ok(self.consume_op(3, TokenKind::Shl, line, column));
        }
        if three == (Some(b'>'), Some(b'>'), Some(b'=')) {
            return Ok(self.consume_op(3, TokenKind::Shr, line, column));
        }

        let two = (self.peek(), self.peek_at(1));
        let two_char_kind = match two {
            (Some(b'+'), Some(b'+')) => Some(TokenKind::PlusPlus),
            (Some(b'-'), Some(b'-')) => Some(TokenKind::MinusMinus),
            (Some(b'+'), Some(b'=')) => Some(TokenKind::PlusAssign),
            (Some(b'-'), Some(b'=')) => Some(TokenKind::MinusAssign),
            (Some(b'*'), Some(b'=')) => Some(TokenKind::StarAssign),
            (Some(b'/'), Some(b'=')) => Some(TokenKind::SlashAssign),
            (Some(b'%'), Some(b'=')) => Some(TokenKind::PercentAssign),
            (Some(b'&'), Some(b'=')) => Some(TokenKind::AmpAssign),
            (Some(b'|'), Some(b'=')) => Some(TokenKind::PipeAssign),
            (Some(b'^'), Some(b'=')) => Some(TokenKind::CaretAssign),
            (Some(b'='), Some(b'=')) => Some(TokenKind::Eq),
            (Some(b'!'), Some(b'=')) => Some(TokenKind::NotEq),
            (Some(b'<'), Some(b'=')) => Some(TokenKind::LtEq),
            (Some(b'>'), Some(b'=')) => Some(TokenKind::GtEq),
            (Some(b'&'), Some(b'&')) => Some(TokenKind::AmpAmp),
            (Some(b'|'), Some(b'|')) => Some(TokenKind::PipePipe),
            (Some(b'<'), Some(b'<')) => Some(TokenKind::Shl),
            (Some(b'>'), Some(b'>')) => Some(TokenKind::Shr),
            (Some(b':'), Some(b':')) => Some(TokenKind::ColonColon),
            (Some(b'@'), Some(b'@')) => Some(TokenKind::AtAt),
            _ => None,
        };
        if let Some(kind) = two_char_kind {
            return Ok(self.consume_op(2, kind, line, column));
        }

        let kind = match self.peek().unwrap() {
            b'(' => TokenKind::LParen,
            b')' => TokenKind::RParen,
            b'{' => TokenKind::LBrace,
            b'}' => TokenKind::RBrace,
            b'[' => TokenKind::LBracket,
            b']' => TokenKind::RBracket,
            b';' => TokenKind::Semicolon,
            b',' => TokenKind::Comma,
            b'.' => TokenKind::Dot,
            b':' => TokenKind::Colon,
            b'?' => TokenKind::Question,
            b'@' => TokenKind::At,
            b'+' => TokenKind::Plus,
            b'-' => TokenKind::Minus,
            b'*' => TokenKind::Star,
            b'/' => TokenKind::Slash,
            b'%' => TokenKind::Percent,
            b'&' => TokenKind::Amp,
            b'|' => TokenKind::Pipe,
            b'^' => TokenKind::Caret,
            b'~' => TokenKind::Tilde,
            b'!' => TokenKind::Bang,
            b'=' => TokenKind::Assign,
            b'<' => TokenKind::Lt,
            b'>' => TokenKind::Gt,
            other => {
                let ch = other as char;
                self.advance();
                return Err(LexError {
                    kind: LexErrorKind::UnexpectedChar(ch),
                    line,
                    column,
                });
            }
        };
        Ok(self.consume_op(1, kind, line, column))
    }

    fn consume_op(&mut self, len: usize, kind: TokenKind, line: u32, column: u32) -> Token {
        let start = self.pos;
        for _ in 0..len {
            self.advance();
        }
        let lexeme = String::from_utf8_lossy(&self.source[start..self.pos]).into_owned();
        Token::new(kind, lexeme, line, column)
    }
}

fn utf8_len(first_byte: u8) -> usize {
    if first_byte & 0x80 == 0 {
        1
    } else if first_byte & 0xE0 == 0xC0 {
        2
    } else if first_byte & 0xF0 == 0xE0 {
        3
    } else {
        4
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(src: &str) -> Vec<TokenKind> {
        Lexer::new(src)
            .tokenize()
            .unwrap()
            .into_iter()
            .map(|t| t.kind)
            .collect()
    }

    #[test]
    fn lexes_keywords_and_identifiers() {
        assert_eq!(
            kinds("class Foo"),
            vec![TokenKind::Class, TokenKind::Identifier("Foo".into()), TokenKind::Eof]
        );
    }

    #[test]
    fn lexes_enum_as_a_plain_identifier_not_a_keyword() {
        // Unlike `class`, `spec.md` carves `enum` out as lexing like any
        // other identifier; the parser disambiguates it by text instead.
        assert_eq!(kinds("enum"), vec![TokenKind::Identifier("enum".into()), TokenKind::Eof]);
    }

    #[test]
    fn lexes_bool_literals_not_as_identifiers() {
        assert_eq!(kinds("true false"), vec![
            TokenKind::BoolLiteral(true),
            TokenKind::BoolLiteral(false),
            TokenKind::Eof
        ]);
    }

    #[test]
    fn lexes_float_with_trailing_f() {
        assert_eq!(kinds("1.5f"), vec![TokenKind::FloatLiteral(1.5), TokenKind::Eof]);
    }

    #[test]
    fn lexes_int_without_dot() {
        assert_eq!(kinds("42"), vec![TokenKind::IntLiteral(42), TokenKind::Eof]);
    }

    #[test]
    fn lexes_handle_sigil_and_namespace_operator() {
        assert_eq!(kinds("@ ::"), vec![TokenKind::At, TokenKind::ColonColon, TokenKind::Eof]);
    }

    #[test]
    fn string_escapes_known_and_unknown() {
        let toks = Lexer::new(r#""a\nb\qc""#).tokenize().unwrap();
        assert_eq!(toks[0].kind, TokenKind::StringLiteral("a\nbqc".to_string()));
    }

    #[test]
    fn unterminated_string_is_an_error() {
        let err = Lexer::new("\"abc").tokenize().unwrap_err();
        assert_eq!(err.kind, LexErrorKind::UnterminatedString);
        assert_eq!(err.line, 1);
        assert_eq!(err.column, 1);
    }

    #[test]
    fn unexpected_character_is_an_error() {
        let err = Lexer::new("`").tokenize().unwrap_err();
        assert!(matches!(err.kind, LexErrorKind::UnexpectedChar('`')));
    }

    #[test]
    fn line_and_column_track_newlines() {
        let toks = Lexer::new("a\nb").tokenize().unwrap();
        assert_eq!(toks[0].line, 1);
        assert_eq!(toks[1].line, 2);
        assert_eq!(toks[1].column, 1);
    }

    #[test]
    fn line_comments_skipped_block_comments_count_lines() {
        let toks = Lexer::new("// hi\na /* multi\nline */ b").tokenize().unwrap();
        assert_eq!(toks[0].line, 2); // `a`
        assert_eq!(toks[1].line, 3); // `b`, after the block comment spans a newline
    }
}
