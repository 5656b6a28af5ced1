//! Lexer: UTF-8 source text to a flat token stream terminated by `eof`.
//!
//! Newlines are significant and emitted as tokens; all other whitespace is
//! skipped. No INDENT/DEDENT tokens exist — the parser delimits blocks from
//! the 1-indexed column carried on every token. `#` starts a line comment.

use crate::error::{LexError, LexErrorKind};
use crate::token::{keyword_kind, Token, TokenKind};

pub struct Lexer<'a> {
    source: &'a str,
    bytes: &'a [u8],
    pos: usize,
    line: u32,
    col: u32,
}

impl<'a> Lexer<'a> {
    pub fn new(source: &'a str) -> Self {
        Lexer {
            source,
            bytes: source.as_bytes(),
            pos: 0,
            line: 1,
            col: 1,
        }
    }

    /// Consume the whole input and return its token stream. The stream
    /// always ends with exactly one `Eof` token.
    pub fn tokenize(mut self) -> Result<Vec<Token<'a>>, LexError> {
        let mut tokens = Vec::new();

        while self.pos < self.bytes.len() {
            let byte = self.bytes[self.pos];
            match byte {
                b' ' | b'\t' | b'\r' => self.bump(),
                b'#' => {
                    // Comment runs to, but not including, the next newline.
                    while self.pos < self.bytes.len() && self.bytes[self.pos] != b'\n' {
                        self.bump();
                    }
                }
                b'\n' => {
                    tokens.push(self.token_at(TokenKind::Newline, self.pos, self.pos + 1));
                    self.bump();
                }
                b'"' => tokens.push(self.read_string()?),
                b'0'..=b'9' => tokens.push(self.read_number()),
                b'a'..=b'z' | b'A'..=b'Z' | b'_' => tokens.push(self.read_word()),
                _ => tokens.push(self.read_operator()?),
            }
        }

        tokens.push(Token::new(TokenKind::Eof, "", self.line, self.col));
        Ok(tokens)
    }

    /// Advance one byte, keeping line/col in sync. Every consumed byte
    /// advances the column by one; a newline resets it.
    fn bump(&mut self) {
        if self.bytes[self.pos] == b'\n' {
            self.line += 1;
            self.col = 1;
        } else {
            self.col += 1;
        }
        self.pos += 1;
    }

    fn peek(&self, offset: usize) -> u8 {
        self.bytes.get(self.pos + offset).copied().unwrap_or(0)
    }

    /// Build a token whose lexeme is `source[start..end]`, positioned at the
    /// current line and the column where `start` begins.
    fn token_at(&self, kind: TokenKind, start: usize, end: usize) -> Token<'a> {
        Token::new(kind, &self.source[start..end], self.line, self.col)
    }

    fn read_word(&mut self) -> Token<'a> {
        let start = self.pos;
        let (line, col) = (self.line, self.col);
        while matches!(self.peek(0), b'a'..=b'z' | b'A'..=b'Z' | b'0'..=b'9' | b'_') {
            self.bump();
        }
        let lexeme = &self.source[start..self.pos];
        let kind = keyword_kind(lexeme).unwrap_or(TokenKind::Name);
        Token::new(kind, lexeme, line, col)
    }

    fn read_number(&mut self) -> Token<'a> {
        let start = self.pos;
        let (line, col) = (self.line, self.col);
        while self.peek(0).is_ascii_digit() {
            self.bump();
        }
        // A dot continues the literal only when a digit follows, so `1..3`
        // stays an integer followed by a range token.
        let mut kind = TokenKind::Int;
        if self.peek(0) == b'.' && self.peek(1).is_ascii_digit() {
            self.bump();
            while self.peek(0).is_ascii_digit() {
                self.bump();
            }
            kind = TokenKind::Float;
        }
        Token::new(kind, &self.source[start..self.pos], line, col)
    }

    fn read_string(&mut self) -> Result<Token<'a>, LexError> {
        let (line, col) = (self.line, self.col);
        self.bump(); // opening quote
        let start = self.pos;
        loop {
            match self.peek(0) {
                0 if self.pos >= self.bytes.len() => {
                    return Err(LexError { kind: LexErrorKind::UnterminatedString, line, col });
                }
                b'"' => break,
                b'\\' => {
                    // Escapes are not interpreted: skip the backslash and
                    // whatever byte follows, carrying the raw text through.
                    self.bump();
                    if self.pos >= self.bytes.len() {
                        return Err(LexError { kind: LexErrorKind::UnterminatedString, line, col });
                    }
                    self.bump();
                }
                _ => self.bump(),
            }
        }
        let lexeme = &self.source[start..self.pos];
        self.bump(); // closing quote
        Ok(Token::new(TokenKind::StrLit, lexeme, line, col))
    }

    fn read_operator(&mut self) -> Result<Token<'a>, LexError> {
        let start = self.pos;
        let (line, col) = (self.line, self.col);

        // Two-character operators are matched greedily before the
        // single-character fallbacks.
        let two = (self.peek(0), self.peek(1));
        let kind = match two {
            (b'=', b'=') => Some(TokenKind::EqEq),
            (b'!', b'=') => Some(TokenKind::NotEq),
            (b'<', b'=') => Some(TokenKind::LtEq),
            (b'>', b'=') => Some(TokenKind::GtEq),
            _ => None,
        };
        if let Some(kind) = kind {
            self.bump();
            self.bump();
            return Ok(Token::new(kind, &self.source[start..self.pos], line, col));
        }

        if two == (b'.', b'.') {
            self.bump();
            self.bump();
            let kind = if self.peek(0) == b'=' {
                self.bump();
                TokenKind::DotDotEq
            } else {
                TokenKind::DotDot
            };
            return Ok(Token::new(kind, &self.source[start..self.pos], line, col));
        }

        let kind = match self.peek(0) {
            b'(' => TokenKind::LParen,
            b')' => TokenKind::RParen,
            b'[' => TokenKind::LBracket,
            b']' => TokenKind::RBracket,
            b'{' => TokenKind::LBrace,
            b'}' => TokenKind::RBrace,
            b',' => TokenKind::Comma,
            b'.' => TokenKind::Dot,
            b':' => TokenKind::Colon,
            b'!' => TokenKind::Bang,
            b'+' => TokenKind::Plus,
            b'-' => TokenKind::Minus,
            b'*' => TokenKind::Star,
            b'/' => TokenKind::Slash,
            b'%' => TokenKind::Percent,
            b'<' => TokenKind::Lt,
            b'>' => TokenKind::Gt,
            _ => {
                let c = self.source[self.pos..].chars().next().unwrap_or('\u{fffd}');
                return Err(LexError {
                    kind: LexErrorKind::UnexpectedCharacter(c),
                    line,
                    col,
                });
            }
        };
        self.bump();
        Ok(Token::new(kind, &self.source[start..self.pos], line, col))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(source: &str) -> Vec<TokenKind> {
        Lexer::new(source)
            .tokenize()
            .unwrap()
            .into_iter()
            .map(|t| t.kind)
            .collect()
    }

    #[test]
    fn lexes_simple_assignment() {
        assert_eq!(
            kinds("set age to 41"),
            vec![TokenKind::Set, TokenKind::Name, TokenKind::To, TokenKind::Int, TokenKind::Eof]
        );
    }

    #[test]
    fn newlines_are_tokens_and_whitespace_is_not() {
        assert_eq!(
            kinds("set x to 1\n\tprint(x)\r\n"),
            vec![
                TokenKind::Set,
                TokenKind::Name,
                TokenKind::To,
                TokenKind::Int,
                TokenKind::Newline,
                TokenKind::Name,
                TokenKind::LParen,
                TokenKind::Name,
                TokenKind::RParen,
                TokenKind::Newline,
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn stream_ends_in_exactly_one_eof() {
        let tokens = Lexer::new("set x to 1").tokenize().unwrap();
        let eofs = tokens.iter().filter(|t| t.kind == TokenKind::Eof).count();
        assert_eq!(eofs, 1);
        assert_eq!(tokens.last().unwrap().kind, TokenKind::Eof);
    }

    #[test]
    fn every_lexeme_respells_the_source() {
        let source = "set nums to [1, 2, 3]\nloop for n in nums\n    print(n) # show it\n";
        let tokens = Lexer::new(source).tokenize().unwrap();
        for token in &tokens {
            if token.kind != TokenKind::Eof {
                assert!(source.contains(token.lexeme), "lexeme {:?} not in source", token.lexeme);
            }
        }
    }

    #[test]
    fn tracks_lines_and_columns() {
        let tokens = Lexer::new("set i to 0\n    print(i)").tokenize().unwrap();
        let print = tokens.iter().find(|t| t.lexeme == "print").unwrap();
        assert_eq!((print.line, print.col), (2, 5));
        let i = tokens.iter().rfind(|t| t.lexeme == "i").unwrap();
        assert_eq!((i.line, i.col), (2, 11));
    }

    #[test]
    fn comments_run_to_end_of_line() {
        assert_eq!(
            kinds("set x to 1 # the answer\nset y to 2"),
            vec![
                TokenKind::Set,
                TokenKind::Name,
                TokenKind::To,
                TokenKind::Int,
                TokenKind::Newline,
                TokenKind::Set,
                TokenKind::Name,
                TokenKind::To,
                TokenKind::Int,
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn string_lexeme_excludes_quotes_and_keeps_escapes_raw() {
        let tokens = Lexer::new("set s to \"a\\\"b\\n\"").tokenize().unwrap();
        let lit = tokens.iter().find(|t| t.kind == TokenKind::StrLit).unwrap();
        assert_eq!(lit.lexeme, "a\\\"b\\n");
    }

    #[test]
    fn unterminated_string_is_fatal() {
        let err = Lexer::new("set s to \"oops").tokenize().unwrap_err();
        assert_eq!(err.kind, LexErrorKind::UnterminatedString);
        assert_eq!((err.line, err.col), (1, 10));
    }

    #[test]
    fn unexpected_character_is_fatal() {
        let err = Lexer::new("set x to @").tokenize().unwrap_err();
        assert_eq!(err.kind, LexErrorKind::UnexpectedCharacter('@'));
    }

    #[test]
    fn two_character_operators_match_greedily() {
        assert_eq!(
            kinds("a <= b >= c == d != e"),
            vec![
                TokenKind::Name,
                TokenKind::LtEq,
                TokenKind::Name,
                TokenKind::GtEq,
                TokenKind::Name,
                TokenKind::EqEq,
                TokenKind::Name,
                TokenKind::NotEq,
                TokenKind::Name,
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn floats_and_ranges_disambiguate_on_the_dot() {
        assert_eq!(kinds("1.5"), vec![TokenKind::Float, TokenKind::Eof]);
        assert_eq!(
            kinds("1..5"),
            vec![TokenKind::Int, TokenKind::DotDot, TokenKind::Int, TokenKind::Eof]
        );
        assert_eq!(
            kinds("1..=5"),
            vec![TokenKind::Int, TokenKind::DotDotEq, TokenKind::Int, TokenKind::Eof]
        );
    }

    #[test]
    fn error_union_type_spelling_lexes() {
        assert_eq!(
            kinds("i32!str"),
            vec![TokenKind::I32, TokenKind::Bang, TokenKind::Str, TokenKind::Eof]
        );
    }
}
