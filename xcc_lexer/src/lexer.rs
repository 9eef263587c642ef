//! Cursor-driven lexer (spec.md §4.1).
//!
//! At each non-whitespace position the `PrefixTree` is queried for the
//! longest matching fixed lexeme (keyword or operator). If nothing matches,
//! the first character classifies the token: alpha/`_` -> identifier,
//! `"` -> string, `'` -> char, digit -> number.

use crate::error::{LexError, LexResult};
use crate::position::Position;
use crate::prefix_tree::PrefixTree;
use crate::token::{NumberLiteral, Token, TokenKind};

pub struct Lexer {
    chars: Vec<char>,
    index: usize,
    pos: Position,
    tree: PrefixTree<TokenKind>,
}

impl Lexer {
    pub fn new(source: &str) -> Self {
        let mut tree = PrefixTree::new();
        for (lexeme, kind) in TokenKind::FIXED_LEXEMES {
            tree.insert(lexeme, kind.clone());
        }

        Self {
            chars: source.chars().collect(),
            index: 0,
            pos: Position::start(),
            tree,
        }
    }

    /// Tokenize the full input, terminated by a trailing `Eof` token
    /// (spec.md §4.1: "Output: an ordered token sequence terminated
    /// implicitly by end-of-input").
    pub fn tokenize(source: &str) -> LexResult<Vec<Token>> {
        let mut lexer = Lexer::new(source);
        let mut tokens = Vec::new();
        loop {
            let tok = lexer.next_token()?;
            let is_eof = tok.kind == TokenKind::Eof;
            log::trace!("token {:?} '{}' @ line {}", tok.kind, tok.text, tok.line);
            tokens.push(tok);
            if is_eof {
                break;
            }
        }
        Ok(tokens)
    }

    fn peek(&self) -> Option<char> {
        self.chars.get(self.index).copied()
    }

    fn peek_at(&self, offset: usize) -> Option<char> {
        self.chars.get(self.index + offset).copied()
    }

    fn advance(&mut self) -> Option<char> {
        let ch = self.peek()?;
        self.index += 1;
        self.pos.advance(ch);
        Some(ch)
    }

    fn skip_whitespace_and_comments(&mut self) {
        loop {
            match self.peek() {
                Some(ch) if ch.is_whitespace() => {
                    self.advance();
                }
                Some('#') => {
                    while let Some(ch) = self.peek() {
                        if ch == '\n' {
                            break;
                        }
                        self.advance();
                    }
                }
                _ => break,
            }
        }
    }

    pub fn next_token(&mut self) -> LexResult<Token> {
        self.skip_whitespace_and_comments();

        let line = self.pos.line;

        let Some(ch) = self.peek() else {
            return Ok(Token::eof(line));
        };

        if let Some((kind, len)) = self.tree.longest_match(&self.chars[self.index..]) {
            // A word-shaped lexeme (e.g. `for`) only counts as a keyword if
            // it isn't actually the prefix of a longer identifier (`forever`);
            // symbolic lexemes (`&&=`, `->`, ...) have no such ambiguity.
            let is_word_lexeme = ch.is_ascii_alphabetic() || ch == '_';
            let continues_as_identifier = matches!(
                self.peek_at(len),
                Some(next) if next.is_ascii_alphanumeric() || next == '_'
            );
            if !(is_word_lexeme && continues_as_identifier) {
                let text: String = self.chars[self.index..self.index + len].iter().collect();
                for _ in 0..len {
                    self.advance();
                }
                return Ok(Token::new(kind, text, line));
            }
        }

        if ch.is_ascii_alphabetic() || ch == '_' {
            return Ok(self.read_identifier(line));
        }
        if ch == '"' {
            return self.read_string(line);
        }
        if ch == '\'' {
            return self.read_char(line);
        }
        if ch.is_ascii_digit() {
            return self.read_number(line);
        }

        Err(LexError::new(line, format!("unexpected character '{ch}'")))
    }

    fn read_identifier(&mut self, line: usize) -> Token {
        let start = self.index;
        while matches!(self.peek(), Some(ch) if ch.is_ascii_alphanumeric() || ch == '_') {
            self.advance();
        }
        let text: String = self.chars[start..self.index].iter().collect();
        Token::new(TokenKind::Identifier, text, line)
    }

    fn read_string(&mut self, line: usize) -> LexResult<Token> {
        self.advance(); // opening quote
        let mut decoded = String::new();
        loop {
            match self.advance() {
                None | Some('\n') => {
                    return Err(LexError::new(line, "unterminated string literal"))
                }
                Some('"') => break,
                Some('\\') => decoded.push(self.read_escape(line)?),
                Some(ch) => decoded.push(ch),
            }
        }
        Ok(Token::new(TokenKind::String, decoded, line))
    }

    fn read_char(&mut self, line: usize) -> LexResult<Token> {
        self.advance(); // opening quote
        let byte = match self.advance() {
            Some('\\') => self.read_escape(line)? as u8,
            Some(ch) if ch.is_ascii() => ch as u8,
            Some(ch) => {
                return Err(LexError::new(
                    line,
                    format!("char literal byte must be ASCII, found '{ch}'"),
                ))
            }
            None => return Err(LexError::new(line, "unterminated char literal")),
        };
        match self.advance() {
            Some('\'') => Ok(Token::new(TokenKind::Char(byte), (byte as char).to_string(), line)),
            _ => Err(LexError::new(line, "unterminated char literal")),
        }
    }

    fn read_escape(&mut self, line: usize) -> LexResult<char> {
        match self.advance() {
            Some('n') => Ok('\n'),
            Some('r') => Ok('\r'),
            Some('t') => Ok('\t'),
            Some('b') => Ok('\u{8}'),
            Some('\\') => Ok('\\'),
            Some('"') => Ok('"'),
            Some('\'') => Ok('\''),
            Some('0') => Ok('\0'),
            Some(other) => Ok(other),
            None => Err(LexError::new(line, "unterminated escape sequence")),
        }
    }

    fn read_number(&mut self, line: usize) -> LexResult<Token> {
        let start = self.index;

        if self.peek() == Some('0') {
            match self.peek_at(1) {
                Some('x') | Some('X') => return self.read_based_integer(line, start, 2, 16),
                Some('b') | Some('B') => return self.read_based_integer(line, start, 2, 2),
                Some('o') | Some('O') => return self.read_based_integer(line, start, 2, 8),
                Some(d) if d.is_ascii_digit() => return self.read_based_integer(line, start, 1, 8),
                _ => {}
            }
        }

        while matches!(self.peek(), Some(ch) if ch.is_ascii_digit()) {
            self.advance();
        }

        let mut is_float = false;
        if self.peek() == Some('.') && matches!(self.peek_at(1), Some(d) if d.is_ascii_digit()) {
            is_float = true;
            self.advance();
            while matches!(self.peek(), Some(ch) if ch.is_ascii_digit()) {
                self.advance();
            }
        }

        let text: String = self.chars[start..self.index].iter().collect();
        if is_float {
            let value: f64 = text
                .parse()
                .map_err(|_| LexError::new(line, format!("invalid float literal '{text}'")))?;
            Ok(Token::new(TokenKind::Number(NumberLiteral::Floating(value)), text, line))
        } else {
            let value: i64 = text
                .parse()
                .map_err(|_| LexError::new(line, format!("invalid integer literal '{text}'")))?;
            Ok(Token::new(TokenKind::Number(NumberLiteral::Integer(value)), text, line))
        }
    }

    fn read_based_integer(
        &mut self,
        line: usize,
        start: usize,
        prefix_len: usize,
        radix: u32,
    ) -> LexResult<Token> {
        for _ in 0..prefix_len {
            self.advance();
        }
        let digits_start = self.index;
        while matches!(self.peek(), Some(ch) if ch.is_digit(radix)) {
            self.advance();
        }
        if self.index == digits_start {
            return Err(LexError::new(line, "base-prefixed literal has no digits"));
        }
        let digits: String = self.chars[digits_start..self.index].iter().collect();
        let value = i64::from_str_radix(&digits, radix)
            .map_err(|_| LexError::new(line, format!("invalid base-{radix} literal '{digits}'")))?;
        let text: String = self.chars[start..self.index].iter().collect();
        Ok(Token::new(TokenKind::Number(NumberLiteral::Integer(value)), text, line))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use proptest::prelude::*;
    use test_case::test_case;

    fn kinds(src: &str) -> Vec<TokenKind> {
        Lexer::tokenize(src)
            .unwrap()
            .into_iter()
            .map(|t| t.kind)
            .collect()
    }

    #[test]
    fn lexes_keyword_and_identifier() {
        let ks = kinds("fn main");
        assert_eq!(ks, vec![TokenKind::Fn, TokenKind::Identifier, TokenKind::Eof]);
    }

    #[test]
    fn longest_match_prefers_compound_operators() {
        let ks = kinds("&&= &&  &  &=");
        assert_eq!(
            ks,
            vec![
                TokenKind::AndAndAssign,
                TokenKind::AndAnd,
                TokenKind::Amp,
                TokenKind::AmpAssign,
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn lexes_decimal_hex_binary_octal_and_float() {
        let toks = Lexer::tokenize("10 0x1F 0b101 0o17 2.5").unwrap();
        let nums: Vec<NumberLiteral> = toks
            .into_iter()
            .filter_map(|t| match t.kind {
                TokenKind::Number(n) => Some(n),
                _ => None,
            })
            .collect();
        assert_eq!(
            nums,
            vec![
                NumberLiteral::Integer(10),
                NumberLiteral::Integer(31),
                NumberLiteral::Integer(5),
                NumberLiteral::Integer(15),
                NumberLiteral::Floating(2.5),
            ]
        );
    }

    #[test]
    fn legacy_octal_prefix_with_leading_zero() {
        let toks = Lexer::tokenize("017").unwrap();
        assert_eq!(toks[0].kind, TokenKind::Number(NumberLiteral::Integer(15)));
    }

    #[test]
    fn decodes_string_escapes() {
        let toks = Lexer::tokenize("\"a\\nb\"").unwrap();
        assert_eq!(toks[0].kind, TokenKind::String);
        assert_eq!(toks[0].text, "a\nb");
    }

    #[test]
    fn char_literal_is_single_byte() {
        let toks = Lexer::tokenize("'x'").unwrap();
        assert_eq!(toks[0].kind, TokenKind::Char(b'x'));
    }

    #[test]
    fn unterminated_string_is_lex_error() {
        let err = Lexer::tokenize("\"abc").unwrap_err();
        assert_eq!(err.line, 1);
    }

    #[test]
    fn comment_runs_to_end_of_line() {
        let ks = kinds("fn # comment here\nmain");
        assert_eq!(ks, vec![TokenKind::Fn, TokenKind::Identifier, TokenKind::Eof]);
    }

    #[test]
    fn tracks_line_numbers_across_newlines() {
        let toks = Lexer::tokenize("fn\nmain").unwrap();
        assert_eq!(toks[0].line, 1);
        assert_eq!(toks[1].line, 2);
    }

    #[test]
    fn keyword_prefixed_identifiers_lex_as_one_identifier() {
        // "forever", "ifCondition", "selfRef" must not split into a
        // keyword token plus a trailing identifier.
        let ks = kinds("forever ifCondition selfRef variable");
        assert_eq!(
            ks,
            vec![
                TokenKind::Identifier,
                TokenKind::Identifier,
                TokenKind::Identifier,
                TokenKind::Identifier,
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn bare_keyword_still_lexes_as_keyword_at_word_boundary() {
        let ks = kinds("for (x)");
        assert_eq!(ks[0], TokenKind::For);
    }

    #[test_case("+", TokenKind::Plus)]
    #[test_case("-", TokenKind::Minus)]
    #[test_case("*", TokenKind::Star)]
    #[test_case("/", TokenKind::Slash)]
    #[test_case("&", TokenKind::Amp)]
    #[test_case("|", TokenKind::Pipe)]
    #[test_case("!", TokenKind::Bang)]
    #[test_case("<", TokenKind::Lt)]
    #[test_case(">", TokenKind::Gt)]
    fn single_char_operators(src: &str, expected: TokenKind) {
        assert_eq!(kinds(src), vec![expected, TokenKind::Eof]);
    }

    #[test_case("==", TokenKind::EqEq)]
    #[test_case("!=", TokenKind::NotEq)]
    #[test_case("<=", TokenKind::Le)]
    #[test_case(">=", TokenKind::Ge)]
    #[test_case("&&", TokenKind::AndAnd)]
    #[test_case("||", TokenKind::OrOr)]
    #[test_case("&&=", TokenKind::AndAndAssign)]
    #[test_case("||=", TokenKind::OrOrAssign)]
    #[test_case("->", TokenKind::Arrow)]
    #[test_case("...", TokenKind::Ellipsis)]
    fn multi_char_operators(src: &str, expected: TokenKind) {
        assert_eq!(kinds(src), vec![expected, TokenKind::Eof]);
    }

    #[test_case("0x1F", 31)]
    #[test_case("0b101", 5)]
    #[test_case("0o17", 15)]
    #[test_case("017", 15)]
    #[test_case("42", 42)]
    fn integer_literal_bases(src: &str, expected: i64) {
        let toks = Lexer::tokenize(src).unwrap();
        assert_eq!(toks[0].kind, TokenKind::Number(NumberLiteral::Integer(expected)));
    }

    proptest::proptest! {
        // Invariant 1 (spec.md §8): tokenizing never panics, and re-lexing
        // a rendered sequence of identifiers/operators/numbers recovers the
        // same kind sequence the pieces were built from.
        #[test]
        fn tokenizing_never_panics(src in ".{0,64}") {
            let _ = Lexer::tokenize(&src);
        }

        #[test]
        fn rendered_identifier_sequence_round_trips(
            idents in proptest::collection::vec(
                "[a-zA-Z_][a-zA-Z0-9_]{0,8}".prop_filter(
                    "must not collide with a reserved keyword",
                    |s| !TokenKind::FIXED_LEXEMES.iter().any(|(lexeme, _)| lexeme == s),
                ),
                1..8,
            )
        ) {
            let rendered = idents.join(" ");
            let ks = kinds(&rendered);
            let expected: Vec<TokenKind> = idents
                .iter()
                .map(|_| TokenKind::Identifier)
                .chain(std::iter::once(TokenKind::Eof))
                .collect();
            proptest::prop_assert_eq!(ks, expected);
        }
    }
}
