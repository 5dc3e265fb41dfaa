//! Hand-rolled scanner (component J, §3.7/§4.7): one forward cursor over
//! the source text, no separate trivia stream.
//!
//! Grounded on `lexer.c`'s single-pass state machine: whitespace and
//! comments are skipped inline rather than tokenized, multi-character
//! symbols are matched longest-first, and a word is only checked against
//! the keyword table after the whole identifier has been scanned. Literal
//! suffixes (`u`, `l`, `f`) are recorded on the token so the type checker
//! can seed the literal's `Type` without re-scanning the lexeme. Unlike the
//! original's from-scratch UTF-8 string/char decoder and full hex-float
//! grammar, this scanner keeps only the literal shapes the rest of the
//! pipeline actually consumes — see DESIGN.md.

use crate::error::{CompileError, CompileResult, Location};
use crate::types::IntWidth;

#[derive(Clone, Debug, PartialEq)]
pub enum TokenKind {
    // keywords
    Break, Char, Const, Continue, Double, Else, Extern, Float, For, Goto, If,
    Int, Long, Return, Short, Sizeof, Static, Struct, Switch, Typedef, Union,
    Unsigned, Void, While,
    // symbols
    ParenOpen, ParenClose, BracketOpen, BracketClose, BraceOpen, BraceClose,
    Arrow, Comma, Colon, Semicolon, Dot, Ellipsis,
    Plus, Minus, Slash, Percent, Asterisk, Caret, Ampersand, Pipe, Question,
    PlusPlus, MinusMinus, AmpAmp, PipePipe,
    EqEq, NotEq, Lt, Gt, LtEq, GtEq, Shl, Shr,
    Eq, PlusEq, MinusEq, StarEq, SlashEq, PercentEq, AmpEq, PipeEq, CaretEq,
    ShlEq, ShrEq, Tilde, Bang,
    // special
    Identifier(String),
    StringLit(String),
    Integer { value: u64, width: IntWidth, is_unsigned: bool },
    Float { value: f64, is_single: bool },
    Eof,
}

#[derive(Clone, Debug)]
pub struct Token {
    pub kind: TokenKind,
    pub location: Location,
}

const KEYWORDS: &[(&str, TokenKind)] = &[
    ("break", TokenKind::Break),
    ("char", TokenKind::Char),
    ("const", TokenKind::Const),
    ("continue", TokenKind::Continue),
    ("double", TokenKind::Double),
    ("else", TokenKind::Else),
    ("extern", TokenKind::Extern),
    ("float", TokenKind::Float),
    ("for", TokenKind::For),
    ("goto", TokenKind::Goto),
    ("if", TokenKind::If),
    ("int", TokenKind::Int),
    ("long", TokenKind::Long),
    ("return", TokenKind::Return),
    ("short", TokenKind::Short),
    ("sizeof", TokenKind::Sizeof),
    ("static", TokenKind::Static),
    ("struct", TokenKind::Struct),
    ("switch", TokenKind::Switch),
    ("typedef", TokenKind::Typedef),
    ("union", TokenKind::Union),
    ("unsigned", TokenKind::Unsigned),
    ("void", TokenKind::Void),
    ("while", TokenKind::While),
];

/// Longest multi-character symbols first, so the greedy scan below never
/// has to backtrack — mirrors `lexer.c`'s "starts_with" table scan.
const SYMBOLS: &[(&str, TokenKind)] = &[
    ("...", TokenKind::Ellipsis),
    ("<<=", TokenKind::ShlEq),
    (">>=", TokenKind::ShrEq),
    ("->", TokenKind::Arrow),
    ("++", TokenKind::PlusPlus),
    ("--", TokenKind::MinusMinus),
    ("&&", TokenKind::AmpAmp),
    ("||", TokenKind::PipePipe),
    ("==", TokenKind::EqEq),
    ("!=", TokenKind::NotEq),
    ("<=", TokenKind::LtEq),
    (">=", TokenKind::GtEq),
    ("<<", TokenKind::Shl),
    (">>", TokenKind::Shr),
    ("+=", TokenKind::PlusEq),
    ("-=", TokenKind::MinusEq),
    ("*=", TokenKind::StarEq),
    ("/=", TokenKind::SlashEq),
    ("%=", TokenKind::PercentEq),
    ("&=", TokenKind::AmpEq),
    ("|=", TokenKind::PipeEq),
    ("^=", TokenKind::CaretEq),
    ("(", TokenKind::ParenOpen),
    (")", TokenKind::ParenClose),
    ("[", TokenKind::BracketOpen),
    ("]", TokenKind::BracketClose),
    ("{", TokenKind::BraceOpen),
    ("}", TokenKind::BraceClose),
    (",", TokenKind::Comma),
    (":", TokenKind::Colon),
    (";", TokenKind::Semicolon),
    (".", TokenKind::Dot),
    ("+", TokenKind::Plus),
    ("-", TokenKind::Minus),
    ("/", TokenKind::Slash),
    ("%", TokenKind::Percent),
    ("*", TokenKind::Asterisk),
    ("^", TokenKind::Caret),
    ("&", TokenKind::Ampersand),
    ("|", TokenKind::Pipe),
    ("?", TokenKind::Question),
    ("<", TokenKind::Lt),
    (">", TokenKind::Gt),
    ("=", TokenKind::Eq),
    ("~", TokenKind::Tilde),
    ("!", TokenKind::Bang),
];

struct Lexer<'a> {
    src: &'a [u8],
    pos: usize,
    row: u32,
    col: u32,
    file: String,
}

impl<'a> Lexer<'a> {
    fn peek(&self) -> u8 {
        self.src.get(self.pos).copied().unwrap_or(0)
    }

    fn peek_at(&self, offset: usize) -> u8 {
        self.src.get(self.pos + offset).copied().unwrap_or(0)
    }

    fn loc(&self) -> Location {
        Location {
            file: self.file.clone(),
            row: self.row,
            col: self.col,
        }
    }

    fn advance(&mut self) -> u8 {
        let c = self.peek();
        self.pos += 1;
        if c == b'\n' {
            self.row += 1;
            self.col = 0;
        } else {
            self.col += 1;
        }
        c
    }

    fn skip_trivia(&mut self) {
        loop {
            match self.peek() {
                b' ' | b'\t' | b'\r' | b'\n' => {
                    self.advance();
                }
                b'/' if self.peek_at(1) == b'/' => {
                    while self.peek() != b'\n' && self.peek() != 0 {
                        self.advance();
                    }
                }
                b'/' if self.peek_at(1) == b'*' => {
                    self.advance();
                    self.advance();
                    while !(self.peek() == b'*' && self.peek_at(1) == b'/') && self.peek() != 0 {
                        self.advance();
                    }
                    if self.peek() != 0 {
                        self.advance();
                        self.advance();
                    }
                }
                _ => break,
            }
        }
    }

    fn next_token(&mut self) -> CompileResult<Token> {
        self.skip_trivia();
        let location = self.loc();
        let c = self.peek();
        if c == 0 {
            return Ok(Token { kind: TokenKind::Eof, location });
        }
        if is_ident_start(c) {
            return Ok(Token { kind: self.scan_word(), location });
        }
        if c.is_ascii_digit() || (c == b'.' && self.peek_at(1).is_ascii_digit()) {
            return Ok(Token { kind: self.scan_number(), location });
        }
        if c == b'"' {
            return Ok(Token { kind: self.scan_string()?, location });
        }
        if c == b'\'' {
            return Ok(Token { kind: self.scan_char()?, location });
        }
        self.scan_symbol(location)
    }

    fn scan_word(&mut self) -> TokenKind {
        let start = self.pos;
        while is_ident_continue(self.peek()) {
            self.advance();
        }
        let text = std::str::from_utf8(&self.src[start..self.pos]).unwrap();
        for (kw, kind) in KEYWORDS {
            if *kw == text {
                return kind.clone();
            }
        }
        TokenKind::Identifier(text.to_string())
    }

    fn scan_number(&mut self) -> TokenKind {
        let start = self.pos;
        let mut is_float = false;
        let mut radix = 10u32;
        if self.peek() == b'0' && (self.peek_at(1) == b'x' || self.peek_at(1) == b'X') {
            radix = 16;
            self.advance();
            self.advance();
            while self.peek().is_ascii_hexdigit() {
                self.advance();
            }
        } else {
            while self.peek().is_ascii_digit() {
                self.advance();
            }
            if self.peek() == b'.' {
                is_float = true;
                self.advance();
                while self.peek().is_ascii_digit() {
                    self.advance();
                }
            }
            if matches!(self.peek(), b'e' | b'E') {
                is_float = true;
                self.advance();
                if matches!(self.peek(), b'+' | b'-') {
                    self.advance();
                }
                while self.peek().is_ascii_digit() {
                    self.advance();
                }
            }
        }
        let digits_end = self.pos;
        if is_float {
            let mut is_single = false;
            if matches!(self.peek(), b'f' | b'F') {
                is_single = true;
                self.advance();
            }
            let text = std::str::from_utf8(&self.src[start..digits_end]).unwrap();
            let value: f64 = text.parse().unwrap_or(0.0);
            return TokenKind::Float { value, is_single };
        }

        let mut is_unsigned = false;
        let mut longs = 0u32;
        loop {
            match self.peek() {
                b'u' | b'U' if !is_unsigned => {
                    is_unsigned = true;
                    self.advance();
                }
                b'l' | b'L' if longs < 2 => {
                    longs += 1;
                    self.advance();
                }
                _ => break,
            }
        }
        let digits = std::str::from_utf8(&self.src[start..digits_end]).unwrap();
        let digits = if radix == 16 { &digits[2..] } else { digits };
        let value = u64::from_str_radix(digits, radix).unwrap_or(0);
        let width = if longs > 0 { IntWidth::I64 } else { IntWidth::I32 };
        TokenKind::Integer { value, width, is_unsigned }
    }

    fn scan_string(&mut self) -> CompileResult<TokenKind> {
        self.advance(); // opening quote
        let mut out = String::new();
        loop {
            match self.peek() {
                0 => {
                    return Err(CompileError::syntax(self.loc(), "unterminated string literal"));
                }
                b'"' => {
                    self.advance();
                    break;
                }
                b'\\' => {
                    self.advance();
                    out.push(self.scan_escape()?);
                }
                _ => {
                    out.push(self.advance() as char);
                }
            }
        }
        Ok(TokenKind::StringLit(out))
    }

    fn scan_char(&mut self) -> CompileResult<TokenKind> {
        self.advance(); // opening quote
        let value = if self.peek() == b'\\' {
            self.advance();
            self.scan_escape()? as u64
        } else {
            self.advance() as u64
        };
        if self.peek() != b'\'' {
            return Err(CompileError::syntax(self.loc(), "multiple characters in char literal"));
        }
        self.advance();
        Ok(TokenKind::Integer {
            value,
            width: IntWidth::I32,
            is_unsigned: false,
        })
    }

    fn scan_escape(&mut self) -> CompileResult<char> {
        let c = self.advance();
        Ok(match c {
            b'a' => '\x07',
            b'b' => '\x08',
            b'f' => '\x0c',
            b'n' => '\n',
            b'r' => '\r',
            b't' => '\t',
            b'v' => '\x0b',
            b'"' => '"',
            b'\\' => '\\',
            b'\'' => '\'',
            b'0' => '\0',
            other => {
                return Err(CompileError::syntax(self.loc(), format!("invalid escape code \\{}", other as char)));
            }
        })
    }

    fn scan_symbol(&mut self, location: Location) -> CompileResult<Token> {
        let remaining = std::str::from_utf8(&self.src[self.pos..]).unwrap_or("");
        for (text, kind) in SYMBOLS {
            if remaining.starts_with(text) {
                for _ in 0..text.len() {
                    self.advance();
                }
                return Ok(Token { kind: kind.clone(), location });
            }
        }
        Err(CompileError::syntax(location, format!("invalid codepoint: 0x{:02x}", self.peek())))
    }
}

fn is_ident_start(c: u8) -> bool {
    c.is_ascii_alphabetic() || c == b'_'
}

fn is_ident_continue(c: u8) -> bool {
    c.is_ascii_alphanumeric() || c == b'_'
}

/// Tokenize `source`, resyncing at the next whitespace boundary after an
/// invalid character rather than aborting the whole file — matches the
/// original's per-character error recovery, though here it is the caller
/// ([`crate::frontend::parser`]) that decides whether to keep going.
pub fn lex(source: &str, filename: &str) -> CompileResult<Vec<Token>> {
    let mut lexer = Lexer {
        src: source.as_bytes(),
        pos: 0,
        row: 1,
        col: 0,
        file: filename.to_string(),
    };
    let mut tokens = Vec::new();
    loop {
        let token = lexer.next_token()?;
        let is_eof = token.kind == TokenKind::Eof;
        tokens.push(token);
        if is_eof {
            break;
        }
    }
    Ok(tokens)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lexes_a_function_signature() {
        let tokens = lex("int main() { return 1+2; }", "<test>").unwrap();
        let kinds: Vec<&TokenKind> = tokens.iter().map(|t| &t.kind).collect();
        assert_eq!(
            kinds,
            vec![
                &TokenKind::Int,
                &TokenKind::Identifier("main".into()),
                &TokenKind::ParenOpen,
                &TokenKind::ParenClose,
                &TokenKind::BraceOpen,
                &TokenKind::Return,
                &TokenKind::Integer { value: 1, width: IntWidth::I32, is_unsigned: false },
                &TokenKind::Plus,
                &TokenKind::Integer { value: 2, width: IntWidth::I32, is_unsigned: false },
                &TokenKind::Semicolon,
                &TokenKind::BraceClose,
                &TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn longest_match_prefers_le_over_lt() {
        let tokens = lex("a<=b", "<test>").unwrap();
        assert_eq!(tokens[1].kind, TokenKind::LtEq);
    }

    #[test]
    fn skips_line_and_block_comments() {
        let tokens = lex("// hi\n/* block */ int x;", "<test>").unwrap();
        assert_eq!(tokens[0].kind, TokenKind::Int);
    }

    #[test]
    fn records_integer_suffixes() {
        let tokens = lex("10UL", "<test>").unwrap();
        assert_eq!(
            tokens[0].kind,
            TokenKind::Integer { value: 10, width: IntWidth::I64, is_unsigned: true }
        );
    }
}
