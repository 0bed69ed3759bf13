//! Tokenizer for ODL-like catalog files
//!
//! Produces a flat token stream with line/column positions. Comments
//! (`/* … */`) are skipped; quoted strings may span lines and keep their
//! inner text verbatim. Everything that is not punctuation or a string is a
//! `Word`; classification into number/date/bareword happens in the value
//! grammar.

use std::fmt;

#[derive(Debug, Clone, PartialEq)]
pub enum TokenKind {
    /// Bareword: keyword names, numbers, dates, `UNK`, pointers (`^IMAGE`)
    Word(String),
    /// Quoted string with the surrounding quotes removed
    Quoted(String),
    Equals,
    LParen,
    RParen,
    LBrace,
    RBrace,
    Comma,
    /// End of input
    Eof,
}

impl fmt::Display for TokenKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TokenKind::Word(w) => write!(f, "'{}'", w),
            TokenKind::Quoted(_) => write!(f, "quoted string"),
            TokenKind::Equals => write!(f, "'='"),
            TokenKind::LParen => write!(f, "'('"),
            TokenKind::RParen => write!(f, "')'"),
            TokenKind::LBrace => write!(f, "'{{'"),
            TokenKind::RBrace => write!(f, "'}}'"),
            TokenKind::Comma => write!(f, "','"),
            TokenKind::Eof => write!(f, "end of input"),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Token {
    pub kind: TokenKind,
    pub line: usize,
    pub column: usize,
}

/// Characters that terminate a bareword
fn is_word_end(ch: char) -> bool {
    ch.is_whitespace() || matches!(ch, '=' | '(' | ')' | '{' | '}' | ',' | '"')
}

pub struct Lexer<'a> {
    chars: std::iter::Peekable<std::str::Chars<'a>>,
    line: usize,
    column: usize,
}

impl<'a> Lexer<'a> {
    pub fn new(input: &'a str) -> Self {
        Self {
            chars: input.chars().peekable(),
            line: 1,
            column: 1,
        }
    }

    fn bump(&mut self) -> Option<char> {
        let ch = self.chars.next()?;
        if ch == '\n' {
            self.line += 1;
            self.column = 1;
        } else {
            self.column += 1;
        }
        Some(ch)
    }

    fn skip_ws_and_comments(&mut self) {
        loop {
            match self.chars.peek() {
                Some(ch) if ch.is_whitespace() => {
                    self.bump();
                },
                Some('/') => {
                    // Only a comment when followed by '*'
                    let mut lookahead = self.chars.clone();
                    lookahead.next();
                    if lookahead.peek() == Some(&'*') {
                        self.bump();
                        self.bump();
                        // Consume to the closing '*/'
                        let mut prev = '\0';
                        while let Some(ch) = self.bump() {
                            if prev == '*' && ch == '/' {
                                break;
                            }
                            prev = ch;
                        }
                    } else {
                        return;
                    }
                },
                _ => return,
            }
        }
    }

    /// Next token; `Eof` forever once the input is exhausted
    pub fn next_token(&mut self) -> Token {
        self.skip_ws_and_comments();
        let line = self.line;
        let column = self.column;

        let Some(&ch) = self.chars.peek() else {
            return Token {
                kind: TokenKind::Eof,
                line,
                column,
            };
        };

        let kind = match ch {
            '=' => {
                self.bump();
                TokenKind::Equals
            },
            '(' => {
                self.bump();
                TokenKind::LParen
            },
            ')' => {
                self.bump();
                TokenKind::RParen
            },
            '{' => {
                self.bump();
                TokenKind::LBrace
            },
            '}' => {
                self.bump();
                TokenKind::RBrace
            },
            ',' => {
                self.bump();
                TokenKind::Comma
            },
            '"' => {
                self.bump();
                let mut text = String::new();
                loop {
                    match self.bump() {
                        Some('"') | None => break,
                        Some(ch) => text.push(ch),
                    }
                }
                TokenKind::Quoted(text)
            },
            _ => {
                let mut word = String::new();
                while let Some(&ch) = self.chars.peek() {
                    if is_word_end(ch) {
                        break;
                    }
                    word.push(ch);
                    self.bump();
                }
                TokenKind::Word(word)
            },
        };

        Token { kind, line, column }
    }

    /// Lex the whole input
    pub fn tokenize(mut self) -> Vec<Token> {
        let mut tokens = Vec::new();
        loop {
            let token = self.next_token();
            let done = token.kind == TokenKind::Eof;
            tokens.push(token);
            if done {
                break;
            }
        }
        tokens
    }
}
