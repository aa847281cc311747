//! ABOUTME: Tokenizer for expression source inside `${{ ... }}`
//! ABOUTME: Whitespace-insignificant, case-sensitive identifiers

use crate::error::ExprError;

#[derive(Debug, Clone, PartialEq)]
pub enum Token {
    Ident(String),
    Int(i64),
    Float(f64),
    Str(String),
    Dot,
    Comma,
    Colon,
    LBracket,
    RBracket,
    LBrace,
    RBrace,
    EqEq,
    NotEq,
    Lt,
    Le,
    Gt,
    Ge,
    Plus,
    Eof,
}

pub struct Lexer<'a> {
    src: &'a str,
    chars: std::iter::Peekable<std::str::CharIndices<'a>>,
}

impl<'a> Lexer<'a> {
    pub fn new(src: &'a str) -> Self {
        Self {
            src,
            chars: src.char_indices().peekable(),
        }
    }

    fn err(&self, offset: usize, expected: &str) -> ExprError {
        ExprError::Parse {
            offset,
            expected: expected.to_string(),
        }
    }

    pub fn tokenize(mut self) -> Result<Vec<(usize, Token)>, ExprError> {
        let mut tokens = Vec::new();
        loop {
            self.skip_whitespace();
            let Some(&(offset, ch)) = self.chars.peek() else {
                tokens.push((self.src.len(), Token::Eof));
                break;
            };
            match ch {
                '.' => {
                    self.chars.next();
                    tokens.push((offset, Token::Dot));
                }
                ',' => {
                    self.chars.next();
                    tokens.push((offset, Token::Comma));
                }
                ':' => {
                    self.chars.next();
                    tokens.push((offset, Token::Colon));
                }
                '[' => {
                    self.chars.next();
                    tokens.push((offset, Token::LBracket));
                }
                ']' => {
                    self.chars.next();
                    tokens.push((offset, Token::RBracket));
                }
                '{' => {
                    self.chars.next();
                    tokens.push((offset, Token::LBrace));
                }
                '}' => {
                    self.chars.next();
                    tokens.push((offset, Token::RBrace));
                }
                '+' => {
                    self.chars.next();
                    tokens.push((offset, Token::Plus));
                }
                '=' => {
                    self.chars.next();
                    if matches!(self.chars.peek(), Some((_, '='))) {
                        self.chars.next();
                        tokens.push((offset, Token::EqEq));
                    } else {
                        return Err(self.err(offset, "'=='"));
                    }
                }
                '!' => {
                    self.chars.next();
                    if matches!(self.chars.peek(), Some((_, '='))) {
                        self.chars.next();
                        tokens.push((offset, Token::NotEq));
                    } else {
                        return Err(self.err(offset, "'!='"));
                    }
                }
                '<' => {
                    self.chars.next();
                    if matches!(self.chars.peek(), Some((_, '='))) {
                        self.chars.next();
                        tokens.push((offset, Token::Le));
                    } else {
                        tokens.push((offset, Token::Lt));
                    }
                }
                '>' => {
                    self.chars.next();
                    if matches!(self.chars.peek(), Some((_, '='))) {
                        self.chars.next();
                        tokens.push((offset, Token::Ge));
                    } else {
                        tokens.push((offset, Token::Gt));
                    }
                }
                '\'' | '"' => {
                    let s = self.read_string(ch)?;
                    tokens.push((offset, Token::Str(s)));
                }
                c if c.is_ascii_digit() => {
                    tokens.push((offset, self.read_number()?));
                }
                c if c == '_' || c.is_alphabetic() => {
                    tokens.push((offset, self.read_ident()));
                }
                _ => return Err(self.err(offset, "a valid token")),
            }
        }
        Ok(tokens)
    }

    fn skip_whitespace(&mut self) {
        while matches!(self.chars.peek(), Some((_, c)) if c.is_whitespace()) {
            self.chars.next();
        }
    }

    fn read_ident(&mut self) -> Token {
        let mut ident = String::new();
        while let Some(&(_, c)) = self.chars.peek() {
            if c == '_' || c.is_alphanumeric() {
                ident.push(c);
                self.chars.next();
            } else {
                break;
            }
        }
        Token::Ident(ident)
    }

    fn read_number(&mut self) -> Result<Token, ExprError> {
        let start = self.chars.peek().map(|(i, _)| *i).unwrap_or(0);
        let mut text = String::new();
        let mut is_float = false;
        while let Some(&(_, c)) = self.chars.peek() {
            if c.is_ascii_digit() {
                text.push(c);
                self.chars.next();
            } else if c == '.' && !is_float {
                // Only consume as a decimal point if followed by a digit;
                // otherwise it's an accessor dot (e.g. `1.field` never
                // occurs, but `steps.a.output` must not be eaten here).
                let mut lookahead = self.chars.clone();
                lookahead.next();
                if matches!(lookahead.peek(), Some((_, d)) if d.is_ascii_digit()) {
                    is_float = true;
                    text.push(c);
                    self.chars.next();
                } else {
                    break;
                }
            } else {
                break;
            }
        }
        if is_float {
            text.parse::<f64>()
                .map(Token::Float)
                .map_err(|_| self.err(start, "a float literal"))
        } else {
            text.parse::<i64>()
                .map(Token::Int)
                .map_err(|_| self.err(start, "an integer literal"))
        }
    }

    fn read_string(&mut self, quote: char) -> Result<String, ExprError> {
        let start = self.chars.peek().map(|(i, _)| *i).unwrap_or(0);
        self.chars.next(); // consume opening quote
        let mut out = String::new();
        loop {
            match self.chars.next() {
                Some((_, '\\')) => match self.chars.next() {
                    Some((_, c)) => out.push(match c {
                        'n' => '\n',
                        't' => '\t',
                        other => other,
                    }),
                    None => return Err(self.err(start, "an escaped character")),
                },
                Some((_, c)) if c == quote => return Ok(out),
                Some((_, c)) => out.push(c),
                None => return Err(self.err(start, "a closing quote")),
            }
        }
    }
}
