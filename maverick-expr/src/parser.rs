//! ABOUTME: Recursive-descent parser for the `${{ ... }}` grammar, extended
//! ABOUTME: with comparison and `+` layers on top of the base grammar

use crate::ast::{Accessor, CompareOp, Expr, Reference, RootRef};
use crate::error::ExprError;
use crate::lexer::{Lexer, Token};

pub fn parse(src: &str) -> Result<Expr, ExprError> {
    let tokens = Lexer::new(src).tokenize()?;
    let mut parser = Parser { tokens, pos: 0 };
    let expr = parser.parse_ternary()?;
    parser.expect_eof()?;
    Ok(expr)
}

struct Parser {
    tokens: Vec<(usize, Token)>,
    pos: usize,
}

impl Parser {
    fn peek(&self) -> &Token {
        &self.tokens[self.pos].1
    }

    fn offset(&self) -> usize {
        self.tokens[self.pos].0
    }

    fn advance(&mut self) -> Token {
        let tok = self.tokens[self.pos].1.clone();
        if self.pos + 1 < self.tokens.len() {
            self.pos += 1;
        }
        tok
    }

    fn err(&self, expected: &str) -> ExprError {
        ExprError::Parse {
            offset: self.offset(),
            expected: expected.to_string(),
        }
    }

    fn expect_eof(&self) -> Result<(), ExprError> {
        if matches!(self.peek(), Token::Eof) {
            Ok(())
        } else {
            Err(self.err("end of expression"))
        }
    }

    fn is_ident(&self, name: &str) -> bool {
        matches!(self.peek(), Token::Ident(s) if s == name)
    }

    fn eat_ident(&mut self, name: &str) -> bool {
        if self.is_ident(name) {
            self.advance();
            true
        } else {
            false
        }
    }

    /// `ternary ::= orExpr ("if" orExpr "else" ternary)?`
    fn parse_ternary(&mut self) -> Result<Expr, ExprError> {
        let first = self.parse_or()?;
        if self.eat_ident("if") {
            let cond = self.parse_or()?;
            if !self.eat_ident("else") {
                return Err(self.err("'else'"));
            }
            let when_false = self.parse_ternary()?;
            Ok(Expr::Ternary {
                when_true: Box::new(first),
                cond: Box::new(cond),
                when_false: Box::new(when_false),
            })
        } else {
            Ok(first)
        }
    }

    /// `orExpr ::= andExpr ("or" andExpr)*`
    fn parse_or(&mut self) -> Result<Expr, ExprError> {
        let mut lhs = self.parse_and()?;
        while self.eat_ident("or") {
            let rhs = self.parse_and()?;
            lhs = Expr::Or(Box::new(lhs), Box::new(rhs));
        }
        Ok(lhs)
    }

    /// `andExpr ::= notExpr ("and" notExpr)*`
    fn parse_and(&mut self) -> Result<Expr, ExprError> {
        let mut lhs = self.parse_not()?;
        while self.eat_ident("and") {
            let rhs = self.parse_not()?;
            lhs = Expr::And(Box::new(lhs), Box::new(rhs));
        }
        Ok(lhs)
    }

    /// `notExpr ::= "not" notExpr | comparison`
    fn parse_not(&mut self) -> Result<Expr, ExprError> {
        if self.eat_ident("not") {
            let inner = self.parse_not()?;
            Ok(Expr::Not(Box::new(inner)))
        } else {
            self.parse_comparison()
        }
    }

    /// `comparison ::= sum (("==" | "!=" | "<" | "<=" | ">" | ">=") sum)?` (SPEC_FULL addition)
    fn parse_comparison(&mut self) -> Result<Expr, ExprError> {
        let lhs = self.parse_sum()?;
        let op = match self.peek() {
            Token::EqEq => CompareOp::Eq,
            Token::NotEq => CompareOp::Ne,
            Token::Lt => CompareOp::Lt,
            Token::Le => CompareOp::Le,
            Token::Gt => CompareOp::Gt,
            Token::Ge => CompareOp::Ge,
            _ => return Ok(lhs),
        };
        self.advance();
        let rhs = self.parse_sum()?;
        Ok(Expr::Compare(op, Box::new(lhs), Box::new(rhs)))
    }

    /// `sum ::= primary ("+" primary)*` (SPEC_FULL addition)
    fn parse_sum(&mut self) -> Result<Expr, ExprError> {
        let mut lhs = self.parse_primary()?;
        while matches!(self.peek(), Token::Plus) {
            self.advance();
            let rhs = self.parse_primary()?;
            lhs = Expr::Add(Box::new(lhs), Box::new(rhs));
        }
        Ok(lhs)
    }

    /// `primary ::= reference | literal`
    fn parse_primary(&mut self) -> Result<Expr, ExprError> {
        match self.peek().clone() {
            Token::Str(s) => {
                self.advance();
                Ok(Expr::Str(s))
            }
            Token::Int(n) => {
                self.advance();
                Ok(Expr::Int(n))
            }
            Token::Float(f) => {
                self.advance();
                Ok(Expr::Float(f))
            }
            Token::LBracket => self.parse_list(),
            Token::LBrace => self.parse_map(),
            Token::Ident(name) => match name.as_str() {
                "true" => {
                    self.advance();
                    Ok(Expr::Bool(true))
                }
                "false" => {
                    self.advance();
                    Ok(Expr::Bool(false))
                }
                "null" => {
                    self.advance();
                    Ok(Expr::Null)
                }
                "inputs" | "steps" | "item" | "index" => self.parse_reference(),
                _ => Err(self.err("inputs, steps, item, index, or a literal")),
            },
            _ => Err(self.err("a reference or literal")),
        }
    }

    /// `reference ::= rootRef accessor*`
    fn parse_reference(&mut self) -> Result<Expr, ExprError> {
        let root = match self.advance() {
            Token::Ident(name) if name == "inputs" => RootRef::Inputs,
            Token::Ident(name) if name == "item" => RootRef::Item,
            Token::Ident(name) if name == "index" => RootRef::Index,
            Token::Ident(name) if name == "steps" => {
                if !matches!(self.advance(), Token::Dot) {
                    return Err(self.err("'.' after 'steps'"));
                }
                let step_name = match self.advance() {
                    Token::Ident(n) => n,
                    _ => return Err(self.err("a step name")),
                };
                if !matches!(self.advance(), Token::Dot) {
                    return Err(self.err("'.' after step name"));
                }
                if !self.eat_ident("output") {
                    return Err(self.err("'output'"));
                }
                RootRef::StepOutput(step_name)
            }
            _ => return Err(self.err("inputs, steps, item, or index")),
        };

        let mut accessors = Vec::new();
        loop {
            match self.peek() {
                Token::Dot => {
                    self.advance();
                    match self.advance() {
                        Token::Ident(name) => accessors.push(Accessor::Field(name)),
                        _ => return Err(self.err("a field name")),
                    }
                }
                Token::LBracket => {
                    self.advance();
                    match self.advance() {
                        Token::Int(i) => accessors.push(Accessor::Index(i)),
                        Token::Str(s) => accessors.push(Accessor::Key(s)),
                        _ => return Err(self.err("an integer index or string key")),
                    }
                    if !matches!(self.advance(), Token::RBracket) {
                        return Err(self.err("']'"));
                    }
                }
                _ => break,
            }
        }

        Ok(Expr::Reference(Reference { root, accessors }))
    }

    fn parse_list(&mut self) -> Result<Expr, ExprError> {
        self.advance(); // '['
        let mut items = Vec::new();
        if !matches!(self.peek(), Token::RBracket) {
            loop {
                items.push(self.parse_ternary()?);
                if matches!(self.peek(), Token::Comma) {
                    self.advance();
                } else {
                    break;
                }
            }
        }
        if !matches!(self.advance(), Token::RBracket) {
            return Err(self.err("']'"));
        }
        Ok(Expr::List(items))
    }

    fn parse_map(&mut self) -> Result<Expr, ExprError> {
        self.advance(); // '{'
        let mut entries = Vec::new();
        if !matches!(self.peek(), Token::RBrace) {
            loop {
                let key = match self.advance() {
                    Token::Str(s) => s,
                    Token::Ident(s) => s,
                    _ => return Err(self.err("a map key")),
                };
                if !matches!(self.advance(), Token::Colon) {
                    return Err(self.err("':'"));
                }
                let value = self.parse_ternary()?;
                entries.push((key, value));
                if matches!(self.peek(), Token::Comma) {
                    self.advance();
                } else {
                    break;
                }
            }
        }
        if !matches!(self.advance(), Token::RBrace) {
            return Err(self.err("'}'"));
        }
        Ok(Expr::Map(entries))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_simple_reference() {
        let expr = parse("inputs.name").unwrap();
        assert_eq!(
            expr,
            Expr::Reference(Reference {
                root: RootRef::Inputs,
                accessors: vec![Accessor::Field("name".to_string())],
            })
        );
    }

    #[test]
    fn parses_step_output() {
        let expr = parse("steps.build.output.path").unwrap();
        assert_eq!(
            expr,
            Expr::Reference(Reference {
                root: RootRef::StepOutput("build".to_string()),
                accessors: vec![Accessor::Field("path".to_string())],
            })
        );
    }

    #[test]
    fn parses_ternary_and_or_not() {
        let expr = parse("1 if not inputs.skip and inputs.ready or false else 2").unwrap();
        matches!(expr, Expr::Ternary { .. });
    }

    #[test]
    fn parses_comparison_and_sum() {
        let expr = parse("inputs.env == 'prod'").unwrap();
        assert!(matches!(expr, Expr::Compare(CompareOp::Eq, _, _)));

        let expr = parse("1 + 2").unwrap();
        assert!(matches!(expr, Expr::Add(_, _)));
    }

    #[test]
    fn rejects_trailing_garbage() {
        assert!(parse("inputs.name extra").is_err());
    }
}
