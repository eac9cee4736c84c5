//! Recursive-descent parser for template expressions.
//!
//! Grammar, loosest binding first:
//!
//! ```text
//! expr       := or
//! or         := and ("or" and)*
//! and        := unary-not ("and" unary-not)*
//! unary-not  := "not" unary-not | comparison
//! comparison := additive (cmp-op additive)?
//! additive   := unary (("+" | "-") unary)*
//! unary      := "-" unary | postfix
//! postfix    := primary ("|" filter | "." attribute)*
//! primary    := literal | name | name "(" args ")" | "(" expr ")"
//! ```

use metafix_model::Value;

use crate::error::TemplateError;
use crate::lexer::{Spanned, Tok, tokenize};

#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    Literal(Value),
    Name(String),
    Attr {
        object: Box<Expr>,
        name: String,
    },
    Call {
        function: String,
        args: Vec<Arg>,
    },
    Filter {
        input: Box<Expr>,
        name: String,
        args: Vec<Arg>,
    },
    Not(Box<Expr>),
    Neg(Box<Expr>),
    Binary {
        op: BinOp,
        lhs: Box<Expr>,
        rhs: Box<Expr>,
    },
}

/// A positional or keyword argument in a call or filter.
#[derive(Debug, Clone, PartialEq)]
pub struct Arg {
    pub name: Option<String>,
    pub value: Expr,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinOp {
    Or,
    And,
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
    Add,
    Sub,
}

/// Parses one expression (the contents of a `{{ … }}` span).
pub fn parse_expression(text: &str) -> Result<Expr, TemplateError> {
    let tokens = tokenize(text)?;
    if tokens.is_empty() {
        return Err(TemplateError::EmptyExpression);
    }
    let mut parser = Parser { tokens, pos: 0 };
    let expr = parser.parse_or()?;
    if let Some(trailing) = parser.peek() {
        return Err(parser.error_at(trailing.offset, "unexpected trailing input"));
    }
    Ok(expr)
}

struct Parser {
    tokens: Vec<Spanned>,
    pos: usize,
}

impl Parser {
    fn peek(&self) -> Option<&Spanned> {
        self.tokens.get(self.pos)
    }

    fn advance(&mut self) -> Option<Spanned> {
        let spanned = self.tokens.get(self.pos).cloned();
        if spanned.is_some() {
            self.pos += 1;
        }
        spanned
    }

    fn eat(&mut self, expected: &Tok) -> bool {
        if self.peek().map(|s| &s.tok) == Some(expected) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    fn expect(&mut self, expected: &Tok, what: &str) -> Result<(), TemplateError> {
        if self.eat(expected) {
            Ok(())
        } else {
            let offset = self.peek().map_or(usize::MAX, |s| s.offset);
            Err(self.error_at(offset, &format!("expected {what}")))
        }
    }

    fn eat_keyword(&mut self, keyword: &str) -> bool {
        if let Some(Spanned {
            tok: Tok::Ident(ident),
            ..
        }) = self.peek()
            && ident == keyword
        {
            self.pos += 1;
            return true;
        }
        false
    }

    fn error_at(&self, offset: usize, message: &str) -> TemplateError {
        TemplateError::Parse {
            offset,
            message: message.to_string(),
        }
    }

    fn parse_or(&mut self) -> Result<Expr, TemplateError> {
        let mut lhs = self.parse_and()?;
        while self.eat_keyword("or") {
            let rhs = self.parse_and()?;
            lhs = Expr::Binary {
                op: BinOp::Or,
                lhs: Box::new(lhs),
                rhs: Box::new(rhs),
            };
        }
        Ok(lhs)
    }

    fn parse_and(&mut self) -> Result<Expr, TemplateError> {
        let mut lhs = self.parse_not()?;
        while self.eat_keyword("and") {
            let rhs = self.parse_not()?;
            lhs = Expr::Binary {
                op: BinOp::And,
                lhs: Box::new(lhs),
                rhs: Box::new(rhs),
            };
        }
        Ok(lhs)
    }

    fn parse_not(&mut self) -> Result<Expr, TemplateError> {
        if self.eat_keyword("not") {
            let inner = self.parse_not()?;
            return Ok(Expr::Not(Box::new(inner)));
        }
        self.parse_comparison()
    }

    fn parse_comparison(&mut self) -> Result<Expr, TemplateError> {
        let lhs = self.parse_additive()?;
        let op = match self.peek().map(|s| &s.tok) {
            Some(Tok::Eq) => Some(BinOp::Eq),
            Some(Tok::Ne) => Some(BinOp::Ne),
            Some(Tok::Lt) => Some(BinOp::Lt),
            Some(Tok::Le) => Some(BinOp::Le),
            Some(Tok::Gt) => Some(BinOp::Gt),
            Some(Tok::Ge) => Some(BinOp::Ge),
            _ => None,
        };
        let Some(op) = op else {
            return Ok(lhs);
        };
        self.pos += 1;
        let rhs = self.parse_additive()?;
        Ok(Expr::Binary {
            op,
            lhs: Box::new(lhs),
            rhs: Box::new(rhs),
        })
    }

    fn parse_additive(&mut self) -> Result<Expr, TemplateError> {
        let mut lhs = self.parse_unary()?;
        loop {
            let op = match self.peek().map(|s| &s.tok) {
                Some(Tok::Plus) => BinOp::Add,
                Some(Tok::Minus) => BinOp::Sub,
                _ => break,
            };
            self.pos += 1;
            let rhs = self.parse_unary()?;
            lhs = Expr::Binary {
                op,
                lhs: Box::new(lhs),
                rhs: Box::new(rhs),
            };
        }
        Ok(lhs)
    }

    fn parse_unary(&mut self) -> Result<Expr, TemplateError> {
        if self.eat(&Tok::Minus) {
            let inner = self.parse_unary()?;
            return Ok(Expr::Neg(Box::new(inner)));
        }
        self.parse_postfix()
    }

    fn parse_postfix(&mut self) -> Result<Expr, TemplateError> {
        let mut expr = self.parse_primary()?;
        loop {
            if self.eat(&Tok::Pipe) {
                let name = self.parse_ident("filter name")?;
                let args = if self.eat(&Tok::LParen) {
                    self.parse_args()?
                } else {
                    Vec::new()
                };
                expr = Expr::Filter {
                    input: Box::new(expr),
                    name,
                    args,
                };
            } else if self.eat(&Tok::Dot) {
                let name = self.parse_ident("attribute name")?;
                expr = Expr::Attr {
                    object: Box::new(expr),
                    name,
                };
            } else {
                break;
            }
        }
        Ok(expr)
    }

    fn parse_primary(&mut self) -> Result<Expr, TemplateError> {
        let Some(spanned) = self.advance() else {
            return Err(self.error_at(usize::MAX, "unexpected end of expression"));
        };
        match spanned.tok {
            Tok::Int(value) => Ok(Expr::Literal(Value::Int(value))),
            Tok::Str(value) => Ok(Expr::Literal(Value::Str(value))),
            Tok::Ident(ident) => match ident.as_str() {
                "True" | "true" => Ok(Expr::Literal(Value::Bool(true))),
                "False" | "false" => Ok(Expr::Literal(Value::Bool(false))),
                "None" | "none" => Ok(Expr::Literal(Value::None)),
                _ => {
                    if self.eat(&Tok::LParen) {
                        let args = self.parse_args()?;
                        Ok(Expr::Call {
                            function: ident,
                            args,
                        })
                    } else {
                        Ok(Expr::Name(ident))
                    }
                }
            },
            Tok::LParen => {
                let inner = self.parse_or()?;
                self.expect(&Tok::RParen, "')'")?;
                Ok(inner)
            }
            _ => Err(self.error_at(spanned.offset, "expected a value")),
        }
    }

    /// Parses a comma-separated argument list up to and including `)`.
    fn parse_args(&mut self) -> Result<Vec<Arg>, TemplateError> {
        let mut args = Vec::new();
        if self.eat(&Tok::RParen) {
            return Ok(args);
        }
        loop {
            // `name=expr` is a keyword argument; lone `name` stays positional.
            let arg = if let Some(Spanned {
                tok: Tok::Ident(ident),
                ..
            }) = self.peek()
            {
                let ident = ident.clone();
                if self.tokens.get(self.pos + 1).map(|s| &s.tok) == Some(&Tok::Assign) {
                    self.pos += 2;
                    let value = self.parse_or()?;
                    Arg {
                        name: Some(ident),
                        value,
                    }
                } else {
                    Arg {
                        name: None,
                        value: self.parse_or()?,
                    }
                }
            } else {
                Arg {
                    name: None,
                    value: self.parse_or()?,
                }
            };
            args.push(arg);
            if self.eat(&Tok::Comma) {
                continue;
            }
            self.expect(&Tok::RParen, "')' after arguments")?;
            break;
        }
        Ok(args)
    }

    fn parse_ident(&mut self, what: &str) -> Result<String, TemplateError> {
        match self.advance() {
            Some(Spanned {
                tok: Tok::Ident(ident),
                ..
            }) => Ok(ident),
            Some(spanned) => Err(self.error_at(spanned.offset, &format!("expected {what}"))),
            None => Err(self.error_at(usize::MAX, &format!("expected {what}"))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_boolean_match_expression() {
        let expr = parse_expression("correspondent == 'The Bank' and asn > 100").unwrap();
        let Expr::Binary { op: BinOp::And, .. } = expr else {
            panic!("expected top-level 'and', got {expr:?}");
        };
    }

    #[test]
    fn parses_filter_pipeline_with_arguments() {
        let expr = parse_expression("source | expand_two_digit_year(19)").unwrap();
        assert_eq!(
            expr,
            Expr::Filter {
                input: Box::new(Expr::Name("source".to_string())),
                name: "expand_two_digit_year".to_string(),
                args: vec![Arg {
                    name: None,
                    value: Expr::Literal(Value::Int(19)),
                }],
            }
        );
    }

    #[test]
    fn parses_keyword_arguments() {
        let expr = parse_expression("num_documents(correspondent=correspondent)").unwrap();
        let Expr::Call { function, args } = expr else {
            panic!("expected call");
        };
        assert_eq!(function, "num_documents");
        assert_eq!(args[0].name.as_deref(), Some("correspondent"));
    }

    #[test]
    fn parses_date_arithmetic_with_attribute() {
        let expr =
            parse_expression("(created_date_object - timedelta(days=1)).year").unwrap();
        let Expr::Attr { name, .. } = expr else {
            panic!("expected attribute access");
        };
        assert_eq!(name, "year");
    }

    #[test]
    fn rejects_trailing_tokens() {
        assert!(matches!(
            parse_expression("title title"),
            Err(TemplateError::Parse { .. })
        ));
    }

    #[test]
    fn rejects_empty_expression() {
        assert_eq!(parse_expression("  "), Err(TemplateError::EmptyExpression));
    }
}
