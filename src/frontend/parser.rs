//! Token stream → AST.
//!
//! Statements are parsed by recursive descent over the prefilled token
//! vector (one-token lookahead, no backtracking beyond that); expressions
//! go through a Pratt loop driven by a fixed precedence table. The first
//! error aborts the parse.

use std::str::FromStr;

use thiserror::Error;

use crate::ast::{
    AttrKey, AttrValue, Attributes, BinOpKind, Body, CompilationUnit, Expression, FuncDef,
    Instruction, LValue, Param, Type,
};
use crate::frontend::lexer::{Location, Token, TokenKind};

#[derive(Error, Debug, Clone, PartialEq)]
pub enum ParseError {
    #[error("expected {expected} at {location}, got {found}")]
    Unexpected {
        location: Location,
        expected: String,
        found: String,
    },

    #[error("unexpected end of input, expected {expected}")]
    UnexpectedEof { expected: String },

    #[error("{message} at {location}")]
    Invalid { location: Location, message: String },
}

pub fn parse(tokens: Vec<Token>) -> Result<CompilationUnit, ParseError> {
    Parser::new(tokens).parse()
}

struct Parser {
    tokens: Vec<Token>,
    index: usize,
    unit: CompilationUnit,
    /// Attributes collected but not yet attached to a declaration.
    pending_attrs: Attributes,
    /// Return type of the function currently being parsed; decides whether
    /// `return` takes an expression.
    current_ret: Type,
}

impl Parser {
    fn new(tokens: Vec<Token>) -> Self {
        Self {
            tokens,
            index: 0,
            unit: CompilationUnit::new(),
            pending_attrs: Attributes::new(),
            current_ret: Type::Void,
        }
    }

    fn parse(mut self) -> Result<CompilationUnit, ParseError> {
        while let Some(kind) = self.peek_kind() {
            match kind {
                TokenKind::At => {
                    self.bump();
                    self.parse_attributes()?;
                }
                TokenKind::Package => {
                    let tok = self.expect(TokenKind::Package)?;
                    self.parse_package(tok.location)?;
                }
                TokenKind::Ident(_) => {
                    let (name, location) = self.expect_ident()?;
                    if self.unit.package.is_empty() {
                        return Err(ParseError::Invalid {
                            location,
                            message: "package must be declared before any other declaration"
                                .to_string(),
                        });
                    }
                    self.expect(TokenKind::ColonColon)?;
                    self.expect(TokenKind::Func)?;
                    self.parse_func(name, location)?;
                }
                _ => return Err(self.unexpected("'package', '@' or identifier")),
            }
        }

        if self.unit.package.is_empty() {
            return Err(ParseError::UnexpectedEof {
                expected: "'package' declaration".to_string(),
            });
        }

        Ok(self.unit)
    }

    fn parse_package(&mut self, location: Location) -> Result<(), ParseError> {
        if !self.unit.package.is_empty() {
            return Err(ParseError::Invalid {
                location,
                message: "package already defined, cannot redefine".to_string(),
            });
        }

        let (name, _) = self.expect_ident()?;
        self.unit.attributes = std::mem::take(&mut self.pending_attrs);
        self.unit.package = name;

        Ok(())
    }

    /// Parse an `@(...)` attribute list into the pending buffer. The `@`
    /// has already been consumed.
    fn parse_attributes(&mut self) -> Result<(), ParseError> {
        self.expect(TokenKind::LParen)?;

        loop {
            match self.peek_kind() {
                Some(TokenKind::RParen) => {
                    self.bump();
                    return Ok(());
                }
                Some(TokenKind::Ident(_)) => {
                    let (key_name, key_loc) = self.expect_ident()?;
                    let key =
                        AttrKey::from_str(&key_name).map_err(|_| ParseError::Invalid {
                            location: key_loc.clone(),
                            message: format!("unknown attribute key `{key_name}`"),
                        })?;

                    let mut value = AttrValue::None;
                    if matches!(self.peek_kind(), Some(TokenKind::Assign)) {
                        self.bump();
                        value = match self.bump() {
                            Some(Token {
                                kind: TokenKind::Str(s),
                                ..
                            }) => AttrValue::Str(s),
                            Some(Token {
                                kind: TokenKind::Number(n),
                                ..
                            }) => AttrValue::Int(n),
                            Some(tok) => {
                                return Err(ParseError::Unexpected {
                                    location: tok.location,
                                    expected: "string or integer attribute value".to_string(),
                                    found: format!("'{}'", tok.kind),
                                })
                            }
                            None => {
                                return Err(ParseError::UnexpectedEof {
                                    expected: "attribute value".to_string(),
                                })
                            }
                        };
                    }

                    if key == AttrKey::Linkname && !matches!(value, AttrValue::Str(_)) {
                        return Err(ParseError::Invalid {
                            location: key_loc,
                            message: "linkname attribute requires a string value".to_string(),
                        });
                    }

                    self.pending_attrs.insert(key, value);

                    match self.peek_kind() {
                        Some(TokenKind::Comma) => {
                            self.bump();
                        }
                        Some(TokenKind::RParen) => {
                            self.bump();
                            return Ok(());
                        }
                        _ => return Err(self.unexpected("',' or ')'")),
                    }
                }
                _ => return Err(self.unexpected("attribute key or ')'")),
            }
        }
    }

    /// Parse the remainder of `name :: func`, starting at the parameter
    /// list.
    fn parse_func(&mut self, name: String, location: Location) -> Result<(), ParseError> {
        self.expect(TokenKind::LParen)?;

        let attributes = std::mem::take(&mut self.pending_attrs);

        let mut params = Vec::new();
        loop {
            match self.peek_kind() {
                Some(TokenKind::RParen) => {
                    self.bump();
                    break;
                }
                Some(TokenKind::At | TokenKind::Ident(_)) => {
                    params.push(self.parse_param()?);
                    match self.peek_kind() {
                        Some(TokenKind::Comma) => {
                            self.bump();
                        }
                        Some(TokenKind::RParen) => {
                            self.bump();
                            break;
                        }
                        _ => return Err(self.unexpected("',' or ')'")),
                    }
                }
                _ => return Err(self.unexpected("parameter or ')'")),
            }
        }

        let return_type = if matches!(self.peek_kind(), Some(TokenKind::Arrow)) {
            self.bump();
            self.parse_type()?
        } else {
            Type::Void
        };
        self.current_ret = return_type.clone();

        // Extern functions carry no body.
        let body = if attributes.contains_key(&AttrKey::Extern) {
            None
        } else {
            self.expect(TokenKind::LBrace)?;
            let mut instructions = self.parse_block()?;
            self.expect(TokenKind::RBrace)?;

            let has_ret = matches!(instructions.last(), Some(Instruction::Return { .. }));
            if !has_ret {
                if return_type.is_void() {
                    instructions.push(Instruction::Return {
                        value: None,
                        location: location.clone(),
                    });
                } else {
                    return Err(ParseError::Invalid {
                        location: location.clone(),
                        message: format!(
                            "missing return in function `{name}` returning {return_type}"
                        ),
                    });
                }
            }

            Some(Body { instructions })
        };

        self.unit.add_func(FuncDef {
            name,
            attributes,
            params,
            return_type,
            body,
            location,
        });

        Ok(())
    }

    fn parse_param(&mut self) -> Result<Param, ParseError> {
        let mut attributes = Attributes::new();
        if matches!(self.peek_kind(), Some(TokenKind::At)) {
            self.bump();
            self.parse_attributes()?;
            attributes = std::mem::take(&mut self.pending_attrs);
        }

        let (name, location) = self.expect_ident()?;
        self.expect(TokenKind::Colon)?;

        let ty = if matches!(self.peek_kind(), Some(TokenKind::Assign)) {
            Type::Unknown
        } else {
            self.parse_type()?
        };

        let default = if matches!(self.peek_kind(), Some(TokenKind::Assign)) {
            self.bump();
            Some(self.parse_expression()?)
        } else {
            None
        };

        Ok(Param {
            name,
            ty,
            default,
            attributes,
            location,
        })
    }

    /// Parse a type: any number of leading `^` followed by a base keyword.
    fn parse_type(&mut self) -> Result<Type, ParseError> {
        let mut depth = 0;
        while matches!(self.peek_kind(), Some(TokenKind::Caret)) {
            self.bump();
            depth += 1;
        }

        let base = match self.bump() {
            Some(Token {
                kind: TokenKind::Int,
                ..
            }) => Type::Int,
            Some(Token {
                kind: TokenKind::Bool,
                ..
            }) => Type::Bool,
            Some(Token {
                kind: TokenKind::String,
                ..
            }) => Type::String,
            Some(Token {
                kind: TokenKind::Void,
                ..
            }) => Type::Void,
            Some(tok) => {
                return Err(ParseError::Unexpected {
                    location: tok.location,
                    expected: "type".to_string(),
                    found: format!("'{}'", tok.kind),
                })
            }
            None => {
                return Err(ParseError::UnexpectedEof {
                    expected: "type".to_string(),
                })
            }
        };

        Ok(Type::pointer(base, depth))
    }

    /// Parse the instructions of a block. Stops at the closing `}` without
    /// consuming it.
    fn parse_block(&mut self) -> Result<Vec<Instruction>, ParseError> {
        let mut instructions = Vec::new();

        loop {
            let Some(kind) = self.peek_kind() else {
                return Err(ParseError::UnexpectedEof {
                    expected: "'}'".to_string(),
                });
            };

            match kind {
                TokenKind::RBrace => return Ok(instructions),
                TokenKind::Return => {
                    let tok = self.expect(TokenKind::Return)?;
                    let value = if self.current_ret.is_void() {
                        None
                    } else {
                        Some(self.parse_expression()?)
                    };
                    instructions.push(Instruction::Return {
                        value,
                        location: tok.location,
                    });
                }
                TokenKind::If => {
                    let tok = self.expect(TokenKind::If)?;
                    instructions.push(self.parse_if(tok.location)?);
                }
                TokenKind::For => {
                    let tok = self.expect(TokenKind::For)?;
                    instructions.push(self.parse_for(tok.location)?);
                }
                TokenKind::Ident(_) => match self.peek_kind_at(1) {
                    Some(TokenKind::Colon) => {
                        let (name, location) = self.expect_ident()?;
                        self.bump();
                        instructions.extend(self.parse_declare(name, location)?);
                    }
                    Some(TokenKind::Walrus) => {
                        let (name, location) = self.expect_ident()?;
                        self.bump();
                        instructions.extend(self.parse_inferred_declare(name, location)?);
                    }
                    Some(TokenKind::LParen) => {
                        let (name, location) = self.expect_ident()?;
                        self.bump();
                        let call = self.parse_call(name, location)?;
                        instructions.push(Instruction::Call(call));
                    }
                    Some(TokenKind::Assign) => {
                        let (name, location) = self.expect_ident()?;
                        self.bump();
                        let value = self.parse_expression()?;
                        instructions.push(Instruction::Assign {
                            target: LValue::Var {
                                name,
                                ty: Type::Unknown,
                                location: location.clone(),
                            },
                            value,
                            location,
                        });
                    }
                    Some(TokenKind::Caret) => {
                        let (name, location) = self.expect_ident()?;
                        self.bump();
                        let target = LValue::Deref {
                            ptr: Box::new(Expression::var(name, location.clone())),
                            ty: Type::Unknown,
                            location: location.clone(),
                        };
                        self.expect(TokenKind::Assign)?;
                        let value = self.parse_expression()?;
                        instructions.push(Instruction::Assign {
                            target,
                            value,
                            location,
                        });
                    }
                    _ => return Err(self.unexpected("a declaration, assignment or call")),
                },
                TokenKind::LParen => {
                    let tok = self.expect(TokenKind::LParen)?;
                    let target = self.parse_paren_lvalue(tok.location.clone())?;
                    self.expect(TokenKind::Assign)?;
                    let value = self.parse_expression()?;
                    instructions.push(Instruction::Assign {
                        target,
                        value,
                        location: tok.location,
                    });
                }
                _ => return Err(self.unexpected("statement")),
            }
        }
    }

    /// `name :` has been consumed; parse the optional type and initializer.
    fn parse_declare(
        &mut self,
        name: String,
        location: Location,
    ) -> Result<Vec<Instruction>, ParseError> {
        let ty = if matches!(self.peek_kind(), Some(TokenKind::Assign)) {
            Type::Unknown
        } else {
            self.parse_type()?
        };

        let mut out = vec![Instruction::Declare {
            name: name.clone(),
            ty,
            location: location.clone(),
        }];

        if matches!(self.peek_kind(), Some(TokenKind::Assign)) {
            self.bump();
            let value = self.parse_expression()?;
            out.push(Instruction::Assign {
                target: LValue::Var {
                    name,
                    ty: Type::Unknown,
                    location: location.clone(),
                },
                value,
                location,
            });
        }

        Ok(out)
    }

    /// `name :=` has been consumed.
    fn parse_inferred_declare(
        &mut self,
        name: String,
        location: Location,
    ) -> Result<Vec<Instruction>, ParseError> {
        let value = self.parse_expression()?;

        Ok(vec![
            Instruction::Declare {
                name: name.clone(),
                ty: Type::Unknown,
                location: location.clone(),
            },
            Instruction::Assign {
                target: LValue::Var {
                    name,
                    ty: Type::Unknown,
                    location: location.clone(),
                },
                value,
                location,
            },
        ])
    }

    /// Parenthesized lvalue `(expr)^`; the `(` has been consumed. A
    /// parenthesized expression without the trailing deref is not a valid
    /// assignment target.
    fn parse_paren_lvalue(&mut self, location: Location) -> Result<LValue, ParseError> {
        let expr = self.parse_expression()?;
        self.expect(TokenKind::RParen)?;

        if matches!(self.peek_kind(), Some(TokenKind::Caret)) {
            self.bump();
            Ok(LValue::Deref {
                ptr: Box::new(expr),
                ty: Type::Unknown,
                location,
            })
        } else {
            Err(ParseError::Invalid {
                location,
                message: "parenthesized expression must be dereferenced with ^".to_string(),
            })
        }
    }

    /// Optional `init ;` prefix of an `if` or `for` header.
    fn parse_control_init(&mut self) -> Result<Vec<Instruction>, ParseError> {
        if let (Some(TokenKind::Ident(_)), Some(second)) =
            (self.peek_kind(), self.peek_kind_at(1))
        {
            if matches!(
                second,
                TokenKind::Colon | TokenKind::Walrus | TokenKind::Assign
            ) {
                let instrs = self.parse_simple_stmt()?;
                self.expect(TokenKind::Semicolon)?;
                return Ok(instrs);
            }
        }

        Ok(Vec::new())
    }

    /// A declaration or assignment without surrounding control syntax, as
    /// used in `if`/`for` initializers and the `for` post statement.
    fn parse_simple_stmt(&mut self) -> Result<Vec<Instruction>, ParseError> {
        let (name, location) = self.expect_ident()?;

        match self.peek_kind() {
            Some(TokenKind::Colon) => {
                self.bump();
                self.parse_declare(name, location)
            }
            Some(TokenKind::Walrus) => {
                self.bump();
                self.parse_inferred_declare(name, location)
            }
            Some(TokenKind::Assign) => {
                self.bump();
                let value = self.parse_expression()?;
                Ok(vec![Instruction::Assign {
                    target: LValue::Var {
                        name,
                        ty: Type::Unknown,
                        location: location.clone(),
                    },
                    value,
                    location,
                }])
            }
            _ => Err(self.unexpected("':', ':=' or '='")),
        }
    }

    /// `if` has been consumed.
    fn parse_if(&mut self, location: Location) -> Result<Instruction, ParseError> {
        let init = self.parse_control_init()?;
        let cond = self.parse_expression()?;

        self.expect(TokenKind::LBrace)?;
        let then_instrs = self.parse_block()?;
        self.expect(TokenKind::RBrace)?;

        let else_body = if matches!(self.peek_kind(), Some(TokenKind::Else)) {
            let else_tok = self.expect(TokenKind::Else)?;
            match self.peek_kind() {
                Some(TokenKind::If) => {
                    let if_tok = self.expect(TokenKind::If)?;
                    let nested = self.parse_if(if_tok.location)?;
                    Some(Body {
                        instructions: vec![nested],
                    })
                }
                Some(TokenKind::LBrace) => {
                    self.bump();
                    let instrs = self.parse_block()?;
                    self.expect(TokenKind::RBrace)?;
                    Some(Body {
                        instructions: instrs,
                    })
                }
                _ => {
                    return Err(ParseError::Invalid {
                        location: else_tok.location,
                        message: "expected 'if' or '{' after 'else'".to_string(),
                    })
                }
            }
        } else {
            None
        };

        Ok(Instruction::If {
            init,
            cond,
            then_body: Body {
                instructions: then_instrs,
            },
            else_body,
            location,
        })
    }

    /// `for` has been consumed. C-style header with optional init and post.
    fn parse_for(&mut self, location: Location) -> Result<Instruction, ParseError> {
        let init = self.parse_control_init()?;
        let cond = self.parse_expression()?;

        let post = if matches!(self.peek_kind(), Some(TokenKind::Semicolon)) {
            self.bump();
            self.parse_simple_stmt()?
        } else {
            Vec::new()
        };

        self.expect(TokenKind::LBrace)?;
        let body_instrs = self.parse_block()?;
        self.expect(TokenKind::RBrace)?;

        Ok(Instruction::For {
            init,
            cond,
            post,
            body: Body {
                instructions: body_instrs,
            },
            location,
        })
    }

    /// Argument list of a call; the callee identifier and `(` have been
    /// consumed.
    fn parse_call(&mut self, name: String, location: Location) -> Result<Expression, ParseError> {
        let mut args = Vec::new();

        if !matches!(self.peek_kind(), Some(TokenKind::RParen)) {
            loop {
                args.push(self.parse_expression()?);
                match self.peek_kind() {
                    Some(TokenKind::Comma) => {
                        self.bump();
                    }
                    Some(TokenKind::RParen) => break,
                    _ => return Err(self.unexpected("',' or ')'")),
                }
            }
        }
        self.expect(TokenKind::RParen)?;

        Ok(Expression::call(name, args, location))
    }

    // --- Expressions (Pratt) ---

    fn parse_expression(&mut self) -> Result<Expression, ParseError> {
        self.parse_expression_prec(0)
    }

    fn parse_expression_prec(&mut self, min_prec: u8) -> Result<Expression, ParseError> {
        let mut lhs = self.parse_primary()?;

        while let Some(kind) = self.peek_kind() {
            let Some((prec, op)) = op_info(kind) else {
                break;
            };
            if prec < min_prec {
                break;
            }
            self.bump();

            // All operators in the table are left-associative.
            let rhs = self.parse_expression_prec(prec + 1)?;
            lhs = Expression::binop(op, lhs, rhs);
        }

        Ok(lhs)
    }

    fn parse_primary(&mut self) -> Result<Expression, ParseError> {
        let Some(tok) = self.bump() else {
            return Err(ParseError::UnexpectedEof {
                expected: "expression".to_string(),
            });
        };

        match tok.kind {
            TokenKind::Number(n) => Ok(Expression::int(n, tok.location)),
            TokenKind::True => Ok(Expression::bool(true, tok.location)),
            TokenKind::False => Ok(Expression::bool(false, tok.location)),
            TokenKind::Str(s) => Ok(Expression::string(s, tok.location)),
            TokenKind::Ident(name) => match self.peek_kind() {
                Some(TokenKind::LParen) => {
                    self.bump();
                    self.parse_call(name, tok.location)
                }
                Some(TokenKind::Caret) => {
                    self.bump();
                    let var = Expression::var(name, tok.location.clone());
                    Ok(Expression::deref(var, tok.location))
                }
                _ => Ok(Expression::var(name, tok.location)),
            },
            TokenKind::LParen => {
                let expr = self.parse_expression()?;
                self.expect(TokenKind::RParen)?;
                if matches!(self.peek_kind(), Some(TokenKind::Caret)) {
                    self.bump();
                    Ok(Expression::deref(expr, tok.location))
                } else {
                    Ok(expr)
                }
            }
            kind => Err(ParseError::Unexpected {
                location: tok.location,
                expected: "start of expression".to_string(),
                found: format!("'{kind}'"),
            }),
        }
    }

    // --- Token stream helpers ---

    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.index)
    }

    fn peek_kind(&self) -> Option<&TokenKind> {
        self.peek().map(|t| &t.kind)
    }

    fn peek_kind_at(&self, n: usize) -> Option<&TokenKind> {
        self.tokens.get(self.index + n).map(|t| &t.kind)
    }

    fn bump(&mut self) -> Option<Token> {
        let tok = self.tokens.get(self.index).cloned();
        if tok.is_some() {
            self.index += 1;
        }
        tok
    }

    fn expect(&mut self, expected: TokenKind) -> Result<Token, ParseError> {
        match self.bump() {
            Some(tok)
                if std::mem::discriminant(&tok.kind) == std::mem::discriminant(&expected) =>
            {
                Ok(tok)
            }
            Some(tok) => Err(ParseError::Unexpected {
                location: tok.location,
                expected: expected.describe().to_string(),
                found: format!("'{}'", tok.kind),
            }),
            None => Err(ParseError::UnexpectedEof {
                expected: expected.describe().to_string(),
            }),
        }
    }

    fn expect_ident(&mut self) -> Result<(String, Location), ParseError> {
        match self.bump() {
            Some(Token {
                kind: TokenKind::Ident(name),
                location,
            }) => Ok((name, location)),
            Some(tok) => Err(ParseError::Unexpected {
                location: tok.location,
                expected: "identifier".to_string(),
                found: format!("'{}'", tok.kind),
            }),
            None => Err(ParseError::UnexpectedEof {
                expected: "identifier".to_string(),
            }),
        }
    }

    fn unexpected(&self, expected: &str) -> ParseError {
        match self.peek() {
            Some(tok) => ParseError::Unexpected {
                location: tok.location.clone(),
                expected: expected.to_string(),
                found: format!("'{}'", tok.kind),
            },
            None => ParseError::UnexpectedEof {
                expected: expected.to_string(),
            },
        }
    }
}

/// Precedence and AST operator for an infix token. Higher binds tighter.
fn op_info(kind: &TokenKind) -> Option<(u8, BinOpKind)> {
    let info = match kind {
        TokenKind::OrOr => (3, BinOpKind::LogOr),
        TokenKind::AndAnd => (4, BinOpKind::LogAnd),
        TokenKind::EqEq => (5, BinOpKind::Eq),
        TokenKind::Ne => (5, BinOpKind::Ne),
        TokenKind::Pipe => (6, BinOpKind::BitOr),
        TokenKind::Lt => (7, BinOpKind::Lt),
        TokenKind::Le => (7, BinOpKind::Le),
        TokenKind::Gt => (7, BinOpKind::Gt),
        TokenKind::Ge => (7, BinOpKind::Ge),
        TokenKind::Amp => (8, BinOpKind::BitAnd),
        TokenKind::Plus => (10, BinOpKind::Add),
        TokenKind::Minus => (10, BinOpKind::Sub),
        TokenKind::Shl => (15, BinOpKind::Shl),
        TokenKind::Shr => (15, BinOpKind::Shr),
        TokenKind::Star => (20, BinOpKind::Mul),
        TokenKind::Slash => (20, BinOpKind::Div),
        _ => return None,
    };
    Some(info)
}
