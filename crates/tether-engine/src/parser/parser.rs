//! Recursive-descent parser with precedence climbing for binary operators.

use std::sync::Arc;

use crate::parser::ast::*;
use crate::parser::lexer::{LexError, Lexer};
use crate::parser::token::{Span, Token};

/// A syntax error with its 1-based position
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
#[error("{message} at {line}:{column}")]
pub struct ParseError {
    pub message: String,
    pub line: u32,
    pub column: u32,
}

impl ParseError {
    fn at(message: impl Into<String>, span: Span) -> Self {
        Self {
            message: message.into(),
            line: span.line,
            column: span.column,
        }
    }
}

impl From<LexError> for ParseError {
    fn from(err: LexError) -> Self {
        let span = *err.span();
        ParseError::at(err.to_string(), span)
    }
}

/// Declarations hoisted to the enclosing function (or program) scope
#[derive(Default)]
struct HoistScope {
    var_names: Vec<Name>,
    functions: Vec<Arc<FunctionNode>>,
}

impl HoistScope {
    fn declare_var(&mut self, name: &Name) {
        if !self.var_names.iter().any(|n| n == name) {
            self.var_names.push(name.clone());
        }
    }
}

type ParseResult<T> = Result<T, ParseError>;

/// Parse a complete script.
pub fn parse_program(source: &str, resource: &str) -> ParseResult<Program> {
    let tokens = Lexer::new(source).tokenize()?;
    let mut parser = Parser {
        tokens,
        pos: 0,
        resource: Arc::from(resource),
        scopes: vec![HoistScope::default()],
        allow_in: true,
    };
    let mut body = Vec::new();
    while !parser.at(&Token::Eof) {
        body.push(parser.parse_statement()?);
    }
    let scope = parser.scopes.pop().unwrap_or_default();
    Ok(Program {
        resource: parser.resource,
        body,
        var_names: scope.var_names,
        functions: scope.functions,
    })
}

struct Parser {
    tokens: Vec<(Token, Span)>,
    pos: usize,
    resource: Name,
    scopes: Vec<HoistScope>,
    /// Cleared while parsing a `for` initializer so `in` is not an operator
    allow_in: bool,
}

impl Parser {
    // ========================================================================
    // Token cursor
    // ========================================================================

    fn peek(&self) -> &Token {
        &self.tokens[self.pos].0
    }

    fn peek_at(&self, offset: usize) -> &Token {
        let index = (self.pos + offset).min(self.tokens.len() - 1);
        &self.tokens[index].0
    }

    fn span(&self) -> Span {
        self.tokens[self.pos].1
    }

    fn at(&self, token: &Token) -> bool {
        self.peek() == token
    }

    fn advance(&mut self) -> Token {
        let token = self.tokens[self.pos].0.clone();
        if self.pos < self.tokens.len() - 1 {
            self.pos += 1;
        }
        token
    }

    fn eat(&mut self, token: &Token) -> bool {
        if self.at(token) {
            self.advance();
            true
        } else {
            false
        }
    }

    fn expect(&mut self, token: &Token) -> ParseResult<Span> {
        let span = self.span();
        if self.eat(token) {
            Ok(span)
        } else {
            Err(self.unexpected())
        }
    }

    fn unexpected(&self) -> ParseError {
        let span = self.span();
        match self.peek() {
            Token::Eof => ParseError::at("Unexpected end of input", span),
            Token::Identifier(name) => {
                ParseError::at(format!("Unexpected identifier '{}'", name), span)
            }
            Token::Number(_) => ParseError::at("Unexpected number", span),
            Token::String(_) => ParseError::at("Unexpected string", span),
            token => ParseError::at(format!("Unexpected token '{}'", token), span),
        }
    }

    fn newline_before(&self) -> bool {
        self.pos > 0 && self.tokens[self.pos - 1].1.line < self.tokens[self.pos].1.line
    }

    /// Automatic semicolon insertion: `;`, `}`, end of input or a line break
    fn consume_semicolon(&mut self) -> ParseResult<()> {
        if self.eat(&Token::Semicolon)
            || self.at(&Token::RightBrace)
            || self.at(&Token::Eof)
            || self.newline_before()
        {
            Ok(())
        } else {
            Err(self.unexpected())
        }
    }

    fn identifier(&mut self) -> ParseResult<Name> {
        match self.peek() {
            Token::Identifier(name) => {
                let name = Arc::from(name.as_str());
                self.advance();
                Ok(name)
            }
            _ => Err(self.unexpected()),
        }
    }

    /// Property name after `.` or in an object literal; keywords allowed
    fn property_name(&mut self) -> ParseResult<Name> {
        let name: Name = match self.peek() {
            Token::Identifier(name) => Arc::from(name.as_str()),
            Token::String(s) => Arc::from(s.as_str()),
            Token::Number(n) => Arc::from(crate::vm::value::number_to_string(*n).as_str()),
            token => match token.keyword_text() {
                Some(text) => Arc::from(text),
                None => return Err(self.unexpected()),
            },
        };
        self.advance();
        Ok(name)
    }

    fn hoist(&mut self) -> &mut HoistScope {
        let last = self.scopes.len() - 1;
        &mut self.scopes[last]
    }

    // ========================================================================
    // Statements
    // ========================================================================

    fn parse_statement(&mut self) -> ParseResult<Stmt> {
        let span = self.span();
        let kind = match self.peek() {
            Token::LeftBrace => {
                let body = self.parse_block()?;
                let scoped = body.iter().any(|stmt| {
                    matches!(
                        stmt.kind,
                        StmtKind::Declaration(VarKind::Let | VarKind::Const, _)
                    )
                });
                StmtKind::Block { body, scoped }
            }
            Token::Var | Token::Let | Token::Const => {
                let (kind, declarators) = self.parse_declaration()?;
                self.consume_semicolon()?;
                StmtKind::Declaration(kind, declarators)
            }
            Token::Function => {
                self.advance();
                let function = self.parse_function(span, true)?;
                self.hoist().functions.push(function.clone());
                StmtKind::Function(function)
            }
            Token::If => self.parse_if()?,
            Token::For => self.parse_for()?,
            Token::While => {
                self.advance();
                self.expect(&Token::LeftParen)?;
                let test = self.parse_expression()?;
                self.expect(&Token::RightParen)?;
                let body = Box::new(self.parse_statement()?);
                StmtKind::While { test, body }
            }
            Token::Do => {
                self.advance();
                let body = Box::new(self.parse_statement()?);
                self.expect(&Token::While)?;
                self.expect(&Token::LeftParen)?;
                let test = self.parse_expression()?;
                self.expect(&Token::RightParen)?;
                self.eat(&Token::Semicolon);
                StmtKind::DoWhile { body, test }
            }
            Token::Break => {
                self.advance();
                self.consume_semicolon()?;
                StmtKind::Break
            }
            Token::Continue => {
                self.advance();
                self.consume_semicolon()?;
                StmtKind::Continue
            }
            Token::Return => {
                self.advance();
                let argument = if self.at(&Token::Semicolon)
                    || self.at(&Token::RightBrace)
                    || self.at(&Token::Eof)
                    || self.newline_before()
                {
                    None
                } else {
                    Some(self.parse_expression()?)
                };
                self.consume_semicolon()?;
                StmtKind::Return(argument)
            }
            Token::Throw => {
                self.advance();
                if self.newline_before() {
                    return Err(ParseError::at("Illegal newline after throw", self.span()));
                }
                let argument = self.parse_expression()?;
                self.consume_semicolon()?;
                StmtKind::Throw(argument)
            }
            Token::Try => self.parse_try()?,
            Token::Semicolon => {
                self.advance();
                StmtKind::Empty
            }
            _ => {
                let expr = self.parse_expression()?;
                self.consume_semicolon()?;
                StmtKind::Expression(expr)
            }
        };
        Ok(Stmt { kind, span })
    }

    fn parse_block(&mut self) -> ParseResult<Vec<Stmt>> {
        self.expect(&Token::LeftBrace)?;
        let mut body = Vec::new();
        while !self.at(&Token::RightBrace) {
            if self.at(&Token::Eof) {
                return Err(self.unexpected());
            }
            body.push(self.parse_statement()?);
        }
        self.advance();
        Ok(body)
    }

    fn parse_declaration(&mut self) -> ParseResult<(VarKind, Vec<VarDeclarator>)> {
        let kind = match self.advance() {
            Token::Var => VarKind::Var,
            Token::Let => VarKind::Let,
            _ => VarKind::Const,
        };
        let mut declarators = Vec::new();
        loop {
            let name_span = self.span();
            let name = self.identifier()?;
            let init = if self.eat(&Token::Equal) {
                Some(self.parse_assignment()?)
            } else {
                None
            };
            if kind == VarKind::Const && init.is_none() && self.allow_in {
                return Err(ParseError::at(
                    "Missing initializer in const declaration",
                    name_span,
                ));
            }
            if kind == VarKind::Var {
                self.hoist().declare_var(&name);
            }
            declarators.push(VarDeclarator { name, init });
            if !self.eat(&Token::Comma) {
                break;
            }
        }
        Ok((kind, declarators))
    }

    fn parse_if(&mut self) -> ParseResult<StmtKind> {
        self.advance();
        self.expect(&Token::LeftParen)?;
        let test = self.parse_expression()?;
        self.expect(&Token::RightParen)?;
        let consequent = Box::new(self.parse_statement()?);
        let alternate = if self.eat(&Token::Else) {
            Some(Box::new(self.parse_statement()?))
        } else {
            None
        };
        Ok(StmtKind::If {
            test,
            consequent,
            alternate,
        })
    }

    fn parse_for(&mut self) -> ParseResult<StmtKind> {
        self.advance();
        self.expect(&Token::LeftParen)?;

        // for (var x in obj) / for (x in obj)
        let declared_in = matches!(self.peek(), Token::Var | Token::Let | Token::Const)
            && matches!(self.peek_at(1), Token::Identifier(_))
            && self.peek_at(2) == &Token::In;
        let bare_in = matches!(self.peek(), Token::Identifier(_)) && self.peek_at(1) == &Token::In;
        if declared_in || bare_in {
            let kind = if declared_in {
                Some(match self.advance() {
                    Token::Var => VarKind::Var,
                    Token::Let => VarKind::Let,
                    _ => VarKind::Const,
                })
            } else {
                None
            };
            let name = self.identifier()?;
            if kind == Some(VarKind::Var) {
                self.hoist().declare_var(&name);
            }
            self.expect(&Token::In)?;
            let object = self.parse_expression()?;
            self.expect(&Token::RightParen)?;
            let body = Box::new(self.parse_statement()?);
            return Ok(StmtKind::ForIn {
                kind,
                name,
                object,
                body,
            });
        }

        let init = if self.at(&Token::Semicolon) {
            None
        } else {
            self.allow_in = false;
            let init = if matches!(self.peek(), Token::Var | Token::Let | Token::Const) {
                self.parse_declaration()
                    .map(|(kind, decls)| ForInit::Declaration(kind, decls))
            } else {
                self.parse_expression().map(ForInit::Expression)
            };
            self.allow_in = true;
            Some(init?)
        };
        self.expect(&Token::Semicolon)?;
        let test = if self.at(&Token::Semicolon) {
            None
        } else {
            Some(self.parse_expression()?)
        };
        self.expect(&Token::Semicolon)?;
        let update = if self.at(&Token::RightParen) {
            None
        } else {
            Some(self.parse_expression()?)
        };
        self.expect(&Token::RightParen)?;
        let body = Box::new(self.parse_statement()?);
        Ok(StmtKind::For {
            init,
            test,
            update,
            body,
        })
    }

    fn parse_try(&mut self) -> ParseResult<StmtKind> {
        self.advance();
        let block = self.parse_block()?;
        let mut param = None;
        let mut handler = None;
        if self.eat(&Token::Catch) {
            if self.eat(&Token::LeftParen) {
                param = Some(self.identifier()?);
                self.expect(&Token::RightParen)?;
            }
            handler = Some(self.parse_block()?);
        }
        let finalizer = if self.eat(&Token::Finally) {
            Some(self.parse_block()?)
        } else {
            None
        };
        if handler.is_none() && finalizer.is_none() {
            return Err(ParseError::at("Missing catch or finally after try", self.span()));
        }
        Ok(StmtKind::Try {
            block,
            param,
            handler,
            finalizer,
        })
    }

    /// Parse after the `function` keyword.
    fn parse_function(&mut self, span: Span, declaration: bool) -> ParseResult<Arc<FunctionNode>> {
        let name = match self.peek() {
            Token::Identifier(_) => Some(self.identifier()?),
            _ if declaration => return Err(self.unexpected()),
            _ => None,
        };
        self.expect(&Token::LeftParen)?;
        let mut params = Vec::new();
        while !self.at(&Token::RightParen) {
            params.push(self.identifier()?);
            if !self.eat(&Token::Comma) {
                break;
            }
        }
        self.expect(&Token::RightParen)?;

        let allow_in = std::mem::replace(&mut self.allow_in, true);
        self.scopes.push(HoistScope::default());
        let body = self.parse_block();
        let scope = self.scopes.pop().unwrap_or_default();
        self.allow_in = allow_in;

        Ok(Arc::new(FunctionNode {
            name,
            params,
            body: body?,
            var_names: scope.var_names,
            functions: scope.functions,
            resource: self.resource.clone(),
            span,
        }))
    }

    // ========================================================================
    // Expressions
    // ========================================================================

    fn parse_expression(&mut self) -> ParseResult<Expr> {
        let first = self.parse_assignment()?;
        if !self.at(&Token::Comma) {
            return Ok(first);
        }
        let span = first.span;
        let mut exprs = vec![first];
        while self.eat(&Token::Comma) {
            exprs.push(self.parse_assignment()?);
        }
        Ok(Expr::new(ExprKind::Sequence(exprs), span))
    }

    fn parse_assignment(&mut self) -> ParseResult<Expr> {
        let target = self.parse_conditional()?;
        let op = match self.peek() {
            Token::Equal => None,
            Token::PlusEqual => Some(BinaryOp::Add),
            Token::MinusEqual => Some(BinaryOp::Sub),
            Token::StarEqual => Some(BinaryOp::Mul),
            Token::SlashEqual => Some(BinaryOp::Div),
            Token::PercentEqual => Some(BinaryOp::Mod),
            _ => return Ok(target),
        };
        if !target.is_assignment_target() {
            return Err(ParseError::at(
                "Invalid left-hand side in assignment",
                target.span,
            ));
        }
        self.advance();
        let value = self.parse_assignment()?;
        let span = target.span;
        Ok(Expr::new(
            ExprKind::Assign {
                op,
                target: Box::new(target),
                value: Box::new(value),
            },
            span,
        ))
    }

    fn parse_conditional(&mut self) -> ParseResult<Expr> {
        let test = self.parse_binary(1)?;
        if !self.eat(&Token::Question) {
            return Ok(test);
        }
        let allow_in = std::mem::replace(&mut self.allow_in, true);
        let consequent = self.parse_assignment();
        self.allow_in = allow_in;
        let consequent = consequent?;
        self.expect(&Token::Colon)?;
        let alternate = self.parse_assignment()?;
        let span = test.span;
        Ok(Expr::new(
            ExprKind::Conditional {
                test: Box::new(test),
                consequent: Box::new(consequent),
                alternate: Box::new(alternate),
            },
            span,
        ))
    }

    fn binary_operator(&self) -> Option<(u8, BinaryOperator)> {
        use BinaryOperator::*;
        let op = match self.peek() {
            Token::PipePipe => (1, Logical(LogicalOp::Or)),
            Token::AmpAmp => (2, Logical(LogicalOp::And)),
            Token::Pipe => (3, Binary(BinaryOp::BitOr)),
            Token::Caret => (4, Binary(BinaryOp::BitXor)),
            Token::Amp => (5, Binary(BinaryOp::BitAnd)),
            Token::EqualEqual => (6, Binary(BinaryOp::Eq)),
            Token::BangEqual => (6, Binary(BinaryOp::NotEq)),
            Token::EqualEqualEqual => (6, Binary(BinaryOp::StrictEq)),
            Token::BangEqualEqual => (6, Binary(BinaryOp::StrictNotEq)),
            Token::Less => (7, Binary(BinaryOp::Less)),
            Token::LessEqual => (7, Binary(BinaryOp::LessEq)),
            Token::Greater => (7, Binary(BinaryOp::Greater)),
            Token::GreaterEqual => (7, Binary(BinaryOp::GreaterEq)),
            Token::Instanceof => (7, Binary(BinaryOp::Instanceof)),
            Token::In if self.allow_in => (7, Binary(BinaryOp::In)),
            Token::LessLess => (8, Binary(BinaryOp::Shl)),
            Token::GreaterGreater => (8, Binary(BinaryOp::Shr)),
            Token::GreaterGreaterGreater => (8, Binary(BinaryOp::UShr)),
            Token::Plus => (9, Binary(BinaryOp::Add)),
            Token::Minus => (9, Binary(BinaryOp::Sub)),
            Token::Star => (10, Binary(BinaryOp::Mul)),
            Token::Slash => (10, Binary(BinaryOp::Div)),
            Token::Percent => (10, Binary(BinaryOp::Mod)),
            _ => return None,
        };
        Some(op)
    }

    fn parse_binary(&mut self, min_precedence: u8) -> ParseResult<Expr> {
        let mut left = self.parse_unary()?;
        while let Some((precedence, op)) = self.binary_operator() {
            if precedence < min_precedence {
                break;
            }
            self.advance();
            let right = self.parse_binary(precedence + 1)?;
            let span = left.span;
            let kind = match op {
                BinaryOperator::Binary(op) => ExprKind::Binary {
                    op,
                    left: Box::new(left),
                    right: Box::new(right),
                },
                BinaryOperator::Logical(op) => ExprKind::Logical {
                    op,
                    left: Box::new(left),
                    right: Box::new(right),
                },
            };
            left = Expr::new(kind, span);
        }
        Ok(left)
    }

    fn parse_unary(&mut self) -> ParseResult<Expr> {
        let span = self.span();
        let op = match self.peek() {
            Token::Bang => UnaryOp::Not,
            Token::Minus => UnaryOp::Minus,
            Token::Plus => UnaryOp::Plus,
            Token::Tilde => UnaryOp::BitNot,
            Token::Typeof => UnaryOp::Typeof,
            Token::Void => UnaryOp::Void,
            Token::Delete => UnaryOp::Delete,
            Token::PlusPlus | Token::MinusMinus => {
                let increment = self.advance() == Token::PlusPlus;
                let target = self.parse_unary()?;
                if !target.is_assignment_target() {
                    return Err(ParseError::at(
                        "Invalid left-hand side expression in prefix operation",
                        target.span,
                    ));
                }
                return Ok(Expr::new(
                    ExprKind::Update {
                        increment,
                        prefix: true,
                        target: Box::new(target),
                    },
                    span,
                ));
            }
            _ => return self.parse_postfix(),
        };
        self.advance();
        let argument = self.parse_unary()?;
        Ok(Expr::new(
            ExprKind::Unary {
                op,
                argument: Box::new(argument),
            },
            span,
        ))
    }

    fn parse_postfix(&mut self) -> ParseResult<Expr> {
        let expr = self.parse_call_member()?;
        if matches!(self.peek(), Token::PlusPlus | Token::MinusMinus) && !self.newline_before() {
            if !expr.is_assignment_target() {
                return Err(ParseError::at(
                    "Invalid left-hand side expression in postfix operation",
                    expr.span,
                ));
            }
            let increment = self.advance() == Token::PlusPlus;
            let span = expr.span;
            return Ok(Expr::new(
                ExprKind::Update {
                    increment,
                    prefix: false,
                    target: Box::new(expr),
                },
                span,
            ));
        }
        Ok(expr)
    }

    fn parse_arguments(&mut self) -> ParseResult<Vec<Expr>> {
        self.expect(&Token::LeftParen)?;
        let allow_in = std::mem::replace(&mut self.allow_in, true);
        let mut args = Vec::new();
        while !self.at(&Token::RightParen) {
            match self.parse_assignment() {
                Ok(arg) => args.push(arg),
                Err(err) => {
                    self.allow_in = allow_in;
                    return Err(err);
                }
            }
            if !self.eat(&Token::Comma) {
                break;
            }
        }
        self.allow_in = allow_in;
        self.expect(&Token::RightParen)?;
        Ok(args)
    }

    fn parse_new(&mut self) -> ParseResult<Expr> {
        let span = self.span();
        self.advance();
        let mut callee = if self.at(&Token::New) {
            self.parse_new()?
        } else {
            self.parse_primary()?
        };
        // Member accesses bind tighter than the constructor call
        loop {
            match self.peek() {
                Token::Dot => {
                    self.advance();
                    let property = self.property_name()?;
                    let span = callee.span;
                    callee = Expr::new(
                        ExprKind::Member {
                            object: Box::new(callee),
                            property,
                        },
                        span,
                    );
                }
                Token::LeftBracket => {
                    self.advance();
                    let index = self.parse_expression()?;
                    self.expect(&Token::RightBracket)?;
                    let span = callee.span;
                    callee = Expr::new(
                        ExprKind::Index {
                            object: Box::new(callee),
                            index: Box::new(index),
                        },
                        span,
                    );
                }
                _ => break,
            }
        }
        let args = if self.at(&Token::LeftParen) {
            self.parse_arguments()?
        } else {
            Vec::new()
        };
        Ok(Expr::new(
            ExprKind::New {
                callee: Box::new(callee),
                args,
            },
            span,
        ))
    }

    fn parse_call_member(&mut self) -> ParseResult<Expr> {
        let mut expr = if self.at(&Token::New) {
            self.parse_new()?
        } else {
            self.parse_primary()?
        };
        loop {
            let span = expr.span;
            match self.peek() {
                Token::Dot => {
                    self.advance();
                    let property = self.property_name()?;
                    expr = Expr::new(
                        ExprKind::Member {
                            object: Box::new(expr),
                            property,
                        },
                        span,
                    );
                }
                Token::LeftBracket => {
                    self.advance();
                    let allow_in = std::mem::replace(&mut self.allow_in, true);
                    let index = self.parse_expression();
                    self.allow_in = allow_in;
                    let index = index?;
                    self.expect(&Token::RightBracket)?;
                    expr = Expr::new(
                        ExprKind::Index {
                            object: Box::new(expr),
                            index: Box::new(index),
                        },
                        span,
                    );
                }
                Token::LeftParen => {
                    let args = self.parse_arguments()?;
                    expr = Expr::new(
                        ExprKind::Call {
                            callee: Box::new(expr),
                            args,
                        },
                        span,
                    );
                }
                _ => return Ok(expr),
            }
        }
    }

    fn parse_primary(&mut self) -> ParseResult<Expr> {
        let span = self.span();
        let kind = match self.peek().clone() {
            Token::Number(n) => {
                self.advance();
                ExprKind::Number(n)
            }
            Token::String(s) => {
                self.advance();
                ExprKind::String(Arc::from(s.as_str()))
            }
            Token::True | Token::False => ExprKind::Bool(self.advance() == Token::True),
            Token::Null => {
                self.advance();
                ExprKind::Null
            }
            Token::This => {
                self.advance();
                ExprKind::This
            }
            Token::Identifier(name) => {
                self.advance();
                ExprKind::Identifier(Arc::from(name.as_str()))
            }
            Token::LeftParen => {
                self.advance();
                let allow_in = std::mem::replace(&mut self.allow_in, true);
                let expr = self.parse_expression();
                self.allow_in = allow_in;
                let expr = expr?;
                self.expect(&Token::RightParen)?;
                return Ok(expr);
            }
            Token::LeftBracket => {
                self.advance();
                let mut elements = Vec::new();
                while !self.at(&Token::RightBracket) {
                    elements.push(self.parse_assignment()?);
                    if !self.eat(&Token::Comma) {
                        break;
                    }
                }
                self.expect(&Token::RightBracket)?;
                ExprKind::Array(elements)
            }
            Token::LeftBrace => {
                self.advance();
                let mut properties = Vec::new();
                while !self.at(&Token::RightBrace) {
                    let key_span = self.span();
                    let shorthand = matches!(self.peek(), Token::Identifier(_))
                        && matches!(self.peek_at(1), Token::Comma | Token::RightBrace);
                    let key = self.property_name()?;
                    let value = if shorthand {
                        Expr::new(ExprKind::Identifier(key.clone()), key_span)
                    } else {
                        self.expect(&Token::Colon)?;
                        self.parse_assignment()?
                    };
                    properties.push((key, value));
                    if !self.eat(&Token::Comma) {
                        break;
                    }
                }
                self.expect(&Token::RightBrace)?;
                ExprKind::Object(properties)
            }
            Token::Function => {
                self.advance();
                ExprKind::Function(self.parse_function(span, false)?)
            }
            _ => return Err(self.unexpected()),
        };
        Ok(Expr::new(kind, span))
    }
}

#[derive(Clone, Copy)]
enum BinaryOperator {
    Binary(BinaryOp),
    Logical(LogicalOp),
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(source: &str) -> Program {
        parse_program(source, "test.js").unwrap()
    }

    fn first_expr(source: &str) -> Expr {
        let program = parse(source);
        match program.body.into_iter().next().map(|s| s.kind) {
            Some(StmtKind::Expression(expr)) => expr,
            other => panic!("expected expression statement, got {:?}", other),
        }
    }

    #[test]
    fn test_precedence() {
        let expr = first_expr("1 + 2 * 3");
        match expr.kind {
            ExprKind::Binary {
                op: BinaryOp::Add,
                right,
                ..
            } => assert!(matches!(right.kind, ExprKind::Binary { op: BinaryOp::Mul, .. })),
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_assignment_is_right_associative() {
        let expr = first_expr("a = b = 3");
        match expr.kind {
            ExprKind::Assign { value, .. } => {
                assert!(matches!(value.kind, ExprKind::Assign { .. }))
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_hoisting_collects_vars_and_functions() {
        let program = parse("var a = 1; if (a) { var b; } function f() { var inner; }");
        assert_eq!(program.var_names.len(), 2);
        assert_eq!(program.functions.len(), 1);
        assert_eq!(program.functions[0].var_names.len(), 1);
    }

    #[test]
    fn test_asi_on_newline() {
        let program = parse("var a = 1\nvar b = 2\na + b");
        assert_eq!(program.body.len(), 3);
    }

    #[test]
    fn test_for_in_and_classic_for() {
        let program = parse("for (var k in o) {} for (var i = 0; i < 3; i++) {}");
        assert!(matches!(program.body[0].kind, StmtKind::ForIn { .. }));
        assert!(matches!(program.body[1].kind, StmtKind::For { .. }));
    }

    #[test]
    fn test_new_with_member_callee() {
        let expr = first_expr("new a.B(1)");
        match expr.kind {
            ExprKind::New { callee, args } => {
                assert!(matches!(callee.kind, ExprKind::Member { .. }));
                assert_eq!(args.len(), 1);
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_object_literal_keys() {
        let expr = first_expr("({ a: 1, 'b': 2, 3: 3, default: 4, c })");
        match expr.kind {
            ExprKind::Object(props) => {
                let keys: Vec<&str> = props.iter().map(|(k, _)| k.as_ref()).collect();
                assert_eq!(keys, vec!["a", "b", "3", "default", "c"]);
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_syntax_error_position() {
        let err = parse_program("var x = ;", "test.js").unwrap_err();
        assert_eq!(err.message, "Unexpected token ';'");
        assert_eq!((err.line, err.column), (1, 9));
    }

    #[test]
    fn test_unexpected_end_of_input() {
        let err = parse_program("function f() {", "test.js").unwrap_err();
        assert_eq!(err.message, "Unexpected end of input");
    }

    #[test]
    fn test_invalid_assignment_target() {
        let err = parse_program("1 = 2", "test.js").unwrap_err();
        assert!(err.message.contains("left-hand side"));
    }
}
