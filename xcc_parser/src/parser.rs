//! Recursive-descent parser (spec.md §4.2).
//!
//! `current`/`previous`/`advance`/`check`/`check_advance`/`check_any_of` are
//! the only lookahead/consume primitives; there is no backtracking.
//! Precedence is climbed through one method per level, low to high, each
//! left-associative except assignment and unary prefix.

use std::mem::discriminant;

use xcc_lexer::token::{NumberLiteral as LexNumber, Token, TokenKind};

use crate::ast::{
    AssignOp, BinaryOp, FnDecl, FnDef, MemberKind, Node, NumberLiteral, NumberTag, Program,
    StructDef, TypeExpr, TypedIdentifier, UnaryOp,
};
use crate::error::{ParseError, ParseResult};

pub struct Parser {
    tokens: Vec<Token>,
    pos: usize,
    is_repl: bool,
}

impl Parser {
    pub fn new(tokens: Vec<Token>, is_repl: bool) -> Self {
        Self {
            tokens,
            pos: 0,
            is_repl,
        }
    }

    pub fn parse(tokens: Vec<Token>, is_repl: bool) -> ParseResult<Program> {
        Parser::new(tokens, is_repl).parse_program()
    }

    // ---- lookahead/consume primitives ----

    fn current(&self) -> &Token {
        &self.tokens[self.pos.min(self.tokens.len() - 1)]
    }

    fn previous(&self) -> &Token {
        &self.tokens[self.pos.saturating_sub(1)]
    }

    fn is_at_end(&self) -> bool {
        self.current().kind == TokenKind::Eof
    }

    fn advance(&mut self) -> &Token {
        if !self.is_at_end() {
            self.pos += 1;
        }
        self.previous()
    }

    fn check(&self, kind: &TokenKind) -> bool {
        discriminant(&self.current().kind) == discriminant(kind)
    }

    fn check_advance(&mut self, kind: &TokenKind) -> bool {
        if self.check(kind) {
            self.advance();
            true
        } else {
            false
        }
    }

    fn check_any_of(&self, kinds: &[TokenKind]) -> bool {
        kinds.iter().any(|k| self.check(k))
    }

    fn expect(&mut self, kind: &TokenKind, what: &str) -> ParseResult<&Token> {
        if self.check(kind) {
            Ok(self.advance())
        } else {
            Err(self.error(format!(
                "expected {what}, found '{}'",
                self.current().text
            )))
        }
    }

    fn expect_identifier(&mut self) -> ParseResult<String> {
        if self.check(&TokenKind::Identifier) {
            Ok(self.advance().text.clone())
        } else {
            Err(self.error(format!(
                "expected identifier, found '{}'",
                self.current().text
            )))
        }
    }

    fn error(&self, message: impl Into<String>) -> ParseError {
        ParseError::new(self.current().line, message)
    }

    // ---- top level ----

    fn parse_program(&mut self) -> ParseResult<Program> {
        let mut items = Vec::new();
        while !self.is_at_end() {
            items.push(self.parse_top_level_item()?);
        }
        Ok(Program { items })
    }

    fn parse_top_level_item(&mut self) -> ParseResult<Node> {
        if self.check(&TokenKind::Extern) || self.check(&TokenKind::Fn) {
            return self.parse_function(None);
        }
        if self.check(&TokenKind::Var) {
            let node = self.parse_var_decl_inner(true)?;
            self.expect(&TokenKind::Semicolon, "';' after global variable declaration")?;
            return Ok(node);
        }
        if self.check(&TokenKind::Struct) {
            return self.parse_struct();
        }
        if self.is_repl {
            let stmt = self.parse_statement()?;
            self.check_advance(&TokenKind::Semicolon);
            return Ok(stmt);
        }
        Err(self.error(format!(
            "unexpected top-level token '{}'; expected fn/var/struct",
            self.current().text
        )))
    }

    fn parse_struct(&mut self) -> ParseResult<Node> {
        self.advance(); // struct
        let name = self.expect_identifier()?;
        self.expect(&TokenKind::LBrace, "'{' after struct name")?;

        let mut fields = Vec::new();
        let mut methods = Vec::new();

        while !self.check(&TokenKind::RBrace) && !self.is_at_end() {
            if self.check(&TokenKind::Fn) {
                match self.parse_function(Some(&name))? {
                    Node::FnDef(def) => methods.push(def),
                    Node::FnDecl(_) => return Err(self.error("struct methods must have a body")),
                    _ => unreachable!(),
                }
            } else {
                let field_name = self.expect_identifier()?;
                self.expect(&TokenKind::Colon, "':' after field name")?;
                let ty = self.parse_type_expr()?;
                self.expect(&TokenKind::Semicolon, "';' after struct field")?;
                fields.push(TypedIdentifier {
                    name: field_name,
                    ty: Some(ty),
                    init: None,
                });
            }
        }

        self.expect(&TokenKind::RBrace, "'}' to close struct body")?;
        Ok(Node::Struct(StructDef {
            name,
            fields,
            methods,
        }))
    }

    fn parse_function(&mut self, struct_name: Option<&str>) -> ParseResult<Node> {
        let is_extern = self.check_advance(&TokenKind::Extern);
        self.expect(&TokenKind::Fn, "'fn'")?;
        let name = self.expect_identifier()?;
        self.expect(&TokenKind::LParen, "'(' after function name")?;
        let (params, is_variadic) = self.parse_param_list(struct_name)?;
        self.expect(&TokenKind::RParen, "')' after parameter list")?;
        self.expect(&TokenKind::Colon, "':' before return type")?;
        let return_ty = self.parse_type_expr()?;

        let decl = FnDecl {
            name,
            return_ty,
            params,
            is_extern,
            is_variadic,
            is_method: struct_name.is_some(),
        };

        if self.check_advance(&TokenKind::Semicolon) {
            return Ok(Node::FnDecl(decl));
        }

        let body = self.parse_block()?;
        Ok(Node::FnDef(FnDef {
            decl,
            body: Box::new(body),
        }))
    }

    fn parse_param_list(
        &mut self,
        struct_name: Option<&str>,
    ) -> ParseResult<(Vec<TypedIdentifier>, bool)> {
        let mut params = Vec::new();
        let mut is_variadic = false;

        // A method always receives `self` as its first parameter, whether
        // the programmer wrote it or not. An explicitly-written `self` is
        // followed by the usual `,` before any further declared parameter;
        // an implicit one leaves no token between it and the first
        // explicitly declared parameter, so only consume a separating comma
        // when `self` was actually present in the source.
        let mut expect_leading_comma = false;
        if let Some(name) = struct_name {
            let wrote_self = self.check_advance(&TokenKind::SelfKw);
            params.push(TypedIdentifier {
                name: "self".to_string(),
                ty: Some(TypeExpr::named(name).pointer_to()),
                init: None,
            });
            expect_leading_comma = wrote_self;
        }

        if self.check(&TokenKind::RParen) {
            return Ok((params, is_variadic));
        }

        if expect_leading_comma && !self.check_advance(&TokenKind::Comma) {
            return Ok((params, is_variadic));
        }

        loop {
            if self.check_advance(&TokenKind::Ellipsis) {
                is_variadic = true;
                break;
            }

            let pname = self.expect_identifier()?;
            self.expect(&TokenKind::Colon, "':' after parameter name")?;
            let ty = self.parse_type_expr()?;
            params.push(TypedIdentifier {
                name: pname,
                ty: Some(ty),
                init: None,
            });

            if self.check_advance(&TokenKind::Comma) {
                continue;
            }
            break;
        }

        Ok((params, is_variadic))
    }

    fn parse_type_expr(&mut self) -> ParseResult<TypeExpr> {
        let name = if self.check_advance(&TokenKind::SelfKw) {
            "Self".to_string()
        } else {
            self.expect_identifier()?
        };
        let mut depth = 0;
        while self.check_advance(&TokenKind::Star) {
            depth += 1;
        }
        Ok(TypeExpr {
            name,
            pointer_depth: depth,
        })
    }

    // ---- statements ----

    fn parse_block(&mut self) -> ParseResult<Node> {
        self.expect(&TokenKind::LBrace, "'{'")?;
        let mut stmts = Vec::new();
        while !self.check(&TokenKind::RBrace) && !self.is_at_end() {
            stmts.push(self.parse_statement()?);
            self.check_advance(&TokenKind::Semicolon);
        }
        self.expect(&TokenKind::RBrace, "'}' to close block")?;
        Ok(Node::Block(stmts))
    }

    fn parse_statement(&mut self) -> ParseResult<Node> {
        if self.check(&TokenKind::Var) {
            return self.parse_var_decl_inner(false);
        }
        if self.check(&TokenKind::If) {
            return self.parse_if();
        }
        if self.check(&TokenKind::For) {
            return self.parse_for();
        }
        if self.check(&TokenKind::While) {
            return self.parse_while();
        }
        if self.check(&TokenKind::Return) {
            return self.parse_return();
        }
        if self.check(&TokenKind::LBrace) {
            return self.parse_block();
        }
        self.parse_expression()
    }

    fn parse_var_decl_inner(&mut self, is_global: bool) -> ParseResult<Node> {
        self.expect(&TokenKind::Var, "'var'")?;
        let name = self.expect_identifier()?;
        let ty = if self.check_advance(&TokenKind::Colon) {
            Some(self.parse_type_expr()?)
        } else {
            None
        };
        let init = if self.check_advance(&TokenKind::Assign) {
            Some(Box::new(self.parse_expression()?))
        } else {
            None
        };
        if ty.is_none() && init.is_none() {
            return Err(self.error(format!(
                "variable '{name}' needs a type annotation or an initializer"
            )));
        }
        Ok(Node::VarDecl {
            name,
            ty,
            init,
            is_global,
        })
    }

    fn parse_if(&mut self) -> ParseResult<Node> {
        self.advance(); // if
        self.expect(&TokenKind::LParen, "'(' after if")?;
        let cond = self.parse_expression()?;
        self.expect(&TokenKind::RParen, "')' after if condition")?;
        let then_branch = self.parse_statement()?;
        let else_branch = if self.check_advance(&TokenKind::Else) {
            Some(Box::new(self.parse_statement()?))
        } else {
            None
        };
        Ok(Node::If {
            cond: Box::new(cond),
            then_branch: Box::new(then_branch),
            else_branch,
        })
    }

    fn parse_for(&mut self) -> ParseResult<Node> {
        self.advance(); // for
        self.expect(&TokenKind::LParen, "'(' after for")?;
        let init = self.parse_var_decl_inner(false)?;
        self.expect(&TokenKind::Semicolon, "';' after for-loop init")?;
        let cond = self.parse_expression()?;
        self.expect(&TokenKind::Semicolon, "';' after for-loop condition")?;
        let step = self.parse_expression()?;
        self.expect(&TokenKind::RParen, "')' after for-loop step")?;
        let body = self.parse_statement()?;
        Ok(Node::For {
            init: Box::new(init),
            cond: Box::new(cond),
            step: Box::new(step),
            body: Box::new(body),
        })
    }

    fn parse_while(&mut self) -> ParseResult<Node> {
        self.advance(); // while
        self.expect(&TokenKind::LParen, "'(' after while")?;
        let cond = self.parse_expression()?;
        self.expect(&TokenKind::RParen, "')' after while condition")?;
        let body = self.parse_statement()?;
        Ok(Node::While {
            cond: Box::new(cond),
            body: Box::new(body),
        })
    }

    fn parse_return(&mut self) -> ParseResult<Node> {
        self.advance(); // return
        if self.check(&TokenKind::Semicolon) || self.check(&TokenKind::RBrace) {
            Ok(Node::Return(None))
        } else {
            let value = self.parse_expression()?;
            Ok(Node::Return(Some(Box::new(value))))
        }
    }

    // ---- expressions, low to high precedence ----

    fn parse_expression(&mut self) -> ParseResult<Node> {
        self.parse_assignment()
    }

    const ASSIGN_TOKENS: &'static [TokenKind] = &[
        TokenKind::Assign,
        TokenKind::PlusAssign,
        TokenKind::MinusAssign,
        TokenKind::StarAssign,
        TokenKind::SlashAssign,
        TokenKind::AmpAssign,
        TokenKind::PipeAssign,
        TokenKind::AndAndAssign,
        TokenKind::OrOrAssign,
    ];

    fn assign_op_for(kind: &TokenKind) -> Option<AssignOp> {
        Some(match kind {
            TokenKind::Assign => AssignOp::Assign,
            TokenKind::PlusAssign => AssignOp::Compound(BinaryOp::Add),
            TokenKind::MinusAssign => AssignOp::Compound(BinaryOp::Sub),
            TokenKind::StarAssign => AssignOp::Compound(BinaryOp::Mul),
            TokenKind::SlashAssign => AssignOp::Compound(BinaryOp::Div),
            TokenKind::AmpAssign => AssignOp::Compound(BinaryOp::BitAnd),
            TokenKind::PipeAssign => AssignOp::Compound(BinaryOp::BitOr),
            TokenKind::AndAndAssign => AssignOp::Compound(BinaryOp::And),
            TokenKind::OrOrAssign => AssignOp::Compound(BinaryOp::Or),
            _ => return None,
        })
    }

    fn parse_assignment(&mut self) -> ParseResult<Node> {
        let lhs = self.parse_logic()?;

        if self.check_any_of(Self::ASSIGN_TOKENS) {
            let op = Self::assign_op_for(&self.current().kind).expect("checked by check_any_of");
            if !lhs.is_lvalue_form() {
                return Err(self.error("invalid assignment target"));
            }
            self.advance();
            let rhs = self.parse_assignment()?;
            return Ok(Node::Assign {
                op,
                lhs: Box::new(lhs),
                rhs: Box::new(rhs),
            });
        }

        Ok(lhs)
    }

    fn parse_logic(&mut self) -> ParseResult<Node> {
        let mut lhs = self.parse_equality()?;
        loop {
            let op = match self.current().kind {
                TokenKind::AndAnd => BinaryOp::And,
                TokenKind::OrOr => BinaryOp::Or,
                TokenKind::Amp => BinaryOp::BitAnd,
                TokenKind::Pipe => BinaryOp::BitOr,
                _ => break,
            };
            self.advance();
            let rhs = self.parse_equality()?;
            lhs = Node::Binary {
                op,
                lhs: Box::new(lhs),
                rhs: Box::new(rhs),
            };
        }
        Ok(lhs)
    }

    fn parse_equality(&mut self) -> ParseResult<Node> {
        let mut lhs = self.parse_comparison()?;
        loop {
            let op = match self.current().kind {
                TokenKind::EqEq => BinaryOp::Eq,
                TokenKind::NotEq => BinaryOp::NotEq,
                _ => break,
            };
            self.advance();
            let rhs = self.parse_comparison()?;
            lhs = Node::Binary {
                op,
                lhs: Box::new(lhs),
                rhs: Box::new(rhs),
            };
        }
        Ok(lhs)
    }

    fn parse_comparison(&mut self) -> ParseResult<Node> {
        let mut lhs = self.parse_term()?;
        loop {
            let op = match self.current().kind {
                TokenKind::Lt => BinaryOp::Lt,
                TokenKind::Le => BinaryOp::Le,
                TokenKind::Gt => BinaryOp::Gt,
                TokenKind::Ge => BinaryOp::Ge,
                _ => break,
            };
            self.advance();
            let rhs = self.parse_term()?;
            lhs = Node::Binary {
                op,
                lhs: Box::new(lhs),
                rhs: Box::new(rhs),
            };
        }
        Ok(lhs)
    }

    fn parse_term(&mut self) -> ParseResult<Node> {
        let mut lhs = self.parse_factor()?;
        loop {
            let op = match self.current().kind {
                TokenKind::Plus => BinaryOp::Add,
                TokenKind::Minus => BinaryOp::Sub,
                _ => break,
            };
            self.advance();
            let rhs = self.parse_factor()?;
            lhs = Node::Binary {
                op,
                lhs: Box::new(lhs),
                rhs: Box::new(rhs),
            };
        }
        Ok(lhs)
    }

    fn parse_factor(&mut self) -> ParseResult<Node> {
        let mut lhs = self.parse_cast()?;
        loop {
            let op = match self.current().kind {
                TokenKind::Star => BinaryOp::Mul,
                TokenKind::Slash => BinaryOp::Div,
                _ => break,
            };
            self.advance();
            let rhs = self.parse_cast()?;
            lhs = Node::Binary {
                op,
                lhs: Box::new(lhs),
                rhs: Box::new(rhs),
            };
        }
        Ok(lhs)
    }

    fn parse_cast(&mut self) -> ParseResult<Node> {
        let mut expr = self.parse_unary()?;
        while self.check_advance(&TokenKind::As) {
            let ty = self.parse_type_expr()?;
            expr = Node::Cast {
                expr: Box::new(expr),
                ty,
            };
        }
        Ok(expr)
    }

    fn parse_unary(&mut self) -> ParseResult<Node> {
        let op = match self.current().kind {
            TokenKind::Bang => Some(UnaryOp::Not),
            TokenKind::Minus => Some(UnaryOp::Neg),
            TokenKind::Amp => Some(UnaryOp::Addr),
            TokenKind::Star => Some(UnaryOp::Deref),
            _ => None,
        };
        if let Some(op) = op {
            self.advance();
            let rhs = self.parse_unary()?;
            return Ok(Node::Unary {
                op,
                rhs: Box::new(rhs),
            });
        }
        self.parse_subscript()
    }

    fn parse_subscript(&mut self) -> ParseResult<Node> {
        let mut base = self.parse_primary()?;
        while self.check_advance(&TokenKind::LBracket) {
            let index = self.parse_expression()?;
            self.expect(&TokenKind::RBracket, "']' after subscript index")?;
            base = Node::Subscript {
                base: Box::new(base),
                index: Box::new(index),
            };
        }
        Ok(base)
    }

    fn parse_primary(&mut self) -> ParseResult<Node> {
        match self.current().kind.clone() {
            TokenKind::Number(lit) => {
                self.advance();
                Ok(match lit {
                    LexNumber::Integer(v) => {
                        Node::Number(NumberTag::Integer, NumberLiteral::Integer(v))
                    }
                    LexNumber::Floating(v) => {
                        Node::Number(NumberTag::Floating, NumberLiteral::Floating(v))
                    }
                })
            }
            TokenKind::String => {
                let text = self.advance().text.clone();
                Ok(Node::String(text))
            }
            TokenKind::Char(byte) => {
                self.advance();
                Ok(Node::Number(
                    NumberTag::Integer,
                    NumberLiteral::Integer(byte as i64),
                ))
            }
            TokenKind::LParen => {
                self.advance();
                let expr = self.parse_expression()?;
                self.expect(&TokenKind::RParen, "')' to close parenthesized expression")?;
                Ok(expr)
            }
            TokenKind::Identifier | TokenKind::SelfKw => self.parse_lvalue_or_call(),
            _ => Err(self.error(format!("unexpected token '{}'", self.current().text))),
        }
    }

    fn parse_lvalue_or_call(&mut self) -> ParseResult<Node> {
        let name = if self.check_advance(&TokenKind::SelfKw) {
            "self".to_string()
        } else {
            self.expect_identifier()?
        };

        let mut base = Node::Identifier(name);

        loop {
            if self.check_advance(&TokenKind::Dot) {
                let name = self.expect_identifier()?;
                base = Node::MemberAccess {
                    kind: MemberKind::Value,
                    lhs: Box::new(base),
                    name,
                };
            } else if self.check_advance(&TokenKind::Arrow) {
                let name = self.expect_identifier()?;
                base = Node::MemberAccess {
                    kind: MemberKind::Pointer,
                    lhs: Box::new(base),
                    name,
                };
            } else {
                break;
            }
        }

        if self.check_advance(&TokenKind::LParen) {
            let args = self.parse_arg_list()?;
            self.expect(&TokenKind::RParen, "')' after call arguments")?;
            base = Node::Call {
                callee: Box::new(base),
                args,
            };
        }

        Ok(base)
    }

    fn parse_arg_list(&mut self) -> ParseResult<Vec<Node>> {
        let mut args = Vec::new();
        if self.check(&TokenKind::RParen) {
            return Ok(args);
        }
        loop {
            args.push(self.parse_expression()?);
            if self.check_advance(&TokenKind::Comma) {
                continue;
            }
            break;
        }
        Ok(args)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use test_case::test_case;
    use xcc_lexer::Lexer;

    fn parse(src: &str) -> Program {
        let tokens = Lexer::tokenize(src).expect("lex ok");
        Parser::parse(tokens, false).expect("parse ok")
    }

    fn return_expr(prog: &Program) -> &Node {
        let Node::FnDef(def) = &prog.items[0] else {
            panic!("expected FnDef")
        };
        let Node::Block(stmts) = def.body.as_ref() else {
            panic!("expected Block body")
        };
        let Node::Return(Some(expr)) = &stmts[0] else {
            panic!("expected Return(Some(_))")
        };
        expr.as_ref()
    }

    #[test]
    fn parses_simple_main() {
        let prog = parse("fn main(): i32 { return 2 + 3 * 4; }");
        assert_eq!(prog.items.len(), 1);
        match &prog.items[0] {
            Node::FnDef(def) => {
                assert_eq!(def.decl.name, "main");
                assert_eq!(def.decl.params.len(), 0);
            }
            other => panic!("expected FnDef, got {other:?}"),
        }
    }

    #[test]
    fn return_statement_builds_the_exact_expected_ast() {
        let prog = parse("fn main(): i32 { return 1 + 2; }");
        let expected = Node::Binary {
            op: BinaryOp::Add,
            lhs: Box::new(Node::Number(NumberTag::Integer, NumberLiteral::Integer(1))),
            rhs: Box::new(Node::Number(NumberTag::Integer, NumberLiteral::Integer(2))),
        };
        assert_eq!(return_expr(&prog), &expected);
    }

    /// Table-driven coverage of every binary-operator token across every
    /// precedence level (`parse_logic`/`parse_equality`/`parse_comparison`/
    /// `parse_term`/`parse_factor`), confirming each lexes and parses down
    /// to the right `BinaryOp` tag.
    #[test_case("1 + 1", BinaryOp::Add)]
    #[test_case("1 - 1", BinaryOp::Sub)]
    #[test_case("1 * 1", BinaryOp::Mul)]
    #[test_case("1 / 1", BinaryOp::Div)]
    #[test_case("1 == 1", BinaryOp::Eq)]
    #[test_case("1 != 1", BinaryOp::NotEq)]
    #[test_case("1 < 1", BinaryOp::Lt)]
    #[test_case("1 <= 1", BinaryOp::Le)]
    #[test_case("1 > 1", BinaryOp::Gt)]
    #[test_case("1 >= 1", BinaryOp::Ge)]
    #[test_case("1 && 1", BinaryOp::And)]
    #[test_case("1 || 1", BinaryOp::Or)]
    #[test_case("1 & 1", BinaryOp::BitAnd)]
    #[test_case("1 | 1", BinaryOp::BitOr)]
    fn binary_operator_tokens_parse_to_the_right_op(src: &str, expected: BinaryOp) {
        let prog = parse(&format!("fn main(): i32 {{ return {src}; }}"));
        match return_expr(&prog) {
            Node::Binary { op, .. } => assert_eq!(*op, expected),
            other => panic!("expected Binary, got {other:?}"),
        }
    }

    #[test]
    fn precedence_mul_binds_tighter_than_add() {
        let prog = parse("fn main(): i32 { return 2 + 3 * 4; }");
        let Node::FnDef(def) = &prog.items[0] else {
            panic!()
        };
        let Node::Block(stmts) = def.body.as_ref() else {
            panic!()
        };
        let Node::Return(Some(expr)) = &stmts[0] else {
            panic!()
        };
        match expr.as_ref() {
            Node::Binary {
                op: BinaryOp::Add,
                rhs,
                ..
            } => {
                assert!(matches!(
                    rhs.as_ref(),
                    Node::Binary {
                        op: BinaryOp::Mul,
                        ..
                    }
                ));
            }
            other => panic!("expected top-level Add, got {other:?}"),
        }
    }

    #[test]
    fn rejects_invalid_assignment_target() {
        let tokens = Lexer::tokenize("fn main(): i32 { 1 + 1 = 2; return 0; }").unwrap();
        let err = Parser::parse(tokens, false).unwrap_err();
        assert!(err.message.contains("invalid assignment target"));
    }

    #[test]
    fn parses_pointer_round_trip() {
        let prog = parse(
            "fn main(): i64 { var x: i64 = 7; var p: i64* = &x; *p = *p + 35; return x; }",
        );
        assert_eq!(prog.items.len(), 1);
    }

    #[test]
    fn parses_struct_with_method_and_explicit_self() {
        let prog = parse("struct C { n: i32; fn add(self, k: i32): i32 { return self->n + k; } }");
        let Node::Struct(def) = &prog.items[0] else {
            panic!()
        };
        assert_eq!(def.fields.len(), 1);
        assert_eq!(def.methods.len(), 1);
        let method = &def.methods[0];
        assert_eq!(method.decl.params.len(), 2);
        assert_eq!(method.decl.params[0].name, "self");
        assert_eq!(method.decl.params[0].ty.as_ref().unwrap().pointer_depth, 1);
        assert_eq!(method.decl.params[1].name, "k");
    }

    #[test]
    fn method_without_explicit_self_still_gets_an_implicit_one() {
        // spec.md: "methods receive an implicit first parameter self:
        // <StructName>* unless the programmer wrote self explicitly" — the
        // common case is writing no `self` at all, and the declared
        // parameter list must still carry it so call-site argument counts
        // (which always prepend self) stay in sync with the declaration.
        let prog = parse("struct C { n: i32; fn add(k: i32): i32 { return self->n + k; } }");
        let Node::Struct(def) = &prog.items[0] else {
            panic!()
        };
        let method = &def.methods[0];
        assert_eq!(method.decl.params.len(), 2);
        assert_eq!(method.decl.params[0].name, "self");
        assert_eq!(method.decl.params[0].ty.as_ref().unwrap().pointer_depth, 1);
        assert_eq!(method.decl.params[0].ty.as_ref().unwrap().name, "C");
        assert_eq!(method.decl.params[1].name, "k");
    }

    #[test]
    fn method_with_no_declared_parameters_still_gets_implicit_self() {
        let prog = parse("struct C { n: i32; fn get(): i32 { return self->n; } }");
        let Node::Struct(def) = &prog.items[0] else {
            panic!()
        };
        let method = &def.methods[0];
        assert_eq!(method.decl.params.len(), 1);
        assert_eq!(method.decl.params[0].name, "self");
    }

    #[test]
    fn method_call_desugars_to_member_access_callee() {
        let prog = parse("fn main(): i32 { return c.add(2); }");
        let Node::FnDef(def) = &prog.items[0] else {
            panic!()
        };
        let Node::Block(stmts) = def.body.as_ref() else {
            panic!()
        };
        let Node::Return(Some(expr)) = &stmts[0] else {
            panic!()
        };
        match expr.as_ref() {
            Node::Call { callee, args } => {
                assert!(matches!(callee.as_ref(), Node::MemberAccess { .. }));
                assert_eq!(args.len(), 1);
            }
            other => panic!("expected Call, got {other:?}"),
        }
    }

    #[test]
    fn repl_mode_accepts_bare_expression() {
        let tokens = Lexer::tokenize("add(g, 5)").unwrap();
        let prog = Parser::parse(tokens, true).unwrap();
        assert_eq!(prog.items.len(), 1);
        assert!(matches!(prog.items[0], Node::Call { .. }));
    }

    #[test]
    fn whole_program_mode_rejects_bare_expression() {
        let tokens = Lexer::tokenize("1 + 1;").unwrap();
        let err = Parser::parse(tokens, false).unwrap_err();
        assert!(err.message.contains("unexpected top-level token"));
    }

    #[test]
    fn extern_function_declaration_has_no_body() {
        let prog = parse("extern fn putchar(c: i32): i32;");
        match &prog.items[0] {
            Node::FnDecl(decl) => {
                assert!(decl.is_extern);
                assert_eq!(decl.name, "putchar");
            }
            other => panic!("expected FnDecl, got {other:?}"),
        }
    }

    #[test]
    fn variadic_function_flag() {
        let prog = parse("extern fn printf(fmt: i8*, ...): i32;");
        match &prog.items[0] {
            Node::FnDecl(decl) => assert!(decl.is_variadic),
            other => panic!("expected FnDecl, got {other:?}"),
        }
    }
}
