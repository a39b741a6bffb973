//! Recursive-descent parser for the stack-language grammar (spec.md §6.2).
//!
//! Grounded in `examples/original_source/bootstrap/parser/parser.go` for
//! grammar shape (top-level `fun` declarations, lets-then-exprs blocks, a
//! bare-identifier expression sequence with no call-parenthesis syntax),
//! generalized to also parse `import`/`type`/global `let` declarations and
//! the `if`/`.unwrap`/`.wrap`/`.addr`/`.return` forms the original never
//! implemented, in the teacher's (`examples/myuon-moca`) token-stream,
//! `Result`-returning recursive-descent style.

use crate::compiler::ast::*;
use crate::compiler::error::CompileError;
use crate::compiler::lexer::{Span, Token, TokenKind};

pub struct Parser<'a> {
    filename: &'a str,
    tokens: Vec<Token>,
    current: usize,
}

impl<'a> Parser<'a> {
    pub fn new(filename: &'a str, tokens: Vec<Token>) -> Self {
        Self { filename, tokens, current: 0 }
    }

    pub fn parse(&mut self) -> Result<Ast, CompileError> {
        let mut ast = Ast::default();
        while !self.is_at_end() {
            match self.peek_kind() {
                Some(TokenKind::Import) => ast.imports.push(self.import_decl()?),
                Some(TokenKind::Type) => ast.types.push(self.type_decl()?),
                Some(TokenKind::Let) => ast.lets.push(self.let_decl()?),
                Some(TokenKind::Fun) => ast.funs.push(self.fun_decl()?),
                _ => return Err(self.error("expected a top-level declaration")),
            }
        }
        Ok(ast)
    }

    fn import_decl(&mut self) -> Result<Import, CompileError> {
        let span = self.current_span();
        self.expect(&TokenKind::Import)?;
        let path = self.expect_str()?;
        self.expect(&TokenKind::Semicolon)?;
        Ok(Import { path, span })
    }

    fn type_decl(&mut self) -> Result<TypeDecl, CompileError> {
        let span = self.current_span();
        self.expect(&TokenKind::Type)?;
        let name = self.expect_ident()?;
        self.expect(&TokenKind::LParen)?;
        let fields = self.type_ref_list()?;
        self.expect(&TokenKind::RParen)?;
        self.expect(&TokenKind::Semicolon)?;
        Ok(TypeDecl { name, fields, span })
    }

    fn let_decl(&mut self) -> Result<Let, CompileError> {
        let span = self.current_span();
        self.expect(&TokenKind::Let)?;
        let name = self.expect_ident()?;
        self.expect(&TokenKind::Colon)?;
        let typ = self.type_ref()?;
        self.expect(&TokenKind::Equals)?;
        let exprs = self.expr_seq()?;
        self.expect(&TokenKind::Semicolon)?;
        Ok(Let { name, typ, exprs, span })
    }

    fn fun_decl(&mut self) -> Result<Fun, CompileError> {
        let span = self.current_span();
        self.expect(&TokenKind::Fun)?;
        let opts = if self.check(&TokenKind::LBrace) {
            self.opt_list()?
        } else {
            Vec::new()
        };
        let name = self.expect_ident()?;
        self.expect(&TokenKind::LParen)?;
        let inputs = self.type_ref_list()?;
        self.expect(&TokenKind::Colon)?;
        let outputs = self.type_ref_list()?;
        self.expect(&TokenKind::RParen)?;
        let block = self.block()?;
        Ok(Fun { opts, name, inputs, outputs, block, span })
    }

    fn opt_list(&mut self) -> Result<Vec<String>, CompileError> {
        self.expect(&TokenKind::LBrace)?;
        let mut opts = Vec::new();
        if let Some(TokenKind::Ident(_)) = self.peek_kind() {
            opts.push(self.expect_ident()?);
            while self.match_token(&TokenKind::Comma) {
                opts.push(self.expect_ident()?);
            }
        }
        self.expect(&TokenKind::RBrace)?;
        Ok(opts)
    }

    fn type_ref_list(&mut self) -> Result<Vec<TypeRef>, CompileError> {
        let mut types = Vec::new();
        if let Some(TokenKind::Ident(_)) = self.peek_kind() {
            types.push(self.type_ref()?);
            while self.match_token(&TokenKind::Comma) {
                types.push(self.type_ref()?);
            }
        }
        Ok(types)
    }

    fn type_ref(&mut self) -> Result<TypeRef, CompileError> {
        Ok(TypeRef(self.expect_ident()?))
    }

    fn block(&mut self) -> Result<Block, CompileError> {
        self.expect(&TokenKind::LBrace)?;
        let mut lets = Vec::new();
        while self.check(&TokenKind::Let) {
            lets.push(self.let_decl()?);
        }
        let exprs = self.expr_seq()?;
        self.expect(&TokenKind::RBrace)?;
        Ok(Block { lets, exprs })
    }

    /// A bare expression sequence: zero or more of ident / call / number /
    /// string / char / if / `.unwrap` / `.wrap T` / `.addr NAME(I:O)` /
    /// `.return`, with no separators.
    fn expr_seq(&mut self) -> Result<Vec<Expr>, CompileError> {
        let mut exprs = Vec::new();
        loop {
            match self.peek_kind() {
                Some(TokenKind::Ident(name)) => {
                    let name = name.clone();
                    let span = self.current_span();
                    self.advance();
                    if self.check(&TokenKind::LParen) {
                        self.advance();
                        let inputs = self.type_ref_list()?;
                        self.expect(&TokenKind::Colon)?;
                        let outputs = self.type_ref_list()?;
                        self.expect(&TokenKind::RParen)?;
                        exprs.push(Expr::Call { name, inputs, outputs, span });
                    } else {
                        exprs.push(Expr::Ident { name, span });
                    }
                }
                Some(TokenKind::Number(text)) => {
                    let text = text.clone();
                    let span = self.current_span();
                    self.advance();
                    exprs.push(Expr::Number { text, span });
                }
                Some(TokenKind::Str(value)) => {
                    let value = value.clone();
                    let span = self.current_span();
                    self.advance();
                    exprs.push(Expr::Str { value, span });
                }
                Some(TokenKind::Char(value)) => {
                    let value = value.clone();
                    let span = self.current_span();
                    self.advance();
                    exprs.push(Expr::Char { value, span });
                }
                Some(TokenKind::If) => exprs.push(self.if_expr()?),
                Some(TokenKind::DotUnwrap) => {
                    let span = self.current_span();
                    self.advance();
                    exprs.push(Expr::Unwrap { span });
                }
                Some(TokenKind::DotWrap) => {
                    let span = self.current_span();
                    self.advance();
                    let typ = self.type_ref()?;
                    exprs.push(Expr::Wrap { typ, span });
                }
                Some(TokenKind::DotAddr) => exprs.push(self.addr_expr()?),
                Some(TokenKind::DotReturn) => {
                    let span = self.current_span();
                    self.advance();
                    exprs.push(Expr::Return { span });
                }
                _ => break,
            }
        }
        Ok(exprs)
    }

    fn if_expr(&mut self) -> Result<Expr, CompileError> {
        let span = self.current_span();
        self.expect(&TokenKind::If)?;
        self.expect(&TokenKind::LParen)?;
        let cond = self.expr_seq()?;
        self.expect(&TokenKind::RParen)?;
        self.expect(&TokenKind::LBrace)?;
        let then_branch = self.expr_seq()?;
        self.expect(&TokenKind::RBrace)?;
        self.expect(&TokenKind::Else)?;
        self.expect(&TokenKind::LBrace)?;
        let else_branch = self.expr_seq()?;
        self.expect(&TokenKind::RBrace)?;
        Ok(Expr::If { cond, then_branch, else_branch, span })
    }

    fn addr_expr(&mut self) -> Result<Expr, CompileError> {
        let span = self.current_span();
        self.expect(&TokenKind::DotAddr)?;
        let name = self.expect_ident()?;
        self.expect(&TokenKind::LParen)?;
        let inputs = self.type_ref_list()?;
        self.expect(&TokenKind::Colon)?;
        let outputs = self.type_ref_list()?;
        self.expect(&TokenKind::RParen)?;
        Ok(Expr::Addr { name, inputs, outputs, span })
    }

    // Helpers

    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.current)
    }

    fn peek_kind(&self) -> Option<&TokenKind> {
        self.peek().map(|t| &t.kind)
    }

    fn is_at_end(&self) -> bool {
        matches!(self.peek_kind(), Some(TokenKind::Eof) | None)
    }

    fn check(&self, kind: &TokenKind) -> bool {
        self.peek_kind() == Some(kind)
    }

    fn advance(&mut self) -> Option<&Token> {
        if !self.is_at_end() {
            self.current += 1;
        }
        self.tokens.get(self.current - 1)
    }

    fn match_token(&mut self, kind: &TokenKind) -> bool {
        if self.check(kind) {
            self.advance();
            true
        } else {
            false
        }
    }

    fn expect(&mut self, kind: &TokenKind) -> Result<(), CompileError> {
        if self.check(kind) {
            self.advance();
            Ok(())
        } else {
            Err(self.error(&format!("expected {:?}", kind)))
        }
    }

    fn expect_ident(&mut self) -> Result<String, CompileError> {
        if let Some(TokenKind::Ident(name)) = self.peek_kind() {
            let name = name.clone();
            self.advance();
            Ok(name)
        } else {
            Err(self.error("expected identifier"))
        }
    }

    fn expect_str(&mut self) -> Result<String, CompileError> {
        if let Some(TokenKind::Str(value)) = self.peek_kind() {
            let value = value.clone();
            self.advance();
            Ok(value)
        } else {
            Err(self.error("expected string literal"))
        }
    }

    fn current_span(&self) -> Span {
        self.peek().map(|t| t.span).unwrap_or(Span::new(1, 1))
    }

    fn error(&self, message: &str) -> CompileError {
        let span = self.current_span();
        CompileError::ParseError {
            message: message.to_string(),
            file: self.filename.to_string(),
            line: span.line,
            column: span.column,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compiler::lexer::Lexer;

    fn parse(source: &str) -> Result<Ast, CompileError> {
        let mut lexer = Lexer::new("test.stk", source);
        let tokens = lexer.scan_tokens()?;
        let mut parser = Parser::new("test.stk", tokens);
        parser.parse()
    }

    #[test]
    fn parses_start_function() {
        let ast = parse("fun{unsafe} __start(:) { 42u8 }").unwrap();
        assert_eq!(ast.funs.len(), 1);
        let f = &ast.funs[0];
        assert_eq!(f.name, "__start");
        assert!(f.has_opt("unsafe"));
        assert!(f.inputs.is_empty());
        assert!(f.outputs.is_empty());
        assert_eq!(f.block.exprs.len(), 1);
    }

    #[test]
    fn parses_global_let_and_import() {
        let ast = parse(r#"import "lib.stk"; let x : u8 = 1u8;"#).unwrap();
        assert_eq!(ast.imports[0].path, "lib.stk");
        assert_eq!(ast.lets[0].name, "x");
        assert_eq!(ast.lets[0].typ, TypeRef("u8".into()));
    }

    #[test]
    fn parses_type_decl() {
        let ast = parse("type Point(u32, u32);").unwrap();
        assert_eq!(ast.types[0].name, "Point");
        assert_eq!(ast.types[0].fields.len(), 2);
    }

    #[test]
    fn parses_if_else() {
        let ast = parse("fun f(:) { if (1u8) { 2u8 } else { 3u8 } }").unwrap();
        match &ast.funs[0].block.exprs[0] {
            Expr::If { cond, then_branch, else_branch, .. } => {
                assert_eq!(cond.len(), 1);
                assert_eq!(then_branch.len(), 1);
                assert_eq!(else_branch.len(), 1);
            }
            other => panic!("expected if expr, got {:?}", other),
        }
    }

    #[test]
    fn parses_call_with_explicit_signature() {
        let ast = parse("fun f(:) { 1u8 drop_u8(u8:) }").unwrap();
        let exprs = &ast.funs[0].block.exprs;
        assert!(matches!(exprs[0], Expr::Number { .. }));
        match &exprs[1] {
            Expr::Call { name, inputs, outputs, .. } => {
                assert_eq!(name, "drop_u8");
                assert_eq!(inputs, &[TypeRef("u8".into())]);
                assert!(outputs.is_empty());
            }
            other => panic!("expected call expr, got {:?}", other),
        }
    }

    #[test]
    fn parses_wrap_unwrap_addr_return() {
        let ast = parse("fun f(:) { .unwrap .wrap u8 .addr g(u8:u8) .return }").unwrap();
        let exprs = &ast.funs[0].block.exprs;
        assert!(matches!(exprs[0], Expr::Unwrap { .. }));
        assert!(matches!(&exprs[1], Expr::Wrap { typ, .. } if typ.0 == "u8"));
        assert!(matches!(&exprs[2], Expr::Addr { ref name, .. } if name == "g"));
        assert!(matches!(exprs[3], Expr::Return { .. }));
    }

    #[test]
    fn local_lets_precede_exprs_in_block() {
        let ast = parse("fun f(:) { let x : u8 = 1u8; x }").unwrap();
        let block = &ast.funs[0].block;
        assert_eq!(block.lets.len(), 1);
        assert_eq!(block.exprs.len(), 1);
    }
}
