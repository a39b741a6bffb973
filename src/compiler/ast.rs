//! Raw AST produced by the parser (spec.md §6.2 grammar), pre-resolution:
//! type names are still bare strings (`TypeRef`), not yet looked up in
//! `Ctx.types`.
//!
//! Grounded in `examples/myuon-moca/src/compiler/ast.rs` for the general
//! shape of an exhaustive-match tagged-union `Expr` with a `span()` method
//! (replacing the Go original's nil-returning `AsX()` accessor-method
//! idiom in `examples/original_source/bootstrap/parser/typ.go`).

use crate::compiler::lexer::Span;

/// A type name as written in source, not yet resolved against `Ctx.types`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TypeRef(pub String);

/// A whole parsed (and, after module resolution, merged) program.
#[derive(Debug, Clone, Default)]
pub struct Ast {
    pub imports: Vec<Import>,
    pub types: Vec<TypeDecl>,
    pub lets: Vec<Let>,
    pub funs: Vec<Fun>,
}

#[derive(Debug, Clone)]
pub struct Import {
    pub path: String,
    pub span: Span,
}

/// `type NAME(T1,T2,…);`. Field names are positional in the grammar, but
/// carried here as `f0, f1, …` so downstream code and disassembly output
/// have something human-readable to print.
#[derive(Debug, Clone)]
pub struct TypeDecl {
    pub name: String,
    pub fields: Vec<TypeRef>,
    pub span: Span,
}

/// `let NAME : T = EXPRS;` at either global or local scope.
#[derive(Debug, Clone)]
pub struct Let {
    pub name: String,
    pub typ: TypeRef,
    pub exprs: Vec<Expr>,
    pub span: Span,
}

/// `fun{opt,opt,…} NAME(I1,I2,…:O1,O2,…) { LETS EXPRS }`
#[derive(Debug, Clone)]
pub struct Fun {
    pub opts: Vec<String>,
    pub name: String,
    pub inputs: Vec<TypeRef>,
    pub outputs: Vec<TypeRef>,
    pub block: Block,
    pub span: Span,
}

/// A function body: local lets followed by an expression sequence.
#[derive(Debug, Clone, Default)]
pub struct Block {
    pub lets: Vec<Let>,
    pub exprs: Vec<Expr>,
}

#[derive(Debug, Clone)]
pub enum Expr {
    /// A bare identifier: a local or global `let` load, nothing else. A
    /// function reference always spells out its full signature (`Call`
    /// below) so that two functions sharing a name but differing in
    /// input/output types are never ambiguous at the call site.
    Ident {
        name: String,
        span: Span,
    },
    /// `NAME(I1,I2,…:O1,O2,…)` — a call to the function whose
    /// signature-ident this spells out exactly (spec.md §8 scenarios 3-5
    /// write every call this way, e.g. `drop_u8(u8:)`, `two(:u8)`).
    Call {
        name: String,
        inputs: Vec<TypeRef>,
        outputs: Vec<TypeRef>,
        span: Span,
    },
    /// Raw literal text plus the type suffix, kept unparsed until the
    /// parser's literal-validation step converts it to concrete bytes.
    Number {
        text: String,
        span: Span,
    },
    Str {
        value: String,
        span: Span,
    },
    Char {
        value: String,
        span: Span,
    },
    If {
        cond: Vec<Expr>,
        then_branch: Vec<Expr>,
        else_branch: Vec<Expr>,
        span: Span,
    },
    Unwrap {
        span: Span,
    },
    Wrap {
        typ: TypeRef,
        span: Span,
    },
    /// `.addr IDENT(INPUTS:OUTPUTS)`. Names a function by its full
    /// signature-ident, independent of whether that function is defined
    /// before or after this point.
    Addr {
        name: String,
        inputs: Vec<TypeRef>,
        outputs: Vec<TypeRef>,
        span: Span,
    },
    Return {
        span: Span,
    },
}

impl Expr {
    pub fn span(&self) -> Span {
        match self {
            Expr::Ident { span, .. } => *span,
            Expr::Call { span, .. } => *span,
            Expr::Number { span, .. } => *span,
            Expr::Str { span, .. } => *span,
            Expr::Char { span, .. } => *span,
            Expr::If { span, .. } => *span,
            Expr::Unwrap { span } => *span,
            Expr::Wrap { span, .. } => *span,
            Expr::Addr { span, .. } => *span,
            Expr::Return { span } => *span,
        }
    }
}

impl Fun {
    /// The signature-ident `name(I1,I2,…:O1,O2,…)` that uniquely keys this
    /// function across the whole compilation (spec.md §3 Invariants).
    pub fn signature_ident(&self) -> String {
        make_signature_ident(&self.name, &self.inputs, &self.outputs)
    }

    pub fn has_opt(&self, opt: &str) -> bool {
        self.opts.iter().any(|o| o == opt)
    }
}

pub fn make_signature_ident(name: &str, inputs: &[TypeRef], outputs: &[TypeRef]) -> String {
    let ins: Vec<&str> = inputs.iter().map(|t| t.0.as_str()).collect();
    let outs: Vec<&str> = outputs.iter().map(|t| t.0.as_str()).collect();
    format!("{}({}:{})", name, ins.join(","), outs.join(","))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn signature_ident_matches_start_convention() {
        let f = Fun {
            opts: vec!["unsafe".to_string()],
            name: "__start".to_string(),
            inputs: vec![],
            outputs: vec![],
            block: Block::default(),
            span: Span::new(1, 1),
        };
        assert_eq!(f.signature_ident(), "__start(:)");
    }

    #[test]
    fn signature_ident_includes_types() {
        let f = Fun {
            opts: vec![],
            name: "add".to_string(),
            inputs: vec![TypeRef("u32".into()), TypeRef("u32".into())],
            outputs: vec![TypeRef("u32".into())],
            block: Block::default(),
            span: Span::new(1, 1),
        };
        assert_eq!(f.signature_ident(), "add(u32,u32:u32)");
    }
}
