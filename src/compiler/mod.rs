//! Wires the pipeline stages together: lexer/parser/module loader produce
//! an `Ast`; [`compile`] runs the three core passes (`info`, `typechecker`,
//! `codegen`) over it and returns the final byte image.

pub mod ast;
pub mod codegen;
pub mod context;
pub mod dump;
pub mod error;
pub mod info;
pub mod instructions;
pub mod lexer;
pub mod literal;
pub mod module;
pub mod parser;
pub mod typechecker;
pub mod types;

use crate::compiler::ast::Ast;
use crate::compiler::context::Ctx;
use crate::compiler::error::CompileError;

/// `Compile(ast) -> bytes` (spec.md §4.1, steps 1–12).
pub fn compile(ast: &Ast) -> Result<Vec<u8>, CompileError> {
    let mut ctx = Ctx::build(ast)?;
    let table = instructions::build();

    ctx.size = 9; // step 3: nine-byte header (jump_imm + 8-byte placeholder)
    info::force_all(&mut ctx, &table)?; // step 4

    let start_info = ctx.fun(ctx.start).info.as_ref().unwrap();
    if start_info.inline {
        return Err(CompileError::StartInvalid { reason: "must not be inline" });
    }
    if !start_info.unsafe_ {
        return Err(CompileError::StartInvalid { reason: "must be unsafe" });
    }

    typechecker::check_all(&ctx, &table)?; // step 6

    ctx.assign_global_positions(); // step 7

    codegen::emit_image(&mut ctx, &table) // steps 8-12
}

/// Lex, parse, resolve imports relative to `root_dir`, and compile the
/// result. The thin `main.rs` driver is the only other caller of this.
pub fn compile_file(entry_path: &std::path::Path) -> Result<Vec<u8>, CompileError> {
    let merged = module::ModuleLoader::new().load(entry_path)?;
    compile(&merged)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compiler::ast::{Expr, Fun};
    use crate::compiler::lexer::Span;

    fn span() -> Span {
        Span::new(1, 1)
    }

    fn start(exprs: Vec<Expr>) -> Fun {
        Fun {
            opts: vec!["unsafe".to_string()],
            name: "__start".to_string(),
            inputs: vec![],
            outputs: vec![],
            block: ast::Block { lets: vec![], exprs },
            span: span(),
        }
    }

    #[test]
    fn minimal_halt_matches_spec_example() {
        let mut prog = Ast::default();
        prog.funs.push(start(vec![]));
        let image = compile(&prog).unwrap();
        let mut expected = vec![220u8];
        expected.extend_from_slice(&9u64.to_le_bytes());
        expected.push(1); // halt
        expected.extend_from_slice(&[0u8; 16]);
        assert_eq!(image, expected);
        assert_eq!(image.len(), 26);
    }

    #[test]
    fn one_immediate_push_matches_spec_example() {
        let mut prog = Ast::default();
        prog.funs.push(start(vec![Expr::Number { text: "42u8".to_string(), span: span() }]));
        let err = compile(&prog).unwrap_err();
        // 42u8 left on the stack at the end of `__start` with no consumer:
        // the type checker must reject it (spec.md scenario 2 only names
        // the byte layout; scenario 6 is the one that asserts rejection,
        // but an unconsumed literal is exactly that same stack-mismatch).
        assert!(matches!(err, CompileError::StackMismatch { .. }));
    }

    #[test]
    fn start_must_be_unsafe() {
        let mut prog = Ast::default();
        prog.funs.push(Fun {
            opts: vec![],
            name: "__start".to_string(),
            inputs: vec![],
            outputs: vec![],
            block: ast::Block::default(),
            span: span(),
        });
        assert!(matches!(compile(&prog), Err(CompileError::StartInvalid { .. })));
    }

    #[test]
    fn start_must_not_be_inline() {
        let mut prog = Ast::default();
        prog.funs.push(Fun {
            opts: vec!["unsafe".to_string(), "inline".to_string()],
            name: "__start".to_string(),
            inputs: vec![],
            outputs: vec![],
            block: ast::Block::default(),
            span: span(),
        });
        assert!(matches!(compile(&prog), Err(CompileError::StartInvalid { .. })));
    }

    #[test]
    fn missing_start_fails() {
        let prog = Ast::default();
        assert!(matches!(compile(&prog), Err(CompileError::MissingStart)));
    }

    #[test]
    fn globals_get_positions_after_functions() {
        use crate::compiler::ast::{Let, TypeRef};
        let mut prog = Ast::default();
        prog.lets.push(Let {
            name: "answer".to_string(),
            typ: TypeRef("u32".into()),
            exprs: vec![Expr::Number { text: "42u32".to_string(), span: span() }],
            span: span(),
        });
        prog.funs.push(start(vec![]));
        let image = compile(&prog).unwrap();
        // global bytes sit right after __start's single halt byte.
        assert_eq!(&image[10..14], &42u32.to_le_bytes());
    }
}
