//! The stack type checker (spec.md §4.3): structural and `simple` modes,
//! `Sub`-based unwrap/wrap, the `if` divergence policy, and the
//! whole-function stack-balance check.
//!
//! Grounded in `examples/myuon-moca/src/compiler/typechecker.rs` only for
//! the overall "walk the AST threading a mutable checking state, bail out
//! with a descriptive error" shape — the actual judgement rules here (a
//! concrete-size stack machine with two checking modes and an explicit
//! bottom type) have no Hindley-Milner analogue in the teacher and are
//! this language's own, taken from spec.md.

use crate::compiler::ast::{Expr, Fun};
use crate::compiler::context::{Ctx, FunId, LocalLet};
use crate::compiler::error::CompileError;
use crate::compiler::instructions::InstructionTable;
use crate::compiler::literal;
use crate::compiler::types::{total_size, Typ};

/// The checker's notion of "what's on the stack so far". Structural mode
/// tracks the exact type sequence; `simple` mode (opt-in, `unsafe`-only)
/// tracks only a running byte count and forgoes `unwrap`/`wrap`.
#[derive(Debug, Clone)]
enum Stack {
    Structural(Vec<Typ>),
    Simple(u64),
}

impl Stack {
    fn new(simple: bool, inputs: &[Typ]) -> Stack {
        if simple {
            Stack::Simple(total_size(inputs))
        } else {
            Stack::Structural(inputs.to_vec())
        }
    }

    fn push(&mut self, t: &Typ) {
        match self {
            Stack::Structural(v) => v.push(t.clone()),
            Stack::Simple(n) => *n += t.size(),
        }
    }

    fn push_all(&mut self, ts: &[Typ]) {
        for t in ts {
            self.push(t);
        }
    }

    fn pop_suffix(&mut self, ts: &[Typ], what: &str) -> Result<(), CompileError> {
        match self {
            Stack::Structural(v) => {
                if v.len() < ts.len() || v[v.len() - ts.len()..] != *ts {
                    return Err(mismatch(what, format!("expected {:?} on top, found {:?}", ts, v)));
                }
                let keep = v.len() - ts.len();
                v.truncate(keep);
                Ok(())
            }
            Stack::Simple(n) => {
                let need = total_size(ts);
                if *n < need {
                    return Err(mismatch(what, format!("need {} bytes, have {}", need, n)));
                }
                *n -= need;
                Ok(())
            }
        }
    }

    fn unwrap_top(&mut self, what: &str) -> Result<(), CompileError> {
        match self {
            Stack::Structural(v) => {
                let top = v.pop().ok_or_else(|| mismatch(what, "'.unwrap' on an empty stack"))?;
                v.extend(top.sub());
                Ok(())
            }
            Stack::Simple(_) => Err(mismatch(what, "'.unwrap' is not permitted under simple_type_check")),
        }
    }

    fn wrap_top(&mut self, typ: &Typ, what: &str) -> Result<(), CompileError> {
        match self {
            Stack::Structural(_) => {
                let sub = typ.sub();
                self.pop_suffix(&sub, what)?;
                self.push(typ);
                Ok(())
            }
            Stack::Simple(_) => Err(mismatch(what, "'.wrap' is not permitted under simple_type_check")),
        }
    }

    fn finish_matches(&self, outputs: &[Typ], what: &str) -> Result<(), CompileError> {
        match self {
            Stack::Structural(v) => {
                if v.as_slice() != outputs {
                    return Err(mismatch(
                        what,
                        format!("declared outputs {:?} but stack ended as {:?}", outputs, v),
                    ));
                }
                Ok(())
            }
            Stack::Simple(n) => {
                let need = total_size(outputs);
                if *n != need {
                    return Err(mismatch(
                        what,
                        format!("declared outputs need {} bytes but stack ended with {}", need, n),
                    ));
                }
                Ok(())
            }
        }
    }
}

fn mismatch(what: &str, detail: impl Into<String>) -> CompileError {
    CompileError::StackMismatch { context: what.to_string(), detail: detail.into() }
}

/// `NEVER` may only ever appear as a function's sole declared output, and
/// never as an input (spec.md §4.3).
fn check_never_policy(fun_ident: &str, inputs: &[Typ], outputs: &[Typ]) -> Result<(), CompileError> {
    if inputs.iter().any(|t| t.is_never()) {
        return Err(CompileError::StackMismatch {
            context: format!("fun '{}'", fun_ident),
            detail: "'never' may not appear as a function input".to_string(),
        });
    }
    let never_count = outputs.iter().filter(|t| t.is_never()).count();
    if never_count > 0 && outputs.len() != 1 {
        return Err(CompileError::StackMismatch {
            context: format!("fun '{}'", fun_ident),
            detail: "'never' may only appear as a function's sole output".to_string(),
        });
    }
    Ok(())
}

pub fn check_all(ctx: &Ctx, table: &InstructionTable) -> Result<(), CompileError> {
    for id in 0..ctx.funs.len() {
        check_fun(ctx, table, id)?;
    }
    Ok(())
}

fn resolved_io(ctx: &Ctx, f: &Fun) -> Result<(Vec<Typ>, Vec<Typ>), CompileError> {
    let inputs = f.inputs.iter().map(|t| ctx.resolve_type(t)).collect::<Result<Vec<_>, _>>()?;
    let outputs = f.outputs.iter().map(|t| ctx.resolve_type(t)).collect::<Result<Vec<_>, _>>()?;
    Ok((inputs, outputs))
}

fn check_fun(ctx: &Ctx, table: &InstructionTable, id: FunId) -> Result<(), CompileError> {
    let slot = ctx.fun(id);
    let info = slot
        .info
        .as_ref()
        .expect("the info pass must run before the type checker");
    let fun_ident = slot.ident.clone();
    let (inputs, outputs) = resolved_io(ctx, &slot.ast)?;
    check_never_policy(&fun_ident, &inputs, &outputs)?;

    if info.asm {
        return check_asm_fun(table, &fun_ident, &slot.ast, &inputs, &outputs, info.simple_type_check);
    }

    for local in &info.locals {
        let decl = slot
            .ast
            .block
            .lets
            .iter()
            .find(|l| l.name == local.name)
            .expect("FInfo.locals is derived from this fun's own block.lets");
        let mut stack = Stack::new(info.simple_type_check, &[]);
        let what = format!("local let '{}' in fun '{}'", local.name, fun_ident);
        let diverged = check_exprs(ctx, table, &fun_ident, &info.locals, &mut stack, &decl.exprs)?;
        if !diverged {
            stack.finish_matches(std::slice::from_ref(&local.typ), &what)?;
        }
    }

    let mut stack = Stack::new(info.simple_type_check, &inputs);
    let diverged = check_exprs(ctx, table, &fun_ident, &info.locals, &mut stack, &slot.ast.block.exprs)?;
    if !diverged {
        let what = format!("fun '{}'", fun_ident);
        stack.finish_matches(&outputs, &what)?;
    }
    Ok(())
}

fn check_asm_fun(
    table: &InstructionTable,
    fun_ident: &str,
    f: &Fun,
    inputs: &[Typ],
    outputs: &[Typ],
    simple: bool,
) -> Result<(), CompileError> {
    let mut stack = Stack::new(simple, inputs);
    for e in &f.block.exprs {
        let Expr::Str { value, .. } = e else {
            unreachable!("info pass already rejected non-string asm bodies");
        };
        let inst = table.get(value).ok_or_else(|| CompileError::UnknownInst {
            mnemonic: value.clone(),
            fun_ident: fun_ident.to_string(),
        })?;
        let what = format!("asm fun '{}', instruction '{}'", fun_ident, value);
        stack.pop_suffix(&inst.inputs, &what)?;
        stack.push_all(&inst.outputs);
    }
    stack.finish_matches(outputs, &format!("asm fun '{}'", fun_ident))
}

/// Fold an expression sequence into `stack`. Returns `true` if the sequence
/// diverges (an explicit `.return`, or a call whose sole output is
/// `NEVER`), in which case the caller must skip the usual end-of-sequence
/// stack check: the remainder of the sequence is unreachable and was not
/// type-checked (spec.md §4.3's vacuous-pass rule).
fn check_exprs(
    ctx: &Ctx,
    table: &InstructionTable,
    fun_ident: &str,
    locals: &[LocalLet],
    stack: &mut Stack,
    exprs: &[Expr],
) -> Result<bool, CompileError> {
    for e in exprs {
        match e {
            Expr::Ident { name, .. } => {
                if let Some(local) = locals.iter().find(|l| &l.name == name) {
                    stack.push(&local.typ);
                } else if let Some(global) = ctx.lets.get(name) {
                    stack.push(&global.typ);
                } else {
                    return Err(CompileError::UnknownReference { what: name.clone() });
                }
            }
            Expr::Call { name, inputs, outputs, .. } => {
                let target = ctx.lookup_fun_by_signature(name, inputs, outputs)?;
                let callee = ctx.fun(target);
                let (in_tys, out_tys) = resolved_io(ctx, &callee.ast)?;
                check_never_policy(&callee.ident, &in_tys, &out_tys)?;
                let what = format!("fun '{}', call to '{}'", fun_ident, callee.ident);
                stack.pop_suffix(&in_tys, &what)?;
                stack.push_all(&out_tys);
                if out_tys.len() == 1 && out_tys[0].is_never() {
                    return Ok(true);
                }
            }
            Expr::Number { text, .. } => {
                let (typ, _) = literal::parse_number(text)?;
                stack.push(&typ);
            }
            Expr::Str { .. } => stack.push(&Typ::String),
            Expr::Char { .. } => stack.push(&Typ::U8),
            Expr::If { cond, then_branch, else_branch, .. } => {
                let cond_diverged = check_exprs(ctx, table, fun_ident, locals, stack, cond)?;
                if cond_diverged {
                    return Ok(true);
                }
                let what = format!("fun '{}', 'if' condition", fun_ident);
                stack.pop_suffix(&[Typ::Bool], &what)?;

                let mut then_stack = stack.clone();
                let then_diverged =
                    check_exprs(ctx, table, fun_ident, locals, &mut then_stack, then_branch)?;
                let mut else_stack = stack.clone();
                let else_diverged =
                    check_exprs(ctx, table, fun_ident, locals, &mut else_stack, else_branch)?;

                match (then_diverged, else_diverged) {
                    (true, true) => return Ok(true),
                    (true, false) => *stack = else_stack,
                    (false, true) => *stack = then_stack,
                    (false, false) => {
                        if !stacks_match(&then_stack, &else_stack) {
                            return Err(mismatch(
                                &format!("fun '{}', 'if' branches", fun_ident),
                                format!(
                                    "then-branch ends as {:?} but else-branch ends as {:?}",
                                    then_stack, else_stack
                                ),
                            ));
                        }
                        *stack = then_stack;
                    }
                }
            }
            Expr::Unwrap { .. } => {
                stack.unwrap_top(&format!("fun '{}', '.unwrap'", fun_ident))?;
            }
            Expr::Wrap { typ, .. } => {
                let t = ctx.resolve_type(typ)?;
                stack.wrap_top(&t, &format!("fun '{}', '.wrap {}'", fun_ident, t))?;
            }
            Expr::Addr { name, inputs, outputs, .. } => {
                ctx.lookup_fun_by_signature(name, inputs, outputs)?;
                stack.push(&Typ::U64);
            }
            Expr::Return { .. } => return Ok(true),
        }
    }
    Ok(false)
}

fn stacks_match(a: &Stack, b: &Stack) -> bool {
    match (a, b) {
        (Stack::Structural(x), Stack::Structural(y)) => x == y,
        (Stack::Simple(x), Stack::Simple(y)) => x == y,
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compiler::ast::{self, Ast, Block, TypeRef};
    use crate::compiler::lexer::Span;
    use crate::compiler::{context::Ctx, info, instructions};

    fn span() -> Span {
        Span::new(1, 1)
    }

    fn build_and_check(ast: &Ast) -> Result<(), CompileError> {
        let mut ctx = Ctx::build(ast)?;
        let table = instructions::build();
        info::force_all(&mut ctx, &table)?;
        check_all(&ctx, &table)
    }

    fn start(exprs: Vec<Expr>) -> ast::Fun {
        ast::Fun {
            opts: vec!["unsafe".to_string()],
            name: "__start".to_string(),
            inputs: vec![],
            outputs: vec![],
            block: Block { lets: vec![], exprs },
            span: span(),
        }
    }

    fn call(name: &str, inputs: Vec<TypeRef>, outputs: Vec<TypeRef>) -> Expr {
        Expr::Call { name: name.to_string(), inputs, outputs, span: span() }
    }

    #[test]
    fn empty_start_passes() {
        let mut ast = Ast::default();
        ast.funs.push(start(vec![]));
        assert!(build_and_check(&ast).is_ok());
    }

    #[test]
    fn literal_left_on_stack_after_start_fails() {
        let mut ast = Ast::default();
        ast.funs.push(start(vec![Expr::Number { text: "1u8".to_string(), span: span() }]));
        assert!(matches!(build_and_check(&ast), Err(CompileError::StackMismatch { .. })));
    }

    #[test]
    fn call_with_matching_signature_balances() {
        let mut ast = Ast::default();
        ast.funs.push(ast::Fun {
            opts: vec!["inline".to_string()],
            name: "drop_u8".to_string(),
            inputs: vec![TypeRef("u8".into())],
            outputs: vec![],
            block: Block { lets: vec![], exprs: vec![] },
            span: span(),
        });
        ast.funs.push(start(vec![
            Expr::Number { text: "1u8".to_string(), span: span() },
            call("drop_u8", vec![TypeRef("u8".into())], vec![]),
        ]));
        assert!(build_and_check(&ast).is_ok());
    }

    #[test]
    fn unwrap_then_wrap_round_trips() {
        let mut ast = Ast::default();
        ast.funs.push(start(vec![
            Expr::Number { text: "1u32".to_string(), span: span() },
            Expr::Unwrap { span: span() },
            Expr::Wrap { typ: TypeRef("u32".into()), span: span() },
        ]));
        assert!(build_and_check(&ast).is_ok());
    }

    #[test]
    fn if_branches_must_balance_equally() {
        let mut ast = Ast::default();
        ast.funs.push(ast::Fun {
            opts: vec!["inline".to_string()],
            name: "truth".to_string(),
            inputs: vec![],
            outputs: vec![TypeRef("bool".into())],
            block: Block {
                lets: vec![],
                exprs: vec![
                    Expr::Number { text: "1u8".to_string(), span: span() },
                    Expr::Wrap { typ: TypeRef("bool".into()), span: span() },
                ],
            },
            span: span(),
        });
        ast.funs.push(start(vec![
            call("truth", vec![], vec![TypeRef("bool".into())]),
            Expr::If {
                cond: vec![],
                then_branch: vec![Expr::Number { text: "1u8".to_string(), span: span() }],
                else_branch: vec![],
                span: span(),
            },
        ]));
        assert!(matches!(build_and_check(&ast), Err(CompileError::StackMismatch { .. })));
    }

    #[test]
    fn never_output_branch_makes_if_vacuous() {
        let mut ast = Ast::default();
        ast.funs.push(ast::Fun {
            opts: vec!["unsafe".to_string()],
            name: "abort".to_string(),
            inputs: vec![],
            outputs: vec![TypeRef("never".into())],
            block: Block { lets: vec![], exprs: vec![] },
            span: span(),
        });
        ast.funs.push(ast::Fun {
            opts: vec!["inline".to_string()],
            name: "truth".to_string(),
            inputs: vec![],
            outputs: vec![TypeRef("bool".into())],
            block: Block {
                lets: vec![],
                exprs: vec![
                    Expr::Number { text: "1u8".to_string(), span: span() },
                    Expr::Wrap { typ: TypeRef("bool".into()), span: span() },
                ],
            },
            span: span(),
        });
        ast.funs.push(start(vec![
            call("truth", vec![], vec![TypeRef("bool".into())]),
            Expr::If {
                cond: vec![],
                then_branch: vec![],
                else_branch: vec![call("abort", vec![], vec![TypeRef("never".into())])],
                span: span(),
            },
        ]));
        assert!(build_and_check(&ast).is_ok());
    }

    #[test]
    fn never_as_non_sole_output_is_rejected() {
        let mut ast = Ast::default();
        ast.funs.push(ast::Fun {
            opts: vec!["unsafe".to_string()],
            name: "bogus".to_string(),
            inputs: vec![],
            outputs: vec![TypeRef("u8".into()), TypeRef("never".into())],
            block: Block { lets: vec![], exprs: vec![] },
            span: span(),
        });
        ast.funs.push(start(vec![]));
        assert!(matches!(build_and_check(&ast), Err(CompileError::StackMismatch { .. })));
    }
}
