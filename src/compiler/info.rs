//! The layout/size info pass (spec.md §4.2, `comInfo`): demand-driven,
//! memoized per-function sizing, option validation, tail-call detection,
//! and local-`let` offset assignment.
//!
//! Grounded in `examples/original_source/bootstrap/compiler/compiler.go`'s
//! `comInfo` for the overall demand-forcing shape (the Go original panics
//! on local lets, "unimplemented", so the local-let sizing and
//! inline-cycle handling below are this crate's own design, resolved in
//! DESIGN.md, not a translation).

use crate::compiler::ast::Expr;
use crate::compiler::context::{Ctx, FInfo, FunId, LocalLet};
use crate::compiler::error::CompileError;
use crate::compiler::instructions::InstructionTable;
use crate::compiler::literal;

const OPTS: &[&str] = &["inline", "asm", "unsafe", "allow_unsafe", "simple_type_check"];

/// Force `FInfo` for every function reachable from `__start`, then for any
/// function that remains unvisited (dead code still needs a `pos` and a
/// size so its bytes land in the image; spec.md §4.1 step 6 type-checks
/// "all functions", not just the reachable set).
pub fn force_all(ctx: &mut Ctx, table: &InstructionTable) -> Result<(), CompileError> {
    force(ctx, table, ctx.start)?;
    for id in 0..ctx.funs.len() {
        force(ctx, table, id)?;
    }
    Ok(())
}

pub fn force(ctx: &mut Ctx, table: &InstructionTable, id: FunId) -> Result<(), CompileError> {
    if ctx.fun(id).info.is_some() {
        return Ok(());
    }
    if ctx.fun(id).visiting {
        return Err(CompileError::InlineCycle { fun_ident: ctx.fun(id).ident.clone() });
    }
    ctx.fun_mut(id).visiting = true;
    let result = compute(ctx, table, id);
    ctx.fun_mut(id).visiting = false;
    let info = result?;
    ctx.fun_mut(id).info = Some(info);
    Ok(())
}

fn compute(ctx: &mut Ctx, table: &InstructionTable, id: FunId) -> Result<FInfo, CompileError> {
    let fun_ast = ctx.fun(id).ast.clone();
    let fun_ident = ctx.fun(id).ident.clone();

    for opt in &fun_ast.opts {
        if !OPTS.contains(&opt.as_str()) {
            return Err(CompileError::OptionConflict {
                fun_ident: fun_ident.clone(),
                reason: "unknown option",
            });
        }
    }

    let inline = fun_ast.has_opt("inline");
    let asm = fun_ast.has_opt("asm");
    let is_unsafe = fun_ast.has_opt("unsafe");
    let allow_unsafe = fun_ast.has_opt("allow_unsafe");
    let simple_type_check = fun_ast.has_opt("simple_type_check");

    if asm && !inline {
        return Err(CompileError::OptionConflict {
            fun_ident: fun_ident.clone(),
            reason: "'asm' requires 'inline'",
        });
    }
    if asm && !(is_unsafe || allow_unsafe) {
        return Err(CompileError::OptionConflict {
            fun_ident: fun_ident.clone(),
            reason: "'asm' requires 'unsafe' or 'allow_unsafe'",
        });
    }
    if simple_type_check && !(is_unsafe || allow_unsafe) {
        return Err(CompileError::OptionConflict {
            fun_ident: fun_ident.clone(),
            reason: "'simple_type_check' requires 'unsafe' or 'allow_unsafe'",
        });
    }
    if inline && !fun_ast.block.lets.is_empty() {
        return Err(CompileError::OptionConflict {
            fun_ident: fun_ident.clone(),
            reason: "'inline' functions may not declare local lets",
        });
    }
    if asm && !fun_ast.block.lets.is_empty() {
        return Err(CompileError::OptionConflict {
            fun_ident: fun_ident.clone(),
            reason: "'asm' functions may not declare local lets",
        });
    }

    let caller_flags = CallerFlags { is_unsafe, allow_unsafe };

    if asm {
        let mut pseudo_count = 0u64;
        for e in &fun_ast.block.exprs {
            match e {
                Expr::Str { .. } => pseudo_count += 1,
                other => {
                    return Err(CompileError::StackMismatch {
                        context: format!("asm fun '{}'", fun_ident),
                        detail: format!(
                            "body must be a sequence of mnemonic string literals, found {:?} at {:?}",
                            other, other.span()
                        ),
                    })
                }
            }
        }
        return Ok(FInfo {
            inline,
            asm,
            unsafe_: is_unsafe,
            allow_unsafe,
            simple_type_check,
            tail_call: false,
            let_size: 0,
            size: pseudo_count,
            pos: 0,
            locals: Vec::new(),
        });
    }

    let mut locals = Vec::new();
    let mut let_size = 0u64;
    let mut local_init_size = 0u64;
    for l in &fun_ast.block.lets {
        let typ = ctx.resolve_type(&l.typ)?;
        let init_size = size_of_exprs(ctx, table, &fun_ident, caller_flags, &locals, &l.exprs)?;
        let slots = typ.primitive_layout().len() as u64;
        local_init_size += init_size + 9 * slots;
        locals.push(LocalLet { name: l.name.clone(), typ: typ.clone(), offset: let_size });
        let_size += typ.size();
    }

    let body_size = size_of_exprs(ctx, table, &fun_ident, caller_flags, &locals, &fun_ast.block.exprs)?;

    let tail_call = is_tail_call(ctx, table, &fun_ident, &fun_ast.block.exprs)?;

    let mut size = local_init_size + body_size;
    if !inline && !tail_call {
        size += 1; // trailing return/halt opcode
    }
    size += let_size; // the let area itself: raw storage, not code

    let pos = if inline {
        0
    } else {
        ctx.get_next_pos(size)
    };

    Ok(FInfo {
        inline,
        asm,
        unsafe_: is_unsafe,
        allow_unsafe,
        simple_type_check,
        tail_call,
        let_size,
        size,
        pos,
        locals,
    })
}

#[derive(Clone, Copy)]
pub(crate) struct CallerFlags {
    pub(crate) is_unsafe: bool,
    pub(crate) allow_unsafe: bool,
}

impl CallerFlags {
    fn may_call_unsafe(&self) -> bool {
        self.is_unsafe || self.allow_unsafe
    }
}

/// Whether `f`'s body ends in a call to a non-inline function, which lets
/// the emitter replace the trailing call+return with a single jump.
/// `__start` is never tail-called since it ends in `halt`, not `return`.
fn is_tail_call(
    ctx: &mut Ctx,
    table: &InstructionTable,
    fun_ident: &str,
    exprs: &[Expr],
) -> Result<bool, CompileError> {
    if fun_ident == "__start(:)" {
        return Ok(false);
    }
    let Some(Expr::Call { name, inputs, outputs, .. }) = exprs.last() else {
        return Ok(false);
    };
    let target = ctx.lookup_fun_by_signature(name, inputs, outputs)?;
    force(ctx, table, target)?;
    Ok(!ctx.fun(target).info.as_ref().unwrap().inline)
}

/// Sums the size contribution of an expression sequence, per spec.md's
/// `sizeOfExprs` table, stopping early at the first expression that makes
/// the rest of the sequence unreachable (`.return`, or a call whose
/// outputs include `NEVER`).
pub(crate) fn size_of_exprs(
    ctx: &mut Ctx,
    table: &InstructionTable,
    fun_ident: &str,
    caller: CallerFlags,
    locals: &[LocalLet],
    exprs: &[Expr],
) -> Result<u64, CompileError> {
    let mut size = 0u64;
    for e in exprs {
        match e {
            Expr::Ident { name, .. } => {
                if let Some(local) = locals.iter().find(|l| &l.name == name) {
                    size += 9 * local.typ.primitive_layout().len() as u64;
                } else if let Some(global) = ctx.lets.get(name) {
                    size += 9 * global.typ.primitive_layout().len() as u64;
                } else {
                    return Err(CompileError::UnknownReference { what: name.clone() });
                }
            }
            Expr::Call { name, inputs, outputs, .. } => {
                let target = ctx.lookup_fun_by_signature(name, inputs, outputs)?;
                let callee_ident = ctx.fun(target).ident.clone();
                let callee_unsafe = ctx.fun(target).ast.has_opt("unsafe");
                if callee_unsafe && !caller.may_call_unsafe() {
                    return Err(CompileError::UnsafeCall {
                        caller: fun_ident.to_string(),
                        callee: callee_ident,
                    });
                }
                force(ctx, table, target)?;
                let info = ctx.fun(target).info.as_ref().unwrap();
                if info.inline {
                    size += info.size;
                } else {
                    size += 9;
                }
                let outputs_have_never = ctx
                    .fun(target)
                    .ast
                    .outputs
                    .iter()
                    .any(|t| ctx.resolve_type(t).map(|t| t.is_never()).unwrap_or(false));
                if outputs_have_never {
                    break;
                }
            }
            Expr::Number { text, .. } => {
                let (_, bytes) = literal::parse_number(text)?;
                size += 1 + bytes.len() as u64;
            }
            Expr::Str { value, .. } => {
                ctx.push_str(value);
                size += 18;
            }
            Expr::Char { .. } => size += 2,
            Expr::If { cond, then_branch, else_branch, .. } => {
                let c = size_of_exprs(ctx, table, fun_ident, caller, locals, cond)?;
                let t = size_of_exprs(ctx, table, fun_ident, caller, locals, then_branch)?;
                let e = size_of_exprs(ctx, table, fun_ident, caller, locals, else_branch)?;
                size += c + 9 + e + 9 + t;
            }
            Expr::Unwrap { .. } | Expr::Wrap { .. } => {}
            Expr::Addr { name, inputs, outputs, .. } => {
                let target = ctx.lookup_fun_by_signature(name, inputs, outputs)?;
                if ctx.fun(target).ast.has_opt("inline") {
                    return Err(CompileError::UnknownReference {
                        what: format!(
                            ".addr of inline function '{}' has no stable position",
                            ctx.fun(target).ident
                        ),
                    });
                }
                size += 9;
            }
            Expr::Return { .. } => break,
        }
    }
    Ok(size)
}
