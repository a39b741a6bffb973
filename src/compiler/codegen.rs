//! The emitter (spec.md §4.4): a second walk of every non-inline
//! function, now that every function's `pos` (and every global's
//! position) is known, producing the final byte image.
//!
//! Grounded in `examples/myuon-moca/src/compiler/codegen.rs` only for the
//! broad "walk typed AST, push bytes into an output buffer, patch forward
//! references once positions are known" shape; the concrete instruction
//! selection, tail-call/inline transforms, and immediate-offset formulas
//! below are this language's own, taken from spec.md §4.4. Little-endian
//! immediate writing mirrors the byte-at-a-time loop in
//! `examples/original_source/bootstrap/compiler/compiler.go`'s `leUint`.

use crate::compiler::ast::{Expr, Fun};
use crate::compiler::context::{Ctx, FunId, LocalLet};
use crate::compiler::error::CompileError;
use crate::compiler::info::{self, CallerFlags};
use crate::compiler::instructions::InstructionTable;
use crate::compiler::literal;
use crate::compiler::types::Typ;

const OP_HALT: u8 = 1;
const OP_RETURN: u8 = 3;
const OP_JUMP_IMM: u8 = 220;
const OP_JUMP_IMM_F: u8 = 221;
const OP_BRANCH_IMM_F: u8 = 226;
const OP_CALL_IMM: u8 = 229;

/// Steps 3, 8, 9, 10, 11, 12 of `Compile`: finish the image started by the
/// driver's nine-byte header, emitting every non-inline function in `pos`
/// order, then globals, then the interned string blob, then the trailer.
///
/// Expects `C.size` to already account for the header, every function,
/// and every global (i.e. `Ctx::assign_global_positions` has run): that
/// running total is the base address of the string blob.
pub fn emit_image(ctx: &mut Ctx, table: &InstructionTable) -> Result<Vec<u8>, CompileError> {
    let mut image = Vec::new();
    image.push(OP_JUMP_IMM);
    image.extend_from_slice(&0u64.to_le_bytes());

    let mut order: Vec<FunId> = (0..ctx.funs.len())
        .filter(|&id| !ctx.fun(id).info.as_ref().unwrap().inline)
        .collect();
    order.sort_by_key(|&id| ctx.fun(id).info.as_ref().unwrap().pos);

    let strs_base = ctx.size;

    for id in order {
        let bytes = emit_function(ctx, table, id, strs_base)?;
        let expected = ctx.fun(id).info.as_ref().unwrap().size;
        debug_assert_eq!(
            bytes.len() as u64,
            expected,
            "emitted size diverged from the info pass for '{}'",
            ctx.fun(id).ident
        );
        image.extend_from_slice(&bytes);
    }

    let start_pos = ctx.fun(ctx.start).info.as_ref().unwrap().pos;
    image[1..9].copy_from_slice(&start_pos.to_le_bytes());

    for name in ctx.let_order.clone() {
        image.extend_from_slice(&ctx.lets[&name].bytes);
    }

    image.extend_from_slice(ctx.strs.as_bytes());
    image.extend_from_slice(&[0u8; 16]);
    Ok(image)
}

fn emit_function(
    ctx: &mut Ctx,
    table: &InstructionTable,
    id: FunId,
    strs_base: u64,
) -> Result<Vec<u8>, CompileError> {
    let fun_ident = ctx.fun(id).ident.clone();
    let ast = ctx.fun(id).ast.clone();
    let info = ctx.fun(id).info.clone().unwrap();

    if info.asm {
        let mut out = Vec::with_capacity(info.size as usize);
        for e in &ast.block.exprs {
            let Expr::Str { value, .. } = e else {
                unreachable!("info pass already rejected non-string asm bodies");
            };
            let inst = table.get(value).expect("type checker already validated asm mnemonics");
            out.push(inst.opcode);
        }
        return Ok(out);
    }

    let caller = caller_flags(&ast);
    let let_area_start = info.pos + info.size - info.let_size;
    let mut out = Vec::new();

    for local in &info.locals {
        let decl = ast
            .block
            .lets
            .iter()
            .find(|l| l.name == local.name)
            .expect("FInfo.locals is derived from this fun's own block.lets");
        emit_exprs(
            ctx, table, &fun_ident, caller, &info.locals, let_area_start, strs_base, &decl.exprs,
            false, &mut out,
        )?;
        store_slots(let_area_start + local.offset, &local.typ.primitive_layout(), &mut out);
    }

    emit_exprs(
        ctx,
        table,
        &fun_ident,
        caller,
        &info.locals,
        let_area_start,
        strs_base,
        &ast.block.exprs,
        info.tail_call,
        &mut out,
    )?;

    if fun_ident == "__start(:)" {
        out.push(OP_HALT);
    } else if !info.tail_call {
        out.push(OP_RETURN);
    }

    out.resize(out.len() + info.let_size as usize, 0);
    Ok(out)
}

fn caller_flags(ast: &Fun) -> CallerFlags {
    CallerFlags { is_unsafe: ast.has_opt("unsafe"), allow_unsafe: ast.has_opt("allow_unsafe") }
}

/// Emit one expression sequence. `tail` is only ever `true` for the final
/// expression of a function's own top-level body when that function was
/// marked `tailCall` by the info pass; `if`-branches, local-let
/// initializers, and inlined-callee bodies always pass `false`, matching
/// `info::size_of_exprs`'s narrower notion of tail position.
#[allow(clippy::too_many_arguments)]
fn emit_exprs(
    ctx: &mut Ctx,
    table: &InstructionTable,
    fun_ident: &str,
    caller: CallerFlags,
    locals: &[LocalLet],
    let_area_start: u64,
    strs_base: u64,
    exprs: &[Expr],
    tail: bool,
    out: &mut Vec<u8>,
) -> Result<(), CompileError> {
    let last = exprs.len().saturating_sub(1);
    for (i, e) in exprs.iter().enumerate() {
        let is_tail_site = tail && i == last;
        match e {
            Expr::Ident { name, .. } => {
                if let Some(local) = locals.iter().find(|l| &l.name == name) {
                    let layout = local.typ.primitive_layout();
                    load_slots(let_area_start + local.offset, &layout, out);
                } else if let Some(global) = ctx.lets.get(name) {
                    let pos = global.pos;
                    let layout = global.typ.primitive_layout();
                    load_slots(pos, &layout, out);
                } else {
                    return Err(CompileError::UnknownReference { what: name.clone() });
                }
            }
            Expr::Call { name, inputs, outputs, .. } => {
                let target = ctx.lookup_fun_by_signature(name, inputs, outputs)?;
                emit_call(ctx, table, strs_base, target, is_tail_site, out)?;
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
                let (typ, bytes) = literal::parse_number(text)?;
                out.push(push_imm_opcode(typ.width_bits()));
                out.extend_from_slice(&bytes);
            }
            Expr::Str { value, .. } => {
                ctx.push_str(value);
                let addr = strs_base + ctx.get_str_offset(value);
                out.push(push_imm_opcode(64));
                out.extend_from_slice(&le_bytes(addr, 8));
                out.push(push_imm_opcode(64));
                out.extend_from_slice(&le_bytes(value.len() as u64, 8));
            }
            Expr::Char { value, .. } => {
                let byte = literal::parse_char(value)?;
                out.push(push_imm_opcode(8));
                out.push(byte);
            }
            Expr::If { cond, then_branch, else_branch, .. } => {
                emit_exprs(
                    ctx, table, fun_ident, caller, locals, let_area_start, strs_base, cond, false,
                    out,
                )?;

                let else_size =
                    info::size_of_exprs(ctx, table, fun_ident, caller, locals, else_branch)?;
                let then_size =
                    info::size_of_exprs(ctx, table, fun_ident, caller, locals, then_branch)?;

                out.push(OP_BRANCH_IMM_F);
                out.extend_from_slice(&le_bytes(else_size + 18, 8));

                emit_exprs(
                    ctx, table, fun_ident, caller, locals, let_area_start, strs_base, else_branch,
                    false, out,
                )?;

                out.push(OP_JUMP_IMM_F);
                out.extend_from_slice(&le_bytes(then_size + 9, 8));

                emit_exprs(
                    ctx, table, fun_ident, caller, locals, let_area_start, strs_base, then_branch,
                    false, out,
                )?;
            }
            Expr::Unwrap { .. } | Expr::Wrap { .. } => {}
            Expr::Addr { name, inputs, outputs, .. } => {
                let target = ctx.lookup_fun_by_signature(name, inputs, outputs)?;
                info::force(ctx, table, target)?;
                let pos = ctx.fun(target).info.as_ref().unwrap().pos;
                out.push(push_imm_opcode(64));
                out.extend_from_slice(&le_bytes(pos, 8));
            }
            Expr::Return { .. } => break,
        }
    }
    Ok(())
}

/// Inline callees are spliced in verbatim at their call site, no call
/// instruction at all, using their own (always-empty) locals, since
/// `inline` functions may not declare local lets. Non-inline callees emit
/// `call_imm` (229), or `jump_imm` (220) in place of call-plus-return when
/// `is_tail_site` is set by the enclosing function's `tailCall` flag.
fn emit_call(
    ctx: &mut Ctx,
    table: &InstructionTable,
    strs_base: u64,
    target: FunId,
    is_tail_site: bool,
    out: &mut Vec<u8>,
) -> Result<(), CompileError> {
    info::force(ctx, table, target)?;
    let info = ctx.fun(target).info.as_ref().unwrap().clone();
    if info.inline {
        let callee_ast = ctx.fun(target).ast.clone();
        if info.asm {
            for e in &callee_ast.block.exprs {
                let Expr::Str { value, .. } = e else {
                    unreachable!("info pass already rejected non-string asm bodies");
                };
                let inst = table.get(value).expect("type checker already validated asm mnemonics");
                out.push(inst.opcode);
            }
            return Ok(());
        }
        let callee_ident = ctx.fun(target).ident.clone();
        let callee_caller = caller_flags(&callee_ast);
        return emit_exprs(
            ctx, table, &callee_ident, callee_caller, &[], 0, strs_base, &callee_ast.block.exprs,
            false, out,
        );
    }
    if is_tail_site {
        out.push(OP_JUMP_IMM);
    } else {
        out.push(OP_CALL_IMM);
    }
    out.extend_from_slice(&le_bytes(info.pos, 8));
    Ok(())
}

/// Store the top-of-stack value (occupying `layout.len()` machine words)
/// into consecutive slots starting at `base`. A fresh push leaves the
/// *last* leaf of `layout` on top, so storing walks it in reverse to pop
/// the right word into the right address; [`load_slots`] undoes this by
/// walking forward, reproducing the same stack shape.
fn store_slots(base: u64, layout: &[Typ], out: &mut Vec<u8>) {
    for (i, leaf) in layout.iter().enumerate().rev() {
        out.push(store_imm_opcode(leaf.width_bits()));
        out.extend_from_slice(&le_bytes(base + slot_offset(layout, i), 8));
    }
}

fn load_slots(base: u64, layout: &[Typ], out: &mut Vec<u8>) {
    for (i, leaf) in layout.iter().enumerate() {
        out.push(load_imm_opcode(leaf.width_bits()));
        out.extend_from_slice(&le_bytes(base + slot_offset(layout, i), 8));
    }
}

fn slot_offset(layout: &[Typ], i: usize) -> u64 {
    layout[..i].iter().map(|t| t.size()).sum()
}

fn push_imm_opcode(width_bits: u32) -> u8 {
    10 + width_index(width_bits)
}

fn load_imm_opcode(width_bits: u32) -> u8 {
    230 + width_index(width_bits)
}

fn store_imm_opcode(width_bits: u32) -> u8 {
    235 + width_index(width_bits)
}

fn width_index(width_bits: u32) -> u8 {
    match width_bits {
        8 => 0,
        16 => 1,
        32 => 2,
        64 => 3,
        128 => 4,
        other => unreachable!("no machine word has width {} bits", other),
    }
}

/// All immediates are written little-endian: the low byte first, then
/// successively shifted bytes, truncated to `width` (spec.md §4.4's
/// "immediate encoding").
fn le_bytes(value: u64, width: usize) -> Vec<u8> {
    let mut v = value;
    let mut bytes = Vec::with_capacity(width);
    for _ in 0..width {
        bytes.push((v & 0xff) as u8);
        v >>= 8;
    }
    bytes
}
