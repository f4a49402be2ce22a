// Copyright (C) 2026 The Authors
//
// This program is free software: you can redistribute it and/or modify it under
// the terms of the GNU General Public License as published by the Free Software
// Foundation, version 3.
//
// This program is distributed in the hope that it will be useful, but WITHOUT
// ANY WARRANTY; without even the implied warranty of MERCHANTABILITY or FITNESS
// FOR A PARTICULAR PURPOSE. See the GNU General Public License for more details.
//
// You should have received a copy of the GNU General Public License along with
// this program. If not, see <https://www.gnu.org/licenses/>.
//

use lt_bytecode::{decode_one, Op};
use lt_edict::Format;
use lt_ref::Reference;
use lt_tree::{lt_get, lt_put, End, Ltv, LtvFlags};
use tracing::trace;

use crate::environment::Environment;
use crate::environment::HeldLock;
use crate::resource::Resource;
use crate::runtime::Runtime;
use crate::state::{BrokenReason, EnvState};

/// What the dispatch loop should do after one opcode. Only `Yield` suspends
/// the only suspension point; everything else keeps the loop going
/// or ends it terminally via `env.state`.
enum Step {
    Continue,
    Yield,
}

fn wire_flags(flags: u32) -> LtvFlags {
    let mut f = LtvFlags::OWNED;
    if flags & 0b0010 != 0 {
        f = f | LtvFlags::BINARY;
    }
    if flags & 0b0100 != 0 {
        f = f | LtvFlags::RO;
    }
    if flags & 0b1000 != 0 {
        f = f | LtvFlags::NIL;
    }
    f
}

/// `vm_eval`: fetch the top CODE holder's bytes and the top IP holder's
/// position, and execute opcodes from there until the code is exhausted,
/// an opcode yields, or an invalid opcode breaks the environment. On normal
/// exhaustion of the outermost lambda frame the environment completes; any
/// residual WIP is flushed onto the operand stack first (see DESIGN.md).
pub fn vm_eval(env: &mut Environment, runtime: &Runtime) {
    loop {
        if !env.has_frame() {
            env.flush_wip_to_stack();
            env.state = match env.state {
                EnvState::Runnable if env.exception.is_some() => EnvState::Thrown,
                EnvState::Runnable => EnvState::Complete,
                ref other => other.clone(),
            };
            return;
        }
        let bytecode = env.top_code_bytes().unwrap_or_default();
        let pos = env.top_ip().unwrap_or(0);
        match decode_one(&bytecode, pos) {
            Ok(None) => {
                env.lambda_pop();
                continue;
            }
            Ok(Some((op, next))) => {
                env.set_top_ip(next);
                trace!(?op, pos, "dispatch");
                match dispatch(env, runtime, op) {
                    Ok(Step::Continue) => continue,
                    Ok(Step::Yield) => return,
                    Err(reason) => {
                        env.state = EnvState::Broken(reason);
                        return;
                    }
                }
            }
            Err(e) => {
                env.state = EnvState::Broken(BrokenReason::InvalidOpcode(e));
                return;
            }
        }
    }
}

fn dispatch(env: &mut Environment, runtime: &Runtime, op: Op) -> Result<Step, BrokenReason> {
    match op {
        Op::ResDict => env.current_res = Resource::Dict,
        Op::ResCode => env.current_res = Resource::Code,
        Op::ResRefs => env.current_res = Resource::Refs,
        Op::ResIp => env.current_res = Resource::Ip,
        Op::ResWip => env.current_res = Resource::Wip,

        Op::Push => generic_push(env)?,
        Op::Pop => generic_pop(env)?,
        Op::Peek => generic_peek(env)?,
        Op::Dup => {
            if let Some(top) = env.wip.front().cloned() {
                env.wip.push_front(top);
            }
        }
        Op::Drop => {
            env.wip.pop_front();
        }

        Op::SPush => {
            if let (Some(value), Some((parent, name))) = (env.wip.pop_front(), env.stack_slot()) {
                lt_put(&parent, name, value.into_ltv(), End::Head);
            }
        }
        Op::SPop => stack_to_wip(env, true),
        Op::SPeek => stack_to_wip(env, false),

        Op::Lit { bytes, flags } => {
            let ltv = Ltv::from_bytes_flagged(bytes, wire_flags(flags));
            env.wip.push_front(ltv.into_holder());
        }
        Op::Ref { name, flags: _ } => {
            env.refs.push(Reference::create(&name));
        }

        Op::RefIns => ref_resolve(env, false, true)?,
        Op::RefRes => ref_resolve(env, false, false)?,
        Op::RefHres => ref_resolve(env, true, false)?,
        Op::RefIter => {
            let r = env.refs.last_mut().ok_or(BrokenReason::RefsUnderflow)?;
            r.iterate(false);
        }
        Op::RefDeq => {
            env.refs.pop();
        }
        Op::Deref => op_deref(env)?,
        Op::Assign => op_assign(env)?,
        Op::Remove => op_remove(env)?,

        Op::Yield => return Ok(Step::Yield),
        Op::Throw => {
            env.exception = env.wip.pop_front();
        }
        Op::Catch => {
            if let Some(value) = env.exception.take() {
                env.wip.push_front(value);
            }
        }
        Op::Edict => op_edict(env)?,
        Op::Xml => return Err(front_end_stub(env, Format::Xml)),
        Op::Json => return Err(front_end_stub(env, Format::Json)),
        Op::Yaml => return Err(front_end_stub(env, Format::Yaml)),
        Op::Lisp => return Err(front_end_stub(env, Format::Lisp)),
        Op::Massoc => return Err(front_end_stub(env, Format::Massoc)),

        Op::RdLock => op_rdlock(env, runtime)?,
        Op::WrLock => op_wrlock(env, runtime)?,
        Op::Unlock => op_unlock(env, runtime)?,

        Op::Builtin => op_builtin(env, runtime)?,

        Op::Map => {}
        Op::Append => op_append(env)?,
        Op::Compare => op_compare(env)?,

        Op::CtxPop => env.context_pop(),
    }
    Ok(Step::Continue)
}

fn generic_push(env: &mut Environment) -> Result<(), BrokenReason> {
    let Some(value) = env.wip.pop_front() else {
        return Ok(());
    };
    match env.current_res {
        Resource::Dict => env.dict.push(value),
        Resource::Code => env.code.push(value),
        Resource::Ip => env.ip.push(value),
        Resource::Wip => env.wip.push_front(value),
        Resource::Refs => return Err(BrokenReason::RefsResourceMismatch),
    }
    Ok(())
}

fn generic_pop(env: &mut Environment) -> Result<(), BrokenReason> {
    let moved = match env.current_res {
        Resource::Dict => env.dict.pop(),
        Resource::Code => env.code.pop(),
        Resource::Ip => env.ip.pop(),
        Resource::Wip => env.wip.pop_front(),
        Resource::Refs => return Err(BrokenReason::RefsResourceMismatch),
    };
    if let Some(value) = moved {
        env.wip.push_front(value);
    }
    Ok(())
}

fn generic_peek(env: &mut Environment) -> Result<(), BrokenReason> {
    let copied = match env.current_res {
        Resource::Dict => env.dict.last().cloned(),
        Resource::Code => env.code.last().cloned(),
        Resource::Ip => env.ip.last().cloned(),
        Resource::Wip => env.wip.front().cloned(),
        Resource::Refs => return Err(BrokenReason::RefsResourceMismatch),
    };
    if let Some(value) = copied {
        env.wip.push_front(value);
    }
    Ok(())
}

fn stack_to_wip(env: &mut Environment, pop: bool) {
    let Some((parent, name)) = env.stack_slot() else {
        return;
    };
    if let Some(value) = lt_get(&parent, &name, pop, End::Head) {
        env.wip.push_front(value.into_holder());
    }
}

/// Resolve the top-of-REFS reference, either against the single top dict
/// (`hierarchical = false`) or across the whole dict chain top-down
/// (`hierarchical = true`, `vm_ref_hres`).
fn ref_resolve(env: &mut Environment, hierarchical: bool, insert: bool) -> Result<(), BrokenReason> {
    let chain = env.dict_chain();
    let r = env.refs.last_mut().ok_or(BrokenReason::RefsUnderflow)?;
    if hierarchical {
        r.resolve_hierarchical(&chain, insert);
    } else {
        let top = chain.last().expect("dict never empties below root").clone();
        r.resolve(&top, insert);
    }
    Ok(())
}

/// `DEREF`: push the bound value onto WIP. The edict compiler never emits
/// an explicit resolve step before this (see DESIGN.md), so an
/// unbound reference is resolved hierarchically, without insertion, here —
/// this is how free names reach enclosing scopes.
fn op_deref(env: &mut Environment) -> Result<(), BrokenReason> {
    let chain = env.dict_chain();
    let r = env.refs.last_mut().ok_or(BrokenReason::RefsUnderflow)?;
    if matches!(r.binding(), lt_ref::Binding::Unbound) {
        r.resolve_hierarchical(&chain, false);
    }
    let value = r.ltv().ok_or(BrokenReason::UnboundReference)?;
    env.wip.push_front(value.into_holder());
    Ok(())
}

/// `ASSIGN`: pop a value off WIP and bind it at the head of the reference's
/// slot. An unresolved reference resolves against the innermost (top) dict
/// only, with insertion — assignment always targets local scope, never an
/// enclosing one (see DESIGN.md).
fn op_assign(env: &mut Environment) -> Result<(), BrokenReason> {
    let value = env.wip.pop_front().ok_or(BrokenReason::WipUnderflow)?;
    let top = env.current_dict();
    let r = env.refs.last_mut().ok_or(BrokenReason::RefsUnderflow)?;
    if matches!(r.binding(), lt_ref::Binding::Unbound) {
        r.resolve(&top, true);
    }
    r.assign(value.into_ltv()).map_err(|_| BrokenReason::UnboundReference)?;
    Ok(())
}

/// `REMOVE`: pop the reference's bound holder from its slot. An unresolved
/// reference is resolved the same way `DEREF` would (hierarchically,
/// without insertion) — removal targets whatever binding a read would have
/// found.
fn op_remove(env: &mut Environment) -> Result<(), BrokenReason> {
    let chain = env.dict_chain();
    let r = env.refs.last_mut().ok_or(BrokenReason::RefsUnderflow)?;
    if matches!(r.binding(), lt_ref::Binding::Unbound) {
        r.resolve_hierarchical(&chain, false);
    }
    r.remove().map_err(|_| BrokenReason::UnboundReference)?;
    Ok(())
}

/// `EDICT`: compile WIP's top as edict source and push the result as a new
/// lambda frame, then yield so the caller re-enters dispatch there.
fn op_edict(env: &mut Environment) -> Result<(), BrokenReason> {
    let src = env.wip.pop_front().map(|h| h.ltv().bytes().unwrap_or_default()).unwrap_or_default();
    let bytecode = lt_edict::compile_bytecode(&src)?;
    env.lambda_push(bytecode);
    Ok(())
}

fn front_end_stub(env: &mut Environment, format: Format) -> BrokenReason {
    let src = env.wip.front().map(|h| h.ltv().bytes().unwrap_or_default()).unwrap_or_default();
    match format.compile(&src) {
        Ok(_) => unreachable!("non-edict/asm formats always report unsupported"),
        Err(e) => BrokenReason::Parse(e),
    }
}

fn op_rdlock(env: &mut Environment, runtime: &Runtime) -> Result<(), BrokenReason> {
    if env.held_lock.is_some() {
        return Err(BrokenReason::DoubleLock);
    }
    runtime.dict_gate().acquire_read();
    env.held_lock = Some(HeldLock::Read);
    Ok(())
}

fn op_wrlock(env: &mut Environment, runtime: &Runtime) -> Result<(), BrokenReason> {
    if env.held_lock.is_some() {
        return Err(BrokenReason::DoubleLock);
    }
    runtime.dict_gate().acquire_write();
    env.held_lock = Some(HeldLock::Write);
    Ok(())
}

fn op_unlock(env: &mut Environment, runtime: &Runtime) -> Result<(), BrokenReason> {
    match env.held_lock.take() {
        Some(HeldLock::Read) => {
            runtime.dict_gate().release_read();
            Ok(())
        }
        Some(HeldLock::Write) => {
            runtime.dict_gate().release_write();
            Ok(())
        }
        None => Err(BrokenReason::NotLocked),
    }
}

/// `BUILTIN`: consumes the top REFS entry as a name. When no
/// reference was pushed — as in `[dump]#`, where the literal payload itself
/// names the builtin rather than a `name#` reference — falls back to the
/// top of WIP's bytes instead (see DESIGN.md).
fn op_builtin(env: &mut Environment, runtime: &Runtime) -> Result<(), BrokenReason> {
    let name_bytes = if let Some(r) = env.refs.pop() {
        r.target_name().as_bytes().to_vec()
    } else {
        env.wip.pop_front().map(|h| h.ltv().bytes().unwrap_or_default()).unwrap_or_default()
    };
    let name = String::from_utf8_lossy(&name_bytes).into_owned();
    let f = runtime.builtins().get(&name).ok_or_else(|| BrokenReason::BuiltinMissing(name.clone()))?;
    f(env).map_err(|e| BrokenReason::BuiltinFailed(name, e))
}

fn op_append(env: &mut Environment) -> Result<(), BrokenReason> {
    let rhs = env.wip.pop_front().ok_or(BrokenReason::WipUnderflow)?;
    let lhs = env.wip.pop_front().ok_or(BrokenReason::WipUnderflow)?;
    let mut bytes = lhs.ltv().bytes().unwrap_or_default();
    bytes.extend(rhs.ltv().bytes().unwrap_or_default());
    env.wip.push_front(Ltv::from_bytes(bytes).into_holder());
    Ok(())
}

fn op_compare(env: &mut Environment) -> Result<(), BrokenReason> {
    let a = env.wip.pop_front().ok_or(BrokenReason::WipUnderflow)?;
    let b = env.wip.pop_front().ok_or(BrokenReason::WipUnderflow)?;
    let equal = a.ltv().bytes() == b.ltv().bytes();
    env.wip.push_front(Ltv::from_bytes(vec![equal as u8]).into_holder());
    Ok(())
}
