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

use std::collections::VecDeque;

use lt_ref::Reference;
use lt_tree::{lt_get, lt_put, End, Holder, Ltv, Name};
use tracing::debug;

use crate::resource::Resource;
use crate::state::EnvState;

/// Which kind of gate an environment currently holds, for `UNLOCK` to know
/// what to release.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum HeldLock {
    Read,
    Write,
}

fn stack_name() -> Name {
    Name::from("$")
}

/// Encode a bytecode position as an 8-byte big-endian payload, the
/// representation assigned to IP holders so the resource keeps reusing the
/// single `Holder` sequence-element type instead of a bespoke `Vec<usize>`.
pub fn encode_ip(pos: usize) -> Vec<u8> {
    (pos as u64).to_be_bytes().to_vec()
}

pub fn decode_ip(bytes: &[u8]) -> usize {
    let mut buf = [0u8; 8];
    let n = bytes.len().min(8);
    buf[8 - n..].copy_from_slice(&bytes[..n]);
    u64::from_be_bytes(buf) as usize
}

/// The VM's per-computation state (VM_ENV): five named resource stacks plus
/// a stack-reference addressing the logical operand stack inside the
/// current dict.
pub struct Environment {
    pub(crate) dict: Vec<Holder>,
    pub(crate) code: Vec<Holder>,
    pub(crate) refs: Vec<Reference>,
    pub(crate) ip: Vec<Holder>,
    pub(crate) wip: VecDeque<Holder>,
    pub(crate) current_res: Resource,
    stack_ref: Reference,
    pub(crate) exception: Option<Holder>,
    pub(crate) held_lock: Option<HeldLock>,
    pub state: EnvState,
    /// The environment's own identity as a value-node, so it can be
    /// enqueued into the shared runnable queue like any other LisTree value
    /// the shared runnable queue like any other LisTree value.
    node: Ltv,
}

impl Environment {
    /// `vm_env_init`: a fresh environment over `root_dict`, with an empty
    /// holder list per resource and a pre-created stack-reference bound to
    /// `$`.
    pub fn new(root_dict: Ltv) -> Self {
        Environment {
            dict: vec![Holder::new(root_dict)],
            code: Vec::new(),
            refs: Vec::new(),
            ip: Vec::new(),
            wip: VecDeque::new(),
            current_res: Resource::default(),
            stack_ref: Reference::create(b"$"),
            exception: None,
            held_lock: None,
            state: EnvState::Runnable,
            node: Ltv::none(),
        }
    }

    /// The environment's value-node identity.
    pub fn node(&self) -> &Ltv {
        &self.node
    }

    pub fn current_dict(&self) -> Ltv {
        self.dict.last().expect("dict never empties below root").ltv().clone()
    }

    pub fn dict_depth(&self) -> usize {
        self.dict.len()
    }

    pub fn dict_chain(&self) -> Vec<Ltv> {
        self.dict.iter().map(|h| h.ltv().clone()).collect()
    }

    /// `vm_env_release`: drain every resource, dropping the held node
    /// references. Holders are `Arc`-backed, so dropping them is enough to
    /// decrement refcounts; this method exists to make that release an
    /// explicit, observable step.
    pub fn release(&mut self) {
        debug!(
            dict = self.dict.len(),
            code = self.code.len(),
            refs = self.refs.len(),
            ip = self.ip.len(),
            wip = self.wip.len(),
            "releasing environment resources"
        );
        self.dict.clear();
        self.code.clear();
        self.refs.clear();
        self.ip.clear();
        self.wip.clear();
        self.exception = None;
    }

    /// `vm_context_push`: push an existing dictionary onto DICT as a new
    /// lexical scope.
    pub fn context_push(&mut self, ltv: Ltv) {
        self.dict.push(Holder::new(ltv));
    }

    /// `vm_context_pop`: pop DICT, then merge the popped context's operand
    /// stack into the new top's operand stack at its head, preserving the
    /// popped sequence's own order. A no-op if only the root
    /// dict remains — an environment always has a current dict.
    pub fn context_pop(&mut self) {
        if self.dict.len() <= 1 {
            return;
        }
        let old = self.dict.pop().expect("checked len above").into_ltv();
        let new_top = self.current_dict();
        let name = stack_name();
        // Drain `old`'s "$" from the tail forward so re-pushing each item at
        // the new top's head reproduces the original order (see
        // `flush_wip_to_stack` for the same trick).
        while let Some(value) = lt_get(&old, &name, true, End::Tail) {
            lt_put(&new_top, name.clone(), value, End::Head);
        }
    }

    /// `vm_lambda_push`: push `bytecode` onto CODE and a fresh zero onto IP.
    pub fn lambda_push(&mut self, bytecode: Vec<u8>) {
        self.code.push(Holder::new(Ltv::from_bytes(bytecode)));
        self.ip.push(Holder::new(Ltv::from_bytes(encode_ip(0))));
    }

    /// `vm_lambda_pop`: discard the top of CODE and IP.
    pub fn lambda_pop(&mut self) {
        self.code.pop();
        self.ip.pop();
    }

    pub fn has_frame(&self) -> bool {
        !self.code.is_empty()
    }

    pub(crate) fn top_code_bytes(&self) -> Option<Vec<u8>> {
        self.code.last().map(|h| h.ltv().bytes().unwrap_or_default())
    }

    pub(crate) fn top_ip(&self) -> Option<usize> {
        self.ip
            .last()
            .map(|h| decode_ip(&h.ltv().bytes().unwrap_or_default()))
    }

    pub(crate) fn set_top_ip(&mut self, pos: usize) {
        if let Some(h) = self.ip.last() {
            h.ltv().lock().bytes = Some(encode_ip(pos));
        }
    }

    /// Reference addressing the logical operand stack ("$") inside the
    /// current dict, resolved fresh against whatever the
    /// current dict happens to be at the moment of use.
    pub(crate) fn stack_slot(&mut self) -> Option<(Ltv, Name)> {
        let top = self.current_dict();
        self.stack_ref.resolve(&top, true);
        self.stack_ref.lti()
    }

    /// On normal completion, any value still sitting in WIP is moved onto
    /// the current dict's operand stack, preserving order, so that a
    /// program's result is always observable there regardless of whether it
    /// explicitly used `SPUSH` (resolves the interaction between the WIP
    /// register and the named operand stack; see DESIGN.md).
    pub(crate) fn flush_wip_to_stack(&mut self) {
        let Some((parent, name)) = self.stack_slot() else {
            return;
        };
        while let Some(holder) = self.wip.pop_back() {
            lt_put(&parent, name.clone(), holder.into_ltv(), End::Head);
        }
    }

    /// The operand stack's contents, head to tail, for reporting.
    pub fn operand_stack(&self) -> Vec<Ltv> {
        let current = self.dict.last().expect("dict never empties below root").ltv();
        let name = stack_name();
        lt_tree::lt_traverse(current, |n, slot| {
            if *n == name {
                Some(slot.iter().map(|h| h.ltv().clone()).collect::<Vec<_>>())
            } else {
                None
            }
        })
        .unwrap_or_default()
    }
}
