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

use thiserror::Error;

/// Why an environment went `Broken`. Errors are surfaced as
/// state transitions, never by unwinding across the dispatch loop.
#[derive(Debug, Clone, Error)]
pub enum BrokenReason {
    #[error("invalid opcode: {0}")]
    InvalidOpcode(#[from] lt_bytecode::Error),
    #[error("dependent opcode ran on an unbound reference")]
    UnboundReference,
    #[error("generic stack op targeted the REFS resource, which is not holder-representable")]
    RefsResourceMismatch,
    #[error("REFS stack underflow")]
    RefsUnderflow,
    #[error("WIP underflow")]
    WipUnderflow,
    #[error("builtin {0:?} is not registered")]
    BuiltinMissing(String),
    #[error("builtin {0:?} failed: {1}")]
    BuiltinFailed(String, String),
    #[error("front-end parse error: {0}")]
    Parse(#[from] lt_edict::ParseError),
    #[error("lock opcode issued while a conflicting lock was already held")]
    DoubleLock,
    #[error("UNLOCK issued without a held lock")]
    NotLocked,
}

/// The environment's overall disposition, inspected by the scheduler after
/// each `vm_eval` call and by the CLI at the end of the run.
#[derive(Debug, Clone, Default)]
pub enum EnvState {
    #[default]
    Runnable,
    /// Ran to completion with no more lambda frames; the normal exit.
    Complete,
    /// An exception reached program end uncaught (see DESIGN.md's resolved
    /// THROW/CATCH timing). Not a scheduling error: the
    /// scheduler still releases the environment rather than re-enqueuing it,
    /// same as `Broken`, but the CLI distinguishes the two in its report.
    Thrown,
    Broken(BrokenReason),
}

impl EnvState {
    pub fn is_runnable(&self) -> bool {
        matches!(self, EnvState::Runnable)
    }

    pub fn is_terminal(&self) -> bool {
        !self.is_runnable()
    }
}
