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

//! The VM environment, opcode evaluator, builtin bridge, and cooperative
//! scheduler. A [`lt_tree::Ltv`] root dict plus a compiled bytecode program
//! become one or more [`Environment`]s, driven to completion by a
//! [`Runtime`]'s worker pool.

mod builtins;
mod environment;
mod eval;
mod resource;
mod runtime;
mod state;

pub use builtins::{BuiltinFn, BuiltinTable};
pub use environment::{decode_ip, encode_ip, Environment, HeldLock};
pub use eval::vm_eval;
pub use resource::Resource;
pub use runtime::{run_workers, Runtime};
pub use state::{BrokenReason, EnvState};

#[cfg(test)]
mod tests {
    use super::*;
    use lt_tree::Ltv;
    use pretty_assertions::assert_eq;

    fn run_to_completion(src: &[u8]) -> Environment {
        let root = Ltv::none();
        let mut env = Environment::new(root);
        let bytecode = lt_edict::compile_bytecode(src).expect("compiles");
        env.lambda_push(bytecode);
        let runtime = Runtime::new(BuiltinTable::with_defaults());
        loop {
            vm_eval(&mut env, &runtime);
            if env.state.is_terminal() {
                break;
            }
        }
        env
    }

    fn stack_bytes(env: &Environment) -> Vec<Vec<u8>> {
        env.operand_stack().iter().map(|v| v.bytes().unwrap_or_default()).collect()
    }

    #[test]
    fn literal_alone_lands_on_the_operand_stack() {
        let env = run_to_completion(b"[hello]");
        assert!(matches!(env.state, EnvState::Complete));
        assert_eq!(stack_bytes(&env), vec![b"hello".to_vec()]);
    }

    #[test]
    fn assign_then_deref_round_trips_through_a_name() {
        let env = run_to_completion(b"[hello]@a a");
        assert!(matches!(env.state, EnvState::Complete));
        assert_eq!(stack_bytes(&env), vec![b"hello".to_vec()]);
    }

    #[test]
    fn assign_twice_remove_once_returns_the_removed_value() {
        let env = run_to_completion(b"[1]@a [2]@a a/");
        assert!(matches!(env.state, EnvState::Complete));
        assert_eq!(stack_bytes(&env), vec![b"2".to_vec()]);
    }

    #[test]
    fn parenthesized_block_merges_its_stack_into_the_parent() {
        let env = run_to_completion(b"[x]@a (a)");
        assert!(matches!(env.state, EnvState::Complete));
        assert_eq!(stack_bytes(&env), vec![b"x".to_vec()]);
    }

    #[test]
    fn throwing_an_uncaught_value_ends_the_environment_thrown() {
        let env = run_to_completion(b"[nope]&");
        assert!(matches!(env.state, EnvState::Thrown));
    }

    #[test]
    fn dump_builtin_runs_without_disturbing_the_stack() {
        let env = run_to_completion(b"[dump]#");
        assert!(matches!(env.state, EnvState::Complete));
        assert!(stack_bytes(&env).is_empty());
    }

    #[test]
    fn unknown_builtin_breaks_the_environment() {
        let env = run_to_completion(b"[nosuchbuiltin]#");
        assert!(matches!(env.state, EnvState::Broken(BrokenReason::BuiltinMissing(_))));
    }
}
