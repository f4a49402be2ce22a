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

use std::collections::HashMap;
use std::sync::Arc;

use tracing::info;

use crate::environment::Environment;

/// A host callable invoked by the `BUILTIN` opcode, taking the environment
/// as its only argument.
pub type BuiltinFn = Arc<dyn Fn(&mut Environment) -> Result<(), String> + Send + Sync>;

/// The name→function table an implementer maintains; a missing name is a
/// `BROKEN` condition.
#[derive(Clone, Default)]
pub struct BuiltinTable {
    fns: HashMap<String, BuiltinFn>,
}

impl BuiltinTable {
    pub fn new() -> Self {
        BuiltinTable { fns: HashMap::new() }
    }

    /// The table with the two required builtins registered — at least
    /// `dump` and `ref` must exist.
    pub fn with_defaults() -> Self {
        let mut table = BuiltinTable::new();
        table.register("dump", dump_builtin);
        table.register("ref", ref_builtin);
        table
    }

    pub fn register(
        &mut self,
        name: impl Into<String>,
        f: impl Fn(&mut Environment) -> Result<(), String> + Send + Sync + 'static,
    ) {
        self.fns.insert(name.into(), Arc::new(f));
    }

    pub fn get(&self, name: &str) -> Option<BuiltinFn> {
        self.fns.get(name).cloned()
    }
}

/// Dumps the environment's resource stack sizes to the trace log. Purely a
/// side effect: it leaves the operand stack untouched.
fn dump_builtin(env: &mut Environment) -> Result<(), String> {
    info!(
        dict = env.dict_depth(),
        code = env.code.len(),
        refs = env.refs.len(),
        ip = env.ip.len(),
        wip = env.wip.len(),
        "dump"
    );
    Ok(())
}

/// Pushes a reference to the active module (the current top-of-DICT node)
/// onto WIP.
fn ref_builtin(env: &mut Environment) -> Result<(), String> {
    let top = env.current_dict();
    env.wip.push_front(top.into_holder());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use lt_tree::Ltv;

    #[test]
    fn defaults_register_dump_and_ref() {
        let table = BuiltinTable::with_defaults();
        assert!(table.get("dump").is_some());
        assert!(table.get("ref").is_some());
        assert!(table.get("nonexistent").is_none());
    }

    #[test]
    fn ref_builtin_pushes_current_dict() {
        let mut env = Environment::new(Ltv::none());
        let f = BuiltinTable::with_defaults().get("ref").unwrap();
        f(&mut env).unwrap();
        assert_eq!(env.wip.len(), 1);
    }
}
