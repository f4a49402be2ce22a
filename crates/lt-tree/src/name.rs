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

use std::fmt::{self, Debug, Display};
use std::sync::Arc;

/// A child-map key. Byte strings, not `str` — edict names carry whatever
/// bytes the source text gave them. `Ord` on `[u8]` already gives the
/// ordering the resolver depends on: two names where one is a strict prefix
/// of the other compare by length once the shared prefix is equal.
#[derive(Clone, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct Name(Arc<[u8]>);

impl Name {
    pub fn new(bytes: impl Into<Vec<u8>>) -> Self {
        Name(Arc::from(bytes.into().into_boxed_slice()))
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl From<&str> for Name {
    fn from(s: &str) -> Self {
        Name::new(s.as_bytes())
    }
}

impl From<&[u8]> for Name {
    fn from(s: &[u8]) -> Self {
        Name::new(s)
    }
}

impl Debug for Name {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match std::str::from_utf8(&self.0) {
            Ok(s) => write!(f, "Name({s:?})"),
            Err(_) => write!(f, "Name({:?})", &*self.0),
        }
    }
}

impl Display for Name {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match std::str::from_utf8(&self.0) {
            Ok(s) => write!(f, "{s}"),
            Err(_) => write!(f, "{:?}", &*self.0),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_case::test_case;

    #[test]
    fn prefix_orders_before_longer() {
        let short = Name::from("a");
        let long = Name::from("ab");
        assert!(short < long);
    }

    #[test]
    fn equal_length_identical_equal() {
        assert_eq!(Name::from("abc"), Name::from("abc"));
    }

    #[test_case("a", "ab"; "shorter prefix orders first")]
    #[test_case("alpha", "bravo"; "differing first byte")]
    #[test_case("a", "b"; "single byte")]
    fn lesser_orders_before_greater(lesser: &str, greater: &str) {
        assert!(Name::from(lesser) < Name::from(greater));
    }
}
