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

//! Lex and lower the edict concatenative source syntax to bytecode, plus
//! the `Format` token the CLI dispatches on. Every format other than
//! `edict` and `asm` is a declared stub.

mod compile;
mod lexer;

pub use compile::{compile_bytecode, compile_ops, ParseError};
pub use lexer::{lex, LexError, Token};

/// A front-end format token, as named on the CLI.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Format {
    /// Hand-assembled bytecode: the input is already a wire-format record
    /// stream, read verbatim rather than compiled.
    Asm,
    Edict,
    Xml,
    Json,
    Yaml,
    Lisp,
    Massoc,
}

impl Format {
    pub fn parse_token(token: &str) -> Option<Format> {
        Some(match token {
            "asm" => Format::Asm,
            "edict" => Format::Edict,
            "xml" => Format::Xml,
            "json" => Format::Json,
            "yaml" => Format::Yaml,
            "lisp" => Format::Lisp,
            "massoc" => Format::Massoc,
            _ => return None,
        })
    }

    /// Compile `src` to a bytecode stream under this format. `Asm` passes
    /// the bytes through unchanged (the caller is responsible for it being
    /// well-formed bytecode already); only `Edict` is a real compiler.
    pub fn compile(self, src: &[u8]) -> Result<Vec<u8>, ParseError> {
        match self {
            Format::Asm => Ok(src.to_vec()),
            Format::Edict => compile_bytecode(src),
            other => Err(ParseError::UnsupportedFormat(other)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn recognises_all_declared_tokens() {
        for tok in ["asm", "edict", "xml", "json", "yaml", "lisp", "massoc"] {
            assert!(Format::parse_token(tok).is_some());
        }
    }

    #[test]
    fn unknown_token_is_none() {
        assert!(Format::parse_token("yolo").is_none());
    }

    #[test]
    fn non_edict_non_asm_formats_are_unsupported() {
        let err = Format::Json.compile(b"{}").unwrap_err();
        assert!(matches!(err, ParseError::UnsupportedFormat(Format::Json)));
    }
}
