//! Bidirectional VDF <-> tree document codec.
//!
//! VDF allows repeated and blank sibling keys; tree documents do not. Decode
//! renames blank keys to `desc_<n>` and, in condition documents, suffixes
//! repeatable blocks with a unique token. Encode reverses both.

pub mod decode;
pub mod encode;
pub mod parser;
pub mod tree;

pub use decode::{decode, decode_bytes, DecodeContext};
pub use encode::{encode, encode_json, encode_with, DEFAULT_PROVENANCE};
pub use parser::{parse, VdfDocument, VdfValue};
pub use tree::{ArrayShape, TreeValue};

/// Prefix of the synthetic keys that stand in for blank VDF keys.
pub const BLANK_KEY_PREFIX: &str = "desc_";

/// Block keys that may legally repeat among siblings in condition documents.
pub const REPEATABLE_BLOCKS: &[&str] = &["Switch", "Condition", "MapInstVar"];

/// Collection emitted as nested numbered sub-blocks.
pub const INSTANCES_KEY: &str = "Instances";

/// Variants emitted as a flat run of same-named blocks.
pub const SUBTYPE_KEY: &str = "SubType";

#[cfg(test)]
#[path = "tests/parser_tests.rs"]
mod parser_tests;

#[cfg(test)]
#[path = "tests/codec_tests.rs"]
mod codec_tests;
