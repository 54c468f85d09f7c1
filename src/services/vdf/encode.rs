//! Tree document -> VDF text.

use super::decode::is_repeatable_key;
use super::tree::{ArrayShape, TreeValue};
use super::{BLANK_KEY_PREFIX, INSTANCES_KEY, SUBTYPE_KEY};
use crate::types::errors::CodecError;
use serde_json::Value;
use std::fmt::Write as _;

/// Comment written at the top of every exported root document.
pub const DEFAULT_PROVENANCE: &str = "// Exported by BeePEE";

/// Encode a tree document with the default provenance line.
pub fn encode(tree: &TreeValue) -> Result<String, CodecError> {
    encode_with(tree, DEFAULT_PROVENANCE)
}

/// Encode a persisted JSON tree document.
pub fn encode_json(value: &Value, provenance: &str) -> Result<String, CodecError> {
    encode_with(&TreeValue::from_json(value)?, provenance)
}

pub fn encode_with(tree: &TreeValue, provenance: &str) -> Result<String, CodecError> {
    let mut out = String::new();
    if !provenance.is_empty() {
        out.push_str(provenance);
        out.push('\n');
    }
    match tree {
        TreeValue::Object(entries) => {
            for (key, value) in entries {
                write_entry(&mut out, key, value, 0);
            }
        }
        TreeValue::Array(items, ArrayShape::Numbered) => {
            for (idx, value) in items.iter().enumerate() {
                write_entry(&mut out, &idx.to_string(), value, 0);
            }
        }
        TreeValue::Array(_, ArrayShape::Repeated) | TreeValue::Scalar(_) => {
            return Err(CodecError::Structural(
                "root of a tree document must be an object".to_string(),
            ))
        }
    }
    Ok(out)
}

/// Key as written to VDF: synthetic blank keys become `""`, tagged
/// repeatable keys lose their suffix.
pub fn vdf_key(key: &str) -> &str {
    if is_blank_key(key) {
        return "";
    }
    match key.split_once('_') {
        Some((block, _)) if is_repeatable_key(block) => block,
        _ => key,
    }
}

/// `desc_<digits>`
pub fn is_blank_key(key: &str) -> bool {
    key.strip_prefix(BLANK_KEY_PREFIX)
        .is_some_and(|n| !n.is_empty() && n.bytes().all(|b| b.is_ascii_digit()))
}

fn write_entry(out: &mut String, key: &str, value: &TreeValue, depth: usize) {
    match value {
        TreeValue::Scalar(s) => {
            indent(out, depth);
            let _ = writeln!(out, "\"{}\" \"{}\"", escape(vdf_key(key)), escape(s));
        }
        TreeValue::Object(entries) => {
            open_block(out, key, depth);
            for (child_key, child) in entries {
                write_entry(out, child_key, child, depth + 1);
            }
            close_block(out, depth);
        }
        TreeValue::Array(items, shape) => {
            let numbered = if key.eq_ignore_ascii_case(INSTANCES_KEY) {
                true
            } else if key.eq_ignore_ascii_case(SUBTYPE_KEY) {
                false
            } else {
                *shape == ArrayShape::Numbered
            };

            if numbered {
                open_block(out, key, depth);
                for (idx, item) in items.iter().enumerate() {
                    write_entry(out, &idx.to_string(), item, depth + 1);
                }
                close_block(out, depth);
            } else {
                // One line or block per element, all under the parent key.
                for item in items {
                    write_entry(out, key, item, depth);
                }
            }
        }
    }
}

fn open_block(out: &mut String, key: &str, depth: usize) {
    indent(out, depth);
    let _ = writeln!(out, "\"{}\"", escape(vdf_key(key)));
    indent(out, depth);
    out.push_str("{\n");
}

fn close_block(out: &mut String, depth: usize) {
    indent(out, depth);
    out.push_str("}\n");
}

fn indent(out: &mut String, depth: usize) {
    for _ in 0..depth {
        out.push('\t');
    }
}

/// Quote bare `"` characters; existing escape sequences pass through.
fn escape(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut chars = s.chars();
    while let Some(c) = chars.next() {
        match c {
            '\\' => {
                out.push('\\');
                match chars.next() {
                    Some(next) => out.push(next),
                    None => out.push('\\'),
                }
            }
            '"' => out.push_str("\\\""),
            c => out.push(c),
        }
    }
    out
}
