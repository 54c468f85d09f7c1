//! VDF text -> tree document.

use super::parser::{self, VdfDocument, VdfValue};
use super::tree::{contiguous_indices, is_array_like, ArrayShape, TreeValue};
use super::{BLANK_KEY_PREFIX, REPEATABLE_BLOCKS};
use crate::types::errors::CodecError;
use regex::{Captures, Regex};
use std::borrow::Cow;
use std::path::Path;
use std::sync::LazyLock;
use uuid::Uuid;

static BLANK_KEY_LINE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"(?m)^([ \t]*)""([ \t]+")"#).expect("valid blank key regex"));

/// File names whose documents hold repeatable condition blocks.
const CONDITION_DOCUMENTS: &[&str] = &["vbsp_config"];

/// What the decoder needs to know about the document it is reading.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecodeContext {
    /// Logical name used in error messages, e.g. `items/door/editoritems.txt`.
    pub name: String,
    /// Tag repeatable blocks so sibling repeats get distinct keys.
    pub condition_document: bool,
}

impl DecodeContext {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            condition_document: false,
        }
    }

    pub fn condition(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            condition_document: true,
        }
    }

    /// Derive the context from a file path, relative to `root` when possible.
    pub fn for_path(path: &Path, root: Option<&Path>) -> Self {
        let shown = root
            .and_then(|r| path.strip_prefix(r).ok())
            .unwrap_or(path);
        let name = shown.to_string_lossy().replace('\\', "/");
        let stem = path
            .file_stem()
            .map(|s| s.to_string_lossy().to_lowercase())
            .unwrap_or_default();
        Self {
            name,
            condition_document: CONDITION_DOCUMENTS.contains(&stem.as_str()),
        }
    }
}

/// Decode VDF text into a tree document.
pub fn decode(text: &str, ctx: &DecodeContext) -> Result<TreeValue, CodecError> {
    let renamed = rename_blank_keys(text);
    let doc = parser::parse(&renamed).map_err(|e| e.with_file(ctx.name.clone()))?;
    block_to_tree(doc, ctx).map_err(|e| match e {
        CodecError::Structural(msg) => CodecError::Structural(format!("{}: {msg}", ctx.name)),
        other => other,
    })
}

/// Decode raw file bytes: UTF-8 (BOM tolerated), else Windows-1252.
pub fn decode_bytes(bytes: &[u8], ctx: &DecodeContext) -> Result<TreeValue, CodecError> {
    decode(&bytes_to_text(bytes, &ctx.name), ctx)
}

pub(crate) fn bytes_to_text<'a>(bytes: &'a [u8], name: &str) -> Cow<'a, str> {
    let content = bytes.strip_prefix(&[0xEF, 0xBB, 0xBF]).unwrap_or(bytes);
    match std::str::from_utf8(content) {
        Ok(text) => Cow::Borrowed(text),
        Err(_) => {
            log::warn!("{name} is not valid UTF-8, reading as Windows-1252");
            let (text, _, _) = encoding_rs::WINDOWS_1252.decode(content);
            text
        }
    }
}

/// Rewrite every blank-keyed line to `desc_<n>`, counting from 0 in file order.
pub fn rename_blank_keys(text: &str) -> Cow<'_, str> {
    let mut counter = 0usize;
    BLANK_KEY_LINE_RE.replace_all(text, |caps: &Captures<'_>| {
        let key = format!("{}\"{BLANK_KEY_PREFIX}{counter}\"{}", &caps[1], &caps[2]);
        counter += 1;
        key
    })
}

/// Append a unique token to a repeatable block key.
pub fn tag_repeatable_key(key: &str) -> String {
    format!("{key}_{}", Uuid::new_v4().simple())
}

pub fn is_repeatable_key(key: &str) -> bool {
    REPEATABLE_BLOCKS
        .iter()
        .any(|block| block.eq_ignore_ascii_case(key))
}

fn block_to_tree(doc: VdfDocument, ctx: &DecodeContext) -> Result<TreeValue, CodecError> {
    let mut entries: Vec<(String, TreeValue)> = Vec::with_capacity(doc.len());

    for (key, value) in doc.entries {
        let node = match value {
            VdfValue::Str(s) => TreeValue::Scalar(s),
            VdfValue::Block(inner) => block_to_tree(inner, ctx)?,
        };
        let key = if ctx.condition_document && is_repeatable_key(&key) {
            tag_repeatable_key(&key)
        } else {
            key
        };

        match entries.iter_mut().find(|(k, _)| *k == key) {
            Some((_, TreeValue::Array(items, ArrayShape::Repeated))) => items.push(node),
            Some((_, existing)) => {
                let first = std::mem::replace(existing, TreeValue::empty_object());
                *existing = TreeValue::Array(vec![first, node], ArrayShape::Repeated);
            }
            None => entries.push((key, node)),
        }
    }

    if is_array_like(entries.iter().map(|(k, _)| k.as_str())) {
        contiguous_indices(entries.iter().map(|(k, _)| k.as_str()))?;
        let mut indexed: Vec<(usize, TreeValue)> = entries
            .into_iter()
            .filter_map(|(k, v)| k.parse::<usize>().ok().map(|idx| (idx, v)))
            .collect();
        indexed.sort_by_key(|(idx, _)| *idx);
        let items = indexed.into_iter().map(|(_, v)| v).collect();
        return Ok(TreeValue::Array(items, ArrayShape::Numbered));
    }

    Ok(TreeValue::Object(entries))
}
