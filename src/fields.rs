//! Field lookup by tag
//!
//! Identifier resolvers often map a selector such as `user.spec.roles` onto a
//! host structure. Rust has no runtime reflection, so structures opt in by
//! implementing [`Record`]: a static table of [`FieldInfo`] entries, each with
//! a struct tag string in the familiar `key:"value"` form, plus accessors for
//! the field values. [`get_field_by_tag`] then walks a dotted path through
//! nested records, matching path segments against one tag namespace.

use std::any::Any;

use thiserror::Error;

use crate::value::Value;

/// A structure whose fields can be looked up by tag
///
/// `fields()` describes the fields in declaration order and `field(i)` returns
/// the value of the `i`-th one. Nested structures should be returned with
/// [`Value::record`] so the lookup can descend into them.
pub trait Record: Any + Send + Sync {
    fn fields(&self) -> &'static [FieldInfo];

    fn field(&self, index: usize) -> Value;
}

/// Static description of one record field
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FieldInfo {
    pub name: &'static str,
    pub tag: StructTag,
    /// Embedded fields without a tag of their own are searched in place
    pub embedded: bool,
}

impl FieldInfo {
    /// A named field carrying `tag`
    pub const fn new(name: &'static str, tag: &'static str) -> Self {
        Self {
            name,
            tag: StructTag(tag),
            embedded: false,
        }
    }

    /// An embedded field
    pub const fn embedded(name: &'static str) -> Self {
        Self {
            name,
            tag: StructTag(""),
            embedded: true,
        }
    }
}

/// A struct tag: space separated `key:"value"` pairs, e.g.
/// `json:"param,omitempty" db:"param"`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StructTag(pub &'static str);

impl StructTag {
    /// Value stored under `key`, or `None` when the key is absent or the tag
    /// is malformed
    pub fn lookup(&self, key: &str) -> Option<String> {
        let mut rest = self.0;

        loop {
            rest = rest.trim_start_matches(' ');
            if rest.is_empty() {
                return None;
            }

            let name_len = rest
                .find(|c: char| c <= ' ' || c == ':' || c == '"' || c == '\u{7f}')
                .unwrap_or(rest.len());
            if name_len == 0 || !rest[name_len..].starts_with(":\"") {
                return None;
            }
            let name = &rest[..name_len];
            rest = &rest[name_len + 1..];

            let quoted_len = closing_quote(rest)?;
            let quoted = &rest[..quoted_len];
            rest = &rest[quoted_len..];

            if name == key {
                return crate::lexer::unquote(quoted).ok();
            }
        }
    }

    /// Value stored under `key`, or an empty string
    pub fn get(&self, key: &str) -> String {
        self.lookup(key).unwrap_or_default()
    }
}

/// Length of the quoted string at the start of `s`, including both quotes
fn closing_quote(s: &str) -> Option<usize> {
    let mut escaped = false;
    for (i, c) in s.char_indices().skip(1) {
        match c {
            _ if escaped => escaped = false,
            '\\' => escaped = true,
            '"' => return Some(i + 1),
            _ => {}
        }
    }
    None
}

/// Failures of [`get_field_by_tag`]
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FieldError {
    #[error("missing field names")]
    EmptyPath,

    #[error("field name {path} is not found")]
    NotFound { path: String },

    #[error("cannot look up field {path} on a nil value")]
    NilTarget { path: String },
}

impl FieldError {
    /// Whether the path does not exist, as opposed to the input being nil
    pub fn is_not_found(&self) -> bool {
        matches!(self, FieldError::NotFound { .. })
    }
}

/// Return the field of `value` addressed by `path`, matching each segment
/// against the first comma separated component of the field's `namespace`
/// tag.
///
/// Embedded fields without a tag are searched before the remaining fields at
/// the same level. A nil `value` (or a nil intermediate field) yields
/// [`FieldError::NilTarget`]; anything that is not a record, or a segment
/// with no matching field, yields [`FieldError::NotFound`].
pub fn get_field_by_tag<S: AsRef<str>>(
    value: &Value,
    namespace: &str,
    path: &[S],
) -> Result<Value, FieldError> {
    if path.is_empty() {
        return Err(FieldError::EmptyPath);
    }

    if value.is_nil() {
        return Err(FieldError::NilTarget {
            path: join(path),
        });
    }

    let record = value.as_record().ok_or_else(|| FieldError::NotFound {
        path: join(path),
    })?;

    let (segment, rest) = (path[0].as_ref(), &path[1..]);

    for (index, info) in record.fields().iter().enumerate() {
        let tag = info.tag.get(namespace);

        if tag.is_empty() && info.embedded {
            if let Ok(found) = get_field_by_tag(&record.field(index), namespace, path) {
                return Ok(found);
            }
        }

        if tag.split(',').next() == Some(segment) {
            let field = record.field(index);
            if rest.is_empty() {
                return Ok(field);
            }
            return get_field_by_tag(&field, namespace, rest);
        }
    }

    Err(FieldError::NotFound { path: join(path) })
}

fn join<S: AsRef<str>>(path: &[S]) -> String {
    path.iter()
        .map(|s| s.as_ref())
        .collect::<Vec<_>>()
        .join(".")
}
