//! Cache key helpers.
//!
//! Pure functions for turning call arguments into cache keys. Key uniqueness
//! is still the caller's responsibility.

use std::collections::BTreeMap;
use std::fmt;
use std::panic::Location;

use serde::Serialize;
use serde_json::Value;

/// One positional argument of a generated key.
///
/// Strings and non-strings are kept apart because an empty separator puts a
/// space only between two adjacent non-string parts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum KeyPart {
    Str(String),
    Other(String),
}

impl KeyPart {
    fn is_str(&self) -> bool {
        matches!(self, KeyPart::Str(_))
    }

    fn as_str(&self) -> &str {
        match self {
            KeyPart::Str(s) | KeyPart::Other(s) => s,
        }
    }
}

impl fmt::Display for KeyPart {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<&str> for KeyPart {
    fn from(s: &str) -> Self {
        KeyPart::Str(s.to_string())
    }
}

impl From<String> for KeyPart {
    fn from(s: String) -> Self {
        KeyPart::Str(s)
    }
}

impl From<&String> for KeyPart {
    fn from(s: &String) -> Self {
        KeyPart::Str(s.clone())
    }
}

macro_rules! key_part_from_display {
    ($($t:ty),* $(,)?) => {
        $(
            impl From<$t> for KeyPart {
                fn from(v: $t) -> Self {
                    KeyPart::Other(v.to_string())
                }
            }
        )*
    };
}

key_part_from_display!(
    bool, i8, i16, i32, i64, i128, isize, u8, u16, u32, u64, u128, usize, f32, f64
);

/// Build a `Vec<KeyPart>` from heterogeneous values.
///
/// ```
/// use remember_core::{create_key, key_parts};
/// assert_eq!(create_key(false, "+", "", &key_parts![1, 2, 3]), "1+2+3");
/// ```
#[macro_export]
macro_rules! key_parts {
    ($($arg:expr),* $(,)?) => {
        vec![$($crate::key::KeyPart::from($arg)),*]
    };
}

/// Generate a key from positional arguments.
///
/// With `prefix` set, the caller's source location is prepended so that
/// identical arguments used at different call sites produce different keys.
/// Parts are joined with `sep`; an empty `sep` concatenates them, inserting
/// a space only between two adjacent non-string parts. `visual` has no
/// effect and exists to document the key's shape at the call site.
#[track_caller]
pub fn create_key(prefix: bool, sep: &str, visual: &str, args: &[KeyPart]) -> String {
    let _ = visual;
    let mut output = String::new();

    if prefix {
        let caller = Location::caller();
        output.push_str(&format!(
            "{}_{}_{}_",
            caller.file(),
            caller.line(),
            caller.column()
        ));
    }

    if sep.is_empty() {
        for (i, part) in args.iter().enumerate() {
            if i > 0 && !part.is_str() && !args[i - 1].is_str() {
                output.push(' ');
            }
            output.push_str(part.as_str());
        }
    } else {
        let joined = args.iter().map(KeyPart::as_str).collect::<Vec<_>>().join(sep);
        output.push_str(&joined);
    }

    output
}

/// Generate a key by encoding a record as a JSON object.
///
/// Field naming and skipping follow the record's serde attributes
/// (`rename`, `skip`, `skip_serializing_if`). Sequence-valued fields are
/// left out and object keys are emitted in sorted order, so equal records
/// always produce equal keys. A record that serializes to `null` yields an
/// empty key.
pub fn create_key_struct<T: Serialize + ?Sized>(record: &T) -> String {
    let value = match serde_json::to_value(record) {
        Ok(value) => value,
        Err(_) => return String::new(),
    };

    match value {
        Value::Null => String::new(),
        Value::Object(map) => {
            let fields: BTreeMap<String, Value> =
                map.into_iter().filter(|(_, v)| !v.is_array()).collect();
            serde_json::to_string(&fields).unwrap_or_default()
        }
        other => other.to_string(),
    }
}

/// CRC-32 (IEEE) checksum of `key` as 8 lowercase hex digits.
pub fn hash(key: &str) -> String {
    format!("{:08x}", crc32fast::hash(key.as_bytes()))
}
