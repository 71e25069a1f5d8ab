//! Byte encoding for drivers that store values outside the process.
//!
//! # Frame Format
//!
//! - value form: the JSON encoding of the value
//! - tagged form: `#` + registered type name + `\n` + JSON encoding
//!
//! JSON text never starts with `#`, so both forms can be told apart on
//! decode without any extra header.

use remember_core::registry::{self, TypeRegistry};
use remember_core::{DriverError, DriverResult};
use serde::{de::DeserializeOwned, Serialize};

use super::traits::Payload;

const TAG_MARKER: u8 = b'#';
const TAG_END: u8 = b'\n';

/// Encode a payload using the process-wide type registry.
pub fn encode<T: Serialize + 'static>(key: &str, payload: Payload<'_, T>) -> DriverResult<Vec<u8>> {
    encode_with(registry::global(), key, payload)
}

/// Decode bytes produced by [`encode`] using the process-wide type registry.
pub fn decode<T: DeserializeOwned + 'static>(key: &str, bytes: &[u8]) -> DriverResult<T> {
    decode_with(registry::global(), key, bytes)
}

pub fn encode_with<T: Serialize + 'static>(
    types: &TypeRegistry,
    key: &str,
    payload: Payload<'_, T>,
) -> DriverResult<Vec<u8>> {
    match payload {
        Payload::Value(value) => {
            serde_json::to_vec(value).map_err(|e| DriverError::encode(key, e))
        }
        Payload::Tagged(value) => {
            let name = types.name_of::<T>().ok_or_else(|| {
                DriverError::encode(
                    key,
                    format!("type not registered: {}", std::any::type_name::<T>()),
                )
            })?;
            let body = serde_json::to_vec(value).map_err(|e| DriverError::encode(key, e))?;

            let mut frame = Vec::with_capacity(name.len() + body.len() + 2);
            frame.push(TAG_MARKER);
            frame.extend_from_slice(name.as_bytes());
            frame.push(TAG_END);
            frame.extend_from_slice(&body);
            Ok(frame)
        }
    }
}

pub fn decode_with<T: DeserializeOwned + 'static>(
    types: &TypeRegistry,
    key: &str,
    bytes: &[u8],
) -> DriverResult<T> {
    let body = match bytes.first() {
        Some(&TAG_MARKER) => {
            let end = bytes
                .iter()
                .position(|b| *b == TAG_END)
                .ok_or_else(|| DriverError::decode(key, "unterminated type tag"))?;
            let name = std::str::from_utf8(&bytes[1..end])
                .map_err(|e| DriverError::decode(key, e))?;

            match types.resolves_to::<T>(name) {
                Some(true) => {}
                Some(false) => {
                    return Err(DriverError::decode(
                        key,
                        format!(
                            "stored type {} does not match {}",
                            name,
                            std::any::type_name::<T>()
                        ),
                    ))
                }
                None => {
                    return Err(DriverError::decode(
                        key,
                        format!("type not registered: {}", name),
                    ))
                }
            }
            &bytes[end + 1..]
        }
        _ => bytes,
    };

    serde_json::from_slice(body).map_err(|e| DriverError::decode(key, e))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    struct Invoice {
        number: u32,
        total_cents: i64,
    }

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    struct Receipt {
        number: u32,
        total_cents: i64,
    }

    fn invoice() -> Invoice {
        Invoice {
            number: 7,
            total_cents: 1250,
        }
    }

    #[test]
    fn test_value_form_is_plain_json() {
        let types = TypeRegistry::new();
        let bytes = encode_with(&types, "k", Payload::Value(&invoice())).unwrap();
        assert_eq!(bytes, br#"{"number":7,"total_cents":1250}"#.to_vec());

        let back: Invoice = decode_with(&types, "k", &bytes).unwrap();
        assert_eq!(back, invoice());
    }

    #[test]
    fn test_tagged_form_requires_registration() {
        let types = TypeRegistry::new();
        let err = encode_with(&types, "k", Payload::Tagged(&invoice())).unwrap_err();
        assert!(matches!(err, DriverError::Encode { .. }));
    }

    #[test]
    fn test_tagged_form_carries_type_name() {
        let types = TypeRegistry::new();
        types.register_name::<Invoice>("Invoice").unwrap();

        let bytes = encode_with(&types, "k", Payload::Tagged(&invoice())).unwrap();
        assert!(bytes.starts_with(b"#Invoice\n{"));

        let back: Invoice = decode_with(&types, "k", &bytes).unwrap();
        assert_eq!(back, invoice());
    }

    #[test]
    fn test_tagged_form_rejects_other_type() {
        let types = TypeRegistry::new();
        types.register_name::<Invoice>("Invoice").unwrap();
        types.register_name::<Receipt>("Receipt").unwrap();

        let bytes = encode_with(&types, "k", Payload::Tagged(&invoice())).unwrap();
        let err = decode_with::<Receipt>(&types, "k", &bytes).unwrap_err();
        assert!(err.is_decode());
    }

    #[test]
    fn test_unknown_tag_is_decode_error() {
        let types = TypeRegistry::new();
        let err = decode_with::<Invoice>(&types, "k", b"#Ghost\n{}").unwrap_err();
        assert!(err.to_string().contains("Ghost"));
    }

    #[test]
    fn test_corrupt_bytes_are_decode_error() {
        let types = TypeRegistry::new();
        assert!(decode_with::<Invoice>(&types, "k", b"{\"number\":").unwrap_err().is_decode());
        assert!(decode_with::<Invoice>(&types, "k", b"#Invoice").unwrap_err().is_decode());
    }
}
