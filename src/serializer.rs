//! Payload serializers.

use serde::Serialize;

use crate::error::SerializationError;

/// Turns a message into the bytes of a frame body.
pub trait Serializer: Send + Sync {
    /// MIME type set as the frame's content type.
    fn content_type(&self) -> &'static str;

    fn serialize_object_to_bytes<T: Serialize + ?Sized>(
        &self,
        value: &T,
    ) -> Result<Vec<u8>, SerializationError>;
}

/// JSON payloads, readable by consumers on any stack.
#[derive(Debug, Default, Clone, Copy)]
pub struct JsonSerializer;

impl Serializer for JsonSerializer {
    fn content_type(&self) -> &'static str {
        "application/json"
    }

    fn serialize_object_to_bytes<T: Serialize + ?Sized>(
        &self,
        value: &T,
    ) -> Result<Vec<u8>, SerializationError> {
        serde_json::to_vec(value).map_err(|e| SerializationError::Encode {
            format: "json",
            message: e.to_string(),
        })
    }
}

/// Compact binary payloads for consumers that also decode with bitcode.
#[derive(Debug, Default, Clone, Copy)]
pub struct BitcodeSerializer;

impl Serializer for BitcodeSerializer {
    fn content_type(&self) -> &'static str {
        "application/x-bitcode"
    }

    fn serialize_object_to_bytes<T: Serialize + ?Sized>(
        &self,
        value: &T,
    ) -> Result<Vec<u8>, SerializationError> {
        bitcode::serialize(value).map_err(|e| SerializationError::Encode {
            format: "bitcode",
            message: e.to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[derive(Debug, PartialEq, Serialize, Deserialize)]
    struct ProductCreated {
        id: u32,
        name: String,
    }

    struct Unserializable;

    impl Serialize for Unserializable {
        fn serialize<S: serde::Serializer>(&self, _serializer: S) -> Result<S::Ok, S::Error> {
            Err(serde::ser::Error::custom("refusing to serialize"))
        }
    }

    #[test]
    fn json_payload() {
        let bytes = JsonSerializer
            .serialize_object_to_bytes(&ProductCreated {
                id: 1,
                name: "Producto 1".into(),
            })
            .unwrap();
        assert_eq!(bytes, br#"{"id":1,"name":"Producto 1"}"#);
        assert_eq!(JsonSerializer.content_type(), "application/json");
    }

    #[test]
    fn bitcode_payload_decodes() {
        let event = ProductCreated {
            id: 2,
            name: "Segundo producto".into(),
        };
        let bytes = BitcodeSerializer.serialize_object_to_bytes(&event).unwrap();
        let decoded: ProductCreated = bitcode::deserialize(&bytes).unwrap();
        assert_eq!(decoded, event);
    }

    #[test]
    fn failures_map_to_encode_error() {
        let err = JsonSerializer
            .serialize_object_to_bytes(&Unserializable)
            .unwrap_err();
        assert!(matches!(err, SerializationError::Encode { format: "json", .. }));
        assert!(err.to_string().contains("refusing to serialize"));
    }
}
