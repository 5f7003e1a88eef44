//! Deterministic marshal codec for wire and persisted objects.
//!
//! Objects are emitted with fields sorted by name (serde_json's object maps
//! are BTreeMap-backed), so signatures over marshaled bytes are reproducible
//! and re-marshal of an unmodified record is byte-identical. Binary fields
//! serialize as base64 strings via [`keyfold_crypto::b64`].

use crate::error::{Error, Result};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

/// Marshals a value deterministically.
///
/// Serializing through `serde_json::Value` rather than straight to bytes is
/// what sorts struct fields: the intermediate object map is ordered by key.
pub fn to_bytes<T: Serialize>(value: &T) -> Result<Vec<u8>> {
    let intermediate = serde_json::to_value(value)
        .map_err(|e| Error::ServerError(format!("marshal failed: {e}")))?;
    serde_json::to_vec(&intermediate).map_err(|e| Error::ServerError(format!("marshal failed: {e}")))
}

/// Unmarshals a value previously produced by [`to_bytes`].
pub fn from_bytes<T: DeserializeOwned>(bytes: &[u8]) -> Result<T> {
    serde_json::from_slice(bytes).map_err(|e| Error::InvalidRequest(format!("unmarshal failed: {e}")))
}

/// An entity that persists as a self-describing record.
pub trait Storable: Serialize + DeserializeOwned {
    /// Record kind tag, e.g. `"account"`.
    const KIND: &'static str;
    /// Schema version byte, bumped on incompatible field changes.
    const VERSION: u8 = 1;

    fn id(&self) -> &str;
}

/// Self-describing persisted record: id, kind, schema version, field map.
#[derive(Debug, Serialize, Deserialize)]
struct Record {
    id: String,
    kind: String,
    version: u8,
    fields: serde_json::Value,
}

/// Marshals a storable entity to its persisted record form.
pub fn to_record<T: Storable>(value: &T) -> Result<Vec<u8>> {
    let fields = serde_json::to_value(value)
        .map_err(|e| Error::ServerError(format!("marshal failed: {e}")))?;
    to_bytes(&Record {
        id: value.id().to_string(),
        kind: T::KIND.to_string(),
        version: T::VERSION,
        fields,
    })
}

/// Unmarshals a persisted record, checking kind and schema version.
pub fn from_record<T: Storable>(bytes: &[u8]) -> Result<T> {
    let record: Record = from_bytes(bytes)?;
    if record.kind != T::KIND {
        return Err(Error::InvalidRequest(format!(
            "record kind mismatch: expected {}, got {}",
            T::KIND,
            record.kind
        )));
    }
    if record.version != T::VERSION {
        return Err(Error::InvalidRequest(format!(
            "unsupported {} schema version {}",
            record.kind, record.version
        )));
    }
    serde_json::from_value(record.fields)
        .map_err(|e| Error::InvalidRequest(format!("unmarshal failed: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
    struct Sample {
        id: String,
        zulu: u32,
        alpha: String,
    }

    impl Storable for Sample {
        const KIND: &'static str = "sample";
        fn id(&self) -> &str {
            &self.id
        }
    }

    fn sample() -> Sample {
        Sample {
            id: "s1".into(),
            zulu: 7,
            alpha: "first".into(),
        }
    }

    #[test]
    fn fields_emit_sorted_by_name() {
        let bytes = to_bytes(&sample()).unwrap();
        let text = String::from_utf8(bytes).unwrap();
        let alpha = text.find("\"alpha\"").unwrap();
        let zulu = text.find("\"zulu\"").unwrap();
        assert!(alpha < zulu, "fields must be sorted: {text}");
    }

    #[test]
    fn remarshal_is_byte_identical() {
        let first = to_record(&sample()).unwrap();
        let decoded: Sample = from_record(&first).unwrap();
        let second = to_record(&decoded).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn kind_mismatch_rejected() {
        #[derive(Debug, Serialize, Deserialize)]
        struct Other {
            id: String,
        }
        impl Storable for Other {
            const KIND: &'static str = "other";
            fn id(&self) -> &str {
                &self.id
            }
        }

        let bytes = to_record(&sample()).unwrap();
        assert!(from_record::<Other>(&bytes).is_err());
    }

    mod proptests {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            #[test]
            fn marshal_is_deterministic_and_reversible(
                id in "[a-z0-9]{1,32}",
                zulu in any::<u32>(),
                alpha in "[ -~]{0,64}",
            ) {
                let value = Sample { id, zulu, alpha };
                let first = to_bytes(&value).unwrap();
                let second = to_bytes(&value).unwrap();
                prop_assert_eq!(&first, &second);

                let decoded: Sample = from_bytes(&first).unwrap();
                prop_assert_eq!(decoded, value);
            }
        }
    }
}
