//! Encoding of component instances for hotload and scene persistence.
//!
//! Every encoding is a keyed record (field name → value), so a record written
//! by an older version of a component still decodes: missing fields fall back
//! to `#[serde(default)]` and unknown fields are skipped.

use std::str::FromStr;

use serde::Serialize;
use serde::de::DeserializeOwned;

/// Errors produced while encoding or decoding a component record.
#[derive(Debug, thiserror::Error)]
pub enum CodecError {
    /// Failed to encode to MessagePack.
    #[error("failed to encode component: {0}")]
    Encode(#[from] rmp_serde::encode::Error),

    /// Failed to decode from MessagePack.
    #[error("failed to decode component: {0}")]
    Decode(#[from] rmp_serde::decode::Error),

    /// JSON encode or decode failure.
    #[error("JSON component codec error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Wire format used for encoded components.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum HotloadCodec {
    /// MessagePack with named fields.
    #[default]
    MessagePack,
    /// UTF-8 JSON objects.
    Json,
}

impl HotloadCodec {
    /// Encode a component as a keyed record.
    ///
    /// # Errors
    ///
    /// Returns [`CodecError`] if serialisation fails.
    pub fn encode<T: Serialize>(self, value: &T) -> Result<Vec<u8>, CodecError> {
        match self {
            Self::MessagePack => Ok(rmp_serde::to_vec_named(value)?),
            Self::Json => Ok(serde_json::to_vec(value)?),
        }
    }

    /// Decode a keyed record.
    ///
    /// # Errors
    ///
    /// Returns [`CodecError`] if the bytes are not a valid record for `T`.
    pub fn decode<T: DeserializeOwned>(self, bytes: &[u8]) -> Result<T, CodecError> {
        match self {
            Self::MessagePack => Ok(rmp_serde::from_slice(bytes)?),
            Self::Json => Ok(serde_json::from_slice(bytes)?),
        }
    }
}

impl FromStr for HotloadCodec {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "msgpack" | "messagepack" => Ok(Self::MessagePack),
            "json" => Ok(Self::Json),
            other => Err(format!("unknown hotload codec '{other}'")),
        }
    }
}

#[cfg(test)]
mod tests {
    use serde::Deserialize;

    use super::*;

    #[derive(Debug, PartialEq, Serialize, Deserialize)]
    struct AmmoV1 {
        count: u32,
        kind: String,
    }

    #[derive(Debug, PartialEq, Default, Serialize, Deserialize)]
    #[serde(default)]
    struct AmmoV2 {
        count: u32,
        reserve: u32,
    }

    #[test]
    fn test_records_survive_field_changes() {
        for codec in [HotloadCodec::MessagePack, HotloadCodec::Json] {
            let old = AmmoV1 {
                count: 30,
                kind: "laser".into(),
            };
            let bytes = codec.encode(&old).unwrap();
            let new: AmmoV2 = codec.decode(&bytes).unwrap();
            assert_eq!(new, AmmoV2 {
                count: 30,
                reserve: 0
            });
        }
    }

    #[test]
    fn test_decode_invalid_bytes() {
        let result: Result<AmmoV2, _> = HotloadCodec::MessagePack.decode(&[0xc1]);
        assert!(result.is_err());
        let result: Result<AmmoV2, _> = HotloadCodec::Json.decode(b"{");
        assert!(matches!(result, Err(CodecError::Json(_))));
    }

    #[test]
    fn test_parse_codec_name() {
        assert_eq!("json".parse::<HotloadCodec>(), Ok(HotloadCodec::Json));
        assert_eq!("MsgPack".parse::<HotloadCodec>(), Ok(HotloadCodec::MessagePack));
        assert!("xml".parse::<HotloadCodec>().is_err());
    }
}
