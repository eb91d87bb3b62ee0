//! Registry configuration.

use tracing::warn;

use crate::codec::HotloadCodec;

/// Default number of component pools.
pub const DEFAULT_POOL_COUNT: usize = 32;

/// Environment variable overriding [`RegistryConfig::pool_count`].
pub const POOL_COUNT_ENV: &str = "WORLDS_POOL_COUNT";

/// Environment variable overriding [`RegistryConfig::codec`] (`msgpack` or `json`).
pub const HOTLOAD_CODEC_ENV: &str = "WORLDS_HOTLOAD_CODEC";

/// Configuration for a [`Registry`](crate::Registry).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegistryConfig {
    /// Maximum number of distinct locally stored component types.
    pub pool_count: usize,
    /// Encoding used for hotload and scene persistence.
    pub codec: HotloadCodec,
}

impl RegistryConfig {
    /// Create a config with the default pool count and codec.
    #[must_use]
    pub fn new() -> Self {
        Self {
            pool_count: DEFAULT_POOL_COUNT,
            codec: HotloadCodec::default(),
        }
    }

    /// Build a config from [`POOL_COUNT_ENV`] and [`HOTLOAD_CODEC_ENV`],
    /// falling back to defaults for unset or unparsable values.
    #[must_use]
    pub fn from_env() -> Self {
        let mut config = Self::new();

        if let Ok(raw) = std::env::var(POOL_COUNT_ENV) {
            match raw.parse::<usize>() {
                Ok(count) if count > 0 => config.pool_count = count,
                _ => warn!(value = raw, "ignoring invalid {POOL_COUNT_ENV}"),
            }
        }

        if let Ok(raw) = std::env::var(HOTLOAD_CODEC_ENV) {
            match raw.parse::<HotloadCodec>() {
                Ok(codec) => config.codec = codec,
                Err(err) => warn!(error = err, "ignoring invalid {HOTLOAD_CODEC_ENV}"),
            }
        }

        config
    }

    /// Override the pool count.
    #[must_use]
    pub fn with_pool_count(mut self, pool_count: usize) -> Self {
        self.pool_count = pool_count;
        self
    }

    /// Override the persistence codec.
    #[must_use]
    pub fn with_codec(mut self, codec: HotloadCodec) -> Self {
        self.codec = codec;
        self
    }
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = RegistryConfig::default();
        assert_eq!(config.pool_count, 32);
        assert_eq!(config.codec, HotloadCodec::MessagePack);
    }

    #[test]
    fn test_builder_overrides() {
        let config = RegistryConfig::new()
            .with_pool_count(4)
            .with_codec(HotloadCodec::Json);
        assert_eq!(config.pool_count, 4);
        assert_eq!(config.codec, HotloadCodec::Json);
    }
}
