use serde::{Deserialize, Serialize};

use adhoc_utils::CodecConfig;

/// Settings of a [`Channel`](crate::Channel).
///
/// Deserializes from partial documents, missing fields taking the values of
/// [`ChannelConfig::standard`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ChannelConfig {
    /// Shared by both directions.
    #[serde(default)]
    pub codec: CodecConfig,
    /// Maximum number of packets waiting to be sent, the one in flight excluded.
    #[serde(default = "default_queue_limit")]
    pub queue_limit: usize,
}

const fn default_queue_limit() -> usize {
    64
}

impl ChannelConfig {
    /// Rejects overflowing collections and queues up to 64 packets.
    #[inline(always)]
    pub const fn standard() -> Self {
        Self {
            codec: CodecConfig::strict(),
            queue_limit: default_queue_limit(),
        }
    }

    #[inline(always)]
    pub const fn with_codec(mut self, codec: CodecConfig) -> Self {
        self.codec = codec;
        self
    }

    #[inline(always)]
    pub const fn with_queue_limit(mut self, queue_limit: usize) -> Self {
        self.queue_limit = queue_limit;
        self
    }
}

impl Default for ChannelConfig {
    #[inline(always)]
    fn default() -> Self {
        Self::standard()
    }
}
