//! Payload compression stages.
//!
//! Both compressors consume the incoming string or byte payload and emit
//! base64 text, ready for transports that cannot carry raw binary.

use super::TransformStage;
use crate::context::ExecutionContext;
use crate::core::{StageOutcome, StageValue, CONTENT_TYPE_TEXT};
use crate::errors::EdgeflowError;
use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use flate2::write::{GzEncoder, ZlibEncoder};
use flate2::Compression;
use std::io::Write;

/// Compresses the incoming payload with gzip.
#[derive(Debug, Clone, Copy, Default)]
pub struct GzipCompressor;

impl GzipCompressor {
    /// Creates the compressor.
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl TransformStage for GzipCompressor {
    fn name(&self) -> &str {
        "gzip-compressor"
    }

    async fn execute(&self, ctx: &ExecutionContext, input: Option<StageValue>) -> StageOutcome {
        compress(ctx, input, |bytes| {
            let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
            encoder.write_all(bytes)?;
            encoder.finish()
        })
    }
}

/// Compresses the incoming payload with zlib.
#[derive(Debug, Clone, Copy, Default)]
pub struct ZlibCompressor;

impl ZlibCompressor {
    /// Creates the compressor.
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl TransformStage for ZlibCompressor {
    fn name(&self) -> &str {
        "zlib-compressor"
    }

    async fn execute(&self, ctx: &ExecutionContext, input: Option<StageValue>) -> StageOutcome {
        compress(ctx, input, |bytes| {
            let mut encoder = ZlibEncoder::new(Vec::new(), Compression::default());
            encoder.write_all(bytes)?;
            encoder.finish()
        })
    }
}

fn compress(
    ctx: &ExecutionContext,
    input: Option<StageValue>,
    encode: impl Fn(&[u8]) -> std::io::Result<Vec<u8>>,
) -> StageOutcome {
    let Some(value) = input else {
        return StageOutcome::fail_with(&EdgeflowError::NoData);
    };
    let bytes = match value {
        StageValue::Text(text) => text.into_bytes(),
        StageValue::Bytes(bytes) => bytes,
        other => {
            return StageOutcome::fail_with(&EdgeflowError::UnexpectedType(
                other.kind().to_string(),
            ))
        }
    };

    match encode(&bytes) {
        Ok(compressed) => {
            ctx.set_response_content_type(CONTENT_TYPE_TEXT);
            StageOutcome::ok(STANDARD.encode(compressed))
        }
        Err(err) => StageOutcome::fail(err.to_string()),
    }
}
