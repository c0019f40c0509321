//! Core domain types shared across the SDK.

mod envelope;
mod event;
mod outcome;

pub use envelope::{
    MessageEnvelope, CONTENT_TYPE_JSON, CONTENT_TYPE_TEXT, CONTENT_TYPE_XML, CORRELATION_HEADER,
};
pub use event::{Event, Reading};
pub use outcome::{StageOutcome, StageStatus, StageValue};
