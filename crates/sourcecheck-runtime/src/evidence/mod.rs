//! Integrity checks for evidence cited by validator agents.
//!
//! Agents produce votes and the spans those votes rest on. The runtime
//! checks every cited span against the source document before accepting
//! the vote; an invalid span triggers the fallback.

mod validator;

pub use validator::{SpanValidationError, SpanValidator};
