//! Guardrail integration for the agent gateway.
//!
//! Every agent invocation carries the configured guardrail parameters. Output
//! that came from a tool or plugin is additionally re-screened through
//! [`SafetyFilter::apply_to_output`], which yields a [`SafetyVerdict`].

#![warn(missing_docs, clippy::pedantic)]

pub mod contracts;
pub mod decision;
mod error;
pub mod filter;

pub use contracts::{
    ApplyGuardrailRequest, ApplyGuardrailResponse, DRAFT_VERSION, GuardrailConfig,
    GuardrailContentBlock, GuardrailOutput, GuardrailParameters, GuardrailTextBlock,
};
pub use decision::{GuardrailAction, SafetyVerdict, VerdictMetadata};
pub use error::{GuardrailError, GuardrailResult};
pub use filter::{GuardrailClient, SafetyFilter};
