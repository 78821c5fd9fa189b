//! Fills the tables of a `.docx` form from a free-text profile.
//!
//! [`FormFiller`] exposes the three operations: [`FormFiller::scan_missing_fields`],
//! [`FormFiller::audit_template`] and [`FormFiller::fill_form`].

pub mod config;
pub mod docx;
pub mod errors;
pub mod inference;
pub mod llm_client;
pub mod models;
pub mod pipeline;
pub mod profile;
pub mod template;

pub use config::{Config, InferenceSettings, SamplingParams};
pub use errors::FillError;
pub use llm_client::{CompletionProvider, LlmClient, LlmError};
pub use models::{FillMap, FillResult, FillSource, Placeholder, Tag};
pub use pipeline::{AuditItem, AuditReport, FillOutcome, FillRequest, FormFiller};
pub use profile::FieldTables;
