//! Inference stages: prompt building, the external call and tolerant
//! reading of its answer.
//!
//! Every method degrades instead of failing. A transport error or an
//! unreadable answer becomes "no information" and is logged.

pub mod literal;
pub mod parse;
pub mod prompts;

use serde_json::Value;
use tracing::{debug, warn};

use self::prompts::{AUDIT_PROMPT_TEMPLATE, FILL_PROMPT_TEMPLATE, MISSING_FIELDS_PROMPT_TEMPLATE};
use crate::config::{InferenceSettings, SamplingParams};
use crate::llm_client::prompts::{JSON_ONLY_INSTRUCTION, NO_FABRICATION_INSTRUCTION, NO_HEADER};
use crate::llm_client::{CompletionProvider, LlmError};
use crate::models::fill::value_text;
use crate::models::{FillMap, Placeholder, PlaceholderKind, Tag};
use crate::profile::FieldTables;

/// One audit line as the service reported it, key already resolved.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuditCandidate {
    pub tag: Tag,
    pub label: String,
    pub value: String,
    /// The service's own verdict; advisory only.
    pub claimed_match: bool,
}

pub struct InferenceClient<'a> {
    provider: &'a dyn CompletionProvider,
    tables: &'a FieldTables,
    settings: &'a InferenceSettings,
}

impl<'a> InferenceClient<'a> {
    pub fn new(
        provider: &'a dyn CompletionProvider,
        tables: &'a FieldTables,
        settings: &'a InferenceSettings,
    ) -> Self {
        Self {
            provider,
            tables,
            settings,
        }
    }

    pub fn settings(&self) -> &'a InferenceSettings {
        self.settings
    }

    /// Sends `prompt`, returning `None` on any transport failure.
    pub async fn complete(
        &self,
        stage: &'static str,
        prompt: &str,
        params: &SamplingParams,
    ) -> Option<String> {
        debug!(stage, prompt_chars = prompt.chars().count(), "Calling LLM");
        match self.provider.complete(prompt, params).await {
            Ok(content) => {
                debug!(stage, response_chars = content.chars().count(), "LLM answered");
                Some(content)
            }
            Err(err) => {
                log_degraded(stage, &err);
                None
            }
        }
    }

    /// Asks for a value for every placeholder. Keys that are not tags are
    /// dropped and hedged values are cleared.
    pub async fn infer_fill_map(
        &self,
        profile_text: &str,
        markdown: &str,
        placeholders: &[Placeholder],
    ) -> FillMap {
        let prompt = FILL_PROMPT_TEMPLATE
            .replace("{no_fabrication}", NO_FABRICATION_INSTRUCTION)
            .replace("{json_only}", JSON_ONLY_INSTRUCTION)
            .replace("{placeholders}", &placeholder_lines(placeholders, false))
            .replace("{markdown}", markdown)
            .replace("{profile}", profile_text);

        let Some(content) = self.complete("fill", &prompt, &self.settings.fill).await else {
            return FillMap::new();
        };
        let Some(object) = parse::parse_object(&content) else {
            warn!(
                preview = %preview(&content),
                "Could not read a JSON object from fill response, treating as empty"
            );
            return FillMap::new();
        };

        let raw = FillMap::from_json_object(&object);
        let mut hedged = Vec::new();
        let map: FillMap = raw
            .iter()
            .map(|(tag, value)| {
                if !value.is_empty() && self.tables.is_hedged(value) {
                    hedged.push(tag);
                    (tag, String::new())
                } else {
                    (tag, value.to_string())
                }
            })
            .collect();
        if !hedged.is_empty() {
            debug!(?hedged, "Cleared hedged values");
        }
        map
    }

    /// Asks which fields the profile does not state. Transport failure or
    /// an unreadable answer yields an empty list.
    pub async fn find_missing_fields(
        &self,
        profile_text: &str,
        placeholders: &[Placeholder],
    ) -> Vec<String> {
        let prompt = MISSING_FIELDS_PROMPT_TEMPLATE
            .replace("{json_only}", JSON_ONLY_INSTRUCTION)
            .replace("{placeholders}", &placeholder_lines(placeholders, false))
            .replace("{profile}", profile_text);

        let Some(content) = self
            .complete("missing_fields", &prompt, &self.settings.analysis)
            .await
        else {
            return Vec::new();
        };
        match parse::parse_string_array(&content) {
            Some(names) => names
                .into_iter()
                .map(|n| n.trim().to_string())
                .filter(|n| !n.is_empty())
                .collect(),
            None => {
                warn!(preview = %preview(&content), "Could not read missing-field list");
                Vec::new()
            }
        }
    }

    /// Asks for a per-placeholder match report. Items with unknown keys are
    /// dropped; the first item per tag wins.
    pub async fn audit_candidates(
        &self,
        profile_text: &str,
        markdown: &str,
        placeholders: &[Placeholder],
    ) -> Vec<AuditCandidate> {
        let prompt = AUDIT_PROMPT_TEMPLATE
            .replace("{json_only}", JSON_ONLY_INSTRUCTION)
            .replace("{placeholders}", &placeholder_lines(placeholders, true))
            .replace("{markdown}", markdown)
            .replace("{profile}", profile_text);

        let Some(content) = self.complete("audit", &prompt, &self.settings.audit).await else {
            return Vec::new();
        };
        let Some(object) = parse::parse_object(&content) else {
            warn!(preview = %preview(&content), "Could not read audit response");
            return Vec::new();
        };

        let items = match object.get("items") {
            Some(Value::Array(items)) => items.as_slice(),
            _ => &[][..],
        };
        let mut candidates: Vec<AuditCandidate> = Vec::with_capacity(items.len());
        for item in items {
            let Some(candidate) = self.audit_candidate(item) else {
                continue;
            };
            let known = placeholders.iter().any(|p| p.tag == candidate.tag);
            let duplicate = candidates.iter().any(|c| c.tag == candidate.tag);
            if known && !duplicate {
                candidates.push(candidate);
            }
        }
        candidates
    }

    fn audit_candidate(&self, item: &Value) -> Option<AuditCandidate> {
        let object = item.as_object()?;
        let tag = match object.get("key")? {
            Value::String(key) => Tag::from_key(key)?,
            Value::Number(n) => Tag::from_key(&n.to_string())?,
            _ => return None,
        };
        let label = object.get("label").map(value_text).unwrap_or_default();
        let value = self.clean_value(object.get("value").map(value_text).unwrap_or_default());
        let claimed_match = match object.get("isMatched") {
            Some(Value::Bool(b)) => *b,
            Some(Value::String(s)) => s.eq_ignore_ascii_case("true"),
            _ => false,
        };
        Some(AuditCandidate {
            tag,
            label,
            value,
            claimed_match,
        })
    }

    /// Empties a value that carries a hedging phrase.
    pub fn clean_value(&self, value: String) -> String {
        if self.tables.is_hedged(&value) {
            String::new()
        } else {
            value
        }
    }
}

/// One prompt line per placeholder: tag, header and, optionally, position.
pub fn placeholder_lines(placeholders: &[Placeholder], with_position: bool) -> String {
    placeholders
        .iter()
        .map(|p| {
            let header = if p.header.is_empty() {
                NO_HEADER
            } else {
                p.header.as_str()
            };
            let mut line = format!("- {}: 表头=\"{}\"", p.tag, header);
            if with_position {
                line.push_str(&format!(" ({})", p.location.describe()));
            }
            if p.kind == PlaceholderKind::Photo {
                line.push_str(" [照片区域]");
            }
            line
        })
        .collect::<Vec<_>>()
        .join("\n")
}

pub(crate) fn log_degraded(stage: &str, err: &LlmError) {
    warn!(stage, error = %err, "LLM call failed, continuing without its result");
}

/// First characters of a response, for logs.
fn preview(content: &str) -> String {
    content.chars().take(200).collect()
}
