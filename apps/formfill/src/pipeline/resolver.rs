//! Names for missing placeholders that have no header.

use tracing::{debug, warn};

use crate::inference::prompts::FIELD_NAMES_PROMPT_TEMPLATE;
use crate::inference::{parse, InferenceClient};
use crate::llm_client::prompts::JSON_ONLY_INSTRUCTION;
use crate::models::Placeholder;

pub struct MissingFieldResolver<'c, 'a> {
    client: &'c InferenceClient<'a>,
}

impl<'c, 'a> MissingFieldResolver<'c, 'a> {
    pub fn new(client: &'c InferenceClient<'a>) -> Self {
        Self { client }
    }

    /// Returns exactly one name per placeholder, in input order.
    ///
    /// Names the service does not supply (transport failure, unreadable or
    /// short answer, blank entries) fall back to the placeholder's tag.
    pub async fn resolve(
        &self,
        unlabeled: &[Placeholder],
        markdown: &str,
        profile_text: &str,
    ) -> Vec<String> {
        if unlabeled.is_empty() {
            return Vec::new();
        }

        let positions = unlabeled
            .iter()
            .map(|p| format!("- {}: {}", p.tag, p.location.describe()))
            .collect::<Vec<_>>()
            .join("\n");
        let prompt = FIELD_NAMES_PROMPT_TEMPLATE
            .replace("{json_only}", JSON_ONLY_INSTRUCTION)
            .replace("{positions}", &positions)
            .replace("{markdown}", markdown)
            .replace("{profile}", profile_text);

        let names = match self
            .client
            .complete("field_names", &prompt, &self.client.settings().analysis)
            .await
        {
            Some(content) => parse::parse_string_array(&content).unwrap_or_else(|| {
                warn!("Could not read field names, using placeholder tags");
                Vec::new()
            }),
            None => Vec::new(),
        };

        if names.len() != unlabeled.len() {
            debug!(
                requested = unlabeled.len(),
                returned = names.len(),
                "Aligning field names to placeholders"
            );
        }
        align_names(names, unlabeled)
    }
}

/// Pads with tags or truncates so there is one name per placeholder.
fn align_names(names: Vec<String>, placeholders: &[Placeholder]) -> Vec<String> {
    placeholders
        .iter()
        .enumerate()
        .map(|(i, p)| {
            names
                .get(i)
                .map(|n| n.trim())
                .filter(|n| !n.is_empty())
                .map(str::to_string)
                .unwrap_or_else(|| p.tag.to_string())
        })
        .collect()
}
