//! Gate between inferred values and the document.
//!
//! A value survives only if the profile states it: exactly, or as a
//! substring relation with an explicit value longer than one character.

use tracing::warn;

use crate::models::{FillMap, FillResult, FillSource, Placeholder, Tag};
use crate::profile::{strip_whitespace, ExplicitValues};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    /// Nothing to judge.
    Empty,
    /// Equal to an explicit value.
    Exact,
    /// Contains, or is contained in, an explicit value.
    Contained,
    Rejected,
}

impl Verdict {
    pub fn is_accepted(self) -> bool {
        matches!(self, Verdict::Exact | Verdict::Contained)
    }

    fn source(self) -> FillSource {
        match self {
            Verdict::Empty => FillSource::Unfilled,
            Verdict::Exact => FillSource::ExplicitMatch,
            Verdict::Contained => FillSource::AiInferredAccepted,
            Verdict::Rejected => FillSource::AiInferredRejected,
        }
    }
}

/// Result of filtering one fill map against the placeholders of a scan.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FilterOutcome {
    /// Non-empty accepted values only.
    pub accepted: FillMap,
    /// One record per placeholder, in tag order.
    pub results: Vec<FillResult>,
}

impl FilterOutcome {
    /// Tags whose final value is empty, in tag order.
    pub fn missing(&self) -> impl Iterator<Item = Tag> + '_ {
        self.results.iter().filter(|r| !r.is_filled()).map(|r| r.tag)
    }

    pub fn rejected(&self) -> impl Iterator<Item = Tag> + '_ {
        self.results
            .iter()
            .filter(|r| r.source == FillSource::AiInferredRejected)
            .map(|r| r.tag)
    }
}

pub struct ConfidenceFilter<'a> {
    explicit: &'a ExplicitValues,
}

impl<'a> ConfidenceFilter<'a> {
    pub fn new(explicit: &'a ExplicitValues) -> Self {
        Self { explicit }
    }

    pub fn judge(&self, candidate: &str) -> Verdict {
        let candidate = strip_whitespace(candidate);
        if candidate.is_empty() {
            return Verdict::Empty;
        }
        if self.explicit.contains(&candidate) {
            return Verdict::Exact;
        }
        if candidate.chars().count() <= 1 {
            return Verdict::Rejected;
        }
        let overlaps = self.explicit.iter().any(|explicit| {
            explicit.chars().count() > 1
                && (explicit.contains(candidate.as_str()) || candidate.contains(explicit))
        });
        if overlaps {
            Verdict::Contained
        } else {
            Verdict::Rejected
        }
    }

    /// Filters `raw` for every placeholder. Placeholders absent from `raw`
    /// are unfilled; entries for unknown tags are ignored.
    pub fn apply(&self, raw: &FillMap, placeholders: &[Placeholder]) -> FilterOutcome {
        let mut outcome = FilterOutcome::default();
        for placeholder in placeholders {
            let candidate = raw.get(placeholder.tag).unwrap_or_default();
            let verdict = self.judge(candidate);
            let value = if verdict.is_accepted() {
                outcome.accepted.insert(placeholder.tag, candidate);
                candidate.to_string()
            } else {
                if verdict == Verdict::Rejected {
                    warn!(tag = %placeholder.tag, value = %candidate, "Low-confidence value cleared");
                }
                String::new()
            };
            outcome.results.push(FillResult {
                tag: placeholder.tag,
                value,
                source: verdict.source(),
            });
        }
        outcome
    }

    /// Takes a precomputed map as already filtered. Values are only
    /// classified, never cleared.
    pub fn trust(&self, precomputed: &FillMap, placeholders: &[Placeholder]) -> FilterOutcome {
        let mut outcome = FilterOutcome::default();
        for placeholder in placeholders {
            let value = precomputed.get(placeholder.tag).unwrap_or_default();
            let source = match self.judge(value) {
                Verdict::Empty => FillSource::Unfilled,
                Verdict::Exact => FillSource::ExplicitMatch,
                Verdict::Contained | Verdict::Rejected => FillSource::AiInferredAccepted,
            };
            if !value.is_empty() {
                outcome.accepted.insert(placeholder.tag, value);
            }
            outcome.results.push(FillResult {
                tag: placeholder.tag,
                value: value.to_string(),
                source,
            });
        }
        outcome
    }
}
