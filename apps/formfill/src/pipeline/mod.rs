//! The form-filling pipeline and its three public operations.
//!
//! Scan → normalize → infer → filter → resolve names → write back. Each
//! call is independent; the only shared state is the read-only tables and
//! settings and the completion provider.

pub mod confidence;
pub mod resolver;
pub mod writer;

use std::sync::Arc;

use serde::Serialize;
use tracing::{debug, info};

use self::confidence::{ConfidenceFilter, FilterOutcome};
use self::resolver::MissingFieldResolver;
use self::writer::DocumentWriter;
use crate::config::InferenceSettings;
use crate::docx::{DocxError, DocxPackage};
use crate::errors::FillError;
use crate::inference::InferenceClient;
use crate::llm_client::CompletionProvider;
use crate::models::{FillMap, FillResult, Placeholder, Tag};
use crate::profile::{FieldTables, ProfileNormalizer};
use crate::template::{TemplateScan, TemplateScanner};

// ────────────────────────────────────────────────────────────────────────────
// Request / response types
// ────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy)]
pub struct FillRequest<'a> {
    pub document: &'a [u8],
    pub profile_text: &'a str,
    pub photo: Option<&'a [u8]>,
    /// A map from an earlier run. Skips inference and is not re-filtered.
    pub precomputed: Option<&'a FillMap>,
}

impl<'a> FillRequest<'a> {
    pub fn new(document: &'a [u8], profile_text: &'a str) -> Self {
        Self {
            document,
            profile_text,
            photo: None,
            precomputed: None,
        }
    }

    pub fn with_photo(mut self, photo: &'a [u8]) -> Self {
        self.photo = Some(photo);
        self
    }

    pub fn with_precomputed(mut self, fill_map: &'a FillMap) -> Self {
        self.precomputed = Some(fill_map);
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FillOutcome {
    pub document: Vec<u8>,
    /// Accepted non-empty values.
    pub fill_map: FillMap,
    /// Header labels first, then resolved names for unlabeled slots.
    pub missing_fields: Vec<String>,
    pub results: Vec<FillResult>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AuditItem {
    pub tag: Tag,
    pub label: String,
    pub value: String,
    pub matched: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AuditReport {
    pub items: Vec<AuditItem>,
    pub matched_count: usize,
    pub missing_count: usize,
}

impl AuditReport {
    fn from_items(items: Vec<AuditItem>) -> Self {
        let matched_count = items.iter().filter(|i| i.matched).count();
        Self {
            missing_count: items.len() - matched_count,
            matched_count,
            items,
        }
    }
}

// ────────────────────────────────────────────────────────────────────────────
// FormFiller
// ────────────────────────────────────────────────────────────────────────────

/// Entry point for the three operations. Cheap to clone and share.
#[derive(Clone)]
pub struct FormFiller {
    provider: Arc<dyn CompletionProvider>,
    tables: Arc<FieldTables>,
    settings: Arc<InferenceSettings>,
}

impl FormFiller {
    pub fn new(provider: Arc<dyn CompletionProvider>) -> Self {
        Self {
            provider,
            tables: Arc::new(FieldTables::default()),
            settings: Arc::new(InferenceSettings::default()),
        }
    }

    pub fn with_tables(mut self, tables: Arc<FieldTables>) -> Self {
        self.tables = tables;
        self
    }

    pub fn with_settings(mut self, settings: InferenceSettings) -> Self {
        self.settings = Arc::new(settings);
        self
    }

    fn client(&self) -> InferenceClient<'_> {
        InferenceClient::new(self.provider.as_ref(), &self.tables, &self.settings)
    }

    fn load(&self, document: &[u8]) -> Result<(DocxPackage, TemplateScan), FillError> {
        let mut package = DocxPackage::from_bytes(document).map_err(FillError::InvalidDocument)?;
        let scan = TemplateScanner::new(&self.tables).scan(&mut package);
        Ok((package, scan))
    }

    /// Labels of fields the profile likely does not provide. The document
    /// is not modified.
    pub async fn scan_missing_fields(
        &self,
        document: &[u8],
        profile_text: &str,
    ) -> Result<Vec<String>, FillError> {
        let (_, scan) = self.load(document)?;
        if scan.is_empty() {
            debug!("Template has no placeholders, nothing can be missing");
            return Ok(Vec::new());
        }

        let profile = ProfileNormalizer::new(&self.tables).normalize(profile_text);
        let missing = self
            .client()
            .find_missing_fields(&profile.text, &scan.placeholders)
            .await;

        info!(
            placeholders = scan.placeholders.len(),
            missing = missing.len(),
            "Missing-field scan complete"
        );
        Ok(missing)
    }

    /// Per-placeholder match report. Every value the service claims is
    /// re-checked against the profile; its own match flag is not trusted.
    pub async fn audit_template(
        &self,
        document: &[u8],
        profile_text: &str,
    ) -> Result<AuditReport, FillError> {
        let (_, scan) = self.load(document)?;
        if scan.is_empty() {
            return Ok(AuditReport::default());
        }

        let profile = ProfileNormalizer::new(&self.tables).normalize(profile_text);
        let candidates = self
            .client()
            .audit_candidates(&profile.text, &scan.markdown, &scan.placeholders)
            .await;
        let filter = ConfidenceFilter::new(&profile.explicit_values);

        let items: Vec<AuditItem> = scan
            .placeholders
            .iter()
            .map(|placeholder| {
                let Some(candidate) = candidates.iter().find(|c| c.tag == placeholder.tag) else {
                    return AuditItem {
                        tag: placeholder.tag,
                        label: placeholder.label(),
                        value: String::new(),
                        matched: false,
                    };
                };
                let accepted = filter.judge(&candidate.value).is_accepted();
                if candidate.claimed_match != accepted {
                    debug!(
                        tag = %placeholder.tag,
                        claimed = candidate.claimed_match,
                        accepted,
                        "Audit verdict overridden by local check"
                    );
                }
                AuditItem {
                    tag: placeholder.tag,
                    label: if candidate.label.is_empty() {
                        placeholder.label()
                    } else {
                        candidate.label.clone()
                    },
                    value: if accepted {
                        candidate.value.clone()
                    } else {
                        String::new()
                    },
                    matched: accepted,
                }
            })
            .collect();

        let report = AuditReport::from_items(items);
        info!(
            matched = report.matched_count,
            missing = report.missing_count,
            "Template audit complete"
        );
        Ok(report)
    }

    /// Runs the full pipeline and returns the filled document.
    pub async fn fill_form(&self, request: FillRequest<'_>) -> Result<FillOutcome, FillError> {
        let (mut package, scan) = self.load(request.document)?;
        let photo = request.photo.filter(|_| !scan.photo_slots.is_empty());

        if scan.is_empty() {
            let document = match photo {
                Some(photo) => {
                    embed_photo(&mut package, &scan, photo)?;
                    package.to_bytes().map_err(FillError::Output)?
                }
                None => request.document.to_vec(),
            };
            info!("Template has no placeholders, returning it unchanged");
            return Ok(FillOutcome {
                document,
                fill_map: FillMap::new(),
                missing_fields: Vec::new(),
                results: Vec::new(),
            });
        }

        let profile = ProfileNormalizer::new(&self.tables).normalize(request.profile_text);
        let client = self.client();
        let filter = ConfidenceFilter::new(&profile.explicit_values);

        let outcome = match request.precomputed {
            Some(precomputed) => {
                debug!(entries = precomputed.len(), "Using precomputed fill map");
                filter.trust(precomputed, &scan.placeholders)
            }
            None => {
                let raw = client
                    .infer_fill_map(&profile.text, &scan.markdown, &scan.placeholders)
                    .await;
                filter.apply(&raw, &scan.placeholders)
            }
        };

        DocumentWriter::apply_values(&mut package, &scan.placeholders, &outcome.accepted);
        if let Some(photo) = photo {
            embed_photo(&mut package, &scan, photo)?;
        }

        let missing_fields = self
            .missing_labels(&client, &scan, &outcome, &profile.text)
            .await;
        let document = package.to_bytes().map_err(FillError::Output)?;

        info!(
            placeholders = scan.placeholders.len(),
            filled = outcome.accepted.len(),
            rejected = outcome.rejected().count(),
            missing = missing_fields.len(),
            "Form filled"
        );

        Ok(FillOutcome {
            document,
            fill_map: outcome.accepted,
            missing_fields,
            results: outcome.results,
        })
    }

    async fn missing_labels(
        &self,
        client: &InferenceClient<'_>,
        scan: &TemplateScan,
        outcome: &FilterOutcome,
        profile_text: &str,
    ) -> Vec<String> {
        let missing: Vec<&Placeholder> = outcome
            .missing()
            .filter_map(|tag| scan.placeholder(tag))
            .collect();

        let mut labels: Vec<String> = missing
            .iter()
            .filter(|p| !p.header.is_empty())
            .map(|p| p.header.clone())
            .collect();
        let unlabeled: Vec<Placeholder> = missing
            .iter()
            .filter(|p| p.header.is_empty())
            .map(|p| (*p).clone())
            .collect();

        let names = MissingFieldResolver::new(client)
            .resolve(&unlabeled, &scan.markdown, profile_text)
            .await;
        labels.extend(names);
        labels
    }
}

fn embed_photo(package: &mut DocxPackage, scan: &TemplateScan, photo: &[u8]) -> Result<(), FillError> {
    DocumentWriter::embed_photo(package, &scan.photo_slots, photo).map_err(|err| match err {
        DocxError::Image(message) => FillError::InvalidPhoto(message),
        other => FillError::Output(other),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::docx::test_support::{build_docx, cell_texts, png_bytes};
    use crate::inference::test_provider::ScriptedProvider;
    use crate::models::FillSource;

    fn filler(provider: &Arc<ScriptedProvider>) -> FormFiller {
        FormFiller::new(provider.clone())
    }

    fn drawings(document: &[u8]) -> usize {
        let package = DocxPackage::from_bytes(document).unwrap();
        let mut count = 0;
        package.document().walk(&mut |e| {
            if e.is("w:drawing") {
                count += 1;
            }
        });
        count
    }

    // ── fillForm ───────────────────────────────────────────────────────────

    #[tokio::test]
    async fn test_explicit_value_is_filled() {
        let provider = Arc::new(ScriptedProvider::new().answer(r#"{"{1}": "张三"}"#));
        let template = build_docx(&[&[&["姓名"], &[""]]]);

        let outcome = filler(&provider)
            .fill_form(FillRequest::new(&template, "姓名：张三"))
            .await
            .unwrap();

        let expected: FillMap = [(Tag::new(1), "张三".to_string())].into_iter().collect();
        assert_eq!(outcome.fill_map, expected);
        assert!(outcome.missing_fields.is_empty());
        assert_eq!(outcome.results[0].source, FillSource::ExplicitMatch);
        assert_eq!(cell_texts(&outcome.document)[0][1], vec!["张三"]);
        // The prompt carries the augmented profile and the tagged table.
        let prompt = provider.prompt(0);
        assert!(prompt.contains(crate::profile::MAPPING_MARKER));
        assert!(prompt.contains("| {1} |"));
    }

    #[tokio::test]
    async fn test_fabricated_value_is_rejected_and_reported_missing() {
        let provider = Arc::new(ScriptedProvider::new().answer(r#"{"{1}": "李四"}"#));
        let template = build_docx(&[&[&["姓名"], &[""]]]);

        let outcome = filler(&provider)
            .fill_form(FillRequest::new(&template, "张三"))
            .await
            .unwrap();

        assert!(outcome.fill_map.is_empty());
        assert_eq!(outcome.missing_fields, vec!["姓名"]);
        assert_eq!(outcome.results[0].source, FillSource::AiInferredRejected);
        assert_eq!(cell_texts(&outcome.document)[0][1], vec![""]);
        // Only the fill call: the missing field already has a header.
        assert_eq!(provider.calls(), 1);
    }

    #[tokio::test]
    async fn test_label_keyed_answer_is_dropped() {
        // Keys must be tags; a header used as key carries no value.
        let provider = Arc::new(ScriptedProvider::new().answer(r#"{"姓名": "李四"}"#));
        let template = build_docx(&[&[&["姓名"], &[""]]]);

        let outcome = filler(&provider)
            .fill_form(FillRequest::new(&template, "姓名：张三"))
            .await
            .unwrap();

        assert!(outcome.fill_map.is_empty());
        assert_eq!(outcome.missing_fields, vec!["姓名"]);
        assert_eq!(outcome.results[0].source, FillSource::Unfilled);
    }

    #[tokio::test]
    async fn test_photo_slot_gets_image_and_no_placeholder() {
        let provider = Arc::new(ScriptedProvider::new().answer(r#"{"{1}": "张三"}"#));
        let template = build_docx(&[&[&["姓名", "照片"], &["", "x"]]]);
        let photo = png_bytes(30, 40);

        let outcome = filler(&provider)
            .fill_form(FillRequest::new(&template, "姓名：张三").with_photo(&photo))
            .await
            .unwrap();

        assert_eq!(outcome.results.len(), 1);
        assert_eq!(outcome.fill_map.len(), 1);
        assert_eq!(drawings(&outcome.document), 1);
        assert_eq!(cell_texts(&outcome.document)[0][0], vec!["姓名", ""]);
    }

    #[tokio::test]
    async fn test_photo_slot_untouched_without_photo() {
        let provider = Arc::new(ScriptedProvider::new().answer(r#"{"{1}": "张三"}"#));
        let template = build_docx(&[&[&["姓名", "照片"], &["", "x"]]]);

        let outcome = filler(&provider)
            .fill_form(FillRequest::new(&template, "姓名：张三"))
            .await
            .unwrap();

        assert_eq!(drawings(&outcome.document), 0);
        assert_eq!(cell_texts(&outcome.document)[0][0], vec!["姓名", "照片"]);
    }

    #[tokio::test]
    async fn test_fenced_answer_with_trailing_prose_is_read() {
        let provider = Arc::new(ScriptedProvider::new().answer(
            "```json\n{\"{1}\": \"张三\", \"{2}\": \"男\"}\n```\n以上为填写结果，如有问题请告知。",
        ));
        let template = build_docx(&[&[&["姓名", "性别"], &["", ""]]]);

        let outcome = filler(&provider)
            .fill_form(FillRequest::new(&template, "姓名：张三\n性别：男"))
            .await
            .unwrap();

        assert_eq!(outcome.fill_map.get(Tag::new(1)), Some("张三"));
        assert_eq!(outcome.fill_map.get(Tag::new(2)), Some("男"));
        assert!(outcome.missing_fields.is_empty());
    }

    #[tokio::test]
    async fn test_unlabeled_missing_fields_are_always_named() {
        let provider = Arc::new(
            ScriptedProvider::new()
                .answer(r#"{"{1}": "", "{2}": ""}"#)
                .answer(r#"["身高"]"#),
        );
        // Both placeholders sit in the first row, so neither has a header.
        let template = build_docx(&[&[&["", ""], &["a", "b"]]]);

        let outcome = filler(&provider)
            .fill_form(FillRequest::new(&template, "姓名：张三"))
            .await
            .unwrap();

        assert_eq!(outcome.missing_fields, vec!["身高", "{2}"]);
        assert_eq!(provider.calls(), 2);
    }

    #[tokio::test]
    async fn test_header_labels_come_before_resolved_names() {
        let provider = Arc::new(
            ScriptedProvider::new()
                .answer("{}")
                .answer(r#"["备注"]"#),
        );
        let template = build_docx(&[&[&["", "姓名"], &["x", ""]]]);

        let outcome = filler(&provider)
            .fill_form(FillRequest::new(&template, ""))
            .await
            .unwrap();

        assert_eq!(outcome.missing_fields, vec!["姓名", "备注"]);
    }

    #[tokio::test]
    async fn test_transport_failure_leaves_everything_missing() {
        let provider = Arc::new(ScriptedProvider::new().fail(502).fail(502));
        let template = build_docx(&[&[&["姓名", ""], &["", ""]]]);

        let outcome = filler(&provider)
            .fill_form(FillRequest::new(&template, "姓名：张三"))
            .await
            .unwrap();

        assert!(outcome.fill_map.is_empty());
        // {1} is in the first row; {2} and {3} have headers 姓名 and "".
        assert_eq!(outcome.missing_fields, vec!["姓名", "{1}", "{3}"]);
        let texts = cell_texts(&outcome.document);
        assert_eq!(texts[0][1], vec!["", ""]);
    }

    #[tokio::test]
    async fn test_counts_always_add_up() {
        let provider = Arc::new(ScriptedProvider::new().answer(
            r#"{"{1}": "张三", "{2}": "李四", "{3}": "上海", "{7}": "ghost"}"#,
        ));
        let template = build_docx(&[&[&["姓名", "联系人", "地址", "备注"], &["", "", "", ""]]]);

        let outcome = filler(&provider)
            .fill_form(FillRequest::new(&template, "姓名：张三\n地址：上海市浦东新区"))
            .await
            .unwrap();

        assert_eq!(outcome.results.len(), 4);
        let missing = outcome.results.iter().filter(|r| !r.is_filled()).count();
        assert_eq!(outcome.fill_map.len() + missing, 4);
        assert_eq!(outcome.missing_fields, vec!["联系人", "备注"]);
    }

    #[tokio::test]
    async fn test_precomputed_map_skips_inference() {
        let provider = Arc::new(ScriptedProvider::new());
        let template = build_docx(&[&[&["姓名", "性别"], &["", ""]]]);
        let precomputed: FillMap =
            serde_json::from_str(r#"{"1": "王五", "{2}": "", "x": "y"}"#).unwrap();

        let outcome = filler(&provider)
            .fill_form(FillRequest::new(&template, "姓名：张三").with_precomputed(&precomputed))
            .await
            .unwrap();

        assert_eq!(provider.calls(), 0);
        // Not re-filtered: 王五 is not in the profile but is kept.
        assert_eq!(outcome.fill_map.get(Tag::new(1)), Some("王五"));
        assert_eq!(outcome.missing_fields, vec!["性别"]);
        assert_eq!(cell_texts(&outcome.document)[0][1], vec!["王五", ""]);
    }

    #[tokio::test]
    async fn test_full_template_is_returned_verbatim() {
        let provider = Arc::new(ScriptedProvider::new());
        let template = build_docx(&[&[&["姓名", "张三"]]]);

        let outcome = filler(&provider)
            .fill_form(FillRequest::new(&template, "姓名：张三"))
            .await
            .unwrap();

        assert_eq!(outcome.document, template);
        assert!(outcome.fill_map.is_empty());
        assert!(outcome.missing_fields.is_empty());
        assert_eq!(provider.calls(), 0);
    }

    #[tokio::test]
    async fn test_full_template_still_gets_photo() {
        let provider = Arc::new(ScriptedProvider::new());
        let template = build_docx(&[&[&["姓名", "张三", "照片"]]]);
        let photo = png_bytes(8, 8);

        let outcome = filler(&provider)
            .fill_form(FillRequest::new(&template, "").with_photo(&photo))
            .await
            .unwrap();

        assert_eq!(drawings(&outcome.document), 1);
        assert_eq!(cell_texts(&outcome.document)[0][0], vec!["姓名", "张三", ""]);
    }

    #[tokio::test]
    async fn test_invalid_inputs_fail_fast() {
        let provider = Arc::new(ScriptedProvider::new());
        let err = filler(&provider)
            .fill_form(FillRequest::new(b"not a docx", "姓名：张三"))
            .await
            .unwrap_err();
        assert!(matches!(err, FillError::InvalidDocument(_)));

        let template = build_docx(&[&[&["照片", ""]]]);
        let provider = Arc::new(ScriptedProvider::new().answer("{}"));
        let err = filler(&provider)
            .fill_form(FillRequest::new(&template, "").with_photo(b"plain text"))
            .await
            .unwrap_err();
        assert!(matches!(err, FillError::InvalidPhoto(_)));
        assert!(err.is_invalid_input());
    }

    // ── scanMissingFields ─────────────────────────────────────────────────

    #[tokio::test]
    async fn test_scan_missing_fields_uses_analysis_answer() {
        let provider = Arc::new(ScriptedProvider::new().answer(r#"["性别"]"#));
        let template = build_docx(&[&[&["姓名", "性别"], &["", ""]]]);

        let missing = filler(&provider)
            .scan_missing_fields(&template, "姓名：张三")
            .await
            .unwrap();

        assert_eq!(missing, vec!["性别"]);
        assert!(provider.prompt(0).contains("- {2}: 表头=\"性别\""));
    }

    #[tokio::test]
    async fn test_scan_missing_fields_degrades_to_empty() {
        let provider = Arc::new(ScriptedProvider::new().fail(500));
        let template = build_docx(&[&[&["姓名"], &[""]]]);
        let missing = filler(&provider)
            .scan_missing_fields(&template, "")
            .await
            .unwrap();
        assert!(missing.is_empty());

        let provider = Arc::new(ScriptedProvider::new());
        let full = build_docx(&[&[&["姓名", "张三"]]]);
        assert!(filler(&provider)
            .scan_missing_fields(&full, "")
            .await
            .unwrap()
            .is_empty());
        assert_eq!(provider.calls(), 0);
    }

    // ── auditTemplate ─────────────────────────────────────────────────────

    #[tokio::test]
    async fn test_audit_revalidates_service_claims() {
        let provider = Arc::new(ScriptedProvider::new().answer(
            r#"{"items": [
                {"key": "{1}", "label": "姓名", "value": "张三", "isMatched": true},
                {"key": "{2}", "label": "性别", "value": "男", "isMatched": true}
            ]}"#,
        ));
        let template = build_docx(&[&[&["姓名", "性别", "电话"], &["", "", ""]]]);

        let report = filler(&provider)
            .audit_template(&template, "姓名：张三")
            .await
            .unwrap();

        assert_eq!(report.items.len(), 3);
        assert!(report.items[0].matched);
        // Claimed but not in the profile.
        assert!(!report.items[1].matched);
        assert_eq!(report.items[1].value, "");
        // Omitted by the service.
        assert_eq!(report.items[2].label, "电话");
        assert!(!report.items[2].matched);
        assert_eq!((report.matched_count, report.missing_count), (1, 2));
    }

    #[tokio::test]
    async fn test_audit_transport_failure_reports_all_unmatched() {
        let provider = Arc::new(ScriptedProvider::new().fail(401));
        let template = build_docx(&[&[&["", "姓名"], &["x", ""]]]);

        let report = filler(&provider)
            .audit_template(&template, "姓名：张三")
            .await
            .unwrap();

        let labels: Vec<_> = report.items.iter().map(|i| i.label.as_str()).collect();
        assert_eq!(labels, vec!["{1}", "姓名"]);
        assert_eq!(report.matched_count, 0);
        assert_eq!(report.missing_count, 2);
    }

    #[test]
    fn test_audit_report_serializes_camel_case() {
        let report = AuditReport::from_items(vec![AuditItem {
            tag: Tag::new(1),
            label: "姓名".into(),
            value: "张三".into(),
            matched: true,
        }]);
        let json = serde_json::to_value(&report).unwrap();
        assert_eq!(json["matchedCount"], 1);
        assert_eq!(json["missingCount"], 0);
        assert_eq!(json["items"][0]["tag"], "{1}");
    }
}
