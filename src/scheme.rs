use std::time::Duration;

use indicatif::{ProgressBar, ProgressStyle};
use reqwest::StatusCode;
use serde::Serialize;
use serde_json::Value;
use thiserror::Error;
use tracing::{info, warn};

use crate::normalize::documents::normalize_documents;
use crate::normalize::faqs::{normalize_faqs, FaqEntry};
use crate::normalize::is_vacant;
use crate::upstream::{UpstreamClient, UpstreamError};

/// Pause between successive schemes in a batch, to stay polite to the
/// public API.
const BATCH_DELAY: Duration = Duration::from_millis(300);

#[derive(Debug, Error)]
pub enum AssembleError {
    #[error("Scheme '{0}' not found")]
    NotFound(String),
    #[error(transparent)]
    Upstream(#[from] UpstreamError),
}

/// External link attached to a scheme, numbered by its position in the
/// upstream list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Reference {
    pub title: String,
    pub url: String,
}

/// Flat, frontend-ready view of one scheme. Field names follow the wire
/// format the consuming app expects.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SchemeRecord {
    pub id: Option<String>,
    pub slug: String,
    pub title: Option<String>,
    pub short_title: Option<String>,
    pub description: Option<String>,
    pub detailed_description: Option<String>,
    pub benefits: Option<String>,
    pub eligibility: Option<String>,
    pub exclusions: Option<String>,
    pub ministry: Option<String>,
    pub application_process: Option<String>,
    pub references: Vec<Reference>,
    pub documents: Vec<String>,
    pub faqs: Vec<FaqEntry>,
}

#[derive(Debug)]
pub struct BatchOutcome {
    pub schemes: Vec<SchemeRecord>,
    pub requested: usize,
}

#[derive(Debug)]
pub struct SlugPage {
    pub slugs: Vec<String>,
    pub total: u64,
}

/// Builds the full record for one scheme: detail fetch, then documents
/// and FAQs keyed on the scheme id.
///
/// The detail fetch is mandatory; a 404 or an empty envelope means the
/// slug does not exist. The two follow-up fetches are best-effort and
/// degrade to empty lists, so one flaky endpoint never sinks the whole
/// record.
pub async fn assemble_scheme(
    client: &UpstreamClient,
    slug: &str,
) -> Result<SchemeRecord, AssembleError> {
    let envelope = match client.scheme_detail(slug).await {
        Ok(envelope) => envelope,
        Err(UpstreamError::BadStatus(StatusCode::NOT_FOUND)) => {
            return Err(AssembleError::NotFound(slug.to_string()))
        }
        Err(err) => return Err(err.into()),
    };
    if is_vacant(&envelope) {
        return Err(AssembleError::NotFound(slug.to_string()));
    }

    let data = envelope.get("data");
    let scheme_id = data.and_then(|d| d.get("_id")).and_then(scalar_string);
    let en = data.and_then(|d| d.get("en"));
    let basic = en.and_then(|e| e.get("basicDetails"));
    let content = en.and_then(|e| e.get("schemeContent"));
    let criteria = en.and_then(|e| e.get("eligibilityCriteria"));

    // Ministry arrives as a nested label object
    let ministry = basic
        .and_then(|b| b.get("nodalDepartmentName"))
        .and_then(|d| d.get("label"))
        .and_then(Value::as_str)
        .map(clean_text);
    // Only the first application-process step carries the markdown body
    let application_process = en
        .and_then(|e| e.get("applicationProcess"))
        .and_then(Value::as_array)
        .and_then(|steps| steps.first())
        .and_then(|step| step.get("process_md"))
        .and_then(Value::as_str)
        .map(clean_text);
    // Titles number by source position, so dropped entries leave gaps
    let references: Vec<Reference> = content
        .and_then(|c| c.get("references"))
        .and_then(Value::as_array)
        .map(|entries| {
            entries
                .iter()
                .enumerate()
                .filter_map(|(index, entry)| {
                    let url = entry.get("url").and_then(Value::as_str)?;
                    if url.is_empty() {
                        return None;
                    }
                    Some(Reference {
                        title: format!("Reference {}", index + 1),
                        url: url.to_string(),
                    })
                })
                .collect()
        })
        .unwrap_or_default();

    // Documents and FAQs are keyed on _id, not the slug
    let (documents, faqs) = match scheme_id.as_deref() {
        Some(id) => {
            let documents_payload = client.scheme_documents(id).await.ok();
            let faqs_payload = client.scheme_faqs(id).await.ok();
            (
                normalize_documents(documents_payload.as_ref()),
                normalize_faqs(faqs_payload.as_ref()),
            )
        }
        None => (Vec::new(), Vec::new()),
    };

    Ok(SchemeRecord {
        id: scheme_id,
        slug: slug.to_string(),
        title: text_field(basic, "schemeName"),
        short_title: text_field(basic, "schemeShortTitle"),
        description: text_field(content, "briefDescription"),
        detailed_description: text_field(content, "detailedDescription_md"),
        benefits: text_field(content, "benefits_md"),
        eligibility: text_field(criteria, "eligibilityDescription_md"),
        exclusions: text_field(content, "exclusions_md"),
        ministry,
        application_process,
        references,
        documents,
        faqs,
    })
}

/// Assembles several schemes sequentially with [`BATCH_DELAY`] between
/// them. Failed slugs are logged and skipped, never fatal.
pub async fn assemble_batch(client: &UpstreamClient, slugs: &[String]) -> BatchOutcome {
    let pb = ProgressBar::new(slugs.len() as u64);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("[{elapsed_precise}] {bar:40} {pos}/{len} ({per_sec}, eta {eta})")
            .expect("Invalid progress template")
            .progress_chars("=> "),
    );

    let mut schemes = Vec::new();
    for (index, slug) in slugs.iter().enumerate() {
        match assemble_scheme(client, slug).await {
            Ok(record) => schemes.push(record),
            Err(e) => warn!("Skipping scheme {}: {}", slug, e),
        }
        pb.inc(1);
        if index + 1 < slugs.len() {
            tokio::time::sleep(BATCH_DELAY).await;
        }
    }
    pb.finish_and_clear();
    info!("Assembled {} of {} schemes", schemes.len(), slugs.len());

    BatchOutcome {
        schemes,
        requested: slugs.len(),
    }
}

/// One page of scheme slugs from the search index, malformed items
/// skipped.
pub async fn list_slugs(
    client: &UpstreamClient,
    from: usize,
    size: usize,
) -> Result<SlugPage, AssembleError> {
    let page = client.search_page(from, size).await?;
    if is_vacant(&page) {
        return Err(UpstreamError::Empty.into());
    }
    let data = page.get("data");
    let slugs: Vec<String> = data
        .and_then(|d| d.get("hits"))
        .and_then(|h| h.get("items"))
        .and_then(Value::as_array)
        .map(|items| {
            items
                .iter()
                .filter_map(|item| Some(item.get("fields")?.get("slug")?.as_str()?.to_string()))
                .collect()
        })
        .unwrap_or_default();
    let total = data
        .and_then(|d| d.get("summary"))
        .and_then(|s| s.get("total"))
        .and_then(Value::as_u64)
        .unwrap_or(0);
    Ok(SlugPage { slugs, total })
}

fn text_field(section: Option<&Value>, key: &str) -> Option<String> {
    section
        .and_then(|s| s.get(key))
        .and_then(Value::as_str)
        .map(clean_text)
}

/// The upstream API double-encodes ampersands in English copy.
fn clean_text(raw: &str) -> String {
    raw.replace("&amp;", "&")
}

/// `_id` is usually a string but has shipped as a number.
fn scalar_string(value: &Value) -> Option<String> {
    match value {
        Value::String(id) if !id.is_empty() => Some(id.clone()),
        Value::Number(id) => Some(id.to_string()),
        _ => None,
    }
}

// ── Tests ──

#[cfg(test)]
mod tests {
    use super::*;
    use httpmock::prelude::*;
    use serde_json::json;

    use crate::config::Config;

    fn test_client(server: &MockServer) -> UpstreamClient {
        UpstreamClient::new(&Config {
            port: 0,
            api_key: "test-key".to_string(),
            scheme_api: format!("{}/schemes/v5/public/schemes", server.base_url()),
            search_api: format!("{}/search/v5/schemes", server.base_url()),
            debug: false,
        })
    }

    fn detail_payload() -> Value {
        json!({
            "data": {
                "_id": "64abc123",
                "en": {
                    "basicDetails": {
                        "schemeName": "PM Kisan Samman Nidhi",
                        "schemeShortTitle": "PM-KISAN",
                        "nodalDepartmentName": {"label": "Ministry of Agriculture &amp; Farmers Welfare"}
                    },
                    "schemeContent": {
                        "briefDescription": "Income support for farmer families.",
                        "detailedDescription_md": "Small &amp; marginal farmers get Rs 6000 a year.",
                        "benefits_md": "Rs 6000 in three instalments.",
                        "exclusions_md": "Institutional landholders.",
                        "references": [
                            {"url": ""},
                            {"url": "https://pmkisan.gov.in"},
                            {"note": "no url here"},
                            {"url": "https://agricoop.gov.in"}
                        ]
                    },
                    "eligibilityCriteria": {"eligibilityDescription_md": "Landholding farmer families."},
                    "applicationProcess": [{"process_md": "Register online or through a CSC."}]
                }
            }
        })
    }

    #[tokio::test]
    async fn assembles_full_record() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(GET)
                    .path("/schemes/v5/public/schemes")
                    .query_param("slug", "pm-kisan")
                    .query_param("lang", "en");
                then.status(200).json_body(detail_payload());
            })
            .await;
        let documents = server
            .mock_async(|when, then| {
                when.method(GET)
                    .path("/schemes/v5/public/schemes/64abc123/documents");
                then.status(200).json_body(json!({
                    "data": {"en": {"documents_required": [
                        {"children": [{"text": "1. Aadhaar card"}, {"text": "Land record"}]}
                    ]}}
                }));
            })
            .await;
        let faqs = server
            .mock_async(|when, then| {
                when.method(GET)
                    .path("/schemes/v5/public/schemes/64abc123/faqs");
                then.status(200).json_body(json!({
                    "data": [{"question": "Who is eligible?", "answer": "All landholding farmer families."}]
                }));
            })
            .await;

        let client = test_client(&server);
        let record = assemble_scheme(&client, "pm-kisan").await.unwrap();

        assert_eq!(record.id.as_deref(), Some("64abc123"));
        assert_eq!(record.slug, "pm-kisan");
        assert_eq!(record.title.as_deref(), Some("PM Kisan Samman Nidhi"));
        assert_eq!(record.short_title.as_deref(), Some("PM-KISAN"));
        assert_eq!(
            record.ministry.as_deref(),
            Some("Ministry of Agriculture & Farmers Welfare")
        );
        assert_eq!(
            record.detailed_description.as_deref(),
            Some("Small & marginal farmers get Rs 6000 a year.")
        );
        assert_eq!(record.eligibility.as_deref(), Some("Landholding farmer families."));
        assert_eq!(
            record.application_process.as_deref(),
            Some("Register online or through a CSC.")
        );
        assert_eq!(
            record.references,
            vec![
                Reference {
                    title: "Reference 2".to_string(),
                    url: "https://pmkisan.gov.in".to_string()
                },
                Reference {
                    title: "Reference 4".to_string(),
                    url: "https://agricoop.gov.in".to_string()
                },
            ]
        );
        assert_eq!(record.documents, vec!["Aadhaar card", "Land record"]);
        assert_eq!(record.faqs.len(), 1);
        assert_eq!(record.faqs[0].question, "Who is eligible?");
        documents.assert_async().await;
        faqs.assert_async().await;
    }

    #[tokio::test]
    async fn upstream_404_maps_to_not_found() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(GET).path("/schemes/v5/public/schemes");
                then.status(404);
            })
            .await;

        let client = test_client(&server);
        let err = assemble_scheme(&client, "no-such-scheme").await.unwrap_err();
        assert!(matches!(err, AssembleError::NotFound(_)));
        assert_eq!(err.to_string(), "Scheme 'no-such-scheme' not found");
    }

    #[tokio::test]
    async fn vacant_envelope_maps_to_not_found() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(GET).path("/schemes/v5/public/schemes");
                then.status(200).json_body(json!({}));
            })
            .await;

        let client = test_client(&server);
        let err = assemble_scheme(&client, "ghost").await.unwrap_err();
        assert!(matches!(err, AssembleError::NotFound(_)));
    }

    #[tokio::test]
    async fn upstream_5xx_is_not_a_missing_scheme() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(GET).path("/schemes/v5/public/schemes");
                then.status(503);
            })
            .await;

        let client = test_client(&server);
        let err = assemble_scheme(&client, "pm-kisan").await.unwrap_err();
        assert!(matches!(
            err,
            AssembleError::Upstream(UpstreamError::BadStatus(_))
        ));
    }

    #[tokio::test]
    async fn failed_sub_fetches_degrade_to_empty_lists() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(GET)
                    .path("/schemes/v5/public/schemes")
                    .query_param("slug", "flaky");
                then.status(200).json_body(json!({
                    "data": {"_id": "id9", "en": {"basicDetails": {"schemeName": "Flaky Scheme"}}}
                }));
            })
            .await;
        server
            .mock_async(|when, then| {
                when.method(GET).path("/schemes/v5/public/schemes/id9/documents");
                then.status(500);
            })
            .await;
        server
            .mock_async(|when, then| {
                when.method(GET).path("/schemes/v5/public/schemes/id9/faqs");
                then.status(500);
            })
            .await;

        let client = test_client(&server);
        let record = assemble_scheme(&client, "flaky").await.unwrap();
        assert_eq!(record.title.as_deref(), Some("Flaky Scheme"));
        assert!(record.documents.is_empty());
        assert!(record.faqs.is_empty());
    }

    #[tokio::test]
    async fn missing_id_skips_sub_fetches() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(GET)
                    .path("/schemes/v5/public/schemes")
                    .query_param("slug", "no-id");
                then.status(200).json_body(json!({
                    "data": {"en": {"basicDetails": {"schemeName": "No Id Scheme"}}}
                }));
            })
            .await;
        let documents = server
            .mock_async(|when, then| {
                when.method(GET).path_contains("/documents");
                then.status(200).json_body(json!({}));
            })
            .await;
        let faqs = server
            .mock_async(|when, then| {
                when.method(GET).path_contains("/faqs");
                then.status(200).json_body(json!({}));
            })
            .await;

        let client = test_client(&server);
        let record = assemble_scheme(&client, "no-id").await.unwrap();
        assert_eq!(record.id, None);
        assert!(record.documents.is_empty());
        assert!(record.faqs.is_empty());
        assert_eq!(documents.hits_async().await, 0);
        assert_eq!(faqs.hits_async().await, 0);
    }

    #[tokio::test]
    async fn batch_skips_failures_and_spaces_requests() {
        let server = MockServer::start_async().await;
        for slug in ["first", "last"] {
            server
                .mock_async(move |when, then| {
                    when.method(GET)
                        .path("/schemes/v5/public/schemes")
                        .query_param("slug", slug);
                    then.status(200).json_body(json!({
                        "data": {"en": {"basicDetails": {"schemeName": slug}}}
                    }));
                })
                .await;
        }
        server
            .mock_async(|when, then| {
                when.method(GET)
                    .path("/schemes/v5/public/schemes")
                    .query_param("slug", "missing");
                then.status(404);
            })
            .await;

        let client = test_client(&server);
        let slugs = vec![
            "first".to_string(),
            "missing".to_string(),
            "last".to_string(),
        ];
        let started = std::time::Instant::now();
        let outcome = assemble_batch(&client, &slugs).await;

        assert_eq!(outcome.requested, 3);
        assert_eq!(outcome.schemes.len(), 2);
        assert_eq!(outcome.schemes[0].slug, "first");
        assert_eq!(outcome.schemes[1].slug, "last");
        // Two inter-scheme pauses for three slugs.
        assert!(started.elapsed() >= 2 * BATCH_DELAY);
    }

    #[tokio::test]
    async fn list_slugs_parses_page_and_skips_malformed_items() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(GET)
                    .path("/search/v5/schemes")
                    .query_param("from", "3")
                    .query_param("size", "2");
                then.status(200).json_body(json!({
                    "data": {
                        "hits": {"items": [
                            {"fields": {"slug": "scheme-a"}},
                            {"broken": true},
                            {"fields": {"slug": "scheme-b"}}
                        ]},
                        "summary": {"total": 3127}
                    }
                }));
            })
            .await;

        let client = test_client(&server);
        let page = list_slugs(&client, 3, 2).await.unwrap();
        assert_eq!(page.slugs, vec!["scheme-a", "scheme-b"]);
        assert_eq!(page.total, 3127);
    }

    #[tokio::test]
    async fn empty_search_body_is_an_error() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(GET).path("/search/v5/schemes");
                then.status(200).json_body(json!({}));
            })
            .await;

        let client = test_client(&server);
        let err = list_slugs(&client, 0, 10).await.unwrap_err();
        assert!(matches!(
            err,
            AssembleError::Upstream(UpstreamError::Empty)
        ));
    }

    #[tokio::test]
    async fn search_without_items_yields_empty_page() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(GET).path("/search/v5/schemes");
                then.status(200).json_body(json!({"data": {"summary": {"total": 0}}}));
            })
            .await;

        let client = test_client(&server);
        let page = list_slugs(&client, 0, 10).await.unwrap();
        assert!(page.slugs.is_empty());
        assert_eq!(page.total, 0);
    }

    #[test]
    fn record_serialises_with_wire_keys() {
        let record = SchemeRecord {
            id: Some("x1".to_string()),
            slug: "some-scheme".to_string(),
            title: None,
            short_title: Some("SS".to_string()),
            description: None,
            detailed_description: None,
            benefits: None,
            eligibility: None,
            exclusions: None,
            ministry: None,
            application_process: Some("Apply online.".to_string()),
            references: vec![Reference {
                title: "Reference 1".to_string(),
                url: "https://example.gov.in".to_string(),
            }],
            documents: vec!["Aadhaar card".to_string()],
            faqs: Vec::new(),
        };
        let wire = serde_json::to_value(&record).unwrap();
        assert_eq!(wire["shortTitle"], "SS");
        assert_eq!(wire["applicationProcess"], "Apply online.");
        assert_eq!(
            wire["references"][0],
            json!({"title": "Reference 1", "url": "https://example.gov.in"})
        );
        assert!(wire.get("short_title").is_none());
    }
}
