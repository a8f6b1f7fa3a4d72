//! Engine over the real OpenAlex client, against a wiremock server.

mod support;

use std::sync::Arc;

use journal_matcher_core::source::{BibliographicSource, HttpTimeouts, OpenAlexSource};
use journal_matcher_core::{EngineConfig, MatchEngine, Signal, SignalStatus};
use serde_json::json;
use support::socket_guard::start_mock_server_or_skip;
use wiremock::matchers::{method, path, query_param, query_param_contains};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn medical_image_analysis() -> serde_json::Value {
    json!({
        "id": "https://openalex.org/S137773608",
        "display_name": "Medical Image Analysis",
        "issn_l": "1361-8415",
        "host_organization_name": "Elsevier BV",
        "works_count": 2500,
        "summary_stats": {"h_index": 150, "2yr_mean_citedness": 10.5},
        "is_oa": false,
        "topics": [{
            "id": "https://openalex.org/T10052",
            "display_name": "Medical Image Analysis",
            "count": 900,
            "subfield": {"id": "https://openalex.org/subfields/2741", "display_name": "Radiology, Nuclear Medicine and Imaging"},
            "field": {"id": "https://openalex.org/fields/27", "display_name": "Medicine"}
        }]
    })
}

fn open_radiology() -> serde_json::Value {
    json!({
        "id": "https://openalex.org/S2",
        "display_name": "Open Radiology Reports",
        "works_count": 800,
        "summary_stats": {"h_index": 20, "2yr_mean_citedness": 1.5},
        "is_oa": true,
        "topics": []
    })
}

async fn mount_search_mocks(server: &MockServer) {
    Mock::given(method("GET"))
        .and(path("/works"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "results": [{
                "id": "https://openalex.org/W1",
                "display_name": "Deep learning for CT cancer detection",
                "cited_by_count": 120,
                "primary_topic": {
                    "id": "https://openalex.org/T10052",
                    "display_name": "Medical Image Analysis",
                    "subfield": {"id": "https://openalex.org/subfields/2741", "display_name": "Radiology, Nuclear Medicine and Imaging"},
                    "field": {"id": "https://openalex.org/fields/27", "display_name": "Medicine"}
                },
                "topics": [{"id": "https://openalex.org/T10052", "display_name": "Medical Image Analysis"}]
            }]
        })))
        .expect(1)
        .mount(server)
        .await;

    Mock::given(method("GET"))
        .and(path("/sources"))
        .and(query_param_contains("filter", "topics.id:T10052"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!({"results": [medical_image_analysis()]})),
        )
        .expect(1)
        .mount(server)
        .await;

    Mock::given(method("GET"))
        .and(path("/sources"))
        .and(query_param("filter", "type:journal,topics.subfield.id:2741"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!({"results": [medical_image_analysis()]})),
        )
        .expect(1)
        .mount(server)
        .await;

    Mock::given(method("GET"))
        .and(path("/sources"))
        .and(query_param("filter", "type:journal"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"results": [open_radiology()]})))
        .expect(1)
        .mount(server)
        .await;
}

fn engine_for(server: &MockServer) -> MatchEngine {
    let source = OpenAlexSource::with_base_url(
        server.uri(),
        Some("test@example.com".to_string()),
        HttpTimeouts::default(),
    )
    .unwrap();
    let source: Arc<dyn BibliographicSource> = Arc::new(source);
    MatchEngine::new(source, EngineConfig::default()).unwrap()
}

#[tokio::test]
async fn test_search_over_openalex_merges_signals() {
    let Some(server) = start_mock_server_or_skip().await else {
        return;
    };
    mount_search_mocks(&server).await;

    let response = engine_for(&server)
        .search(
            "Deep learning for CT cancer detection",
            "We apply deep learning to CT scans for early cancer detection across hospitals.",
            &["medical imaging".to_string()],
            true,
        )
        .await
        .unwrap();

    assert_eq!(
        response.discipline_detections[0].discipline().subfield_id,
        2741
    );
    assert!(
        response
            .signal_report
            .iter()
            .all(|o| o.status == SignalStatus::Completed)
    );
    assert_eq!(response.total_found, 2);

    let mia = response
        .candidates
        .iter()
        .find(|c| c.id == "S137773608")
        .unwrap();
    assert!(mia.signals_matched.contains(&Signal::Topic));
    assert!(mia.signals_matched.contains(&Signal::Subfield));
    assert!(mia.score_components.discipline_boost > 0.0);

    let open = response.candidates.iter().find(|c| c.id == "S2").unwrap();
    assert!(open.score_components.open_access_bonus > 0.0);
}

#[tokio::test]
async fn test_explain_fetches_journal_by_id() {
    let Some(server) = start_mock_server_or_skip().await else {
        return;
    };
    Mock::given(method("GET"))
        .and(path("/sources/S137773608"))
        .respond_with(ResponseTemplate::new(200).set_body_json(medical_image_analysis()))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/sources/S404"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;

    let engine = engine_for(&server);
    let explanation = engine
        .explain(
            "https://openalex.org/S137773608",
            "Medical image analysis with deep networks.",
        )
        .await
        .unwrap();
    assert!(!explanation.match_details.is_empty());
    assert_eq!(explanation.matched_topics, vec!["Medical Image Analysis"]);

    let missing = engine.explain("S404", "Anything at all.").await;
    assert!(matches!(
        missing,
        Err(journal_matcher_core::EngineError::CandidateNotFound { .. })
    ));
}

#[tokio::test]
async fn test_server_errors_degrade_to_failed_signals() {
    let Some(server) = start_mock_server_or_skip().await else {
        return;
    };
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;

    let response = engine_for(&server)
        .search(
            "Deep learning for CT cancer detection",
            "We apply deep learning to CT scans for early cancer detection across hospitals.",
            &[],
            false,
        )
        .await
        .unwrap();

    assert_eq!(response.total_found, 0);
    assert!(response.discipline_detections.is_empty());
    let keyword = response
        .signal_report
        .iter()
        .find(|o| o.signal == Signal::Keyword)
        .unwrap();
    assert!(matches!(keyword.status, SignalStatus::Failed { .. }));
    assert_eq!(keyword.attempts, 2);
}
