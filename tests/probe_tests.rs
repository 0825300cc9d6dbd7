//! Connectivity probe against a mock site
use std::time::Duration;

use classifieds_crawler_lib::infrastructure::diagnostics::{ProbeOptions, ProbeOutcome, ProbeTarget, probe};
use classifieds_crawler_lib::infrastructure::{HttpClient, HttpClientConfig, ListingParser};
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

#[tokio::test]
async fn probe_reports_reachable_and_failed_targets() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/items/q-car-cover"))
        .respond_with(ResponseTemplate::new(200).set_body_string(
            r#"<html><head><title>Car Cover | OLX</title></head><body>
                 <div data-aut-id="itemBox" class="itemCard"><a href="/item/1-iid-1">Cover</a></div>
               </body></html>"#,
        ))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(403).set_body_string("Access denied: robot check"))
        .mount(&server)
        .await;

    let dir = tempfile::tempdir().unwrap();
    let client = HttpClient::with_config(HttpClientConfig::default()).unwrap();
    let parser = ListingParser::new().unwrap();
    let options = ProbeOptions {
        timeout: Duration::from_secs(5),
        pause: Duration::ZERO,
        output_dir: dir.path().to_path_buf(),
    };
    let targets = vec![
        ProbeTarget { url: server.uri(), inspect: false },
        ProbeTarget { url: format!("{}/items/q-car-cover", server.uri()), inspect: true },
        ProbeTarget { url: "http://127.0.0.1:1/".to_string(), inspect: false },
    ];

    let reports = probe(&client, &parser, &targets, &options).await;
    assert_eq!(reports.len(), 3);

    match &reports[0].outcome {
        ProbeOutcome::Reached { status, blocking, inspection, .. } => {
            assert_eq!(*status, 403);
            assert_eq!(blocking, &vec!["robot", "bot"]);
            assert!(inspection.is_none());
        }
        ProbeOutcome::Failed(e) => panic!("root should be reachable: {e}"),
    }

    match &reports[1].outcome {
        ProbeOutcome::Reached { status, inspection, saved_as, .. } => {
            assert_eq!(*status, 200);
            let inspection = inspection.as_ref().unwrap();
            assert_eq!(inspection.title.as_deref(), Some("Car Cover | OLX"));
            assert_eq!(inspection.expected_elements_found, 3);
            assert_eq!(saved_as.as_deref(), Some(dir.path().join("test_page_2.html").as_path()));
        }
        ProbeOutcome::Failed(e) => panic!("search page should be reachable: {e}"),
    }

    assert!(!reports[2].is_reachable());
}
