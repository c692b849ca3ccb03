use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{mpsc, Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use clap::Parser;
use serde_json::json;
use tokio::sync::oneshot;
use toxiscope_lib::api::{run_image_detection, run_text_detection};
use toxiscope_lib::cli::Cli;
use toxiscope_lib::models::{DetectionRequest, DetectionResult};
use toxiscope_lib::services::{
    ClientError, DetectionClient, DetectionService, FailureReason, PreviewLoadError, PreviewLoader,
    SubmissionWorkflow, ValidationError, WorkflowState, NO_CATEGORIES, PREVIEW_ERROR_PROMPT,
    RETRY_PROMPT,
};
use wiremock::matchers::{body_json, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

type Gate = oneshot::Receiver<Result<DetectionResult, ClientError>>;

/// Service whose calls block until the test releases them, keyed by text content.
#[derive(Default)]
struct GatedService {
    gates: Mutex<HashMap<String, Gate>>,
}

impl GatedService {
    fn gate(&self, content: &str) -> oneshot::Sender<Result<DetectionResult, ClientError>> {
        let (tx, rx) = oneshot::channel();
        self.gates.lock().unwrap().insert(content.to_string(), rx);
        tx
    }
}

#[async_trait]
impl DetectionService for GatedService {
    async fn submit(&self, request: DetectionRequest) -> Result<DetectionResult, ClientError> {
        let key = match &request {
            DetectionRequest::Text { content, .. } => content.clone(),
            DetectionRequest::Image { source_uri, .. } => source_uri.clone(),
        };
        let gate = self.gates.lock().unwrap().remove(&key);
        match gate {
            Some(rx) => rx
                .await
                .unwrap_or_else(|_| Err(ClientError::Network("gate dropped".to_string()))),
            None => Err(ClientError::Network(format!("no gate for {}", key))),
        }
    }
}

fn verdict(explanation: &str) -> DetectionResult {
    DetectionResult {
        is_toxic: false,
        categories: vec![],
        confidence: 0.5,
        severity: 0.1,
        explanation: explanation.to_string(),
    }
}

async fn let_tasks_run() {
    for _ in 0..10 {
        tokio::task::yield_now().await;
    }
}

#[tokio::test]
async fn newer_submission_wins_when_it_resolves_first() {
    let service = Arc::new(GatedService::default());
    let first = service.gate("first");
    let second = service.gate("second");
    let mut workflow = SubmissionWorkflow::text(Arc::clone(&service));

    workflow.submit("first");
    let_tasks_run().await;
    workflow.submit("second");

    let _ = second.send(Ok(verdict("second")));
    let state = workflow.settled().await;
    assert_eq!(state.result().map(|r| r.explanation.as_str()), Some("second"));

    // The superseded call finishing late must not overwrite the state.
    let _ = first.send(Ok(verdict("first")));
    let_tasks_run().await;
    assert_eq!(workflow.current_state(), state);
}

#[tokio::test]
async fn stale_outcome_does_not_settle_newer_pending_submission() {
    let service = Arc::new(GatedService::default());
    let first = service.gate("first");
    let second = service.gate("second");
    let mut workflow = SubmissionWorkflow::text(Arc::clone(&service));

    workflow.submit("first");
    let_tasks_run().await;
    workflow.submit("second");

    let _ = first.send(Ok(verdict("first")));
    let_tasks_run().await;
    match workflow.current_state() {
        WorkflowState::Pending { request } => assert_eq!(
            request,
            DetectionRequest::Text {
                content: "second".to_string(),
                language: "en".to_string()
            }
        ),
        other => panic!("expected Pending for second submission, got {:?}", other),
    }

    let _ = second.send(Err(ClientError::ServiceRejected {
        status: 503,
        message: String::new(),
    }));
    let state = workflow.settled().await;
    assert!(matches!(
        state.failure(),
        Some(FailureReason::Client(ClientError::ServiceRejected { status: 503, .. }))
    ));
}

#[tokio::test]
async fn invalid_submission_supersedes_pending_call() {
    let service = Arc::new(GatedService::default());
    let first = service.gate("first");
    let mut workflow = SubmissionWorkflow::text(Arc::clone(&service));

    workflow.submit("first");
    let_tasks_run().await;
    workflow.submit("  ");

    let _ = first.send(Ok(verdict("first")));
    let_tasks_run().await;
    assert_eq!(
        workflow.current_state(),
        WorkflowState::Failed {
            reason: FailureReason::Validation(ValidationError::EmptyInput)
        }
    );
}

#[tokio::test]
async fn subscriber_observes_pending_then_success() {
    let service = Arc::new(GatedService::default());
    let gate = service.gate("hello");
    let mut workflow = SubmissionWorkflow::text(Arc::clone(&service));
    let mut rx = workflow.subscribe();

    workflow.submit("hello");
    rx.changed().await.unwrap();
    assert!(rx.borrow_and_update().is_pending());

    let _ = gate.send(Ok(verdict("done")));
    rx.changed().await.unwrap();
    assert_eq!(
        rx.borrow_and_update().result().map(|r| r.explanation.clone()),
        Some("done".to_string())
    );
}

/// Service whose "first" call parks its worker thread mid-poll, so aborting
/// the task cannot cancel it and its outcome still completes.
struct ParkedFirstService {
    entered: Mutex<mpsc::Sender<()>>,
    release: Mutex<mpsc::Receiver<()>>,
    first_returned: AtomicBool,
}

#[async_trait]
impl DetectionService for ParkedFirstService {
    async fn submit(&self, request: DetectionRequest) -> Result<DetectionResult, ClientError> {
        let content = match request {
            DetectionRequest::Text { content, .. } => content,
            DetectionRequest::Image { source_uri, .. } => source_uri,
        };
        if content == "first" {
            let _ = self.entered.lock().unwrap().send(());
            let _ = self.release.lock().unwrap().recv();
            self.first_returned.store(true, Ordering::SeqCst);
        }
        Ok(verdict(&content))
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn completed_stale_outcome_is_rejected_by_generation_check() {
    let (entered_tx, entered_rx) = mpsc::channel();
    let (release_tx, release_rx) = mpsc::channel();
    let service = Arc::new(ParkedFirstService {
        entered: Mutex::new(entered_tx),
        release: Mutex::new(release_rx),
        first_returned: AtomicBool::new(false),
    });
    let mut workflow = SubmissionWorkflow::text(Arc::clone(&service));

    workflow.submit("first");
    tokio::task::spawn_blocking(move || entered_rx.recv())
        .await
        .unwrap()
        .unwrap();

    workflow.submit("second");
    let state = workflow.settled().await;
    assert_eq!(state.result().map(|r| r.explanation.as_str()), Some("second"));

    let mut rx = workflow.subscribe();
    let _ = rx.borrow_and_update();
    release_tx.send(()).unwrap();

    tokio::time::timeout(Duration::from_secs(5), async {
        while !service.first_returned.load(Ordering::SeqCst) {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .unwrap();
    tokio::time::sleep(Duration::from_millis(200)).await;

    assert!(!rx.has_changed().unwrap());
    assert_eq!(
        workflow.current_state().result().map(|r| r.explanation.clone()),
        Some("second".to_string())
    );
}

struct PanickingService;

#[async_trait]
impl DetectionService for PanickingService {
    async fn submit(&self, _request: DetectionRequest) -> Result<DetectionResult, ClientError> {
        panic!("detection backend exploded");
    }
}

#[tokio::test]
async fn panicking_service_settles_as_network_failure() {
    let mut workflow = SubmissionWorkflow::text(Arc::new(PanickingService));
    workflow.submit("hello");

    let state = tokio::time::timeout(Duration::from_secs(2), workflow.settled())
        .await
        .expect("workflow stayed pending after the call panicked");
    assert!(matches!(
        state.failure(),
        Some(FailureReason::Client(ClientError::Network(_)))
    ));
}

#[tokio::test]
async fn panicking_service_still_renders_retry_prompt() {
    let outcome = tokio::time::timeout(
        Duration::from_secs(2),
        run_text_detection(Arc::new(PanickingService), "hello"),
    )
    .await
    .unwrap();

    assert!(!outcome.succeeded());
    assert_eq!(outcome.lines, vec![RETRY_PROMPT.to_string()]);
}

#[tokio::test]
async fn benign_text_end_to_end() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/detect/text"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "is_toxic": false,
            "categories": [],
            "confidence": 0.92,
            "severity": 0.01,
            "explanation": "benign"
        })))
        .mount(&server)
        .await;

    let client = Arc::new(DetectionClient::new(server.uri()));
    let outcome = run_text_detection(client, "I love this product").await;

    assert_eq!(
        outcome.state,
        WorkflowState::Succeeded {
            result: DetectionResult {
                is_toxic: false,
                categories: vec![],
                confidence: 0.92,
                severity: 0.01,
                explanation: "benign".to_string(),
            }
        }
    );
    let view = outcome.view.expect("view");
    assert_eq!(view.categories, NO_CATEGORIES);
    assert!(outcome.lines.contains(&"Categories: None detected".to_string()));
    assert!(outcome.lines.contains(&"Confidence: 92.00%".to_string()));
}

#[tokio::test]
async fn dashed_words_reach_the_service_verbatim() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/detect/text"))
        .and(body_json(json!({ "text": "I --really hate you", "language": "en" })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "is_toxic": true,
            "categories": ["hate"],
            "confidence": 0.8,
            "severity": 0.6
        })))
        .expect(1)
        .mount(&server)
        .await;

    let cli = Cli::try_parse_from(["toxiscope", "text", "I", "--really", "hate", "you"]).unwrap();
    let content = cli.command.text_content().unwrap();
    let client = Arc::new(DetectionClient::new(server.uri()));
    let outcome = run_text_detection(client, &content).await;

    assert!(outcome.succeeded());
    assert!(outcome.state.result().unwrap().is_toxic);
}

#[tokio::test]
async fn server_error_end_to_end_fails_with_status() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/detect/text"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;

    let client = Arc::new(DetectionClient::new(server.uri()));
    let outcome = run_text_detection(client, "hello").await;

    assert!(matches!(
        outcome.state.failure(),
        Some(FailureReason::Client(ClientError::ServiceRejected { status: 500, .. }))
    ));
    assert!(!outcome.succeeded());
    assert_eq!(outcome.lines, vec![RETRY_PROMPT.to_string()]);
}

#[tokio::test]
async fn empty_text_never_reaches_service() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let client = Arc::new(DetectionClient::new(server.uri()));
    let outcome = run_text_detection(client, " \n ").await;
    assert_eq!(
        outcome.state.failure(),
        Some(&FailureReason::Validation(ValidationError::EmptyInput))
    );
}

#[tokio::test]
async fn image_verdict_survives_unloadable_preview() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/detect/image"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "is_toxic": false,
            "categories": [],
            "confidence": 0.8,
            "severity": 0.05,
            "explanation": "No toxic content detected in the image."
        })))
        .mount(&server)
        .await;

    let client = Arc::new(DetectionClient::new(server.uri()));
    let loader = PreviewLoader::new(Duration::from_secs(2));
    let outcome = run_image_detection(client, Some(&loader), "https://x.test/a.jpg").await;

    assert!(outcome.succeeded());
    assert!(matches!(outcome.state, WorkflowState::Succeeded { .. }));
    assert!(outcome.preview_error.is_some());
    assert!(outcome.lines.contains(&PREVIEW_ERROR_PROMPT.to_string()));
}

#[tokio::test]
async fn image_preview_rejects_non_image_resource() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/detect/image"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "is_toxic": true,
            "categories": ["violence"],
            "confidence": 0.7,
            "severity": 0.6,
            "explanation": "Violence detected with 70.00% confidence"
        })))
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/page.html"))
        .respond_with(ResponseTemplate::new(200).set_body_raw("<html></html>", "text/html"))
        .mount(&server)
        .await;

    let client = Arc::new(DetectionClient::new(server.uri()));
    let loader = PreviewLoader::default();
    let url = format!("{}/page.html", server.uri());
    let outcome = run_image_detection(client, Some(&loader), &url).await;

    assert_eq!(outcome.state.result().map(|r| r.categories.clone()), Some(vec!["violence".to_string()]));
    assert!(matches!(outcome.preview_error, Some(PreviewLoadError::NotAnImage(_))));
}

#[tokio::test]
async fn image_preview_ok_records_no_error() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/detect/image"))
        .respond_with(ResponseTemplate::new(502))
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/a.jpg"))
        .respond_with(ResponseTemplate::new(200).set_body_raw(vec![0xFFu8, 0xD8, 0xFF, 0xE0], "image/jpeg"))
        .mount(&server)
        .await;

    let client = Arc::new(DetectionClient::new(server.uri()));
    let loader = PreviewLoader::default();
    let url = format!("{}/a.jpg", server.uri());
    let outcome = run_image_detection(client, Some(&loader), &url).await;

    // Detection failed while the preview rendered: the two are reported independently.
    assert!(matches!(
        outcome.state.failure(),
        Some(FailureReason::Client(ClientError::ServiceRejected { status: 502, .. }))
    ));
    assert!(outcome.preview_error.is_none());
}
