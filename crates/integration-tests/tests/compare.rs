mod harness;

use harness::config::ConfigBuilder;
use harness::mock_upstream::{MockUpstream, Reply, error_body, openai_text};
use harness::server::TestServer;
use paddock_config::Dialect;
use paddock_core::ChatTurnRequest;

#[tokio::test]
async fn panes_run_independently() {
    let fast = MockUpstream::start([Reply::Sse(openai_text(&["Paris", " is the capital."]))])
        .await
        .unwrap();
    let limited = MockUpstream::start([Reply::Status(429, error_body("quota"))]).await.unwrap();
    let config = ConfigBuilder::new()
        .with_endpoint("fast", Dialect::Openai, &fast.v1_url())
        .with_endpoint("limited", Dialect::Openai, &limited.v1_url())
        .build();

    let server = TestServer::start(config).await.unwrap();
    let requests: Vec<_> = ["fast", "limited", "missing"]
        .into_iter()
        .map(|id| ChatTurnRequest::new(id, "Capital of France?"))
        .collect();

    let panes = server.paddock().compare(&requests).await;

    let ids: Vec<_> = panes.iter().map(|p| p.endpoint_id.as_str()).collect();
    assert_eq!(ids, ["fast", "limited", "missing"]);

    assert_eq!(panes[0].message.answer_text, "Paris is the capital.");
    assert!(!panes[0].message.is_error);
    assert!(panes[0].metrics.time_to_first_token_ms.is_some());

    assert!(panes[1].message.is_error);
    assert!(panes[1].message.answer_text.starts_with("🚦 Rate Limit Exceeded"));

    assert!(panes[2].message.is_error);
    assert!(panes[2].message.answer_text.contains("404"));

    // Each pane gets its own session
    assert_ne!(panes[0].session_id, panes[1].session_id);
}
