//! Arcade provider against a mock Arcade API

mod common;

use std::sync::Arc;
use std::time::Duration;

use common::{config, EventLog, Operator};
use serde_json::json;
use toolgate_arcade_sdk::{Arcade, RetryConfig};
use toolgate_core::{
    ArcadeProvider, Gateway, GrantChallenge, GrantStatus, NotExecutedReason, ProviderError,
    ToolCall, ToolCallOutcome, ToolError, ToolProvider, ToolQuery, ToolResult, UserId,
};
use wiremock::matchers::{body_json, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn provider_for(server: &MockServer) -> ArcadeProvider {
    let client = Arcade::builder()
        .api_key("test-key")
        .api_base(server.uri())
        .retry_config(RetryConfig {
            max_retries: 1,
            base_delay: Duration::from_millis(1),
            max_delay: Duration::from_millis(5),
            jitter: 0.0,
        })
        .build()
        .unwrap();
    ArcadeProvider::new(client).with_status_wait(None)
}

fn news_toolkit() -> serde_json::Value {
    json!({
        "items": [
            {
                "name": "SearchNewsStories",
                "description": "Search news stories",
                "toolkit": {"name": "GoogleNews"},
                "input": {"parameters": [{
                    "name": "keywords",
                    "required": true,
                    "value_schema": {"val_type": "string"}
                }]},
                "requirements": {"authorization": {"provider_id": "google"}}
            },
            {
                "name": "TrendingTopics",
                "description": "Trending topics",
                "toolkit": {"name": "GoogleNews"},
                "input": {"parameters": []}
            }
        ]
    })
}

async fn mount_toolkit(server: &MockServer) {
    Mock::given(method("GET"))
        .and(path("/v1/tools"))
        .and(query_param("toolkit", "GoogleNews"))
        .respond_with(ResponseTemplate::new(200).set_body_json(news_toolkit()))
        .mount(server)
        .await;
}

fn query(toolkits: &[&str], tools: &[&str]) -> ToolQuery {
    ToolQuery {
        toolkits: toolkits.iter().map(|s| s.to_string()).collect(),
        tools: tools.iter().map(|s| s.to_string()).collect(),
        limit: 30,
    }
}

#[tokio::test]
async fn test_list_whole_toolkit() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/v1/tools"))
        .and(query_param("toolkit", "GoogleNews"))
        .and(query_param("limit", "30"))
        .respond_with(ResponseTemplate::new(200).set_body_json(news_toolkit()))
        .expect(1)
        .mount(&server)
        .await;

    let specs = provider_for(&server)
        .list_tools(&query(&["GoogleNews"], &[]))
        .await
        .unwrap();

    assert_eq!(specs.len(), 2);
    let search = &specs[0];
    assert_eq!(search.name, "GoogleNews_SearchNewsStories");
    assert_eq!(search.provider_name, "GoogleNews.SearchNewsStories");
    assert_eq!(search.toolkit.as_deref(), Some("GoogleNews"));
    assert!(search.requires_authorization);
    assert_eq!(search.input_schema["required"], json!(["keywords"]));
    assert!(search.sensitivity.is_none());
    assert!(!specs[1].requires_authorization);
}

#[tokio::test]
async fn test_list_individual_tools() {
    let server = MockServer::start().await;
    mount_toolkit(&server).await;

    let specs = provider_for(&server)
        .list_tools(&query(&[], &["GoogleNews.TrendingTopics"]))
        .await
        .unwrap();

    let names: Vec<_> = specs.iter().map(|s| s.name.as_str()).collect();
    assert_eq!(names, vec!["GoogleNews_TrendingTopics"]);
}

#[tokio::test]
async fn test_list_maps_authentication_errors() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/v1/tools"))
        .respond_with(
            ResponseTemplate::new(401).set_body_json(json!({"message": "invalid api key"})),
        )
        .mount(&server)
        .await;

    let err = provider_for(&server)
        .list_tools(&query(&["GoogleNews"], &[]))
        .await
        .unwrap_err();

    assert!(matches!(err, ProviderError::Authentication(_)));
}

#[tokio::test]
async fn test_start_and_poll_authorization() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/tools/authorize"))
        .and(body_json(json!({
            "tool_name": "GoogleNews.SearchNewsStories",
            "user_id": "u1"
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "id": "ac_1",
            "status": "pending",
            "url": "https://accounts.example.com/o/oauth2/auth?state=ac_1"
        })))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/v1/auth/status"))
        .and(query_param("id", "ac_1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "id": "ac_1",
            "status": "completed"
        })))
        .expect(1)
        .mount(&server)
        .await;

    let provider = provider_for(&server);
    let user = UserId::new("u1");

    let challenge = provider
        .start_authorization(&user, "GoogleNews.SearchNewsStories")
        .await
        .unwrap();
    assert_eq!(challenge.status, GrantStatus::Pending);
    assert_eq!(challenge.id.as_deref(), Some("ac_1"));
    assert!(challenge.url.as_deref().unwrap().contains("state=ac_1"));

    let status = provider
        .poll_authorization_status(&user, &challenge)
        .await
        .unwrap();
    assert_eq!(status, GrantStatus::Complete);
}

#[tokio::test]
async fn test_poll_without_id_is_invalid_response() {
    let server = MockServer::start().await;
    let challenge = GrantChallenge {
        id: None,
        tool_name: "GoogleNews.SearchNewsStories".into(),
        url: Some("https://accounts.example.com".into()),
        status: GrantStatus::Pending,
    };

    let err = provider_for(&server)
        .poll_authorization_status(&UserId::new("u1"), &challenge)
        .await
        .unwrap_err();

    assert!(matches!(err, ProviderError::InvalidResponse(_)));
}

#[tokio::test]
async fn test_invoke_returns_value() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/tools/execute"))
        .and(body_json(json!({
            "tool_name": "GoogleNews.SearchNewsStories",
            "input": {"keywords": "rust"},
            "user_id": "u1"
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "success": true,
            "output": {"value": {"news_results": [{"title": "Rust 2.0"}]}}
        })))
        .mount(&server)
        .await;

    let result = provider_for(&server)
        .invoke_tool_body(
            &UserId::new("u1"),
            "GoogleNews.SearchNewsStories",
            json!({"keywords": "rust"}),
        )
        .await
        .unwrap();

    assert_eq!(
        result,
        ToolResult::Json(json!({"news_results": [{"title": "Rust 2.0"}]}))
    );
}

#[tokio::test]
async fn test_invoke_reports_tool_error() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/tools/execute"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "success": false,
            "output": {"error": {"message": "quota exceeded", "can_retry": false}}
        })))
        .mount(&server)
        .await;

    let err = provider_for(&server)
        .invoke_tool_body(&UserId::new("u1"), "GoogleNews.SearchNewsStories", json!({}))
        .await
        .unwrap_err();

    assert!(matches!(err, ToolError::Custom(ref msg) if msg == "quota exceeded"));
}

#[tokio::test]
async fn test_invoke_sends_one_request_after_server_error() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/tools/execute"))
        .respond_with(ResponseTemplate::new(502))
        .up_to_n_times(1)
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/v1/tools/execute"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "success": true,
            "output": {"value": "sent"}
        })))
        .expect(0)
        .mount(&server)
        .await;

    let result = provider_for(&server)
        .invoke_tool_body(
            &UserId::new("u1"),
            "Gmail.SendEmail",
            json!({"to": "someone@example.com"}),
        )
        .await;

    assert!(matches!(
        result,
        Err(ToolError::Provider(ProviderError::ServiceUnavailable(_)))
    ));
    let executed = server
        .received_requests()
        .await
        .unwrap()
        .iter()
        .filter(|request| request.url.path() == "/v1/tools/execute")
        .count();
    assert_eq!(executed, 1);
}

#[tokio::test]
async fn test_gateway_over_arcade() {
    let server = MockServer::start().await;
    mount_toolkit(&server).await;
    Mock::given(method("POST"))
        .and(path("/v1/tools/authorize"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "id": "ac_1",
            "status": "pending",
            "url": "https://accounts.example.com/grant"
        })))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/v1/auth/status"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "id": "ac_1",
            "status": "completed"
        })))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/v1/tools/execute"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "success": true,
            "output": {"value": "3 stories found"}
        })))
        .expect(1)
        .mount(&server)
        .await;

    let operator = Arc::new(Operator::replying(["y", "n"]));
    let events = EventLog::default();
    let gateway = Gateway::builder()
        .provider(provider_for(&server))
        .shared_prompter(operator.clone())
        .config(config(10, 5))
        .with_hook(events.clone())
        .build()
        .await
        .unwrap();
    let runtime = gateway.runtime();

    let approved = runtime
        .dispatch(ToolCall::new(
            "call_1",
            "GoogleNews_SearchNewsStories",
            json!({"keywords": "rust"}),
        ))
        .await;
    let denied = runtime
        .dispatch(ToolCall::new(
            "call_2",
            "GoogleNews_SearchNewsStories",
            json!({"keywords": "go"}),
        ))
        .await;

    match approved {
        ToolCallOutcome::Completed { result, .. } => {
            assert_eq!(result, ToolResult::text("3 stories found"))
        }
        other => panic!("expected completion, got {:?}", other),
    }
    assert!(matches!(
        denied.not_executed().map(|n| &n.reason),
        Some(NotExecutedReason::Denied(_))
    ));
    assert_eq!(events.count("auth_required:"), 1);
    assert_eq!(operator.asked().len(), 2);
}
