//! End-to-end flows driven through the real HTTP client against a mock
//! provider, covering the full machine → wire → machine loop.

use std::sync::Arc;
use std::time::Duration;

use pretty_assertions::assert_eq;
use serde_json::json;
use tokio_util::sync::CancellationToken;
use wiremock::matchers::{body_partial_json, body_string_contains, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use idflow::client::HttpIdentityClient;
use idflow::config::IdentityConfig;
use idflow::flow::{Credentials, FlowRequest, FlowStateMachine, FlowStatus, StepInputs};
use idflow::poll::{PollDeadline, PollPolicy};
use idflow::store::{MemoryTokenStore, TokenStore};

fn machine_for(server: &MockServer, store: Arc<MemoryTokenStore>) -> FlowStateMachine {
    let config = IdentityConfig::new(server.uri(), "client-123", "https://app.example.com/callback");
    FlowStateMachine::new(Arc::new(HttpIdentityClient::new(config)), store).with_poll_policy(
        PollPolicy {
            interval: Duration::ZERO,
            deadline: PollDeadline::MaxAttempts(5),
        },
    )
}

#[tokio::test]
async fn recover_password_over_http_end_to_end() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/idp/idx/start"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "stateHandle": "02r1"
        })))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/idp/idx/proceed"))
        .and(body_partial_json(json!({ "identifier": "a@b.com" })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "stateHandle": "02r1",
            "remediation": {
                "value": [
                    { "name": "challenge-authenticator",
                      "value": [ { "name": "verificationCode" } ] }
                ]
            }
        })))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/idp/idx/proceed"))
        .and(body_partial_json(json!({ "verificationCode": "123456" })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "stateHandle": "02r1",
            "remediation": {
                "value": [
                    { "name": "reset-authenticator",
                      "value": [ { "name": "password", "secret": true } ] }
                ]
            }
        })))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/idp/idx/proceed"))
        .and(body_partial_json(json!({ "password": "longenough1" })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "stateHandle": "02r1",
            "successWithInteractionCode": {
                "value": [ { "name": "interaction_code", "value": "int-code-1" } ]
            }
        })))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/oauth2/v1/token"))
        .and(body_string_contains("interaction_code=int-code-1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "accessToken": "access-http",
            "refreshToken": "refresh-http"
        })))
        .expect(1)
        .mount(&server)
        .await;

    let store = Arc::new(MemoryTokenStore::new());
    let machine = machine_for(&server, store.clone());

    let mut transaction = machine
        .start(FlowRequest::RecoverPassword {
            identifier: "a@b.com".to_string(),
        })
        .await
        .expect("start");
    assert!(transaction.requires("verificationCode"));

    machine
        .submit(
            &mut transaction,
            StepInputs::new().with("verificationCode", "123456"),
        )
        .await
        .expect("otp step");
    assert!(transaction.requires("password"));

    machine
        .submit(
            &mut transaction,
            StepInputs::new().with("password", "longenough1"),
        )
        .await
        .expect("new password step");

    assert_eq!(transaction.status(), FlowStatus::Success);
    assert_eq!(store.access_token().as_deref(), Some("access-http"));
    assert_eq!(store.refresh_token().as_deref(), Some("refresh-http"));
    server.verify().await;
}

#[tokio::test]
async fn email_link_login_over_http_polls_then_exchanges() {
    let server = MockServer::start().await;
    let poll_url = format!("{}/poll/email", server.uri());
    Mock::given(method("POST"))
        .and(path("/idp/idx/start"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "stateHandle": "02e1"
        })))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/idp/idx/proceed"))
        .and(body_partial_json(json!({
            "identifier": "user@example.com",
            "authenticator": "email"
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "stateHandle": "02e1",
            "currentAuthenticator": {
                "value": { "type": "email", "poll": { "href": poll_url } }
            }
        })))
        .expect(1)
        .mount(&server)
        .await;
    // first tick pending, second tick confirmed
    Mock::given(method("POST"))
        .and(path("/poll/email"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "stateHandle": "02e1"
        })))
        .up_to_n_times(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/poll/email"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "successWithInteractionCode": {
                "value": [ { "name": "interaction_code", "value": "int-code-2" } ]
            }
        })))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/oauth2/v1/token"))
        .and(body_string_contains("interaction_code=int-code-2"))
        .and(body_string_contains("code_verifier="))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "accessToken": "access-email"
        })))
        .expect(1)
        .mount(&server)
        .await;

    let store = Arc::new(MemoryTokenStore::new());
    let machine = machine_for(&server, store.clone());

    let mut transaction = machine
        .start(FlowRequest::Authenticate(Credentials::email_link(
            "user@example.com",
        )))
        .await
        .expect("start");
    assert!(transaction.pending_confirmation().is_some());

    let tokens = machine
        .confirm(&mut transaction, &CancellationToken::new())
        .await
        .expect("confirm");

    assert_eq!(tokens.access_token, "access-email");
    assert_eq!(transaction.status(), FlowStatus::Success);
    assert_eq!(store.access_token().as_deref(), Some("access-email"));
    server.verify().await;
}
