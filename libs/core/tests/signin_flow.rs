use std::sync::Arc;
use std::time::Duration;

use botline_core::activity::INVOKE_RESPONSE_TYPE;
use botline_core::connection::TokenResult;
use botline_core::error::AuthError;
use botline_core::manager::AuthManager;
use botline_core::response::{SignInReason, SignInStatus};
use botline_core::state::TurnState;
use botline_core::tracker::{DuplicateExchangePolicy, ExchangeTracker};

#[path = "signin_support.rs"]
mod support;

use support::{
    CountingHooks, Scripted, ScriptedConnection, exchange_invoke, message_activity, turn,
    verify_invoke,
};

fn manager_with(connection: Arc<ScriptedConnection>) -> AuthManager {
    let manager = AuthManager::new().with_default_connection("graph");
    manager.set("graph", connection);
    manager
}

#[tokio::test]
async fn silent_token_short_circuits_without_entering_a_flow() {
    let hooks = Arc::new(CountingHooks::default());
    let connection = Arc::new(
        ScriptedConnection::new()
            .with_get_token("cached-token")
            .with_hooks(hooks.clone()),
    );
    let manager = manager_with(connection.clone());
    let (ctx, _sender) = turn(message_activity("user-1", "conv-1"));
    let mut state = TurnState::new();

    let response = manager.sign_in(&ctx, &mut state, None).await.unwrap();

    assert_eq!(response.status, SignInStatus::Complete);
    assert_eq!(
        state.temp.auth_tokens.get("graph").map(String::as_str),
        Some("cached-token")
    );
    assert_eq!(connection.counts.sign_in.load(std::sync::atomic::Ordering::SeqCst), 0);
    assert_eq!(connection.counts.exchanges(), 0);
    // the attempt never entered the interactive machinery
    assert_eq!(hooks.success_count(), 0);
}

#[tokio::test]
async fn unknown_connection_is_a_loud_error() {
    let manager = AuthManager::new();
    let (ctx, _sender) = turn(message_activity("user-1", "conv-1"));
    let mut state = TurnState::new();

    let err = manager
        .sign_in(&ctx, &mut state, Some("missing"))
        .await
        .unwrap_err();
    assert!(matches!(err, AuthError::UnknownConnection(name) if name == "missing"));
}

#[tokio::test]
async fn missing_key_without_default_is_a_loud_error() {
    let manager = AuthManager::new();
    let (ctx, _sender) = turn(message_activity("user-1", "conv-1"));
    let mut state = TurnState::new();

    let err = manager.sign_in(&ctx, &mut state, None).await.unwrap_err();
    assert!(matches!(err, AuthError::MissingConnectionKey));
}

#[tokio::test]
async fn exchange_success_completes_and_releases_the_key() {
    let hooks = Arc::new(CountingHooks::default());
    let connection = Arc::new(
        ScriptedConnection::new()
            .with_exchange(Scripted::Yield(TokenResult::new("exchanged-token")))
            .with_hooks(hooks.clone()),
    );
    let manager = manager_with(connection.clone());
    let mut state = TurnState::new();

    let (ctx, _sender) = turn(exchange_invoke("user-1", "conv-1", "req-1"));
    let response = manager.sign_in(&ctx, &mut state, None).await.unwrap();

    assert_eq!(response.status, SignInStatus::Complete);
    assert_eq!(
        state.temp.auth_tokens.get("graph").map(String::as_str),
        Some("exchanged-token")
    );
    assert_eq!(hooks.success_count(), 1);

    // the key was released, so a fresh delivery reaches the provider again
    let (ctx, _sender) = turn(exchange_invoke("user-1", "conv-1", "req-2"));
    let mut fresh = TurnState::new();
    manager.sign_in(&ctx, &mut fresh, None).await.unwrap();
    assert_eq!(connection.counts.exchanges(), 2);
}

#[tokio::test]
async fn consent_required_answers_412_exactly_once_and_stays_tracked() {
    let connection = Arc::new(ScriptedConnection::new());
    let manager = manager_with(connection.clone());

    let (ctx, sender) = turn(exchange_invoke("user-1", "conv-1", "req-1"));
    let mut state = TurnState::new();
    let response = manager.sign_in(&ctx, &mut state, None).await.unwrap();

    assert_eq!(response.status, SignInStatus::Pending);
    let sent = sender.sent();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].r#type, INVOKE_RESPONSE_TYPE);
    assert_eq!(sent[0].value.as_ref().unwrap()["status"], 412);

    // a re-delivery keeps deduplicating against the original attempt:
    // pending again, no provider call, no second 412
    let (ctx, sender) = turn(exchange_invoke("user-1", "conv-1", "req-1"));
    let mut state = TurnState::new();
    let response = manager.sign_in(&ctx, &mut state, None).await.unwrap();

    assert_eq!(response.status, SignInStatus::Pending);
    assert_eq!(connection.counts.exchanges(), 1);
    assert!(sender.sent().is_empty());
}

#[tokio::test]
async fn concurrent_exchange_deliveries_reach_the_provider_once() {
    let connection = Arc::new(
        ScriptedConnection::new()
            .with_exchange(Scripted::Yield(TokenResult::new("exchanged-token")))
            .with_exchange_delay(Duration::from_millis(50)),
    );
    let manager = Arc::new(manager_with(connection.clone()));

    let first = {
        let manager = manager.clone();
        tokio::spawn(async move {
            let (ctx, _sender) = turn(exchange_invoke("user-1", "conv-1", "req-1"));
            let mut state = TurnState::new();
            manager.sign_in(&ctx, &mut state, None).await.unwrap()
        })
    };
    // let the first delivery claim the key and suspend inside the provider
    tokio::time::sleep(Duration::from_millis(10)).await;

    let (ctx, _sender) = turn(exchange_invoke("user-1", "conv-1", "req-1"));
    let mut state = TurnState::new();
    let second = manager.sign_in(&ctx, &mut state, None).await.unwrap();

    assert_eq!(second.status, SignInStatus::Pending);
    assert_eq!(first.await.unwrap().status, SignInStatus::Complete);
    assert_eq!(connection.counts.exchanges(), 1);
}

#[tokio::test]
async fn provider_failure_is_captured_with_the_failure_hook() {
    let hooks = Arc::new(CountingHooks::default());
    let connection = Arc::new(
        ScriptedConnection::new()
            .with_exchange(Scripted::Fail("exchange rejected".into()))
            .with_hooks(hooks.clone()),
    );
    let manager = manager_with(connection);

    let (ctx, _sender) = turn(exchange_invoke("user-1", "conv-1", "req-1"));
    let mut state = TurnState::new();
    let response = manager.sign_in(&ctx, &mut state, None).await.unwrap();

    assert_eq!(response.status, SignInStatus::Error);
    assert_eq!(response.reason, Some(SignInReason::Other));
    assert_eq!(response.message.as_deref(), Some("exchange rejected"));
    assert_eq!(hooks.failure_count(), 1);
    assert_eq!(hooks.success_count(), 0);
    let captured = hooks.last_failure.lock().unwrap().clone().unwrap();
    assert_eq!(captured, response);
}

#[tokio::test]
async fn exchange_invoke_without_request_id_is_captured_as_error() {
    let connection = Arc::new(ScriptedConnection::new());
    let manager = manager_with(connection.clone());

    let mut activity = exchange_invoke("user-1", "conv-1", "req-1");
    activity.value = Some(serde_json::json!({"token": "client-assertion"}));
    let (ctx, _sender) = turn(activity);
    let mut state = TurnState::new();
    let response = manager.sign_in(&ctx, &mut state, None).await.unwrap();

    assert_eq!(response.status, SignInStatus::Error);
    assert_eq!(connection.counts.exchanges(), 0);
}

#[tokio::test]
async fn verify_state_adopts_the_token() {
    let hooks = Arc::new(CountingHooks::default());
    let connection = Arc::new(
        ScriptedConnection::new()
            .with_verify(Scripted::Yield(TokenResult::new("verified-token")))
            .with_hooks(hooks.clone()),
    );
    let manager = manager_with(connection);

    let (ctx, _sender) = turn(verify_invoke("user-1", "conv-1", "123456"));
    let mut state = TurnState::new();
    let response = manager.sign_in(&ctx, &mut state, None).await.unwrap();

    assert_eq!(response.status, SignInStatus::Complete);
    assert_eq!(
        state.temp.auth_tokens.get("graph").map(String::as_str),
        Some("verified-token")
    );
    assert_eq!(hooks.success_count(), 1);
}

#[tokio::test]
async fn verify_state_without_token_stays_pending() {
    let connection = Arc::new(ScriptedConnection::new());
    let manager = manager_with(connection);

    let (ctx, _sender) = turn(verify_invoke("user-1", "conv-1", "123456"));
    let mut state = TurnState::new();
    let response = manager.sign_in(&ctx, &mut state, None).await.unwrap();

    assert_eq!(response.status, SignInStatus::Pending);
    assert!(state.temp.auth_tokens.is_empty());
}

#[tokio::test]
async fn interactive_sign_in_completes_synchronously_when_possible() {
    let hooks = Arc::new(CountingHooks::default());
    let connection = Arc::new(
        ScriptedConnection::new()
            .with_sign_in(Scripted::Yield("interactive-token".into()))
            .with_hooks(hooks.clone()),
    );
    let manager = manager_with(connection);

    let (ctx, _sender) = turn(message_activity("user-1", "conv-1"));
    let mut state = TurnState::new();
    let response = manager.sign_in(&ctx, &mut state, None).await.unwrap();

    assert_eq!(response.status, SignInStatus::Complete);
    assert_eq!(hooks.success_count(), 1);
}

#[tokio::test]
async fn interactive_sign_in_stays_pending_until_the_flow_finishes() {
    let connection = Arc::new(ScriptedConnection::new());
    let manager = manager_with(connection.clone());

    let (ctx, _sender) = turn(message_activity("user-1", "conv-1"));
    let mut state = TurnState::new();
    let response = manager.sign_in(&ctx, &mut state, None).await.unwrap();

    assert_eq!(response.status, SignInStatus::Pending);
    assert_eq!(connection.counts.sign_in.load(std::sync::atomic::Ordering::SeqCst), 1);
}

#[tokio::test]
async fn get_token_failures_propagate_to_the_caller() {
    let connection =
        Arc::new(ScriptedConnection::new().with_get_token_failure("token service unreachable"));
    let manager = manager_with(connection);

    let (ctx, _sender) = turn(message_activity("user-1", "conv-1"));
    let mut state = TurnState::new();
    let err = manager.sign_in(&ctx, &mut state, None).await.unwrap_err();

    assert!(matches!(err, AuthError::Connection(_)));
    assert!(state.temp.auth_tokens.is_empty());
}

#[tokio::test]
async fn sign_out_only_delegates() {
    let connection = Arc::new(ScriptedConnection::new());
    let manager = manager_with(connection.clone());

    // leave a pending exchange tracked and a token in the turn state
    let (ctx, _sender) = turn(exchange_invoke("user-1", "conv-1", "req-1"));
    let mut state = TurnState::new();
    manager.sign_in(&ctx, &mut state, None).await.unwrap();
    state
        .temp
        .auth_tokens
        .insert("graph".into(), "token-1".into());

    let (ctx, _sender) = turn(message_activity("user-1", "conv-1"));
    manager.sign_out(&ctx, &mut state, None).await.unwrap();
    manager.sign_out(&ctx, &mut state, None).await.unwrap();

    assert_eq!(
        connection.counts.sign_out.load(std::sync::atomic::Ordering::SeqCst),
        2
    );
    // token map untouched
    assert_eq!(
        state.temp.auth_tokens.get("graph").map(String::as_str),
        Some("token-1")
    );
    // tracker untouched: the pending exchange still deduplicates
    let (ctx, _sender) = turn(exchange_invoke("user-1", "conv-1", "req-1"));
    let mut fresh = TurnState::new();
    let response = manager.sign_in(&ctx, &mut fresh, None).await.unwrap();
    assert_eq!(response.status, SignInStatus::Pending);
    assert_eq!(connection.counts.exchanges(), 1);
}

#[tokio::test]
async fn clear_and_retry_policy_lets_a_second_delivery_reach_the_provider() {
    let connection = Arc::new(ScriptedConnection::new());
    let manager = AuthManager::new()
        .with_default_connection("graph")
        .with_tracker(ExchangeTracker::new().with_policy(DuplicateExchangePolicy::ClearAndRetry));
    manager.set("graph", connection.clone());

    // first delivery ends in consent-required, entry stays tracked
    let (ctx, _sender) = turn(exchange_invoke("user-1", "conv-1", "req-1"));
    let mut state = TurnState::new();
    manager.sign_in(&ctx, &mut state, None).await.unwrap();

    // the retry delivery replaces the entry and completes
    connection.set_exchange(Scripted::Yield(TokenResult::new("exchanged-token")));
    let (ctx, _sender) = turn(exchange_invoke("user-1", "conv-1", "req-2"));
    let mut state = TurnState::new();
    let response = manager.sign_in(&ctx, &mut state, None).await.unwrap();

    assert_eq!(response.status, SignInStatus::Complete);
    assert_eq!(connection.counts.exchanges(), 2);
}
