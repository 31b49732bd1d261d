use crate::helpers::{spawn_app, TestApp};
use weather_subscriptions::domain::TokenKind;

/// Subscribes, confirms and returns the unsubscribe link from the second email.
async fn confirmed_subscriber(app: &TestApp) -> reqwest::Url {
    let confirmation_link = app.subscribe_and_get_confirmation_link().await;
    let response = app.api_client.get(confirmation_link).send().await.unwrap();
    assert_eq!(response.status().as_u16(), 200);
    let emails = app.email_client.sent();
    app.get_link(&emails[1])
}

#[tokio::test]
async fn the_unsubscribe_link_removes_the_subscription() {
    // arrange
    let app = spawn_app().await;
    let unsubscribe_link = confirmed_subscriber(&app).await;

    // act
    let response = app.api_client.get(unsubscribe_link).send().await.unwrap();

    // assert
    assert_eq!(response.status().as_u16(), 200);
    let body: serde_json::Value = response.json().await.unwrap();
    assert_eq!(body["message"], "Unsubscribed successfully");
    assert!(app.store.subscriptions().is_empty());
    assert!(app.store.tokens().is_empty());
}

#[tokio::test]
async fn an_unsubscribe_link_only_works_once() {
    // arrange
    let app = spawn_app().await;
    let unsubscribe_link = confirmed_subscriber(&app).await;
    app.api_client.get(unsubscribe_link.clone()).send().await.unwrap();

    // act
    let response = app.api_client.get(unsubscribe_link).send().await.unwrap();

    // assert
    assert_eq!(response.status().as_u16(), 404);
    let body: serde_json::Value = response.json().await.unwrap();
    assert_eq!(body["message"], "Token not found");
}

#[tokio::test]
async fn unsubscribing_after_the_subscription_is_gone_only_drops_the_token() {
    // arrange
    let app = spawn_app().await;
    let unsubscribe_link = confirmed_subscriber(&app).await;
    let subscription_id = app.store.subscriptions()[0].id;
    app.store.remove_subscription_only(subscription_id);

    // act
    let response = app.api_client.get(unsubscribe_link).send().await.unwrap();

    // assert
    assert_eq!(response.status().as_u16(), 200);
    let body: serde_json::Value = response.json().await.unwrap();
    assert_eq!(body["message"], "Subscription already removed or not found");
    assert!(app.store.tokens().is_empty());
}

#[tokio::test]
async fn a_confirmation_token_cannot_unsubscribe() {
    // arrange
    let app = spawn_app().await;
    app.subscribe_and_get_confirmation_link().await;
    let confirmation_token = app.store.tokens_of_kind(TokenKind::Confirmation)[0].value.clone();

    // act
    let response = app.get_unsubscribe(&confirmation_token).await;

    // assert
    assert_eq!(response.status().as_u16(), 400);
    let body: serde_json::Value = response.json().await.unwrap();
    assert_eq!(body["message"], "Invalid token type for unsubscribe operation");
    assert_eq!(app.store.subscriptions().len(), 1);
    assert_eq!(app.store.tokens().len(), 1);
}

#[tokio::test]
async fn malformed_and_unknown_tokens_are_rejected() {
    // arrange
    let app = spawn_app().await;

    // act
    let malformed = app.get_unsubscribe("not-a-token").await;
    let unknown = app.get_unsubscribe(&"0".repeat(64)).await;

    // assert
    assert_eq!(malformed.status().as_u16(), 400);
    let body: serde_json::Value = malformed.json().await.unwrap();
    assert_eq!(body["message"], "Invalid token format");
    assert_eq!(unknown.status().as_u16(), 404);
}

#[tokio::test]
async fn a_store_failure_during_unsubscribe_is_a_500() {
    // arrange
    let app = spawn_app().await;
    let unsubscribe_link = confirmed_subscriber(&app).await;
    app.store.fail_every_query();

    // act
    let response = app.api_client.get(unsubscribe_link).send().await.unwrap();

    // assert
    assert_eq!(response.status().as_u16(), 500);
    let body: serde_json::Value = response.json().await.unwrap();
    assert_eq!(
        body,
        serde_json::json!({ "message": "Server error during unsubscribe process" })
    );
}
