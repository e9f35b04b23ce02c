mod common;

use anyhow::Result;
use reqwest::StatusCode;
use serde_json::{json, Value};

#[tokio::test]
async fn health_endpoint_responds() -> Result<()> {
    let server = common::ensure_server().await?;
    let client = reqwest::Client::new();

    let res = client.get(server.url("/health")).send().await?;
    assert_eq!(res.status(), StatusCode::OK);

    let body = res.json::<Value>().await?;
    assert_eq!(body["success"], true);
    assert_eq!(body["data"]["store"], "memory");
    Ok(())
}

#[tokio::test]
async fn duplicate_registration_is_a_conflict() -> Result<()> {
    let server = common::ensure_server().await?;
    let client = reqwest::Client::new();
    let email = common::unique_email("alice");

    let payload = json!({ "name": "Alice", "email": email, "password": "secret1" });
    let first = client.post(server.url("/auth/register")).json(&payload).send().await?;
    assert_eq!(first.status(), StatusCode::CREATED);

    let second = client.post(server.url("/auth/register")).json(&payload).send().await?;
    assert_eq!(second.status(), StatusCode::CONFLICT);
    let body: Value = second.json().await?;
    assert_eq!(body["success"], false);
    assert_eq!(body["code"], "CONFLICT");
    Ok(())
}

#[tokio::test]
async fn login_rejects_wrong_password() -> Result<()> {
    let server = common::ensure_server().await?;
    let client = reqwest::Client::new();
    let (email, _, _) = common::register(&client, server, "bob").await?;

    let res = client
        .post(server.url("/auth/login"))
        .json(&json!({ "email": email, "password": "not-it" }))
        .send()
        .await?;
    assert_eq!(res.status(), StatusCode::UNAUTHORIZED);

    let res = client
        .post(server.url("/auth/login"))
        .json(&json!({ "email": email, "password": "secret1" }))
        .send()
        .await?;
    assert_eq!(res.status(), StatusCode::OK);
    let body: Value = res.json().await?;
    assert_eq!(body["data"]["token_type"], "Bearer");
    Ok(())
}

#[tokio::test]
async fn profile_requires_token_and_keeps_role() -> Result<()> {
    let server = common::ensure_server().await?;
    let client = reqwest::Client::new();

    let res = client.get(server.url("/auth/me")).send().await?;
    assert_eq!(res.status(), StatusCode::UNAUTHORIZED);

    let (_, token, _) = common::register(&client, server, "carol").await?;
    let res = client
        .put(server.url("/auth/profile"))
        .bearer_auth(&token)
        .json(&json!({ "nationality": "Irish", "phone": "+353 1 555 0100" }))
        .send()
        .await?;
    assert_eq!(res.status(), StatusCode::OK);
    let body: Value = res.json().await?;
    assert_eq!(body["data"]["nationality"], "Irish");
    assert_eq!(body["data"]["role"], "non-subscriber");

    // role is not an editable profile field
    let res = client
        .put(server.url("/auth/profile"))
        .bearer_auth(&token)
        .json(&json!({ "role": "admin" }))
        .send()
        .await?;
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);
    Ok(())
}
