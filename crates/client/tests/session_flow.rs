//! Integration tests for the session lifecycle against a mock backend.

use std::sync::Arc;

use secrecy::SecretString;
use serde_json::json;
use url::Url;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use velvet_client::storage::{MemoryStore, StateStore, keys};
use velvet_client::{ApiError, ClientContext, Config};

fn context_for(server_uri: &str, store: Arc<MemoryStore>) -> ClientContext {
    let config = Config::new(Url::parse(server_uri).expect("server uri"));
    ClientContext::with_store(config, store).expect("context")
}

fn sign_in_body(access_token: &str, refresh_token: &str) -> serde_json::Value {
    json!({
        "access_token": access_token,
        "refresh_token": refresh_token,
        "token_type": "bearer",
        "user": {
            "id": "u-1",
            "username": "ada",
            "email": "ada@example.com",
            "is_admin": false
        }
    })
}

async fn mount_sign_in(server: &MockServer) {
    Mock::given(method("POST"))
        .and(path("/users/signin"))
        .respond_with(ResponseTemplate::new(200).set_body_json(sign_in_body("t1", "r1")))
        .mount(server)
        .await;
}

#[tokio::test]
async fn sign_in_stores_and_persists_credential() {
    let server = MockServer::start().await;
    mount_sign_in(&server).await;

    let store = Arc::new(MemoryStore::new());
    let ctx = context_for(&server.uri(), Arc::clone(&store));

    let credential = ctx
        .session()
        .sign_in("ada", &SecretString::from("pw"))
        .await
        .expect("sign in");

    assert_eq!(credential.access_token, "t1");
    assert_eq!(credential.refresh_token, "r1");
    assert_eq!(credential.user.username, "ada");
    assert!(ctx.session().is_authenticated());

    // Credential persisted under its own key.
    let raw = store
        .get(keys::CREDENTIAL)
        .expect("get")
        .expect("credential stored");
    assert!(raw.contains("t1"));
}

#[tokio::test]
async fn rejected_sign_in_surfaces_server_message() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/users/signin"))
        .respond_with(
            ResponseTemplate::new(401)
                .set_body_json(json!({ "detail": "Incorrect email or password" })),
        )
        .mount(&server)
        .await;

    let ctx = context_for(&server.uri(), Arc::new(MemoryStore::new()));

    let err = ctx
        .session()
        .sign_in("ada", &SecretString::from("wrong"))
        .await
        .expect_err("should fail");

    assert!(matches!(err, ApiError::AuthRejected(_)));
    assert_eq!(err.user_message(), "Incorrect email or password");
    assert!(!ctx.session().is_authenticated());
}

#[tokio::test]
async fn concurrent_refreshes_share_one_network_call() {
    let server = MockServer::start().await;
    mount_sign_in(&server).await;
    Mock::given(method("POST"))
        .and(path("/users/refresh"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!({ "access_token": "t2" })),
        )
        .expect(1)
        .mount(&server)
        .await;

    let ctx = context_for(&server.uri(), Arc::new(MemoryStore::new()));
    ctx.session()
        .sign_in("ada", &SecretString::from("pw"))
        .await
        .expect("sign in");

    let (a, b) = tokio::join!(ctx.session().refresh(), ctx.session().refresh());

    let a = a.expect("first refresh");
    let b = b.expect("second refresh");
    assert_eq!(a.access_token, "t2");
    assert_eq!(b.access_token, "t2");
    // Refresh token kept when the server does not reissue one.
    assert_eq!(a.refresh_token, "r1");

    server.verify().await;
}

#[tokio::test]
async fn rejected_refresh_forces_sign_out_and_purges_store() {
    let server = MockServer::start().await;
    mount_sign_in(&server).await;
    Mock::given(method("POST"))
        .and(path("/users/refresh"))
        .respond_with(ResponseTemplate::new(401).set_body_json(json!({ "detail": "expired" })))
        .mount(&server)
        .await;

    let store = Arc::new(MemoryStore::new());
    let ctx = context_for(&server.uri(), Arc::clone(&store));
    ctx.session()
        .sign_in("ada", &SecretString::from("pw"))
        .await
        .expect("sign in");

    let err = ctx.session().refresh().await.expect_err("should fail");

    assert!(matches!(err, ApiError::AuthRejected(_)));
    assert!(!ctx.session().is_authenticated());
    assert_eq!(store.get(keys::CREDENTIAL).expect("get"), None);
}

#[tokio::test]
async fn unreachable_refresh_keeps_session() {
    // Sign in against a live mock, then rebuild the context against a
    // port nothing listens on: the persisted credential survives a
    // refresh that never reached the server.
    let server = MockServer::start().await;
    mount_sign_in(&server).await;

    let store = Arc::new(MemoryStore::new());
    let ctx = context_for(&server.uri(), Arc::clone(&store));
    ctx.session()
        .sign_in("ada", &SecretString::from("pw"))
        .await
        .expect("sign in");

    let offline = context_for("http://127.0.0.1:1", Arc::clone(&store));
    assert!(offline.session().is_authenticated());

    let err = offline.session().refresh().await.expect_err("should fail");

    assert!(matches!(err, ApiError::Network(_)));
    assert!(offline.session().is_authenticated());
    assert!(store.get(keys::CREDENTIAL).expect("get").is_some());
}

#[tokio::test]
async fn call_rejected_with_401_is_replayed_once_after_refresh() {
    let server = MockServer::start().await;
    mount_sign_in(&server).await;

    // First cart fetch is rejected; after the transparent refresh the
    // replay succeeds. Mount order matters: the one-shot 401 wins until
    // it is exhausted.
    Mock::given(method("GET"))
        .and(path("/cart/"))
        .respond_with(ResponseTemplate::new(401))
        .up_to_n_times(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/cart/"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "items": [
                { "product_id": "A", "name": "Tee", "price": "19.99", "quantity": 2 }
            ]
        })))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/users/refresh"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!({ "access_token": "t2" })),
        )
        .expect(1)
        .mount(&server)
        .await;

    let ctx = context_for(&server.uri(), Arc::new(MemoryStore::new()));
    ctx.session()
        .sign_in("ada", &SecretString::from("pw"))
        .await
        .expect("sign in");

    // The caller sees success transparently.
    let cart = ctx.cart().fetch().await.expect("fetch succeeds via replay");
    assert_eq!(cart.lines.len(), 1);

    // The session now carries the refreshed token.
    let credential = ctx.session().credential().expect("credential");
    assert_eq!(credential.access_token, "t2");

    server.verify().await;
}

#[tokio::test]
async fn replay_failure_surfaces_original_error_kind() {
    let server = MockServer::start().await;
    mount_sign_in(&server).await;

    // Every cart fetch is rejected; refresh succeeds, the single replay
    // fails again, and no further retry happens (three fetches would
    // violate the expectation).
    Mock::given(method("GET"))
        .and(path("/cart/"))
        .respond_with(ResponseTemplate::new(401))
        .expect(2)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/users/refresh"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!({ "access_token": "t2" })),
        )
        .mount(&server)
        .await;

    let ctx = context_for(&server.uri(), Arc::new(MemoryStore::new()));
    ctx.session()
        .sign_in("ada", &SecretString::from("pw"))
        .await
        .expect("sign in");

    let err = ctx.cart().fetch().await.expect_err("replay also fails");
    assert!(matches!(err, ApiError::AuthRejected(_)));

    server.verify().await;
}

#[tokio::test]
async fn sign_out_clears_credential_and_cart() {
    let server = MockServer::start().await;
    mount_sign_in(&server).await;
    Mock::given(method("GET"))
        .and(path("/cart/"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "items": [
                { "product_id": "A", "name": "Tee", "price": "19.99", "quantity": 1 }
            ]
        })))
        .mount(&server)
        .await;

    let store = Arc::new(MemoryStore::new());
    let ctx = context_for(&server.uri(), Arc::clone(&store));
    ctx.session()
        .sign_in("ada", &SecretString::from("pw"))
        .await
        .expect("sign in");
    ctx.cart().fetch().await.expect("fetch");
    assert_eq!(ctx.cart().snapshot().lines.len(), 1);

    ctx.sign_out();

    assert!(!ctx.session().is_authenticated());
    assert!(ctx.cart().snapshot().lines.is_empty());
    assert_eq!(store.get(keys::CREDENTIAL).expect("get"), None);
    assert_eq!(store.get(keys::CART_LINES).expect("get"), None);
}
