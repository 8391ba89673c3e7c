#![cfg(feature = "reqwest")]

mod common;

// std
use std::sync::Arc;
// crates.io
use bearer_client::{
	AccessToken, AuthClient, ClientConfig, Credentials, Error, MemoryTokenStore, RefreshFailure,
	RequestDescriptor, SessionEvent, TokenStore, transport::ReqwestHttpClient,
};
use httpmock::prelude::*;
// self
use common::{RecordingRedirect, record_events};

fn build_client(
	server: &MockServer,
) -> (AuthClient<ReqwestHttpClient>, Arc<MemoryTokenStore>, Arc<RecordingRedirect>) {
	let config = ClientConfig::builder(server.base_url())
		.build()
		.expect("Client configuration should build for the mock server.");
	let transport = ReqwestHttpClient::new().expect("Default reqwest client should build.");
	let store = Arc::new(MemoryTokenStore::default());
	let redirect = RecordingRedirect::at("/dashboard");
	let client = AuthClient::with_transport(config, transport, store.clone(), redirect.clone());

	(client, store, redirect)
}

#[tokio::test]
async fn session_survives_token_expiry_over_http() {
	let server = MockServer::start_async().await;
	let login = server
		.mock_async(|when, then| {
			when.method(POST)
				.path("/auth/login")
				.json_body(serde_json::json!({ "email": "ada@example.com", "password": "pw" }));
			then.status(200)
				.header("content-type", "application/json")
				.header("set-cookie", "refresh=r1; Path=/; HttpOnly")
				.body(r#"{"accessToken":"t1","user":{"id":1,"email":"ada@example.com"}}"#);
		})
		.await;
	let expired = server
		.mock_async(|when, then| {
			when.method(GET).path("/auth/me").header("authorization", "Bearer t1");
			then.status(401).body(r#"{"message":"jwt expired"}"#);
		})
		.await;
	let refresh = server
		.mock_async(|when, then| {
			when.method(POST).path("/auth/refresh-token").header("cookie", "refresh=r1");
			then.status(200)
				.header("content-type", "application/json")
				.body(r#"{"data":{"access_token":"t2"}}"#);
		})
		.await;
	let profile = server
		.mock_async(|when, then| {
			when.method(GET)
				.path("/auth/me")
				.query_param_exists("_t")
				.header("authorization", "Bearer t2");
			then.status(200)
				.header("content-type", "application/json")
				.body(r#"{"user":{"_id":"1","email":"ada@example.com","role":"admin"}}"#);
		})
		.await;
	let logout = server
		.mock_async(|when, then| {
			when.method(POST).path("/auth/logout").header("authorization", "Bearer t2");
			then.status(204);
		})
		.await;
	let (client, store, redirect) = build_client(&server);
	let events = record_events(&client);
	let session = client
		.login(&Credentials::new("ada@example.com", "pw"))
		.await
		.expect("Login should succeed against the mock server.");

	assert_eq!(session.token.expose(), "t1");

	let user = client.me().await.expect("Profile lookup should recover from the expired token.");

	assert_eq!(user.id, "1");
	assert_eq!(user.role.as_deref(), Some("admin"));
	assert_eq!(store.get().map(|token| token.expose().to_owned()), Some("t2".into()));

	client.logout().await.expect("Logout should succeed.");

	login.assert_async().await;
	expired.assert_async().await;
	refresh.assert_async().await;
	profile.assert_async().await;
	logout.assert_async().await;

	assert!(!client.is_authenticated());
	assert!(client.current_user().is_none());
	assert!(redirect.redirects().is_empty());
	assert_eq!(
		events.lock().as_slice(),
		[SessionEvent::LoggedIn, SessionEvent::TokenRefreshed, SessionEvent::LoggedOut]
	);
}

#[tokio::test]
async fn rejected_refresh_terminates_the_session_over_http() {
	let server = MockServer::start_async().await;
	let orders = server
		.mock_async(|when, then| {
			when.method(GET).path("/orders");
			then.status(401);
		})
		.await;
	let refresh = server
		.mock_async(|when, then| {
			when.method(POST).path("/auth/refresh-token");
			then.status(403).body(r#"{"message":"refresh token revoked"}"#);
		})
		.await;
	let (client, store, redirect) = build_client(&server);
	let events = record_events(&client);

	store.set(AccessToken::new("stale"));

	let result = client.send(RequestDescriptor::get("orders")).await;

	assert!(
		matches!(result, Err(Error::Refresh(RefreshFailure::Rejected { status: 403 }))),
		"Unexpected result: {result:?}."
	);

	// The session is over; a later 401 still gets one refresh but no second redirect.
	let _ = client.send(RequestDescriptor::get("orders")).await;

	orders.assert_calls_async(2).await;
	refresh.assert_calls_async(2).await;

	assert!(store.get().is_none());
	assert_eq!(redirect.redirects(), ["/login".to_owned()]);
	assert_eq!(
		events.lock().as_slice(),
		[SessionEvent::Terminated { reason: RefreshFailure::Rejected { status: 403 } }]
	);
}
