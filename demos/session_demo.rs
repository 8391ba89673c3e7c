//! Demonstrates three concurrent requests hitting an expired token and sharing a single
//! refresh, against an in-process mock backend.

// std
use std::sync::Arc;
// crates.io
use color_eyre::Result;
use httpmock::prelude::*;
// self
use bearer_client::{
	AuthClient, ClientConfig, Credentials, RequestDescriptor, SessionEvent,
	session::NoRedirect, store::MemoryTokenStore, transport::ReqwestHttpClient,
};

#[tokio::main]
async fn main() -> Result<()> {
	color_eyre::install()?;

	let server = MockServer::start_async().await;
	let login_mock = server
		.mock_async(|when, then| {
			when.method(POST).path("/auth/login");
			then.status(200)
				.header("content-type", "application/json")
				.header("set-cookie", "refresh=demo; Path=/; HttpOnly")
				.body("{\"accessToken\":\"expired-soon\",\"user\":{\"id\":42,\"name\":\"Demo\"}}");
		})
		.await;
	let expired_mock = server
		.mock_async(|when, then| {
			when.method(GET).path_includes("/orders").header("authorization", "Bearer expired-soon");
			then.status(401);
		})
		.await;
	let refresh_mock = server
		.mock_async(|when, then| {
			when.method(POST).path("/auth/refresh-token");
			then.status(200)
				.header("content-type", "application/json")
				.delay(std::time::Duration::from_millis(100))
				.body("{\"accessToken\":\"renewed\"}");
		})
		.await;
	let orders_mock = server
		.mock_async(|when, then| {
			when.method(GET).path_includes("/orders").header("authorization", "Bearer renewed");
			then.status(200).header("content-type", "application/json").body("{\"orders\":[]}");
		})
		.await;
	let config = ClientConfig::builder(server.base_url()).build()?;
	let client = AuthClient::with_transport(
		config,
		ReqwestHttpClient::new()?,
		Arc::new(MemoryTokenStore::default()),
		Arc::new(NoRedirect),
	);

	client.subscribe(Arc::new(|event: &SessionEvent| println!("Session event: {event:?}.")));
	client.login(&Credentials::new("demo@example.com", "demo")).await?;

	let (a, b, c) = futures::join!(
		client.send(RequestDescriptor::get("orders/1")),
		client.send(RequestDescriptor::get("orders/2")),
		client.send(RequestDescriptor::get("orders/3")),
	);

	for response in [a?, b?, c?] {
		println!("Orders answered with {}: {}.", response.status(), response.text());
	}

	println!(
		"Refresh calls: {}, coalesced callers: {}.",
		client.metrics().attempts(),
		client.metrics().coalesced()
	);

	login_mock.assert_async().await;
	expired_mock.assert_calls_async(3).await;
	refresh_mock.assert_async().await;
	orders_mock.assert_calls_async(3).await;

	Ok(())
}
