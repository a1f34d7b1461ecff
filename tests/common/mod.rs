//! Helpers shared by the integration suites: a reqwest client that trusts httpmock's
//! self-signed certificate, and a tracing layer that records events for log-trail assertions.

#![allow(dead_code)]

// std
use std::{
	collections::BTreeMap,
	fmt::Debug,
	sync::{Arc, Mutex},
};
// crates.io
use tracing::{
	Event, Level, Subscriber,
	field::{Field, Visit},
	subscriber::DefaultGuard,
};
use tracing_subscriber::{
	Layer,
	layer::{Context as LayerContext, SubscriberExt},
};
// self
use car_svc::{http::ReqwestIntegrationClient, reqwest};

/// Builds a client that accepts httpmock's self-signed certificate and never follows redirects.
pub fn test_reqwest_integration_client() -> ReqwestIntegrationClient {
	let client = reqwest::Client::builder()
		.redirect(reqwest::redirect::Policy::none())
		.danger_accept_invalid_certs(true)
		.danger_accept_invalid_hostnames(true)
		.build()
		.expect("Failed to build insecure Reqwest client for tests.");

	ReqwestIntegrationClient::with_client(client)
}

/// Event recorded by [`EventCollector`], with every field rendered as text.
#[derive(Clone, Debug)]
pub struct CapturedEvent {
	pub level: Level,
	pub fields: BTreeMap<String, String>,
}
impl CapturedEvent {
	pub fn message(&self) -> &str {
		self.field("message").unwrap_or_default()
	}

	pub fn field(&self, name: &str) -> Option<&str> {
		self.fields.get(name).map(String::as_str)
	}
}

/// Layer that records every event emitted while its guard is held on the current thread.
#[derive(Clone, Default)]
pub struct EventCollector {
	events: Arc<Mutex<Vec<CapturedEvent>>>,
}
impl EventCollector {
	/// Installs the collector as the thread's default subscriber until the guard drops.
	pub fn install(&self) -> DefaultGuard {
		tracing::subscriber::set_default(tracing_subscriber::registry().with(self.clone()))
	}

	pub fn events(&self) -> Vec<CapturedEvent> {
		self.events.lock().expect("Event lock should not be poisoned.").clone()
	}

	/// Events whose message equals `message`.
	pub fn with_message(&self, message: &str) -> Vec<CapturedEvent> {
		self.events().into_iter().filter(|event| event.message() == message).collect()
	}
}
impl<S> Layer<S> for EventCollector
where
	S: Subscriber,
{
	fn on_event(&self, event: &Event<'_>, _: LayerContext<'_, S>) {
		let mut visitor = FieldText::default();

		event.record(&mut visitor);

		self.events
			.lock()
			.expect("Event lock should not be poisoned.")
			.push(CapturedEvent { level: *event.metadata().level(), fields: visitor.0 });
	}
}

#[derive(Default)]
struct FieldText(BTreeMap<String, String>);
impl Visit for FieldText {
	fn record_str(&mut self, field: &Field, value: &str) {
		self.0.insert(field.name().to_owned(), value.to_owned());
	}

	fn record_debug(&mut self, field: &Field, value: &dyn Debug) {
		self.0.insert(field.name().to_owned(), format!("{value:?}"));
	}
}
