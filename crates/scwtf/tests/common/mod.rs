#![allow(dead_code)]

use async_trait::async_trait;
use scwtf::{MetaOptions, Provider};
use scwtf_cloud::{HttpRequest, HttpResponse, HttpTransport};
use scwtf_object::{MemoryStore, MemoryStoreFactory};
use scwtf_recorder::{Cassette, Interaction, Recorder};
use serde_json::{Value, json};
use std::sync::{Arc, Mutex};
use std::time::Duration;

pub const SECRET: &str = "11111111-1111-1111-1111-111111111111";
pub const PROJECT: &str = "22222222-2222-2222-2222-222222222222";
pub const ACCESS_KEY: &str = "SCWTESTACCESSKEY0000";
pub const API: &str = "https://api.scaleway.com";

pub fn interaction(
    method: &str,
    path: &str,
    body: &str,
    status: u16,
    response: &str,
) -> Interaction {
    let mut request = HttpRequest::new(method, format!("{API}{path}"));
    if !body.is_empty() {
        request = request.with_json_body(body.to_string());
    }
    Interaction {
        request,
        response: HttpResponse::new(status, response),
    }
}

/// Requests seen on the wire, as `METHOD path body`
#[derive(Debug)]
pub struct Traffic {
    inner: Arc<dyn HttpTransport>,
    seen: Mutex<Vec<String>>,
}

impl Traffic {
    pub fn new(inner: Arc<dyn HttpTransport>) -> Self {
        Self {
            inner,
            seen: Mutex::new(Vec::new()),
        }
    }

    pub fn seen(&self) -> Vec<String> {
        self.seen.lock().unwrap().clone()
    }
}

#[async_trait]
impl HttpTransport for Traffic {
    async fn send(&self, request: HttpRequest) -> scwtf_cloud::Result<HttpResponse> {
        let path = request
            .url
            .strip_prefix(API)
            .unwrap_or(&request.url)
            .split('?')
            .next()
            .unwrap_or_default()
            .to_string();
        let line = format!("{} {} {}", request.method, path, request.body);
        self.seen.lock().unwrap().push(line.trim_end().to_string());
        self.inner.send(request).await
    }
}

pub fn provider_args() -> Value {
    json!({
        "access_key": ACCESS_KEY,
        "secret_key": SECRET,
        "project_id": PROJECT,
        "region": "fr-par",
        "zone": "fr-par-1",
    })
}

/// Provider replaying `interactions`, with no delay between polls
pub fn replaying(interactions: Vec<Interaction>) -> (Provider, Arc<Traffic>, Arc<Recorder>) {
    let recorder = Arc::new(Recorder::from_cassette(Cassette::new(interactions)));
    let traffic = Arc::new(Traffic::new(recorder.clone()));
    let options = MetaOptions {
        poll_interval: Some(Duration::ZERO),
        ..MetaOptions::isolated(traffic.clone())
    };
    let provider = Provider::configure(&provider_args(), options).unwrap();
    (provider, traffic, recorder)
}

/// Provider whose object storage lives in memory
pub fn with_memory_store() -> (Provider, Arc<MemoryStore>) {
    let (provider, factory) = with_memory_factory();
    (provider, factory.store())
}

/// Like [`with_memory_store`], keeping the factory to inspect connections
pub fn with_memory_factory() -> (Provider, Arc<MemoryStoreFactory>) {
    let (provider, _, _) = replaying(Vec::new());
    let factory = Arc::new(MemoryStoreFactory::new(Arc::new(MemoryStore::new())));
    let provider = provider.with_store_factory(factory.clone());
    (provider, factory)
}
