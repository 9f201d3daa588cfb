// SPDX-FileCopyrightText: 2025 Hyperpolymath
// SPDX-License-Identifier: PMPL-1.0-or-later

//! Scripted collaborators for dispatcher and transport tests.

use async_trait::async_trait;
use ca_ed_code_mcp::{
    clock::{Clock, ManualClock},
    config::Config,
    fetcher::{DocumentSource, FetchError},
    handlers::AppState,
    protocol::JsonRpcRequest,
    store::{KeyValueStore, MemoryStore, PutOptions, StoreError},
};
use serde_json::{json, Value};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

/// Start of the test clock. The 60 s window containing it ends at
/// 1_700_000_040_000.
pub const START_MS: i64 = 1_700_000_000_000;

/// A section page in the shape the legislature site serves.
pub const SECTION_15278_PAGE: &str = r#"
<html>
  <body>
    <div id="codeLawSectionNoHead">
      <div><h4>Education Code - EDC</h4></div>
      <div>ARTICLE 2. Citizens&#39; Oversight Committee [15278 - 15282]</div>
      <div><h6>15278.</h6>
      <p>(a) If a bond measure is approved, the governing board shall
      establish and appoint members to an independent citizens&#39;
      oversight committee.</p>
      <p>(b) The committee shall review expenditures.</p>
      <p><i>(Added by Stats. 2000, Ch. 44, Sec. 3. Effective January 1, 2001.)</i></p>
      </div>
    </div>
  </body>
</html>
"#;

/// What the scripted upstream answers with.
#[derive(Debug, Clone)]
pub enum Upstream {
    /// The same body for every URL
    Page(String),
    /// A minimal page for whatever section the URL asks for
    Echo,
    /// A non-success HTTP status
    Status(u16),
}

/// Upstream stand-in that counts fetches.
pub struct FakeSource {
    mode: Upstream,
    fetches: AtomicUsize,
}

impl FakeSource {
    pub fn new(mode: Upstream) -> Arc<Self> {
        Arc::new(Self {
            mode,
            fetches: AtomicUsize::new(0),
        })
    }

    pub fn page(html: &str) -> Arc<Self> {
        Self::new(Upstream::Page(html.to_string()))
    }

    pub fn fetches(&self) -> usize {
        self.fetches.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl DocumentSource for FakeSource {
    async fn fetch(&self, url: &str) -> Result<String, FetchError> {
        self.fetches.fetch_add(1, Ordering::SeqCst);
        match &self.mode {
            Upstream::Page(html) => Ok(html.clone()),
            Upstream::Echo => Ok(echo_page(url)),
            Upstream::Status(status) => Err(FetchError::Status { status: *status }),
        }
    }
}

fn echo_page(url: &str) -> String {
    let section = url::Url::parse(url)
        .ok()
        .and_then(|u| {
            u.query_pairs()
                .find(|(k, _)| k == "sectionNum")
                .map(|(_, v)| v.trim_end_matches('.').to_string())
        })
        .unwrap_or_default();
    format!(
        r#"<div id="codeLawSectionNoHead"><p>{section}. Text of section {section}.</p>
        <p>(Added by Stats. 1976, Ch. 1010.)</p></div>"#
    )
}

/// A store whose every operation fails.
pub struct FailingStore;

#[async_trait]
impl KeyValueStore for FailingStore {
    async fn get(&self, _key: &str) -> Result<Option<Vec<u8>>, StoreError> {
        Err(StoreError::Unavailable("offline".to_string()))
    }

    async fn put(&self, _key: &str, _value: Vec<u8>, _options: PutOptions) -> Result<(), StoreError> {
        Err(StoreError::Unavailable("offline".to_string()))
    }

    async fn delete(&self, _key: &str) -> Result<(), StoreError> {
        Err(StoreError::Unavailable("offline".to_string()))
    }
}

/// Application state over an in-memory store and a manual clock.
pub fn memory_state(config: Config, source: Arc<FakeSource>) -> (Arc<AppState>, ManualClock) {
    let clock = ManualClock::new(START_MS);
    let shared: Arc<dyn Clock> = Arc::new(clock.clone());
    let store = Arc::new(MemoryStore::with_clock(shared.clone()));
    let state = AppState::new(config, store, shared, source).unwrap();
    (Arc::new(state), clock)
}

/// Application state over a store that always fails.
pub fn failing_state(config: Config, source: Arc<FakeSource>) -> Arc<AppState> {
    let clock: Arc<dyn Clock> = Arc::new(ManualClock::new(START_MS));
    Arc::new(AppState::new(config, Arc::new(FailingStore), clock, source).unwrap())
}

pub fn request(id: Value, method: &str, params: Option<Value>) -> JsonRpcRequest {
    let mut message = json!({"jsonrpc": "2.0", "id": id, "method": method});
    if let Some(params) = params {
        message["params"] = params;
    }
    serde_json::from_value(message).unwrap()
}

pub fn fetch_call(id: i64, section: Value) -> JsonRpcRequest {
    request(
        json!(id),
        "tools/call",
        Some(json!({"name": "fetch_ed_code", "arguments": {"section": section}})),
    )
}
