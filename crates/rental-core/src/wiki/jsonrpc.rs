//! [`WikiBackend`] over DokuWiki's JSON-RPC API (`lib/exe/jsonrpc.php`).

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use serde_json::{Value, json};

use super::{ChangedPage, WikiBackend, WikiError};
use crate::dataentry::{self, DataentryError};
use crate::mapper::{FIELD_MAP, Field};
use crate::model::{Namespace, RawRecord};

/// Fault code DokuWiki uses for "the requested page does not exist".
const PAGE_DOES_NOT_EXIST: i64 = 121;

const SAVE_SUMMARY: &str = "rental: update dataentry";

/// JSON-RPC client for a single DokuWiki instance.
pub struct JsonRpcWiki {
    agent: ureq::Agent,
    endpoint: String,
    token: Option<String>,
    next_id: AtomicU64,
}

#[derive(Debug, Deserialize)]
struct PageListEntry {
    id: String,
}

#[derive(Debug, Deserialize)]
struct RecentChange {
    // older wikis report the page id as `name`
    #[serde(alias = "name")]
    id: String,
    #[serde(default, alias = "lastModified")]
    revision: Option<i64>,
}

impl JsonRpcWiki {
    /// Create a client for the wiki at `server` (e.g. `https://wiki.mi.ur.de`).
    #[must_use]
    pub fn new(server: &str, token: Option<String>, timeout: Duration) -> Self {
        let agent = ureq::AgentBuilder::new()
            .timeout(timeout)
            .user_agent(concat!("rental/", env!("CARGO_PKG_VERSION")))
            .build();
        Self {
            agent,
            endpoint: endpoint_for(server),
            token,
            next_id: AtomicU64::new(1),
        }
    }

    /// The JSON-RPC endpoint URL.
    #[must_use]
    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    fn call<T: DeserializeOwned>(&self, method: &str, params: Value) -> Result<T, WikiError> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        tracing::debug!(method, id, "wiki rpc call");

        let mut request = self
            .agent
            .post(&self.endpoint)
            .set("Accept", "application/json");
        if let Some(token) = &self.token {
            request = request.set("Authorization", &format!("Bearer {token}"));
        }

        let response = request
            .send_json(request_body(id, method, params))
            .map_err(|err| match err {
                ureq::Error::Status(status, response) => WikiError::Api {
                    code: i64::from(status),
                    message: response.status_text().to_string(),
                },
                ureq::Error::Transport(transport) => WikiError::Transport(transport.to_string()),
            })?;

        let envelope: Value = response
            .into_json()
            .map_err(|e| WikiError::Decode(format!("{method}: {e}")))?;
        decode_response(method, envelope)
    }

    fn get_page_text(&self, page_id: &str) -> Result<String, WikiError> {
        self.call("core.getPage", json!({ "page": page_id }))
    }
}

impl WikiBackend for JsonRpcWiki {
    fn list_pages(&self, namespace: &Namespace) -> Result<Vec<String>, WikiError> {
        let pages: Vec<PageListEntry> = self.call(
            "core.listPages",
            json!({ "namespace": namespace.as_api_namespace(), "depth": 0 }),
        )?;
        Ok(pages.into_iter().map(|p| p.id).collect())
    }

    fn list_changed_pages(&self, since: DateTime<Utc>) -> Result<Vec<ChangedPage>, WikiError> {
        let changes: Vec<RecentChange> = self.call(
            "core.getRecentPageChanges",
            json!({ "timestamp": since.timestamp() }),
        )?;
        Ok(changes
            .into_iter()
            .map(|c| ChangedPage {
                page_id: c.id,
                modified: c.revision.and_then(|ts| DateTime::from_timestamp(ts, 0)),
            })
            .collect())
    }

    fn page_exists(&self, page_id: &str) -> Result<bool, WikiError> {
        match self.call::<Value>("core.getPageInfo", json!({ "page": page_id })) {
            Ok(info) => Ok(!info.is_null()),
            Err(WikiError::Api { code, .. }) if code == PAGE_DOES_NOT_EXIST => Ok(false),
            Err(e) => Err(e),
        }
    }

    fn fetch_structured_record(&self, page_id: &str) -> Result<RawRecord, WikiError> {
        let text = self.get_page_text(page_id)?;
        Ok(dataentry::parse(&text)
            .map(|entry| entry.record)
            .unwrap_or_default())
    }

    fn save_structured_record(&self, page_id: &str, record: &RawRecord) -> Result<(), WikiError> {
        let text = self.get_page_text(page_id)?;
        let managed: Vec<&str> = FIELD_MAP
            .iter()
            .filter(|(_, field)| *field != Field::Uid)
            .map(|(key, _)| *key)
            .collect();
        let updated =
            dataentry::replace_block(&text, record, &managed).map_err(|reason| match reason {
                DataentryError::NoBlock => WikiError::NoRecord(page_id.to_string()),
                reason @ DataentryError::LineBreak { .. } => WikiError::Unwritable {
                    page_id: page_id.to_string(),
                    reason,
                },
            })?;

        let saved: bool = self.call(
            "core.savePage",
            json!({
                "page": page_id,
                "text": updated,
                "summary": SAVE_SUMMARY,
                "isminor": false,
            }),
        )?;
        if !saved {
            return Err(WikiError::Api {
                code: 0,
                message: format!("savePage refused {page_id}"),
            });
        }
        tracing::info!(page_id, "dataentry saved");
        Ok(())
    }
}

fn endpoint_for(server: &str) -> String {
    format!("{}/lib/exe/jsonrpc.php", server.trim_end_matches('/'))
}

fn request_body(id: u64, method: &str, params: Value) -> Value {
    json!({
        "jsonrpc": "2.0",
        "id": id,
        "method": method,
        "params": params,
    })
}

/// Unwrap a JSON-RPC 2.0 response envelope.
fn decode_response<T: DeserializeOwned>(method: &str, mut envelope: Value) -> Result<T, WikiError> {
    if let Some(error) = envelope.get("error").filter(|e| !e.is_null()) {
        let code = error.get("code").and_then(Value::as_i64).unwrap_or(0);
        if code != 0 {
            let message = error
                .get("message")
                .and_then(Value::as_str)
                .unwrap_or("unknown error")
                .to_string();
            return Err(WikiError::Api { code, message });
        }
    }

    let result = envelope
        .get_mut("result")
        .map(Value::take)
        .ok_or_else(|| WikiError::Decode(format!("{method}: response has no result")))?;
    serde_json::from_value(result).map_err(|e| WikiError::Decode(format!("{method}: {e}")))
}
