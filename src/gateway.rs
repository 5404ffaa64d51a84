use std::cell::Cell;
use std::rc::Rc;
use std::time::Duration;

use reqwest::header::ACCEPT;
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use yew::Callback;

const WATCH_POLL_INTERVAL: Duration = Duration::from_secs(5);

#[derive(Debug, thiserror::Error)]
pub enum GatewayError {
    #[error("fallo de red: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("respuesta inesperada del servidor ({0})")]
    Status(StatusCode),
}

/// A stored document: opaque field map plus identity and the two
/// server-assigned stamps (epoch ms). Identity is (collection, id).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Record {
    pub id: String,
    pub created: i64,
    pub updated: i64,
    #[serde(default)]
    pub fields: Map<String, Value>,
}

impl Record {
    pub fn field(&self, name: &str) -> Option<&Value> {
        self.fields.get(name)
    }
}

#[allow(unused)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FilterOp {
    #[serde(rename = "==")]
    Eq,
    #[serde(rename = "!=")]
    Ne,
    #[serde(rename = "<")]
    Lt,
    #[serde(rename = "<=")]
    Le,
    #[serde(rename = ">")]
    Gt,
    #[serde(rename = ">=")]
    Ge,
    #[serde(rename = "in")]
    In,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    Asc,
    Desc,
}

/// One element of an ordered constraint list. Serialization is
/// order-sensitive and stable, so structurally equal lists produce the
/// same cache key.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum Constraint {
    Filter {
        field: String,
        op: FilterOp,
        value: Value,
    },
    Order {
        field: String,
        dir: Direction,
    },
    Limit {
        count: u32,
    },
}

pub fn filter(field: &str, op: FilterOp, value: impl Into<Value>) -> Constraint {
    Constraint::Filter {
        field: field.to_owned(),
        op,
        value: value.into(),
    }
}

pub fn order_by(field: &str, dir: Direction) -> Constraint {
    Constraint::Order {
        field: field.to_owned(),
        dir,
    }
}

pub fn limit(count: u32) -> Constraint {
    Constraint::Limit { count }
}

#[derive(Deserialize)]
struct Created {
    id: String,
}

/// Client for the hosted document store. All operations are async and
/// resolve to `GatewayError` on transport failure; absence is `None`,
/// never an error.
#[derive(Clone)]
pub struct Gateway {
    client: reqwest::Client,
    base_url: String,
}

impl Gateway {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.into(),
        }
    }

    /// Store endpoint on the host serving the dashboard.
    pub fn from_window() -> Self {
        let location = web_sys::window().unwrap().location();
        Self::new(format!(
            "{}//{}:8081/api",
            location.protocol().unwrap(),
            location.hostname().unwrap()
        ))
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{path}", self.base_url)
    }

    pub async fn read_one(
        &self,
        collection: &str,
        id: &str,
    ) -> Result<Option<Record>, GatewayError> {
        let resp = self
            .client
            .get(self.url(&format!("{collection}/{id}")))
            .header(ACCEPT, "application/json")
            .send()
            .await?;
        if resp.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        if !resp.status().is_success() {
            return Err(GatewayError::Status(resp.status()));
        }
        Ok(Some(resp.json::<Record>().await?))
    }

    /// An empty constraint list returns the whole collection; callers pass
    /// the empty list explicitly.
    pub async fn read_many(
        &self,
        collection: &str,
        constraints: &[Constraint],
    ) -> Result<Vec<Record>, GatewayError> {
        let resp = self
            .client
            .post(self.url(&format!("{collection}/query")))
            .header(ACCEPT, "application/json")
            .json(constraints)
            .send()
            .await?;
        if !resp.status().is_success() {
            return Err(GatewayError::Status(resp.status()));
        }
        Ok(resp.json::<Vec<Record>>().await?)
    }

    /// The server generates the id and both timestamps.
    pub async fn create(
        &self,
        collection: &str,
        fields: &Map<String, Value>,
    ) -> Result<String, GatewayError> {
        let resp = self
            .client
            .post(self.url(collection))
            .header(ACCEPT, "application/json")
            .json(fields)
            .send()
            .await?;
        if !resp.status().is_success() {
            return Err(GatewayError::Status(resp.status()));
        }
        Ok(resp.json::<Created>().await?.id)
    }

    /// Partial update; unspecified fields are untouched, `updated` is reset
    /// server-side.
    pub async fn update(
        &self,
        collection: &str,
        id: &str,
        fields: &Map<String, Value>,
    ) -> Result<(), GatewayError> {
        let resp = self
            .client
            .patch(self.url(&format!("{collection}/{id}")))
            .header(ACCEPT, "application/json")
            .json(fields)
            .send()
            .await?;
        if !resp.status().is_success() {
            return Err(GatewayError::Status(resp.status()));
        }
        Ok(())
    }

    /// Idempotent: deleting an absent document succeeds.
    pub async fn delete(&self, collection: &str, id: &str) -> Result<(), GatewayError> {
        let resp = self
            .client
            .delete(self.url(&format!("{collection}/{id}")))
            .header(ACCEPT, "application/json")
            .send()
            .await?;
        if resp.status() == StatusCode::NOT_FOUND {
            return Ok(());
        }
        if !resp.status().is_success() {
            return Err(GatewayError::Status(resp.status()));
        }
        Ok(())
    }

    /// Emits the full current result set on every observed change.
    /// Transport errors are logged and the watch stays alive; dropping the
    /// handle stops the loop.
    pub fn watch_collection(
        &self,
        collection: &str,
        constraints: &[Constraint],
        on_change: Callback<Vec<Record>>,
    ) -> WatchHandle {
        let cancelled = Rc::new(Cell::new(false));
        let flag = Rc::clone(&cancelled);
        let gateway = self.clone();
        let collection = collection.to_owned();
        let constraints = constraints.to_vec();
        wasm_bindgen_futures::spawn_local(async move {
            let mut last: Option<String> = None;
            loop {
                if flag.get() {
                    break;
                }
                match gateway.read_many(&collection, &constraints).await {
                    Ok(records) => {
                        // the target may have changed while the request was
                        // in flight
                        if flag.get() {
                            break;
                        }
                        let snapshot = serde_json::to_string(&records).unwrap_or_default();
                        if last.as_deref() != Some(snapshot.as_str()) {
                            last = Some(snapshot);
                            on_change.emit(records);
                        }
                    }
                    Err(err) => log::error!("watch {collection}: {err}"),
                }
                yew::platform::time::sleep(WATCH_POLL_INTERVAL).await;
            }
        });
        WatchHandle { cancelled }
    }

    /// Single-document variant; emits `None` once the document is gone.
    pub fn watch_document(
        &self,
        collection: &str,
        id: &str,
        on_change: Callback<Option<Record>>,
    ) -> WatchHandle {
        let cancelled = Rc::new(Cell::new(false));
        let flag = Rc::clone(&cancelled);
        let gateway = self.clone();
        let collection = collection.to_owned();
        let id = id.to_owned();
        wasm_bindgen_futures::spawn_local(async move {
            let mut last: Option<String> = None;
            loop {
                if flag.get() {
                    break;
                }
                match gateway.read_one(&collection, &id).await {
                    Ok(record) => {
                        if flag.get() {
                            break;
                        }
                        let snapshot = serde_json::to_string(&record).unwrap_or_default();
                        if last.as_deref() != Some(snapshot.as_str()) {
                            last = Some(snapshot);
                            on_change.emit(record);
                        }
                    }
                    Err(err) => log::error!("watch {collection}/{id}: {err}"),
                }
                yew::platform::time::sleep(WATCH_POLL_INTERVAL).await;
            }
        });
        WatchHandle { cancelled }
    }
}

/// Scoped subscription: the poll loop stops when the handle is dropped,
/// and a response that races the cancellation is never emitted.
pub struct WatchHandle {
    cancelled: Rc<Cell<bool>>,
}

impl WatchHandle {
    pub fn unsubscribe(self) {}
}

impl Drop for WatchHandle {
    fn drop(&mut self) {
        self.cancelled.set(true);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn constraint_builders_are_pure_values() {
        let a = filter("device", FilterOp::Eq, "abc");
        let b = filter("device", FilterOp::Eq, "abc");
        assert_eq!(a, b);
        assert_eq!(order_by("ts", Direction::Desc), order_by("ts", Direction::Desc));
        assert_eq!(limit(10), limit(10));
    }

    #[test]
    fn equal_constraint_lists_serialize_identically() {
        let mk = || {
            vec![
                filter("device", FilterOp::Eq, "abc"),
                order_by("ts", Direction::Desc),
                limit(1000),
            ]
        };
        assert_eq!(
            serde_json::to_string(&mk()).unwrap(),
            serde_json::to_string(&mk()).unwrap()
        );
    }

    #[test]
    fn serialization_is_order_sensitive() {
        let a = vec![order_by("ts", Direction::Asc), limit(5)];
        let b = vec![limit(5), order_by("ts", Direction::Asc)];
        assert_ne!(
            serde_json::to_string(&a).unwrap(),
            serde_json::to_string(&b).unwrap()
        );
    }

    #[test]
    fn filter_ops_use_operator_symbols() {
        let c = filter("x", FilterOp::Ge, 3);
        let json = serde_json::to_string(&c).unwrap();
        assert!(json.contains("\">=\""), "{json}");
    }

    #[test]
    fn record_field_lookup() {
        let record: Record = serde_json::from_value(serde_json::json!({
            "id": "r1",
            "created": 1_700_000_000_000i64,
            "updated": 1_700_000_000_000i64,
            "fields": { "name": "ensayo" }
        }))
        .unwrap();
        assert_eq!(record.field("name").and_then(|v| v.as_str()), Some("ensayo"));
        assert!(record.field("missing").is_none());
    }
}
