use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use serde_json::{Map, Value};

use crate::chef::HttpReply;
use crate::error::TransportError;
use crate::remote::{Method, RestRequest, RestTransport};

#[derive(Default)]
struct State {
    tables: HashMap<String, Vec<Map<String, Value>>>,
    failures: HashMap<String, (u16, String)>,
    offline: bool,
    log: Vec<RestRequest>,
}

/// In-memory remote store. Understands `col=eq.v` filters,
/// `order=col.desc|asc`, `limit=n`, DELETE by filter, and POST with optional
/// merge-by-key.
#[derive(Clone, Default)]
pub(crate) struct FakeStore {
    state: Arc<Mutex<State>>,
}

fn cell(v: &Value) -> String {
    match v {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

fn filters(query: &[(String, String)]) -> Vec<(String, String)> {
    query
        .iter()
        .filter_map(|(k, v)| v.strip_prefix("eq.").map(|v| (k.clone(), v.to_string())))
        .collect()
}

fn matches(row: &Map<String, Value>, filters: &[(String, String)]) -> bool {
    filters
        .iter()
        .all(|(k, v)| row.get(k).is_some_and(|cellv| cell(cellv) == *v))
}

impl FakeStore {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn seed(&self, path: &str, row: Value) {
        let Value::Object(row) = row else {
            panic!("seed rows must be objects");
        };
        let mut state = self.state.lock().unwrap();
        state.tables.entry(path.to_string()).or_default().push(row);
    }

    pub(crate) fn fail_path(&self, path: &str, status: u16, body: &str) {
        let mut state = self.state.lock().unwrap();
        state
            .failures
            .insert(path.to_string(), (status, body.to_string()));
    }

    pub(crate) fn set_offline(&self, offline: bool) {
        self.state.lock().unwrap().offline = offline;
    }

    pub(crate) fn row_count(&self, path: &str) -> usize {
        let state = self.state.lock().unwrap();
        state.tables.get(path).map_or(0, Vec::len)
    }

    pub(crate) fn rows(&self, path: &str) -> Vec<Map<String, Value>> {
        let state = self.state.lock().unwrap();
        state.tables.get(path).cloned().unwrap_or_default()
    }

    pub(crate) fn requests_for(&self, path: &str) -> Vec<RestRequest> {
        let state = self.state.lock().unwrap();
        state
            .log
            .iter()
            .filter(|r| r.path == path)
            .cloned()
            .collect()
    }

    pub(crate) fn writes_to(&self, path: &str) -> usize {
        self.requests_for(path)
            .iter()
            .filter(|r| r.method != Method::Get)
            .count()
    }

    fn handle(state: &mut State, request: &RestRequest) -> HttpReply {
        let table = state.tables.entry(request.path.clone()).or_default();
        let eqs = filters(&request.query);

        match request.method {
            Method::Get => {
                let mut rows: Vec<Map<String, Value>> =
                    table.iter().filter(|r| matches(r, &eqs)).cloned().collect();
                if let Some((_, order)) = request.query.iter().find(|(k, _)| k == "order") {
                    let (col, dir) = order.split_once('.').unwrap_or((order.as_str(), "asc"));
                    rows.sort_by_key(|r| r.get(col).and_then(Value::as_i64).unwrap_or(0));
                    if dir == "desc" {
                        rows.reverse();
                    }
                }
                if let Some((_, limit)) = request.query.iter().find(|(k, _)| k == "limit") {
                    rows.truncate(limit.parse().unwrap_or(usize::MAX));
                }
                HttpReply {
                    status: 200,
                    body: Value::Array(rows.into_iter().map(Value::Object).collect()).to_string(),
                }
            }
            Method::Delete => {
                table.retain(|r| !matches(r, &eqs));
                HttpReply {
                    status: 204,
                    body: String::new(),
                }
            }
            Method::Post => {
                let incoming: Vec<Map<String, Value>> = match request.body.clone() {
                    Some(Value::Array(items)) => items
                        .into_iter()
                        .filter_map(|v| match v {
                            Value::Object(m) => Some(m),
                            _ => None,
                        })
                        .collect(),
                    Some(Value::Object(m)) => vec![m],
                    _ => Vec::new(),
                };
                let keys: Vec<&str> = request
                    .merge_on
                    .as_deref()
                    .map(|k| k.split(',').collect())
                    .unwrap_or_default();
                for row in incoming {
                    let existing = (!keys.is_empty())
                        .then(|| {
                            table
                                .iter()
                                .position(|r| keys.iter().all(|k| r.get(*k) == row.get(*k)))
                        })
                        .flatten();
                    match existing {
                        Some(pos) => table[pos] = row,
                        None => table.push(row),
                    }
                }
                HttpReply {
                    status: 201,
                    body: String::new(),
                }
            }
        }
    }
}

#[async_trait]
impl RestTransport for FakeStore {
    async fn send(&self, request: RestRequest) -> Result<HttpReply, TransportError> {
        let mut state = self.state.lock().unwrap();
        state.log.push(request.clone());
        if state.offline {
            return Err(TransportError("connection refused".to_string()));
        }
        if let Some((status, body)) = state.failures.get(&request.path) {
            return Ok(HttpReply {
                status: *status,
                body: body.clone(),
            });
        }
        Ok(Self::handle(&mut state, &request))
    }
}
