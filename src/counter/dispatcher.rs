//! Counter dispatcher
//!
//! Entry point for counter events: resolves the action, talks to the store
//! and turns every outcome into a `ProxyResponse`. Nothing escapes `handle`.

use super::action::Action;
use super::error::CounterError;
use super::event::{ProxyRequest, ProxyResponse};
use super::response;
use crate::logger;
use crate::store::SharedStore;

/// Stateless request dispatcher bound to one counter key
#[derive(Clone)]
pub struct Dispatcher {
    store: SharedStore,
    key: String,
}

impl Dispatcher {
    pub fn new(store: SharedStore, key: impl Into<String>) -> Self {
        Self {
            store,
            key: key.into(),
        }
    }

    /// Serve one event. A missing event is treated as a POST.
    pub fn handle(&self, request: Option<&ProxyRequest>) -> ProxyResponse {
        log_event(request);

        let action = Action::from_request(request);
        match self.execute(&action) {
            Ok(resp) => resp,
            Err(err) => {
                if err.status_code() == 405 {
                    logger::log_warning(&err.to_string());
                } else {
                    logger::log_error(&format!("Counter request failed: {err}"));
                }
                response::from_error(&err)
            }
        }
    }

    fn execute(&self, action: &Action) -> Result<ProxyResponse, CounterError> {
        match action {
            Action::Get => {
                let count = self.current_count()?;
                response::count_response(count, "get")
            }
            Action::Increment => {
                let count = self.increment()?;
                logger::log_info(&format!("[Counter] {} incremented to {count}", self.key));
                response::count_response(count, "increment")
            }
            Action::Preflight => Ok(response::preflight_response()),
            Action::Unsupported(method) => Err(CounterError::UnsupportedMethod(method.clone())),
        }
    }

    /// Current count; an absent record or one without a count reads as zero
    pub fn current_count(&self) -> Result<u64, CounterError> {
        let record = self
            .store
            .read(&self.key)
            .map_err(CounterError::StoreRead)?;
        Ok(record.and_then(|r| r.count).unwrap_or(0))
    }

    /// Add one through the store's atomic primitive and return the new count
    pub fn increment(&self) -> Result<u64, CounterError> {
        let record = self
            .store
            .atomic_add(&self.key, 1)
            .map_err(CounterError::StoreWrite)?;
        record.count.ok_or(CounterError::MissingResultAfterWrite)
    }
}

fn log_event(request: Option<&ProxyRequest>) {
    if !logger::is_debug() {
        return;
    }
    match request {
        None => logger::log_debug("[Counter] Event is absent, treating as POST"),
        Some(req) => {
            logger::log_debug(&format!(
                "[Counter] method={} path={} resource={} headers={}",
                req.http_method.as_deref().unwrap_or("<none>"),
                req.path.as_deref().unwrap_or("-"),
                req.resource.as_deref().unwrap_or("-"),
                req.headers.as_ref().map_or(0, std::collections::BTreeMap::len),
            ));
            if req.http_method.is_none() {
                logger::log_debug("[Counter] HTTP method is absent, defaulting to POST");
            }
        }
    }
}
