//! `data-fetch`
//!
//! ```html
//! <section data-fetch="/api/users/{{ id }}" data-fetch-as="users"
//!          data-fetch-loading-class="busy" data-fetch-error-class="failed">
//!   <p data-if="users.loading">Loading...</p>
//!   <p data-if="users.error">{{ users.error }}</p>
//!   <ul><li data-repeat="u in users.data">{{ u.name }}</li></ul>
//! </section>
//! ```
//!
//! The state container lives in the owning scope (component data or root
//! data) and carries `loading`, `error` and `data` plus reserved bookkeeping
//! keys that never notify:
//!
//! - `__signature`: `"METHOD url"` of the latest request
//! - `__inflight`: signature currently in flight
//! - `__success`: the latest request for `__signature` succeeded
//! - `__fetched_at`: completion time in engine milliseconds
//!
//! A node never issues overlapping requests, and a state never repeats a
//! successful request for the same signature unless caching is disabled
//! with `data-fetch-cache="false"`, the configured TTL elapsed, or the
//! application invalidated it.

use std::rc::Rc;

use tessel_dom::NodeId;
use tessel_net::{Method, RequestOptions};
use tessel_store::{get_by_path, set_by_path, Value};
use tracing::{debug, trace, warn};

use crate::runtime::Runtime;
use crate::scope::RenderContext;

const DEFAULT_STATE: &str = "fetchState";

/// Attributes of one `data-fetch` element
struct FetchRequest {
    url: String,
    method: Method,
    state_path: String,
    loading_class: Option<String>,
    error_class: Option<String>,
    cache: bool,
}

impl FetchRequest {
    fn signature(&self) -> String {
        format!("{} {}", self.method.as_str(), self.url)
    }
}

impl Runtime {
    fn read_fetch_request(&self, node: NodeId, ctx: &RenderContext) -> Option<FetchRequest> {
        let (template, method, state_path, loading_class, error_class, cache) = {
            let doc = self.doc();
            let tree = &doc.tree;
            let attr = |name: &str| tree.attr(node, name).map(str::to_string);
            (
                attr("data-fetch")?,
                attr("data-fetch-method"),
                attr("data-fetch-as"),
                attr("data-fetch-loading-class"),
                attr("data-fetch-error-class"),
                attr("data-fetch-cache"),
            )
        };
        let url = self.interpolate_text(&template, ctx).trim().to_string();
        if url.is_empty() {
            return None;
        }
        Some(FetchRequest {
            url,
            method: Method::parse(method.as_deref().unwrap_or("GET")),
            state_path: state_path.filter(|p| !p.is_empty()).unwrap_or_else(|| DEFAULT_STATE.to_string()),
            loading_class: loading_class.filter(|c| !c.is_empty()),
            error_class: error_class.filter(|c| !c.is_empty()),
            cache: !cache.is_some_and(|c| c.eq_ignore_ascii_case("false")),
        })
    }

    /// State container at `path` in `owner`, created on demand
    fn fetch_state(&self, owner: &Value, path: &str) -> Option<Value> {
        let existing = get_by_path(owner, path);
        if existing.is_container() {
            return Some(existing);
        }
        let state = Value::object_from([
            ("loading".to_string(), Value::Bool(false)),
            ("error".to_string(), Value::Null),
            ("data".to_string(), Value::Null),
        ]);
        if !set_by_path(owner, path, state) {
            warn!(path, "cannot create fetch state");
            return None;
        }
        // Read back through the owner so the container is observed.
        Some(get_by_path(owner, path))
    }

    pub(crate) fn process_fetch(&self, node: NodeId, ctx: &RenderContext) {
        let Some(request) = self.read_fetch_request(node, ctx) else {
            return;
        };
        let signature = request.signature();

        if self.read_state(node, |s| s.fetch_inflight.as_deref() == Some(signature.as_str())).unwrap_or(false) {
            trace!(%signature, "fetch already in flight for node");
            return;
        }

        let owner = ctx.owning_data();
        let Some(state) = self.fetch_state(&owner, &request.state_path) else {
            return;
        };
        if state.get("__inflight").as_str() == Some(signature.as_str()) {
            trace!(%signature, "fetch already in flight for state");
            return;
        }
        if request.cache
            && state.get("__signature").as_str() == Some(signature.as_str())
            && state.get("__success").truthy()
            && !self.fetch_expired(&state)
        {
            trace!(%signature, "fetch served from cache");
            return;
        }

        debug!(%signature, state = %request.state_path, "fetch started");
        state.set("__inflight", Value::from(signature.as_str()));
        state.set("__signature", Value::from(signature.as_str()));
        state.set("__success", Value::Bool(false));
        state.set("loading", Value::Bool(true));
        self.with_state(node, |s| s.fetch_inflight = Some(signature.clone()));
        {
            let mut doc = self.document.borrow_mut();
            if let Some(class) = &request.loading_class {
                doc.tree.toggle_class(node, class, true);
            }
            if let Some(class) = &request.error_class {
                doc.tree.toggle_class(node, class, false);
            }
        }

        let me = self.weak();
        let request = Rc::new(request);
        self.scheduler.spawn(async move {
            let Some(rt) = me.upgrade() else {
                return;
            };
            let options = RequestOptions::new().method(request.method);
            let result = rt.http.request(&request.url, options).await;
            rt.complete_fetch(node, &state, &request, &signature, result);
        });
    }

    fn fetch_expired(&self, state: &Value) -> bool {
        let Some(ttl) = self.config.fetch_cache_ttl_ms else {
            return false;
        };
        let fetched_at = state.get("__fetched_at").as_number().unwrap_or(0.0);
        self.now_ms() - fetched_at >= ttl as f64
    }

    fn complete_fetch(
        &self,
        node: NodeId,
        state: &Value,
        request: &FetchRequest,
        signature: &str,
        result: Result<serde_json::Value, tessel_net::NetError>,
    ) {
        self.with_state(node, |s| {
            if s.fetch_inflight.as_deref() == Some(signature) {
                s.fetch_inflight = None;
            }
        });
        if self.is_torn_down() {
            return;
        }
        if state.get("__signature").as_str() != Some(signature) {
            debug!(signature, "stale fetch completion dropped");
            return;
        }

        match result {
            Ok(body) => {
                debug!(signature, "fetch succeeded");
                state.set("data", Value::from_json(&body));
                state.set("error", Value::Null);
                state.set("__success", Value::Bool(true));
                state.set("__fetched_at", Value::Number(self.now_ms()));
            }
            Err(err) => {
                warn!(signature, error = %err, "fetch failed");
                state.set("data", Value::Null);
                state.set("error", Value::from(err.to_string()));
                if let Some(class) = &request.error_class {
                    self.document.borrow_mut().tree.toggle_class(node, class, true);
                }
            }
        }
        state.set("__inflight", Value::Null);
        state.set("loading", Value::Bool(false));
        if let Some(class) = &request.loading_class {
            self.document.borrow_mut().tree.toggle_class(node, class, false);
        }
    }

    /// Drop the cached success of the fetch state at `path` in the root data
    /// and schedule a render, so the next pass fetches again
    pub(crate) fn invalidate_fetch(&self, path: &str) -> bool {
        let state = get_by_path(&self.root_data(), path);
        if !state.is_container() {
            return false;
        }
        state.set("__success", Value::Bool(false));
        debug!(path, "fetch cache invalidated");
        self.schedule_root_render();
        true
    }
}
