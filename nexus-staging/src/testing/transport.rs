//! A scripted, recording transport.

use async_trait::async_trait;
use parking_lot::Mutex;
use reqwest::Url;
use std::collections::{HashMap, VecDeque};
use std::fmt;

use crate::client::{HttpResponse, Transport};
use crate::errors::StageError;

/// HTTP method of a scripted or recorded request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Method {
    /// GET.
    Get,
    /// HEAD.
    Head,
    /// POST.
    Post,
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Get => write!(f, "GET"),
            Self::Head => write!(f, "HEAD"),
            Self::Post => write!(f, "POST"),
        }
    }
}

/// A request seen by [`ScriptedTransport`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordedRequest {
    /// HTTP method.
    pub method: Method,
    /// Full request URL.
    pub url: String,
    /// Request body, for POSTs.
    pub body: Option<String>,
}

/// A [`Transport`] that answers from a script and records every request.
///
/// Responses are queued per method and URL. Each request takes the next
/// queued response; the last one is repeated once the queue is down to it.
/// Unscripted requests get an empty `404`.
#[derive(Debug, Default)]
pub struct ScriptedTransport {
    routes: Mutex<HashMap<(Method, String), VecDeque<HttpResponse>>>,
    requests: Mutex<Vec<RecordedRequest>>,
}

impl ScriptedTransport {
    /// Creates a transport with an empty script.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Queues a response for `method` on `url`.
    pub fn respond(&self, method: Method, url: &str, status: u16, body: impl Into<String>) -> &Self {
        self.routes
            .lock()
            .entry((method, url.to_string()))
            .or_default()
            .push_back(HttpResponse::new(status, body));
        self
    }

    /// Queues a `200` GET response with `body`.
    pub fn on_get(&self, url: &str, body: impl Into<String>) -> &Self {
        self.respond(Method::Get, url, 200, body)
    }

    /// Queues a HEAD response.
    pub fn on_head(&self, url: &str, status: u16) -> &Self {
        self.respond(Method::Head, url, status, "")
    }

    /// Queues a POST response.
    pub fn on_post(&self, url: &str, status: u16) -> &Self {
        self.respond(Method::Post, url, status, "")
    }

    /// Returns every request made so far.
    #[must_use]
    pub fn requests(&self) -> Vec<RecordedRequest> {
        self.requests.lock().clone()
    }

    /// Returns how many times `method` was sent to `url`.
    #[must_use]
    pub fn count(&self, method: Method, url: &str) -> usize {
        self.requests
            .lock()
            .iter()
            .filter(|r| r.method == method && r.url == url)
            .count()
    }

    /// Returns the bodies POSTed to `url`.
    #[must_use]
    pub fn posted_bodies(&self, url: &str) -> Vec<String> {
        self.requests
            .lock()
            .iter()
            .filter(|r| r.method == Method::Post && r.url == url)
            .filter_map(|r| r.body.clone())
            .collect()
    }

    fn answer(&self, method: Method, url: &Url, body: Option<String>) -> HttpResponse {
        self.requests.lock().push(RecordedRequest {
            method,
            url: url.to_string(),
            body,
        });

        let mut routes = self.routes.lock();
        match routes.get_mut(&(method, url.to_string())) {
            Some(queue) if queue.len() > 1 => queue.pop_front().unwrap_or_else(not_found),
            Some(queue) => queue.front().cloned().unwrap_or_else(not_found),
            None => not_found(),
        }
    }
}

fn not_found() -> HttpResponse {
    HttpResponse::new(404, "")
}

#[async_trait]
impl Transport for ScriptedTransport {
    async fn get(&self, url: &Url) -> Result<HttpResponse, StageError> {
        Ok(self.answer(Method::Get, url, None))
    }

    async fn head(&self, url: &Url) -> Result<u16, StageError> {
        Ok(self.answer(Method::Head, url, None).status)
    }

    async fn post_xml(&self, url: &Url, body: String) -> Result<HttpResponse, StageError> {
        Ok(self.answer(Method::Post, url, Some(body)))
    }
}
