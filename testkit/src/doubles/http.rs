use std::cell::RefCell;
use std::collections::VecDeque;

use dispatchr_common::error::PortError;
use dispatchr_core::ports::http::{HttpClient, HttpRequest, HttpResponse};

/// Replies from a queue of canned responses, then falls back to a default.
pub struct StubHttpClient {
    queued: RefCell<VecDeque<Result<HttpResponse, PortError>>>,
    fallback: HttpResponse,
    requests: RefCell<Vec<HttpRequest>>,
}

impl StubHttpClient {
    /// Answers every request with `fallback` unless a reply is queued.
    pub fn new(fallback: HttpResponse) -> Self {
        Self {
            queued: RefCell::default(),
            fallback,
            requests: RefCell::default(),
        }
    }

    pub fn reply(self, response: Result<HttpResponse, PortError>) -> Self {
        self.queued.borrow_mut().push_back(response);
        self
    }

    pub fn requests(&self) -> Vec<HttpRequest> {
        self.requests.borrow().clone()
    }
}

impl Default for StubHttpClient {
    fn default() -> Self {
        Self::new(HttpResponse::new(200, ""))
    }
}

impl HttpClient for StubHttpClient {
    fn send(&self, request: HttpRequest) -> Result<HttpResponse, PortError> {
        self.requests.borrow_mut().push(request);
        self.queued
            .borrow_mut()
            .pop_front()
            .unwrap_or_else(|| Ok(self.fallback.clone()))
    }
}
