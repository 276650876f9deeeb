use std::cell::OnceCell;
use std::collections::BTreeMap;
use std::time::Duration;

use dispatchr_common::error::PortError;
use reqwest::blocking::Client;
use reqwest::Method;
use tracing::debug;

use crate::ports::http::{HttpClient, HttpMethod, HttpRequest, HttpResponse};

/// Blocking HTTP client.
///
/// The underlying `reqwest` client is built on first use: a blocking client
/// must not be created or dropped on an async runtime thread, and most
/// contexts never send a request.
pub struct ReqwestClient {
    connect_timeout: Duration,
    timeout: Duration,
    client: OnceCell<Client>,
}

impl ReqwestClient {
    pub fn new(connect_timeout: Duration, timeout: Duration) -> Self {
        Self {
            connect_timeout,
            timeout,
            client: OnceCell::new(),
        }
    }

    fn client(&self, url: &str) -> Result<&Client, PortError> {
        if let Some(client) = self.client.get() {
            return Ok(client);
        }
        let client = Client::builder()
            .connect_timeout(self.connect_timeout)
            .timeout(self.timeout)
            .build()
            .map_err(|error| http_error(url, error))?;
        Ok(self.client.get_or_init(|| client))
    }
}

impl HttpClient for ReqwestClient {
    fn send(&self, request: HttpRequest) -> Result<HttpResponse, PortError> {
        let HttpRequest {
            method,
            url,
            headers,
            body,
        } = request;
        debug!(%method, %url, "sending request");

        let mut builder = self.client(&url)?.request(to_method(method), &url);
        for (name, value) in &headers {
            builder = builder.header(name, value);
        }
        if let Some(body) = body {
            builder = builder.body(body);
        }

        let response = builder.send().map_err(|error| http_error(&url, error))?;
        let status = response.status().as_u16();
        let headers: BTreeMap<String, String> = response
            .headers()
            .iter()
            .filter_map(|(name, value)| {
                value
                    .to_str()
                    .ok()
                    .map(|value| (name.as_str().to_owned(), value.to_owned()))
            })
            .collect();
        let body = response.text().map_err(|error| http_error(&url, error))?;

        debug!(%url, status, "response received");
        Ok(HttpResponse {
            status,
            headers,
            body,
        })
    }
}

fn to_method(method: HttpMethod) -> Method {
    match method {
        HttpMethod::Get => Method::GET,
        HttpMethod::Post => Method::POST,
        HttpMethod::Put => Method::PUT,
        HttpMethod::Patch => Method::PATCH,
        HttpMethod::Delete => Method::DELETE,
    }
}

fn http_error(url: &str, error: reqwest::Error) -> PortError {
    PortError::Http {
        url: url.to_owned(),
        message: error.to_string(),
    }
}
