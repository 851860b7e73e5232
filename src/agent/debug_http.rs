use std::collections::HashMap;

use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use reqwest::{Client, Method};
use serde::{Deserialize, Serialize};
use tokio::time::Instant;

pub(super) const MAX_DEBUG_BODY_BYTES: usize = 1 << 20;

/// One-off request executed synchronously by the debug endpoint.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DebugHttpRequest {
    #[serde(default)]
    pub method: String,
    #[serde(default)]
    pub url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub headers: Option<HashMap<String, Vec<String>>>,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub body: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DebugHttpResponse {
    pub status_code: u16,
    pub status: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub headers: Option<HashMap<String, Vec<String>>>,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub body: String,
}

/// Full request/response capture returned to the caller, including errors,
/// so a failed exchange is still a well-formed 200 payload.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DebugHttpExchange {
    pub request: DebugHttpRequest,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub response: Option<DebugHttpResponse>,
    #[serde(rename = "duration_ms")]
    pub duration_ms: i64,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub error: String,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub request_body_truncated: bool,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub response_body_truncated: bool,
}

/// Executes a debug exchange exactly like the sampler would, but
/// synchronously and with both sides of the exchange captured. Bodies are
/// truncated to 1 MiB with a flag.
pub(super) async fn perform_exchange(client: &Client, debug_req: DebugHttpRequest) -> DebugHttpExchange {
    let method_text = debug_req.method.trim().to_uppercase();
    let method_text = if method_text.is_empty() {
        "GET".to_owned()
    } else {
        method_text
    };

    let mut exchange = DebugHttpExchange {
        request: DebugHttpRequest {
            method: method_text.clone(),
            url: debug_req.url.clone(),
            headers: None,
            body: String::new(),
        },
        ..DebugHttpExchange::default()
    };

    let (request_body, request_truncated) = trim_body(&debug_req.body, MAX_DEBUG_BODY_BYTES);
    exchange.request.body = request_body.clone();
    exchange.request_body_truncated = request_truncated;

    let method = match Method::from_bytes(method_text.as_bytes()) {
        Ok(method) => method,
        Err(err) => {
            exchange.error = err.to_string();
            return exchange;
        }
    };

    let headers = match build_headers(debug_req.headers.as_ref()) {
        Ok(headers) => headers,
        Err(err) => {
            exchange.error = err;
            return exchange;
        }
    };
    if !headers.is_empty() {
        exchange.request.headers = Some(clone_headers(&headers));
    }

    let mut request = client.request(method, &debug_req.url).headers(headers);
    if !request_body.is_empty() {
        request = request.body(request_body);
    }

    let started = Instant::now();
    let response = match request.send().await {
        Ok(response) => response,
        Err(err) => {
            exchange.duration_ms = elapsed_ms(started);
            exchange.error = err.to_string();
            return exchange;
        }
    };

    let status = response.status();
    let response_headers = clone_headers(response.headers());

    let body_bytes = match response.bytes().await {
        Ok(body_bytes) => body_bytes,
        Err(err) => {
            exchange.duration_ms = elapsed_ms(started);
            exchange.error = err.to_string();
            return exchange;
        }
    };
    exchange.duration_ms = elapsed_ms(started);

    let body_text = String::from_utf8_lossy(&body_bytes).into_owned();
    let (body, truncated) = trim_body(&body_text, MAX_DEBUG_BODY_BYTES);
    exchange.response_body_truncated = truncated;
    exchange.response = Some(DebugHttpResponse {
        status_code: status.as_u16(),
        status: status.to_string(),
        headers: if response_headers.is_empty() {
            None
        } else {
            Some(response_headers)
        },
        body,
    });

    exchange
}

fn build_headers(
    headers: Option<&HashMap<String, Vec<String>>>,
) -> Result<HeaderMap, String> {
    let mut map = HeaderMap::new();
    let Some(headers) = headers else {
        return Ok(map);
    };

    for (key, values) in headers {
        let name: HeaderName = key
            .parse()
            .map_err(|_| format!("invalid header name {key:?}"))?;
        for value in values {
            let value: HeaderValue = value
                .parse()
                .map_err(|_| format!("invalid header value for {key:?}"))?;
            map.append(name.clone(), value);
        }
    }
    Ok(map)
}

fn clone_headers(headers: &HeaderMap) -> HashMap<String, Vec<String>> {
    let mut out: HashMap<String, Vec<String>> = HashMap::new();
    for (name, value) in headers {
        out.entry(name.as_str().to_owned())
            .or_default()
            .push(String::from_utf8_lossy(value.as_bytes()).into_owned());
    }
    out
}

fn trim_body(body: &str, max_len: usize) -> (String, bool) {
    if body.len() <= max_len {
        return (body.to_owned(), false);
    }
    let mut end = max_len;
    while end > 0 && !body.is_char_boundary(end) {
        end -= 1;
    }
    (body[..end].to_owned(), true)
}

fn elapsed_ms(started: Instant) -> i64 {
    i64::try_from(started.elapsed().as_millis()).unwrap_or(i64::MAX)
}
