use std::sync::Arc;
use std::time::SystemTime;

use async_trait::async_trait;
use reqwest::{Client, Method, StatusCode};
use serde_json::{json, Map, Value};
use tokio::time::Instant;
use tracing::debug;

use crate::error::ExecError;
use crate::exec::{ExecContext, RateGate};
use crate::plan::{
    as_float, as_string, as_string_list, ElementBase, Executable, Serializable, TestElement,
};
use crate::stats::SampleResult;

use super::extract::apply_extractors;

/// Leaf element issuing one rate-gated HTTP request per invocation.
pub struct HttpSampler {
    base: ElementBase,
    url: String,
    method: String,
    body: String,
    /// Zero inherits the thread group's published default rate.
    target_rps: f64,
    extract_vars: Vec<String>,
}

impl HttpSampler {
    #[must_use]
    pub fn new(name: &str, method: &str, url: &str) -> Self {
        Self {
            base: ElementBase::new(name),
            url: url.to_owned(),
            method: method.to_owned(),
            body: String::new(),
            target_rps: 0.0,
            extract_vars: Vec::new(),
        }
    }

    pub fn set_body(&mut self, body: String) {
        self.body = body;
    }

    pub fn set_target_rps(&mut self, target_rps: f64) {
        self.target_rps = target_rps;
    }

    pub fn set_extract_vars(&mut self, extract_vars: Vec<String>) {
        self.extract_vars = extract_vars;
    }

    pub fn factory(name: &str, props: &Map<String, Value>) -> Box<dyn TestElement> {
        Box::new(Self {
            base: ElementBase::new(name),
            url: as_string(props, "Url", "http://localhost"),
            method: as_string(props, "Method", "GET"),
            body: as_string(props, "Body", ""),
            target_rps: as_float(props, "TargetRPS", 0.0),
            extract_vars: as_string_list(props, "ExtractVars"),
        })
    }
}

impl TestElement for HttpSampler {
    fn base(&self) -> &ElementBase {
        &self.base
    }

    fn base_mut(&mut self) -> &mut ElementBase {
        &mut self.base
    }

    fn clone_element(&self) -> Arc<dyn TestElement> {
        Arc::new(Self {
            base: self.base.clone_base(),
            url: self.url.clone(),
            method: self.method.clone(),
            body: self.body.clone(),
            target_rps: self.target_rps,
            extract_vars: self.extract_vars.clone(),
        })
    }

    fn as_executable(&self) -> Option<&dyn Executable> {
        Some(self)
    }

    fn as_serializable(&self) -> Option<&dyn Serializable> {
        Some(self)
    }
}

impl Serializable for HttpSampler {
    fn type_tag(&self) -> &'static str {
        "HttpSampler"
    }

    fn props(&self) -> Map<String, Value> {
        let mut props = Map::new();
        props.insert("Url".to_owned(), json!(self.url));
        props.insert("Method".to_owned(), json!(self.method));
        props.insert("Body".to_owned(), json!(self.body));
        props.insert("TargetRPS".to_owned(), json!(self.target_rps));
        props.insert("ExtractVars".to_owned(), json!(self.extract_vars));
        props
    }
}

#[async_trait]
impl Executable for HttpSampler {
    async fn execute(&self, ctx: &ExecContext) -> Result<(), ExecError> {
        if ctx.rate_gate(self.id(), self.target_rps).await? == RateGate::Skip {
            return Ok(());
        }

        let url = ctx.substitute(&self.url);
        let method_text = ctx.substitute(&self.method);
        let body = ctx.substitute(&self.body);

        debug!("Sampler {:?} request: {} {}", self.name(), method_text, url);

        let method = parse_method(&method_text)?;

        let start_wall = SystemTime::now();
        let started = Instant::now();

        let outcome = tokio::select! {
            () = ctx.cancelled() => return Err(ExecError::Cancelled),
            outcome = send_request(ctx.http(), method, &url, &body) => outcome,
        };

        let mut result = SampleResult {
            sampler_name: self.name().to_owned(),
            start_time: start_wall,
            end_time: SystemTime::now(),
            latency: started.elapsed(),
            response_code: String::new(),
            success: false,
            error: None,
            bytes_received: 0,
        };

        match outcome {
            Err(err) => {
                result.error = Some(err.to_string());
            }
            Ok((status, body_bytes)) => {
                result.response_code = status.to_string();
                result.success = status.as_u16() >= 200 && status.as_u16() < 400;
                result.bytes_received = body_bytes.len() as u64;

                if !self.extract_vars.is_empty() {
                    let body_text = String::from_utf8_lossy(&body_bytes);
                    apply_extractors(ctx, self.name(), &self.extract_vars, &body_text);
                }
            }
        }

        ctx.report(result);
        Ok(())
    }
}

fn parse_method(method: &str) -> Result<Method, ExecError> {
    let trimmed = method.trim();
    if trimmed.is_empty() {
        return Ok(Method::GET);
    }
    Method::from_bytes(trimmed.to_uppercase().as_bytes()).map_err(|_| ExecError::InvalidMethod {
        method: method.to_owned(),
    })
}

async fn send_request(
    client: &Client,
    method: Method,
    url: &str,
    body: &str,
) -> Result<(StatusCode, Vec<u8>), reqwest::Error> {
    let mut request = client.request(method, url);
    if !body.is_empty() {
        request = request.body(body.to_owned());
    }

    let response = request.send().await?;
    let status = response.status();
    let body_bytes = response.bytes().await?;
    Ok((status, body_bytes.to_vec()))
}
