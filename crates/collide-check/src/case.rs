use serde_json::Value;
use std::collections::BTreeMap;
use tracing::debug;

use crate::endpoint::Endpoint;
use crate::errors::{CaseError, PrepareError};
use crate::expectation::Expectation;
use crate::transport::PreparedRequest;
use crate::validation::BaseUrl;

/// Values pulled out of earlier responses in the same run, keyed by name.
///
/// Cases refer to them as `{{name}}` inside path parameters, query values and
/// JSON string values of the body.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Captures(BTreeMap<String, Value>);

impl Captures {
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.0.get(name)
    }

    pub fn insert(&mut self, name: impl Into<String>, value: Value) {
        self.0.insert(name.into(), value);
    }

    /// Replace every `{{name}}` reference inside `template`
    pub fn substitute(&self, template: &str) -> Result<String, PrepareError> {
        let mut rendered = String::with_capacity(template.len());
        let mut rest = template;

        while let Some(start) = rest.find("{{") {
            let Some(len) = rest[start + 2..].find("}}") else {
                break;
            };
            let name = rest[start + 2..start + 2 + len].trim();
            let value = self
                .get(name)
                .ok_or_else(|| PrepareError::MissingCapture(name.to_string()))?;

            rendered.push_str(&rest[..start]);
            match value {
                Value::String(text) => rendered.push_str(text),
                other => rendered.push_str(&other.to_string()),
            }
            rest = &rest[start + 2 + len + 2..];
        }

        rendered.push_str(rest);
        Ok(rendered)
    }

    /// Substitute references throughout a JSON body. A string that is exactly
    /// one reference takes the captured value with its JSON type.
    pub fn substitute_json(&self, template: &Value) -> Result<Value, PrepareError> {
        match template {
            Value::String(text) => match whole_reference(text) {
                Some(name) => self
                    .get(name)
                    .cloned()
                    .ok_or_else(|| PrepareError::MissingCapture(name.to_string())),
                None => self.substitute(text).map(Value::String),
            },
            Value::Array(items) => items
                .iter()
                .map(|item| self.substitute_json(item))
                .collect::<Result<Vec<_>, _>>()
                .map(Value::Array),
            Value::Object(fields) => fields
                .iter()
                .map(|(key, value)| Ok((key.clone(), self.substitute_json(value)?)))
                .collect::<Result<serde_json::Map<_, _>, _>>()
                .map(Value::Object),
            other => Ok(other.clone()),
        }
    }
}

fn whole_reference(text: &str) -> Option<&str> {
    let name = text.strip_prefix("{{")?.strip_suffix("}}")?;
    (!name.contains("{{") && !name.contains("}}")).then(|| name.trim())
}

/// Store a value from a passing response under `name`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Capture {
    pub name: String,
    /// JSON pointer into the whole response body
    pub pointer: String,
}

#[derive(Debug, Clone)]
pub struct TestCase {
    pub name: String,
    pub endpoint: &'static Endpoint,
    pub path_params: BTreeMap<String, String>,
    pub query: Vec<(String, String)>,
    pub body: Option<Value>,
    pub expectation: Expectation,
    pub captures: Vec<Capture>,
}

impl TestCase {
    pub fn builder(name: impl Into<String>, endpoint: &'static Endpoint) -> CaseBuilder {
        CaseBuilder {
            name: name.into(),
            endpoint,
            path_params: BTreeMap::new(),
            query: Vec::new(),
            body: None,
            captures: Vec::new(),
        }
    }

    /// Resolve captures and build the concrete request
    pub fn prepare(
        &self,
        base_url: &BaseUrl,
        captures: &Captures,
    ) -> Result<PreparedRequest, PrepareError> {
        let mut resolved = BTreeMap::new();
        for (key, value) in &self.path_params {
            resolved.insert(key.as_str(), captures.substitute(value)?);
        }

        // Each template segment is pushed separately so a parameter value is
        // always exactly one encoded path segment.
        let mut url = base_url
            .endpoint_url("/")
            .map_err(|err| PrepareError::InvalidUrl(err.to_string()))?;
        {
            let mut segments = url.path_segments_mut().map_err(|_| {
                PrepareError::InvalidUrl(format!("{base_url} cannot take a path"))
            })?;
            segments.pop_if_empty();
            for segment in self.endpoint.path.split('/').skip(1) {
                match segment.strip_prefix('{').and_then(|s| s.strip_suffix('}')) {
                    Some(name) => {
                        let value = resolved.get(name).ok_or_else(|| {
                            PrepareError::InvalidUrl(format!("placeholder `{name}` is not bound"))
                        })?;
                        segments.push(value);
                    }
                    None => {
                        segments.push(segment);
                    }
                }
            }
        }

        if !self.query.is_empty() {
            let mut pairs = url.query_pairs_mut();
            for (key, value) in &self.query {
                pairs.append_pair(key, &captures.substitute(value)?);
            }
        }

        let body = self
            .body
            .as_ref()
            .map(|body| captures.substitute_json(body))
            .transpose()?;

        Ok(PreparedRequest {
            method: self.endpoint.method.clone(),
            url,
            body,
        })
    }

    /// Request line for display, before any capture is resolved
    pub fn describe_request(&self) -> String {
        format!("{} {}", self.endpoint.method, self.request_target())
    }

    /// Path and query as written in the case
    pub fn request_target(&self) -> String {
        let path = self
            .endpoint
            .render_path(|name| self.path_params.get(name).map(String::as_str))
            .unwrap_or_else(|_| self.endpoint.path.to_string());

        let query = self
            .query
            .iter()
            .map(|(key, value)| format!("{key}={value}"))
            .collect::<Vec<_>>()
            .join("&");

        if query.is_empty() {
            path
        } else {
            format!("{path}?{query}")
        }
    }
}

pub struct CaseBuilder {
    name: String,
    endpoint: &'static Endpoint,
    path_params: BTreeMap<String, String>,
    query: Vec<(String, String)>,
    body: Option<Value>,
    captures: Vec<Capture>,
}

impl CaseBuilder {
    pub fn path_param(mut self, name: impl Into<String>, value: impl ToString) -> Self {
        self.path_params.insert(name.into(), value.to_string());
        self
    }

    pub fn query(mut self, key: impl Into<String>, value: impl ToString) -> Self {
        self.query.push((key.into(), value.to_string()));
        self
    }

    pub fn body(mut self, body: Value) -> Self {
        self.body = Some(body);
        self
    }

    pub fn capture(mut self, name: impl Into<String>, pointer: impl Into<String>) -> Self {
        self.captures.push(Capture {
            name: name.into(),
            pointer: pointer.into(),
        });
        self
    }

    /// Check the case against the endpoint's schema and finish it
    pub fn expect(self, expectation: Expectation) -> Result<TestCase, CaseError> {
        let endpoint = self.endpoint;

        if let Some(param) = self
            .path_params
            .keys()
            .find(|param| !endpoint.has_placeholder(param))
        {
            return Err(CaseError::UnknownPathParam {
                endpoint: endpoint.name,
                param: param.clone(),
            });
        }

        if let Some(placeholder) = endpoint
            .placeholders()
            .find(|placeholder| !self.path_params.contains_key(*placeholder))
        {
            return Err(CaseError::UnboundPlaceholder {
                endpoint: endpoint.name,
                placeholder: placeholder.to_string(),
            });
        }

        if let Some((key, _)) = self
            .query
            .iter()
            .find(|(key, _)| !endpoint.accepts_query(key))
        {
            return Err(CaseError::UnknownQueryParam {
                endpoint: endpoint.name,
                key: key.clone(),
            });
        }

        if let Some(body) = &self.body {
            if !endpoint.accepts_body() {
                return Err(CaseError::UnexpectedBody(endpoint.name));
            }
            let fields = body
                .as_object()
                .ok_or(CaseError::BodyNotObject(endpoint.name))?;
            if let Some(field) = fields.keys().find(|field| !endpoint.accepts_field(field)) {
                return Err(CaseError::UnknownBodyField {
                    endpoint: endpoint.name,
                    field: field.clone(),
                });
            }

            let missing = endpoint.missing_required(fields);
            if !missing.is_empty() {
                debug!(case = %self.name, ?missing, "Case omits required body fields");
            }
        }

        Ok(TestCase {
            name: self.name,
            endpoint,
            path_params: self.path_params,
            query: self.query,
            body: self.body,
            expectation,
            captures: self.captures,
        })
    }
}
