use http::StatusCode;
use serde_json::Value;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use crate::case::Captures;
use crate::envelope::Envelope;
use crate::transport::RawResponse;

const RAW_EXCERPT_CHARS: usize = 200;

#[derive(Debug, Clone, PartialEq)]
pub enum ResponseBody {
    Json(Value),
    Text(String),
    Empty,
}

impl ResponseBody {
    pub fn json(&self) -> Option<&Value> {
        match self {
            ResponseBody::Json(value) => Some(value),
            _ => None,
        }
    }

    pub fn text(&self) -> Option<&str> {
        match self {
            ResponseBody::Text(text) => Some(text),
            _ => None,
        }
    }
}

/// A response as the expectations see it
#[derive(Debug, Clone, PartialEq)]
pub struct Observation {
    pub status: StatusCode,
    pub body: ResponseBody,
    pub elapsed: Duration,
}

impl Observation {
    /// Bodies are decoded only when the collaborator declares JSON. A body that
    /// claims JSON but does not parse is kept as text.
    pub fn from_raw(raw: RawResponse) -> Self {
        let declares_json = raw
            .content_type
            .as_deref()
            .is_some_and(|content_type| content_type.to_ascii_lowercase().contains("json"));

        let body = if raw.body.trim().is_empty() {
            ResponseBody::Empty
        } else if declares_json {
            match serde_json::from_str(&raw.body) {
                Ok(value) => ResponseBody::Json(value),
                Err(_) => ResponseBody::Text(raw.body),
            }
        } else {
            ResponseBody::Text(raw.body)
        };

        Self {
            status: raw.status,
            body,
            elapsed: raw.elapsed,
        }
    }

    pub fn envelope(&self) -> Option<Envelope> {
        Envelope::from_value(self.body.json()?)
    }
}

/// Result of applying an expectation to an observation
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Judgement {
    Pass(String),
    /// Failed, but the expectation was advisory
    Warn(String),
    Fail(String),
    /// The response could not be read the way the expectation needs
    Mismatch(String),
}

impl Judgement {
    pub fn is_pass(&self) -> bool {
        matches!(self, Judgement::Pass(_))
    }

    pub fn detail(&self) -> &str {
        match self {
            Judgement::Pass(detail)
            | Judgement::Warn(detail)
            | Judgement::Fail(detail)
            | Judgement::Mismatch(detail) => detail,
        }
    }

    fn severity(&self) -> u8 {
        match self {
            Judgement::Pass(_) => 0,
            Judgement::Warn(_) => 1,
            Judgement::Fail(_) => 2,
            Judgement::Mismatch(_) => 3,
        }
    }
}

pub type Predicate = dyn Fn(&Observation) -> Judgement + Send + Sync;

#[derive(Clone)]
pub enum Expectation {
    /// HTTP 200 and `success == true`
    Success,
    /// HTTP 200 and `success == false`
    Failure { require_message: bool },
    Status(StatusCode),
    /// Either a non-200 status or a 200 with `success == false`
    Rejected,
    /// Success, and `data` at `pointer` equals `equals`
    DataField { pointer: String, equals: Value },
    /// Success, and `data` equals the value captured under `capture`
    SameData { capture: String },
    All(Vec<Expectation>),
    Advisory(Box<Expectation>),
    Custom {
        name: String,
        predicate: Arc<Predicate>,
    },
}

impl fmt::Debug for Expectation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Expectation::Custom { name, .. } => f.debug_tuple("Custom").field(name).finish(),
            Expectation::All(inner) => f.debug_tuple("All").field(inner).finish(),
            Expectation::Advisory(inner) => f.debug_tuple("Advisory").field(inner).finish(),
            other => f.write_str(&other.describe()),
        }
    }
}

impl Expectation {
    pub fn success() -> Self {
        Expectation::Success
    }

    pub fn failure() -> Self {
        Expectation::Failure {
            require_message: false,
        }
    }

    pub fn failure_with_message() -> Self {
        Expectation::Failure {
            require_message: true,
        }
    }

    pub fn status(status: StatusCode) -> Self {
        Expectation::Status(status)
    }

    pub fn rejected() -> Self {
        Expectation::Rejected
    }

    pub fn data_field(pointer: impl Into<String>, equals: impl Into<Value>) -> Self {
        Expectation::DataField {
            pointer: pointer.into(),
            equals: equals.into(),
        }
    }

    pub fn same_data(capture: impl Into<String>) -> Self {
        Expectation::SameData {
            capture: capture.into(),
        }
    }

    pub fn all(expectations: Vec<Expectation>) -> Self {
        Expectation::All(expectations)
    }

    pub fn advisory(self) -> Self {
        Expectation::Advisory(Box::new(self))
    }

    pub fn custom<F>(name: impl Into<String>, predicate: F) -> Self
    where
        F: Fn(&Observation) -> Judgement + Send + Sync + 'static,
    {
        Expectation::Custom {
            name: name.into(),
            predicate: Arc::new(predicate),
        }
    }

    /// One-line human description
    pub fn describe(&self) -> String {
        match self {
            Expectation::Success => "HTTP 200 with success=true".to_string(),
            Expectation::Failure {
                require_message: true,
            } => "HTTP 200 with success=false and a message".to_string(),
            Expectation::Failure { .. } => "HTTP 200 with success=false".to_string(),
            Expectation::Status(status) => format!("HTTP {}", status.as_u16()),
            Expectation::Rejected => "rejected (non-200 or success=false)".to_string(),
            Expectation::DataField { pointer, equals } => format!("data{pointer} == {equals}"),
            Expectation::SameData { capture } => format!("data equals captured `{capture}`"),
            Expectation::All(inner) => inner
                .iter()
                .map(Expectation::describe)
                .collect::<Vec<_>>()
                .join(" and "),
            Expectation::Advisory(inner) => format!("{} (advisory)", inner.describe()),
            Expectation::Custom { name, .. } => name.clone(),
        }
    }

    /// Names of the captures this expectation compares against
    pub fn required_captures(&self) -> Vec<&str> {
        match self {
            Expectation::SameData { capture } => vec![capture.as_str()],
            Expectation::All(inner) => inner
                .iter()
                .flat_map(Expectation::required_captures)
                .collect(),
            Expectation::Advisory(inner) => inner.required_captures(),
            _ => Vec::new(),
        }
    }

    pub fn evaluate(&self, observation: &Observation, captures: &Captures) -> Judgement {
        match self {
            Expectation::Success => match ok_envelope(observation) {
                Ok(envelope) if envelope.success => Judgement::Pass("success=true".to_string()),
                Ok(envelope) => Judgement::Fail(format!(
                    "success=false: {}",
                    envelope.message().unwrap_or("<no message>")
                )),
                Err(judgement) => judgement,
            },
            Expectation::Failure { require_message } => match ok_envelope(observation) {
                Ok(envelope) if envelope.success => {
                    Judgement::Fail("expected success=false, got success=true".to_string())
                }
                Ok(envelope) => match envelope.message() {
                    Some(message) => Judgement::Pass(format!("success=false: {message}")),
                    None if *require_message => {
                        Judgement::Fail("success=false but the message is empty".to_string())
                    }
                    None => Judgement::Pass("success=false".to_string()),
                },
                Err(judgement) => judgement,
            },
            Expectation::Status(expected) => {
                if observation.status == *expected {
                    Judgement::Pass(format!("HTTP {}", expected.as_u16()))
                } else {
                    Judgement::Fail(format!(
                        "expected HTTP {}, got {}: {}",
                        expected.as_u16(),
                        observation.status.as_u16(),
                        excerpt(observation)
                    ))
                }
            }
            Expectation::Rejected => {
                if observation.status != StatusCode::OK {
                    return Judgement::Pass(format!(
                        "rejected with HTTP {}",
                        observation.status.as_u16()
                    ));
                }
                match ok_envelope(observation) {
                    Ok(envelope) if envelope.success => Judgement::Fail(
                        "expected a rejection, but the request succeeded".to_string(),
                    ),
                    Ok(envelope) => Judgement::Pass(format!(
                        "rejected: {}",
                        envelope.message().unwrap_or("<no message>")
                    )),
                    Err(judgement) => judgement,
                }
            }
            Expectation::DataField { pointer, equals } => match success_envelope(observation) {
                Ok(envelope) => match envelope.data_at(pointer) {
                    Some(actual) if actual == equals => {
                        Judgement::Pass(format!("data{pointer} == {equals}"))
                    }
                    Some(actual) => {
                        Judgement::Fail(format!("data{pointer} is {actual}, expected {equals}"))
                    }
                    None => Judgement::Fail(format!("data{pointer} is missing")),
                },
                Err(judgement) => judgement,
            },
            Expectation::SameData { capture } => match success_envelope(observation) {
                Ok(envelope) => {
                    let Some(expected) = captures.get(capture) else {
                        return Judgement::Fail(format!("no captured value named `{capture}`"));
                    };
                    let actual = envelope.data.unwrap_or(Value::Null);
                    if &actual == expected {
                        Judgement::Pass(format!("data matches `{capture}`"))
                    } else {
                        Judgement::Fail(format!("data differs from `{capture}`"))
                    }
                }
                Err(judgement) => judgement,
            },
            Expectation::All(inner) => {
                let judgements: Vec<Judgement> = inner
                    .iter()
                    .map(|expectation| expectation.evaluate(observation, captures))
                    .collect();
                match judgements.iter().max_by_key(|j| j.severity()) {
                    Some(worst) if !worst.is_pass() => worst.clone(),
                    _ => Judgement::Pass(
                        judgements
                            .iter()
                            .map(Judgement::detail)
                            .collect::<Vec<_>>()
                            .join("; "),
                    ),
                }
            }
            Expectation::Advisory(inner) => match inner.evaluate(observation, captures) {
                Judgement::Fail(detail) => Judgement::Warn(detail),
                other => other,
            },
            Expectation::Custom { predicate, .. } => predicate(observation),
        }
    }
}

/// Envelope of a 200 response, or the judgement explaining why there is none
fn ok_envelope(observation: &Observation) -> Result<Envelope, Judgement> {
    if observation.status != StatusCode::OK {
        return Err(Judgement::Fail(format!(
            "expected HTTP 200, got {}: {}",
            observation.status.as_u16(),
            excerpt(observation)
        )));
    }

    if observation.body.json().is_none() {
        return Err(Judgement::Mismatch(format!(
            "expected a JSON envelope, got: {}",
            excerpt(observation)
        )));
    }

    observation.envelope().ok_or_else(|| {
        Judgement::Mismatch(format!(
            "JSON body is not a response envelope: {}",
            excerpt(observation)
        ))
    })
}

fn success_envelope(observation: &Observation) -> Result<Envelope, Judgement> {
    let envelope = ok_envelope(observation)?;
    if envelope.success {
        Ok(envelope)
    } else {
        Err(Judgement::Fail(format!(
            "success=false: {}",
            envelope.message().unwrap_or("<no message>")
        )))
    }
}

fn excerpt(observation: &Observation) -> String {
    let raw = match &observation.body {
        ResponseBody::Json(value) => value.to_string(),
        ResponseBody::Text(text) => text.clone(),
        ResponseBody::Empty => return "<empty body>".to_string(),
    };

    if raw.chars().count() > RAW_EXCERPT_CHARS {
        let cut: String = raw.chars().take(RAW_EXCERPT_CHARS).collect();
        format!("{cut}...")
    } else {
        raw
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn observe(status: u16, body: Value) -> Observation {
        Observation {
            status: StatusCode::from_u16(status).unwrap(),
            body: ResponseBody::Json(body),
            elapsed: Duration::from_millis(3),
        }
    }

    fn observe_text(status: u16, text: &str) -> Observation {
        Observation {
            status: StatusCode::from_u16(status).unwrap(),
            body: ResponseBody::Text(text.to_string()),
            elapsed: Duration::from_millis(3),
        }
    }

    fn judge(expectation: &Expectation, observation: &Observation) -> Judgement {
        expectation.evaluate(observation, &Captures::default())
    }

    #[test]
    fn test_from_raw_decodes_declared_json() {
        let observation = Observation::from_raw(RawResponse {
            status: StatusCode::OK,
            content_type: Some("application/json;charset=UTF-8".to_string()),
            body: r#"{"success":true}"#.to_string(),
            elapsed: Duration::ZERO,
        });
        assert_eq!(observation.body, ResponseBody::Json(json!({"success": true})));
    }

    #[test]
    fn test_from_raw_keeps_undecodable_json_as_text() {
        let observation = Observation::from_raw(RawResponse {
            status: StatusCode::OK,
            content_type: Some("application/json".to_string()),
            body: "{not json".to_string(),
            elapsed: Duration::ZERO,
        });
        assert_eq!(observation.body, ResponseBody::Text("{not json".to_string()));
    }

    #[test]
    fn test_from_raw_does_not_decode_plain_text() {
        let observation = Observation::from_raw(RawResponse {
            status: StatusCode::BAD_REQUEST,
            content_type: Some("text/plain".to_string()),
            body: r#"{"looks":"like json"}"#.to_string(),
            elapsed: Duration::ZERO,
        });
        assert!(observation.body.text().is_some());
    }

    #[test]
    fn test_from_raw_empty_body() {
        let observation = Observation::from_raw(RawResponse {
            status: StatusCode::NO_CONTENT,
            content_type: None,
            body: String::new(),
            elapsed: Duration::ZERO,
        });
        assert_eq!(observation.body, ResponseBody::Empty);
    }

    #[test]
    fn test_success_requires_both_status_and_flag() {
        let expectation = Expectation::success();

        assert!(judge(&expectation, &observe(200, json!({"success": true}))).is_pass());
        assert!(matches!(
            judge(&expectation, &observe(200, json!({"success": false, "message": "nope"}))),
            Judgement::Fail(_)
        ));
        assert!(matches!(
            judge(&expectation, &observe(500, json!({"success": true}))),
            Judgement::Fail(_)
        ));
    }

    #[test]
    fn test_success_on_text_body_is_mismatch() {
        let judgement = judge(&Expectation::success(), &observe_text(200, "<html>oops</html>"));
        assert!(matches!(judgement, Judgement::Mismatch(_)));
        assert!(judgement.detail().contains("<html>oops</html>"));
    }

    #[test]
    fn test_success_on_foreign_json_is_mismatch() {
        let judgement = judge(&Expectation::success(), &observe(200, json!({"ok": 1})));
        assert!(matches!(judgement, Judgement::Mismatch(_)));
    }

    #[test]
    fn test_failure_with_message() {
        let expectation = Expectation::failure_with_message();

        assert_eq!(
            judge(
                &expectation,
                &observe(200, json!({"success": false, "message": "content not found"}))
            ),
            Judgement::Pass("success=false: content not found".to_string())
        );
        assert!(matches!(
            judge(&expectation, &observe(200, json!({"success": false}))),
            Judgement::Fail(_)
        ));
        assert!(judge(&Expectation::failure(), &observe(200, json!({"success": false}))).is_pass());
        assert!(matches!(
            judge(&expectation, &observe(200, json!({"success": true}))),
            Judgement::Fail(_)
        ));
    }

    #[test]
    fn test_status_expectation() {
        let expectation = Expectation::status(StatusCode::BAD_REQUEST);

        assert!(judge(&expectation, &observe_text(400, "Bad Request")).is_pass());
        assert!(matches!(
            judge(&expectation, &observe(200, json!({"success": false}))),
            Judgement::Fail(_)
        ));
    }

    #[test]
    fn test_advisory_turns_failure_into_warning() {
        let expectation = Expectation::status(StatusCode::BAD_REQUEST).advisory();

        assert!(judge(&expectation, &observe_text(400, "Bad Request")).is_pass());
        assert!(matches!(
            judge(&expectation, &observe(200, json!({"success": false}))),
            Judgement::Warn(_)
        ));
    }

    #[test]
    fn test_rejected_accepts_either_form() {
        let expectation = Expectation::rejected();

        assert!(judge(&expectation, &observe(400, json!({"error": "userId"}))).is_pass());
        assert!(judge(&expectation, &observe_text(500, "boom")).is_pass());
        assert!(
            judge(
                &expectation,
                &observe(200, json!({"success": false, "message": "userId is required"}))
            )
            .is_pass()
        );
        assert!(matches!(
            judge(&expectation, &observe(200, json!({"success": true, "data": {"id": 1}}))),
            Judgement::Fail(_)
        ));
        assert!(matches!(
            judge(&expectation, &observe_text(200, "created")),
            Judgement::Mismatch(_)
        ));
    }

    #[test]
    fn test_data_field() {
        let expectation = Expectation::data_field("/id", 107);

        assert!(
            judge(
                &expectation,
                &observe(200, json!({"success": true, "data": {"id": 107}}))
            )
            .is_pass()
        );
        assert!(matches!(
            judge(
                &expectation,
                &observe(200, json!({"success": true, "data": {"id": 108}}))
            ),
            Judgement::Fail(_)
        ));
        assert!(matches!(
            judge(&expectation, &observe(200, json!({"success": true}))),
            Judgement::Fail(_)
        ));
    }

    #[test]
    fn test_same_data_compares_with_capture() {
        let mut captures = Captures::default();
        captures.insert("first_page", json!({"records": [1, 2], "total": 2}));
        let expectation = Expectation::same_data("first_page");

        let same = observe(
            200,
            json!({"success": true, "data": {"records": [1, 2], "total": 2}}),
        );
        let different = observe(
            200,
            json!({"success": true, "data": {"records": [1], "total": 1}}),
        );

        assert!(expectation.evaluate(&same, &captures).is_pass());
        assert!(matches!(
            expectation.evaluate(&different, &captures),
            Judgement::Fail(_)
        ));
        assert!(matches!(
            expectation.evaluate(&same, &Captures::default()),
            Judgement::Fail(_)
        ));
    }

    #[test]
    fn test_all_reports_worst_judgement() {
        let expectation =
            Expectation::all(vec![Expectation::success(), Expectation::data_field("/id", 107)]);

        let passing = observe(200, json!({"success": true, "data": {"id": 107}}));
        assert_eq!(
            judge(&expectation, &passing),
            Judgement::Pass("success=true; data/id == 107".to_string())
        );

        let failing = observe(200, json!({"success": true, "data": {"id": 5}}));
        assert!(matches!(judge(&expectation, &failing), Judgement::Fail(_)));
    }

    #[test]
    fn test_custom_predicate() {
        let expectation = Expectation::custom("fast enough", |observation| {
            if observation.elapsed < Duration::from_secs(1) {
                Judgement::Pass("fast".to_string())
            } else {
                Judgement::Fail("slow".to_string())
            }
        });

        assert!(judge(&expectation, &observe(200, json!({}))).is_pass());
        assert_eq!(expectation.describe(), "fast enough");
    }

    #[test]
    fn test_describe() {
        assert_eq!(
            Expectation::status(StatusCode::BAD_REQUEST)
                .advisory()
                .describe(),
            "HTTP 400 (advisory)"
        );
        assert_eq!(
            Expectation::all(vec![Expectation::success(), Expectation::data_field("/id", 107)])
                .describe(),
            "HTTP 200 with success=true and data/id == 107"
        );
    }

    #[test]
    fn test_required_captures_look_inside_combinators() {
        let expectation = Expectation::all(vec![
            Expectation::success(),
            Expectation::same_data("first_page").advisory(),
            Expectation::same_data("second_page"),
        ]);
        assert_eq!(
            expectation.required_captures(),
            vec!["first_page", "second_page"]
        );
        assert!(Expectation::success().required_captures().is_empty());
    }

    #[test]
    fn test_long_bodies_are_truncated_in_details() {
        let long = "x".repeat(500);
        let judgement = judge(&Expectation::success(), &observe_text(200, &long));
        assert!(judgement.detail().ends_with("..."));
        assert!(judgement.detail().len() < 300);
    }
}
