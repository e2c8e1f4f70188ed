//! Value types for the request builders and their wire formats.
//!
//! Parameter structs ([`CompletionParams`], [`ReportParams`]) are what callers
//! build; the `*Body` structs are the exact JSON documents that go on the wire.
//! [`ActivationResponse`] is the envelope returned by the activation endpoint.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{AccountId, ModelName};

/// Map of file name to file contents sent alongside a request.
pub type Sources = BTreeMap<String, String>;

// ---------------------------------------------------------------------------
// Sampling
// ---------------------------------------------------------------------------

/// Sampling temperature in the range `[0.0, 2.0]`.
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Temperature(f64);

impl Temperature {
    /// Creates a [`Temperature`], returning `None` if `value` is outside
    /// `[0.0, 2.0]` or not finite.
    #[must_use]
    pub fn new(value: f64) -> Option<Self> {
        if value.is_finite() && (0.0..=2.0).contains(&value) {
            Some(Self(value))
        } else {
            None
        }
    }

    /// Returns the temperature as an `f64`.
    pub fn as_f64(self) -> f64 {
        self.0
    }
}

impl std::fmt::Display for Temperature {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:.2}", self.0)
    }
}

// ---------------------------------------------------------------------------
// Inference call
// ---------------------------------------------------------------------------

/// Caller-supplied parameters of an inference call.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct CompletionParams {
    /// Files visible to the model, keyed by name.
    pub sources: Sources,
    /// Free-form description of what the user wants done.
    pub intent: String,
    /// Name of the function being edited, if any.
    pub function_name: String,
    /// Key into `sources` holding the cursor.
    pub cursor_file: String,
    /// Selection start (character offset).
    pub cursor0: u64,
    /// Selection end (character offset).
    pub cursor1: u64,
    pub max_tokens: u32,
    pub max_edits: u32,
    /// Stop sequences.
    pub stop_tokens: Vec<String>,
}

/// JSON body of `POST <inference-endpoint>`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CompletionBody<'a> {
    pub model: &'a ModelName,
    pub sources: &'a Sources,
    pub intent: &'a str,
    pub function: &'a str,
    pub cursor_file: &'a str,
    pub cursor0: u64,
    pub cursor1: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature: Option<Temperature>,
    pub max_tokens: u32,
    pub max_edits: u32,
    pub stop: &'a [String],
}

impl<'a> CompletionBody<'a> {
    /// Assembles the wire body from caller parameters and resolved settings.
    pub fn new(
        params: &'a CompletionParams,
        model: &'a ModelName,
        temperature: Option<Temperature>,
    ) -> Self {
        Self {
            model,
            sources: &params.sources,
            intent: &params.intent,
            function: &params.function_name,
            cursor_file: &params.cursor_file,
            cursor0: params.cursor0,
            cursor1: params.cursor1,
            temperature,
            max_tokens: params.max_tokens,
            max_edits: params.max_edits,
            stop: &params.stop_tokens,
        }
    }
}

// ---------------------------------------------------------------------------
// Report call
// ---------------------------------------------------------------------------

/// Feedback about a completion the user accepted or rejected.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ReportParams {
    /// `true` when the user kept the result.
    pub positive: bool,
    pub sources: Sources,
    /// Files as they looked after the edit.
    pub results: Sources,
    pub intent: String,
    pub function_name: String,
    pub cursor_file: String,
    pub cursor0: u64,
    pub cursor1: u64,
}

/// JSON body of `POST <report-endpoint>`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReportBody<'a> {
    pub positive: bool,
    pub sources: &'a Sources,
    pub results: &'a Sources,
    pub intent: &'a str,
    pub function: &'a str,
    pub cursor_file: &'a str,
    pub cursor0: u64,
    pub cursor1: u64,
}

impl<'a> From<&'a ReportParams> for ReportBody<'a> {
    fn from(params: &'a ReportParams) -> Self {
        Self {
            positive: params.positive,
            sources: &params.sources,
            results: &params.results,
            intent: &params.intent,
            function: &params.function_name,
            cursor_file: &params.cursor_file,
            cursor0: params.cursor0,
            cursor1: params.cursor1,
        }
    }
}

// ---------------------------------------------------------------------------
// Login call
// ---------------------------------------------------------------------------

/// Envelope returned by `GET <activation-endpoint>`, discriminated by `retcode`.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "retcode")]
pub enum ActivationResponse {
    #[serde(rename = "OK")]
    Ok {
        #[serde(default)]
        secret_api_key: Option<String>,
        #[serde(default)]
        fine_tune: Option<serde_json::Value>,
        #[serde(default)]
        account: Option<AccountId>,
    },
    #[serde(rename = "FAILED")]
    Failed {
        #[serde(default)]
        human_readable_message: String,
    },
}

/// What a login call achieved.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoginOutcome {
    /// The session already had an account; no request was made.
    AlreadyLoggedIn,
    /// The ticket was accepted. `account` is `None` when the server did not
    /// name one, in which case the session is left logged-out.
    LoggedIn { account: Option<AccountId> },
    /// The server answered `FAILED`.
    Rejected { message: String },
}

// ---------------------------------------------------------------------------
// Time
// ---------------------------------------------------------------------------

/// A UTC wall-clock timestamp.
///
/// Wraps [`chrono::DateTime<Utc>`] so callers never depend on `chrono` types
/// directly.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Timestamp(DateTime<Utc>);

impl Timestamp {
    /// Returns the current UTC time as a [`Timestamp`].
    pub fn now() -> Self {
        Self(Utc::now())
    }

    /// Returns the underlying [`DateTime<Utc>`].
    pub fn as_datetime(self) -> DateTime<Utc> {
        self.0
    }

    /// Milliseconds elapsed since this timestamp (zero if it lies in the future).
    pub fn elapsed_ms(self) -> i64 {
        (Utc::now() - self.0).num_milliseconds().max(0)
    }
}

impl std::fmt::Display for Timestamp {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0.to_rfc3339())
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn temperature_rejects_out_of_range() {
        assert!(Temperature::new(-0.1).is_none());
        assert!(Temperature::new(f64::NAN).is_none());
        assert!(Temperature::new(2.5).is_none());
        assert_eq!(Temperature::new(0.2).map(Temperature::as_f64), Some(0.2));
    }

    #[test]
    fn completion_body_uses_wire_field_names() {
        let params = CompletionParams {
            sources: Sources::from([("a.py".to_string(), "x = 1\n".to_string())]),
            intent: "rename x".to_string(),
            function_name: "main".to_string(),
            cursor_file: "a.py".to_string(),
            cursor0: 0,
            cursor1: 3,
            max_tokens: 50,
            max_edits: 1,
            stop_tokens: vec!["\n\n".to_string()],
        };
        let model = ModelName::new("CONTRASTcode/stable").expect("non-empty");
        let body = CompletionBody::new(&params, &model, Temperature::new(0.2));

        let value = serde_json::to_value(&body).expect("serialises");
        assert_eq!(
            value,
            json!({
                "model": "CONTRASTcode/stable",
                "sources": {"a.py": "x = 1\n"},
                "intent": "rename x",
                "function": "main",
                "cursor_file": "a.py",
                "cursor0": 0,
                "cursor1": 3,
                "temperature": 0.2,
                "max_tokens": 50,
                "max_edits": 1,
                "stop": ["\n\n"],
            })
        );
    }

    #[test]
    fn unset_temperature_is_omitted() {
        let params = CompletionParams::default();
        let model = ModelName::new("m").expect("non-empty");
        let value = serde_json::to_value(CompletionBody::new(&params, &model, None))
            .expect("serialises");
        assert!(value.get("temperature").is_none());
    }

    #[test]
    fn activation_envelope_is_discriminated_by_retcode() {
        let ok: ActivationResponse = serde_json::from_value(json!({
            "retcode": "OK",
            "secret_api_key": "abc",
            "account": "user@x",
        }))
        .expect("decodes");
        assert_eq!(
            ok,
            ActivationResponse::Ok {
                secret_api_key: Some("abc".to_string()),
                fine_tune: None,
                account: AccountId::new("user@x"),
            }
        );

        let bare: ActivationResponse =
            serde_json::from_value(json!({"retcode": "OK"})).expect("optional fields");
        assert_eq!(
            bare,
            ActivationResponse::Ok {
                secret_api_key: None,
                fine_tune: None,
                account: None,
            }
        );

        let failed: ActivationResponse = serde_json::from_value(json!({
            "retcode": "FAILED",
            "human_readable_message": "ticket expired",
        }))
        .expect("decodes");
        assert_eq!(
            failed,
            ActivationResponse::Failed {
                human_readable_message: "ticket expired".to_string()
            }
        );
    }
}
