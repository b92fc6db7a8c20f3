//! Inbound Spinnaker event model.
//!
//! Spinnaker's `echo` service posts one JSON envelope per event:
//!
//! ```json
//! { "eventName": "spinnaker_events",
//!   "payload": { "details": { "source": "orca", "type": "orca:pipeline:complete",
//!                             "created": "1700000000000" },
//!                "content": { "execution": { "name": "deploy", "application": "billing" } } } }
//! ```
//!
//! The envelope is read loosely first ([`Envelope`]) so that a wrong
//! `eventName` or an absent `payload` can be answered with a 400. Only then is
//! the payload read into the typed [`Payload`] tree.
//!
//! Every field of the tree is optional: which fields matter depends on the
//! event `source`/`type` pair, and the classifier decides what is required.
//! Scalar fields are read leniently (numbers and strings both accepted) and
//! flags follow JSON truthiness, because echo forwards whatever igor and orca
//! put into the event. A nested container of the wrong shape (a string where
//! an object belongs, `null` where a list belongs) reads as absent, so only a
//! rule that needs it can fail the request.

use serde::Deserialize;
use serde_json::Value;

use crate::errors::AuditError;

/// Sentinel `eventName` carried by every Spinnaker webhook event.
pub const SPINNAKER_EVENT_NAME: &str = "spinnaker_events";

// ---------------------------------------------------------------------------
// Envelope
// ---------------------------------------------------------------------------

/// Top-level inbound object, read before any payload structure is assumed.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Envelope {
    /// Must equal [`SPINNAKER_EVENT_NAME`].
    #[serde(default, deserialize_with = "lenient::text")]
    pub event_name: Option<String>,

    /// Raw payload; `null` is treated as absent.
    #[serde(default)]
    pub payload: Option<Value>,
}

/// An envelope that passed validation.
#[derive(Debug, Clone)]
pub struct SpinnakerEvent {
    /// The validated `eventName`, echoed back in the success response.
    pub event_name: String,
    /// The typed payload.
    pub payload: Payload,
}

impl Envelope {
    /// Parses an envelope from a raw request body.
    ///
    /// A body that is not a JSON object is a malformed envelope.
    pub fn from_slice(body: &[u8]) -> Result<Self, AuditError> {
        serde_json::from_slice(body).map_err(|_| AuditError::MalformedEnvelope)
    }

    /// Checks the envelope preconditions and reads the typed payload.
    ///
    /// # Errors
    ///
    /// - [`AuditError::MalformedEnvelope`] when `eventName` is not the
    ///   Spinnaker sentinel or `payload` is absent.
    /// - [`AuditError::MalformedPayload`] when `payload` does not fit the
    ///   event model (e.g. it is a string).
    pub fn validate(self) -> Result<SpinnakerEvent, AuditError> {
        let event_name = match self.event_name {
            Some(name) if name == SPINNAKER_EVENT_NAME => name,
            _ => return Err(AuditError::MalformedEnvelope),
        };
        let raw = self.payload.ok_or(AuditError::MalformedEnvelope)?;
        let payload = serde_json::from_value(raw).map_err(|e| AuditError::MalformedPayload {
            message: e.to_string(),
        })?;
        Ok(SpinnakerEvent {
            event_name,
            payload,
        })
    }
}

// ---------------------------------------------------------------------------
// Payload
// ---------------------------------------------------------------------------

/// `payload`: event details plus a source/type dependent content tree.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Payload {
    #[serde(default, deserialize_with = "lenient::object")]
    pub details: Option<Details>,
    #[serde(default, deserialize_with = "lenient::object")]
    pub content: Option<Content>,
}

impl Payload {
    /// `payload.details`, required by every event.
    pub fn details(&self) -> Result<&Details, AuditError> {
        self.details
            .as_ref()
            .ok_or(AuditError::MissingField { path: "details" })
    }

    /// `payload.content`, required by every event.
    pub fn content(&self) -> Result<&Content, AuditError> {
        self.content
            .as_ref()
            .ok_or(AuditError::MissingField { path: "content" })
    }
}

/// `payload.details`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Details {
    /// Emitting service: `igor`, `orca`, or a git provider (`github`, ...).
    #[serde(default, deserialize_with = "lenient::text")]
    pub source: Option<String>,

    /// Event type, e.g. `build`, `git`, `orca:stage:starting`.
    #[serde(rename = "type", default, deserialize_with = "lenient::text")]
    pub event_type: Option<String>,

    /// Creation time in epoch milliseconds (numeric string or number).
    #[serde(default, deserialize_with = "lenient::text")]
    pub created: Option<String>,
}

/// `payload.content`. Which fields are populated depends on the event type.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Content {
    // igor/build
    #[serde(default, deserialize_with = "lenient::object")]
    pub project: Option<Project>,

    // igor/docker
    #[serde(default, deserialize_with = "lenient::text")]
    pub tag: Option<String>,
    #[serde(default, deserialize_with = "lenient::text")]
    pub repository: Option<String>,
    #[serde(default, deserialize_with = "lenient::text")]
    pub registry: Option<String>,

    // git
    #[serde(default, deserialize_with = "lenient::text")]
    pub slug: Option<String>,
    #[serde(default, deserialize_with = "lenient::text")]
    pub repo_project: Option<String>,
    #[serde(default, deserialize_with = "lenient::text")]
    pub hash: Option<String>,
    #[serde(default, deserialize_with = "lenient::text")]
    pub branch: Option<String>,

    // orca
    /// `true` for ad-hoc operations run outside a pipeline definition.
    #[serde(default, deserialize_with = "lenient::flag")]
    pub standalone: bool,
    #[serde(default, deserialize_with = "lenient::object")]
    pub execution: Option<Execution>,
    #[serde(default, deserialize_with = "lenient::object")]
    pub context: Option<Context>,
}

impl Content {
    /// `content.project`, required by igor build events.
    pub fn project(&self) -> Result<&Project, AuditError> {
        self.project
            .as_ref()
            .ok_or(AuditError::MissingField {
                path: "content.project",
            })
    }

    /// `content.execution`, required by most orca events.
    pub fn execution(&self) -> Result<&Execution, AuditError> {
        self.execution
            .as_ref()
            .ok_or(AuditError::MissingField {
                path: "content.execution",
            })
    }

    /// `content.context`, required by stage and task events.
    pub fn context(&self) -> Result<&Context, AuditError> {
        self.context
            .as_ref()
            .ok_or(AuditError::MissingField {
                path: "content.context",
            })
    }

    /// `content.context.stageDetails`.
    pub fn stage_details(&self) -> Result<&StageDetails, AuditError> {
        self.context()?
            .stage_details
            .as_ref()
            .ok_or(AuditError::MissingField {
                path: "content.context.stageDetails",
            })
    }

    /// `content.context.stageDetails`, without requiring either level.
    pub fn stage_details_opt(&self) -> Option<&StageDetails> {
        self.context.as_ref().and_then(|c| c.stage_details.as_ref())
    }
}

/// A Jenkins project as reported by igor.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Project {
    #[serde(default, deserialize_with = "lenient::text")]
    pub name: Option<String>,
    #[serde(default, deserialize_with = "lenient::object")]
    pub last_build: Option<LastBuild>,
}

impl Project {
    /// `content.project.lastBuild`.
    pub fn last_build(&self) -> Result<&LastBuild, AuditError> {
        self.last_build.as_ref().ok_or(AuditError::MissingField {
            path: "content.project.lastBuild",
        })
    }
}

/// The build that triggered an igor build event.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct LastBuild {
    #[serde(default, deserialize_with = "lenient::text")]
    pub number: Option<String>,
    /// Build time in epoch milliseconds.
    #[serde(default, deserialize_with = "lenient::text")]
    pub timestamp: Option<String>,
    /// Jenkins result, e.g. `SUCCESS`, `FAILURE`, `UNSTABLE`, `ABORTED`.
    #[serde(default, deserialize_with = "lenient::text")]
    pub result: Option<String>,
}

// ---------------------------------------------------------------------------
// Execution
// ---------------------------------------------------------------------------

/// A pipeline run (or ad-hoc orchestration) instance.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Execution {
    #[serde(default, deserialize_with = "lenient::text")]
    pub name: Option<String>,
    #[serde(default, deserialize_with = "lenient::text")]
    pub application: Option<String>,
    #[serde(default, deserialize_with = "lenient::text")]
    pub description: Option<String>,
    #[serde(default, deserialize_with = "lenient::object")]
    pub authentication: Option<Authentication>,
    #[serde(default, deserialize_with = "lenient::object")]
    pub trigger: Option<Trigger>,
    #[serde(default, deserialize_with = "lenient::flag")]
    pub canceled: bool,
    #[serde(default, deserialize_with = "lenient::text")]
    pub canceled_by: Option<String>,
    #[serde(default, deserialize_with = "lenient::text")]
    pub cancellation_reason: Option<String>,
    #[serde(default, deserialize_with = "lenient::list")]
    pub stages: Vec<Stage>,
}

impl Execution {
    /// `content.execution.trigger`.
    pub fn trigger(&self) -> Result<&Trigger, AuditError> {
        self.trigger.as_ref().ok_or(AuditError::MissingField {
            path: "content.execution.trigger",
        })
    }

    /// `content.execution.stages[0]`, the operation of an ad-hoc execution.
    pub fn first_stage(&self) -> Result<&Stage, AuditError> {
        self.stages.first().ok_or(AuditError::MissingField {
            path: "content.execution.stages[0]",
        })
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Authentication {
    #[serde(default, deserialize_with = "lenient::text")]
    pub user: Option<String>,
}

/// What started an execution.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Trigger {
    /// Trigger kind, e.g. `manual`, `cron`, `jenkins`, `git`.
    #[serde(rename = "type", default, deserialize_with = "lenient::text")]
    pub trigger_type: Option<String>,
    /// Service account the execution runs as; wins over the authenticated user.
    #[serde(default, deserialize_with = "lenient::text")]
    pub run_as_user: Option<String>,
    /// Pipeline parameters, rendered as JSON in the audit message.
    #[serde(default)]
    pub parameters: Option<Value>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Stage {
    #[serde(rename = "type", default, deserialize_with = "lenient::text")]
    pub stage_type: Option<String>,
}

// ---------------------------------------------------------------------------
// Stage / task context
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Context {
    #[serde(default, deserialize_with = "lenient::object")]
    pub stage_details: Option<StageDetails>,
    /// Free-text reason given for an ad-hoc operation.
    #[serde(default, deserialize_with = "lenient::text")]
    pub reason: Option<String>,
    /// User who last acted on the stage (the judge of a manual judgment).
    #[serde(default, deserialize_with = "lenient::text")]
    pub last_modified_by: Option<String>,
    /// Option selected by the judge of a manual judgment.
    #[serde(default, deserialize_with = "lenient::text")]
    pub judgment_input: Option<String>,
    #[serde(default, deserialize_with = "lenient::object")]
    pub exception: Option<TaskException>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StageDetails {
    #[serde(default, deserialize_with = "lenient::text")]
    pub name: Option<String>,
    #[serde(rename = "type", default, deserialize_with = "lenient::text")]
    pub stage_type: Option<String>,
    /// Synthetic stages are generated by orca around user stages and are not
    /// audited on start.
    #[serde(default, deserialize_with = "lenient::flag")]
    pub is_synthetic: bool,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct TaskException {
    #[serde(default, deserialize_with = "lenient::object")]
    pub details: Option<TaskExceptionDetails>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct TaskExceptionDetails {
    #[serde(default, deserialize_with = "lenient::values")]
    pub errors: Option<Vec<Value>>,
}

impl Context {
    /// `exception.details.errors`, when its first element carries a value.
    pub fn failure_errors(&self) -> Option<&[Value]> {
        self.exception
            .as_ref()
            .and_then(|e| e.details.as_ref())
            .and_then(|d| d.errors.as_deref())
            .filter(|errors| errors.first().is_some_and(lenient::is_truthy))
    }
}

// ---------------------------------------------------------------------------
// Lenient field readers
// ---------------------------------------------------------------------------

pub(crate) mod lenient {
    use serde::de::DeserializeOwned;
    use serde::{Deserialize, Deserializer};
    use serde_json::Value;

    /// Reads any scalar as text. Numbers and booleans keep their JSON
    /// rendering; `null` is absent; objects and arrays are rendered as JSON.
    pub fn text<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let value = Option::<Value>::deserialize(deserializer)?;
        Ok(match value {
            None | Some(Value::Null) => None,
            Some(Value::String(s)) => Some(s),
            Some(other) => Some(other.to_string()),
        })
    }

    /// Reads a nested object. Anything that is not an object is absent.
    pub fn object<'de, D, T>(deserializer: D) -> Result<Option<T>, D::Error>
    where
        D: Deserializer<'de>,
        T: DeserializeOwned,
    {
        Ok(match Option::<Value>::deserialize(deserializer)? {
            Some(value @ Value::Object(_)) => serde_json::from_value(value).ok(),
            _ => None,
        })
    }

    /// Reads a list of objects. A non-list is empty; an element that is not
    /// an object keeps its position as the default value.
    pub fn list<'de, D, T>(deserializer: D) -> Result<Vec<T>, D::Error>
    where
        D: Deserializer<'de>,
        T: DeserializeOwned + Default,
    {
        Ok(match Option::<Value>::deserialize(deserializer)? {
            Some(Value::Array(items)) => items
                .into_iter()
                .map(|item| match item {
                    Value::Object(_) => serde_json::from_value(item).unwrap_or_default(),
                    _ => T::default(),
                })
                .collect(),
            _ => Vec::new(),
        })
    }

    /// Reads a raw JSON list. Anything that is not a list is absent.
    pub fn values<'de, D>(deserializer: D) -> Result<Option<Vec<Value>>, D::Error>
    where
        D: Deserializer<'de>,
    {
        Ok(match Option::<Value>::deserialize(deserializer)? {
            Some(Value::Array(items)) => Some(items),
            _ => None,
        })
    }

    /// Reads a flag with JSON truthiness.
    pub fn flag<'de, D>(deserializer: D) -> Result<bool, D::Error>
    where
        D: Deserializer<'de>,
    {
        let value = Option::<Value>::deserialize(deserializer)?;
        Ok(value.as_ref().is_some_and(is_truthy))
    }

    /// `false`, `null`, `0` and `""` are falsy; everything else is truthy.
    pub fn is_truthy(value: &Value) -> bool {
        match value {
            Value::Null => false,
            Value::Bool(b) => *b,
            Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0),
            Value::String(s) => !s.is_empty(),
            Value::Array(_) | Value::Object(_) => true,
        }
    }
}

pub(crate) use lenient::is_truthy;
