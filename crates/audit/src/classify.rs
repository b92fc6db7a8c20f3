//! Event classification and audit message formatting.
//!
//! Classification runs in two steps:
//!
//! 1. **Match.** [`RULES`] is an ordered table of predicates over the event's
//!    source, type and content. The first rule that matches decides the
//!    [`EventKind`]; later rules are not evaluated. An event no rule matches
//!    produces no entry.
//! 2. **Render.** The kind selects a message template, a [`Severity`] and
//!    whether the execution's application/pipeline are attached.
//!
//! Both steps read nested structure on demand. A rule whose guard matches but
//! whose required container (`execution`, `context`, `stageDetails`, ...) is
//! absent fails with [`AuditError::MissingField`]; no entry is produced.

use serde_json::Value;
use tracing::debug;

use crate::event::{is_truthy, Content, Execution, Payload, SpinnakerEvent};
use crate::time::TimestampFormatter;
use crate::{AuditError, LogEntry, Severity};

const MANUAL_JUDGMENT: &str = "manualJudgment";
const MISSING: &str = "n/a";

// ---------------------------------------------------------------------------
// Event kinds
// ---------------------------------------------------------------------------

/// The audit template an event maps to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    /// igor reported a finished Jenkins build.
    JenkinsBuild,
    /// igor saw a new Docker tag.
    DockerPush,
    /// A git provider webhook reached Spinnaker.
    GitPush,
    /// A user stage of a pipeline started.
    StageStarting,
    /// An ad-hoc (standalone) operation started.
    AdHocStageStarting,
    /// A pipeline execution started.
    PipelineStarting,
    /// A pipeline was canceled by a named user.
    PipelineCanceled,
    /// A canceled pipeline reported failure without a canceler.
    PipelineFailed,
    /// A pipeline completed.
    PipelineComplete,
    /// A manual judgment stopped the pipeline.
    JudgmentStopped,
    /// A manual judgment let the pipeline continue.
    JudgmentContinued,
    /// A task of a pipeline stage failed.
    TaskFailed,
    /// A task of an ad-hoc operation failed.
    AdHocTaskFailed,
}

// ---------------------------------------------------------------------------
// Rule table
// ---------------------------------------------------------------------------

/// The fields every rule inspects.
#[derive(Debug, Clone, Copy)]
pub struct EventFacts<'a> {
    pub source: &'a str,
    pub event_type: &'a str,
    pub content: &'a Content,
}

impl<'a> EventFacts<'a> {
    pub fn from_payload(payload: &'a Payload) -> Result<Self, AuditError> {
        let details = payload.details()?;
        Ok(Self {
            source: details.source.as_deref().unwrap_or_default(),
            event_type: details.event_type.as_deref().unwrap_or_default(),
            content: payload.content()?,
        })
    }

    fn is_manual_judgment(&self) -> bool {
        !self.content.standalone
            && self
                .content
                .stage_details_opt()
                .and_then(|d| d.stage_type.as_deref())
                == Some(MANUAL_JUDGMENT)
    }
}

pub type RuleResult = Result<Option<EventKind>, AuditError>;

/// One entry of the dispatch table.
pub struct Rule {
    /// Short name, recorded when the rule matches.
    pub name: &'static str,
    pub matches: fn(&EventFacts<'_>) -> RuleResult,
}

/// Dispatch table, evaluated in order; the first match wins.
pub const RULES: &[Rule] = &[
    Rule {
        name: "igor-build",
        matches: |f| Ok((f.source == "igor" && f.event_type == "build").then_some(EventKind::JenkinsBuild)),
    },
    Rule {
        name: "igor-docker",
        matches: |f| Ok((f.source == "igor" && f.event_type == "docker").then_some(EventKind::DockerPush)),
    },
    Rule {
        name: "git",
        matches: |f| Ok((f.event_type == "git").then_some(EventKind::GitPush)),
    },
    Rule {
        name: "stage-starting",
        matches: |f| {
            if f.event_type != "orca:stage:starting" || f.content.stage_details()?.is_synthetic {
                return Ok(None);
            }
            Ok(Some(if f.content.standalone {
                EventKind::AdHocStageStarting
            } else {
                EventKind::StageStarting
            }))
        },
    },
    Rule {
        name: "pipeline-starting",
        matches: |f| Ok((f.event_type == "orca:pipeline:starting").then_some(EventKind::PipelineStarting)),
    },
    Rule {
        name: "pipeline-canceled",
        matches: |f| {
            if f.event_type != "orca:pipeline:failed" {
                return Ok(None);
            }
            let execution = f.content.execution()?;
            if !execution.canceled {
                return Ok(None);
            }
            Ok(Some(if present(&execution.canceled_by).is_some() {
                EventKind::PipelineCanceled
            } else {
                EventKind::PipelineFailed
            }))
        },
    },
    Rule {
        name: "pipeline-complete",
        matches: |f| Ok((f.event_type == "orca:pipeline:complete").then_some(EventKind::PipelineComplete)),
    },
    Rule {
        name: "judgment-stopped",
        matches: |f| {
            Ok((f.is_manual_judgment() && f.event_type == "orca:stage:failed")
                .then_some(EventKind::JudgmentStopped))
        },
    },
    Rule {
        name: "judgment-continued",
        matches: |f| {
            Ok((f.is_manual_judgment() && f.event_type == "orca:stage:complete")
                .then_some(EventKind::JudgmentContinued))
        },
    },
    Rule {
        name: "task-failed",
        matches: |f| {
            if f.event_type != "orca:task:failed" {
                return Ok(None);
            }
            Ok(Some(if f.content.standalone {
                EventKind::AdHocTaskFailed
            } else {
                EventKind::TaskFailed
            }))
        },
    },
];

/// Runs the rule table and returns the first matching kind with its rule name.
pub fn match_kind(facts: &EventFacts<'_>) -> Result<Option<(&'static str, EventKind)>, AuditError> {
    for rule in RULES {
        if let Some(kind) = (rule.matches)(facts)? {
            return Ok(Some((rule.name, kind)));
        }
    }
    Ok(None)
}

// ---------------------------------------------------------------------------
// Classifier
// ---------------------------------------------------------------------------

/// Maps validated Spinnaker events to audit log entries.
pub struct Classifier {
    formatter: Box<dyn TimestampFormatter>,
}

impl std::fmt::Debug for Classifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Classifier").finish_non_exhaustive()
    }
}

impl Classifier {
    pub fn new(formatter: impl TimestampFormatter + 'static) -> Self {
        Self {
            formatter: Box::new(formatter),
        }
    }

    /// Classifies one event.
    ///
    /// Returns `Ok(None)` when no rule matches. The result depends only on the
    /// event: the same event always yields the same entry.
    pub fn classify(&self, event: &SpinnakerEvent) -> Result<Option<LogEntry>, AuditError> {
        let facts = EventFacts::from_payload(&event.payload)?;
        let Some((rule, kind)) = match_kind(&facts)? else {
            debug!(
                source = facts.source,
                event_type = facts.event_type,
                "No audit rule matched"
            );
            return Ok(None);
        };
        debug!(rule, ?kind, "Audit rule matched");

        let renderer = Renderer {
            facts: &facts,
            created: event
                .payload
                .details
                .as_ref()
                .and_then(|d| d.created.as_deref()),
            formatter: self.formatter.as_ref(),
        };
        renderer.render(kind).map(Some)
    }
}

// ---------------------------------------------------------------------------
// Rendering
// ---------------------------------------------------------------------------

struct Renderer<'a> {
    facts: &'a EventFacts<'a>,
    created: Option<&'a str>,
    formatter: &'a dyn TimestampFormatter,
}

impl Renderer<'_> {
    fn created(&self) -> Result<String, AuditError> {
        self.formatter.format_raw(self.created, "details.created")
    }

    fn render(&self, kind: EventKind) -> Result<LogEntry, AuditError> {
        let content = self.facts.content;
        let entry = match kind {
            EventKind::JenkinsBuild => {
                let project = content.project()?;
                let build = project.last_build()?;
                let at = self
                    .formatter
                    .format_raw(build.timestamp.as_deref(), "content.project.lastBuild.timestamp")?;
                let name = shown(&project.name);
                let number = shown(&build.number);
                match build.result.as_deref() {
                    Some("SUCCESS") => LogEntry::new(
                        format!(
                            "Spinnaker: Jenkins project {name} successfully completed build #{number} at {at}."
                        ),
                        Severity::Info,
                    ),
                    result => LogEntry::new(
                        format!(
                            "Spinnaker: Jenkins project {name} build #{number} finished with status {} at {at}.",
                            result.unwrap_or(MISSING)
                        ),
                        Severity::Error,
                    ),
                }
            }
            EventKind::DockerPush => LogEntry::new(
                format!(
                    "Spinnaker: Docker tag {} was pushed to repository {} in registry {} at {}.",
                    shown(&content.tag),
                    shown(&content.repository),
                    shown(&content.registry),
                    self.created()?
                ),
                Severity::Info,
            ),
            EventKind::GitPush => LogEntry::new(
                format!(
                    "Spinnaker: Received webhook for project {} in org {} from {} at commit {} on branch {} at {}.",
                    shown(&content.slug),
                    shown(&content.repo_project),
                    self.facts.source,
                    shown(&content.hash),
                    shown(&content.branch),
                    self.created()?
                ),
                Severity::Info,
            ),
            EventKind::StageStarting => {
                let stage = content.stage_details()?;
                let execution = content.execution()?;
                with_execution(
                    LogEntry::new(
                        format!(
                            "Spinnaker: User {} executed operation {} (of type {}) via pipeline {} of application {} at {}.",
                            acting_user(content),
                            shown(&stage.name),
                            shown(&stage.stage_type),
                            shown(&execution.name),
                            shown(&execution.application),
                            self.created()?
                        ),
                        Severity::Info,
                    ),
                    execution,
                )
            }
            EventKind::AdHocStageStarting => {
                let execution = content.execution()?;
                let operation = execution.first_stage()?;
                let reason = present(&content.context()?.reason)
                    .map(|r| format!(" for reason \"{r}\""))
                    .unwrap_or_default();
                LogEntry::new(
                    format!(
                        "Spinnaker: User {} executed ad-hoc operation {} ({}){reason} at {}.",
                        acting_user(content),
                        shown(&operation.stage_type),
                        shown(&execution.description),
                        self.created()?
                    ),
                    Severity::Info,
                )
            }
            EventKind::PipelineStarting => {
                let execution = content.execution()?;
                let trigger = execution.trigger()?;
                let parameters = trigger
                    .parameters
                    .as_ref()
                    .filter(|p| is_truthy(p))
                    .map(|p| format!(" (with parameters {})", render_json(p)))
                    .unwrap_or_default();
                with_execution(
                    LogEntry::new(
                        format!(
                            "Spinnaker: User {} executed pipeline {} of application {} via {} trigger{parameters} at {}.",
                            acting_user(content),
                            shown(&execution.name),
                            shown(&execution.application),
                            shown(&trigger.trigger_type),
                            self.created()?
                        ),
                        Severity::Info,
                    ),
                    execution,
                )
            }
            EventKind::PipelineCanceled => {
                let execution = content.execution()?;
                let reason = present(&execution.cancellation_reason)
                    .map(|r| format!(" for reason \"{r}\""))
                    .unwrap_or_default();
                with_execution(
                    LogEntry::new(
                        format!(
                            "Spinnaker: User {} canceled pipeline {} of application {}{reason} at {}.",
                            shown(&execution.canceled_by),
                            shown(&execution.name),
                            shown(&execution.application),
                            self.created()?
                        ),
                        Severity::Warning,
                    ),
                    execution,
                )
            }
            EventKind::PipelineFailed => {
                let execution = content.execution()?;
                with_execution(
                    LogEntry::new(
                        format!(
                            "Spinnaker: Pipeline {} of application {} failed at {}.",
                            shown(&execution.name),
                            shown(&execution.application),
                            self.created()?
                        ),
                        Severity::Error,
                    ),
                    execution,
                )
            }
            EventKind::PipelineComplete => {
                let execution = content.execution()?;
                with_execution(
                    LogEntry::new(
                        format!(
                            "Spinnaker: Pipeline {} of application {} completed at {}.",
                            shown(&execution.name),
                            shown(&execution.application),
                            self.created()?
                        ),
                        Severity::Info,
                    ),
                    execution,
                )
            }
            EventKind::JudgmentStopped => {
                let context = content.context()?;
                let stage = content.stage_details()?;
                let execution = content.execution()?;
                with_execution(
                    LogEntry::new(
                        format!(
                            "Spinnaker: User {} judged stage {} of pipeline {} to stop at {}.",
                            shown(&context.last_modified_by),
                            shown(&stage.name),
                            shown(&execution.name),
                            self.created()?
                        ),
                        Severity::Warning,
                    ),
                    execution,
                )
            }
            // Unlike a stop judgment, a continue judgment carries no
            // application/pipeline attributes.
            EventKind::JudgmentContinued => {
                let context = content.context()?;
                let stage = content.stage_details()?;
                let execution = content.execution()?;
                let judgment = present(&context.judgment_input)
                    .map(|j| format!(" (judgment \"{j}\" was selected)"))
                    .unwrap_or_default();
                LogEntry::new(
                    format!(
                        "Spinnaker: User {} judged stage {} of pipeline {} of application {} to continue{judgment} at {}.",
                        shown(&context.last_modified_by),
                        shown(&stage.name),
                        shown(&execution.name),
                        shown(&execution.application),
                        self.created()?
                    ),
                    Severity::default(),
                )
            }
            EventKind::TaskFailed => {
                let due_to = self.failure_reason()?;
                let stage = content.stage_details()?;
                let execution = content.execution()?;
                with_execution(
                    LogEntry::new(
                        format!(
                            "Spinnaker: Operation {} (of type {}) of pipeline {} of application {} failed{due_to} at {}.",
                            shown(&stage.name),
                            shown(&stage.stage_type),
                            shown(&execution.name),
                            shown(&execution.application),
                            self.created()?
                        ),
                        Severity::Error,
                    ),
                    execution,
                )
            }
            EventKind::AdHocTaskFailed => {
                let due_to = self.failure_reason()?;
                let stage = content.stage_details()?;
                LogEntry::new(
                    format!(
                        "Spinnaker: Ad-hoc operation {} failed{due_to} at {}.",
                        shown(&stage.stage_type),
                        self.created()?
                    ),
                    Severity::Error,
                )
            }
        };
        Ok(entry)
    }

    fn failure_reason(&self) -> Result<String, AuditError> {
        Ok(self
            .facts
            .content
            .context()?
            .failure_errors()
            .map(|errors| format!(" due to {}", render_json(&Value::from(errors.to_vec()))))
            .unwrap_or_default())
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn with_execution(entry: LogEntry, execution: &Execution) -> LogEntry {
    entry.with_attributes(execution.application.as_deref(), execution.name.as_deref())
}

/// The user an orca event is attributed to: the trigger's `runAsUser` when
/// set, else the authenticated user, else `n/a`.
fn acting_user(content: &Content) -> &str {
    let execution = content.execution.as_ref();
    execution
        .and_then(|e| e.trigger.as_ref())
        .and_then(|t| present(&t.run_as_user))
        .or_else(|| {
            execution
                .and_then(|e| e.authentication.as_ref())
                .and_then(|a| present(&a.user))
        })
        .unwrap_or(MISSING)
}

fn present(value: &Option<String>) -> Option<&str> {
    value.as_deref().filter(|v| !v.is_empty())
}

fn shown(value: &Option<String>) -> &str {
    value.as_deref().unwrap_or(MISSING)
}

fn render_json(value: &Value) -> String {
    serde_json::to_string(value).unwrap_or_else(|_| value.to_string())
}
