use std::fmt::{Display, Formatter};
use std::str::FromStr;
use log::{debug, warn};
use serde::Serialize;
use serde_json::Value;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("GITHUB_REF is not set")]
    MissingRef,

    #[error("unsupported event '{0}'")]
    UnsupportedEvent(String),

    #[error("read event payload {path}: {err}")]
    ReadEvent {
        err: std::io::Error,
        path: String,
    },

    #[error("parse event payload: {0}")]
    ParseEvent(#[from] serde_json::Error),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, clap::ValueEnum)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    Push,
    ManualDispatch,
    PullRequest,
    /// Any other GitHub event, such as `schedule` or `release`. Never deploys on its own.
    #[value(skip)]
    Other,
}

impl FromStr for EventKind {
    type Err = Error;

    /// Parse a GitHub Actions event name.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "push" => Ok(EventKind::Push),
            "workflow_dispatch" => Ok(EventKind::ManualDispatch),
            "pull_request" | "pull_request_target" => Ok(EventKind::PullRequest),
            other => Err(Error::UnsupportedEvent(other.to_string())),
        }
    }
}

impl Display for EventKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            EventKind::Push => "push",
            EventKind::ManualDispatch => "manual_dispatch",
            EventKind::PullRequest => "pull_request",
            EventKind::Other => "other",
        })
    }
}

/// Everything the pipeline tells us about why it is running.
#[derive(Debug, Clone, PartialEq)]
pub struct TriggerContext {
    pub git_ref: String,
    pub event_kind: EventKind,
    pub manual_environment: Option<String>,
    pub override_validation: bool,
    pub override_notes: Option<String>,
    pub actor: String,
}

impl TriggerContext {
    pub const UNKNOWN_ACTOR: &'static str = "unknown";

    pub fn new(git_ref: impl Into<String>, event_kind: EventKind) -> Self {
        Self {
            git_ref: git_ref.into(),
            event_kind,
            manual_environment: None,
            override_validation: false,
            override_notes: None,
            actor: Self::UNKNOWN_ACTOR.to_string(),
        }
    }

    /// Notes with surrounding whitespace removed, or `None` if there is nothing left.
    pub fn notes(&self) -> Option<&str> {
        self.override_notes.as_deref().map(str::trim).filter(|n| !n.is_empty())
    }

    /// Read the trigger from a GitHub Actions runner environment.
    ///
    /// `event` replaces `GITHUB_EVENT_NAME`, which is then not read at all. An event name
    /// envgate does not know becomes [EventKind::Other].
    ///
    /// Dispatch inputs (`environment`, `override_validation`, `override_notes`) are taken
    /// from the event payload at `GITHUB_EVENT_PATH`, if there is one.
    pub fn from_github_env(event: Option<EventKind>) -> Result<Self, Error> {
        let git_ref = std::env::var("GITHUB_REF").map_err(|_| Error::MissingRef)?;
        let event_kind = match (event, std::env::var("GITHUB_EVENT_NAME")) {
            (Some(event), _) => event,
            (None, Ok(name)) => name.parse().unwrap_or_else(|err| {
                warn!("{err}, treating it as a non-deploying trigger");
                EventKind::Other
            }),
            (None, Err(_)) => EventKind::Push,
        };

        let mut context = Self::new(git_ref, event_kind);
        if let Ok(actor) = std::env::var("GITHUB_ACTOR") {
            context.actor = actor;
        }

        if let Ok(path) = std::env::var("GITHUB_EVENT_PATH") {
            let payload = std::fs::read_to_string(&path).map_err(|err| Error::ReadEvent {
                err,
                path: path.clone(),
            })?;
            debug!("Reading dispatch inputs from {path}");
            context.apply_dispatch_inputs(&serde_json::from_str(&payload)?);
        }

        Ok(context)
    }

    fn apply_dispatch_inputs(&mut self, payload: &Value) {
        let Some(inputs) = payload.get("inputs") else {
            return;
        };

        self.manual_environment = input_string(inputs, "environment");
        self.override_notes = input_string(inputs, "override_notes");
        self.override_validation = match inputs.get("override_validation") {
            Some(Value::Bool(b)) => *b,
            Some(Value::String(s)) => s.trim().eq_ignore_ascii_case("true"),
            _ => false,
        };
    }
}

fn input_string(inputs: &Value, name: &str) -> Option<String> {
    inputs
        .get(name)
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(String::from)
}
