use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use strum::{AsRefStr, Display, EnumIter, EnumString, IntoStaticStr};
use uuid::Uuid;

use crate::error::FailureKind;

/// Maximum number of characters kept from a query when deriving a session title
pub const TITLE_MAX_CHARS: usize = 30;

/// Internal application events for coordinating between the TUI and background tasks
#[derive(Debug)]
pub enum AppEvent {
    /// A backend query finished
    QueryFinished {
        pending: crate::conversation::PendingQuery,
        result: Result<WorkflowAnswer, FailureKind>,
    },
}

/// Role the caller speaks as; forwarded to the backend as `user_id`
#[derive(
    Debug,
    Clone,
    Copy,
    Default,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    EnumString,
    EnumIter,
    AsRefStr,
    IntoStaticStr,
    Display,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
pub enum UserRole {
    #[default]
    Employee,
    Hr,
    Manager,
}

impl UserRole {
    pub fn display_name(&self) -> &'static str {
        match self {
            UserRole::Employee => "Employee",
            UserRole::Hr => "HR",
            UserRole::Manager => "Manager",
        }
    }
}

/// Which session the conversation view is showing
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum ActiveSession {
    /// No session exists yet for the current conversation
    #[default]
    NewChat,
    Session(String),
}

impl ActiveSession {
    pub fn id(&self) -> Option<&str> {
        match self {
            ActiveSession::NewChat => None,
            ActiveSession::Session(id) => Some(id),
        }
    }

    pub fn is_new_chat(&self) -> bool {
        matches!(self, ActiveSession::NewChat)
    }
}

/// A named, persisted conversation thread
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Session {
    pub id: String,
    pub title: String,
    pub active: bool,
}

/// Cut a query down to a sidebar title. The query is taken as typed.
pub fn truncate_title(text: &str) -> String {
    if text.chars().count() > TITLE_MAX_CHARS {
        let head: String = text.chars().take(TITLE_MAX_CHARS).collect();
        format!("{}...", head)
    } else {
        text.to_string()
    }
}

/// Role in conversation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageRole {
    User,
    Assistant,
}

impl MessageRole {
    pub fn prefix(&self) -> &'static str {
        match self {
            MessageRole::User => "user",
            MessageRole::Assistant => "assistant",
        }
    }
}

/// Provenance triple attached to an answer.
///
/// The backend copies these straight out of document metadata, so any field
/// may be `null` and pages may arrive as whole floats (`3.0`).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SourceCitation {
    #[serde(default, deserialize_with = "null_as_default")]
    pub source: String,
    #[serde(
        default,
        deserialize_with = "lenient_page",
        skip_serializing_if = "Option::is_none"
    )]
    pub page: Option<i64>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub section: String,
}

/// Individual conversation entry
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Message {
    pub id: String,
    pub role: MessageRole,
    pub content: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sources: Option<Vec<SourceCitation>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub confidence_score: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub confidence_level: Option<String>,
}

impl Message {
    fn new(role: MessageRole, content: String) -> Self {
        Self {
            id: format!("{}-{}", role.prefix(), Uuid::new_v4()),
            role,
            content,
            sources: None,
            confidence_score: None,
            confidence_level: None,
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self::new(MessageRole::User, content.into())
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self::new(MessageRole::Assistant, content.into())
    }

    /// Assistant message built from a successful backend answer
    pub fn from_answer(answer: WorkflowAnswer) -> Self {
        let mut message = Self::assistant(answer.answer);
        message.sources = Some(answer.sources);
        message.confidence_score = answer.confidence_score;
        message.confidence_level = answer.confidence_level;
        message
    }

    /// Assistant message standing in for a failed query
    pub fn from_failure(failure: &FailureKind) -> Self {
        Self::assistant(failure.user_message())
    }

    pub fn is_user(&self) -> bool {
        self.role == MessageRole::User
    }

    pub fn is_assistant(&self) -> bool {
        self.role == MessageRole::Assistant
    }
}

/// Answer payload of a successful backend query.
///
/// Denied, escalated and off-topic queries carry `message` (and sometimes
/// `partial_answer`) instead of `answer`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct WorkflowAnswer {
    #[serde(default, deserialize_with = "null_as_default")]
    pub answer: String,
    #[serde(default, deserialize_with = "lenient_sources")]
    pub sources: Vec<SourceCitation>,
    #[serde(default)]
    pub confidence_score: Option<f64>,
    #[serde(default)]
    pub confidence_level: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub partial_answer: Option<String>,
}

impl WorkflowAnswer {
    /// Make `answer` the text to show, falling back to the backend's
    /// explanation and any partial answer.
    pub fn resolve(mut self) -> Result<Self, FailureKind> {
        if !self.answer.trim().is_empty() {
            return Ok(self);
        }

        let message = self.message.take().filter(|m| !m.trim().is_empty());
        let partial = self.partial_answer.take().filter(|p| !p.trim().is_empty());
        self.answer = match (message, partial) {
            (Some(message), Some(partial)) => format!("{}\n\nPartial answer: {}", message, partial),
            (Some(message), None) => message,
            (None, Some(partial)) => partial,
            (None, None) => return Err(FailureKind::EmptyResponse),
        };
        Ok(self)
    }
}

fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

/// Integers, whole floats and numeric strings; anything else is no page.
fn lenient_page<'de, D>(deserializer: D) -> Result<Option<i64>, D::Error>
where
    D: Deserializer<'de>,
{
    let whole = |f: f64| (f.is_finite() && f.fract() == 0.0).then_some(f as i64);
    let page = match Option::<Value>::deserialize(deserializer)? {
        Some(Value::Number(n)) => n.as_i64().or_else(|| n.as_f64().and_then(whole)),
        Some(Value::String(s)) => s.trim().parse::<f64>().ok().and_then(whole),
        _ => None,
    };
    Ok(page)
}

/// Keep every citation that decodes; skip the rest.
fn lenient_sources<'de, D>(deserializer: D) -> Result<Vec<SourceCitation>, D::Error>
where
    D: Deserializer<'de>,
{
    let Some(Value::Array(items)) = Option::<Value>::deserialize(deserializer)? else {
        return Ok(Vec::new());
    };

    Ok(items
        .into_iter()
        .filter_map(|item| match serde_json::from_value(item) {
            Ok(citation) => Some(citation),
            Err(e) => {
                tracing::debug!(error = %e, "skipping malformed source citation");
                None
            }
        })
        .collect())
}
