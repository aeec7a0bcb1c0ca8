use {
    chrono::{DateTime, Utc},
    serde::{Deserialize, Serialize},
    serde_json::Value,
    std::fmt,
    uuid::Uuid,
};

/// The handful of events the supervisor records to `service_runtime_log`
/// — operational history that lives alongside the reconciliation data
/// rather than only in the process's stdout (§4.8).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RuntimeLogKind {
    Startup,
    Shutdown,
    Heartbeat,
    LoopError,
}

impl RuntimeLogKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Startup => "STARTUP",
            Self::Shutdown => "SHUTDOWN",
            Self::Heartbeat => "HEARTBEAT",
            Self::LoopError => "LOOP_ERROR",
        }
    }
}

impl fmt::Display for RuntimeLogKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A single `service_runtime_log` row.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RuntimeLogRecord {
    pub id: Uuid,
    pub kind: RuntimeLogKind,
    pub loop_name: Option<String>,
    pub detail: Value,
    pub created_at: DateTime<Utc>,
}

impl RuntimeLogRecord {
    pub fn new(kind: RuntimeLogKind, loop_name: Option<&str>, detail: Value) -> Self {
        Self {
            id: Uuid::now_v7(),
            kind,
            loop_name: loop_name.map(str::to_string),
            detail,
            created_at: Utc::now(),
        }
    }
}
