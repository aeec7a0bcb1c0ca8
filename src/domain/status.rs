use {
    super::error::PipelineError,
    serde::{Deserialize, Serialize},
    std::fmt,
};

/// The closed set of canonical payment statuses the ledger understands.
/// Every provider adapter maps its own vocabulary onto this set; an unknown
/// raw status maps to `None` rather than to any of these variants.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CanonicalStatus {
    Pending,
    ToConfirm,
    Authorized,
    Failed,
    Canceled,
    Refunded,
    Abandoned,
}

impl CanonicalStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "PENDING",
            Self::ToConfirm => "TO_CONFIRM",
            Self::Authorized => "AUTHORIZED",
            Self::Failed => "FAILED",
            Self::Canceled => "CANCELED",
            Self::Refunded => "REFUNDED",
            Self::Abandoned => "ABANDONED",
        }
    }

    /// PENDING and TO_CONFIRM are the only statuses the poller selects on.
    pub fn is_non_terminal(&self) -> bool {
        matches!(self, Self::Pending | Self::ToConfirm)
    }

    pub fn is_terminal(&self) -> bool {
        !self.is_non_terminal()
    }

    /// Which `payments` column a transition into this status must set.
    /// `None` for the non-terminal statuses, which carry no terminal
    /// timestamp by definition.
    pub fn terminal_timestamp_column(&self) -> Option<&'static str> {
        match self {
            Self::Pending | Self::ToConfirm => None,
            Self::Authorized => Some("first_authorized_at"),
            Self::Failed => Some("failed_at"),
            Self::Canceled => Some("canceled_at"),
            Self::Refunded => Some("refunded_at"),
            Self::Abandoned => Some("abandoned_at"),
        }
    }

    pub const NON_TERMINAL: [Self; 2] = [Self::Pending, Self::ToConfirm];
}

impl fmt::Display for CanonicalStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl TryFrom<&str> for CanonicalStatus {
    type Error = PipelineError;

    fn try_from(s: &str) -> Result<Self, Self::Error> {
        match s {
            "PENDING" => Ok(Self::Pending),
            "TO_CONFIRM" => Ok(Self::ToConfirm),
            "AUTHORIZED" => Ok(Self::Authorized),
            "FAILED" => Ok(Self::Failed),
            "CANCELED" => Ok(Self::Canceled),
            "REFUNDED" => Ok(Self::Refunded),
            "ABANDONED" => Ok(Self::Abandoned),
            other => Err(PipelineError::Validation(format!(
                "unknown canonical status: {other}"
            ))),
        }
    }
}

/// `#[derive(sqlx::FromRow)]` on `Payment` decodes the `status` column as
/// `String` and resolves `#[sqlx(try_from = "String")]` via this impl, not
/// the `&str` one above — both are kept since call sites pass either shape.
impl TryFrom<String> for CanonicalStatus {
    type Error = PipelineError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        Self::try_from(s.as_str())
    }
}
