use {
    super::error::PipelineError,
    derive_more::Display,
    serde::{Deserialize, Serialize},
};

/// Integer units of the smallest denomination. The core never reconciles
/// monetary amounts against anything — it only carries this value verbatim
/// from the PSP's status response through to the CRM payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Display, Serialize, Deserialize)]
pub struct AmountMinor(i64);

impl AmountMinor {
    pub fn new(units: i64) -> Result<Self, PipelineError> {
        if units < 0 {
            return Err(PipelineError::Validation(format!(
                "amount_minor cannot be negative, got: {units}"
            )));
        }
        Ok(Self(units))
    }

    pub fn get(&self) -> i64 {
        self.0
    }
}
