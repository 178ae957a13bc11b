use std::collections::HashSet;

use crate::error::RelayError;
use crate::transport::RequestId;

/// Request ids already used in this run.
#[derive(Debug, Default)]
pub struct RequestLedger {
    issued: HashSet<RequestId>,
}

impl RequestLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Ok if `id` is fresh and now recorded; Err if it was already used.
    pub fn claim(&mut self, id: &RequestId) -> Result<(), RelayError> {
        if !self.issued.insert(id.clone()) {
            return Err(RelayError::Precondition(format!(
                "requestId {} was already used in this run",
                id
            )));
        }
        Ok(())
    }
}
