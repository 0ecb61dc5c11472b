use serde::{Deserialize, Serialize};

/// Context keys shared by the wizard tasks and the wizard facade
pub mod session_keys {
    pub const SESSION_ID: &str = "session_id";
    /// Pending navigation command, consumed by the step task that runs next
    pub const COMMAND: &str = "command";
    pub const DRAFT: &str = "draft";
    pub const CATALOGUE: &str = "catalogue";
    pub const FIELD_ERRORS: &str = "field_errors";
    pub const ESTIMATE: &str = "estimate";
    pub const QUOTE_CACHE: &str = "quote_cache";
    pub const SAVED_ADDRESSES: &str = "saved_addresses";
    pub const OUTCOME: &str = "outcome";
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum NavigationCommand {
    Next,
    Previous,
    Submit,
}
