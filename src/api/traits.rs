use async_trait::async_trait;

use super::types::HistoryRecord;
use crate::chat::{ContactSummary, HistoryEndpoint};
use crate::utils::HuddleError;

/// Request/response calls the session core depends on
///
/// Implementations handle credentials themselves; callers only see data or failure.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ChatApi: Send + Sync {
    /// Prior messages of one conversation, in server order
    async fn history(&self, endpoint: &HistoryEndpoint) -> Result<Vec<HistoryRecord>, HuddleError>;

    /// The full contact summary list
    async fn contacts(&self) -> Result<Vec<ContactSummary>, HuddleError>;
}
