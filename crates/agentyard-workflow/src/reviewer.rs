//! Reviewer stage invoked from quality_assurance. The reviewer's own LLM
//! prompt engineering is out of scope here — this is only the narrow
//! interface the engine calls through.

use agentyard_core::ReviewVerdict;
use async_trait::async_trait;

#[async_trait]
pub trait Reviewer: Send + Sync {
    async fn review(&self, ticket_title: &str, artifacts: &[String]) -> ReviewVerdict;
}

/// Always approves. Used when no reviewer stage is configured — the
/// quality_assurance phase still runs lint/test, it simply skips the
/// optional LLM review.
pub struct AlwaysApprove;

#[async_trait]
impl Reviewer for AlwaysApprove {
    async fn review(&self, _ticket_title: &str, _artifacts: &[String]) -> ReviewVerdict {
        ReviewVerdict::Approved
    }
}
