use crate::artifact::ArtifactStore;
use crate::decision::{DecisionPoint, Question};
use crate::error::Result;
use chrono::{DateTime, Local};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Promotion {
    Approved { deployed_at: DateTime<Local> },
    /// Not an error: the artifact stays in place, unstamped.
    Declined,
}

/// Ask whether to promote the artifact in `store`; stamp it when approved.
pub fn confirm(store: &ArtifactStore, decider: &dyn DecisionPoint) -> Result<Promotion> {
    let question = Question::ConfirmDeployment {
        artifact: store.dir().to_path_buf(),
    };
    if !decider.decide(&question)? {
        tracing::info!(artifact = %store.dir().display(), "deployment declined");
        return Ok(Promotion::Declined);
    }
    let now = Local::now();
    store.stamp_deployed(now)?;
    tracing::info!(artifact = %store.dir().display(), deployed_at = %now.to_rfc3339(), "deployed");
    Ok(Promotion::Approved { deployed_at: now })
}
