//! Backend commands queued from UI to backend worker.

use shared::protocol::{ConceptDraft, OwnerDraft};

use crate::controller::forms::SubmissionId;

pub enum BackendCommand {
    SubmitConcept {
        submission: SubmissionId,
        draft: ConceptDraft,
    },
    FetchOwner,
    UpdateOwner {
        submission: SubmissionId,
        draft: OwnerDraft,
    },
}

impl BackendCommand {
    pub fn name(&self) -> &'static str {
        match self {
            Self::SubmitConcept { .. } => "submit_concept",
            Self::FetchOwner => "fetch_owner",
            Self::UpdateOwner { .. } => "update_owner",
        }
    }
}
