//! Local draft state for the concept and owner forms.
//!
//! Drafts are owned by the view and never touch mirrored entities. Each submission is
//! tagged with a [`SubmissionId`]; a result is applied only while that submission is the
//! form's pending one, so an ack arriving after the form was reset is a no-op.

use shared::{
    error::ValidationError,
    protocol::{ConceptAck, ConceptDraft, Owner, OwnerDraft},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubmissionId(u64);

#[derive(Debug, Default)]
struct Submissions {
    next: u64,
    pending: Option<SubmissionId>,
}

impl Submissions {
    fn begin(&mut self) -> SubmissionId {
        self.next += 1;
        let id = SubmissionId(self.next);
        self.pending = Some(id);
        id
    }

    /// Clears the pending slot if `id` owns it.
    fn settle(&mut self, id: SubmissionId) -> bool {
        if self.pending == Some(id) {
            self.pending = None;
            true
        } else {
            false
        }
    }
}

#[derive(Debug, Default)]
pub struct ConceptForm {
    pub draft: ConceptDraft,
    submissions: Submissions,
    last_ack: Option<ConceptAck>,
}

impl ConceptForm {
    pub fn is_submitting(&self) -> bool {
        self.submissions.pending.is_some()
    }

    pub fn last_ack(&self) -> Option<&ConceptAck> {
        self.last_ack.as_ref()
    }

    /// Validates the draft and, if it passes, starts a submission with a copy of it.
    pub fn begin_submit(&mut self) -> Result<(SubmissionId, ConceptDraft), ValidationError> {
        self.draft.validate()?;
        Ok((self.submissions.begin(), self.draft.clone()))
    }

    /// Resets the draft to empty strings. Returns `false` for a stale submission.
    pub fn submission_succeeded(&mut self, id: SubmissionId, ack: ConceptAck) -> bool {
        if !self.submissions.settle(id) {
            return false;
        }
        self.draft.clear();
        self.last_ack = Some(ack);
        true
    }

    /// The draft is kept for resubmission.
    pub fn submission_failed(&mut self, id: SubmissionId) -> bool {
        self.submissions.settle(id)
    }

    /// Clears the draft and abandons any in-flight submission.
    pub fn reset(&mut self) {
        self.draft.clear();
        self.submissions.pending = None;
    }
}

#[derive(Debug, Default)]
pub struct OwnerForm {
    pub draft: OwnerDraft,
    submissions: Submissions,
    stored: Option<Owner>,
    loading: bool,
}

impl OwnerForm {
    pub fn is_submitting(&self) -> bool {
        self.submissions.pending.is_some()
    }

    pub fn is_loading(&self) -> bool {
        self.loading
    }

    /// Last owner record confirmed by the backend.
    pub fn stored(&self) -> Option<&Owner> {
        self.stored.as_ref()
    }

    pub fn begin_load(&mut self) {
        self.loading = true;
    }

    pub fn owner_loaded(&mut self, owner: Owner) {
        self.loading = false;
        self.draft = OwnerDraft::from(owner.clone());
        self.stored = Some(owner);
    }

    /// Prior or default draft values stay in place.
    pub fn load_failed(&mut self) {
        self.loading = false;
    }

    pub fn begin_submit(&mut self) -> Result<(SubmissionId, OwnerDraft), ValidationError> {
        self.draft.validate()?;
        Ok((self.submissions.begin(), self.draft.clone()))
    }

    /// Returns `true` when the caller should re-fetch the stored owner.
    pub fn submission_succeeded(&mut self, id: SubmissionId) -> bool {
        self.submissions.settle(id)
    }

    pub fn submission_failed(&mut self, id: SubmissionId) -> bool {
        self.submissions.settle(id)
    }
}

#[cfg(test)]
mod tests {
    use shared::domain::{Cid, Guid};

    use super::*;

    fn filled_form() -> ConceptForm {
        let mut form = ConceptForm::default();
        form.draft = ConceptDraft {
            name: "A".into(),
            description: "d".into(),
            kind: "t".into(),
            content: "c".into(),
        };
        form
    }

    fn ack() -> ConceptAck {
        ConceptAck {
            guid: Some(Guid::from("g1")),
            cid: Some(Cid::from("bafy")),
        }
    }

    #[test]
    fn successful_submit_resets_concept_draft() {
        let mut form = filled_form();
        let (id, sent) = form.begin_submit().expect("valid");
        assert_eq!(sent.name, "A");
        assert!(form.is_submitting());

        assert!(form.submission_succeeded(id, ack()));
        assert_eq!(form.draft, ConceptDraft::default());
        assert!(!form.is_submitting());
        assert_eq!(form.last_ack(), Some(&ack()));
    }

    #[test]
    fn failed_submit_keeps_draft() {
        let mut form = filled_form();
        let (id, _) = form.begin_submit().expect("valid");

        assert!(form.submission_failed(id));
        assert_eq!(form.draft.content, "c");
        assert!(!form.is_submitting());
    }

    #[test]
    fn invalid_draft_does_not_start_a_submission() {
        let mut form = filled_form();
        form.draft.kind = " ".into();

        let err = form.begin_submit().expect_err("must fail");
        assert_eq!(err, ValidationError::MissingField { field: "type" });
        assert!(!form.is_submitting());
    }

    #[test]
    fn late_ack_after_reset_leaves_new_draft_alone() {
        let mut form = filled_form();
        let (stale, _) = form.begin_submit().expect("valid");
        form.reset();
        form.draft.name = "typed after reset".into();

        assert!(!form.submission_succeeded(stale, ack()));
        assert_eq!(form.draft.name, "typed after reset");
        assert!(form.last_ack().is_none());
    }

    #[test]
    fn only_latest_submission_settles() {
        let mut form = filled_form();
        let (first, _) = form.begin_submit().expect("valid");
        let (second, _) = form.begin_submit().expect("valid");

        assert!(!form.submission_failed(first));
        assert!(form.is_submitting());
        assert!(form.submission_succeeded(second, ack()));
    }

    #[test]
    fn owner_form_hydrates_and_survives_failed_fetch() {
        let mut form = OwnerForm::default();
        form.begin_load();
        form.load_failed();
        assert!(!form.is_loading());
        assert_eq!(form.draft, OwnerDraft::default());

        form.owner_loaded(Owner {
            name: "Ada".into(),
            description: "first".into(),
        });
        assert_eq!(form.draft.name, "Ada");

        form.draft.description = "edited".into();
        form.begin_load();
        form.load_failed();
        assert_eq!(form.draft.description, "edited");
        assert_eq!(form.stored().map(|o| o.description.as_str()), Some("first"));
    }

    #[test]
    fn owner_success_requests_refetch_once() {
        let mut form = OwnerForm::default();
        form.draft = OwnerDraft {
            name: "Ada".into(),
            description: "d".into(),
        };
        let (id, _) = form.begin_submit().expect("valid");

        assert!(form.submission_succeeded(id));
        assert!(!form.submission_succeeded(id));
        assert_eq!(form.draft.name, "Ada");
    }
}
