use play_publisher_api::EditsApi;
use play_publisher_types::{
    APPLICATION_NOT_FOUND_REASON, AbandonPolicy, ApiError, AppEdit, EditId, PublishError,
};
use tracing::{debug, warn};

/// Message for a rejected service account.
pub const INVALID_CREDENTIALS_MESSAGE: &str = "Invalid service account credentials.";

/// Message for a package that has never been uploaded.
pub fn application_not_found_message(application_id: &str) -> String {
    format!(
        "No application found for the package name {application_id}. \
         The first version of your app must be uploaded via the Play Store console."
    )
}

/// Translate a failed `edits.insert` into an actionable error.
///
/// Only two shapes are rewritten: an `applicationNotFound` reason and an
/// HTTP 401. Everything else is returned as is.
pub fn translate_open_error(application_id: &str, err: PublishError) -> PublishError {
    match err {
        PublishError::Api(api @ ApiError::Status { .. }) => {
            if api.has_reason(APPLICATION_NOT_FOUND_REASON) {
                PublishError::configuration_from(application_not_found_message(application_id), api)
            } else if api.status() == Some(401) {
                PublishError::configuration_from(INVALID_CREDENTIALS_MESSAGE, api)
            } else {
                PublishError::Api(api)
            }
        }
        other => other,
    }
}

/// Opens edit transactions for one application.
#[derive(Debug)]
pub struct EditSession<A> {
    api: A,
    application_id: String,
    abandon: AbandonPolicy,
}

impl<A: EditsApi> EditSession<A> {
    pub fn new(api: A, application_id: impl Into<String>) -> Self {
        Self {
            api,
            application_id: application_id.into(),
            abandon: AbandonPolicy::default(),
        }
    }

    #[must_use]
    pub fn with_abandon_policy(mut self, policy: AbandonPolicy) -> Self {
        self.abandon = policy;
        self
    }

    pub fn api(&self) -> &A {
        &self.api
    }

    pub fn application_id(&self) -> &str {
        &self.application_id
    }

    pub fn abandon_policy(&self) -> AbandonPolicy {
        self.abandon
    }

    /// Open a new edit. The returned guard must be committed or discarded;
    /// otherwise the session's [`AbandonPolicy`] applies when it is dropped.
    pub fn open(&self) -> Result<Edit<'_, A>, PublishError> {
        let edit = self
            .api
            .insert_edit(&self.application_id)
            .map_err(|err| translate_open_error(&self.application_id, err))?;
        debug!(application_id = %self.application_id, edit_id = %edit.id, "opened edit");

        Ok(Edit {
            session: self,
            edit,
            finished: false,
        })
    }

    /// Open an edit, run `block` against it and return its result. Never commits.
    pub fn open_and_read<T, E, F>(&self, block: F) -> Result<T, E>
    where
        F: FnOnce(&Edit<'_, A>) -> Result<T, E>,
        E: From<PublishError>,
    {
        let edit = self.open()?;
        block(&edit)
    }

    /// Open an edit, run `block` against it and commit once it succeeds.
    ///
    /// A failing block skips the commit and its error is returned unchanged.
    pub fn open_and_write<T, E, F>(&self, block: F) -> Result<T, E>
    where
        F: FnOnce(&Edit<'_, A>) -> Result<T, E>,
        E: From<PublishError>,
    {
        let edit = self.open()?;
        let value = block(&edit)?;
        edit.commit()?;
        Ok(value)
    }
}

/// An open edit transaction.
#[must_use = "an edit must be committed or discarded"]
#[derive(Debug)]
pub struct Edit<'s, A: EditsApi> {
    session: &'s EditSession<A>,
    edit: AppEdit,
    finished: bool,
}

impl<'s, A: EditsApi> Edit<'s, A> {
    pub fn id(&self) -> &EditId {
        &self.edit.id
    }

    pub fn expiry_time_seconds(&self) -> Option<&str> {
        self.edit.expiry_time_seconds.as_deref()
    }

    pub fn application_id(&self) -> &'s str {
        &self.session.application_id
    }

    /// The client, for issuing mutations against this edit.
    pub fn api(&self) -> &'s A {
        &self.session.api
    }

    /// Commit the edit. Failures are returned untranslated.
    pub fn commit(mut self) -> Result<AppEdit, PublishError> {
        self.finished = true;
        debug!(edit_id = %self.edit.id, "committing edit");
        self.api().commit_edit(self.application_id(), &self.edit.id)
    }

    /// Delete the edit without committing it.
    pub fn discard(mut self) -> Result<(), PublishError> {
        self.finished = true;
        debug!(edit_id = %self.edit.id, "discarding edit");
        self.api().delete_edit(self.application_id(), &self.edit.id)
    }
}

impl<A: EditsApi> Drop for Edit<'_, A> {
    fn drop(&mut self) {
        if self.finished {
            return;
        }

        match self.session.abandon {
            AbandonPolicy::Leave => {
                debug!(edit_id = %self.edit.id, "leaving uncommitted edit to expire");
            }
            AbandonPolicy::Discard => {
                if let Err(err) = self
                    .session
                    .api
                    .delete_edit(&self.session.application_id, &self.edit.id)
                {
                    warn!(edit_id = %self.edit.id, error = %err, "failed to discard abandoned edit");
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::cell::RefCell;

    use insta::assert_snapshot;
    use proptest::prelude::*;

    use super::*;

    const APP: &str = "com.example.app";

    fn status_error(status: u16, reasons: &[&str], message: &str) -> PublishError {
        PublishError::Api(ApiError::Status {
            method: "POST".to_string(),
            url: "https://androidpublisher.googleapis.com/edits".to_string(),
            status,
            message: message.to_string(),
            reasons: reasons.iter().map(|r| r.to_string()).collect(),
        })
    }

    #[derive(Default)]
    struct FakeEdits {
        calls: RefCell<Vec<String>>,
        insert_failure: RefCell<Option<PublishError>>,
        commit_failure: RefCell<Option<PublishError>>,
        delete_failure: RefCell<Option<PublishError>>,
    }

    impl FakeEdits {
        fn failing_insert(err: PublishError) -> Self {
            let fake = Self::default();
            *fake.insert_failure.borrow_mut() = Some(err);
            fake
        }

        fn calls(&self) -> Vec<String> {
            self.calls.borrow().clone()
        }

        fn count(&self, prefix: &str) -> usize {
            self.calls.borrow().iter().filter(|c| c.starts_with(prefix)).count()
        }
    }

    impl EditsApi for FakeEdits {
        fn insert_edit(&self, package_name: &str) -> Result<AppEdit, PublishError> {
            self.calls.borrow_mut().push(format!("insert {package_name}"));
            if let Some(err) = self.insert_failure.borrow_mut().take() {
                return Err(err);
            }
            Ok(AppEdit {
                id: EditId::new("edit-1"),
                expiry_time_seconds: Some("1700000000".to_string()),
            })
        }

        fn commit_edit(&self, package_name: &str, edit_id: &EditId) -> Result<AppEdit, PublishError> {
            self.calls.borrow_mut().push(format!("commit {package_name} {edit_id}"));
            if let Some(err) = self.commit_failure.borrow_mut().take() {
                return Err(err);
            }
            Ok(AppEdit {
                id: edit_id.clone(),
                expiry_time_seconds: None,
            })
        }

        fn delete_edit(&self, package_name: &str, edit_id: &EditId) -> Result<(), PublishError> {
            self.calls.borrow_mut().push(format!("delete {package_name} {edit_id}"));
            match self.delete_failure.borrow_mut().take() {
                Some(err) => Err(err),
                None => Ok(()),
            }
        }
    }

    #[derive(Debug, PartialEq)]
    enum BlockError {
        Mutation(String),
        Publish(String),
    }

    impl From<PublishError> for BlockError {
        fn from(err: PublishError) -> Self {
            BlockError::Publish(err.to_string())
        }
    }

    #[test]
    fn read_passes_edit_id_and_returns_block_value() {
        let fake = FakeEdits::default();
        let session = EditSession::new(&fake, APP);

        let seen = session
            .open_and_read(|edit| Ok::<_, PublishError>(edit.id().clone()))
            .expect("read");

        assert_eq!(seen, EditId::new("edit-1"));
        assert_eq!(fake.calls()[0], format!("insert {APP}"));
    }

    #[test]
    fn read_never_commits_and_discards_by_default() {
        let fake = FakeEdits::default();
        let session = EditSession::new(&fake, APP);

        session.open_and_read(|_| Ok::<_, PublishError>(())).expect("read");

        assert_eq!(fake.count("commit"), 0);
        assert_eq!(
            fake.calls(),
            vec![format!("insert {APP}"), format!("delete {APP} edit-1")]
        );
    }

    #[test]
    fn read_with_leave_policy_issues_only_insert() {
        let fake = FakeEdits::default();
        let session = EditSession::new(&fake, APP).with_abandon_policy(AbandonPolicy::Leave);

        let _ = session.open_and_read(|_| Err::<(), _>(BlockError::Mutation("x".to_string())));

        assert_eq!(fake.calls(), vec![format!("insert {APP}")]);
    }

    #[test]
    fn write_commits_once_after_block_with_inserted_id() {
        let fake = FakeEdits::default();
        let session = EditSession::new(&fake, APP);

        let value = session
            .open_and_write(|edit| {
                edit.api()
                    .calls
                    .borrow_mut()
                    .push(format!("mutate {}", edit.id()));
                Ok::<_, PublishError>(7)
            })
            .expect("write");

        assert_eq!(value, 7);
        assert_eq!(
            fake.calls(),
            vec![
                format!("insert {APP}"),
                "mutate edit-1".to_string(),
                format!("commit {APP} edit-1"),
            ]
        );
    }

    #[test]
    fn write_skips_commit_when_block_fails() {
        let fake = FakeEdits::default();
        let session = EditSession::new(&fake, APP);

        let err = session
            .open_and_write(|_| Err::<(), _>(BlockError::Mutation("upload rejected".to_string())))
            .unwrap_err();

        assert_eq!(err, BlockError::Mutation("upload rejected".to_string()));
        assert_eq!(fake.count("commit"), 0);
        assert_eq!(fake.count("delete"), 1);
    }

    #[test]
    fn write_block_failure_with_leave_policy_does_not_discard() {
        let fake = FakeEdits::default();
        let session = EditSession::new(&fake, APP).with_abandon_policy(AbandonPolicy::Leave);

        let _ = session.open_and_write(|_| Err::<(), _>(BlockError::Mutation("boom".to_string())));

        assert_eq!(fake.calls(), vec![format!("insert {APP}")]);
    }

    #[test]
    fn failed_discard_does_not_mask_block_error() {
        let fake = FakeEdits::default();
        *fake.delete_failure.borrow_mut() = Some(status_error(500, &[], "delete failed"));
        let session = EditSession::new(&fake, APP);

        let err = session
            .open_and_write(|_| Err::<(), _>(BlockError::Mutation("original".to_string())))
            .unwrap_err();

        assert_eq!(err, BlockError::Mutation("original".to_string()));
    }

    #[test]
    fn commit_failure_propagates_untranslated() {
        let fake = FakeEdits::default();
        *fake.commit_failure.borrow_mut() = Some(status_error(401, &[], "commit unauthorized"));
        let session = EditSession::new(&fake, APP);

        let err = session.open_and_write(|_| Ok::<_, PublishError>(())).unwrap_err();

        assert!(!err.is_configuration());
        assert_eq!(err.as_api().and_then(ApiError::status), Some(401));
        assert_eq!(fake.count("commit"), 1);
        assert_eq!(fake.count("delete"), 0);
    }

    #[test]
    fn application_not_found_becomes_configuration_error() {
        let fake = FakeEdits::failing_insert(status_error(404, &[APPLICATION_NOT_FOUND_REASON], "not found"));
        let session = EditSession::new(&fake, APP);

        let err = session.open_and_read(|_| Ok::<_, PublishError>(())).unwrap_err();

        assert!(err.is_configuration());
        assert!(err.to_string().contains(APP));
        assert_snapshot!(
            err.to_string(),
            @"No application found for the package name com.example.app. The first version of your app must be uploaded via the Play Store console."
        );
    }

    #[test]
    fn application_not_found_wins_over_401() {
        let err = translate_open_error(APP, status_error(401, &[APPLICATION_NOT_FOUND_REASON], "x"));
        assert_eq!(err.to_string(), application_not_found_message(APP));
    }

    #[test]
    fn unauthorized_becomes_invalid_credentials() {
        let fake = FakeEdits::failing_insert(status_error(401, &[], "Request had invalid authentication credentials."));
        let session = EditSession::new(&fake, APP);

        let err = session.open_and_read(|_| Ok::<_, PublishError>(())).unwrap_err();

        assert!(err.is_configuration());
        assert_eq!(err.to_string(), INVALID_CREDENTIALS_MESSAGE);
        assert_ne!(err.to_string(), application_not_found_message(APP));
    }

    #[test]
    fn failed_open_runs_no_block_and_no_commit() {
        let fake = FakeEdits::failing_insert(status_error(403, &["forbidden"], "nope"));
        let session = EditSession::new(&fake, APP);
        let mut ran = false;

        let err = session
            .open_and_write(|_| {
                ran = true;
                Ok::<_, PublishError>(())
            })
            .unwrap_err();

        assert!(!ran);
        assert_eq!(fake.calls(), vec![format!("insert {APP}")]);
        assert_eq!(err.to_string(), "POST https://androidpublisher.googleapis.com/edits failed with status 403: nope");
    }

    #[test]
    fn open_errors_reach_custom_error_types() {
        let fake = FakeEdits::failing_insert(status_error(401, &[], "x"));
        let session = EditSession::new(&fake, APP);

        let err = session.open_and_read(|_| Ok::<(), BlockError>(())).unwrap_err();

        assert_eq!(err, BlockError::Publish(INVALID_CREDENTIALS_MESSAGE.to_string()));
    }

    #[test]
    fn non_status_errors_pass_through() {
        let err = translate_open_error(APP, PublishError::InvalidKey("bad".to_string()));
        assert!(matches!(err, PublishError::InvalidKey(_)));

        let token = PublishError::Api(ApiError::Token {
            status: 401,
            error: "unauthorized_client".to_string(),
            description: None,
        });
        let err = translate_open_error(APP, token);
        assert!(matches!(err, PublishError::Api(ApiError::Token { status: 401, .. })));
    }

    #[test]
    fn scoped_edit_commit_and_discard() {
        let fake = FakeEdits::default();
        let session = EditSession::new(&fake, APP);

        let edit = session.open().expect("open");
        assert_eq!(edit.expiry_time_seconds(), Some("1700000000"));
        assert_eq!(edit.application_id(), APP);
        let committed = edit.commit().expect("commit");
        assert_eq!(committed.id, EditId::new("edit-1"));

        session.open().expect("open").discard().expect("discard");

        assert_eq!(
            fake.calls(),
            vec![
                format!("insert {APP}"),
                format!("commit {APP} edit-1"),
                format!("insert {APP}"),
                format!("delete {APP} edit-1"),
            ]
        );
    }

    #[test]
    fn dropped_scoped_edit_is_discarded_once() {
        let fake = FakeEdits::default();
        let session = EditSession::new(&fake, APP);

        drop(session.open().expect("open"));

        assert_eq!(fake.count("delete"), 1);
        assert_eq!(fake.count("commit"), 0);
    }

    proptest! {
        #[test]
        fn unrecognized_failures_are_untouched(
            status in (400u16..600).prop_filter("401 is translated", |s| *s != 401),
            reasons in proptest::collection::vec("[a-zA-Z]{1,16}", 0..4)
                .prop_filter("applicationNotFound is translated", |r| !r.iter().any(|x| x == APPLICATION_NOT_FOUND_REASON)),
            message in "[ -~]{0,40}",
        ) {
            let refs: Vec<&str> = reasons.iter().map(String::as_str).collect();
            let original = status_error(status, &refs, &message);
            let expected = original.to_string();

            let translated = translate_open_error(APP, original);

            prop_assert!(!translated.is_configuration());
            prop_assert_eq!(translated.to_string(), expected);
            match translated {
                PublishError::Api(ApiError::Status { status: s, reasons: r, .. }) => {
                    prop_assert_eq!(s, status);
                    prop_assert_eq!(r, reasons);
                }
                other => prop_assert!(false, "unexpected {:?}", other),
            }
        }
    }
}
