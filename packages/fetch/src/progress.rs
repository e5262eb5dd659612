//! Row-count progress for the CKAN pager.
//!
//! [`crate::ckan::CkanClient::fetch_all`] learns a resource's row total
//! from its first page and then advances by each page's record count. The
//! pager only talks to [`ProgressCallback`]; the CLI renders it with
//! `indicatif` and tests pass [`NullProgress`].

/// Sink for pager progress.
pub trait ProgressCallback: Send + Sync {
    /// The resource's `result.total`, known after the first page.
    fn set_total(&self, total: u64);

    /// Adds the rows of one page.
    fn inc(&self, delta: u64);

    /// Names the resource or stage being worked on.
    fn set_message(&self, msg: String);

    /// Leaves the indicator on screen with a closing summary.
    fn finish(&self, msg: String);

    /// Removes the indicator.
    fn finish_and_clear(&self);
}

/// Discards all progress.
pub struct NullProgress;

impl ProgressCallback for NullProgress {
    fn set_total(&self, _: u64) {}
    fn inc(&self, _: u64) {}
    fn set_message(&self, _: String) {}
    fn finish(&self, _: String) {}
    fn finish_and_clear(&self) {}
}
