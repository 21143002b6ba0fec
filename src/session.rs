//! View-side ownership of the filter snapshot.
//!
//! `FeedSession` is the only writer of the current `FilterState`. Every
//! committing mutation yields at most one `SessionEffect`, which the
//! driver turns into exactly one refresh, one address rewrite and one
//! push-channel recycle. The keyword is two-staged: the free-typed draft
//! commits only on explicit submission.

use crate::filter::{FilterState, Lang};

/// Outcome of a committing mutation: the new snapshot and its shareable
/// query string.
#[derive(Debug, Clone, PartialEq)]
pub struct SessionEffect {
    pub filter: FilterState,
    pub query: String,
}

#[derive(Debug, Default)]
pub struct FeedSession {
    filter: FilterState,
    draft_keyword: String,
}

impl FeedSession {
    /// Start from the snapshot decoded out of the page query string.
    pub fn new(initial: FilterState) -> FeedSession {
        let draft_keyword = initial.keyword.clone();
        FeedSession {
            filter: initial,
            draft_keyword,
        }
    }

    pub fn filter(&self) -> &FilterState {
        &self.filter
    }

    pub fn draft_keyword(&self) -> &str {
        &self.draft_keyword
    }

    pub fn query(&self) -> String {
        self.filter.encode_query()
    }

    fn commit(&mut self, next: FilterState) -> Option<SessionEffect> {
        if next == self.filter {
            return None;
        }
        self.filter = next;
        Some(SessionEffect {
            filter: self.filter.clone(),
            query: self.filter.encode_query(),
        })
    }

    pub fn set_lang(&mut self, lang: Lang) -> Option<SessionEffect> {
        let mut next = self.filter.clone();
        next.lang = lang;
        self.commit(next)
    }

    pub fn set_china_only(&mut self, on: bool) -> Option<SessionEffect> {
        let mut next = self.filter.clone();
        next.china_only = on;
        self.commit(next)
    }

    pub fn toggle_china_only(&mut self) -> Option<SessionEffect> {
        self.set_china_only(!self.filter.china_only)
    }

    pub fn set_country(&mut self, country: &str) -> Option<SessionEffect> {
        let mut next = self.filter.clone();
        next.country = country.trim().to_string();
        self.commit(next)
    }

    pub fn set_topic(&mut self, topic: &str) -> Option<SessionEffect> {
        let mut next = self.filter.clone();
        next.topic = topic.trim().to_string();
        self.commit(next)
    }

    /// Update the free-typed draft. Never fires a fetch on its own.
    pub fn set_draft_keyword(&mut self, draft: &str) {
        self.draft_keyword = draft.to_string();
    }

    /// Explicit submission: commit the trimmed draft as the keyword.
    pub fn submit_keyword(&mut self) -> Option<SessionEffect> {
        let mut next = self.filter.clone();
        next.keyword = self.draft_keyword.trim().to_string();
        self.commit(next)
    }

    /// Clear all five fields (and the draft) in one snapshot update, so
    /// exactly one downstream fetch fires.
    pub fn reset(&mut self) -> Option<SessionEffect> {
        self.draft_keyword.clear();
        self.commit(FilterState::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn busy_session() -> FeedSession {
        FeedSession::new(FilterState {
            lang: Lang::Zh,
            china_only: true,
            keyword: "trade".into(),
            country: "germany".into(),
            topic: "energy".into(),
        })
    }

    #[test]
    fn initial_keyword_seeds_the_draft() {
        let session = busy_session();
        assert_eq!(session.draft_keyword(), "trade");
    }

    #[test]
    fn draft_edits_never_produce_effects() {
        let mut session = FeedSession::default();
        session.set_draft_keyword("ports");
        session.set_draft_keyword("ports and shipping");
        assert_eq!(session.filter().keyword, "");
        assert_eq!(session.query(), "");
    }

    #[test]
    fn submission_commits_the_trimmed_draft_once() {
        let mut session = FeedSession::default();
        session.set_draft_keyword("  ports  ");
        let effect = session.submit_keyword().expect("keyword changed");
        assert_eq!(effect.filter.keyword, "ports");
        assert_eq!(effect.query, "q=ports");
        // Submitting the unchanged draft again is a no-op.
        assert_eq!(session.submit_keyword(), None);
    }

    #[test]
    fn no_op_mutations_are_absorbed() {
        let mut session = busy_session();
        assert_eq!(session.set_lang(Lang::Zh), None);
        assert_eq!(session.set_country(" germany "), None);
        assert_eq!(session.set_china_only(true), None);
    }

    #[test]
    fn reset_is_one_atomic_effect() {
        let mut session = busy_session();
        session.set_draft_keyword("pending draft");

        let mut effects = 0;
        if session.reset().is_some() {
            effects += 1;
        }
        assert_eq!(effects, 1);
        assert_eq!(session.filter(), &FilterState::default());
        assert_eq!(session.draft_keyword(), "");
        assert_eq!(session.query(), "");

        // Reset of an already-default session fires nothing.
        assert_eq!(session.reset(), None);
    }

    #[test]
    fn toggle_round_trips() {
        let mut session = FeedSession::default();
        let effect = session.toggle_china_only().expect("changed");
        assert!(effect.filter.china_only);
        assert_eq!(effect.query, "china=1");
        let effect = session.toggle_china_only().expect("changed");
        assert!(!effect.filter.china_only);
        assert_eq!(effect.query, "");
    }
}
