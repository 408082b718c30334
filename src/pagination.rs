//! Client-side pagination state.
//!
//! The list only grows: each successful load appends the next page in arrival order and
//! replaces the cursor. Pages are not de-duplicated or re-sorted. At most one load is in
//! flight at a time; a second request made meanwhile is ignored.

use std::sync::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};

use anyhow::{Context as _, anyhow};
use url::Url;

use crate::date::DateFormatter;
use crate::fetcher::Fetcher;
use crate::post::{PageResponse, PostSummary, PostsPagination};
use crate::progress::RequestKind;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LoadToken(u64);

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PostList {
    posts: Vec<PostSummary>,
    next_page: Option<Url>,
    in_flight: Option<LoadToken>,
}

impl PostList {
    pub fn new(posts: Vec<PostSummary>, next_page: Option<Url>) -> Self {
        Self {
            posts,
            next_page,
            in_flight: None,
        }
    }

    /// Initial state from the first page, with dates formatted for display.
    pub fn from_initial(
        pagination: PostsPagination,
        formatter: &DateFormatter,
    ) -> anyhow::Result<Self> {
        let posts = pagination
            .results
            .into_iter()
            .map(|p| p.with_display_date(formatter))
            .collect::<anyhow::Result<Vec<_>>>()?;
        Ok(Self::new(posts, pagination.next_page))
    }

    pub fn posts(&self) -> &[PostSummary] {
        &self.posts
    }

    pub fn next_page(&self) -> Option<&Url> {
        self.next_page.as_ref()
    }

    pub fn is_loading(&self) -> bool {
        self.in_flight.is_some()
    }

    pub fn can_load_more(&self) -> bool {
        self.next_page.is_some() && self.in_flight.is_none()
    }

    /// The loaded posts (display dates) and the current cursor.
    pub fn to_pagination(&self) -> PostsPagination {
        PostsPagination {
            results: self.posts.clone(),
            next_page: self.next_page.clone(),
        }
    }
}

#[derive(Debug, Clone)]
pub enum Action {
    LoadStarted(LoadToken),
    LoadFinished {
        token: LoadToken,
        posts: Vec<PostSummary>,
        next_page: Option<Url>,
    },
    LoadFailed(LoadToken),
}

pub fn reduce(state: PostList, action: Action) -> PostList {
    match action {
        Action::LoadStarted(token) => {
            if !state.can_load_more() {
                return state;
            }
            PostList {
                in_flight: Some(token),
                ..state
            }
        }
        Action::LoadFinished {
            token,
            posts,
            next_page,
        } => {
            if state.in_flight != Some(token) {
                return state;
            }
            let mut merged = state.posts;
            merged.extend(posts);
            PostList {
                posts: merged,
                next_page,
                in_flight: None,
            }
        }
        Action::LoadFailed(token) => {
            if state.in_flight != Some(token) {
                return state;
            }
            PostList {
                in_flight: None,
                ..state
            }
        }
    }
}

/// Where next pages come from.
#[allow(async_fn_in_trait)]
pub trait PageSource {
    async fn fetch_page(&self, url: &Url) -> anyhow::Result<PageResponse>;
}

impl PageSource for Fetcher {
    async fn fetch_page(&self, url: &Url) -> anyhow::Result<PageResponse> {
        self.get_json(url.clone(), RequestKind::NextPage).await
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadOutcome {
    Appended { count: usize },
    /// Another load is still in flight; nothing was fetched.
    Busy,
    /// No cursor left; nothing was fetched.
    Exhausted,
}

pub struct Paginator<S> {
    state: Mutex<PostList>,
    source: S,
    formatter: DateFormatter,
    next_token: AtomicU64,
}

impl<S: PageSource> Paginator<S> {
    pub fn new(initial: PostList, source: S, formatter: DateFormatter) -> Self {
        Self {
            state: Mutex::new(initial),
            source,
            formatter,
            next_token: AtomicU64::new(1),
        }
    }

    pub fn snapshot(&self) -> anyhow::Result<PostList> {
        Ok(self.lock()?.clone())
    }

    pub fn into_state(self) -> anyhow::Result<PostList> {
        self.state
            .into_inner()
            .map_err(|_| anyhow!("pagination state poisoned"))
    }

    /// Fetches the page behind the current cursor and appends it.
    ///
    /// Dropping the returned future mid-fetch releases the in-flight slot, as a failure would.
    pub async fn load_more(&self) -> anyhow::Result<LoadOutcome> {
        let token = LoadToken(self.next_token.fetch_add(1, Ordering::Relaxed));
        let (url, in_flight) = {
            let mut state = self.lock()?;
            let Some(url) = state.next_page.clone() else {
                return Ok(LoadOutcome::Exhausted);
            };
            if state.is_loading() {
                tracing::debug!(%url, "load more ignored; request in flight");
                return Ok(LoadOutcome::Busy);
            }
            dispatch(&mut state, Action::LoadStarted(token));
            (url, InFlight::new(&self.state, token))
        };

        match self.fetch_shaped(&url).await {
            Ok((posts, next_page)) => {
                let count = posts.len();
                tracing::info!(%url, count, has_next = next_page.is_some(), "loaded page");
                in_flight.settle(Action::LoadFinished {
                    token,
                    posts,
                    next_page,
                })?;
                Ok(LoadOutcome::Appended { count })
            }
            Err(e) => {
                tracing::warn!(%url, error = %format!("{e:#}"), "load more failed");
                in_flight.settle(Action::LoadFailed(token))?;
                Err(e)
            }
        }
    }

    async fn fetch_shaped(&self, url: &Url) -> anyhow::Result<(Vec<PostSummary>, Option<Url>)> {
        let response = self
            .source
            .fetch_page(url)
            .await
            .with_context(|| format!("load next page {}", url))?;
        let next_page = response.next_page_url()?;
        let posts = response
            .results
            .into_iter()
            .map(|raw| PostSummary::from_raw(raw).with_display_date(&self.formatter))
            .collect::<anyhow::Result<Vec<_>>>()?;
        Ok((posts, next_page))
    }

    fn lock(&self) -> anyhow::Result<std::sync::MutexGuard<'_, PostList>> {
        self.state
            .lock()
            .map_err(|_| anyhow!("pagination state poisoned"))
    }
}

fn dispatch(state: &mut PostList, action: Action) {
    let current = std::mem::take(state);
    *state = reduce(current, action);
}

/// Holds a started load. Unless settled, dropping it dispatches `LoadFailed`.
struct InFlight<'a> {
    state: &'a Mutex<PostList>,
    token: LoadToken,
    armed: bool,
}

impl<'a> InFlight<'a> {
    fn new(state: &'a Mutex<PostList>, token: LoadToken) -> Self {
        Self {
            state,
            token,
            armed: true,
        }
    }

    fn settle(mut self, action: Action) -> anyhow::Result<()> {
        self.armed = false;
        let mut state = self
            .state
            .lock()
            .map_err(|_| anyhow!("pagination state poisoned"))?;
        dispatch(&mut state, action);
        Ok(())
    }
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        if !self.armed {
            return;
        }
        tracing::debug!(token = self.token.0, "load more cancelled");
        if let Ok(mut state) = self.state.lock() {
            dispatch(&mut state, Action::LoadFailed(self.token));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::post::{RawPost, RawPostData};
    use chrono::Locale;
    use std::sync::atomic::AtomicUsize;
    use tokio::sync::Notify;

    fn post(uid: &str) -> PostSummary {
        PostSummary {
            uid: uid.to_string(),
            first_publication_date: Some("25 mar 2021".to_string()),
            title: format!("title {uid}"),
            subtitle: format!("subtitle {uid}"),
            author: "author".to_string(),
        }
    }

    fn raw(uid: &str, date: &str) -> RawPost {
        RawPost {
            uid: Some(uid.to_string()),
            first_publication_date: Some(date.to_string()),
            data: RawPostData {
                title: format!("title {uid}"),
                subtitle: format!("subtitle {uid}"),
                author: "author".to_string(),
            },
        }
    }

    fn url(page: u32) -> Url {
        Url::parse(&format!("https://blog.example/api/v2/documents/search?page={page}")).unwrap()
    }

    fn uids(state: &PostList) -> Vec<&str> {
        state.posts().iter().map(|p| p.uid.as_str()).collect()
    }

    #[test]
    fn finished_load_appends_in_order_and_replaces_cursor() {
        let state = PostList::new(vec![post("a"), post("b")], Some(url(2)));
        let token = LoadToken(7);
        let state = reduce(state, Action::LoadStarted(token));
        assert!(state.is_loading());
        assert!(!state.can_load_more());

        let state = reduce(
            state,
            Action::LoadFinished {
                token,
                posts: vec![post("c"), post("d")],
                next_page: None,
            },
        );
        assert_eq!(uids(&state), ["a", "b", "c", "d"]);
        assert_eq!(state.next_page(), None);
        assert!(!state.is_loading());
        assert!(!state.can_load_more());
    }

    #[test]
    fn start_is_refused_without_cursor_or_while_loading() {
        let exhausted = PostList::new(vec![post("a")], None);
        assert_eq!(
            reduce(exhausted.clone(), Action::LoadStarted(LoadToken(1))),
            exhausted
        );

        let loading = reduce(
            PostList::new(vec![], Some(url(2))),
            Action::LoadStarted(LoadToken(1)),
        );
        let again = reduce(loading.clone(), Action::LoadStarted(LoadToken(2)));
        assert_eq!(again, loading);
    }

    #[test]
    fn stale_results_are_ignored() {
        let state = reduce(
            PostList::new(vec![post("a")], Some(url(2))),
            Action::LoadStarted(LoadToken(1)),
        );
        let state = reduce(
            state,
            Action::LoadFinished {
                token: LoadToken(99),
                posts: vec![post("x")],
                next_page: None,
            },
        );
        assert_eq!(uids(&state), ["a"]);
        assert_eq!(state.next_page(), Some(&url(2)));
        assert!(state.is_loading());
    }

    #[test]
    fn failure_keeps_posts_and_cursor() {
        let before = PostList::new(vec![post("a")], Some(url(2)));
        let state = reduce(before.clone(), Action::LoadStarted(LoadToken(3)));
        let state = reduce(state, Action::LoadFailed(LoadToken(3)));
        assert_eq!(state, before);
        assert!(state.can_load_more());
    }

    #[test]
    fn overlapping_pages_are_not_deduplicated() {
        let state = reduce(
            PostList::new(vec![post("a"), post("b")], Some(url(2))),
            Action::LoadStarted(LoadToken(1)),
        );
        let state = reduce(
            state,
            Action::LoadFinished {
                token: LoadToken(1),
                posts: vec![post("b"), post("c")],
                next_page: Some(url(3)),
            },
        );
        assert_eq!(uids(&state), ["a", "b", "b", "c"]);
    }

    #[test]
    fn initial_page_dates_are_formatted() {
        let page = PostsPagination {
            results: vec![PostSummary::from_raw(raw("a", "2021-03-25T00:00:00+0000"))],
            next_page: Some(url(2)),
        };
        let state = PostList::from_initial(page, &DateFormatter::new(Locale::pt_BR)).unwrap();
        assert_eq!(
            state.posts()[0].first_publication_date.as_deref(),
            Some("25 mar 2021")
        );
        assert!(state.can_load_more());
    }

    /// Serves canned pages; optionally parks each fetch until released.
    struct ScriptedSource {
        pages: Mutex<Vec<anyhow::Result<PageResponse>>>,
        calls: AtomicUsize,
        gate: Option<Notify>,
    }

    impl ScriptedSource {
        fn new(pages: Vec<anyhow::Result<PageResponse>>) -> Self {
            Self {
                pages: Mutex::new(pages),
                calls: AtomicUsize::new(0),
                gate: None,
            }
        }
    }

    impl PageSource for ScriptedSource {
        async fn fetch_page(&self, _url: &Url) -> anyhow::Result<PageResponse> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if let Some(gate) = &self.gate {
                gate.notified().await;
            }
            self.pages.lock().unwrap().remove(0)
        }
    }

    fn page(posts: Vec<RawPost>, next: Option<u32>) -> anyhow::Result<PageResponse> {
        Ok(PageResponse {
            page: None,
            total_pages: None,
            results: posts,
            next_page: next.map(|n| url(n).to_string()),
        })
    }

    #[tokio::test]
    async fn load_more_until_exhausted() {
        let source = ScriptedSource::new(vec![
            page(vec![raw("c", "2021-04-01T00:00:00+0000")], Some(3)),
            page(vec![raw("d", "2021-05-02T00:00:00+0000")], None),
        ]);
        let paginator = Paginator::new(
            PostList::new(vec![post("a"), post("b")], Some(url(2))),
            source,
            DateFormatter::new(Locale::pt_BR),
        );

        assert_eq!(
            paginator.load_more().await.unwrap(),
            LoadOutcome::Appended { count: 1 }
        );
        assert_eq!(
            paginator.load_more().await.unwrap(),
            LoadOutcome::Appended { count: 1 }
        );
        assert_eq!(paginator.load_more().await.unwrap(), LoadOutcome::Exhausted);

        let state = paginator.into_state().unwrap();
        assert_eq!(uids(&state), ["a", "b", "c", "d"]);
        assert_eq!(
            state.posts()[3].first_publication_date.as_deref(),
            Some("02 mai 2021")
        );
        assert_eq!(state.next_page(), None);
    }

    #[tokio::test]
    async fn failed_load_leaves_state_and_allows_retry() {
        let source = ScriptedSource::new(vec![
            Err(anyhow!("connection reset")),
            page(vec![raw("c", "2021-04-01T00:00:00+0000")], None),
        ]);
        let paginator = Paginator::new(
            PostList::new(vec![post("a")], Some(url(2))),
            source,
            DateFormatter::new(Locale::pt_BR),
        );

        assert!(paginator.load_more().await.is_err());
        let state = paginator.snapshot().unwrap();
        assert_eq!(uids(&state), ["a"]);
        assert!(state.can_load_more());

        assert_eq!(
            paginator.load_more().await.unwrap(),
            LoadOutcome::Appended { count: 1 }
        );
        assert_eq!(uids(&paginator.snapshot().unwrap()), ["a", "c"]);
    }

    #[tokio::test]
    async fn bad_date_in_next_page_is_an_error() {
        let source = ScriptedSource::new(vec![page(vec![raw("c", "not a date")], None)]);
        let paginator = Paginator::new(
            PostList::new(vec![post("a")], Some(url(2))),
            source,
            DateFormatter::new(Locale::pt_BR),
        );
        assert!(paginator.load_more().await.is_err());
        let state = paginator.snapshot().unwrap();
        assert_eq!(uids(&state), ["a"]);
        assert_eq!(state.next_page(), Some(&url(2)));
    }

    #[tokio::test]
    async fn concurrent_load_more_issues_one_fetch() {
        let mut source = ScriptedSource::new(vec![page(
            vec![raw("c", "2021-04-01T00:00:00+0000")],
            None,
        )]);
        source.gate = Some(Notify::new());
        let paginator = Paginator::new(
            PostList::new(vec![post("a")], Some(url(2))),
            source,
            DateFormatter::new(Locale::pt_BR),
        );

        let first = paginator.load_more();
        let second = async {
            while paginator.source.calls.load(Ordering::SeqCst) == 0 {
                tokio::task::yield_now().await;
            }
            let outcome = paginator.load_more().await;
            if let Some(gate) = &paginator.source.gate {
                gate.notify_one();
            }
            outcome
        };
        let (first, second) = tokio::join!(first, second);

        assert_eq!(first.unwrap(), LoadOutcome::Appended { count: 1 });
        assert_eq!(second.unwrap(), LoadOutcome::Busy);
        assert_eq!(paginator.source.calls.load(Ordering::SeqCst), 1);
        assert_eq!(uids(&paginator.snapshot().unwrap()), ["a", "c"]);
    }

    #[tokio::test]
    async fn cancelled_load_releases_in_flight_slot() {
        let mut source = ScriptedSource::new(vec![page(
            vec![raw("c", "2021-04-01T00:00:00+0000")],
            None,
        )]);
        source.gate = Some(Notify::new());
        let paginator = Paginator::new(
            PostList::new(vec![post("a")], Some(url(2))),
            source,
            DateFormatter::new(Locale::pt_BR),
        );

        let timed_out =
            tokio::time::timeout(std::time::Duration::from_millis(50), paginator.load_more())
                .await;
        assert!(timed_out.is_err());
        let state = paginator.snapshot().unwrap();
        assert!(!state.is_loading());
        assert!(state.can_load_more());
        assert_eq!(uids(&state), ["a"]);

        if let Some(gate) = &paginator.source.gate {
            gate.notify_one();
        }
        assert_eq!(
            paginator.load_more().await.unwrap(),
            LoadOutcome::Appended { count: 1 }
        );
        assert_eq!(paginator.source.calls.load(Ordering::SeqCst), 2);
        assert_eq!(uids(&paginator.snapshot().unwrap()), ["a", "c"]);
    }
}
