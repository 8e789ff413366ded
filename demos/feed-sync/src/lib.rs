//! # Feed Sync Example
//!
//! A paginated feed that loads itself.
//!
//! This example showcases:
//! - A derive function deciding which page the state still needs
//! - A reducer that records "requested" before the load runs, so derive settles
//! - Wrapping both with [`and_then_fetch`] into one reducer
//! - A small host loop that executes effects and feeds results back
//!
//! ## Flow
//!
//! ```text
//! Open ─► derive: [RequestPage(1)] ─► Future(load 1)
//!                                          │
//! PageLoaded(1, has_more) ◄────────────────┘
//!   └─► derive: [RequestPage(2)] ─► Future(load 2) ─► ...
//! ```
//!
//! ## Example
//!
//! ```no_run
//! use feed_sync::{FeedAction, FeedEnvironment, FeedState, SimulatedSource, feed_reducer, host};
//!
//! # async fn example() {
//! let env = FeedEnvironment::new(SimulatedSource::new(3, 2));
//! let reducer = feed_reducer();
//! let mut state = FeedState::default();
//!
//! host::run_until_idle(&reducer, &mut state, &env, FeedAction::Open).await;
//! assert!(state.is_complete());
//! # }
//! ```

use fetchloop_core::fetch::{FetchReducer, and_then_fetch};
use fetchloop_core::{Effect, Effects, Reducer, smallvec};
use std::collections::{BTreeMap, BTreeSet};
use std::sync::{Arc, Mutex, PoisonError};
use thiserror::Error;

/// Runs reducers against effects until nothing is left to do
pub mod host;

/// Errors from a page source
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FeedError {
    /// The page number is past the end of the feed
    #[error("Page {0} does not exist")]
    NoSuchPage(u32),

    /// The source could not serve the page right now
    #[error("Source unavailable while loading page {0}")]
    Unavailable(u32),
}

/// One page of feed items
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Page {
    /// 1-based page number
    pub number: u32,
    /// Items on this page
    pub items: Vec<String>,
    /// Whether a next page exists
    pub has_more: bool,
}

/// Feed state
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FeedState {
    /// Whether the feed is on screen
    pub open: bool,
    /// Pages a load has been started for
    pub requested: BTreeSet<u32>,
    /// Pages loaded so far
    pub pages: BTreeMap<u32, Page>,
    /// Pages whose load failed, with the error
    pub failures: BTreeMap<u32, String>,
}

impl FeedState {
    /// All loaded items in page order
    pub fn items(&self) -> impl Iterator<Item = &str> {
        self.pages
            .values()
            .flat_map(|page| page.items.iter().map(String::as_str))
    }

    /// Whether the last page has been loaded
    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.pages
            .last_key_value()
            .is_some_and(|(_, page)| !page.has_more)
    }
}

/// Feed actions
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FeedAction {
    /// The feed came on screen
    Open,
    /// Start loading a page
    RequestPage(u32),
    /// A page finished loading
    PageLoaded(Page),
    /// A page failed to load
    PageFailed {
        /// Page number
        page: u32,
        /// Why it failed
        error: String,
    },
    /// Forget failures so derive requests those pages again
    Retry,
    /// The feed left the screen; drop everything
    Close,
}

/// Where pages come from
pub trait PageSource: Send + Sync {
    /// Load one page
    ///
    /// # Errors
    ///
    /// Returns [`FeedError`] if the page cannot be served.
    fn load(&self, page: u32) -> Result<Page, FeedError>;
}

/// In-memory page source with numbered items
///
/// Pages listed with [`SimulatedSource::fail_once`] report
/// [`FeedError::Unavailable`] on their first load only.
#[derive(Debug)]
pub struct SimulatedSource {
    total_pages: u32,
    per_page: usize,
    fail_once: Mutex<BTreeSet<u32>>,
}

impl SimulatedSource {
    /// A feed of `total_pages` pages with `per_page` items each
    #[must_use]
    pub fn new(total_pages: u32, per_page: usize) -> Self {
        Self {
            total_pages,
            per_page,
            fail_once: Mutex::new(BTreeSet::new()),
        }
    }

    /// Make the first load of `page` fail
    #[must_use]
    pub fn fail_once(self, page: u32) -> Self {
        self.fail_once
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(page);
        self
    }
}

impl PageSource for SimulatedSource {
    fn load(&self, page: u32) -> Result<Page, FeedError> {
        if page == 0 || page > self.total_pages {
            return Err(FeedError::NoSuchPage(page));
        }
        if self
            .fail_once
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&page)
        {
            return Err(FeedError::Unavailable(page));
        }

        let first = (page as usize - 1) * self.per_page + 1;
        Ok(Page {
            number: page,
            items: (first..first + self.per_page)
                .map(|n| format!("item-{n}"))
                .collect(),
            has_more: page < self.total_pages,
        })
    }
}

/// Feed environment
#[derive(Clone)]
pub struct FeedEnvironment {
    /// Page source used by load effects
    pub source: Arc<dyn PageSource>,
}

impl FeedEnvironment {
    /// Create a new feed environment with the given source
    #[must_use]
    pub fn new(source: impl PageSource + 'static) -> Self {
        Self {
            source: Arc::new(source),
        }
    }
}

/// Feed reducer
///
/// `RequestPage` marks the page as requested immediately; the load itself
/// is an `Effect::Future` the host runs later.
#[derive(Debug, Clone, Copy, Default)]
pub struct FeedReducer;

impl Reducer for FeedReducer {
    type State = FeedState;
    type Action = FeedAction;
    type Environment = FeedEnvironment;

    fn reduce(
        &self,
        state: &mut Self::State,
        action: Self::Action,
        env: &Self::Environment,
    ) -> Effects<Self::Action> {
        match action {
            FeedAction::Open => {
                state.open = true;
            },
            FeedAction::RequestPage(page) => {
                state.requested.insert(page);
                let source = Arc::clone(&env.source);
                return smallvec![Effect::Future(Box::pin(async move {
                    Some(match source.load(page) {
                        Ok(loaded) => FeedAction::PageLoaded(loaded),
                        Err(error) => FeedAction::PageFailed {
                            page,
                            error: error.to_string(),
                        },
                    })
                }))];
            },
            FeedAction::PageLoaded(page) => {
                if state.requested.contains(&page.number) {
                    state.pages.insert(page.number, page);
                } else {
                    tracing::warn!(page = page.number, "Dropping page that was never requested");
                }
            },
            FeedAction::PageFailed { page, error } => {
                tracing::warn!(page, %error, "Page load failed");
                state.failures.insert(page, error);
            },
            FeedAction::Retry => {
                for page in std::mem::take(&mut state.failures).into_keys() {
                    state.requested.remove(&page);
                }
            },
            FeedAction::Close => {
                *state = FeedState::default();
            },
        }

        smallvec![Effect::None]
    }
}

/// The page the feed still needs, if any
///
/// Nothing is proposed while the feed is closed, while a failure is
/// outstanding, or once the needed page has been requested.
#[must_use]
pub fn derive_pages(state: &FeedState) -> Vec<FeedAction> {
    if !state.open || !state.failures.is_empty() {
        return vec![];
    }

    let next = match state.pages.last_key_value() {
        None => 1,
        Some((_, page)) if page.has_more => page.number + 1,
        Some(_) => return vec![],
    };

    if state.requested.contains(&next) {
        vec![]
    } else {
        vec![FeedAction::RequestPage(next)]
    }
}

/// Derive function type used by [`feed_reducer`]
pub type PageDerive = fn(&FeedState) -> Vec<FeedAction>;

/// [`FeedReducer`] wrapped so it requests pages on its own
#[must_use]
pub fn feed_reducer() -> FetchReducer<FeedReducer, PageDerive> {
    and_then_fetch(derive_pages as PageDerive, FeedReducer)
}
