// Debounced filter editing.
//
// Transition table (per controller):
//
//   from             event              to         effect
//   Idle/Committed   deferred edit      Pending    update current, arm timer
//   Pending          deferred edit      Pending    update current, re-arm timer
//   any              immediate edit     Committed  cancel timer, commit now
//   Pending          timer expiry       Committed  current -> debounced, commit
//   any              reset / drop       Idle       cancel timer, no commit
//
// Every edit bumps a generation counter; a timer only commits if its
// generation is still the latest, so a superseded timer can never commit
// even if it already woke up.

use serde::Serialize;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use tokio::task::JoinHandle;

use crate::filters::{FilterSet, FilterValue};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum DebounceState {
    Idle,
    Pending,
    Committed,
}

// A single user edit to the filter set
#[derive(Debug, Clone, PartialEq)]
pub enum FilterEdit {
    SetList { key: String, values: Vec<String> },
    SetScalar { key: String, value: String },
    Toggle { key: String, value: String },
    Remove { key: String },
    Replace(FilterSet),
    Clear,
}

impl FilterEdit {
    pub fn apply(&self, filters: &mut FilterSet) {
        match self {
            FilterEdit::SetList { key, values } => filters.set_list(key.clone(), values.iter().cloned()),
            FilterEdit::SetScalar { key, value } => {
                filters.set(key.clone(), FilterValue::Scalar(value.trim().to_string()))
            }
            FilterEdit::Toggle { key, value } => filters.toggle(key, value),
            FilterEdit::Remove { key } => {
                filters.remove(key);
            }
            FilterEdit::Replace(next) => *filters = next.clone(),
            FilterEdit::Clear => filters.clear(),
        }
    }
}

type CommitFn = dyn Fn(&FilterSet) + Send + Sync;

struct Inner {
    state: DebounceState,
    current: FilterSet,
    debounced: FilterSet,
    generation: u64,
    timer: Option<JoinHandle<()>>,
}

struct Shared {
    inner: Mutex<Inner>,
    // Generation of the last delivered commit; serializes delivery so an
    // older snapshot can never reach the callback after a newer one.
    delivered: Mutex<u64>,
    commit: Box<CommitFn>,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    // A panicking commit callback must not wedge the controller
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

impl Shared {
    fn deliver(&self, generation: u64, snapshot: FilterSet) {
        let mut delivered = lock(&self.delivered);
        if generation > *delivered {
            *delivered = generation;
            tracing::debug!(generation, filters = %snapshot.canonical(), "Committing debounced filters");
            (self.commit)(&snapshot);
        }
    }
}

// Owns the visible ("current") and committed ("debounced") filter sets.
// The commit callback must not call back into the same controller.
pub struct DebouncedFilters {
    shared: Arc<Shared>,
}

impl DebouncedFilters {
    pub fn new<F>(initial: FilterSet, commit: F) -> Self
    where
        F: Fn(&FilterSet) + Send + Sync + 'static,
    {
        let inner = Inner {
            state: DebounceState::Idle,
            current: initial.clone(),
            debounced: initial,
            generation: 0,
            timer: None,
        };
        Self {
            shared: Arc::new(Shared {
                inner: Mutex::new(inner),
                delivered: Mutex::new(0),
                commit: Box::new(commit),
            }),
        }
    }

    pub fn state(&self) -> DebounceState {
        lock(&self.shared.inner).state
    }

    pub fn current(&self) -> FilterSet {
        lock(&self.shared.inner).current.clone()
    }

    pub fn debounced(&self) -> FilterSet {
        lock(&self.shared.inner).debounced.clone()
    }

    // Deferred edits must be scheduled from inside a tokio runtime.
    pub fn schedule(&self, edit: FilterEdit, delay: Duration, immediate: bool) {
        let mut inner = lock(&self.shared.inner);
        edit.apply(&mut inner.current);
        inner.generation += 1;
        let generation = inner.generation;
        if let Some(timer) = inner.timer.take() {
            timer.abort();
        }

        if immediate {
            inner.state = DebounceState::Committed;
            inner.debounced = inner.current.clone();
            let snapshot = inner.debounced.clone();
            drop(inner);
            self.shared.deliver(generation, snapshot);
            return;
        }

        inner.state = DebounceState::Pending;
        let shared = Arc::clone(&self.shared);
        inner.timer = Some(tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            let snapshot = {
                let mut inner = lock(&shared.inner);
                if inner.generation != generation || inner.state != DebounceState::Pending {
                    return;
                }
                inner.state = DebounceState::Committed;
                inner.debounced = inner.current.clone();
                inner.timer = None;
                inner.debounced.clone()
            };
            shared.deliver(generation, snapshot);
        }));
    }

    // Commit a pending edit right away; no-op unless Pending
    pub fn flush(&self) {
        let mut inner = lock(&self.shared.inner);
        if inner.state != DebounceState::Pending {
            return;
        }
        if let Some(timer) = inner.timer.take() {
            timer.abort();
        }
        inner.state = DebounceState::Committed;
        inner.debounced = inner.current.clone();
        let generation = inner.generation;
        let snapshot = inner.debounced.clone();
        drop(inner);
        self.shared.deliver(generation, snapshot);
    }

    // Cancel any pending timer without committing and adopt `filters` as both
    // the visible and committed value (browser back/forward replay).
    pub fn reset(&self, filters: FilterSet) {
        let mut inner = lock(&self.shared.inner);
        if let Some(timer) = inner.timer.take() {
            timer.abort();
        }
        inner.generation += 1;
        inner.state = DebounceState::Idle;
        inner.current = filters.clone();
        inner.debounced = filters;
    }
}

impl Drop for DebouncedFilters {
    fn drop(&mut self) {
        let mut inner = lock(&self.shared.inner);
        if let Some(timer) = inner.timer.take() {
            timer.abort();
        }
        inner.generation += 1;
        inner.state = DebounceState::Idle;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    const DELAY: Duration = Duration::from_millis(300);

    fn recorder() -> (Arc<Mutex<Vec<FilterSet>>>, impl Fn(&FilterSet) + Send + Sync + 'static) {
        let commits = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&commits);
        (commits, move |f: &FilterSet| sink.lock().unwrap().push(f.clone()))
    }

    fn price_min(value: &str) -> FilterEdit {
        FilterEdit::SetScalar { key: "priceMin".into(), value: value.into() }
    }

    #[tokio::test(start_paused = true)]
    async fn rapid_edits_coalesce_into_one_commit() {
        let (commits, commit) = recorder();
        let controller = DebouncedFilters::new(FilterSet::new(), commit);

        for value in ["1", "10", "100", "1000", "10000"] {
            controller.schedule(price_min(value), DELAY, false);
            // Visible value updates synchronously
            assert_eq!(controller.current().scalar("priceMin"), Some(value));
            tokio::time::sleep(Duration::from_millis(100)).await;
        }
        assert_eq!(controller.state(), DebounceState::Pending);
        assert!(commits.lock().unwrap().is_empty());

        tokio::time::sleep(DELAY).await;
        tokio::task::yield_now().await;

        let commits = commits.lock().unwrap();
        assert_eq!(commits.len(), 1);
        assert_eq!(commits[0].scalar("priceMin"), Some("10000"));
        assert_eq!(controller.state(), DebounceState::Committed);
        assert_eq!(controller.debounced().scalar("priceMin"), Some("10000"));
    }

    #[tokio::test(start_paused = true)]
    async fn immediate_edit_commits_now_and_cancels_timer() {
        let (commits, commit) = recorder();
        let controller = DebouncedFilters::new(FilterSet::new(), commit);

        controller.schedule(price_min("5000"), DELAY, false);
        controller.schedule(
            FilterEdit::Toggle { key: "make".into(), value: "Ford".into() },
            DELAY,
            true,
        );
        {
            let commits = commits.lock().unwrap();
            assert_eq!(commits.len(), 1);
            assert_eq!(commits[0].list("make"), ["Ford"]);
            // The pending edit rides along with the immediate commit
            assert_eq!(commits[0].scalar("priceMin"), Some("5000"));
        }

        tokio::time::sleep(DELAY * 2).await;
        tokio::task::yield_now().await;
        assert_eq!(commits.lock().unwrap().len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn reset_cancels_without_committing() {
        let (commits, commit) = recorder();
        let controller = DebouncedFilters::new(FilterSet::new(), commit);

        controller.schedule(price_min("7000"), DELAY, false);
        let mut restored = FilterSet::new();
        restored.set_list("make", ["Kia"]);
        controller.reset(restored.clone());

        tokio::time::sleep(DELAY * 2).await;
        tokio::task::yield_now().await;
        assert!(commits.lock().unwrap().is_empty());
        assert_eq!(controller.state(), DebounceState::Idle);
        assert_eq!(controller.current(), restored);
        assert_eq!(controller.debounced(), restored);
    }

    #[tokio::test(start_paused = true)]
    async fn flush_commits_pending_edit() {
        let (commits, commit) = recorder();
        let controller = DebouncedFilters::new(FilterSet::new(), commit);

        controller.flush();
        assert!(commits.lock().unwrap().is_empty());

        controller.schedule(price_min("2500"), DELAY, false);
        controller.flush();
        tokio::time::sleep(DELAY * 2).await;
        tokio::task::yield_now().await;

        let commits = commits.lock().unwrap();
        assert_eq!(commits.len(), 1);
        assert_eq!(commits[0].scalar("priceMin"), Some("2500"));
    }

    #[tokio::test(start_paused = true)]
    async fn dropping_controller_cancels_pending_commit() {
        let (commits, commit) = recorder();
        let controller = DebouncedFilters::new(FilterSet::new(), commit);
        controller.schedule(price_min("1"), DELAY, false);
        drop(controller);

        tokio::time::sleep(DELAY * 2).await;
        tokio::task::yield_now().await;
        assert!(commits.lock().unwrap().is_empty());
    }
}
