//! Mock implementations of the collaborator traits
//!
//! In-memory doubles that let scheduler and dispatcher tests run without
//! PostgreSQL, Redis or a text-generation service.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::{Datelike, NaiveDate};
use mockall::mock;
use summary_core::{
    MessageChannel, PayloadStream, SchedulerError, SchedulerResult, SummaryGenerator,
    SummaryKind, SummaryPeriod, SummaryRepository, WorkUnit,
};
use summary_infrastructure::InMemoryChannel;
use tokio::sync::Semaphore;

#[derive(Debug, Default)]
struct RepositoryState {
    opted_in: HashMap<SummaryKind, HashSet<i64>>,
    diaries: BTreeMap<(i64, NaiveDate), Vec<String>>,
    summaries: HashMap<WorkUnit, String>,
    failing_users: HashSet<i64>,
    fail_saves: bool,
}

/// In-memory implementation of [`SummaryRepository`]
#[derive(Debug, Clone, Default)]
pub struct MockSummaryRepository {
    state: Arc<Mutex<RepositoryState>>,
}

impl MockSummaryRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn opt_in(&self, user_id: i64, kind: SummaryKind) -> &Self {
        self.state
            .lock()
            .unwrap()
            .opted_in
            .entry(kind)
            .or_default()
            .insert(user_id);
        self
    }

    pub fn add_diary(&self, user_id: i64, date: NaiveDate, content: &str) -> &Self {
        self.state
            .lock()
            .unwrap()
            .diaries
            .entry((user_id, date))
            .or_default()
            .push(content.to_string());
        self
    }

    pub fn add_summary(&self, unit: WorkUnit, content: &str) -> &Self {
        self.state
            .lock()
            .unwrap()
            .summaries
            .insert(unit, content.to_string());
        self
    }

    /// Make `find_missing_periods` fail for this user
    pub fn fail_queries_for(&self, user_id: i64) -> &Self {
        self.state.lock().unwrap().failing_users.insert(user_id);
        self
    }

    pub fn set_fail_saves(&self, fail: bool) {
        self.state.lock().unwrap().fail_saves = fail;
    }

    pub fn summary_for(&self, unit: &WorkUnit) -> Option<String> {
        self.state.lock().unwrap().summaries.get(unit).cloned()
    }

    pub fn summary_count(&self) -> usize {
        self.state.lock().unwrap().summaries.len()
    }
}

#[async_trait]
impl SummaryRepository for MockSummaryRepository {
    async fn list_opted_in_users(&self, kind: SummaryKind) -> SchedulerResult<Vec<i64>> {
        let state = self.state.lock().unwrap();
        let mut users: Vec<i64> = state
            .opted_in
            .get(&kind)
            .map(|users| users.iter().copied().collect())
            .unwrap_or_default();
        users.sort_unstable();
        Ok(users)
    }

    async fn find_missing_periods(
        &self,
        user_id: i64,
        kind: SummaryKind,
        current: SummaryPeriod,
    ) -> SchedulerResult<Vec<SummaryPeriod>> {
        let state = self.state.lock().unwrap();
        if state.failing_users.contains(&user_id) {
            return Err(SchedulerError::Store(format!(
                "injected query failure for user {user_id}"
            )));
        }

        let mut periods: Vec<SummaryPeriod> = Vec::new();
        for (_, date) in state.diaries.keys().filter(|(user, _)| *user == user_id) {
            let period = match kind {
                SummaryKind::Daily => SummaryPeriod::daily(*date),
                SummaryKind::Monthly => SummaryPeriod::monthly(date.year(), date.month()),
            };
            if !period.is_before(&current) || periods.contains(&period) {
                continue;
            }
            if !state.summaries.contains_key(&WorkUnit::new(user_id, period)) {
                periods.push(period);
            }
        }
        Ok(periods)
    }

    async fn load_source_content(&self, unit: &WorkUnit) -> SchedulerResult<Option<String>> {
        let (start, end) = unit
            .period
            .date_range()
            .ok_or_else(|| SchedulerError::InvalidArgument(format!("{:?}", unit.period)))?;
        let state = self.state.lock().unwrap();
        let sections: Vec<String> = state
            .diaries
            .range((unit.user_id, start)..(unit.user_id, end))
            .flat_map(|((_, date), entries)| {
                entries
                    .iter()
                    .map(move |content| format!("[{}]\n{}", date.format("%Y-%m-%d"), content))
            })
            .collect();

        if sections.is_empty() {
            Ok(None)
        } else {
            Ok(Some(sections.join("\n\n")))
        }
    }

    async fn save_summary(&self, unit: &WorkUnit, content: &str) -> SchedulerResult<()> {
        let mut state = self.state.lock().unwrap();
        if state.fail_saves {
            return Err(SchedulerError::Internal("injected save failure".to_string()));
        }
        state.summaries.insert(*unit, content.to_string());
        Ok(())
    }
}

/// Channel that records every publish and forwards it to an in-process broadcast
#[derive(Debug, Default)]
pub struct RecordingChannel {
    inner: InMemoryChannel,
    published: Mutex<Vec<(String, String)>>,
    fail_patterns: Mutex<Vec<String>>,
}

impl RecordingChannel {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fail publishes whose payload contains `pattern`
    pub fn fail_payloads_containing(&self, pattern: &str) {
        self.fail_patterns.lock().unwrap().push(pattern.to_string());
    }

    pub fn published(&self) -> Vec<(String, String)> {
        self.published.lock().unwrap().clone()
    }

    pub fn published_payloads(&self) -> Vec<String> {
        self.published()
            .into_iter()
            .map(|(_, payload)| payload)
            .collect()
    }

    pub fn clear(&self) {
        self.published.lock().unwrap().clear();
    }

    pub fn inner(&self) -> &InMemoryChannel {
        &self.inner
    }
}

#[async_trait]
impl MessageChannel for RecordingChannel {
    async fn publish(&self, channel: &str, payload: &str) -> SchedulerResult<()> {
        let should_fail = self
            .fail_patterns
            .lock()
            .unwrap()
            .iter()
            .any(|pattern| payload.contains(pattern.as_str()));
        if should_fail {
            return Err(SchedulerError::Channel("injected publish failure".to_string()));
        }

        self.published
            .lock()
            .unwrap()
            .push((channel.to_string(), payload.to_string()));
        self.inner.publish(channel, payload).await
    }

    async fn subscribe(&self, channel: &str) -> SchedulerResult<PayloadStream> {
        self.inner.subscribe(channel).await
    }
}

mock! {
    pub SummaryGenerator {}

    #[async_trait]
    impl SummaryGenerator for SummaryGenerator {
        async fn generate(&self, content: &str) -> SchedulerResult<String>;
    }
}

/// Generator whose calls block until the test opens the gate
///
/// Tracks how many calls started and the peak number running at once.
#[derive(Debug)]
pub struct GatedGenerator {
    gate: Semaphore,
    calls: AtomicUsize,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
}

impl Default for GatedGenerator {
    fn default() -> Self {
        Self::new()
    }
}

impl GatedGenerator {
    pub fn new() -> Self {
        Self {
            gate: Semaphore::new(0),
            calls: AtomicUsize::new(0),
            in_flight: AtomicUsize::new(0),
            max_in_flight: AtomicUsize::new(0),
        }
    }

    /// Let `n` blocked or future calls complete
    pub fn open(&self, n: usize) {
        self.gate.add_permits(n);
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn in_flight(&self) -> usize {
        self.in_flight.load(Ordering::SeqCst)
    }

    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl SummaryGenerator for GatedGenerator {
    async fn generate(&self, content: &str) -> SchedulerResult<String> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let running = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(running, Ordering::SeqCst);

        let permit = self.gate.acquire().await;
        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        permit
            .map_err(|_| SchedulerError::Generation("gate closed".to_string()))?
            .forget();

        Ok(format!("summary of {} chars", content.chars().count()))
    }
}
