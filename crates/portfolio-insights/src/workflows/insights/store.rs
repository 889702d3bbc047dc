//! Canonical insight records, the dedup index and the read/archive lifecycle.
//!
//! Every mutation runs under the store's write lock and swaps in a fully built record, so a
//! key is never observed half-updated. Reads clone out of a read lock, giving callers a
//! consistent snapshot as of the call.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use super::builder::{self, display_name, render_copy, InsightCopy};
use super::clock::{Clock, SystemClock};
use super::domain::{
    ComparisonPeriod, DedupKey, InsightId, InsightSeverity, InsightStatus, MetricType,
    PropertyId, PropertyInsight,
};
use super::evaluation::{decision_key, TriggerDecision};

/// Result of feeding a trigger decision into the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum UpsertOutcome {
    /// No open insight existed; a new unread insight was created.
    Created,
    /// The open insight for the key was refreshed in place.
    Refreshed { severity_changed: bool },
    /// The user dismissed this condition and it has not worsened since.
    Suppressed,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UpsertReceipt {
    pub id: InsightId,
    pub outcome: UpsertOutcome,
}

/// Optional narrowing applied to list queries.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct InsightFilter {
    #[serde(default)]
    pub property_id: Option<PropertyId>,
    #[serde(default, rename = "type")]
    pub insight_type: Option<MetricType>,
    #[serde(default)]
    pub severity: Option<InsightSeverity>,
    #[serde(default)]
    pub status: Option<InsightStatus>,
    #[serde(default)]
    pub period: Option<ComparisonPeriod>,
}

impl InsightFilter {
    pub fn for_property(property_id: impl Into<String>) -> Self {
        Self {
            property_id: Some(PropertyId::new(property_id)),
            ..Self::default()
        }
    }

    fn matches(&self, insight: &PropertyInsight) -> bool {
        self.property_id
            .as_ref()
            .map_or(true, |id| *id == insight.property_id)
            && self
                .insight_type
                .map_or(true, |kind| kind == insight.insight_type)
            && self
                .severity
                .map_or(true, |severity| severity == insight.severity)
            && self.status.map_or(true, |status| status == insight.status)
            && self
                .period
                .map_or(true, |period| period == insight.comparison_period)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("insight {0} not found")]
    NotFound(InsightId),
    #[error("insight store unavailable: {0}")]
    Unavailable(String),
}

#[derive(Debug, Clone)]
struct StoredInsight {
    sequence: u64,
    insight: PropertyInsight,
}

#[derive(Debug, Default)]
struct StoreState {
    insights: HashMap<InsightId, StoredInsight>,
    open_index: HashMap<DedupKey, InsightId>,
    dismissed: HashMap<DedupKey, (InsightId, InsightSeverity)>,
}

/// Owner of every `PropertyInsight`; shared by the evaluation pass and read-side consumers.
pub struct InsightStore {
    state: RwLock<StoreState>,
    clock: Arc<dyn Clock>,
    sequence: AtomicU64,
}

impl Default for InsightStore {
    fn default() -> Self {
        Self::new()
    }
}

impl InsightStore {
    pub fn new() -> Self {
        Self::with_clock(Arc::new(SystemClock))
    }

    pub fn with_clock(clock: Arc<dyn Clock>) -> Self {
        Self {
            state: RwLock::new(StoreState::default()),
            clock,
            sequence: AtomicU64::new(1),
        }
    }

    /// Current time according to the store's clock.
    pub fn now(&self) -> DateTime<Utc> {
        self.clock.now()
    }

    fn read(&self) -> Result<RwLockReadGuard<'_, StoreState>, StoreError> {
        self.state
            .read()
            .map_err(|_| StoreError::Unavailable("insight store lock poisoned".to_string()))
    }

    fn write(&self) -> Result<RwLockWriteGuard<'_, StoreState>, StoreError> {
        self.state
            .write()
            .map_err(|_| StoreError::Unavailable("insight store lock poisoned".to_string()))
    }

    fn next_id(&self) -> (u64, InsightId) {
        let sequence = self.sequence.fetch_add(1, Ordering::Relaxed);
        (sequence, InsightId(format!("ins-{sequence:06}")))
    }

    /// Record a triggered condition, creating an insight only when none is open for the key.
    pub fn upsert(
        &self,
        decision: &TriggerDecision,
        property_id: &PropertyId,
        property_name: &str,
    ) -> Result<UpsertReceipt, StoreError> {
        let key = decision_key(property_id, decision);
        let mut state = self.write()?;
        let now = self.clock.now();

        if let Some(id) = state.open_index.get(&key).cloned() {
            let stored = state
                .insights
                .get(&id)
                .ok_or_else(|| StoreError::NotFound(id.clone()))?;

            let previous_severity = stored.insight.severity;
            let InsightCopy {
                title,
                message,
                suggestion,
            } = render_copy(decision, property_id, property_name);

            let mut refreshed = stored.clone();
            refreshed.insight.property_name = display_name(property_id, property_name).to_string();
            refreshed.insight.severity = decision.severity;
            refreshed.insight.metric = decision.metric.clone();
            refreshed.insight.title = title;
            refreshed.insight.message = message;
            refreshed.insight.suggestion = suggestion;
            refreshed.insight.actions = builder::build_actions(&id, decision);
            refreshed.insight.updated_at = now;
            state.insights.insert(id.clone(), refreshed);

            debug!(%key, insight = %id, "refreshed open insight");
            return Ok(UpsertReceipt {
                id,
                outcome: UpsertOutcome::Refreshed {
                    severity_changed: previous_severity != decision.severity,
                },
            });
        }

        if let Some((dismissed_id, dismissed_severity)) = state.dismissed.get(&key).cloned() {
            if decision.severity <= dismissed_severity {
                debug!(%key, insight = %dismissed_id, "condition dismissed by user; suppressing");
                return Ok(UpsertReceipt {
                    id: dismissed_id,
                    outcome: UpsertOutcome::Suppressed,
                });
            }
            debug!(%key, insight = %dismissed_id, "dismissed condition escalated; reopening");
            state.dismissed.remove(&key);
        }

        let (sequence, id) = self.next_id();
        let insight = builder::build(id.clone(), decision, property_id, property_name, now);
        state.insights.insert(id.clone(), StoredInsight { sequence, insight });
        state.open_index.insert(key.clone(), id.clone());

        info!(%key, insight = %id, severity = decision.severity.label(), "created insight");
        Ok(UpsertReceipt {
            id,
            outcome: UpsertOutcome::Created,
        })
    }

    /// Archive the open insight for a key whose condition no longer triggers.
    ///
    /// Returns the archived id, or `None` when nothing was open. Also lifts any user
    /// dismissal, so a later recurrence raises a fresh insight.
    pub fn resolve(
        &self,
        property_id: &PropertyId,
        metric_type: MetricType,
        comparison_period: ComparisonPeriod,
    ) -> Result<Option<InsightId>, StoreError> {
        let key = DedupKey {
            property_id: property_id.clone(),
            metric_type,
            comparison_period,
        };
        let mut state = self.write()?;
        state.dismissed.remove(&key);

        let Some(id) = state.open_index.remove(&key) else {
            return Ok(None);
        };

        let now = self.clock.now();
        if let Some(stored) = state.insights.get_mut(&id) {
            stored.insight.status = InsightStatus::Archived;
            stored.insight.archived_at = Some(now);
            stored.insight.updated_at = now;
        }

        debug!(%key, insight = %id, "condition resolved; insight archived");
        Ok(Some(id))
    }

    /// Mark an insight read. Already-read and archived insights are left untouched.
    pub fn mark_read(&self, id: &InsightId) -> Result<PropertyInsight, StoreError> {
        let mut state = self.write()?;
        let now = self.clock.now();
        let stored = state
            .insights
            .get_mut(id)
            .ok_or_else(|| StoreError::NotFound(id.clone()))?;

        if stored.insight.status == InsightStatus::Unread {
            stored.insight.status = InsightStatus::Read;
            stored.insight.read_at = Some(now);
        }

        Ok(stored.insight.clone())
    }

    /// User dismissal. Idempotent for insights that are already archived.
    pub fn archive(&self, id: &InsightId) -> Result<PropertyInsight, StoreError> {
        let mut state = self.write()?;
        let now = self.clock.now();
        let StoreState {
            insights,
            open_index,
            dismissed,
        } = &mut *state;

        let stored = insights
            .get_mut(id)
            .ok_or_else(|| StoreError::NotFound(id.clone()))?;

        if stored.insight.is_open() {
            let key = stored.insight.dedup_key();
            stored.insight.status = InsightStatus::Archived;
            stored.insight.archived_at = Some(now);
            stored.insight.updated_at = now;

            if open_index.get(&key) == Some(id) {
                open_index.remove(&key);
            }
            dismissed.insert(key, (id.clone(), stored.insight.severity));
        }

        Ok(stored.insight.clone())
    }

    pub fn get(&self, id: &InsightId) -> Result<PropertyInsight, StoreError> {
        let state = self.read()?;
        state
            .insights
            .get(id)
            .map(|stored| stored.insight.clone())
            .ok_or_else(|| StoreError::NotFound(id.clone()))
    }

    /// The open insight currently holding `key`, if any.
    pub fn open_insight(&self, key: &DedupKey) -> Result<Option<PropertyInsight>, StoreError> {
        let state = self.read()?;
        Ok(state
            .open_index
            .get(key)
            .and_then(|id| state.insights.get(id))
            .map(|stored| stored.insight.clone()))
    }

    /// Open insights, critical first, newest first within a severity.
    pub fn list_active(&self, filter: &InsightFilter) -> Result<Vec<PropertyInsight>, StoreError> {
        self.list_where(filter, |insight| insight.is_open())
    }

    /// Archived insights, using the same ordering as [`InsightStore::list_active`].
    pub fn list_archived(
        &self,
        filter: &InsightFilter,
    ) -> Result<Vec<PropertyInsight>, StoreError> {
        self.list_where(filter, |insight| !insight.is_open())
    }

    /// Badge count of insights nobody has looked at yet.
    pub fn unread_count(&self) -> Result<usize, StoreError> {
        let state = self.read()?;
        Ok(state
            .insights
            .values()
            .filter(|stored| stored.insight.status == InsightStatus::Unread)
            .count())
    }

    pub fn open_count(&self) -> Result<usize, StoreError> {
        let state = self.read()?;
        Ok(state.open_index.len())
    }

    /// Drop archived insights archived before `cutoff`, returning how many were removed.
    ///
    /// A record still backing a user dismissal is kept so suppressed upserts keep resolving
    /// to an existing insight.
    pub fn purge_archived_before(&self, cutoff: DateTime<Utc>) -> Result<usize, StoreError> {
        let mut state = self.write()?;
        let StoreState {
            insights,
            dismissed,
            ..
        } = &mut *state;

        let before = insights.len();
        insights.retain(|id, stored| match stored.insight.archived_at {
            Some(archived_at) if archived_at < cutoff => dismissed
                .get(&stored.insight.dedup_key())
                .is_some_and(|(dismissed_id, _)| dismissed_id == id),
            _ => true,
        });
        let purged = before - insights.len();

        if purged > 0 {
            info!(purged, %cutoff, "purged archived insights");
        }
        Ok(purged)
    }

    fn list_where<F>(
        &self,
        filter: &InsightFilter,
        predicate: F,
    ) -> Result<Vec<PropertyInsight>, StoreError>
    where
        F: Fn(&PropertyInsight) -> bool,
    {
        let state = self.read()?;
        let mut selected: Vec<&StoredInsight> = state
            .insights
            .values()
            .filter(|stored| predicate(&stored.insight) && filter.matches(&stored.insight))
            .collect();

        selected.sort_by(|left, right| {
            right
                .insight
                .severity
                .cmp(&left.insight.severity)
                .then_with(|| right.insight.created_at.cmp(&left.insight.created_at))
                .then_with(|| right.sequence.cmp(&left.sequence))
        });

        Ok(selected
            .into_iter()
            .map(|stored| stored.insight.clone())
            .collect())
    }
}
