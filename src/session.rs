//! Per-session cache of replayed suggestion records.

use std::collections::HashMap;

use parking_lot::Mutex;

use crate::config::BoConfig;
use crate::convergence::SuggestionRecord;
use crate::engine::{self, TrainingPoint};
use crate::error::Result;
use crate::types::{IngredientBound, Observation, Suggestion};

/// A replayed record plus the observations it was computed from.
struct CachedRecord {
    prefix: Vec<TrainingPoint>,
    record: SuggestionRecord,
}

struct SessionTrace {
    bounds: Vec<IngredientBound>,
    records: Vec<CachedRecord>,
}

impl SessionTrace {
    fn lookup(&self, cycle: u32, prefix: &[TrainingPoint]) -> Option<SuggestionRecord> {
        self.records
            .iter()
            .find(|c| c.record.cycle == cycle && c.prefix == prefix)
            .map(|c| c.record.clone())
    }
}

/// Orchestrator front end that remembers earlier cycles per session.
///
/// [`propose_next_sample`](crate::propose_next_sample) replays the trailing
/// past cycles on each call to feed the convergence detector. `SessionEngine`
/// keeps those replayed records keyed by session id and reuses a record as
/// long as the observations preceding its cycle are unchanged, so a
/// session costs one GP fit per call instead of one per replayed cycle.
/// Results are identical to the uncached call.
///
/// The cache is guarded by a [`parking_lot::Mutex`]; the lock is never held
/// while a model is fitted, so sessions proceed in parallel.
///
/// Each session keeps at most
/// [`history_depth`](crate::ConvergenceThresholds::history_depth) records,
/// but sessions themselves are only evicted by [`forget`](Self::forget). A
/// long-running service should call it when a session ends.
///
/// # Examples
///
/// ```
/// use taste_bo::{BoConfig, IngredientBound, Observation, SessionEngine};
///
/// let engine = SessionEngine::new(BoConfig::default());
/// let bounds = vec![IngredientBound::new("sugar", 0.0, 100.0)];
/// let mut observations = vec![
///     Observation::rated(1, [("sugar", 10.0)], 2.0),
///     Observation::rated(2, [("sugar", 50.0)], 8.0),
///     Observation::rated(3, [("sugar", 90.0)], 3.0),
/// ];
///
/// let first = engine.propose("panel-7", &observations, &bounds, 4).unwrap();
/// observations.push(Observation::rated(4, first.concentration_map(), 7.0));
/// let second = engine.propose("panel-7", &observations, &bounds, 5).unwrap();
/// assert_eq!(second.cycle, 5);
/// assert_eq!(engine.cached_cycles("panel-7"), vec![4, 5]);
/// ```
pub struct SessionEngine {
    config: BoConfig,
    sessions: Mutex<HashMap<String, SessionTrace>>,
}

impl SessionEngine {
    /// Creates an engine with an empty cache.
    #[must_use]
    pub fn new(config: BoConfig) -> Self {
        Self {
            config,
            sessions: Mutex::new(HashMap::new()),
        }
    }

    /// The configuration every session is run with.
    #[must_use]
    pub fn config(&self) -> &BoConfig {
        &self.config
    }

    /// Proposes the next sample for `session_id`.
    ///
    /// # Errors
    ///
    /// Same as [`propose_next_sample`](crate::propose_next_sample).
    pub fn propose(
        &self,
        session_id: &str,
        observations: &[Observation],
        bounds: &[IngredientBound],
        current_cycle: u32,
    ) -> Result<Suggestion> {
        let prepared = engine::prepare(observations, bounds, &self.config, current_cycle)?;
        let deadline = engine::deadline(&self.config);
        let prefix_of = |cycle: u32| -> Vec<TrainingPoint> {
            prepared
                .points
                .iter()
                .take_while(|p| p.cycle < cycle)
                .cloned()
                .collect()
        };

        let outcome =
            engine::run_cycle(&prepared, bounds, &self.config, current_cycle, deadline);

        let cycles = engine::convergence_cycles(&prepared, &self.config, current_cycle);
        let mut hits: HashMap<u32, SuggestionRecord> = {
            let sessions = self.sessions.lock();
            match sessions.get(session_id) {
                Some(trace) if trace.bounds == bounds => cycles
                    .iter()
                    .filter_map(|&c| trace.lookup(c, &prefix_of(c)).map(|r| (c, r)))
                    .collect(),
                _ => HashMap::new(),
            }
        };

        trace_debug!(
            session = session_id,
            replayed = cycles.len(),
            misses = cycles.len() - hits.len(),
            "session history assembled"
        );
        let history = engine::replay_within(
            &prepared,
            bounds,
            &self.config,
            &cycles,
            deadline,
            |cycle| hits.remove(&cycle),
        );

        let suggestion = engine::finish(
            &prepared,
            bounds,
            current_cycle,
            &outcome,
            &self.config,
            history.clone(),
        );

        let records = history
            .into_iter()
            .chain(core::iter::once(SuggestionRecord::from(&suggestion)))
            .map(|record| CachedRecord {
                prefix: prefix_of(record.cycle),
                record,
            })
            .collect();
        self.sessions.lock().insert(
            session_id.to_owned(),
            SessionTrace {
                bounds: bounds.to_vec(),
                records,
            },
        );

        Ok(suggestion)
    }

    /// Drops everything cached for `session_id`.
    pub fn forget(&self, session_id: &str) {
        self.sessions.lock().remove(session_id);
    }

    /// Cycles with a cached record for `session_id`, in cycle order.
    #[must_use]
    pub fn cached_cycles(&self, session_id: &str) -> Vec<u32> {
        self.sessions
            .lock()
            .get(session_id)
            .map(|t| t.records.iter().map(|c| c.record.cycle).collect())
            .unwrap_or_default()
    }

    /// Number of sessions with cached state.
    #[must_use]
    pub fn session_count(&self) -> usize {
        self.sessions.lock().len()
    }
}
