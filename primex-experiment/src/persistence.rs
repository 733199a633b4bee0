//! Storage boundary for finished runs.
//!
//! The engine never depends on a concrete backend: it hands a batch of
//! [`ResultRecord`]s to a [`PersistenceGateway`] once the run is over. Calls
//! are asynchronous, fallible and never retried.

use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use primex_core::{TrialCondition, TrialResult};
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tracing::{error, info};

use crate::config::{ExperimentConfig, ParadigmKind};
use crate::error::{Error, Result};
use crate::run::RunState;
use crate::share::Experimenter;

/// A result row as stored: one flat column per field, snake_case, so a
/// relational table can hold the rows of every paradigm. Columns that do not
/// apply to a paradigm stay null.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResultRecord {
    pub trial_number: usize,
    pub paradigm: String,
    pub language: Option<String>,
    pub word: Option<String>,
    pub word_meaning: Option<String>,
    pub ink_color: Option<String>,
    pub ink_hex: Option<String>,
    pub prime: Option<String>,
    pub target: Option<String>,
    pub condition: Option<String>,
    pub congruent: Option<bool>,
    pub baseline: Option<bool>,
    pub correct_response: Option<String>,
    pub response: Option<String>,
    pub correct: Option<bool>,
    pub rt: Option<f64>,
    pub timeout: bool,
    pub timestamp: DateTime<Utc>,
    pub experiment_id: String,
    pub experiment_name: String,
    pub participant_id: String,
    pub external_id: Option<String>,
    pub experimenter_email: Option<String>,
    pub user_experiment_id: Option<String>,
}

impl ResultRecord {
    /// Condition columns of `result`; run metadata is left empty.
    pub fn from_result(result: &TrialResult) -> Self {
        let mut record = Self {
            trial_number: result.trial_number,
            paradigm: String::new(),
            language: None,
            word: None,
            word_meaning: None,
            ink_color: None,
            ink_hex: None,
            prime: None,
            target: None,
            condition: None,
            congruent: result.condition.congruent(),
            baseline: None,
            correct_response: result.correct_response.clone(),
            response: result.response.clone(),
            correct: result.correct,
            rt: result.rt_ms,
            timeout: result.is_timeout(),
            timestamp: result.timestamp,
            experiment_id: String::new(),
            experiment_name: String::new(),
            participant_id: String::new(),
            external_id: None,
            experimenter_email: None,
            user_experiment_id: None,
        };
        match &result.condition {
            TrialCondition::Stroop {
                language,
                ink_color,
                ink_hex,
                word,
                word_meaning,
                ..
            } => {
                record.paradigm = ParadigmKind::Stroop.as_str().to_string();
                record.language = Some(language.clone());
                record.word = Some(word.clone());
                record.word_meaning = Some(word_meaning.clone());
                record.ink_color = Some(ink_color.clone());
                record.ink_hex = Some(ink_hex.clone());
            }
            TrialCondition::NumberPriming { prime, target, .. } => {
                record.paradigm = ParadigmKind::NumberPriming.as_str().to_string();
                record.prime = Some(prime.to_string());
                record.target = Some(target.to_string());
            }
            TrialCondition::GenericPriming {
                prime,
                target,
                condition,
                baseline,
                ..
            } => {
                record.paradigm = ParadigmKind::GenericPriming.as_str().to_string();
                record.prime = Some(prime.clone());
                record.target = Some(target.clone());
                record.condition = Some(condition.clone());
                record.baseline = *baseline;
            }
        }
        record
    }
}

/// Tags every result of a run with its metadata.
///
/// Without an experimenter the run is filed under the configuration id, so
/// duplicate checks against `user_experiment_id` still find it.
pub fn records_for_run(
    config: &ExperimentConfig,
    run: &RunState,
    experimenter: Option<&Experimenter>,
) -> Vec<ResultRecord> {
    let user_experiment_id = experimenter.map_or_else(|| config.id.clone(), |e| e.experiment_id.clone());
    run.results()
        .iter()
        .map(|result| ResultRecord {
            experiment_id: config.id.clone(),
            experiment_name: config.name.clone(),
            participant_id: run.participant_id().to_string(),
            external_id: run.external_id().map(str::to_string),
            experimenter_email: experimenter.map(|e| e.email.clone()),
            user_experiment_id: Some(user_experiment_id.clone()),
            ..ResultRecord::from_result(result)
        })
        .collect()
}

/// Every stored row an experimenter's shared experiment produced.
pub async fn experimenter_results<G: PersistenceGateway>(
    gateway: &G,
    table: &str,
    email: &str,
    experiment_id: &str,
) -> Result<Vec<ResultRecord>> {
    let mut rows = gateway
        .query(
            table,
            &[
                Filter::eq("experimenter_email", email),
                Filter::eq("user_experiment_id", experiment_id),
            ],
        )
        .await?;
    rows.sort_by(|a, b| {
        (&a.participant_id, a.trial_number).cmp(&(&b.participant_id, b.trial_number))
    });
    Ok(rows)
}

/// Equality filter on one column.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Filter {
    pub column: String,
    pub value: String,
}

impl Filter {
    pub fn eq(column: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            column: column.into(),
            value: value.into(),
        }
    }
}

pub trait PersistenceGateway: Send + Sync {
    fn save(
        &self,
        table: &str,
        records: &[ResultRecord],
    ) -> impl Future<Output = Result<()>> + Send;

    fn query(
        &self,
        table: &str,
        filters: &[Filter],
    ) -> impl Future<Output = Result<Vec<ResultRecord>>> + Send;

    /// Whether `external_id` already took part in `experiment_id`.
    fn check_duplicate(
        &self,
        table: &str,
        experiment_id: &str,
        external_id: &str,
    ) -> impl Future<Output = Result<bool>> + Send;
}

/// Process-local tables, for tests and offline runs.
#[derive(Debug, Default, Clone)]
pub struct InMemoryGateway {
    tables: Arc<Mutex<HashMap<String, Vec<ResultRecord>>>>,
    unavailable: bool,
}

impl InMemoryGateway {
    pub fn new() -> Self {
        Self::default()
    }

    /// A gateway whose every call fails, to exercise degraded paths.
    pub fn unavailable() -> Self {
        Self {
            unavailable: true,
            ..Self::default()
        }
    }

    pub async fn rows(&self, table: &str) -> Vec<ResultRecord> {
        self.tables
            .lock()
            .await
            .get(table)
            .cloned()
            .unwrap_or_default()
    }

    fn check_available(&self) -> Result<()> {
        if self.unavailable {
            return Err(Error::PersistenceFailure("store unavailable".into()));
        }
        Ok(())
    }
}

fn matches(record: &ResultRecord, filters: &[Filter]) -> Result<bool> {
    let value = serde_json::to_value(record)
        .map_err(|e| Error::PersistenceFailure(format!("cannot encode record: {e}")))?;
    Ok(filters.iter().all(|f| match value.get(&f.column) {
        Some(serde_json::Value::String(s)) => *s == f.value,
        Some(serde_json::Value::Null) | None => false,
        Some(other) => other.to_string() == f.value,
    }))
}

impl PersistenceGateway for InMemoryGateway {
    async fn save(&self, table: &str, records: &[ResultRecord]) -> Result<()> {
        self.check_available()?;
        self.tables
            .lock()
            .await
            .entry(table.to_string())
            .or_default()
            .extend_from_slice(records);
        Ok(())
    }

    async fn query(&self, table: &str, filters: &[Filter]) -> Result<Vec<ResultRecord>> {
        self.check_available()?;
        let tables = self.tables.lock().await;
        let mut out = Vec::new();
        for record in tables.get(table).into_iter().flatten() {
            if matches(record, filters)? {
                out.push(record.clone());
            }
        }
        Ok(out)
    }

    async fn check_duplicate(&self, table: &str, experiment_id: &str, external_id: &str) -> Result<bool> {
        let rows = self
            .query(
                table,
                &[
                    Filter::eq("user_experiment_id", experiment_id),
                    Filter::eq("external_id", external_id),
                ],
            )
            .await?;
        Ok(!rows.is_empty())
    }
}

/// Hands the batch to the gateway on a separate task and returns at once.
///
/// A failure is logged and reported through the handle; it is never retried.
/// Must be called from within a tokio runtime.
pub fn submit_in_background<G>(
    gateway: Arc<G>,
    table: String,
    records: Vec<ResultRecord>,
) -> JoinHandle<Result<()>>
where
    G: PersistenceGateway + 'static,
{
    tokio::spawn(async move {
        let count = records.len();
        match gateway.save(&table, &records).await {
            Ok(()) => {
                info!(table = %table, count, "results saved");
                Ok(())
            }
            Err(e) => {
                error!(table = %table, count, error = %e, "failed to save results");
                Err(e)
            }
        }
    })
}
