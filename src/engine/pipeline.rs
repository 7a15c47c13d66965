//! [`AutoCreationEngine`] — the four-and-a-half-pass pipeline.

use std::collections::HashMap;
use std::sync::Arc;

use diesel::sqlite::SqliteConnection;
use tokio::sync::Semaphore;

use crate::actions::{ActionExecutor, ExecutionContext};
use crate::db::models::{ExecutionCompletion, ExecutionRollback, NewConflict, NewExecution};
use crate::db::DbPool;
use crate::error::OrchestratorError;
use crate::normalize::normalize_name;
use crate::rules::{ConditionEvaluator, Rule, StreamFacts, TagRegistry};
use crate::rules::model::{OrphanAction, SortOrder};
use crate::upstream::{delete_channel_idempotent, delete_group_idempotent, Channel, ChannelWrite, Stream, UpstreamClient};

use super::probe_source::QualityProbe;
use super::repo::{ConflictRepo, ExecutionRepo, RuleRepo, StatsRepo};
use super::types::{ActionLogEntry, EngineError, EntityRecord, ExecutionSummary, RunRequest, StreamLogEntry};

const PROBE_ON_SORT_CONCURRENCY: usize = 3;
const PAGE_SIZE: u32 = 200;

pub struct AutoCreationEngine {
    pool: DbPool,
    client: Arc<dyn UpstreamClient>,
    probe: Option<Arc<dyn QualityProbe>>,
}

struct MatchedEntry {
    stream: Stream,
    resolution_height: Option<u32>,
    rule_id: i32,
    loser_ids: Vec<i32>,
}

impl AutoCreationEngine {
    pub fn new(pool: DbPool, client: Arc<dyn UpstreamClient>, probe: Option<Arc<dyn QualityProbe>>) -> Self {
        Self { pool, client, probe }
    }

    #[tracing::instrument(skip(self, request), fields(dry_run = request.dry_run))]
    pub async fn run(&self, request: RunRequest) -> Result<ExecutionSummary, EngineError> {
        let started_at = crate::time::now_rfc3339();
        let rule_rows = self.load_rules(request.rule_id, request.provider_id).await?;
        let rules: Vec<Rule> = rule_rows
            .into_iter()
            .map(Rule::from_row)
            .collect::<Result<_, _>>()
            .map_err(OrchestratorError::from)?;

        let registry = self.load_tag_registry().await?;
        let evaluator = ConditionEvaluator::new(&registry);

        let channels = self.client.list_channels(1, PAGE_SIZE, None, None).await.map_err(OrchestratorError::from)?;
        let mut channels = channels.results;
        let mut next_page = 2;
        loop {
            let page = self.client.list_channels(next_page, PAGE_SIZE, None, None).await.map_err(OrchestratorError::from)?;
            if page.results.is_empty() {
                break;
            }
            channels.extend(page.results);
            next_page += 1;
        }
        let groups = self.client.list_channel_groups().await.map_err(OrchestratorError::from)?;

        let mut streams = self.load_streams(request.provider_id).await?;
        let stats = self.with_conn(StatsRepo::load_success_map).await?;
        for stream in &mut streams {
            if let Some(row) = stats.get(&stream.id) {
                stream.resolution_height = row.resolution_height.map(|h| h as u32);
            }
        }

        let execution_id = self
            .with_conn({
                let started_at = started_at.clone();
                let mode = if request.dry_run { "dry_run".to_string() } else { "execute".to_string() };
                let triggered_by = request.triggered_by.clone();
                move |conn| {
                    ExecutionRepo::start(
                        conn,
                        NewExecution {
                            mode,
                            triggered_by,
                            started_at,
                            status: "running".to_string(),
                            created_entities_json: "[]".to_string(),
                            modified_entities_json: "[]".to_string(),
                            execution_log_json: "[]".to_string(),
                        },
                    )
                }
            })
            .await?
            .id;

        let run_result = self.run_passes(&request, &rules, &evaluator, channels, groups, streams, execution_id).await;

        match run_result {
            Ok((summary, completion)) => {
                self.with_conn(move |conn| ExecutionRepo::complete(conn, execution_id, completion)).await?;
                Ok(summary)
            }
            Err(e) => {
                let completion = ExecutionCompletion {
                    completed_at: Some(crate::time::now_rfc3339()),
                    status: Some("failed".to_string()),
                    ..Default::default()
                };
                let _ = self.with_conn(move |conn| ExecutionRepo::complete(conn, execution_id, completion)).await;
                Err(e)
            }
        }
    }

    #[allow(clippy::too_many_arguments)]
    async fn run_passes(
        &self,
        request: &RunRequest,
        rules: &[Rule],
        evaluator: &ConditionEvaluator<'_>,
        channels: Vec<Channel>,
        groups: Vec<crate::upstream::Group>,
        streams: Vec<Stream>,
        execution_id: i32,
    ) -> Result<(ExecutionSummary, ExecutionCompletion), EngineError> {
        // Pass 1 — evaluate.
        let mut matched: Vec<MatchedEntry> = Vec::new();
        for stream in &streams {
            let facts = StreamFacts::new(stream);
            let mut winner: Option<&Rule> = None;
            let mut loser_ids = Vec::new();
            for rule in rules {
                let eval = evaluator.evaluate(&facts, rule);
                if eval.matched {
                    if winner.is_none() {
                        winner = Some(rule);
                        if rule.stop_on_first_match {
                            break;
                        }
                    } else {
                        loser_ids.push(rule.id);
                    }
                }
            }
            if let Some(rule) = winner {
                matched.push(MatchedEntry {
                    stream: stream.clone(),
                    resolution_height: facts.resolution_height,
                    rule_id: rule.id,
                    loser_ids,
                });
            }
        }

        // Pass 1.5 — probe-on-sort.
        if let Some(probe) = &self.probe {
            let needs_probe: Vec<usize> = matched
                .iter()
                .enumerate()
                .filter(|(_, entry)| {
                    entry.resolution_height.is_none()
                        && rules
                            .iter()
                            .find(|r| r.id == entry.rule_id)
                            .map(|r| r.probe_on_sort && r.sort_field.as_deref() == Some("quality"))
                            .unwrap_or(false)
                })
                .map(|(i, _)| i)
                .collect();

            let semaphore = Arc::new(Semaphore::new(PROBE_ON_SORT_CONCURRENCY));
            let mut handles = Vec::new();
            for index in needs_probe {
                let permit = semaphore.clone().acquire_owned().await.expect("semaphore closed");
                let probe = probe.clone();
                let stream = matched[index].stream.clone();
                handles.push(async move {
                    let _permit = permit;
                    (index, probe.probe_resolution(&stream).await)
                });
            }
            for (index, height) in futures::future::join_all(handles).await {
                matched[index].resolution_height = height;
            }
        }

        // Sort: group by winning rule, sort each group by its sort_field, concatenate.
        let mut by_rule: HashMap<i32, Vec<MatchedEntry>> = HashMap::new();
        for entry in matched {
            by_rule.entry(entry.rule_id).or_default().push(entry);
        }

        let mut execution_order: Vec<MatchedEntry> = Vec::new();
        for rule in rules {
            let Some(mut group) = by_rule.remove(&rule.id) else { continue };
            if rule.sort_field.as_deref() == Some("quality") {
                group.sort_by_key(|entry| entry.resolution_height.unwrap_or(0));
                if rule.sort_order == SortOrder::Desc {
                    group.reverse();
                }
            }
            execution_order.extend(group);
        }

        // Pass 2 — execute.
        let mut executor = ActionExecutor::new(self.client.as_ref(), channels, groups);
        let mut rule_channel_order: HashMap<i32, Vec<i64>> = HashMap::new();
        let mut created_entities = Vec::new();
        let mut modified_entities = Vec::new();
        let mut stream_log = Vec::new();
        let mut summary = ExecutionSummary { execution_id, dry_run: request.dry_run, ..Default::default() };
        summary.streams_evaluated = streams.len() as i32;

        'streams: for entry in &execution_order {
            summary.streams_matched += 1;
            let rule = rules.iter().find(|r| r.id == entry.rule_id).expect("rule present");

            if !entry.loser_ids.is_empty() {
                let new_conflict = NewConflict {
                    execution_id,
                    stream_id: entry.stream.id,
                    stream_name: entry.stream.name.clone(),
                    winning_rule_id: entry.rule_id,
                    losing_rule_ids_json: serde_json::to_string(&entry.loser_ids).unwrap_or_default(),
                    conflict_type: "multiple_rule_match".to_string(),
                    resolution: "first_match_wins".to_string(),
                    description: format!("{} rule(s) also matched stream '{}'", entry.loser_ids.len(), entry.stream.name),
                };
                self.with_conn(move |conn| ConflictRepo::record(conn, new_conflict)).await?;
                summary.conflicts += 1;
            }

            let normalized = if rule.normalize_names {
                normalize_name(&entry.stream.name)
            } else {
                entry.stream.name.to_lowercase()
            };
            let mut ctx = ExecutionContext::new(&entry.stream, normalized, request.dry_run);
            ctx.active_group_id = rule.target_group_id.map(i64::from);

            let mut action_log = Vec::new();
            for action in &rule.actions {
                let result = executor.execute(action, &mut ctx).await;
                if result.created {
                    summary_record_created(&mut summary, &result.action_type);
                    if let (Some(kind), Some(id)) = (&result.entity_type, result.entity_id) {
                        created_entities.push(EntityRecord { entity_type: kind.clone(), entity_id: id, previous_state: None });
                    }
                }
                if result.modified {
                    summary_record_modified(&mut summary, &result.action_type);
                    if let (Some(kind), Some(id)) = (&result.entity_type, result.entity_id) {
                        modified_entities.push(EntityRecord {
                            entity_type: kind.clone(),
                            entity_id: id,
                            previous_state: result.previous_state.clone(),
                        });
                    }
                }
                if result.skipped {
                    summary.streams_skipped += 1;
                }
                action_log.push(ActionLogEntry::from(&result));
            }

            if let Some(channel_id) = ctx.active_channel_id {
                rule_channel_order.entry(entry.rule_id).or_default().push(channel_id);
            }

            stream_log.push(StreamLogEntry {
                stream_id: entry.stream.id,
                stream_name: entry.stream.name.clone(),
                rule_id: Some(entry.rule_id),
                rule_name: Some(rule.name.clone()),
                actions: action_log,
            });

            if ctx.stop_processing {
                break 'streams;
            }
        }

        // Pass 3 — renumber, starting at the rule's configured starting
        // number. A rule with no starting number configured is left alone
        // entirely rather than having one invented from existing channel
        // numbers (auto_creation_engine.py's `_get_rule_starting_number`
        // skips the same way).
        if !request.dry_run {
            for rule in rules {
                let Some(ids) = rule_channel_order.get(&rule.id) else { continue };
                if rule.sort_field.is_none() || ids.is_empty() {
                    continue;
                }
                let Some(starting) = rule.starting_channel_number else { continue };
                self.client
                    .assign_channel_numbers(ids, starting as i64)
                    .await
                    .map_err(OrchestratorError::from)?;
            }
        }

        // Pass 3.5 — reorder streams within channels (quality sort only).
        if !request.dry_run {
            for rule in rules {
                if rule.sort_field.as_deref() != Some("quality") {
                    continue;
                }
                let Some(channel_ids) = rule_channel_order.get(&rule.id) else { continue };
                for &channel_id in channel_ids {
                    if channel_id < 0 {
                        continue;
                    }
                    let Some(channel) = executor.channels.get(channel_id).cloned() else { continue };
                    let mut ordered = channel.streams.clone();
                    let heights: HashMap<i64, u32> = execution_order
                        .iter()
                        .filter(|e| ordered.contains(&e.stream.id))
                        .map(|e| (e.stream.id, e.resolution_height.unwrap_or(0)))
                        .collect();
                    ordered.sort_by_key(|id| heights.get(id).copied().unwrap_or(0));
                    if rule.sort_order == SortOrder::Desc {
                        ordered.reverse();
                    }
                    if ordered != channel.streams {
                        let write = ChannelWrite { streams: Some(ordered), ..Default::default() };
                        self.client.update_channel(channel_id, write).await.map_err(OrchestratorError::from)?;
                    }
                }
            }
        }

        // Pass 4 — reconcile orphans.
        for rule in rules {
            let current: Vec<i64> = rule_channel_order.get(&rule.id).cloned().unwrap_or_default();
            match &rule.managed_channel_ids {
                None => {
                    if !request.dry_run {
                        self.persist_managed_ids(rule.id, &current).await?;
                    }
                }
                Some(previous) => {
                    let orphans: Vec<i64> = previous.iter().copied().filter(|id| !current.contains(id)).collect();
                    if !request.dry_run {
                        for orphan in &orphans {
                            self.apply_orphan_action(rule.orphan_action, *orphan).await?;
                        }
                        if !orphans.is_empty() {
                            self.renumber_to_close_gaps().await?;
                        }
                        self.persist_managed_ids(rule.id, &current).await?;
                    }
                }
            }
        }

        let completion = ExecutionCompletion {
            completed_at: Some(crate::time::now_rfc3339()),
            status: Some("completed".to_string()),
            streams_evaluated: Some(summary.streams_evaluated),
            streams_matched: Some(summary.streams_matched),
            channels_created: Some(summary.channels_created),
            channels_updated: Some(summary.channels_updated),
            groups_created: Some(summary.groups_created),
            streams_merged: Some(summary.streams_merged),
            streams_skipped: Some(summary.streams_skipped),
            created_entities_json: Some(serde_json::to_string(&created_entities).unwrap_or_default()),
            modified_entities_json: Some(serde_json::to_string(&modified_entities).unwrap_or_default()),
            execution_log_json: if request.dry_run { None } else { Some(serde_json::to_string(&stream_log).unwrap_or_default()) },
            dry_run_results_json: if request.dry_run { Some(Some(serde_json::to_string(&stream_log).unwrap_or_default())) } else { None },
        };

        Ok((summary, completion))
    }

    pub async fn rollback(&self, execution_id: i32, actor: &str) -> Result<(), EngineError> {
        let execution = self.with_conn(move |conn| ExecutionRepo::get(conn, execution_id)).await?;
        if execution.mode != "execute" || execution.status != "completed" {
            return Err(EngineError::NotRollbackEligible(execution_id));
        }

        let created: Vec<EntityRecord> = serde_json::from_str(&execution.created_entities_json).map_err(OrchestratorError::from)?;
        let modified: Vec<EntityRecord> = serde_json::from_str(&execution.modified_entities_json).map_err(OrchestratorError::from)?;

        for entity in created.iter().rev() {
            match entity.entity_type.as_str() {
                "channel" => delete_channel_idempotent(self.client.as_ref(), entity.entity_id).await.map_err(OrchestratorError::from)?,
                "group" => delete_group_idempotent(self.client.as_ref(), entity.entity_id).await.map_err(OrchestratorError::from)?,
                _ => {}
            }
        }

        for entity in modified.iter().rev() {
            if entity.entity_type != "channel" {
                continue;
            }
            let Some(previous) = &entity.previous_state else { continue };
            let streams: Option<Vec<i64>> = previous.get("streams").and_then(|v| serde_json::from_value(v.clone()).ok());
            let write = ChannelWrite { streams, ..Default::default() };
            match self.client.update_channel(entity.entity_id, write).await {
                Ok(_) => {}
                Err(e) if e.is_not_found() => {}
                Err(e) => return Err(OrchestratorError::from(e).into()),
            }
        }

        let rollback = ExecutionRollback {
            rolled_back_at: Some(crate::time::now_rfc3339()),
            rolled_back_by: Some(actor.to_string()),
        };
        self.with_conn(move |conn| ExecutionRepo::mark_rolled_back(conn, execution_id, rollback)).await?;
        Ok(())
    }

    async fn apply_orphan_action(&self, action: OrphanAction, channel_id: i64) -> Result<(), EngineError> {
        match action {
            OrphanAction::Delete => {
                delete_channel_idempotent(self.client.as_ref(), channel_id).await.map_err(OrchestratorError::from)?
            }
            OrphanAction::MoveUncategorized => {
                let write = ChannelWrite { group_id: Some(None), ..Default::default() };
                match self.client.update_channel(channel_id, write).await {
                    Ok(_) => {}
                    Err(e) if e.is_not_found() => {}
                    Err(e) => return Err(OrchestratorError::from(e).into()),
                }
            }
            OrphanAction::DeleteAndCleanupGroups => {
                if let Ok(channel) = self.client.get_channel(channel_id).await {
                    delete_channel_idempotent(self.client.as_ref(), channel_id).await.map_err(OrchestratorError::from)?;
                    if let Some(group_id) = channel.group_id {
                        let remaining = self.client.list_channels(1, 1, None, Some(group_id)).await.map_err(OrchestratorError::from)?;
                        if remaining.count == 0 {
                            delete_group_idempotent(self.client.as_ref(), group_id).await.map_err(OrchestratorError::from)?;
                        }
                    }
                }
            }
            OrphanAction::None => {}
        }
        Ok(())
    }

    async fn renumber_to_close_gaps(&self) -> Result<(), EngineError> {
        let page = self.client.list_channels(1, PAGE_SIZE, None, None).await.map_err(OrchestratorError::from)?;
        let mut channels = page.results;
        channels.sort_by_key(|c| c.channel_number);
        let ids: Vec<i64> = channels.iter().map(|c| c.id).collect();
        if !ids.is_empty() {
            self.client.assign_channel_numbers(&ids, 1).await.map_err(OrchestratorError::from)?;
        }
        Ok(())
    }

    async fn persist_managed_ids(&self, rule_id: i32, ids: &[i64]) -> Result<(), EngineError> {
        let json = serde_json::to_string(ids).map_err(OrchestratorError::from)?;
        self.with_conn(move |conn| RuleRepo::update_managed_channel_ids(conn, rule_id, &json)).await
    }

    async fn load_rules(&self, rule_id: Option<i32>, provider_id: Option<i64>) -> Result<Vec<crate::db::models::Rule>, EngineError> {
        let provider_id = provider_id.map(|id| id as i32);
        self.with_conn(move |conn| RuleRepo::list_enabled(conn, provider_id, rule_id)).await
    }

    async fn load_tag_registry(&self) -> Result<TagRegistry, EngineError> {
        let pool = self.pool.clone();
        tokio::task::spawn_blocking(move || {
            let mut conn = pool.get().map_err(OrchestratorError::from)?;
            TagRegistry::load(&mut conn)
        })
        .await
        .map_err(|e| OrchestratorError::Config(format!("engine task panicked: {e}")))?
        .map_err(EngineError::from)
    }

    async fn load_streams(&self, provider_id: Option<i64>) -> Result<Vec<Stream>, EngineError> {
        let mut all = Vec::new();
        let mut page = 1;
        loop {
            let result = self.client.list_streams(page, PAGE_SIZE, provider_id).await.map_err(OrchestratorError::from)?;
            if result.results.is_empty() {
                break;
            }
            all.extend(result.results);
            page += 1;
        }
        Ok(all)
    }

    async fn with_conn<F, T>(&self, f: F) -> Result<T, EngineError>
    where
        F: FnOnce(&mut SqliteConnection) -> diesel::QueryResult<T> + Send + 'static,
        T: Send + 'static,
    {
        let pool = self.pool.clone();
        tokio::task::spawn_blocking(move || {
            let mut conn = pool.get().map_err(OrchestratorError::from)?;
            f(&mut conn).map_err(OrchestratorError::from)
        })
        .await
        .map_err(|e| OrchestratorError::Config(format!("engine task panicked: {e}")))?
        .map_err(EngineError::from)
    }
}

fn summary_record_created(summary: &mut ExecutionSummary, action_type: &str) {
    match action_type {
        "create_channel" => summary.channels_created += 1,
        "create_group" => summary.groups_created += 1,
        _ => {}
    }
}

fn summary_record_modified(summary: &mut ExecutionSummary, action_type: &str) {
    match action_type {
        "merge_streams" => summary.streams_merged += 1,
        _ => summary.channels_updated += 1,
    }
}
