//! Action execution: the effects side of the auto-creation pipeline.
//!
//! [`ActionExecutor`] holds the mutable indices over the upstream's
//! channels/groups and per-provider stream-count capacities, and executes
//! one rule's `actions` list against one stream at a time (spec.md §4.2).
//! Every action returns an [`ActionResult`] regardless of outcome; a
//! failure never aborts the stream's remaining actions except via the
//! explicit `stop_processing` action.

pub mod channel_number;
pub mod context;
pub mod epg;
pub mod index;
pub mod result;
pub mod template;

use std::collections::HashMap;

use crate::error::ExecutorError;
use crate::normalize::normalize_name;
use crate::rules::model::{Action, FindChannelBy, GroupIfExists, IfExists, SetVariableMode};
use crate::upstream::{Channel, ChannelWrite, EpgDataEntry, Group, UpstreamClient};

pub use context::ExecutionContext;
pub use index::{ChannelIndex, GroupIndex};
pub use result::ActionResult;

/// Dry runs allocate simulated ids starting here so they never collide
/// with a real upstream id, while remaining distinct across a single run.
const DRY_RUN_ID_BASE: i64 = -1;

pub struct ActionExecutor<'a> {
    client: &'a dyn UpstreamClient,
    pub channels: ChannelIndex,
    pub groups: GroupIndex,
    /// Remaining stream slots per channel, seeded lazily from a rule's
    /// `max_streams_per_channel` the first time that channel is merged into.
    stream_capacity: HashMap<i64, usize>,
    dry_run_id_counter: i64,
}

impl<'a> ActionExecutor<'a> {
    pub fn new(client: &'a dyn UpstreamClient, channels: Vec<Channel>, groups: Vec<Group>) -> Self {
        Self {
            client,
            channels: ChannelIndex::build(channels),
            groups: GroupIndex::build(groups),
            stream_capacity: HashMap::new(),
            dry_run_id_counter: DRY_RUN_ID_BASE,
        }
    }

    fn next_dry_run_id(&mut self) -> i64 {
        let id = self.dry_run_id_counter;
        self.dry_run_id_counter -= 1;
        id
    }

    pub async fn execute(&mut self, action: &Action, ctx: &mut ExecutionContext<'_>) -> ActionResult {
        if ctx.stop_processing {
            return ActionResult::skip(action_label(action), "processing stopped for this stream");
        }

        match self.dispatch(action, ctx).await {
            Ok(result) => result,
            Err(e) => ActionResult::failed(action_label(action), e.to_string()),
        }
    }

    async fn dispatch(
        &mut self,
        action: &Action,
        ctx: &mut ExecutionContext<'_>,
    ) -> Result<ActionResult, ExecutorError> {
        match action {
            Action::CreateChannel(params) => self.create_channel(params, ctx).await,
            Action::CreateGroup(params) => self.create_group(params, ctx).await,
            Action::MergeStreams(params) => self.merge_streams(params, ctx).await,
            Action::AssignLogo { from_stream, url } => self.assign_logo(*from_stream, url.as_deref(), ctx).await,
            Action::AssignTvgId { value, from_stream } => self.assign_tvg_id(value.as_deref(), *from_stream, ctx).await,
            Action::AssignEpg { source_id } => self.assign_epg(*source_id, ctx).await,
            Action::AssignProfile { profile_ids } => self.assign_profile(profile_ids, ctx).await,
            Action::SetChannelNumber { number } => self.set_channel_number(number, ctx).await,
            Action::SetVariable(params) => Ok(self.set_variable(params, ctx)),
            Action::Skip => Ok(ActionResult::skip("skip", "rule requested skip")),
            Action::StopProcessing => {
                ctx.stop_processing = true;
                Ok(ActionResult::ok("stop_processing", "remaining actions suppressed"))
            }
            Action::LogMatch { message } => {
                let template_str = message.as_deref().unwrap_or("{stream_name} matched");
                let expanded = template::expand_template(template_str, &ctx.template_vars());
                Ok(ActionResult::ok("log_match", expanded))
            }
        }
    }

    async fn create_channel(
        &mut self,
        params: &crate::rules::model::CreateChannelParams,
        ctx: &mut ExecutionContext<'_>,
    ) -> Result<ActionResult, ExecutorError> {
        let mut name = template::expand_template(&params.name_template, &ctx.template_vars());
        name = template::apply_transform(
            &name,
            params.name_transform_pattern.as_deref(),
            params.name_transform_replacement.as_deref(),
        )?;

        if let Some(existing) = self.channels.by_exact_name(&name) {
            return self.handle_existing_channel(existing.id, params.if_exists, ctx);
        }

        let number_spec = if params.channel_number.is_empty() { "auto" } else { &params.channel_number };
        let number = channel_number::allocate(number_spec, self.channels.used_numbers())?;

        let display_name = if params.number_prefix_in_name {
            format!("{number} | {name}")
        } else {
            name.clone()
        };

        let write = ChannelWrite {
            name: Some(display_name.clone()),
            channel_number: Some(number),
            group_id: ctx.active_group_id.map(Some),
            streams: Some(vec![ctx.stream.id]),
            tvg_id: ctx.stream.tvg_id.clone(),
            auto_created: Some(true),
            profile_ids: if params.default_profile_ids.is_empty() {
                None
            } else {
                Some(params.default_profile_ids.clone())
            },
            ..Default::default()
        };

        if ctx.dry_run {
            let id = self.next_dry_run_id();
            ctx.active_channel_id = Some(id);
            return Ok(ActionResult::ok("create_channel", format!("would create channel '{display_name}'"))
                .with_entity("channel", id, display_name)
                .created());
        }

        let channel = self.client.create_channel(write).await?;
        ctx.active_channel_id = Some(channel.id);
        let result = ActionResult::ok("create_channel", format!("created channel '{}'", channel.name))
            .with_entity("channel", channel.id, channel.name.clone())
            .created();
        self.channels.insert(channel);
        Ok(result)
    }

    fn handle_existing_channel(
        &mut self,
        existing_id: i64,
        if_exists: IfExists,
        ctx: &mut ExecutionContext<'_>,
    ) -> Result<ActionResult, ExecutorError> {
        match if_exists {
            IfExists::Skip => {
                ctx.active_channel_id = Some(existing_id);
                Ok(ActionResult::skip("create_channel", "channel already exists"))
            }
            IfExists::Merge | IfExists::MergeOnly | IfExists::Update => {
                ctx.active_channel_id = Some(existing_id);
                Ok(ActionResult::ok("create_channel", "channel already exists, reusing")
                    .with_entity("channel", existing_id, ""))
            }
        }
    }

    async fn create_group(
        &mut self,
        params: &crate::rules::model::CreateGroupParams,
        ctx: &mut ExecutionContext<'_>,
    ) -> Result<ActionResult, ExecutorError> {
        let name = template::expand_template(&params.name_template, &ctx.template_vars());

        if let Some(existing) = self.groups.by_name(&name) {
            ctx.active_group_id = Some(existing.id);
            return match params.if_exists {
                GroupIfExists::UseExisting => {
                    Ok(ActionResult::ok("create_group", "group already exists, reusing")
                        .with_entity("group", existing.id, name))
                }
                GroupIfExists::Skip => Ok(ActionResult::skip("create_group", "group already exists")),
            };
        }

        if ctx.dry_run {
            let id = self.next_dry_run_id();
            ctx.active_group_id = Some(id);
            return Ok(ActionResult::ok("create_group", format!("would create group '{name}'"))
                .with_entity("group", id, name)
                .created());
        }

        let group = self.client.create_channel_group(&name).await?;
        ctx.active_group_id = Some(group.id);
        let result = ActionResult::ok("create_group", format!("created group '{}'", group.name))
            .with_entity("group", group.id, group.name.clone())
            .created();
        self.groups.insert(group);
        Ok(result)
    }

    async fn merge_streams(
        &mut self,
        params: &crate::rules::model::MergeStreamsParams,
        ctx: &mut ExecutionContext<'_>,
    ) -> Result<ActionResult, ExecutorError> {
        let target = self.find_merge_target(params, ctx)?;
        let Some(target_id) = target else {
            return Err(ExecutorError::NoMergeTarget);
        };

        if let Some(cap) = params.max_streams_per_channel {
            let remaining = self.stream_capacity.entry(target_id).or_insert(cap as usize);
            if *remaining == 0 {
                return Err(ExecutorError::StreamCapReached { channel_id: target_id });
            }
            *remaining -= 1;
        }

        ctx.active_channel_id = Some(target_id);

        if ctx.dry_run {
            return Ok(ActionResult::ok("merge_streams", format!("would merge into channel {target_id}"))
                .with_entity("channel", target_id, "")
                .modified());
        }

        let channel = self.channels.get(target_id).cloned().ok_or(ExecutorError::NoMergeTarget)?;
        let mut streams = channel.streams.clone();
        if !streams.contains(&ctx.stream.id) {
            streams.push(ctx.stream.id);
        }
        let previous_state = serde_json::json!({ "streams": channel.streams });

        let write = ChannelWrite { streams: Some(streams), ..Default::default() };
        let updated = self.client.update_channel(target_id, write).await?;
        let result = ActionResult::ok("merge_streams", format!("merged into channel '{}'", updated.name))
            .with_entity("channel", updated.id, updated.name.clone())
            .modified()
            .with_previous_state(previous_state);
        self.channels.insert(updated);
        Ok(result)
    }

    fn find_merge_target(
        &self,
        params: &crate::rules::model::MergeStreamsParams,
        ctx: &ExecutionContext<'_>,
    ) -> Result<Option<i64>, ExecutorError> {
        if let Some(active) = ctx.active_channel_id {
            return Ok(Some(active));
        }

        match params.find_channel_by {
            FindChannelBy::NameExact => {
                let name = if params.find_channel_value.is_empty() { &ctx.stream.name } else { &params.find_channel_value };
                Ok(self.channels.by_exact_name(name).map(|c| c.id))
            }
            FindChannelBy::NameRegex => {
                if params.find_channel_value.is_empty() {
                    return Err(ExecutorError::InvalidTemplate("find_channel_value required for NameRegex".into()));
                }
                let re = regex::Regex::new(&params.find_channel_value)
                    .map_err(|e| ExecutorError::InvalidTemplate(e.to_string()))?;
                Ok(self.channels.all().find(|c| re.is_match(&c.name)).map(|c| c.id))
            }
            FindChannelBy::TvgId => {
                let tvg_id = if params.find_channel_value.is_empty() {
                    ctx.stream.tvg_id.as_deref()
                } else {
                    Some(params.find_channel_value.as_str())
                };
                Ok(tvg_id.and_then(|id| self.channels.all().find(|c| c.tvg_id.as_deref() == Some(id))).map(|c| c.id))
            }
            FindChannelBy::Auto => Ok(self.merge_auto_cascade(&ctx.stream.name)),
        }
    }

    /// normalized-name -> core-name (tag-stripped) -> deparenthesized ->
    /// word-prefix containment -> FCC call sign, per spec.md §9.
    fn merge_auto_cascade(&self, name: &str) -> Option<i64> {
        self.channels
            .by_normalized_name(name)
            .or_else(|| self.channels.by_base_name(name))
            .or_else(|| self.channels.by_deparenthesized(name))
            .or_else(|| self.channels.by_word_prefix(name))
            .or_else(|| self.channels.by_call_sign(name))
            .map(|c| c.id)
    }

    async fn assign_logo(
        &mut self,
        from_stream: bool,
        url: Option<&str>,
        ctx: &mut ExecutionContext<'_>,
    ) -> Result<ActionResult, ExecutorError> {
        let channel_id = ctx.active_channel_id.ok_or(ExecutorError::NoActiveEntity)?;
        let logo_url = if from_stream {
            ctx.stream.logo_url.clone()
        } else {
            url.map(|u| template::expand_template(u, &ctx.template_vars()))
        };
        let Some(logo_url) = logo_url else {
            return Ok(ActionResult::skip("assign_logo", "no logo url available"));
        };

        if ctx.dry_run {
            return Ok(ActionResult::ok("assign_logo", format!("would assign logo {logo_url}")).modified());
        }

        let logo_id = match self.client.find_logo_by_url(&logo_url).await? {
            Some(id) => id,
            None => self.client.create_logo(&logo_url).await?,
        };

        let write = ChannelWrite { logo_id: Some(logo_id), ..Default::default() };
        let updated = self.client.update_channel(channel_id, write).await?;
        let result = ActionResult::ok("assign_logo", format!("assigned logo to '{}'", updated.name)).modified();
        self.channels.insert(updated);
        Ok(result)
    }

    async fn assign_tvg_id(
        &mut self,
        value: Option<&str>,
        from_stream: bool,
        ctx: &mut ExecutionContext<'_>,
    ) -> Result<ActionResult, ExecutorError> {
        let channel_id = ctx.active_channel_id.ok_or(ExecutorError::NoActiveEntity)?;
        let tvg_id = if from_stream {
            ctx.stream.tvg_id.clone()
        } else {
            value.map(|v| template::expand_template(v, &ctx.template_vars()))
        };
        let Some(tvg_id) = tvg_id else {
            return Ok(ActionResult::skip("assign_tvg_id", "no tvg_id available"));
        };

        if ctx.dry_run {
            return Ok(ActionResult::ok("assign_tvg_id", format!("would set tvg_id {tvg_id}")).modified());
        }

        let write = ChannelWrite { tvg_id: Some(tvg_id), ..Default::default() };
        let updated = self.client.update_channel(channel_id, write).await?;
        let result = ActionResult::ok("assign_tvg_id", format!("set tvg_id on '{}'", updated.name)).modified();
        self.channels.insert(updated);
        Ok(result)
    }

    async fn assign_epg(
        &mut self,
        source_id: i64,
        ctx: &mut ExecutionContext<'_>,
    ) -> Result<ActionResult, ExecutorError> {
        let channel_id = ctx.active_channel_id.ok_or(ExecutorError::NoActiveEntity)?;
        let entries: Vec<EpgDataEntry> = self.client.get_epg_data(source_id).await?;
        let channel_name = self.channels.get(channel_id).map(|c| c.name.clone()).unwrap_or_default();
        let entry = epg::resolve_epg_entry(&channel_name, ctx.stream.tvg_id.as_deref(), &entries)
            .ok_or(ExecutorError::NoEpgMatch)?;
        let epg_data_id = entry.id;

        if ctx.dry_run {
            return Ok(ActionResult::ok("assign_epg", format!("would assign epg entry {epg_data_id}")).modified());
        }

        let write = ChannelWrite { epg_data_id: Some(epg_data_id), ..Default::default() };
        let updated = self.client.update_channel(channel_id, write).await?;
        let result = ActionResult::ok("assign_epg", format!("assigned epg to '{}'", updated.name)).modified();
        self.channels.insert(updated);
        Ok(result)
    }

    async fn assign_profile(
        &mut self,
        profile_ids: &[i64],
        ctx: &mut ExecutionContext<'_>,
    ) -> Result<ActionResult, ExecutorError> {
        let channel_id = ctx.active_channel_id.ok_or(ExecutorError::NoActiveEntity)?;
        if ctx.dry_run {
            return Ok(ActionResult::ok("assign_profile", "would assign profiles").modified());
        }
        let write = ChannelWrite { profile_ids: Some(profile_ids.to_vec()), ..Default::default() };
        let updated = self.client.update_channel(channel_id, write).await?;
        let result = ActionResult::ok("assign_profile", format!("assigned profiles to '{}'", updated.name)).modified();
        self.channels.insert(updated);
        Ok(result)
    }

    async fn set_channel_number(
        &mut self,
        number: &str,
        ctx: &mut ExecutionContext<'_>,
    ) -> Result<ActionResult, ExecutorError> {
        let channel_id = ctx.active_channel_id.ok_or(ExecutorError::NoActiveEntity)?;
        let number = channel_number::allocate(number, self.channels.used_numbers())?;

        if ctx.dry_run {
            return Ok(ActionResult::ok("set_channel_number", format!("would set number {number}")).modified());
        }

        let write = ChannelWrite { channel_number: Some(number), ..Default::default() };
        let updated = self.client.update_channel(channel_id, write).await?;
        let result = ActionResult::ok("set_channel_number", format!("set number {number} on '{}'", updated.name)).modified();
        self.channels.insert(updated);
        Ok(result)
    }

    fn set_variable(
        &self,
        params: &crate::rules::model::SetVariableParams,
        ctx: &mut ExecutionContext<'_>,
    ) -> ActionResult {
        let value = match params.mode {
            SetVariableMode::Literal => template::expand_template(
                params.template.as_deref().unwrap_or_default(),
                &ctx.template_vars(),
            ),
            SetVariableMode::RegexExtract => self.regex_extract(params, ctx),
            SetVariableMode::RegexReplace => self.regex_replace(params, ctx),
        };

        ctx.set_var(&params.var_name, &value);
        ActionResult::ok("set_variable", format!("{} = '{value}'", params.var_name))
    }

    fn regex_extract(&self, params: &crate::rules::model::SetVariableParams, ctx: &ExecutionContext<'_>) -> String {
        let source = source_field_value(params.source_field.as_deref(), ctx);
        let Some(pattern) = params.pattern.as_deref() else { return String::new() };
        let Ok(re) = regex::Regex::new(pattern) else { return String::new() };
        re.captures(&source)
            .and_then(|c| c.get(1).or_else(|| c.get(0)))
            .map(|m| m.as_str().to_string())
            .unwrap_or_default()
    }

    fn regex_replace(&self, params: &crate::rules::model::SetVariableParams, ctx: &ExecutionContext<'_>) -> String {
        let source = source_field_value(params.source_field.as_deref(), ctx);
        let (Some(pattern), Some(replacement)) = (params.pattern.as_deref(), params.replacement.as_deref()) else {
            return source;
        };
        let Ok(re) = regex::Regex::new(pattern) else { return source };
        re.replace_all(&source, replacement).into_owned()
    }
}

fn source_field_value(field: Option<&str>, ctx: &ExecutionContext<'_>) -> String {
    match field.unwrap_or("stream_name") {
        "stream_group" => ctx.stream.group_name.clone().unwrap_or_default(),
        "tvg_id" => ctx.stream.tvg_id.clone().unwrap_or_default(),
        "normalized_name" => ctx.normalized_name.clone(),
        _ => ctx.stream.name.clone(),
    }
}

fn action_label(action: &Action) -> &'static str {
    match action {
        Action::CreateChannel(_) => "create_channel",
        Action::CreateGroup(_) => "create_group",
        Action::MergeStreams(_) => "merge_streams",
        Action::AssignLogo { .. } => "assign_logo",
        Action::AssignTvgId { .. } => "assign_tvg_id",
        Action::AssignEpg { .. } => "assign_epg",
        Action::AssignProfile { .. } => "assign_profile",
        Action::SetChannelNumber { .. } => "set_channel_number",
        Action::SetVariable(_) => "set_variable",
        Action::Skip => "skip",
        Action::StopProcessing => "stop_processing",
        Action::LogMatch { .. } => "log_match",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rules::model::{CreateChannelParams, SetVariableParams};
    use crate::upstream::FakeUpstreamClient;
    use crate::upstream::Stream;

    fn stream(id: i64, name: &str) -> Stream {
        Stream {
            id,
            name: name.to_string(),
            url: format!("http://example/{id}"),
            group_name: Some("Sports".to_string()),
            tvg_id: Some("espn.us".to_string()),
            tvg_name: None,
            logo_url: Some("http://logo/espn.png".to_string()),
            provider_id: 1,
            provider_name: "Provider A".to_string(),
            resolution_height: Some(1080),
            normalized_name: None,
        }
    }

    #[tokio::test]
    async fn create_channel_then_assign_logo() {
        let client = FakeUpstreamClient::new();
        let mut executor = ActionExecutor::new(&client, vec![], vec![]);
        let s = stream(1, "ESPN HD");
        let mut ctx = ExecutionContext::new(&s, normalize_name(&s.name), false);

        let create = Action::CreateChannel(CreateChannelParams {
            name_template: "{stream_name}".to_string(),
            if_exists: IfExists::Skip,
            name_transform_pattern: None,
            name_transform_replacement: None,
            channel_number: "auto".to_string(),
            number_prefix_in_name: false,
            default_profile_ids: vec![],
        });
        let result = executor.execute(&create, &mut ctx).await;
        assert!(result.success && result.created);
        assert!(ctx.active_channel_id.is_some());

        let logo = Action::AssignLogo { from_stream: true, url: None };
        let logo_result = executor.execute(&logo, &mut ctx).await;
        assert!(logo_result.success);
        assert!(logo_result.modified);
    }

    #[tokio::test]
    async fn dry_run_does_not_touch_upstream() {
        let client = FakeUpstreamClient::new();
        let mut executor = ActionExecutor::new(&client, vec![], vec![]);
        let s = stream(1, "ESPN HD");
        let mut ctx = ExecutionContext::new(&s, normalize_name(&s.name), true);

        let create = Action::CreateChannel(CreateChannelParams {
            name_template: "{stream_name}".to_string(),
            if_exists: IfExists::Skip,
            name_transform_pattern: None,
            name_transform_replacement: None,
            channel_number: "auto".to_string(),
            number_prefix_in_name: false,
            default_profile_ids: vec![],
        });
        let result = executor.execute(&create, &mut ctx).await;
        assert!(result.success);
        assert!(ctx.active_channel_id.unwrap() < 0);
        assert!(client.channels().is_empty());
    }

    #[tokio::test]
    async fn stop_processing_skips_remaining_actions() {
        let client = FakeUpstreamClient::new();
        let mut executor = ActionExecutor::new(&client, vec![], vec![]);
        let s = stream(1, "ESPN HD");
        let mut ctx = ExecutionContext::new(&s, normalize_name(&s.name), false);

        executor.execute(&Action::StopProcessing, &mut ctx).await;
        let skipped = executor.execute(&Action::LogMatch { message: Some("hi".into()) }, &mut ctx).await;
        assert!(skipped.skipped);
    }

    #[tokio::test]
    async fn set_variable_literal_then_template_reads_it() {
        let client = FakeUpstreamClient::new();
        let mut executor = ActionExecutor::new(&client, vec![], vec![]);
        let s = stream(1, "ESPN HD");
        let mut ctx = ExecutionContext::new(&s, normalize_name(&s.name), false);

        let set = Action::SetVariable(SetVariableParams {
            var_name: "CALLSIGN".to_string(),
            mode: SetVariableMode::Literal,
            source_field: None,
            pattern: None,
            replacement: None,
            template: Some("WABC".to_string()),
        });
        executor.execute(&set, &mut ctx).await;

        let log = Action::LogMatch { message: Some("{var:CALLSIGN}".to_string()) };
        let result = executor.execute(&log, &mut ctx).await;
        assert_eq!(result.description, "WABC");
    }
}
