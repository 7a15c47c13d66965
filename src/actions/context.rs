//! Per-stream execution state threaded through one rule's action chain.
//!
//! spec.md §4.2 describes the `var:` namespace set by `set_variable` and
//! read back by later templates in the same chain, plus the "active
//! channel" that `create_channel`/`merge_streams` establish for
//! subsequent actions (`assign_logo`, `assign_epg`, ...) to act on.

use std::collections::HashMap;

use crate::upstream::Stream;

pub struct ExecutionContext<'a> {
    pub stream: &'a Stream,
    pub normalized_name: String,
    pub dry_run: bool,
    pub vars: HashMap<String, String>,
    /// The channel this chain is currently operating on, set by
    /// `create_channel`/`merge_streams` and read by later actions.
    pub active_channel_id: Option<i64>,
    pub active_group_id: Option<i64>,
    pub stop_processing: bool,
}

impl<'a> ExecutionContext<'a> {
    pub fn new(stream: &'a Stream, normalized_name: String, dry_run: bool) -> Self {
        Self {
            stream,
            normalized_name,
            dry_run,
            vars: HashMap::new(),
            active_channel_id: None,
            active_group_id: None,
            stop_processing: false,
        }
    }

    pub fn set_var(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.vars.insert(name.into(), value.into());
    }

    pub fn template_vars(&self) -> crate::actions::template::TemplateVars<'_> {
        crate::actions::template::TemplateVars {
            stream: self.stream,
            normalized_name: &self.normalized_name,
            vars: &self.vars,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn stream() -> Stream {
        Stream {
            id: 1,
            name: "ESPN HD".to_string(),
            url: "http://example/1".to_string(),
            group_name: None,
            tvg_id: None,
            tvg_name: None,
            logo_url: None,
            provider_id: 1,
            provider_name: "Provider".to_string(),
            resolution_height: None,
            normalized_name: None,
        }
    }

    #[test]
    fn vars_round_trip() {
        let s = stream();
        let mut ctx = ExecutionContext::new(&s, "espn".to_string(), false);
        ctx.set_var("CALLSIGN", "WABC");
        assert_eq!(ctx.vars.get("CALLSIGN").unwrap(), "WABC");
    }

    #[test]
    fn active_channel_starts_unset() {
        let s = stream();
        let ctx = ExecutionContext::new(&s, "espn".to_string(), true);
        assert!(ctx.active_channel_id.is_none());
        assert!(ctx.dry_run);
    }
}
