//! `name_template` expansion and the optional regex rewrite pass.
//!
//! Variables are resolved against a fixed set plus the per-stream
//! `{var:NAME}` namespace spec.md §4.2/§9 describes; unresolved `var:`
//! lookups fall back to the empty string rather than erroring, matching
//! spec.md §9's "empty-string fallback".

use std::collections::HashMap;

use regex::Regex;

use crate::error::ExecutorError;
use crate::normalize::detect_quality;
use crate::upstream::Stream;

pub struct TemplateVars<'a> {
    pub stream: &'a Stream,
    pub normalized_name: &'a str,
    pub vars: &'a HashMap<String, String>,
}

/// Expand `{name}`-style placeholders in `template` against the fixed
/// variable set and the stream's `var:` namespace.
pub fn expand_template(template: &str, ctx: &TemplateVars) -> String {
    let (quality, quality_raw) = detect_quality(&ctx.stream.name);
    let mut out = String::with_capacity(template.len());
    let bytes = template.as_bytes();
    let mut i = 0;

    while i < template.len() {
        if bytes[i] == b'{' {
            if let Some(end) = template[i..].find('}') {
                let end = i + end;
                let key = &template[i + 1..end];
                out.push_str(&resolve(key, ctx, quality, &quality_raw));
                i = end + 1;
                continue;
            }
        }
        let ch = template[i..].chars().next().unwrap();
        out.push(ch);
        i += ch.len_utf8();
    }
    out
}

fn resolve(key: &str, ctx: &TemplateVars, quality: &str, quality_raw: &str) -> String {
    if let Some(name) = key.strip_prefix("var:") {
        return ctx.vars.get(name).cloned().unwrap_or_default();
    }

    match key {
        "stream_name" => ctx.stream.name.clone(),
        "stream_group" => ctx.stream.group_name.clone().unwrap_or_default(),
        "tvg_id" => ctx.stream.tvg_id.clone().unwrap_or_default(),
        "tvg_name" => ctx.stream.tvg_name.clone().unwrap_or_default(),
        "quality" => quality.to_string(),
        "quality_raw" => quality_raw.to_string(),
        "provider" => ctx.stream.provider_name.clone(),
        "provider_id" => ctx.stream.provider_id.to_string(),
        "normalized_name" => ctx.normalized_name.to_string(),
        _ => String::new(),
    }
}

/// Apply an optional regex rewrite (`$1`-style backrefs) to an
/// already-expanded name.
pub fn apply_transform(
    name: &str,
    pattern: Option<&str>,
    replacement: Option<&str>,
) -> Result<String, ExecutorError> {
    match (pattern, replacement) {
        (Some(pattern), Some(replacement)) => {
            let re = Regex::new(pattern).map_err(|e| ExecutorError::InvalidTemplate(e.to_string()))?;
            Ok(re.replace_all(name, replacement).into_owned())
        }
        _ => Ok(name.to_string()),
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
            group_name: Some("Sports".to_string()),
            tvg_id: Some("espn.us".to_string()),
            tvg_name: None,
            logo_url: None,
            provider_id: 7,
            provider_name: "Provider A".to_string(),
            resolution_height: None,
            normalized_name: None,
        }
    }

    #[test]
    fn expands_fixed_variables() {
        let s = stream();
        let vars = HashMap::new();
        let ctx = TemplateVars { stream: &s, normalized_name: "espn", vars: &vars };
        let result = expand_template("{stream_name} ({quality}) [{provider}]", &ctx);
        assert_eq!(result, "ESPN HD (HD) [Provider A]");
    }

    #[test]
    fn expands_var_namespace_with_empty_fallback() {
        let s = stream();
        let mut vars = HashMap::new();
        vars.insert("CALLSIGN".to_string(), "WABC".to_string());
        let ctx = TemplateVars { stream: &s, normalized_name: "espn", vars: &vars };
        assert_eq!(expand_template("{var:CALLSIGN}", &ctx), "WABC");
        assert_eq!(expand_template("{var:MISSING}", &ctx), "");
    }

    #[test]
    fn transform_applies_backreferences() {
        let result = apply_transform("ESPN HD", Some(r"^(\w+) HD$"), Some("$1")).unwrap();
        assert_eq!(result, "ESPN");
    }

    #[test]
    fn transform_is_identity_when_unset() {
        assert_eq!(apply_transform("ESPN HD", None, None).unwrap(), "ESPN HD");
    }
}
