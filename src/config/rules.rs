// src/config/rules.rs
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use anyhow::{anyhow, bail, Context, Result};
use regex::Regex;
use serde::Deserialize;

use super::CollectorConfig;
use crate::filter::{AlertPipeline, MatchRule, Matcher};
use crate::notify::{AlertSink, BarkNotifier, DiscordNotifier, LogNotifier, SlackNotifier};

/// Name of the implicit log-only channel.
pub const LOG_CHANNEL: &str = "log";

/// Alert channel. Secrets given as `"ENV"` are read from
/// `BARK_DEVICE_KEY` / `DISCORD_WEBHOOK_URL` / `SLACK_WEBHOOK_URL`.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum ChannelConfig {
    Bark {
        device_key: String,
        #[serde(default)]
        server: Option<String>,
    },
    Discord {
        webhook: String,
    },
    Slack {
        webhook: String,
    },
    Log,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RuleConfig {
    pub name: String,
    #[serde(default)]
    pub title_prefix: String,
    #[serde(default)]
    pub all_of: Vec<String>,
    #[serde(default)]
    pub any_of: Vec<String>,
    #[serde(default)]
    pub pattern: Option<String>,
    /// Key into `[channels]`; the log channel when absent.
    #[serde(default)]
    pub channel: Option<String>,
}

impl RuleConfig {
    pub fn matcher(&self) -> Result<Matcher> {
        let all = clean(&self.all_of);
        let any = clean(&self.any_of);
        match (all.is_empty(), any.is_empty(), &self.pattern) {
            (false, true, None) => Ok(Matcher::AllOf(all)),
            (true, false, None) => Ok(Matcher::AnyOf(any)),
            (true, true, Some(p)) => {
                let re = Regex::new(p).with_context(|| format!("rule `{}`: invalid pattern", self.name))?;
                Ok(Matcher::Regex(re))
            }
            _ => bail!(
                "rule `{}` needs exactly one of all_of, any_of or pattern",
                self.name
            ),
        }
    }

    pub fn channel_name(&self) -> &str {
        self.channel.as_deref().unwrap_or(LOG_CHANNEL)
    }

    pub fn validate(&self, channels: &BTreeMap<String, ChannelConfig>) -> Result<()> {
        if self.name.trim().is_empty() {
            bail!("rule name must not be empty");
        }
        self.matcher()?;
        let ch = self.channel_name();
        if ch != LOG_CHANNEL && !channels.contains_key(ch) {
            bail!("rule `{}` refers to unknown channel `{ch}`", self.name);
        }
        Ok(())
    }
}

fn clean(words: &[String]) -> Vec<String> {
    words
        .iter()
        .map(|w| w.trim())
        .filter(|w| !w.is_empty())
        .map(str::to_string)
        .collect()
}

fn resolve_secret(value: &str, env_key: &str) -> Result<String> {
    if value.trim().eq_ignore_ascii_case("env") {
        return std::env::var(env_key).map_err(|_| anyhow!("Missing {env_key} env var"));
    }
    Ok(value.to_string())
}

impl ChannelConfig {
    pub fn build(&self, timeout_secs: u64) -> Result<Arc<dyn AlertSink>> {
        let sink: Arc<dyn AlertSink> = match self {
            ChannelConfig::Bark { device_key, server } => {
                let mut b = BarkNotifier::new(resolve_secret(device_key, "BARK_DEVICE_KEY")?).with_timeout(timeout_secs);
                if let Some(s) = server {
                    b = b.with_server(s.as_str());
                }
                Arc::new(b)
            }
            ChannelConfig::Discord { webhook } => Arc::new(
                DiscordNotifier::new(resolve_secret(webhook, "DISCORD_WEBHOOK_URL")?).with_timeout(timeout_secs),
            ),
            ChannelConfig::Slack { webhook } => Arc::new(
                SlackNotifier::new(resolve_secret(webhook, "SLACK_WEBHOOK_URL")?).with_timeout(timeout_secs),
            ),
            ChannelConfig::Log => Arc::new(LogNotifier),
        };
        Ok(sink)
    }
}

/// Channels and rules from configuration, in file order.
pub fn build_pipeline(cfg: &CollectorConfig) -> Result<AlertPipeline> {
    let mut sinks: HashMap<&str, Arc<dyn AlertSink>> = HashMap::new();
    sinks.insert(LOG_CHANNEL, Arc::new(LogNotifier));
    for (name, ch) in &cfg.channels {
        let sink = ch
            .build(cfg.http_timeout_secs)
            .with_context(|| format!("channel `{name}`"))?;
        sinks.insert(name.as_str(), sink);
    }

    let mut pipeline = AlertPipeline::default();
    for rule in &cfg.rules {
        let sink = sinks
            .get(rule.channel_name())
            .cloned()
            .ok_or_else(|| anyhow!("rule `{}` refers to unknown channel `{}`", rule.name, rule.channel_name()))?;
        pipeline.add_rule(MatchRule::new(rule.name.clone(), rule.matcher()?, sink).with_title_prefix(rule.title_prefix.clone()));
    }
    Ok(pipeline)
}
