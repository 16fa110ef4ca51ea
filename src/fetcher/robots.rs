//! robots.txt 解析与按host缓存

use regex::Regex;
use reqwest::Client;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Mutex, OnceCell};
use tokio::time::Instant;
use url::Url;

use super::rate_limit::RateLimiter;
use crate::utils::urls::origin_of;

#[derive(Debug, Clone)]
struct Rule {
    allow: bool,
    /// 原始路径模式长度，用于最长匹配
    specificity: usize,
    matcher: Regex,
}

#[derive(Debug, Clone, Default)]
struct Group {
    agents: Vec<String>,
    rules: Vec<Rule>,
}

/// 一个host的robots策略
#[derive(Debug, Clone, Default)]
pub struct RobotsPolicy {
    groups: Vec<Group>,
}

fn compile_pattern(pattern: &str) -> Option<Regex> {
    let (body, anchored) = match pattern.strip_suffix('$') {
        Some(body) => (body, true),
        None => (pattern, false),
    };
    let mut expr = String::from("^");
    for (i, part) in body.split('*').enumerate() {
        if i > 0 {
            expr.push_str(".*");
        }
        expr.push_str(&regex::escape(part));
    }
    if anchored {
        expr.push('$');
    }
    Regex::new(&expr).ok()
}

impl RobotsPolicy {
    /// 不做任何限制
    pub fn allow_all() -> Self {
        Self::default()
    }

    pub fn parse(body: &str) -> Self {
        let mut groups: Vec<Group> = Vec::new();
        let mut current: Option<Group> = None;
        let mut last_was_agent = false;

        for raw_line in body.lines() {
            let line = raw_line.split('#').next().unwrap_or("").trim();
            let Some((field, value)) = line.split_once(':') else {
                continue;
            };
            let field = field.trim().to_lowercase();
            let value = value.trim();

            match field.as_str() {
                "user-agent" => {
                    if !last_was_agent && let Some(group) = current.take() {
                        groups.push(group);
                    }
                    let group = current.get_or_insert_with(Group::default);
                    // 空token会匹配任何agent
                    if !value.is_empty() {
                        group.agents.push(value.to_lowercase());
                    }
                    last_was_agent = true;
                }
                "allow" | "disallow" => {
                    last_was_agent = false;
                    let Some(group) = current.as_mut() else {
                        continue;
                    };
                    // 空的Disallow表示不限制
                    if value.is_empty() {
                        continue;
                    }
                    if let Some(matcher) = compile_pattern(value) {
                        group.rules.push(Rule {
                            allow: field == "allow",
                            specificity: value.len(),
                            matcher,
                        });
                    }
                }
                _ => {
                    last_was_agent = false;
                }
            }
        }

        if let Some(group) = current {
            groups.push(group);
        }
        Self { groups }
    }

    /// 选择与agent匹配度最高的分组，没有则使用 `*`
    fn rules_for(&self, agent: &str) -> Vec<&Rule> {
        let agent = agent.to_lowercase();
        let best_len = self
            .groups
            .iter()
            .flat_map(|g| g.agents.iter())
            .filter(|token| token.as_str() != "*" && agent.contains(token.as_str()))
            .map(|token| token.len())
            .max();

        let selected = |group: &&Group| match best_len {
            Some(len) => group
                .agents
                .iter()
                .any(|token| token.len() == len && token != "*" && agent.contains(token.as_str())),
            None => group.agents.iter().any(|token| token == "*"),
        };

        self.groups
            .iter()
            .filter(selected)
            .flat_map(|g| g.rules.iter())
            .collect()
    }

    /// 最长匹配的规则生效，长度相同时Allow优先
    pub fn is_allowed(&self, agent: &str, path: &str) -> bool {
        let mut best: Option<&Rule> = None;
        for rule in self.rules_for(agent) {
            if !rule.matcher.is_match(path) {
                continue;
            }
            best = match best {
                None => Some(rule),
                Some(current) if rule.specificity > current.specificity => Some(rule),
                Some(current) if rule.specificity == current.specificity && rule.allow => {
                    Some(rule)
                }
                keep => keep,
            };
        }
        best.is_none_or(|rule| rule.allow)
    }
}

type PolicySlot = Arc<OnceCell<(Instant, Arc<RobotsPolicy>)>>;

/// 按 scheme+host+port 缓存robots策略。同一origin的并发查询共享一次下载，
/// 下载同样占用抓取限流的配额。
pub struct RobotsCache {
    client: Client,
    ttl: Duration,
    limiter: Arc<RateLimiter>,
    entries: Mutex<HashMap<String, PolicySlot>>,
}

impl RobotsCache {
    pub fn new(client: Client, ttl: Duration, limiter: Arc<RateLimiter>) -> Self {
        Self {
            client,
            ttl,
            limiter,
            entries: Mutex::new(HashMap::new()),
        }
    }

    pub async fn is_allowed(&self, url: &Url, agent: &str) -> bool {
        let policy = self.policy_for(url).await;
        let mut path = url.path().to_string();
        if let Some(query) = url.query() {
            path.push('?');
            path.push_str(query);
        }
        policy.is_allowed(agent, &path)
    }

    async fn policy_for(&self, url: &Url) -> Arc<RobotsPolicy> {
        let origin = origin_of(url);

        let slot = {
            let mut entries = self.entries.lock().await;
            let slot = entries.entry(origin.clone()).or_default();
            if slot
                .get()
                .is_some_and(|(fetched_at, _)| fetched_at.elapsed() >= self.ttl)
            {
                *slot = PolicySlot::default();
            }
            slot.clone()
        };

        let (_, policy) = slot
            .get_or_init(|| async {
                let policy = self.fetch_policy(&origin).await;
                (Instant::now(), Arc::new(policy))
            })
            .await;
        policy.clone()
    }

    /// 4xx或无法访问时视为允许
    async fn fetch_policy(&self, origin: &str) -> RobotsPolicy {
        let robots_url = format!("{}/robots.txt", origin);
        let _permit = match self.limiter.acquire().await {
            Ok(permit) => permit,
            Err(e) => {
                tracing::debug!(url = %robots_url, error = %e, "rate limiter closed");
                return RobotsPolicy::allow_all();
            }
        };
        match self.client.get(&robots_url).send().await {
            Ok(response) if response.status().is_success() => match response.text().await {
                Ok(body) => RobotsPolicy::parse(&body),
                Err(e) => {
                    tracing::debug!(url = %robots_url, error = %e, "robots.txt unreadable");
                    RobotsPolicy::allow_all()
                }
            },
            Ok(response) => {
                tracing::debug!(url = %robots_url, status = response.status().as_u16(), "robots.txt unavailable");
                RobotsPolicy::allow_all()
            }
            Err(e) => {
                tracing::debug!(url = %robots_url, error = %e, "robots.txt unreachable");
                RobotsPolicy::allow_all()
            }
        }
    }
}
