//! Inverted keyword/tag/capability/tool-name indexes over services (spec §4.2).

use parking_lot::RwLock;
use std::collections::{HashMap, HashSet};
use yukie_domain::model::ToolSchema;

const KEYWORD_WEIGHT: f64 = 1.0;
const TAG_WEIGHT: f64 = 2.0;
const CAPABILITY_WEIGHT: f64 = 3.0;
const TOOL_NAME_WEIGHT: f64 = 4.0;

fn normalize_term(s: &str) -> Option<String> {
    let cleaned: String = s
        .trim()
        .to_lowercase()
        .chars()
        .filter(|c| c.is_alphanumeric() || *c == '-')
        .collect();
    if cleaned.len() >= 2 {
        Some(cleaned)
    } else {
        None
    }
}

const STOP_WORDS: &[&str] = &[
    "the", "a", "an", "and", "or", "but", "to", "of", "in", "on", "at", "for", "with", "is",
    "are", "was", "were", "be", "been", "i", "you", "it", "my", "me", "this", "that",
];

fn tokenize_text(text: &str) -> Vec<String> {
    text.split(|c: char| !c.is_alphanumeric())
        .map(|t| t.to_lowercase())
        .filter(|t| t.len() >= 3 && !STOP_WORDS.contains(&t.as_str()))
        .collect()
}

#[derive(Default)]
struct ServiceMeta {
    name: String,
    priority: i32,
}

#[derive(Default)]
pub struct CapabilityIndex {
    keyword_index: RwLock<HashMap<String, HashSet<String>>>,
    tag_index: RwLock<HashMap<String, HashSet<String>>>,
    capability_index: RwLock<HashMap<String, HashSet<String>>>,
    tool_name_index: RwLock<HashMap<String, HashSet<String>>>,
    meta: RwLock<HashMap<String, ServiceMeta>>,
}

#[derive(Debug, Clone)]
pub struct ScoredService {
    pub service_id: String,
    pub score: f64,
}

impl CapabilityIndex {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_service(
        &self,
        service_id: &str,
        name: &str,
        description: &str,
        priority: i32,
        keywords: &[String],
        tags: &[String],
        capabilities: &[String],
    ) {
        self.meta.write().insert(
            service_id.to_string(),
            ServiceMeta {
                name: name.to_string(),
                priority,
            },
        );

        {
            let mut idx = self.keyword_index.write();
            for kw in keywords {
                if let Some(term) = normalize_term(kw) {
                    idx.entry(term).or_default().insert(service_id.to_string());
                }
            }
            for term in tokenize_text(description) {
                idx.entry(term).or_default().insert(service_id.to_string());
            }
        }
        {
            let mut idx = self.tag_index.write();
            for tag in tags {
                if let Some(term) = normalize_term(tag) {
                    idx.entry(term).or_default().insert(service_id.to_string());
                }
            }
        }
        {
            let mut idx = self.capability_index.write();
            for cap in capabilities {
                if let Some(term) = normalize_term(cap) {
                    idx.entry(term).or_default().insert(service_id.to_string());
                }
                for term in tokenize_text(cap) {
                    idx.entry(term).or_default().insert(service_id.to_string());
                }
            }
        }
    }

    pub fn add_tools(&self, service_id: &str, tools: &[ToolSchema]) {
        let mut tool_idx = self.tool_name_index.write();
        let mut kw_idx = self.keyword_index.write();
        for tool in tools {
            if let Some(term) = normalize_term(&tool.name) {
                tool_idx
                    .entry(term)
                    .or_default()
                    .insert(service_id.to_string());
            }
            for term in tokenize_text(&tool.description) {
                kw_idx.entry(term).or_default().insert(service_id.to_string());
            }
        }
    }

    pub fn remove_service(&self, service_id: &str) {
        for idx in [
            &self.keyword_index,
            &self.tag_index,
            &self.capability_index,
            &self.tool_name_index,
        ] {
            let mut idx = idx.write();
            idx.retain(|_, set| {
                set.remove(service_id);
                !set.is_empty()
            });
        }
        self.meta.write().remove(service_id);
    }

    fn score_index(
        index: &HashMap<String, HashSet<String>>,
        token: &str,
        weight: f64,
        scores: &mut HashMap<String, f64>,
    ) {
        for (term, services) in index.iter() {
            let hit = if term == token {
                Some(weight * 2.0)
            } else if term.starts_with(token) || token.starts_with(term.as_str()) {
                Some(weight)
            } else {
                None
            };
            if let Some(add) = hit {
                for service_id in services {
                    *scores.entry(service_id.clone()).or_insert(0.0) += add;
                }
            }
        }
    }

    /// Tokenises `query`, scores hits across all four indexes, tie-breaks
    /// by priority descending, and returns the top `limit` services.
    pub fn search(&self, query: &str, limit: usize) -> Vec<ScoredService> {
        let tokens = tokenize_text(query);
        let mut scores: HashMap<String, f64> = HashMap::new();

        let keyword_idx = self.keyword_index.read();
        let tag_idx = self.tag_index.read();
        let capability_idx = self.capability_index.read();
        let tool_name_idx = self.tool_name_index.read();

        for token in &tokens {
            Self::score_index(&keyword_idx, token, KEYWORD_WEIGHT, &mut scores);
            Self::score_index(&tag_idx, token, TAG_WEIGHT, &mut scores);
            Self::score_index(&capability_idx, token, CAPABILITY_WEIGHT, &mut scores);
            Self::score_index(&tool_name_idx, token, TOOL_NAME_WEIGHT, &mut scores);
        }

        let meta = self.meta.read();
        let mut ranked: Vec<ScoredService> = scores
            .into_iter()
            .map(|(service_id, score)| ScoredService { service_id, score })
            .collect();

        ranked.sort_by(|a, b| {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| {
                    let pa = meta.get(&a.service_id).map(|m| m.priority).unwrap_or(0);
                    let pb = meta.get(&b.service_id).map(|m| m.priority).unwrap_or(0);
                    pb.cmp(&pa)
                })
        });
        ranked.truncate(limit);
        ranked
    }

    pub fn term_counts(&self) -> HashMap<String, usize> {
        let mut out = HashMap::new();
        out.insert("keyword".into(), self.keyword_index.read().len());
        out.insert("tag".into(), self.tag_index.read().len());
        out.insert("capability".into(), self.capability_index.read().len());
        out.insert("tool_name".into(), self.tool_name_index.read().len());
        out
    }
}
