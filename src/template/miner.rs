// Copyright (c) 2024-present, fjall-rs
// This source code is licensed under both the Apache 2.0 and MIT License
// (found in the LICENSE-* files in the repository)

//! In-process template mining.
//!
//! A Drain-style fixed-depth prefix tree: lines are routed by token
//! count, then by their first tokens, into leaf groups of clusters.
//! A line either joins the most similar cluster of its leaf (wildcarding
//! the positions that differ) or founds a new cluster.
//!
//! One miner exists per encode session; [`DrainMiner::snapshot`] freezes
//! the clusters into an immutable [`TemplateBank`].

use super::{TemplateBank, SLOT};
use rustc_hash::FxHashMap;

/// Miner tuning parameters.
#[derive(Clone, Debug)]
pub struct MinerConfig {
    /// Prefix tree depth (token positions consulted for routing)
    pub depth: usize,

    /// Maximum children per tree node before spilling into the wildcard branch
    pub max_children: usize,

    /// Minimum token-level similarity for joining an existing cluster
    pub sim_threshold: f64,
}

impl Default for MinerConfig {
    fn default() -> Self {
        Self {
            depth: 4,
            max_children: 100,
            sim_threshold: 0.4,
        }
    }
}

#[derive(Debug, Default)]
struct Node {
    children: FxHashMap<String, Node>,

    /// Cluster indices, only populated at leaf depth
    clusters: Vec<usize>,
}

#[derive(Debug)]
struct Cluster {
    tokens: Vec<String>,
}

/// Drain-style template miner.
#[derive(Debug)]
pub struct DrainMiner {
    config: MinerConfig,

    /// Level-1 routing by token count
    root: FxHashMap<usize, Node>,

    /// All clusters in creation order; cluster index becomes the event ID
    clusters: Vec<Cluster>,
}

impl Default for DrainMiner {
    fn default() -> Self {
        Self::new(MinerConfig::default())
    }
}

impl DrainMiner {
    /// Creates a miner with the given parameters.
    #[must_use]
    pub fn new(config: MinerConfig) -> Self {
        Self {
            config,
            root: FxHashMap::default(),
            clusters: Vec::new(),
        }
    }

    /// Observes one raw line, updating the cluster tree.
    pub fn observe(&mut self, line: &str) {
        let tokens: Vec<String> = line.split_whitespace().map(str::to_owned).collect();

        if tokens.is_empty() {
            return;
        }

        // Levels 2.. route by the first `depth - 2` tokens
        let route_len = self.config.depth.saturating_sub(2).min(tokens.len());

        let mut node = self.root.entry(tokens.len()).or_default();

        for token in tokens.iter().take(route_len) {
            let key = if has_digit(token) || node.children.len() >= self.config.max_children {
                SLOT.to_owned()
            } else {
                token.clone()
            };

            node = node.children.entry(key).or_default();
        }

        let best = node
            .clusters
            .iter()
            .filter_map(|idx| {
                let cluster = self.clusters.get(*idx)?;
                Some((*idx, similarity(&cluster.tokens, &tokens)))
            })
            .max_by(|a, b| a.1.total_cmp(&b.1).then(b.0.cmp(&a.0)));

        match best {
            Some((idx, sim)) if sim >= self.config.sim_threshold => {
                if let Some(cluster) = self.clusters.get_mut(idx) {
                    merge_into(&mut cluster.tokens, &tokens);
                }
            }
            _ => {
                let idx = self.clusters.len();
                self.clusters.push(Cluster { tokens });
                node.clusters.push(idx);
            }
        }
    }

    /// Number of clusters mined so far.
    #[must_use]
    pub fn cluster_count(&self) -> usize {
        self.clusters.len()
    }

    /// Freezes the mined clusters into a template bank.
    ///
    /// Cluster creation order determines event IDs, so identical inputs
    /// always produce identical banks.
    pub fn snapshot(&self) -> crate::Result<TemplateBank> {
        // NOTE: Truncation is OK, nobody mines 4 billion templates
        #[allow(clippy::cast_possible_truncation)]
        let entries: Vec<(u32, String)> = self
            .clusters
            .iter()
            .enumerate()
            .map(|(idx, cluster)| (idx as u32, cluster.tokens.join(" ")))
            .collect();

        TemplateBank::from_templates(&entries)
    }
}

fn has_digit(token: &str) -> bool {
    token.chars().any(|c| c.is_ascii_digit())
}

/// Fraction of positions whose tokens are equal.
///
/// Wildcard positions do not count as equal, matching Drain's seqDist.
fn similarity(template: &[String], tokens: &[String]) -> f64 {
    if template.len() != tokens.len() {
        return 0.0;
    }
    if template.is_empty() {
        return 1.0;
    }

    let equal = template
        .iter()
        .zip(tokens)
        .filter(|(a, b)| a == b && a.as_str() != SLOT)
        .count();

    #[allow(clippy::cast_precision_loss)]
    let sim = equal as f64 / template.len() as f64;

    sim
}

/// Wildcards the template positions that differ from the new line.
fn merge_into(template: &mut [String], tokens: &[String]) {
    for (slot, token) in template.iter_mut().zip(tokens) {
        if slot != token {
            SLOT.clone_into(slot);
        }
    }
}
