//! Pattern-table domain classifier.

use crate::patterns::default_patterns;
use crate::{ClassifierError, ClassifierResult, ModeResolver};
use doctrine_types::{Domain, DomainClassification, EnforcementMode};
use regex::{Regex, RegexBuilder};
use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, RwLock};
use tracing::{debug, info};

/// Longest prefix of the input that is inspected.
pub const MAX_INPUT_BYTES: usize = 16 * 1024;

const BASE_CONFIDENCE: f64 = 0.55;
const CONFIDENCE_STEP: f64 = 0.15;
const MAX_CONFIDENCE: f64 = 0.95;

struct CompiledPattern {
    source: String,
    regex: Regex,
}

/// Compiled patterns for every routable domain, in priority order.
struct PatternTable {
    domains: Vec<(Domain, Vec<CompiledPattern>)>,
}

impl PatternTable {
    fn defaults() -> ClassifierResult<Self> {
        let mut domains = Vec::new();
        for domain in Domain::PRIORITY {
            let sources = default_patterns(domain)
                .iter()
                .map(|s| s.to_string())
                .collect::<Vec<_>>();
            domains.push((domain, compile(domain, &sources)?));
        }
        Ok(Self { domains })
    }

    fn with_replaced(&self, domain: Domain, compiled: Vec<CompiledPattern>) -> Self {
        let mut compiled = Some(compiled);
        let domains = self
            .domains
            .iter()
            .map(|(d, patterns)| {
                if *d == domain {
                    (*d, compiled.take().unwrap_or_default())
                } else {
                    (*d, patterns.iter().map(clone_pattern).collect())
                }
            })
            .collect();
        Self { domains }
    }

    fn classify(&self, text: &str) -> DomainClassification {
        let text = truncate(text);
        let mut scored: Vec<(Domain, f64, Vec<String>)> = Vec::new();

        for (domain, patterns) in &self.domains {
            let matched = patterns
                .iter()
                .filter(|p| p.regex.is_match(text))
                .map(|p| p.source.clone())
                .collect::<Vec<_>>();
            if matched.is_empty() {
                continue;
            }
            let confidence = (BASE_CONFIDENCE + CONFIDENCE_STEP * (matched.len() - 1) as f64)
                .min(MAX_CONFIDENCE);
            scored.push((*domain, confidence, matched));
        }

        // Stable sort keeps priority order among equal confidences.
        scored.sort_by(|a, b| {
            b.1.partial_cmp(&a.1)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then(a.0.priority_rank().cmp(&b.0.priority_rank()))
        });

        let mut ranked = scored.into_iter();
        match ranked.next() {
            Some((domain, confidence, matched_patterns)) => DomainClassification {
                domain,
                confidence,
                secondary_domain: ranked.next().map(|(d, _, _)| d),
                matched_patterns,
                mapped_ruleset_id: domain.ruleset_id(),
            },
            None => DomainClassification::fallback(),
        }
    }
}

fn clone_pattern(p: &CompiledPattern) -> CompiledPattern {
    CompiledPattern {
        source: p.source.clone(),
        regex: p.regex.clone(),
    }
}

fn compile(domain: Domain, sources: &[String]) -> ClassifierResult<Vec<CompiledPattern>> {
    sources
        .iter()
        .map(|source| {
            RegexBuilder::new(source)
                .case_insensitive(true)
                .build()
                .map(|regex| CompiledPattern {
                    source: source.clone(),
                    regex,
                })
                .map_err(|e| ClassifierError::InvalidPattern {
                    domain,
                    pattern: source.clone(),
                    reason: e.to_string(),
                })
        })
        .collect()
}

fn truncate(text: &str) -> &str {
    if text.len() <= MAX_INPUT_BYTES {
        return text;
    }
    let mut end = MAX_INPUT_BYTES;
    while !text.is_char_boundary(end) {
        end -= 1;
    }
    &text[..end]
}

/// One row of the routing map exposed to administrators.
#[derive(Debug, Clone, Serialize)]
pub struct RouteEntry {
    pub domain: Domain,
    pub mode: EnforcementMode,
    pub ruleset_id: String,
    pub patterns: Vec<String>,
}

/// Classification counters.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ClassifierStats {
    pub total: u64,
    pub per_domain: BTreeMap<Domain, u64>,
}

/// Deterministic domain classifier.
///
/// Administrators may replace a domain's patterns at runtime; the built-in
/// table stays compiled alongside so enforcement points can re-derive a
/// classification that does not depend on mutable state.
pub struct DomainClassifier {
    active: RwLock<Arc<PatternTable>>,
    builtin: Arc<PatternTable>,
    counters: [AtomicU64; Domain::PRIORITY.len()],
}

impl DomainClassifier {
    pub fn new() -> ClassifierResult<Self> {
        let builtin = Arc::new(PatternTable::defaults()?);
        Ok(Self {
            active: RwLock::new(builtin.clone()),
            builtin,
            counters: Default::default(),
        })
    }

    fn table(&self) -> Arc<PatternTable> {
        match self.active.read() {
            Ok(guard) => guard.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    /// Classify text and count the result.
    pub fn classify(&self, text: &str) -> DomainClassification {
        let result = self.table().classify(text);
        if let Some(counter) = self.counters.get(result.domain.priority_rank()) {
            counter.fetch_add(1, Ordering::Relaxed);
        }
        debug!(
            domain = %result.domain,
            confidence = result.confidence,
            matched = result.matched_patterns.len(),
            "Classified request"
        );
        result
    }

    /// Classify without touching counters or logs.
    pub fn dry_run(&self, text: &str) -> DomainClassification {
        self.table().classify(text)
    }

    /// Classify against the built-in table, ignoring runtime pattern edits.
    pub fn rederive(&self, text: &str) -> DomainClassification {
        self.builtin.classify(text)
    }

    /// Replace one domain's patterns. All patterns must compile.
    pub fn update_patterns(&self, domain: Domain, patterns: Vec<String>) -> ClassifierResult<()> {
        if default_patterns(domain).is_empty() {
            return Err(ClassifierError::UnroutableDomain(domain));
        }
        let compiled = compile(domain, &patterns)?;
        let next = Arc::new(self.table().with_replaced(domain, compiled));
        match self.active.write() {
            Ok(mut guard) => *guard = next,
            Err(poisoned) => *poisoned.into_inner() = next,
        }
        info!(domain = %domain, count = patterns.len(), "Classification patterns updated");
        Ok(())
    }

    pub fn routing_map(&self) -> Vec<RouteEntry> {
        self.table()
            .domains
            .iter()
            .map(|(domain, patterns)| RouteEntry {
                domain: *domain,
                mode: ModeResolver::mode_for(*domain),
                ruleset_id: domain.ruleset_id(),
                patterns: patterns.iter().map(|p| p.source.clone()).collect(),
            })
            .collect()
    }

    pub fn stats(&self) -> ClassifierStats {
        let mut stats = ClassifierStats::default();
        for (domain, counter) in Domain::PRIORITY.iter().zip(self.counters.iter()) {
            let count = counter.load(Ordering::Relaxed);
            stats.total += count;
            stats.per_domain.insert(*domain, count);
        }
        stats
    }
}
