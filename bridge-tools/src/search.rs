//! Ranking strategies for free-text tool search.

use std::cmp::Ordering;
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex, PoisonError};

use async_trait::async_trait;
use bridge_primitives::{Error, Result, Tool};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::embedding::{
    EmbeddingError, EmbeddingModel, EmbeddingResult, HashedWordEmbedding, cosine_similarity,
};

static WORD: Lazy<Regex> = Lazy::new(|| Regex::new(r"\w+").expect("word pattern compiles"));

/// Ranks catalog tools against a free-text query.
///
/// Implementations return at most `limit` tools (`0` meaning unlimited),
/// ordered by descending relevance, with ties kept in catalog order and tools
/// without any relevance excluded.
#[async_trait]
pub trait SearchStrategy: Send + Sync {
    /// Short identifier used in logs.
    fn name(&self) -> &'static str;

    /// Ranks `tools`, which are supplied in catalog order.
    async fn search(&self, tools: &[Arc<Tool>], query: &str, limit: usize) -> Vec<Arc<Tool>>;
}

/// Declarative selection of a search strategy.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(tag = "tool_search_strategy_type", rename_all = "snake_case")]
pub enum SearchStrategyConfig {
    /// Count of query words found among a tool's tags, name segments, and
    /// description words.
    #[default]
    TagAndDescriptionWordMatch,
    /// Weighted sum of tag, name-segment, and description-word hits.
    WeightedTagMatch {
        /// Weight of a query word matching a tag.
        #[serde(default = "default_tag_weight")]
        tag_weight: f64,
        /// Weight of a query word matching a description word.
        #[serde(default = "default_description_weight")]
        description_weight: f64,
        /// Weight of a query word matching a segment of the tool name.
        #[serde(default = "default_name_weight")]
        name_weight: f64,
    },
    /// Tag matches first, then tools close to the query in embedding space.
    Hybrid {
        /// Bucket count of the built-in hashed word embedding.
        #[serde(default = "default_embedding_dimensions")]
        embedding_dimensions: usize,
    },
}

fn default_embedding_dimensions() -> usize {
    HashedWordEmbedding::DEFAULT_DIMENSIONS
}

fn default_tag_weight() -> f64 {
    1.0
}

fn default_description_weight() -> f64 {
    0.3
}

fn default_name_weight() -> f64 {
    0.5
}

impl SearchStrategyConfig {
    /// Checks that configured weights are usable.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] when a weight is negative or not finite, or
    /// when the embedding dimension is zero.
    pub fn validate(&self) -> Result<()> {
        match self {
            Self::TagAndDescriptionWordMatch => Ok(()),
            Self::WeightedTagMatch {
                tag_weight,
                description_weight,
                name_weight,
            } => {
                for (label, weight) in [
                    ("tag_weight", tag_weight),
                    ("description_weight", description_weight),
                    ("name_weight", name_weight),
                ] {
                    if !weight.is_finite() || *weight < 0.0 {
                        return Err(Error::config(format!(
                            "search strategy {label} must be a non-negative number"
                        )));
                    }
                }
                Ok(())
            }
            Self::Hybrid {
                embedding_dimensions,
            } => {
                if *embedding_dimensions == 0 {
                    return Err(Error::config(
                        "search strategy embedding_dimensions must be positive",
                    ));
                }
                Ok(())
            }
        }
    }

    /// Instantiates the configured strategy.
    #[must_use]
    pub fn build(&self) -> Arc<dyn SearchStrategy> {
        match self {
            Self::TagAndDescriptionWordMatch => Arc::new(TagWordMatchStrategy),
            Self::WeightedTagMatch {
                tag_weight,
                description_weight,
                name_weight,
            } => Arc::new(WeightedTagStrategy {
                tag_weight: *tag_weight,
                description_weight: *description_weight,
                name_weight: *name_weight,
            }),
            Self::Hybrid {
                embedding_dimensions,
            } => Arc::new(HybridStrategy::new(Arc::new(HashedWordEmbedding::new(
                *embedding_dimensions,
            )))),
        }
    }
}

/// Default strategy: one point per query word present among the tool's tags,
/// name segments, and description words, case-insensitive.
///
/// Name segments are the namespaced name, the manual name, and the local
/// name, each compared whole.
#[derive(Debug, Clone, Copy, Default)]
pub struct TagWordMatchStrategy;

#[async_trait]
impl SearchStrategy for TagWordMatchStrategy {
    fn name(&self) -> &'static str {
        "tag_and_description_word_match"
    }

    async fn search(&self, tools: &[Arc<Tool>], query: &str, limit: usize) -> Vec<Arc<Tool>> {
        let query = tokenize(query);
        rank(tools, limit, |tool| {
            let mut vocabulary = tag_tokens(tool);
            vocabulary.extend(name_segments(tool));
            vocabulary.extend(tokenize(tool.description()));
            query
                .iter()
                .filter(|word| vocabulary.contains(*word))
                .map(|_| 1.0)
                .sum()
        })
    }
}

/// Alternate strategy weighting tag hits above name and description hits.
#[derive(Debug, Clone, Copy)]
pub struct WeightedTagStrategy {
    tag_weight: f64,
    description_weight: f64,
    name_weight: f64,
}

impl Default for WeightedTagStrategy {
    fn default() -> Self {
        Self {
            tag_weight: default_tag_weight(),
            description_weight: default_description_weight(),
            name_weight: default_name_weight(),
        }
    }
}

#[async_trait]
impl SearchStrategy for WeightedTagStrategy {
    fn name(&self) -> &'static str {
        "weighted_tag_match"
    }

    async fn search(&self, tools: &[Arc<Tool>], query: &str, limit: usize) -> Vec<Arc<Tool>> {
        let query = tokenize(query);
        rank(tools, limit, |tool| {
            let tags = tag_tokens(tool);
            let names = tokenize(tool.name());
            let description = tokenize(tool.description());
            query
                .iter()
                .map(|word| {
                    let mut score = 0.0;
                    if tags.contains(word) {
                        score += self.tag_weight;
                    }
                    if names.contains(word) {
                        score += self.name_weight;
                    }
                    if description.contains(word) {
                        score += self.description_weight;
                    }
                    score
                })
                .sum()
        })
    }
}

fn rank<F>(tools: &[Arc<Tool>], limit: usize, score: F) -> Vec<Arc<Tool>>
where
    F: Fn(&Tool) -> f64,
{
    let mut scored: Vec<(f64, &Arc<Tool>)> = tools
        .iter()
        .map(|tool| (score(tool), tool))
        .filter(|(score, _)| *score > 0.0)
        .collect();

    // stable: equal scores keep catalog order
    scored.sort_by(|(a, _), (b, _)| b.partial_cmp(a).unwrap_or(Ordering::Equal));

    let limit = if limit == 0 { scored.len() } else { limit };
    scored
        .into_iter()
        .take(limit)
        .map(|(_, tool)| Arc::clone(tool))
        .collect()
}

/// Strategy merging tag matches with embedding similarity.
///
/// Tag matches fill the first half of the limit (five when unlimited), then
/// the closest tools by cosine similarity of their name, description, and
/// tags fill the rest, skipping tools already selected. When the model
/// fails, only the tag matches are returned.
pub struct HybridStrategy {
    tags: TagWordMatchStrategy,
    model: Arc<dyn EmbeddingModel>,
    vectors: Mutex<HashMap<String, Arc<[f32]>>>,
}

impl HybridStrategy {
    /// Tag matches taken when the limit is unlimited.
    pub const UNLIMITED_TAG_MATCHES: usize = 5;
    /// Embedding matches taken when the limit is unlimited.
    pub const UNLIMITED_EMBEDDING_MATCHES: usize = 10;

    /// Creates a strategy backed by `model`.
    #[must_use]
    pub fn new(model: Arc<dyn EmbeddingModel>) -> Self {
        Self {
            tags: TagWordMatchStrategy,
            model,
            vectors: Mutex::new(HashMap::new()),
        }
    }

    async fn nearest(
        &self,
        tools: &[Arc<Tool>],
        query: &str,
        top_k: usize,
    ) -> EmbeddingResult<Vec<Arc<Tool>>> {
        let query = self.model.embed(query).await?;
        let vectors = self.tool_vectors(tools).await?;
        let mut scored: Vec<(f32, &Arc<Tool>)> = vectors
            .iter()
            .zip(tools)
            .map(|(vector, tool)| (cosine_similarity(&query, vector), tool))
            .filter(|(score, _)| *score > 0.0)
            .collect();
        scored.sort_by(|(a, _), (b, _)| b.partial_cmp(a).unwrap_or(Ordering::Equal));
        Ok(scored
            .into_iter()
            .take(top_k)
            .map(|(_, tool)| Arc::clone(tool))
            .collect())
    }

    /// Embeds every tool, reusing vectors of unchanged tool texts.
    async fn tool_vectors(&self, tools: &[Arc<Tool>]) -> EmbeddingResult<Vec<Arc<[f32]>>> {
        let texts: Vec<String> = tools.iter().map(|tool| embedding_text(tool)).collect();
        let missing: Vec<String> = {
            let cached = self.vectors.lock().unwrap_or_else(PoisonError::into_inner);
            let mut seen = HashSet::new();
            texts
                .iter()
                .filter(|text| !cached.contains_key(*text) && seen.insert(*text))
                .cloned()
                .collect()
        };

        let fresh = if missing.is_empty() {
            Vec::new()
        } else {
            self.model.embed_batch(&missing).await?
        };
        if fresh.len() != missing.len() {
            return Err(EmbeddingError::BatchSize {
                expected: missing.len(),
                actual: fresh.len(),
            });
        }

        let mut cached = self.vectors.lock().unwrap_or_else(PoisonError::into_inner);
        for (text, vector) in missing.into_iter().zip(fresh) {
            cached.insert(text, Arc::from(vector));
        }
        let live: HashSet<&String> = texts.iter().collect();
        cached.retain(|text, _| live.contains(text));
        texts
            .iter()
            .map(|text| {
                cached
                    .get(text)
                    .cloned()
                    .ok_or_else(|| EmbeddingError::model("tool vector missing after embedding"))
            })
            .collect()
    }
}

impl std::fmt::Debug for HybridStrategy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HybridStrategy").finish_non_exhaustive()
    }
}

#[async_trait]
impl SearchStrategy for HybridStrategy {
    fn name(&self) -> &'static str {
        "hybrid"
    }

    async fn search(&self, tools: &[Arc<Tool>], query: &str, limit: usize) -> Vec<Arc<Tool>> {
        let (tag_limit, embedding_limit) = if limit == 0 {
            (
                Self::UNLIMITED_TAG_MATCHES,
                Self::UNLIMITED_EMBEDDING_MATCHES,
            )
        } else {
            ((limit / 2).max(1), limit)
        };

        let mut selected = self.tags.search(tools, query, tag_limit).await;
        let nearest = match self.nearest(tools, query, embedding_limit).await {
            Ok(nearest) => nearest,
            Err(err) => {
                warn!(error = %err, "embedding search failed; using tag matches only");
                return selected;
            }
        };

        let mut names: HashSet<String> = selected.iter().map(|t| t.name().to_owned()).collect();
        for tool in nearest {
            if limit != 0 && selected.len() >= limit {
                break;
            }
            if names.insert(tool.name().to_owned()) {
                selected.push(tool);
            }
        }
        selected
    }
}

fn embedding_text(tool: &Tool) -> String {
    format!(
        "{} {} {}",
        tool.name(),
        tool.description(),
        tool.tags().join(" ")
    )
}

fn tag_tokens(tool: &Tool) -> HashSet<String> {
    let mut tokens = HashSet::new();
    for tag in tool.tags() {
        let whole = tag.trim().to_lowercase();
        if !whole.is_empty() {
            tokens.insert(whole);
        }
        tokens.extend(tokenize(tag));
    }
    tokens
}

fn name_segments(tool: &Tool) -> [String; 3] {
    [
        tool.name().to_lowercase(),
        tool.manual().to_lowercase(),
        tool.local_name().to_lowercase(),
    ]
}

/// Lowercased word tokens of `text`, in order of appearance.
pub(crate) fn words(text: &str) -> impl Iterator<Item = String> + '_ {
    WORD.find_iter(text).map(|word| word.as_str().to_lowercase())
}

fn tokenize(text: &str) -> HashSet<String> {
    words(text).collect()
}
