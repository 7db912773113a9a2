//! Strategic focus extraction.
//!
//! Two sources of candidate focuses are scored against the same
//! [`NoveltyMemory`]:
//! - taxonomy areas, scored by keyword hits over the unigram/bigram/trigram
//!   set of the cleaned text, each keyword decayed by 0.7 per remembered
//!   quarter that already mentioned it;
//! - emergent phrases, the most frequent bigrams/trigrams that no taxonomy
//!   keyword covers, decayed by 0.5 per remembered quarter.
//!
//! Extraction appends its text to the memory, so results depend on which
//! quarters were processed before. Feed one ticker's quarters in ascending
//! order through one memory.

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet, VecDeque};
use tracing::debug;

use crate::transcriptparser::Utterance;

const TAXONOMY_DECAY: f64 = 0.7;
const EMERGENT_DECAY: f64 = 0.5;
const EMERGENT_POOL: usize = 30;
const EMERGENT_MIN_COUNT: usize = 3;
const EMERGENT_MIN_SCORE: f64 = 1.0;
const MIN_TOKEN_CHARS: usize = 3;

/// Generic earnings-call vocabulary that says nothing about strategy.
const FINANCIAL_STOPWORDS: &[&str] = &[
    "quarter", "year", "fiscal", "revenue", "growth", "percent", "earnings",
    "call", "company", "business", "million", "billion", "dollar", "dollars",
    "thank", "thanks", "question", "questions", "answer", "answers", "please",
    "good", "great", "morning", "afternoon", "evening", "today", "welcome",
    "next", "previous", "increase", "decrease", "higher", "lower", "strong",
    "guidance", "outlook", "forecast", "estimate", "target", "targets",
    "result", "results", "performance", "report", "reported", "reporting",
    "financial", "operationally", "operational", "operations", "operating",
    "margin", "margins", "profit", "profitability", "cost", "costs", "expense", "expenses",
    "share", "shares", "shareholder", "shareholders", "stock", "value", "price",
    "cash", "flow", "balance", "sheet", "asset", "assets", "liability", "liabilities",
    "income", "statement", "equity", "capital", "investment", "investments",
    "first", "second", "third", "fourth", "q1", "q2", "q3", "q4",
    "january", "february", "march", "april", "may", "june", "july", "august",
    "september", "october", "november", "december",
];

// English function words of three or more letters; shorter tokens are
// dropped by length anyway.
const ENGLISH_STOPWORDS: &[&str] = &[
    "myself", "our", "ours", "ourselves", "you", "you're", "you've", "you'll",
    "you'd", "your", "yours", "yourself", "yourselves", "him", "his", "himself",
    "she", "she's", "her", "hers", "herself", "it's", "its", "itself", "they",
    "them", "their", "theirs", "themselves", "what", "which", "who", "whom",
    "this", "that", "that'll", "these", "those", "are", "was", "were", "been",
    "being", "have", "has", "had", "having", "does", "did", "doing", "the",
    "and", "but", "because", "until", "while", "for", "with", "about",
    "against", "between", "into", "through", "during", "before", "after",
    "above", "below", "from", "down", "out", "off", "over", "under", "again",
    "further", "then", "once", "here", "there", "when", "where", "why", "how",
    "all", "any", "both", "each", "few", "more", "most", "other", "some",
    "such", "nor", "not", "only", "own", "same", "than", "too", "very", "can",
    "will", "just", "don", "don't", "should", "should've", "now", "ain",
    "aren", "aren't", "couldn", "couldn't", "didn", "didn't", "doesn",
    "doesn't", "hadn", "hadn't", "hasn", "hasn't", "haven", "haven't", "isn",
    "isn't", "mightn", "mightn't", "mustn", "mustn't", "needn", "needn't",
    "shan", "shan't", "shouldn", "shouldn't", "wasn", "wasn't", "weren",
    "weren't", "won", "won't", "wouldn", "wouldn't",
];

/// A named strategic area and the phrases that signal it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FocusArea {
    pub name: String,
    pub keywords: Vec<String>,
}

impl FocusArea {
    pub fn new(name: &str, keywords: &[&str]) -> Self {
        Self {
            name: name.to_string(),
            keywords: keywords.iter().map(|k| k.to_lowercase()).collect(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Taxonomy {
    pub areas: Vec<FocusArea>,
}

impl Taxonomy {
    pub fn new(areas: Vec<FocusArea>) -> Self {
        Self { areas }
    }

    /// Areas tracked for an accelerated-computing / semiconductor issuer.
    pub fn accelerated_computing() -> Self {
        Self::new(vec![
            FocusArea::new("AI", &["ai", "artificial intelligence", "machine learning", "deep learning", "neural network"]),
            FocusArea::new("Data Center", &["data center", "datacenter", "cloud", "server", "enterprise"]),
            FocusArea::new("Gaming", &["gaming", "game", "rtx", "geforce", "console"]),
            FocusArea::new("Automotive", &["automotive", "autonomous", "self-driving", "car", "vehicle"]),
            FocusArea::new("Networking", &["networking", "network", "ethernet", "spectrum", "infiniband"]),
            FocusArea::new("Generative AI", &["generative ai", "llm", "large language model", "chatgpt", "transformer"]),
            FocusArea::new("Inference", &["inference", "inferencing", "deploy", "deployment"]),
            FocusArea::new("Training", &["training", "train", "model training"]),
            FocusArea::new("Software", &["software", "platform", "ecosystem", "developer", "cuda"]),
            FocusArea::new("Hardware", &["hardware", "chip", "gpu", "processor", "semiconductor"]),
            FocusArea::new("Blackwell", &["blackwell", "b200", "gb200"]),
            FocusArea::new("Hopper", &["hopper", "h100", "h200"]),
            FocusArea::new("Healthcare", &["healthcare", "medical", "hospital", "patient", "clinical"]),
            FocusArea::new("Robotics", &["robotics", "robot", "automation"]),
            FocusArea::new("Sovereign AI", &["sovereign ai", "national ai", "country ai"]),
            FocusArea::new("Enterprise AI", &["enterprise ai", "business ai", "corporate ai"]),
            FocusArea::new("Supply Chain", &["supply chain", "inventory", "production", "manufacturing"]),
            FocusArea::new("Revenue Growth", &["revenue growth", "sales growth", "growing revenue"]),
            FocusArea::new("Partnerships", &["partnership", "collaborate", "alliance", "ecosystem"]),
            FocusArea::new("International", &["international", "global", "worldwide", "region", "country"]),
            FocusArea::new("China", &["china", "chinese", "asia", "export control"]),
            FocusArea::new("Research", &["research", "r&d", "innovation", "development"]),
            FocusArea::new("Competition", &["competition", "competitive", "competitor", "market share"]),
            FocusArea::new("Sustainability", &["sustainability", "sustainable", "green", "energy efficiency"]),
            FocusArea::new("Metaverse", &["metaverse", "virtual reality", "vr", "ar", "xr", "omniverse"]),
        ])
    }

    /// True when some keyword of some area occurs inside `phrase`.
    pub fn covers(&self, phrase: &str) -> bool {
        self.areas
            .iter()
            .flat_map(|area| area.keywords.iter())
            .any(|keyword| phrase.contains(keyword.as_str()))
    }
}

impl Default for Taxonomy {
    fn default() -> Self {
        Self::accelerated_computing()
    }
}

#[derive(Debug, Clone)]
struct MemoryEntry {
    text: String,
    lowered: String,
}

/// Rolling window over the most recent quarters' text for one ticker.
#[derive(Debug, Clone)]
pub struct NoveltyMemory {
    depth: usize,
    entries: VecDeque<MemoryEntry>,
}

impl NoveltyMemory {
    pub const DEFAULT_DEPTH: usize = 3;

    pub fn new(depth: usize) -> Self {
        Self {
            depth: depth.max(1),
            entries: VecDeque::with_capacity(depth.max(1) + 1),
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Oldest first.
    pub fn texts(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|e| e.text.as_str())
    }

    pub fn remember(&mut self, text: impl Into<String>) {
        let text = text.into();
        let lowered = text.to_lowercase();
        self.entries.push_back(MemoryEntry { text, lowered });
        while self.entries.len() > self.depth {
            self.entries.pop_front();
        }
    }

    /// Number of remembered quarters whose text contains `term`.
    pub fn prior_matches(&self, term: &str) -> usize {
        let term = term.to_lowercase();
        self.entries
            .iter()
            .filter(|e| e.lowered.contains(term.as_str()))
            .count()
    }
}

impl Default for NoveltyMemory {
    fn default() -> Self {
        Self::new(Self::DEFAULT_DEPTH)
    }
}

/// A ranked focus candidate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FocusScore {
    pub label: String,
    /// Novelty-weighted score used for ranking.
    pub score: f64,
    /// Raw occurrence count before weighting.
    pub mentions: usize,
    pub emergent: bool,
}

/// Weight of `count` occurrences already seen in `prior` remembered quarters.
pub fn novelty_weight(count: usize, prior: usize, decay: f64) -> f64 {
    count as f64 * decay.powi(prior as i32)
}

/// Lower-case, strip punctuation, and drop stopwords and short tokens.
#[derive(Debug, Clone)]
pub struct TextCleaner {
    punctuation: Regex,
    stopwords: HashSet<&'static str>,
}

impl TextCleaner {
    pub fn new() -> Self {
        Self {
            punctuation: Regex::new(r"[^\w\s]").expect("punctuation pattern compiles"),
            stopwords: ENGLISH_STOPWORDS
                .iter()
                .chain(FINANCIAL_STOPWORDS)
                .copied()
                .collect(),
        }
    }

    pub fn tokens(&self, text: &str) -> Vec<String> {
        let lowered = text.to_lowercase();
        let stripped = self.punctuation.replace_all(&lowered, " ");
        stripped
            .split_whitespace()
            .filter(|t| t.chars().count() >= MIN_TOKEN_CHARS && !self.stopwords.contains(t))
            .map(str::to_string)
            .collect()
    }
}

impl Default for TextCleaner {
    fn default() -> Self {
        Self::new()
    }
}

pub fn ngrams(tokens: &[String], n: usize) -> Vec<String> {
    if n == 0 || tokens.len() < n {
        return Vec::new();
    }
    tokens.windows(n).map(|w| w.join(" ")).collect()
}

/// Phrase counts ordered by count, then by first appearance.
fn most_common(phrases: &[String], limit: usize) -> Vec<(&str, usize)> {
    let mut counts: HashMap<&str, (usize, usize)> = HashMap::new();
    for (index, phrase) in phrases.iter().enumerate() {
        counts.entry(phrase.as_str()).or_insert((0, index)).0 += 1;
    }
    let mut ranked: Vec<(&str, usize, usize)> = counts
        .into_iter()
        .map(|(phrase, (count, first))| (phrase, count, first))
        .collect();
    ranked.sort_by(|a, b| b.1.cmp(&a.1).then(a.2.cmp(&b.2)));
    ranked
        .into_iter()
        .take(limit)
        .map(|(phrase, count, _)| (phrase, count))
        .collect()
}

fn title_case(phrase: &str) -> String {
    phrase
        .split_whitespace()
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars).collect(),
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

#[derive(Debug, Clone)]
pub struct FocusExtractor {
    taxonomy: Taxonomy,
    cleaner: TextCleaner,
    top_n: usize,
}

impl FocusExtractor {
    pub fn new(taxonomy: Taxonomy, top_n: usize) -> Self {
        Self {
            taxonomy,
            cleaner: TextCleaner::new(),
            top_n,
        }
    }

    /// Rank focuses for one quarter's utterances and remember the quarter's
    /// text. Operator turns are ignored.
    pub fn extract<'a, I>(&self, utterances: I, memory: &mut NoveltyMemory) -> Vec<FocusScore>
    where
        I: IntoIterator<Item = &'a Utterance>,
    {
        let text = utterances
            .into_iter()
            .filter(|u| !u.is_operator())
            .map(|u| u.text.as_str())
            .collect::<Vec<_>>()
            .join(" ");

        let ranked = self.score_text(&text, memory);
        memory.remember(text);
        ranked
    }

    /// Score `text` against `memory` without updating it.
    pub fn score_text(&self, text: &str, memory: &NoveltyMemory) -> Vec<FocusScore> {
        let tokens = self.cleaner.tokens(text);
        let bigrams = ngrams(&tokens, 2);
        let trigrams = ngrams(&tokens, 3);

        let mut ranked = self.taxonomy_scores(&tokens, &bigrams, &trigrams, memory);
        ranked.extend(self.emergent_scores(&bigrams, &trigrams, memory));

        // stable: equal scores keep taxonomy order, then emergent order
        ranked.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(std::cmp::Ordering::Equal));
        ranked.truncate(self.top_n);

        debug!(
            tokens = tokens.len(),
            remembered = memory.len(),
            focuses = ?ranked.iter().map(|f| f.label.as_str()).collect::<Vec<_>>(),
            "scored strategic focuses"
        );
        ranked
    }

    fn taxonomy_scores(
        &self,
        unigrams: &[String],
        bigrams: &[String],
        trigrams: &[String],
        memory: &NoveltyMemory,
    ) -> Vec<FocusScore> {
        let grams: Vec<&str> = unigrams
            .iter()
            .chain(bigrams)
            .chain(trigrams)
            .map(String::as_str)
            .collect();

        let mut scores = Vec::new();
        for area in &self.taxonomy.areas {
            let mut mentions = 0;
            let mut score = 0.0;
            for keyword in &area.keywords {
                let hits = grams.iter().filter(|g| g.contains(keyword.as_str())).count();
                if hits == 0 {
                    continue;
                }
                mentions += hits;
                score += novelty_weight(hits, memory.prior_matches(keyword), TAXONOMY_DECAY);
            }
            if score > 0.0 {
                scores.push(FocusScore {
                    label: area.name.clone(),
                    score,
                    mentions,
                    emergent: false,
                });
            }
        }
        scores
    }

    fn emergent_scores(
        &self,
        bigrams: &[String],
        trigrams: &[String],
        memory: &NoveltyMemory,
    ) -> Vec<FocusScore> {
        let phrases: Vec<String> = bigrams.iter().chain(trigrams).cloned().collect();

        most_common(&phrases, EMERGENT_POOL)
            .into_iter()
            .filter(|(phrase, count)| *count >= EMERGENT_MIN_COUNT && !self.taxonomy.covers(phrase))
            .filter_map(|(phrase, count)| {
                let score = novelty_weight(count, memory.prior_matches(phrase), EMERGENT_DECAY);
                (score > EMERGENT_MIN_SCORE).then(|| FocusScore {
                    label: title_case(phrase),
                    score,
                    mentions: count,
                    emergent: true,
                })
            })
            .collect()
    }
}

impl Default for FocusExtractor {
    fn default() -> Self {
        Self::new(Taxonomy::default(), 5)
    }
}
