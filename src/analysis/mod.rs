//! Query Analysis
//!
//! Classifies a natural-language query before any network work happens:
//!
//! - **Complexity**: simple / moderate / complex, from structural markers
//! - **Intent**: factual / research / comparison / other, by precedence
//! - **Domain**: first dictionary (in declaration order) with a match
//! - **Expected length**: lookup over (complexity, intent)
//! - **Recency importance**: additive keyword weights capped at 1.0
//!
//! Classification is total. A query that matches nothing is
//! `Moderate / Other / Medium`.

use tracing::debug;

use crate::models::{Domain, QueryAnalysis, QueryComplexity, QueryIntent, SummaryLength};
use crate::utils::text::{self, contains_phrase};

const COMPARISON_MARKERS: &[&str] = &[
    "vs", "versus", "compare", "compared to", "comparing", "comparison", "better than",
    "worse than", "difference between", "differences between", "pros and cons",
];

const RESEARCH_MARKERS: &[&str] = &[
    "latest", "research", "analysis", "study", "studies", "impact of", "effect of",
    "effects of", "evidence", "review", "why does", "how does", "what causes",
    "relationship between", "influence of",
];

const FACTUAL_MARKERS: &[&str] = &["define", "definition of", "meaning of", "who is", "when was", "where is"];

/// Leading phrases of a short factual question
const FACTUAL_FORMS: &[&str] = &[
    "what is", "what are", "who is", "who was", "who are", "when is", "when was", "where is",
    "which is", "define", "definition of", "meaning of",
];

const QUESTION_WORDS: &[&str] = &["what", "who", "when", "where", "which", "why", "how"];

const CONJUNCTIONS: &[&str] = &["and", "or", "but", "while", "whereas", "however"];

const HIGH_RECENCY: &[&str] = &[
    "latest", "current", "breaking", "today", "now", "recent", "new", "update", "live",
];

const MEDIUM_RECENCY: &[&str] = &["this week", "this month", "this year", "trending", "modern"];

const RECENCY_BASELINE: f64 = 0.1;
const MAX_SIMPLE_TOKENS: usize = 6;
const MAX_MODERATE_TOKENS: usize = 12;

/// Domain dictionaries, checked in order
const DOMAINS: &[(Domain, &[&str])] = &[
    (
        Domain::Technology,
        &[
            "software", "programming", "code", "algorithm", "api", "database", "python",
            "javascript", "rust", "react", "node", "docker", "kubernetes", "machine learning",
            "ai", "artificial intelligence", "blockchain", "cybersecurity", "cloud", "aws",
            "azure", "gcp", "devops",
        ],
    ),
    (
        Domain::Health,
        &[
            "medicine", "medical", "health", "disease", "treatment", "symptoms", "doctor",
            "hospital", "therapy", "medication", "diagnosis", "nutrition", "fitness", "wellness",
            "mental health",
        ],
    ),
    (
        Domain::Science,
        &[
            "research", "study", "experiment", "theory", "physics", "chemistry", "biology",
            "mathematics", "statistics", "scientific", "laboratory", "hypothesis",
            "photosynthesis", "climate",
        ],
    ),
    (
        Domain::Business,
        &[
            "company", "business", "market", "finance", "investment", "stock", "economy",
            "revenue", "profit", "startup", "entrepreneur", "management", "strategy",
            "marketing", "sales", "pricing",
        ],
    ),
    (
        Domain::Education,
        &[
            "school", "university", "college", "course", "learning", "student", "teacher",
            "education", "academic", "degree", "curriculum", "training", "certification",
        ],
    ),
];

#[derive(Debug, Clone, Default)]
pub struct QueryAnalyzer;

impl QueryAnalyzer {
    pub fn new() -> Self {
        Self
    }

    pub fn analyze(&self, query: &str) -> QueryAnalysis {
        let tokens = text::tokenize(query);

        let complexity = Self::classify_complexity(query, &tokens);
        let intent = Self::classify_intent(query, &tokens);
        let analysis = QueryAnalysis {
            complexity,
            domain: Self::detect_domain(&tokens),
            intent,
            expected_length: Self::expected_length(complexity, intent),
            recency_importance: Self::recency_importance(&tokens),
            keywords: text::keywords(query),
        };

        debug!(
            query = %query,
            complexity = ?analysis.complexity,
            intent = ?analysis.intent,
            domain = analysis.domain.map(|d| d.as_str()).unwrap_or("general"),
            recency = analysis.recency_importance,
            "Query analyzed"
        );
        analysis
    }

    fn has_any(tokens: &[String], markers: &[&str]) -> bool {
        markers.iter().any(|m| contains_phrase(tokens, m))
    }

    fn count_of(tokens: &[String], words: &[&str]) -> usize {
        tokens.iter().filter(|t| words.contains(&t.as_str())).count()
    }

    fn starts_with_any(tokens: &[String], forms: &[&str]) -> bool {
        forms.iter().any(|form| {
            let words: Vec<&str> = form.split_whitespace().collect();
            tokens.len() >= words.len() && tokens.iter().zip(&words).all(|(t, w)| t == w)
        })
    }

    fn classify_complexity(query: &str, tokens: &[String]) -> QueryComplexity {
        let multi_part = Self::count_of(tokens, QUESTION_WORDS) >= 2
            || Self::count_of(tokens, CONJUNCTIONS) >= 2
            || query.matches('?').count() >= 2;

        if Self::has_any(tokens, COMPARISON_MARKERS) || multi_part || tokens.len() > MAX_MODERATE_TOKENS {
            QueryComplexity::Complex
        } else if tokens.len() <= MAX_SIMPLE_TOKENS && Self::starts_with_any(tokens, FACTUAL_FORMS) {
            QueryComplexity::Simple
        } else {
            QueryComplexity::Moderate
        }
    }

    /// Comparison beats research, research beats factual
    fn classify_intent(query: &str, tokens: &[String]) -> QueryIntent {
        if Self::has_any(tokens, COMPARISON_MARKERS) {
            QueryIntent::Comparison
        } else if Self::has_any(tokens, RESEARCH_MARKERS) {
            QueryIntent::Research
        } else if Self::has_any(tokens, FACTUAL_MARKERS)
            || Self::starts_with_any(tokens, QUESTION_WORDS)
            || query.trim_end().ends_with('?')
        {
            QueryIntent::Factual
        } else {
            QueryIntent::Other
        }
    }

    fn detect_domain(tokens: &[String]) -> Option<Domain> {
        DOMAINS
            .iter()
            .find(|(_, words)| Self::has_any(tokens, words))
            .map(|(domain, _)| *domain)
    }

    pub fn expected_length(complexity: QueryComplexity, intent: QueryIntent) -> SummaryLength {
        use QueryComplexity::*;
        use QueryIntent::*;

        match (complexity, intent) {
            (_, Factual) => SummaryLength::Short,
            (_, Comparison) => SummaryLength::Long,
            (Moderate, Research) => SummaryLength::Medium,
            (_, Research) => SummaryLength::Long,
            (Simple, Other) => SummaryLength::Short,
            (Moderate, Other) => SummaryLength::Medium,
            (Complex, Other) => SummaryLength::Long,
        }
    }

    fn recency_importance(tokens: &[String]) -> f64 {
        let mut score = RECENCY_BASELINE;

        score += 0.3 * Self::count_of(tokens, HIGH_RECENCY) as f64;
        score += 0.2 * MEDIUM_RECENCY.iter().filter(|p| contains_phrase(tokens, p)).count() as f64;
        score += 0.3
            * tokens
                .iter()
                .filter(|t| t.len() == 4 && t.parse::<u32>().is_ok_and(|year| (2020..=2100).contains(&year)))
                .count() as f64;

        score.min(1.0)
    }
}
