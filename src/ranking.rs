use std::collections::HashMap;

use once_cell::sync::Lazy;
use rust_stemmers::{Algorithm, Stemmer};
use tracing::debug;

use crate::errors::EngineFailure;
use crate::models::Persona;
use crate::sections::Section;

static STEMMER: Lazy<Stemmer> = Lazy::new(|| Stemmer::create(Algorithm::English));

const JOB_WEIGHT: f64 = 2.0;
const FOCUS_WEIGHT: f64 = 1.5;
const ROLE_WEIGHT: f64 = 1.0;
const LEXICON_WEIGHT: f64 = 0.75;
const TITLE_WEIGHT: f64 = 2.0;

const STOPWORDS: &[&str] = &[
    "a", "about", "all", "also", "an", "and", "any", "are", "as", "at", "be", "been", "but",
    "by", "can", "do", "does", "each", "for", "from", "get", "has", "have", "how", "i", "if",
    "in", "into", "is", "it", "its", "me", "more", "my", "need", "needs", "no", "not", "of",
    "on", "or", "our", "should", "so", "some", "than", "that", "the", "their", "them", "then",
    "there", "these", "they", "this", "those", "to", "up", "use", "using", "was", "we", "were",
    "what", "when", "which", "who", "will", "with", "would", "you", "your",
];

/// Role-specific vocabulary used to widen the query beyond the words the
/// persona and job literally contain.
const DOMAIN_LEXICON: &[(&str, &[&str])] = &[
    (
        "travel planner",
        &[
            "hotel", "restaurant", "itinerary", "transport", "budget", "beach", "coast", "city",
            "travel", "plan", "friends", "day trip", "accommodation", "sightseeing", "tour",
            "flight", "train", "booking", "reservation", "nightlife",
        ],
    ),
    (
        "hr professional",
        &[
            "form", "fillable", "signature", "compliance", "onboarding", "field", "text box",
            "checkbox", "dropdown", "required", "document", "approval", "electronic", "sign",
            "pdf", "employee", "new hire", "paperwork", "tax form", "contract",
        ],
    ),
    (
        "food contractor",
        &[
            "recipe", "vegetarian", "buffet", "ingredients", "preparation", "gluten-free",
            "menu", "dish", "cooking", "serving", "allergy", "dietary", "vegan", "meal",
            "course", "appetizer", "main course", "dessert", "salad", "soup",
        ],
    ),
    (
        "researcher",
        &[
            "methodology", "method", "dataset", "benchmark", "evaluation", "results",
            "experiment", "baseline", "performance", "literature", "analysis", "metric",
        ],
    ),
    (
        "investment analyst",
        &[
            "revenue", "growth", "market", "profit", "margin", "investment", "strategy",
            "competitive", "earnings", "financial", "trend", "r&d",
        ],
    ),
    (
        "student",
        &[
            "concept", "definition", "mechanism", "example", "principle", "summary", "key",
            "reaction", "theory", "exam",
        ],
    ),
];

/// Lowercased words with surrounding punctuation and stopwords removed.
pub fn tokenize(text: &str) -> Vec<String> {
    text.to_lowercase()
        .split(|c: char| c.is_whitespace() || c == '/' || c == '-')
        .map(|s| s.trim_matches(|c: char| !c.is_alphanumeric()).to_string())
        .filter(|s| s.chars().count() > 1 && !STOPWORDS.contains(&s.as_str()))
        .collect()
}

pub fn stem(word: &str) -> String {
    STEMMER.stem(word).into_owned()
}

fn stems(text: &str) -> Vec<String> {
    tokenize(text).iter().map(|t| stem(t)).collect()
}

/// Weighted stemmed terms describing what the persona is looking for.
#[derive(Debug, Clone, Default)]
pub struct QueryProfile {
    terms: HashMap<String, f64>,
}

impl QueryProfile {
    pub fn from_request(persona: &Persona, job: &str) -> Self {
        let mut profile = Self::default();
        profile.add_text(job, JOB_WEIGHT);
        profile.add_text(&persona.focus, FOCUS_WEIGHT);
        profile.add_text(&persona.role, ROLE_WEIGHT);
        profile.add_text(&persona.expertise, ROLE_WEIGHT);

        let role = persona.role.to_lowercase();
        for (key, keywords) in DOMAIN_LEXICON {
            if role.contains(key) {
                debug!(lexicon = key, "expanding query with role vocabulary");
                for keyword in *keywords {
                    profile.add_text(keyword, LEXICON_WEIGHT);
                }
            }
        }
        profile
    }

    /// Keeps the highest weight a term was given.
    fn add_text(&mut self, text: &str, weight: f64) {
        for term in stems(text) {
            let entry = self.terms.entry(term).or_insert(0.0);
            *entry = entry.max(weight);
        }
    }

    pub fn is_empty(&self) -> bool {
        self.terms.is_empty()
    }

    pub fn weight(&self, word: &str) -> Option<f64> {
        self.terms.get(&stem(&word.to_lowercase())).copied()
    }

    /// Sum over matched terms of `weight * (1 + ln(count))`.
    pub fn score_text(&self, text: &str) -> f64 {
        let mut counts: HashMap<String, usize> = HashMap::new();
        for term in stems(text) {
            if self.terms.contains_key(&term) {
                *counts.entry(term).or_default() += 1;
            }
        }
        counts
            .iter()
            .map(|(term, count)| self.terms[term] * (1.0 + (*count as f64).ln()))
            .sum()
    }

    /// Title matches count extra; long bodies are damped so a section does not
    /// win on length alone.
    pub fn score_section(&self, section: &Section) -> f64 {
        let tokens = tokenize(&section.content).len().max(1) as f64;
        let norm = 1.0 + tokens.ln() / 4.0;
        TITLE_WEIGHT * self.score_text(&section.title) + self.score_text(&section.content) / norm
    }
}

#[derive(Debug, Clone)]
pub struct RankedSection {
    pub rank: u32,
    pub score: f64,
    pub section: Section,
}

/// Scores every section, keeps those with any relevance, and returns the
/// best `limit` with ranks `1..=N`. Ties fall back to document order, then
/// page, then position within the document. When nothing is relevant, every
/// section is kept at score zero so the result still lists them in reading
/// order.
pub fn rank_sections(
    sections: Vec<Section>,
    profile: &QueryProfile,
    limit: usize,
) -> Result<Vec<RankedSection>, EngineFailure> {
    let mut scored = Vec::with_capacity(sections.len());
    for section in sections {
        let score = profile.score_section(&section);
        if !score.is_finite() {
            return Err(EngineFailure::Ranking(format!(
                "non-finite score for '{}' in {}",
                section.title, section.document
            )));
        }
        scored.push((score, section));
    }
    if scored.iter().any(|(score, _)| *score > 0.0) {
        scored.retain(|(score, _)| *score > 0.0);
    } else if !scored.is_empty() {
        debug!(sections = scored.len(), "no section matched the query, keeping reading order");
    }

    scored.sort_by(|(a_score, a), (b_score, b)| {
        b_score
            .total_cmp(a_score)
            .then(a.doc_index.cmp(&b.doc_index))
            .then(a.page_number.cmp(&b.page_number))
            .then(a.position.cmp(&b.position))
    });

    Ok(scored
        .into_iter()
        .take(limit)
        .enumerate()
        .map(|(i, (score, section))| {
            debug!(rank = i + 1, score, title = %section.title, document = %section.document, "ranked section");
            RankedSection {
                rank: (i + 1) as u32,
                score,
                section,
            }
        })
        .collect())
}
