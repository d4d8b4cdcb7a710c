//! Keyword relevance check run before the agent loop.
//!
//! This is a cost-saving heuristic, not a correctness boundary: it only lets
//! the loop skip a model round trip for prompts that mention nothing from the
//! domain vocabulary. Any prompt with at least one hit goes to the model,
//! which remains the authority on relevance.

use std::collections::HashSet;

use regex::Regex;

/// Result of the relevance check.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Relevance {
    pub relevant: bool,
    /// How sure the heuristic is about `relevant`, in `0.0..=1.0`.
    pub confidence: f32,
}

#[derive(Debug, Clone)]
pub struct RelevanceFilter {
    /// `None` when there are no keywords; nothing is relevant then.
    pattern: Option<Regex>,
}

impl RelevanceFilter {
    /// Build a case-insensitive substring matcher over `keywords`.
    pub fn new(keywords: &[&str]) -> Result<Self, regex::Error> {
        let alternation = keywords
            .iter()
            .filter(|k| !k.is_empty())
            .map(|k| regex::escape(k))
            .collect::<Vec<_>>()
            .join("|");
        if alternation.is_empty() {
            return Ok(Self { pattern: None });
        }
        Ok(Self {
            pattern: Some(Regex::new(&format!("(?i)(?:{})", alternation))?),
        })
    }

    pub fn check(&self, prompt: &str) -> Relevance {
        let hits: HashSet<String> = match &self.pattern {
            Some(pattern) => pattern
                .find_iter(prompt)
                .map(|m| m.as_str().to_lowercase())
                .collect(),
            None => HashSet::new(),
        };

        match hits.len() {
            0 => Relevance {
                relevant: false,
                confidence: 0.7,
            },
            1 => Relevance {
                relevant: true,
                confidence: 0.6,
            },
            2 => Relevance {
                relevant: true,
                confidence: 0.8,
            },
            _ => Relevance {
                relevant: true,
                confidence: 0.95,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agent::domain::DomainProfile;

    fn weather() -> RelevanceFilter {
        RelevanceFilter::new(DomainProfile::weather().keywords).unwrap()
    }

    #[test]
    fn off_topic_prompt_is_rejected() {
        let r = weather().check("What is 2+2?");
        assert!(!r.relevant);
        assert!(r.confidence > 0.5);
    }

    #[test]
    fn hits_raise_confidence() {
        let f = weather();
        let one = f.check("Weather in Mumbai");
        let many = f.check("Is it hot and humid in Mumbai? What's the AQI?");
        assert!(one.relevant && many.relevant);
        assert!(many.confidence > one.confidence);
    }

    #[test]
    fn matching_is_case_insensitive_and_keyword_safe() {
        let f = RelevanceFilter::new(&["c++", "air quality"]).unwrap();
        assert!(f.check("AIR QUALITY today").relevant);
        assert!(f.check("learning C++").relevant);
        assert!(!f.check("learning C").relevant);
    }

    #[test]
    fn empty_keyword_list_matches_nothing() {
        let f = RelevanceFilter::new(&[]).unwrap();
        assert!(!f.check("anything at all").relevant);
    }
}
