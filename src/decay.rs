//! Time-decay weighting and rank scoring.
//!
//! An entry's decay weight is a multiplier derived from its age: 1.0 at zero
//! age, falling toward 0 as the entry grows older. A future-dated timestamp
//! yields a weight above 1, boosting the entry until its time arrives. The
//! final rank score combines raw cosine similarity with that weight according
//! to the selected [`ScoringMode`].

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// How entry age maps to a decay weight.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum DecayStrategy {
    /// Weight is always 1.0 — age never affects rank or compaction.
    None,
    /// `weight = exp(-age_seconds / decay_seconds)`.
    #[default]
    Exponential,
}

impl DecayStrategy {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::None => "none",
            Self::Exponential => "exponential",
        }
    }
}

impl std::str::FromStr for DecayStrategy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "none" => Ok(Self::None),
            "exponential" => Ok(Self::Exponential),
            _ => Err(format!("unknown decay strategy: {s}")),
        }
    }
}

/// How similarity and decay weight combine into the final score.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum ScoringMode {
    /// `similarity * weight`.
    #[default]
    Hybrid,
    /// Raw similarity, ignoring age.
    Similarity,
    /// Decay weight alone — newest first regardless of content.
    Recency,
}

impl ScoringMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Hybrid => "hybrid",
            Self::Similarity => "similarity",
            Self::Recency => "recency",
        }
    }
}

impl std::str::FromStr for ScoringMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "hybrid" => Ok(Self::Hybrid),
            "similarity" => Ok(Self::Similarity),
            "recency" => Ok(Self::Recency),
            _ => Err(format!("unknown scoring mode: {s}")),
        }
    }
}

/// Decay weight for an entry with the given RFC 3339 timestamp at `now`.
///
/// A missing or unparseable timestamp yields 1.0 — malformed metadata must
/// not make an entry invisible or evictable.
pub fn decay_weight(
    strategy: DecayStrategy,
    decay_seconds: f64,
    timestamp: Option<&str>,
    now: DateTime<Utc>,
) -> f64 {
    match strategy {
        DecayStrategy::None => 1.0,
        DecayStrategy::Exponential => {
            let Some(ts) = timestamp else { return 1.0 };
            let Ok(parsed) = DateTime::parse_from_rfc3339(ts) else {
                return 1.0;
            };
            let age = (now - parsed.with_timezone(&Utc)).num_milliseconds() as f64 / 1000.0;
            (-age / decay_seconds).exp()
        }
    }
}

/// Final rank score for a candidate.
pub fn score(mode: ScoringMode, similarity: f64, weight: f64) -> f64 {
    match mode {
        ScoringMode::Hybrid => similarity * weight,
        ScoringMode::Similarity => similarity,
        ScoringMode::Recency => weight,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[test]
    fn none_strategy_is_constant() {
        let now = Utc::now();
        let old = (now - Duration::days(365)).to_rfc3339();
        assert_eq!(
            decay_weight(DecayStrategy::None, 60.0, Some(&old), now),
            1.0
        );
    }

    #[test]
    fn exponential_decay_is_monotone_in_age() {
        let now = Utc::now();
        let newer = (now - Duration::seconds(10)).to_rfc3339();
        let older = (now - Duration::seconds(100)).to_rfc3339();

        let w_new = decay_weight(DecayStrategy::Exponential, 60.0, Some(&newer), now);
        let w_old = decay_weight(DecayStrategy::Exponential, 60.0, Some(&older), now);
        assert!(w_old < w_new);
        assert!(w_new <= 1.0);
        assert!(w_old > 0.0);
    }

    #[test]
    fn future_timestamp_weighs_above_one() {
        let now = Utc::now();
        let future = (now + Duration::seconds(120)).to_rfc3339();
        let w = decay_weight(DecayStrategy::Exponential, 60.0, Some(&future), now);
        assert!(w > 1.0);
    }

    #[test]
    fn malformed_timestamp_weighs_one() {
        let now = Utc::now();
        assert_eq!(
            decay_weight(DecayStrategy::Exponential, 60.0, Some("not a date"), now),
            1.0
        );
        assert_eq!(
            decay_weight(DecayStrategy::Exponential, 60.0, None, now),
            1.0
        );
    }

    #[test]
    fn scoring_modes() {
        assert_eq!(score(ScoringMode::Hybrid, 0.8, 0.5), 0.4);
        assert_eq!(score(ScoringMode::Similarity, 0.8, 0.5), 0.8);
        assert_eq!(score(ScoringMode::Recency, 0.8, 0.5), 0.5);
    }

    #[test]
    fn parse_from_str() {
        assert_eq!(
            "exponential".parse::<DecayStrategy>().unwrap(),
            DecayStrategy::Exponential
        );
        assert_eq!("hybrid".parse::<ScoringMode>().unwrap(), ScoringMode::Hybrid);
        assert!("linear".parse::<DecayStrategy>().is_err());
        assert!("bm25".parse::<ScoringMode>().is_err());
    }
}
