// Early-termination rule for the scraper

use crate::config::StoppingConfig;
use crate::models::ContentQuality;

/// Decides from the accepted-source history alone whether more fetching is
/// worthwhile. Scraping stops when any of these holds:
///
/// 1. the number of accepted sources reached `max_sources`
/// 2. at least `min_sources` are accepted and their mean relevance and mean
///    density both exceed the coverage thresholds
/// 3. the last `diminishing_returns_streak` acceptances were all low quality
#[derive(Debug, Clone)]
pub struct StoppingPolicy {
    config: StoppingConfig,
}

/// Why the policy ended a run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    MaxSources,
    Coverage,
    DiminishingReturns,
}

impl StoppingPolicy {
    pub fn new(config: StoppingConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &StoppingConfig {
        &self.config
    }

    pub fn should_continue_scraping(&self, history: &[ContentQuality]) -> bool {
        self.stop_reason(history).is_none()
    }

    pub fn stop_reason(&self, history: &[ContentQuality]) -> Option<StopReason> {
        let cfg = &self.config;

        if history.len() >= cfg.max_sources {
            return Some(StopReason::MaxSources);
        }

        if !history.is_empty() && history.len() >= cfg.min_sources {
            let n = history.len() as f64;
            let mean_relevance = history.iter().map(|q| q.relevance_score).sum::<f64>() / n;
            let mean_density = history.iter().map(|q| q.information_density).sum::<f64>() / n;
            if mean_relevance > cfg.coverage_relevance && mean_density > cfg.coverage_density {
                return Some(StopReason::Coverage);
            }
        }

        let streak = cfg.diminishing_returns_streak;
        if streak > 0
            && history.len() >= streak
            && history[history.len() - streak..]
                .iter()
                .all(|q| q.relevance_score < cfg.low_quality_relevance)
        {
            return Some(StopReason::DiminishingReturns);
        }

        None
    }
}

impl Default for StoppingPolicy {
    fn default() -> Self {
        Self::new(StoppingConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn quality(relevance: f64, density: f64) -> ContentQuality {
        ContentQuality {
            relevance_score: relevance,
            information_density: density,
            content_length: 300,
            ..Default::default()
        }
    }

    #[test]
    fn test_empty_history_continues() {
        assert!(StoppingPolicy::default().should_continue_scraping(&[]));
    }

    #[test]
    fn test_stops_on_coverage() {
        let policy = StoppingPolicy::default();
        let history = vec![quality(0.9, 0.6), quality(0.7, 0.5)];
        assert!(policy.should_continue_scraping(&history));

        let history = vec![quality(0.9, 0.6), quality(0.7, 0.5), quality(0.6, 0.4)];
        assert_eq!(policy.stop_reason(&history), Some(StopReason::Coverage));
    }

    #[test]
    fn test_weak_coverage_keeps_going() {
        let policy = StoppingPolicy::default();
        let history = vec![quality(0.5, 0.6), quality(0.5, 0.6), quality(0.5, 0.6)];
        assert!(policy.should_continue_scraping(&history));
    }

    #[test]
    fn test_coverage_threshold_is_exclusive() {
        let policy = StoppingPolicy::new(StoppingConfig {
            coverage_relevance: 0.5,
            coverage_density: 0.25,
            ..Default::default()
        });
        let at_threshold = vec![quality(0.5, 0.25); 3];
        assert!(policy.should_continue_scraping(&at_threshold));

        let above = vec![quality(0.5, 0.25), quality(0.5, 0.25), quality(0.75, 0.5)];
        assert_eq!(policy.stop_reason(&above), Some(StopReason::Coverage));
        assert_eq!(policy.config().min_sources, 3);
    }

    #[test]
    fn test_stops_on_max_sources() {
        let policy = StoppingPolicy::new(StoppingConfig { max_sources: 4, ..Default::default() });
        let history = vec![quality(0.5, 0.1); 4];
        assert_eq!(policy.stop_reason(&history), Some(StopReason::MaxSources));
    }

    #[test]
    fn test_stops_on_diminishing_returns() {
        let policy = StoppingPolicy::default();
        let history = vec![quality(0.5, 0.2), quality(0.3, 0.2), quality(0.25, 0.2), quality(0.3, 0.2)];
        assert_eq!(policy.stop_reason(&history), Some(StopReason::DiminishingReturns));

        let recovering = vec![quality(0.3, 0.2), quality(0.25, 0.2), quality(0.5, 0.2)];
        assert!(policy.should_continue_scraping(&recovering));
    }

    #[test]
    fn test_is_pure() {
        let policy = StoppingPolicy::default();
        let history = vec![quality(0.9, 0.6), quality(0.7, 0.5), quality(0.6, 0.4)];
        assert_eq!(policy.stop_reason(&history), policy.stop_reason(&history));
    }
}
