//! Paging through fetched route candidates.

use log::{info, warn};

use crate::error::Result;
use crate::routing::{RouteCandidateFetcher, RouteProvider};
use crate::{Coordinate, RouteCandidate};

/// Holds the current candidate set and the index of the one shown.
///
/// `next` and `previous` clamp at both ends; there is no wraparound.
#[derive(Debug, Clone, Default)]
pub struct RouteSelector {
    candidates: Vec<RouteCandidate>,
    index: usize,
}

impl RouteSelector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_candidates(candidates: Vec<RouteCandidate>) -> Self {
        Self {
            candidates,
            index: 0,
        }
    }

    /// Replace the candidate set and reset the index to the first candidate.
    pub fn set_candidates(&mut self, candidates: Vec<RouteCandidate>) {
        self.candidates = candidates;
        self.index = 0;
    }

    pub fn clear(&mut self) {
        self.candidates.clear();
        self.index = 0;
    }

    /// Move to the next candidate, staying on the last one.
    pub fn next(&mut self) -> Option<&RouteCandidate> {
        if self.index + 1 < self.candidates.len() {
            self.index += 1;
        }
        self.current()
    }

    /// Move to the previous candidate, staying on the first one.
    pub fn previous(&mut self) -> Option<&RouteCandidate> {
        self.index = self.index.saturating_sub(1);
        self.current()
    }

    pub fn current(&self) -> Option<&RouteCandidate> {
        self.candidates.get(self.index)
    }

    pub fn index(&self) -> usize {
        self.index
    }

    pub fn len(&self) -> usize {
        self.candidates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.candidates.is_empty()
    }

    pub fn has_next(&self) -> bool {
        self.index + 1 < self.candidates.len()
    }

    pub fn has_previous(&self) -> bool {
        self.index > 0
    }

    pub fn candidates(&self) -> &[RouteCandidate] {
        &self.candidates
    }

    /// Re-fetch candidates for a new start point.
    ///
    /// The candidate set is only replaced when the whole batch succeeds;
    /// on failure the previous set and index are kept.
    pub async fn refresh<P: RouteProvider>(
        &mut self,
        fetcher: &RouteCandidateFetcher<P>,
        start: Coordinate,
        target_distance_km: f64,
        variation_seeds: &[u32],
    ) -> Result<usize> {
        match fetcher.fetch(start, target_distance_km, variation_seeds).await {
            Ok(candidates) => {
                info!("[RouteSelector] Showing {} candidates", candidates.len());
                self.set_candidates(candidates);
                Ok(self.len())
            }
            Err(e) => {
                warn!(
                    "[RouteSelector] Refresh failed, keeping {} previous candidates: {}",
                    self.len(),
                    e
                );
                Err(e)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::RunaRouteError;

    fn candidate(km: f64) -> RouteCandidate {
        let start = Coordinate::new(55.6761, 12.5683);
        RouteCandidate::new(vec![start, Coordinate::new(55.68, 12.57), start], km)
    }

    struct FixedProvider {
        fail: bool,
    }

    impl RouteProvider for FixedProvider {
        async fn fetch_round_trip(
            &self,
            _start: Coordinate,
            target_distance_km: f64,
            seed: u32,
        ) -> Result<RouteCandidate> {
            if self.fail {
                Err(RunaRouteError::route_fetch("offline", None))
            } else {
                Ok(candidate(target_distance_km + seed as f64))
            }
        }
    }

    #[test]
    fn test_empty_selector() {
        let mut selector = RouteSelector::new();
        assert!(selector.is_empty());
        assert!(selector.current().is_none());
        assert!(selector.next().is_none());
        assert!(selector.previous().is_none());
        assert_eq!(selector.index(), 0);
    }

    #[test]
    fn test_clamps_at_both_ends() {
        let mut selector =
            RouteSelector::with_candidates(vec![candidate(1.0), candidate(2.0), candidate(3.0)]);

        assert!(!selector.has_previous());
        selector.previous();
        assert_eq!(selector.index(), 0);

        selector.next();
        selector.next();
        assert_eq!(selector.index(), 2);
        assert!(!selector.has_next());
        let last = selector.next().unwrap();
        assert_eq!(last.distance_km, 3.0);
        assert_eq!(selector.index(), 2);

        selector.previous();
        assert_eq!(selector.current().unwrap().distance_km, 2.0);
    }

    #[test]
    fn test_replace_resets_index() {
        let mut selector = RouteSelector::with_candidates(vec![candidate(1.0), candidate(2.0)]);
        selector.next();
        assert_eq!(selector.index(), 1);

        selector.set_candidates(vec![candidate(7.0)]);
        assert_eq!(selector.index(), 0);
        assert_eq!(selector.current().unwrap().distance_km, 7.0);

        selector.clear();
        assert!(selector.is_empty());
        assert!(selector.current().is_none());
    }

    #[tokio::test]
    async fn test_refresh_replaces_on_success() {
        let mut selector = RouteSelector::with_candidates(vec![candidate(1.0), candidate(2.0)]);
        selector.next();

        let fetcher = RouteCandidateFetcher::new(FixedProvider { fail: false });
        let count = selector
            .refresh(&fetcher, Coordinate::new(55.6761, 12.5683), 5.0, &[1, 2])
            .await
            .unwrap();

        assert_eq!(count, 2);
        assert_eq!(selector.index(), 0);
        assert_eq!(selector.current().unwrap().distance_km, 6.0);
    }

    #[tokio::test]
    async fn test_refresh_keeps_previous_on_failure() {
        let mut selector = RouteSelector::with_candidates(vec![candidate(1.0), candidate(2.0)]);
        selector.next();

        let fetcher = RouteCandidateFetcher::new(FixedProvider { fail: true });
        let err = selector
            .refresh(&fetcher, Coordinate::new(55.6761, 12.5683), 5.0, &[1, 2])
            .await
            .unwrap_err();

        assert!(matches!(err, RunaRouteError::RouteFetchFailed { .. }));
        assert_eq!(selector.len(), 2);
        assert_eq!(selector.index(), 1);
    }
}
