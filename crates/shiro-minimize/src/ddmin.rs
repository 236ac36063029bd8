//! Generic delta-debugging reduction over a list of items: repeatedly
//! removes chunks of decreasing size, keeping a removal only if the
//! remaining items still reproduce the original failure, over any
//! cloneable item list and an async replay predicate.

use async_trait::async_trait;

/// Replays a candidate subset and reports whether the original failure is
/// still reproduced (`true` means "still fails, keep shrinking").
#[async_trait]
pub trait ReplayTest<T: Send + Sync>: Send {
    async fn test(&mut self, candidate: &[T]) -> bool;
}

pub const INITIAL_GRANULARITY: usize = 2;

/// Reduces `items` to a 1-minimal subset that still reproduces the
/// failure, per Zeller's ddmin: repeatedly try removing each of
/// `granularity` chunks; on any successful removal, restart at the
/// initial granularity; otherwise double it until it exceeds the list
/// length.
pub async fn ddmin<T, P>(items: Vec<T>, predicate: &mut P) -> Vec<T>
where
    T: Clone + Send + Sync,
    P: ReplayTest<T>,
{
    let mut current = items;
    let mut granularity = INITIAL_GRANULARITY;

    'outer: while current.len() > 1 && granularity <= current.len() {
        let chunk_size = current.len().div_ceil(granularity);
        if chunk_size == 0 {
            break;
        }

        let mut chunk_start = 0;
        while chunk_start < current.len() {
            let chunk_end = (chunk_start + chunk_size).min(current.len());

            let mut candidate = Vec::with_capacity(current.len() - (chunk_end - chunk_start));
            candidate.extend_from_slice(&current[..chunk_start]);
            candidate.extend_from_slice(&current[chunk_end..]);

            if predicate.test(&candidate).await {
                current = candidate;
                granularity = INITIAL_GRANULARITY;
                continue 'outer;
            }

            chunk_start = chunk_end;
        }

        if granularity >= current.len() {
            break;
        }
        granularity = (granularity * 2).min(current.len());
    }

    current
}

#[cfg(test)]
mod tests {
    use super::*;

    struct KeepsIfContains(char);

    #[async_trait]
    impl ReplayTest<char> for KeepsIfContains {
        async fn test(&mut self, candidate: &[char]) -> bool {
            candidate.contains(&self.0)
        }
    }

    #[tokio::test]
    async fn reduces_to_the_single_item_the_predicate_needs() {
        let mut predicate = KeepsIfContains('a');
        let result = ddmin(vec!['a', 'b', 'c'], &mut predicate).await;
        assert_eq!(result, vec!['a']);
    }

    #[tokio::test]
    async fn is_idempotent_once_minimal() {
        let mut predicate = KeepsIfContains('a');
        let once = ddmin(vec!['a', 'b', 'c', 'd', 'e'], &mut predicate).await;
        let twice = ddmin(once.clone(), &mut predicate).await;
        assert_eq!(once, twice);
    }

    struct AlwaysFails;

    #[async_trait]
    impl ReplayTest<u32> for AlwaysFails {
        async fn test(&mut self, _candidate: &[u32]) -> bool {
            true
        }
    }

    #[tokio::test]
    async fn shrinks_to_a_single_element_when_anything_reproduces() {
        let mut predicate = AlwaysFails;
        let result = ddmin(vec![1, 2, 3, 4, 5, 6, 7, 8], &mut predicate).await;
        assert_eq!(result.len(), 1);
    }
}
