//! Parallel Iteration Helpers
//!
//! For-each, map and reduce over index ranges and slices, built on a
//! shop's `spread_the_sweat`.

use std::sync::{Mutex, PoisonError};

use crate::range::Iterations;
use crate::shop::Shop;

fn iterations_for(len: usize) -> Iterations {
    Iterations::try_from(len).unwrap_or_else(|_| {
        panic!("parallel iteration over {len} items exceeds {} iterations", Iterations::MAX)
    })
}

// ============================================================================
// Parallel For
// ============================================================================

/// Call `f(i)` for every `i` in `0..len` in parallel.
///
/// # Panics
/// If `len` does not fit in [`Iterations`], or if `f` panics.
pub fn parallel_for<S, F>(shop: &S, len: usize, f: F)
where
    S: Shop,
    F: Fn(usize) + Sync,
{
    shop.spread_the_sweat(iterations_for(len), |start, stop| {
        for index in start..stop {
            f(index as usize);
        }
    });
}

// ============================================================================
// Parallel Map
// ============================================================================

/// Map `f` over `items` in parallel. The output keeps the input order.
pub fn parallel_map<S, T, U, F>(shop: &S, items: &[T], f: F) -> Vec<U>
where
    S: Shop,
    T: Sync,
    U: Send,
    F: Fn(&T) -> U + Sync,
{
    let chunks: Mutex<Vec<(usize, Vec<U>)>> = Mutex::new(Vec::new());

    shop.spread_the_sweat(iterations_for(items.len()), |start, stop| {
        let mapped: Vec<U> = items[start as usize..stop as usize].iter().map(&f).collect();
        chunks
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push((start as usize, mapped));
    });

    let mut chunks = chunks.into_inner().unwrap_or_else(PoisonError::into_inner);
    chunks.sort_unstable_by_key(|(start, _)| *start);

    let mut results = Vec::with_capacity(items.len());
    for (_, mapped) in chunks {
        results.extend(mapped);
    }
    results
}

// ============================================================================
// Parallel Reduce
// ============================================================================

/// Fold each worker's share of `items` with `fold`, starting from a clone
/// of `identity`, then combine the partial results in order with `combine`.
pub fn parallel_reduce<S, T, A, Fold, Combine>(
    shop: &S,
    items: &[T],
    identity: A,
    fold: Fold,
    combine: Combine,
) -> A
where
    S: Shop,
    T: Sync,
    A: Clone + Send + Sync,
    Fold: Fn(A, &T) -> A + Sync,
    Combine: Fn(A, A) -> A,
{
    let partials: Mutex<Vec<(usize, A)>> = Mutex::new(Vec::new());

    shop.spread_the_sweat(iterations_for(items.len()), |start, stop| {
        let partial = items[start as usize..stop as usize]
            .iter()
            .fold(identity.clone(), &fold);
        partials
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push((start as usize, partial));
    });

    let mut partials = partials.into_inner().unwrap_or_else(PoisonError::into_inner);
    partials.sort_unstable_by_key(|(start, _)| *start);
    partials
        .into_iter()
        .fold(identity, |acc, (_, partial)| combine(acc, partial))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::DefaultShop;
    use crate::config::ShopConfig;
    use std::sync::atomic::{AtomicI64, AtomicUsize, Ordering};

    fn test_shop() -> DefaultShop {
        DefaultShop::global(ShopConfig::default().with_workers(4))
    }

    #[test]
    fn test_parallel_for() {
        let shop = test_shop();
        let sum = AtomicI64::new(0);
        parallel_for(&shop, 100, |i| {
            sum.fetch_add(i as i64, Ordering::Relaxed);
        });
        assert_eq!(sum.load(Ordering::Relaxed), (0..100).sum::<i64>());
    }

    #[test]
    fn test_parallel_for_empty() {
        let shop = test_shop();
        let calls = AtomicUsize::new(0);
        parallel_for(&shop, 0, |_| {
            calls.fetch_add(1, Ordering::Relaxed);
        });
        assert_eq!(calls.load(Ordering::Relaxed), 0);
    }

    #[test]
    fn test_parallel_map_keeps_order() {
        let shop = test_shop();
        let items: Vec<i32> = (0..1000).collect();
        let results = parallel_map(&shop, &items, |x| x * 2);

        let expected: Vec<i32> = (0..1000).map(|x| x * 2).collect();
        assert_eq!(results, expected);
    }

    #[test]
    fn test_parallel_reduce() {
        let shop = test_shop();
        let items: Vec<u64> = (1..=100).collect();
        let sum = parallel_reduce(&shop, &items, 0u64, |acc, x| acc + x, |a, b| a + b);
        assert_eq!(sum, 5050);
    }

    #[test]
    fn test_parallel_reduce_is_ordered() {
        let shop = test_shop();
        let words = ["a", "b", "c", "d", "e", "f", "g"];
        let joined = parallel_reduce(
            &shop,
            &words,
            String::new(),
            |mut acc, w| {
                acc.push_str(w);
                acc
            },
            |mut a, b| {
                a.push_str(&b);
                a
            },
        );
        assert_eq!(joined, "abcdefg");
    }
}
