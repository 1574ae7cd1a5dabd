//! Small sampling helpers over an [`Entropy`] source.

use mimic_core::Entropy;

/// Pick one item with probability proportional to its weight.
///
/// Cumulative weights plus a single uniform draw. Zero total weight
/// degrades to a uniform pick; an empty slice gives `None`.
pub fn weighted_choice<'a, T, E: Entropy + ?Sized>(
    entropy: &mut E,
    items: &'a [(T, u64)],
) -> Option<&'a T> {
    if items.is_empty() {
        return None;
    }
    let total: u64 = items.iter().map(|(_, w)| *w).sum();
    if total == 0 {
        return Some(&items[entropy.below(items.len())].0);
    }

    let target = entropy.next_f64() * total as f64;
    let mut cumulative = 0.0;
    for (item, weight) in items {
        cumulative += *weight as f64;
        if target < cumulative {
            return Some(item);
        }
    }
    items.last().map(|(item, _)| item)
}

/// Uniformly sample `k` items without replacement, keeping their relative order.
pub fn sample_without_replacement<T: Clone, E: Entropy + ?Sized>(
    entropy: &mut E,
    items: &[T],
    k: usize,
) -> Vec<T> {
    let mut pool: Vec<usize> = (0..items.len()).collect();
    let mut picked = Vec::with_capacity(k.min(items.len()));
    while picked.len() < k && !pool.is_empty() {
        picked.push(pool.swap_remove(entropy.below(pool.len())));
    }
    picked.sort_unstable();
    picked.into_iter().map(|i| items[i].clone()).collect()
}
