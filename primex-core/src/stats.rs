//! Descriptive statistics and shuffling shared by the generator and aggregator.
//!
//! Empty inputs yield `None` rather than a sentinel so callers decide how an
//! undefined value is shown.

use rand::Rng;

pub fn mean(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    Some(values.iter().sum::<f64>() / values.len() as f64)
}

pub fn median(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    let mut sorted = values.to_vec();
    sorted.sort_by(|a, b| a.total_cmp(b));
    let mid = sorted.len() / 2;
    Some(if sorted.len() % 2 == 1 {
        sorted[mid]
    } else {
        (sorted[mid - 1] + sorted[mid]) / 2.0
    })
}

/// Population standard deviation.
pub fn std_dev(values: &[f64]) -> Option<f64> {
    let avg = mean(values)?;
    let var = values.iter().map(|x| (x - avg).powi(2)).sum::<f64>() / values.len() as f64;
    Some(var.sqrt())
}

/// In-place Fisher-Yates shuffle, uniform over all permutations.
pub fn shuffle<T, R: Rng + ?Sized>(items: &mut [T], rng: &mut R) {
    for i in (1..items.len()).rev() {
        let j = rng.random_range(0..=i);
        items.swap(i, j);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    #[test]
    fn central_tendency() {
        let v = [400.0, 500.0, 600.0, 700.0];
        assert_eq!(mean(&v), Some(550.0));
        assert_eq!(median(&v), Some(550.0));
        assert_eq!(median(&[3.0, 1.0, 2.0]), Some(2.0));
    }

    #[test]
    fn std_dev_is_population() {
        let sd = std_dev(&[2.0, 4.0, 4.0, 4.0, 5.0, 5.0, 7.0, 9.0]).unwrap();
        assert!((sd - 2.0).abs() < 1e-12);
    }

    #[test]
    fn empty_inputs_are_undefined() {
        assert_eq!(mean(&[]), None);
        assert_eq!(median(&[]), None);
        assert_eq!(std_dev(&[]), None);
    }

    #[test]
    fn shuffle_keeps_the_multiset() {
        let mut rng = StdRng::seed_from_u64(7);
        let mut items: Vec<u32> = (0..50).collect();
        shuffle(&mut items, &mut rng);
        let mut sorted = items.clone();
        sorted.sort();
        assert_eq!(sorted, (0..50).collect::<Vec<_>>());
    }

    #[test]
    fn shuffle_rarely_returns_identity() {
        let mut rng = StdRng::seed_from_u64(42);
        let identity: Vec<u32> = (0..8).collect();
        let hits = (0..2000)
            .filter(|_| {
                let mut v = identity.clone();
                shuffle(&mut v, &mut rng);
                v == identity
            })
            .count();
        // 8! = 40320 permutations; identity is expected well under once per 2000 draws.
        assert!(hits <= 3, "identity produced {hits} times");
    }

    #[test]
    fn every_position_is_reachable() {
        let mut rng = StdRng::seed_from_u64(3);
        let mut first_seen = [0usize; 4];
        for _ in 0..4000 {
            let mut v = [0usize, 1, 2, 3];
            shuffle(&mut v, &mut rng);
            first_seen[v[0]] += 1;
        }
        for count in first_seen {
            assert!((800..1200).contains(&count), "skewed: {first_seen:?}");
        }
    }
}
