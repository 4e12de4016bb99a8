use std::sync::Arc;

use super::*;

#[test]
fn adds_sum_and_count_together() {
    let acc = IntegralAccumulator::new(3, 2);
    assert_eq!(acc.len(), 6);
    acc.add(4, 7);
    acc.add(4, -2);
    assert_eq!(acc.sum_at(4), 5);
    assert_eq!(acc.count_at(4), 2);
    assert_eq!(acc.counts(), vec![0, 0, 0, 0, 2, 0]);
    assert!(!acc.overflowed());
}

#[test]
fn overflow_wraps_and_is_flagged() {
    let acc = IntegralAccumulator::new(1, 1);
    acc.add(0, i32::MAX);
    assert!(!acc.overflowed());
    acc.add(0, 1);
    assert!(acc.overflowed());
    assert_eq!(acc.sum_at(0), i32::MIN);
}

#[test]
fn concurrent_adds_are_not_lost() {
    let acc = Arc::new(IntegralAccumulator::new(4, 4));
    let handles: Vec<_> = (0..8)
        .map(|t| {
            let acc = Arc::clone(&acc);
            std::thread::spawn(move || {
                for i in 0..1000 {
                    acc.add(i % 16, if t % 2 == 0 { 1 } else { -1 });
                }
            })
        })
        .collect();
    for h in handles {
        h.join().unwrap();
    }
    assert!(acc.sums().iter().all(|s| *s == 0));
    assert_eq!(acc.counts().iter().map(|c| *c as usize).sum::<usize>(), 8000);
}

#[test]
fn from_raw_checks_lengths() {
    assert!(IntegralAccumulator::from_raw(2, 1, vec![1, 2], vec![1, 1]).is_ok());
    let err = IntegralAccumulator::from_raw(2, 1, vec![1], vec![1, 1]).unwrap_err();
    assert!(err.to_string().starts_with("validation error:"));
}
