use std::collections::HashSet;
use std::sync::Arc;
use std::thread;
use uxdf::id::{is_effective_id, next_id, temp_id, IdMaker, ID_LEN};

const THREADS: usize = 8;
const PER_THREAD: usize = 500;

#[test]
fn test_concurrent_ids_are_distinct_and_effective() {
    let maker = Arc::new(IdMaker::new());
    let handles: Vec<_> = (0..THREADS)
        .map(|_| {
            let maker = Arc::clone(&maker);
            thread::spawn(move || {
                (0..PER_THREAD)
                    .map(|_| maker.next().unwrap())
                    .collect::<Vec<_>>()
            })
        })
        .collect();

    let mut seen = HashSet::new();
    for handle in handles {
        for id in handle.join().unwrap() {
            assert!(is_effective_id(&id), "{id} is not effective");
            assert!(seen.insert(id));
        }
    }
    assert_eq!(seen.len(), THREADS * PER_THREAD);
}

#[test]
fn test_corruption_is_detected() {
    let maker = IdMaker::new().starting_at(987_654);
    for _ in 0..20 {
        let id = maker.next().unwrap();
        assert_eq!(id.len(), ID_LEN);

        // Swap one digit for its neighbour in the alphabet.
        let position = id.len() / 2;
        let mut chars: Vec<char> = id.chars().collect();
        chars[position] = match chars[position] {
            'v' => 'u',
            '9' => 'a',
            c => (c as u8 + 1) as char,
        };
        let corrupted: String = chars.into_iter().collect();
        assert!(!is_effective_id(&corrupted), "{corrupted} passed");
    }
}

#[test]
fn test_global_generator() {
    let a = next_id().unwrap();
    let b = next_id().unwrap();
    assert_ne!(a, b);
    assert!(is_effective_id(&a) && is_effective_id(&b));
    assert!(!is_effective_id(&temp_id()));
}
