//! Checksum-verifiable identifier generation
//!
//! An identifier is 25 base-32 digits: one check digit followed by a 12 digit
//! area code and a 12 digit sequence inside that area. The check digit is the
//! sum of the 24 payload digits modulo 32, so any single corrupted digit is
//! detected. It is not a cryptographic signature.
//!
//! Temporary identifiers (`t_<n>`) stand in for entities that have not been
//! persisted yet. They contain a character outside the base-32 alphabet and
//! can never be mistaken for a real identifier.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{LazyLock, Mutex, PoisonError};
use thiserror::Error;
use tracing::{debug, warn};

/// Base of every digit in an identifier
pub const RADIX: u32 = 32;

/// Digits in the area part and in the sequence part
pub const DIGITS: usize = 12;

/// Total identifier length including the check digit
pub const ID_LEN: usize = 1 + DIGITS * 2;

/// Prefix of process-local temporary identifiers
pub const TEMP_PREFIX: &str = "t_";

/// Number of sequence values available in one area (32^12)
const SEQUENCE_LIMIT: u64 = 1 << 60;

const ALPHABET: &[u8; 32] = b"0123456789abcdefghijklmnopqrstuv";

/// Identifier errors
#[derive(Error, Debug, PartialEq)]
pub enum IdError {
    #[error("Invalid id area {0:?}: expected 12 base-32 digits")]
    InvalidArea(String),
}

pub type IdResult<T> = Result<T, IdError>;

/// Allocates area codes for an [`IdMaker`]
///
/// A new area is requested once at construction and every time the sequence
/// of the current area is exhausted.
pub trait IdAreaMaker: Send {
    fn next_area(&mut self) -> String;
}

/// In-memory area allocator counting up from a starting area
#[derive(Debug, Default)]
pub struct SequentialAreaMaker {
    next: u64,
}

impl SequentialAreaMaker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn starting_at(area: u64) -> Self {
        Self { next: area }
    }
}

impl IdAreaMaker for SequentialAreaMaker {
    fn next_area(&mut self) -> String {
        let area = encode(self.next);
        self.next += 1;
        area
    }
}

struct SequenceState {
    area_maker: Box<dyn IdAreaMaker>,
    area: String,
    sequence: u64,
}

/// Generator of unique, checksum-verifiable identifiers
///
/// `next` is serialized on an internal mutex so concurrent callers never
/// receive the same identifier and never skip one. `effective` is a pure
/// function and takes no lock.
pub struct IdMaker {
    state: Mutex<SequenceState>,
    temp_sequence: AtomicU64,
}

impl IdMaker {
    /// Create a generator backed by a [`SequentialAreaMaker`]
    pub fn new() -> Self {
        let mut area_maker = SequentialAreaMaker::new();
        let area = area_maker.next_area();
        Self::from_parts(Box::new(area_maker), area)
    }

    /// Create a generator that draws its areas from `area_maker`
    pub fn with_area_maker(mut area_maker: Box<dyn IdAreaMaker>) -> IdResult<Self> {
        let area = checked_area(area_maker.next_area())?;
        Ok(Self::from_parts(area_maker, area))
    }

    fn from_parts(area_maker: Box<dyn IdAreaMaker>, area: String) -> Self {
        IdMaker {
            state: Mutex::new(SequenceState {
                area_maker,
                area,
                sequence: 0,
            }),
            temp_sequence: AtomicU64::new(0),
        }
    }

    /// Continue the current area from `sequence`
    pub fn starting_at(self, sequence: u64) -> Self {
        self.state
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .sequence = sequence;
        self
    }

    /// Generate the next identifier
    pub fn next(&self) -> IdResult<String> {
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        if state.sequence >= SEQUENCE_LIMIT {
            let area = checked_area(state.area_maker.next_area())?;
            warn!(exhausted = %state.area, next = %area, "id area exhausted, rolling over");
            state.area = area;
            state.sequence = 0;
        }
        let sequence = state.sequence;
        state.sequence += 1;

        let mut payload = String::with_capacity(ID_LEN);
        payload.push_str(&state.area);
        payload.push_str(&encode(sequence));
        drop(state);

        let check = check_digit(&payload).unwrap_or('0');
        let mut id = String::with_capacity(ID_LEN);
        id.push(check);
        id.push_str(&payload);
        Ok(id)
    }

    /// Generate a process-local placeholder identifier
    pub fn temp(&self) -> String {
        format!("{}{}", TEMP_PREFIX, self.temp_sequence.fetch_add(1, Ordering::Relaxed))
    }

    /// Check an identifier's length, alphabet and check digit
    pub fn effective(id: &str) -> bool {
        if id.len() != ID_LEN || !id.is_ascii() {
            return false;
        }
        let (check, payload) = id.split_at(1);
        match check_digit(payload) {
            Some(expected) => check.chars().next() == Some(expected),
            None => {
                debug!(id, "id payload contains a non base-32 digit");
                false
            }
        }
    }
}

impl Default for IdMaker {
    fn default() -> Self {
        Self::new()
    }
}

static GLOBAL: LazyLock<IdMaker> = LazyLock::new(IdMaker::new);

/// Next identifier from the process-wide generator
pub fn next_id() -> IdResult<String> {
    GLOBAL.next()
}

/// Next temporary identifier from the process-wide generator
pub fn temp_id() -> String {
    GLOBAL.temp()
}

/// Whether `id` is a well-formed identifier with a matching check digit
pub fn is_effective_id(id: &str) -> bool {
    IdMaker::effective(id)
}

/// Whether `id` is a temporary placeholder
pub fn is_temp_id(id: &str) -> bool {
    id.strip_prefix(TEMP_PREFIX)
        .is_some_and(|n| !n.is_empty() && n.bytes().all(|b| b.is_ascii_digit()))
}

/// Zero-padded base-32 rendering of `value`
fn encode(value: u64) -> String {
    let mut digits = [b'0'; DIGITS];
    let mut rest = value;
    for slot in digits.iter_mut().rev() {
        *slot = ALPHABET[(rest % RADIX as u64) as usize];
        rest /= RADIX as u64;
    }
    digits.iter().map(|&b| b as char).collect()
}

fn digit_value(c: char) -> Option<u32> {
    match c {
        '0'..='9' => Some(c as u32 - '0' as u32),
        'a'..='v' => Some(c as u32 - 'a' as u32 + 10),
        _ => None,
    }
}

fn check_digit(payload: &str) -> Option<char> {
    if payload.len() != DIGITS * 2 {
        return None;
    }
    let mut sum = 0u32;
    for c in payload.chars() {
        sum += digit_value(c)?;
    }
    Some(ALPHABET[(sum % RADIX) as usize] as char)
}

fn checked_area(area: String) -> IdResult<String> {
    if area.len() == DIGITS && area.chars().all(|c| digit_value(c).is_some()) {
        Ok(area)
    } else {
        Err(IdError::InvalidArea(area))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct FixedAreas(Vec<&'static str>);

    impl IdAreaMaker for FixedAreas {
        fn next_area(&mut self) -> String {
            if self.0.is_empty() {
                "bad".to_string()
            } else {
                self.0.remove(0).to_string()
            }
        }
    }

    #[test]
    fn test_encode_pads_to_twelve_digits() {
        assert_eq!(encode(0), "000000000000");
        assert_eq!(encode(31), "00000000000v");
        assert_eq!(encode(32), "000000000010");
        assert_eq!(encode(SEQUENCE_LIMIT - 1), "vvvvvvvvvvvv");
    }

    #[test]
    fn test_first_id_layout() {
        let maker = IdMaker::new();
        let id = maker.next().unwrap();
        assert_eq!(id, "0000000000000000000000000");
        let id = maker.next().unwrap();
        assert_eq!(id, "1000000000000000000000001");
        assert!(IdMaker::effective(&id));
    }

    #[test]
    fn test_effective_rejects_malformed() {
        assert!(!IdMaker::effective(""));
        assert!(!IdMaker::effective("000000000000000000000000"));
        assert!(!IdMaker::effective("00000000000000000000000000"));
        assert!(!IdMaker::effective("000000000000000000000000w"));
        assert!(!IdMaker::effective("100000000000000000000000A"));
        assert!(!IdMaker::effective("t_1"));
    }

    #[test]
    fn test_single_digit_corruption_detected() {
        let maker = IdMaker::new().starting_at(123_456_789);
        let id = maker.next().unwrap();
        assert!(IdMaker::effective(&id));

        for position in 0..ID_LEN {
            for &replacement in ALPHABET.iter() {
                let mut bytes = id.clone().into_bytes();
                if bytes[position] == replacement {
                    continue;
                }
                bytes[position] = replacement;
                let corrupted = String::from_utf8(bytes).unwrap();
                assert!(!IdMaker::effective(&corrupted), "{corrupted} passed");
            }
        }
    }

    #[test]
    fn test_area_rollover() {
        let maker = IdMaker::with_area_maker(Box::new(FixedAreas(vec![
            "000000000001",
            "000000000002",
        ])))
        .unwrap()
        .starting_at(SEQUENCE_LIMIT - 1);

        let last = maker.next().unwrap();
        assert_eq!(&last[1..13], "000000000001");
        assert_eq!(&last[13..], "vvvvvvvvvvvv");

        let rolled = maker.next().unwrap();
        assert_eq!(&rolled[1..13], "000000000002");
        assert_eq!(&rolled[13..], "000000000000");
        assert!(IdMaker::effective(&rolled));
    }

    #[test]
    fn test_invalid_area_is_reported() {
        let result = IdMaker::with_area_maker(Box::new(FixedAreas(vec![])));
        assert!(matches!(result, Err(IdError::InvalidArea(area)) if area == "bad"));

        let maker = IdMaker::with_area_maker(Box::new(FixedAreas(vec!["000000000009"])))
            .unwrap()
            .starting_at(SEQUENCE_LIMIT);
        assert_eq!(maker.next(), Err(IdError::InvalidArea("bad".to_string())));
    }

    #[test]
    fn test_temp_ids() {
        let maker = IdMaker::new();
        let first = maker.temp();
        let second = maker.temp();
        assert_eq!(first, "t_0");
        assert_eq!(second, "t_1");
        assert!(is_temp_id(&first));
        assert!(!IdMaker::effective(&first));
        assert!(!is_temp_id(&maker.next().unwrap()));
    }
}
