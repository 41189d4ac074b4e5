//! The string table of the encoder.
//!
//! Strings are interned as `(prefix code, suffix byte)` pairs in an open addressed hash table
//! with linear probing. There is exactly one slot for every code that can be assigned, so the
//! table is full precisely when the code space is exhausted. It is never resized or cleared.
use crate::{Code, DICT_SIZE};

#[derive(Clone, Copy)]
struct Entry {
    /// The code denoting this string, `None` for an unused slot.
    code: Option<Code>,
    /// The code of all but the last byte.
    prefix: Code,
    /// The last byte.
    suffix: u8,
}

/// Result of probing the table for a string.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Slot {
    /// The string is known and denoted by this code.
    Known(Code),
    /// The string is unknown, this slot is reserved for it.
    Vacant(usize),
    /// The string is unknown and every slot is taken.
    Exhausted,
}

pub(crate) struct Dictionary {
    entries: Box<[Entry]>,
    /// For every home slot, the farthest distance an entry hashed to it was placed at.
    reach: Box<[u16]>,
    len: usize,
}

impl Dictionary {
    pub(crate) fn new() -> Self {
        Dictionary {
            entries: vec![Entry::EMPTY; DICT_SIZE].into_boxed_slice(),
            reach: vec![0; DICT_SIZE].into_boxed_slice(),
            len: 0,
        }
    }

    pub(crate) fn reset(&mut self) {
        for entry in self.entries.iter_mut() {
            *entry = Entry::EMPTY;
        }
        for reach in self.reach.iter_mut() {
            *reach = 0;
        }
        self.len = 0;
    }

    /// Find the string `prefix + suffix` or the slot where it belongs.
    ///
    /// The probe sequence starts at `((prefix << 8) | suffix) % DICT_SIZE` and walks upwards,
    /// wrapping around at the end of the table, until it reaches a matching entry, an empty
    /// slot, or its starting point again. Changing this order changes which slot a string
    /// occupies, never which code it gets.
    pub(crate) fn lookup_or_reserve(&self, prefix: Code, suffix: u8) -> Slot {
        let key = Self::key(prefix, suffix);
        let reach = usize::from(self.reach[key]);
        let mut index = key;
        let mut probed = 0;

        loop {
            let entry = &self.entries[index];
            match entry.code {
                None => return Slot::Vacant(index),
                Some(code) if entry.prefix == prefix && entry.suffix == suffix => {
                    return Slot::Known(code)
                }
                Some(_) => {}
            }

            // A full table has no empty slot to stop at, but the string can not be stored
            // farther away from its home slot than any other string with the same key.
            if probed >= reach && self.is_full() {
                return Slot::Exhausted;
            }

            probed += 1;
            index = (index + 1) % DICT_SIZE;
            if index == key {
                return Slot::Exhausted;
            }
        }
    }

    /// Fill a slot previously returned as `Slot::Vacant`.
    pub(crate) fn insert(&mut self, slot: usize, code: Code, prefix: Code, suffix: u8) {
        let entry = &mut self.entries[slot];
        debug_assert!(entry.code.is_none(), "slot {} is taken", slot);
        *entry = Entry {
            code: Some(code),
            prefix,
            suffix,
        };

        let key = Self::key(prefix, suffix);
        let distance = ((slot + DICT_SIZE - key) % DICT_SIZE) as u16;
        self.reach[key] = self.reach[key].max(distance);
        self.len += 1;
    }

    fn key(prefix: Code, suffix: u8) -> usize {
        ((usize::from(prefix) << 8) | usize::from(suffix)) % DICT_SIZE
    }

    pub(crate) fn len(&self) -> usize {
        self.len
    }

    pub(crate) fn is_full(&self) -> bool {
        self.len >= DICT_SIZE
    }
}

impl Entry {
    const EMPTY: Entry = Entry {
        code: None,
        prefix: 0,
        suffix: 0,
    };
}

#[cfg(test)]
mod tests {
    use super::{Dictionary, Slot};
    use crate::{Code, DICT_SIZE, FIRST_CODE};
    use std::collections::HashSet;

    /// Find or learn a string, `Err` tells whether it was learned.
    fn iterate(
        dict: &mut Dictionary,
        prefix: Code,
        suffix: u8,
        next_code: Code,
    ) -> Result<Code, bool> {
        match dict.lookup_or_reserve(prefix, suffix) {
            Slot::Known(code) => Ok(code),
            Slot::Vacant(slot) => {
                dict.insert(slot, next_code, prefix, suffix);
                Err(true)
            }
            Slot::Exhausted => Err(false),
        }
    }

    #[test]
    fn learned_strings_are_found() {
        let mut dict = Dictionary::new();
        assert_eq!(iterate(&mut dict, b'A'.into(), b'B', FIRST_CODE), Err(true));
        assert_eq!(iterate(&mut dict, b'A'.into(), b'B', FIRST_CODE + 1), Ok(FIRST_CODE));
        let key = usize::from(b'B') << 8 | usize::from(b'A');
        assert_eq!(dict.lookup_or_reserve(b'B'.into(), b'A'), Slot::Vacant(key));
        assert_eq!(dict.len(), 1);
    }

    #[test]
    fn colliding_keys_probe_linearly() {
        let mut dict = Dictionary::new();
        // Both keys reduce to the same slot.
        let first = (0x10, 0x20);
        let key = (0x10usize << 8 | 0x20) + DICT_SIZE;
        let second = ((key >> 8) as Code, (key & 0xff) as u8);

        let slot = match dict.lookup_or_reserve(first.0, first.1) {
            Slot::Vacant(slot) => slot,
            other => panic!("unexpected {:?}", other),
        };
        dict.insert(slot, 300, first.0, first.1);
        assert_eq!(dict.lookup_or_reserve(second.0, second.1), Slot::Vacant(slot + 1));
        dict.insert(slot + 1, 301, second.0, second.1);

        assert_eq!(dict.lookup_or_reserve(first.0, first.1), Slot::Known(300));
        assert_eq!(dict.lookup_or_reserve(second.0, second.1), Slot::Known(301));
    }

    #[test]
    fn probing_wraps_around() {
        let mut dict = Dictionary::new();
        let last = DICT_SIZE - 1;
        let prefix = (last >> 8) as Code;
        let suffix = (last & 0xff) as u8;
        dict.insert(last, 300, prefix, suffix);
        assert_eq!(dict.lookup_or_reserve(prefix, suffix), Slot::Known(300));

        let other = last + DICT_SIZE;
        let (oprefix, osuffix) = ((other >> 8) as Code, (other & 0xff) as u8);
        assert_eq!(dict.lookup_or_reserve(oprefix, osuffix), Slot::Vacant(0));
    }

    #[test]
    fn full_table_reports_exhaustion() {
        let mut dict = Dictionary::new();
        let mut next_code = FIRST_CODE;
        let mut prefix: Code = 0;
        'fill: loop {
            for suffix in 0..=255u8 {
                match iterate(&mut dict, prefix, suffix, next_code) {
                    Err(true) => next_code += 1,
                    other => panic!("unexpected {:?} at {}", other, next_code),
                }
                if dict.is_full() {
                    break 'fill;
                }
            }
            prefix += 1;
        }

        assert_eq!(usize::from(next_code), 1 << 15);
        assert_eq!(dict.lookup_or_reserve(prefix + 1, 0), Slot::Exhausted);
        assert_eq!(iterate(&mut dict, prefix + 1, 0, next_code), Err(false));
        assert_eq!(iterate(&mut dict, 0, 0, next_code), Ok(FIRST_CODE));
    }

    #[test]
    fn displaced_strings_are_found_in_a_full_table() {
        let mut dict = Dictionary::new();
        let key = 0x10usize << 8 | 0x20;
        let other = key + DICT_SIZE;
        let (oprefix, osuffix) = ((other >> 8) as Code, (other & 0xff) as u8);
        assert_eq!(iterate(&mut dict, 0x10, 0x20, 300), Err(true));
        assert_eq!(iterate(&mut dict, oprefix, osuffix, 301), Err(true));

        let mut next_code = 302;
        let mut filler = 0usize;
        while !dict.is_full() {
            let prefix = (1000 + filler / 256) as Code;
            let suffix = (filler % 256) as u8;
            filler += 1;
            if let Err(true) = iterate(&mut dict, prefix, suffix, next_code) {
                next_code += 1;
            }
        }

        assert_eq!(dict.lookup_or_reserve(0x10, 0x20), Slot::Known(300));
        assert_eq!(dict.lookup_or_reserve(oprefix, osuffix), Slot::Known(301));
        assert_eq!(dict.lookup_or_reserve(30_000, 7), Slot::Exhausted);
    }

    #[test]
    fn codes_and_strings_stay_unique() {
        let mut dict = Dictionary::new();
        let mut next_code = FIRST_CODE;
        // Pseudo random strings, many of them repeated.
        let mut state = 0x2545_f491u32;
        for _ in 0..20_000 {
            state ^= state << 13;
            state ^= state >> 17;
            state ^= state << 5;
            let prefix = (state % u32::from(next_code)) as Code;
            let suffix = (state >> 24) as u8;
            if let Err(true) = iterate(&mut dict, prefix, suffix, next_code) {
                next_code += 1;
            }
        }

        let live: Vec<_> = dict.entries.iter().filter(|e| e.code.is_some()).collect();
        assert_eq!(live.len(), dict.len());
        assert_eq!(live.len(), usize::from(next_code - FIRST_CODE));
        let codes: HashSet<_> = live.iter().map(|e| e.code).collect();
        let pairs: HashSet<_> = live.iter().map(|e| (e.prefix, e.suffix)).collect();
        assert_eq!(codes.len(), live.len());
        assert_eq!(pairs.len(), live.len());
    }
}
