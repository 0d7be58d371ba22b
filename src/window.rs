//! In-flight mates and singles of one read group.
//!
//! The window only ever holds records of the group currently being read; the
//! grouper flushes it at every group boundary. Proper-pair records are keyed
//! by group plus both mate placements, so the two mates of one template meet
//! under the same key whichever arrives first. Everything else is a single.

use crate::fragment::{Fragment, FragmentKind};
use crate::read_name;
use crate::record::{AlignmentRecord, Strand};
use crate::types::OrderedMap;

/// What happened to a record handed to [`PairWindow::admit`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Admission {
    /// First mate seen under its pair key.
    NewPair,
    /// Filled the second slot of an existing pair key.
    PairCompleted,
    /// Replaced an earlier mate with the same orientation under the same key.
    SlotOverwritten(Strand),
    /// Held as a single-read fragment.
    Single,
    /// Replaced an earlier single with the same key.
    SingleOverwritten,
}

/// Two mate slots, indexed by [`Strand::slot`].
#[derive(Debug, Default, Clone)]
pub struct MateSlots {
    slots: [Option<AlignmentRecord>; 2],
}

impl MateSlots {
    fn put(&mut self, record: AlignmentRecord) -> bool {
        self.slots[record.strand.slot()].replace(record).is_some()
    }

    fn is_complete(&self) -> bool {
        self.slots.iter().all(Option::is_some)
    }

    /// Fragment spanned by both mates, or `None` while a slot is empty.
    pub fn fragment(&self) -> Option<Fragment> {
        let [Some(fwd), Some(rev)] = &self.slots else {
            return None;
        };
        let end = rev.pos + rev.projected_length() as i64;
        Some(Fragment {
            kind: FragmentKind::Paired,
            chrom: fwd.chrom.clone(),
            pos: fwd.pos,
            len: end - fwd.pos,
        })
    }
}

/// Fragments released by [`PairWindow::flush`].
#[derive(Debug, Default, Clone)]
pub struct FlushOutcome {
    /// Singles first, then pairs, each in the order their keys were opened.
    pub fragments: Vec<Fragment>,
    /// Pair keys that never saw their second mate.
    pub dropped_pairs: Vec<String>,
}

impl FlushOutcome {
    pub fn singles(&self) -> usize {
        self.fragments.iter().filter(|f| f.kind == FragmentKind::Single).count()
    }

    pub fn pairs(&self) -> usize {
        self.fragments.len() - self.singles()
    }
}

#[derive(Debug, Default)]
pub struct PairWindow {
    pairs: OrderedMap<String, MateSlots>,
    singles: OrderedMap<String, AlignmentRecord>,
}

/// `chrom+pos` as used inside pair keys.
fn placement(chrom: &str, pos: i64) -> String {
    format!("{}{}", chrom.trim(), pos)
}

/// Key shared by both mates of a proper pair.
///
/// The two placements are ordered as strings, not numerically, which is
/// enough for both mates to agree on the key.
pub fn pair_key(group: &str, record: &AlignmentRecord) -> String {
    let own = placement(&record.chrom, record.pos);
    let mate = placement(record.mate_chrom.as_deref().unwrap_or("*"), record.mate_pos);
    if own < mate {
        format!("{group}:{own}:{mate}")
    } else {
        format!("{group}:{mate}:{own}")
    }
}

/// Key of a single-read fragment: the group, qualified by the mate number
/// when the read name carries one.
pub fn single_key(group: &str, name: &str) -> String {
    match read_name::mate_number(name) {
        Some(mate) => format!("{group}:{mate}"),
        None => group.to_string(),
    }
}

impl PairWindow {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.pairs.is_empty() && self.singles.is_empty()
    }

    /// Number of pair keys plus single keys currently held.
    pub fn len(&self) -> usize {
        self.pairs.len() + self.singles.len()
    }

    /// Classify `record` and hold it under its pair or single key.
    pub fn admit(&mut self, group: &str, record: AlignmentRecord) -> Admission {
        if record.is_proper_pair {
            let strand = record.strand;
            let slots = self.pairs.entry(pair_key(group, &record)).or_default();
            let was_empty = slots.slots.iter().all(Option::is_none);
            if slots.put(record) {
                Admission::SlotOverwritten(strand)
            } else if was_empty {
                Admission::NewPair
            } else {
                Admission::PairCompleted
            }
        } else {
            let key = single_key(group, &record.name);
            match self.singles.insert(key, record) {
                Some(_) => Admission::SingleOverwritten,
                None => Admission::Single,
            }
        }
    }

    /// Release every resolvable fragment and clear the window.
    pub fn flush(&mut self) -> FlushOutcome {
        let mut outcome = FlushOutcome {
            fragments: Vec::with_capacity(self.len()),
            dropped_pairs: Vec::new(),
        };

        for (_, read) in self.singles.drain(..) {
            outcome.fragments.push(Fragment {
                kind: FragmentKind::Single,
                pos: read.pos,
                len: read.projected_length() as i64,
                chrom: read.chrom,
            });
        }

        for (key, slots) in self.pairs.drain(..) {
            match slots.fragment() {
                Some(fragment) => outcome.fragments.push(fragment),
                None => {
                    debug_assert!(!slots.is_complete());
                    outcome.dropped_pairs.push(key);
                }
            }
        }

        outcome
    }
}
