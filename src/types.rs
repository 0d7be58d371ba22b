/// 0-based position on a reference sequence; `-1` when absent.
pub type RefPos = i64;

// Fast hash sets using AHash instead of the default SipHash.
pub(crate) type HashSet<K> = ahash::HashSet<K>;

// Insertion-ordered maps keep flush output deterministic across runs.
pub(crate) type OrderedMap<K, V> = indexmap::IndexMap<K, V, ahash::RandomState>;
