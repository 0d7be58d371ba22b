//! Read-name parsing: group identity and mate number.
//!
//! A mate-number token is a whitespace or `/` byte followed by `1` or `2`,
//! e.g. `frag/1`, `frag 2:N:0:ACGT`. When a name holds several tokens the
//! last one wins.

use std::borrow::Cow;
use std::fmt;

/// Which read of a template the name says this is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MateNumber {
    One,
    Two,
}

impl MateNumber {
    pub fn as_char(self) -> char {
        match self {
            MateNumber::One => '1',
            MateNumber::Two => '2',
        }
    }
}

impl fmt::Display for MateNumber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_char())
    }
}

fn is_separator(b: u8) -> bool {
    // `\x0b` is whitespace for the purpose of read names but not for
    // `u8::is_ascii_whitespace`.
    b == b'/' || b == b'\x0b' || b.is_ascii_whitespace()
}

/// Byte offset of the last mate-number token and the number it encodes.
fn find_mate_token(name: &str) -> Option<(usize, MateNumber)> {
    let bytes = name.as_bytes();
    (0..bytes.len().saturating_sub(1)).rev().find_map(|i| {
        if !is_separator(bytes[i]) {
            return None;
        }
        match bytes[i + 1] {
            b'1' => Some((i, MateNumber::One)),
            b'2' => Some((i, MateNumber::Two)),
            _ => None,
        }
    })
}

/// Canonical group identity of a read name.
///
/// The mate-number token is removed and whatever follows it is kept, so
/// `frag/1` and `frag/2` both map to `frag`, and `frag 1:N:0` and
/// `frag 2:N:0` both map to `frag:N:0`. Names without a token are returned
/// unchanged.
pub fn group_key(name: &str) -> Cow<'_, str> {
    match find_mate_token(name) {
        Some((i, _)) => {
            let mut key = String::with_capacity(name.len() - 2);
            key.push_str(&name[..i]);
            key.push_str(&name[i + 2..]);
            Cow::Owned(key)
        }
        None => Cow::Borrowed(name),
    }
}

/// Mate number carried in the read name, if any.
pub fn mate_number(name: &str) -> Option<MateNumber> {
    find_mate_token(name).map(|(_, mate)| mate)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn slash_suffix_is_stripped() {
        assert_eq!(group_key("frag42/1"), "frag42");
        assert_eq!(group_key("frag42/2"), "frag42");
        assert_eq!(mate_number("frag42/1"), Some(MateNumber::One));
        assert_eq!(mate_number("frag42/2"), Some(MateNumber::Two));
    }

    #[test]
    fn casava_style_comment_keeps_the_rest() {
        assert_eq!(group_key("M00123:7:000 1:N:0:ACGT"), "M00123:7:000:N:0:ACGT");
        assert_eq!(group_key("M00123:7:000 2:N:0:ACGT"), "M00123:7:000:N:0:ACGT");
        assert_eq!(mate_number("M00123:7:000\t2:N:0"), Some(MateNumber::Two));
    }

    #[test]
    fn plain_name_is_its_own_key() {
        assert!(matches!(group_key("SRR000001.17"), Cow::Borrowed("SRR000001.17")));
        assert_eq!(mate_number("SRR000001.17"), None);
        assert_eq!(group_key(""), "");
        assert_eq!(mate_number("/"), None);
    }

    #[test]
    fn digits_other_than_one_or_two_are_not_tokens() {
        assert_eq!(group_key("frag/3"), "frag/3");
        assert_eq!(mate_number("frag/3"), None);
    }

    #[test]
    fn last_token_wins() {
        // `/1` inside the name, `/2` at the end
        assert_eq!(group_key("run/1x/2"), "run/1x");
        assert_eq!(mate_number("run/1x/2"), Some(MateNumber::Two));
    }

    #[test]
    fn token_may_be_followed_by_more_digits() {
        assert_eq!(group_key("tile/12"), "tile2");
        assert_eq!(mate_number("tile/12"), Some(MateNumber::One));
    }
}
