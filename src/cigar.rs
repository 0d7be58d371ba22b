//! Projection of a read onto the reference axis.
//!
//! | op          | sequence | reference | projected as        |
//! |-------------|----------|-----------|---------------------|
//! | `M` `=` `X` | yes      | yes       | copied through      |
//! | `I`         | yes      | no        | dropped             |
//! | `D` `N`     | no       | yes       | `N` placeholders    |
//! | `S`         | yes      | no        | dropped             |
//! | `H` `P`     | no       | no        | nothing             |

use noodles::sam::alignment::record::cigar::op::Kind as CigarKind;

/// Base written for every reference position the read itself does not cover.
pub const PLACEHOLDER_BASE: u8 = b'N';

/// Project `seq` onto the reference using `cigar`.
///
/// Copy ops running past the end of `seq` are truncated to the bases that
/// exist. An empty CIGAR gives an empty projection.
pub fn project_sequence(seq: &[u8], cigar: &[(u32, CigarKind)]) -> Vec<u8> {
    let mut projected = Vec::with_capacity(seq.len());
    let mut pos = 0usize;

    for &(len, kind) in cigar {
        let len = len as usize;
        match kind {
            CigarKind::Match | CigarKind::SequenceMatch | CigarKind::SequenceMismatch => {
                let start = pos.min(seq.len());
                let end = pos.saturating_add(len).min(seq.len());
                projected.extend_from_slice(&seq[start..end]);
                pos = pos.saturating_add(len);
            }
            CigarKind::Insertion | CigarKind::SoftClip => {
                pos = pos.saturating_add(len);
            }
            CigarKind::Deletion | CigarKind::Skip => {
                projected.resize(projected.len() + len, PLACEHOLDER_BASE);
            }
            // Hard clips and padding touch neither axis of the projection.
            CigarKind::HardClip | CigarKind::Pad => {}
        }
    }

    projected
}

/// Length of [`project_sequence`] without building the sequence.
pub fn projected_length(seq_len: usize, cigar: &[(u32, CigarKind)]) -> usize {
    let mut len_out = 0usize;
    let mut pos = 0usize;

    for &(len, kind) in cigar {
        let len = len as usize;
        match kind {
            CigarKind::Match | CigarKind::SequenceMatch | CigarKind::SequenceMismatch => {
                let start = pos.min(seq_len);
                let end = pos.saturating_add(len).min(seq_len);
                len_out += end - start;
                pos = pos.saturating_add(len);
            }
            CigarKind::Insertion | CigarKind::SoftClip => {
                pos = pos.saturating_add(len);
            }
            CigarKind::Deletion | CigarKind::Skip => {
                len_out += len;
            }
            CigarKind::HardClip | CigarKind::Pad => {}
        }
    }

    len_out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ops(list: &[(u32, CigarKind)]) -> Vec<(u32, CigarKind)> {
        list.to_vec()
    }

    #[test]
    fn all_match_keeps_read_length() {
        let seq = vec![b'A'; 50];
        let cigar = ops(&[(50, CigarKind::Match)]);
        assert_eq!(projected_length(seq.len(), &cigar), 50);
        assert_eq!(project_sequence(&seq, &cigar), seq);
    }

    #[test]
    fn insertions_and_soft_clips_are_removed() {
        // 3S 10M 2I 10M 5S over 30 bases
        let seq: Vec<u8> = (0..30u8).map(|i| b"ACGT"[(i % 4) as usize]).collect();
        let cigar = ops(&[
            (3, CigarKind::SoftClip),
            (10, CigarKind::Match),
            (2, CigarKind::Insertion),
            (10, CigarKind::Match),
            (5, CigarKind::SoftClip),
        ]);
        assert_eq!(projected_length(seq.len(), &cigar), 30 - 2 - 3 - 5);

        let projected = project_sequence(&seq, &cigar);
        let mut expected = seq[3..13].to_vec();
        expected.extend_from_slice(&seq[15..25]);
        assert_eq!(projected, expected);
    }

    #[test]
    fn deletions_and_skips_become_placeholders() {
        let seq = b"AAAAACCCCC".to_vec();
        let cigar = ops(&[
            (5, CigarKind::Match),
            (2, CigarKind::Deletion),
            (3, CigarKind::Skip),
            (5, CigarKind::SequenceMatch),
        ]);
        assert_eq!(project_sequence(&seq, &cigar), b"AAAAANNNNNCCCCC".to_vec());
        assert_eq!(projected_length(seq.len(), &cigar), 15);
    }

    #[test]
    fn hard_clip_and_pad_are_ignored() {
        let seq = b"ACGTACGT".to_vec();
        let cigar = ops(&[
            (4, CigarKind::HardClip),
            (8, CigarKind::SequenceMismatch),
            (1, CigarKind::Pad),
        ]);
        assert_eq!(projected_length(seq.len(), &cigar), 8);
    }

    #[test]
    fn empty_or_fully_clipped_read_projects_to_nothing() {
        assert_eq!(projected_length(0, &[]), 0);
        assert!(project_sequence(b"ACGT", &[]).is_empty());

        let cigar = ops(&[(4, CigarKind::SoftClip)]);
        assert_eq!(projected_length(4, &cigar), 0);
    }

    #[test]
    fn match_past_end_of_sequence_is_truncated() {
        // Records without a stored sequence (`*`) still carry a CIGAR.
        let cigar = ops(&[(50, CigarKind::Match), (2, CigarKind::Deletion)]);
        assert_eq!(projected_length(0, &cigar), 2);
        assert_eq!(project_sequence(b"ACG", &cigar), b"ACGNN".to_vec());
    }
}
