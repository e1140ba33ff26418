use std::collections::{BTreeMap, BTreeSet};

/// UTF-8 byte length of a single code point.
///
/// Uses the range formula rather than `char::len_utf8` so the boundary
/// values stay visible: `< 0x80` is 1 byte, `< 0x800` is 2, the rest of the
/// basic plane is 3, supplementary-plane code points are 4. The upstream
/// annotation producer counts a lone surrogate as 3 bytes; a Rust `char`
/// cannot hold one, so that case is unrepresentable here and the two
/// formulas agree on every valid code point.
pub fn utf8_len(c: char) -> usize {
    let cp = c as u32;
    if cp < 0x80 {
        1
    } else if cp < 0x800 {
        2
    } else if cp < 0x10000 {
        3
    } else {
        4
    }
}

/// UTF-16 code-unit width of a single code point (1, or 2 for
/// supplementary-plane code points that encode as a surrogate pair).
pub fn utf16_len(c: char) -> usize {
    c.len_utf16()
}

/// Maps UTF-8 byte offsets into `text` to UTF-16 code-unit indices.
///
/// The renderer indexes strings in UTF-16 code units while the annotation
/// pipeline emits UTF-8 byte offsets, so every annotation range has to be
/// remapped before it can be displayed. Offsets need not be sorted or
/// unique; duplicates collapse to one entry. Offsets that fall inside a
/// code point or beyond the end of `text` are simply absent from the
/// result. An offset equal to the total byte length resolves to the total
/// UTF-16 length (the end of text is a valid code-point boundary).
///
/// An offset inside a code point stays the smallest pending target for the
/// rest of the walk, so it also keeps every later target unresolved. Such
/// offsets only come from a producer whose byte accounting is already
/// wrong, in which case the later offsets cannot be trusted either; the
/// caller treats unresolved ranges as deferred, never as errors.
///
/// Walks `text` exactly once and stops as soon as all targets are
/// resolved, so batching offsets into one call is cheaper than per-range
/// calls on a growing message.
pub fn remap_offsets(text: &str, byte_offsets: &[u64]) -> BTreeMap<u64, usize> {
    let mut targets: BTreeSet<u64> = byte_offsets.iter().copied().collect();
    let mut resolved = BTreeMap::new();

    let mut byte_pos: u64 = 0;
    let mut utf16_pos: usize = 0;

    for c in text.chars() {
        match targets.first() {
            None => return resolved,
            Some(&next) if next == byte_pos => {
                resolved.insert(next, utf16_pos);
                targets.pop_first();
                if targets.is_empty() {
                    return resolved;
                }
            }
            _ => {}
        }
        byte_pos += utf8_len(c) as u64;
        utf16_pos += utf16_len(c);
    }

    // End-of-text boundary.
    if targets.first() == Some(&byte_pos) {
        resolved.insert(byte_pos, utf16_pos);
    }

    resolved
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_utf8_len_widths() {
        assert_eq!(utf8_len('a'), 1);
        assert_eq!(utf8_len('é'), 2);
        assert_eq!(utf8_len('你'), 3);
        assert_eq!(utf8_len('😀'), 4);
    }

    #[test]
    fn test_utf16_len_surrogate_pair() {
        assert_eq!(utf16_len('a'), 1);
        assert_eq!(utf16_len('你'), 1);
        assert_eq!(utf16_len('😀'), 2);
    }

    #[test]
    fn test_remap_ascii_identity() {
        let map = remap_offsets("doubao test", &[0, 6]);
        assert_eq!(map.get(&0), Some(&0));
        assert_eq!(map.get(&6), Some(&6));
    }

    #[test]
    fn test_remap_cjk() {
        // "你好" is 6 UTF-8 bytes but 2 UTF-16 code units.
        let map = remap_offsets("你好doubao", &[0, 6]);
        assert_eq!(map.get(&0), Some(&0));
        assert_eq!(map.get(&6), Some(&2));
    }

    #[test]
    fn test_remap_emoji_counts_four_bytes_two_units() {
        // "😀" = 4 bytes, 2 code units; "b" starts at byte 5, unit 3.
        let map = remap_offsets("a😀b", &[1, 5]);
        assert_eq!(map.get(&1), Some(&1));
        assert_eq!(map.get(&5), Some(&3));
    }

    #[test]
    fn test_remap_never_splits_surrogate_pair() {
        // Bytes 2..4 land inside the emoji: no mapping for them.
        let map = remap_offsets("a😀b", &[2, 3, 4]);
        assert!(map.is_empty());
    }

    #[test]
    fn test_remap_mid_code_point_offset_blocks_later_targets() {
        // Byte 2 is inside the emoji; byte 5 is a valid boundary ("b"),
        // but stays behind the unresolvable smaller target.
        let map = remap_offsets("a😀b", &[2, 5]);
        assert!(map.is_empty());
    }

    #[test]
    fn test_remap_end_boundary_resolves() {
        let map = remap_offsets("你好", &[6]);
        assert_eq!(map.get(&6), Some(&2));
    }

    #[test]
    fn test_remap_beyond_end_is_absent() {
        let map = remap_offsets("hi", &[0, 7]);
        assert_eq!(map.get(&0), Some(&0));
        assert_eq!(map.get(&7), None);
    }

    #[test]
    fn test_remap_unsorted_duplicates() {
        let map = remap_offsets("hello", &[3, 0, 3, 1]);
        assert_eq!(map.len(), 3);
        assert_eq!(map.get(&1), Some(&1));
        assert_eq!(map.get(&3), Some(&3));
    }

    #[test]
    fn test_remap_idempotent() {
        let offsets = [0, 3, 6, 9];
        let text = "你好 world";
        assert_eq!(remap_offsets(text, &offsets), remap_offsets(text, &offsets));
    }

    #[test]
    fn test_remap_prefix_byte_length_property() {
        let text = "ab你好😀cd";
        let mut boundary = 0u64;
        let mut boundaries = vec![0u64];
        for c in text.chars() {
            boundary += utf8_len(c) as u64;
            boundaries.push(boundary);
        }
        let map = remap_offsets(text, &boundaries);
        for b in boundaries {
            let idx = map[&b];
            // Encoding the first `idx` UTF-16 units back to UTF-8 yields `b` bytes.
            let units: Vec<u16> = text.encode_utf16().take(idx).collect();
            let prefix = String::from_utf16(&units).unwrap();
            assert_eq!(prefix.len() as u64, b);
        }
    }
}
