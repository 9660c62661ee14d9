//! Byte shuffle filter.
//!
//! Transposes a block of `typesize`-byte elements so that byte 0 of every
//! element comes first, then byte 1, and so on. Neighbouring pixels usually
//! share their high bytes, which turns into long runs for the LZ backends.
//! Trailing bytes that do not form a whole element are copied unchanged.

/// Shuffle `src` into `dst` (equal lengths).
pub fn shuffle(src: &[u8], typesize: usize, dst: &mut [u8]) {
    debug_assert_eq!(src.len(), dst.len());
    if typesize <= 1 {
        dst.copy_from_slice(src);
        return;
    }
    let elems = src.len() / typesize;
    for (i, element) in src.chunks_exact(typesize).enumerate() {
        for (b, &byte) in element.iter().enumerate() {
            dst[b * elems + i] = byte;
        }
    }
    let tail = elems * typesize;
    dst[tail..].copy_from_slice(&src[tail..]);
}

/// Inverse of [`shuffle`].
pub fn unshuffle(src: &[u8], typesize: usize, dst: &mut [u8]) {
    debug_assert_eq!(src.len(), dst.len());
    if typesize <= 1 {
        dst.copy_from_slice(src);
        return;
    }
    let elems = src.len() / typesize;
    for (i, element) in dst.chunks_exact_mut(typesize).enumerate() {
        for (b, byte) in element.iter_mut().enumerate() {
            *byte = src[b * elems + i];
        }
    }
    let tail = elems * typesize;
    dst[tail..].copy_from_slice(&src[tail..]);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn groups_bytes_by_significance() {
        let src = [0x01, 0xA0, 0x02, 0xA0, 0x03, 0xA0];
        let mut dst = [0u8; 6];
        shuffle(&src, 2, &mut dst);
        assert_eq!(dst, [0x01, 0x02, 0x03, 0xA0, 0xA0, 0xA0]);

        let mut back = [0u8; 6];
        unshuffle(&dst, 2, &mut back);
        assert_eq!(back, src);
    }

    #[test]
    fn trailing_partial_element_is_kept() {
        let src: Vec<u8> = (0..11).collect();
        let mut dst = vec![0u8; 11];
        shuffle(&src, 4, &mut dst);
        assert_eq!(&dst[8..], &[8, 9, 10]);

        let mut back = vec![0u8; 11];
        unshuffle(&dst, 4, &mut back);
        assert_eq!(back, src);
    }
}
