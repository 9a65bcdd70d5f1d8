//! Nucleotide helpers: 2-bit codes, complements and composition entropy.

/// 2-bit code of each base, T=0 C=1 A=2 G=3. A transition (A<->G, C<->T)
/// flips the low bit of the code.
pub const BASE_TO_CODE: [u8; 256] = {
    let mut table = [255u8; 256];
    table[b'T' as usize] = 0;
    table[b'C' as usize] = 1;
    table[b'A' as usize] = 2;
    table[b'G' as usize] = 3;
    table
};

/// Same as [`BASE_TO_CODE`] but soft-masked bases map too.
pub const BASE_TO_CODE_ANY_CASE: [u8; 256] = {
    let mut table = BASE_TO_CODE;
    table[b't' as usize] = 0;
    table[b'c' as usize] = 1;
    table[b'a' as usize] = 2;
    table[b'g' as usize] = 3;
    table
};

pub const CODE_TO_BASE: [u8; 4] = [b'T', b'C', b'A', b'G'];

/// Complement of a base, keeping case. Anything that is not ACGT becomes N/n.
#[inline]
pub fn complement(b: u8) -> u8 {
    match b {
        b'A' => b'T',
        b'T' => b'A',
        b'C' => b'G',
        b'G' => b'C',
        b'a' => b't',
        b't' => b'a',
        b'c' => b'g',
        b'g' => b'c',
        b'a'..=b'z' => b'n',
        _ => b'N',
    }
}

/// ```
/// let rc: Vec<u8> = blatz::libs::nt::rev_comp(b"AAcG").collect();
/// assert_eq!(rc, b"CgTT");
/// ```
pub fn rev_comp(seq: &[u8]) -> impl Iterator<Item = u8> + '_ {
    seq.iter().rev().map(|&b| complement(b))
}

#[inline]
pub fn is_n(b: u8) -> bool {
    BASE_TO_CODE_ANY_CASE[b as usize] == 255
}

#[inline]
pub fn is_lower(b: u8) -> bool {
    b.is_ascii_lowercase()
}

/// Shannon entropy (bits) of the base composition of `seq`. Non-ACGT
/// symbols are ignored.
pub fn entropy(seq: &[u8]) -> f64 {
    let mut counts = [0usize; 4];
    for &b in seq {
        let c = BASE_TO_CODE_ANY_CASE[b as usize];
        if c < 4 {
            counts[c as usize] += 1;
        }
    }
    let total: usize = counts.iter().sum();
    if total == 0 {
        return 0.0;
    }

    let mut h = 0.0;
    for &c in &counts {
        if c > 0 {
            let p = c as f64 / total as f64;
            h -= p * p.log2();
        }
    }
    h
}
