//! NCBI-style tabular output, one line per chain.

use std::io::{self, Write};

use crate::libs::chain::Chain;
use crate::libs::fmt::chain_symbols;

/// Chain score to bits.
const BITS_PER_SCORE: f64 = 0.0205;
/// Search space assumed by the e-value.
const SEARCH_SPACE: f64 = 3.0e9;

#[derive(Debug, Clone, Default)]
pub struct BlastTab {
    pub q_name: String,
    pub t_name: String,
    pub identity: f64,
    pub ali_len: usize,
    pub mismatches: usize,
    pub gap_opens: usize,
    pub q_start: u64, // 1-based, plus strand
    pub q_end: u64,
    pub t_start: u64, // in the order printed
    pub t_end: u64,
    pub e_value: f64,
    pub bits: i64,
}

impl BlastTab {
    pub fn from_chain(chain: &Chain, t_seq: &[u8], q_seq: &[u8]) -> Self {
        let h = &chain.header;
        let (t_sym, q_sym) = chain_symbols(chain, t_seq, q_seq);

        let mut matches = 0;
        let mut gaps = 0;
        let mut gap_opens = 0;
        // which sequence the current gap is in, b't' or b'q'
        let mut gap_side = None;
        for (&t, &q) in t_sym.iter().zip(&q_sym) {
            let side = if t == b'-' {
                Some(b't')
            } else if q == b'-' {
                Some(b'q')
            } else {
                None
            };
            if side.is_some() {
                gaps += 1;
                if side != gap_side {
                    gap_opens += 1;
                }
                gap_side = side;
                continue;
            }
            gap_side = None;
            if t.to_ascii_uppercase() == q.to_ascii_uppercase() {
                matches += 1;
            }
        }
        let ali_len = t_sym.len();

        // target is always on the plus strand, so a minus query reverses it
        let (q_start, q_end, t_start, t_end) = if h.q_strand == '-' {
            (h.q_size - h.q_end + 1, h.q_size - h.q_start, h.t_end, h.t_start + 1)
        } else {
            (h.q_start + 1, h.q_end, h.t_start + 1, h.t_end)
        };

        let raw_bits = h.score * BITS_PER_SCORE;
        BlastTab {
            q_name: h.q_name.clone(),
            t_name: h.t_name.clone(),
            identity: if ali_len > 0 {
                100.0 * matches as f64 / ali_len as f64
            } else {
                0.0
            },
            ali_len,
            mismatches: ali_len - matches - gaps,
            gap_opens,
            q_start,
            q_end,
            t_start,
            t_end,
            e_value: SEARCH_SPACE * (-raw_bits * std::f64::consts::LN_2).exp(),
            bits: raw_bits.round() as i64,
        }
    }

    pub fn write_to<W: Write + ?Sized>(&self, w: &mut W) -> io::Result<()> {
        writeln!(
            w,
            "{}\t{}\t{:.2}\t{}\t{}\t{}\t{}\t{}\t{}\t{}\t{}\t{}.0",
            self.q_name,
            self.t_name,
            self.identity,
            self.ali_len,
            self.mismatches,
            self.gap_opens,
            self.q_start,
            self.q_end,
            self.t_start,
            self.t_end,
            sci(self.e_value),
            self.bits
        )
    }
}

/// `1.2e-05` style: one decimal, signed exponent of at least two digits.
fn sci(v: f64) -> String {
    let s = format!("{:.1e}", v);
    match s.split_once('e') {
        Some((mantissa, exp)) => {
            let (sign, digits) = match exp.strip_prefix('-') {
                Some(d) => ('-', d),
                None => ('+', exp),
            };
            format!("{}e{}{:0>2}", mantissa, sign, digits)
        }
        None => s,
    }
}

/// The comment block blast9 puts before each query's lines.
pub fn write_comment_header<W: Write + ?Sized>(
    w: &mut W,
    query: &str,
    database: &str,
) -> io::Result<()> {
    writeln!(w, "# BLATZ {}", env!("CARGO_PKG_VERSION"))?;
    writeln!(w, "# Query: {}", query)?;
    writeln!(w, "# Database: {}", database)?;
    writeln!(
        w,
        "# Fields: Query id, Subject id, % identity, alignment length, \
         mismatches, gap openings, q. start, q. end, s. start, s. end, \
         e-value, bit score"
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::libs::chain::Block;
    use crate::libs::fmt::tests::two_block_chain;

    #[test]
    fn tabular_line() -> io::Result<()> {
        let (chain, t, q) = two_block_chain();
        let tab = BlastTab::from_chain(&chain, &t, &q);
        let mut buf = vec![];
        tab.write_to(&mut buf)?;
        assert_eq!(
            String::from_utf8(buf).unwrap(),
            "read\tchr1\t80.00\t20\t1\t1\t1\t17\t1\t20\t1.2e+02\t25.0\n"
        );
        Ok(())
    }

    #[test]
    fn double_sided_gap_opens_twice() {
        let (mut chain, t, _) = two_block_chain();
        let q = b"ACGTACGTGGCCCGGCTTT".to_vec();
        chain.blocks[1] = Block::new(11, 10, 9, 0.0);
        chain.header.q_size = q.len() as u64;
        chain.update_bounds();

        let tab = BlastTab::from_chain(&chain, &t, &q);
        assert_eq!(tab.ali_len, 22);
        assert_eq!(tab.gap_opens, 2);
        assert_eq!(tab.mismatches, 1);
    }

    #[test]
    fn minus_strand_coordinates() {
        let (mut chain, t, q) = two_block_chain();
        chain.header.q_strand = '-';
        chain.header.q_size = 30;
        let tab = BlastTab::from_chain(&chain, &t, &q);
        assert_eq!((tab.q_start, tab.q_end), (14, 30));
        assert_eq!((tab.t_start, tab.t_end), (20, 1));
    }

    #[test]
    fn exponent_format() {
        assert_eq!(sci(0.0), "0.0e+00");
        assert_eq!(sci(0.000012), "1.2e-05");
        assert_eq!(sci(117.97), "1.2e+02");
    }

    #[test]
    fn comment_header() -> io::Result<()> {
        let mut buf = vec![];
        write_comment_header(&mut buf, "read", "db.fa")?;
        let text = String::from_utf8(buf).unwrap();
        assert_eq!(text.lines().count(), 4);
        assert!(text.contains("# Query: read\n"));
        assert!(text.contains("# Database: db.fa\n"));
        Ok(())
    }
}
