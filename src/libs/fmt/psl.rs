use std::fmt;
use std::io;

use crate::libs::chain::Chain;
use crate::libs::nt;

#[derive(Debug, Clone, Default)]
pub struct Psl {
    pub match_count: u32,
    pub mismatch_count: u32,
    pub rep_match: u32,
    pub n_count: u32,
    pub q_num_insert: u32,
    pub q_base_insert: u64,
    pub t_num_insert: u32,
    pub t_base_insert: u64,
    pub strand: char,
    pub q_name: String,
    pub q_size: u64,
    pub q_start: u64,
    pub q_end: u64,
    pub t_name: String,
    pub t_size: u64,
    pub t_start: u64,
    pub t_end: u64,
    pub block_count: u32,
    pub block_sizes: Vec<u64>,
    pub q_starts: Vec<u64>,
    pub t_starts: Vec<u64>,
}

impl Psl {
    /// Counts bases of every block. Matches where either side is soft-masked
    /// are repeat matches; pairs with an N count as N.
    ///
    /// Block query starts stay on the aligned strand, the overall query range
    /// is on the plus strand.
    pub fn from_chain(chain: &Chain, t_seq: &[u8], q_seq: &[u8]) -> Self {
        let h = &chain.header;
        let mut psl = Psl {
            strand: h.q_strand,
            q_name: h.q_name.clone(),
            q_size: h.q_size,
            t_name: h.t_name.clone(),
            t_size: h.t_size,
            t_start: h.t_start,
            t_end: h.t_end,
            block_count: chain.blocks.len() as u32,
            ..Default::default()
        };
        if h.q_strand == '-' {
            psl.q_start = h.q_size - h.q_end;
            psl.q_end = h.q_size - h.q_start;
        } else {
            psl.q_start = h.q_start;
            psl.q_end = h.q_end;
        }

        for (i, b) in chain.blocks.iter().enumerate() {
            psl.block_sizes.push(b.size());
            psl.q_starts.push(b.q_start);
            psl.t_starts.push(b.t_start);

            let t = &t_seq[b.t_start as usize..b.t_end as usize];
            let q = &q_seq[b.q_start as usize..b.q_end as usize];
            for (&tb, &qb) in t.iter().zip(q) {
                if nt::is_n(tb) || nt::is_n(qb) {
                    psl.n_count += 1;
                } else if tb.to_ascii_uppercase() == qb.to_ascii_uppercase() {
                    if nt::is_lower(tb) || nt::is_lower(qb) {
                        psl.rep_match += 1;
                    } else {
                        psl.match_count += 1;
                    }
                } else {
                    psl.mismatch_count += 1;
                }
            }

            if let Some(next) = chain.blocks.get(i + 1) {
                let dq = next.q_start - b.q_end;
                let dt = next.t_start - b.t_end;
                if dq > 0 {
                    psl.q_num_insert += 1;
                    psl.q_base_insert += dq;
                }
                if dt > 0 {
                    psl.t_num_insert += 1;
                    psl.t_base_insert += dt;
                }
            }
        }
        psl
    }

    pub fn write_to<W: io::Write + ?Sized>(&self, w: &mut W) -> io::Result<()> {
        write!(
            w,
            "{}\t{}\t{}\t{}\t{}\t{}\t{}\t{}\t{}\t{}\t{}\t{}\t{}\t{}\t{}\t{}\t{}\t{}\t",
            self.match_count,
            self.mismatch_count,
            self.rep_match,
            self.n_count,
            self.q_num_insert,
            self.q_base_insert,
            self.t_num_insert,
            self.t_base_insert,
            self.strand,
            self.q_name,
            self.q_size,
            self.q_start,
            self.q_end,
            self.t_name,
            self.t_size,
            self.t_start,
            self.t_end,
            self.block_count
        )?;

        for s in &self.block_sizes {
            write!(w, "{},", s)?;
        }
        write!(w, "\t")?;
        for s in &self.q_starts {
            write!(w, "{},", s)?;
        }
        write!(w, "\t")?;
        for s in &self.t_starts {
            write!(w, "{},", s)?;
        }

        writeln!(w)?;
        Ok(())
    }
}

impl fmt::Display for Psl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut buf = Vec::new();
        self.write_to(&mut buf).map_err(|_| fmt::Error)?;
        let s = String::from_utf8_lossy(&buf);
        write!(f, "{}", s.trim_end())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::libs::fmt::tests::two_block_chain;

    #[test]
    fn psl_from_chain() {
        let (chain, t, q) = two_block_chain();
        let psl = Psl::from_chain(&chain, &t, &q);
        let expected = "16\t1\t0\t0\t0\t0\t1\t3\t+\tread\t17\t0\t17\tchr1\t20\t0\t20\t2\t8,9,\t0,8,\t0,11,";
        assert_eq!(format!("{}", psl), expected);
    }

    #[test]
    fn minus_strand_range_is_flipped() {
        let (mut chain, t, q) = two_block_chain();
        chain.header.q_strand = '-';
        chain.header.q_size = 30;
        let psl = Psl::from_chain(&chain, &t, &q);
        assert_eq!((psl.q_start, psl.q_end), (13, 30));
        assert_eq!(psl.q_starts, vec![0, 8]);
    }

    #[test]
    fn soft_masked_matches() {
        let (chain, t, mut q) = two_block_chain();
        q[0] = b'a';
        q[1] = b'N';
        let psl = Psl::from_chain(&chain, &t, &q);
        assert_eq!(psl.match_count, 14);
        assert_eq!(psl.rep_match, 1);
        assert_eq!(psl.n_count, 1);
    }
}
