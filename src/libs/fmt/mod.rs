//! Writers for the output formats.

pub mod axt;
pub mod blast;
pub mod maf;
pub mod psl;

use std::io::{self, Write};
use std::sync::Arc;

use fxhash::FxHashMap;

use crate::libs::chain::Chain;
use crate::libs::params::{AlignParams, OutFormat};
use crate::libs::seed::SeedIndex;
use crate::libs::seq::DnaSeq;

/// Gapped alignment text of a chain: each block's bases, then for every
/// gap the target-only bases against '-' followed by the query-only bases.
pub fn chain_symbols(chain: &Chain, t_seq: &[u8], q_seq: &[u8]) -> (Vec<u8>, Vec<u8>) {
    let mut t_sym = vec![];
    let mut q_sym = vec![];
    for (i, b) in chain.blocks.iter().enumerate() {
        if i > 0 {
            let prev = &chain.blocks[i - 1];
            let t_gap = &t_seq[prev.t_end as usize..b.t_start as usize];
            let q_gap = &q_seq[prev.q_end as usize..b.q_start as usize];
            t_sym.extend_from_slice(t_gap);
            q_sym.extend(std::iter::repeat(b'-').take(t_gap.len()));
            t_sym.extend(std::iter::repeat(b'-').take(q_gap.len()));
            q_sym.extend_from_slice(q_gap);
        }
        t_sym.extend_from_slice(&t_seq[b.t_start as usize..b.t_end as usize]);
        q_sym.extend_from_slice(&q_seq[b.q_start as usize..b.q_end as usize]);
    }
    (t_sym, q_sym)
}

/// Writes the chains of each query in the configured format.
///
/// Holds on to the target sequences so gapped formats can show bases, and
/// remembers whether the once-per-output MAF header went out.
pub struct OutputWriter<W: Write> {
    writer: W,
    out: OutFormat,
    maf_t: String,
    maf_q: String,
    database: String,
    targets: FxHashMap<String, Arc<DnaSeq>>,
    header_done: bool,
}

impl<W: Write> OutputWriter<W> {
    pub fn new(writer: W, params: &AlignParams, indexes: &[SeedIndex], database: &str) -> Self {
        let targets = indexes
            .iter()
            .map(|idx| (idx.target.name.clone(), idx.target.clone()))
            .collect();
        Self {
            writer,
            out: params.out,
            maf_t: params.maf_t.clone(),
            maf_q: params.maf_q.clone(),
            database: database.to_string(),
            targets,
            header_done: false,
        }
    }

    pub fn write_query(&mut self, query: &DnaSeq, chains: &[Chain]) -> io::Result<()> {
        if self.out == OutFormat::Maf && !self.header_done {
            maf::MafWriter::new(&mut self.writer).write_header("blastz")?;
            self.header_done = true;
        }
        if self.out == OutFormat::Blast9 {
            blast::write_comment_header(&mut self.writer, &query.name, &self.database)?;
        }

        let minus = if chains.iter().any(|c| c.header.q_strand == '-') {
            Some(query.rev_comp())
        } else {
            None
        };

        for chain in chains {
            if self.out == OutFormat::Chain {
                chain.write(&mut self.writer)?;
                continue;
            }

            let Some(target) = self.targets.get(&chain.header.t_name) else {
                log::warn!("No target sequence named {}", chain.header.t_name);
                continue;
            };
            let q_seq = match (&minus, chain.header.q_strand) {
                (Some(m), '-') => &m.seq,
                _ => &query.seq,
            };

            match self.out {
                OutFormat::Psl => {
                    psl::Psl::from_chain(chain, &target.seq, q_seq).write_to(&mut self.writer)?
                }
                OutFormat::Axt => {
                    axt::write_axt(&mut self.writer, &axt::Axt::from_chain(chain, &target.seq, q_seq))?
                }
                OutFormat::Maf => {
                    let ali = maf::MafAli::from_chain(chain, &target.seq, q_seq, &self.maf_t, &self.maf_q);
                    maf::MafWriter::new(&mut self.writer).write_ali(&ali)?
                }
                OutFormat::Blast8 | OutFormat::Blast9 => {
                    blast::BlastTab::from_chain(chain, &target.seq, q_seq).write_to(&mut self.writer)?
                }
                OutFormat::Chain => {}
            }
        }
        Ok(())
    }

    pub fn flush(&mut self) -> io::Result<()> {
        self.writer.flush()
    }

    pub fn into_inner(self) -> W {
        self.writer
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::libs::chain::{Block, ChainHeader};

    pub(crate) fn two_block_chain() -> (Chain, Vec<u8>, Vec<u8>) {
        let t = b"ACGTACGTAAACCCGGGTTT".to_vec();
        let q = b"ACGTACGTCCCGGCTTT".to_vec();
        let mut chain = Chain {
            header: ChainHeader {
                score: 1200.0,
                t_name: "chr1".into(),
                t_size: t.len() as u64,
                t_strand: '+',
                q_name: "read".into(),
                q_size: q.len() as u64,
                q_strand: '+',
                id: 1,
                ..Default::default()
            },
            blocks: vec![Block::new(0, 0, 8, 0.0), Block::new(11, 8, 9, 0.0)],
        };
        chain.update_bounds();
        (chain, t, q)
    }

    #[test]
    fn symbols_show_gaps() {
        let (chain, t, q) = two_block_chain();
        let (t_sym, q_sym) = chain_symbols(&chain, &t, &q);
        assert_eq!(t_sym, b"ACGTACGTAAACCCGGGTTT".to_vec());
        assert_eq!(q_sym, b"ACGTACGT---CCCGGCTTT".to_vec());
    }

    #[test]
    fn writer_dispatches_format() -> anyhow::Result<()> {
        let (chain, t, q) = two_block_chain();
        let target = Arc::new(DnaSeq::new("chr1", &t));
        let query = DnaSeq::new("read", &q);
        let index = SeedIndex::build(target, 0, 0, 6, 0, false);

        let mut params = AlignParams::default();
        params.apply_option("out", "maf")?;
        let mut w = OutputWriter::new(vec![], &params, &[index], "db");
        w.write_query(&query, &[chain.clone()])?;
        w.write_query(&query, &[chain])?;
        let text = String::from_utf8(w.into_inner())?;

        assert_eq!(text.matches("##maf").count(), 1);
        assert_eq!(text.matches("a score=").count(), 2);
        Ok(())
    }
}
