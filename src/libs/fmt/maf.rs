use std::io::{self, Write};

use crate::libs::chain::Chain;
use crate::libs::fmt::chain_symbols;

#[derive(Debug, Clone, Default)]
pub struct MafComp {
    pub src: String,
    pub start: u64,
    pub size: u64,
    pub strand: char,
    pub src_size: u64,
    pub text: String,
}

#[derive(Debug, Clone, Default)]
pub struct MafAli {
    pub score: f64,
    pub components: Vec<MafComp>,
}

impl MafAli {
    /// Target then query component; `t_prefix`/`q_prefix` are put in front
    /// of the sequence names.
    pub fn from_chain(
        chain: &Chain,
        t_seq: &[u8],
        q_seq: &[u8],
        t_prefix: &str,
        q_prefix: &str,
    ) -> Self {
        let h = &chain.header;
        let (t_sym, q_sym) = chain_symbols(chain, t_seq, q_seq);
        MafAli {
            score: h.score,
            components: vec![
                MafComp {
                    src: format!("{}{}", t_prefix, h.t_name),
                    start: h.t_start,
                    size: h.t_end - h.t_start,
                    strand: '+',
                    src_size: h.t_size,
                    text: String::from_utf8_lossy(&t_sym).into_owned(),
                },
                MafComp {
                    src: format!("{}{}", q_prefix, h.q_name),
                    start: h.q_start,
                    size: h.q_end - h.q_start,
                    strand: h.q_strand,
                    src_size: h.q_size,
                    text: String::from_utf8_lossy(&q_sym).into_owned(),
                },
            ],
        }
    }
}

pub struct MafWriter<W: Write> {
    writer: W,
}

impl<W: Write> MafWriter<W> {
    pub fn new(writer: W) -> Self {
        Self { writer }
    }

    pub fn write_header(&mut self, program: &str) -> io::Result<()> {
        writeln!(self.writer, "##maf version=1 scoring={}", program)
    }

    pub fn write_ali(&mut self, ali: &MafAli) -> io::Result<()> {
        writeln!(self.writer, "a score={:.1}", ali.score)?;
        for comp in &ali.components {
            writeln!(
                self.writer,
                "s {:<20} {:10} {:10} {} {:10} {}",
                comp.src, comp.start, comp.size, comp.strand, comp.src_size, comp.text
            )?;
        }
        writeln!(self.writer)?;
        Ok(())
    }
}
