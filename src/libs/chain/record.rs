use std::io::Write;

use crate::libs::chain::algo::ChainItem;

#[derive(Debug, Clone, Default)]
pub struct ChainHeader {
    pub score: f64,
    pub t_name: String,
    pub t_size: u64,
    pub t_strand: char,
    pub t_start: u64,
    pub t_end: u64,
    pub q_name: String,
    pub q_size: u64,
    pub q_strand: char,
    pub q_start: u64,
    pub q_end: u64,
    pub id: u64,
}

/// One line of a chain body: an ungapped block followed by a gap.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChainData {
    pub size: u64,
    pub dt: u64,
    pub dq: u64,
}

/// An ungapped block, half-open, target and query-strand coordinates.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Block {
    pub t_start: u64,
    pub t_end: u64,
    pub q_start: u64,
    pub q_end: u64,
    pub score: f64,
}

impl Block {
    pub fn new(t_start: u64, q_start: u64, size: u64, score: f64) -> Self {
        Self {
            t_start,
            t_end: t_start + size,
            q_start,
            q_end: q_start + size,
            score,
        }
    }

    pub fn size(&self) -> u64 {
        self.t_end - self.t_start
    }

    /// Target minus query start.
    pub fn diagonal(&self) -> i64 {
        self.t_start as i64 - self.q_start as i64
    }
}

impl ChainItem for Block {
    fn q_start(&self) -> u64 {
        self.q_start
    }
    fn q_end(&self) -> u64 {
        self.q_end
    }
    fn t_start(&self) -> u64 {
        self.t_start
    }
    fn t_end(&self) -> u64 {
        self.t_end
    }
    fn score(&self) -> f64 {
        self.score
    }
}

/// A chain of ordered, non-overlapping blocks.
#[derive(Debug, Clone, Default)]
pub struct Chain {
    pub header: ChainHeader,
    pub blocks: Vec<Block>,
}

impl Chain {
    /// Resets the header bounds from the first and last block.
    pub fn update_bounds(&mut self) {
        if let (Some(first), Some(last)) = (self.blocks.first(), self.blocks.last()) {
            self.header.t_start = first.t_start;
            self.header.q_start = first.q_start;
            self.header.t_end = last.t_end;
            self.header.q_end = last.q_end;
        }
    }

    pub fn data(&self) -> Vec<ChainData> {
        let mut data = Vec::with_capacity(self.blocks.len());
        for (i, b) in self.blocks.iter().enumerate() {
            let (dt, dq) = match self.blocks.get(i + 1) {
                Some(next) => (next.t_start - b.t_end, next.q_start - b.q_end),
                None => (0, 0),
            };
            data.push(ChainData {
                size: b.size(),
                dt,
                dq,
            });
        }
        data
    }

    pub fn aligned_bases(&self) -> u64 {
        self.blocks.iter().map(|b| b.size()).sum()
    }

    pub fn write<W: Write + ?Sized>(&self, writer: &mut W) -> std::io::Result<()> {
        let h = &self.header;
        writeln!(
            writer,
            "chain {:.0} {} {} {} {} {} {} {} {} {} {} {}",
            h.score,
            h.t_name,
            h.t_size,
            h.t_strand,
            h.t_start,
            h.t_end,
            h.q_name,
            h.q_size,
            h.q_strand,
            h.q_start,
            h.q_end,
            h.id
        )?;

        let data = self.data();
        let len = data.len();
        for (i, d) in data.iter().enumerate() {
            if i + 1 == len {
                writeln!(writer, "{}", d.size)?;
            } else {
                writeln!(writer, "{}\t{}\t{}", d.size, d.dt, d.dq)?;
            }
        }
        writeln!(writer)?;
        Ok(())
    }
}
