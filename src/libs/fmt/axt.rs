use crate::libs::chain::Chain;
use crate::libs::fmt::chain_symbols;

#[derive(Debug, Clone, Default)]
pub struct Axt {
    pub id: u64,
    pub t_name: String,
    pub t_start: u64, // 0-based
    pub t_end: u64,   // 0-based, half-open
    pub q_name: String,
    pub q_start: u64, // on the aligned strand
    pub q_end: u64,
    pub q_strand: char,
    pub score: i64,
    pub t_sym: String,
    pub q_sym: String,
}

impl Axt {
    pub fn from_chain(chain: &Chain, t_seq: &[u8], q_seq: &[u8]) -> Self {
        let h = &chain.header;
        let (t_sym, q_sym) = chain_symbols(chain, t_seq, q_seq);
        Axt {
            id: h.id.saturating_sub(1),
            t_name: h.t_name.clone(),
            t_start: h.t_start,
            t_end: h.t_end,
            q_name: h.q_name.clone(),
            q_start: h.q_start,
            q_end: h.q_end,
            q_strand: h.q_strand,
            score: h.score.round() as i64,
            t_sym: String::from_utf8_lossy(&t_sym).into_owned(),
            q_sym: String::from_utf8_lossy(&q_sym).into_owned(),
        }
    }
}

pub fn write_axt<W: std::io::Write + ?Sized>(writer: &mut W, axt: &Axt) -> std::io::Result<()> {
    // 1-based, closed
    writeln!(
        writer,
        "{} {} {} {} {} {} {} {} {}",
        axt.id,
        axt.t_name,
        axt.t_start + 1,
        axt.t_end,
        axt.q_name,
        axt.q_start + 1,
        axt.q_end,
        axt.q_strand,
        axt.score
    )?;

    writeln!(writer, "{}", axt.t_sym)?;
    writeln!(writer, "{}", axt.q_sym)?;
    writeln!(writer)?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::libs::fmt::tests::two_block_chain;

    #[test]
    fn axt_record() -> std::io::Result<()> {
        let (chain, t, q) = two_block_chain();
        let axt = Axt::from_chain(&chain, &t, &q);
        let mut buf = vec![];
        write_axt(&mut buf, &axt)?;
        assert_eq!(
            String::from_utf8(buf).unwrap(),
            "0 chr1 1 20 read 1 17 + 1200\nACGTACGTAAACCCGGGTTT\nACGTACGT---CCCGGCTTT\n\n"
        );
        Ok(())
    }
}
