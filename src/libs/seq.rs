use crate::libs::nt;
use crate::libs::twobit::{is_twobit, TwoBitFile};

/// A named nucleotide sequence. Case is kept as read so soft-masked
/// (lowercase) regions can be excluded from seeding.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DnaSeq {
    pub name: String,
    pub seq: Vec<u8>,
}

impl DnaSeq {
    pub fn new(name: &str, seq: &[u8]) -> Self {
        Self {
            name: name.to_string(),
            seq: seq.to_vec(),
        }
    }

    pub fn len(&self) -> usize {
        self.seq.len()
    }

    pub fn is_empty(&self) -> bool {
        self.seq.is_empty()
    }

    pub fn rev_comp(&self) -> Self {
        Self {
            name: self.name.clone(),
            seq: nt::rev_comp(&self.seq).collect(),
        }
    }

    /// True when at least one base is an uppercase A, C, G or T.
    pub fn has_upper_acgt(&self) -> bool {
        self.seq
            .iter()
            .any(|&b| nt::BASE_TO_CODE[b as usize] != 255)
    }
}

/// Loads every sequence in a FASTA (plain, gzipped or `stdin`) or 2bit file.
pub fn load_seqs(infile: &str) -> anyhow::Result<Vec<DnaSeq>> {
    let mut seqs = vec![];

    if infile != "stdin" && is_twobit(infile) {
        let mut tb = TwoBitFile::open(infile)?;
        for name in tb.names() {
            let seq = tb.read_sequence(&name, false)?;
            seqs.push(DnaSeq { name, seq });
        }
    } else {
        let reader = crate::reader(infile)?;
        let mut fa_in = noodles_fasta::io::Reader::new(reader);

        for result in fa_in.records() {
            let record = result?;
            let name = String::from_utf8(record.name().into())?;
            let seq = record.sequence().as_ref().to_vec();
            seqs.push(DnaSeq { name, seq });
        }
    }

    log::debug!("Loaded {} sequence(s) from {}", seqs.len(), infile);
    Ok(seqs)
}

/// Lowers a trailing poly-A run to `n` so it neither seeds nor extends.
/// Returns the number of bases masked.
pub fn mask_tail_poly_a(seq: &mut [u8]) -> usize {
    let mut score: i32 = 0;
    let mut best: i32 = 0;
    let mut best_pos = seq.len();

    for i in (0..seq.len()).rev() {
        match seq[i] {
            b'A' | b'a' => score += 1,
            b'N' | b'n' => continue,
            _ => score -= 10,
        }
        if score > best {
            best = score;
            best_pos = i;
        } else if score < best - 10 {
            break;
        }
    }

    if best < 8 {
        return 0;
    }
    seq[best_pos..].fill(b'n');
    seq.len() - best_pos
}
