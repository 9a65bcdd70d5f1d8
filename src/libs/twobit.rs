use anyhow::{anyhow, bail, Result};
use std::io::{Read, Seek, SeekFrom};
use std::ops::Range;

use crate::libs::nt::CODE_TO_BASE;

const TWOBIT_MAGIC: u32 = 0x1A412743;
const TWOBIT_MAGIC_SWAPPED: u32 = 0x4327411A;

/// Reader over a `.2bit` container. The index keeps file order so that
/// sequences come back in the same order they were packed.
#[derive(Debug)]
pub struct TwoBitFile<R> {
    reader: R,
    index: Vec<(String, u64)>,
    is_swapped: bool,
}

/// Sniffs the first four bytes of `path` for the 2bit magic number.
pub fn is_twobit(path: &str) -> bool {
    let mut buf = [0u8; 4];
    match std::fs::File::open(path) {
        Ok(mut file) => {
            if file.read_exact(&mut buf).is_err() {
                return false;
            }
            let magic = u32::from_ne_bytes(buf);
            magic == TWOBIT_MAGIC || magic == TWOBIT_MAGIC_SWAPPED
        }
        Err(_) => false,
    }
}

impl TwoBitFile<std::io::Cursor<Vec<u8>>> {
    pub fn open(path: &str) -> Result<Self> {
        let buf = std::fs::read(path).map_err(|e| anyhow!("could not open {}: {}", path, e))?;
        Self::new(std::io::Cursor::new(buf))
    }
}

impl<R: Read + Seek> TwoBitFile<R> {
    pub fn new(mut reader: R) -> Result<Self> {
        let mut buf = [0u8; 4];
        reader.read_exact(&mut buf)?;
        let is_swapped = match u32::from_ne_bytes(buf) {
            TWOBIT_MAGIC => false,
            TWOBIT_MAGIC_SWAPPED => true,
            magic => bail!("Not a valid 2bit file (magic: {:x})", magic),
        };

        let version = read_u32(&mut reader, is_swapped)?;
        let seq_count = read_u32(&mut reader, is_swapped)?;
        let _reserved = read_u32(&mut reader, is_swapped)?;

        let mut index = Vec::with_capacity(seq_count as usize);
        for _ in 0..seq_count {
            let mut len_buf = [0u8; 1];
            reader.read_exact(&mut len_buf)?;
            let mut name_buf = vec![0u8; len_buf[0] as usize];
            reader.read_exact(&mut name_buf)?;
            let name = String::from_utf8(name_buf)?;

            // version 1 widens offsets to 64 bits
            let offset = if version == 0 {
                read_u32(&mut reader, is_swapped)? as u64
            } else {
                read_u64(&mut reader, is_swapped)?
            };
            index.push((name, offset));
        }

        Ok(Self {
            reader,
            index,
            is_swapped,
        })
    }

    pub fn names(&self) -> Vec<String> {
        self.index.iter().map(|(name, _)| name.clone()).collect()
    }

    fn read_ranges(&mut self) -> Result<Vec<Range<usize>>> {
        let count = read_u32(&mut self.reader, self.is_swapped)? as usize;
        let mut starts = Vec::with_capacity(count);
        for _ in 0..count {
            starts.push(read_u32(&mut self.reader, self.is_swapped)? as usize);
        }
        let mut ranges = Vec::with_capacity(count);
        for start in starts {
            let size = read_u32(&mut self.reader, self.is_swapped)? as usize;
            ranges.push(start..start + size);
        }
        Ok(ranges)
    }

    /// Unpacks a whole sequence. N runs are hard-masked, soft-masked runs
    /// become lowercase unless `no_mask` is set.
    pub fn read_sequence(&mut self, name: &str, no_mask: bool) -> Result<Vec<u8>> {
        let offset = self
            .index
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, o)| *o)
            .ok_or_else(|| anyhow!("Sequence not found: {}", name))?;
        self.reader.seek(SeekFrom::Start(offset))?;

        let dna_size = read_u32(&mut self.reader, self.is_swapped)? as usize;
        let n_ranges = self.read_ranges()?;
        let mask_ranges = self.read_ranges()?;
        let _reserved = read_u32(&mut self.reader, self.is_swapped)?;

        let mut packed = vec![0u8; dna_size.div_ceil(4)];
        self.reader.read_exact(&mut packed)?;

        let mut seq = Vec::with_capacity(dna_size);
        for i in 0..dna_size {
            let shift = 6 - 2 * (i % 4);
            seq.push(CODE_TO_BASE[((packed[i / 4] >> shift) & 3) as usize]);
        }

        for r in n_ranges {
            let end = r.end.min(dna_size);
            if r.start < end {
                seq[r.start..end].fill(b'N');
            }
        }
        if !no_mask {
            for r in mask_ranges {
                let end = r.end.min(dna_size);
                if r.start < end {
                    seq[r.start..end].make_ascii_lowercase();
                }
            }
        }

        Ok(seq)
    }
}

fn read_u32<R: Read>(reader: &mut R, is_swapped: bool) -> Result<u32> {
    let mut buf = [0u8; 4];
    reader.read_exact(&mut buf)?;
    let val = u32::from_ne_bytes(buf);
    Ok(if is_swapped { val.swap_bytes() } else { val })
}

fn read_u64<R: Read>(reader: &mut R, is_swapped: bool) -> Result<u64> {
    let mut buf = [0u8; 8];
    reader.read_exact(&mut buf)?;
    let val = u64::from_ne_bytes(buf);
    Ok(if is_swapped { val.swap_bytes() } else { val })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    // one sequence "TCAGTCAG" with a soft mask over 2..4 and an N at 7
    fn packed_record() -> Vec<u8> {
        let mut data = Vec::new();
        data.extend_from_slice(&TWOBIT_MAGIC.to_ne_bytes());
        data.extend_from_slice(&0u32.to_ne_bytes());
        data.extend_from_slice(&1u32.to_ne_bytes());
        data.extend_from_slice(&0u32.to_ne_bytes());

        data.push(4);
        data.extend_from_slice(b"seq1");
        // header 16 + name 5 + offset 4
        data.extend_from_slice(&25u32.to_ne_bytes());

        data.extend_from_slice(&8u32.to_ne_bytes());
        data.extend_from_slice(&1u32.to_ne_bytes());
        data.extend_from_slice(&7u32.to_ne_bytes());
        data.extend_from_slice(&1u32.to_ne_bytes());
        data.extend_from_slice(&1u32.to_ne_bytes());
        data.extend_from_slice(&2u32.to_ne_bytes());
        data.extend_from_slice(&2u32.to_ne_bytes());
        data.extend_from_slice(&0u32.to_ne_bytes());
        data.push(0x1B);
        data.push(0x1B);
        data
    }

    #[test]
    fn reads_masked_sequence() -> Result<()> {
        let mut tb = TwoBitFile::new(Cursor::new(packed_record()))?;
        assert_eq!(tb.names(), vec!["seq1".to_string()]);
        assert_eq!(tb.read_sequence("seq1", false)?, b"TCagTCAN".to_vec());
        assert_eq!(tb.read_sequence("seq1", true)?, b"TCAGTCAN".to_vec());
        assert!(tb.read_sequence("seq2", true).is_err());
        Ok(())
    }

    #[test]
    fn rejects_bad_magic() {
        let res = TwoBitFile::new(Cursor::new(vec![0u8; 16]));
        assert!(res.is_err());
    }
}
