use anyhow::{bail, Result};
use std::io::BufRead;

/// A DNA substitution matrix indexed by raw bytes (256x256), plus the affine
/// gap costs used by banded extension.
///
/// Upper and lower case of a base score the same; anything against N scores
/// the N penalty.
#[derive(Clone, Debug)]
pub struct SubMatrix {
    matrix: Vec<i32>,
    pub gap_open: i32,
    pub gap_extend: i32,
}

const N_SCORE: i32 = -100;

impl Default for SubMatrix {
    /// +100 match, -100 mismatch.
    fn default() -> Self {
        let mut scores = [[-100; 4]; 4];
        for (i, row) in scores.iter_mut().enumerate() {
            row[i] = 100;
        }
        Self::from_table(b"ACGT", &scores, 400, 30)
    }
}

impl SubMatrix {
    fn from_table(bases: &[u8], scores: &[[i32; 4]; 4], gap_open: i32, gap_extend: i32) -> Self {
        let mut m = vec![N_SCORE; 256 * 256];
        for (i, &b1) in bases.iter().enumerate() {
            for (j, &b2) in bases.iter().enumerate() {
                fill_cases(&mut m, b1, b2, scores[i][j]);
            }
        }
        SubMatrix {
            matrix: m,
            gap_open,
            gap_extend,
        }
    }

    /// Substitution score of two bases.
    #[inline]
    pub fn score(&self, a: u8, b: u8) -> i32 {
        self.matrix[(a as usize) * 256 + (b as usize)]
    }

    /// Sum of scores over an ungapped pair of equal-length slices.
    pub fn score_ungapped(&self, t: &[u8], q: &[u8]) -> i32 {
        t.iter().zip(q).map(|(&a, &b)| self.score(a, b)).sum()
    }

    /// Best possible score of one aligned pair.
    pub fn max_score(&self) -> i32 {
        b"ACGT"
            .iter()
            .map(|&b| self.score(b, b))
            .max()
            .unwrap_or(0)
    }

    /// `hoxd55`, `simple`, or a path to a matrix file.
    pub fn from_name(name: &str) -> Result<Self> {
        match name.to_lowercase().as_str() {
            "hoxd55" => Ok(Self::hoxd55()),
            "simple" => Ok(Self::default()),
            _ => Self::from_file(name),
        }
    }

    /// HoxD55, the cross-species default.
    pub fn hoxd55() -> Self {
        //      A     C     G     T
        let scores = [
            [91, -114, -31, -123],
            [-114, 100, -125, -31],
            [-31, -125, 100, -114],
            [-123, -31, -114, 91],
        ];
        Self::from_table(b"ACGT", &scores, 400, 30)
    }

    /// Loads a BLAST-style matrix: an optional `A C G T` header, four rows
    /// of scores (optionally led by the row base), `#` comments, and
    /// optional `O=<open>` / `E=<extend>` gap costs.
    pub fn from_file(path: &str) -> Result<Self> {
        let reader = crate::reader(path)?;
        let mut bases: Vec<u8> = b"ACGT".to_vec();
        let mut rows: Vec<Vec<i32>> = vec![];
        let mut gap_open = 400;
        let mut gap_extend = 30;

        for line in reader.lines() {
            let line = line?;
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }

            if line.contains('=') {
                for part in line.split(|c: char| c == ',' || c == ' ').filter(|s| !s.is_empty()) {
                    if let Some(v) = part.strip_prefix("O=") {
                        gap_open = v.parse()?;
                    } else if let Some(v) = part.strip_prefix("E=") {
                        gap_extend = v.parse()?;
                    }
                }
                continue;
            }

            let fields: Vec<&str> = line.split_whitespace().collect();
            if rows.is_empty() && fields.iter().all(|f| f.len() == 1 && f.parse::<i32>().is_err()) {
                bases = fields.iter().map(|f| f.as_bytes()[0].to_ascii_uppercase()).collect();
                continue;
            }

            let values: Vec<i32> = fields
                .iter()
                .filter_map(|f| f.parse::<i32>().ok())
                .collect();
            if !values.is_empty() {
                rows.push(values);
            }
        }

        if bases.len() != 4 || rows.len() != 4 || rows.iter().any(|r| r.len() != 4) {
            bail!("{}: expected a 4x4 ACGT matrix", path);
        }

        let mut m = vec![N_SCORE; 256 * 256];
        for (i, &b1) in bases.iter().enumerate() {
            for (j, &b2) in bases.iter().enumerate() {
                fill_cases(&mut m, b1, b2, rows[i][j]);
            }
        }

        Ok(SubMatrix {
            matrix: m,
            gap_open,
            gap_extend,
        })
    }
}

fn fill_cases(m: &mut [i32], b1: u8, b2: u8, score: i32) {
    for r in [b1.to_ascii_uppercase(), b1.to_ascii_lowercase()] {
        for c in [b2.to_ascii_uppercase(), b2.to_ascii_lowercase()] {
            m[(r as usize) * 256 + (c as usize)] = score;
        }
    }
}
