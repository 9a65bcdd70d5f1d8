use anyhow::{bail, Result};

const SMALL_SIZE: usize = 111;
const POSITIONS: [i32; 11] = [1, 2, 3, 11, 111, 2111, 12111, 32111, 72111, 152111, 252111];

/// Costs for one gap kind: a dense table below `SMALL_SIZE`, linear
/// interpolation between the long knots and extrapolation past the last.
#[derive(Clone, Debug)]
struct GapTable {
    small: Vec<i32>,
    long_pos: Vec<i32>,
    long_val: Vec<f64>,
    last_slope: f64,
}

impl GapTable {
    fn new(pos: &[i32], vals: &[f64]) -> Self {
        let small = (0..SMALL_SIZE)
            .map(|i| {
                if i == 0 {
                    0
                } else {
                    interpolate(i as i32, pos, vals) as i32
                }
            })
            .collect();

        let start_long = pos
            .iter()
            .position(|&x| x == SMALL_SIZE as i32)
            .unwrap_or(0);
        let long_pos = pos[start_long..].to_vec();
        let long_val = vals[start_long..].to_vec();

        let n = long_pos.len();
        let last_slope = (long_val[n - 1] - long_val[n - 2]) / (long_pos[n - 1] - long_pos[n - 2]) as f64;

        Self {
            small,
            long_pos,
            long_val,
            last_slope,
        }
    }

    fn cost(&self, size: i32) -> i32 {
        if (size as usize) < SMALL_SIZE {
            return self.small[size as usize];
        }
        let n = self.long_pos.len();
        let last_pos = self.long_pos[n - 1];
        if size >= last_pos {
            (self.long_val[n - 1] + self.last_slope * (size - last_pos) as f64) as i32
        } else {
            interpolate(size, &self.long_pos, &self.long_val) as i32
        }
    }
}

fn interpolate(x: i32, s: &[i32], v: &[f64]) -> f64 {
    for i in 0..s.len() {
        if x == s[i] {
            return v[i];
        } else if x < s[i] {
            if i == 0 {
                return v[0];
            }
            let ds = s[i] - s[i - 1];
            let dv = v[i] - v[i - 1];
            return v[i - 1] + dv * (x - s[i - 1]) as f64 / ds as f64;
        }
    }
    let n = s.len();
    let ds = s[n - 1] - s[n - 2];
    let dv = v[n - 1] - v[n - 2];
    v[n - 2] + dv * (x - s[n - 2]) as f64 / ds as f64
}

/// Gap costs between two chained blocks, separate for gaps only in the
/// query, only in the target, and in both.
#[derive(Clone, Debug)]
pub struct GapCalc {
    q: GapTable,
    t: GapTable,
    b: GapTable,
}

impl GapCalc {
    pub fn new(pos: &[i32], q_vals: &[f64], t_vals: &[f64], b_vals: &[f64]) -> Self {
        GapCalc {
            q: GapTable::new(pos, q_vals),
            t: GapTable::new(pos, t_vals),
            b: GapTable::new(pos, b_vals),
        }
    }

    /// Mouse/human.
    pub fn medium() -> Self {
        let q_gap = [
            325.0, 360.0, 400.0, 450.0, 600.0, 1100.0, 3600.0, 7600.0, 15600.0, 31600.0, 56600.0,
        ];
        let b_gap = [
            625.0, 660.0, 700.0, 750.0, 900.0, 1400.0, 4000.0, 8000.0, 16000.0, 32000.0, 57000.0,
        ];
        Self::new(&POSITIONS, &q_gap, &q_gap, &b_gap)
    }

    /// Chicken/human and other distant pairs.
    pub fn loose() -> Self {
        let q_gap = [
            350.0, 425.0, 450.0, 600.0, 900.0, 2900.0, 22900.0, 57900.0, 117900.0, 217900.0,
            317900.0,
        ];
        let b_gap = [
            750.0, 825.0, 850.0, 1000.0, 1300.0, 3300.0, 23300.0, 58300.0, 118300.0, 218300.0,
            318300.0,
        ];
        Self::new(&POSITIONS, &q_gap, &q_gap, &b_gap)
    }

    /// Low, slowly growing costs for the first chaining of raw MSPs.
    pub fn cheap() -> Self {
        let q_gap = [
            100.0, 105.0, 110.0, 150.0, 200.0, 300.0, 500.0, 700.0, 900.0, 1100.0, 1300.0,
        ];
        let b_gap = [
            200.0, 205.0, 210.0, 250.0, 300.0, 400.0, 600.0, 800.0, 1000.0, 1200.0, 1400.0,
        ];
        Self::new(&POSITIONS, &q_gap, &q_gap, &b_gap)
    }

    /// mRNA against genome: long target-only gaps (introns) stay cheap.
    pub fn rna_dna() -> Self {
        let q_gap = [
            325.0, 360.0, 400.0, 450.0, 600.0, 1100.0, 3600.0, 7600.0, 15600.0, 31600.0, 56600.0,
        ];
        let t_gap = [
            200.0, 210.0, 220.0, 300.0, 400.0, 500.0, 500.0, 500.0, 500.0, 500.0, 500.0,
        ];
        let b_gap = [
            625.0, 660.0, 700.0, 750.0, 900.0, 1400.0, 4000.0, 8000.0, 16000.0, 32000.0, 57000.0,
        ];
        Self::new(&POSITIONS, &q_gap, &t_gap, &b_gap)
    }

    pub fn from_name(name: &str) -> Result<Self> {
        match name {
            "medium" => Ok(Self::medium()),
            "loose" => Ok(Self::loose()),
            "cheap" => Ok(Self::cheap()),
            "rna-dna" => Ok(Self::rna_dna()),
            _ => bail!("Unknown gap costs: {}", name),
        }
    }

    /// Cost of a gap of `dq` query bases and `dt` target bases. Negative
    /// sizes count as zero; a double-sided gap is priced by its longer side.
    pub fn calc(&self, dq: i32, dt: i32) -> i32 {
        let dt = dt.max(0);
        let dq = dq.max(0);

        if dt == 0 {
            self.q.cost(dq)
        } else if dq == 0 {
            self.t.cost(dt)
        } else {
            self.b.cost(dq.max(dt))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn medium_costs() {
        let calc = GapCalc::medium();
        assert_eq!(calc.calc(0, 0), 0);
        assert_eq!(calc.calc(1, 0), 325);
        assert_eq!(calc.calc(0, 1), 325);
        assert_eq!(calc.calc(1, 1), 625);
        assert_eq!(calc.calc(111, 0), 600);
        assert_eq!(calc.calc(2111, 0), 1100);
        assert!(calc.calc(300_000, 0) > 56600);
    }

    #[test]
    fn costs_grow_with_size() {
        for calc in [GapCalc::loose(), GapCalc::cheap(), GapCalc::medium()] {
            let mut prev = 0;
            for size in [1, 2, 5, 50, 500, 5000, 50000, 500000] {
                let cost = calc.calc(size, 0);
                assert!(cost >= prev);
                prev = cost;
            }
        }
    }

    #[test]
    fn rna_introns_are_cheap() {
        let rna = GapCalc::rna_dna();
        assert!(rna.calc(0, 20000) < rna.calc(20000, 0));
        assert_eq!(rna.calc(0, 20000), 500);
        assert!(GapCalc::from_name("bogus").is_err());
    }
}
