use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use clap::{Arg, ArgAction, ArgMatches};

use crate::libs::chain::{GapCalc, SubMatrix};

pub const MIN_CONFIG_WEIGHT: usize = 6;
pub const MAX_CONFIG_WEIGHT: usize = 15;

/// Configuration problems; fatal before any work starts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParamError {
    UnknownOption(String),
    InvalidValue { name: String, value: String },
    WeightOutOfRange(usize),
    UnknownFormat(String),
    Resource { name: String, message: String },
}

impl fmt::Display for ParamError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParamError::UnknownOption(name) => write!(f, "Unknown option: {}", name),
            ParamError::InvalidValue { name, value } => {
                write!(f, "Invalid value for {}: '{}'", name, value)
            }
            ParamError::WeightOutOfRange(w) => write!(
                f,
                "Seed weight {} out of range, must be {}-{}",
                w, MIN_CONFIG_WEIGHT, MAX_CONFIG_WEIGHT
            ),
            ParamError::UnknownFormat(out) => write!(f, "Unknown output format: {}", out),
            ParamError::Resource { name, message } => {
                write!(f, "Could not load {}: {}", name, message)
            }
        }
    }
}

impl std::error::Error for ParamError {}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutFormat {
    Chain,
    Psl,
    Axt,
    Maf,
    Blast8,
    Blast9,
}

impl FromStr for OutFormat {
    type Err = ParamError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "chain" => Ok(OutFormat::Chain),
            "psl" => Ok(OutFormat::Psl),
            "axt" => Ok(OutFormat::Axt),
            "maf" => Ok(OutFormat::Maf),
            "blast8" => Ok(OutFormat::Blast8),
            "blast9" => Ok(OutFormat::Blast9),
            _ => Err(ParamError::UnknownFormat(s.to_string())),
        }
    }
}

impl fmt::Display for OutFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            OutFormat::Chain => "chain",
            OutFormat::Psl => "psl",
            OutFormat::Axt => "axt",
            OutFormat::Maf => "maf",
            OutFormat::Blast8 => "blast8",
            OutFormat::Blast9 => "blast9",
        };
        write!(f, "{}", s)
    }
}

/// One tunable, shared by the command line and the wire protocol.
pub struct OptionSpec {
    pub name: &'static str,
    pub flag: bool,
    /// Fixed when the server builds its indexes; clients cannot change it.
    pub server_only: bool,
    pub help: &'static str,
}

const fn opt(name: &'static str, help: &'static str) -> OptionSpec {
    OptionSpec {
        name,
        flag: false,
        server_only: false,
        help,
    }
}

const fn flag(name: &'static str, help: &'static str) -> OptionSpec {
    OptionSpec {
        name,
        flag: true,
        server_only: false,
        help,
    }
}

const fn server(name: &'static str, help: &'static str) -> OptionSpec {
    OptionSpec {
        name,
        flag: false,
        server_only: true,
        help,
    }
}

pub const OPTIONS: &[OptionSpec] = &[
    server("weight", "Seed weight, 6-15 [9]"),
    server("word-limit", "Drop seed words occurring more often than this, 0 for no limit [0]"),
    server("matrix", "Scoring matrix: hoxd55, simple or a matrix file [hoxd55]"),
    server("gap-costs", "Chaining gap costs: loose or medium [loose]"),
    OptionSpec {
        name: "unmask",
        flag: true,
        server_only: true,
        help: "Seed in lowercase (soft-masked) sequence too",
    },
    flag("rna", "Query is mRNA: cheap introns, poly-A tails masked"),
    opt("min-score", "Minimum score of a final chain [4000]"),
    opt("min-gapless", "Minimum score of a gapless extension [2500]"),
    opt("min-chain", "Minimum score of a chain before banded extension [3000]"),
    opt("min-expand", "Minimum chain score that triggers expansion [1000]"),
    opt("max-drop", "X-drop of gapless extension [1000]"),
    opt("max-extend", "Maximum bases added by one banded extension [2500]"),
    opt("max-band-gap", "Half-width of the extension band [50]"),
    opt("expand-window", "Window searched around chains at finer weight, 0 disables [10000]"),
    opt(
        "multi-hits",
        "Require two hits on a diagonal within this many query bases, 200 is typical, 0 disables [0]",
    ),
    flag("transition", "Also look up seeds that differ by one transition"),
    opt("dyna-limit-t", "Maximum hits per target position [unbounded]"),
    opt("dyna-limit-q", "Maximum hits per query position [unbounded]"),
    opt("dyna-word-coverage", "Maximum hits per seed word [unbounded]"),
    flag("best-chain-only", "Keep only the best chain"),
    opt("max-chains", "Maximum chains explored per target, 0 for no limit [0]"),
    opt("out", "Output format: chain, psl, axt, maf, blast8, blast9 [chain]"),
    opt("maf-q", "Prefix of query names in MAF output"),
    opt("maf-t", "Prefix of target names in MAF output"),
];

/// Everything that steers one alignment run.
#[derive(Debug, Clone)]
pub struct AlignParams {
    pub weight: usize,
    pub word_limit: usize,
    pub rna: bool,
    pub min_score: i32,
    pub min_gapless: i32,
    pub min_chain: i32,
    pub min_expand: i32,
    pub max_drop: i32,
    pub max_extend: usize,
    pub max_band_gap: usize,
    pub expand_window: usize,
    pub multi_hits: usize,
    pub transition: bool,
    pub dyna_limit_t: u32,
    pub dyna_limit_q: u32,
    pub dyna_word_coverage: u32,
    pub unmask: bool,
    pub best_chain_only: bool,
    pub max_chains: usize,
    pub out: OutFormat,
    pub maf_q: String,
    pub maf_t: String,
    pub matrix_name: String,
    pub matrix: Arc<SubMatrix>,
    pub gap_costs: String,
    pub gap_calc: Arc<GapCalc>,
    pub cheap_gap: Arc<GapCalc>,
}

impl Default for AlignParams {
    fn default() -> Self {
        Self {
            weight: 9,
            word_limit: 0,
            rna: false,
            min_score: 4000,
            min_gapless: 2500,
            min_chain: 3000,
            min_expand: 1000,
            max_drop: 1000,
            max_extend: 2500,
            max_band_gap: 50,
            expand_window: 10000,
            multi_hits: 0,
            transition: false,
            dyna_limit_t: u32::MAX,
            dyna_limit_q: u32::MAX,
            dyna_word_coverage: u32::MAX,
            unmask: false,
            best_chain_only: false,
            max_chains: 0,
            out: OutFormat::Chain,
            maf_q: String::new(),
            maf_t: String::new(),
            matrix_name: "hoxd55".to_string(),
            matrix: Arc::new(SubMatrix::hoxd55()),
            gap_costs: "loose".to_string(),
            gap_calc: Arc::new(GapCalc::loose()),
            cheap_gap: Arc::new(GapCalc::cheap()),
        }
    }
}

fn parse_num<T: FromStr>(name: &str, value: &str) -> Result<T, ParamError> {
    value.trim().parse().map_err(|_| ParamError::InvalidValue {
        name: name.to_string(),
        value: value.to_string(),
    })
}

fn parse_flag(name: &str, value: &str) -> Result<bool, ParamError> {
    match value.trim() {
        "" | "1" | "true" | "on" => Ok(true),
        "0" | "false" | "off" => Ok(false),
        _ => Err(ParamError::InvalidValue {
            name: name.to_string(),
            value: value.to_string(),
        }),
    }
}

fn parse_limit(name: &str, value: &str) -> Result<u32, ParamError> {
    match value.trim() {
        "unbounded" => Ok(u32::MAX),
        v => parse_num(name, v),
    }
}

fn show_limit(v: u32) -> String {
    if v == u32::MAX {
        "unbounded".to_string()
    } else {
        v.to_string()
    }
}

impl AlignParams {
    /// Applies one `name value` override. Flags accept an empty value.
    pub fn apply_option(&mut self, name: &str, value: &str) -> Result<(), ParamError> {
        match name {
            "weight" => self.weight = parse_num(name, value)?,
            "word-limit" => self.word_limit = parse_num(name, value)?,
            "matrix" => {
                let matrix =
                    SubMatrix::from_name(value.trim()).map_err(|e| ParamError::Resource {
                        name: value.to_string(),
                        message: e.to_string(),
                    })?;
                self.matrix = Arc::new(matrix);
                self.matrix_name = value.trim().to_string();
            }
            "gap-costs" => match value.trim() {
                "loose" | "medium" => self.gap_costs = value.trim().to_string(),
                _ => {
                    return Err(ParamError::InvalidValue {
                        name: name.to_string(),
                        value: value.to_string(),
                    })
                }
            },
            "unmask" => self.unmask = parse_flag(name, value)?,
            "rna" => self.rna = parse_flag(name, value)?,
            "min-score" => self.min_score = parse_num(name, value)?,
            "min-gapless" => self.min_gapless = parse_num(name, value)?,
            "min-chain" => self.min_chain = parse_num(name, value)?,
            "min-expand" => self.min_expand = parse_num(name, value)?,
            "max-drop" => self.max_drop = parse_num(name, value)?,
            "max-extend" => self.max_extend = parse_num(name, value)?,
            "max-band-gap" => self.max_band_gap = parse_num(name, value)?,
            "expand-window" => self.expand_window = parse_num(name, value)?,
            "multi-hits" => self.multi_hits = parse_num(name, value)?,
            "transition" => self.transition = parse_flag(name, value)?,
            "dyna-limit-t" => self.dyna_limit_t = parse_limit(name, value)?,
            "dyna-limit-q" => self.dyna_limit_q = parse_limit(name, value)?,
            "dyna-word-coverage" => self.dyna_word_coverage = parse_limit(name, value)?,
            "best-chain-only" => self.best_chain_only = parse_flag(name, value)?,
            "max-chains" => self.max_chains = parse_num(name, value)?,
            "out" => self.out = value.trim().parse()?,
            "maf-q" => self.maf_q = value.trim().to_string(),
            "maf-t" => self.maf_t = value.trim().to_string(),
            _ => return Err(ParamError::UnknownOption(name.to_string())),
        }
        Ok(())
    }

    /// Checks ranges and settles the gap model. Call after the last
    /// override.
    pub fn validate(&mut self) -> Result<(), ParamError> {
        if !(MIN_CONFIG_WEIGHT..=MAX_CONFIG_WEIGHT).contains(&self.weight) {
            return Err(ParamError::WeightOutOfRange(self.weight));
        }

        let gap_calc = if self.rna {
            GapCalc::rna_dna()
        } else {
            GapCalc::from_name(&self.gap_costs).map_err(|e| ParamError::Resource {
                name: self.gap_costs.clone(),
                message: e.to_string(),
            })?
        };
        self.gap_calc = Arc::new(gap_calc);
        Ok(())
    }

    /// Current value of every option, in table order.
    pub fn to_lines(&self) -> Vec<(&'static str, String)> {
        OPTIONS
            .iter()
            .map(|o| {
                let value = match o.name {
                    "weight" => self.weight.to_string(),
                    "word-limit" => self.word_limit.to_string(),
                    "matrix" => self.matrix_name.clone(),
                    "gap-costs" => self.gap_costs.clone(),
                    "unmask" => self.unmask.to_string(),
                    "rna" => self.rna.to_string(),
                    "min-score" => self.min_score.to_string(),
                    "min-gapless" => self.min_gapless.to_string(),
                    "min-chain" => self.min_chain.to_string(),
                    "min-expand" => self.min_expand.to_string(),
                    "max-drop" => self.max_drop.to_string(),
                    "max-extend" => self.max_extend.to_string(),
                    "max-band-gap" => self.max_band_gap.to_string(),
                    "expand-window" => self.expand_window.to_string(),
                    "multi-hits" => self.multi_hits.to_string(),
                    "transition" => self.transition.to_string(),
                    "dyna-limit-t" => show_limit(self.dyna_limit_t),
                    "dyna-limit-q" => show_limit(self.dyna_limit_q),
                    "dyna-word-coverage" => show_limit(self.dyna_word_coverage),
                    "best-chain-only" => self.best_chain_only.to_string(),
                    "max-chains" => self.max_chains.to_string(),
                    "out" => self.out.to_string(),
                    "maf-q" => self.maf_q.clone(),
                    "maf-t" => self.maf_t.clone(),
                    _ => String::new(),
                };
                (o.name, value)
            })
            .collect()
    }

    /// Finer settings for searching the space around a good chain.
    pub fn expansion(&self) -> Self {
        let mut p = self.clone();
        p.weight = if self.weight >= 9 {
            self.weight - 3
        } else {
            self.weight.saturating_sub(2).max(1)
        };
        p.min_score = self.min_score - 500;
        p.min_gapless = self.min_gapless - 500;
        p.min_chain = self.min_chain - 500;
        p.max_extend = self.max_extend / 6;
        p.max_band_gap = self.max_band_gap / 6;
        p.best_chain_only = true;
        p.expand_window = 0;
        p.word_limit = 0;
        p
    }
}

/// Clap arguments for every option; `client` leaves out the server-only
/// ones.
pub fn option_args(client: bool) -> Vec<Arg> {
    OPTIONS
        .iter()
        .filter(|o| !(client && o.server_only))
        .map(|o| {
            let arg = Arg::new(o.name).long(o.name).help(o.help);
            if o.flag {
                arg.action(ArgAction::SetTrue)
            } else {
                arg.num_args(1)
            }
        })
        .collect()
}

/// Options given explicitly on the command line, as `(name, value)` pairs.
pub fn matched_options(args: &ArgMatches, client: bool) -> Vec<(String, String)> {
    let mut pairs = vec![];
    for o in OPTIONS.iter().filter(|o| !(client && o.server_only)) {
        if o.flag {
            if args.get_flag(o.name) {
                pairs.push((o.name.to_string(), String::new()));
            }
        } else if let Some(v) = args.get_one::<String>(o.name) {
            pairs.push((o.name.to_string(), v.clone()));
        }
    }
    pairs
}

/// Defaults overridden by the command line, validated.
pub fn params_from_matches(args: &ArgMatches, client: bool) -> anyhow::Result<AlignParams> {
    let mut params = AlignParams::default();
    for (name, value) in matched_options(args, client) {
        params.apply_option(&name, &value)?;
    }
    params.validate()?;
    Ok(params)
}
