use clap::*;
use std::io::Write;

use blatz::libs::align::{align, build_indexes};
use blatz::libs::fmt::OutputWriter;
use blatz::libs::gapless::DynaMask;
use blatz::libs::params::{option_args, params_from_matches};
use blatz::libs::seq::load_seqs;

// Create clap subcommand arguments
pub fn make_subcommand() -> Command {
    Command::new("align")
        .about("Aligns query sequences against target sequences")
        .after_help(
            r###"
Every target sequence gets its own seed index; both strands of every query
are aligned against all of them.

Notes:
* Targets and queries may be FASTA (plain or .gz) or .2bit
* Reads FASTA from stdin if a file is 'stdin'
* Lowercase (soft-masked) bases are not seeded unless --unmask is given
* Chains scoring below --min-score are dropped
* --out picks the format: chain, psl, axt, maf, blast8 or blast9
* --dyna-report writes seed words that hit --dyna-word-coverage

Examples:
1. Align mouse reads to a human chromosome:
   blatz align hg38.chr1.fa mm.fa out.chain

2. PSL output with a finer seed:
   blatz align target.2bit query.fa out.psl --weight 7 --out psl

3. mRNA against genomic DNA:
   blatz align genome.fa mrna.fa stdout --rna --out psl

"###,
        )
        .arg(
            Arg::new("target")
                .required(true)
                .index(1)
                .help("Target sequences"),
        )
        .arg(
            Arg::new("query")
                .required(true)
                .index(2)
                .help("Query sequences"),
        )
        .arg(
            Arg::new("outfile")
                .required(true)
                .index(3)
                .help("Output filename. [stdout] for screen"),
        )
        .arg(
            Arg::new("dyna-report")
                .long("dyna-report")
                .num_args(1)
                .help("Write seed words masked by --dyna-word-coverage to this file"),
        )
        .args(option_args(false))
}

// command implementation
pub fn execute(args: &ArgMatches) -> anyhow::Result<()> {
    //----------------------------
    // Args
    //----------------------------
    let target = args.get_one::<String>("target").unwrap();
    let query = args.get_one::<String>("query").unwrap();
    let outfile = args.get_one::<String>("outfile").unwrap();

    let params = params_from_matches(args, false)?;

    //----------------------------
    // Ops
    //----------------------------
    let targets = load_seqs(target)?;
    if targets.is_empty() {
        log::warn!("No sequences in {}", target);
    }
    let indexes = build_indexes(targets, &params);
    log::info!("Indexed {} target sequence(s) from {}", indexes.len(), target);

    let queries = load_seqs(query)?;
    let mut mask = DynaMask::new(
        params.dyna_limit_t,
        params.dyna_limit_q,
        params.dyna_word_coverage,
    );
    let mut out = OutputWriter::new(blatz::writer(outfile)?, &params, &indexes, target);

    let mut total = 0;
    for seq in &queries {
        let chains = align(&params, &indexes, seq, &mut mask);
        total += chains.len();
        out.write_query(seq, &chains)?;
    }
    out.flush()?;
    log::info!("{} queries, {} chains", queries.len(), total);

    if let Some(report) = args.get_one::<String>("dyna-report") {
        let mut writer = blatz::writer(report)?;
        mask.write_word_report(&mut writer)?;
        writer.flush()?;
    }

    Ok(())
}
