use clap::*;
use std::io::Write;
use std::time::Duration;

use blatz::libs::params::{matched_options, option_args, params_from_matches};
use blatz::libs::seq::load_seqs;
use blatz::libs::server::client;

// Create clap subcommand arguments
pub fn make_subcommand() -> Command {
    Command::new("client")
        .about("Aligns query sequences on a running server")
        .after_help(
            r###"
Each query sequence is sent as its own request; replies are written in input
order.

Notes:
* Options given here override the server's defaults for these queries
* Options fixed when the server started are not accepted
* A query the server rejects stops the run with an error

Examples:
1. Query the local server:
   blatz client reads.fa out.chain

2. PSL from a remote server:
   blatz client reads.fa out.psl --host 10.0.0.5 --port 18000 --out psl

"###,
        )
        .arg(
            Arg::new("query")
                .required(true)
                .index(1)
                .help("Query sequences"),
        )
        .arg(
            Arg::new("outfile")
                .required(true)
                .index(2)
                .help("Output filename. [stdout] for screen"),
        )
        .arg(
            Arg::new("port")
                .long("port")
                .value_parser(value_parser!(u16))
                .num_args(1)
                .default_value("17777")
                .help("TCP port of the server"),
        )
        .arg(
            Arg::new("host")
                .long("host")
                .num_args(1)
                .default_value("localhost")
                .help("Host name or address of the server"),
        )
        .arg(
            Arg::new("timeout")
                .long("timeout")
                .value_parser(value_parser!(u64).range(1..))
                .num_args(1)
                .default_value("120")
                .help("Seconds to wait for the server"),
        )
        .args(option_args(true))
}

// command implementation
pub fn execute(args: &ArgMatches) -> anyhow::Result<()> {
    //----------------------------
    // Args
    //----------------------------
    let host = args.get_one::<String>("host").unwrap();
    let port = *args.get_one::<u16>("port").unwrap();
    let timeout = Duration::from_secs(*args.get_one::<u64>("timeout").unwrap());

    // catch bad values before connecting
    params_from_matches(args, true)?;
    let options = matched_options(args, true);

    //----------------------------
    // Ops
    //----------------------------
    let queries = load_seqs(args.get_one::<String>("query").unwrap())?;
    let mut writer = blatz::writer(args.get_one::<String>("outfile").unwrap())?;

    for (i, seq) in queries.iter().enumerate() {
        client::query(host, port, timeout, &options, seq, &mut writer, i == 0)?;
    }
    writer.flush()?;

    Ok(())
}
