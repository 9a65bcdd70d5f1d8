use clap::*;
use std::process::Stdio;
use std::time::Duration;

use blatz::libs::params::{option_args, params_from_matches};
use blatz::libs::server::{client, Server, ServerConfig, ServerState, Subnet};

fn connection_args() -> [Arg; 3] {
    [
        Arg::new("port")
            .long("port")
            .value_parser(value_parser!(u16))
            .num_args(1)
            .default_value("17777")
            .help("TCP port of the server"),
        Arg::new("host")
            .long("host")
            .num_args(1)
            .default_value("localhost")
            .help("Host name or address of the server"),
        Arg::new("timeout")
            .long("timeout")
            .value_parser(value_parser!(u64).range(1..))
            .num_args(1)
            .default_value("120")
            .help("Seconds a connection may stay silent"),
    ]
}

pub fn make_subcommand() -> Command {
    Command::new("server")
        .about("Manage a resident alignment server")
        .after_help(
            r###"Subcommands:

* start  - Index target files and answer queries
* stop   - Ask a running server to shut down
* status - Show settings and query counts of a running server

"###,
        )
        .subcommand_required(true)
        .arg_required_else_help(true)
        .subcommand(start_subcommand())
        .subcommand(
            Command::new("stop")
                .about("Stops a running server after its current queries")
                .args(connection_args()),
        )
        .subcommand(
            Command::new("status")
                .about("Prints the status of a running server")
                .args(connection_args()),
        )
}

fn start_subcommand() -> Command {
    Command::new("start")
        .about("Starts a server over the target sequences")
        .after_help(
            r###"
Targets are indexed once; each query then runs on its own worker thread.

Notes:
* weight, word-limit, matrix, gap-costs and unmask are fixed for the server
* Other options set defaults that clients may override per query
* Without --debug the server detaches and this command returns at once
* --subnet restricts clients, e.g. --subnet 10.0.0.0/8,127.0.0.1

Examples:
1. Serve a genome on the default port:
   blatz server start hg38.2bit

2. Foreground with debug logs, two workers:
   blatz server start chr1.fa chr2.fa --cpu 2 --debug

"###,
        )
        .arg(
            Arg::new("infiles")
                .required(true)
                .num_args(1..)
                .index(1)
                .help("Target sequence files"),
        )
        .args(connection_args())
        .arg(
            Arg::new("cpu")
                .long("cpu")
                .value_parser(value_parser!(usize))
                .num_args(1)
                .default_value("4")
                .help("Maximum number of queries aligned at once"),
        )
        .arg(
            Arg::new("subnet")
                .long("subnet")
                .num_args(1)
                .help("Only accept clients from these CIDR ranges, comma separated"),
        )
        .arg(
            Arg::new("debug")
                .long("debug")
                .action(ArgAction::SetTrue)
                .help("Stay in the foreground and log at debug level"),
        )
        .arg(
            Arg::new("detached")
                .long("detached")
                .action(ArgAction::SetTrue)
                .hide(true),
        )
        .args(option_args(false))
}

/// True for `server start --debug`.
pub fn wants_debug(matches: &ArgMatches) -> bool {
    match matches.subcommand() {
        Some(("server", server)) => match server.subcommand() {
            Some(("start", start)) => start.get_flag("debug"),
            _ => false,
        },
        _ => false,
    }
}

fn timeout(args: &ArgMatches) -> Duration {
    Duration::from_secs(*args.get_one::<u64>("timeout").unwrap())
}

pub fn execute(args: &ArgMatches) -> anyhow::Result<()> {
    match args.subcommand() {
        Some(("start", sub_matches)) => start(sub_matches),
        Some(("stop", sub_matches)) => command(sub_matches, "stop"),
        Some(("status", sub_matches)) => command(sub_matches, "status"),
        _ => unreachable!(),
    }
}

fn command(args: &ArgMatches, name: &str) -> anyhow::Result<()> {
    let host = args.get_one::<String>("host").unwrap();
    let port = *args.get_one::<u16>("port").unwrap();
    let reply = client::send_command(host, port, name, timeout(args))?;
    print!("{}", reply);
    Ok(())
}

fn start(args: &ArgMatches) -> anyhow::Result<()> {
    //----------------------------
    // Args
    //----------------------------
    let params = params_from_matches(args, false)?;
    let config = ServerConfig {
        host: args.get_one::<String>("host").unwrap().to_string(),
        port: *args.get_one::<u16>("port").unwrap(),
        cpu: *args.get_one::<usize>("cpu").unwrap(),
        subnets: match args.get_one::<String>("subnet") {
            Some(s) => Subnet::parse_list(s)?,
            None => vec![],
        },
        timeout: timeout(args),
    };

    if !args.get_flag("debug") && !args.get_flag("detached") {
        let child = std::process::Command::new(std::env::current_exe()?)
            .args(std::env::args_os().skip(1))
            .arg("--detached")
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .spawn()?;
        eprintln!(
            "Server starting on {}:{} as process {}",
            config.host,
            config.port,
            child.id()
        );
        return Ok(());
    }

    //----------------------------
    // Ops
    //----------------------------
    let files: Vec<String> = args.get_many::<String>("infiles").unwrap().cloned().collect();
    let state = ServerState::load(&files, params)?;
    let counters = Server::bind(state, config)?.run()?;
    log::debug!("Final counters: {:?}", counters);

    Ok(())
}
