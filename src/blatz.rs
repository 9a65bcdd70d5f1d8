extern crate clap;
use clap::*;
use env_logger::Env;

mod cmd_blatz;

fn main() -> anyhow::Result<()> {
    let app = Command::new("blatz")
        .version(crate_version!())
        .author(crate_authors!())
        .about("`blatz` - Cross-species DNA aligner with a resident index server")
        .propagate_version(true)
        .arg_required_else_help(true)
        .color(ColorChoice::Auto)
        .subcommand(cmd_blatz::align::make_subcommand())
        .subcommand(cmd_blatz::server::make_subcommand())
        .subcommand(cmd_blatz::client::make_subcommand())
        .after_help(
            r###"Subcommands:

* align  - Align query sequences against targets in one run
* server - Keep target indexes in memory: start, stop, status
* client - Send query sequences to a running server

Logging goes to stderr; set RUST_LOG=info or RUST_LOG=debug for progress.

"###,
        );

    let matches = app.get_matches();

    let default_level = if cmd_blatz::server::wants_debug(&matches) {
        "debug"
    } else {
        "warn"
    };
    env_logger::Builder::from_env(Env::default().default_filter_or(default_level)).init();

    match matches.subcommand() {
        Some(("align", sub_matches)) => cmd_blatz::align::execute(sub_matches),
        Some(("server", sub_matches)) => cmd_blatz::server::execute(sub_matches),
        Some(("client", sub_matches)) => cmd_blatz::client::execute(sub_matches),
        _ => unreachable!(),
    }?;

    Ok(())
}
