use std::io::{BufWriter, Read, Write};
use std::net::TcpStream;
use std::time::Duration;

use anyhow::{bail, Context};

use crate::libs::seq::DnaSeq;
use crate::libs::server::protocol::write_query;

const MAF_HEADER: &str = "##maf";

fn connect(host: &str, port: u16, timeout: Duration) -> anyhow::Result<TcpStream> {
    let stream = TcpStream::connect((host, port))
        .with_context(|| format!("Could not connect to server at {}:{}", host, port))?;
    stream.set_read_timeout(Some(timeout))?;
    stream.set_write_timeout(Some(timeout))?;
    Ok(stream)
}

fn read_reply(stream: &mut TcpStream) -> anyhow::Result<String> {
    let mut reply = String::new();
    stream.read_to_string(&mut reply)?;
    if let Some(msg) = reply.strip_prefix("error: ") {
        bail!("Server refused the request: {}", msg.trim_end());
    }
    Ok(reply)
}

/// Sends `status` or `stop` and returns the server's reply.
pub fn send_command(host: &str, port: u16, command: &str, timeout: Duration) -> anyhow::Result<String> {
    let mut stream = connect(host, port, timeout)?;
    writeln!(stream, "{}", command)?;
    stream.flush()?;
    read_reply(&mut stream)
}

/// Aligns one query remotely and copies the reply to `out`.
///
/// Every reply of a MAF run starts with the file header; it is kept only
/// when `first` is set.
pub fn query<W: Write + ?Sized>(
    host: &str,
    port: u16,
    timeout: Duration,
    options: &[(String, String)],
    seq: &DnaSeq,
    out: &mut W,
    first: bool,
) -> anyhow::Result<()> {
    let mut stream = connect(host, port, timeout)?;
    {
        let mut writer = BufWriter::new(&mut stream);
        write_query(&mut writer, options, seq)?;
    }
    let reply = read_reply(&mut stream)
        .with_context(|| format!("Query {} failed", seq.name))?;

    for line in reply.split_inclusive('\n') {
        if !first && line.starts_with(MAF_HEADER) {
            continue;
        }
        out.write_all(line.as_bytes())?;
    }
    log::debug!("{}: {} bytes from server", seq.name, reply.len());
    Ok(())
}
