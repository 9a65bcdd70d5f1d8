use assert_cmd::Command;
use blatz::libs::params::AlignParams;
use blatz::libs::seq::DnaSeq;
use blatz::libs::server::{client, Server, ServerConfig, ServerState};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::fs;
use std::io::Write;
use std::net::TcpStream;
use std::thread::JoinHandle;
use std::time::Duration;
use tempfile::TempDir;

const TIMEOUT: Duration = Duration::from_secs(30);

fn random_seq(len: usize, seed: u64) -> Vec<u8> {
    let mut rng = StdRng::seed_from_u64(seed);
    (0..len).map(|_| b"ACGT"[rng.gen_range(0..4)]).collect()
}

/// Serves one 200 bp target on a free local port.
fn spawn_server(target: &[u8]) -> anyhow::Result<(u16, JoinHandle<anyhow::Result<()>>)> {
    spawn_server_with(target, 2, TIMEOUT)
}

fn spawn_server_with(
    target: &[u8],
    cpu: usize,
    timeout: Duration,
) -> anyhow::Result<(u16, JoinHandle<anyhow::Result<()>>)> {
    let mut params = AlignParams::default();
    params.validate()?;
    let state = ServerState::new(vec![DnaSeq::new("chrT", target)], params);
    let config = ServerConfig {
        host: "127.0.0.1".to_string(),
        port: 0,
        cpu,
        timeout,
        ..Default::default()
    };
    let server = Server::bind(state, config)?;
    let port = server.local_addr()?.port();
    let handle = std::thread::spawn(move || server.run().map(|_| ()));
    Ok((port, handle))
}

#[test]
fn server_status_and_stop() -> anyhow::Result<()> {
    let (port, handle) = spawn_server(&random_seq(200, 7))?;

    let status = client::send_command("127.0.0.1", port, "status", TIMEOUT)?;
    let lines: Vec<&str> = status.lines().collect();
    assert!(lines[0].starts_with("version "));
    assert!(lines.contains(&format!("port {}", port).as_str()));
    assert!(lines.contains(&"sequences 1"));
    assert!(lines.contains(&"bases 200"));
    assert!(lines.contains(&"weight 9"));
    assert!(lines.contains(&"good 0"));

    let reply = client::send_command("127.0.0.1", port, "stop", TIMEOUT)?;
    assert_eq!(reply.trim(), "stopping");
    assert!(handle.join().is_ok());

    Ok(())
}

#[test]
fn server_answers_queries() -> anyhow::Result<()> {
    let target = random_seq(200, 11);
    let (port, handle) = spawn_server(&target)?;

    let mut query = target.clone();
    query[100] = if query[100] == b'G' { b'T' } else { b'G' };
    let query = DnaSeq::new("readQ", &query);

    let mut out = vec![];
    client::query("127.0.0.1", port, TIMEOUT, &[], &query, &mut out, true)?;
    let text = String::from_utf8(out)?;
    assert!(text.starts_with("chain "));
    assert!(text.contains(" chrT 200 + 0 200 readQ 200 + 0 200 1\n"));

    // per-query override
    let options = vec![("out".to_string(), "psl".to_string())];
    let mut out = vec![];
    client::query("127.0.0.1", port, TIMEOUT, &options, &query, &mut out, true)?;
    let text = String::from_utf8(out)?;
    assert_eq!(text.lines().count(), 1);
    assert!(text.starts_with("199\t1\t"));

    // options fixed at start are refused
    let options = vec![("weight".to_string(), "12".to_string())];
    let mut out = vec![];
    let res = client::query("127.0.0.1", port, TIMEOUT, &options, &query, &mut out, true);
    assert!(res.is_err());

    let status = client::send_command("127.0.0.1", port, "status", TIMEOUT)?;
    assert!(status.contains("good 2\n"));
    assert!(status.contains("bad 1\n"));

    client::send_command("127.0.0.1", port, "stop", TIMEOUT)?;
    assert!(handle.join().is_ok());

    Ok(())
}

#[test]
fn command_client() -> anyhow::Result<()> {
    let target = random_seq(200, 13);
    let (port, handle) = spawn_server(&target)?;

    let temp = TempDir::new()?;
    let q_path = temp.path().join("query.fa");
    let text = format!(
        ">r1\n{}\n>r2\n{}\n",
        String::from_utf8(target.clone())?,
        String::from_utf8(random_seq(200, 99))?
    );
    fs::write(&q_path, text)?;

    let mut cmd = Command::cargo_bin("blatz")?;
    let output = cmd
        .arg("client")
        .arg(&q_path)
        .arg("stdout")
        .arg("--host")
        .arg("127.0.0.1")
        .arg("--port")
        .arg(port.to_string())
        .arg("--out")
        .arg("maf")
        .output()?;
    assert!(output.status.success());

    let stdout = String::from_utf8(output.stdout)?;
    assert_eq!(stdout.matches("##maf").count(), 1);
    assert!(stdout.contains(" r1 "));

    let mut cmd = Command::cargo_bin("blatz")?;
    cmd.arg("client")
        .arg(&q_path)
        .arg("stdout")
        .arg("--port")
        .arg(port.to_string())
        .arg("--weight")
        .arg("12");
    cmd.assert().failure();

    client::send_command("127.0.0.1", port, "stop", TIMEOUT)?;
    assert!(handle.join().is_ok());

    Ok(())
}

/// Opens a query and stops after the `seq` line.
fn stalled_query(port: u16) -> anyhow::Result<TcpStream> {
    let mut stream = TcpStream::connect(("127.0.0.1", port))?;
    stream.write_all(b"query\nseq\n")?;
    stream.flush()?;
    Ok(stream)
}

/// Polls `status` until it contains `line`.
fn wait_for_status(port: u16, line: &str) -> anyhow::Result<String> {
    for _ in 0..50 {
        let status = client::send_command("127.0.0.1", port, "status", TIMEOUT)?;
        if status.contains(line) {
            return Ok(status);
        }
        std::thread::sleep(Duration::from_millis(100));
    }
    anyhow::bail!("status never showed {:?}", line)
}

#[test]
fn stalled_client_does_not_block_status() -> anyhow::Result<()> {
    let (port, handle) = spawn_server(&random_seq(200, 17))?;

    let stalled = stalled_query(port)?;
    let status = client::send_command("127.0.0.1", port, "status", Duration::from_secs(2))?;
    assert!(status.contains("busy 1\n"));

    // the body never arrives
    drop(stalled);
    let status = wait_for_status(port, "busy 0\n")?;
    assert!(status.contains("bad 1\n"));
    assert!(status.contains("good 0\n"));

    client::send_command("127.0.0.1", port, "stop", TIMEOUT)?;
    assert!(handle.join().is_ok());

    Ok(())
}

#[test]
fn worker_ceiling_holds_new_connections() -> anyhow::Result<()> {
    let (port, handle) = spawn_server_with(&random_seq(200, 19), 1, TIMEOUT)?;

    let stalled = stalled_query(port)?;
    let res = client::send_command("127.0.0.1", port, "status", Duration::from_secs(1));
    assert!(res.is_err());

    drop(stalled);
    let status = client::send_command("127.0.0.1", port, "status", TIMEOUT)?;
    assert!(status.contains("cpu 1\n"));
    assert!(status.contains("busy 0\n"));
    assert!(status.contains("bad 1\n"));

    client::send_command("127.0.0.1", port, "stop", TIMEOUT)?;
    assert!(handle.join().is_ok());

    Ok(())
}

#[test]
fn zero_timeout() -> anyhow::Result<()> {
    let (port, handle) = spawn_server_with(&random_seq(200, 23), 2, Duration::ZERO)?;
    let status = client::send_command("127.0.0.1", port, "status", TIMEOUT)?;
    assert!(status.contains("sequences 1\n"));
    client::send_command("127.0.0.1", port, "stop", TIMEOUT)?;
    assert!(handle.join().is_ok());

    let mut cmd = Command::cargo_bin("blatz")?;
    cmd.arg("server").arg("status").arg("--timeout").arg("0");
    cmd.assert().failure();

    let mut cmd = Command::cargo_bin("blatz")?;
    cmd.arg("client")
        .arg("query.fa")
        .arg("stdout")
        .arg("--timeout")
        .arg("0");
    cmd.assert().failure();

    Ok(())
}
