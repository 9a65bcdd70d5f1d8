//! A resident aligner: targets are indexed once and queries arrive over TCP.

pub mod client;
pub mod protocol;

use std::io::{self, BufRead, BufReader, BufWriter, Write};
use std::net::{IpAddr, SocketAddr, TcpListener, TcpStream};
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::{bail, Context};
use crossbeam::channel::{unbounded, Receiver, Sender};

use crate::libs::align::{align, build_indexes};
use crate::libs::fmt::OutputWriter;
use crate::libs::gapless::DynaMask;
use crate::libs::params::AlignParams;
use crate::libs::seed::SeedIndex;
use crate::libs::seq::{load_seqs, DnaSeq};
use protocol::{parse_command, query_params, read_query, Command, ProtocolError};

pub const DEFAULT_CPU: usize = 4;
pub const DEFAULT_TIMEOUT: u64 = 120;

/// How long the accept loop waits for a request's first line.
const COMMAND_WAIT: Duration = Duration::from_secs(5);
const MAX_COMMAND_LEN: usize = 64;

/// An address range clients may connect from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Subnet {
    addr: IpAddr,
    prefix: u32,
}

impl Subnet {
    /// `10.0.0.0/8`, `192.168.1.7` or an IPv6 equivalent.
    pub fn parse(s: &str) -> anyhow::Result<Self> {
        let (addr, prefix) = match s.trim().split_once('/') {
            Some((a, p)) => (a, Some(p)),
            None => (s.trim(), None),
        };
        let addr: IpAddr = addr
            .parse()
            .with_context(|| format!("Bad subnet address: {}", s))?;
        let max = if addr.is_ipv4() { 32 } else { 128 };
        let prefix = match prefix {
            Some(p) => p
                .parse()
                .with_context(|| format!("Bad subnet prefix: {}", s))?,
            None => max,
        };
        if prefix > max {
            bail!("Bad subnet prefix: {}", s);
        }
        Ok(Self { addr, prefix })
    }

    pub fn parse_list(s: &str) -> anyhow::Result<Vec<Self>> {
        s.split(',')
            .filter(|p| !p.trim().is_empty())
            .map(Self::parse)
            .collect()
    }

    pub fn contains(&self, ip: IpAddr) -> bool {
        let ip = match (self.addr, ip) {
            (IpAddr::V4(_), IpAddr::V6(v6)) => match v6.to_ipv4_mapped() {
                Some(v4) => IpAddr::V4(v4),
                None => return false,
            },
            _ => ip,
        };
        match (self.addr, ip) {
            (IpAddr::V4(net), IpAddr::V4(ip)) => {
                let mask = u32::MAX.checked_shl(32 - self.prefix).unwrap_or(0);
                u32::from(net) & mask == u32::from(ip) & mask
            }
            (IpAddr::V6(net), IpAddr::V6(ip)) => {
                let mask = u128::MAX.checked_shl(128 - self.prefix).unwrap_or(0);
                u128::from(net) & mask == u128::from(ip) & mask
            }
            _ => false,
        }
    }
}

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub cpu: usize,
    pub subnets: Vec<Subnet>,
    pub timeout: Duration,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "localhost".to_string(),
            port: protocol::DEFAULT_PORT,
            cpu: DEFAULT_CPU,
            subnets: vec![],
            timeout: Duration::from_secs(DEFAULT_TIMEOUT),
        }
    }
}

/// Read-only state shared by every worker.
pub struct ServerState {
    pub params: AlignParams,
    pub indexes: Vec<SeedIndex>,
    pub sequences: usize,
    pub bases: usize,
}

impl ServerState {
    pub fn new(targets: Vec<DnaSeq>, params: AlignParams) -> Self {
        let sequences = targets.len();
        let bases = targets.iter().map(|t| t.len()).sum();
        let indexes = build_indexes(targets, &params);
        Self {
            params,
            indexes,
            sequences,
            bases,
        }
    }

    pub fn load(files: &[String], params: AlignParams) -> anyhow::Result<Self> {
        let mut targets = vec![];
        for file in files {
            let seqs = load_seqs(file)?;
            log::info!("Loaded {} sequences from {}", seqs.len(), file);
            targets.extend(seqs);
        }
        let state = Self::new(targets, params);
        log::info!(
            "Indexed {} sequences, {} bases at weight {}",
            state.sequences,
            state.bases,
            state.params.weight
        );
        Ok(state)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Counters {
    pub good: usize,
    pub bad: usize,
    pub crashed: usize,
    pub busy: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Outcome {
    Good,
    Bad,
    Crashed,
}

impl Counters {
    fn finish(&mut self, outcome: Outcome) {
        self.busy = self.busy.saturating_sub(1);
        match outcome {
            Outcome::Good => self.good += 1,
            Outcome::Bad => self.bad += 1,
            Outcome::Crashed => self.crashed += 1,
        }
    }
}

pub fn status_text(state: &ServerState, config: &ServerConfig, counters: &Counters) -> String {
    let mut lines = vec![
        format!("version {}", env!("CARGO_PKG_VERSION")),
        format!("port {}", config.port),
        format!("host {}", config.host),
        format!("cpu {}", config.cpu),
        format!("sequences {}", state.sequences),
        format!("bases {}", state.bases),
    ];
    for (name, value) in state.params.to_lines() {
        lines.push(format!("{} {}", name, value));
    }
    lines.push(format!("good {}", counters.good));
    lines.push(format!("bad {}", counters.bad));
    lines.push(format!("crashed {}", counters.crashed));
    lines.push(format!("busy {}", counters.busy));

    let mut text = lines.join("\n");
    text.push('\n');
    text
}

/// Reads the rest of a query from the connection and writes the reply.
type Handler = fn(&ServerState, &mut BufReader<TcpStream>, &mut TcpStream) -> Result<(), ProtocolError>;

pub struct Server {
    state: Arc<ServerState>,
    config: ServerConfig,
    listener: TcpListener,
    counters: Counters,
    handler: Handler,
}

impl Server {
    pub fn bind(state: ServerState, mut config: ServerConfig) -> anyhow::Result<Self> {
        let listener = TcpListener::bind((config.host.as_str(), config.port))
            .with_context(|| format!("Could not listen on {}:{}", config.host, config.port))?;
        config.port = listener.local_addr()?.port();
        config.cpu = config.cpu.max(1);
        config.timeout = config.timeout.max(Duration::from_secs(1));
        Ok(Self {
            state: Arc::new(state),
            config,
            listener,
            counters: Counters::default(),
            handler: answer_query,
        })
    }

    pub fn local_addr(&self) -> io::Result<SocketAddr> {
        self.listener.local_addr()
    }

    fn allowed(&self, peer: &SocketAddr) -> bool {
        self.config.subnets.is_empty() || self.config.subnets.iter().any(|s| s.contains(peer.ip()))
    }

    fn reap(&mut self, rx: &Receiver<Outcome>) {
        while let Ok(outcome) = rx.try_recv() {
            self.counters.finish(outcome);
        }
    }

    /// Accepts connections until a `stop` request, then waits for the
    /// running queries.
    pub fn run(mut self) -> anyhow::Result<Counters> {
        let (tx, rx) = unbounded::<Outcome>();
        log::info!(
            "Listening on {}:{} with {} workers",
            self.config.host,
            self.config.port,
            self.config.cpu
        );

        loop {
            self.reap(&rx);
            while self.counters.busy >= self.config.cpu {
                let outcome = rx.recv()?;
                self.counters.finish(outcome);
            }

            let (mut stream, peer) = match self.listener.accept() {
                Ok(conn) => conn,
                Err(e) => {
                    log::warn!("Accept failed: {}", e);
                    continue;
                }
            };
            if !self.allowed(&peer) {
                log::warn!("Refused connection from {}", peer);
                self.counters.bad += 1;
                continue;
            }
            if let Err(e) = stream.set_write_timeout(Some(self.config.timeout)) {
                log::warn!("{}: {}", peer, e);
                self.counters.bad += 1;
                continue;
            }

            let command = match stream
                .try_clone()
                .map(BufReader::new)
                .and_then(|mut r| {
                    read_command_line(&mut r, COMMAND_WAIT.min(self.config.timeout))
                        .map(|line| (r, line))
                })
                .map_err(ProtocolError::from)
                .and_then(|(r, line)| parse_command(&line).map(|c| (r, c)))
            {
                Ok(c) => c,
                Err(e) => {
                    log::warn!("{}: {}", peer, e);
                    self.counters.bad += 1;
                    let _ = writeln!(stream, "error: {}", e);
                    continue;
                }
            };

            match command {
                (_, Command::Status) => {
                    self.reap(&rx);
                    let text = status_text(&self.state, &self.config, &self.counters);
                    if let Err(e) = stream.write_all(text.as_bytes()) {
                        log::warn!("{}: {}", peer, e);
                    }
                }
                (_, Command::Stop) => {
                    log::info!("Stop requested by {}", peer);
                    let _ = writeln!(stream, "stopping");
                    break;
                }
                (reader, Command::Query) => {
                    self.counters.busy += 1;
                    let worker = Worker {
                        state: self.state.clone(),
                        handler: self.handler,
                        timeout: self.config.timeout,
                        peer,
                    };
                    worker.spawn(reader, stream, tx.clone());
                }
            }
        }

        drop(tx);
        while self.counters.busy > 0 {
            match rx.recv() {
                Ok(outcome) => self.counters.finish(outcome),
                Err(_) => break,
            }
        }
        log::info!(
            "Stopped after {} good, {} bad, {} crashed queries",
            self.counters.good,
            self.counters.bad,
            self.counters.crashed
        );
        Ok(self.counters)
    }
}

/// Reads the first request line, giving up once `wait` has passed.
fn read_command_line(reader: &mut BufReader<TcpStream>, wait: Duration) -> io::Result<String> {
    let deadline = Instant::now() + wait;
    let mut line = vec![];
    loop {
        let left = deadline.saturating_duration_since(Instant::now());
        if left.is_zero() {
            return Err(io::Error::new(io::ErrorKind::TimedOut, "no command in time"));
        }
        reader.get_ref().set_read_timeout(Some(left))?;

        let (done, used) = {
            let buf = reader.fill_buf()?;
            match buf.iter().position(|&b| b == b'\n') {
                Some(i) => {
                    line.extend_from_slice(&buf[..i]);
                    (true, i + 1)
                }
                None => {
                    line.extend_from_slice(buf);
                    (buf.is_empty(), buf.len())
                }
            }
        };
        reader.consume(used);
        if line.len() > MAX_COMMAND_LEN {
            return Err(io::Error::new(io::ErrorKind::InvalidData, "command line too long"));
        }
        if done {
            return Ok(String::from_utf8_lossy(&line).into_owned());
        }
    }
}

struct Worker {
    state: Arc<ServerState>,
    handler: Handler,
    timeout: Duration,
    peer: SocketAddr,
}

impl Worker {
    fn spawn(self, mut reader: BufReader<TcpStream>, mut stream: TcpStream, tx: Sender<Outcome>) {
        std::thread::spawn(move || {
            let result = panic::catch_unwind(AssertUnwindSafe(|| -> Result<(), ProtocolError> {
                reader.get_ref().set_read_timeout(Some(self.timeout))?;
                (self.handler)(&self.state, &mut reader, &mut stream)
            }));
            let outcome = match result {
                Ok(Ok(())) => Outcome::Good,
                Ok(Err(e)) => {
                    log::warn!("{}: {}", self.peer, e);
                    let _ = writeln!(stream, "error: {}", e);
                    Outcome::Bad
                }
                Err(_) => {
                    log::error!("{}: worker crashed", self.peer);
                    let _ = writeln!(stream, "error: worker crashed");
                    Outcome::Crashed
                }
            };
            let _ = tx.send(outcome);
        });
    }
}

fn answer_query(
    state: &ServerState,
    reader: &mut BufReader<TcpStream>,
    stream: &mut TcpStream,
) -> Result<(), ProtocolError> {
    let query = read_query(reader)?;
    let params = query_params(&state.params, &query.options)?;
    let seq = DnaSeq::new(&query.name, &query.seq);

    let mut mask = DynaMask::new(params.dyna_limit_t, params.dyna_limit_q, params.dyna_word_coverage);
    let chains = align(&params, &state.indexes, &seq, &mut mask);

    let mut out = OutputWriter::new(BufWriter::new(stream), &params, &state.indexes, "server");
    out.write_query(&seq, &chains)?;
    out.flush()?;
    log::debug!("{}: {} chains", query.name, chains.len());
    Ok(())
}
