//! The line protocol between client and server.
//!
//! ```text
//! query
//! min-score 3000
//! out psl
//! seq
//! read_1
//! 1234
//! ACGT...
//! ```
//!
//! The first line is `status`, `stop` or `query`. A query lists option
//! overrides until `seq`, then the sequence name, its length in bytes and
//! exactly that many bytes of sequence.

use std::fmt;
use std::io::{self, BufRead, Read, Write};

use crate::libs::params::{AlignParams, ParamError, OPTIONS};
use crate::libs::seq::DnaSeq;

pub const DEFAULT_PORT: u16 = 17777;

#[derive(Debug)]
pub enum ProtocolError {
    Empty,
    UnknownCommand(String),
    ServerOnly(String),
    Param(ParamError),
    MissingSequence,
    BadLength(String),
    ShortSequence { expected: usize, got: usize },
    Io(io::Error),
}

impl fmt::Display for ProtocolError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProtocolError::Empty => write!(f, "Empty request"),
            ProtocolError::UnknownCommand(c) => write!(f, "Unknown command: {}", c),
            ProtocolError::ServerOnly(name) => {
                write!(f, "Option {} is fixed when the server starts", name)
            }
            ProtocolError::Param(e) => write!(f, "{}", e),
            ProtocolError::MissingSequence => write!(f, "Request ended before the sequence"),
            ProtocolError::BadLength(s) => write!(f, "Bad sequence length: '{}'", s),
            ProtocolError::ShortSequence { expected, got } => {
                write!(f, "Expected {} sequence bytes, got {}", expected, got)
            }
            ProtocolError::Io(e) => write!(f, "I/O error: {}", e),
        }
    }
}

impl std::error::Error for ProtocolError {}

impl From<io::Error> for ProtocolError {
    fn from(e: io::Error) -> Self {
        ProtocolError::Io(e)
    }
}

impl From<ParamError> for ProtocolError {
    fn from(e: ParamError) -> Self {
        ProtocolError::Param(e)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueryRequest {
    pub options: Vec<(String, String)>,
    pub name: String,
    pub seq: Vec<u8>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Request {
    Status,
    Stop,
    Query(QueryRequest),
}

/// The first line of a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    Status,
    Stop,
    Query,
}

/// Longest sequence accepted in one request.
pub const MAX_SEQ_LEN: usize = 1 << 31;

fn read_trimmed<R: BufRead + ?Sized>(reader: &mut R) -> Result<Option<String>, ProtocolError> {
    let mut line = String::new();
    if reader.read_line(&mut line)? == 0 {
        return Ok(None);
    }
    Ok(Some(line.trim().to_string()))
}

pub fn parse_command(line: &str) -> Result<Command, ProtocolError> {
    match line.trim() {
        "status" => Ok(Command::Status),
        "stop" => Ok(Command::Stop),
        "query" => Ok(Command::Query),
        "" => Err(ProtocolError::Empty),
        other => Err(ProtocolError::UnknownCommand(other.to_string())),
    }
}

pub fn read_command<R: BufRead + ?Sized>(reader: &mut R) -> Result<Command, ProtocolError> {
    let line = read_trimmed(reader)?.ok_or(ProtocolError::Empty)?;
    parse_command(&line)
}

/// Reads what follows a `query` line: overrides, name, length and sequence.
pub fn read_query<R: BufRead + ?Sized>(reader: &mut R) -> Result<QueryRequest, ProtocolError> {
    let mut options = vec![];
    loop {
        let line = read_trimmed(reader)?.ok_or(ProtocolError::MissingSequence)?;
        if line == "seq" {
            break;
        }
        if line.is_empty() {
            continue;
        }
        let (name, value) = line.split_once(' ').unwrap_or((line.as_str(), ""));
        options.push((name.to_string(), value.trim().to_string()));
    }

    let name = read_trimmed(reader)?.ok_or(ProtocolError::MissingSequence)?;
    let len_line = read_trimmed(reader)?.ok_or(ProtocolError::MissingSequence)?;
    let len = match len_line.parse::<usize>() {
        Ok(len) if len <= MAX_SEQ_LEN => len,
        _ => return Err(ProtocolError::BadLength(len_line)),
    };

    // grows with what actually arrives
    let mut seq = vec![];
    (&mut *reader).take(len as u64).read_to_end(&mut seq)?;
    if seq.len() < len {
        return Err(ProtocolError::ShortSequence {
            expected: len,
            got: seq.len(),
        });
    }

    Ok(QueryRequest {
        options,
        name,
        seq,
    })
}

pub fn read_request<R: BufRead + ?Sized>(reader: &mut R) -> Result<Request, ProtocolError> {
    Ok(match read_command(reader)? {
        Command::Status => Request::Status,
        Command::Stop => Request::Stop,
        Command::Query => Request::Query(read_query(reader)?),
    })
}

/// The server's defaults with a client's overrides applied.
pub fn query_params(
    base: &AlignParams,
    options: &[(String, String)],
) -> Result<AlignParams, ProtocolError> {
    let mut params = base.clone();
    for (name, value) in options {
        match OPTIONS.iter().find(|o| o.name == name.as_str()) {
            Some(o) if o.server_only => return Err(ProtocolError::ServerOnly(name.clone())),
            Some(_) => params.apply_option(name, value)?,
            None => return Err(ParamError::UnknownOption(name.clone()).into()),
        }
    }
    params.validate()?;
    Ok(params)
}

pub fn write_query<W: Write + ?Sized>(
    writer: &mut W,
    options: &[(String, String)],
    query: &DnaSeq,
) -> io::Result<()> {
    writeln!(writer, "query")?;
    for (name, value) in options {
        writeln!(writer, "{} {}", name, value)?;
    }
    writeln!(writer, "seq")?;
    writeln!(writer, "{}", query.name)?;
    writeln!(writer, "{}", query.len())?;
    writer.write_all(&query.seq)?;
    writer.flush()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn query_round_trip() {
        let seq = DnaSeq::new("read 1", b"ACGTNNacgt");
        let options = vec![
            ("min-score".to_string(), "3000".to_string()),
            ("transition".to_string(), "".to_string()),
        ];
        let mut buf = vec![];
        write_query(&mut buf, &options, &seq).unwrap();

        let req = read_request(&mut Cursor::new(buf)).unwrap();
        assert_eq!(
            req,
            Request::Query(QueryRequest {
                options,
                name: "read 1".to_string(),
                seq: b"ACGTNNacgt".to_vec(),
            })
        );
    }

    #[test]
    fn simple_commands() {
        assert_eq!(
            read_request(&mut Cursor::new("status\n")).unwrap(),
            Request::Status
        );
        assert_eq!(read_request(&mut Cursor::new("stop")).unwrap(), Request::Stop);
        assert!(matches!(
            read_request(&mut Cursor::new("")),
            Err(ProtocolError::Empty)
        ));
        assert!(matches!(
            read_request(&mut Cursor::new("hello\n")),
            Err(ProtocolError::UnknownCommand(_))
        ));
    }

    #[test]
    fn malformed_queries() {
        assert!(matches!(
            read_request(&mut Cursor::new("query\nout psl\n")),
            Err(ProtocolError::MissingSequence)
        ));
        assert!(matches!(
            read_request(&mut Cursor::new("query\nseq\nq\nten\nACGT")),
            Err(ProtocolError::BadLength(_))
        ));
        assert!(matches!(
            read_request(&mut Cursor::new("query\nseq\nq\n18446744073709551615\nACGT")),
            Err(ProtocolError::BadLength(_))
        ));
        assert!(matches!(
            read_request(&mut Cursor::new(format!("query\nseq\nq\n{}\nACGT", MAX_SEQ_LEN + 1))),
            Err(ProtocolError::BadLength(_))
        ));
        assert!(matches!(
            read_request(&mut Cursor::new("query\nseq\nq\n10\nACGT")),
            Err(ProtocolError::ShortSequence {
                expected: 10,
                got: 4
            })
        ));
    }

    #[test]
    fn command_then_body() {
        let mut reader = Cursor::new("query\nout psl\nseq\nq\n4\nACGT");
        assert_eq!(read_command(&mut reader).unwrap(), Command::Query);
        let query = read_query(&mut reader).unwrap();
        assert_eq!(query.options, vec![("out".to_string(), "psl".to_string())]);
        assert_eq!(query.seq, b"ACGT".to_vec());

        assert_eq!(parse_command("stop\r\n").unwrap(), Command::Stop);
        assert!(matches!(parse_command("  "), Err(ProtocolError::Empty)));
    }

    #[test]
    fn overrides_respect_server_options() {
        let base = AlignParams::default();
        let p = query_params(&base, &[("min-score".into(), "100".into())]).unwrap();
        assert_eq!(p.min_score, 100);
        assert_eq!(base.min_score, 4000);

        assert!(matches!(
            query_params(&base, &[("weight".into(), "12".into())]),
            Err(ProtocolError::ServerOnly(_))
        ));
        assert!(matches!(
            query_params(&base, &[("colour".into(), "red".into())]),
            Err(ProtocolError::Param(ParamError::UnknownOption(_)))
        ));
        assert!(matches!(
            query_params(&base, &[("out".into(), "sam".into())]),
            Err(ProtocolError::Param(ParamError::UnknownFormat(_)))
        ));
    }
}
