use assert_cmd::Command;
use predicates::prelude::*;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::fs;
use std::path::Path;
use tempfile::TempDir;

fn random_seq(len: usize, seed: u64) -> Vec<u8> {
    let mut rng = StdRng::seed_from_u64(seed);
    (0..len).map(|_| b"ACGT"[rng.gen_range(0..4)]).collect()
}

fn write_fa(path: &Path, name: &str, seq: &[u8]) -> anyhow::Result<()> {
    let mut text = format!(">{}\n", name);
    for line in seq.chunks(60) {
        text.push_str(std::str::from_utf8(line)?);
        text.push('\n');
    }
    fs::write(path, text)?;
    Ok(())
}

/// A 200 bp target and a query carrying one point mutation.
fn mutated_pair(temp: &TempDir) -> anyhow::Result<(String, String)> {
    let target = random_seq(200, 41);
    let mut query = target.clone();
    query[150] = if query[150] == b'A' { b'C' } else { b'A' };

    let t_path = temp.path().join("target.fa");
    let q_path = temp.path().join("query.fa");
    write_fa(&t_path, "chrT", &target)?;
    write_fa(&q_path, "readQ", &query)?;
    Ok((
        t_path.to_string_lossy().into_owned(),
        q_path.to_string_lossy().into_owned(),
    ))
}

#[test]
fn command_align_chain() -> anyhow::Result<()> {
    let temp = TempDir::new()?;
    let (target, query) = mutated_pair(&temp)?;

    let mut cmd = Command::cargo_bin("blatz")?;
    let output = cmd
        .arg("align")
        .arg(&target)
        .arg(&query)
        .arg("stdout")
        .output()?;
    assert!(output.status.success());

    let stdout = String::from_utf8(output.stdout)?;
    let headers: Vec<&str> = stdout.lines().filter(|l| l.starts_with("chain ")).collect();
    assert_eq!(headers.len(), 1);

    let fields: Vec<&str> = headers[0].split_whitespace().collect();
    assert_eq!(&fields[2..7], &["chrT", "200", "+", "0", "200"]);
    assert_eq!(&fields[7..12], &["readQ", "200", "+", "0", "200"]);

    Ok(())
}

#[test]
fn command_align_psl_to_file() -> anyhow::Result<()> {
    let temp = TempDir::new()?;
    let (target, query) = mutated_pair(&temp)?;
    let outfile = temp.path().join("out.psl");

    let mut cmd = Command::cargo_bin("blatz")?;
    cmd.arg("align")
        .arg(&target)
        .arg(&query)
        .arg(&outfile)
        .arg("--out")
        .arg("psl");
    cmd.assert().success();

    let content = fs::read_to_string(&outfile)?;
    let lines: Vec<&str> = content.lines().collect();
    assert_eq!(lines.len(), 1);
    let fields: Vec<&str> = lines[0].split('\t').collect();
    assert_eq!(fields.len(), 21);
    assert_eq!(fields[0], "199");
    assert_eq!(fields[1], "1");
    assert_eq!(fields[8], "+");
    assert_eq!(fields[9], "readQ");
    assert_eq!(fields[13], "chrT");

    Ok(())
}

#[test]
fn command_align_masked_query() -> anyhow::Result<()> {
    let temp = TempDir::new()?;
    let target = random_seq(200, 41);
    let t_path = temp.path().join("target.fa");
    let q_path = temp.path().join("query.fa");
    write_fa(&t_path, "chrT", &target)?;
    write_fa(&q_path, "readQ", &target.to_ascii_lowercase())?;

    let mut cmd = Command::cargo_bin("blatz")?;
    cmd.arg("align")
        .arg(&t_path)
        .arg(&q_path)
        .arg("stdout");
    cmd.assert()
        .success()
        .stdout(predicate::str::is_empty())
        .stderr(predicate::str::contains("entirely masked"));

    Ok(())
}

#[test]
fn command_align_bad_weight() -> anyhow::Result<()> {
    let temp = TempDir::new()?;
    let (target, query) = mutated_pair(&temp)?;

    let mut cmd = Command::cargo_bin("blatz")?;
    cmd.arg("align")
        .arg(&target)
        .arg(&query)
        .arg("stdout")
        .arg("--weight")
        .arg("16");
    cmd.assert()
        .failure()
        .stderr(predicate::str::contains("out of range"));

    Ok(())
}

#[test]
fn command_align_unknown_format() -> anyhow::Result<()> {
    let temp = TempDir::new()?;
    let (target, query) = mutated_pair(&temp)?;

    let mut cmd = Command::cargo_bin("blatz")?;
    cmd.arg("align")
        .arg(&target)
        .arg(&query)
        .arg("stdout")
        .arg("--out")
        .arg("sam");
    cmd.assert()
        .failure()
        .stderr(predicate::str::contains("Unknown output format"));

    Ok(())
}

#[test]
fn command_align_blast9_header() -> anyhow::Result<()> {
    let temp = TempDir::new()?;
    let (target, query) = mutated_pair(&temp)?;

    let mut cmd = Command::cargo_bin("blatz")?;
    cmd.arg("align")
        .arg(&target)
        .arg(&query)
        .arg("stdout")
        .arg("--out")
        .arg("blast9");
    cmd.assert()
        .success()
        .stdout(predicate::str::contains("# Query: readQ\n"))
        .stdout(predicate::str::contains("readQ\tchrT\t99.50\t200\t1\t0\t1\t200\t1\t200\t"));

    Ok(())
}
