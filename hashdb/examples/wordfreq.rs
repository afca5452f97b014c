//! Counts word frequencies from stdin in a table file, then reopens the file
//! and prints every word in order of first appearance.
//!
//! ```text
//! cat README.md | cargo run --example wordfreq -- -n 8192 -b 4096
//! ```

use std::io::{self, BufRead};
use std::process::exit;

use hashdb::{HashDb, HashDbConfig, KeyEq, KeyHasher, MMapFile, Validation};

const DEFAULT_NODES: u64 = 8192;
const DEFAULT_BUCKETS: u64 = 4096;
/// Longest word kept; one more byte holds the terminating NUL.
const WORD_SIZE: usize = 127;

/// Polynomial hash over the bytes before the first NUL.
fn word_hash(key: &[u8]) -> u64 {
    key.iter()
        .take_while(|&&b| b != 0)
        .fold(0u64, |h, &b| h.wrapping_mul(31).wrapping_add(b as u64))
}

fn word_eq(lookup: &[u8], stored: &[u8]) -> bool {
    let end = |s: &[u8]| s.iter().position(|&b| b == 0).unwrap_or(s.len());
    lookup[..end(lookup)] == stored[..end(stored)]
}

fn usage(program: &str) -> ! {
    eprintln!("{program}: Usage");
    eprintln!("\t-n:  number of nodes in node table");
    eprintln!("\t-b:  number of buckets in hash table");
    exit(1);
}

fn parse_args() -> (u64, u64) {
    let mut args = std::env::args();
    let program = args.next().unwrap_or_else(|| "wordfreq".to_string());
    let (mut nodes, mut buckets) = (DEFAULT_NODES, DEFAULT_BUCKETS);
    while let Some(flag) = args.next() {
        let target = match flag.as_str() {
            "-n" => &mut nodes,
            "-b" => &mut buckets,
            _ => usage(&program),
        };
        *target = match args.next().map(|v| v.parse()) {
            Some(Ok(0)) => continue,
            Some(Ok(n)) => n,
            _ => usage(&program),
        };
    }
    (nodes, buckets)
}

fn bump<H: KeyHasher, E: KeyEq>(
    db: &mut HashDb<MMapFile, H, E>,
    word: &str,
    seen: &mut Vec<String>,
) -> hashdb::Result<()> {
    if word.is_empty() {
        return Ok(());
    }
    if word.len() >= WORD_SIZE {
        eprintln!("\"{word}\" too long");
        return Ok(());
    }

    if !db.contains_key(word.as_bytes())? {
        seen.push(word.to_string());
        db.set(word.as_bytes(), &0u64.to_ne_bytes())?;
    }
    let value = db.get_mut(word.as_bytes())?.into_value_mut();
    let mut count = [0u8; 8];
    count.copy_from_slice(value);
    value.copy_from_slice(&(u64::from_ne_bytes(count) + 1).to_ne_bytes());
    Ok(())
}

fn main() -> hashdb::Result<()> {
    let (nodes, buckets) = parse_args();
    let dir = tempfile::tempdir()?;
    let path = dir.path().join("wordfreq");

    let config = HashDbConfig::new(nodes, buckets, WORD_SIZE as u64 + 1, 8);
    let mut db = HashDb::create_with(&path, &config, word_hash, word_eq)?;
    let mut seen = Vec::new();

    for line in io::stdin().lock().lines() {
        let line = line?;
        for word in line.split(|c: char| !(c.is_ascii_alphabetic() || c == '_')) {
            bump(&mut db, word, &mut seen)?;
        }
    }
    db.close(false)?;

    let db = HashDb::open_with(&path, Validation::Sane, word_hash, word_eq)?;
    for word in &seen {
        let entry = db.get(word.as_bytes())?;
        let mut count = [0u8; 8];
        count.copy_from_slice(entry.value());
        println!("{}: {word}", u64::from_ne_bytes(count));
    }
    db.close(true)
}
