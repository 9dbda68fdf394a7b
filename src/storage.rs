use chrono::Local;
use std::env;
use std::fmt;
use std::fs::{self, OpenOptions};
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Resolve the data directory from `XDG_DATA_HOME`, falling back to
/// `$HOME/.local/share`.
fn data_dir_from(xdg_data_home: Option<String>, home: Option<String>) -> Option<PathBuf> {
    xdg_data_home
        .and_then(|path| {
            if path.is_empty() {
                None
            } else {
                Some(PathBuf::from(path))
            }
        })
        .or_else(|| home.map(|home| PathBuf::from(home).join(".local/share")))
        .map(|dir| dir.join("ulam"))
}

pub fn get_ulam_data_dir() -> io::Result<PathBuf> {
    data_dir_from(env::var("XDG_DATA_HOME").ok(), env::var("HOME").ok()).ok_or_else(|| {
        io::Error::new(
            io::ErrorKind::NotFound,
            "could not determine data directory (XDG_DATA_HOME and HOME unset)",
        )
    })
}

/// One finished CLI run, as recorded in the execution log.
#[derive(Debug, Clone, Copy)]
pub struct RunRecord<'a> {
    pub subcommand: &'a str,
    /// The size or limit the run was given.
    pub input: usize,
    pub workers: usize,
    pub elapsed: Duration,
}

impl fmt::Display for RunRecord<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} | {} | w{} | {}us",
            self.subcommand,
            self.input,
            self.workers,
            self.elapsed.as_micros()
        )
    }
}

const EXECUTION_LOG: &str = "execution_log.txt";

/// Append `record` to the execution log in the data directory.
pub fn log_execution(record: &RunRecord<'_>) -> io::Result<()> {
    append_record(&get_ulam_data_dir()?, record)
}

fn append_record(data_dir: &Path, record: &RunRecord<'_>) -> io::Result<()> {
    fs::create_dir_all(data_dir)?;
    let mut log = OpenOptions::new()
        .create(true)
        .append(true)
        .open(data_dir.join(EXECUTION_LOG))?;
    writeln!(log, "{} | {}", Local::now().format("%Y-%m-%d %H:%M:%S"), record)
}

/// Write primes one per line. Formats into a reusable string with `itoa` and
/// hands it to the writer in large batches.
/// Returns the count of primes written
pub fn write_primes<W: Write>(out: W, primes: &[usize]) -> io::Result<usize> {
    const BATCH: usize = 64 * 1024;

    let mut writer = BufWriter::with_capacity(128 * 1024, out);
    // avg ~10 bytes per prime with newline
    let mut string_buffer = String::with_capacity(BATCH.min(primes.len()) * 11);
    let mut itoa_buf = itoa::Buffer::new();

    for batch in primes.chunks(BATCH) {
        string_buffer.clear();
        for &prime in batch {
            string_buffer.push_str(itoa_buf.format(prime));
            string_buffer.push('\n');
        }
        writer.write_all(string_buffer.as_bytes())?;
    }

    writer.flush()?;
    Ok(primes.len())
}
