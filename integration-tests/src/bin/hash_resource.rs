//! Demo program: hash resource files named relative to the working directory
//!
//! Usage: hash-resource <relative-path>...
//! Outputs: SHA256:<hex_hash> <relative-path> (one line per file)
//!
//! Absolute paths are refused, so a successful run proves the launcher
//! switched into the install directory first.

use sha2::{Digest, Sha256};
use std::env;
use std::fs::File;
use std::io::{self, BufReader, Read};
use std::path::Path;
use std::process::ExitCode;

fn hash_file(path: &Path) -> io::Result<String> {
    let mut reader = BufReader::new(File::open(path)?);
    let mut hasher = Sha256::new();
    let mut buffer = [0u8; 8192];

    loop {
        let n = reader.read(&mut buffer)?;
        if n == 0 {
            break;
        }
        hasher.update(&buffer[..n]);
    }

    Ok(format!("{:x}", hasher.finalize()))
}

fn main() -> ExitCode {
    let args: Vec<String> = env::args().collect();

    if args.len() < 2 {
        eprintln!("Usage: {} <relative-path>...", args[0]);
        return ExitCode::from(1);
    }

    for name in &args[1..] {
        let path = Path::new(name);
        if path.is_absolute() {
            eprintln!("Refusing absolute path '{}'", name);
            return ExitCode::from(2);
        }

        match hash_file(path) {
            Ok(hash) => println!("SHA256:{} {}", hash, name),
            Err(e) => {
                eprintln!("Error hashing '{}': {}", name, e);
                return ExitCode::from(1);
            }
        }
    }

    ExitCode::SUCCESS
}
