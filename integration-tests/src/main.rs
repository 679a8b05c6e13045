//! Test runner for the launcher
//!
//! This test runner validates the launcher end to end by:
//! 1. Laying out an install directory with the launcher and a demo program
//!    copied in as `core`
//! 2. Running the launcher from somewhere else, with a controlled library
//!    search path
//! 3. Checking what the demo program saw: argv, working directory, search
//!    path, exit status
//!
//! Usage: test-runner --launcher <path> --test-binaries <dir> [--work-dir <dir>]

use serde_json::Value;
use sha2::{Digest, Sha256};
use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::process::{Command, ExitCode};

/// Executable extension
#[cfg(windows)]
const EXE_EXT: &str = ".exe";
#[cfg(not(windows))]
const EXE_EXT: &str = "";

#[cfg(target_os = "linux")]
const LIBRARY_PATH_VAR: &str = "LD_LIBRARY_PATH";
#[cfg(target_os = "macos")]
const LIBRARY_PATH_VAR: &str = "DYLD_LIBRARY_PATH";
#[cfg(windows)]
const LIBRARY_PATH_VAR: &str = "PATH";

#[cfg(windows)]
const LIST_SEP: &str = ";";
#[cfg(not(windows))]
const LIST_SEP: &str = ":";

/// Test configuration
struct TestConfig {
    /// Path to the built launcher binary
    launcher_path: PathBuf,
    /// Directory containing the demo programs (print-env, hash-resource)
    test_binaries_dir: PathBuf,
    /// Working directory for test artifacts
    work_dir: PathBuf,
}

/// One install directory: launcher plus whatever `core` the test picks
struct Install {
    /// Canonical install directory
    dir: PathBuf,
    /// Path of the copied launcher
    launcher: PathBuf,
}

/// Captured result of one launcher run
struct RunOutput {
    stdout: String,
    stderr: String,
    exit_code: i32,
}

impl TestConfig {
    fn from_args() -> Result<Self, String> {
        let args: Vec<String> = env::args().collect();

        let mut launcher_path = None;
        let mut test_binaries_dir = None;
        let mut work_dir = None;

        let mut i = 1;
        while i < args.len() {
            match args[i].as_str() {
                "--launcher" | "--test-binaries" | "--work-dir" if i + 1 >= args.len() => {
                    return Err(format!("{} needs a value", args[i]));
                }
                "--launcher" => {
                    i += 1;
                    launcher_path = Some(PathBuf::from(&args[i]));
                }
                "--test-binaries" => {
                    i += 1;
                    test_binaries_dir = Some(PathBuf::from(&args[i]));
                }
                "--work-dir" => {
                    i += 1;
                    work_dir = Some(PathBuf::from(&args[i]));
                }
                "--help" | "-h" => {
                    println!("Usage: test-runner --launcher <path> --test-binaries <dir> [--work-dir <dir>]");
                    println!();
                    println!("Options:");
                    println!("  --launcher       Path to the launcher binary");
                    println!("  --test-binaries  Directory containing print-env and hash-resource");
                    println!("  --work-dir       Working directory for test artifacts (default: temp dir)");
                    std::process::exit(0);
                }
                _ => {
                    return Err(format!("Unknown argument: {}", args[i]));
                }
            }
            i += 1;
        }

        let launcher_path = launcher_path.ok_or("--launcher is required")?;
        let test_binaries_dir = test_binaries_dir.ok_or("--test-binaries is required")?;
        let work_dir = work_dir.unwrap_or_else(|| env::temp_dir().join("launcher-tests"));

        if !launcher_path.exists() {
            return Err(format!("Launcher not found: {}", launcher_path.display()));
        }
        if !test_binaries_dir.exists() {
            return Err(format!("Test binaries dir not found: {}", test_binaries_dir.display()));
        }

        Ok(Self {
            launcher_path,
            test_binaries_dir,
            work_dir,
        })
    }

    fn demo_binary(&self, name: &str) -> PathBuf {
        self.test_binaries_dir.join(format!("{}{}", name, EXE_EXT))
    }
}

impl Install {
    /// Create `<base>/<name>/` holding a copy of the launcher
    fn new(config: &TestConfig, name: &str) -> Result<Self, String> {
        let dir = config.work_dir.join(name);
        fs::create_dir_all(&dir).map_err(|e| format!("Failed to create install dir: {}", e))?;

        // The launcher sees its directory through the resolved (canonical)
        // path, so compare against that form
        let dir = fs::canonicalize(&dir).map_err(|e| format!("Failed to canonicalize install dir: {}", e))?;

        let launcher = dir.join(format!("launcher{}", EXE_EXT));
        copy_executable(&config.launcher_path, &launcher)?;

        Ok(Self { dir, launcher })
    }

    fn core_path(&self) -> PathBuf {
        self.dir.join(format!("core{}", EXE_EXT))
    }

    /// Install a demo program as the sibling `core`
    fn add_core(&self, source: &Path) -> Result<(), String> {
        copy_executable(source, &self.core_path())
    }

    /// Add a resource file relative to the install directory
    fn add_file_content(&self, relative: &str, content: &[u8]) -> Result<(), String> {
        let dest = self.dir.join(relative);
        if let Some(parent) = dest.parent() {
            fs::create_dir_all(parent).map_err(|e| format!("Failed to create {}: {}", parent.display(), e))?;
        }
        fs::write(&dest, content).map_err(|e| format!("Failed to write {}: {}", dest.display(), e))
    }
}

fn copy_executable(source: &Path, dest: &Path) -> Result<(), String> {
    fs::copy(source, dest)
        .map_err(|e| format!("Failed to copy {} to {}: {}", source.display(), dest.display(), e))?;

    // Make executable on Unix
    #[cfg(unix)]
    set_mode(dest, 0o755)?;

    Ok(())
}

#[cfg(unix)]
fn set_mode(path: &Path, mode: u32) -> Result<(), String> {
    use std::os::unix::fs::PermissionsExt;
    let mut perms = fs::metadata(path)
        .map_err(|e| format!("Failed to get permissions: {}", e))?
        .permissions();
    perms.set_mode(mode);
    fs::set_permissions(path, perms).map_err(|e| format!("Failed to set permissions: {}", e))
}

/// Run a launcher from `cwd` with the library search path set (or removed)
fn run_launcher(
    launcher: &Path,
    cwd: &Path,
    args: &[&str],
    library_path: Option<&str>,
) -> Result<RunOutput, String> {
    let mut cmd = Command::new(launcher);
    cmd.current_dir(cwd);
    cmd.env("LAUNCHER_TEST_MARKER", "inherited");

    match library_path {
        Some(value) => {
            cmd.env(LIBRARY_PATH_VAR, value);
        }
        None => {
            cmd.env_remove(LIBRARY_PATH_VAR);
        }
    }

    cmd.args(args);

    let output = cmd.output().map_err(|e| format!("Failed to run launcher: {}", e))?;

    Ok(RunOutput {
        stdout: String::from_utf8_lossy(&output.stdout).to_string(),
        stderr: String::from_utf8_lossy(&output.stderr).to_string(),
        exit_code: output.status.code().unwrap_or(-1),
    })
}

/// Parse the JSON report printed by print-env
fn parse_report(output: &RunOutput) -> Result<Value, String> {
    if output.exit_code != 0 {
        return Err(format!(
            "Launcher failed with exit code {}: {}",
            output.exit_code, output.stderr
        ));
    }
    serde_json::from_str(output.stdout.trim())
        .map_err(|e| format!("Bad report ({}): {}", e, output.stdout))
}

fn report_args(report: &Value) -> Result<Vec<String>, String> {
    report["args"]
        .as_array()
        .ok_or_else(|| format!("Report has no args: {}", report))?
        .iter()
        .map(|v| {
            v.as_str()
                .map(str::to_string)
                .ok_or_else(|| format!("Non-string arg in report: {}", v))
        })
        .collect()
}

fn expect_eq<T: PartialEq + std::fmt::Debug>(what: &str, actual: T, expected: T) -> Result<(), String> {
    if actual != expected {
        return Err(format!("{}: expected {:?}, got {:?}", what, expected, actual));
    }
    Ok(())
}

fn path_str(path: &Path) -> String {
    path.to_string_lossy().into_owned()
}

/// Test: flags are forwarded, cwd and search path point at the install dir
fn test_forward_args_no_prior_search_path(config: &TestConfig) -> Result<(), String> {
    println!("  Running test: forward_args_no_prior_search_path");

    let install = Install::new(config, "test_forward_args")?;
    install.add_core(&config.demo_binary("print-env"))?;

    let output = run_launcher(&install.launcher, &config.work_dir, &["--flag", "value"], None)?;
    let report = parse_report(&output)?;

    let args = report_args(&report)?;
    expect_eq("argc", args.len(), 3)?;
    expect_eq("forwarded args", &args[1..], &["--flag".to_string(), "value".to_string()][..])?;

    // argv[0] can only be rewritten where exec replaces the process
    #[cfg(unix)]
    expect_eq("argv[0]", args[0].clone(), path_str(&install.core_path()))?;

    expect_eq("cwd", report["cwd"].as_str(), Some(path_str(&install.dir).as_str()))?;
    expect_eq(
        LIBRARY_PATH_VAR,
        report["library_path"].as_str(),
        Some(path_str(&install.dir).as_str()),
    )?;
    expect_eq("inherited env", report["env"]["LAUNCHER_TEST_MARKER"].as_str(), Some("inherited"))?;

    println!("    PASS");

    Ok(())
}

/// Test: an existing search path keeps its entries behind the install dir
fn test_prior_search_path(config: &TestConfig) -> Result<(), String> {
    println!("  Running test: prior_search_path");

    let install = Install::new(config, "test_prior_search_path")?;
    install.add_core(&config.demo_binary("print-env"))?;

    let prior = format!("/usr/lib{}/opt/other/lib", LIST_SEP);
    let output = run_launcher(&install.launcher, &config.work_dir, &[], Some(&prior))?;
    let report = parse_report(&output)?;

    let expected = format!("{}{}{}", path_str(&install.dir), LIST_SEP, prior);
    expect_eq(LIBRARY_PATH_VAR, report["library_path"].as_str(), Some(expected.as_str()))?;
    expect_eq("argc", report["argc"].as_u64(), Some(1))?;

    println!("    PASS (prior value kept)");

    // An empty variable counts as unset
    let output = run_launcher(&install.launcher, &config.work_dir, &[], Some(""))?;
    let report = parse_report(&output)?;
    expect_eq(
        LIBRARY_PATH_VAR,
        report["library_path"].as_str(),
        Some(path_str(&install.dir).as_str()),
    )?;

    println!("    PASS (empty value)");

    Ok(())
}

/// Test: awkward arguments arrive byte-for-byte and in order
fn test_unusual_arguments(config: &TestConfig) -> Result<(), String> {
    println!("  Running test: unusual_arguments");

    let install = Install::new(config, "test_unusual_args")?;
    install.add_core(&config.demo_binary("print-env"))?;

    let forwarded = ["", "with space", "--key=a=b", "ünïcödé", "", "-"];
    let output = run_launcher(&install.launcher, &config.work_dir, &forwarded, None)?;
    let report = parse_report(&output)?;

    let args = report_args(&report)?;
    let expected: Vec<String> = forwarded.iter().map(|s| s.to_string()).collect();
    expect_eq("forwarded args", args[1..].to_vec(), expected)?;

    println!("    PASS");

    Ok(())
}

/// Test: core finds its resources through relative paths
fn test_relative_resources(config: &TestConfig) -> Result<(), String> {
    println!("  Running test: relative_resources");

    let install = Install::new(config, "test_relative_resources")?;
    install.add_core(&config.demo_binary("hash-resource"))?;

    let content = b"Hello, World!\n";
    install.add_file_content("data/sample.txt", content)?;

    let output = run_launcher(&install.launcher, &config.work_dir, &["data/sample.txt"], None)?;
    if output.exit_code != 0 {
        return Err(format!(
            "Launcher failed with exit code {}: {}",
            output.exit_code, output.stderr
        ));
    }

    let expected = format!("SHA256:{:x} data/sample.txt", Sha256::digest(content));
    expect_eq("hash line", output.stdout.trim(), expected.as_str())?;

    println!("    PASS");

    Ok(())
}

/// Test: the exit status is the core binary's own
fn test_exit_status_propagation(config: &TestConfig) -> Result<(), String> {
    println!("  Running test: exit_status_propagation");

    let install = Install::new(config, "test_exit_status")?;
    install.add_core(&config.demo_binary("print-env"))?;

    let output = run_launcher(&install.launcher, &config.work_dir, &["--exit-with", "7"], None)?;
    expect_eq("exit code", output.exit_code, 7)?;

    println!("    PASS");

    Ok(())
}

/// Test: no sibling core means a single diagnostic and status 1
fn test_missing_core(config: &TestConfig) -> Result<(), String> {
    println!("  Running test: missing_core");

    let install = Install::new(config, "test_missing_core")?;

    let output = run_launcher(&install.launcher, &config.work_dir, &["--flag"], None)?;
    expect_eq("exit code", output.exit_code, 1)?;

    let expected = format!("ERROR: exec of {} failed:", path_str(&install.core_path()));
    if !output.stderr.starts_with(&expected) {
        return Err(format!("Expected diagnostic starting with '{}', got: {}", expected, output.stderr));
    }
    expect_eq("diagnostic lines", output.stderr.lines().count(), 1)?;
    expect_eq("stdout", output.stdout.as_str(), "")?;

    println!("    PASS");

    Ok(())
}

/// Test: a core without execute permission fails the same way
#[cfg(unix)]
fn test_non_executable_core(config: &TestConfig) -> Result<(), String> {
    println!("  Running test: non_executable_core");

    let install = Install::new(config, "test_non_executable_core")?;
    install.add_core(&config.demo_binary("print-env"))?;
    set_mode(&install.core_path(), 0o644)?;

    let output = run_launcher(&install.launcher, &config.work_dir, &[], None)?;
    expect_eq("exit code", output.exit_code, 1)?;

    if !output.stderr.contains("ERROR: exec of") || !output.stderr.contains("Permission denied") {
        return Err(format!("Unexpected diagnostic: {}", output.stderr));
    }

    println!("    PASS");

    Ok(())
}

/// Test: launching through a symlink still uses the real install dir
#[cfg(unix)]
fn test_symlinked_launcher(config: &TestConfig) -> Result<(), String> {
    println!("  Running test: symlinked_launcher");

    let install = Install::new(config, "test_symlink_install")?;
    install.add_core(&config.demo_binary("print-env"))?;

    let link_dir = config.work_dir.join("test_symlink_bin");
    fs::create_dir_all(&link_dir).map_err(|e| format!("Failed to create link dir: {}", e))?;
    let link = link_dir.join("launcher");
    std::os::unix::fs::symlink(&install.launcher, &link)
        .map_err(|e| format!("Failed to create symlink: {}", e))?;

    let output = run_launcher(&link, &config.work_dir, &["via-link"], None)?;
    let report = parse_report(&output)?;

    expect_eq("cwd", report["cwd"].as_str(), Some(path_str(&install.dir).as_str()))?;
    let args = report_args(&report)?;
    expect_eq("argv[0]", args[0].clone(), path_str(&install.core_path()))?;
    expect_eq("argv[1]", args[1].as_str(), "via-link")?;

    println!("    PASS");

    Ok(())
}

fn main() -> ExitCode {
    println!("=== Launcher Test Suite ===");
    println!();

    let config = match TestConfig::from_args() {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Error: {}", e);
            eprintln!("Use --help for usage information");
            return ExitCode::from(1);
        }
    };

    // Clean and recreate work directory
    if config.work_dir.exists() {
        if let Err(e) = fs::remove_dir_all(&config.work_dir) {
            eprintln!("Warning: Failed to clean work dir: {}", e);
        }
    }
    if let Err(e) = fs::create_dir_all(&config.work_dir) {
        eprintln!("Error: Failed to create work dir: {}", e);
        return ExitCode::from(1);
    }

    println!("Configuration:");
    println!("  Launcher:      {}", config.launcher_path.display());
    println!("  Test binaries: {}", config.test_binaries_dir.display());
    println!("  Work dir:      {}", config.work_dir.display());
    println!();

    #[allow(unused_mut)]
    let mut tests: Vec<(&str, fn(&TestConfig) -> Result<(), String>)> = vec![
        ("forward_args_no_prior_search_path", test_forward_args_no_prior_search_path),
        ("prior_search_path", test_prior_search_path),
        ("unusual_arguments", test_unusual_arguments),
        ("relative_resources", test_relative_resources),
        ("exit_status_propagation", test_exit_status_propagation),
        ("missing_core", test_missing_core),
    ];

    #[cfg(unix)]
    {
        tests.push(("non_executable_core", test_non_executable_core));
        tests.push(("symlinked_launcher", test_symlinked_launcher));
    }

    let mut passed = 0;
    let mut failed = 0;

    println!("Running {} tests...", tests.len());
    println!();

    for (name, test_fn) in &tests {
        match test_fn(&config) {
            Ok(()) => {
                passed += 1;
            }
            Err(e) => {
                println!("  FAILED ({}): {}", name, e);
                failed += 1;
            }
        }
    }

    println!();
    println!("=== Results ===");
    println!("Passed: {}", passed);
    println!("Failed: {}", failed);
    println!();

    if failed > 0 {
        ExitCode::from(1)
    } else {
        println!("All tests passed!");
        ExitCode::SUCCESS
    }
}
