//! The three-subcommand CLI surface (spec §6.1): `compile`, `run`, `asm`.
//!
//! The lex/parse/codegen/driver pipeline is the in-scope core; invoking the
//! external assembler, linker, and emulator is the "toolchain wrapper"
//! collaborator the spec marks out of scope (§1). This module still has to
//! shell out to them to honor the documented CLI contract, but keeps that
//! logic to the thin process-spawning shim `original_source/compiler/pynux.py`
//! uses, rather than reimplementing any of their behavior.

use std::path::{Path, PathBuf};
use std::process::Command;

use clap::{Parser, Subcommand};
use tracing::info;

use crate::diagnostics::{DriverError, PynuxError};
use crate::driver;

#[derive(Parser)]
#[command(name = "pynuxc", about = "Pynux: Python-syntax source to ARM Thumb-2 assembly")]
pub struct Cli {
  #[command(subcommand)]
  pub command: PynuxCommand,

  /// Raise the log level (repeatable: -v info, -vv debug, -vvv trace).
  /// Ignored when RUST_LOG is set.
  #[arg(short, long, global = true, action = clap::ArgAction::Count)]
  pub verbose: u8,
}

#[derive(Subcommand)]
pub enum PynuxCommand {
  /// Compile to an ELF executable via the external assembler and linker.
  Compile {
    source: PathBuf,
    #[arg(short, long)]
    output: Option<PathBuf>,
    /// Also write the generated assembly alongside the source file.
    #[arg(long)]
    emit_asm: bool,
    /// Pipe the generated assembly through an external optimizer, if one
    /// is on PATH (spec §1 names the optimizer out of scope; this only
    /// controls whether the driver invokes it).
    #[arg(short = 'O', long, conflicts_with = "no_optimize")]
    optimize: bool,
    #[arg(long)]
    no_optimize: bool,
  },
  /// Compile, then run the result under the external emulator.
  Run {
    source: PathBuf,
    #[arg(long, default_value_t = 5)]
    timeout: u64,
    #[arg(short = 'O', long, conflicts_with = "no_optimize")]
    optimize: bool,
    #[arg(long)]
    no_optimize: bool,
  },
  /// Emit assembly only, no toolchain invocation.
  Asm {
    source: PathBuf,
    #[arg(short, long)]
    output: Option<PathBuf>,
  },
}

/// Default `tracing` filter directive for a `-v` repeat count, used when
/// `RUST_LOG` is unset (`-v` = info, `-vv` = debug, `-vvv`+ = trace).
pub fn verbosity_filter(verbose: u8) -> &'static str {
  match verbose {
    0 => "warn",
    1 => "info",
    2 => "debug",
    _ => "trace",
  }
}

/// Runs the resolved [`PynuxCommand`] and returns the process exit code (spec
/// §6.1: "Exit code 0 on success, non-zero on the first ... failure").
pub fn run(cli: Cli) -> i32 {
  let result = match cli.command {
    PynuxCommand::Compile { source, output, emit_asm, optimize, no_optimize } =>
      cmd_compile(&source, output.as_deref(), emit_asm, optimize && !no_optimize),
    PynuxCommand::Run { source, timeout, optimize, no_optimize } =>
      cmd_run(&source, timeout, optimize && !no_optimize),
    PynuxCommand::Asm { source, output } => cmd_asm(&source, output.as_deref()),
  };
  match result {
    Ok(()) => 0,
    Err(e) => { eprintln!("{}", e.diagnostic()); 1 }
  }
}

fn project_root_of(source: &Path) -> PathBuf {
  source.parent().map(Path::to_path_buf).unwrap_or_else(|| PathBuf::from("."))
}

fn require_exists(source: &Path) -> Result<(), PynuxError> {
  if source.exists() { return Ok(()) }
  Err(PynuxError::Driver(DriverError::Io {
    path: source.to_path_buf(),
    source: std::io::Error::new(std::io::ErrorKind::NotFound, "source file not found"),
  }))
}

fn find_runtime_dir() -> Result<PathBuf, DriverError> {
  for candidate in [PathBuf::from("runtime"), PathBuf::from("../runtime")] {
    if candidate.is_dir() { return Ok(candidate) }
  }
  Err(DriverError::Toolchain("cannot find runtime directory (expected ./runtime)".into()))
}

/// Invokes `arm-none-eabi-as`/`arm-none-eabi-ld` against the generated
/// assembly plus the runtime's `startup.s`/`io.s` and linker script,
/// mirroring `assemble_and_link` in the original driver.
fn assemble_and_link(asm_file: &Path, output: &Path, runtime_dir: &Path) -> Result<(), DriverError> {
  let tmp = tempfile::tempdir().map_err(|e| DriverError::Io { path: PathBuf::from("<tmpdir>"), source: e })?;

  let as_cmd = std::env::var("PYNUX_AS").unwrap_or_else(|_| "arm-none-eabi-as".to_string());
  let ld_cmd = std::env::var("PYNUX_LD").unwrap_or_else(|_| "arm-none-eabi-ld".to_string());

  let assemble = |src: &Path, obj: &Path| -> Result<(), DriverError> {
    let out = Command::new(&as_cmd)
      .args(["-mcpu=cortex-m3", "-mthumb", "-o"])
      .arg(obj)
      .arg(src)
      .output()
      .map_err(|_| DriverError::Toolchain(format!("{as_cmd} not found; install gcc-arm-none-eabi")))?;
    if !out.status.success() {
      return Err(DriverError::Toolchain(format!("assembling {}:\n{}", src.display(), String::from_utf8_lossy(&out.stderr))));
    }
    Ok(())
  };

  let startup_obj = tmp.path().join("startup.o");
  let io_obj = tmp.path().join("io.o");
  let main_obj = tmp.path().join("main.o");
  assemble(&runtime_dir.join("startup.s"), &startup_obj)?;
  assemble(&runtime_dir.join("io.s"), &io_obj)?;
  assemble(asm_file, &main_obj)?;

  let linker_script = runtime_dir.join("mps2-an385.ld");
  let out = Command::new(&ld_cmd)
    .args(["-T"])
    .arg(&linker_script)
    .arg("-o")
    .arg(output)
    .args([&startup_obj, &io_obj, &main_obj])
    .output()
    .map_err(|_| DriverError::Toolchain(format!("{ld_cmd} not found; install gcc-arm-none-eabi")))?;
  if !out.status.success() {
    return Err(DriverError::Toolchain(format!("linking:\n{}", String::from_utf8_lossy(&out.stderr))));
  }
  Ok(())
}

fn run_qemu(elf_file: &Path, timeout_secs: u64) -> Result<(), DriverError> {
  let qemu_cmd = std::env::var("PYNUX_QEMU").unwrap_or_else(|_| "qemu-system-arm".to_string());
  let mut child = Command::new(&qemu_cmd)
    .args(["-M", "mps2-an385", "-nographic", "-kernel"])
    .arg(elf_file)
    .args(["-semihosting-config", "enable=on,target=native"])
    .spawn()
    .map_err(|_| DriverError::Toolchain(format!("{qemu_cmd} not found; install qemu-system-arm")))?;

  // The program loops forever after `main` returns on bare metal, so a
  // timeout (rather than waiting for exit) is the expected way to stop it,
  // exactly as `original_source/compiler/pynux.py`'s `run_qemu` does.
  let deadline = std::time::Duration::from_secs(timeout_secs);
  let start = std::time::Instant::now();
  loop {
    if let Ok(Some(_)) = child.try_wait() { break }
    if start.elapsed() >= deadline { let _ = child.kill(); break }
    std::thread::sleep(std::time::Duration::from_millis(50));
  }
  Ok(())
}

/// Pipes `asm` through an external optimizer, if `optimize` is set and one
/// is found on `PATH` (spec §1 names the peephole/DCE optimizer out of
/// scope; this only controls whether the driver invokes it). Absent the
/// flag, or absent the binary, the assembly passes through unchanged.
fn run_optimizer(asm: String, optimize: bool) -> Result<String, DriverError> {
  if !optimize { return Ok(asm) }
  let optimizer_cmd = std::env::var("PYNUX_OPTIMIZE").unwrap_or_else(|_| "pynux-optimize".to_string());

  use std::io::Write;
  let mut child = match Command::new(&optimizer_cmd)
    .stdin(std::process::Stdio::piped())
    .stdout(std::process::Stdio::piped())
    .stderr(std::process::Stdio::piped())
    .spawn()
  {
    Ok(child) => child,
    Err(_) => { info!(optimizer_cmd = %optimizer_cmd, "optimizer not found on PATH, skipping"); return Ok(asm) }
  };

  child.stdin.take().expect("piped stdin").write_all(asm.as_bytes())
    .map_err(|e| DriverError::Io { path: PathBuf::from(&optimizer_cmd), source: e })?;
  let out = child.wait_with_output().map_err(|e| DriverError::Io { path: PathBuf::from(&optimizer_cmd), source: e })?;
  if !out.status.success() {
    return Err(DriverError::Toolchain(format!("optimizing:\n{}", String::from_utf8_lossy(&out.stderr))));
  }
  String::from_utf8(out.stdout).map_err(|_| DriverError::Toolchain("optimizer produced non-UTF-8 output".into()))
}

fn cmd_compile(source: &Path, output: Option<&Path>, emit_asm: bool, optimize: bool) -> Result<(), PynuxError> {
  require_exists(source)?;
  let root = project_root_of(source);
  let asm = driver::compile_with_imports(source, &root)?;
  let asm = run_optimizer(asm, optimize)?;

  let output = output.map(Path::to_path_buf).unwrap_or_else(|| source.with_extension("elf"));

  if emit_asm {
    let asm_path = source.with_extension("s");
    std::fs::write(&asm_path, &asm).map_err(|e| DriverError::Io { path: asm_path.clone(), source: e })?;
    info!(path = %asm_path.display(), "assembly written");
  }

  let runtime_dir = find_runtime_dir()?;
  let tmp = tempfile::NamedTempFile::new().map_err(|e| DriverError::Io { path: PathBuf::from("<tmp asm>"), source: e })?;
  std::fs::write(tmp.path(), &asm).map_err(|e| DriverError::Io { path: tmp.path().to_path_buf(), source: e })?;

  assemble_and_link(tmp.path(), &output, &runtime_dir)?;
  println!("Compiled to {}", output.display());
  Ok(())
}

fn cmd_run(source: &Path, timeout: u64, optimize: bool) -> Result<(), PynuxError> {
  require_exists(source)?;
  let root = project_root_of(source);
  let asm = driver::compile_with_imports(source, &root)?;
  let asm = run_optimizer(asm, optimize)?;
  let runtime_dir = find_runtime_dir()?;

  let tmp = tempfile::tempdir().map_err(|e| DriverError::Io { path: PathBuf::from("<tmpdir>"), source: e })?;
  let asm_file = tmp.path().join("main.s");
  std::fs::write(&asm_file, &asm).map_err(|e| DriverError::Io { path: asm_file.clone(), source: e })?;
  let elf_file = tmp.path().join("main.elf");
  assemble_and_link(&asm_file, &elf_file, &runtime_dir)?;

  println!("Running {} in QEMU (Ctrl+A, X to exit)...", source.display());
  run_qemu(&elf_file, timeout)?;
  Ok(())
}

fn cmd_asm(source: &Path, output: Option<&Path>) -> Result<(), PynuxError> {
  require_exists(source)?;
  let contents = std::fs::read_to_string(source).map_err(|e| DriverError::Io { path: source.to_path_buf(), source: e })?;
  let asm = driver::compile_source(&contents, &source.to_string_lossy())?;
  match output {
    Some(path) => std::fs::write(path, &asm).map_err(|e| DriverError::Io { path: path.to_path_buf(), source: e })?,
    None => println!("{asm}"),
  }
  Ok(())
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn project_root_of_uses_the_parent_directory() {
    assert_eq!(project_root_of(Path::new("/a/b/main.py")), PathBuf::from("/a/b"));
    assert_eq!(project_root_of(Path::new("main.py")), PathBuf::from("."));
  }

  #[test]
  fn require_exists_fails_for_a_missing_file() {
    let err = require_exists(Path::new("/no/such/file/pynux-cli-test.py"));
    assert!(err.is_err());
  }

  #[test]
  fn require_exists_succeeds_for_this_source_file() {
    assert!(require_exists(Path::new(file!())).is_ok());
  }
}
