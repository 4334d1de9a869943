//! Build automation for the dblib statement workspace.
//!
//! Invoke through `cargo xtask <command>`.
//!
//! ## Available Commands
//!
//! - `ci`: Format check, clippy and tests
//! - `fmt`: rustfmt check, or apply with `--fix`
//! - `clippy`: Lint every target with warnings denied
//! - `test`: Run tests
//! - `doc`: Build rustdoc for the workspace crates
//! - `bench`: Run the materialization benchmarks
//! - `fuzz`: Run a fuzz target (requires cargo-fuzz + nightly)
//! - `type-table`: Print the wire type table used for column metadata

use std::fs;
use std::path::PathBuf;

use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand};
use dblib_types::{TypeId, native_type_name};
use xshell::{Shell, cmd};

#[derive(Parser)]
#[command(name = "xtask", about = "Build automation for the dblib statement crates")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run format check, clippy and tests
    Ci,
    /// Check formatting
    Fmt {
        /// Rewrite files instead of checking
        #[arg(long)]
        fix: bool,
    },
    /// Run clippy on every target
    Clippy,
    /// Run tests
    Test {
        /// Restrict to one package
        #[arg(short, long)]
        package: Option<String>,
        /// Only run tests whose name matches
        filter: Option<String>,
    },
    /// Build rustdoc
    Doc {
        /// Open the rendered docs
        #[arg(long)]
        open: bool,
    },
    /// Run benchmarks
    Bench {
        /// Only run benchmarks whose name matches
        filter: Option<String>,
    },
    /// Run a fuzz target (requires cargo-fuzz + nightly)
    Fuzz {
        /// Fuzz target to run
        #[arg(default_value = "materialize")]
        target: String,
        /// Time limit in seconds
        #[arg(long, default_value_t = 300)]
        max_time: u64,
        /// Print the fuzz targets and exit
        #[arg(long)]
        list: bool,
    },
    /// Print wire codes with their metadata names
    TypeTable,
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    let sh = Shell::new()?;
    sh.change_dir(workspace_root()?);

    match cli.command {
        Command::Ci => {
            println!("== ci ==");
            fmt(&sh, false)?;
            clippy(&sh)?;
            test(&sh, None, None)?;
            println!("ci: ok");
        }
        Command::Fmt { fix } => fmt(&sh, fix)?,
        Command::Clippy => clippy(&sh)?,
        Command::Test { package, filter } => test(&sh, package.as_deref(), filter.as_deref())?,
        Command::Doc { open } => doc(&sh, open)?,
        Command::Bench { filter } => bench(&sh, filter.as_deref())?,
        Command::Fuzz {
            target,
            max_time,
            list,
        } => fuzz(&sh, &target, max_time, list)?,
        Command::TypeTable => type_table(),
    }

    Ok(())
}

fn workspace_root() -> Result<PathBuf> {
    let located = std::process::Command::new("cargo")
        .args(["locate-project", "--workspace", "--message-format=plain"])
        .output()
        .context("cargo locate-project did not run")?;

    let path = String::from_utf8(located.stdout).context("invalid UTF-8 in cargo output")?;

    Ok(PathBuf::from(path.trim())
        .parent()
        .context("manifest path has no parent")?
        .to_path_buf())
}

fn fmt(sh: &Shell, fix: bool) -> Result<()> {
    let check = (!fix).then_some("--check");
    cmd!(sh, "cargo fmt --all -- {check...}").run()?;
    Ok(())
}

fn clippy(sh: &Shell) -> Result<()> {
    cmd!(sh, "cargo clippy --workspace --all-targets -- -D warnings").run()?;
    Ok(())
}

fn test(sh: &Shell, package: Option<&str>, filter: Option<&str>) -> Result<()> {
    let package = package.map(|p| ["-p", p]);
    let package = package.iter().flatten();
    let filter = filter.iter();
    cmd!(sh, "cargo test --workspace {package...} -- {filter...}").run()?;
    Ok(())
}

fn doc(sh: &Shell, open: bool) -> Result<()> {
    let open = open.then_some("--open");
    cmd!(sh, "cargo doc --workspace --no-deps {open...}").run()?;
    Ok(())
}

fn bench(sh: &Shell, filter: Option<&str>) -> Result<()> {
    let filter = filter.iter();
    cmd!(sh, "cargo bench -p dblib-types -- {filter...}").run()?;
    Ok(())
}

fn fuzz(sh: &Shell, target: &str, max_time: u64, list: bool) -> Result<()> {
    let targets_dir = sh.current_dir().join("fuzz").join("fuzz_targets");
    let mut targets = Vec::new();
    for entry in fs::read_dir(&targets_dir).context("fuzz/fuzz_targets not found")? {
        if let Some(name) = entry?.path().file_stem() {
            targets.push(name.to_string_lossy().into_owned());
        }
    }
    targets.sort();

    if list {
        println!("fuzz targets:");
        for name in &targets {
            println!("  - {name}");
        }
        return Ok(());
    }

    if !targets.iter().any(|t| t == target) {
        bail!("unknown fuzz target {target}; available: {}", targets.join(", "));
    }

    println!("Running fuzz target {target} for {max_time}s");
    let _dir = sh.push_dir("fuzz");
    let max_time = max_time.to_string();
    cmd!(sh, "cargo +nightly fuzz run {target} -- -max_total_time={max_time}").run()?;
    Ok(())
}

fn type_table() {
    println!("{:>6}  {:<18}  {:<16}", "code", "variant", "native type");
    for code in 0..=255 {
        if let Some(ty) = TypeId::from_code(code) {
            println!(
                "{:>#6x}  {:<18}  {:<16}",
                code,
                format!("{ty:?}"),
                native_type_name(code)
            );
        }
    }
}
