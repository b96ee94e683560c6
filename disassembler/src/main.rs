use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use clap::Parser;
use serde::Serialize;

use rbgi_nls::Encoding;
use rbgi_script::disasm;
use rbgi_script::error::DecodeError;
use rbgi_script::records::RegistryFile;
use rbgi_script::registry::Registry;
use rbgi_script::walk::{walk, ScriptWalk, WalkEnd};

/// Static disassembler for compiled BGI/Ethornell scripts.
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Args {
    /// Compiled script file.
    #[arg(short, long, required = true)]
    input: PathBuf,

    /// Absolute file offset of the first instruction.
    #[arg(short, long, default_value_t = 0)]
    base_offset: u64,

    /// Opcode table in YAML form, replacing the built-in BGI table.
    #[arg(short, long)]
    registry: Option<PathBuf>,

    /// String encoding for the built-in table: sjis, gbk or utf8.
    #[arg(short, long)]
    lang: Option<Encoding>,

    /// Listing file. Written to stdout when absent.
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Walk report (end state, branch diagnostics) in YAML form.
    #[arg(long)]
    report: Option<PathBuf>,
}

#[derive(Debug, Serialize)]
struct Report {
    end: &'static str,
    instructions: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<ErrorReport>,
    dangling_branches: Vec<DanglingReport>,
}

#[derive(Debug, Serialize)]
struct ErrorReport {
    offset: u64,
    message: String,
}

#[derive(Debug, Serialize)]
struct DanglingReport {
    from: u64,
    target: u64,
    mid_instruction: bool,
}

impl Report {
    fn from_walk(walk: &ScriptWalk) -> Self {
        let end = match &walk.end {
            WalkEnd::EndScript => "end_script",
            WalkEnd::EndOfRange => "end_of_range",
            WalkEnd::Cancelled => "cancelled",
            WalkEnd::Failed(_) => "failed",
        };
        Self {
            end,
            instructions: walk.instructions.len(),
            error: walk.error().map(|err| ErrorReport {
                offset: err.offset(),
                message: err.to_string(),
            }),
            dangling_branches: walk
                .dangling
                .iter()
                .map(|d| DanglingReport {
                    from: d.from,
                    target: d.target,
                    mid_instruction: d.mid_instruction,
                })
                .collect(),
        }
    }
}

fn load_registry(path: &Path) -> Result<Registry> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("reading registry {}", path.display()))?;
    let file: RegistryFile = serde_yaml::from_str(&text)
        .with_context(|| format!("parsing registry {}", path.display()))?;
    let registry = file
        .to_registry()
        .with_context(|| format!("loading registry {}", path.display()))?;
    Ok(registry)
}

fn disassemble(args: &Args) -> Result<Option<DecodeError>> {
    let bytes = std::fs::read(&args.input)
        .with_context(|| format!("reading {}", args.input.display()))?;

    let registry = match &args.registry {
        Some(path) => {
            if args.lang.is_some() {
                log::warn!("--lang is ignored: {} carries its own profile", path.display());
            }
            load_registry(path)?
        }
        None => Registry::bgi_with_encoding(args.lang.unwrap_or_default()),
    };

    let walk = walk(&bytes, args.base_offset, &registry);
    log::info!(
        "decoded {} instructions from {}",
        walk.instructions.len(),
        args.input.display()
    );

    let listing = disasm::format(&walk);
    match &args.output {
        Some(path) => std::fs::write(path, &listing)
            .with_context(|| format!("writing {}", path.display()))?,
        None => print!("{}", listing),
    }

    if let Some(path) = &args.report {
        let mut writer = std::fs::File::create(path)
            .with_context(|| format!("writing {}", path.display()))?;
        serde_yaml::to_writer(&mut writer, &Report::from_walk(&walk))?;
    }

    Ok(walk.error().cloned())
}

fn main() -> Result<()> {
    env_logger::init();
    let args = Args::parse();
    if let Some(err) = disassemble(&args)? {
        // The partial listing and report are already on disk at this point.
        bail!("decoding failed at 0x{:x}: {}", err.offset(), err);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_disassemble() -> Result<()> {
        let input = Path::new(concat!(env!("CARGO_MANIFEST_DIR"), "/testcase/intro.bin"));
        let output = Path::new(concat!(env!("CARGO_MANIFEST_DIR"), "/testcase/intro.txt"));
        let report = Path::new(concat!(env!("CARGO_MANIFEST_DIR"), "/testcase/intro.yaml"));
        let args = Args {
            input: input.to_path_buf(),
            base_offset: 0,
            registry: None,
            lang: None,
            output: Some(output.to_path_buf()),
            report: Some(report.to_path_buf()),
        };
        assert_eq!(disassemble(&args)?, None);

        let listing = std::fs::read_to_string(output)?;
        assert_eq!(
            listing,
            "00000000: wait 2000\n\
             00000008: char_act \"Rin\"\n\
             00000011: goto 8 ; -> #1\n\
             00000019: end_script\n"
        );
        let report = std::fs::read_to_string(report)?;
        assert!(report.contains("end: end_script"));
        Ok(())
    }
}
