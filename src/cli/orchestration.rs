//! Main workflow orchestration logic
//!
//! Flags are interpreted here rather than by clap: they are
//! case-insensitive, order matters, and the module path may appear anywhere
//! on the command line.

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};

use crate::config::Config;
use crate::fields::{render, select_fields, ModuleInfo, OutputMode};
use crate::module::ModuleInspector;
use crate::ui;

const SIMPLE_FLAGS: [&str; 2] = ["-S", "--SIMPLE"];
const HELP_FLAGS: [&str; 3] = ["-H", "--HELP", "-?"];

fn is_flag_in(arg: &str, flags: &[&str]) -> bool {
    flags.contains(&arg.to_uppercase().as_str())
}

/// What the command line asks for
#[derive(Debug, Clone, PartialEq)]
pub enum Invocation {
    /// Print usage and exit
    Help,
    /// Inspect one module
    Inspect(InspectArgs),
}

/// Arguments for the inspect workflow
///
/// Decoupled from clap so the workflow can be called programmatically.
#[derive(Debug, Clone, PartialEq)]
pub struct InspectArgs {
    /// Module path as given on the command line
    pub path: PathBuf,

    /// Remaining arguments in order, with the path and simple flags removed
    pub keys: Vec<String>,

    /// `-s` / `--simple` was given
    pub simple: bool,
}

/// Interpret raw arguments.
///
/// The module path is the first argument that does not start with `-` and
/// names an existing file according to `is_file`.
pub fn parse_invocation(args: &[String], is_file: impl Fn(&Path) -> bool) -> Invocation {
    if args.is_empty() || args.iter().any(|a| is_flag_in(a, &HELP_FLAGS)) {
        return Invocation::Help;
    }

    let Some(position) = args
        .iter()
        .position(|a| !a.starts_with('-') && is_file(Path::new(a)))
    else {
        return Invocation::Help;
    };

    let simple = args.iter().any(|a| is_flag_in(a, &SIMPLE_FLAGS));
    let keys = args
        .iter()
        .enumerate()
        .filter(|(i, a)| *i != position && !is_flag_in(a, &SIMPLE_FLAGS))
        .map(|(_, a)| a.clone())
        .collect();

    Invocation::Inspect(InspectArgs {
        path: PathBuf::from(&args[position]),
        keys,
        simple,
    })
}

/// Load the module and render the requested fields.
///
/// A missing or non-SemVer informational version is not an error; the
/// version fields simply render empty.
pub fn inspect_module<L>(args: &InspectArgs, config: &Config, loader: L) -> Result<String>
where
    L: Fn(&Path) -> crate::Result<Box<dyn ModuleInspector>>,
{
    let path = fs::canonicalize(&args.path)
        .with_context(|| format!("Could not resolve path '{}'", args.path.display()))?;
    let module =
        loader(&path).with_context(|| format!("Could not load module '{}'", path.display()))?;

    let info = ModuleInfo::from_inspector(module.as_ref());
    let mode = if args.simple {
        OutputMode::Simple
    } else {
        config.output.mode()
    };
    let fields = if args.keys.is_empty() {
        config.output.fields()
    } else {
        select_fields(&args.keys)
    };

    Ok(render(&fields, &info, mode))
}

/// Run the inspect workflow, writing results to `out` and diagnostics to `err`.
///
/// Load failures are reported on `err` with their full cause chain and
/// are not returned; only failures to write to the sinks are.
pub fn execute<L>(
    args: &InspectArgs,
    config: &Config,
    loader: L,
    out: &mut dyn Write,
    err: &mut dyn Write,
) -> Result<()>
where
    L: Fn(&Path) -> crate::Result<Box<dyn ModuleInspector>>,
{
    match inspect_module(args, config, loader) {
        Ok(text) => ui::display_output(out, &text)?,
        Err(e) => ui::display_error(err, &format!("{:?}", e))?,
    }
    Ok(())
}
