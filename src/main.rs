use std::io;
use std::process::ExitCode;

use anyhow::Result;
use clap::Parser;

use asm_info::cli::{self, Invocation};
use asm_info::config::{self, Config};
use asm_info::{module, ui};

#[derive(clap::Parser)]
#[command(
    name = "asm-info",
    about = "Display name, version and build attributes embedded in a .NET assembly",
    disable_help_flag = true,
    disable_version_flag = true
)]
struct Args {
    /// Module path and field flags, in any order
    #[arg(trailing_var_arg = true, allow_hyphen_values = true)]
    args: Vec<String>,
}

fn main() -> Result<ExitCode> {
    let args = Args::parse();
    let mut stdout = io::stdout().lock();
    let mut stderr = io::stderr().lock();

    let inspect = match cli::parse_invocation(&args.args, |path| path.is_file()) {
        Invocation::Help => {
            ui::display_help(&mut stdout)?;
            return Ok(ExitCode::SUCCESS);
        }
        Invocation::Inspect(inspect) => inspect,
    };

    // A broken configuration file must not block inspection
    let config = match config::load_config(None) {
        Ok(cfg) => cfg,
        Err(e) => {
            ui::display_error(&mut stderr, &e.to_string())?;
            Config::default()
        }
    };

    cli::execute(&inspect, &config, module::open, &mut stdout, &mut stderr)?;

    // Errors are reported on stderr only
    Ok(ExitCode::SUCCESS)
}
