//! Pure formatting functions for UI output.
//!
//! Functions here only write to the sink they are given.

use std::io::{self, Write};

use console::style;

/// The usage text shown for `-h`, no arguments, or no existing module path.
pub fn help_text() -> String {
    let lines = [
        "",
        "Usage: asm-info PATH-TO-ASSEMBLY",
        "Usage: asm-info PATH-TO-ASSEMBLY [OPTIONS]",
        "",
        "path-to-assembly:",
        "  The path to an application .dll file to execute.",
        "",
        "Options:",
        "  -n,     --name           Display the assembly name.",
        "  -v,     --version        Display the assembly version.",
        "          --fullVersion    Display the assembly full version.",
        "          --major          Display the assembly major version.",
        "          --minor          Display the assembly minor version.",
        "          --patch          Display the assembly patch version.",
        "          --release        Display the assembly release version.",
        "          --build          Display the assembly build metadata.",
        "  -fv,    --fileVersion    Display the assembly file version.",
        "  -c,     --configuration  Display the assembly configuration.",
        "  -d,     --description    Display the assembly description.",
        "  -s,     --simple         Display with simple format (without field name, tab-delimited string).",
        "  -?, -h, --help           Display help.",
    ];

    let mut text = String::new();
    for line in lines {
        text.push_str(line);
        text.push('\n');
    }
    text
}

/// Print the help text.
pub fn display_help(out: &mut dyn Write) -> io::Result<()> {
    writeln!(out, "{}", help_text())
}

/// Print rendered field output, or nothing when it is blank.
pub fn display_output(out: &mut dyn Write, text: &str) -> io::Result<()> {
    if text.trim().is_empty() {
        return Ok(());
    }
    writeln!(out, "{}", text)
}

/// Format and print an error message with a red prefix.
///
/// The color is dropped when stderr is not a terminal.
pub fn display_error(err: &mut dyn Write, message: &str) -> io::Result<()> {
    writeln!(err, "{} {}", style("ERROR:").red().for_stderr(), message)
}
