use std::{
    collections::{HashSet, VecDeque},
    ffi::OsString,
    path::PathBuf,
};

use clap::{ArgAction, Parser, ValueEnum};

use impdef::headers::DEFAULT_PREPROCESSOR;

/// Generate a module-definition file from the exports of a PE image
#[derive(Parser, Debug)]
#[command(
    name = env!("CARGO_BIN_NAME"),
    version,
    disable_help_flag = true,
    after_help = "Include paths for '-h' are read from C_INCLUDE_PATH and CPLUS_INCLUDE_PATH."
)]
pub struct CliArgs {
    /// PE image to read the exports from
    #[arg(value_name = "dll")]
    pub image: PathBuf,

    /// Verbose mode; adds diagnostic comments to the listing
    #[arg(short, long, action = ArgAction::Count)]
    pub verbose: u8,

    /// Print ordinals
    #[arg(short, long)]
    pub ordinals: bool,

    /// Parse header for stack argument sizes (may be repeated)
    #[arg(short = 'h', long = "header", value_name = "header")]
    pub headers: Vec<String>,

    /// Set preprocessor program
    #[arg(
        short,
        long,
        value_name = "preprocessor",
        default_value = DEFAULT_PREPROCESSOR
    )]
    pub preprocessor: String,

    /// Use colors in diagnostic messages
    #[arg(long, value_name = "when", default_value_t = ColorOption::Auto)]
    pub color: ColorOption,

    /// Print help
    #[arg(long, action = ArgAction::Help)]
    help: Option<bool>,
}

/// Color options for the logger
#[derive(ValueEnum, Debug, Default, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ColorOption {
    /// Automatically use colors depending on the environment
    #[value(name = "auto")]
    #[default]
    Auto,

    /// Always use colors
    #[value(name = "always")]
    Always,

    /// Never use colors
    #[value(name = "never")]
    Never,
}

impl std::fmt::Display for ColorOption {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if let Some(v) = self.to_possible_value() {
            write!(f, "{}", v.get_name())?;
        }

        Ok(())
    }
}

/// Expands `@file` arguments with the contents of `file`.
///
/// A file that cannot be read is passed through unchanged. Recursive
/// references to a file that was already expanded are dropped.
pub fn expand_response_files(cmdline: impl Iterator<Item = OsString>) -> Vec<OsString> {
    let mut expanded = Vec::new();

    let mut args =
        VecDeque::from_iter(cmdline.map(|arg| argfile::Argument::parse(arg, argfile::PREFIX)));

    let mut visited: HashSet<PathBuf> = HashSet::new();
    let mut stack = Vec::new();
    loop {
        let Some(arg) = args.pop_front() else {
            match stack.pop() {
                Some(parent) => {
                    args = parent;
                    continue;
                }
                None => break,
            }
        };

        match arg {
            argfile::Argument::PassThrough(arg) => {
                expanded.push(arg);
            }
            argfile::Argument::Path(path) => {
                if !visited.insert(path.clone()) {
                    continue;
                }

                let Ok(content) = std::fs::read_to_string(&path) else {
                    let mut arg = OsString::from("@");
                    arg.push(&path);
                    expanded.push(arg);
                    continue;
                };

                stack.push(std::mem::take(&mut args));
                args.extend(argfile::parse_fromfile(&content, argfile::PREFIX));
            }
        }
    }

    expanded
}
