//! Header lookup and preprocessor invocation.

use std::{
    borrow::Cow,
    ffi::{OsStr, OsString},
    path::{Path, PathBuf},
    process::{Command, Stdio},
};

use indexmap::IndexSet;
use nom::{
    Parser,
    branch::alt,
    bytes::complete::take_while1,
    character::complete::{anychar, char as nomchar, one_of},
    combinator::{opt, recognize},
    multi::{fold_many0, fold_many1},
    sequence::preceded,
};

use crate::error::HeaderError;

/// Preprocessor used when no command is given.
pub const DEFAULT_PREPROCESSOR: &str = "gcc -E -xc-header";

/// Environment variables holding include path lists.
pub const INCLUDE_PATH_VARIABLES: [&str; 2] = ["C_INCLUDE_PATH", "CPLUS_INCLUDE_PATH"];

/// Returns the include paths from the environment.
pub fn env_include_paths() -> Vec<PathBuf> {
    INCLUDE_PATH_VARIABLES
        .iter()
        .filter_map(std::env::var_os)
        .flat_map(|value| split_path_list(&value))
        .collect()
}

/// Splits a platform path list skipping empty entries.
pub fn split_path_list(value: &OsStr) -> Vec<PathBuf> {
    std::env::split_paths(value)
        .filter(|path| !path.as_os_str().is_empty())
        .collect()
}

/// Used for finding header files.
#[derive(Debug, Default)]
pub struct HeaderSearcher {
    search_paths: IndexSet<PathBuf>,
}

impl HeaderSearcher {
    pub fn new() -> HeaderSearcher {
        Default::default()
    }

    pub fn extend_search_paths<I, P>(&mut self, search_paths: I)
    where
        I: IntoIterator<Item = P>,
        P: Into<PathBuf>,
    {
        self.search_paths
            .extend(search_paths.into_iter().map(|v| v.into()));
    }

    pub fn search_paths(&self) -> impl Iterator<Item = &Path> {
        self.search_paths.iter().map(PathBuf::as_path)
    }

    /// Finds the header `name`.
    ///
    /// The name is used as is if it refers to an existing file. Otherwise
    /// the search paths are checked in order.
    pub fn find_header(&self, name: &str) -> Result<PathBuf, HeaderError> {
        let direct = Path::new(name);
        if direct.is_file() {
            return Ok(direct.to_path_buf());
        }

        self.search_paths
            .iter()
            .map(|search_path| search_path.join(name))
            .find(|full_path| {
                let found = full_path.is_file();
                if !found {
                    log::debug!("header candidate {} does not exist", full_path.display());
                }
                found
            })
            .ok_or_else(|| HeaderError::NotFound(name.to_string()))
    }
}

/// A preprocessor invocation for a set of headers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PreprocessorCommand {
    program: OsString,
    args: Vec<OsString>,
}

impl PreprocessorCommand {
    /// Builds the command line from a shell-style preprocessor command.
    ///
    /// All headers except for the last one are added using `-include`. The
    /// last header is passed as the input file.
    pub fn new<P: AsRef<Path>>(cpp: &str, headers: &[P]) -> Result<Self, HeaderError> {
        let mut words = shell_split(cpp).into_iter().map(OsString::from);
        let program = words.next().ok_or(HeaderError::EmptyCommand)?;
        let mut args: Vec<OsString> = words.collect();

        if let Some((last, rest)) = headers.split_last() {
            for header in rest {
                args.push("-include".into());
                args.push(header.as_ref().into());
            }
            args.push(last.as_ref().into());
        }

        Ok(Self { program, args })
    }

    #[inline]
    pub fn program(&self) -> &OsStr {
        &self.program
    }

    #[inline]
    pub fn args(&self) -> &[OsString] {
        &self.args
    }

    /// Returns the command line for display.
    pub fn display(&self) -> String {
        std::iter::once(&self.program)
            .chain(self.args.iter())
            .map(|arg| arg.to_string_lossy())
            .collect::<Vec<_>>()
            .join(" ")
    }

    /// Runs the preprocessor returning the text written to stdout.
    ///
    /// A non-zero exit status is only reported as a warning. Whatever was
    /// written still gets analyzed.
    pub fn run(&self) -> Result<String, HeaderError> {
        log::debug!("running '{}'", self.display());

        let output = Command::new(&self.program)
            .args(&self.args)
            .stdin(Stdio::null())
            .stderr(Stdio::inherit())
            .output()
            .map_err(|source| HeaderError::Spawn {
                command: self.display(),
                source,
            })?;

        if !output.status.success() {
            log::warn!("'{}' exited with {}", self.display(), output.status);
        }

        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }
}

/// Splits a command line into words using shell quoting rules.
///
/// Words are separated by whitespace. A backslash escapes the next character
/// and single or double quotes group text containing whitespace. An
/// unterminated quote runs to the end of the line.
fn shell_split(cmdline: &str) -> Vec<String> {
    let mut words = Vec::new();
    let mut input = cmdline.trim_start();

    while !input.is_empty() {
        match shell_word(input) {
            Ok((remaining, word)) => {
                words.push(word);
                input = remaining.trim_start();
            }
            Err(_) => {
                log::debug!("ignoring trailing '{input}' in preprocessor command");
                break;
            }
        }
    }

    words
}

fn shell_word(input: &str) -> nom::IResult<&str, String> {
    fold_many1(
        alt((
            unquoted_text.map(Cow::Borrowed),
            escaped_char.map(Cow::Borrowed),
            quoted_text.map(Cow::Owned),
        )),
        String::new,
        |mut word, fragment| {
            word.push_str(&fragment);
            word
        },
    )
    .parse(input)
}

fn unquoted_text(input: &str) -> nom::IResult<&str, &str> {
    take_while1(|c: char| !c.is_whitespace() && !matches!(c, '"' | '\'' | '\\')).parse(input)
}

fn escaped_char(input: &str) -> nom::IResult<&str, &str> {
    preceded(nomchar('\\'), recognize(anychar)).parse(input)
}

fn quoted_text(input: &str) -> nom::IResult<&str, String> {
    let (input, quote) = one_of("\"'").parse(input)?;

    let (input, text) = fold_many0(
        alt((
            take_while1(move |c: char| c != quote && c != '\\'),
            escaped_char,
        )),
        String::new,
        |mut text, fragment| {
            text.push_str(fragment);
            text
        },
    )
    .parse(input)?;

    let (input, _) = opt(nomchar(quote)).parse(input)?;
    Ok((input, text))
}
