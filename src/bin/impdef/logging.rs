use std::io::{IsTerminal, Write};

use log::Level;
use termcolor::{BufferWriter, Color, ColorChoice, ColorSpec, WriteColor};

use crate::arguments::{CliArgs, ColorOption};

/// Logger writing every message to stderr.
///
/// Stdout is reserved for the module-definition listing.
struct CliLogger {
    stderr: BufferWriter,
}

impl log::Log for CliLogger {
    #[inline]
    fn enabled(&self, _metadata: &log::Metadata) -> bool {
        true
    }

    fn log(&self, record: &log::Record) {
        if record.args().as_str().is_some_and(|args| args.is_empty()) {
            return;
        }

        let mut buffer = self.stderr.buffer();
        let _ = write!(buffer, "{}: ", env!("CARGO_BIN_NAME"));

        let (color, tag) = match record.level() {
            Level::Error => (Color::Red, "error:"),
            Level::Warn => (Color::Yellow, "warning:"),
            Level::Info => (Color::Green, "info:"),
            Level::Debug => (Color::White, "debug:"),
            Level::Trace => (Color::Blue, "trace:"),
        };

        let _ = buffer.set_color(ColorSpec::new().set_fg(Some(color)).set_bold(true));
        let _ = write!(buffer, "{tag}");
        let _ = buffer.reset();
        let _ = writeln!(buffer, " {}", record.args());

        let _ = self.stderr.print(&buffer);
    }

    fn flush(&self) {}
}

impl From<ColorOption> for ColorChoice {
    fn from(value: ColorOption) -> Self {
        match value {
            ColorOption::Auto => ColorChoice::Auto,
            ColorOption::Always => ColorChoice::Always,
            ColorOption::Never => ColorChoice::Never,
        }
    }
}

/// Picks the color choice for stderr from the option and the environment.
fn color_choice(color: ColorOption) -> ColorChoice {
    match color {
        ColorOption::Always => ColorChoice::Always,
        ColorOption::Never => ColorChoice::Never,
        ColorOption::Auto => {
            if std::env::var_os("NO_COLOR").is_some_and(|v| !v.is_empty() && v != "0")
                || std::env::var("TERM").is_ok_and(|term| term.eq_ignore_ascii_case("dumb"))
                || !std::io::stderr().is_terminal()
            {
                ColorChoice::Never
            } else {
                color.into()
            }
        }
    }
}

/// Sets up logging for the cli
pub fn setup_logger(args: &CliArgs) -> anyhow::Result<()> {
    log::set_boxed_logger(Box::from(CliLogger {
        stderr: BufferWriter::stderr(color_choice(args.color)),
    }))
    .map(|()| {
        if args.verbose >= 2 {
            log::set_max_level(log::LevelFilter::Trace);
        } else if args.verbose >= 1 {
            log::set_max_level(log::LevelFilter::Debug);
        } else {
            log::set_max_level(log::LevelFilter::Info);
        }
    })?;

    Ok(())
}
