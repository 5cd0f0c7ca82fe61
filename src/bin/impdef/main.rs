use std::{io::Write, process::ExitCode};

use anyhow::{Context, Result};
use clap::{CommandFactory, Parser};

use arguments::CliArgs;
use impdef::{
    annotate::StackSizeTable,
    coff::ImageFileMachine,
    declarations::parse_declarations,
    exports::{ExportReader, find_export_regions},
    headers::{self, HeaderSearcher, PreprocessorCommand},
    image::{Image, read_image},
    output::{DefWriter, OutputOptions},
};

mod arguments;
mod logging;

/// cli entrypoint
fn main() -> ExitCode {
    let cmdline = arguments::expand_response_files(std::env::args_os());
    if cmdline.len() <= 1 {
        let _ = CliArgs::command().print_help();
        return ExitCode::FAILURE;
    }

    let args = match CliArgs::try_parse_from(&cmdline) {
        Ok(args) => args,
        Err(e) => {
            let _ = e.print();
            return if e.use_stderr() {
                ExitCode::FAILURE
            } else {
                ExitCode::SUCCESS
            };
        }
    };

    if let Err(e) = logging::setup_logger(&args) {
        eprintln!("{}: could not set up logging: {e}", env!("CARGO_BIN_NAME"));
        return ExitCode::FAILURE;
    }

    // Nothing is written to stdout unless the whole listing was produced.
    let listing = match try_main(&args) {
        Ok(listing) => listing,
        Err(e) => {
            log::error!("{e:#}");
            return ExitCode::FAILURE;
        }
    };

    if let Err(e) = std::io::stdout().lock().write_all(&listing) {
        log::error!("could not write listing: {e}");
        return ExitCode::FAILURE;
    }

    ExitCode::SUCCESS
}

/// Main program entrypoint
fn try_main(args: &CliArgs) -> Result<Vec<u8>> {
    let mut writer = DefWriter::new(
        Vec::new(),
        OutputOptions {
            verbose: args.verbose >= 1,
            ordinals: args.ordinals,
        },
    );

    let annotations = if args.headers.is_empty() {
        StackSizeTable::new()
    } else {
        let mut searcher = HeaderSearcher::new();
        searcher.extend_search_paths(headers::env_include_paths());

        let header_paths = args
            .headers
            .iter()
            .map(|header| searcher.find_header(header))
            .collect::<Result<Vec<_>, _>>()?;

        let command = PreprocessorCommand::new(&args.preprocessor, &header_paths)?;
        writer.write_command_comment(&command.display())?;
        parse_declarations(&command.run()?)
    };

    let data = read_image(&args.image)?;
    let image = Image::parse(&data)
        .with_context(|| format!("{}: could not load PE image", args.image.display()))?;

    match ImageFileMachine::try_from(image.machine()) {
        Ok(machine) => log::debug!("image machine is {machine}"),
        Err(e) => log::debug!("{e}"),
    }

    writer.write_section_summary(image.sections())?;

    let regions = find_export_regions(&image);
    if regions.is_empty() {
        log::warn!("{}: no export table found", args.image.display());
    }

    let reader = ExportReader::new(&image, &annotations);
    for region in regions {
        let table = reader
            .read(region)
            .with_context(|| format!("{}: could not read exports", args.image.display()))?;
        writer.write_export_table(&table)?;
    }

    Ok(writer.into_inner())
}
