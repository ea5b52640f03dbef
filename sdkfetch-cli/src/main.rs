use anyhow::{Error, Result};
use clap::{Arg, ArgAction, ArgGroup, ArgMatches, Command};
use log::error;
use sdkfetch::{ArchiveExtension, SdkFetch, SdkFetchBuilder};
use std::str::FromStr;
use strum::VariantNames;
use thiserror::Error;

#[derive(Debug, Error)]
enum CliError {
    #[error("{0:}")]
    InvalidArgsError(String),
}

const DEFAULT_PROJECT: &str = "goreliu/wsl-terminal";

#[tokio::main(flavor = "current_thread")]
async fn main() {
    let cmd = cmd();
    let matches = cmd.get_matches();
    let res = init_logger_from_matches(&matches);
    if let Err(e) = res {
        eprintln!("Error creating logger: {e}");
        std::process::exit(126);
    }

    let status = match make_fetch(&matches) {
        Ok(f) => match run(&f, matches.get_flag("list-links")).await {
            Ok(()) => 0,
            Err(e) => {
                print_err(&e);
                1
            }
        },
        Err(e) => {
            print_err(&e);
            127
        }
    };
    std::process::exit(status);
}

const MAX_TERM_WIDTH: usize = 100;

fn cmd() -> Command {
    Command::new("sdkfetch")
        .version(env!("CARGO_PKG_VERSION"))
        .about("Downloads the latest release archive of a GitHub project and unpacks it")
        .arg(
            Arg::new("project")
                .long("project")
                .short('p')
                .default_value(DEFAULT_PROJECT)
                .help(concat!(
                    "The project to download, like goreliu/wsl-terminal",
                    " or https://github.com/goreliu/wsl-terminal.",
                )),
        )
        .arg(Arg::new("in").long("in").short('i').help(concat!(
            "The directory to unpack the archive into. Defaults to `sdk` in your home",
            " directory.",
        )))
        .arg(
            Arg::new("extension")
                .long("extension")
                .short('e')
                .value_parser(clap::builder::PossibleValuesParser::new(
                    ArchiveExtension::VARIANTS,
                ))
                .help(concat!(
                    "The extension of the release asset to download, without the leading dot.",
                    " Defaults to zip.",
                )),
        )
        .arg(Arg::new("download-dir").long("download-dir").help(concat!(
            "The directory to download the archive into. Defaults to the OS temp",
            " directory.",
        )))
        .arg(Arg::new("api-base-url").long("api-base-url").help(concat!(
            "The the base URL for the GitHub API. This is useful for testing or if you want",
            " to operate against an Enterprise version of GitHub. This should be",
            " something like `https://github.my-corp.example.com/api/v3`.",
        )))
        .arg(
            Arg::new("skip-first-match")
                .long("skip-first-match")
                .action(ArgAction::SetTrue)
                .help(concat!(
                    "Ignore the first matching asset in the release, like older versions of this",
                    " tool did.",
                )),
        )
        .arg(
            Arg::new("list-links")
                .long("list-links")
                .short('l')
                .action(ArgAction::SetTrue)
                .help(concat!(
                    "Print the download links of every matching asset, one per line, and exit",
                    " without downloading anything. You cannot pass --in or --download-dir when",
                    " this is set.",
                )),
        )
        .arg(
            Arg::new("debug")
                .short('d')
                .long("debug")
                .action(ArgAction::SetTrue)
                .help("Enable debugging output."),
        )
        .arg(
            Arg::new("quiet")
                .short('q')
                .long("quiet")
                .action(ArgAction::SetTrue)
                .help("Suppresses most output."),
        )
        .group(ArgGroup::new("log-level").args(["debug", "quiet"]))
        .max_term_width(MAX_TERM_WIDTH)
}

pub(crate) fn init_logger_from_matches(matches: &ArgMatches) -> Result<(), log::SetLoggerError> {
    let level = if matches.get_flag("debug") {
        log::LevelFilter::Debug
    } else if matches.get_flag("quiet") {
        log::LevelFilter::Error
    } else {
        log::LevelFilter::Info
    };

    sdkfetch::init_logger(level)
}

fn make_fetch(matches: &ArgMatches) -> Result<SdkFetch> {
    validate_args(matches)?;

    let mut builder = SdkFetchBuilder::new();
    if let Some(p) = matches.get_one::<String>("project") {
        builder = builder.project(p);
    }
    if let Some(dir) = matches.get_one::<String>("in") {
        builder = builder.install_dir(dir);
    } else if matches.get_flag("list-links") {
        // Nothing is unpacked, so don't fail if there's no home directory.
        builder = builder.install_dir(".");
    }
    if let Some(e) = matches.get_one::<String>("extension") {
        builder = builder.extension(ArchiveExtension::from_str(e)?);
    }
    if let Some(dir) = matches.get_one::<String>("download-dir") {
        builder = builder.download_dir(dir);
    }
    if let Some(url) = matches.get_one::<String>("api-base-url") {
        builder = builder.api_base_url(url);
    }
    if matches.get_flag("skip-first-match") {
        builder = builder.skip_first_match();
    }

    builder.build()
}

fn validate_args(matches: &ArgMatches) -> Result<()> {
    if matches.get_flag("list-links") {
        for a in &["in", "download-dir"] {
            if matches.contains_id(a) {
                return Err(CliError::InvalidArgsError(format!(
                    "You cannot combine the --list-links and --{a} options"
                ))
                .into());
            }
        }
    }

    Ok(())
}

async fn run(fetch: &SdkFetch, list_links: bool) -> Result<()> {
    if list_links {
        for link in fetch.download_links().await? {
            println!("{link}");
        }
        return Ok(());
    }

    fetch.fetch_and_extract().await?;
    Ok(())
}

fn print_err(e: &Error) {
    error!("{e:#}");
    if let Some(ce) = e.downcast_ref::<CliError>() {
        match ce {
            CliError::InvalidArgsError(_) => {
                println!();
                if let Err(e) = cmd().print_help() {
                    error!("could not print help: {e}");
                }
            }
        }
    }
}
