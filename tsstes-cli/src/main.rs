mod call;

use clap::{ArgMatches, Command};
use log::LevelFilter;

pub mod consts {
    pub const VERSION: &str = env!("CARGO_PKG_VERSION");
    pub const PKG_NAME: &str = "tsstes";
    pub const BIN_NAME: &str = "tsstes";
}

fn build_parser() -> Command {
    Command::new(consts::BIN_NAME)
        .bin_name(consts::BIN_NAME)
        .version(consts::VERSION)
        .author("tsstes contributors")
        .about("Call transcription start and end site candidates from RNA-seq coverage and splice junctions.")
        .subcommand_required(true)
        .subcommand(call::cli::create_call_cli())
}

fn init_logging(matches: &ArgMatches) {
    let level = if matches.get_flag("quiet") {
        LevelFilter::Error
    } else if matches.get_flag("verbose") {
        LevelFilter::Debug
    } else {
        LevelFilter::Info
    };

    // RUST_LOG still refines the level per module
    env_logger::Builder::new()
        .filter_level(level)
        .parse_default_env()
        .format_timestamp(None)
        .format_target(false)
        .init();
}

fn main() {
    let app = build_parser();
    let matches = app.get_matches();

    let result = match matches.subcommand() {
        //
        // CALL
        //
        Some((call::cli::CALL_CMD, matches)) => {
            init_logging(matches);
            call::handlers::run_call(matches).map(|_| ())
        }

        _ => unreachable!("Subcommand not found"),
    };

    if let Err(e) = result {
        log::error!("{:#}", e);
        std::process::exit(1);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parser_is_consistent() {
        build_parser().debug_assert();
    }

    #[test]
    fn test_author_is_this_project() {
        let parser = build_parser();
        assert_eq!(parser.get_author(), Some("tsstes contributors"));
        let call = parser
            .find_subcommand(call::cli::CALL_CMD)
            .unwrap();
        assert_eq!(call.get_author(), Some("tsstes contributors"));
    }
}
