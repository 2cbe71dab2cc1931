use clap::{Arg, ArgAction, Command, arg, value_parser};

pub const CALL_CMD: &str = "call";
pub const DEFAULT_FORMAT: &str = "tsv";

pub fn create_call_cli() -> Command {
    Command::new(CALL_CMD)
        .author("tsstes contributors")
        .about("Call TSS/TES candidates from a coverage track and a splice junction file.")
        .arg(
            Arg::new("coverage")
                .required(true)
                .help("Coverage lines (chrom, start, end, coverage); plain, .gz or '-' for stdin"),
        )
        .arg(
            Arg::new("junctions")
                .required(true)
                .help("Junction lines (chrom, start, end, name, coverage, strand, percentages); plain or .gz"),
        )
        .arg(arg!(--output <output> "Write the report here instead of stdout"))
        .arg(arg!(--format <format> "Report format: tsv or jsonl"))
        .arg(arg!(--config <config> "TOML file with detection parameters"))
        .arg(arg!(--win <win> "Drop detection window").value_parser(value_parser!(i64)))
        .arg(
            arg!(--smallwin <smallwin> "Short window next to junction anchors")
                .value_parser(value_parser!(i64)),
        )
        .arg(
            arg!(--delta <delta> "Flank width for junction boundary tests")
                .value_parser(value_parser!(i64)),
        )
        .arg(
            arg!(--lowcov <lowcov> "Minimum mean coverage of a reported bundle")
                .value_parser(value_parser!(f64)),
        )
        .arg(
            arg!(--percnoise <percnoise> "Retained coverage fraction below which a drop is called")
                .value_parser(value_parser!(f64)),
        )
        .arg(
            arg!(--progress)
                .help("Show a progress spinner on stderr")
                .action(ArgAction::SetTrue),
        )
        .arg(
            arg!(-v --verbose)
                .help("Log every region")
                .action(ArgAction::SetTrue),
        )
        .arg(
            arg!(-q --quiet)
                .help("Only log errors")
                .action(ArgAction::SetTrue)
                .conflicts_with("verbose"),
        )
}
