use std::path::PathBuf;

use clap::{value_parser, Arg, ArgAction, ArgMatches, Command};
use gis_io::table::ColumnType;
use gis_io::{CodecOptions, Decimation, GeoTable, LoadOptions, RegionRequest};
use tracing_subscriber::EnvFilter;

fn codec_options_arg() -> Arg {
    Arg::new("option")
        .short('o')
        .long("option")
        .value_name("KEY=VALUE")
        .action(ArgAction::Append)
        .value_parser(CodecOptions::parse_pair)
        .help("Option forwarded to the codec (repeatable)")
}

fn load_args(command: Command) -> Command {
    command
        .arg(
            Arg::new("layer")
                .long("layer")
                .value_parser(value_parser!(usize))
                .default_value("0")
                .help("Layer index for multi-layer containers"),
        )
        .arg(
            Arg::new("lazy")
                .long("lazy")
                .action(ArgAction::SetTrue)
                .help("Convert geometries on access instead of up front"),
        )
}

fn cli() -> Command {
    let convert = load_args(
        Command::new("convert")
            .about("Read a file and write it in the format of the output extension")
            .arg(Arg::new("input").required(true).value_parser(value_parser!(PathBuf)))
            .arg(Arg::new("output").required(true).value_parser(value_parser!(PathBuf))),
    )
    .arg(codec_options_arg());
    #[cfg(feature = "proj")]
    let convert = convert
        .arg(Arg::new("from-crs").long("from-crs").requires("to-crs").help("Source CRS"))
        .arg(Arg::new("to-crs").long("to-crs").requires("from-crs").help("Target CRS"));

    Command::new("gis-io")
        .version(env!("CARGO_PKG_VERSION"))
        .author("Jesper Fjellin")
        .about("Loads and saves geospatial tables through existing format libraries")
        .subcommand_required(true)
        .arg(
            Arg::new("verbose")
                .short('v')
                .long("verbose")
                .global(true)
                .action(ArgAction::SetTrue)
                .help("Log at debug level (RUST_LOG overrides)"),
        )
        .subcommand(
            load_args(
                Command::new("info")
                    .about("Summarize the rows, domain and columns of a file")
                    .arg(Arg::new("path").required(true).value_parser(value_parser!(PathBuf))),
            )
            .arg(codec_options_arg()),
        )
        .subcommand(convert)
        .subcommand(
            Command::new("gadm")
                .about("Download GADM administrative boundaries")
                .arg(Arg::new("country").required(true).help("ISO 3166-1 alpha-3 country code"))
                .arg(Arg::new("subregion").num_args(0..).help("Nested subregion names"))
                .arg(
                    Arg::new("depth")
                        .long("depth")
                        .value_parser(value_parser!(usize))
                        .default_value("0")
                        .help("Levels below the last subregion to return"),
                )
                .arg(
                    Arg::new("tolerance")
                        .long("tolerance")
                        .value_parser(value_parser!(f64))
                        .help("Starting simplification tolerance"),
                )
                .arg(
                    Arg::new("min")
                        .long("min")
                        .value_parser(value_parser!(usize))
                        .default_value("3")
                        .help("Minimum vertices per ring"),
                )
                .arg(
                    Arg::new("max")
                        .long("max")
                        .value_parser(value_parser!(usize))
                        .help("Maximum vertices per ring"),
                )
                .arg(
                    Arg::new("max-iterations")
                        .long("max-iterations")
                        .value_parser(value_parser!(usize))
                        .default_value("10")
                        .help("Tolerance search steps per ring"),
                )
                .arg(
                    Arg::new("output")
                        .long("output")
                        .value_parser(value_parser!(PathBuf))
                        .help("Save the boundaries here instead of printing a summary"),
                )
                .arg(codec_options_arg()),
        )
}

fn codec_options(matches: &ArgMatches) -> CodecOptions {
    matches
        .get_many::<(String, String)>("option")
        .map(|pairs| pairs.cloned().collect())
        .unwrap_or_default()
}

fn load_options(matches: &ArgMatches) -> LoadOptions {
    LoadOptions {
        layer: matches.get_one::<usize>("layer").copied().unwrap_or(0),
        lazy: matches.get_flag("lazy"),
        codec: codec_options(matches),
    }
}

fn print_summary(table: &GeoTable) {
    println!("Rows: {}", table.len());
    println!("Domain: {}", table.domain().kind());
    if let Ok(first) = table.geometry(0) {
        println!("First element: {}", first.kind());
    }
    for column in &table.values().columns {
        println!("  {}: {:?}", column.name, ColumnType::infer(&column.values));
    }
}

fn convert(matches: &ArgMatches) -> gis_io::Result<()> {
    let (Some(input), Some(output)) = (
        matches.get_one::<PathBuf>("input"),
        matches.get_one::<PathBuf>("output"),
    ) else {
        return Ok(());
    };
    let options = load_options(matches);
    let table = gis_io::load(input, &options)?;
    #[cfg(feature = "proj")]
    let table = match (
        matches.get_one::<String>("from-crs"),
        matches.get_one::<String>("to-crs"),
    ) {
        (Some(from), Some(to)) => gis_io::reproject::reproject(table, from, to)?,
        _ => table,
    };
    gis_io::save(output, &table, &options.codec)
}

fn gadm(matches: &ArgMatches) -> gis_io::Result<()> {
    let country = matches.get_one::<String>("country").cloned().unwrap_or_default();
    let request = RegionRequest {
        country,
        subregions: matches
            .get_many::<String>("subregion")
            .map(|names| names.cloned().collect())
            .unwrap_or_default(),
        depth: matches.get_one::<usize>("depth").copied().unwrap_or(0),
    };
    let defaults = Decimation::default();
    let decimation = Decimation {
        tolerance: matches.get_one::<f64>("tolerance").copied(),
        min_vertices: matches.get_one::<usize>("min").copied().unwrap_or(defaults.min_vertices),
        max_vertices: matches.get_one::<usize>("max").copied().unwrap_or(defaults.max_vertices),
        max_iterations: matches
            .get_one::<usize>("max-iterations")
            .copied()
            .unwrap_or(defaults.max_iterations),
    };
    let options = codec_options(matches);
    let table = gis_io::fetch_region(&request, &decimation, &options)?;
    match matches.get_one::<PathBuf>("output") {
        Some(output) => gis_io::save(output, &table, &options),
        None => {
            print_summary(&table);
            Ok(())
        }
    }
}

fn main() {
    let matches = cli().get_matches();

    let default_level = if matches.get_flag("verbose") { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let result = match matches.subcommand() {
        Some(("info", sub)) => match sub.get_one::<PathBuf>("path") {
            Some(path) => gis_io::load(path, &load_options(sub)).map(|table| print_summary(&table)),
            None => Ok(()),
        },
        Some(("convert", sub)) => convert(sub),
        Some(("gadm", sub)) => gadm(sub),
        _ => Ok(()),
    };

    match result {
        Ok(()) => tracing::debug!("Processing completed successfully"),
        Err(e) => {
            eprintln!("Error: {}", e);
            std::process::exit(1);
        }
    }
}
