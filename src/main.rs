use std::fs;
use std::io::{self, BufWriter, Write};
use std::path::PathBuf;

use anyhow::Context;
use clap::Parser;
use log::{debug, info, LevelFilter};

use earss2mseed::{earss, ConvertConfig, Converter};

/// Convert EARSS formatted data into miniSEED.
///
/// Reads EARSS event buffers from each input file and writes concatenated
/// fixed-length miniSEED blocks to standard output.
#[derive(Parser, Debug)]
#[command(version)]
#[command(about, long_about = None)]
#[command(max_term_width = 100)]
struct Args {
    /// Emit progress to stderr (-v, -vv for more)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// miniseed network code
    #[arg(long, default_value = "XX")]
    network: String,

    /// miniseed station code
    #[arg(long, default_value = "XXXX")]
    station: String,

    /// miniseed location code
    #[arg(long, default_value = "XX")]
    location: String,

    /// miniseed channel code prefix
    #[arg(long, default_value = "EH")]
    channel: String,

    /// miniseed channel code suffix, one character per channel
    #[arg(long, default_value = "ZNE")]
    components: String,

    /// miniseed block size in bytes
    #[arg(long, default_value_t = 512)]
    blksize: usize,

    /// EARSS input files
    #[arg(required = true)]
    files: Vec<PathBuf>,
}

fn main() {
    let args = Args::parse();
    log_setup(&args);

    if let Err(err) = run(&args) {
        eprintln!("earss2mseed: {:#}", err);
        std::process::exit(1);
    }
}

fn run(args: &Args) -> anyhow::Result<()> {
    let mut converter = Converter::new(ConvertConfig {
        network: args.network.clone(),
        station: args.station.clone(),
        location: args.location.clone(),
        channel: args.channel.clone(),
        components: args.components.clone(),
        block_size: args.blksize,
    })?;

    let stdout = io::stdout();
    let mut out = BufWriter::new(stdout.lock());

    for f in &args.files {
        info!("converting file {}", f.display());
        let data = fs::read(f).with_context(|| format!("unable to read {}", f.display()))?;

        let records = earss::decode_all(&data)
            .with_context(|| format!("unable to decode {}", f.display()))?;
        info!("read {} records from {}", records.len(), f.display());

        for record in &records {
            debug!("{}", record);
            converter.convert(record, &mut out)?;
        }
        info!("packed {} blocks from {}", converter.blocks_written(), f.display());
    }

    out.flush()?;
    info!("conversion complete.");

    Ok(())
}

fn log_setup(args: &Args) {
    if std::env::var_os("RUST_LOG").is_some() {
        // environment controls
        pretty_env_logger::init();
        return;
    }
    let log_filter = match args.verbose {
        0 => LevelFilter::Warn,
        1 => LevelFilter::Info,
        2 => LevelFilter::Debug,
        _ => LevelFilter::Trace,
    };
    pretty_env_logger::formatted_builder()
        .filter_level(log_filter)
        .init();
}
