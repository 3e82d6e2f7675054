use clap::{Parser, Subcommand};
use bioreg::compression::Compression;
use bioreg::config::IoConfig;
use bioreg::formats::default_registry_with;
use bioreg::options::{OptionValue, Options};
use bioreg::pipeline::convert;
use bioreg::registry::{ReadRequest, Registry, WriteRequest};
use bioreg::IoError;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "bioreg", version, about = "Sniff and convert bioinformatics file formats")]
struct Cli {
    /// JSON configuration file (sniff prefix, option defaults, compression)
    #[arg(global = true, long)]
    config: Option<PathBuf>,

    /// Enable debug logging
    #[arg(global = true, short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Guess the format of a file and print it with recommended options as JSON
    Sniff {
        input: PathBuf,
    },
    /// Convert a file from one format to another
    Convert {
        #[arg(short, long)]
        input: PathBuf,
        #[arg(short, long)]
        output: PathBuf,
        /// Input format; sniffed when omitted
        #[arg(long)]
        from: Option<String>,
        /// Output format
        #[arg(long)]
        to: String,
        /// Reader option as key=value (repeatable)
        #[arg(long = "read-opt", value_name = "KEY=VALUE")]
        read_opt: Vec<String>,
        /// Writer option as key=value (repeatable)
        #[arg(long = "write-opt", value_name = "KEY=VALUE")]
        write_opt: Vec<String>,
        /// QUAL file paired with a FASTA input
        #[arg(long)]
        qual_in: Option<PathBuf>,
        /// QUAL file written next to a FASTA output
        #[arg(long)]
        qual_out: Option<PathBuf>,
        /// Skip sniffing the input (requires --from)
        #[arg(long, requires = "from")]
        no_verify: bool,
        /// Output compression: none, gzip, zstd, lz4, brotli (default from config)
        #[arg(long)]
        compress: Option<String>,
    },
    /// List the registered formats and their options
    Formats,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("info")
    };
    tracing_subscriber::fmt().with_env_filter(filter).with_writer(std::io::stderr).init();

    let config = match &cli.config {
        Some(path) => IoConfig::from_file(path)?,
        None       => IoConfig::default(),
    };
    let registry = default_registry_with(config)?;

    match cli.command {

        // ── Sniff ────────────────────────────────────────────────────────────
        Commands::Sniff { input } => {
            let (format, options) = registry.sniff(input.as_path())?;
            let out = serde_json::json!({ "format": format, "options": options });
            println!("{}", serde_json::to_string_pretty(&out)?);
        }

        // ── Convert ──────────────────────────────────────────────────────────
        Commands::Convert {
            input, output, from, to, read_opt, write_opt, qual_in, qual_out, no_verify, compress,
        } => {
            let from_format = match &from {
                Some(f) => f.clone(),
                None if !read_opt.is_empty() => registry.sniff(input.as_path())?.0,
                None => String::new(),
            };

            let mut read = ReadRequest::new();
            if let Some(f) = from {
                read = read.format(f).verify(!no_verify);
            }
            if !read_opt.is_empty() {
                read = read.options(parse_options(&registry, &from_format, &read_opt)?);
            }
            if let Some(q) = qual_in {
                read = read.aux("qual", q);
            }

            let mut write = WriteRequest::new().options(parse_options(&registry, &to, &write_opt)?);
            if let Some(q) = qual_out {
                write = write.aux("qual", q);
            }
            if let Some(c) = compress {
                write = write.compression(parse_compression(&c)?);
            }

            let summary = convert(&registry, input.as_path(), read, output.as_path(), &to, write)?;
            for w in &summary.warnings {
                eprintln!("warning: {w}");
            }
            println!("Converted {} record(s): {} → {}", summary.records, summary.from, summary.to);
            for dest in &summary.destinations {
                println!("  wrote  {dest}");
            }
        }

        // ── Formats ──────────────────────────────────────────────────────────
        Commands::Formats => {
            println!("{:<8} {:<4} {:<5} {:<6}  Description", "Name", "Read", "Write", "Aux");
            for info in registry.formats() {
                println!(
                    "{:<8} {:<4} {:<5} {:<6}  {}",
                    info.name,
                    yes_no(info.can_read),
                    yes_no(info.can_write),
                    info.aux_channels.join(","),
                    info.description,
                );
                for spec in &info.options {
                    println!("    {:<32} default {}", spec.name, spec.default);
                }
            }
        }
    }

    Ok(())
}

// ── helpers ──────────────────────────────────────────────────────────────────

/// Parse `key=value` pairs against the option kinds `format` declares.
fn parse_options(registry: &Registry, format: &str, pairs: &[String]) -> Result<Options, Box<dyn std::error::Error>> {
    let mut options = Options::new();
    if pairs.is_empty() {
        return Ok(options);
    }
    let specs = registry.plugin(format)?.option_specs();
    for pair in pairs {
        let (key, raw) = pair
            .split_once('=')
            .ok_or_else(|| format!("expected KEY=VALUE, got '{pair}'"))?;
        let spec = specs.iter().find(|s| s.name == key).ok_or_else(|| IoError::UnknownOption {
            format: format.to_owned(),
            option: key.to_owned(),
        })?;
        let value = OptionValue::parse_as(&spec.kind, raw).map_err(|msg| IoError::InvalidOption {
            format: format.to_owned(),
            option: key.to_owned(),
            msg,
        })?;
        options.insert(key, value);
    }
    Ok(options)
}

fn parse_compression(s: &str) -> Result<Compression, String> {
    Compression::from_name(s).ok_or_else(|| format!("unknown compression '{s}' (expected none, gzip, zstd, lz4 or brotli)"))
}

fn yes_no(b: bool) -> &'static str {
    if b { "yes" } else { "no" }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn no_verify_requires_from() {
        let args = ["bioreg", "convert", "-i", "in.fq", "-o", "out.fa", "--to", "fasta", "--no-verify"];
        assert!(Cli::try_parse_from(args).is_err());

        let args = ["bioreg", "convert", "-i", "in.fq", "-o", "out.fa", "--from", "fastq", "--to", "fasta", "--no-verify"];
        assert!(Cli::try_parse_from(args).is_ok());
    }
}
