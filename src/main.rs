use anyhow::{Context, Result};
use clap::{CommandFactory, Parser};
use ferrumdl::{
    dumps, loads, CodecRegistry, ConnectionConfig, DumpOptions, Encoding, LoadOptions, RedisClient,
};
use std::path::{Path, PathBuf};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tracing::{info, Level};
use tracing_subscriber::EnvFilter;

/// Exit status for invalid argument combinations
const USAGE_EXIT_CODE: i32 = 4;

#[derive(Parser, Debug)]
#[command(
    name = "ferrumdl",
    version,
    about = "Dump the contents of a Redis-compatible store to text, or load a dump back"
)]
struct Cli {
    /// Server host
    #[arg(short = 'H', long)]
    host: Option<String>,

    /// Server port
    #[arg(short, long)]
    port: Option<u16>,

    /// Unix socket path, used instead of host and port
    #[arg(short, long, value_name = "PATH")]
    socket: Option<PathBuf>,

    #[arg(short = 'w', long)]
    password: Option<String>,

    /// Database index
    #[arg(short, long)]
    db: Option<u32>,

    /// Encoding of text strings in load input (utf-8, latin-1, ascii)
    #[arg(short = 'E', long)]
    encoding: Option<Encoding>,

    /// JSON file with connection defaults; flags override it
    #[arg(long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Load a dump instead of producing one
    #[arg(short, long)]
    load: bool,

    /// Write the dump to FILE instead of stdout
    #[arg(short, long, value_name = "FILE")]
    output: Option<PathBuf>,

    /// Indented, deterministically ordered dump
    #[arg(short = 'y', long)]
    pretty: bool,

    /// Delete every key in the store before loading
    #[arg(short, long)]
    empty: bool,

    /// More logging (-v info, -vv debug, -vvv trace)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Dump to load (stdin if omitted)
    #[arg(value_name = "FILE")]
    files: Vec<PathBuf>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Mode {
    Dump,
    Load,
}

/// Mode implied by the program name, e.g. `redisload` or `ferrum-dump.exe`
fn mode_from_program(program: &str) -> Option<Mode> {
    let name = Path::new(program).file_name()?.to_str()?;
    let stem = name.rsplit_once('.').map_or(name, |(stem, _)| stem);
    [name, stem].into_iter().find_map(|candidate| {
        if candidate.ends_with("load") {
            Some(Mode::Load)
        } else if candidate.ends_with("dump") {
            Some(Mode::Dump)
        } else {
            None
        }
    })
}

/// Pick the mode and reject flags that do not belong to it
fn resolve_mode(cli: &Cli, program: Option<&str>) -> std::result::Result<Mode, String> {
    let mode = if cli.load {
        Mode::Load
    } else {
        program.and_then(mode_from_program).unwrap_or(Mode::Dump)
    };

    match mode {
        Mode::Dump => {
            if !cli.files.is_empty() {
                return Err("dump mode takes no positional arguments".to_string());
            }
            if cli.empty {
                return Err("--empty only applies when loading".to_string());
            }
        }
        Mode::Load => {
            if cli.files.len() > 1 {
                return Err("load mode takes at most one input file".to_string());
            }
            if cli.output.is_some() || cli.pretty {
                return Err("--output and --pretty only apply when dumping".to_string());
            }
        }
    }
    Ok(mode)
}

fn usage_error(message: &str) -> ! {
    eprintln!("error: {}\n", message);
    eprintln!("{}", Cli::command().render_help());
    std::process::exit(USAGE_EXIT_CODE);
}

fn init_logging(verbose: u8) {
    let level = match verbose {
        0 => Level::WARN,
        1 => Level::INFO,
        2 => Level::DEBUG,
        _ => Level::TRACE,
    };

    // Logs go to stderr so a dump on stdout stays clean
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive(level.into()))
        .with_writer(std::io::stderr)
        .init();
}

/// Config file (if any) with command line flags applied on top
fn connection_config(cli: &Cli) -> Result<ConnectionConfig> {
    let mut config = match &cli.config {
        Some(path) => ConnectionConfig::from_json_file(path)
            .with_context(|| format!("reading config {}", path.display()))?,
        None => ConnectionConfig::default(),
    };

    if let Some(host) = &cli.host {
        config.host = host.clone();
    }
    if let Some(port) = cli.port {
        config.port = port;
    }
    if let Some(socket) = &cli.socket {
        config.unix_socket = Some(socket.clone());
    }
    if let Some(password) = &cli.password {
        config.password = Some(password.clone());
    }
    if let Some(db) = cli.db {
        config.db = db;
    }
    if let Some(encoding) = cli.encoding {
        config.encoding = encoding;
    }
    Ok(config)
}

fn describe(config: &ConnectionConfig) -> String {
    match &config.unix_socket {
        Some(path) => path.display().to_string(),
        None => config.address(),
    }
}

/// Decode load input; latin-1 input does not have to be valid UTF-8
fn decode_input(data: Vec<u8>, encoding: Encoding) -> Result<String> {
    match String::from_utf8(data) {
        Ok(text) => Ok(text),
        Err(e) if encoding == Encoding::Latin1 => {
            Ok(e.into_bytes().into_iter().map(char::from).collect())
        }
        Err(e) => Err(e).context("input is not valid UTF-8"),
    }
}

async fn run(cli: Cli, mode: Mode) -> Result<()> {
    let config = connection_config(&cli)?;
    let registry = CodecRegistry::new();

    let mut client = RedisClient::connect(&config)
        .await
        .with_context(|| format!("connecting to {}", describe(&config)))?;

    match mode {
        Mode::Dump => {
            let options = DumpOptions { pretty: cli.pretty };
            let text = dumps(&mut client, &registry, &options)
                .await
                .context("dump failed")?;

            match &cli.output {
                Some(path) => tokio::fs::write(path, text.as_bytes())
                    .await
                    .with_context(|| format!("writing {}", path.display()))?,
                None => {
                    let mut stdout = tokio::io::stdout();
                    stdout.write_all(text.as_bytes()).await?;
                    stdout.flush().await?;
                }
            }
            info!("Dumped {} bytes", text.len());
        }
        Mode::Load => {
            let data = match cli.files.first() {
                Some(path) => tokio::fs::read(path)
                    .await
                    .with_context(|| format!("reading {}", path.display()))?,
                None => {
                    let mut data = Vec::new();
                    tokio::io::stdin()
                        .read_to_end(&mut data)
                        .await
                        .context("reading standard input")?;
                    data
                }
            };
            let text = decode_input(data, config.encoding)?;

            let options = LoadOptions {
                empty: cli.empty,
                encoding: config.encoding,
                ..LoadOptions::default()
            };
            let stats = loads(&mut client, &registry, &text, &options)
                .await
                .context("load failed")?;
            info!(
                "Loaded {} records in {} batches ({} keys deleted first)",
                stats.records_written, stats.batches_flushed, stats.keys_emptied
            );
        }
    }
    Ok(())
}

#[tokio::main(flavor = "current_thread")]
async fn main() {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let program = std::env::args().next();
    let mode = match resolve_mode(&cli, program.as_deref()) {
        Ok(mode) => mode,
        Err(message) => usage_error(&message),
    };

    if let Err(e) = run(cli, mode).await {
        eprintln!("error: {:#}", e);
        std::process::exit(1);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> Cli {
        Cli::try_parse_from(args).unwrap()
    }

    #[test]
    fn test_mode_from_program_name() {
        assert_eq!(mode_from_program("/usr/bin/redisload"), Some(Mode::Load));
        assert_eq!(mode_from_program("ferrum-dump.exe"), Some(Mode::Dump));
        assert_eq!(mode_from_program("./redisdl.py"), None);
        assert_eq!(mode_from_program("ferrumdl"), None);
    }

    #[test]
    fn test_dump_is_default() {
        let cli = parse(&["ferrumdl", "-y", "-o", "out.txt"]);
        assert_eq!(resolve_mode(&cli, Some("ferrumdl")), Ok(Mode::Dump));
    }

    #[test]
    fn test_load_flag_and_program_name() {
        let cli = parse(&["ferrumdl", "-l", "-e", "dump.txt"]);
        assert_eq!(resolve_mode(&cli, Some("ferrumdl")), Ok(Mode::Load));

        let cli = parse(&["redisload", "dump.txt"]);
        assert_eq!(resolve_mode(&cli, Some("redisload")), Ok(Mode::Load));
    }

    #[test]
    fn test_invalid_combinations() {
        let positional_in_dump = parse(&["ferrumdl", "dump.txt"]);
        assert!(resolve_mode(&positional_in_dump, None).is_err());

        let empty_in_dump = parse(&["ferrumdl", "-e"]);
        assert!(resolve_mode(&empty_in_dump, None).is_err());

        let two_inputs = parse(&["ferrumdl", "-l", "a.txt", "b.txt"]);
        assert!(resolve_mode(&two_inputs, None).is_err());

        let pretty_in_load = parse(&["ferrumdl", "-l", "-y"]);
        assert!(resolve_mode(&pretty_in_load, None).is_err());
    }

    #[test]
    fn test_flags_override_defaults() {
        let cli = parse(&["ferrumdl", "-H", "db.local", "-p", "6380", "-d", "2", "-E", "latin-1"]);
        let config = connection_config(&cli).unwrap();
        assert_eq!(config.address(), "db.local:6380");
        assert_eq!(config.db, 2);
        assert_eq!(config.encoding, Encoding::Latin1);
    }

    #[test]
    fn test_decode_latin1_input() {
        let data = b"{b'k': {'type': 'string', 'value': '\xe9'}}".to_vec();
        assert!(decode_input(data.clone(), Encoding::Utf8).is_err());
        let text = decode_input(data, Encoding::Latin1).unwrap();
        assert!(text.ends_with("'\u{e9}'}}"));
    }
}
