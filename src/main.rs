use binview::engine::codec;
use binview::{ElementKind, Engine, EngineConfig, JsString, JsValue};
use clap::{Parser, Subcommand};
use rustc_hash::FxHashMap;
use std::process::ExitCode;

#[derive(Parser)]
#[command(name = "binview", version, about = "Typed numeric views over byte stores")]
struct Cli {
    /// Ceiling on native store bytes
    #[arg(long, global = true)]
    native_limit: Option<usize>,

    /// Longest string join may produce
    #[arg(long, global = true)]
    max_string_length: Option<usize>,

    /// Reject BigInt values that do not fit 64 bits
    #[arg(long, global = true)]
    strict_bigint: bool,

    /// Largest store kept inline
    #[arg(long, global = true)]
    on_heap_max: Option<usize>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Decode hex bytes into elements
    Decode {
        #[arg(long)]
        kind: String,
        #[arg(long)]
        big_endian: bool,
        hex: String,
    },
    /// Encode values into hex bytes
    Encode {
        #[arg(long)]
        kind: String,
        #[arg(long)]
        big_endian: bool,
        #[arg(allow_hyphen_values = true)]
        values: Vec<String>,
    },
    /// Store values in a view and join them
    Join {
        #[arg(long)]
        kind: String,
        #[arg(long)]
        separator: Option<String>,
        #[arg(allow_hyphen_values = true)]
        values: Vec<String>,
    },
}

#[derive(Debug, thiserror::Error)]
enum CliError {
    #[error("unknown element kind '{0}'")]
    UnknownKind(String),
    #[error("invalid hex input: {0}")]
    BadHex(String),
    #[error(transparent)]
    Engine(#[from] binview::Error),
}

fn kind_table() -> FxHashMap<String, ElementKind> {
    let mut table = FxHashMap::default();
    for kind in ElementKind::ALL {
        let full = kind.name().to_ascii_lowercase();
        let short = full.trim_end_matches("array").to_string();
        table.insert(full, kind);
        table.insert(short, kind);
    }
    table
}

fn parse_kind(name: &str) -> Result<ElementKind, CliError> {
    kind_table()
        .get(&name.to_ascii_lowercase())
        .copied()
        .ok_or_else(|| CliError::UnknownKind(name.to_string()))
}

fn parse_hex(input: &str) -> Result<Vec<u8>, CliError> {
    let digits: String = input
        .trim_start_matches("0x")
        .chars()
        .filter(|c| !c.is_whitespace() && *c != '_')
        .collect();
    if digits.len() % 2 != 0 {
        return Err(CliError::BadHex("odd number of digits".to_string()));
    }
    (0..digits.len())
        .step_by(2)
        .map(|i| {
            u8::from_str_radix(&digits[i..i + 2], 16)
                .map_err(|_| CliError::BadHex(digits[i..i + 2].to_string()))
        })
        .collect()
}

fn config_from(cli: &Cli) -> EngineConfig {
    let mut config = EngineConfig::default().with_strict_bigint(cli.strict_bigint);
    if let Some(limit) = cli.native_limit {
        config = config.with_native_size_limit(limit);
    }
    if let Some(len) = cli.max_string_length {
        config = config.with_max_string_length(len);
    }
    if let Some(bytes) = cli.on_heap_max {
        config = config.with_on_heap_max_bytes(bytes);
    }
    config
}

fn run_decode(kind: ElementKind, big_endian: bool, hex: &str) -> Result<String, CliError> {
    let bytes = parse_hex(hex)?;
    let size = kind.bytes_per_element();
    if bytes.len() % size != 0 {
        return Err(CliError::BadHex(format!(
            "{} bytes is not a whole number of {} elements",
            bytes.len(),
            kind.name()
        )));
    }
    let parts: Vec<String> = bytes
        .chunks_exact(size)
        .map(|chunk| codec::decode(chunk, kind, !big_endian).to_js_string().to_rust_string())
        .collect();
    Ok(parts.join(" "))
}

fn run_encode(engine: &Engine, kind: ElementKind, big_endian: bool, values: &[String]) -> Result<String, CliError> {
    let mut out = String::new();
    let mut slot = [0u8; 8];
    for value in values {
        let numeric = engine.coerce_for_kind(kind, &JsValue::string(value))?;
        engine.check_lossless(codec::encode(&numeric, kind, !big_endian, &mut slot), kind)?;
        for byte in &slot[..kind.bytes_per_element()] {
            out.push_str(&format!("{byte:02x}"));
        }
    }
    Ok(out)
}

fn run_join(engine: &Engine, kind: ElementKind, separator: Option<&str>, values: &[String]) -> Result<String, CliError> {
    let values: Vec<JsValue> = values.iter().map(|v| JsValue::string(v)).collect();
    let view = engine.view_of(kind, &values)?;
    let separator = separator.map(JsString::from_str);
    Ok(engine.join(&view, separator.as_ref())?.to_rust_string())
}

fn run(cli: &Cli) -> Result<String, CliError> {
    let engine = Engine::new(config_from(cli));
    log::debug!("engine config: {:?}", engine.config());
    match &cli.command {
        Command::Decode { kind, big_endian, hex } => run_decode(parse_kind(kind)?, *big_endian, hex),
        Command::Encode {
            kind,
            big_endian,
            values,
        } => run_encode(&engine, parse_kind(kind)?, *big_endian, values),
        Command::Join {
            kind,
            separator,
            values,
        } => run_join(&engine, parse_kind(kind)?, separator.as_deref(), values),
    }
}

fn main() -> ExitCode {
    env_logger::init();
    let cli = Cli::parse();

    match run(&cli) {
        Ok(output) => {
            println!("{output}");
            ExitCode::SUCCESS
        }
        Err(e) => {
            eprintln!("{e}");
            ExitCode::from(1)
        }
    }
}
