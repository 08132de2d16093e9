//! Purpose: `bagsdk` CLI entry point: raw API calls plus a few view-level file commands.
//! Role: Binary crate root; parses args, builds a `BagClient`, emits JSON on stdout.
//! Invariants: Errors are emitted as JSON on stderr (plain text on a terminal).
//! Invariants: Process exit code is derived from `api::to_exit_code`.
//! Invariants: Flags override `BAGSDK_*` environment values key by key.
#![allow(clippy::result_large_err)]
use std::error::Error as StdError;
use std::fs::File;
use std::io::{self, IsTerminal, Write};
use std::path::PathBuf;

use bagsdk::api::{
    BagClient, CallOptions, ClientConfig, Error, ErrorKind, Host, LogLevel, to_exit_code,
};
use bagsdk::config::{ENV_API_URL, ENV_CONTENT_URL, ENV_LOG, ENV_TIMEOUT_MS, ENV_TOKEN};
use clap::{Parser, Subcommand, error::ErrorKind as ClapErrorKind};
use serde_json::{Map, Value, json};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(
    name = "bagsdk",
    version,
    about = "Talk to a bag storage service from the command line",
    arg_required_else_help = true
)]
struct Cli {
    #[arg(long, global = true, help = "API host base URL (env: BAGSDK_API_URL)")]
    api_url: Option<String>,
    #[arg(long, global = true, help = "Content host base URL (env: BAGSDK_CONTENT_URL)")]
    content_url: Option<String>,
    #[arg(long, global = true, help = "Bearer token (env: BAGSDK_TOKEN)")]
    token: Option<String>,
    #[arg(
        long,
        global = true,
        help = "Request logging on stderr: none|single|headers|body (env: BAGSDK_LOG)"
    )]
    log_level: Option<String>,
    #[arg(long, global = true, help = "Per-call timeout in milliseconds (env: BAGSDK_TIMEOUT_MS)")]
    timeout_ms: Option<u64>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// GET a path on the API host and print the JSON response.
    Get { path: String },
    /// POST JSON to a path on the API host.
    Post {
        path: String,
        #[arg(long, help = "JSON request body")]
        data: Option<String>,
    },
    /// PUT JSON to a path on the API host.
    Put {
        path: String,
        #[arg(long, help = "JSON request body")]
        data: Option<String>,
    },
    /// DELETE a path on the API host.
    Delete {
        path: String,
        #[arg(long, help = "JSON request body")]
        data: Option<String>,
    },
    /// List a folder in a view.
    Ls {
        view: String,
        #[arg(default_value = "/")]
        folder: String,
    },
    /// Download a file from a view (stdout unless --out is given).
    Download {
        view: String,
        remote: String,
        #[arg(long, help = "Write the file here instead of stdout")]
        out: Option<PathBuf>,
    },
    /// Upload a local file into a view.
    Upload {
        view: String,
        local: PathBuf,
        remote: String,
    },
}

fn main() {
    let exit_code = match run() {
        Ok(code) => code,
        Err(err) => {
            emit_error(&err);
            to_exit_code(err.kind())
        }
    };
    std::process::exit(exit_code);
}

fn run() -> Result<i32, Error> {
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(err) => match err.kind() {
            ClapErrorKind::DisplayHelp
            | ClapErrorKind::DisplayVersion
            | ClapErrorKind::DisplayHelpOnMissingArgumentOrSubcommand => {
                err.print().map_err(|io_err| {
                    Error::new(ErrorKind::Io)
                        .with_message("failed to write help")
                        .with_source(io_err)
                })?;
                let code = if err.kind() == ClapErrorKind::DisplayHelpOnMissingArgumentOrSubcommand {
                    2
                } else {
                    0
                };
                return Ok(code);
            }
            _ => {
                return Err(Error::new(ErrorKind::Usage).with_message(clap_error_summary(&err)));
            }
        },
    };

    let config = load_config(&cli)?;
    if config.log_level != LogLevel::None {
        init_tracing();
    }
    let client = BagClient::new(config);
    dispatch(&client, cli.command)?;
    Ok(0)
}

fn load_config(cli: &Cli) -> Result<ClientConfig, Error> {
    ClientConfig::from_lookup(|key| {
        let flag = match key {
            ENV_API_URL => cli.api_url.clone(),
            ENV_CONTENT_URL => cli.content_url.clone(),
            ENV_TOKEN => cli.token.clone(),
            ENV_LOG => cli.log_level.clone(),
            ENV_TIMEOUT_MS => cli.timeout_ms.map(|ms| ms.to_string()),
            _ => None,
        };
        flag.or_else(|| std::env::var(key).ok())
    })
}

fn dispatch(client: &BagClient, command: Command) -> Result<(), Error> {
    let transport = client.transport();
    match command {
        Command::Get { path } => {
            let url = client.config().resolve(Host::Api, &path)?;
            let value: Value = transport.get(url.as_str(), CallOptions::new())?.into_result()?;
            emit_json(&value);
        }
        Command::Post { path, data } => {
            let url = client.config().resolve(Host::Api, &path)?;
            let data = parse_data(data.as_deref())?;
            let value: Value = transport
                .post(url.as_str(), data.as_ref(), CallOptions::new())?
                .into_result()?;
            emit_json(&value);
        }
        Command::Put { path, data } => {
            let url = client.config().resolve(Host::Api, &path)?;
            let data = parse_data(data.as_deref())?;
            let value: Value = transport
                .put(url.as_str(), data.as_ref(), CallOptions::new())?
                .into_result()?;
            emit_json(&value);
        }
        Command::Delete { path, data } => {
            let url = client.config().resolve(Host::Api, &path)?;
            let data = parse_data(data.as_deref())?;
            transport
                .delete(url.as_str(), data.as_ref(), CallOptions::new())?
                .into_result()?;
            emit_json(&json!({"deleted": true}));
        }
        Command::Ls { view, folder } => {
            let entries = client.view(view).list_folder(&folder)?;
            emit_json(&to_json(&entries)?);
        }
        Command::Download { view, remote, out } => {
            let body = client.view(view).download(&remote)?;
            match out {
                Some(path) => {
                    let mut file = File::create(&path).map_err(|err| {
                        Error::new(ErrorKind::Io)
                            .with_message(format!("create {}", path.display()))
                            .with_source(err)
                    })?;
                    let bytes = match body {
                        Some(mut body) => body.copy_to(&mut file).map_err(download_failed)?,
                        None => 0,
                    };
                    emit_json(&json!({"path": path.display().to_string(), "bytes": bytes}));
                }
                None => {
                    let mut stdout = io::stdout().lock();
                    if let Some(mut body) = body {
                        body.copy_to(&mut stdout).map_err(download_failed)?;
                    }
                    stdout.flush().map_err(download_failed)?;
                }
            }
        }
        Command::Upload {
            view,
            local,
            remote,
        } => {
            let ticket = client.view(view).upload_file(&local, &remote)?;
            emit_json(&to_json(&ticket)?);
        }
    }
    Ok(())
}

fn parse_data(data: Option<&str>) -> Result<Option<Value>, Error> {
    data.map(|text| {
        serde_json::from_str(text).map_err(|err| {
            Error::new(ErrorKind::Usage)
                .with_message("--data is not valid JSON")
                .with_source(err)
        })
    })
    .transpose()
}

fn to_json<T: serde::Serialize>(value: &T) -> Result<Value, Error> {
    serde_json::to_value(value).map_err(|err| {
        Error::new(ErrorKind::Encode)
            .with_message("failed to encode output")
            .with_source(err)
    })
}

fn download_failed(err: io::Error) -> Error {
    Error::new(ErrorKind::Io)
        .with_message("failed to write downloaded bytes")
        .with_source(err)
}

fn init_tracing() {
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("bagsdk=info"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(io::stderr)
        .try_init();
}

fn emit_json(value: &Value) {
    let json = if io::stdout().is_terminal() {
        serde_json::to_string_pretty(value)
    } else {
        serde_json::to_string(value)
    }
    .unwrap_or_else(|_| "{\"error\":\"json encode failed\"}".to_string());
    println!("{json}");
}

fn emit_error(err: &Error) {
    if io::stderr().is_terminal() {
        eprintln!("error: {err}");
        for cause in error_causes(err) {
            eprintln!("  caused by: {cause}");
        }
        return;
    }
    let json = serde_json::to_string(&error_json(err)).unwrap_or_else(|_| {
        "{\"error\":{\"kind\":\"Encode\",\"message\":\"json encode failed\"}}".to_string()
    });
    eprintln!("{json}");
}

fn error_causes(err: &Error) -> Vec<String> {
    let mut causes = Vec::new();
    let mut cur = err.source();
    while let Some(source) = cur {
        causes.push(source.to_string());
        cur = source.source();
    }
    causes
}

fn error_json(err: &Error) -> Value {
    let mut inner = Map::new();
    inner.insert("kind".to_string(), json!(format!("{:?}", err.kind())));
    inner.insert("message".to_string(), json!(err.message()));
    if !err.name().is_empty() {
        inner.insert("name".to_string(), json!(err.name()));
    }
    if let Some(status) = err.status() {
        inner.insert("status".to_string(), json!(status));
    }
    if !err.entries().is_empty() {
        inner.insert("entries".to_string(), json!(err.entries()));
    }
    let causes = error_causes(err);
    if !causes.is_empty() {
        inner.insert("causes".to_string(), json!(causes));
    }

    let mut outer = Map::new();
    outer.insert("error".to_string(), Value::Object(inner));
    Value::Object(outer)
}

fn clap_error_summary(err: &clap::Error) -> String {
    let rendered = err.to_string();
    rendered
        .lines()
        .map(str::trim)
        .find(|line| !line.is_empty())
        .map(|line| line.trim_start_matches("error: ").to_string())
        .unwrap_or_else(|| "invalid arguments".to_string())
}
