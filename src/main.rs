//! pvcr - record and replay process invocations
//!
//! - `pvcr run --recordings FILE -- CMD [ARGS...]` replays CMD from FILE, or
//!   runs and records it
//! - `pvcr show FILE` lists the recordings persisted in FILE
//! - `pvcr clean FILE` empties FILE

use std::ffi::OsString;
use std::io::{self, Read, Write};
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use parking_lot::Mutex;

use pvcr::{
    InterceptingRunner, Payload, ProcessError, ProcessRunner, RecordMode, Recording, Recordings,
    RunOptions, Settings,
};

/// Exit code of an invocation that was blocked because it was not recorded
const EXIT_BLOCKED: u8 = 2;

#[derive(Parser)]
#[command(name = "pvcr")]
#[command(about = "Record and replay process invocations")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Replay a command from a recordings file, or run and record it
    Run(RunArgs),

    /// List the recordings persisted in a file
    Show(ShowArgs),

    /// Reset a recordings file to an empty document
    Clean(CleanArgs),
}

#[derive(Args)]
struct RunArgs {
    /// Recordings file to replay from and record into
    #[arg(long, short = 'r')]
    recordings: PathBuf,

    /// Record mode (new, none, all, once)
    #[arg(long)]
    record_mode: Option<RecordMode>,

    /// Fail instead of running unrecorded commands
    #[arg(long)]
    block_run: bool,

    /// Regex for volatile arguments (repeatable)
    #[arg(long = "fuzzy-matcher", value_name = "RE")]
    fuzzy_matchers: Vec<String>,

    /// Replay immediately instead of emulating the recorded duration
    #[arg(long)]
    no_wait: bool,

    /// Forward this process's stdin to the command
    #[arg(long)]
    stdin: bool,

    /// Command line to run
    #[arg(last = true, required = true, value_name = "CMD")]
    command: Vec<String>,
}

#[derive(Args)]
struct ShowArgs {
    file: PathBuf,

    /// Print JSON instead of text
    #[arg(long)]
    json: bool,
}

#[derive(Args)]
struct CleanArgs {
    file: PathBuf,
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::WARN.into()),
        )
        .with_writer(io::stderr)
        .with_ansi(false)
        .init();

    let cli = Cli::parse();
    let result = match cli.command {
        Commands::Run(args) => run(args),
        Commands::Show(args) => show(args).map(|()| ExitCode::SUCCESS),
        Commands::Clean(args) => clean(args).map(|()| ExitCode::SUCCESS),
    };

    match result {
        Ok(code) => code,
        Err(err) => {
            eprintln!("pvcr: {err:#}");
            ExitCode::FAILURE
        }
    }
}

fn run(args: RunArgs) -> Result<ExitCode> {
    let mut settings = Settings::load()?;
    if let Some(mode) = args.record_mode {
        settings.record_mode = mode;
    }
    settings.block_run |= args.block_run;
    settings.fuzzy_matchers.extend(args.fuzzy_matchers);
    if args.no_wait {
        settings.wait = false;
    }

    let recordings = Recordings::new(
        &args.recordings,
        settings.record_mode,
        &settings.fuzzy_matchers,
    )?;
    let runner = InterceptingRunner::new(Arc::new(Mutex::new(recordings)))
        .block_all(settings.block_run)
        .wait(settings.wait);

    let mut options = RunOptions::new();
    if args.stdin {
        let mut input = Vec::new();
        io::stdin()
            .read_to_end(&mut input)
            .context("Failed to read stdin")?;
        options = options.stdin(Payload::from_output(input));
    }

    let argv: Vec<OsString> = args.command.iter().map(OsString::from).collect();
    let completed = match runner.run(&argv, &options) {
        Ok(completed) => completed,
        Err(err @ ProcessError::Blocked { .. }) => {
            eprintln!("pvcr: {err}");
            return Ok(ExitCode::from(EXIT_BLOCKED));
        }
        Err(err) => return Err(err.into()),
    };

    io::stdout().write_all(completed.stdout_bytes())?;
    io::stdout().flush()?;
    io::stderr().write_all(completed.stderr_bytes())?;

    let code = completed.returncode.unwrap_or(1);
    Ok(ExitCode::from(u8::try_from(code & 0xff).unwrap_or(1)))
}

fn show(args: ShowArgs) -> Result<()> {
    let recordings = Recordings::new(&args.file, RecordMode::None, Vec::<String>::new())?;
    let persisted = recordings.persisted()?;

    let mut out = io::stdout().lock();
    if args.json {
        let entries = persisted
            .iter()
            .map(|recording| serde_json::to_value(recording.to_encoded_dict()))
            .collect::<Result<Vec<_>, _>>()?;
        serde_json::to_writer_pretty(&mut out, &entries)?;
        writeln!(out)?;
        return Ok(());
    }

    if persisted.is_empty() {
        writeln!(out, "No recordings in {}", args.file.display())?;
        return Ok(());
    }
    for (index, recording) in persisted.iter().enumerate() {
        write_recording(&mut out, index, recording)?;
    }
    Ok(())
}

fn write_recording(out: &mut impl Write, index: usize, recording: &Recording) -> io::Result<()> {
    let rc = recording
        .rc
        .map(|rc| rc.to_string())
        .unwrap_or_else(|| "-".to_string());
    let duration = recording
        .duration
        .map(|us| format!("{us}us"))
        .unwrap_or_else(|| "-".to_string());
    writeln!(
        out,
        "[{index}] {} (iteration {}, rc {rc}, {duration})",
        recording.args.join(" "),
        recording.iteration
    )?;
    for (label, payload) in [
        ("stdin", &recording.stdin),
        ("stdout", &recording.stdout),
        ("stderr", &recording.stderr),
    ] {
        if let Some(payload) = payload {
            write_payload(out, label, payload)?;
        }
    }
    Ok(())
}

fn write_payload(out: &mut impl Write, label: &str, payload: &Payload) -> io::Result<()> {
    if payload.is_binary() {
        return writeln!(out, "    {label}: <{} bytes>", payload.as_bytes().len());
    }
    let text = payload.to_string_lossy();
    if text.is_empty() {
        return Ok(());
    }
    writeln!(out, "    {label}:")?;
    for line in text.lines() {
        writeln!(out, "      {line}")?;
    }
    Ok(())
}

fn clean(args: CleanArgs) -> Result<()> {
    let mut recordings = Recordings::new(&args.file, RecordMode::New, Vec::<String>::new())?;
    recordings.clean(true)?;
    tracing::debug!(path = %args.file.display(), "Cleaned recordings file");
    Ok(())
}
