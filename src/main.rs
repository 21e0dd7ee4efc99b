//! Dispatches a single `.organic` program through the full pipeline —
//! tokenize, parse (recursing through includes), emit bytecode, run the
//! VM — then either opens a realtime output stream or renders offline to
//! a WAV file, per the flags in [`organic::cli`].

use std::process::ExitCode;
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use tracing::{error, info, warn};

use organic::bytecode::Emitter;
use organic::bytecode_reader;
use organic::cli::Cli;
use organic::error::OrganicResult;
use organic::parser;
use organic::render;
use organic::runtime::RuntimeContext;
use organic::vm::Vm;

fn main() -> ExitCode {
    tracing_subscriber::fmt::init();

    match run() {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            error!("{err}");
            ExitCode::FAILURE
        }
    }
}

fn run() -> OrganicResult<()> {
    // Argument errors are reported before any file I/O (§6).
    let cli = Cli::parse_args()?;

    let (program, diagnostics) = parser::parse_program(&cli.program)?;
    for diagnostic in &diagnostics {
        warn!("{diagnostic}");
    }

    let bytes = Emitter::new().emit_program(&program)?;
    let container = bytecode_reader::read(&bytes)?;
    info!(
        "compiled {} ({} variables, {} resources)",
        cli.program.display(),
        container.variable_count,
        container.resources.len()
    );

    let ctx = RuntimeContext::new(44_100, cli.channels(), 512);
    let mut vm = Vm::new(container);
    vm.run(&ctx)?;

    match &cli.export {
        Some(path) => {
            // `Cli::validate` already requires `--time` alongside `--export`.
            let duration = cli.time.expect("export requires --time");
            render::render_to_wav(&mut vm, &ctx, duration, path)?;
            info!("rendered {} seconds to {}", duration, path.display());
            Ok(())
        }
        None => play_realtime(vm, ctx, cli.time),
    }
}

fn play_realtime(vm: Vm, ctx: RuntimeContext, time: Option<f64>) -> OrganicResult<()> {
    let ctx = Arc::new(ctx);
    let sink = organic::audio_sink::AudioSink::new(vm, ctx)?;

    loop {
        thread::sleep(Duration::from_millis(20));
        match time {
            Some(limit) if sink.clock() >= limit => break,
            Some(_) => {}
            None if !sink.has_pending_work() => break,
            None => {}
        }
    }
    Ok(())
}
