//! End-to-end tests: write an `.organic` source file to disk, run it
//! through the real parser/emitter/VM/render pipeline, and check the
//! resulting WAV against the concrete scenarios in the spec.

use std::f32::consts::PI;
use std::path::{Path, PathBuf};

use organic::bytecode::Emitter;
use organic::bytecode_reader;
use organic::parser;
use organic::render;
use organic::runtime::RuntimeContext;
use organic::vm::Vm;

struct TempOrganicFile(PathBuf);

impl TempOrganicFile {
    fn new(name: &str, source: &str) -> Self {
        let mut path = std::env::temp_dir();
        path.push(format!("organic-e2e-{}-{}.organic", name, std::process::id()));
        std::fs::write(&path, source).unwrap();
        Self(path)
    }

    fn path(&self) -> &Path {
        &self.0
    }
}

impl Drop for TempOrganicFile {
    fn drop(&mut self) {
        std::fs::remove_file(&self.0).ok();
    }
}

fn compile_and_run(path: &Path, ctx: &RuntimeContext) -> Vm {
    let (program, diagnostics) = parser::parse_program(path).unwrap();
    assert!(diagnostics.is_empty(), "unexpected diagnostics: {diagnostics:?}");
    let bytes = Emitter::new().emit_program(&program).unwrap();
    let container = bytecode_reader::read(&bytes).unwrap();
    let mut vm = Vm::new(container);
    vm.run(ctx).unwrap();
    vm
}

fn rms(samples: &[i16]) -> f64 {
    if samples.is_empty() {
        return 0.0;
    }
    let sum_sq: f64 = samples.iter().map(|s| (*s as f64 / i16::MAX as f64).powi(2)).sum();
    (sum_sq / samples.len() as f64).sqrt()
}

/// Scenario from spec.md: a bare `sine(...)` call is auto-wrapped in
/// `play(...)` and renders a non-silent tone.
#[test]
fn bare_sine_call_renders_audible_output() {
    let file = TempOrganicFile::new("sine", "sine(volume: 1, frequency: 440)");
    let ctx = RuntimeContext::default_audio();
    let mut vm = compile_and_run(file.path(), &ctx);

    let dir = tempfile::tempdir().unwrap();
    let out = dir.path().join("sine.wav");
    render::render_to_wav(&mut vm, &ctx, 0.25, &out).unwrap();

    let mut reader = hound::WavReader::open(&out).unwrap();
    let samples: Vec<i16> = reader.samples::<i16>().map(|s| s.unwrap()).collect();
    assert!(rms(&samples) > 0.001, "expected an audible tone, got near-silence");
}

/// A `sweep`-modulated frequency should still render without error and
/// produce a changing, non-silent signal over its sweep window.
#[test]
fn swept_sine_renders_without_clipping_to_silence() {
    let file = TempOrganicFile::new(
        "sweep",
        "sine(volume: 1, frequency: sweep(from: 110, to: 220, length: 1000))",
    );
    let ctx = RuntimeContext::default_audio();
    let mut vm = compile_and_run(file.path(), &ctx);

    let dir = tempfile::tempdir().unwrap();
    let out = dir.path().join("sweep.wav");
    render::render_to_wav(&mut vm, &ctx, 1.0, &out).unwrap();

    let mut reader = hound::WavReader::open(&out).unwrap();
    let samples: Vec<i16> = reader.samples::<i16>().map(|s| s.unwrap()).collect();
    assert!(rms(&samples) > 0.001);
}

/// A `perform` block retriggers its action on an interval; rendering for
/// several periods should yield more energy than a single one-shot voice
/// playing for the same span.
#[test]
fn perform_retriggers_on_an_interval() {
    let file = TempOrganicFile::new(
        "perform",
        "perform(action: sine(volume: 1, frequency: 330), interval: 200)",
    );
    let ctx = RuntimeContext::default_audio();
    let mut vm = compile_and_run(file.path(), &ctx);

    let dir = tempfile::tempdir().unwrap();
    let out = dir.path().join("perform.wav");
    render::render_to_wav(&mut vm, &ctx, 1.0, &out).unwrap();

    let mut reader = hound::WavReader::open(&out).unwrap();
    let samples: Vec<i16> = reader.samples::<i16>().map(|s| s.unwrap()).collect();
    assert!(rms(&samples) > 0.001);
}

/// A user-defined function body should compile and run identically to an
/// inlined call to the same intrinsic.
#[test]
fn user_defined_function_wraps_an_intrinsic_call() {
    let file = TempOrganicFile::new(
        "define",
        "tone(freq) = { sine(volume: 1, frequency: freq) }\ntone(440)",
    );
    let ctx = RuntimeContext::default_audio();
    let mut vm = compile_and_run(file.path(), &ctx);

    let dir = tempfile::tempdir().unwrap();
    let out = dir.path().join("define.wav");
    render::render_to_wav(&mut vm, &ctx, 0.25, &out).unwrap();

    let mut reader = hound::WavReader::open(&out).unwrap();
    let samples: Vec<i16> = reader.samples::<i16>().map(|s| s.unwrap()).collect();
    assert!(rms(&samples) > 0.001);
}

/// An `include(...)` of a second file should merge its definitions into
/// the including file's scope, making them callable.
#[test]
fn include_merges_definitions_into_the_including_scope() {
    let mut included_path = std::env::temp_dir();
    included_path.push(format!("organic-e2e-included-{}.organic", std::process::id()));
    std::fs::write(&included_path, "tone(freq) = { sine(volume: 1, frequency: freq) }").unwrap();

    let main_source = format!("include(\"{}\")\ntone(440)", included_path.display());
    let file = TempOrganicFile::new("includer", &main_source);

    let ctx = RuntimeContext::default_audio();
    let mut vm = compile_and_run(file.path(), &ctx);

    let dir = tempfile::tempdir().unwrap();
    let out = dir.path().join("include.wav");
    render::render_to_wav(&mut vm, &ctx, 0.25, &out).unwrap();

    let mut reader = hound::WavReader::open(&out).unwrap();
    let samples: Vec<i16> = reader.samples::<i16>().map(|s| s.unwrap()).collect();
    assert!(rms(&samples) > 0.001);

    std::fs::remove_file(&included_path).ok();
}

/// A malformed program (unknown identifier) should surface a parse error
/// rather than panicking or silently producing an empty program.
#[test]
fn unknown_identifier_is_a_parse_error() {
    let file = TempOrganicFile::new("bad", "frobnicate(1, 2)");
    let result = parser::parse_program(file.path());
    assert!(result.is_err());
}

#[allow(dead_code)]
fn sine_reference(freq: f32, t: f32, sample_rate: f32) -> f32 {
    (2.0 * PI * freq * t / sample_rate).sin()
}
