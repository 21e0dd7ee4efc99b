//! Offline rendering: runs a compiled program for a fixed duration and
//! writes the mixed output to a WAV file, for `--export` (§6) instead of
//! the realtime cpal sink in `audio_sink.rs`.

use std::path::Path;

use crate::error::{OrganicError, OrganicResult};
use crate::runtime::RuntimeContext;
use crate::vm::Vm;

/// Renders `vm` for `duration` seconds at `ctx`'s sample rate/channel
/// count into a 16-bit PCM WAV at `path`, advancing the clock one block
/// at a time the same way the realtime sink's callback does.
pub fn render_to_wav(vm: &mut Vm, ctx: &RuntimeContext, duration: f64, path: &Path) -> OrganicResult<()> {
    let spec = hound::WavSpec {
        channels: ctx.channels as u16,
        sample_rate: ctx.sample_rate,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };
    let mut writer = hound::WavWriter::create(path, spec).map_err(|e| OrganicError::file(path, e.to_string()))?;

    let block = ctx.buffer_length as usize;
    let channels = ctx.channels as usize;
    let total_frames = (duration * ctx.sample_rate as f64).round() as u64;
    let mut buffer = vec![0.0f32; block * channels];
    let mut rendered = 0u64;

    while rendered < total_frames {
        let frames = block.min((total_frames - rendered) as usize);
        vm.advance(ctx, ctx.clock());
        vm.mix_into(ctx, &mut buffer, frames);
        for frame in 0..frames {
            for channel in 0..channels {
                let sample = buffer[frame * channels + channel].clamp(-1.0, 1.0);
                writer
                    .write_sample((sample * i16::MAX as f32) as i16)
                    .map_err(|e| OrganicError::file(path, e.to_string()))?;
            }
        }
        ctx.advance_clock(frames as f64 / ctx.sample_rate as f64);
        rendered += frames as u64;
    }

    writer.finalize().map_err(|e| OrganicError::file(path, e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::Node;
    use crate::bytecode::Emitter;
    use crate::bytecode_reader;
    use crate::location::SourceLocation;

    fn empty_vm() -> Vm {
        let path: std::rc::Rc<str> = "t.organic".into();
        let program = Node::Program { instructions: Vec::new(), location: SourceLocation::start_of(path) };
        let bytes = Emitter::new().emit_program(&program).unwrap();
        Vm::new(bytecode_reader::read(&bytes).unwrap())
    }

    #[test]
    fn renders_an_empty_program_to_a_valid_wav_file() {
        let mut vm = empty_vm();
        let ctx = RuntimeContext::default_audio();
        vm.run(&ctx).unwrap();

        let dir = tempfile::tempdir().unwrap();
        let out = dir.path().join("out.wav");
        render_to_wav(&mut vm, &ctx, 0.05, &out).unwrap();

        let reader = hound::WavReader::open(&out).unwrap();
        assert_eq!(reader.spec().channels, ctx.channels as u16);
        assert_eq!(reader.spec().sample_rate, ctx.sample_rate);
        assert!(reader.len() > 0);
    }

    #[test]
    fn render_advances_the_clock_by_the_full_duration() {
        let mut vm = empty_vm();
        let ctx = RuntimeContext::default_audio();
        vm.run(&ctx).unwrap();

        let dir = tempfile::tempdir().unwrap();
        let out = dir.path().join("out.wav");
        render_to_wav(&mut vm, &ctx, 0.1, &out).unwrap();

        assert!((ctx.clock() - 0.1).abs() < 1e-6);
    }
}
