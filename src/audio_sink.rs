//! Real-time audio output (§4.5/§5), adapting `audio.rs`'s cpal wiring to
//! drive a compiled [`Vm`] instead of a sample-playback mixer: every
//! callback advances the shared clock by the frame count it's asked to
//! fill, then lets the VM mix its active voices into that many frames —
//! the same advance-then-mix sequence `render.rs` uses for offline export.

use std::sync::{Arc, Mutex};

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use tracing::{error, info};

use crate::error::{OrganicError, OrganicResult};
use crate::runtime::RuntimeContext;
use crate::vm::Vm;

pub struct AudioSink {
    ctx: Arc<RuntimeContext>,
    vm: Arc<Mutex<Vm>>,
    _stream: cpal::Stream,
}

impl AudioSink {
    /// Opens the default output device and starts streaming `vm`'s mix.
    /// `ctx`'s sample rate/channel count should already match the device;
    /// the caller builds it from `device.default_output_config()` before
    /// constructing this (see `cli.rs`/`main.rs`).
    pub fn new(vm: Vm, ctx: Arc<RuntimeContext>) -> OrganicResult<Self> {
        let host = cpal::default_host();
        info!("audio host: {:?}", host.id());

        let device = host
            .default_output_device()
            .ok_or_else(|| OrganicError::machine("no audio output device found"))?;
        info!("audio device: {}", device.name().unwrap_or_default());

        let config = device
            .default_output_config()
            .map_err(|e| OrganicError::machine(format!("no output config: {e}")))?;
        info!("audio config: {:?}", config);

        let vm = Arc::new(Mutex::new(vm));
        let vm_clone = vm.clone();
        let ctx_clone = ctx.clone();
        let channels = config.channels() as usize;

        let stream = match config.sample_format() {
            cpal::SampleFormat::F32 => Self::build_stream::<f32>(&device, &config.into(), vm_clone, ctx_clone, channels),
            cpal::SampleFormat::I16 => Self::build_stream::<i16>(&device, &config.into(), vm_clone, ctx_clone, channels),
            cpal::SampleFormat::U16 => Self::build_stream::<u16>(&device, &config.into(), vm_clone, ctx_clone, channels),
            other => return Err(OrganicError::machine(format!("unsupported sample format: {other:?}"))),
        }?;

        stream.play().map_err(|e| OrganicError::machine(format!("failed to start stream: {e}")))?;
        info!("audio stream started at {} Hz", ctx.sample_rate);

        Ok(Self { ctx, vm, _stream: stream })
    }

    fn build_stream<T>(
        device: &cpal::Device,
        config: &cpal::StreamConfig,
        vm: Arc<Mutex<Vm>>,
        ctx: Arc<RuntimeContext>,
        channels: usize,
    ) -> OrganicResult<cpal::Stream>
    where
        T: cpal::SizedSample + cpal::FromSample<f32>,
    {
        let mut scratch: Vec<f32> = Vec::new();
        let stream = device
            .build_output_stream(
                config,
                move |data: &mut [T], _: &cpal::OutputCallbackInfo| {
                    let frames = data.len() / channels;
                    scratch.clear();
                    scratch.resize(frames * channels, 0.0);

                    let mut vm = vm.lock().unwrap();
                    vm.advance(&ctx, ctx.clock());
                    vm.mix_into(&ctx, &mut scratch, frames);
                    ctx.advance_clock(frames as f64 / ctx.sample_rate as f64);

                    for (out, sample) in data.iter_mut().zip(scratch.iter()) {
                        *out = T::from_sample(*sample);
                    }
                },
                |err| error!("audio stream error: {}", err),
                None,
            )
            .map_err(|e| OrganicError::machine(format!("failed to build stream: {e}")))?;

        Ok(stream)
    }

    /// Whether the program still has active voices or scheduled events —
    /// callers use this to decide when to stop waiting on a finite piece.
    pub fn has_pending_work(&self) -> bool {
        self.vm.lock().unwrap().has_pending_work()
    }

    pub fn clock(&self) -> f64 {
        self.ctx.clock()
    }
}
