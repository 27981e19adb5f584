use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{FromSample, SizedSample};
use log::warn;

/// Audio-toggling capability consumed by the machine.
///
/// The machine calls these based solely on sound-timer state; repeated
/// calls in the same state are expected and must be harmless.
pub trait Audio {
    fn play(&mut self);
    fn stop(&mut self);
}

/// Audio sink that swallows every toggle, for tests and headless hosts.
pub struct NullAudio;

impl Audio for NullAudio {
    fn play(&mut self) {}

    fn stop(&mut self) {}
}

/// 440 Hz sine tone on the default cpal output device.
///
/// The stream is built once, starts paused, and is toggled by play/stop.
pub struct Beeper {
    stream: cpal::Stream,
    playing: bool,
}

impl Beeper {
    pub fn new() -> Option<Self> {
        let host = cpal::default_host();
        let device = match host.default_output_device() {
            Some(device) => device,
            None => {
                warn!("no audio output device available");
                return None;
            }
        };
        let supported = match device.supported_output_configs() {
            Ok(mut configs) => configs.next()?.with_max_sample_rate(),
            Err(e) => {
                warn!("error while querying audio configs: {e}");
                return None;
            }
        };
        let format = supported.sample_format();
        let config = supported.into();

        let stream = match format {
            cpal::SampleFormat::I8 => Self::build_stream::<i8>(&device, &config),
            cpal::SampleFormat::I16 => Self::build_stream::<i16>(&device, &config),
            cpal::SampleFormat::I32 => Self::build_stream::<i32>(&device, &config),
            cpal::SampleFormat::I64 => Self::build_stream::<i64>(&device, &config),
            cpal::SampleFormat::U8 => Self::build_stream::<u8>(&device, &config),
            cpal::SampleFormat::U16 => Self::build_stream::<u16>(&device, &config),
            cpal::SampleFormat::U32 => Self::build_stream::<u32>(&device, &config),
            cpal::SampleFormat::U64 => Self::build_stream::<u64>(&device, &config),
            cpal::SampleFormat::F32 => Self::build_stream::<f32>(&device, &config),
            cpal::SampleFormat::F64 => Self::build_stream::<f64>(&device, &config),
            format => {
                warn!("unsupported sample format '{format}'");
                return None;
            }
        };
        let stream = match stream {
            Ok(stream) => stream,
            Err(e) => {
                warn!("failed to build audio stream: {e}");
                return None;
            }
        };
        if let Err(e) = stream.pause() {
            warn!("failed to pause audio stream: {e}");
        }

        Some(Self {
            stream,
            playing: false,
        })
    }

    fn build_stream<T>(
        device: &cpal::Device,
        config: &cpal::StreamConfig,
    ) -> Result<cpal::Stream, cpal::BuildStreamError>
    where
        T: SizedSample + FromSample<f32>,
    {
        let sample_rate = config.sample_rate.0 as f32;
        let channels = config.channels as usize;

        // Sinusoid of maximum amplitude.
        let mut sample_clock = 0f32;
        let mut next_value = move || {
            sample_clock = (sample_clock + 1.0) % sample_rate;
            (sample_clock * 440.0 * 2.0 * std::f32::consts::PI / sample_rate).sin()
        };

        let err_fn = |err| warn!("an error occurred on the audio stream: {err}");

        device.build_output_stream(
            config,
            move |data: &mut [T], _: &cpal::OutputCallbackInfo| {
                Self::write_data(data, channels, &mut next_value)
            },
            err_fn,
            None,
        )
    }

    fn write_data<T>(output: &mut [T], channels: usize, next_sample: &mut dyn FnMut() -> f32)
    where
        T: SizedSample + FromSample<f32>,
    {
        for frame in output.chunks_mut(channels) {
            let value: T = T::from_sample(next_sample());
            for sample in frame.iter_mut() {
                *sample = value;
            }
        }
    }
}

impl Audio for Beeper {
    fn play(&mut self) {
        if !self.playing {
            if let Err(e) = self.stream.play() {
                warn!("failed to start tone: {e}");
            }
            self.playing = true;
        }
    }

    fn stop(&mut self) {
        if self.playing {
            if let Err(e) = self.stream.pause() {
                warn!("failed to stop tone: {e}");
            }
            self.playing = false;
        }
    }
}
