pub mod channel;

use crate::{
    emu::{schedule::Event, Emu},
    rtc::Rtc,
};
use channel::Channel;

/// One output sample every 1024 ARM7 cycles (32.768 kHz).
pub const CYCLES_PER_SAMPLE: u64 = 1024;

proc_bitfield::bitfield! {
    #[derive(Clone, Copy, PartialEq, Eq)]
    pub struct Control(pub u16): Debug {
        pub master_volume: u8 @ 0..=6,
        pub left_output_source: u8 @ 8..=9,
        pub right_output_source: u8 @ 10..=11,
        pub channel_1_skip_mixer: bool @ 12,
        pub channel_3_skip_mixer: bool @ 13,
        pub master_enable: bool @ 15,
    }
}

/// The 16-channel mixer. Samples are accumulated per frame and drained by
/// the frontend through [`Emu::audio_samples`].
pub struct Audio {
    pub channels: [Channel; 16],
    pub control: Control,
    bias: u16,
    capture_control: [u8; 2],
    sixteen_bit_output: bool,
    interpolate: bool,
    samples: Vec<i16>,
}

impl Audio {
    pub(crate) fn new(sixteen_bit_output: bool, interpolate: bool) -> Self {
        Audio {
            channels: [Channel::new(); 16],
            control: Control(0),
            bias: 0,
            capture_control: [0; 2],
            sixteen_bit_output,
            interpolate,
            samples: Vec::with_capacity(1100),
        }
    }

    #[inline]
    pub fn bias(&self) -> u16 {
        self.bias
    }

    pub fn write_bias(&mut self, value: u16) {
        self.bias = value & 0x3FF;
    }

    /// Sound capture control; the capture data paths stay unimplemented, so
    /// the registers only read back.
    #[inline]
    pub fn capture_control(&self, i: usize) -> u8 {
        self.capture_control[i]
    }

    pub fn write_capture_control(&mut self, i: usize, value: u8) {
        self.capture_control[i] = value & 0x8F;
    }

    #[inline]
    pub fn samples(&self) -> &[i16] {
        &self.samples
    }

    pub(crate) fn start_frame(&mut self) {
        self.samples.clear();
    }

    pub(crate) fn schedule_next_sample(emu: &mut Emu) {
        emu.schedule
            .schedule_event_after(Event::AudioSample, CYCLES_PER_SAMPLE);
    }

    pub(crate) fn handle_sample_event(emu: &mut Emu) {
        let (mut left, mut right) = (0i32, 0i32);
        if emu.audio.control.master_enable() {
            (left, right) = Self::sample_channels(emu);
        }

        let audio = &mut emu.audio;
        let bias = audio.bias as i32;
        let (left, right) = if audio.sixteen_bit_output {
            (
                ((left + bias - 0x200) << 6).clamp(-0x8000, 0x7FFF) as i16,
                ((right + bias - 0x200) << 6).clamp(-0x8000, 0x7FFF) as i16,
            )
        } else {
            (
                (((left + bias).clamp(0, 0x3FF) - 0x200) << 6) as i16,
                (((right + bias).clamp(0, 0x3FF) - 0x200) << 6) as i16,
            )
        };
        audio.samples.push(left);
        audio.samples.push(right);

        Rtc::tick_32k(emu);
        emu.schedule
            .reschedule_event_after(Event::AudioSample, CYCLES_PER_SAMPLE);
    }

    fn sample_channels(emu: &mut Emu) -> (i32, i32) {
        let mut ch1 = [0i32; 2];
        let mut ch3 = [0i32; 2];
        let mut mixer = [0i32; 2];

        for i in 0..16 {
            if !emu.audio.channels[i].control.running() {
                continue;
            }

            let value = channel::sample(emu, i);
            channel::advance(emu, i, 512);

            let channel = &emu.audio.channels[i];
            let mut volume_div = channel.control.volume_shift() as i32;
            if volume_div == 3 {
                volume_div += 1;
            }
            let mut value = value << (4 - volume_div);

            let mut volume = channel.control.volume() as i32;
            if volume != 0 {
                volume += 1;
            }
            value *= volume;

            let mut pan = channel.control.pan() as i32;
            if pan != 0 {
                pan += 1;
            }
            let left = ((value as i64 * (128 - pan) as i64) >> 10) as i32;
            let right = ((value as i64 * pan as i64) >> 10) as i32;

            if i == 1 {
                ch1 = [left, right];
                if emu.audio.control.channel_1_skip_mixer() {
                    continue;
                }
            } else if i == 3 {
                ch3 = [left, right];
                if emu.audio.control.channel_3_skip_mixer() {
                    continue;
                }
            }
            mixer[0] += left;
            mixer[1] += right;
        }

        let control = emu.audio.control;
        let left = match control.left_output_source() {
            0 => mixer[0],
            1 => ch1[0],
            2 => ch3[0],
            _ => ch1[0] + ch3[0],
        };
        let right = match control.right_output_source() {
            0 => mixer[1],
            1 => ch1[1],
            2 => ch3[1],
            _ => ch1[1] + ch3[1],
        };

        let master = control.master_volume() as i64;
        (
            ((left as i64 * master) >> 21) as i32,
            ((right as i64 * master) >> 21) as i32,
        )
    }

    #[inline]
    pub(crate) fn interpolate(&self) -> bool {
        self.interpolate
    }
}
