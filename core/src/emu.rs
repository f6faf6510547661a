pub mod input;
pub mod schedule;
pub mod swram;

use crate::{
    audio::Audio,
    cpu::{
        arm7::{self, Arm7},
        arm9::{self, Arm9},
        dma, interpreter, timers, Core,
    },
    ds_slot::{self, DsSlot},
    gpu::{self, Gpu},
    ipc::Ipc,
    rtc::{self, Rtc},
    spi,
    utils::{BoxedByteSlice, Bytes},
    SaveContents,
};
use input::{Input, Keys};
use schedule::{CpuEvent, Event, Schedule};
use swram::Swram;

pub const MAIN_MEM_SIZE: usize = 0x40_0000;
pub const MAIN_MEM_MASK: u32 = (MAIN_MEM_SIZE - 1) as u32;
pub const FIRMWARE_SIZE: usize = 0x4_0000;

proc_bitfield::bitfield! {
    #[derive(Clone, Copy, PartialEq, Eq)]
    pub struct LocalExMemControl(pub u16): Debug {
        pub gba_slot_sram_access_time: u8 @ 0..=1,
        pub gba_slot_rom_1st_access_time: u8 @ 2..=3,
        pub gba_slot_rom_2nd_access_time: bool @ 4,
        pub gba_slot_phi_pin_out: u8 @ 5..=6,
    }
}

impl LocalExMemControl {
    /// Open-bus pattern of the empty GBA slot, seen only by the slot owner.
    pub(crate) fn gba_rom_halfword(self, addr: u32) -> u16 {
        let value = (addr >> 1) as u16;
        match self.gba_slot_rom_1st_access_time() {
            0 => value | 0xFE08,
            1 | 2 => value,
            _ => 0xFFFF,
        }
    }

    pub(crate) fn gba_rom_word(self, addr: u32) -> u32 {
        let lo = self.gba_rom_halfword(addr) as u32;
        let hi = self.gba_rom_halfword(addr | 2) as u32;
        hi << 16 | lo
    }
}

proc_bitfield::bitfield! {
    #[derive(Clone, Copy, PartialEq, Eq)]
    pub struct GlobalExMemControl(pub u16): Debug {
        pub arm7_gba_slot_access: bool @ 7,
        pub arm7_ds_slot_access: bool @ 11,
        pub sync_main_mem: bool @ 14,
        pub arm7_main_mem_priority: bool @ 15,
    }
}

/// Per-frame input descriptor handed to [`Emu::run_until_vblank`].
#[derive(Clone, Copy, Debug, Default)]
pub struct FrameInput {
    pub keys: Keys,
    /// Touch position in screen coordinates (x in 0..=255, y in 0..=191).
    pub touch: Option<(u8, u8)>,
    /// Host clock override applied before the frame runs.
    pub time: Option<rtc::HostTime>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RunOutput {
    Frame,
    Shutdown,
}

#[derive(Debug)]
pub enum BuildError {
    Rom(ds_slot::rom::CreationError),
    Save(ds_slot::spi::CreationError),
    Boot(ds_slot::rom::header::ParseError),
}

pub struct Emu {
    pub arm9: Arm9,
    pub arm7: Arm7,
    pub(crate) main_mem: crate::utils::OwnedBytesCellPtr<MAIN_MEM_SIZE>,
    pub(crate) zero_page: crate::utils::OwnedBytesCellPtr<0x4000>,
    pub swram: Swram,
    pub schedule: Schedule,
    global_ex_mem_control: GlobalExMemControl,
    pub ipc: Ipc,
    pub ds_slot: DsSlot,
    pub spi: spi::Controller,
    pub rtc: Rtc,
    pub gpu: Gpu,
    pub audio: Audio,
    pub input: Input,
    audio_wifi_power_control: u8,
    pub(crate) frame_finished: bool,
    pub(crate) shutdown: bool,
}

pub struct Builder {
    #[cfg(feature = "log")]
    pub logger: slog::Logger,

    pub arm9_bios: Box<Bytes<{ arm9::BIOS_SIZE }>>,
    pub arm7_bios: Box<Bytes<{ arm7::BIOS_SIZE }>>,
    pub firmware: Box<Bytes<FIRMWARE_SIZE>>,
    pub rom: BoxedByteSlice,
    pub save: SaveContents,

    pub direct_boot: bool,
    pub audio_16_bit_output: bool,
    pub audio_interpolation: bool,
}

impl Builder {
    pub fn new(
        arm9_bios: Box<Bytes<{ arm9::BIOS_SIZE }>>,
        arm7_bios: Box<Bytes<{ arm7::BIOS_SIZE }>>,
        firmware: Box<Bytes<FIRMWARE_SIZE>>,
        rom: BoxedByteSlice,
        save: SaveContents,
        #[cfg(feature = "log")] logger: slog::Logger,
    ) -> Self {
        Builder {
            #[cfg(feature = "log")]
            logger,
            arm9_bios,
            arm7_bios,
            firmware,
            rom,
            save,
            direct_boot: true,
            audio_16_bit_output: true,
            audio_interpolation: false,
        }
    }

    pub fn build(self) -> Result<Emu, BuildError> {
        let rom = ds_slot::rom::Rom::new(
            self.rom,
            &self.arm7_bios,
            #[cfg(feature = "log")]
            self.logger.new(slog::o!("ds_rom" => "")),
        )
        .map_err(BuildError::Rom)?;
        let game_code = rom.game_code();
        let backup = ds_slot::spi::Backup::detect(
            self.save,
            game_code,
            #[cfg(feature = "log")]
            self.logger.new(slog::o!("ds_spi" => "")),
        )
        .map_err(BuildError::Save)?;

        let mut emu = Emu {
            arm9: Arm9::new(
                self.arm9_bios,
                #[cfg(feature = "log")]
                self.logger.new(slog::o!("cpu" => "arm9")),
            ),
            arm7: Arm7::new(
                self.arm7_bios,
                #[cfg(feature = "log")]
                self.logger.new(slog::o!("cpu" => "arm7")),
            ),
            main_mem: crate::utils::OwnedBytesCellPtr::new_zeroed(),
            zero_page: crate::utils::OwnedBytesCellPtr::new_zeroed(),
            swram: Swram::new(),
            schedule: Schedule::new(),
            global_ex_mem_control: GlobalExMemControl(0x6000),
            ipc: Ipc::new(),
            ds_slot: DsSlot::new(rom, backup),
            spi: spi::Controller::new(
                self.firmware,
                #[cfg(feature = "log")]
                self.logger.new(slog::o!("spi" => "")),
            ),
            rtc: Rtc::new(),
            gpu: Gpu::new(
                #[cfg(feature = "log")]
                self.logger.new(slog::o!("gpu" => "")),
            ),
            audio: Audio::new(self.audio_16_bit_output, self.audio_interpolation),
            input: Input::new(),
            audio_wifi_power_control: 0,
            frame_finished: false,
            shutdown: false,
        };

        arm9::bus::setup(&mut emu);
        arm7::bus::setup(&mut emu);
        arm9::bus::rebuild_timing_tables(&mut emu);
        arm7::bus::rebuild_timing_tables(&mut emu);

        emu.schedule.schedule_event(Event::HblankStart, gpu::HDRAW_CYCLES);
        emu.schedule.schedule_event(Event::HblankEnd, gpu::LINE_CYCLES);
        Audio::schedule_next_sample(&mut emu);

        if self.direct_boot {
            emu.setup_direct_boot().map_err(BuildError::Boot)?;
        } else {
            interpreter::jump_arm::<Arm9>(&mut emu, 0xFFFF_0000);
            interpreter::jump_arm::<Arm7>(&mut emu, 0x0000_0000);
        }

        Ok(emu)
    }
}

impl Emu {
    fn setup_direct_boot(&mut self) -> Result<(), ds_slot::rom::header::ParseError> {
        let header = self.ds_slot.rom.parse_header()?;

        self.write_wramcnt(swram::Control(3));
        self.gpu.write_power_control(gpu::PowerControl(1));
        self.audio.write_bias(0x200);
        self.arm9.state.post_flag = 1;
        self.arm7.state.post_flag = 1;

        let chip_id = self.ds_slot.rom.chip_id();
        self.main_mem.write_le(0x3F_F800, chip_id);
        self.main_mem.write_le(0x3F_F804, chip_id);
        self.main_mem.write_le(0x3F_F850, 0x5835_u16);
        // Last IPC messages exchanged by the BIOSes during a real boot
        self.main_mem.write_le(0x3F_F880, 7_u32);
        self.main_mem.write_le(0x3F_F884, 6_u32);
        self.main_mem.write_le(0x3F_FC00, chip_id);
        self.main_mem.write_le(0x3F_FC04, chip_id);
        self.main_mem.write_le(0x3F_FC10, 0x5835_u16);
        self.main_mem.write_le(0x3F_FC40, 1_u16);

        let user_settings = spi::firmware::newest_user_settings(self.spi.firmware.contents());
        unsafe {
            self.main_mem.as_bytes_mut()[0x3F_FC80..0x3F_FCF0].copy_from_slice(&user_settings);
        }

        let header_len = self.ds_slot.rom.contents().len().min(0x170);
        unsafe {
            self.main_mem.as_bytes_mut()[0x3F_FE00..0x3F_FE00 + header_len]
                .copy_from_slice(&self.ds_slot.rom.contents()[..header_len]);
        }

        for i in 0..header.arm9_size {
            let byte = self.ds_slot.rom.contents()[(header.arm9_rom_offset + i) as usize];
            Arm9::bus_write(self, header.arm9_ram_addr.wrapping_add(i), byte);
        }
        for i in 0..header.arm7_size {
            let byte = self.ds_slot.rom.contents()[(header.arm7_rom_offset + i) as usize];
            Arm7::bus_write(self, header.arm7_ram_addr.wrapping_add(i), byte);
        }

        Arm9::write_cp15_control(self, arm9::cp15::Control(0x0001_2078));
        Arm9::write_cp15_dtcm_control(self, 0x0300_000A);
        Arm9::write_cp15_itcm_control(self, 0x0000_0020);

        let arm9_entry = header.arm9_entry_addr & !3;
        {
            let regs = &mut self.arm9.state.regs;
            regs.gpr[12] = arm9_entry;
            regs.gpr[13] = 0x0300_2F7C;
            regs.gpr[14] = arm9_entry;
            regs.banked_r13_14(crate::cpu::psr::Bank::Irq)[0] = 0x0300_3F80;
            regs.banked_r13_14(crate::cpu::psr::Bank::Supervisor)[0] = 0x0300_3FC0;
        }
        interpreter::jump_arm::<Arm9>(self, arm9_entry);

        let arm7_entry = header.arm7_entry_addr & !3;
        {
            let regs = &mut self.arm7.state.regs;
            regs.gpr[12] = arm7_entry;
            regs.gpr[13] = 0x0380_FD80;
            regs.gpr[14] = arm7_entry;
            regs.banked_r13_14(crate::cpu::psr::Bank::Irq)[0] = 0x0380_FF80;
            regs.banked_r13_14(crate::cpu::psr::Bank::Supervisor)[0] = 0x0380_FFC0;
        }
        interpreter::jump_arm::<Arm7>(self, arm7_entry);

        Ok(())
    }

    #[inline]
    pub fn global_ex_mem_control(&self) -> GlobalExMemControl {
        self.global_ex_mem_control
    }

    pub fn write_global_ex_mem_control(&mut self, value: GlobalExMemControl) {
        self.global_ex_mem_control.0 = (value.0 & 0x8880) | 0x6000;
        arm9::bus::rebuild_timing_tables(self);
        arm7::bus::rebuild_timing_tables(self);
    }

    pub fn write_wramcnt(&mut self, value: swram::Control) {
        if self.swram.set_control(value) {
            arm9::bus::rebuild_swram_pages(self);
            arm7::bus::rebuild_swram_pages(self);
        }
    }

    #[inline]
    pub fn request_shutdown(&mut self) {
        self.shutdown = true;
    }

    /// ARM7 POWCNT2 (speaker and wifi power).
    #[inline]
    pub fn arm7_power_control(&self) -> u16 {
        self.audio_wifi_power_control as u16
    }

    pub fn write_arm7_power_control(&mut self, value: u16) {
        self.audio_wifi_power_control = (value & 3) as u8;
    }

    /// BGR888 output of the previous frame, top screen first.
    #[inline]
    pub fn framebuffer(&self) -> &[u32; gpu::FRAMEBUFFER_LEN] {
        self.gpu.framebuffer()
    }

    /// Interleaved stereo samples produced during the last
    /// [`run_until_vblank`](Self::run_until_vblank) call.
    #[inline]
    pub fn audio_samples(&self) -> &[i16] {
        self.audio.samples()
    }

    #[inline]
    pub fn save_contents(&self) -> &[u8] {
        self.ds_slot.backup.contents()
    }

    /// Byte range of the save image modified since the last call; empty when
    /// nothing is pending. Persistence is the caller's job.
    #[inline]
    pub fn take_save_dirty_range(&mut self) -> Option<core::ops::Range<usize>> {
        self.ds_slot.backup.take_dirty_range()
    }

    pub fn run_until_vblank(&mut self, frame_input: &FrameInput) -> RunOutput {
        if self.shutdown {
            return RunOutput::Shutdown;
        }

        self.set_keys(frame_input.keys, frame_input.touch.is_some());
        match frame_input.touch {
            Some((x, y)) => self.spi.tsc.set_touch_pos(x, y),
            None => self.spi.tsc.end_touch(),
        }
        if let Some(time) = frame_input.time {
            self.rtc.set_host_time(time);
        }
        self.audio.start_frame();

        self.frame_finished = false;
        while !self.frame_finished {
            if self.shutdown {
                return RunOutput::Shutdown;
            }

            let target = self.schedule.next_event_time();
            self.arm9.state.target_cycles = target;
            if self.arm9.dma.any_active() {
                dma::run_dma::<Arm9>(self);
            } else {
                interpreter::run::<Arm9>(self);
            }
            while let Some(event) = self
                .schedule
                .pop_pending_cpu_event(true, self.arm9.state.cycles)
            {
                self.dispatch_cpu_event::<Arm9>(event);
            }

            let arm7_target = self.arm9.state.cycles >> 1;
            while self.arm7.state.cycles < arm7_target {
                self.arm7.state.target_cycles = arm7_target;
                if self.arm7.dma.any_active() {
                    dma::run_dma::<Arm7>(self);
                } else {
                    interpreter::run::<Arm7>(self);
                }
                while let Some(event) = self
                    .schedule
                    .pop_pending_cpu_event(false, self.arm7.state.cycles)
                {
                    self.dispatch_cpu_event::<Arm7>(event);
                }
                Arm7::check_halted(self);
                if self.arm7.state.irqs.triggered() {
                    interpreter::handle_irq::<Arm7>(self);
                }
            }

            self.schedule.now = self.arm9.state.cycles;
            while let Some(event) = self.schedule.pop_pending_event() {
                self.dispatch_event(event);
            }

            Arm9::check_halted(self);
            Arm7::check_halted(self);
            if self.arm9.state.irqs.triggered() {
                interpreter::handle_irq::<Arm9>(self);
            }
            if self.arm7.state.irqs.triggered() {
                interpreter::handle_irq::<Arm7>(self);
            }
        }

        RunOutput::Frame
    }

    fn dispatch_event(&mut self, event: Event) {
        match event {
            Event::HblankStart => Gpu::hblank_start(self),
            Event::HblankEnd => Gpu::hblank_end(self),
            Event::DsSlotRomTransfer => DsSlot::advance_rom_transfer(self),
            Event::DsSlotSpiDone => DsSlot::spi_transfer_done(self),
            Event::AudioSample => Audio::handle_sample_event(self),
        }
    }

    fn dispatch_cpu_event<C: Core>(&mut self, event: CpuEvent) {
        match event {
            CpuEvent::StartImmediateDmas => dma::start_immediate_dmas::<C>(self),
            CpuEvent::Timer0Overflow => timers::handle_overflow_event::<C>(self, 0),
            CpuEvent::Timer1Overflow => timers::handle_overflow_event::<C>(self, 1),
            CpuEvent::Timer2Overflow => timers::handle_overflow_event::<C>(self, 2),
            CpuEvent::Timer3Overflow => timers::handle_overflow_event::<C>(self, 3),
            CpuEvent::SpiDone => {
                if !C::IS_ARM9 {
                    spi::Controller::transfer_done(self);
                }
            }
        }
    }
}
