pub mod engine_2d;
pub mod engine_3d;
pub mod vram;

use crate::{
    cpu::{arm7::Arm7, arm9::Arm9, dma, irqs::IrqFlags},
    emu::{schedule::Event, Emu},
    utils::{zeroed_box, OwnedBytesCellPtr},
};
use engine_2d::Engine2d;
use engine_3d::Engine3d;
use vram::Vram;

pub const SCREEN_WIDTH: usize = 256;
pub const SCREEN_HEIGHT: usize = 192;
pub const FRAMEBUFFER_LEN: usize = SCREEN_WIDTH * SCREEN_HEIGHT * 2;

/// Scanline timing in undoubled (ARM7-rate) cycles.
pub const HDRAW_CYCLES: u64 = 1536;
pub const LINE_CYCLES: u64 = 2130;
pub const TOTAL_LINES: u16 = 263;

proc_bitfield::bitfield! {
    #[derive(Clone, Copy, PartialEq, Eq)]
    pub struct PowerControl(pub u16): Debug {
        pub display_enabled: bool @ 0,
        pub engine_2d_a_enabled: bool @ 1,
        pub engine_3d_rendering_enabled: bool @ 2,
        pub engine_3d_geometry_enabled: bool @ 3,
        pub engine_2d_b_enabled: bool @ 9,
        pub display_swap: bool @ 15,
    }
}

proc_bitfield::bitfield! {
    #[derive(Clone, Copy, PartialEq, Eq)]
    pub struct DispStatus(pub u16): Debug {
        pub vblank: bool @ 0,
        pub hblank: bool @ 1,
        pub vcount_match: bool @ 2,
        pub vblank_irq_enabled: bool @ 3,
        pub hblank_irq_enabled: bool @ 4,
        pub vcount_match_irq_enabled: bool @ 5,
        pub vcount_compare_high: bool @ 7,
        pub vcount_compare_low: u8 @ 8..=15,
    }
}

impl DispStatus {
    #[inline]
    pub fn vcount_compare(self) -> u16 {
        (self.vcount_compare_high() as u16) << 8 | self.vcount_compare_low() as u16
    }
}

pub struct Gpu {
    pub engine_a: Engine2d,
    pub engine_b: Engine2d,
    pub engine_3d: Engine3d,
    pub vram: Vram,
    pub palette: OwnedBytesCellPtr<0x800>,
    pub oam: OwnedBytesCellPtr<0x800>,
    vcount: u16,
    disp_status: [DispStatus; 2],
    power_control: PowerControl,
    framebuffer: Box<[u32; FRAMEBUFFER_LEN]>,
    #[cfg(feature = "log")]
    #[allow(dead_code)]
    logger: slog::Logger,
}

impl Gpu {
    pub(crate) fn new(#[cfg(feature = "log")] logger: slog::Logger) -> Self {
        Gpu {
            engine_a: Engine2d::new(true),
            engine_b: Engine2d::new(false),
            engine_3d: Engine3d::new(),
            vram: Vram::new(),
            palette: OwnedBytesCellPtr::new_zeroed(),
            oam: OwnedBytesCellPtr::new_zeroed(),
            vcount: 0,
            disp_status: [DispStatus(0); 2],
            power_control: PowerControl(0),
            framebuffer: zeroed_box(),
            #[cfg(feature = "log")]
            logger,
        }
    }

    #[inline]
    pub fn vcount(&self) -> u16 {
        self.vcount
    }

    #[inline]
    pub fn disp_status(&self, arm9: bool) -> DispStatus {
        self.disp_status[arm9 as usize]
    }

    pub fn write_disp_status(&mut self, arm9: bool, value: DispStatus) {
        let status = &mut self.disp_status[arm9 as usize];
        status.0 = (status.0 & 7) | (value.0 & 0xFFB8);
    }

    #[inline]
    pub fn power_control(&self) -> PowerControl {
        self.power_control
    }

    pub fn write_power_control(&mut self, value: PowerControl) {
        self.power_control.0 = value.0 & 0x820F;
    }

    #[inline]
    pub fn framebuffer(&self) -> &[u32; FRAMEBUFFER_LEN] {
        &self.framebuffer
    }

    pub(crate) fn hblank_start(emu: &mut Emu) {
        for arm9 in [false, true] {
            emu.gpu.disp_status[arm9 as usize].set_hblank(true);
            if emu.gpu.disp_status[arm9 as usize].hblank_irq_enabled() {
                if arm9 {
                    Arm9::request_irq(emu, IrqFlags::HBLANK);
                } else {
                    Arm7::request_irq(emu, IrqFlags::HBLANK);
                }
            }
        }

        if emu.gpu.vcount < SCREEN_HEIGHT as u16 {
            dma::start_dmas::<Arm9>(emu, dma::timing::HBLANK);
        }

        emu.schedule
            .reschedule_event_after(Event::HblankStart, LINE_CYCLES);
    }

    pub(crate) fn hblank_end(emu: &mut Emu) {
        emu.gpu.vcount += 1;
        if emu.gpu.vcount == TOTAL_LINES {
            emu.gpu.vcount = 0;
        }
        let line = emu.gpu.vcount;

        for arm9 in [false, true] {
            let status = &mut emu.gpu.disp_status[arm9 as usize];
            status.set_hblank(false);
            let matched = line == status.vcount_compare();
            status.set_vcount_match(matched);
            if matched && status.vcount_match_irq_enabled() {
                if arm9 {
                    Arm9::request_irq(emu, IrqFlags::VCOUNT_MATCH);
                } else {
                    Arm7::request_irq(emu, IrqFlags::VCOUNT_MATCH);
                }
            }
        }

        Engine3d::run_commands(emu);

        emu.gpu.engine_a.check_window_y(line as u32);
        emu.gpu.engine_b.check_window_y(line as u32);

        if line == 0 && emu.gpu.engine_a.capture_control.enabled() {
            emu.gpu.engine_a.capture_active = true;
        }

        if line < SCREEN_HEIGHT as u16 {
            Self::render_line(emu, line as u32);
            dma::start_dmas::<Arm9>(emu, dma::timing::SCANLINE_START);
        } else if line == SCREEN_HEIGHT as u16 {
            Self::vblank_start(emu);
        } else if line == TOTAL_LINES - 1 {
            // The flag is already clear in the last line before the new frame
            emu.gpu.disp_status[0].set_vblank(false);
            emu.gpu.disp_status[1].set_vblank(false);
        }

        // The rasterizer produces the next frame once the geometry engine
        // has gone idle after the swap
        if line == 214 && emu.gpu.engine_3d.take_render_frame() {
            let Gpu {
                engine_3d, vram, ..
            } = &mut emu.gpu;
            engine_3d.render_current_frame(vram);
        }

        emu.schedule
            .reschedule_event_after(Event::HblankEnd, LINE_CYCLES);
    }

    fn vblank_start(emu: &mut Emu) {
        for arm9 in [false, true] {
            emu.gpu.disp_status[arm9 as usize].set_vblank(true);
            if emu.gpu.disp_status[arm9 as usize].vblank_irq_enabled() {
                if arm9 {
                    Arm9::request_irq(emu, IrqFlags::VBLANK);
                } else {
                    Arm7::request_irq(emu, IrqFlags::VBLANK);
                }
            }
        }

        dma::start_dmas::<Arm9>(emu, dma::timing::VBLANK);
        dma::start_dmas::<Arm7>(emu, dma::timing::VBLANK);

        Engine3d::on_vblank(emu);

        if emu.gpu.engine_a.capture_active {
            emu.gpu.engine_a.capture_active = false;
            emu.gpu.engine_a.capture_control.set_enabled(false);
        }

        emu.frame_finished = true;
    }

    fn render_line(emu: &mut Emu, line: u32) {
        let line_3d = *emu.gpu.engine_3d.renderer.color_line(line);
        let power = emu.gpu.power_control;
        let Gpu {
            engine_a,
            engine_b,
            vram,
            palette,
            oam,
            framebuffer,
            ..
        } = &mut emu.gpu;

        let half = SCREEN_WIDTH * SCREEN_HEIGHT;
        let (a_base, b_base) = if power.display_swap() {
            (0, half)
        } else {
            (half, 0)
        };
        let start = line as usize * SCREEN_WIDTH;

        engine_2d::render::render_scanline(
            engine_a,
            line,
            power.engine_2d_a_enabled(),
            vram,
            palette,
            oam,
            &line_3d,
            &mut framebuffer[a_base + start..a_base + start + SCREEN_WIDTH],
        );
        engine_2d::render::render_scanline(
            engine_b,
            line,
            power.engine_2d_b_enabled(),
            vram,
            palette,
            oam,
            &line_3d,
            &mut framebuffer[b_base + start..b_base + start + SCREEN_WIDTH],
        );
    }
}
