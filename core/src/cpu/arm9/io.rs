use super::Arm9;
use crate::{
    cpu::{dma, irqs::IrqFlags, timers, Core},
    ds_slot::{AuxSpiControl, DsSlot, RomControl},
    emu::{swram, Emu, GlobalExMemControl, LocalExMemControl},
    gpu::{engine_2d, engine_3d::Engine3d, vram::Vram, DispStatus, PowerControl},
    ipc::Ipc,
};

fn dma_channel(addr: u32) -> usize {
    ((addr - 0xB0) / 12) as usize
}

fn timer_index(addr: u32) -> usize {
    ((addr - 0x100) >> 2) as usize
}

pub(super) fn read_8(emu: &mut Emu, addr: u32) -> u8 {
    match addr & 0x00FF_FFFF {
        0x208 => emu.arm9.state.irqs.master_enable as u8,
        0x240..=0x246 | 0x248..=0x249 => {
            let bank = match addr & 0xF {
                8 => 7,
                9 => 8,
                bank => bank as usize,
            };
            emu.gpu.vram.bank_control[bank].0
        }
        0x247 => emu.swram.control().0,
        0x300 => emu.arm9.state.post_flag,
        0x4000 => 0,
        _ => {
            let half = read_16(emu, addr & !1);
            (half >> ((addr & 1) << 3)) as u8
        }
    }
}

pub(super) fn read_16(emu: &mut Emu, addr: u32) -> u16 {
    let offset = addr & 0x00FF_FFFF;
    match offset {
        0x000 => emu.gpu.engine_a.control.0 as u16,
        0x002 => (emu.gpu.engine_a.control.0 >> 16) as u16,
        0x004 => emu.gpu.disp_status(true).0,
        0x006 => emu.gpu.vcount(),
        0x008..=0x056 => emu.gpu.engine_a.read_16(offset),
        0x060 => emu.gpu.engine_3d.renderer.shadow.disp_control.0,
        0x064 => emu.gpu.engine_a.capture_control.0 as u16,
        0x066 => (emu.gpu.engine_a.capture_control.0 >> 16) as u16,
        0x06C => emu.gpu.engine_a.master_brightness,
        0x0B8 | 0x0C4 | 0x0D0 | 0x0DC => 0,
        0x0BA | 0x0C6 | 0x0D2 | 0x0DE => emu.arm9.dma.channels[dma_channel(offset)].control.0,
        0x100 | 0x104 | 0x108 | 0x10C => timers::read_counter::<Arm9>(emu, timer_index(offset)),
        0x102 | 0x106 | 0x10A | 0x10E => {
            emu.arm9.timers.0[timer_index(offset)].control.0 as u16
        }
        0x130 => emu.input.keyinput(),
        0x132 => emu.input.key_irq_control(true).0,
        0x180 => emu.ipc.sync(true).0,
        0x184 => emu.ipc.control(true).0,
        0x1A0 => {
            if emu.ds_slot.arm7_access {
                0
            } else {
                emu.ds_slot.aux_spi_control.0
            }
        }
        0x1A2 => DsSlot::aux_spi_data(emu, true) as u16,
        0x1A4 => DsSlot::rom_control(emu, true).0 as u16,
        0x1A6 => (DsSlot::rom_control(emu, true).0 >> 16) as u16,
        0x204 => {
            let global = emu.global_ex_mem_control().0;
            (global & !0x7F) | emu.arm9.local_ex_mem_control.0 as u16 & 0x7F
        }
        0x208 => emu.arm9.state.irqs.master_enable as u16,
        0x210 => emu.arm9.state.irqs.enabled().bits() as u16,
        0x212 => (emu.arm9.state.irqs.enabled().bits() >> 16) as u16,
        0x214 => emu.arm9.state.irqs.requested().bits() as u16,
        0x216 => (emu.arm9.state.irqs.requested().bits() >> 16) as u16,
        0x280 => emu.arm9.div_engine.control().0,
        0x2B0 => emu.arm9.sqrt_engine.control().0,
        0x300 => emu.arm9.state.post_flag as u16,
        0x304 => emu.gpu.power_control().0,
        0x320 => 46,
        0x340 => emu.gpu.engine_3d.renderer.shadow.alpha_test_ref as u16,
        0x600 | 0x602 => (emu.gpu.engine_3d.read_gx_status() >> ((offset & 2) << 3)) as u16,
        0x604 => emu.gpu.engine_3d.poly_ram_count() as u16,
        0x606 => emu.gpu.engine_3d.vtx_ram_count() as u16,
        0x1000 => emu.gpu.engine_b.control.0 as u16,
        0x1002 => (emu.gpu.engine_b.control.0 >> 16) as u16,
        0x1008..=0x1056 => emu.gpu.engine_b.read_16(offset & 0xFF),
        0x106C => emu.gpu.engine_b.master_brightness,
        _ => {
            #[cfg(feature = "log")]
            slog::info!(emu.arm9.logger, "unknown 16-bit read @ {:#010X}", addr);
            0
        }
    }
}

pub(super) fn read_32(emu: &mut Emu, addr: u32) -> u32 {
    let offset = addr & 0x00FF_FFFF;
    match offset {
        0x000 => emu.gpu.engine_a.control.0,
        0x008..=0x054 => emu.gpu.engine_a.read_32(offset),
        0x064 => emu.gpu.engine_a.capture_control.0,
        0x0E0 | 0x0E4 | 0x0E8 | 0x0EC => emu.arm9.dma_fill[((offset - 0xE0) >> 2) as usize],
        0x1A4 => DsSlot::rom_control(emu, true).0,
        0x210 => emu.arm9.state.irqs.enabled().bits(),
        0x214 => emu.arm9.state.irqs.requested().bits(),
        0x240 => {
            let vram = &emu.gpu.vram;
            u32::from_le_bytes([
                vram.bank_control[0].0,
                vram.bank_control[1].0,
                vram.bank_control[2].0,
                vram.bank_control[3].0,
            ])
        }
        0x280 => emu.arm9.div_engine.control().0 as u32,
        0x290 => emu.arm9.div_engine.numerator() as u32,
        0x294 => (emu.arm9.div_engine.numerator() as u64 >> 32) as u32,
        0x298 => emu.arm9.div_engine.denominator() as u32,
        0x29C => (emu.arm9.div_engine.denominator() as u64 >> 32) as u32,
        0x2A0 => emu.arm9.div_engine.result() as u32,
        0x2A4 => (emu.arm9.div_engine.result() as u64 >> 32) as u32,
        0x2A8 => emu.arm9.div_engine.remainder() as u32,
        0x2AC => (emu.arm9.div_engine.remainder() as u64 >> 32) as u32,
        0x2B4 => emu.arm9.sqrt_engine.result(),
        0x2B8 => emu.arm9.sqrt_engine.input() as u32,
        0x2BC => (emu.arm9.sqrt_engine.input() >> 32) as u32,
        0x4A4 => 0,
        0x600 => emu.gpu.engine_3d.read_gx_status(),
        0x640..=0x67C => emu
            .gpu
            .engine_3d
            .read_clip_matrix(((offset - 0x640) >> 2) as usize),
        0x680..=0x6A0 => emu
            .gpu
            .engine_3d
            .read_vector_matrix(((offset - 0x680) >> 2) as usize),
        0x1000 => emu.gpu.engine_b.control.0,
        0x1008..=0x1054 => emu.gpu.engine_b.read_32(offset & 0xFF),
        0x10_0000 => Ipc::recv(emu, true),
        0x10_0010 => DsSlot::read_rom_data(emu, true),
        _ => {
            let low = read_16(emu, addr) as u32;
            let high = read_16(emu, addr | 2) as u32;
            high << 16 | low
        }
    }
}

pub(super) fn write_8(emu: &mut Emu, addr: u32, value: u8) {
    let offset = addr & 0x00FF_FFFF;
    match offset {
        0x040..=0x04D => emu.gpu.engine_a.write_8(offset, value),
        0x1A0 => DsSlot::write_aux_spi_control_low(emu, true, value),
        0x1A1 => DsSlot::write_aux_spi_control_high(emu, true, value),
        0x1A2 => DsSlot::write_aux_spi_data(emu, true, value),
        0x1A8..=0x1AF => DsSlot::write_rom_command(emu, true, (offset - 0x1A8) as usize, value),
        0x208 => {
            let state = &mut emu.arm9.state;
            state
                .irqs
                .write_master_enable(value & 1 != 0, state.regs.cpsr.irqs_disabled());
        }
        0x240..=0x246 | 0x248..=0x249 => {
            let bank = match offset & 0xF {
                8 => 7,
                9 => 8,
                bank => bank as usize,
            };
            Vram::write_bank_control(emu, bank, crate::gpu::vram::BankControl(value));
        }
        0x247 => emu.write_wramcnt(swram::Control(value)),
        0x300 => {
            // Bit 0 sticks once set
            let flag = &mut emu.arm9.state.post_flag;
            *flag = (*flag & 1) | (value & 3);
        }
        0x1040..=0x104D => emu.gpu.engine_b.write_8(offset & 0xFF, value),
        _ => {
            #[cfg(feature = "log")]
            slog::info!(
                emu.arm9.logger,
                "unknown 8-bit write @ {:#010X}: {:#04X}",
                addr,
                value
            );
        }
    }
}

fn write_dma_16(emu: &mut Emu, offset: u32, value: u16) {
    let i = dma_channel(offset);
    let channel = &mut emu.arm9.dma.channels[i];
    match (offset - 0xB0) % 12 {
        0 => channel.sad_reg = (channel.sad_reg & !0xFFFF) | value as u32,
        2 => channel.sad_reg = (channel.sad_reg & 0xFFFF) | (value as u32) << 16,
        4 => channel.dad_reg = (channel.dad_reg & !0xFFFF) | value as u32,
        6 => channel.dad_reg = (channel.dad_reg & 0xFFFF) | (value as u32) << 16,
        8 => channel.count_reg = value,
        _ => dma::write_control::<Arm9>(emu, i, dma::Control(value)),
    }
}

pub(super) fn write_16(emu: &mut Emu, addr: u32, value: u16) {
    let offset = addr & 0x00FF_FFFF;
    match offset {
        0x000 => {
            let control = emu.gpu.engine_a.control.0;
            emu.gpu
                .engine_a
                .write_control(engine_2d::DispControl((control & !0xFFFF) | value as u32));
        }
        0x002 => {
            let control = emu.gpu.engine_a.control.0;
            emu.gpu.engine_a.write_control(engine_2d::DispControl(
                (control & 0xFFFF) | (value as u32) << 16,
            ));
        }
        0x004 => emu.gpu.write_disp_status(true, DispStatus(value)),
        0x008..=0x056 => emu.gpu.engine_a.write_16(offset, value),
        0x060 => {
            emu.gpu.engine_3d.renderer.shadow.disp_control =
                crate::gpu::engine_3d::Disp3dControl(value & 0x7FFF);
        }
        0x064 => {
            let control = emu.gpu.engine_a.capture_control.0;
            emu.gpu
                .engine_a
                .write_capture_control(engine_2d::CaptureControl(
                    (control & !0xFFFF) | value as u32,
                ));
        }
        0x066 => {
            let control = emu.gpu.engine_a.capture_control.0;
            emu.gpu
                .engine_a
                .write_capture_control(engine_2d::CaptureControl(
                    (control & 0xFFFF) | (value as u32) << 16,
                ));
        }
        0x06C => emu.gpu.engine_a.master_brightness = value & 0xC01F,
        0x0B0..=0x0DE => write_dma_16(emu, offset, value),
        0x100 | 0x104 | 0x108 | 0x10C => {
            timers::write_reload::<Arm9>(emu, timer_index(offset), value);
        }
        0x102 | 0x106 | 0x10A | 0x10E => {
            timers::write_control::<Arm9>(emu, timer_index(offset), timers::Control(value as u8));
        }
        0x132 => emu.write_key_irq_control(true, crate::emu::input::KeyIrqControl(value)),
        0x180 => Ipc::write_sync(emu, true, crate::ipc::Sync(value)),
        0x184 => Ipc::write_control(emu, true, crate::ipc::Control(value)),
        0x1A0 => DsSlot::write_aux_spi_control(emu, true, AuxSpiControl(value)),
        0x1A2 => DsSlot::write_aux_spi_data(emu, true, value as u8),
        0x1A8..=0x1AE => {
            DsSlot::write_rom_command(emu, true, (offset - 0x1A8) as usize, value as u8);
            DsSlot::write_rom_command(emu, true, (offset - 0x1A8) as usize + 1, (value >> 8) as u8);
        }
        0x204 => {
            emu.arm9.local_ex_mem_control = LocalExMemControl(value & 0x7F);
            emu.write_global_ex_mem_control(GlobalExMemControl(value));
            emu.ds_slot.update_access(emu.global_ex_mem_control().arm7_ds_slot_access());
        }
        0x208 => {
            let state = &mut emu.arm9.state;
            state
                .irqs
                .write_master_enable(value & 1 != 0, state.regs.cpsr.irqs_disabled());
        }
        0x210 => {
            let state = &mut emu.arm9.state;
            let enabled = (state.irqs.enabled().bits() & !0xFFFF) | value as u32;
            state.irqs.write_enabled(
                IrqFlags::from_bits_retain(enabled),
                state.regs.cpsr.irqs_disabled(),
            );
        }
        0x212 => {
            let state = &mut emu.arm9.state;
            let enabled = (state.irqs.enabled().bits() & 0xFFFF) | (value as u32) << 16;
            state.irqs.write_enabled(
                IrqFlags::from_bits_retain(enabled),
                state.regs.cpsr.irqs_disabled(),
            );
        }
        0x214 => {
            let state = &mut emu.arm9.state;
            state.irqs.write_requested(
                IrqFlags::from_bits_retain(value as u32),
                state.regs.cpsr.irqs_disabled(),
            );
        }
        0x216 => {
            let state = &mut emu.arm9.state;
            state.irqs.write_requested(
                IrqFlags::from_bits_retain((value as u32) << 16),
                state.regs.cpsr.irqs_disabled(),
            );
        }
        0x280 => emu
            .arm9
            .div_engine
            .write_control(crate::cpu::arm9::div_engine::Control(value)),
        0x2B0 => emu
            .arm9
            .sqrt_engine
            .write_control(crate::cpu::arm9::sqrt_engine::Control(value)),
        0x300 => {
            let flag = &mut emu.arm9.state.post_flag;
            *flag = (*flag & 1) | (value as u8 & 3);
        }
        0x304 => emu.gpu.write_power_control(PowerControl(value)),
        0x330..=0x33E => {
            let i = ((offset - 0x330) >> 1) as usize;
            emu.gpu.engine_3d.renderer.shadow.edge_color[i] = value & 0x7FFF;
        }
        0x340 => emu.gpu.engine_3d.renderer.shadow.alpha_test_ref = value as u8 & 0x1F,
        0x354 => emu.gpu.engine_3d.renderer.shadow.clear_depth = value & 0x7FFF,
        0x356 => emu.gpu.engine_3d.renderer.shadow.clear_image_offset = value,
        0x35C => emu.gpu.engine_3d.renderer.shadow.fog_offset = value & 0x7FFF,
        0x380..=0x3BE => {
            let i = ((offset - 0x380) >> 1) as usize;
            emu.gpu.engine_3d.renderer.shadow.toon_table[i] = value & 0x7FFF;
        }
        0x610 => emu.gpu.engine_3d.write_one_dot_depth(value),
        0x1000 => {
            let control = emu.gpu.engine_b.control.0;
            emu.gpu
                .engine_b
                .write_control(engine_2d::DispControl((control & !0xFFFF) | value as u32));
        }
        0x1002 => {
            let control = emu.gpu.engine_b.control.0;
            emu.gpu.engine_b.write_control(engine_2d::DispControl(
                (control & 0xFFFF) | (value as u32) << 16,
            ));
        }
        0x1008..=0x1056 => emu.gpu.engine_b.write_16(offset & 0xFF, value),
        0x106C => emu.gpu.engine_b.master_brightness = value & 0xC01F,
        _ => {
            #[cfg(feature = "log")]
            slog::info!(
                emu.arm9.logger,
                "unknown 16-bit write @ {:#010X}: {:#06X}",
                addr,
                value
            );
        }
    }
}

pub(super) fn write_32(emu: &mut Emu, addr: u32, value: u32) {
    let offset = addr & 0x00FF_FFFF;
    match offset {
        0x000 => emu.gpu.engine_a.write_control(engine_2d::DispControl(value)),
        0x008..=0x054 => emu.gpu.engine_a.write_32(offset, value),
        0x064 => emu
            .gpu
            .engine_a
            .write_capture_control(engine_2d::CaptureControl(value)),
        0x0B0 | 0x0BC | 0x0C8 | 0x0D4 => {
            emu.arm9.dma.channels[dma_channel(offset)].sad_reg = value;
        }
        0x0B4 | 0x0C0 | 0x0CC | 0x0D8 => {
            emu.arm9.dma.channels[dma_channel(offset)].dad_reg = value;
        }
        0x0B8 | 0x0C4 | 0x0D0 | 0x0DC => {
            let i = dma_channel(offset);
            emu.arm9.dma.channels[i].count_reg = value as u16;
            dma::write_control::<Arm9>(emu, i, dma::Control((value >> 16) as u16));
        }
        0x0E0 | 0x0E4 | 0x0E8 | 0x0EC => {
            emu.arm9.dma_fill[((offset - 0xE0) >> 2) as usize] = value;
        }
        0x100 | 0x104 | 0x108 | 0x10C => {
            let i = timer_index(offset);
            timers::write_reload::<Arm9>(emu, i, value as u16);
            timers::write_control::<Arm9>(emu, i, timers::Control((value >> 16) as u8));
        }
        0x180 => Ipc::write_sync(emu, true, crate::ipc::Sync(value as u16)),
        0x188 => Ipc::send(emu, true, value),
        0x1A4 => DsSlot::write_rom_control(emu, true, RomControl(value)),
        0x1A8 | 0x1AC => {
            for i in 0..4 {
                DsSlot::write_rom_command(
                    emu,
                    true,
                    (offset - 0x1A8) as usize + i,
                    (value >> (8 * i)) as u8,
                );
            }
        }
        0x208 => {
            let state = &mut emu.arm9.state;
            state
                .irqs
                .write_master_enable(value & 1 != 0, state.regs.cpsr.irqs_disabled());
        }
        0x210 => {
            let state = &mut emu.arm9.state;
            state.irqs.write_enabled(
                IrqFlags::from_bits_retain(value),
                state.regs.cpsr.irqs_disabled(),
            );
        }
        0x214 => {
            let state = &mut emu.arm9.state;
            state.irqs.write_requested(
                IrqFlags::from_bits_retain(value),
                state.regs.cpsr.irqs_disabled(),
            );
        }
        0x240 => {
            for i in 0..4 {
                Vram::write_bank_control(
                    emu,
                    i,
                    crate::gpu::vram::BankControl((value >> (8 * i)) as u8),
                );
            }
        }
        0x244 => {
            for i in 0..3 {
                Vram::write_bank_control(
                    emu,
                    4 + i,
                    crate::gpu::vram::BankControl((value >> (8 * i)) as u8),
                );
            }
            emu.write_wramcnt(swram::Control((value >> 24) as u8));
        }
        0x248 => {
            Vram::write_bank_control(emu, 7, crate::gpu::vram::BankControl(value as u8));
            Vram::write_bank_control(emu, 8, crate::gpu::vram::BankControl((value >> 8) as u8));
        }
        0x280 => emu
            .arm9
            .div_engine
            .write_control(crate::cpu::arm9::div_engine::Control(value as u16)),
        0x290 => {
            let numer = emu.arm9.div_engine.numerator() as u64;
            emu.arm9
                .div_engine
                .write_numerator(((numer & !0xFFFF_FFFF) | value as u64) as i64);
        }
        0x294 => {
            let numer = emu.arm9.div_engine.numerator() as u64;
            emu.arm9
                .div_engine
                .write_numerator(((numer & 0xFFFF_FFFF) | (value as u64) << 32) as i64);
        }
        0x298 => {
            let denom = emu.arm9.div_engine.denominator() as u64;
            emu.arm9
                .div_engine
                .write_denominator(((denom & !0xFFFF_FFFF) | value as u64) as i64);
        }
        0x29C => {
            let denom = emu.arm9.div_engine.denominator() as u64;
            emu.arm9
                .div_engine
                .write_denominator(((denom & 0xFFFF_FFFF) | (value as u64) << 32) as i64);
        }
        0x2B0 => emu
            .arm9
            .sqrt_engine
            .write_control(crate::cpu::arm9::sqrt_engine::Control(value as u16)),
        0x2B8 => {
            let input = emu.arm9.sqrt_engine.input();
            emu.arm9
                .sqrt_engine
                .write_input((input & !0xFFFF_FFFF) | value as u64);
        }
        0x2BC => {
            let input = emu.arm9.sqrt_engine.input();
            emu.arm9
                .sqrt_engine
                .write_input((input & 0xFFFF_FFFF) | (value as u64) << 32);
        }
        0x304 => emu.gpu.write_power_control(PowerControl(value as u16)),
        0x330..=0x33C | 0x380..=0x3BC => {
            write_16(emu, addr, value as u16);
            write_16(emu, addr | 2, (value >> 16) as u16);
        }
        0x350 => emu.gpu.engine_3d.renderer.shadow.clear_color = value & 0x3F1F_FFFF,
        0x358 => emu.gpu.engine_3d.renderer.shadow.fog_color = value & 0x001F_7FFF,
        0x35C => emu.gpu.engine_3d.renderer.shadow.fog_offset = value as u16 & 0x7FFF,
        0x360..=0x37C => {
            let i = ((offset - 0x360) >> 2) as usize * 4;
            for j in 0..4 {
                emu.gpu.engine_3d.renderer.shadow.fog_table[i + j] =
                    (value >> (8 * j)) as u8 & 0x7F;
            }
        }
        0x400..=0x43C => Engine3d::write_packed_fifo(emu, value),
        0x440..=0x5FC => Engine3d::write_command_port(emu, (offset >> 2) as u8, value),
        0x600 => Engine3d::write_gx_status(emu, value),
        0x1000 => emu.gpu.engine_b.write_control(engine_2d::DispControl(value)),
        0x1008..=0x1054 => emu.gpu.engine_b.write_32(offset & 0xFF, value),
        _ => {
            write_16(emu, addr, value as u16);
            write_16(emu, addr | 2, (value >> 16) as u16);
        }
    }
}
