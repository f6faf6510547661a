use super::Arm7;
use crate::{
    audio::channel::Channel,
    cpu::{dma, irqs::IrqFlags, timers, Core},
    ds_slot::{AuxSpiControl, DsSlot, RomControl},
    emu::{Emu, LocalExMemControl},
    gpu::DispStatus,
    ipc::Ipc,
    rtc::Rtc,
    spi,
};

fn dma_channel(addr: u32) -> usize {
    ((addr - 0xB0) / 12) as usize
}

fn timer_index(addr: u32) -> usize {
    ((addr - 0x100) >> 2) as usize
}

fn sound_channel(addr: u32) -> usize {
    (addr as usize >> 4) & 0xF
}

fn read_sound_8(emu: &mut Emu, addr: u32) -> u8 {
    let channel = &emu.audio.channels[sound_channel(addr)];
    match addr & 0xF {
        offset @ 0..=3 => (channel.control.0 >> (8 * offset)) as u8,
        _ => 0,
    }
}

fn write_sound_8(emu: &mut Emu, addr: u32, value: u8) {
    let i = sound_channel(addr);
    match addr & 0xF {
        offset @ 0..=3 => Channel::write_control_byte(emu, i, offset as usize, value),
        offset @ 4..=7 => {
            let channel = &mut emu.audio.channels[i];
            let shift = (offset - 4) * 8;
            let addr = (channel.src_addr & !(0xFF << shift)) | ((value as u32) << shift);
            channel.write_src_addr(addr);
        }
        _ => {}
    }
}

fn write_sound_16(emu: &mut Emu, addr: u32, value: u16) {
    let i = sound_channel(addr);
    match addr & 0xF {
        0x0 => {
            let channel = &emu.audio.channels[i];
            let merged = (channel.control.0 & !0xFFFF) | value as u32;
            Channel::write_control(emu, i, crate::audio::channel::Control(merged));
        }
        0x2 => {
            let channel = &emu.audio.channels[i];
            let merged = (channel.control.0 & 0xFFFF) | (value as u32) << 16;
            Channel::write_control(emu, i, crate::audio::channel::Control(merged));
        }
        0x8 => emu.audio.channels[i].timer_reload = value,
        0xA => emu.audio.channels[i].loop_start = value,
        _ => {}
    }
}

fn write_sound_32(emu: &mut Emu, addr: u32, value: u32) {
    let i = sound_channel(addr);
    match addr & 0xF {
        0x0 => Channel::write_control(emu, i, crate::audio::channel::Control(value)),
        0x4 => emu.audio.channels[i].write_src_addr(value),
        0x8 => {
            emu.audio.channels[i].timer_reload = value as u16;
            emu.audio.channels[i].loop_start = (value >> 16) as u16;
        }
        0xC => emu.audio.channels[i].write_length(value),
        _ => {}
    }
}

pub(super) fn read_8(emu: &mut Emu, addr: u32) -> u8 {
    let offset = addr & 0x00FF_FFFF;
    match offset {
        0x138 => emu.rtc.io_reg(),
        0x1C2 => emu.spi.data_out(),
        0x208 => emu.arm7.state.irqs.master_enable as u8,
        0x240 => emu.gpu.vram.arm7_status(),
        0x241 => emu.swram.control().0,
        0x300 => emu.arm7.state.post_flag,
        0x301 => emu.arm7.halt_control,
        0x400..=0x4FF => read_sound_8(emu, offset),
        0x508 => emu.audio.capture_control(0),
        0x509 => emu.audio.capture_control(1),
        _ => {
            let half = read_16(emu, addr & !1);
            (half >> ((addr & 1) << 3)) as u8
        }
    }
}

pub(super) fn read_16(emu: &mut Emu, addr: u32) -> u16 {
    let offset = addr & 0x00FF_FFFF;
    match offset {
        0x004 => emu.gpu.disp_status(false).0,
        0x006 => emu.gpu.vcount(),
        0x0BA | 0x0C6 | 0x0D2 | 0x0DE => emu.arm7.dma.channels[dma_channel(offset)].control.0,
        0x100 | 0x104 | 0x108 | 0x10C => timers::read_counter::<Arm7>(emu, timer_index(offset)),
        0x102 | 0x106 | 0x10A | 0x10E => {
            emu.arm7.timers.0[timer_index(offset)].control.0 as u16
        }
        0x130 => emu.input.keyinput(),
        0x132 => emu.input.key_irq_control(false).0,
        0x134 => emu.arm7.rcnt,
        0x136 => emu.input.extkeyin(),
        0x138 => emu.rtc.io_reg() as u16,
        0x180 => emu.ipc.sync(false).0,
        0x184 => emu.ipc.control(false).0,
        0x1A0 => {
            if emu.ds_slot.arm7_access {
                emu.ds_slot.aux_spi_control.0
            } else {
                0
            }
        }
        0x1A2 => DsSlot::aux_spi_data(emu, false) as u16,
        0x1A4 => DsSlot::rom_control(emu, false).0 as u16,
        0x1A6 => (DsSlot::rom_control(emu, false).0 >> 16) as u16,
        0x1C0 => emu.spi.control.0,
        0x1C2 => emu.spi.data_out() as u16,
        0x204 => {
            let global = emu.global_ex_mem_control().0;
            (global & !0x7F) | emu.arm7.local_ex_mem_control.0 as u16 & 0x7F
        }
        0x208 => emu.arm7.state.irqs.master_enable as u16,
        0x210 => emu.arm7.state.irqs.enabled().bits() as u16,
        0x212 => (emu.arm7.state.irqs.enabled().bits() >> 16) as u16,
        0x214 => emu.arm7.state.irqs.requested().bits() as u16,
        0x216 => (emu.arm7.state.irqs.requested().bits() >> 16) as u16,
        0x300 => emu.arm7.state.post_flag as u16,
        0x304 => emu.arm7_power_control(),
        0x500 => emu.audio.control.0,
        0x504 => emu.audio.bias(),
        _ => {
            #[cfg(feature = "log")]
            slog::info!(emu.arm7.logger, "unknown 16-bit read @ {:#010X}", addr);
            0
        }
    }
}

pub(super) fn read_32(emu: &mut Emu, addr: u32) -> u32 {
    let offset = addr & 0x00FF_FFFF;
    match offset {
        0x1A4 => DsSlot::rom_control(emu, false).0,
        0x1C0 => (emu.spi.data_out() as u32) << 16 | emu.spi.control.0 as u32,
        0x210 => emu.arm7.state.irqs.enabled().bits(),
        0x214 => emu.arm7.state.irqs.requested().bits(),
        0x400..=0x4FC => {
            let channel = &emu.audio.channels[sound_channel(offset)];
            match offset & 0xF {
                0 => channel.control.0,
                _ => 0,
            }
        }
        0x10_0000 => Ipc::recv(emu, false),
        0x10_0010 => DsSlot::read_rom_data(emu, false),
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
        0x138 => Rtc::write_io_reg(emu, value),
        0x1A0 => DsSlot::write_aux_spi_control_low(emu, false, value),
        0x1A1 => DsSlot::write_aux_spi_control_high(emu, false, value),
        0x1A2 => DsSlot::write_aux_spi_data(emu, false, value),
        0x1A8..=0x1AF => DsSlot::write_rom_command(emu, false, (offset - 0x1A8) as usize, value),
        0x1C2 => spi::Controller::write_data(emu, value),
        0x208 => {
            let state = &mut emu.arm7.state;
            state
                .irqs
                .write_master_enable(value & 1 != 0, state.regs.cpsr.irqs_disabled());
        }
        0x300 => {
            // Writable only from BIOS code; bit 0 sticks once set
            if emu.arm7.state.regs.pc() < super::BIOS_SIZE as u32 {
                emu.arm7.state.post_flag |= value & 1;
            }
        }
        0x301 => Arm7::write_halt_control(emu, value),
        0x400..=0x4FF => write_sound_8(emu, offset, value),
        0x508 => emu.audio.write_capture_control(0, value),
        0x509 => emu.audio.write_capture_control(1, value),
        _ => {
            #[cfg(feature = "log")]
            slog::info!(
                emu.arm7.logger,
                "unknown 8-bit write @ {:#010X}: {:#04X}",
                addr,
                value
            );
        }
    }
}

fn write_dma_16(emu: &mut Emu, offset: u32, value: u16) {
    let i = dma_channel(offset);
    let channel = &mut emu.arm7.dma.channels[i];
    match (offset - 0xB0) % 12 {
        0 => channel.sad_reg = (channel.sad_reg & !0xFFFF) | value as u32,
        2 => channel.sad_reg = (channel.sad_reg & 0xFFFF) | (value as u32) << 16,
        4 => channel.dad_reg = (channel.dad_reg & !0xFFFF) | value as u32,
        6 => channel.dad_reg = (channel.dad_reg & 0xFFFF) | (value as u32) << 16,
        8 => channel.count_reg = value,
        _ => dma::write_control::<Arm7>(emu, i, dma::Control(value)),
    }
}

pub(super) fn write_16(emu: &mut Emu, addr: u32, value: u16) {
    let offset = addr & 0x00FF_FFFF;
    match offset {
        0x004 => emu.gpu.write_disp_status(false, DispStatus(value)),
        0x0B0..=0x0DE => write_dma_16(emu, offset, value),
        0x100 | 0x104 | 0x108 | 0x10C => {
            timers::write_reload::<Arm7>(emu, timer_index(offset), value);
        }
        0x102 | 0x106 | 0x10A | 0x10E => {
            timers::write_control::<Arm7>(emu, timer_index(offset), timers::Control(value as u8));
        }
        0x132 => emu.write_key_irq_control(false, crate::emu::input::KeyIrqControl(value)),
        0x134 => emu.arm7.rcnt = value & 0xC1FF,
        0x138 => Rtc::write_io_reg(emu, value as u8),
        0x180 => Ipc::write_sync(emu, false, crate::ipc::Sync(value)),
        0x184 => Ipc::write_control(emu, false, crate::ipc::Control(value)),
        0x1A0 => DsSlot::write_aux_spi_control(emu, false, AuxSpiControl(value)),
        0x1A2 => DsSlot::write_aux_spi_data(emu, false, value as u8),
        0x1C0 => spi::Controller::write_control(emu, spi::Control(value)),
        0x1C2 => spi::Controller::write_data(emu, value as u8),
        0x204 => {
            emu.arm7.local_ex_mem_control = LocalExMemControl(value & 0x7F);
            crate::cpu::arm7::bus::rebuild_timing_tables(emu);
        }
        0x206 => {}
        0x208 => {
            let state = &mut emu.arm7.state;
            state
                .irqs
                .write_master_enable(value & 1 != 0, state.regs.cpsr.irqs_disabled());
        }
        0x210 => {
            let state = &mut emu.arm7.state;
            let enabled = (state.irqs.enabled().bits() & !0xFFFF) | value as u32;
            state.irqs.write_enabled(
                IrqFlags::from_bits_retain(enabled),
                state.regs.cpsr.irqs_disabled(),
            );
        }
        0x212 => {
            let state = &mut emu.arm7.state;
            let enabled = (state.irqs.enabled().bits() & 0xFFFF) | (value as u32) << 16;
            state.irqs.write_enabled(
                IrqFlags::from_bits_retain(enabled),
                state.regs.cpsr.irqs_disabled(),
            );
        }
        0x214 => {
            let state = &mut emu.arm7.state;
            state.irqs.write_requested(
                IrqFlags::from_bits_retain(value as u32),
                state.regs.cpsr.irqs_disabled(),
            );
        }
        0x216 => {
            let state = &mut emu.arm7.state;
            state.irqs.write_requested(
                IrqFlags::from_bits_retain((value as u32) << 16),
                state.regs.cpsr.irqs_disabled(),
            );
        }
        0x304 => emu.write_arm7_power_control(value),
        0x308 => {
            // BIOSPROT can only be raised
            if emu.arm7.bios_prot == 0 {
                emu.arm7.bios_prot = (value & 0xFFFE) as u32;
            }
        }
        0x400..=0x4FE => write_sound_16(emu, offset, value),
        0x500 => emu.audio.control = crate::audio::Control(value & 0xBF7F),
        0x504 => emu.audio.write_bias(value),
        0x508 => {
            emu.audio.write_capture_control(0, value as u8);
            emu.audio.write_capture_control(1, (value >> 8) as u8);
        }
        _ => {
            #[cfg(feature = "log")]
            slog::info!(
                emu.arm7.logger,
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
        0x0B0 | 0x0BC | 0x0C8 | 0x0D4 => {
            emu.arm7.dma.channels[dma_channel(offset)].sad_reg = value;
        }
        0x0B4 | 0x0C0 | 0x0CC | 0x0D8 => {
            emu.arm7.dma.channels[dma_channel(offset)].dad_reg = value;
        }
        0x0B8 | 0x0C4 | 0x0D0 | 0x0DC => {
            let i = dma_channel(offset);
            emu.arm7.dma.channels[i].count_reg = value as u16;
            dma::write_control::<Arm7>(emu, i, dma::Control((value >> 16) as u16));
        }
        0x100 | 0x104 | 0x108 | 0x10C => {
            let i = timer_index(offset);
            timers::write_reload::<Arm7>(emu, i, value as u16);
            timers::write_control::<Arm7>(emu, i, timers::Control((value >> 16) as u8));
        }
        0x180 => Ipc::write_sync(emu, false, crate::ipc::Sync(value as u16)),
        0x188 => Ipc::send(emu, false, value),
        0x1A4 => DsSlot::write_rom_control(emu, false, RomControl(value)),
        0x1A8 | 0x1AC => {
            for i in 0..4 {
                DsSlot::write_rom_command(
                    emu,
                    false,
                    (offset - 0x1A8) as usize + i,
                    (value >> (8 * i)) as u8,
                );
            }
        }
        0x208 => {
            let state = &mut emu.arm7.state;
            state
                .irqs
                .write_master_enable(value & 1 != 0, state.regs.cpsr.irqs_disabled());
        }
        0x210 => {
            let state = &mut emu.arm7.state;
            state.irqs.write_enabled(
                IrqFlags::from_bits_retain(value),
                state.regs.cpsr.irqs_disabled(),
            );
        }
        0x214 => {
            let state = &mut emu.arm7.state;
            state.irqs.write_requested(
                IrqFlags::from_bits_retain(value),
                state.regs.cpsr.irqs_disabled(),
            );
        }
        0x400..=0x4FC => write_sound_32(emu, offset, value),
        _ => {
            write_16(emu, addr, value as u16);
            write_16(emu, addr | 2, (value >> 16) as u16);
        }
    }
}
