use super::{irqs::IrqFlags, Core};
use crate::emu::{schedule::CpuEvent, Emu};

proc_bitfield::bitfield! {
    #[derive(Clone, Copy, PartialEq, Eq)]
    pub struct Control(pub u16): Debug {
        pub dst_addr_control: u8 @ 5..=6,
        pub src_addr_control: u8 @ 7..=8,
        pub repeat: bool @ 9,
        pub is_32_bit: bool @ 10,
        pub timing_arm9: u8 @ 11..=13,
        pub timing_arm7: u8 @ 12..=13,
        pub fire_irq: bool @ 14,
        pub enabled: bool @ 15,
    }
}

/// Transfer trigger, stored decoded from the control word. The ARM9 has the
/// full set; the ARM7's two timing bits map onto a subset.
pub mod timing {
    pub const IMMEDIATE: u8 = 0;
    pub const VBLANK: u8 = 1;
    pub const HBLANK: u8 = 2;
    pub const SCANLINE_START: u8 = 3;
    pub const DS_SLOT_ARM9: u8 = 5;
    pub const GX_FIFO: u8 = 7;
    pub const DS_SLOT_ARM7: u8 = 2;
}

#[derive(Clone, Copy, Default)]
pub struct Channel {
    pub control: Control,
    pub sad_reg: u32,
    pub dad_reg: u32,
    pub count_reg: u16,

    pub(crate) mode: u8,
    pub(crate) sad: u32,
    pub(crate) dad: u32,
    pub(crate) word_count: u32,
    pub(crate) count: u32,
    word_width: u32,
    sad_step: u32,
    dad_step: u32,
    repeat_reload: bool,
}

impl Default for Control {
    fn default() -> Self {
        Control(0)
    }
}

pub struct Controller {
    pub channels: [Channel; 4],
    pub active: u8,
    requested_immediate: u8,
}

impl Controller {
    pub(crate) fn new() -> Self {
        Controller {
            channels: [Channel::default(); 4],
            active: 0,
            requested_immediate: 0,
        }
    }

    #[inline]
    pub fn any_active(&self) -> bool {
        self.active != 0
    }
}

fn load_word_count<C: Core>(channel: &mut Channel, i: usize) {
    channel.word_count = if C::IS_ARM9 {
        let raw = (channel.control.0 as u32) << 16 | channel.count_reg as u32;
        match raw & 0x1F_FFFF {
            0 => 0x20_0000,
            count => count,
        }
    } else if i == 3 {
        match channel.count_reg as u32 {
            0 => 0x1_0000,
            count => count,
        }
    } else {
        match channel.count_reg as u32 & 0x3FFF {
            0 => 0x4000,
            count => count,
        }
    };
}

fn load_dad<C: Core>(channel: &mut Channel, i: usize) {
    channel.dad = if C::IS_ARM9 || i == 3 {
        channel.dad_reg & 0x0FFF_FFFF
    } else {
        channel.dad_reg & 0x07FF_FFFF
    };
}

fn update_step_and_width(channel: &mut Channel) {
    channel.word_width = if channel.control.is_32_bit() { 4 } else { 2 };
    channel.dad_step = match channel.control.dst_addr_control() {
        1 => channel.word_width.wrapping_neg(),
        2 => 0,
        _ => channel.word_width,
    };
    channel.sad_step = match channel.control.src_addr_control() {
        1 => channel.word_width.wrapping_neg(),
        2 => 0,
        _ => channel.word_width,
    };
}

pub fn write_control<C: Core>(emu: &mut Emu, i: usize, value: Control) {
    let channel = &mut C::dma(emu).channels[i];
    let old_enabled = channel.control.enabled();
    channel.control = value;
    channel.mode = if C::IS_ARM9 {
        value.timing_arm9()
    } else {
        value.timing_arm7()
    };
    update_step_and_width(channel);

    if old_enabled || !value.enabled() {
        return;
    }

    channel.sad = if C::IS_ARM9 || i != 0 {
        channel.sad_reg & 0x0FFF_FFFF
    } else {
        channel.sad_reg & 0x07FF_FFFF
    };
    load_dad::<C>(channel, i);
    load_word_count::<C>(channel, i);
    channel.repeat_reload = false;
    channel.count = 0;
    let mode = channel.mode;

    if mode == timing::IMMEDIATE {
        let dma = C::dma(emu);
        dma.requested_immediate |= 1 << i;
        let state = C::state(emu);
        let (cycles, dt) = if C::IS_ARM9 {
            (state.cycles, 2 << 1)
        } else {
            (state.cycles, 4)
        };
        let time =
            emu.schedule
                .schedule_cpu_event_after(C::IS_ARM9, CpuEvent::StartImmediateDmas, cycles, dt);
        let state = C::state_mut(emu);
        state.target_cycles = state.target_cycles.min(time);
    } else if C::IS_ARM9 && mode == timing::GX_FIFO && emu.gpu.engine_3d.gx_fifo_half_empty() {
        C::dma(emu).active |= 1 << i;
    }
}

/// Mark every enabled channel with the given trigger as active.
pub fn start_dmas<C: Core>(emu: &mut Emu, mode: u8) {
    for i in 0..4 {
        let channel = &C::dma(emu).channels[i];
        if channel.control.enabled() && channel.mode == mode {
            start_dma::<C>(emu, i);
        }
    }
}

fn start_dma<C: Core>(emu: &mut Emu, i: usize) {
    let channel = &mut C::dma(emu).channels[i];
    if channel.repeat_reload {
        channel.repeat_reload = false;
        load_word_count::<C>(channel, i);
        if channel.control.dst_addr_control() == 3 {
            load_dad::<C>(channel, i);
        }
    }
    C::dma(emu).active |= 1 << i;
}

pub(crate) fn start_immediate_dmas<C: Core>(emu: &mut Emu) {
    let dma = C::dma(emu);
    dma.active |= dma.requested_immediate;
    dma.requested_immediate = 0;
}

/// Run the lowest-numbered active channel until it finishes or the CPU's
/// target cycle is reached, charging 2 cycles per transferred unit.
pub fn run_dma<C: Core>(emu: &mut Emu) {
    let i = C::dma(emu).active.trailing_zeros() as usize;

    loop {
        let (count, word_count, sad, dad, wide) = {
            let channel = &C::dma(emu).channels[i];
            (
                channel.count,
                channel.word_count,
                channel.sad,
                channel.dad,
                channel.word_width == 4,
            )
        };
        let at_target = {
            let state = C::state(emu);
            state.cycles >= state.target_cycles
        };
        if count >= word_count || at_target {
            break;
        }

        if wide {
            let value = C::bus_read::<u32>(emu, sad);
            C::bus_write(emu, dad, value);
        } else {
            let value = C::bus_read::<u16>(emu, sad);
            C::bus_write(emu, dad, value);
        }

        let channel = &mut C::dma(emu).channels[i];
        channel.count += 1;
        channel.sad = channel.sad.wrapping_add(channel.sad_step);
        channel.dad = channel.dad.wrapping_add(channel.dad_step);
        C::state_mut(emu).cycles += 2;
    }

    let channel = &mut C::dma(emu).channels[i];
    if channel.count == channel.word_count {
        let fire_irq = channel.control.fire_irq();
        if channel.control.repeat() {
            channel.repeat_reload = true;
        } else {
            channel.control.set_enabled(false);
        }
        channel.count = 0;
        let dma = C::dma(emu);
        dma.active &= !(1 << i);

        if fire_irq {
            let state = C::state_mut(emu);
            let disabled = state.regs.cpsr.irqs_disabled();
            state.irqs.request(IrqFlags::dma(i), disabled);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn step_decoding() {
        let mut channel = Channel {
            control: Control(0).with_is_32_bit(true).with_dst_addr_control(1),
            ..Channel::default()
        };
        update_step_and_width(&mut channel);
        assert_eq!(channel.word_width, 4);
        assert_eq!(channel.dad_step, 4u32.wrapping_neg());
        assert_eq!(channel.sad_step, 4);

        channel.control = Control(0).with_src_addr_control(2);
        update_step_and_width(&mut channel);
        assert_eq!(channel.word_width, 2);
        assert_eq!(channel.sad_step, 0);
        assert_eq!(channel.dad_step, 2);
    }
}
