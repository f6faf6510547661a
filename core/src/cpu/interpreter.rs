mod alu;
mod arm;
mod thumb;

use super::{psr::Mode, Core};
use crate::emu::Emu;

pub(crate) type ArmFn = fn(&mut Emu, u32);
pub(crate) type ThumbFn = fn(&mut Emu, u16);

/// Condition pass masks indexed by the condition field; bit N is set when
/// the condition holds for NZCV = N.
static COND_TABLE: [u16; 16] = [
    0xF0F0, // EQ
    0x0F0F, // NE
    0xCCCC, // CS
    0x3333, // CC
    0xFF00, // MI
    0x00FF, // PL
    0xAAAA, // VS
    0x5555, // VC
    0x0C0C, // HI
    0xF3F3, // LS
    0xAA55, // GE
    0x55AA, // LT
    0x0A05, // GT
    0xF5FA, // LE
    0xFFFF, // AL
    0x0000, // NV
];

#[inline]
fn condition_passed(cpsr_flags: u32, condition: u32) -> bool {
    COND_TABLE[condition as usize] & (1 << cpsr_flags) != 0
}

/// Run the interpreter until the CPU's clock reaches its target. A halted
/// CPU consumes the whole slice at once.
pub(crate) fn run<C: Core>(emu: &mut Emu) {
    if C::state(emu).is_halted() {
        let state = C::state_mut(emu);
        state.cycles = state.cycles.max(state.target_cycles);
        return;
    }

    if C::state(emu).irqs.triggered() {
        handle_irq::<C>(emu);
    }

    while C::state(emu).cycles < C::state(emu).target_cycles {
        step::<C>(emu);
    }
}

fn step<C: Core>(emu: &mut Emu) {
    let state = C::state_mut(emu);
    if state.regs.cpsr.thumb_state() {
        state.regs.gpr[15] = state.regs.gpr[15].wrapping_add(2);
        let instr = state.pipeline[0] as u16;
        state.pipeline[0] = state.pipeline[1];
        let fetch_addr = C::state(emu).regs.gpr[15];
        let next = C::fetch_16::<true>(emu, fetch_addr);
        C::state_mut(emu).pipeline[1] = next;
        thumb::table::<C>()[(instr >> 6) as usize](emu, instr);
    } else {
        state.regs.gpr[15] = state.regs.gpr[15].wrapping_add(4);
        let instr = state.pipeline[0];
        state.pipeline[0] = state.pipeline[1];
        let fetch_addr = C::state(emu).regs.gpr[15];
        let next = C::fetch_32::<true>(emu, fetch_addr);
        C::state_mut(emu).pipeline[1] = next;

        let condition = instr >> 28;
        if condition_passed(C::state(emu).regs.cpsr.condition_flags(), condition) {
            let key = (instr >> 16 & 0xFF0) | (instr >> 4 & 0xF);
            arm::table::<C>()[key as usize](emu, instr);
        } else if condition == 0xF && C::IS_ARM9 {
            if instr & 0xFE00_0000 == 0xFA00_0000 {
                // BLX with immediate target
                let offset =
                    (((instr << 8) as i32) >> 6) as u32 + ((instr >> 24 & 1) << 1);
                let state = C::state_mut(emu);
                let target = state.regs.gpr[15].wrapping_add(offset);
                state.regs.gpr[14] = state.regs.gpr[15].wrapping_sub(4);
                state.regs.cpsr.set_thumb_state(true);
                C::add_code_cycles(emu, 0);
                jump_thumb::<C>(emu, target);
            } else {
                C::add_code_cycles(emu, 0);
            }
        } else {
            C::add_code_cycles(emu, 0);
        }
    }

    if C::state(emu).irqs.triggered() {
        handle_irq::<C>(emu);
    }
}

/// Reload the pipeline for ARM execution from `addr` and charge the two
/// fetches.
pub(crate) fn jump_arm<C: Core>(emu: &mut Emu, addr: u32) {
    let first = C::fetch_32::<false>(emu, addr);
    let first_cycles = C::state(emu).code_cycles;
    let second = C::fetch_32::<true>(emu, addr.wrapping_add(4));
    let state = C::state_mut(emu);
    state.cycles += first_cycles as u64 + state.code_cycles as u64;
    state.pipeline = [first, second];
    state.regs.gpr[15] = addr.wrapping_add(4);
}

pub(crate) fn jump_thumb<C: Core>(emu: &mut Emu, addr: u32) {
    let first = C::fetch_16::<false>(emu, addr);
    let first_cycles = C::state(emu).code_cycles;
    let second = C::fetch_16::<true>(emu, addr.wrapping_add(2));
    let state = C::state_mut(emu);
    state.cycles += first_cycles as u64 + state.code_cycles as u64;
    state.pipeline = [first, second];
    state.regs.gpr[15] = addr.wrapping_add(2);
}

/// Jump selecting the state from bit 0 (BX and ARMv5 interworking loads).
pub(crate) fn jump_interworking<C: Core>(emu: &mut Emu, addr: u32) {
    if addr & 1 != 0 {
        C::state_mut(emu).regs.cpsr.set_thumb_state(true);
        jump_thumb::<C>(emu, addr & !1);
    } else {
        C::state_mut(emu).regs.cpsr.set_thumb_state(false);
        jump_arm::<C>(emu, addr & !3);
    }
}

/// Write a full new CPSR value, handling bank switches and the IRQ line.
pub(crate) fn set_cpsr<C: Core>(emu: &mut Emu, value: super::psr::Psr) {
    let state = C::state_mut(emu);
    let old_mode = state.regs.cpsr.mode();
    state.regs.cpsr = value;
    state.regs.switch_mode(old_mode, value.mode());
    state.irqs.update_line(value.irqs_disabled());
}

/// SUBS PC, LR-style return: restore SPSR and jump by the restored state.
pub(crate) fn jump_cpsr<C: Core>(emu: &mut Emu, addr: u32) {
    let spsr = C::state(emu).regs.spsr;
    set_cpsr::<C>(emu, spsr);
    if spsr.thumb_state() {
        jump_thumb::<C>(emu, addr & !1);
    } else {
        jump_arm::<C>(emu, addr & !3);
    }
}

/// Switch into an exception mode: bank registers, stash the old CPSR in the
/// new mode's SPSR, disable IRQs and clear Thumb state.
fn enter_exception<C: Core>(emu: &mut Emu, mode: Mode, return_addr: u32, vector_offset: u32) {
    let state = C::state_mut(emu);
    let old_cpsr = state.regs.cpsr;
    let old_mode = old_cpsr.mode();
    let mut new_cpsr = old_cpsr;
    new_cpsr.set_mode(mode);
    new_cpsr.set_thumb_state(false);
    new_cpsr.set_irqs_disabled(true);
    state.regs.cpsr = new_cpsr;
    state.regs.switch_mode(old_mode, mode);
    state.regs.gpr[14] = return_addr;
    state.regs.spsr = old_cpsr;
    state.irqs.update_line(true);
    let base = state.exception_base;
    jump_arm::<C>(emu, base + vector_offset);
}

pub(crate) fn handle_swi<C: Core>(emu: &mut Emu) {
    let state = C::state(emu);
    let return_addr = state.regs.gpr[15]
        .wrapping_sub(if state.regs.cpsr.thumb_state() { 2 } else { 4 });
    C::add_code_cycles(emu, 0);
    enter_exception::<C>(emu, Mode::Supervisor, return_addr, 0x8);
}

pub(crate) fn handle_undefined<C: Core>(emu: &mut Emu) {
    let state = C::state(emu);
    let return_addr = state.regs.gpr[15]
        .wrapping_sub(if state.regs.cpsr.thumb_state() { 2 } else { 4 });
    C::add_code_cycles(emu, 0);
    enter_exception::<C>(emu, Mode::Undefined, return_addr, 0x4);
}

/// IRQ entry; LR is set so that `SUBS PC, LR, #4` returns to the
/// interrupted instruction.
pub(crate) fn handle_irq<C: Core>(emu: &mut Emu) {
    let state = C::state(emu);
    let return_addr = state.regs.gpr[15]
        .wrapping_sub(if state.regs.cpsr.thumb_state() { 2 } else { 4 })
        .wrapping_add(4);
    enter_exception::<C>(emu, Mode::Irq, return_addr, 0x18);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn condition_table_matches_flag_logic() {
        for flags in 0..16u32 {
            let n = flags & 8 != 0;
            let z = flags & 4 != 0;
            let c = flags & 2 != 0;
            let v = flags & 1 != 0;
            let expected = [
                z,
                !z,
                c,
                !c,
                n,
                !n,
                v,
                !v,
                c && !z,
                !c || z,
                n == v,
                n != v,
                !z && n == v,
                z || n != v,
                true,
                false,
            ];
            for (cond, &want) in expected.iter().enumerate() {
                assert_eq!(
                    condition_passed(flags, cond as u32),
                    want,
                    "cond {cond:X} flags {flags:X}"
                );
            }
        }
    }
}
