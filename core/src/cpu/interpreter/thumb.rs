use super::{
    alu, condition_passed, handle_swi, handle_undefined, jump_arm, jump_thumb, ThumbFn,
};
use crate::{
    cpu::{ldrh, ldrsh, Core},
    emu::Emu,
};

#[inline]
fn reg<C: Core>(emu: &Emu, i: u32) -> u32 {
    C::state(emu).regs.gpr[(i & 0xF) as usize]
}

#[inline]
fn set_reg<C: Core>(emu: &mut Emu, i: u32, value: u32) {
    C::state_mut(emu).regs.gpr[(i & 0xF) as usize] = value;
}

fn thumb_undefined<C: Core>(emu: &mut Emu, _instr: u16) {
    handle_undefined::<C>(emu);
}

fn thumb_swi<C: Core>(emu: &mut Emu, _instr: u16) {
    handle_swi::<C>(emu);
}

fn thumb_bkpt<C: Core>(emu: &mut Emu, _instr: u16) {
    handle_undefined::<C>(emu);
}

/// ADD/SUB with a register or 3-bit immediate (formats 1-2).
fn thumb_add_sub<C: Core>(emu: &mut Emu, instr: u16) {
    let rn = reg::<C>(emu, instr as u32 >> 3);
    let rd = instr as u32 & 7;
    let imm = instr as u32 >> 6 & 7;

    let (result, carry, overflow) = match instr >> 9 & 3 {
        0 => {
            let rm = reg::<C>(emu, imm);
            let r = rn.wrapping_add(rm);
            let (c, v) = alu::add_flags(rn, rm, r);
            (r, c, v)
        }
        1 => {
            let rm = reg::<C>(emu, imm);
            let r = rn.wrapping_sub(rm);
            let (c, v) = alu::sub_flags(rn, rm, r);
            (r, c, v)
        }
        2 => {
            let r = rn.wrapping_add(imm);
            let (c, v) = alu::add_flags(rn, imm, r);
            (r, c, v)
        }
        _ => {
            let r = rn.wrapping_sub(imm);
            let (c, v) = alu::sub_flags(rn, imm, r);
            (r, c, v)
        }
    };

    set_reg::<C>(emu, rd, result);
    alu::set_nzcv(&mut C::state_mut(emu).regs.cpsr, result, carry, overflow);
    C::add_code_cycles(emu, 0);
}

/// MOV/CMP/ADD/SUB with an 8-bit immediate (format 3).
fn thumb_alu_imm8<C: Core>(emu: &mut Emu, instr: u16) {
    let rd = instr as u32 >> 8 & 7;
    let imm = instr as u32 & 0xFF;
    let rn = reg::<C>(emu, rd);

    match instr >> 11 & 3 {
        0 => {
            set_reg::<C>(emu, rd, imm);
            alu::set_nz(&mut C::state_mut(emu).regs.cpsr, imm);
        }
        1 => {
            let r = rn.wrapping_sub(imm);
            let (c, v) = alu::sub_flags(rn, imm, r);
            alu::set_nzcv(&mut C::state_mut(emu).regs.cpsr, r, c, v);
        }
        2 => {
            let r = rn.wrapping_add(imm);
            let (c, v) = alu::add_flags(rn, imm, r);
            set_reg::<C>(emu, rd, r);
            alu::set_nzcv(&mut C::state_mut(emu).regs.cpsr, r, c, v);
        }
        _ => {
            let r = rn.wrapping_sub(imm);
            let (c, v) = alu::sub_flags(rn, imm, r);
            set_reg::<C>(emu, rd, r);
            alu::set_nzcv(&mut C::state_mut(emu).regs.cpsr, r, c, v);
        }
    }
    C::add_code_cycles(emu, 0);
}

/// Shift by immediate (format 1).
fn thumb_shift_imm<C: Core>(emu: &mut Emu, instr: u16) {
    let rm = reg::<C>(emu, instr as u32 >> 3);
    let rd = instr as u32 & 7;
    let amount = instr as u32 >> 6 & 0x1F;
    let carry_in = C::state(emu).regs.cpsr.carry();

    let (result, carry) = match instr >> 11 & 3 {
        0 => {
            if amount == 0 {
                (rm, carry_in)
            } else {
                (rm << amount, rm & (1 << (32 - amount)) != 0)
            }
        }
        1 => alu::shift_imm(1, rm, amount, carry_in),
        _ => alu::shift_imm(2, rm, amount, carry_in),
    };

    set_reg::<C>(emu, rd, result);
    alu::set_nzc(&mut C::state_mut(emu).regs.cpsr, result, carry);
    C::add_code_cycles(emu, 0);
}

/// Register-to-register data processing (format 4).
fn thumb_dp_reg<C: Core>(emu: &mut Emu, instr: u16) {
    let rm = reg::<C>(emu, instr as u32 >> 3);
    let rd = instr as u32 & 7;
    let operand = reg::<C>(emu, rd);
    let op = instr >> 6 & 0xF;
    let carry_in = C::state(emu).regs.cpsr.carry();

    let mut internal = 0;
    match op {
        0x0 => {
            let r = operand & rm;
            set_reg::<C>(emu, rd, r);
            alu::set_nz(&mut C::state_mut(emu).regs.cpsr, r);
        }
        0x1 => {
            let r = operand ^ rm;
            set_reg::<C>(emu, rd, r);
            alu::set_nz(&mut C::state_mut(emu).regs.cpsr, r);
        }
        0x2 | 0x3 | 0x4 | 0x7 => {
            internal = 1;
            let amount = rm & 0xFF;
            let (r, carry) = match op {
                0x2 => alu::lsl_reg(operand, amount, carry_in),
                0x3 => alu::lsr_reg(operand, amount, carry_in),
                0x4 => alu::asr_reg(operand, amount, carry_in),
                _ => alu::ror_reg(operand, amount, carry_in),
            };
            set_reg::<C>(emu, rd, r);
            alu::set_nzc(&mut C::state_mut(emu).regs.cpsr, r, carry);
        }
        0x5 => {
            let r64 = operand as u64 + rm as u64 + carry_in as u64;
            let r = r64 as u32;
            let (c, v) = alu::adc_flags(operand, rm, r, r64);
            set_reg::<C>(emu, rd, r);
            alu::set_nzcv(&mut C::state_mut(emu).regs.cpsr, r, c, v);
        }
        0x6 => {
            let r64 = operand as i64 - rm as i64 - !carry_in as i64;
            let r = r64 as u32;
            let (c, v) = alu::sbc_flags(operand, rm, r, r64);
            set_reg::<C>(emu, rd, r);
            alu::set_nzcv(&mut C::state_mut(emu).regs.cpsr, r, c, v);
        }
        0x8 => {
            let r = operand & rm;
            alu::set_nz(&mut C::state_mut(emu).regs.cpsr, r);
        }
        0x9 => {
            let r = 0u32.wrapping_sub(rm);
            let (c, v) = alu::sub_flags(0, rm, r);
            set_reg::<C>(emu, rd, r);
            alu::set_nzcv(&mut C::state_mut(emu).regs.cpsr, r, c, v);
        }
        0xA => {
            let r = operand.wrapping_sub(rm);
            let (c, v) = alu::sub_flags(operand, rm, r);
            alu::set_nzcv(&mut C::state_mut(emu).regs.cpsr, r, c, v);
        }
        0xB => {
            let r = operand.wrapping_add(rm);
            let (c, v) = alu::add_flags(operand, rm, r);
            alu::set_nzcv(&mut C::state_mut(emu).regs.cpsr, r, c, v);
        }
        0xC => {
            let r = operand | rm;
            set_reg::<C>(emu, rd, r);
            alu::set_nz(&mut C::state_mut(emu).regs.cpsr, r);
        }
        0xD => {
            internal = C::mul_cycles(
                emu,
                if operand >> 31 != 0 { !operand } else { operand },
                false,
                false,
                true,
            );
            let r = operand.wrapping_mul(rm);
            set_reg::<C>(emu, rd, r);
            alu::set_nz(&mut C::state_mut(emu).regs.cpsr, r);
        }
        0xE => {
            let r = operand & !rm;
            set_reg::<C>(emu, rd, r);
            alu::set_nz(&mut C::state_mut(emu).regs.cpsr, r);
        }
        _ => {
            let r = !rm;
            set_reg::<C>(emu, rd, r);
            alu::set_nz(&mut C::state_mut(emu).regs.cpsr, r);
        }
    }

    C::add_code_cycles(emu, internal);
}

/// ADD/CMP/MOV with high registers (format 5).
fn thumb_hi_reg_op<C: Core>(emu: &mut Emu, instr: u16) {
    let rm = reg::<C>(emu, instr as u32 >> 3);
    let rd = (instr as u32 >> 4 & 8) | (instr as u32 & 7);

    C::add_code_cycles(emu, 0);

    match instr >> 8 & 3 {
        0 => {
            let r = reg::<C>(emu, rd).wrapping_add(rm);
            if rd == 15 {
                jump_thumb::<C>(emu, r & !1);
            } else {
                set_reg::<C>(emu, rd, r);
            }
        }
        1 => {
            let rn = reg::<C>(emu, rd);
            let r = rn.wrapping_sub(rm);
            let (c, v) = alu::sub_flags(rn, rm, r);
            alu::set_nzcv(&mut C::state_mut(emu).regs.cpsr, r, c, v);
        }
        _ => {
            if rd == 15 {
                jump_thumb::<C>(emu, rm & !1);
            } else {
                set_reg::<C>(emu, rd, rm);
            }
        }
    }
}

/// ADD Rd, PC/SP, #imm (format 12).
fn thumb_add_pc_sp<C: Core>(emu: &mut Emu, instr: u16) {
    let rd = instr as u32 >> 8 & 7;
    let offset = (instr as u32 & 0xFF) << 2;
    let base = if instr & 1 << 11 == 0 {
        reg::<C>(emu, 15) & !3
    } else {
        reg::<C>(emu, 13)
    };
    set_reg::<C>(emu, rd, base.wrapping_add(offset));
    C::add_code_cycles(emu, 0);
}

/// ADD/SUB SP, #imm (format 13).
fn thumb_adjust_sp<C: Core>(emu: &mut Emu, instr: u16) {
    let offset = (instr as u32 & 0x7F) << 2;
    let sp = reg::<C>(emu, 13);
    set_reg::<C>(
        emu,
        13,
        if instr & 1 << 7 == 0 {
            sp.wrapping_add(offset)
        } else {
            sp.wrapping_sub(offset)
        },
    );
    C::add_code_cycles(emu, 0);
}

fn thumb_b_cond<C: Core>(emu: &mut Emu, instr: u16) {
    let condition = instr as u32 >> 8 & 0xF;
    C::add_code_cycles(emu, 0);
    if condition_passed(C::state(emu).regs.cpsr.condition_flags(), condition) {
        let offset = ((instr as i16) << 8 >> 7) as u32;
        let target = reg::<C>(emu, 15).wrapping_add(offset);
        jump_thumb::<C>(emu, target);
    }
}

fn thumb_b<C: Core>(emu: &mut Emu, instr: u16) {
    let offset = ((instr as i16) << 5 >> 4) as u32;
    let target = reg::<C>(emu, 15).wrapping_add(offset);
    C::add_code_cycles(emu, 0);
    jump_thumb::<C>(emu, target);
}

/// BL/BLX prefix and suffix halves (format 19).
fn thumb_bl_pair<C: Core>(emu: &mut Emu, instr: u16) {
    C::add_code_cycles(emu, 0);
    match instr >> 11 & 3 {
        2 => {
            let offset = ((instr as u32) << 21) as i32 >> 9;
            let state = C::state_mut(emu);
            state.regs.gpr[14] = state.regs.gpr[15].wrapping_add(offset as u32);
        }
        3 => {
            let state = C::state_mut(emu);
            let return_addr = state.regs.gpr[15].wrapping_sub(2);
            let target = state.regs.gpr[14].wrapping_add((instr as u32 & 0x7FF) << 1);
            state.regs.gpr[14] = return_addr | 1;
            jump_thumb::<C>(emu, target & !1);
        }
        _ => {
            // BLX suffix: ARMv5 only
            if !C::IS_ARM9 {
                return thumb_undefined::<C>(emu, instr);
            }
            let state = C::state_mut(emu);
            let return_addr = state.regs.gpr[15].wrapping_sub(2);
            let target = state.regs.gpr[14].wrapping_add((instr as u32 & 0x7FF) << 1);
            state.regs.gpr[14] = return_addr | 1;
            state.regs.cpsr.set_thumb_state(false);
            jump_arm::<C>(emu, target & !3);
        }
    }
}

fn thumb_bx<C: Core>(emu: &mut Emu, instr: u16) {
    let addr = reg::<C>(emu, instr as u32 >> 3);
    C::add_code_cycles(emu, 0);
    if addr & 1 == 0 {
        C::state_mut(emu).regs.cpsr.set_thumb_state(false);
        jump_arm::<C>(emu, addr & !3);
    } else {
        jump_thumb::<C>(emu, addr & !1);
    }
}

fn thumb_blx_reg<C: Core>(emu: &mut Emu, instr: u16) {
    if !C::IS_ARM9 {
        return thumb_undefined::<C>(emu, instr);
    }
    let addr = reg::<C>(emu, instr as u32 >> 3);
    let state = C::state_mut(emu);
    state.regs.gpr[14] = state.regs.gpr[15].wrapping_sub(2) | 1;
    C::add_code_cycles(emu, 0);
    if addr & 1 == 0 {
        C::state_mut(emu).regs.cpsr.set_thumb_state(false);
        jump_arm::<C>(emu, addr & !3);
    } else {
        jump_thumb::<C>(emu, addr & !1);
    }
}

/// Load/store with immediate offset (formats 9-10).
fn thumb_load_store_imm<C: Core>(emu: &mut Emu, instr: u16) {
    let rn = reg::<C>(emu, instr as u32 >> 3);
    let rd = instr as u32 & 7;
    let offset = instr as u32 >> 6 & 0x1F;

    match instr >> 11 & 0x1F {
        0xC => {
            let addr = rn.wrapping_add(offset << 2);
            C::store::<u32, false>(emu, addr & !3, reg::<C>(emu, rd));
            C::add_str_cycles(emu, 0);
        }
        0xD => {
            let addr = rn.wrapping_add(offset << 2);
            let value = C::load::<u32, false>(emu, addr & !3).rotate_right((addr & 3) << 3);
            set_reg::<C>(emu, rd, value);
            C::add_ldr_cycles(emu);
        }
        0xE => {
            C::store::<u8, false>(emu, rn.wrapping_add(offset), reg::<C>(emu, rd) as u8);
            C::add_str_cycles(emu, 0);
        }
        0xF => {
            let value = C::load::<u8, false>(emu, rn.wrapping_add(offset)) as u32;
            set_reg::<C>(emu, rd, value);
            C::add_ldr_cycles(emu);
        }
        0x10 => {
            let addr = rn.wrapping_add(offset << 1);
            C::store::<u16, false>(emu, addr & !1, reg::<C>(emu, rd) as u16);
            C::add_str_cycles(emu, 0);
        }
        _ => {
            let addr = rn.wrapping_add(offset << 1);
            let value = ldrh::<C>(emu, addr);
            set_reg::<C>(emu, rd, value);
            C::add_ldr_cycles(emu);
        }
    }
}

/// Load/store with register offset (formats 7-8).
fn thumb_load_store_reg<C: Core>(emu: &mut Emu, instr: u16) {
    let rm = reg::<C>(emu, instr as u32 >> 6);
    let rn = reg::<C>(emu, instr as u32 >> 3);
    let rd = instr as u32 & 7;
    let addr = rn.wrapping_add(rm);

    match instr >> 9 & 7 {
        0 => {
            C::store::<u32, false>(emu, addr & !3, reg::<C>(emu, rd));
            C::add_str_cycles(emu, 0);
        }
        1 => {
            C::store::<u16, false>(emu, addr & !1, reg::<C>(emu, rd) as u16);
            C::add_str_cycles(emu, 0);
        }
        2 => {
            C::store::<u8, false>(emu, addr, reg::<C>(emu, rd) as u8);
            C::add_str_cycles(emu, 0);
        }
        3 => {
            let value = C::load::<u8, false>(emu, addr) as i8 as u32;
            set_reg::<C>(emu, rd, value);
            C::add_ldr_cycles(emu);
        }
        4 => {
            let value = C::load::<u32, false>(emu, addr & !3).rotate_right((addr & 3) << 3);
            set_reg::<C>(emu, rd, value);
            C::add_ldr_cycles(emu);
        }
        5 => {
            let value = ldrh::<C>(emu, addr);
            set_reg::<C>(emu, rd, value);
            C::add_ldr_cycles(emu);
        }
        6 => {
            let value = C::load::<u8, false>(emu, addr) as u32;
            set_reg::<C>(emu, rd, value);
            C::add_ldr_cycles(emu);
        }
        _ => {
            let value = ldrsh::<C>(emu, addr);
            set_reg::<C>(emu, rd, value);
            C::add_ldr_cycles(emu);
        }
    }
}

/// LDR Rd, [PC, #imm] (format 6).
fn thumb_load_pc_relative<C: Core>(emu: &mut Emu, instr: u16) {
    let rd = instr as u32 >> 8 & 7;
    let addr = (reg::<C>(emu, 15) & !3).wrapping_add((instr as u32 & 0xFF) << 2);
    let value = C::load::<u32, false>(emu, addr);
    set_reg::<C>(emu, rd, value);
    C::add_ldr_cycles(emu);
}

/// LDR/STR Rd, [SP, #imm] (format 11).
fn thumb_load_store_sp_relative<C: Core>(emu: &mut Emu, instr: u16) {
    let rd = instr as u32 >> 8 & 7;
    let addr = reg::<C>(emu, 13).wrapping_add((instr as u32 & 0xFF) << 2);
    if instr & 1 << 11 != 0 {
        let value = C::load::<u32, false>(emu, addr & !3).rotate_right((addr & 3) << 3);
        set_reg::<C>(emu, rd, value);
        C::add_ldr_cycles(emu);
    } else {
        C::store::<u32, false>(emu, addr & !3, reg::<C>(emu, rd));
        C::add_str_cycles(emu, 0);
    }
}

/// LDMIA/STMIA (format 15), including the empty-list PC quirk.
fn thumb_ldm_stm<C: Core>(emu: &mut Emu, instr: u16) {
    let rn = instr as u32 >> 8 & 7;
    let register_list = instr as u32 & 0xFF;
    let load = instr & 1 << 11 != 0;
    let offset = if register_list == 0 {
        0x40
    } else {
        4 * register_list.count_ones()
    };

    let base = reg::<C>(emu, rn);
    let mut addr = base & !3;
    let writeback_value = base.wrapping_add(offset);

    if load {
        let mut seq = false;
        for i in 0..8 {
            if register_list & 1 << i == 0 {
                continue;
            }
            let value = if seq {
                C::load::<u32, true>(emu, addr)
            } else {
                C::load::<u32, false>(emu, addr)
            };
            seq = true;
            addr = addr.wrapping_add(4);
            set_reg::<C>(emu, i, value);
        }
        let empty_jump = if register_list == 0 {
            Some(C::load::<u32, false>(emu, addr))
        } else {
            None
        };
        C::add_ldr_cycles(emu);
        if register_list & 1 << rn == 0 {
            set_reg::<C>(emu, rn, writeback_value);
        }
        if let Some(target) = empty_jump {
            set_reg::<C>(emu, rn, writeback_value);
            jump_thumb::<C>(emu, target & !1);
        }
    } else {
        let in_list = register_list & 1 << rn != 0;
        let not_first = register_list & ((1 << rn) - 1) != 0;
        if in_list && !C::IS_ARM9 && not_first {
            set_reg::<C>(emu, rn, writeback_value);
        }
        let mut seq = false;
        for i in 0..8 {
            if register_list & 1 << i == 0 {
                continue;
            }
            let value = reg::<C>(emu, i);
            if seq {
                C::store::<u32, true>(emu, addr, value);
            } else {
                C::store::<u32, false>(emu, addr, value);
            }
            seq = true;
            addr = addr.wrapping_add(4);
        }
        if register_list == 0 {
            let value = reg::<C>(emu, 15).wrapping_add(2);
            C::store::<u32, false>(emu, addr, value);
        }
        C::add_str_cycles(emu, 0);
        set_reg::<C>(emu, rn, writeback_value);
    }
}

/// PUSH/POP (format 14).
fn thumb_push_pop<C: Core>(emu: &mut Emu, instr: u16) {
    let register_list = instr as u32 & 0xFF;
    let pc_lr = instr & 1 << 8 != 0;
    let load = instr & 1 << 11 != 0;
    let count = register_list.count_ones() + pc_lr as u32;
    let offset = 4 * count;

    if load {
        let mut addr = reg::<C>(emu, 13) & !3;
        set_reg::<C>(emu, 13, reg::<C>(emu, 13).wrapping_add(offset));
        let mut seq = false;
        for i in 0..8 {
            if register_list & 1 << i == 0 {
                continue;
            }
            let value = if seq {
                C::load::<u32, true>(emu, addr)
            } else {
                C::load::<u32, false>(emu, addr)
            };
            seq = true;
            addr = addr.wrapping_add(4);
            set_reg::<C>(emu, i, value);
        }
        let target = if pc_lr {
            Some(if seq {
                C::load::<u32, true>(emu, addr)
            } else {
                C::load::<u32, false>(emu, addr)
            })
        } else {
            None
        };
        C::add_ldr_cycles(emu);
        if let Some(target) = target {
            if C::IS_ARM9 && target & 1 == 0 {
                C::state_mut(emu).regs.cpsr.set_thumb_state(false);
                jump_arm::<C>(emu, target & !3);
            } else {
                jump_thumb::<C>(emu, target & !1);
            }
        }
    } else {
        let mut addr = (reg::<C>(emu, 13) & !3).wrapping_sub(offset);
        set_reg::<C>(emu, 13, reg::<C>(emu, 13).wrapping_sub(offset));
        let mut seq = false;
        for i in 0..8 {
            if register_list & 1 << i == 0 {
                continue;
            }
            let value = reg::<C>(emu, i);
            if seq {
                C::store::<u32, true>(emu, addr, value);
            } else {
                C::store::<u32, false>(emu, addr, value);
            }
            seq = true;
            addr = addr.wrapping_add(4);
        }
        if pc_lr {
            let value = reg::<C>(emu, 14);
            if seq {
                C::store::<u32, true>(emu, addr, value);
            } else {
                C::store::<u32, false>(emu, addr, value);
            }
        }
        C::add_str_cycles(emu, 0);
    }
}

/// Classification of the 10-bit key (instruction bits 15-6).
const fn decode<C: Core>(key: u16) -> ThumbFn {
    let i = key as u32;
    if i >> 2 == 0xDE {
        thumb_undefined::<C>
    } else if i >> 2 == 0xDF {
        thumb_swi::<C>
    } else if i >> 2 == 0xBE {
        thumb_bkpt::<C>
    } else if i >> 6 == 0xD {
        thumb_b_cond::<C>
    } else if i >> 5 == 0x1C {
        thumb_b::<C>
    } else if i >> 7 == 0x7 {
        thumb_bl_pair::<C>
    } else if i >> 1 == 0x8E {
        thumb_bx::<C>
    } else if i >> 1 == 0x8F {
        thumb_blx_reg::<C>
    } else if i >> 5 == 0x3 {
        thumb_add_sub::<C>
    } else if i >> 7 == 1 {
        thumb_alu_imm8::<C>
    } else if i >> 7 == 0 {
        thumb_shift_imm::<C>
    } else if i >> 4 == 0x10 {
        thumb_dp_reg::<C>
    } else if i >> 6 == 0xA {
        thumb_add_pc_sp::<C>
    } else if i >> 2 == 0xB0 {
        thumb_adjust_sp::<C>
    } else if i >> 4 == 0x11 {
        thumb_hi_reg_op::<C>
    } else if i >> 7 == 0x3 || i >> 6 == 0x8 {
        thumb_load_store_imm::<C>
    } else if i >> 6 == 0x5 {
        thumb_load_store_reg::<C>
    } else if i >> 5 == 0x9 {
        thumb_load_pc_relative::<C>
    } else if i >> 6 == 0x9 {
        thumb_load_store_sp_relative::<C>
    } else if i >> 6 == 0xC {
        thumb_ldm_stm::<C>
    } else if (i & 0x3D8) == 0x2D0 {
        thumb_push_pop::<C>
    } else {
        thumb_undefined::<C>
    }
}

const fn build_table<C: Core>() -> [ThumbFn; 1024] {
    let mut table = [thumb_undefined::<C> as ThumbFn; 1024];
    let mut i = 0;
    while i < 1024 {
        table[i] = decode::<C>(i as u16);
        i += 1;
    }
    table
}

static ARM9_TABLE: [ThumbFn; 1024] = build_table::<crate::cpu::arm9::Arm9>();
static ARM7_TABLE: [ThumbFn; 1024] = build_table::<crate::cpu::arm7::Arm7>();

#[inline]
pub(super) fn table<C: Core>() -> &'static [ThumbFn; 1024] {
    if C::IS_ARM9 {
        &ARM9_TABLE
    } else {
        &ARM7_TABLE
    }
}
