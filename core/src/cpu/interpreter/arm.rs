use super::{
    alu, handle_swi, handle_undefined, jump_arm, jump_cpsr, jump_interworking, jump_thumb,
    set_cpsr, ArmFn,
};
use crate::{
    cpu::{arm9::Arm9, ldrh, ldrsh, psr::Psr, Core},
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

fn arm_undefined<C: Core>(emu: &mut Emu, _instr: u32) {
    handle_undefined::<C>(emu);
}

fn arm_swi<C: Core>(emu: &mut Emu, _instr: u32) {
    handle_swi::<C>(emu);
}

fn arm_bkpt<C: Core>(emu: &mut Emu, _instr: u32) {
    // Treated as an undefined instruction; no debug unit is attached
    handle_undefined::<C>(emu);
}

fn arm_b<C: Core>(emu: &mut Emu, instr: u32) {
    let offset = (((instr << 8) as i32) >> 6) as u32;
    let state = C::state_mut(emu);
    if instr & 1 << 24 != 0 {
        state.regs.gpr[14] = state.regs.gpr[15].wrapping_sub(4);
    }
    let target = C::state(emu).regs.gpr[15].wrapping_add(offset);
    C::add_code_cycles(emu, 0);
    jump_arm::<C>(emu, target);
}

fn arm_bx<C: Core>(emu: &mut Emu, instr: u32) {
    let addr = reg::<C>(emu, instr);
    C::add_code_cycles(emu, 0);
    jump_interworking::<C>(emu, addr);
}

fn arm_blx2<C: Core>(emu: &mut Emu, instr: u32) {
    if !C::IS_ARM9 {
        return arm_undefined::<C>(emu, instr);
    }
    let addr = reg::<C>(emu, instr);
    let state = C::state_mut(emu);
    state.regs.gpr[14] = state.regs.gpr[15].wrapping_sub(4);
    C::add_code_cycles(emu, 0);
    jump_interworking::<C>(emu, addr);
}

fn arm_alu<C: Core>(emu: &mut Emu, instr: u32) {
    let cpsr = C::state(emu).regs.cpsr;
    let carry_in = cpsr.carry();
    let set_flags = instr & 1 << 20 != 0;
    let op = instr >> 21 & 0xF;

    let mut internal = 0;
    let (operand, shifter_carry) = if instr & 1 << 25 != 0 {
        let imm = instr & 0xFF;
        let rotate = instr >> 7 & 0x1E;
        let operand = imm.rotate_right(rotate);
        (
            operand,
            if rotate == 0 { carry_in } else { operand >> 31 != 0 },
        )
    } else if instr & 1 << 4 == 0 {
        let rm = reg::<C>(emu, instr);
        let amount = instr >> 7 & 0x1F;
        alu::shift_imm(instr >> 5 & 3, rm, amount, carry_in)
    } else {
        internal = 1;
        let rm_i = instr & 0xF;
        let mut rm = reg::<C>(emu, rm_i);
        if rm_i == 15 {
            rm = rm.wrapping_add(4);
        }
        let amount = reg::<C>(emu, instr >> 8) & 0xFF;
        match instr >> 5 & 3 {
            0 => alu::lsl_reg(rm, amount, carry_in),
            1 => alu::lsr_reg(rm, amount, carry_in),
            2 => alu::asr_reg(rm, amount, carry_in),
            _ => alu::ror_reg(rm, amount, carry_in),
        }
    };

    let rn_i = instr >> 16 & 0xF;
    let mut rn = reg::<C>(emu, rn_i);
    if rn_i == 15 && instr & (1 << 25) == 0 && instr & 1 << 4 != 0 {
        rn = rn.wrapping_add(4);
    }
    let rd = instr >> 12 & 0xF;

    let mut carry = shifter_carry;
    let mut overflow = cpsr.overflow();
    let result = match op {
        0x0 | 0x8 => rn & operand,
        0x1 | 0x9 => rn ^ operand,
        0x2 | 0xA => {
            let r = rn.wrapping_sub(operand);
            (carry, overflow) = alu::sub_flags(rn, operand, r);
            r
        }
        0x3 => {
            let r = operand.wrapping_sub(rn);
            (carry, overflow) = alu::sub_flags(operand, rn, r);
            r
        }
        0x4 | 0xB => {
            let r = rn.wrapping_add(operand);
            (carry, overflow) = alu::add_flags(rn, operand, r);
            r
        }
        0x5 => {
            let r64 = rn as u64 + operand as u64 + carry_in as u64;
            let r = r64 as u32;
            (carry, overflow) = alu::adc_flags(rn, operand, r, r64);
            r
        }
        0x6 => {
            let r64 = rn as i64 - operand as i64 - !carry_in as i64;
            let r = r64 as u32;
            (carry, overflow) = alu::sbc_flags(rn, operand, r, r64);
            r
        }
        0x7 => {
            let r64 = operand as i64 - rn as i64 - !carry_in as i64;
            let r = r64 as u32;
            (carry, overflow) = alu::sbc_flags(operand, rn, r, r64);
            r
        }
        0xC => rn | operand,
        0xD => operand,
        0xE => rn & !operand,
        _ => !operand,
    };

    C::add_code_cycles(emu, internal);

    let is_test = (0x8..=0xB).contains(&op);
    if is_test {
        if set_flags && rd == 15 {
            let spsr = C::state(emu).regs.spsr;
            set_cpsr::<C>(emu, spsr);
            return;
        }
    } else if set_flags && rd == 15 {
        jump_cpsr::<C>(emu, result);
        return;
    } else if rd == 15 {
        jump_arm::<C>(emu, result & !3);
        return;
    } else {
        set_reg::<C>(emu, rd, result);
    }

    if set_flags {
        let cpsr = &mut C::state_mut(emu).regs.cpsr;
        match op {
            0x2 | 0x3 | 0x4 | 0x5 | 0x6 | 0x7 | 0xA | 0xB => {
                alu::set_nzcv(cpsr, result, carry, overflow);
            }
            _ => alu::set_nzc(cpsr, result, carry),
        }
    }
}

fn arm_multiply<C: Core>(emu: &mut Emu, instr: u32) {
    let accumulate = instr & 1 << 21 != 0;
    let set_flags = instr & 1 << 20 != 0;
    let rs = reg::<C>(emu, instr >> 8);
    let mut result = reg::<C>(emu, instr).wrapping_mul(rs);
    if accumulate {
        result = result.wrapping_add(reg::<C>(emu, instr >> 12));
    }
    set_reg::<C>(emu, instr >> 16, result);
    if set_flags {
        alu::set_nz(&mut C::state_mut(emu).regs.cpsr, result);
    }
    let internal = C::mul_cycles(emu, rs, false, accumulate, set_flags);
    C::add_code_cycles(emu, internal);
}

fn arm_multiply_long<C: Core>(emu: &mut Emu, instr: u32) {
    let signed = instr & 1 << 22 != 0;
    let accumulate = instr & 1 << 21 != 0;
    let set_flags = instr & 1 << 20 != 0;
    let rd_hi = instr >> 16 & 0xF;
    let rd_lo = instr >> 12 & 0xF;
    let rs = reg::<C>(emu, instr >> 8);
    let rm = reg::<C>(emu, instr);

    let mut result = if signed {
        (rm as i32 as i64).wrapping_mul(rs as i32 as i64) as u64
    } else {
        (rm as u64).wrapping_mul(rs as u64)
    };
    if accumulate {
        result = result
            .wrapping_add((reg::<C>(emu, rd_hi) as u64) << 32 | reg::<C>(emu, rd_lo) as u64);
    }
    set_reg::<C>(emu, rd_hi, (result >> 32) as u32);
    set_reg::<C>(emu, rd_lo, result as u32);
    if set_flags {
        alu::set_nz_64(&mut C::state_mut(emu).regs.cpsr, result);
    }
    let op = if signed && rs >> 31 != 0 { !rs } else { rs };
    let internal = C::mul_cycles(emu, op, true, accumulate, set_flags);
    C::add_code_cycles(emu, internal);
}

fn arm_clz<C: Core>(emu: &mut Emu, instr: u32) {
    if !C::IS_ARM9 {
        return arm_undefined::<C>(emu, instr);
    }
    let value = reg::<C>(emu, instr);
    set_reg::<C>(emu, instr >> 12, value.leading_zeros());
    C::add_code_cycles(emu, 0);
}

fn arm_sat_add_sub<C: Core>(emu: &mut Emu, instr: u32) {
    if !C::IS_ARM9 {
        return arm_undefined::<C>(emu, instr);
    }
    let rn = reg::<C>(emu, instr >> 16);
    let rm = reg::<C>(emu, instr);
    let cpsr = &mut C::state_mut(emu).regs.cpsr;
    let result = match instr >> 21 & 3 {
        0 => alu::saturating_add(cpsr, rm, rn),
        1 => alu::saturating_sub(cpsr, rm, rn),
        2 => {
            let doubled = alu::saturating_add(cpsr, rn, rn);
            alu::saturating_add(cpsr, rm, doubled)
        }
        _ => {
            let doubled = alu::saturating_add(cpsr, rn, rn);
            alu::saturating_sub(cpsr, rm, doubled)
        }
    };
    set_reg::<C>(emu, instr >> 12, result);
    C::add_code_cycles(emu, 0);
}

fn arm_dsp_multiply<C: Core>(emu: &mut Emu, instr: u32) {
    if !C::IS_ARM9 {
        // The ARM7 executes these as a no-op
        C::add_code_cycles(emu, 0);
        return;
    }
    let rd = instr >> 16 & 0xF;
    let rn = instr >> 12 & 0xF;
    let rm_value = reg::<C>(emu, instr);
    let rs_value = reg::<C>(emu, instr >> 8);
    let x_top = instr & 1 << 5 != 0;
    let y_top = instr & 1 << 6 != 0;

    let a = if x_top {
        (rm_value as i32) >> 16
    } else {
        rm_value as i16 as i32
    };
    let b = if y_top {
        (rs_value as i32) >> 16
    } else {
        rs_value as i16 as i32
    };

    let mut internal = 0;
    match instr >> 21 & 3 {
        0 => {
            let acc = reg::<C>(emu, rn);
            let product = a.wrapping_mul(b) as u32;
            let cpsr = &mut C::state_mut(emu).regs.cpsr;
            let result = alu::sticky_add(cpsr, product, acc);
            set_reg::<C>(emu, rd, result);
        }
        1 => {
            let product = ((rm_value as i32 as i64).wrapping_mul(b as i64) >> 16) as u32;
            if x_top {
                set_reg::<C>(emu, rd, product);
            } else {
                let acc = reg::<C>(emu, rn);
                let cpsr = &mut C::state_mut(emu).regs.cpsr;
                let result = alu::sticky_add(cpsr, product, acc);
                set_reg::<C>(emu, rd, result);
            }
        }
        2 => {
            internal = 1;
            let product = a.wrapping_mul(b) as i64 as u64;
            let acc = (reg::<C>(emu, rd) as u64) << 32 | reg::<C>(emu, rn) as u64;
            let result = product.wrapping_add(acc);
            set_reg::<C>(emu, rd, (result >> 32) as u32);
            set_reg::<C>(emu, rn, result as u32);
        }
        _ => {
            set_reg::<C>(emu, rd, a.wrapping_mul(b) as u32);
        }
    }
    C::add_code_cycles(emu, internal);
}

fn arm_mrs<C: Core>(emu: &mut Emu, instr: u32) {
    let value = if instr & 1 << 22 != 0 {
        C::state(emu).regs.spsr.raw()
    } else {
        C::state(emu).regs.cpsr.raw()
    };
    set_reg::<C>(emu, instr >> 12, value);
    C::add_code_cycles(emu, 0);
}

fn arm_msr<C: Core>(emu: &mut Emu, instr: u32) {
    let operand = if instr & 1 << 25 != 0 {
        (instr & 0xFF).rotate_right(instr >> 7 & 0x1E)
    } else {
        reg::<C>(emu, instr)
    };

    let field_mask = instr >> 16 & 0xF;
    let mut write_mask = 0u32;
    for i in 0..4 {
        if field_mask & 1 << i != 0 {
            write_mask |= 0xFF << (8 * i);
        }
    }

    C::add_code_cycles(emu, 0);

    if instr & 1 << 22 == 0 {
        if !C::state(emu).regs.is_in_priv_mode() {
            write_mask &= 0xFF00_0000;
        }
        let new = Psr::from_raw(
            (C::state(emu).regs.cpsr.raw() & !write_mask) | (operand & write_mask),
        );
        set_cpsr::<C>(emu, new);
    } else if C::state(emu).regs.has_spsr() {
        let regs = &mut C::state_mut(emu).regs;
        regs.spsr = Psr::from_raw((regs.spsr.raw() & !write_mask) | (operand & write_mask));
    }
}

fn arm_swap<C: Core>(emu: &mut Emu, instr: u32) {
    let addr = reg::<C>(emu, instr >> 16);
    let src = reg::<C>(emu, instr);
    if instr & 1 << 22 != 0 {
        let loaded = C::load::<u8, false>(emu, addr);
        let load_cycles = C::state(emu).data_cycles;
        C::store::<u8, false>(emu, addr, src as u8);
        C::state_mut(emu).data_cycles += load_cycles;
        set_reg::<C>(emu, instr >> 12, loaded as u32);
    } else {
        let loaded = C::load::<u32, false>(emu, addr & !3).rotate_right((addr & 3) << 3);
        let load_cycles = C::state(emu).data_cycles;
        C::store::<u32, false>(emu, addr & !3, src);
        C::state_mut(emu).data_cycles += load_cycles;
        set_reg::<C>(emu, instr >> 12, loaded);
    }
    C::add_str_cycles(emu, 1);
}

/// LDRH/STRH/LDRSB/LDRSH and the ARMv5 LDRD/STRD.
fn arm_misc_dt<C: Core>(emu: &mut Emu, instr: u32) {
    let pre = instr & 1 << 24 != 0;
    let up = instr & 1 << 23 != 0;
    let imm = instr & 1 << 22 != 0;
    let writeback_bit = instr & 1 << 21 != 0;
    let load = instr & 1 << 20 != 0;
    let signed = instr & 1 << 6 != 0;
    let half = instr & 1 << 5 != 0;

    let rn = instr >> 16 & 0xF;
    let mut rd = instr >> 12 & 0xF;

    let mut offset = if imm {
        (instr >> 4 & 0xF0) | (instr & 0xF)
    } else {
        reg::<C>(emu, instr)
    };
    if !up {
        offset = offset.wrapping_neg();
    }
    let base = reg::<C>(emu, rn);
    let addr = if pre { base.wrapping_add(offset) } else { base };
    let writeback = (writeback_bit || !pre) && rn != 15;

    if load {
        if writeback {
            set_reg::<C>(emu, rn, base.wrapping_add(offset));
        }
        let value = match (signed, half) {
            (false, true) => ldrh::<C>(emu, addr),
            (true, false) => C::load::<u8, false>(emu, addr) as i8 as u32,
            (true, true) => ldrsh::<C>(emu, addr),
            (false, false) => unreachable!(),
        };
        C::add_ldr_cycles(emu);
        if rd == 15 {
            jump_arm::<C>(emu, value & !3);
        } else {
            set_reg::<C>(emu, rd, value);
        }
    } else if !signed && half {
        let mut value = reg::<C>(emu, rd);
        if rd == 15 {
            value = value.wrapping_add(4);
        }
        C::store::<u16, false>(emu, addr & !1, value as u16);
        if writeback {
            set_reg::<C>(emu, rn, base.wrapping_add(offset));
        }
        C::add_str_cycles(emu, 0);
    } else if signed && !half {
        // LDRD
        if writeback {
            set_reg::<C>(emu, rn, base.wrapping_add(offset));
        }
        if C::IS_ARM9 {
            rd &= !1;
            let lo = C::load::<u32, false>(emu, addr & !3);
            let hi = C::load::<u32, true>(emu, (addr & !3).wrapping_add(4));
            set_reg::<C>(emu, rd, lo);
            C::add_ldr_cycles(emu);
            if rd + 1 == 15 {
                jump_arm::<C>(emu, hi & !3);
            } else {
                set_reg::<C>(emu, rd + 1, hi);
            }
        } else {
            C::add_code_cycles(emu, 0);
        }
    } else {
        // STRD
        if !C::IS_ARM9 {
            C::add_code_cycles(emu, 0);
            return;
        }
        rd &= !1;
        C::store::<u32, false>(emu, addr & !3, reg::<C>(emu, rd));
        let mut hi = reg::<C>(emu, rd + 1);
        if rd + 1 == 15 {
            hi = hi.wrapping_add(4);
        }
        C::store::<u32, true>(emu, (addr & !3).wrapping_add(4), hi);
        if writeback {
            set_reg::<C>(emu, rn, base.wrapping_add(offset));
        }
        C::add_str_cycles(emu, 0);
    }
}

/// LDR/STR/LDRB/STRB with immediate or scaled-register offsets.
fn arm_sdt<C: Core>(emu: &mut Emu, instr: u32) {
    let reg_offset = instr & 1 << 25 != 0;
    let pre = instr & 1 << 24 != 0;
    let up = instr & 1 << 23 != 0;
    let byte = instr & 1 << 22 != 0;
    let writeback_bit = instr & 1 << 21 != 0;
    let load = instr & 1 << 20 != 0;

    let rn = instr >> 16 & 0xF;
    let rd = instr >> 12 & 0xF;

    let mut offset = if reg_offset {
        let rm = reg::<C>(emu, instr);
        let carry = C::state(emu).regs.cpsr.carry();
        alu::shift_offset(instr >> 5 & 3, rm, instr >> 7 & 0x1F, carry)
    } else {
        instr & 0xFFF
    };
    if !up {
        offset = offset.wrapping_neg();
    }

    let base = reg::<C>(emu, rn);
    let addr = if pre { base.wrapping_add(offset) } else { base };
    let writeback = (writeback_bit || !pre) && rn != 15;

    if load {
        if writeback {
            set_reg::<C>(emu, rn, base.wrapping_add(offset));
        }
        let value = if byte {
            C::load::<u8, false>(emu, addr) as u32
        } else {
            C::load::<u32, false>(emu, addr & !3).rotate_right((addr & 3) << 3)
        };
        C::add_ldr_cycles(emu);
        if rd == 15 {
            if C::IS_ARM9 {
                jump_interworking::<C>(emu, value);
            } else {
                jump_arm::<C>(emu, value & !3);
            }
        } else {
            set_reg::<C>(emu, rd, value);
        }
    } else {
        let mut value = reg::<C>(emu, rd);
        if rd == 15 {
            value = value.wrapping_add(4);
        }
        if byte {
            C::store::<u8, false>(emu, addr, value as u8);
        } else {
            C::store::<u32, false>(emu, addr & !3, value);
        }
        if writeback {
            set_reg::<C>(emu, rn, base.wrapping_add(offset));
        }
        C::add_str_cycles(emu, 0);
    }
}

fn arm_block_dt<C: Core>(emu: &mut Emu, instr: u32) {
    let pre = instr & 1 << 24 != 0;
    let up = instr & 1 << 23 != 0;
    let user_bank = instr & 1 << 22 != 0;
    let writeback_bit = instr & 1 << 21 != 0;
    let load = instr & 1 << 20 != 0;

    let rn = instr >> 16 & 0xF;
    let register_list = instr as u16;
    let offset = if register_list == 0 {
        0x40
    } else {
        4 * register_list.count_ones()
    };

    let base = reg::<C>(emu, rn);
    let (mut addr, writeback_value) = match (pre, up) {
        (false, true) => (base, base.wrapping_add(offset)),
        (true, true) => (base.wrapping_add(4), base.wrapping_add(offset)),
        (false, false) => (
            base.wrapping_sub(offset).wrapping_add(4),
            base.wrapping_sub(offset),
        ),
        (true, false) => (base.wrapping_sub(offset), base.wrapping_sub(offset)),
    };
    addr &= !3;
    let writeback = writeback_bit && rn != 15;

    let mode = C::state(emu).regs.mode();
    let in_user_or_sys = matches!(
        mode,
        crate::cpu::psr::Mode::User | crate::cpu::psr::Mode::System
    );
    let in_fiq = mode == crate::cpu::psr::Mode::Fiq;

    macro_rules! transfer {
        (load $i: expr, $seq: expr) => {
            if $seq {
                C::load::<u32, true>(emu, addr)
            } else {
                C::load::<u32, false>(emu, addr)
            }
        };
        (store $i: expr, $seq: expr, $value: expr) => {
            if $seq {
                C::store::<u32, true>(emu, addr, $value);
            } else {
                C::store::<u32, false>(emu, addr, $value);
            }
        };
    }

    if load {
        let mut seq = false;
        let mut cpsr_written = false;
        let load_user_bank = user_bank && register_list & 1 << 15 == 0;

        for i in 0..15u32 {
            if register_list & 1 << i == 0 {
                continue;
            }
            let value = transfer!(load i, seq);
            seq = true;
            addr = addr.wrapping_add(4);
            let regs = &mut C::state_mut(emu).regs;
            if load_user_bank && !in_user_or_sys && (8..15).contains(&i) {
                if i >= 13 || in_fiq {
                    if in_fiq && i < 13 {
                        regs.r8_12_other[i as usize - 8] = value;
                    } else {
                        regs.r13_14_sys[i as usize - 13] = value;
                    }
                } else {
                    regs.gpr[i as usize] = value;
                }
            } else {
                regs.gpr[i as usize] = value;
            }
        }

        let mut jump_target = None;
        if register_list & 1 << 15 != 0 {
            jump_target = Some(transfer!(load 15, seq));
            // LDM with PC and the S bit restores the SPSR
            cpsr_written = user_bank;
        } else if !C::IS_ARM9 && register_list == 0 {
            jump_target = Some(transfer!(load 15, false));
        }

        C::add_ldr_cycles(emu);

        if writeback {
            let in_list = register_list & 1 << rn != 0;
            let do_writeback = if in_list {
                let only = register_list == 1 << rn;
                let last = register_list >> rn == 1;
                C::IS_ARM9 && (only || !last)
            } else {
                true
            };
            if do_writeback {
                // Writeback targets the pre-restore register bank
                set_reg::<C>(emu, rn, writeback_value);
            }
        }

        if let Some(target) = jump_target {
            if cpsr_written {
                let spsr = C::state(emu).regs.spsr;
                set_cpsr::<C>(emu, spsr);
                if spsr.thumb_state() {
                    jump_thumb::<C>(emu, target & !1);
                } else {
                    jump_arm::<C>(emu, target & !3);
                }
            } else if C::IS_ARM9 {
                jump_interworking::<C>(emu, target);
            } else {
                jump_arm::<C>(emu, target & !3);
            }
        }
    } else {
        if writeback {
            // ARMv4 stores the updated base unless Rn is the first listed
            // register; ARMv5 always stores the old base
            let in_list = register_list & 1 << rn != 0;
            let not_first = register_list & ((1 << rn) - 1) != 0;
            if in_list && !C::IS_ARM9 && not_first {
                set_reg::<C>(emu, rn, writeback_value);
            }
        }

        let mut seq = false;
        for i in 0..15u32 {
            if register_list & 1 << i == 0 {
                continue;
            }
            let value = {
                let regs = &C::state(emu).regs;
                if user_bank && !in_user_or_sys && (8..15).contains(&i) {
                    if in_fiq && i < 13 {
                        regs.r8_12_other[i as usize - 8]
                    } else if i >= 13 {
                        regs.r13_14_sys[i as usize - 13]
                    } else {
                        regs.gpr[i as usize]
                    }
                } else {
                    regs.gpr[i as usize]
                }
            };
            transfer!(store i, seq, value);
            seq = true;
            addr = addr.wrapping_add(4);
        }
        if register_list & 1 << 15 != 0 || (!C::IS_ARM9 && register_list == 0) {
            let value = reg::<C>(emu, 15).wrapping_add(4);
            transfer!(store 15, seq, value);
        }

        C::add_str_cycles(emu, 0);

        if writeback {
            set_reg::<C>(emu, rn, writeback_value);
        }
    }
}

fn arm_cop_reg<C: Core>(emu: &mut Emu, instr: u32) {
    let cp_num = instr >> 8 & 0xF;
    let op1 = instr >> 21 & 7;
    let rd = instr >> 12 & 0xF;
    let reg_id = ((instr >> 8 & 0xF00) | (instr << 4 & 0xF0) | (instr >> 5 & 7)) as u16;

    if instr & 1 << 20 == 0 {
        // MCR
        if !C::IS_ARM9 {
            C::add_code_cycles(emu, 0);
            return;
        }
        if cp_num != 15 || op1 != 0 {
            return arm_undefined::<C>(emu, instr);
        }
        let mut value = reg::<C>(emu, rd);
        if rd == 15 {
            value = value.wrapping_add(4);
        }
        C::add_code_cycles(emu, 0);
        Arm9::cp15_write(emu, reg_id, value);
    } else {
        // MRC
        let value = if C::IS_ARM9 {
            if cp_num != 15 || op1 != 0 {
                return arm_undefined::<C>(emu, instr);
            }
            Arm9::cp15_read(emu, reg_id)
        } else if cp_num == 14 {
            // Debug ID: reads back the prefetched opcode
            C::state(emu).pipeline[1]
        } else {
            return arm_undefined::<C>(emu, instr);
        };
        C::add_code_cycles(emu, 0);
        if rd == 15 {
            C::state_mut(emu).regs.cpsr.copy_nzcv(value);
        } else {
            set_reg::<C>(emu, rd, value);
        }
    }
}

/// Classification of the 12-bit decode key (instruction bits 27-20 and
/// 7-4), evaluated at compile time to fill the dispatch tables.
const fn decode<C: Core>(key: u16) -> ArmFn {
    let i = key as u32;
    if (i & 0xFB0) == 0x300 || (i & 0xE01) == 0x601 {
        arm_undefined::<C>
    } else if (i & 0xE00) == 0xA00 {
        arm_b::<C>
    } else if i == 0x123 {
        arm_blx2::<C>
    } else if i == 0x121 {
        arm_bx::<C>
    } else if (i & 0xFCF) == 0x009 {
        arm_multiply::<C>
    } else if (i & 0xF8F) == 0x089 {
        arm_multiply_long::<C>
    } else if i == 0x161 {
        arm_clz::<C>
    } else if (i & 0xFBF) == 0x100 {
        arm_mrs::<C>
    } else if (i & 0xFB0) == 0x320 || (i & 0xFBF) == 0x120 {
        arm_msr::<C>
    } else if (i & 0xF00) == 0xF00 {
        arm_swi::<C>
    } else if i == 0x127 {
        arm_bkpt::<C>
    } else if (i & 0xF9F) == 0x105 {
        arm_sat_add_sub::<C>
    } else if (i & 0xF99) == 0x108 {
        arm_dsp_multiply::<C>
    } else if (i & 0xFBF) == 0x109 {
        arm_swap::<C>
    } else if (i & 0xE09) == 0x009 && (i & 0xF) != 0x9 {
        arm_misc_dt::<C>
    } else if i >> 10 == 0x1 {
        arm_sdt::<C>
    } else if i >> 9 == 0x4 {
        arm_block_dt::<C>
    } else if (i & 0xE10) == 0xC10 || (i & 0xE10) == 0xC00 || (i & 0xF01) == 0xE00 {
        // LDC/STC/CDP: no coprocessor listens on these
        arm_undefined::<C>
    } else if (i & 0xF01) == 0xE01 {
        arm_cop_reg::<C>
    } else if (i & 0xE00) == 0x200 || (i & 0xE01) == 0x0 || (i & 0xE09) == 0x1 {
        arm_alu::<C>
    } else {
        arm_undefined::<C>
    }
}

const fn build_table<C: Core>() -> [ArmFn; 4096] {
    let mut table = [arm_undefined::<C> as ArmFn; 4096];
    let mut i = 0;
    while i < 4096 {
        table[i] = decode::<C>(i as u16);
        i += 1;
    }
    table
}

static ARM9_TABLE: [ArmFn; 4096] = build_table::<Arm9>();
static ARM7_TABLE: [ArmFn; 4096] = build_table::<crate::cpu::arm7::Arm7>();

#[inline]
pub(super) fn table<C: Core>() -> &'static [ArmFn; 4096] {
    if C::IS_ARM9 {
        &ARM9_TABLE
    } else {
        &ARM7_TABLE
    }
}
