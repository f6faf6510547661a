use super::psr::{Bank, Mode, Psr};

/// Architectural register file with the banked copies for each mode.
///
/// `gpr` always holds the registers of the current mode; switching modes
/// swaps the affected range with the banked arrays. `spsr` is the banked
/// SPSR view of the current mode (meaningless in USR/SYS).
#[derive(Clone, Debug)]
pub struct Regs {
    pub gpr: [u32; 16],
    pub cpsr: Psr,
    pub spsr: Psr,
    pub r8_14_fiq: [u32; 7],
    pub r8_12_other: [u32; 5],
    pub r13_14_sys: [u32; 2],
    pub r13_14_irq: [u32; 2],
    pub r13_14_svc: [u32; 2],
    pub r13_14_abt: [u32; 2],
    pub r13_14_und: [u32; 2],
    pub spsr_fiq: Psr,
    pub spsr_irq: Psr,
    pub spsr_svc: Psr,
    pub spsr_abt: Psr,
    pub spsr_und: Psr,
}

impl Regs {
    pub const STARTUP: Self = Regs {
        gpr: [0; 16],
        cpsr: Psr::from_raw(0xD3),
        spsr: Psr::from_raw(0x10),
        r8_14_fiq: [0; 7],
        r8_12_other: [0; 5],
        r13_14_sys: [0; 2],
        r13_14_irq: [0; 2],
        r13_14_svc: [0; 2],
        r13_14_abt: [0; 2],
        r13_14_und: [0; 2],
        spsr_fiq: Psr::from_raw(0x10),
        spsr_irq: Psr::from_raw(0x10),
        spsr_svc: Psr::from_raw(0x10),
        spsr_abt: Psr::from_raw(0x10),
        spsr_und: Psr::from_raw(0x10),
    };

    #[inline]
    pub fn pc(&self) -> u32 {
        self.gpr[15]
    }

    #[inline]
    pub fn mode(&self) -> Mode {
        self.cpsr.mode()
    }

    #[inline]
    pub fn is_in_priv_mode(&self) -> bool {
        self.mode().is_privileged()
    }

    #[inline]
    pub fn has_spsr(&self) -> bool {
        self.mode().has_spsr()
    }

    /// Banked r13/r14 of `bank`, readable regardless of the current mode
    /// (used by direct boot and LDM/STM with user-bank transfer).
    pub fn banked_r13_14(&mut self, bank: Bank) -> &mut [u32; 2] {
        match bank {
            Bank::System => &mut self.r13_14_sys,
            Bank::Irq => &mut self.r13_14_irq,
            Bank::Supervisor => &mut self.r13_14_svc,
            Bank::Abort => &mut self.r13_14_abt,
            Bank::Undefined => &mut self.r13_14_und,
            Bank::Fiq => (&mut self.r8_14_fiq[5..7]).try_into().unwrap(),
        }
    }

    pub fn switch_mode(&mut self, prev_mode: Mode, new_mode: Mode) {
        if new_mode == prev_mode {
            return;
        }

        let prev_bank = prev_mode.reg_bank();
        let new_bank = new_mode.reg_bank();
        if prev_bank != new_bank {
            match prev_bank {
                Bank::System => {
                    self.r13_14_sys.copy_from_slice(&self.gpr[13..15]);
                }
                Bank::Fiq => {
                    self.r8_14_fiq.copy_from_slice(&self.gpr[8..15]);
                    self.gpr[8..13].copy_from_slice(&self.r8_12_other);
                }
                Bank::Irq => {
                    self.r13_14_irq.copy_from_slice(&self.gpr[13..15]);
                }
                Bank::Supervisor => {
                    self.r13_14_svc.copy_from_slice(&self.gpr[13..15]);
                }
                Bank::Abort => {
                    self.r13_14_abt.copy_from_slice(&self.gpr[13..15]);
                }
                Bank::Undefined => {
                    self.r13_14_und.copy_from_slice(&self.gpr[13..15]);
                }
            }
            match new_bank {
                Bank::System => {
                    self.gpr[13..15].copy_from_slice(&self.r13_14_sys);
                }
                Bank::Fiq => {
                    self.r8_12_other.copy_from_slice(&self.gpr[8..13]);
                    self.gpr[8..15].copy_from_slice(&self.r8_14_fiq);
                }
                Bank::Irq => {
                    self.gpr[13..15].copy_from_slice(&self.r13_14_irq);
                }
                Bank::Supervisor => {
                    self.gpr[13..15].copy_from_slice(&self.r13_14_svc);
                }
                Bank::Abort => {
                    self.gpr[13..15].copy_from_slice(&self.r13_14_abt);
                }
                Bank::Undefined => {
                    self.gpr[13..15].copy_from_slice(&self.r13_14_und);
                }
            }
        }

        let save_spsr = |regs: &mut Regs, mode: Mode| match mode {
            Mode::Fiq => regs.spsr_fiq = regs.spsr,
            Mode::Irq => regs.spsr_irq = regs.spsr,
            Mode::Supervisor => regs.spsr_svc = regs.spsr,
            Mode::Abort => regs.spsr_abt = regs.spsr,
            Mode::Undefined => regs.spsr_und = regs.spsr,
            Mode::User | Mode::System => {}
        };
        save_spsr(self, prev_mode);
        self.spsr = match new_mode {
            Mode::Fiq => self.spsr_fiq,
            Mode::Irq => self.spsr_irq,
            Mode::Supervisor => self.spsr_svc,
            Mode::Abort => self.spsr_abt,
            Mode::Undefined => self.spsr_und,
            Mode::User | Mode::System => self.spsr,
        };
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fiq_banking_round_trip() {
        let mut regs = Regs::STARTUP;
        regs.cpsr.set_mode(Mode::System);
        for i in 0..16 {
            regs.gpr[i] = i as u32;
        }
        regs.switch_mode(Mode::System, Mode::Fiq);
        for i in 8..15 {
            regs.gpr[i] = 0x100 + i as u32;
        }
        regs.switch_mode(Mode::Fiq, Mode::System);
        for i in 0..16 {
            assert_eq!(regs.gpr[i], i as u32);
        }
        regs.switch_mode(Mode::System, Mode::Fiq);
        for i in 8..15 {
            assert_eq!(regs.gpr[i], 0x100 + i as u32);
        }
    }

    #[test]
    fn irq_bank_keeps_low_regs() {
        let mut regs = Regs::STARTUP;
        regs.cpsr.set_mode(Mode::System);
        regs.gpr[13] = 0xAAAA;
        regs.gpr[14] = 0xBBBB;
        regs.switch_mode(Mode::System, Mode::Irq);
        regs.gpr[13] = 0x1111;
        regs.gpr[14] = 0x2222;
        regs.switch_mode(Mode::Irq, Mode::System);
        assert_eq!(regs.gpr[13], 0xAAAA);
        assert_eq!(regs.gpr[14], 0xBBBB);
        regs.switch_mode(Mode::System, Mode::Irq);
        assert_eq!(regs.gpr[13], 0x1111);
        assert_eq!(regs.gpr[14], 0x2222);
    }
}
