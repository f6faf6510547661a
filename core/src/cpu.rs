pub mod arm7;
pub mod arm9;
pub mod dma;
pub(crate) mod interpreter;
pub mod irqs;
pub mod psr;
pub mod regs;
pub mod timers;

use crate::{emu::Emu, utils::MemValue};
use irqs::Irqs;
use regs::Regs;

pub type RawTimestamp = u64;

/// Halt mask bits shared by both CPUs.
pub mod halt {
    pub const HALT: u32 = 1;
    pub const STOP: u32 = 1 << 30;
    pub const GX_FIFO: u32 = 1 << 31;
}

/// Per-region access costs, indexed N/S × 32/16-bit. Byte accesses share the
/// 16-bit column.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct AccessTimings {
    pub n32: u8,
    pub s32: u8,
    pub n16: u8,
    pub s16: u8,
}

impl AccessTimings {
    pub const fn splat(value: u8) -> Self {
        AccessTimings {
            n32: value,
            s32: value,
            n16: value,
            s16: value,
        }
    }
}

/// Architectural state common to both cores; the per-core structs wrap this
/// together with their private memories and coprocessors.
pub struct CoreState {
    pub regs: Regs,
    pub pipeline: [u32; 2],
    pub exception_base: u32,
    pub irqs: Irqs,
    /// Current clock, in doubled units on the ARM9.
    pub cycles: RawTimestamp,
    pub target_cycles: RawTimestamp,
    pub code_cycles: u8,
    pub data_cycles: u8,
    pub post_flag: u8,
}

impl CoreState {
    pub(crate) fn new() -> Self {
        CoreState {
            regs: Regs::STARTUP,
            pipeline: [0; 2],
            exception_base: 0,
            irqs: Irqs::new(),
            cycles: 0,
            target_cycles: 0,
            code_cycles: 1,
            data_cycles: 1,
            post_flag: 0,
        }
    }

    #[inline]
    pub fn is_halted(&self) -> bool {
        self.irqs.halted != 0
    }

    #[inline]
    pub fn is_stopped(&self) -> bool {
        self.irqs.halted & (halt::STOP | halt::GX_FIFO) != 0
    }
}

/// Compile-time selector for one of the two cores: everything the shared
/// interpreter needs to fetch, load, store and charge time on behalf of a
/// specific CPU. Implemented by [`arm9::Arm9`] and [`arm7::Arm7`], which act
/// as zero-cost tags (all methods are statics over the whole machine).
pub trait Core {
    const IS_ARM9: bool;

    fn state(emu: &Emu) -> &CoreState;
    fn state_mut(emu: &mut Emu) -> &mut CoreState;
    fn dma(emu: &mut Emu) -> &mut dma::Controller;
    fn timers(emu: &mut Emu) -> &mut timers::Timers;

    /// Untimed bus access on behalf of the DMA engine and debug paths.
    fn bus_read<T: MemValue>(emu: &mut Emu, addr: u32) -> T;
    fn bus_write<T: MemValue>(emu: &mut Emu, addr: u32, value: T);

    /// Code fetch; records the code access cost for the instruction.
    fn fetch_32<const SEQ: bool>(emu: &mut Emu, addr: u32) -> u32;
    fn fetch_16<const SEQ: bool>(emu: &mut Emu, addr: u32) -> u32;

    /// Data read; records (N) or accumulates (S) the data access cost.
    fn load<T: MemValue, const SEQ: bool>(emu: &mut Emu, addr: u32) -> T;
    fn store<T: MemValue, const SEQ: bool>(emu: &mut Emu, addr: u32, value: T);

    /// Charge the code fetch plus `internal` extra cycles for an
    /// instruction without data accesses.
    fn add_code_cycles(emu: &mut Emu, internal: u32);
    /// Charge a completed load (code and data costs plus the load-use
    /// internal cycle).
    fn add_ldr_cycles(emu: &mut Emu);
    fn add_str_cycles(emu: &mut Emu, extra: u32);

    /// Internal multiply cycles; the ARM9 uses fixed counts, the ARM7
    /// terminates early based on the operand.
    fn mul_cycles(emu: &Emu, op: u32, long: bool, accumulate: bool, set_flags: bool) -> u32;

    /// Recompute the IRQ line and drop HALT if an interrupt is pending.
    fn check_halted(emu: &mut Emu);
}

pub(crate) fn ldrh<C: Core>(emu: &mut Emu, addr: u32) -> u32 {
    let value = C::load::<u16, false>(emu, addr & !1) as u32;
    if C::IS_ARM9 {
        value
    } else {
        value.rotate_right((addr & 1) << 3)
    }
}

pub(crate) fn ldrsh<C: Core>(emu: &mut Emu, addr: u32) -> u32 {
    if !C::IS_ARM9 && addr & 1 != 0 {
        C::load::<u8, false>(emu, addr) as i8 as u32
    } else {
        C::load::<u16, false>(emu, addr & !1) as i16 as u32
    }
}
