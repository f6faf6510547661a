pub mod bus;
pub(crate) mod io;

use super::{dma, halt, irqs::IrqFlags, timers::Timers, AccessTimings, Core, CoreState};
use crate::{
    emu::{Emu, LocalExMemControl},
    utils::{Bytes, MemValue, OwnedBytesCellPtr},
};

pub const BIOS_SIZE: usize = 0x4000;
pub const WRAM_SIZE: usize = 0x1_0000;

pub struct Arm7 {
    pub state: CoreState,
    pub dma: dma::Controller,
    pub timers: Timers,
    pub local_ex_mem_control: LocalExMemControl,
    pub(crate) bios: OwnedBytesCellPtr<BIOS_SIZE>,
    pub(crate) wram: OwnedBytesCellPtr<WRAM_SIZE>,
    pub(crate) bios_prot: u32,
    pub(crate) halt_control: u8,
    pub(crate) rcnt: u16,

    pub(crate) bus_read_ptrs: Box<bus::Ptrs>,
    pub(crate) bus_write_ptrs: Box<bus::Ptrs>,
    pub(crate) code_timings: Box<[AccessTimings; 0x100]>,
    pub(crate) data_timings: Box<[AccessTimings; 0x100]>,

    #[cfg(feature = "log")]
    pub(crate) logger: slog::Logger,
}

impl Arm7 {
    pub(crate) fn new(
        bios: Box<Bytes<BIOS_SIZE>>,
        #[cfg(feature = "log")] logger: slog::Logger,
    ) -> Self {
        let bios_cell = OwnedBytesCellPtr::new_zeroed();
        unsafe {
            bios_cell.as_bytes_mut().copy_from_slice(&bios[..]);
        }
        Arm7 {
            state: CoreState::new(),
            dma: dma::Controller::new(),
            timers: Timers::new(),
            local_ex_mem_control: LocalExMemControl(0),
            bios: bios_cell,
            wram: OwnedBytesCellPtr::new_zeroed(),
            bios_prot: 0,
            halt_control: 0,
            rcnt: 0,
            bus_read_ptrs: bus::Ptrs::new_boxed(),
            bus_write_ptrs: bus::Ptrs::new_boxed(),
            code_timings: Box::new([AccessTimings::splat(1); 0x100]),
            data_timings: Box::new([AccessTimings::splat(1); 0x100]),
            #[cfg(feature = "log")]
            logger,
        }
    }

    pub fn request_irq(emu: &mut Emu, flags: IrqFlags) {
        let disabled = emu.arm7.state.regs.cpsr.irqs_disabled();
        emu.arm7.state.irqs.request(flags, disabled);
    }

    /// HALTCNT: mode 2 halts until IRQ, mode 3 enters stop.
    pub fn write_halt_control(emu: &mut Emu, value: u8) {
        emu.arm7.halt_control = value & 0xC0;
        match value >> 6 {
            2 => emu.arm7.state.irqs.halt(halt::HALT),
            3 => emu.arm7.state.irqs.halt(halt::STOP),
            _ => {}
        }
    }
}

impl Core for Arm7 {
    const IS_ARM9: bool = false;

    #[inline]
    fn state(emu: &Emu) -> &CoreState {
        &emu.arm7.state
    }

    #[inline]
    fn state_mut(emu: &mut Emu) -> &mut CoreState {
        &mut emu.arm7.state
    }

    #[inline]
    fn dma(emu: &mut Emu) -> &mut dma::Controller {
        &mut emu.arm7.dma
    }

    #[inline]
    fn timers(emu: &mut Emu) -> &mut Timers {
        &mut emu.arm7.timers
    }

    #[inline]
    fn bus_read<T: MemValue>(emu: &mut Emu, addr: u32) -> T {
        let ptr = emu.arm7.bus_read_ptrs.get(addr);
        if ptr.is_null() {
            bus::read_slow(emu, addr)
        } else {
            unsafe { T::read_le_ptr(ptr.add((addr & bus::PAGE_MASK & !(T::SIZE as u32 - 1)) as usize)) }
        }
    }

    #[inline]
    fn bus_write<T: MemValue>(emu: &mut Emu, addr: u32, value: T) {
        let ptr = emu.arm7.bus_write_ptrs.get(addr);
        if ptr.is_null() {
            bus::write_slow(emu, addr, value);
        } else {
            unsafe {
                T::write_le_ptr(
                    ptr.add((addr & bus::PAGE_MASK & !(T::SIZE as u32 - 1)) as usize),
                    value,
                );
            }
        }
    }

    #[inline]
    fn fetch_32<const SEQ: bool>(emu: &mut Emu, addr: u32) -> u32 {
        let timings = emu.arm7.code_timings[(addr >> 24) as usize];
        emu.arm7.state.code_cycles = if SEQ { timings.s32 } else { timings.n32 };
        Self::bus_read(emu, addr & !3)
    }

    #[inline]
    fn fetch_16<const SEQ: bool>(emu: &mut Emu, addr: u32) -> u32 {
        let timings = emu.arm7.code_timings[(addr >> 24) as usize];
        emu.arm7.state.code_cycles = if SEQ { timings.s16 } else { timings.n16 };
        Self::bus_read::<u16>(emu, addr & !1) as u32
    }

    #[inline]
    fn load<T: MemValue, const SEQ: bool>(emu: &mut Emu, addr: u32) -> T {
        let timings = emu.arm7.data_timings[(addr >> 24) as usize];
        let cost = match (T::SIZE, SEQ) {
            (4, false) => timings.n32,
            (4, true) => timings.s32,
            (_, false) => timings.n16,
            (_, true) => timings.s16,
        };
        if SEQ {
            emu.arm7.state.data_cycles += cost;
        } else {
            emu.arm7.state.data_cycles = cost;
        }
        Self::bus_read(emu, addr)
    }

    #[inline]
    fn store<T: MemValue, const SEQ: bool>(emu: &mut Emu, addr: u32, value: T) {
        let timings = emu.arm7.data_timings[(addr >> 24) as usize];
        let cost = match (T::SIZE, SEQ) {
            (4, false) => timings.n32,
            (4, true) => timings.s32,
            (_, false) => timings.n16,
            (_, true) => timings.s16,
        };
        if SEQ {
            emu.arm7.state.data_cycles += cost;
        } else {
            emu.arm7.state.data_cycles = cost;
        }
        Self::bus_write(emu, addr, value);
    }

    #[inline]
    fn add_code_cycles(emu: &mut Emu, internal: u32) {
        let state = &mut emu.arm7.state;
        state.cycles += state.code_cycles as u64 + internal as u64;
    }

    #[inline]
    fn add_ldr_cycles(emu: &mut Emu) {
        let state = &mut emu.arm7.state;
        state.cycles += state.code_cycles as u64 + state.data_cycles as u64 + 1;
    }

    #[inline]
    fn add_str_cycles(emu: &mut Emu, extra: u32) {
        let state = &mut emu.arm7.state;
        state.cycles += state.code_cycles as u64 + state.data_cycles as u64 + extra as u64;
    }

    #[inline]
    fn mul_cycles(_emu: &Emu, op: u32, long: bool, accumulate: bool, _set_flags: bool) -> u32 {
        // Early termination: the multiplier handles 8 operand bits per cycle
        let op = if op >> 31 != 0 { !op } else { op };
        let mut cycles = if op & 0xFFFF_FF00 == 0 {
            1
        } else if op & 0xFFFF_0000 == 0 {
            2
        } else if op & 0xFF00_0000 == 0 {
            3
        } else {
            4
        };
        if long {
            cycles += 1;
        }
        cycles + accumulate as u32
    }

    fn check_halted(emu: &mut Emu) {
        let state = &mut emu.arm7.state;
        state.irqs.check_halt(false);
        state.irqs.update_line(state.regs.cpsr.irqs_disabled());
    }
}
