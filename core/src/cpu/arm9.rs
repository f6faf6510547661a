pub mod bus;
pub mod cp15;
pub mod div_engine;
pub(crate) mod io;
pub mod sqrt_engine;

use super::{dma, irqs::IrqFlags, timers::Timers, AccessTimings, Core, CoreState};
use crate::{
    emu::{Emu, LocalExMemControl},
    utils::{Bytes, MemValue, OwnedBytesCellPtr},
};
use div_engine::DivEngine;
use sqrt_engine::SqrtEngine;

pub const BIOS_SIZE: usize = 0x1000;
pub const ITCM_SIZE: usize = 0x8000;
pub const ITCM_MASK: u32 = (ITCM_SIZE - 1) as u32;
pub const DTCM_SIZE: usize = 0x4000;
pub const DTCM_MASK: u32 = (DTCM_SIZE - 1) as u32;

pub struct Arm9 {
    pub state: CoreState,
    pub dma: dma::Controller,
    pub dma_fill: [u32; 4],
    pub timers: Timers,
    pub div_engine: DivEngine,
    pub sqrt_engine: SqrtEngine,
    pub local_ex_mem_control: LocalExMemControl,

    pub(crate) bios: OwnedBytesCellPtr<BIOS_SIZE>,
    pub(crate) itcm: OwnedBytesCellPtr<ITCM_SIZE>,
    pub(crate) dtcm: OwnedBytesCellPtr<DTCM_SIZE>,

    // cp15
    pub(crate) control: cp15::Control,
    pub(crate) dtcm_control: u32,
    pub(crate) itcm_control: u32,
    pub(crate) dtcm_base: u32,
    pub(crate) dtcm_end: u64,
    pub(crate) dtcm_array_mask: u32,
    pub(crate) itcm_end: u64,
    pub(crate) itcm_array_mask: u32,
    pub(crate) read_itcm: bool,
    pub(crate) write_itcm: bool,
    pub(crate) read_dtcm: bool,
    pub(crate) write_dtcm: bool,

    // System-bus view and the TCM-overlaid fetch/load/store trio
    pub(crate) bus_read_ptrs: Box<bus::Ptrs>,
    pub(crate) bus_write_ptrs: Box<bus::Ptrs>,
    pub(crate) fetch_ptrs: Box<bus::Ptrs>,
    pub(crate) load_ptrs: Box<bus::Ptrs>,
    pub(crate) store_ptrs: Box<bus::Ptrs>,
    pub(crate) code_timings: Box<[AccessTimings; 0x100]>,
    pub(crate) data_timings: Box<[AccessTimings; 0x100]>,

    #[cfg(feature = "log")]
    pub(crate) logger: slog::Logger,
}

impl Arm9 {
    pub(crate) fn new(
        bios: Box<Bytes<BIOS_SIZE>>,
        #[cfg(feature = "log")] logger: slog::Logger,
    ) -> Self {
        let bios_cell = OwnedBytesCellPtr::new_zeroed();
        unsafe {
            bios_cell.as_bytes_mut().copy_from_slice(&bios[..]);
        }
        let mut state = CoreState::new();
        state.exception_base = 0xFFFF_0000;
        Arm9 {
            state,
            dma: dma::Controller::new(),
            dma_fill: [0; 4],
            timers: Timers::new(),
            div_engine: DivEngine::new(),
            sqrt_engine: SqrtEngine::new(),
            local_ex_mem_control: LocalExMemControl(0),
            bios: bios_cell,
            itcm: OwnedBytesCellPtr::new_zeroed(),
            dtcm: OwnedBytesCellPtr::new_zeroed(),
            control: cp15::Control(0x78),
            dtcm_control: 0,
            itcm_control: 0,
            dtcm_base: 0,
            dtcm_end: 0,
            dtcm_array_mask: 0,
            itcm_end: 0,
            itcm_array_mask: 0,
            read_itcm: false,
            write_itcm: false,
            read_dtcm: false,
            write_dtcm: false,
            bus_read_ptrs: bus::Ptrs::new_boxed(),
            bus_write_ptrs: bus::Ptrs::new_boxed(),
            fetch_ptrs: bus::Ptrs::new_boxed(),
            load_ptrs: bus::Ptrs::new_boxed(),
            store_ptrs: bus::Ptrs::new_boxed(),
            code_timings: zeroed_box_timings(),
            data_timings: zeroed_box_timings(),
            #[cfg(feature = "log")]
            logger,
        }
    }

    pub fn request_irq(emu: &mut Emu, flags: IrqFlags) {
        let disabled = emu.arm9.state.regs.cpsr.irqs_disabled();
        emu.arm9.state.irqs.request(flags, disabled);
    }
}

fn zeroed_box_timings() -> Box<[AccessTimings; 0x100]> {
    Box::new([AccessTimings::splat(1); 0x100])
}

impl Core for Arm9 {
    const IS_ARM9: bool = true;

    #[inline]
    fn state(emu: &Emu) -> &CoreState {
        &emu.arm9.state
    }

    #[inline]
    fn state_mut(emu: &mut Emu) -> &mut CoreState {
        &mut emu.arm9.state
    }

    #[inline]
    fn dma(emu: &mut Emu) -> &mut dma::Controller {
        &mut emu.arm9.dma
    }

    #[inline]
    fn timers(emu: &mut Emu) -> &mut Timers {
        &mut emu.arm9.timers
    }

    #[inline]
    fn bus_read<T: MemValue>(emu: &mut Emu, addr: u32) -> T {
        let ptr = emu.arm9.bus_read_ptrs.get(addr);
        if ptr.is_null() {
            bus::read_slow(emu, addr)
        } else {
            unsafe { T::read_le_ptr(ptr.add((addr & bus::PAGE_MASK & !(T::SIZE as u32 - 1)) as usize)) }
        }
    }

    #[inline]
    fn bus_write<T: MemValue>(emu: &mut Emu, addr: u32, value: T) {
        let ptr = emu.arm9.bus_write_ptrs.get(addr);
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
        let timings = emu.arm9.code_timings[(addr >> 24) as usize];
        emu.arm9.state.code_cycles = if SEQ { timings.s32 } else { timings.n32 };
        let ptr = emu.arm9.fetch_ptrs.get(addr);
        if ptr.is_null() {
            bus::read_slow(emu, addr)
        } else {
            unsafe { u32::read_le_ptr(ptr.add((addr & bus::PAGE_MASK & !3) as usize)) }
        }
    }

    #[inline]
    fn fetch_16<const SEQ: bool>(emu: &mut Emu, addr: u32) -> u32 {
        let timings = emu.arm9.code_timings[(addr >> 24) as usize];
        emu.arm9.state.code_cycles = if SEQ { timings.s16 } else { timings.n16 };
        let ptr = emu.arm9.fetch_ptrs.get(addr);
        (if ptr.is_null() {
            bus::read_slow::<u16>(emu, addr)
        } else {
            unsafe { u16::read_le_ptr(ptr.add((addr & bus::PAGE_MASK & !1) as usize)) }
        }) as u32
    }

    #[inline]
    fn load<T: MemValue, const SEQ: bool>(emu: &mut Emu, addr: u32) -> T {
        let timings = emu.arm9.data_timings[(addr >> 24) as usize];
        let cost = match (T::SIZE, SEQ) {
            (4, false) => timings.n32,
            (4, true) => timings.s32,
            (_, false) => timings.n16,
            (_, true) => timings.s16,
        };
        if SEQ {
            emu.arm9.state.data_cycles += cost;
        } else {
            emu.arm9.state.data_cycles = cost;
        }
        let ptr = emu.arm9.load_ptrs.get(addr);
        if ptr.is_null() {
            bus::read_slow(emu, addr)
        } else {
            unsafe { T::read_le_ptr(ptr.add((addr & bus::PAGE_MASK & !(T::SIZE as u32 - 1)) as usize)) }
        }
    }

    #[inline]
    fn store<T: MemValue, const SEQ: bool>(emu: &mut Emu, addr: u32, value: T) {
        let timings = emu.arm9.data_timings[(addr >> 24) as usize];
        let cost = match (T::SIZE, SEQ) {
            (4, false) => timings.n32,
            (4, true) => timings.s32,
            (_, false) => timings.n16,
            (_, true) => timings.s16,
        };
        if SEQ {
            emu.arm9.state.data_cycles += cost;
        } else {
            emu.arm9.state.data_cycles = cost;
        }
        let ptr = emu.arm9.store_ptrs.get(addr);
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
    fn add_code_cycles(emu: &mut Emu, internal: u32) {
        let state = &mut emu.arm9.state;
        state.cycles += state.code_cycles as u64 + ((internal as u64) << 1);
    }

    #[inline]
    fn add_ldr_cycles(emu: &mut Emu) {
        let state = &mut emu.arm9.state;
        state.cycles += ((state.code_cycles.max(state.data_cycles) as u64) + 1) & !1;
    }

    #[inline]
    fn add_str_cycles(emu: &mut Emu, extra: u32) {
        let state = &mut emu.arm9.state;
        state.cycles +=
            (((state.code_cycles.max(state.data_cycles) as u64) + 1) & !1) + ((extra as u64) << 1);
    }

    #[inline]
    fn mul_cycles(_emu: &Emu, _op: u32, long: bool, _accumulate: bool, set_flags: bool) -> u32 {
        match (long, set_flags) {
            (false, false) => 1,
            (false, true) => 3,
            (true, false) => 2,
            (true, true) => 4,
        }
    }

    fn check_halted(emu: &mut Emu) {
        let state = &mut emu.arm9.state;
        state.irqs.check_halt(true);
        state.irqs.update_line(state.regs.cpsr.irqs_disabled());
    }
}
