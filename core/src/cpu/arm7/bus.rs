use super::io;
use crate::{
    cpu::AccessTimings,
    emu::Emu,
    utils::{zeroed_box, MemValue, Zero},
};

pub const PAGE_SHIFT: u32 = 14;
pub const PAGE_SIZE: u32 = 1 << PAGE_SHIFT;
pub const PAGE_MASK: u32 = PAGE_SIZE - 1;
pub const ENTRIES: usize = 1 << (32 - PAGE_SHIFT);

#[repr(transparent)]
pub struct Ptrs(pub(crate) [*mut u8; ENTRIES]);

unsafe impl Zero for Ptrs {}

impl Ptrs {
    pub(crate) fn new_boxed() -> Box<Self> {
        zeroed_box()
    }

    #[inline]
    pub(crate) fn get(&self, addr: u32) -> *mut u8 {
        self.0[(addr >> PAGE_SHIFT) as usize]
    }

    #[inline]
    pub(crate) fn set(&mut self, addr: u32, ptr: *mut u8) {
        self.0[(addr >> PAGE_SHIFT) as usize] = ptr;
    }

    /// # Safety
    /// Same contract as the ARM9 table: the backing memory outlives the
    /// table and is a multiple of the page size.
    pub(crate) unsafe fn map_range(
        &mut self,
        start_ptr: *mut u8,
        mem_size: usize,
        (lower_bound, upper_bound): (u32, u32),
    ) {
        debug_assert!(lower_bound & PAGE_MASK == 0);
        debug_assert!(upper_bound & PAGE_MASK == PAGE_MASK);
        debug_assert!(mem_size % PAGE_SIZE as usize == 0);

        let end_ptr = start_ptr.add(mem_size);
        let mut cur_ptr = start_ptr;
        for i in (lower_bound >> PAGE_SHIFT)..=(upper_bound >> PAGE_SHIFT) {
            self.0[i as usize] = cur_ptr;
            cur_ptr = cur_ptr.add(PAGE_SIZE as usize);
            if cur_ptr >= end_ptr {
                cur_ptr = start_ptr;
            }
        }
    }

    pub(crate) fn unmap_range(&mut self, (lower_bound, upper_bound): (u32, u32)) {
        for i in (lower_bound >> PAGE_SHIFT)..=(upper_bound >> PAGE_SHIFT) {
            self.0[i as usize] = core::ptr::null_mut();
        }
    }
}

pub(crate) fn setup(emu: &mut Emu) {
    unsafe {
        emu.arm7.bus_read_ptrs.map_range(
            emu.main_mem.as_ptr(),
            emu.main_mem.len(),
            (0x0200_0000, 0x02FF_FFFF),
        );
        emu.arm7.bus_write_ptrs.map_range(
            emu.main_mem.as_ptr(),
            emu.main_mem.len(),
            (0x0200_0000, 0x02FF_FFFF),
        );
        emu.arm7.bus_read_ptrs.map_range(
            emu.arm7.wram.as_ptr(),
            super::WRAM_SIZE,
            (0x0380_0000, 0x03FF_FFFF),
        );
        emu.arm7.bus_write_ptrs.map_range(
            emu.arm7.wram.as_ptr(),
            super::WRAM_SIZE,
            (0x0380_0000, 0x03FF_FFFF),
        );
    }
    rebuild_swram_pages(emu);
    rebuild_vram_pages(emu);
}

/// Region 0x03000000-0x037FFFFF: the shared WRAM slice, or a mirror of the
/// ARM7's own WRAM when WRAMCNT gives it nothing.
pub(crate) fn rebuild_swram_pages(emu: &mut Emu) {
    let (ptr, mask) = emu.swram.arm7_slice();
    let (ptr, size) = if ptr.is_null() {
        (emu.arm7.wram.as_ptr(), super::WRAM_SIZE)
    } else {
        (ptr, mask as usize + 1)
    };
    unsafe {
        emu.arm7
            .bus_read_ptrs
            .map_range(ptr, size, (0x0300_0000, 0x037F_FFFF));
        emu.arm7
            .bus_write_ptrs
            .map_range(ptr, size, (0x0300_0000, 0x037F_FFFF));
    }
}

pub(crate) fn rebuild_vram_pages(emu: &mut Emu) {
    for page in (0x0600_0000u32..0x0700_0000).step_by(PAGE_SIZE as usize) {
        let ptr = emu.gpu.vram.arm7_page_ptr(page);
        emu.arm7.bus_read_ptrs.set(page, ptr);
    }
}

pub(crate) fn rebuild_timing_tables(emu: &mut Emu) {
    let arm7_owns_gba_slot = emu.global_ex_mem_control().arm7_gba_slot_access();
    for region in 0..0x100usize {
        let (code, data) = match region {
            0x02 => (
                AccessTimings {
                    n32: 9,
                    s32: 2,
                    n16: 8,
                    s16: 1,
                },
                AccessTimings {
                    n32: 10,
                    s32: 2,
                    n16: 9,
                    s16: 1,
                },
            ),
            0x06 => (
                AccessTimings {
                    n32: 2,
                    s32: 2,
                    n16: 1,
                    s16: 1,
                },
                AccessTimings {
                    n32: 2,
                    s32: 2,
                    n16: 1,
                    s16: 1,
                },
            ),
            0x08 | 0x09 if arm7_owns_gba_slot => {
                const NSEQ: [u8; 4] = [10, 8, 6, 18];
                const SEQ: [u8; 2] = [6, 4];
                let control = emu.arm7.local_ex_mem_control;
                let n16 = NSEQ[control.gba_slot_rom_1st_access_time() as usize];
                let s16 = SEQ[control.gba_slot_rom_2nd_access_time() as usize];
                let timings = AccessTimings {
                    n32: n16 + s16,
                    s32: s16 + s16,
                    n16,
                    s16,
                };
                (timings, timings)
            }
            _ => (AccessTimings::splat(1), AccessTimings::splat(1)),
        };
        emu.arm7.code_timings[region] = code;
        emu.arm7.data_timings[region] = data;
    }
}

pub(crate) fn read_slow<T: MemValue>(emu: &mut Emu, addr: u32) -> T {
    match addr >> 23 {
        0x00 => {
            if addr < super::BIOS_SIZE as u32 {
                // BIOS reads are open-bus unless executing inside it
                if emu.arm7.state.regs.pc() >= super::BIOS_SIZE as u32
                    || addr < emu.arm7.bios_prot
                {
                    T::zext_from_u32(u32::MAX)
                } else {
                    emu.arm7
                        .bios
                        .read_le((addr & !(T::SIZE as u32 - 1)) as usize)
                }
            } else {
                T::default()
            }
        }
        0x08 => match T::SIZE {
            1 => T::zext_from_u32(io::read_8(emu, addr) as u32),
            2 => T::zext_from_u32(io::read_16(emu, addr & !1) as u32),
            _ => T::zext_from_u32(io::read_32(emu, addr & !3)),
        },
        // Wifi register and RAM block, not connected
        0x09 => T::default(),
        0x0C | 0x0D => emu.gpu.vram.read_arm7(addr & !(T::SIZE as u32 - 1)),
        0x10..=0x13 => {
            if !emu.global_ex_mem_control().arm7_gba_slot_access() {
                T::default()
            } else if T::SIZE == 4 {
                T::zext_from_u32(emu.arm7.local_ex_mem_control.gba_rom_word(addr))
            } else {
                let half = emu.arm7.local_ex_mem_control.gba_rom_halfword(addr) as u32;
                T::zext_from_u32(half >> ((addr & 1) << 3))
            }
        }
        _ => {
            #[cfg(feature = "log")]
            slog::info!(emu.arm7.logger, "unknown read @ {:#010X}", addr);
            T::default()
        }
    }
}

pub(crate) fn write_slow<T: MemValue>(emu: &mut Emu, addr: u32, value: T) {
    match addr >> 23 {
        0x08 => match T::SIZE {
            1 => io::write_8(emu, addr, value.into_u32() as u8),
            2 => io::write_16(emu, addr & !1, value.into_u32() as u16),
            _ => io::write_32(emu, addr & !3, value.into_u32()),
        },
        0x09 => {}
        0x0C | 0x0D => {
            if T::SIZE != 1 {
                emu.gpu.vram.write_arm7(addr & !(T::SIZE as u32 - 1), value);
            }
        }
        0x00 | 0x10..=0x13 => {}
        _ => {
            #[cfg(feature = "log")]
            slog::info!(
                emu.arm7.logger,
                "unknown write @ {:#010X}: {:#X}",
                addr,
                value.into_u32()
            );
        }
    }
}
