use super::{cp15, io};
use crate::{
    cpu::AccessTimings,
    emu::Emu,
    utils::{zeroed_box, MemValue, Zero},
};

pub const PAGE_SHIFT: u32 = 12;
pub const PAGE_SIZE: u32 = 1 << PAGE_SHIFT;
pub const PAGE_MASK: u32 = PAGE_SIZE - 1;
pub const ENTRIES: usize = 1 << (32 - PAGE_SHIFT);

/// One page-pointer table; null entries route to the slow path.
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

    /// Map `mem_size` bytes starting at `start_ptr` across the page range,
    /// wrapping to mirror smaller regions.
    ///
    /// # Safety
    /// `start_ptr..start_ptr + mem_size` must stay valid for the lifetime of
    /// the table, and `mem_size` must be a multiple of the page size.
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
        emu.arm9.bus_read_ptrs.map_range(
            emu.main_mem.as_ptr(),
            emu.main_mem.len(),
            (0x0200_0000, 0x02FF_FFFF),
        );
        emu.arm9.bus_write_ptrs.map_range(
            emu.main_mem.as_ptr(),
            emu.main_mem.len(),
            (0x0200_0000, 0x02FF_FFFF),
        );
        emu.arm9.bus_read_ptrs.map_range(
            emu.arm9.bios.as_ptr(),
            super::BIOS_SIZE,
            (0xFFFF_0000, 0xFFFF_0FFF),
        );
        emu.arm9.bus_read_ptrs.map_range(
            emu.zero_page.as_ptr(),
            emu.zero_page.len(),
            (0xFFFF_1000, 0xFFFF_FFFF),
        );
    }
    rebuild_swram_pages(emu);
    rebuild_vram_pages(emu);
    cp15::relink_overlays(&mut emu.arm9, 0, 0x1_0000_0000);
}

pub(crate) fn rebuild_swram_pages(emu: &mut Emu) {
    let (ptr, mask) = emu.swram.arm9_slice();
    if ptr.is_null() {
        emu.arm9.bus_read_ptrs.unmap_range((0x0300_0000, 0x03FF_FFFF));
        emu.arm9.bus_write_ptrs.unmap_range((0x0300_0000, 0x03FF_FFFF));
    } else {
        unsafe {
            emu.arm9
                .bus_read_ptrs
                .map_range(ptr, mask as usize + 1, (0x0300_0000, 0x03FF_FFFF));
            emu.arm9
                .bus_write_ptrs
                .map_range(ptr, mask as usize + 1, (0x0300_0000, 0x03FF_FFFF));
        }
    }
    cp15::relink_overlays(&mut emu.arm9, 0x0300_0000, 0x0400_0000);
}

/// Refresh the region 0x06 read pages from the VRAM router. Pages with no or
/// multiple contributors stay null so the slow path can OR-merge; writes
/// always take the slow path (byte writes are dropped there).
pub(crate) fn rebuild_vram_pages(emu: &mut Emu) {
    for page in (0x0600_0000u32..0x0700_0000).step_by(PAGE_SIZE as usize) {
        let ptr = emu.gpu.vram.arm9_page_ptr(page);
        emu.arm9.bus_read_ptrs.set(page, ptr);
    }
    cp15::relink_overlays(&mut emu.arm9, 0x0600_0000, 0x0700_0000);
}

fn gba_slot_timings(emu: &Emu) -> (AccessTimings, AccessTimings) {
    const NSEQ: [u8; 4] = [10, 8, 6, 18];
    const SEQ: [u8; 2] = [6, 4];
    let control = emu.arm9.local_ex_mem_control;
    let n16 = NSEQ[control.gba_slot_rom_1st_access_time() as usize];
    let s16 = SEQ[control.gba_slot_rom_2nd_access_time() as usize];
    let data = AccessTimings {
        n32: (n16 + s16) << 1,
        s32: (s16 + s16) << 1,
        n16: n16 << 1,
        s16: s16 << 1,
    };
    let code = AccessTimings {
        n32: data.n32 + 6,
        s32: data.s32,
        n16: data.n16 + 6,
        s16: data.s16,
    };
    (code, data)
}

pub(crate) fn rebuild_timing_tables(emu: &mut Emu) {
    let arm9_owns_gba_slot = !emu.global_ex_mem_control().arm7_gba_slot_access();
    for region in 0..0x100usize {
        let (code, data) = match region {
            // Main RAM behind the cache
            0x02 => (AccessTimings::splat(1), AccessTimings::splat(1)),
            0x05 | 0x06 => (
                AccessTimings::splat(10),
                AccessTimings {
                    n32: 10,
                    s32: 4,
                    n16: 8,
                    s16: 2,
                },
            ),
            0x08 | 0x09 if arm9_owns_gba_slot => gba_slot_timings(emu),
            _ => (
                AccessTimings::splat(8),
                AccessTimings {
                    n32: 8,
                    s32: 2,
                    n16: 8,
                    s16: 2,
                },
            ),
        };
        emu.arm9.code_timings[region] = code;
        emu.arm9.data_timings[region] = data;
    }
}

fn engine_2d_access_disabled(emu: &Emu, addr: u32) -> bool {
    let power = emu.gpu.power_control();
    (!power.engine_2d_a_enabled() && addr & 0x400 == 0)
        || (!power.engine_2d_b_enabled() && addr & 0x400 != 0)
}

pub(crate) fn read_slow<T: MemValue>(emu: &mut Emu, addr: u32) -> T {
    match addr >> 24 {
        0x04 => match T::SIZE {
            1 => T::zext_from_u32(io::read_8(emu, addr) as u32),
            2 => T::zext_from_u32(io::read_16(emu, addr & !1) as u32),
            _ => T::zext_from_u32(io::read_32(emu, addr & !3)),
        },
        0x05 => {
            if engine_2d_access_disabled(emu, addr) {
                T::default()
            } else {
                emu.gpu
                    .palette
                    .read_le((addr & 0x7FF & !(T::SIZE as u32 - 1)) as usize)
            }
        }
        0x06 => emu.gpu.vram.read_arm9(addr & !(T::SIZE as u32 - 1)),
        0x07 => {
            if engine_2d_access_disabled(emu, addr) {
                T::default()
            } else {
                emu.gpu
                    .oam
                    .read_le((addr & 0x7FF & !(T::SIZE as u32 - 1)) as usize)
            }
        }
        0x08 | 0x09 => {
            if emu.global_ex_mem_control().arm7_gba_slot_access() {
                T::default()
            } else if T::SIZE == 4 {
                T::zext_from_u32(emu.arm9.local_ex_mem_control.gba_rom_word(addr))
            } else {
                let half = emu.arm9.local_ex_mem_control.gba_rom_halfword(addr) as u32;
                T::zext_from_u32(half >> ((addr & 1) << 3))
            }
        }
        0x0A => T::default(), // GBA slot SRAM, not connected
        _ => {
            #[cfg(feature = "log")]
            slog::info!(emu.arm9.logger, "unknown read @ {:#010X}", addr);
            T::default()
        }
    }
}

pub(crate) fn write_slow<T: MemValue>(emu: &mut Emu, addr: u32, value: T) {
    match addr >> 24 {
        0x04 => match T::SIZE {
            1 => io::write_8(emu, addr, value.into_u32() as u8),
            2 => io::write_16(emu, addr & !1, value.into_u32() as u16),
            _ => io::write_32(emu, addr & !3, value.into_u32()),
        },
        // Byte writes to the video memories are dropped by the hardware
        0x05 => {
            if T::SIZE != 1 && !engine_2d_access_disabled(emu, addr) {
                emu.gpu
                    .palette
                    .write_le((addr & 0x7FF & !(T::SIZE as u32 - 1)) as usize, value);
            }
        }
        0x06 => {
            if T::SIZE != 1 {
                emu.gpu.vram.write_arm9(addr & !(T::SIZE as u32 - 1), value);
            }
        }
        0x07 => {
            if T::SIZE != 1 && !engine_2d_access_disabled(emu, addr) {
                emu.gpu
                    .oam
                    .write_le((addr & 0x7FF & !(T::SIZE as u32 - 1)) as usize, value);
            }
        }
        0x08..=0x0A => {}
        _ => {
            #[cfg(feature = "log")]
            slog::info!(
                emu.arm9.logger,
                "unknown write @ {:#010X}: {:#X}",
                addr,
                value.into_u32()
            );
        }
    }
}
