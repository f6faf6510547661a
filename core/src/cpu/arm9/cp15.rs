use super::{bus, Arm9, DTCM_MASK, ITCM_MASK};
use crate::{
    cpu::halt,
    emu::Emu,
};

proc_bitfield::bitfield! {
    #[derive(Clone, Copy, PartialEq, Eq)]
    pub struct Control(pub u32): Debug {
        pub pu_enabled: bool @ 0,
        pub data_cache_enabled: bool @ 2,
        pub big_endian: bool @ 7,
        pub instr_cache_enabled: bool @ 12,
        pub high_exception_vectors: bool @ 13,
        pub round_robin_replacement: bool @ 14,
        pub t_bit_load_disabled: bool @ 15,
        pub dtcm_enabled: bool @ 16,
        pub dtcm_load_mode: bool @ 17,
        pub itcm_enabled: bool @ 18,
        pub itcm_load_mode: bool @ 19,
    }
}

const CONTROL_WRITE_MASK: u32 = 0x000F_F085;

/// Rebuild the fetch/load/store tables over `start..end` from the system-bus
/// view, then lay the enabled TCM windows back on top.
pub(crate) fn relink_overlays(arm9: &mut Arm9, start: u64, end: u64) {
    let mut addr = start;
    while addr < end {
        let i = (addr >> bus::PAGE_SHIFT) as usize;
        arm9.fetch_ptrs.0[i] = arm9.bus_read_ptrs.0[i];
        arm9.load_ptrs.0[i] = arm9.bus_read_ptrs.0[i];
        arm9.store_ptrs.0[i] = arm9.bus_write_ptrs.0[i];
        addr += bus::PAGE_SIZE as u64;
    }

    let itcm_ptr = arm9.itcm.as_ptr();
    let itcm_end = arm9.itcm_end.min(end);
    if arm9.read_itcm || arm9.write_itcm {
        let mut addr = start.min(itcm_end);
        while addr < itcm_end {
            let i = (addr >> bus::PAGE_SHIFT) as usize;
            let ptr = unsafe { itcm_ptr.add((addr as u32 & arm9.itcm_array_mask) as usize) };
            if arm9.read_itcm {
                arm9.fetch_ptrs.0[i] = ptr;
                arm9.load_ptrs.0[i] = ptr;
            }
            if arm9.write_itcm {
                arm9.store_ptrs.0[i] = ptr;
            }
            addr += bus::PAGE_SIZE as u64;
        }
    }

    if arm9.read_dtcm || arm9.write_dtcm {
        let dtcm_ptr = arm9.dtcm.as_ptr();
        let dtcm_start = start.max(arm9.dtcm_base as u64);
        let dtcm_end = arm9.dtcm_end.min(end);
        let mut addr = dtcm_start;
        while addr < dtcm_end {
            let i = (addr >> bus::PAGE_SHIFT) as usize;
            let ptr = unsafe { dtcm_ptr.add((addr as u32 & arm9.dtcm_array_mask) as usize) };
            if arm9.read_dtcm {
                // DTCM never serves code
                arm9.load_ptrs.0[i] = ptr;
            }
            if arm9.write_dtcm {
                arm9.store_ptrs.0[i] = ptr;
            }
            addr += bus::PAGE_SIZE as u64;
        }
    }
}

/// 5-bit virtual size field, clamped so a window always spans at least one
/// page (512 << 3 = one 4 KiB page).
fn tcm_window_mask(value: u32) -> u32 {
    let shift = (value >> 1 & 0x1F).clamp(3, 23);
    (((512u64) << shift) - 1) as u32
}

impl Arm9 {
    pub fn cp15_read(emu: &mut Emu, reg: u16) -> u32 {
        match reg {
            // Main ID (ARM946E-S) and cache type
            0x000 => 0x4105_9461,
            0x001 => 0x0F0D_2112,
            0x002 => 0x0014_0180,
            0x100 => emu.arm9.control.0,
            0x910 => emu.arm9.dtcm_control,
            0x911 => emu.arm9.itcm_control,
            _ => {
                #[cfg(feature = "log")]
                slog::warn!(emu.arm9.logger, "unhandled cp15 read {:03X}", reg);
                0
            }
        }
    }

    pub fn cp15_write(emu: &mut Emu, reg: u16, value: u32) {
        match reg {
            0x100 => Self::write_cp15_control(emu, Control(value)),
            0x910 => Self::write_cp15_dtcm_control(emu, value),
            0x911 => Self::write_cp15_itcm_control(emu, value),
            // Wait for interrupt
            0x704 | 0x782 => emu.arm9.state.irqs.halt(halt::HALT),
            // Protection unit and cache maintenance
            0x200..=0x2FF | 0x300..=0x3FF | 0x500..=0x6FF | 0x750..=0x7FF => {}
            _ => {
                #[cfg(feature = "log")]
                slog::warn!(
                    emu.arm9.logger,
                    "unhandled cp15 write {:03X}: {:#010X}",
                    reg,
                    value
                );
            }
        }
    }

    pub fn write_cp15_control(emu: &mut Emu, value: Control) {
        let arm9 = &mut emu.arm9;
        let diff = Control(arm9.control.0 ^ value.0);

        #[cfg(feature = "log")]
        if diff.0 & 0x9085 != 0 {
            slog::warn!(
                arm9.logger,
                "unhandled cp15 control bits changed: {:#010X}",
                value.0
            );
        }

        arm9.state.exception_base = if value.high_exception_vectors() {
            0xFFFF_0000
        } else {
            0
        };

        let mut tcm_changed = false;
        if diff.dtcm_enabled() || diff.dtcm_load_mode() {
            arm9.read_dtcm = value.dtcm_enabled() && !value.dtcm_load_mode();
            arm9.write_dtcm = value.dtcm_enabled();
            tcm_changed = true;
        }
        if diff.itcm_enabled() || diff.itcm_load_mode() {
            arm9.read_itcm = value.itcm_enabled() && !value.itcm_load_mode();
            arm9.write_itcm = value.itcm_enabled();
            tcm_changed = true;
        }

        arm9.control.0 = (arm9.control.0 & !CONTROL_WRITE_MASK) | (value.0 & CONTROL_WRITE_MASK);

        if tcm_changed {
            relink_overlays(arm9, 0, 0x1_0000_0000);
        }
    }

    pub fn write_cp15_dtcm_control(emu: &mut Emu, value: u32) {
        let arm9 = &mut emu.arm9;
        let mask = tcm_window_mask(value);
        let old_base = arm9.dtcm_base as u64;
        let old_end = arm9.dtcm_end;
        arm9.dtcm_base = value & !mask;
        arm9.dtcm_end = arm9.dtcm_base as u64 + mask as u64 + 1;
        arm9.dtcm_array_mask = mask & DTCM_MASK;
        arm9.dtcm_control = value & 0xFFFF_F03E;
        relink_overlays(arm9, old_base, old_end);
        relink_overlays(arm9, arm9.dtcm_base as u64, arm9.dtcm_end);
    }

    pub fn write_cp15_itcm_control(emu: &mut Emu, value: u32) {
        let arm9 = &mut emu.arm9;
        let mask = tcm_window_mask(value);
        let old_end = arm9.itcm_end;
        arm9.itcm_end = mask as u64 + 1;
        arm9.itcm_array_mask = mask & ITCM_MASK;
        arm9.itcm_control = value & 0x3E;
        relink_overlays(arm9, 0, old_end.max(arm9.itcm_end));
    }
}
