use crate::utils::OwnedBytesCellPtr;
use core::ptr;

proc_bitfield::bitfield! {
    #[derive(Clone, Copy, PartialEq, Eq)]
    pub struct Control(pub u8): Debug {
        pub layout: u8 @ 0..=1,
    }
}

/// The 32 KiB of shared WRAM, sliced between the CPUs by WRAMCNT.
///
/// `arm9_ptr` is null in layout 3 (everything to the ARM7); the region 0x03
/// pages then stay unmapped on the ARM9 and fall back to the slow path.
/// The ARM7 always has a mapping: when it owns no shared WRAM its own WRAM
/// is mirrored there instead, which the page-table rebuild handles.
pub struct Swram {
    contents: OwnedBytesCellPtr<0x8000>,
    control: Control,
    arm9_ptr: *mut u8,
    arm9_mask: u32,
    arm7_ptr: *mut u8,
    arm7_mask: u32,
}

impl Swram {
    pub(super) fn new() -> Self {
        let mut swram = Swram {
            contents: OwnedBytesCellPtr::new_zeroed(),
            control: Control(0),
            arm9_ptr: ptr::null_mut(),
            arm9_mask: 0,
            arm7_ptr: ptr::null_mut(),
            arm7_mask: 0,
        };
        swram.recalc();
        swram
    }

    #[inline]
    pub fn contents(&self) -> &OwnedBytesCellPtr<0x8000> {
        &self.contents
    }

    #[inline]
    pub fn control(&self) -> Control {
        self.control
    }

    /// Updates the slices; the caller rebuilds both CPUs' region 0x03 pages.
    pub(crate) fn set_control(&mut self, value: Control) -> bool {
        let new_value = value.0 & 3;
        if new_value == self.control.0 {
            return false;
        }
        self.control.0 = new_value;
        self.recalc();
        true
    }

    fn recalc(&mut self) {
        match self.control.0 {
            0 => {
                self.arm9_ptr = self.contents.as_ptr();
                self.arm9_mask = 0x7FFF;
                self.arm7_ptr = ptr::null_mut();
                self.arm7_mask = 0;
            }
            1 => {
                self.arm9_ptr = unsafe { self.contents.as_ptr().add(0x4000) };
                self.arm9_mask = 0x3FFF;
                self.arm7_ptr = self.contents.as_ptr();
                self.arm7_mask = 0x3FFF;
            }
            2 => {
                self.arm9_ptr = self.contents.as_ptr();
                self.arm9_mask = 0x3FFF;
                self.arm7_ptr = unsafe { self.contents.as_ptr().add(0x4000) };
                self.arm7_mask = 0x3FFF;
            }
            _ => {
                self.arm9_ptr = ptr::null_mut();
                self.arm9_mask = 0;
                self.arm7_ptr = self.contents.as_ptr();
                self.arm7_mask = 0x7FFF;
            }
        }
    }

    #[inline]
    pub(crate) fn arm9_slice(&self) -> (*mut u8, u32) {
        (self.arm9_ptr, self.arm9_mask)
    }

    #[inline]
    pub(crate) fn arm7_slice(&self) -> (*mut u8, u32) {
        (self.arm7_ptr, self.arm7_mask)
    }
}
