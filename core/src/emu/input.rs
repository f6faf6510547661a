use crate::{
    cpu::{arm7::Arm7, arm9::Arm9, irqs::IrqFlags},
    emu::Emu,
};
use bitflags::bitflags;

bitflags! {
    #[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
    pub struct Keys: u16 {
        const A = 1;
        const B = 1 << 1;
        const SELECT = 1 << 2;
        const START = 1 << 3;
        const RIGHT = 1 << 4;
        const LEFT = 1 << 5;
        const UP = 1 << 6;
        const DOWN = 1 << 7;
        const R = 1 << 8;
        const L = 1 << 9;
        const X = 1 << 10;
        const Y = 1 << 11;
    }
}

proc_bitfield::bitfield! {
    #[derive(Clone, Copy, PartialEq, Eq)]
    pub struct KeyIrqControl(pub u16): Debug {
        pub mask: u16 @ 0..=9,
        pub enabled: bool @ 14,
        pub all_pressed: bool @ 15,
    }
}

/// Button and touch latches; the façade refreshes these once per frame from
/// the input descriptor.
pub struct Input {
    /// Active-low KEYINPUT image for the first ten buttons.
    keyinput: u16,
    /// Active-low X/Y/pen bits of the ARM7 EXTKEYIN register.
    extkeyin: u16,
    key_irq_control: [KeyIrqControl; 2],
    key_irq_triggered: [bool; 2],
}

impl Input {
    pub(super) fn new() -> Self {
        Input {
            keyinput: 0x3FF,
            extkeyin: 0x7F,
            key_irq_control: [KeyIrqControl(0); 2],
            key_irq_triggered: [false; 2],
        }
    }

    #[inline]
    pub fn keyinput(&self) -> u16 {
        self.keyinput
    }

    #[inline]
    pub fn extkeyin(&self) -> u16 {
        self.extkeyin
    }

    #[inline]
    pub fn key_irq_control(&self, arm9: bool) -> KeyIrqControl {
        self.key_irq_control[arm9 as usize]
    }
}

impl Emu {
    pub(crate) fn set_keys(&mut self, pressed: Keys, pen_down: bool) {
        self.input.keyinput = !pressed.bits() & 0x3FF;
        self.input.extkeyin = (!(pressed.bits() >> 10) & 3) | 0x34 | ((!pen_down as u16) << 6);
        self.update_key_irq(false);
        self.update_key_irq(true);
    }

    pub(crate) fn write_key_irq_control(&mut self, arm9: bool, value: KeyIrqControl) {
        self.input.key_irq_control[arm9 as usize] = value;
        self.update_key_irq(arm9);
    }

    /// Edge-triggered keypad IRQ on the AND/OR combination selected by
    /// KEYCNT.
    fn update_key_irq(&mut self, arm9: bool) {
        let control = self.input.key_irq_control[arm9 as usize];
        if !control.enabled() {
            self.input.key_irq_triggered[arm9 as usize] = false;
            return;
        }
        let mask = control.mask();
        let pressed = !self.input.keyinput & mask;
        let triggered = if control.all_pressed() {
            mask != 0 && pressed == mask
        } else {
            pressed != 0
        };
        if triggered && !self.input.key_irq_triggered[arm9 as usize] {
            if arm9 {
                Arm9::request_irq(self, IrqFlags::KEYPAD);
            } else {
                Arm7::request_irq(self, IrqFlags::KEYPAD);
            }
        }
        self.input.key_irq_triggered[arm9 as usize] = triggered;
    }
}
