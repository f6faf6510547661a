use super::halt;
use bitflags::bitflags;

bitflags! {
    #[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
    pub struct IrqFlags: u32 {
        const VBLANK = 1;
        const HBLANK = 1 << 1;
        const VCOUNT_MATCH = 1 << 2;
        const TIMER_0 = 1 << 3;
        const TIMER_1 = 1 << 4;
        const TIMER_2 = 1 << 5;
        const TIMER_3 = 1 << 6;
        const RTC = 1 << 7;
        const DMA_0 = 1 << 8;
        const DMA_1 = 1 << 9;
        const DMA_2 = 1 << 10;
        const DMA_3 = 1 << 11;
        const KEYPAD = 1 << 12;
        const GBA_SLOT = 1 << 13;
        const IPC_SYNC = 1 << 16;
        const IPC_SEND_FIFO_EMPTY = 1 << 17;
        const IPC_RECV_FIFO_NOT_EMPTY = 1 << 18;
        const DS_SLOT_TRANSFER_DONE = 1 << 19;
        const DS_SLOT_IREQ_MC = 1 << 20;
        const GX_FIFO = 1 << 21;
        const HINGE = 1 << 22;
        const SPI = 1 << 23;
        const WIFI = 1 << 24;
    }
}

impl IrqFlags {
    #[inline]
    pub fn timer(i: usize) -> Self {
        IrqFlags::from_bits_retain(IrqFlags::TIMER_0.bits() << i)
    }

    #[inline]
    pub fn dma(i: usize) -> Self {
        IrqFlags::from_bits_retain(IrqFlags::DMA_0.bits() << i)
    }
}

/// One CPU's interrupt controller state plus its halt mask.
pub struct Irqs {
    pub master_enable: bool,
    enabled: IrqFlags,
    requested: IrqFlags,
    pub halted: u32,
    triggered: bool,
}

impl Irqs {
    pub(crate) fn new() -> Self {
        Irqs {
            master_enable: false,
            enabled: IrqFlags::empty(),
            requested: IrqFlags::empty(),
            halted: 0,
            triggered: false,
        }
    }

    #[inline]
    pub fn enabled(&self) -> IrqFlags {
        self.enabled
    }

    #[inline]
    pub fn requested(&self) -> IrqFlags {
        self.requested
    }

    /// The IRQ line after masking; checked by the interpreter after every
    /// instruction retires.
    #[inline]
    pub fn triggered(&self) -> bool {
        self.triggered
    }

    #[inline]
    pub fn pending(&self) -> bool {
        self.enabled.intersects(self.requested)
    }

    #[inline]
    pub fn update_line(&mut self, cpsr_irqs_disabled: bool) {
        self.triggered = !cpsr_irqs_disabled && self.master_enable && self.pending();
    }

    pub fn write_master_enable(&mut self, value: bool, cpsr_irqs_disabled: bool) {
        self.master_enable = value;
        self.update_line(cpsr_irqs_disabled);
    }

    pub fn write_enabled(&mut self, value: IrqFlags, cpsr_irqs_disabled: bool) {
        self.enabled = value;
        self.update_line(cpsr_irqs_disabled);
    }

    /// IF write: set bits acknowledge the matching requests.
    pub fn write_requested(&mut self, value: IrqFlags, cpsr_irqs_disabled: bool) {
        self.requested &= !value;
        self.update_line(cpsr_irqs_disabled);
    }

    pub fn request(&mut self, flags: IrqFlags, cpsr_irqs_disabled: bool) {
        self.requested |= flags;
        self.update_line(cpsr_irqs_disabled);
    }

    #[inline]
    pub fn halt(&mut self, bits: u32) {
        self.halted |= bits;
    }

    #[inline]
    pub fn unhalt(&mut self, bits: u32) {
        self.halted &= !bits;
    }

    /// HALT drops as soon as an enabled interrupt is requested, even with
    /// IME clear on the ARM7 (matching hardware); the ARM9 also requires
    /// IME.
    pub fn check_halt(&mut self, needs_ime: bool) {
        if self.pending() && (!needs_ime || self.master_enable) {
            self.unhalt(super::halt::HALT);
        }
    }

    #[inline]
    pub fn halted_in_stop(&self) -> bool {
        self.halted & (halt::STOP | halt::GX_FIFO) != 0
    }
}
