#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Mode {
    User,
    Fiq,
    Irq,
    Supervisor,
    Abort,
    Undefined,
    System,
}

/// Register bank selected by a mode; `System` covers both USR and SYS.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Bank {
    System,
    Fiq,
    Irq,
    Supervisor,
    Abort,
    Undefined,
}

impl Mode {
    #[inline]
    pub const fn from_raw(raw: u8) -> Option<Self> {
        match raw & 0x1F {
            0x10 => Some(Mode::User),
            0x11 => Some(Mode::Fiq),
            0x12 => Some(Mode::Irq),
            0x13 => Some(Mode::Supervisor),
            0x17 => Some(Mode::Abort),
            0x1B => Some(Mode::Undefined),
            0x1F => Some(Mode::System),
            _ => None,
        }
    }

    #[inline]
    pub const fn raw(self) -> u8 {
        match self {
            Mode::User => 0x10,
            Mode::Fiq => 0x11,
            Mode::Irq => 0x12,
            Mode::Supervisor => 0x13,
            Mode::Abort => 0x17,
            Mode::Undefined => 0x1B,
            Mode::System => 0x1F,
        }
    }

    #[inline]
    pub const fn is_privileged(self) -> bool {
        !matches!(self, Mode::User)
    }

    #[inline]
    pub const fn has_spsr(self) -> bool {
        !matches!(self, Mode::User | Mode::System)
    }

    #[inline]
    pub const fn reg_bank(self) -> Bank {
        match self {
            Mode::User | Mode::System => Bank::System,
            Mode::Fiq => Bank::Fiq,
            Mode::Irq => Bank::Irq,
            Mode::Supervisor => Bank::Supervisor,
            Mode::Abort => Bank::Abort,
            Mode::Undefined => Bank::Undefined,
        }
    }
}

proc_bitfield::bitfield! {
    #[derive(Clone, Copy, PartialEq, Eq)]
    pub struct Psr(pub u32): Debug {
        pub raw: u32 [read_only] @ ..,
        pub raw_mode: u8 @ 0..=4,
        pub thumb_state: bool @ 5,
        pub fiqs_disabled: bool @ 6,
        pub irqs_disabled: bool @ 7,
        pub sticky_overflow: bool @ 27,
        pub overflow: bool @ 28,
        pub carry: bool @ 29,
        pub zero: bool @ 30,
        pub negative: bool @ 31,
    }
}

impl Psr {
    #[inline]
    pub const fn from_raw(raw: u32) -> Self {
        Psr(raw)
    }

    /// Mode field decoded, falling back to SYS for the unpredictable
    /// encodings so a bad MSR can't wedge the bank bookkeeping.
    #[inline]
    pub fn mode(self) -> Mode {
        Mode::from_raw(self.raw_mode()).unwrap_or(Mode::System)
    }

    #[inline]
    pub fn set_mode(&mut self, mode: Mode) {
        self.set_raw_mode(mode.raw());
    }

    #[inline]
    pub fn condition_flags(self) -> u32 {
        self.0 >> 28
    }

    #[inline]
    pub fn copy_nzcv(&mut self, value: u32) {
        self.0 = (self.0 & !0xF000_0000) | (value & 0xF000_0000);
    }
}

impl Default for Psr {
    fn default() -> Self {
        Psr::from_raw(Mode::Supervisor.raw() as u32)
    }
}
