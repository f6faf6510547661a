proc_bitfield::bitfield! {
    #[derive(Clone, Copy, PartialEq, Eq)]
    pub struct Control(pub u16): Debug {
        pub mode: u8 @ 0..=1,
        pub div_by_zero: bool @ 14,
        pub busy: bool @ 15,
    }
}

/// Hardware divider. Results are produced synchronously on every input
/// write, so the busy flag always reads back clear.
pub struct DivEngine {
    control: Control,
    numerator: i64,
    denominator: i64,
    result: i64,
    remainder: i64,
}

impl DivEngine {
    pub(crate) fn new() -> Self {
        DivEngine {
            control: Control(0),
            numerator: 0,
            denominator: 0,
            result: 0,
            remainder: 0,
        }
    }

    #[inline]
    pub fn control(&self) -> Control {
        self.control
    }

    #[inline]
    pub fn numerator(&self) -> i64 {
        self.numerator
    }

    #[inline]
    pub fn denominator(&self) -> i64 {
        self.denominator
    }

    #[inline]
    pub fn result(&self) -> i64 {
        self.result
    }

    #[inline]
    pub fn remainder(&self) -> i64 {
        self.remainder
    }

    pub fn write_control(&mut self, value: Control) {
        self.control.0 = (self.control.0 & 0x4000) | (value.0 & 3);
        self.recalc();
    }

    pub fn write_numerator(&mut self, value: i64) {
        self.numerator = value;
        self.recalc();
    }

    pub fn write_denominator(&mut self, value: i64) {
        self.denominator = value;
        self.recalc();
    }

    fn recalc(&mut self) {
        match self.control.mode() {
            0 => {
                let numer = self.numerator as i32;
                let denom = self.denominator as i32;
                if denom == 0 {
                    // 32-bit mode: ±1 in the low half, the inverted sign
                    // extension in the high half
                    self.result = if numer < 0 {
                        0xFFFF_FFFF_0000_0001u64 as i64
                    } else {
                        0x0000_0000_FFFF_FFFFu64 as i64
                    };
                    self.remainder = numer as i64;
                } else if numer == i32::MIN && denom == -1 {
                    self.result = (i32::MIN as u32 as u64) as i64;
                    self.remainder = 0;
                } else {
                    self.result = (numer / denom) as i64;
                    self.remainder = (numer % denom) as i64;
                }
            }
            mode => {
                let numer = self.numerator;
                let denom = if mode == 2 {
                    self.denominator
                } else {
                    self.denominator as i32 as i64
                };
                if denom == 0 {
                    self.result = if numer < 0 { 1 } else { -1 };
                    self.remainder = numer;
                } else if numer == i64::MIN && denom == -1 {
                    self.result = i64::MIN;
                    self.remainder = 0;
                } else {
                    self.result = numer / denom;
                    self.remainder = numer % denom;
                }
            }
        }
        self.control.set_div_by_zero(self.denominator == 0);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn div_by_zero_policy() {
        let mut div = DivEngine::new();
        div.write_control(Control(0).with_mode(2));
        div.write_numerator(123);
        div.write_denominator(0);
        assert_eq!(div.result(), -1);
        assert_eq!(div.remainder(), 123);
        assert!(div.control().div_by_zero());

        div.write_numerator(-123);
        assert_eq!(div.result(), 1);
        assert_eq!(div.remainder(), -123);
    }

    #[test]
    fn overflow_policy() {
        let mut div = DivEngine::new();
        div.write_control(Control(0).with_mode(2));
        div.write_numerator(i64::MIN);
        div.write_denominator(-1);
        assert_eq!(div.result(), i64::MIN);
        assert_eq!(div.remainder(), 0);
        assert!(!div.control().div_by_zero());
    }

    #[test]
    fn mode_1_sign_extends_denominator() {
        let mut div = DivEngine::new();
        div.write_control(Control(0).with_mode(1));
        div.write_numerator(100);
        div.write_denominator(0xFFFF_FFFFu32 as i64); // -1 as i32
        assert_eq!(div.result(), -100);
    }
}
