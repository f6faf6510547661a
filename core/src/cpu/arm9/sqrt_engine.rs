proc_bitfield::bitfield! {
    #[derive(Clone, Copy, PartialEq, Eq)]
    pub struct Control(pub u16): Debug {
        pub input_64_bit: bool @ 0,
        pub busy: bool @ 15,
    }
}

/// Integer square root unit; like the divider, it completes synchronously.
pub struct SqrtEngine {
    control: Control,
    input: u64,
    result: u32,
}

impl SqrtEngine {
    pub(crate) fn new() -> Self {
        SqrtEngine {
            control: Control(0),
            input: 0,
            result: 0,
        }
    }

    #[inline]
    pub fn control(&self) -> Control {
        self.control
    }

    #[inline]
    pub fn input(&self) -> u64 {
        self.input
    }

    #[inline]
    pub fn result(&self) -> u32 {
        self.result
    }

    pub fn write_control(&mut self, value: Control) {
        self.control.0 = value.0 & 1;
        self.recalc();
    }

    pub fn write_input(&mut self, value: u64) {
        self.input = value;
        self.recalc();
    }

    fn recalc(&mut self) {
        let n = if self.control.input_64_bit() {
            self.input
        } else {
            self.input as u32 as u64
        };
        self.result = isqrt64(n);
    }
}

fn isqrt64(n: u64) -> u32 {
    let mut root: u64 = 0;
    let mut root_squared: u64 = 0;
    for i in (0..32).rev() {
        let try_squared = root_squared + (root << (i + 1)) + (1u64 << (i << 1));
        if try_squared <= n {
            root |= 1 << i;
            root_squared = try_squared;
        }
    }
    root as u32
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exact_and_truncated_roots() {
        let mut sqrt = SqrtEngine::new();
        sqrt.write_control(Control(0));
        sqrt.write_input(0x1_0000_0000 | 144); // upper half ignored in 32-bit mode
        assert_eq!(sqrt.result(), 12);

        sqrt.write_control(Control(0).with_input_64_bit(true));
        sqrt.write_input(1 << 62);
        assert_eq!(sqrt.result(), 1 << 31);

        sqrt.write_input(u64::MAX);
        assert_eq!(sqrt.result(), 0xFFFF_FFFF);

        sqrt.write_input(99);
        assert_eq!(sqrt.result(), 9);
    }
}
