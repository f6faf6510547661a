use crate::{cpu::arm7, utils::Bytes};

/// KEY1 state: a Blowfish-style P-array and S-boxes stored as one 0x412-word
/// buffer (P at 0x000..0x012, S-boxes at 0x012..0x412), plus the 16-byte
/// keycode scratch used while deriving level keys.
#[derive(Clone)]
pub struct KeyBuf {
    words: Box<[u32; 0x412]>,
}

impl KeyBuf {
    /// Seed from the encryption tables embedded in the ARM7 BIOS.
    pub fn from_arm7_bios(bios: &Bytes<{ arm7::BIOS_SIZE }>) -> Self {
        let mut words = Box::new([0; 0x412]);
        for (i, word) in words.iter_mut().enumerate() {
            *word = bios.read_le(0x30 + i * 4);
        }
        KeyBuf { words }
    }

    pub fn encrypt_64(&self, block: &mut [u8; 8]) {
        let mut y = u32::from_le_bytes(block[0..4].try_into().unwrap());
        let mut x = u32::from_le_bytes(block[4..8].try_into().unwrap());

        for i in 0..=0xF {
            let z = self.words[i] ^ x;
            x = self.feistel(z);
            x ^= y;
            y = z;
        }

        block[0..4].copy_from_slice(&(x ^ self.words[0x10]).to_le_bytes());
        block[4..8].copy_from_slice(&(y ^ self.words[0x11]).to_le_bytes());
    }

    pub fn decrypt_64(&self, block: &mut [u8; 8]) {
        let mut y = u32::from_le_bytes(block[0..4].try_into().unwrap());
        let mut x = u32::from_le_bytes(block[4..8].try_into().unwrap());

        for i in (0x2..=0x11).rev() {
            let z = self.words[i] ^ x;
            x = self.feistel(z);
            x ^= y;
            y = z;
        }

        block[0..4].copy_from_slice(&(x ^ self.words[0x1]).to_le_bytes());
        block[4..8].copy_from_slice(&(y ^ self.words[0x0]).to_le_bytes());
    }

    #[inline]
    fn feistel(&self, z: u32) -> u32 {
        let mut x = self.words[0x012 + (z >> 24 & 0xFF) as usize];
        x = x.wrapping_add(self.words[0x112 + (z >> 16 & 0xFF) as usize]);
        x ^= self.words[0x212 + (z >> 8 & 0xFF) as usize];
        x.wrapping_add(self.words[0x312 + (z & 0xFF) as usize])
    }

    /// Derive the key state for a KEY1 level from this (BIOS-seeded) state.
    pub fn level_keys(&self, game_code: u32, level: u8, modulo: usize) -> Self {
        let mut keys = self.clone();
        let mut keycode = [0u8; 16];
        keycode[0..4].copy_from_slice(&game_code.to_le_bytes());
        keycode[4..8].copy_from_slice(&(game_code / 2).to_le_bytes());
        keycode[8..12].copy_from_slice(&game_code.wrapping_mul(2).to_le_bytes());

        if level >= 1 {
            keys.apply_keycode(&mut keycode, modulo);
        }
        if level >= 2 {
            keys.apply_keycode(&mut keycode, modulo);
        }
        let second = u32::from_le_bytes(keycode[4..8].try_into().unwrap());
        let third = u32::from_le_bytes(keycode[8..12].try_into().unwrap());
        keycode[4..8].copy_from_slice(&second.wrapping_mul(2).to_le_bytes());
        keycode[8..12].copy_from_slice(&(third / 2).to_le_bytes());
        if level >= 3 {
            keys.apply_keycode(&mut keycode, modulo);
        }
        keys
    }

    fn apply_keycode(&mut self, keycode: &mut [u8; 16], modulo: usize) {
        let mut block: [u8; 8] = keycode[4..12].try_into().unwrap();
        self.encrypt_64(&mut block);
        keycode[4..12].copy_from_slice(&block);
        let mut block: [u8; 8] = keycode[0..8].try_into().unwrap();
        self.encrypt_64(&mut block);
        keycode[0..8].copy_from_slice(&block);

        for i in 0..=0x11 {
            let slice = u32::from_le_bytes(keycode[i * 4 % modulo..][..4].try_into().unwrap());
            self.words[i] ^= slice.swap_bytes();
        }

        let mut scratch = [0u8; 8];
        for i in (0..=0x410).step_by(2) {
            self.encrypt_64(&mut scratch);
            self.words[i] = u32::from_le_bytes(scratch[4..8].try_into().unwrap());
            self.words[i + 1] = u32::from_le_bytes(scratch[0..4].try_into().unwrap());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_keys() -> KeyBuf {
        // Any deterministic contents work for round-trip checks
        let mut bios = Bytes::new_zeroed();
        for i in 0..arm7::BIOS_SIZE {
            bios[i] = (i as u8).wrapping_mul(31).wrapping_add((i >> 8) as u8);
        }
        let base = KeyBuf::from_arm7_bios(&bios);
        base.level_keys(0x4A4D_4941, 2, 8)
    }

    #[test]
    fn encrypt_decrypt_round_trip() {
        let keys = test_keys();
        for seed in 0u64..8 {
            let block = (seed.wrapping_mul(0x9E37_79B9_7F4A_7C15)).to_le_bytes();
            let mut work = block;
            keys.encrypt_64(&mut work);
            assert_ne!(work, block);
            keys.decrypt_64(&mut work);
            assert_eq!(work, block);
        }
    }

    #[test]
    fn levels_differ() {
        let mut bios = Bytes::new_zeroed();
        for i in 0..arm7::BIOS_SIZE {
            bios[i] = (i as u8) ^ 0x5A;
        }
        let base = KeyBuf::from_arm7_bios(&bios);
        let l1 = base.level_keys(0x1234_5678, 1, 8);
        let l2 = base.level_keys(0x1234_5678, 2, 8);
        let mut a = [0u8; 8];
        let mut b = [0u8; 8];
        l1.encrypt_64(&mut a);
        l2.encrypt_64(&mut b);
        assert_ne!(a, b);
    }
}
