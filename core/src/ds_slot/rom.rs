pub mod header;
pub mod key1;

use crate::utils::BoxedByteSlice;
use key1::KeyBuf;

pub const MIN_SIZE: usize = 0x160;
pub const MAX_SIZE: usize = 0x2000_0000;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CreationError {
    TooSmall,
    TooLarge,
}

/// Cartridge ROM image plus the KEY1 state used to authenticate commands.
pub struct Rom {
    contents: BoxedByteSlice,
    read_mask: u32,
    chip_id: u32,
    game_code: u32,
    pub(crate) key1: KeyBuf,
    key1_level_keys: KeyBuf,
    #[cfg(feature = "log")]
    pub(crate) logger: slog::Logger,
}

fn make_chip_id(size: usize) -> u32 {
    let size_byte = if size >> 20 <= 0x80 {
        match size >> 20 {
            0 => 0,
            mib => mib as u8 - 1,
        }
    } else {
        (0x100 - (size >> 28)) as u8
    };
    (size_byte as u32) << 8 | 0xC2
}

impl Rom {
    pub fn new(
        contents: BoxedByteSlice,
        arm7_bios: &crate::utils::Bytes<{ crate::cpu::arm7::BIOS_SIZE }>,
        #[cfg(feature = "log")] logger: slog::Logger,
    ) -> Result<Self, CreationError> {
        if contents.len() < MIN_SIZE {
            return Err(CreationError::TooSmall);
        }
        if contents.len() > MAX_SIZE {
            return Err(CreationError::TooLarge);
        }

        let game_code = contents.read_le::<u32>(0xC);
        let chip_id = make_chip_id(contents.len());
        let read_mask = (contents.len().next_power_of_two() - 1) as u32;
        let level_keys = KeyBuf::from_arm7_bios(arm7_bios);

        let mut rom = Rom {
            contents,
            read_mask,
            chip_id,
            game_code,
            key1: level_keys.clone(),
            key1_level_keys: level_keys,
            #[cfg(feature = "log")]
            logger,
        };
        rom.key1 = rom.key1_level_keys.level_keys(game_code, 1, 8);
        rom.encrypt_secure_area();
        Ok(rom)
    }

    #[inline]
    pub fn contents(&self) -> &[u8] {
        &self.contents
    }

    #[inline]
    pub fn read_mask(&self) -> u32 {
        self.read_mask
    }

    #[inline]
    pub fn chip_id(&self) -> u32 {
        self.chip_id
    }

    #[inline]
    pub fn game_code(&self) -> u32 {
        self.game_code
    }

    /// Derive the KEY1 state for the given level from the BIOS seed.
    pub(crate) fn init_key1(&mut self, level: u8) {
        self.key1 = self.key1_level_keys.level_keys(self.game_code, level, 8);
    }

    /// Word read with out-of-chip reads returning open bus.
    pub fn read_word(&self, offset: u32) -> u32 {
        let offset = offset as usize;
        if offset + 4 <= self.contents.len() {
            self.contents.read_le(offset)
        } else {
            u32::MAX
        }
    }

    pub fn parse_header(&self) -> Result<header::Header, header::ParseError> {
        header::Header::parse(&self.contents)
    }

    /// Re-encrypt the secure area when the image carries a decrypted one
    /// (the 8-byte marker is still present).
    fn encrypt_secure_area(&mut self) {
        if self.contents.len() < 0x8000 {
            return;
        }
        if self.contents.read_le::<u64>(0x4000) != 0xE7FF_DEFF_E7FF_DEFF {
            return;
        }

        self.contents[0x4000..0x4008].copy_from_slice(b"encryObj");
        let key3 = self.key1_level_keys.level_keys(self.game_code, 3, 8);
        for i in (0..0x800).step_by(8) {
            let mut block = [0; 8];
            block.copy_from_slice(&self.contents[0x4000 + i..0x4008 + i]);
            key3.encrypt_64(&mut block);
            self.contents[0x4000 + i..0x4008 + i].copy_from_slice(&block);
        }

        let key2 = self.key1_level_keys.level_keys(self.game_code, 2, 8);
        let mut block = [0; 8];
        block.copy_from_slice(&self.contents[0x4000..0x4008]);
        key2.encrypt_64(&mut block);
        self.contents[0x4000..0x4008].copy_from_slice(&block);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn chip_id_encodes_size() {
        assert_eq!(make_chip_id(0x8_0000), 0xC2);
        assert_eq!(make_chip_id(0x10_0000), 0xC2);
        assert_eq!(make_chip_id(0x80_0000), 0x7C2);
        assert_eq!(make_chip_id(0x1000_0000), 0xF0C2);
    }
}
