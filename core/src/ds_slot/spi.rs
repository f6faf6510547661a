mod eeprom_512b;
pub use eeprom_512b::Eeprom512b;
mod eeprom_fram;
pub use eeprom_fram::EepromFram;
mod flash;
pub use flash::Flash;

use crate::{utils::BoxedByteSlice, SaveContents};
use core::ops::Range;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CreationError {
    /// The save buffer length doesn't match any supported backup device.
    UnsupportedSize(usize),
}

/// Accumulates the byte interval modified since the last flush; `start`
/// only ever decreases and `end` only ever increases until taken.
#[derive(Default)]
pub(crate) struct DirtyRange(Option<Range<usize>>);

impl DirtyRange {
    pub fn mark(&mut self, addr: usize) {
        self.0 = Some(match self.0.take() {
            None => addr..addr + 1,
            Some(range) => range.start.min(addr)..range.end.max(addr + 1),
        });
    }

    pub fn take(&mut self) -> Option<Range<usize>> {
        self.0.take()
    }
}

/// The backup device wired to AUXSPI, selected by save size.
pub enum Backup {
    Eeprom512b(Eeprom512b),
    EepromFram(EepromFram),
    Flash(Flash),
}

impl Backup {
    /// Map a save image to its device: 512 B EEPROM, 8/64/128 KiB
    /// EEPROM/FRAM, 256 KiB-8 MiB flash (with the infrared front-end for
    /// 'I' game codes). An empty `New` request defaults to 512 KiB flash.
    pub fn detect(
        save: SaveContents,
        game_code: u32,
        #[cfg(feature = "log")] logger: slog::Logger,
    ) -> Result<Self, CreationError> {
        let len = match save.len() {
            0 => 0x8_0000,
            len => len,
        };
        let contents = save.get_or_create(|_| {
            let mut data = BoxedByteSlice::new_zeroed(len);
            data.fill(0xFF);
            data
        });
        let has_ir = game_code & 0xFF == b'I' as u32;

        #[cfg(feature = "log")]
        let _ = &logger;

        match len {
            0x200 => Ok(Backup::Eeprom512b(Eeprom512b::new(contents))),
            0x2000 | 0x1_0000 | 0x2_0000 => Ok(Backup::EepromFram(EepromFram::new(contents))),
            0x4_0000 | 0x8_0000 | 0x10_0000 | 0x80_0000 => {
                Ok(Backup::Flash(Flash::new(contents, has_ir)))
            }
            len => Err(CreationError::UnsupportedSize(len)),
        }
    }

    pub fn contents(&self) -> &[u8] {
        match self {
            Backup::Eeprom512b(device) => device.contents(),
            Backup::EepromFram(device) => device.contents(),
            Backup::Flash(device) => device.contents(),
        }
    }

    pub fn take_dirty_range(&mut self) -> Option<Range<usize>> {
        match self {
            Backup::Eeprom512b(device) => device.dirty.take(),
            Backup::EepromFram(device) => device.dirty.take(),
            Backup::Flash(device) => device.dirty.take(),
        }
    }

    /// Chip select released outside a transfer (AUXSPI re-enable).
    pub(crate) fn deselect(&mut self) {
        match self {
            Backup::Eeprom512b(device) => device.cs_active = false,
            Backup::EepromFram(device) => device.cs_active = false,
            Backup::Flash(device) => device.cs_active = false,
        }
    }

    /// Clock one byte through the device, returning the byte driven back.
    pub(crate) fn handle_byte(&mut self, value: u8, keep_active: bool) -> u8 {
        match self {
            Backup::Eeprom512b(device) => device.handle_byte(value, keep_active),
            Backup::EepromFram(device) => device.handle_byte(value, keep_active),
            Backup::Flash(device) => device.handle_byte(value, keep_active),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn device(len: usize) -> Backup {
        Backup::detect(
            SaveContents::New(len),
            0x0041_4141,
            #[cfg(feature = "log")]
            slog::Logger::root(slog::Discard, slog::o!()),
        )
        .unwrap()
    }

    fn transfer(backup: &mut Backup, bytes: &[u8]) -> Vec<u8> {
        let mut out = Vec::new();
        for (i, &byte) in bytes.iter().enumerate() {
            out.push(backup.handle_byte(byte, i + 1 != bytes.len()));
        }
        out
    }

    #[test]
    fn eeprom_write_read_and_dirty_interval() {
        let mut backup = device(0x1_0000);
        // WREN
        transfer(&mut backup, &[0x06]);
        // WRITE 'X', 'Y' at 0x1234
        transfer(&mut backup, &[0x02, 0x12, 0x34, b'X', b'Y']);
        assert_eq!(backup.contents()[0x1234], b'X');
        assert_eq!(backup.contents()[0x1235], b'Y');
        assert_eq!(backup.take_dirty_range(), Some(0x1234..0x1236));
        assert_eq!(backup.take_dirty_range(), None);

        let out = transfer(&mut backup, &[0x03, 0x12, 0x34, 0, 0]);
        assert_eq!(&out[3..], &[b'X', b'Y']);
    }

    #[test]
    fn flash_jedec_id_and_status() {
        let mut backup = device(0x8_0000);
        let out = transfer(&mut backup, &[0x9F, 0, 0, 0]);
        assert_eq!(&out[1..], &[0x20, 0x40, 0x13]);

        transfer(&mut backup, &[0x06]);
        let out = transfer(&mut backup, &[0x05, 0]);
        assert_eq!(out[1] & 2, 2);
    }

    #[test]
    fn flash_write_and_read_back() {
        let mut backup = device(0x4_0000);
        transfer(&mut backup, &[0x06]);
        transfer(&mut backup, &[0x0A, 0x01, 0x00, 0x10, 0xAB, 0xCD]);
        assert_eq!(backup.contents()[0x1_0010], 0xAB);
        assert_eq!(backup.contents()[0x1_0011], 0xCD);
        assert_eq!(backup.take_dirty_range(), Some(0x1_0010..0x1_0012));

        let out = transfer(&mut backup, &[0x03, 0x01, 0x00, 0x10, 0, 0]);
        assert_eq!(&out[4..], &[0xAB, 0xCD]);

        // Fast read has one dummy byte before data
        let out = transfer(&mut backup, &[0x0B, 0x01, 0x00, 0x10, 0, 0, 0]);
        assert_eq!(&out[5..], &[0xAB, 0xCD]);
    }

    #[test]
    fn unsupported_size_is_rejected() {
        assert!(matches!(
            Backup::detect(
                SaveContents::New(0x300),
                0,
                #[cfg(feature = "log")]
                slog::Logger::root(slog::Discard, slog::o!()),
            ),
            Err(CreationError::UnsupportedSize(0x300))
        ));
    }

    #[test]
    fn infrared_front_end() {
        let mut backup = Backup::detect(
            SaveContents::New(0x8_0000),
            0x0000_0049, // game code starting with 'I'
            #[cfg(feature = "log")]
            slog::Logger::root(slog::Discard, slog::o!()),
        )
        .unwrap();
        let out = transfer(&mut backup, &[0x08, 0x00]);
        assert_eq!(out[1], 0xAA);

        // Pass-through command reaches the flash
        let out = transfer(&mut backup, &[0x00, 0x9F, 0, 0, 0]);
        assert_eq!(&out[2..], &[0x20, 0x40, 0x13]);
    }
}
