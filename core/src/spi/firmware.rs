use crate::{emu::FIRMWARE_SIZE, utils::Bytes};

const FIRMWARE_MASK: u32 = (FIRMWARE_SIZE - 1) as u32;

/// The firmware flash on the ARM7 SPI bus. Only READ and RDSR are wired up;
/// the boot flows never program it.
pub struct Firmware {
    contents: Box<Bytes<FIRMWARE_SIZE>>,
    status: u8,
    cs_active: bool,
    command: u8,
    count: u32,
    addr: u32,
    data_out: u8,
}

impl Firmware {
    pub(super) fn new(contents: Box<Bytes<FIRMWARE_SIZE>>) -> Self {
        Firmware {
            contents,
            status: 0,
            cs_active: false,
            command: 0,
            count: 0,
            addr: 0,
            data_out: 0,
        }
    }

    #[inline]
    pub fn contents(&self) -> &Bytes<FIRMWARE_SIZE> {
        &self.contents
    }

    pub(super) fn deselect(&mut self) {
        self.cs_active = false;
    }

    pub(super) fn handle_byte(
        &mut self,
        value: u8,
        keep_active: bool,
        #[cfg(feature = "log")] logger: &slog::Logger,
    ) -> u8 {
        if !self.cs_active {
            self.command = value;
            self.count = 0;
        } else {
            match self.command {
                0x03 => match self.count {
                    1 => self.addr = (value as u32) << 16,
                    2 => self.addr |= (value as u32) << 8,
                    3 => self.addr |= value as u32,
                    _ => {
                        self.data_out = self.contents[(self.addr & FIRMWARE_MASK) as usize];
                        self.addr += 1;
                    }
                },
                0x05 => self.data_out = self.status,
                _command => {
                    #[cfg(feature = "log")]
                    slog::info!(logger, "unhandled firmware command {:02X}", _command);
                    self.data_out = 0;
                }
            }
        }

        self.count += 1;
        self.cs_active = keep_active;
        self.data_out
    }
}

/// Offset of the newer of the two user-settings blocks, decided by the
/// 16-bit update counter at +0x70.
pub fn newest_user_settings(contents: &Bytes<FIRMWARE_SIZE>) -> [u8; 0x70] {
    let base = (contents.read_le::<u16>(0x20) as usize) << 3;
    let base = base & (FIRMWARE_SIZE - 0x200);
    let count0 = contents.read_le::<u16>(base + 0x70);
    let count1 = contents.read_le::<u16>(base + 0x100 + 0x70);
    let offset = if count1.wrapping_sub(count0) & 0x7F < 0x40 {
        base + 0x100
    } else {
        base
    };
    let mut settings = [0; 0x70];
    settings.copy_from_slice(&contents[offset..offset + 0x70]);
    settings
}
