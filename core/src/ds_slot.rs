pub mod rom;
pub mod spi;

use crate::{
    cpu::{arm7::Arm7, arm9::Arm9, dma, irqs::IrqFlags},
    emu::{schedule::Event, Emu},
};

proc_bitfield::bitfield! {
    #[derive(Clone, Copy, PartialEq, Eq)]
    pub struct RomControl(pub u32): Debug {
        pub key1_gap_length: u16 @ 0..=12,
        pub key2_encrypt_data: bool @ 13,
        pub key2_apply_seed: bool @ 15,
        pub key1_gap2_length: u8 @ 16..=21,
        pub key2_encrypt_commands: bool @ 22,
        pub data_ready: bool @ 23,
        pub block_size_shift: u8 @ 24..=26,
        pub transfer_clock_div_8: bool @ 27,
        pub key1_gap_clocks: bool @ 28,
        pub secure_area_mode: bool @ 29,
        pub write_enabled: bool @ 30,
        pub busy: bool @ 31,
    }
}

proc_bitfield::bitfield! {
    #[derive(Clone, Copy, PartialEq, Eq)]
    pub struct AuxSpiControl(pub u16): Debug {
        pub spi_baud_rate: u8 @ 0..=1,
        pub spi_hold_chip_select: bool @ 6,
        pub spi_busy: bool @ 7,
        pub ds_slot_mode: bool @ 13,
        pub rom_transfer_complete_irq_enabled: bool @ 14,
        pub ds_slot_enabled: bool @ 15,
    }
}

#[derive(Default)]
pub(crate) struct Transfer {
    pub command: [u8; 8],
    pub total_bytes: u32,
    pub bytes_read: u32,
    pub addr: u32,
    pub key1: bool,
    pub data_word: u32,
}

/// The DS cartridge slot: ROM command engine plus the AUXSPI link to the
/// backup chip.
pub struct DsSlot {
    pub rom: rom::Rom,
    pub backup: spi::Backup,
    pub rom_control: RomControl,
    pub aux_spi_control: AuxSpiControl,
    pub(crate) spi_data_out: u8,
    pub(crate) arm7_access: bool,
    pub(crate) rom_command: [u8; 8],
    pub(crate) transfer: Transfer,
}

impl DsSlot {
    pub(crate) fn new(rom: rom::Rom, backup: spi::Backup) -> Self {
        DsSlot {
            rom,
            backup,
            rom_control: RomControl(0),
            aux_spi_control: AuxSpiControl(0),
            spi_data_out: 0,
            arm7_access: false,
            rom_command: [0; 8],
            transfer: Transfer::default(),
        }
    }

    pub(crate) fn update_access(&mut self, arm7_access: bool) {
        self.arm7_access = arm7_access;
    }

    fn owned_by(&self, arm9: bool) -> bool {
        self.arm7_access != arm9
    }

    fn request_transfer_done_irq(emu: &mut Emu) {
        if emu.ds_slot.arm7_access {
            Arm7::request_irq(emu, IrqFlags::DS_SLOT_TRANSFER_DONE);
        } else {
            Arm9::request_irq(emu, IrqFlags::DS_SLOT_TRANSFER_DONE);
        }
    }

    pub fn write_aux_spi_control(emu: &mut Emu, arm9: bool, value: AuxSpiControl) {
        if !emu.ds_slot.owned_by(arm9) {
            return;
        }
        let slot = &mut emu.ds_slot;
        let old_enabled = slot.aux_spi_control.ds_slot_enabled();
        slot.aux_spi_control.0 = (slot.aux_spi_control.0 & !0xE043) | (value.0 & 0xE043);
        if !old_enabled && value.ds_slot_enabled() {
            slot.backup.deselect();
        }
    }

    pub fn write_aux_spi_control_low(emu: &mut Emu, arm9: bool, value: u8) {
        if !emu.ds_slot.owned_by(arm9) {
            return;
        }
        let control = &mut emu.ds_slot.aux_spi_control;
        control.0 = (control.0 & !0x43) | (value as u16 & 0x43);
    }

    pub fn write_aux_spi_control_high(emu: &mut Emu, arm9: bool, value: u8) {
        if !emu.ds_slot.owned_by(arm9) {
            return;
        }
        let slot = &mut emu.ds_slot;
        let old_enabled = slot.aux_spi_control.ds_slot_enabled();
        slot.aux_spi_control.0 =
            (slot.aux_spi_control.0 & !0xE000) | ((value as u16) << 8 & 0xE000);
        if !old_enabled && slot.aux_spi_control.ds_slot_enabled() {
            slot.backup.deselect();
        }
    }

    pub fn aux_spi_data(emu: &Emu, arm9: bool) -> u8 {
        if emu.ds_slot.owned_by(arm9) {
            emu.ds_slot.spi_data_out
        } else {
            0
        }
    }

    /// A write to AUXSPIDATA clocks one byte through the backup device and
    /// starts the serial busy window.
    pub fn write_aux_spi_data(emu: &mut Emu, arm9: bool, value: u8) {
        if !emu.ds_slot.owned_by(arm9)
            || !emu.ds_slot.aux_spi_control.ds_slot_enabled()
            || !emu.ds_slot.aux_spi_control.ds_slot_mode()
        {
            return;
        }

        let keep_active = emu.ds_slot.aux_spi_control.spi_hold_chip_select();
        emu.ds_slot.spi_data_out = emu.ds_slot.backup.handle_byte(value, keep_active);

        let baud = emu.ds_slot.aux_spi_control.spi_baud_rate() as u64;
        emu.schedule
            .schedule_event_after(Event::DsSlotSpiDone, 64 << baud);
        emu.ds_slot.aux_spi_control.set_spi_busy(true);
    }

    pub(crate) fn spi_transfer_done(emu: &mut Emu) {
        emu.ds_slot.aux_spi_control.set_spi_busy(false);
    }

    pub fn rom_control(emu: &Emu, arm9: bool) -> RomControl {
        if emu.ds_slot.owned_by(arm9) {
            emu.ds_slot.rom_control
        } else {
            RomControl(0)
        }
    }

    pub fn write_rom_command(emu: &mut Emu, arm9: bool, i: usize, value: u8) {
        if emu.ds_slot.owned_by(arm9) {
            emu.ds_slot.rom_command[i] = value;
        }
    }

    pub fn write_rom_control(emu: &mut Emu, arm9: bool, value: RomControl) {
        if !emu.ds_slot.owned_by(arm9) {
            return;
        }
        let slot = &mut emu.ds_slot;
        let old_busy = slot.rom_control.busy();
        // Bits 23 and 29 are controlled by the engine; bit 31 only starts
        slot.rom_control.0 =
            (slot.rom_control.0 & (1 << 23 | 1 << 29)) | (value.0 & !(1 << 23 | 1 << 31));

        let should_start = !old_busy && value.busy();
        if !should_start
            || !slot.aux_spi_control.ds_slot_enabled()
            || slot.aux_spi_control.ds_slot_mode()
        {
            return;
        }

        Self::start_rom_command(emu);
    }

    fn start_rom_command(emu: &mut Emu) {
        let slot = &mut emu.ds_slot;

        // Command bytes are latched MSB first
        for i in 0..8 {
            slot.transfer.command[i] = slot.rom_command[7 - i];
        }
        if slot.transfer.key1 {
            slot.rom.key1.decrypt_64(&mut slot.transfer.command);
        }

        slot.transfer.total_bytes = match slot.rom_control.block_size_shift() {
            0 => 0,
            7 => 4,
            shift => 0x100 << shift,
        };
        slot.transfer.bytes_read = 0;

        if slot.transfer.key1 {
            match slot.transfer.command[7] >> 4 {
                0x1 | 0x4 => {}
                0xA => slot.transfer.key1 = false,
                0x2 => {
                    slot.transfer.addr = ((slot.transfer.command[5] as u32 >> 4) & 7) << 12;
                }
                _ => {
                    #[cfg(feature = "log")]
                    slog::warn!(
                        slot.rom.logger,
                        "unhandled key1 command {:02X}",
                        slot.transfer.command[7]
                    );
                }
            }
        } else {
            match slot.transfer.command[7] {
                0x9F | 0x00 | 0x90 | 0xB8 => {}
                0x3C => {
                    slot.transfer.key1 = true;
                    slot.rom.init_key1(2);
                }
                0xB7 => {
                    let addr = u32::from_le_bytes([
                        slot.transfer.command[3],
                        slot.transfer.command[4],
                        slot.transfer.command[5],
                        slot.transfer.command[6],
                    ]) & slot.rom.read_mask();
                    // The secure area is never readable through B7
                    slot.transfer.addr = if addr < 0x8000 {
                        0x8000 + (addr & 0x1FF)
                    } else {
                        addr
                    };
                }
                _ => {
                    #[cfg(feature = "log")]
                    slog::warn!(
                        slot.rom.logger,
                        "unhandled command {:02X}",
                        slot.transfer.command[7]
                    );
                }
            }
        }

        let cycles_per_byte = if slot.rom_control.transfer_clock_div_8() {
            8
        } else {
            5
        };
        emu.schedule
            .schedule_event_after(Event::DsSlotRomTransfer, cycles_per_byte * 8);

        emu.ds_slot.rom_control.set_busy(true);
        emu.ds_slot.rom_control.set_data_ready(false);
    }

    fn finish_rom_transfer(emu: &mut Emu) {
        emu.ds_slot.rom_control.set_busy(false);
        emu.ds_slot.rom_control.set_data_ready(false);
        if emu.ds_slot.aux_spi_control.rom_transfer_complete_irq_enabled() {
            Self::request_transfer_done_irq(emu);
        }
    }

    /// A data word has become available on the bus.
    pub(crate) fn advance_rom_transfer(emu: &mut Emu) {
        let slot = &mut emu.ds_slot;
        slot.rom_control.set_data_ready(true);

        let transfer = &mut slot.transfer;
        transfer.data_word = if transfer.key1 {
            match transfer.command[7] >> 4 {
                0x1 => slot.rom.chip_id(),
                0x2 => {
                    let offset = (transfer.addr & !0xFFF)
                        | (transfer.addr.wrapping_add(transfer.bytes_read) & 0xFFF);
                    slot.rom.read_word(offset)
                }
                0xA => 0,
                _ => u32::MAX,
            }
        } else {
            match transfer.command[7] {
                0x00 => slot.rom.read_word(transfer.bytes_read & 0xFFF),
                0xB7 => {
                    let offset = (transfer.addr & !0xFFF)
                        | (transfer.addr.wrapping_add(transfer.bytes_read) & 0xFFF);
                    slot.rom.read_word(offset)
                }
                0x90 | 0xB8 => slot.rom.chip_id(),
                _ => u32::MAX,
            }
        };

        let arm7_access = emu.ds_slot.arm7_access;
        if arm7_access {
            dma::start_dmas::<Arm7>(emu, dma::timing::DS_SLOT_ARM7);
        } else {
            dma::start_dmas::<Arm9>(emu, dma::timing::DS_SLOT_ARM9);
        }

        if emu.ds_slot.transfer.total_bytes == 0 {
            Self::finish_rom_transfer(emu);
        }
    }

    /// Read the current data word, advancing the transfer.
    pub fn read_rom_data(emu: &mut Emu, arm9: bool) -> u32 {
        if !emu.ds_slot.owned_by(arm9) {
            return 0;
        }

        let transfer = &mut emu.ds_slot.transfer;
        transfer.bytes_read += 4;
        if transfer.bytes_read < transfer.total_bytes {
            let cycles_per_byte = if emu.ds_slot.rom_control.transfer_clock_div_8() {
                8
            } else {
                5
            };
            emu.schedule
                .schedule_event_after(Event::DsSlotRomTransfer, cycles_per_byte * 4);
            emu.ds_slot.rom_control.set_data_ready(false);
        } else if transfer.bytes_read == transfer.total_bytes {
            Self::finish_rom_transfer(emu);
        } else {
            transfer.bytes_read = transfer.total_bytes;
        }

        emu.ds_slot.transfer.data_word
    }
}
