pub mod firmware;
pub mod power;
pub mod tsc;

use crate::{
    cpu::{arm7::Arm7, irqs::IrqFlags},
    emu::{schedule::CpuEvent, Emu, FIRMWARE_SIZE},
    utils::Bytes,
};
use firmware::Firmware;
use power::Power;
use tsc::Tsc;

proc_bitfield::bitfield! {
    #[derive(Clone, Copy, PartialEq, Eq)]
    pub struct Control(pub u16): Debug {
        pub baud_rate: u8 @ 0..=1,
        pub busy: bool @ 7,
        pub device: u8 @ 8..=9,
        pub transfer_16_bit: bool @ 10,
        pub hold_chip_select: bool @ 11,
        pub irq_enabled: bool @ 14,
        pub enabled: bool @ 15,
    }
}

/// The ARM7 SPI bus: power manager, firmware flash and touchscreen
/// converter.
pub struct Controller {
    pub control: Control,
    pub firmware: Firmware,
    pub power: Power,
    pub tsc: Tsc,
    data_out: u8,
    #[cfg(feature = "log")]
    logger: slog::Logger,
}

impl Controller {
    pub(crate) fn new(
        firmware: Box<Bytes<FIRMWARE_SIZE>>,
        #[cfg(feature = "log")] logger: slog::Logger,
    ) -> Self {
        Controller {
            control: Control(0),
            firmware: Firmware::new(firmware),
            power: Power::new(),
            tsc: Tsc::new(),
            data_out: 0,
            #[cfg(feature = "log")]
            logger,
        }
    }

    #[inline]
    pub fn data_out(&self) -> u8 {
        self.data_out
    }

    pub fn write_control(emu: &mut Emu, value: Control) {
        let spi = &mut emu.spi;
        let old = spi.control;
        spi.control.0 = (spi.control.0 & 0x80) | (value.0 & 0xCF03);
        if (!old.enabled() && value.enabled()) || old.device() != value.device() {
            spi.firmware.deselect();
            spi.power.deselect();
            spi.tsc.deselect();
        }
    }

    pub fn write_data(emu: &mut Emu, value: u8) {
        if !emu.spi.control.enabled() {
            return;
        }

        let keep_active = emu.spi.control.hold_chip_select();
        let spi = &mut emu.spi;
        spi.data_out = match spi.control.device() {
            0 => spi.power.handle_byte(value, keep_active, &mut emu.shutdown),
            1 => spi.firmware.handle_byte(
                value,
                keep_active,
                #[cfg(feature = "log")]
                &spi.logger,
            ),
            2 => spi.tsc.handle_byte(value, keep_active),
            _ => {
                #[cfg(feature = "log")]
                slog::info!(spi.logger, "write to reserved SPI device");
                0
            }
        };

        let baud = emu.spi.control.baud_rate() as u64;
        let cycles = emu.arm7.state.cycles;
        let time =
            emu.schedule
                .schedule_cpu_event_after(false, CpuEvent::SpiDone, cycles, (64 << baud) * 2);
        let state = &mut emu.arm7.state;
        state.target_cycles = state.target_cycles.min(time);
        emu.spi.control.set_busy(true);
    }

    pub(crate) fn transfer_done(emu: &mut Emu) {
        emu.spi.control.set_busy(false);
        if emu.spi.control.irq_enabled() {
            Arm7::request_irq(emu, IrqFlags::SPI);
        }
    }
}
