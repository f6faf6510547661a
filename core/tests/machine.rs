use duplex_core::{
    cpu::{arm7::Arm7, arm9::Arm9, Core},
    emu::{Builder, Emu, FrameInput, RunOutput},
    gpu::vram,
    utils::{BoxedByteSlice, Bytes},
    SaveContents,
};

const ARM9_ENTRY: u32 = 0x0200_0000;
const ARM7_ENTRY: u32 = 0x0380_0000;
const ARM_LOOP: u32 = 0xEAFF_FFFE; // b .

fn write_word(rom: &mut [u8], offset: usize, value: u32) {
    rom[offset..offset + 4].copy_from_slice(&value.to_le_bytes());
}

/// 512 KiB image whose ARM7 boot binary is a branch-to-self loop and whose
/// ARM9 binary is the given code.
fn test_rom_with(arm9_code: &[u32]) -> BoxedByteSlice {
    let mut rom = vec![0u8; 0x8_0000];
    rom[0xC..0x10].copy_from_slice(b"AAAA");
    // ARM9: offset 0x200, entry/load 0x02000000, 0x200 bytes
    write_word(&mut rom, 0x20, 0x200);
    write_word(&mut rom, 0x24, ARM9_ENTRY);
    write_word(&mut rom, 0x28, ARM9_ENTRY);
    write_word(&mut rom, 0x2C, 0x200);
    // ARM7: offset 0x400, entry/load 0x03800000, 0x100 bytes
    write_word(&mut rom, 0x30, 0x400);
    write_word(&mut rom, 0x34, ARM7_ENTRY);
    write_word(&mut rom, 0x38, ARM7_ENTRY);
    write_word(&mut rom, 0x3C, 0x100);
    for (i, &word) in arm9_code.iter().enumerate() {
        write_word(&mut rom, 0x200 + 4 * i, word);
    }
    write_word(&mut rom, 0x400, ARM_LOOP);
    BoxedByteSlice::from(rom)
}

fn test_rom() -> BoxedByteSlice {
    test_rom_with(&[ARM_LOOP])
}

fn boot_rom(rom: BoxedByteSlice, save: SaveContents) -> Emu {
    Builder::new(
        Bytes::new_zeroed(),
        Bytes::new_zeroed(),
        Bytes::new_zeroed(),
        rom,
        save,
    )
    .build()
    .expect("machine should boot")
}

fn boot_default() -> Emu {
    boot_rom(test_rom(), SaveContents::New(0x1_0000))
}

#[test]
fn direct_boot_loads_the_header_entries() {
    let mut emu = boot_default();

    // Both cores come up at their entry points with filled pipelines
    assert_eq!(emu.arm9.state.regs.gpr[15], ARM9_ENTRY + 4);
    assert_eq!(emu.arm7.state.regs.gpr[15], ARM7_ENTRY + 4);
    assert_eq!(emu.swram.control().0, 3);
    assert_eq!(emu.arm9.state.post_flag, 1);
    assert_eq!(emu.arm7.state.post_flag, 1);

    // The boot binary landed in main RAM
    assert_eq!(Arm9::bus_read::<u32>(&mut emu, ARM9_ENTRY), ARM_LOOP);
    assert_eq!(Arm7::bus_read::<u32>(&mut emu, ARM7_ENTRY), ARM_LOOP);
    // And the header was mirrored to the top of main RAM
    assert_eq!(
        Arm9::bus_read::<u32>(&mut emu, 0x023F_FE0C),
        u32::from_le_bytes(*b"AAAA")
    );
}

#[test]
fn frames_run_to_the_vertical_blank() {
    let mut emu = boot_default();
    let input = FrameInput::default();
    assert_eq!(emu.run_until_vblank(&input), RunOutput::Frame);
    // Each frame covers 193 scanlines before the blank fires, at 2130
    // undoubled cycles per line
    assert!(emu.arm9.state.cycles >= 2 * 192 * 2130);
    // The sample clock filled the frame's stereo buffer
    let samples = emu.audio_samples().len();
    assert!(samples >= 700 && samples % 2 == 0, "samples: {samples}");
    assert_eq!(emu.run_until_vblank(&input), RunOutput::Frame);
}

#[test]
fn vram_pages_or_merge_and_broadcast() {
    let mut emu = boot_default();

    // Bank A alone at engine A BG offset 0: direct mapping
    Arm9::bus_write::<u8>(&mut emu, 0x0400_0240, 0x81);
    emu.gpu.vram.write_bank::<u8>(vram::BANK_A, 0, 0xAA);
    assert_eq!(Arm9::bus_read::<u8>(&mut emu, 0x0600_0000), 0xAA);

    // Overlap bank B on the same pages: reads OR, writes broadcast
    Arm9::bus_write::<u8>(&mut emu, 0x0400_0241, 0x81);
    emu.gpu.vram.write_bank::<u8>(vram::BANK_B, 0, 0x55);
    assert_eq!(Arm9::bus_read::<u8>(&mut emu, 0x0600_0000), 0xFF);

    Arm9::bus_write::<u16>(&mut emu, 0x0600_0000, 0x0000);
    assert_eq!(emu.gpu.vram.read_bank::<u16>(vram::BANK_A, 0), 0);
    assert_eq!(emu.gpu.vram.read_bank::<u16>(vram::BANK_B, 0), 0);

    // Byte writes to video memory are dropped
    Arm9::bus_write::<u8>(&mut emu, 0x0600_0000, 0x77);
    assert_eq!(emu.gpu.vram.read_bank::<u8>(vram::BANK_A, 0), 0);
}

#[test]
fn cascaded_timer_counts_prescaled_overflows() {
    let mut emu = boot_default();

    // Timer 1 cascades off timer 0 (reload 0, prescaler 1)
    Arm9::bus_write::<u16>(&mut emu, 0x0400_0104, 0x0000);
    Arm9::bus_write::<u16>(&mut emu, 0x0400_0106, 0x0084);
    Arm9::bus_write::<u16>(&mut emu, 0x0400_0100, 0x0000);
    let start = emu.arm9.state.cycles;
    Arm9::bus_write::<u16>(&mut emu, 0x0400_0102, 0x0080);

    emu.run_until_vblank(&FrameInput::default());

    let elapsed = emu.arm9.state.cycles - start;
    // Timer 0 overflows once per 0x10000 of its (undoubled) cycles
    let expected_overflows = (elapsed >> 17) as u16;
    let timer1 = Arm9::bus_read::<u16>(&mut emu, 0x0400_0104);
    assert!(
        timer1 == expected_overflows || timer1 + 1 == expected_overflows,
        "timer1 = {timer1}, expected about {expected_overflows}"
    );
}

#[test]
fn ipc_fifo_loopback() {
    let mut emu = boot_default();
    let words = [0x1111_1111u32, 0x2222_2222, 0x3333_3333, 0x4444_4444];

    // Enable both FIFOs
    Arm9::bus_write::<u16>(&mut emu, 0x0400_0184, 0x8000);
    Arm7::bus_write::<u16>(&mut emu, 0x0400_0184, 0x8000);

    for &word in &words {
        Arm9::bus_write::<u32>(&mut emu, 0x0400_0188, word);
    }
    let control = Arm9::bus_read::<u16>(&mut emu, 0x0400_0184);
    assert_eq!(control & 1, 0, "send FIFO should not be empty");

    for &word in &words {
        assert_eq!(Arm7::bus_read::<u32>(&mut emu, 0x0410_0000), word);
    }

    let control = Arm9::bus_read::<u16>(&mut emu, 0x0400_0184);
    assert_eq!(control & 1, 1, "send FIFO empty flag re-asserts");
    let control = Arm7::bus_read::<u16>(&mut emu, 0x0400_0184);
    assert_eq!(control & 0x100, 0x100, "receive FIFO runs dry");
}

#[test]
fn immediate_dma_copies_and_disables() {
    let mut emu = boot_default();

    for i in 0..4u32 {
        Arm9::bus_write::<u32>(&mut emu, 0x0200_1000 + i * 4, 0xD00D_0000 | i);
    }
    // Channel 3: 4 words, 32-bit, immediate
    Arm9::bus_write::<u32>(&mut emu, 0x0400_00D4, 0x0200_1000);
    Arm9::bus_write::<u32>(&mut emu, 0x0400_00D8, 0x0200_2000);
    Arm9::bus_write::<u32>(&mut emu, 0x0400_00DC, 0x8400_0000 | 4);

    emu.run_until_vblank(&FrameInput::default());

    for i in 0..4u32 {
        assert_eq!(
            Arm9::bus_read::<u32>(&mut emu, 0x0200_2000 + i * 4),
            0xD00D_0000 | i
        );
    }
    let control = Arm9::bus_read::<u16>(&mut emu, 0x0400_00DE);
    assert_eq!(control & 0x8000, 0, "one-shot channel clears its enable");
}

#[test]
fn eeprom_writes_through_auxspi_track_the_dirty_interval() {
    let mut emu = boot_default();
    assert!(emu.take_save_dirty_range().is_none());

    let transfer = |emu: &mut Emu, bytes: &[u8]| {
        for (i, &byte) in bytes.iter().enumerate() {
            let hold = if i + 1 == bytes.len() { 0 } else { 0x40 };
            Arm9::bus_write::<u16>(emu, 0x0400_01A0, 0xA000 | hold);
            Arm9::bus_write::<u16>(emu, 0x0400_01A2, byte as u16);
        }
    };

    transfer(&mut emu, &[0x06]);
    transfer(&mut emu, &[0x02, 0x12, 0x34, b'X', b'Y']);

    assert_eq!(&emu.save_contents()[0x1234..0x1236], b"XY");
    assert_eq!(emu.take_save_dirty_range(), Some(0x1234..0x1236));
    assert!(emu.take_save_dirty_range().is_none());
}

#[test]
fn power_manager_shutdown_signals_the_frontend() {
    let mut emu = boot_default();

    // Select the power manager, then set register 0 bit 6
    Arm7::bus_write::<u16>(&mut emu, 0x0400_01C0, 0x8800);
    Arm7::bus_write::<u8>(&mut emu, 0x0400_01C2, 0x00);
    Arm7::bus_write::<u8>(&mut emu, 0x0400_01C2, 0x40);

    assert_eq!(
        emu.run_until_vblank(&FrameInput::default()),
        RunOutput::Shutdown
    );
    assert_eq!(
        emu.run_until_vblank(&FrameInput::default()),
        RunOutput::Shutdown
    );
}

#[test]
fn the_interpreter_retires_a_small_program() {
    let mut emu = boot_rom(
        test_rom_with(&[
            0xE3A0_0005, // mov r0, #5
            0xE280_0007, // add r0, r0, #7
            0xE3A0_1A02, // mov r1, #0x2000
            0xE585_0000, // str r0, [r5]
            0xE0812000, // add r2, r1, r0
            ARM_LOOP,
        ]),
        SaveContents::New(0x1_0000),
    );
    // r5 starts at 0, so make the store land somewhere harmless
    emu.arm9.state.regs.gpr[5] = 0x0200_8000;

    emu.run_until_vblank(&FrameInput::default());

    assert_eq!(emu.arm9.state.regs.gpr[0], 12);
    assert_eq!(emu.arm9.state.regs.gpr[1], 0x2000);
    assert_eq!(emu.arm9.state.regs.gpr[2], 0x200C);
    assert_eq!(Arm9::bus_read::<u32>(&mut emu, 0x0200_8000), 12);
}

#[test]
fn save_buffer_size_must_match_a_device() {
    let result = Builder::new(
        Bytes::new_zeroed(),
        Bytes::new_zeroed(),
        Bytes::new_zeroed(),
        test_rom(),
        SaveContents::New(0x300),
    )
    .build();
    assert!(result.is_err());
}
