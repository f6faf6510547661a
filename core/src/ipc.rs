use crate::{
    cpu::{arm7::Arm7, arm9::Arm9, irqs::IrqFlags},
    emu::Emu,
    utils::Fifo,
};

proc_bitfield::bitfield! {
    #[derive(Clone, Copy, PartialEq, Eq)]
    pub struct Control(pub u16): Debug {
        pub send_fifo_empty: bool @ 0,
        pub send_fifo_full: bool @ 1,
        pub send_fifo_empty_irq_enabled: bool @ 2,
        pub send_fifo_clear: bool @ 3,
        pub recv_fifo_empty: bool @ 8,
        pub recv_fifo_full: bool @ 9,
        pub recv_fifo_not_empty_irq_enabled: bool @ 10,
        pub error: bool @ 14,
        pub fifos_enabled: bool @ 15,
    }
}

proc_bitfield::bitfield! {
    #[derive(Clone, Copy, PartialEq, Eq)]
    pub struct Sync(pub u16): Debug {
        pub input: u8 @ 0..=3,
        pub output: u8 @ 8..=11,
        pub send_irq: bool @ 13,
        pub irq_enabled: bool @ 14,
    }
}

/// Inter-processor sync register and the two 16-word FIFOs.
///
/// `queues[i]` holds the words waiting to be *received* by CPU `i`
/// (`i == 1` for the ARM9), i.e. the other CPU's send queue.
pub struct Ipc {
    sync: [Sync; 2],
    control: [Control; 2],
    queues: [Fifo<u32, 16>; 2],
    last_words: [u32; 2],
}

fn index(arm9: bool) -> usize {
    arm9 as usize
}

fn request_irq(emu: &mut Emu, arm9: bool, flags: IrqFlags) {
    if arm9 {
        Arm9::request_irq(emu, flags);
    } else {
        Arm7::request_irq(emu, flags);
    }
}

impl Ipc {
    pub(crate) fn new() -> Self {
        Ipc {
            sync: [Sync(0); 2],
            control: [Control(0x0101); 2],
            queues: [Fifo::new(), Fifo::new()],
            last_words: [0; 2],
        }
    }

    pub fn sync(&self, arm9: bool) -> Sync {
        let own = self.sync[index(arm9)];
        let peer = self.sync[index(!arm9)];
        Sync((own.0 & 0x4F00) | (peer.output() as u16))
    }

    pub fn write_sync(emu: &mut Emu, arm9: bool, value: Sync) {
        let ipc = &mut emu.ipc;
        let own = &mut ipc.sync[index(arm9)];
        own.0 = (own.0 & !0x4F00) | (value.0 & 0x4F00);
        if value.send_irq() && emu.ipc.sync[index(!arm9)].irq_enabled() {
            request_irq(emu, !arm9, IrqFlags::IPC_SYNC);
        }
    }

    pub fn control(&self, arm9: bool) -> Control {
        let mut control = self.control[index(arm9)];
        let send_queue = &self.queues[index(!arm9)];
        let recv_queue = &self.queues[index(arm9)];
        control.set_send_fifo_empty(send_queue.is_empty());
        control.set_send_fifo_full(send_queue.is_full());
        control.set_recv_fifo_empty(recv_queue.is_empty());
        control.set_recv_fifo_full(recv_queue.is_full());
        control.set_send_fifo_clear(false);
        control
    }

    pub fn write_control(emu: &mut Emu, arm9: bool, value: Control) {
        {
            let control = &mut emu.ipc.control[index(arm9)];
            control.0 = (control.0 & !0x8404) | (value.0 & 0x8404);
            // Error is acknowledged by writing it back as set
            if value.error() {
                control.set_error(false);
            }
        }

        if value.send_fifo_clear() {
            let was_empty = emu.ipc.queues[index(!arm9)].is_empty();
            emu.ipc.queues[index(!arm9)].clear();
            if !was_empty
                && emu.ipc.control[index(arm9)].send_fifo_empty_irq_enabled()
            {
                request_irq(emu, arm9, IrqFlags::IPC_SEND_FIFO_EMPTY);
            }
        }
    }

    pub fn send(emu: &mut Emu, arm9: bool, value: u32) {
        if !emu.ipc.control[index(arm9)].fifos_enabled() {
            return;
        }
        let queue = &mut emu.ipc.queues[index(!arm9)];
        if queue.is_full() {
            emu.ipc.control[index(arm9)].set_error(true);
            return;
        }
        let was_empty = queue.is_empty();
        queue.write(value);
        if was_empty && emu.ipc.control[index(!arm9)].recv_fifo_not_empty_irq_enabled() {
            request_irq(emu, !arm9, IrqFlags::IPC_RECV_FIFO_NOT_EMPTY);
        }
    }

    pub fn recv(emu: &mut Emu, arm9: bool) -> u32 {
        let i = index(arm9);
        if !emu.ipc.control[i].fifos_enabled() {
            return emu.ipc.queues[i].peek().unwrap_or(emu.ipc.last_words[i]);
        }
        match emu.ipc.queues[i].read() {
            None => {
                emu.ipc.control[i].set_error(true);
                emu.ipc.last_words[i]
            }
            Some(value) => {
                emu.ipc.last_words[i] = value;
                if emu.ipc.queues[i].is_empty()
                    && emu.ipc.control[index(!arm9)].send_fifo_empty_irq_enabled()
                {
                    request_irq(emu, !arm9, IrqFlags::IPC_SEND_FIFO_EMPTY);
                }
                value
            }
        }
    }
}
