use super::{irqs::IrqFlags, Core, RawTimestamp};
use crate::emu::{schedule::CpuEvent, Emu};

proc_bitfield::bitfield! {
    #[derive(Clone, Copy, PartialEq, Eq)]
    pub struct Control(pub u8): Debug {
        pub prescaler: u8 @ 0..=1,
        pub cascade: bool @ 2,
        pub irq_enabled: bool @ 6,
        pub running: bool @ 7,
    }
}

/// Prescaler selections {1, 64, 256, 1024} as left shifts applied to raw
/// cycles feeding the 16.10 fixed-point counter.
const SCALE_SHIFT: [u8; 4] = [10, 4, 2, 0];

const OVERFLOW: u32 = 0x1_0000 << 10;

#[derive(Clone, Copy)]
pub struct Timer {
    pub control: Control,
    pub reload: u16,
    /// 16.10 fixed-point count of prescaled cycles.
    pub(crate) counter: u32,
    shift: u8,
    last_update: RawTimestamp,
}

impl Timer {
    fn new() -> Self {
        Timer {
            control: Control(0),
            reload: 0,
            counter: 0,
            shift: SCALE_SHIFT[0],
            last_update: 0,
        }
    }
}

pub struct Timers(pub [Timer; 4]);

impl Timers {
    pub(crate) fn new() -> Self {
        Timers([Timer::new(); 4])
    }
}

#[inline]
fn scaled_elapsed<C: Core>(elapsed: RawTimestamp, shift: u8) -> RawTimestamp {
    if C::IS_ARM9 {
        (elapsed << shift) >> 1
    } else {
        elapsed << shift
    }
}

fn request_timer_irq<C: Core>(emu: &mut Emu, i: usize) {
    let state = C::state_mut(emu);
    let disabled = state.regs.cpsr.irqs_disabled();
    state.irqs.request(IrqFlags::timer(i), disabled);
}

fn reload_counter<C: Core>(emu: &mut Emu, i: usize) {
    let cycles = C::state(emu).cycles;
    let timer = &mut C::timers(emu).0[i];
    timer.counter = (timer.reload as u32) << 10;
    timer.last_update = cycles;
}

fn schedule_overflow<C: Core>(emu: &mut Emu, i: usize) {
    let timer = &C::timers(emu).0[i];
    let remaining = (OVERFLOW - timer.counter) as RawTimestamp;
    let dt = if C::IS_ARM9 {
        (remaining << 1) >> timer.shift
    } else {
        remaining >> timer.shift
    }
    .max(1);
    let cycles = C::state(emu).cycles;
    let time = emu
        .schedule
        .schedule_cpu_event_after(C::IS_ARM9, CpuEvent::timer(i), cycles, dt);
    let state = C::state_mut(emu);
    state.target_cycles = state.target_cycles.min(time);
}

fn on_overflow<C: Core>(emu: &mut Emu, i: usize) {
    let timer = &C::timers(emu).0[i];
    let irq = timer.control.irq_enabled();
    let cascade = timer.control.cascade();

    reload_counter::<C>(emu, i);

    if irq {
        request_timer_irq::<C>(emu, i);
    }

    if i != 3 {
        tick_cascade::<C>(emu, i + 1);
    }

    if !cascade {
        schedule_overflow::<C>(emu, i);
    }
}

fn tick_cascade<C: Core>(emu: &mut Emu, i: usize) {
    let timer = &mut C::timers(emu).0[i];
    if timer.control.running() && timer.control.cascade() {
        timer.counter += 1 << 10;
        if timer.counter >= OVERFLOW {
            on_overflow::<C>(emu, i);
        }
    }
}

/// Bring a free-running timer's counter up to the CPU clock.
fn update_counter<C: Core>(emu: &mut Emu, i: usize) {
    let cycles = C::state(emu).cycles;
    let timer = &mut C::timers(emu).0[i];
    if !timer.control.running() || timer.control.cascade() {
        return;
    }
    let elapsed = scaled_elapsed::<C>(cycles - timer.last_update, timer.shift);
    timer.counter = (timer.counter as RawTimestamp + elapsed) as u32;
    timer.last_update = cycles;
}

/// Scheduled overflow event: run the timer over the elapsed window, handling
/// however many overflows occurred, then re-arm.
pub(crate) fn handle_overflow_event<C: Core>(emu: &mut Emu, i: usize) {
    let cycles = C::state(emu).cycles;
    let timer = &C::timers(emu).0[i];
    if !timer.control.running() || timer.control.cascade() {
        return;
    }

    let mut remaining = scaled_elapsed::<C>(cycles - timer.last_update, timer.shift);
    C::timers(emu).0[i].last_update = cycles;
    while remaining != 0 {
        let timer = &mut C::timers(emu).0[i];
        let until_overflow = (OVERFLOW - timer.counter) as RawTimestamp;
        if remaining >= until_overflow {
            remaining -= until_overflow;
            on_overflow::<C>(emu, i);
        } else {
            timer.counter += remaining as u32;
            remaining = 0;
        }
    }

    schedule_overflow::<C>(emu, i);
}

pub fn read_counter<C: Core>(emu: &mut Emu, i: usize) -> u16 {
    update_counter::<C>(emu, i);
    (C::timers(emu).0[i].counter >> 10) as u16
}

pub fn write_reload<C: Core>(emu: &mut Emu, i: usize, value: u16) {
    C::timers(emu).0[i].reload = value;
}

pub fn write_control<C: Core>(emu: &mut Emu, i: usize, value: Control) {
    let timer = &C::timers(emu).0[i];
    let old_running = timer.control.running();
    let running = value.running();
    let cascade = value.cascade();

    if !old_running && running {
        reload_counter::<C>(emu, i);
    } else if old_running && !running {
        update_counter::<C>(emu, i);
        emu.schedule.cancel_cpu_event(C::IS_ARM9, CpuEvent::timer(i));
    } else if old_running {
        update_counter::<C>(emu, i);
        if cascade {
            emu.schedule.cancel_cpu_event(C::IS_ARM9, CpuEvent::timer(i));
        }
    }

    let timer = &mut C::timers(emu).0[i];
    timer.control = Control(value.0 & 0xC7);
    timer.shift = SCALE_SHIFT[value.prescaler() as usize];

    if running && !cascade {
        schedule_overflow::<C>(emu, i);
    }
}
