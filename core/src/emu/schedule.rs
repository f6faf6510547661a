use crate::cpu::RawTimestamp;

/// Upper bound on how far a CPU may run past `now` before the scheduler
/// regains control, in doubled units.
pub const BATCH_CYCLES: RawTimestamp = 64;

/// Machine-wide events. Fire times are stored in doubled-ARM9 units.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Event {
    HblankStart,
    HblankEnd,
    DsSlotRomTransfer,
    DsSlotSpiDone,
    AudioSample,
}

impl Event {
    pub const LEN: usize = 5;

    const ALL: [Event; Self::LEN] = [
        Event::HblankStart,
        Event::HblankEnd,
        Event::DsSlotRomTransfer,
        Event::DsSlotSpiDone,
        Event::AudioSample,
    ];
}

/// Per-CPU events, compared against that CPU's own clock (native units, so
/// ARM7 slots hold undoubled times).
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CpuEvent {
    StartImmediateDmas,
    Timer0Overflow,
    Timer1Overflow,
    Timer2Overflow,
    Timer3Overflow,
    SpiDone,
}

impl CpuEvent {
    pub const LEN: usize = 6;

    const ALL: [CpuEvent; Self::LEN] = [
        CpuEvent::StartImmediateDmas,
        CpuEvent::Timer0Overflow,
        CpuEvent::Timer1Overflow,
        CpuEvent::Timer2Overflow,
        CpuEvent::Timer3Overflow,
        CpuEvent::SpiDone,
    ];

    #[inline]
    pub fn timer(i: usize) -> Self {
        Self::ALL[CpuEvent::Timer0Overflow as usize + i]
    }
}

#[derive(Clone, Copy, Default)]
struct Slot {
    enabled: bool,
    time: RawTimestamp,
}

/// Event tables plus the global clock. `now` never regresses; events armed
/// in the past fire on the next drain.
pub struct Schedule {
    pub now: RawTimestamp,
    events: [Slot; Event::LEN],
    arm9_events: [Slot; CpuEvent::LEN],
    arm7_events: [Slot; CpuEvent::LEN],
}

impl Schedule {
    pub(crate) fn new() -> Self {
        Schedule {
            now: 0,
            events: [Slot::default(); Event::LEN],
            arm9_events: [Slot::default(); CpuEvent::LEN],
            arm7_events: [Slot::default(); CpuEvent::LEN],
        }
    }

    /// Minimum enabled fire time, clamped to `now + BATCH_CYCLES` so the CPU
    /// inner loops stay bounded. Result is in doubled units.
    pub fn next_event_time(&self) -> RawTimestamp {
        let mut time = self.now + BATCH_CYCLES;
        for slot in &self.events {
            if slot.enabled {
                time = time.min(slot.time);
            }
        }
        for slot in &self.arm9_events {
            if slot.enabled {
                time = time.min(slot.time);
            }
        }
        for slot in &self.arm7_events {
            if slot.enabled {
                time = time.min(slot.time << 1);
            }
        }
        time
    }

    /// Arm a machine event at absolute time `t` (undoubled units).
    pub fn schedule_event(&mut self, event: Event, t: RawTimestamp) {
        let slot = &mut self.events[event as usize];
        slot.enabled = true;
        slot.time = t << 1;
    }

    /// Re-arm a machine event `dt` (undoubled units) after its previous fire
    /// time, keeping periodic events drift-free.
    pub fn reschedule_event_after(&mut self, event: Event, dt: RawTimestamp) {
        let slot = &mut self.events[event as usize];
        slot.enabled = true;
        slot.time += dt << 1;
    }

    /// Arm a machine event `dt` (undoubled units) from now.
    pub fn schedule_event_after(&mut self, event: Event, dt: RawTimestamp) {
        let slot = &mut self.events[event as usize];
        slot.enabled = true;
        slot.time = self.now + (dt << 1);
    }

    pub fn cancel_event(&mut self, event: Event) {
        self.events[event as usize].enabled = false;
    }

    pub fn event_enabled(&self, event: Event) -> bool {
        self.events[event as usize].enabled
    }

    pub(crate) fn pop_pending_event(&mut self) -> Option<Event> {
        for event in Event::ALL {
            let slot = &mut self.events[event as usize];
            if slot.enabled && self.now >= slot.time {
                slot.enabled = false;
                return Some(event);
            }
        }
        None
    }

    fn cpu_events(&mut self, arm9: bool) -> &mut [Slot; CpuEvent::LEN] {
        if arm9 {
            &mut self.arm9_events
        } else {
            &mut self.arm7_events
        }
    }

    /// Arm a per-CPU event `dt` cycles from the CPU's current clock; `dt`
    /// and `cycles` are in that CPU's native units. Returns the fire time so
    /// the caller can lower its target.
    pub fn schedule_cpu_event_after(
        &mut self,
        arm9: bool,
        event: CpuEvent,
        cycles: RawTimestamp,
        dt: RawTimestamp,
    ) -> RawTimestamp {
        let time = cycles + dt;
        let slot = &mut self.cpu_events(arm9)[event as usize];
        slot.enabled = true;
        slot.time = time;
        time
    }

    pub fn cancel_cpu_event(&mut self, arm9: bool, event: CpuEvent) {
        self.cpu_events(arm9)[event as usize].enabled = false;
    }

    pub(crate) fn pop_pending_cpu_event(
        &mut self,
        arm9: bool,
        cpu_time: RawTimestamp,
    ) -> Option<CpuEvent> {
        for event in CpuEvent::ALL {
            let slot = &mut self.cpu_events(arm9)[event as usize];
            if slot.enabled && cpu_time >= slot.time {
                slot.enabled = false;
                return Some(event);
            }
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clamps_to_batch_length() {
        let schedule = Schedule::new();
        assert_eq!(schedule.next_event_time(), BATCH_CYCLES);
    }

    #[test]
    fn arm7_times_compare_doubled() {
        let mut schedule = Schedule::new();
        schedule.schedule_cpu_event_after(false, CpuEvent::StartImmediateDmas, 0, 10);
        assert_eq!(schedule.next_event_time(), 20);
    }

    #[test]
    fn events_in_the_past_fire_immediately() {
        let mut schedule = Schedule::new();
        schedule.schedule_event(Event::HblankStart, 4);
        schedule.now = 100;
        assert_eq!(schedule.pop_pending_event(), Some(Event::HblankStart));
        assert_eq!(schedule.pop_pending_event(), None);
    }
}
