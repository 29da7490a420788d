use std::{
    sync::{
        atomic::{AtomicBool, AtomicU8, Ordering},
        Arc,
    },
    thread::{self, JoinHandle},
    time::{Duration, Instant},
};

pub const TIMER_DEC_PER_SECOND: u64 = 60;

/// Delay and sound timers. Shared between the stepping thread and the
/// clock thread, so both live behind atomics.
#[derive(Debug, Default)]
pub struct Timers {
    delay: AtomicU8,
    sound: AtomicU8,
}

impl Timers {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn delay(&self) -> u8 {
        self.delay.load(Ordering::SeqCst)
    }

    pub fn sound(&self) -> u8 {
        self.sound.load(Ordering::SeqCst)
    }

    pub fn set_delay(&self, value: u8) {
        self.delay.store(value, Ordering::SeqCst);
    }

    pub fn set_sound(&self, value: u8) {
        self.sound.store(value, Ordering::SeqCst);
    }

    pub fn reset(&self) {
        self.set_delay(0);
        self.set_sound(0);
    }

    /// one 60Hz tick: both counters down by one, stopping at zero
    pub fn tick(&self) {
        Self::count_down(&self.delay);
        Self::count_down(&self.sound);
    }

    fn count_down(counter: &AtomicU8) {
        // Err just means the counter was already at zero
        let _ = counter.fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1));
    }
}

/// Background thread ticking a `Timers` at 60Hz until stopped or dropped.
pub struct TimerClock {
    running: Arc<AtomicBool>,
    handle: Option<JoinHandle<()>>,
}

impl TimerClock {
    pub fn spawn(timers: Arc<Timers>) -> Self {
        Self::spawn_with_period(
            timers,
            Duration::from_nanos(1_000_000_000 / TIMER_DEC_PER_SECOND),
        )
    }

    pub fn spawn_with_period(timers: Arc<Timers>, period: Duration) -> Self {
        let running = Arc::new(AtomicBool::new(true));
        let flag = Arc::clone(&running);
        let handle = thread::spawn(move || {
            log::debug!("timer clock started, period {period:?}");
            let mut deadline = Instant::now() + period;
            while flag.load(Ordering::SeqCst) {
                let now = Instant::now();
                if now < deadline {
                    thread::sleep(deadline - now);
                    continue;
                }
                timers.tick();
                deadline += period;
            }
            log::debug!("timer clock stopped");
        });
        Self {
            running,
            handle: Some(handle),
        }
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// signal the thread and wait for it
    pub fn stop(&mut self) {
        self.running.store(false, Ordering::SeqCst);
        if let Some(handle) = self.handle.take() {
            if handle.join().is_err() {
                log::error!("timer clock thread panicked");
            }
        }
    }
}

impl Drop for TimerClock {
    fn drop(&mut self) {
        self.stop();
    }
}
