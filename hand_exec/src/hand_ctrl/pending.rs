//! Single slot holding the next command to commit to the hardware

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

use parking_lot::{Condvar, Mutex};
use std::time::Duration;

use crate::unit_map::AxisVector;

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// Holds at most one staged command.
///
/// Submitters block in [`PendingSlot::stage`] while the slot is occupied. The update loop empties
/// the slot with [`PendingSlot::take`], waking blocked submitters. Waiters also re-check the slot
/// every `poll_interval` in case a wakeup is missed.
pub struct PendingSlot {
    slot: Mutex<Option<PendingCommand>>,
    freed: Condvar,
    poll_interval: Duration,
}

// ---------------------------------------------------------------------------
// ENUMERATIONS
// ---------------------------------------------------------------------------

/// A command waiting to be committed, in hardware order and units.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum PendingCommand {
    /// Target angles
    ///
    /// Units: degrees
    Trajectory(AxisVector),

    /// Target velocities
    ///
    /// Units: degrees/second
    Velocity(AxisVector),
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl PendingSlot {
    pub fn new(poll_interval: Duration) -> Self {
        Self {
            slot: Mutex::new(None),
            freed: Condvar::new(),
            poll_interval,
        }
    }

    /// Stage a command, blocking until the slot is free.
    pub fn stage(&self, cmd: PendingCommand) {
        self.stage_if(cmd, || true, || ());
    }

    /// Stage a command once the slot is free, as long as `is_valid` still holds.
    ///
    /// `is_valid` is checked with the slot locked, every time the waiter wakes, so a command
    /// invalidated while waiting is dropped rather than staged. `on_stage` runs before the slot is
    /// released. Returns whether the command was staged.
    pub fn stage_if<V, S>(&self, cmd: PendingCommand, is_valid: V, on_stage: S) -> bool
    where
        V: Fn() -> bool,
        S: FnOnce(),
    {
        let mut slot = self.slot.lock();

        loop {
            if !is_valid() {
                return false;
            }

            if slot.is_none() {
                break;
            }

            self.freed.wait_for(&mut slot, self.poll_interval);
        }

        *slot = Some(cmd);
        on_stage();

        true
    }

    /// Remove the staged command, if any.
    ///
    /// `on_take` is called before the slot is released, so anyone who sees the slot empty also
    /// sees its effects.
    pub fn take_and<F: FnOnce()>(&self, on_take: F) -> Option<PendingCommand> {
        let mut slot = self.slot.lock();

        let cmd = slot.take();
        if cmd.is_some() {
            on_take();
            self.freed.notify_all();
        }

        cmd
    }

    pub fn take(&self) -> Option<PendingCommand> {
        self.take_and(|| ())
    }

    /// Discard the staged command.
    pub fn clear(&self) {
        self.take();
    }

    /// Discard the staged command, running `on_clear` with the slot locked.
    ///
    /// All waiters are woken so they re-check their commands against whatever `on_clear` changed.
    pub fn clear_and<F: FnOnce()>(&self, on_clear: F) {
        let mut slot = self.slot.lock();

        *slot = None;
        on_clear();
        self.freed.notify_all();
    }

    pub fn peek(&self) -> Option<PendingCommand> {
        *self.slot.lock()
    }

    pub fn is_occupied(&self) -> bool {
        self.slot.lock().is_some()
    }
}

impl PendingCommand {
    /// Name of the command type, for logs.
    pub fn kind(&self) -> &'static str {
        match self {
            PendingCommand::Trajectory(_) => "trajectory",
            PendingCommand::Velocity(_) => "velocity",
        }
    }
}

// ---------------------------------------------------------------------------
// TESTS
// ---------------------------------------------------------------------------

#[cfg(test)]
mod test {
    use super::*;
    use crossbeam_channel::unbounded;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn test_stage_blocks_until_taken() {
        let slot = Arc::new(PendingSlot::new(Duration::from_millis(10)));
        let first = PendingCommand::Velocity(AxisVector([1.0; 7]));
        let second = PendingCommand::Velocity(AxisVector([2.0; 7]));

        slot.stage(first);

        let (tx, rx) = unbounded();
        let slot_clone = slot.clone();
        let jh = thread::spawn(move || {
            slot_clone.stage(second);
            tx.send(()).unwrap();
        });

        // The second submitter can't proceed while the first command is staged
        assert!(rx.recv_timeout(Duration::from_millis(100)).is_err());
        assert_eq!(slot.peek(), Some(first));

        assert_eq!(slot.take(), Some(first));
        assert!(rx.recv_timeout(Duration::from_secs(1)).is_ok());
        assert_eq!(slot.take(), Some(second));

        jh.join().unwrap();
        assert!(!slot.is_occupied());
    }

    #[test]
    fn test_invalidated_while_waiting() {
        let slot = Arc::new(PendingSlot::new(Duration::from_millis(10)));
        let valid = Arc::new(AtomicBool::new(true));
        let first = PendingCommand::Velocity(AxisVector([1.0; 7]));
        let stale = PendingCommand::Velocity(AxisVector([2.0; 7]));

        slot.stage(first);

        let (tx, rx) = unbounded();
        let slot_clone = slot.clone();
        let valid_clone = valid.clone();
        let jh = thread::spawn(move || {
            let staged = slot_clone.stage_if(
                stale,
                || valid_clone.load(Ordering::SeqCst),
                || (),
            );
            tx.send(staged).unwrap();
        });

        assert!(rx.recv_timeout(Duration::from_millis(50)).is_err());

        slot.clear_and(|| valid.store(false, Ordering::SeqCst));
        assert_eq!(rx.recv_timeout(Duration::from_secs(1)), Ok(false));
        assert_eq!(slot.peek(), None);

        // Rejected up front as well
        let mut ran = false;
        assert!(!slot.stage_if(first, || false, || ran = true));
        assert!(!ran);
        assert!(slot.stage_if(first, || true, || ran = true));
        assert!(ran);

        jh.join().unwrap();
    }

    #[test]
    fn test_clear() {
        let slot = PendingSlot::new(Duration::from_millis(10));
        slot.stage(PendingCommand::Trajectory(AxisVector::default()));
        slot.clear();
        assert_eq!(slot.take(), None);

        let mut called = false;
        assert_eq!(slot.take_and(|| called = true), None);
        assert!(!called);
    }
}
