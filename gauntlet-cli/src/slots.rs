//! Task slot bookkeeping.
//!
//! A fixed-capacity table of in-flight isolated tests, mapping OS process ids
//! to the tests that spawned them. Pure bookkeeping: all blocking and all
//! I/O live in the supervisor around the wait primitive, never here.

use crate::process::ChildGuard;
use gauntlet_core::{ExecError, Outcome, TestDef};
use std::time::Instant;

/// One in-flight isolated test.
#[derive(Debug)]
pub struct TaskSlot {
    /// OS process id of the spawned child.
    pub pid: u32,
    /// Monotonic timestamp captured with the spawn.
    pub submitted: Instant,
    /// The test that was submitted; the table never owns test lifetime.
    pub test: &'static TestDef,
    /// Final result; `None` while the child is still running. Set exactly
    /// once, just before the slot is reported and reclaimed.
    pub outcome: Option<Outcome>,
    /// RAII ownership of the child process.
    pub guard: ChildGuard,
}

/// Fixed-capacity table of [`TaskSlot`]s with O(1) swap-removal.
#[derive(Debug)]
pub struct SlotTable {
    slots: Vec<TaskSlot>,
    capacity: usize,
}

impl SlotTable {
    /// Allocate a table with room for `capacity` concurrent tasks.
    pub fn allocate(capacity: usize) -> Result<Self, ExecError> {
        let mut slots = Vec::new();
        slots
            .try_reserve_exact(capacity)
            .map_err(|_| ExecError::OutOfMemory)?;
        Ok(Self { slots, capacity })
    }

    /// Maximum number of simultaneously active tasks.
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Number of currently active tasks.
    pub fn active_count(&self) -> usize {
        self.slots.len()
    }

    /// Whether the table has no free slot left.
    pub fn is_full(&self) -> bool {
        self.slots.len() >= self.capacity
    }

    /// Record a newly spawned task.
    pub fn push(&mut self, slot: TaskSlot) -> Result<(), ExecError> {
        if self.is_full() {
            return Err(ExecError::BadState("task slot table is full"));
        }
        self.slots.push(slot);
        Ok(())
    }

    /// Index of the active slot owning `pid`, if any.
    pub fn find_by_pid(&self, pid: u32) -> Option<usize> {
        self.slots.iter().position(|slot| slot.pid == pid)
    }

    /// Mutable access to a slot by index.
    pub fn get_mut(&mut self, index: usize) -> Option<&mut TaskSlot> {
        self.slots.get_mut(index)
    }

    /// Remove a slot in O(1) by overwriting it with the last active slot.
    /// Table order is not preserved; completion order is authoritative.
    pub fn remove_swap(&mut self, index: usize) -> TaskSlot {
        self.slots.swap_remove(index)
    }

    /// Iterate the active slots in table order.
    pub fn iter(&self) -> impl Iterator<Item = &TaskSlot> {
        self.slots.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use gauntlet_core::{TestContext, TestKind, TestResult};

    fn pass(_ctx: &mut TestContext) -> TestResult {
        Ok(())
    }

    static TEST_A: TestDef = TestDef {
        id: "slots.a",
        name: "a",
        group: "slots",
        kind: TestKind::Unit,
        time_limit_secs: None,
        runner_fn: pass,
        file: file!(),
        line: line!(),
        module_path: module_path!(),
    };

    fn slot(pid: u32) -> TaskSlot {
        TaskSlot {
            pid,
            submitted: Instant::now(),
            test: &TEST_A,
            outcome: None,
            guard: ChildGuard::detached(),
        }
    }

    #[test]
    fn test_capacity_is_enforced() {
        let mut table = SlotTable::allocate(2).unwrap();
        table.push(slot(10)).unwrap();
        table.push(slot(11)).unwrap();
        assert!(table.is_full());
        assert!(matches!(
            table.push(slot(12)),
            Err(ExecError::BadState(_))
        ));
        assert_eq!(table.active_count(), 2);
    }

    #[test]
    fn test_find_by_pid() {
        let mut table = SlotTable::allocate(3).unwrap();
        table.push(slot(10)).unwrap();
        table.push(slot(11)).unwrap();
        assert_eq!(table.find_by_pid(11), Some(1));
        assert_eq!(table.find_by_pid(99), None);
    }

    #[test]
    fn test_swap_remove_preserves_the_other_records() {
        let mut table = SlotTable::allocate(3).unwrap();
        table.push(slot(10)).unwrap();
        table.push(slot(11)).unwrap();
        table.push(slot(12)).unwrap();

        let removed = table.remove_swap(0);
        assert_eq!(removed.pid, 10);
        assert_eq!(table.active_count(), 2);

        // The last slot moved into index 0; no record was lost or duplicated.
        let mut pids: Vec<u32> = table.iter().map(|s| s.pid).collect();
        pids.sort_unstable();
        assert_eq!(pids, [11, 12]);
    }

    #[test]
    fn test_remove_last_slot() {
        let mut table = SlotTable::allocate(2).unwrap();
        table.push(slot(10)).unwrap();
        table.push(slot(11)).unwrap();
        let removed = table.remove_swap(1);
        assert_eq!(removed.pid, 11);
        assert_eq!(table.find_by_pid(10), Some(0));
    }

    #[test]
    fn test_absurd_capacity_is_out_of_memory() {
        // A reservation no allocator can satisfy must surface as OutOfMemory,
        // not abort the process.
        let huge = usize::MAX / std::mem::size_of::<TaskSlot>();
        assert!(matches!(
            SlotTable::allocate(huge),
            Err(ExecError::OutOfMemory)
        ));
    }
}
