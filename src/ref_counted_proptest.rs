#![cfg(test)]

// Interleavings of a weak upgrade against the final release, driven one
// step at a time on a single thread so proptest can search and shrink
// schedules. The steps are the same primitives `WeakRef::lock` and
// `SharedPtr`'s drop use.

use crate::ref_counted::{RefCounter, WeakReference};
use proptest::prelude::*;
use std::ptr::NonNull;

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
enum Pc {
    // upgrade
    Pin,
    Read,
    TryAdd,
    Unpin,
    // release, and deletion when it was the last reference
    Release,
    Clear,
    WaitPins,
    Free,
    Done,
}

struct Actor {
    pc: Pc,
    attempts: usize,
    acquired: bool,
}

impl Actor {
    fn finish_attempt(&mut self) {
        self.attempts = self.attempts.saturating_sub(1);
        self.pc = if self.attempts == 0 { Pc::Done } else { Pc::Pin };
    }
}

struct World {
    counter: RefCounter,
    weak: NonNull<WeakReference>,
    dead: bool,
    freed: bool,
    frees: usize,
    successes: usize,
}

impl World {
    fn weak(&self) -> &WeakReference {
        // SAFETY: the test holds its own reference to the indirection.
        unsafe { self.weak.as_ref() }
    }

    fn runnable(&self, a: &Actor) -> bool {
        match a.pc {
            Pc::Done => false,
            Pc::WaitPins => self.weak().pins() == 0,
            _ => true,
        }
    }

    fn step(&mut self, a: &mut Actor) -> Result<(), TestCaseError> {
        match a.pc {
            Pc::Pin => {
                self.weak().pin();
                a.pc = Pc::Read;
            }
            Pc::Read => {
                a.pc = if self.weak().target().is_null() {
                    Pc::Unpin
                } else {
                    Pc::TryAdd
                };
            }
            Pc::TryAdd => {
                prop_assert!(!self.freed, "upgrade probed a freed object");
                a.acquired = self.counter.safe_add_ref();
                if a.acquired {
                    prop_assert!(!self.dead, "upgrade resurrected a dead object");
                    self.successes += 1;
                }
                a.pc = Pc::Unpin;
            }
            Pc::Unpin => {
                self.weak().unpin();
                if a.acquired {
                    a.pc = Pc::Release;
                } else {
                    a.finish_attempt();
                }
            }
            Pc::Release => {
                a.acquired = false;
                if self.counter.release() {
                    self.dead = true;
                    a.pc = Pc::Clear;
                } else {
                    a.finish_attempt();
                }
            }
            Pc::Clear => {
                self.weak().clear_target();
                a.pc = Pc::WaitPins;
            }
            Pc::WaitPins => {
                prop_assert_eq!(self.weak().pins(), 0);
                a.pc = Pc::Free;
            }
            Pc::Free => {
                self.freed = true;
                self.frees += 1;
                a.pc = Pc::Done;
            }
            Pc::Done => {}
        }
        Ok(())
    }
}

// Property: for every schedule of one owner dropping the last strong
// reference and one thread repeatedly upgrading a weak reference:
// - an upgrade never probes a freed object,
// - an upgrade never succeeds once the count has reached zero,
// - the object is freed exactly once, by whoever released last,
// - the deleter never waits forever on pins.
proptest! {
    #![proptest_config(ProptestConfig { cases: 256, .. ProptestConfig::default() })]
    #[test]
    fn prop_upgrade_races_final_release(
        attempts in 1usize..4,
        schedule in proptest::collection::vec(any::<bool>(), 0..48),
    ) {
        let anchor = Box::new(0u8);
        let owner = &*anchor as *const u8 as *mut ();
        let counter = RefCounter::new();
        counter.add_ref();
        let weak = counter.weak_ref(owner);
        // The upgrading thread's WeakRef.
        unsafe { weak.as_ref() }.add_ref();

        let mut world = World { counter, weak, dead: false, freed: false, frees: 0, successes: 0 };
        let mut owner_actor = Actor { pc: Pc::Release, attempts: 0, acquired: false };
        let mut upgrader = Actor { pc: Pc::Pin, attempts, acquired: false };

        let mut turns = schedule.into_iter();
        loop {
            let pick_upgrader = match (world.runnable(&owner_actor), world.runnable(&upgrader)) {
                (false, false) => break,
                (true, false) => false,
                (false, true) => true,
                (true, true) => turns.next().unwrap_or(true),
            };
            if pick_upgrader {
                world.step(&mut upgrader)?;
            } else {
                world.step(&mut owner_actor)?;
            }
        }

        prop_assert_eq!(owner_actor.pc, Pc::Done, "owner stalled");
        prop_assert_eq!(upgrader.pc, Pc::Done, "upgrader stalled");
        prop_assert_eq!(world.frees, 1);
        prop_assert!(world.successes <= attempts);
        prop_assert_eq!(world.counter.strong_count(), 0);
        prop_assert!(world.weak().is_detached());

        world.counter.detach_weak();
        prop_assert_eq!(world.weak().ref_count(), 1);
        // SAFETY: drops the upgrading thread's reference, the last one.
        unsafe { WeakReference::release(world.weak) };
    }
}
