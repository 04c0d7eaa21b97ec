//! Tournament barrier.
//!
//! Threads are statically assigned a role for every level of a knockout
//! bracket. Winners wait for their opponent's signal and move up; losers
//! signal, park, and are released top-down once the champion has observed the
//! final signal. Wakeup retraces the climb, so the release fans out along the
//! same pairings the arrivals came in on.

use crossbeam_utils::CachePadded;

use crate::bits::log2_ceil;
use crate::primitives::{AtomicUsize, Backoff, Ordering};

/// A participant's statically assigned behavior at one bracket level.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum Role {
    /// Level-0 sentinel marking the bottom of the wakeup path. Also fills
    /// levels an eliminated thread never consults.
    Dropout,
    /// Waits for the loser's signal, then advances a level.
    Winner,
    /// Signals its winner, parks, and is released during wakeup.
    Loser,
    /// No opponent at this level (cohort not a power of two); advances for
    /// free.
    Bye,
    /// The single thread that wins the bracket outright and starts the
    /// wakeup phase.
    Champion,
}

struct RoundSlot {
    flag: AtomicUsize,
    role: Role,
    opponent: Option<usize>,
}

/// A statically scheduled pairwise-elimination barrier.
pub struct TournamentBarrier {
    players: Vec<CachePadded<Vec<RoundSlot>>>,
    rounds: usize,
    next_vpid: AtomicUsize,
}

/// Per-thread arrival state for a [`TournamentBarrier`].
#[derive(Debug)]
pub struct TournamentState {
    sense: usize,
    vpid: usize,
}

impl TournamentState {
    /// The sense value the next arrival will publish.
    #[must_use]
    pub fn sense(&self) -> usize {
        self.sense
    }

    /// This participant's identity, in `0..nthr`.
    #[must_use]
    pub fn vpid(&self) -> usize {
        self.vpid
    }
}

impl TournamentBarrier {
    /// Builds the role and opponent tables for `nthr` participants.
    ///
    /// Exactly one thread (thread 0, at the top level) is assigned
    /// [`Role::Champion`]. Levels that an eliminated thread never plays are
    /// left as [`Role::Dropout`].
    ///
    /// # Panics
    ///
    /// Panics if `nthr` is zero.
    #[must_use]
    pub fn new(nthr: usize) -> Self {
        assert!(nthr > 0, "a barrier needs at least one participant");

        let rounds = log2_ceil(nthr) as usize + 1;
        let players = (0..nthr)
            .map(|i| {
                let mut slots = Vec::with_capacity(rounds);
                slots.push(RoundSlot {
                    flag: AtomicUsize::new(0),
                    role: Role::Dropout,
                    opponent: None,
                });

                let mut twokm1 = 1usize;
                let mut twok = 2usize;
                for _ in 1..rounds {
                    let mut role = Role::Dropout;
                    let mut opponent = None;

                    let imod2k = i & (twok - 1);
                    if imod2k == 0 {
                        if i + twokm1 < nthr && twok < nthr {
                            role = Role::Winner;
                            opponent = Some(i + twokm1);
                        } else if i + twokm1 >= nthr {
                            role = Role::Bye;
                        }
                    }
                    if imod2k == twokm1 {
                        role = Role::Loser;
                        opponent = Some(i - twokm1);
                    } else if i == 0 && twok >= nthr {
                        // The champion normally signals a final opponent; if
                        // the bracket leaves it without one, it wins by
                        // default and only runs the wakeup.
                        role = Role::Champion;
                        opponent = (i + twokm1 < nthr).then_some(i + twokm1);
                    }

                    slots.push(RoundSlot {
                        flag: AtomicUsize::new(0),
                        role,
                        opponent,
                    });
                    twokm1 = twok;
                    twok <<= 1;
                }
                CachePadded::new(slots)
            })
            .collect();

        #[cfg(feature = "tracing")]
        tracing::trace!(nthr, rounds, "built tournament table");

        Self {
            players,
            rounds,
            next_vpid: AtomicUsize::new(0),
        }
    }

    /// Hands out the next participant identity with its initial sense. Must
    /// be called exactly once per participating thread.
    #[must_use]
    pub fn state_init(&self) -> TournamentState {
        let vpid = self.next_vpid.fetch_add(1, Ordering::Relaxed);
        debug_assert!(
            vpid < self.players.len(),
            "more states initialized than participants"
        );
        TournamentState { sense: !0, vpid }
    }

    /// The number of bracket levels, `ceil(log2 nthr) + 1` (level 0 is the
    /// wakeup sentinel).
    #[must_use]
    pub fn rounds(&self) -> usize {
        self.rounds
    }

    /// Blocks (spinning) until all participants have arrived.
    pub fn arrive(&self, state: &mut TournamentState) {
        let sense = state.sense;
        let slots = &**self.players[state.vpid];

        // A lone participant has no bracket to play.
        if self.rounds > 1 {
            let mut round = 1;
            let wakeup_from = loop {
                let slot = &slots[round];
                match slot.role {
                    Role::Bye => {}
                    Role::Winner => wait_for(&slot.flag, sense),
                    Role::Loser => {
                        if let Some(winner) = slot.opponent {
                            self.signal(winner, round, sense);
                        }
                        wait_for(&slot.flag, sense);
                        break round;
                    }
                    Role::Champion => {
                        wait_for(&slot.flag, sense);
                        if let Some(loser) = slot.opponent {
                            self.signal(loser, round, sense);
                        }
                        break round;
                    }
                    Role::Dropout => {
                        unreachable!("dropout levels are never played on the way up")
                    }
                }
                round += 1;
            };

            // Wakeup: retrace the climb, releasing the loser beaten at each
            // level, until the level-0 sentinel.
            for round in (0..wakeup_from).rev() {
                let slot = &slots[round];
                match slot.role {
                    Role::Dropout => break,
                    Role::Bye => {}
                    Role::Winner => {
                        if let Some(loser) = slot.opponent {
                            self.signal(loser, round, sense);
                        }
                    }
                    Role::Loser | Role::Champion => {
                        unreachable!("eliminated roles do not appear on the wakeup path")
                    }
                }
            }
        }

        state.sense = !sense;
    }

    fn signal(&self, player: usize, round: usize, sense: usize) {
        self.players[player][round].flag.store(sense, Ordering::Release);
    }
}

fn wait_for(flag: &AtomicUsize, sense: usize) {
    let backoff = Backoff::new();
    while flag.load(Ordering::Acquire) != sense {
        backoff.snooze();
    }
}
