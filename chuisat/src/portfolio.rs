/*****************************************************************************************[portfolio.rs]
Copyright (c) 2003-2006, Niklas Een, Niklas Sorensson (MiniSat)
Copyright (c) 2007-2010, Niklas Sorensson (MiniSat)

Permission is hereby granted, free of charge, to any person obtaining a copy of this software and
associated documentation files (the "Software"), to deal in the Software without restriction,
including without limitation the rights to use, copy, modify, merge, publish, distribute,
sublicense, and/or sell copies of the Software, and to permit persons to whom the Software is
furnished to do so, subject to the following conditions:

The above copyright notice and this permission notice shall be included in all copies or
substantial portions of the Software.

THE SOFTWARE IS PROVIDED "AS IS", WITHOUT WARRANTY OF ANY KIND, EXPRESS OR IMPLIED, INCLUDING BUT
NOT LIMITED TO THE WARRANTIES OF MERCHANTABILITY, FITNESS FOR A PARTICULAR PURPOSE AND
NONINFRINGEMENT. IN NO EVENT SHALL THE AUTHORS OR COPYRIGHT HOLDERS BE LIABLE FOR ANY CLAIM,
DAMAGES OR OTHER LIABILITY, WHETHER IN AN ACTION OF CONTRACT, TORT OR OTHERWISE, ARISING FROM, OUT
OF OR IN CONNECTION WITH THE SOFTWARE OR THE USE OR OTHER DEALINGS IN THE SOFTWARE.
**************************************************************************************************/

//! Portfolio coordination.
//!
//! Each worker owns a full solver (arena, trail, heap) and claims disjoint
//! guiding-path indices (`ind += nb_threads`), so the reported itemset sets
//! are disjoint by construction and their union is deterministic. Workers
//! share only this read-only parameter block and a lock-protected
//! clause-sharing channel, drained at subtree boundaries when the receiving
//! solver is at level 0 and not propagating.

use {
    crate::callbacks::Basic,
    crate::clause::{lbool, Lit},
    crate::core::{Solver, SolverOpts},
    crate::db::TransactionDb,
    std::collections::VecDeque,
    std::sync::Mutex,
    std::thread,
};

/// Parameters and shared state of one mining run.
pub struct Cooperation {
    pub nb_threads: usize,
    /// The minimum utility threshold.
    pub min_supp: i64,
    /// Emit closure constraints (closed-itemset mode).
    pub enum_clos: bool,
    /// First guiding-path index eligible for closure blocking.
    pub div_begining: usize,
    /// Clauses longer than this are not shared.
    max_share_lits: usize,
    inboxes: Vec<Mutex<VecDeque<Vec<Lit>>>>,
}

impl Cooperation {
    pub fn new(nb_threads: usize, min_supp: i64, enum_clos: bool) -> Self {
        debug_assert!(nb_threads >= 1);
        Self {
            nb_threads,
            min_supp,
            enum_clos,
            div_begining: 0,
            max_share_lits: 8,
            inboxes: (0..nb_threads).map(|_| Mutex::new(VecDeque::new())).collect(),
        }
    }

    /// Offer a clause to every other worker. Oversized clauses are dropped.
    pub fn publish_clause(&self, from: usize, lits: &[Lit]) {
        if self.nb_threads <= 1 || lits.len() < 2 || lits.len() > self.max_share_lits {
            return;
        }
        for (t, inbox) in self.inboxes.iter().enumerate() {
            if t == from {
                continue;
            }
            let mut queue = inbox.lock().unwrap_or_else(|e| e.into_inner());
            queue.push_back(lits.to_vec());
        }
    }

    /// Hand every pending clause of `thread`'s inbox to `f`.
    ///
    /// The receiving solver must be at level 0 and outside propagation.
    pub fn drain<F: FnMut(&[Lit])>(&self, thread: usize, mut f: F) {
        if self.nb_threads <= 1 {
            return;
        }
        let mut queue = self.inboxes[thread].lock().unwrap_or_else(|e| e.into_inner());
        while let Some(lits) = queue.pop_front() {
            f(&lits);
        }
    }
}

/// Aggregated outcome of a mining run.
#[derive(Debug, Clone)]
pub struct MiningResult {
    /// All reported itemsets, as 0-based item indices. Order across workers
    /// is unspecified; the set is deterministic.
    pub patterns: Vec<Vec<u32>>,
    /// `FALSE` when the enumeration completed, `UNDEF` when interrupted.
    pub status: lbool,
    pub conflicts: u64,
    pub decisions: u64,
    pub propagations: u64,
    pub restarts: u64,
}

/// Run the full enumeration with `coop.nb_threads` independent solvers.
pub fn mine(db: &TransactionDb, coop: &Cooperation, opts: &SolverOpts) -> MiningResult {
    if coop.nb_threads == 1 {
        return run_worker(db, coop, opts.clone(), 0);
    }

    let outcomes = thread::scope(|s| {
        let handles: Vec<_> = (0..coop.nb_threads)
            .map(|tid| {
                let opts = opts.clone();
                s.spawn(move || run_worker(db, coop, opts, tid))
            })
            .collect();
        handles
            .into_iter()
            .map(|h| h.join().expect("mining worker panicked"))
            .collect::<Vec<_>>()
    });

    let mut merged = MiningResult {
        patterns: vec![],
        status: lbool::FALSE,
        conflicts: 0,
        decisions: 0,
        propagations: 0,
        restarts: 0,
    };
    for out in outcomes {
        if out.status == lbool::UNDEF {
            merged.status = lbool::UNDEF;
        }
        merged.patterns.extend(out.patterns);
        merged.conflicts += out.conflicts;
        merged.decisions += out.decisions;
        merged.propagations += out.propagations;
        merged.restarts += out.restarts;
    }
    merged
}

fn run_worker(
    db: &TransactionDb,
    coop: &Cooperation,
    opts: SolverOpts,
    thread_id: usize,
) -> MiningResult {
    let mut solver: Solver<Basic> = Solver::new(opts, Basic::new());
    solver.init_mining(db, coop, thread_id);
    let status = solver.solve(db, coop);
    MiningResult {
        patterns: solver.patterns(),
        status,
        conflicts: solver.num_conflicts(),
        decisions: solver.num_decisions(),
        propagations: solver.num_propagations(),
        restarts: solver.num_restarts(),
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::clause::Var;

    fn lits(xs: &[i32]) -> Vec<Lit> {
        xs.iter()
            .map(|&x| Lit::new(Var::from_idx((x.abs() - 1) as u32), x > 0))
            .collect()
    }

    #[test]
    fn test_channel_roundtrip() {
        let coop = Cooperation::new(2, 1, true);
        let c = lits(&[1, -2, 3]);
        coop.publish_clause(0, &c);

        let mut got: Vec<Vec<Lit>> = vec![];
        coop.drain(1, |ls| got.push(ls.to_vec()));
        assert_eq!(got, vec![c.clone()]);

        // the producer's own inbox stays empty
        let mut own: Vec<Vec<Lit>> = vec![];
        coop.drain(0, |ls| own.push(ls.to_vec()));
        assert!(own.is_empty());
    }

    #[test]
    fn test_channel_drops_oversized() {
        let coop = Cooperation::new(2, 1, true);
        let long: Vec<Lit> = (0..20).map(|i| Lit::new(Var::from_idx(i), true)).collect();
        coop.publish_clause(0, &long);
        let mut got = 0;
        coop.drain(1, |_| got += 1);
        assert_eq!(got, 0);
    }

    #[test]
    fn test_single_thread_channel_is_inert() {
        let coop = Cooperation::new(1, 1, true);
        coop.publish_clause(0, &lits(&[1, 2]));
        let mut got = 0;
        coop.drain(0, |_| got += 1);
        assert_eq!(got, 0);
    }
}
