/*****************************************************************************************[core.rs]
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

use {
    crate::callbacks::Callbacks,
    crate::clause::{
        lbool, CRef, ClauseAllocator, ClauseRef, DeletePred, Lit, OccListsData, VMap, Var,
    },
    crate::db::TransactionDb,
    crate::intmap::{Comparator, HeapData},
    crate::portfolio::Cooperation,
    std::{
        cmp,
        io::{self, Write},
        mem,
        sync::atomic::{AtomicBool, Ordering},
    },
};

/// The itemset miner.
///
/// A `Solver` owns the whole search state: clause arena, watch lists, trail,
/// activity heap and the utility counter. Itemsets are enumerated one
/// guiding-path subtree at a time; each subtree gets its own CNF encoding
/// which is wiped and rebuilt on advance.
///
/// It is parametrized by `Callbacks`.
pub struct Solver<Cb: Callbacks> {
    cb: Cb,
    asynch_interrupt: AtomicBool,

    /// Per-subtree clauses produced by the guiding-path encoder.
    clauses: Vec<CRef>,
    /// Clauses imported from the sharing channel.
    learnts: Vec<CRef>,
    /// Recorded itemsets, stored as clauses over positive item literals.
    models: Vec<CRef>,

    pub(crate) vars: VarState,

    // Mode of operation:
    clause_decay: f64,
    random_var_freq: f64,
    random_seed: f64,
    luby_restart: bool,
    /// Controls conflict clause minimization (0=none, 1=basic, 2=deep).
    ccmin_mode: i32,
    /// Controls the level of phase saving (0=none, 1=limited, 2=full).
    phase_saving: i32,
    /// Initialize variable activities with a small random value.
    rnd_init_act: bool,
    /// The fraction of wasted memory allowed before a garbage collection is triggered.
    garbage_frac: f64,
    /// The initial restart limit.
    restart_first: i32,
    /// The factor with which the restart limit is multiplied in each restart.
    restart_inc: f64,

    /// The preferred polarity of each variable, updated on backtrack.
    /// Branching itself is always positive-first: a decision includes an item.
    polarity: VMap<bool>,
    /// Declares if a variable is eligible for selection in the decision heuristic.
    decision: VMap<bool>,
    /// `watches[lit]` is a list of constraints watching 'lit' (will go there if literal becomes true).
    watches_data: OccListsData<Lit, Watcher>,
    /// A priority queue of item variables ordered with respect to the variable activity.
    pub(crate) order_heap_data: HeapData<Var>,
    /// If `false`, the current subtree CNF is contradictory.
    pub(crate) ok: bool,
    /// Amount to bump next clause with.
    cla_inc: f64,
    /// Head of queue (as index into the trail).
    qhead: i32,

    /// Next variable to be created.
    pub(crate) next_var: Var,
    pub(crate) ca: ClauseAllocator,

    // Temporaries (to reduce allocation overhead).
    pub(crate) seen: VMap<bool>,
    minimize_stack: Vec<Lit>,
    analyze_toclear: Vec<Lit>,
    add_tmp: Vec<Lit>,

    // Resource constraints:
    conflict_budget: i64,
    propagation_budget: i64,

    // Mining state:
    /// Variables `[0, nb_items)` are item variables.
    pub(crate) nb_items: u32,
    /// Variables `[nb_items, nb_items + nb_trans)` are transaction variables;
    /// the positive literal asserts that the transaction covers the itemset.
    pub(crate) nb_trans: u32,
    pub(crate) min_supp: i64,
    pub(crate) enum_clos: bool,
    pub(crate) div_begining: usize,
    thread_id: usize,
    nb_threads: usize,
    /// Next guiding-path index this solver will claim.
    ind: usize,
    /// Search must re-enter at the subtree-advance step.
    advance_pending: bool,
    /// Clause-count budget driving arena compaction between subtrees.
    max_clauses: f64,
    max_learnts: f64,
    /// Trail position up to which fixed unit literals have been published.
    tail_unit_lit: usize,

    // Encoder scratch, cleared after every subtree:
    pub(crate) encode_items: Vec<Var>,
    pub(crate) local_trans: VMap<Vec<Lit>>,
    pub(crate) occ: VMap<i64>,

    // Statistics:
    solves: u64,
    starts: u64,
    decisions: u64,
    rnd_decisions: u64,
    propagations: u64,
    conflicts: u64,
    dec_vars: u64,
    num_clauses: u64,
    num_learnts: u64,
    clauses_literals: u64,
    learnts_literals: u64,
    max_literals: u64,
    tot_literals: u64,
}

/// The current assignments, trail and utility counter.
///
/// All `totalWeight` updates go through `unchecked_enqueue`/`undo_assign` and
/// the encoder's `set_witness_weight`, so the counter always equals the sum of
/// the weights of witness variables not assigned false.
pub(crate) struct VarState {
    /// A heuristic measurement of the activity of a variable.
    pub(crate) activity: VMap<f64>,
    /// Current assignment for each variable.
    ass: VMap<lbool>,
    /// Stores reason and level for each variable.
    vardata: VMap<VarData>,
    /// Amount to bump next variable with.
    var_inc: f64,
    var_decay: f64,

    /// Assignment stack; stores all assigments made in the order they were made.
    pub(crate) trail: Vec<Lit>,
    /// Separator indices for different decision levels in `trail`.
    pub(crate) trail_lim: Vec<i32>,

    /// Integer weight of each witness variable (0 elsewhere).
    hu_wei: VMap<i64>,
    /// Maximum achievable utility under the current partial assignment.
    pub(crate) total_weight: i64,
    /// First witness variable index (`nb_items + nb_trans`).
    witness_start: u32,
}

impl<Cb: Callbacks + Default> Default for Solver<Cb> {
    fn default() -> Self {
        Solver::new(SolverOpts::default(), Default::default())
    }
}

// search steps of the enumeration loop
enum Step {
    Propagate,
    Decide,
    Record,
    Advance,
}

impl<Cb: Callbacks> Solver<Cb> {
    /// Create a new solver with the given options and callbacks.
    pub fn new(opts: SolverOpts, cb: Cb) -> Self {
        assert!(opts.check());
        Self {
            cb,
            asynch_interrupt: AtomicBool::new(false),
            clauses: vec![],
            learnts: vec![],
            models: vec![],
            vars: VarState::new(&opts),

            clause_decay: opts.clause_decay,
            random_var_freq: opts.random_var_freq,
            random_seed: opts.random_seed,
            luby_restart: opts.luby_restart,
            ccmin_mode: opts.ccmin_mode,
            phase_saving: opts.phase_saving,
            rnd_init_act: opts.rnd_init_act,
            garbage_frac: opts.garbage_frac,
            restart_first: opts.restart_first,
            restart_inc: opts.restart_inc,

            polarity: VMap::new(),
            decision: VMap::new(),
            watches_data: OccListsData::new(),
            order_heap_data: HeapData::new(),
            ok: true,
            cla_inc: 1.0,
            qhead: 0,

            next_var: Var::from_idx(0),
            ca: ClauseAllocator::new(),

            seen: VMap::new(),
            minimize_stack: vec![],
            analyze_toclear: vec![],
            add_tmp: vec![],

            conflict_budget: -1,
            propagation_budget: -1,

            nb_items: 0,
            nb_trans: 0,
            min_supp: i64::min_value(),
            enum_clos: true,
            div_begining: 0,
            thread_id: 0,
            nb_threads: 1,
            ind: 0,
            advance_pending: false,
            max_clauses: 100.0,
            max_learnts: 0.0,
            tail_unit_lit: 0,

            encode_items: vec![],
            local_trans: VMap::new(),
            occ: VMap::new(),

            solves: 0,
            starts: 0,
            decisions: 0,
            rnd_decisions: 0,
            propagations: 0,
            conflicts: 0,
            dec_vars: 0,
            num_clauses: 0,
            num_learnts: 0,
            clauses_literals: 0,
            learnts_literals: 0,
            max_literals: 0,
            tot_literals: 0,
        }
    }

    /// Creates a new variable. If `dvar` is cleared, the variable will not be
    /// used as a decision variable.
    pub fn new_var(&mut self, dvar: bool) -> Var {
        let v = self.next_var;
        self.next_var = Var::from_idx(self.next_var.idx() + 1);
        self.watches_data.init(Lit::new(v, false));
        self.watches_data.init(Lit::new(v, true));
        self.vars.ass.insert_default(v, lbool::UNDEF);
        self.vars
            .vardata
            .insert_default(v, VarData::new(CRef::UNDEF, 0));
        if self.rnd_init_act {
            let act = utils::drand(&mut self.random_seed) * 0.00001;
            self.vars.activity.insert_default(v, act);
        } else {
            self.vars.activity.insert_default(v, 0.0);
        }
        self.vars.hu_wei.insert_default(v, 0);
        self.seen.insert_default(v, false);
        self.polarity.insert_default(v, false);
        self.decision.reserve_default(v);
        self.set_decision_var(v, dvar);
        v
    }

    pub fn new_var_default(&mut self) -> Var {
        self.new_var(true)
    }

    /// Register the mining problem: allocates one variable per item and per
    /// transaction and copies the portfolio parameters.
    pub fn init_mining(&mut self, db: &TransactionDb, coop: &Cooperation, thread_id: usize) {
        debug_assert_eq!(self.next_var.idx(), 0, "mining must start on a fresh solver");
        for _ in 0..db.nb_items {
            self.new_var(true);
        }
        self.nb_items = db.nb_items as u32;
        for _ in 0..db.nb_trans() {
            self.new_var(false);
        }
        self.nb_trans = db.nb_trans() as u32;
        self.vars.witness_start = self.nb_items + self.nb_trans;

        self.min_supp = coop.min_supp;
        self.enum_clos = coop.enum_clos;
        self.div_begining = coop.div_begining;
        self.nb_threads = coop.nb_threads;
        self.thread_id = thread_id;

        for i in 0..self.nb_items {
            let v = Var::from_idx(i);
            self.local_trans.insert_default(v, vec![]);
            self.occ.insert_default(v, 0);
        }
    }

    /// Enumerate all itemsets of the database whose utility reaches the
    /// threshold, recording each one in the model store.
    ///
    /// Returns `FALSE` when the enumeration ran to completion (the normal
    /// outcome), `UNDEF` when a budget expired or the solver was interrupted.
    pub fn solve(&mut self, db: &TransactionDb, coop: &Cooperation) -> lbool {
        debug_assert_eq!(self.decision_level(), 0);
        self.models.clear();
        if !self.ok {
            return lbool::FALSE;
        }

        self.solves += 1;
        self.max_clauses = 100.0;
        self.tail_unit_lit = 0;
        self.cancel_all();
        self.wipe_subtree_clauses();

        // claim the first feasible subtree of this solver's partition
        self.ind = self.thread_id;
        loop {
            if self.ind >= self.nb_items as usize {
                return lbool::FALSE;
            }
            if self.encode_guiding_path(db, self.ind + 1) {
                break;
            }
            self.ind += self.nb_threads;
        }
        self.cb.on_subtree(self.ind);
        self.ind += self.nb_threads;
        self.advance_pending = false;

        self.max_learnts = f64::max(self.num_clauses as f64 / 3.0, 100.0);

        info!("search.start");
        self.cb.on_start();

        let mut status = lbool::UNDEF;
        let mut curr_restarts: i32 = 0;
        while status == lbool::UNDEF {
            let rest_base = if self.luby_restart {
                utils::luby(self.restart_inc, curr_restarts)
            } else {
                f64::powi(self.restart_inc, curr_restarts)
            };
            let nof_conflicts = (rest_base * self.restart_first as f64) as i32;
            status = self.search(db, coop, nof_conflicts);
            if !self.within_budget() {
                break;
            }
            if status == lbool::UNDEF {
                info!("search.restart({})", curr_restarts);
                curr_restarts += 1;
                self.cb.on_restart();
            }
        }

        self.cb.on_result(status);
        self.cancel_all();
        status
    }

    /// One search pass over at most `nof_conflicts` conflicts (negative for
    /// infinity); restarts are honored at subtree boundaries only, so that no
    /// enumeration state is lost.
    fn search(&mut self, db: &TransactionDb, coop: &Cooperation, nof_conflicts: i32) -> lbool {
        self.starts += 1;
        let mut conflict_c: i32 = 0;
        let mut step = if self.advance_pending {
            Step::Advance
        } else {
            Step::Propagate
        };

        loop {
            step = match step {
                Step::Propagate => {
                    if !self.within_budget() {
                        return lbool::UNDEF;
                    }
                    let confl = self.propagate();
                    if !self.ok || confl.is_some() {
                        self.conflicts += 1;
                        conflict_c += 1;
                        if !self.ok || self.decision_level() == 0 {
                            self.cancel_all();
                            Step::Advance
                        } else {
                            self.backtrack_flip();
                            Step::Propagate
                        }
                    } else if self.vars.total_weight < self.min_supp {
                        // the residual utility can no longer reach the threshold
                        self.conflicts += 1;
                        conflict_c += 1;
                        if self.decision_level() == 0 {
                            self.cancel_all();
                            Step::Advance
                        } else {
                            self.backtrack_flip();
                            Step::Propagate
                        }
                    } else {
                        Step::Decide
                    }
                }

                Step::Decide => {
                    let next = self.pick_branch_lit();
                    if next == Lit::UNDEF {
                        Step::Record
                    } else {
                        self.decisions += 1;
                        self.new_decision_level();
                        debug!("pick-next {:?}", next);
                        self.vars.unchecked_enqueue(next, CRef::UNDEF);
                        Step::Propagate
                    }
                }

                Step::Record => {
                    self.record_model();
                    if self.decision_level() == 0 {
                        self.cancel_all();
                        Step::Advance
                    } else {
                        self.backtrack_flip();
                        Step::Propagate
                    }
                }

                Step::Advance => {
                    if !self.within_budget() {
                        self.advance_pending = true;
                        return lbool::UNDEF;
                    }
                    if nof_conflicts >= 0 && conflict_c >= nof_conflicts {
                        // restart at the subtree boundary
                        self.advance_pending = true;
                        return lbool::UNDEF;
                    }
                    if self.ind >= self.nb_items as usize {
                        return lbool::FALSE;
                    }
                    self.ok = true;
                    self.wipe_subtree_clauses();
                    if self.learnts.len() as f64 > self.max_learnts {
                        self.reduce_learnts();
                    }
                    coop.drain(self.thread_id, |lits| {
                        self.add_extra_clause(lits);
                    });
                    loop {
                        if self.ind >= self.nb_items as usize {
                            return lbool::FALSE;
                        }
                        if self.encode_guiding_path(db, self.ind + 1) {
                            break;
                        }
                        self.ind += self.nb_threads;
                    }
                    self.cb.on_subtree(self.ind);
                    self.ind += self.nb_threads;
                    self.advance_pending = false;
                    Step::Propagate
                }
            };
        }
    }

    /// Undo the deepest decision and assert its negation one level below,
    /// blocking the subtree that was just refuted or recorded.
    fn backtrack_flip(&mut self) {
        let lvl = self.decision_level();
        debug_assert!(lvl > 0);
        let q = self.vars.trail[self.vars.trail_lim[(lvl - 1) as usize] as usize];
        self.cancel_until(lvl - 1);
        self.vars.unchecked_enqueue(!q, CRef::UNDEF);
    }

    /// Store the satisfying assignment's item set as a clause in the arena.
    fn record_model(&mut self) {
        let mut lits = mem::replace(&mut self.add_tmp, vec![]);
        lits.clear();
        for i in 0..self.nb_items {
            let v = Var::from_idx(i);
            if self.vars.value(v) == lbool::TRUE {
                lits.push(Lit::new(v, true));
            }
        }
        debug_assert!(!lits.is_empty());
        debug_assert!(self.vars.total_weight >= self.min_supp);
        trace!("record model {:?} (utility {})", lits, self.vars.total_weight);
        self.cb.on_model(&lits);
        let cr = self.ca.alloc(&lits, false);
        self.models.push(cr);
        self.add_tmp = lits;
    }

    /// Begins a new decision level.
    fn new_decision_level(&mut self) {
        trace!("new decision level {}", 1 + self.decision_level());
        self.vars.new_decision_level();
    }

    /// Pick a literal to make a decision with.
    ///
    /// Decisions are restricted to item variables (the only ones in the order
    /// heap) and always positive: a model is an included itemset.
    fn pick_branch_lit(&mut self) -> Lit {
        let mut next = Var::UNDEF;

        // Random decision:
        if utils::drand(&mut self.random_seed) < self.random_var_freq
            && !self.order_heap_data.is_empty()
        {
            let idx_tmp =
                utils::irand(&mut self.random_seed, self.order_heap_data.len() as i32) as usize;
            next = self.order_heap_data[idx_tmp];
            if self.vars.value(next) == lbool::UNDEF && self.decision[next] {
                self.rnd_decisions += 1;
            }
        }

        // Activity based decision:
        while next == Var::UNDEF || self.vars.value(next) != lbool::UNDEF || !self.decision[next] {
            let mut order_heap = self.order_heap_data.promote(VarOrder {
                activity: &self.vars.activity,
            });
            if order_heap.is_empty() {
                next = Var::UNDEF;
                break;
            } else {
                next = order_heap.remove_min();
            }
        }

        if next == Var::UNDEF {
            Lit::UNDEF
        } else {
            Lit::new(next, true)
        }
    }

    /// Analyze a conflicting clause and produce a first-UIP reason clause.
    ///
    /// # Pre-conditions:
    ///
    /// - current decision level must be greater than root level;
    /// - `confl` is falsified by the current trail through ordinary boolean
    ///   propagation (not a utility cutoff).
    ///
    /// # Post-conditions:
    ///
    /// - the backtrack level is returned;
    /// - `out_learnt[0]` is the asserting literal, the only one at the
    ///   current decision level;
    /// - if `out_learnt.len() > 1` then `out_learnt[1]` has the greatest
    ///   decision level of the remaining literals.
    pub(crate) fn analyze(&mut self, mut confl: CRef, out_learnt: &mut Vec<Lit>) -> i32 {
        let mut path_c: i32 = 0;
        let mut p = Lit::UNDEF;

        out_learnt.clear();
        out_learnt.push(Lit::UNDEF); // (leave room for the asserting literal)
        let mut index = self.vars.trail.len();

        loop {
            debug_assert_ne!(confl, CRef::UNDEF); // (otherwise should be UIP)
            if self.ca.get_ref(confl).learnt() {
                self.cla_bump_activity(confl);
            }
            let c = self.ca.get_ref(confl);
            let start = if p == Lit::UNDEF { 0 } else { 1 };
            let lits = c.lits();
            for &q in &lits[start..] {
                let v = q.var();
                if !self.seen[v] && self.vars.level(v) > 0 {
                    self.vars
                        .var_bump_activity(&mut self.order_heap_data, v);
                    self.seen[v] = true;
                    if self.vars.level(v) >= self.decision_level() as i32 {
                        path_c += 1;
                    } else {
                        out_learnt.push(q);
                    }
                }
            }

            // Select next clause to look at:
            while !self.seen[self.vars.trail[index - 1].var()] {
                index -= 1;
            }
            p = self.vars.trail[index - 1];
            index -= 1;
            confl = self.vars.reason(p.var());
            self.seen[p.var()] = false;
            path_c -= 1;
            if path_c <= 0 {
                break;
            }
        }
        out_learnt[0] = !p;

        self.minimize_conflict(out_learnt);

        // Find correct backtrack level:
        let out_btlevel = if out_learnt.len() == 1 {
            0
        } else {
            let mut max_i = 1;
            // Find the first literal assigned at the next-highest level:
            for i in 2..out_learnt.len() {
                if self.vars.level(out_learnt[i].var()) > self.vars.level(out_learnt[max_i].var())
                {
                    max_i = i;
                }
            }
            // Swap-in this literal at index 1:
            out_learnt.swap(max_i, 1);
            self.vars.level(out_learnt[1].var())
        };

        for i in 0..self.analyze_toclear.len() {
            let v = self.analyze_toclear[i].var();
            self.seen[v] = false; // ('seen[]' is now cleared)
        }
        out_btlevel
    }

    /// Simplify the conflict clause according to `ccmin_mode`.
    fn minimize_conflict(&mut self, out_learnt: &mut Vec<Lit>) {
        self.analyze_toclear.clear();
        self.analyze_toclear.extend_from_slice(out_learnt);
        self.max_literals += out_learnt.len() as u64;

        let new_size = if self.ccmin_mode == 2 {
            let mut abstract_level: u32 = 0;
            for a in out_learnt[1..].iter() {
                // (maintain an abstraction of levels involved in conflict)
                abstract_level |= self.abstract_level(a.var());
            }

            let mut j = 1;
            for i in 1..out_learnt.len() {
                let lit = out_learnt[i];
                if self.vars.reason(lit.var()) == CRef::UNDEF
                    || !self.lit_redundant(lit, abstract_level)
                {
                    out_learnt[j] = lit;
                    j += 1;
                }
            }
            j
        } else if self.ccmin_mode == 1 {
            let mut j = 1;
            for i in 1..out_learnt.len() {
                let lit = out_learnt[i];
                let x = lit.var();
                let reason = self.vars.reason(x);

                let retain = if reason == CRef::UNDEF {
                    true
                } else {
                    let c = self.ca.get_ref(reason);
                    let mut keep = false;
                    for &l in &c.lits()[1..] {
                        if !self.seen[l.var()] && self.vars.level(l.var()) > 0 {
                            keep = true;
                            break;
                        }
                    }
                    keep
                };
                if retain {
                    out_learnt[j] = lit;
                    j += 1;
                }
            }
            j
        } else {
            out_learnt.len()
        };

        debug_assert!(new_size <= out_learnt.len());
        out_learnt.truncate(new_size);
        self.tot_literals += out_learnt.len() as u64;
    }

    /// An abstraction of the level of a variable
    #[inline]
    fn abstract_level(&self, v: Var) -> u32 {
        1 << (self.vars.level(v) & 31)
    }

    /// Check if `p` can be removed from the conflict clause being minimized.
    /// `abstract_levels` is used to abort early if the algorithm is visiting
    /// literals at levels that cannot be removed later.
    fn lit_redundant(&mut self, p: Lit, abstract_levels: u32) -> bool {
        self.minimize_stack.clear();
        self.minimize_stack.push(p);
        let top = self.analyze_toclear.len();

        while let Some(q) = self.minimize_stack.pop() {
            let cr = self.vars.reason(q.var());
            debug_assert_ne!(cr, CRef::UNDEF);
            let c = self.ca.get_ref(cr);
            let lits = c.lits();
            for &l in &lits[1..] {
                if !self.seen[l.var()] && self.vars.level(l.var()) > 0 {
                    if self.vars.reason(l.var()) != CRef::UNDEF
                        && (self.abstract_level(l.var()) & abstract_levels) != 0
                    {
                        self.seen[l.var()] = true;
                        self.minimize_stack.push(l);
                        self.analyze_toclear.push(l);
                    } else {
                        for i in top..self.analyze_toclear.len() {
                            let v = self.analyze_toclear[i].var();
                            self.seen[v] = false;
                        }
                        self.analyze_toclear.truncate(top);
                        return false;
                    }
                }
            }
        }

        true
    }

    /// Attach the learnt clause produced by [`Solver::analyze`] and assert
    /// its first literal at the backtrack level.
    pub(crate) fn record_learnt(&mut self, learnt: &[Lit], btlevel: i32) {
        self.cancel_until(btlevel as u32);
        if learnt.is_empty() {
            self.ok = false;
        } else if learnt.len() == 1 {
            self.vars.unchecked_enqueue(learnt[0], CRef::UNDEF);
        } else {
            let cr = self.ca.alloc(learnt, true);
            self.learnts.push(cr);
            self.attach_clause(cr);
            self.cla_bump_activity(cr);
            self.vars.unchecked_enqueue(learnt[0], cr);
        }
        self.vars.var_decay_activity();
        self.cla_decay_activity();
    }

    /// Propagates all enqueued facts.
    ///
    /// If a conflict arises, the conflicting clause is returned, otherwise
    /// `None`. A clause that became unit is also reported as conflicting when
    /// the residual achievable utility is below the mining threshold; that
    /// check is what prunes utility-hopeless branches.
    ///
    /// # Post-conditions:
    ///
    /// - the propagation queue is empty, even if there was a conflict.
    pub(crate) fn propagate(&mut self) -> Option<CRef> {
        let mut confl = None;
        let mut num_props: u32 = 0;

        while (self.qhead as usize) < self.vars.trail.len() {
            // `p` is the next enqueued fact to propagate.
            let p = self.vars.trail[self.qhead as usize];
            self.qhead += 1;
            let watches_data_ptr: *mut OccListsData<_, _> = &mut self.watches_data;
            let ws = self
                .watches_data
                .lookup_mut_pred(p, &WatcherDeleted { ca: &self.ca });
            let mut i: usize = 0;
            let mut j: usize = 0;
            let end: usize = ws.len();
            num_props += 1;
            'clauses: while i < end {
                // Try to avoid inspecting the clause:
                let blocker = ws[i].blocker;
                if self.vars.value_lit(blocker) == lbool::TRUE {
                    ws[j] = ws[i];
                    j += 1;
                    i += 1;
                    continue;
                }

                // Make sure the false literal is data[1]:
                let cr = ws[i].cref;
                let mut c = self.ca.get_mut(cr);
                let false_lit = !p;
                if c[0] == false_lit {
                    let tmp = c[1];
                    c[0] = tmp;
                    c[1] = false_lit;
                }
                debug_assert_eq!(c[1], false_lit);
                i += 1;

                // If 0th watch is true, then clause is already satisfied.
                let first = c[0];
                let w = Watcher::new(cr, first);
                if first != blocker && self.vars.value_lit(first) == lbool::TRUE {
                    ws[j] = w;
                    j += 1;
                    continue;
                }

                // Look for new watch:
                let size = c.size();
                for k in 2..size {
                    if self.vars.value_lit(c[k]) != lbool::FALSE {
                        let new_watch = c[k];
                        c[1] = new_watch;
                        c[k] = false_lit;
                        // safe because `!c[1] != p`, so the lists are not aliased
                        debug_assert_ne!(!new_watch, p);
                        unsafe { (&mut *watches_data_ptr)[!new_watch].push(w) };
                        continue 'clauses;
                    }
                }

                // Did not find watch -- clause is unit under assignment:
                ws[j] = w;
                j += 1;
                if self.vars.value_lit(first) == lbool::FALSE
                    || self.vars.total_weight < self.min_supp
                {
                    confl = Some(cr);
                    self.qhead = self.vars.trail.len() as i32;
                    // Copy the remaining watches:
                    while i < end {
                        ws[j] = ws[i];
                        j += 1;
                        i += 1;
                    }
                } else {
                    self.vars.unchecked_enqueue(first, cr);
                }
            }
            let dummy = Watcher::DUMMY;
            ws.resize(j, dummy);
        }
        self.propagations += num_props as u64;

        confl
    }

    /// Revert to the state at given level (keeping all assignment at `level` but not beyond).
    pub(crate) fn cancel_until(&mut self, level: u32) {
        if self.decision_level() <= level {
            return;
        }
        let trail_lim_last = *self.vars.trail_lim.last().expect("trail_lim is empty") as usize;
        let trail_lim_level = self.vars.trail_lim[level as usize] as usize;
        for c in (trail_lim_level..self.vars.trail.len()).rev() {
            let p = self.vars.trail[c];
            let x = p.var();
            if self.phase_saving > 1 || (self.phase_saving == 1 && c > trail_lim_last) {
                self.polarity[x] = p.sign();
            }
            self.vars.undo_assign(p);
            if x.idx() < self.nb_items {
                self.insert_var_order(x);
            }
        }
        self.qhead = trail_lim_level as i32;
        self.vars.trail.truncate(trail_lim_level);
        self.vars.trail_lim.truncate(level as usize);
    }

    /// Backtrack to an empty trail, undoing the level-0 assignments too.
    /// Called between guiding-path subtrees.
    pub(crate) fn cancel_all(&mut self) {
        for c in (0..self.vars.trail.len()).rev() {
            let p = self.vars.trail[c];
            let x = p.var();
            self.vars.undo_assign(p);
            if x.idx() < self.nb_items {
                self.insert_var_order(x);
            }
        }
        self.qhead = 0;
        self.vars.trail.clear();
        self.vars.trail_lim.clear();
    }

    fn set_decision_var(&mut self, v: Var, b: bool) {
        if b && !self.decision[v] {
            self.dec_vars += 1;
        } else if !b && self.decision[v] {
            self.dec_vars -= 1;
        }
        self.decision[v] = b;
        self.insert_var_order(v);
    }

    pub(crate) fn insert_var_order(&mut self, x: Var) {
        let mut heap = self.order_heap_data.promote(VarOrder {
            activity: &self.vars.activity,
        });
        if !heap.in_heap(x) && self.decision[x] {
            heap.insert(x);
        }
    }

    fn cla_decay_activity(&mut self) {
        self.cla_inc *= 1.0 / self.clause_decay;
    }

    fn cla_bump_activity(&mut self, cr: CRef) {
        let new_activity = {
            let mut c = self.ca.get_mut(cr);
            let r = c.activity() + self.cla_inc as f32;
            c.set_activity(r);
            r
        };
        if new_activity > 1e20 {
            // Rescale:
            for i in 0..self.learnts.len() {
                let learnt = self.learnts[i];
                let mut c = self.ca.get_mut(learnt);
                let r = c.activity() * 1e-20;
                c.set_activity(r);
            }
            self.cla_inc *= 1e-20;
        }
    }

    /// Add a clause at level 0; literals are cleaned up against the
    /// top-level assignment first. A resulting unit clause is enqueued and
    /// propagated directly instead of being stored.
    ///
    /// Returns `false` if the clause set became contradictory.
    pub fn add_clause_reuse(&mut self, clause: &mut Vec<Lit>) -> bool {
        debug_assert_eq!(
            self.decision_level(),
            0,
            "add clause at non-zero decision level"
        );
        if !self.ok {
            return false;
        }
        clause.sort_unstable();

        let mut last_lit = Lit::UNDEF;
        let mut j = 0;
        // remove duplicates, drop satisfied clauses and false literals
        for i in 0..clause.len() {
            let lit_i = clause[i];
            let value = self.vars.value_lit(lit_i);
            if value == lbool::TRUE || lit_i == !last_lit {
                return true; // tautology or already satisfied
            } else if value != lbool::FALSE && lit_i != last_lit {
                last_lit = lit_i;
                clause[j] = lit_i;
                j += 1;
            }
        }
        clause.truncate(j);

        if clause.is_empty() {
            self.ok = false;
            return false;
        } else if clause.len() == 1 {
            self.vars.unchecked_enqueue(clause[0], CRef::UNDEF);
            self.ok = self.propagate().is_none();
            return self.ok;
        } else {
            let cr = self.ca.alloc(clause, false);
            self.clauses.push(cr);
            self.attach_clause(cr);
        }
        true
    }

    /// Binary-clause shorthand used by the encoder.
    pub(crate) fn add_binary(&mut self, a: Lit, b: Lit) -> bool {
        let mut c = mem::replace(&mut self.add_tmp, vec![]);
        c.clear();
        c.push(a);
        c.push(b);
        let r = self.add_clause_reuse(&mut c);
        self.add_tmp = c;
        r
    }

    /// Attach a clause imported from the sharing channel as a learnt clause.
    pub fn add_extra_clause(&mut self, lits: &[Lit]) {
        debug_assert_eq!(self.decision_level(), 0);
        if lits.len() <= 1 {
            return;
        }
        let cr = self.ca.alloc(lits, true);
        self.learnts.push(cr);
        self.attach_clause(cr);
        self.cla_bump_activity(cr);
    }

    /// Fixed literals not yet published to the portfolio; advances the
    /// publication cursor. Only meaningful at level 0.
    pub fn take_fixed_units(&mut self) -> &[Lit] {
        debug_assert_eq!(self.decision_level(), 0);
        let start = self.tail_unit_lit;
        self.tail_unit_lit = self.vars.trail.len();
        &self.vars.trail[start..]
    }

    /// Attach a clause to watcher lists
    fn attach_clause(&mut self, cr: CRef) {
        let (c0, c1, learnt, size) = {
            let c = self.ca.get_ref(cr);
            debug_assert!(c.size() > 1);
            (c[0], c[1], c.learnt(), c.size())
        };
        self.watches_data[!c0].push(Watcher::new(cr, c1));
        self.watches_data[!c1].push(Watcher::new(cr, c0));
        if learnt {
            self.num_learnts += 1;
            self.learnts_literals += size as u64;
        } else {
            self.num_clauses += 1;
            self.clauses_literals += size as u64;
        }
    }

    /// Detach a clause from watcher lists.
    ///
    /// param `strict` means we remove the clause from watchers eagerly, instead
    /// of just marking the watchlist as "dirty"
    fn detach_clause(&mut self, cr: CRef, strict: bool) {
        let (c0, c1, csize, clearnt) = {
            let c = self.ca.get_ref(cr);
            (c[0], c[1], c.size(), c.learnt())
        };
        debug_assert!(csize > 1);

        let mut watches = self.watches_data.promote(WatcherDeleted { ca: &self.ca });

        if strict {
            let pos = watches[!c0]
                .iter()
                .position(|x| x == &Watcher::new(cr, c1))
                .expect("watcher not found");
            watches[!c0].remove(pos);
            let pos = watches[!c1]
                .iter()
                .position(|x| x == &Watcher::new(cr, c0))
                .expect("watcher not found");
            watches[!c1].remove(pos);
        } else {
            watches.smudge(!c0);
            watches.smudge(!c1);
        }

        if clearnt {
            self.num_learnts -= 1;
            self.learnts_literals -= csize as u64;
        } else {
            self.num_clauses -= 1;
            self.clauses_literals -= csize as u64;
        }
    }

    /// Detach and free a clause.
    fn remove_clause(&mut self, cr: CRef) {
        self.detach_clause(cr, false);
        {
            let c = self.ca.get_ref(cr);
            // Don't leave pointers to free'd memory!
            if self.locked(c) {
                self.vars.vardata[c[0].var()].reason = CRef::UNDEF;
            }
        }
        self.ca.get_mut(cr).set_mark(1); // used in reloc
        self.ca.free(cr);
    }

    pub(crate) fn satisfied(&self, c: ClauseRef) -> bool {
        c.iter().any(|&lit| self.vars.value_lit(lit) == lbool::TRUE)
    }

    /// Returns `true` if a clause is a reason for some implication in the current state.
    fn locked(&self, c: ClauseRef) -> bool {
        let reason = self.vars.reason(c[0].var());
        self.vars.value_lit(c[0]) == lbool::TRUE
            && reason != CRef::UNDEF
            && self.ca.get_ref(reason) == c
    }

    /// Drop the per-subtree encoding; the next guiding-path call rebuilds it.
    pub(crate) fn wipe_subtree_clauses(&mut self) {
        debug_assert_eq!(self.decision_level(), 0);
        let mut cs = mem::replace(&mut self.clauses, vec![]);
        for &cr in &cs {
            self.remove_clause(cr);
        }
        cs.clear();
        self.clauses = cs;
    }

    /// Remove half of the imported clauses, minus the clauses locked by the
    /// current assignment. Binary clauses are never removed.
    pub(crate) fn reduce_learnts(&mut self) {
        let extra_lim = self.cla_inc / self.learnts.len() as f64; // Remove any clause below this activity

        debug!("reduce_learnts.start");
        {
            let ca = &self.ca;
            self.learnts.sort_unstable_by(|&x, &y| {
                let x = ca.get_ref(x);
                let y = ca.get_ref(y);
                debug_assert!(x.learnt());
                debug_assert!(y.learnt());
                Ord::cmp(&(x.size() <= 2), &(y.size() <= 2)).then(
                    PartialOrd::partial_cmp(&x.activity(), &y.activity()).expect("NaN activity"),
                )
            });
        }
        let mut j = 0;
        for i in 0..self.learnts.len() {
            let cr = self.learnts[i];
            let cond = {
                let c = self.ca.get_ref(cr);
                c.size() > 2
                    && !self.locked(c)
                    && (i < self.learnts.len() / 2 || (c.activity() as f64) < extra_lim)
            };
            if cond {
                self.remove_clause(cr);
            } else {
                self.learnts[j] = cr;
                j += 1;
            }
        }
        let _deleted = self.learnts.len() - j;
        self.learnts.truncate(j);
        debug!("reduce_learnts.done (deleted {})", _deleted);

        self.check_garbage();
    }

    /// Move all reachable clauses to the given allocator, where clause
    /// indices might differ.
    fn reloc_all(&mut self, to: &mut ClauseAllocator) {
        macro_rules! is_removed {
            ($ca:expr, $cr:expr) => {
                $ca.get_ref($cr).mark() == 1
            };
        }
        // All watchers:
        self.watches_data
            .clean_all_pred(&WatcherDeleted { ca: &self.ca });
        for v_idx in 0..self.next_var.idx() {
            let v = Var::from_idx(v_idx);
            for s in 0..2 {
                let p = Lit::new(v, s != 0);
                for watch in &mut self.watches_data[p] {
                    self.ca.reloc(&mut watch.cref, to);
                }
            }
        }

        // All reasons:
        for i in 0..self.vars.trail.len() {
            let v = self.vars.trail[i].var();

            // Note: it is not safe to call `locked()` on a relocated clause.
            let reason = self.vars.reason(v);
            if reason != CRef::UNDEF {
                let cond = {
                    let c = self.ca.get_ref(reason);
                    c.reloced() || self.locked(c)
                };
                if cond {
                    debug_assert!(!is_removed!(self.ca, reason));
                    self.ca.reloc(&mut self.vars.vardata[v].reason, to);
                }
            }
        }

        // All imported clauses:
        {
            let mut j = 0;
            for i in 0..self.learnts.len() {
                let mut cr = self.learnts[i];
                if !is_removed!(self.ca, cr) {
                    self.ca.reloc(&mut cr, to);
                    self.learnts[j] = cr;
                    j += 1;
                }
            }
            self.learnts.truncate(j);
        }

        // All subtree clauses:
        {
            let mut j = 0;
            for i in 0..self.clauses.len() {
                let mut cr = self.clauses[i];
                if !is_removed!(self.ca, cr) {
                    self.ca.reloc(&mut cr, to);
                    self.clauses[j] = cr;
                    j += 1;
                }
            }
            self.clauses.truncate(j);
        }

        // All recorded itemsets:
        for i in 0..self.models.len() {
            let mut cr = self.models[i];
            self.ca.reloc(&mut cr, to);
            self.models[i] = cr;
        }
    }

    /// Garbage collect the clause allocator by moving alive clauses into
    /// another allocator.
    pub(crate) fn garbage_collect(&mut self) {
        // Initialize the next region to a size corresponding to the estimated
        // utilization degree.
        let mut to = ClauseAllocator::with_start_cap(self.ca.len() - self.ca.wasted());
        self.reloc_all(&mut to);
        self.cb.on_gc(
            self.ca.len() * ClauseAllocator::UNIT_SIZE,
            to.len() * ClauseAllocator::UNIT_SIZE,
        );
        self.ca = to;
    }

    /// Check whether the space wasted by dead clauses in the clause allocator
    /// exceeds the threshold.
    pub(crate) fn check_garbage(&mut self) {
        if self.ca.wasted() as f64 > self.ca.len() as f64 * self.garbage_frac {
            self.garbage_collect();
        }
    }

    /// Run the clause-count budget that keeps arena churn bounded as subtrees
    /// are torn down and rebuilt.
    pub(crate) fn run_garbage_budget(&mut self) {
        if self.clauses.len() as f64 > self.max_clauses {
            self.check_garbage();
            self.max_clauses *= 1.1;
        } else {
            self.max_clauses *= 0.9;
        }
    }

    /// Interrupt search asynchronously
    pub fn interrupt_async(&self) {
        self.asynch_interrupt.store(true, Ordering::Relaxed);
    }

    fn has_been_interrupted(&self) -> bool {
        self.asynch_interrupt.load(Ordering::Relaxed)
    }

    pub fn set_conflict_budget(&mut self, n: i64) {
        self.conflict_budget = n;
    }
    pub fn set_propagation_budget(&mut self, n: i64) {
        self.propagation_budget = n;
    }

    fn within_budget(&self) -> bool {
        !self.has_been_interrupted()
            && (self.conflict_budget < 0 || self.conflicts < self.conflict_budget as u64)
            && (self.propagation_budget < 0
                || self.propagations < self.propagation_budget as u64)
            && !self.cb.stop()
    }

    #[inline(always)]
    pub(crate) fn decision_level(&self) -> u32 {
        self.vars.decision_level()
    }

    pub fn is_ok(&self) -> bool {
        self.ok
    }
    pub fn num_vars(&self) -> u32 {
        self.next_var.idx()
    }
    pub fn num_clauses(&self) -> u64 {
        self.num_clauses
    }
    pub fn num_conflicts(&self) -> u64 {
        self.conflicts
    }
    pub fn num_propagations(&self) -> u64 {
        self.propagations
    }
    pub fn num_decisions(&self) -> u64 {
        self.decisions
    }
    pub fn num_restarts(&self) -> u64 {
        self.starts
    }
    pub fn num_patterns(&self) -> usize {
        self.models.len()
    }

    /// Recorded itemsets as 0-based item indices, in discovery order.
    pub fn patterns(&self) -> Vec<Vec<u32>> {
        self.models
            .iter()
            .map(|&cr| self.ca.get_ref(cr).iter().map(|l| l.var().idx()).collect())
            .collect()
    }

    /// Write the recorded itemsets, one per line, as 1-based item indices.
    pub fn write_patterns<W: Write>(&self, out: &mut W) -> io::Result<()> {
        for &cr in &self.models {
            let c = self.ca.get_ref(cr);
            let mut first = true;
            for &l in c.iter() {
                if !first {
                    write!(out, " ")?;
                }
                write!(out, "{}", l.var().idx() + 1)?;
                first = false;
            }
            writeln!(out)?;
        }
        Ok(())
    }

    /// Export the current clause database in DIMACS format, skipping
    /// satisfied clauses and false literals, with variables renumbered
    /// densely.
    pub fn to_dimacs<W: Write>(&self, out: &mut W) -> io::Result<()> {
        if !self.ok {
            return writeln!(out, "p cnf 1 2\n1 0\n-1 0");
        }

        let mut map: VMap<i32> = VMap::new();
        let mut max: i32 = 0;
        let mut cnt = 0;
        for &cr in &self.clauses {
            if !self.satisfied(self.ca.get_ref(cr)) {
                cnt += 1;
                for &l in self.ca.get_ref(cr).iter() {
                    if self.vars.value_lit(l) != lbool::FALSE {
                        map.reserve(l.var(), -1);
                        if map[l.var()] == -1 {
                            map[l.var()] = max;
                            max += 1;
                        }
                    }
                }
            }
        }

        writeln!(out, "p cnf {} {}", max, cnt)?;
        for &cr in &self.clauses {
            let c = self.ca.get_ref(cr);
            if self.satisfied(c) {
                continue;
            }
            for &l in c.iter() {
                if self.vars.value_lit(l) != lbool::FALSE {
                    write!(
                        out,
                        "{}{} ",
                        if l.sign() { "" } else { "-" },
                        map[l.var()] + 1
                    )?;
                }
            }
            writeln!(out, "0")?;
        }
        Ok(())
    }

    pub fn print_stats(&self) {
        println!("c restarts              : {}", self.starts);
        println!("c conflicts             : {:<12}", self.conflicts);
        println!("c decisions             : {:<12}", self.decisions);
        println!("c propagations          : {:<12}", self.propagations);
        println!("c clauses               : {:<12}", self.num_clauses);
        println!("c patterns              : {:<12}", self.models.len());
    }

    /// Temporary access to the callbacks
    pub fn cb_mut(&mut self) -> &mut Cb {
        &mut self.cb
    }

    /// Temporary access to the callbacks
    pub fn cb(&self) -> &Cb {
        &self.cb
    }

    pub(crate) fn num_subtree_clauses(&self) -> usize {
        self.clauses.len()
    }
}

impl VarState {
    fn new(opts: &SolverOpts) -> Self {
        Self {
            activity: VMap::new(),
            ass: VMap::new(),
            vardata: VMap::new(),
            var_inc: 1.0,
            var_decay: opts.var_decay,
            trail: vec![],
            trail_lim: vec![],
            hu_wei: VMap::new(),
            total_weight: 0,
            witness_start: !0,
        }
    }

    #[inline(always)]
    pub(crate) fn num_assigns(&self) -> u32 {
        self.trail.len() as u32
    }

    /// Begins a new decision level.
    fn new_decision_level(&mut self) {
        let lvl = self.trail.len() as i32;
        self.trail_lim.push(lvl);
    }

    #[inline(always)]
    pub(crate) fn value(&self, x: Var) -> lbool {
        self.ass[x]
    }

    #[inline(always)]
    pub(crate) fn value_lit(&self, x: Lit) -> lbool {
        self.ass[x.var()] ^ !x.sign()
    }

    #[inline(always)]
    pub(crate) fn level(&self, x: Var) -> i32 {
        self.vardata[x].level
    }

    #[inline(always)]
    pub(crate) fn reason(&self, x: Var) -> CRef {
        self.vardata[x].reason
    }

    #[inline(always)]
    pub(crate) fn decision_level(&self) -> u32 {
        self.trail_lim.len() as u32
    }

    #[inline(always)]
    fn is_witness(&self, x: Var) -> bool {
        x.idx() >= self.witness_start
    }

    pub(crate) fn weight_of(&self, x: Var) -> i64 {
        self.hu_wei[x]
    }

    /// Register (or re-register) a witness variable's weight for the current
    /// subtree; the variable must be unassigned.
    pub(crate) fn set_witness_weight(&mut self, x: Var, w: i64) {
        debug_assert!(self.is_witness(x));
        debug_assert_eq!(self.value(x), lbool::UNDEF);
        self.hu_wei[x] = w;
        self.total_weight += w;
    }

    /// Forget the weight of a witness left over from a previous subtree.
    pub(crate) fn clear_witness_weight(&mut self, x: Var) {
        debug_assert_eq!(self.value(x), lbool::UNDEF);
        self.hu_wei[x] = 0;
    }

    pub(crate) fn reset_total_weight(&mut self) {
        self.total_weight = 0;
    }

    pub(crate) fn unchecked_enqueue(&mut self, p: Lit, from: CRef) {
        debug_assert_eq!(
            self.value_lit(p),
            lbool::UNDEF,
            "lit {:?} should be undef",
            p
        );
        self.ass[p.var()] = lbool::new(p.sign());
        self.vardata[p.var()] = VarData::new(from, self.decision_level() as i32);
        self.trail.push(p);
        if !p.sign() && self.is_witness(p.var()) {
            self.total_weight -= self.hu_wei[p.var()];
        }
    }

    /// Undo one assignment, restoring the utility counter for witnesses.
    fn undo_assign(&mut self, p: Lit) {
        self.ass[p.var()] = lbool::UNDEF;
        if !p.sign() && self.is_witness(p.var()) {
            self.total_weight += self.hu_wei[p.var()];
        }
    }

    /// Increase a variable with the current 'bump' value.
    fn var_bump_activity(&mut self, order_heap_data: &mut HeapData<Var>, v: Var) {
        self.activity[v] += self.var_inc;
        if self.activity[v] > 1e100 {
            // Rescale:
            for (_, x) in self.activity.iter_mut() {
                *x *= 1e-100;
            }
            self.var_inc *= 1e-100;
        }

        // Update order_heap with respect to new activity:
        let mut order_heap = order_heap_data.promote(VarOrder {
            activity: &self.activity,
        });
        if order_heap.in_heap(v) {
            order_heap.decrease(v);
        }
    }

    fn var_decay_activity(&mut self) {
        self.var_inc *= 1.0 / self.var_decay;
    }
}

#[derive(Debug, Clone, Copy)]
struct VarData {
    reason: CRef,
    level: i32,
}

impl Default for VarData {
    fn default() -> Self {
        Self {
            reason: CRef::UNDEF,
            level: 0,
        }
    }
}

impl VarData {
    #[inline(always)]
    fn new(reason: CRef, level: i32) -> Self {
        Self { reason, level }
    }
}

#[derive(Debug, Clone, Copy)]
pub(crate) struct Watcher {
    pub(crate) cref: CRef,
    blocker: Lit,
}

impl PartialEq for Watcher {
    #[inline(always)]
    fn eq(&self, rhs: &Self) -> bool {
        self.cref == rhs.cref
    }
}
impl Eq for Watcher {}

impl Watcher {
    const DUMMY: Watcher = Watcher {
        cref: CRef::UNDEF,
        blocker: Lit::UNDEF,
    };
    fn new(cref: CRef, blocker: Lit) -> Self {
        Self { cref, blocker }
    }
}

pub(crate) struct VarOrder<'a> {
    pub(crate) activity: &'a VMap<f64>,
}

impl<'a> Comparator<Var> for VarOrder<'a> {
    fn cmp(&self, lhs: &Var, rhs: &Var) -> cmp::Ordering {
        PartialOrd::partial_cmp(&self.activity[*rhs], &self.activity[*lhs]).expect("NaN activity")
    }
}

/// Predicate to test whether a clause has been removed from some lit's watchlist
struct WatcherDeleted<'a> {
    ca: &'a ClauseAllocator,
}

impl<'a> DeletePred<Watcher> for WatcherDeleted<'a> {
    #[inline]
    fn deleted(&self, w: &Watcher) -> bool {
        self.ca.get_ref(w.cref).mark() == 1
    }
}

mod utils {
    /// Finite subsequences of the Luby-sequence:
    ///
    /// > 0: 1
    /// > 1: 1 1 2
    /// > 2: 1 1 2 1 1 2 4
    /// > 3: 1 1 2 1 1 2 4 1 1 2 1 1 2 4 8
    /// ...
    pub(super) fn luby(y: f64, mut x: i32) -> f64 {
        // Find the finite subsequence that contains index 'x', and the
        // size of that subsequence:
        let mut size = 1;
        let mut seq = 0;
        while size < x + 1 {
            seq += 1;
            size = 2 * size + 1;
        }

        while size - 1 != x {
            size = (size - 1) >> 1;
            seq -= 1;
            x = x % size;
        }

        f64::powi(y, seq)
    }

    /// Generate a random double:
    pub(super) fn drand(seed: &mut f64) -> f64 {
        *seed *= 1389796.0;
        let q = (*seed / 2147483647.0) as i32;
        *seed -= q as f64 * 2147483647.0;
        *seed / 2147483647.0
    }

    /// Generate a random integer:
    pub(super) fn irand(seed: &mut f64, size: i32) -> i32 {
        (drand(seed) * size as f64) as i32
    }
}

#[derive(Debug, Clone)]
pub struct SolverOpts {
    pub var_decay: f64,
    pub clause_decay: f64,
    pub random_var_freq: f64,
    pub random_seed: f64,
    pub ccmin_mode: i32,
    pub phase_saving: i32,
    pub rnd_init_act: bool,
    pub luby_restart: bool,
    pub restart_first: i32,
    pub restart_inc: f64,
    pub garbage_frac: f64,
}

impl Default for SolverOpts {
    fn default() -> SolverOpts {
        Self {
            var_decay: 0.95,
            clause_decay: 0.999,
            random_var_freq: 0.0,
            random_seed: 91648253.0,
            ccmin_mode: 2,
            phase_saving: 2,
            rnd_init_act: false,
            luby_restart: true,
            restart_first: 100,
            restart_inc: 2.0,
            garbage_frac: 0.20,
        }
    }
}

impl SolverOpts {
    /// Check that options are valid.
    pub fn check(&self) -> bool {
        (0.0 < self.var_decay && self.var_decay < 1.0)
            && (0.0 < self.clause_decay && self.clause_decay < 1.0)
            && (0.0 <= self.random_var_freq && self.random_var_freq <= 1.0)
            && (0.0 < self.random_seed && self.random_seed < f64::INFINITY)
            && (0 <= self.ccmin_mode && self.ccmin_mode <= 2)
            && (0 <= self.phase_saving && self.phase_saving <= 2)
            && 1 <= self.restart_first
            && (1.0 < self.restart_inc && self.restart_inc < f64::INFINITY)
            && (0.0 < self.garbage_frac && self.garbage_frac < f64::INFINITY)
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::callbacks::Basic;
    use crate::db::TransactionDb;
    use crate::portfolio::Cooperation;

    fn pos(v: u32) -> Lit {
        Lit::new(Var::from_idx(v), true)
    }
    fn neg(v: u32) -> Lit {
        Lit::new(Var::from_idx(v), false)
    }

    fn sat_solver(ccmin_mode: i32) -> Solver<Basic> {
        let mut opts = SolverOpts::default();
        opts.ccmin_mode = ccmin_mode;
        Solver::new(opts, Basic::new())
    }

    /// Two transactions: T1 = {1:5, 2:3}, T2 = {1:4, 3:2}.
    fn small_db() -> TransactionDb {
        TransactionDb::from_rows(vec![
            (vec![0, 1], vec![5, 3]),
            (vec![0, 2], vec![4, 2]),
        ])
    }

    fn mining_solver(min_supp: i64) -> (Solver<Basic>, TransactionDb, Cooperation) {
        let db = small_db();
        let coop = Cooperation::new(1, min_supp, true);
        let mut s = sat_solver(2);
        s.init_mining(&db, &coop, 0);
        (s, db, coop)
    }

    fn total_weight_from_scratch<Cb: Callbacks>(s: &Solver<Cb>) -> i64 {
        let mut sum = 0;
        for idx in (s.nb_items + s.nb_trans)..s.next_var.idx() {
            let v = Var::from_idx(idx);
            if s.vars.value(v) != lbool::FALSE {
                sum += s.vars.weight_of(v);
            }
        }
        sum
    }

    #[test]
    fn test_add_clause_filters_duplicates_and_tautologies() {
        let mut s = sat_solver(2);
        for _ in 0..3 {
            s.new_var_default();
        }
        // tautology is dropped
        assert!(s.add_clause_reuse(&mut vec![pos(0), neg(0), pos(1)]));
        assert_eq!(s.num_clauses(), 0);
        // duplicate literal collapses
        assert!(s.add_clause_reuse(&mut vec![pos(0), pos(1), pos(0)]));
        assert_eq!(s.num_clauses(), 1);
        let cr = s.clauses[0];
        assert_eq!(s.ca.get_ref(cr).size(), 2);
    }

    #[test]
    fn test_unit_clause_goes_to_trail() {
        let mut s = sat_solver(2);
        s.new_var_default();
        assert!(s.add_clause_reuse(&mut vec![pos(0)]));
        assert_eq!(s.num_clauses(), 0);
        assert_eq!(s.vars.value(Var::from_idx(0)), lbool::TRUE);
        assert_eq!(s.vars.level(Var::from_idx(0)), 0);
    }

    #[test]
    fn test_top_level_contradiction_sets_not_ok() {
        let mut s = sat_solver(2);
        s.new_var_default();
        assert!(s.add_clause_reuse(&mut vec![pos(0)]));
        assert!(!s.add_clause_reuse(&mut vec![neg(0)]));
        assert!(!s.is_ok());
    }

    #[test]
    fn test_propagate_binary_chain() {
        let mut s = sat_solver(2);
        for _ in 0..3 {
            s.new_var_default();
        }
        s.add_clause_reuse(&mut vec![neg(0), pos(1)]);
        s.add_clause_reuse(&mut vec![neg(1), pos(2)]);
        s.new_decision_level();
        s.vars.unchecked_enqueue(pos(0), CRef::UNDEF);
        assert!(s.propagate().is_none());
        assert_eq!(s.vars.value(Var::from_idx(1)), lbool::TRUE);
        assert_eq!(s.vars.value(Var::from_idx(2)), lbool::TRUE);
        assert_eq!(s.vars.level(Var::from_idx(2)), 1);
    }

    /// Watch-scheme invariants: every attached clause is watched
    /// by the negations of its first two literals, and after a quiet
    /// propagation every clause is satisfied or has two non-false literals.
    #[test]
    fn test_watch_invariants_after_propagate() {
        let mut s = sat_solver(2);
        for _ in 0..4 {
            s.new_var_default();
        }
        s.add_clause_reuse(&mut vec![neg(0), pos(1), pos(2)]);
        s.add_clause_reuse(&mut vec![neg(1), pos(3), neg(2)]);
        s.add_clause_reuse(&mut vec![pos(0), pos(2), pos(3)]);
        s.new_decision_level();
        s.vars.unchecked_enqueue(pos(0), CRef::UNDEF);
        assert!(s.propagate().is_none());

        for i in 0..s.clauses.len() {
            let cr = s.clauses[i];
            let c = s.ca.get_ref(cr);
            let (c0, c1) = (c[0], c[1]);
            assert!(
                s.watches_data[!c0].iter().any(|w| w.cref == cr),
                "clause must be watched under !c[0]"
            );
            assert!(
                s.watches_data[!c1].iter().any(|w| w.cref == cr),
                "clause must be watched under !c[1]"
            );
            let c = s.ca.get_ref(cr);
            let sat = s.satisfied(c);
            let non_false = c
                .iter()
                .filter(|&&l| s.vars.value_lit(l) != lbool::FALSE)
                .count();
            assert!(sat || non_false >= 2);
        }
    }

    #[test]
    fn test_cancel_until_postconditions() {
        let mut s = sat_solver(2);
        for _ in 0..4 {
            s.new_var_default();
        }
        s.add_clause_reuse(&mut vec![neg(0), pos(1)]);
        s.new_decision_level();
        s.vars.unchecked_enqueue(pos(0), CRef::UNDEF);
        s.propagate();
        s.new_decision_level();
        s.vars.unchecked_enqueue(pos(2), CRef::UNDEF);
        s.propagate();
        assert_eq!(s.decision_level(), 2);

        s.cancel_until(1);
        assert_eq!(s.decision_level(), 1);
        assert_eq!(s.vars.trail_lim.len(), 1);
        assert_eq!(s.vars.num_assigns() as usize, s.vars.trail.len());
        for &p in &s.vars.trail {
            assert!(s.vars.level(p.var()) <= 1);
        }
        assert_eq!(s.vars.value(Var::from_idx(2)), lbool::UNDEF);
        assert_eq!(s.vars.value(Var::from_idx(1)), lbool::TRUE);
    }

    /// First-UIP shape: the asserting literal is alone at the conflict level
    /// and position 1 carries the backtrack level.
    #[test]
    fn test_analyze_first_uip() {
        let mut s = sat_solver(2);
        for _ in 0..3 {
            s.new_var_default();
        }
        let (a, b, c) = (0, 1, 2);
        s.add_clause_reuse(&mut vec![neg(a), pos(b)]);
        s.add_clause_reuse(&mut vec![neg(a), pos(c)]);
        s.add_clause_reuse(&mut vec![neg(b), neg(c)]);

        s.new_decision_level();
        s.vars.unchecked_enqueue(pos(a), CRef::UNDEF);
        let confl = s.propagate().expect("conflict expected");

        let mut learnt = vec![];
        let bt = s.analyze(confl, &mut learnt);
        assert_eq!(learnt, vec![neg(a)]);
        assert_eq!(bt, 0);
        // seen[] is fully cleared afterwards
        for idx in 0..s.num_vars() {
            assert!(!s.seen[Var::from_idx(idx)]);
        }

        s.record_learnt(&learnt, bt);
        assert!(s.propagate().is_none());
        assert_eq!(s.vars.value(Var::from_idx(a)), lbool::FALSE);
        assert_eq!(s.decision_level(), 0);
    }

    fn minimization_fixture(ccmin_mode: i32) -> (Solver<Basic>, Vec<Lit>, i32) {
        let mut s = sat_solver(ccmin_mode);
        for _ in 0..5 {
            s.new_var_default();
        }
        let (a, b, d, e, f) = (0, 1, 2, 3, 4);
        s.add_clause_reuse(&mut vec![neg(a), pos(b)]);
        s.add_clause_reuse(&mut vec![neg(d), pos(e)]);
        s.add_clause_reuse(&mut vec![neg(d), pos(f)]);
        s.add_clause_reuse(&mut vec![neg(e), neg(f), neg(a), neg(b)]);

        s.new_decision_level();
        s.vars.unchecked_enqueue(pos(a), CRef::UNDEF);
        assert!(s.propagate().is_none());
        s.new_decision_level();
        s.vars.unchecked_enqueue(pos(d), CRef::UNDEF);
        let confl = s.propagate().expect("conflict expected");

        let mut learnt = vec![];
        let bt = s.analyze(confl, &mut learnt);
        (s, learnt, bt)
    }

    #[test]
    fn test_minimization_drops_implied_literal() {
        let (s, learnt, bt) = minimization_fixture(2);
        // b is implied by a, so deep minimization removes it
        assert_eq!(learnt.len(), 2);
        assert_eq!(learnt[0], neg(2)); // the UIP: -d
        assert_eq!(learnt[1], neg(0)); // -a, at the backtrack level
        assert_eq!(bt, 1);
        assert_eq!(s.vars.level(learnt[0].var()), 2);
    }

    #[test]
    fn test_minimization_mode_0_keeps_implied_literal() {
        let (_s, learnt, bt) = minimization_fixture(0);
        assert_eq!(learnt.len(), 3);
        assert_eq!(learnt[0], neg(2));
        assert_eq!(bt, 1);
    }

    #[test]
    fn test_encode_builds_feasible_subtree() {
        let (mut s, db, _coop) = mining_solver(7);
        assert!(s.encode_guiding_path(&db, 1));
        // the pivot is asserted, the total weight counts the live witnesses
        assert_eq!(s.vars.value(db.all_items[0]), lbool::TRUE);
        assert!(s.vars.total_weight >= 7);
        assert_eq!(s.vars.total_weight, total_weight_from_scratch(&s));
    }

    #[test]
    fn test_encode_prunes_low_utility_pivot() {
        let (mut s, db, _coop) = mining_solver(100);
        // no item reaches utility 100
        assert!(!s.encode_guiding_path(&db, 1));
        assert_eq!(s.vars.trail.len(), 0);
    }

    /// The decide-then-cancel law: a decision level opened, filled and
    /// cancelled leaves assignment, trail, utility counter and heap intact.
    #[test]
    fn test_decide_then_cancel_restores_state() {
        let (mut s, db, _coop) = mining_solver(7);
        assert!(s.encode_guiding_path(&db, 1));
        assert!(s.propagate().is_none());

        let trail_len = s.vars.trail.len();
        let weight = s.vars.total_weight;
        let heap_len = s.order_heap_data.len();
        let values: Vec<lbool> = (0..s.num_vars())
            .map(|i| s.vars.value(Var::from_idx(i)))
            .collect();

        // decide the remaining item, propagate, then undo
        s.new_decision_level();
        s.vars.unchecked_enqueue(pos(1), CRef::UNDEF);
        assert!(s.propagate().is_none());
        assert_ne!(s.vars.total_weight, weight);

        s.cancel_until(0);
        assert_eq!(s.vars.trail.len(), trail_len);
        assert_eq!(s.vars.total_weight, weight);
        assert_eq!(s.order_heap_data.len(), heap_len);
        for i in 0..s.num_vars() {
            assert_eq!(s.vars.value(Var::from_idx(i)), values[i as usize]);
        }
        assert_eq!(s.vars.total_weight, total_weight_from_scratch(&s));
    }

    /// The utility counter must match the non-false witness weights at every
    /// point of the search.
    #[test]
    fn test_total_weight_invariant_through_search() {
        let (mut s, db, coop) = mining_solver(7);
        let status = s.solve(&db, &coop);
        assert_eq!(status, lbool::FALSE);
        assert_eq!(s.vars.total_weight, total_weight_from_scratch(&s));
        let mut found = s.patterns();
        found.sort();
        assert_eq!(found, vec![vec![0], vec![0, 1]]);
    }

    #[test]
    fn test_wipe_subtree_clauses_empties_database() {
        let (mut s, db, _coop) = mining_solver(7);
        assert!(s.encode_guiding_path(&db, 1));
        assert!(s.num_clauses() > 0);
        s.cancel_all();
        s.wipe_subtree_clauses();
        assert_eq!(s.num_clauses(), 0);
        assert_eq!(s.num_subtree_clauses(), 0);
        assert!(s.ca.wasted() > 0);
    }

    /// GC is observationally a no-op on surviving clause content.
    #[test]
    fn test_garbage_collect_preserves_clauses() {
        let (mut s, db, coop) = mining_solver(7);
        let status = s.solve(&db, &coop);
        assert_eq!(status, lbool::FALSE);
        let before = s.patterns();
        let subtree: Vec<Vec<Lit>> = s
            .clauses
            .iter()
            .map(|&cr| s.ca.get_ref(cr).lits().to_vec())
            .collect();
        s.garbage_collect();
        assert_eq!(s.patterns(), before);
        let after: Vec<Vec<Lit>> = s
            .clauses
            .iter()
            .map(|&cr| s.ca.get_ref(cr).lits().to_vec())
            .collect();
        assert_eq!(subtree, after);
        assert_eq!(s.ca.wasted(), 0);
    }

    #[test]
    fn test_take_fixed_units_advances_cursor() {
        let mut s = sat_solver(2);
        for _ in 0..2 {
            s.new_var_default();
        }
        s.add_clause_reuse(&mut vec![pos(0)]);
        assert_eq!(s.take_fixed_units(), &[pos(0)][..]);
        assert!(s.take_fixed_units().is_empty());
        s.add_clause_reuse(&mut vec![pos(1)]);
        assert_eq!(s.take_fixed_units(), &[pos(1)][..]);
    }

    #[test]
    fn test_luby_prefix() {
        let expect = [1.0, 1.0, 2.0, 1.0, 1.0, 2.0, 4.0];
        for (i, &e) in expect.iter().enumerate() {
            assert_eq!(utils::luby(2.0, i as i32), e);
        }
    }
}
