/*****************************************************************************************[encode.rs]
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

//! Per-subtree CNF construction.
//!
//! Subtree `k` of the guiding path explores the itemsets that contain item
//! `all_items[k-1]` and exclude `all_items[0..k-1]`. The encoder asserts that
//! prefix at level 0, then builds, over the transactions containing the pivot
//! item:
//!
//! - one weighted witness variable `a` per live (item, transaction) pair with
//!   `a → covered(t)` and `a → item`, so that the utility counter tracks the
//!   maximum achievable utility;
//! - support constraints tying each transaction variable to the items outside
//!   the transaction;
//! - in closed mode, closure constraints forcing an item into the itemset
//!   whenever every covering transaction contains it, and blocking itemsets
//!   whose closure contains an item already handled by an earlier subtree.

use {
    crate::callbacks::Callbacks,
    crate::clause::{lbool, CRef, Lit, Var},
    crate::core::{Solver, VarOrder},
    crate::db::TransactionDb,
    std::mem,
};

impl<Cb: Callbacks> Solver<Cb> {
    /// Encode the first subtree whose pivot passes the utility threshold.
    /// Used by the DIMACS export; the enumeration loop drives
    /// `encode_guiding_path` directly.
    pub fn encode_first_subtree(&mut self, db: &TransactionDb) -> bool {
        for index in 1..=db.all_items.len() {
            if self.encode_guiding_path(db, index) {
                return true;
            }
        }
        false
    }

    /// Extend the clause database for guiding-path subtree `index` (1-based).
    ///
    /// Returns `false` when the pivot item's total utility is already below
    /// the threshold; the caller then advances to the next subtree.
    pub(crate) fn encode_guiding_path(&mut self, db: &TransactionDb, index: usize) -> bool {
        debug_assert!(index >= 1 && index <= db.all_items.len());
        debug_assert_eq!(self.decision_level(), 0);

        let pivot = db.all_items[index - 1];
        if db.wocc[pivot.idx() as usize] < self.min_supp {
            return false;
        }
        trace!("encode subtree {} (pivot {:?})", index, pivot);

        // assert the guiding-path prefix at level 0
        for i in 0..index - 1 {
            let v = db.all_items[i];
            self.vars.unchecked_enqueue(Lit::new(v, false), CRef::UNDEF);
            self.seen[v] = true;
        }
        self.vars.unchecked_enqueue(Lit::new(pivot, true), CRef::UNDEF);

        let scope_trans = &db.appear_trans[pivot.idx() as usize];
        let current_db_size = scope_trans.len();

        // witness variables are reused across subtrees; stale weights must not
        // leak into the fresh utility counter
        let mut init_vars = self.nb_items + self.nb_trans;
        for w_idx in init_vars..self.next_var.idx() {
            self.vars.clear_witness_weight(Var::from_idx(w_idx));
        }
        self.vars.reset_total_weight();

        self.encode_items.clear();
        let mut current_db: Vec<Lit> = Vec::with_capacity(current_db_size);

        for &tid in scope_trans.iter() {
            let qt = Lit::new(Var::from_idx(self.nb_items + tid), true);
            current_db.push(qt);

            let titems = &db.transactions[tid as usize];
            let tweights = &db.weights[tid as usize];
            let mut w_cur: i64 = 0;
            for (j, &item) in titems.iter().enumerate() {
                let v = Var::from_idx(item);
                let r = Lit::new(v, true);
                if self.vars.value_lit(r) != lbool::FALSE {
                    let a = if init_vars < self.next_var.idx() {
                        Var::from_idx(init_vars)
                    } else {
                        self.new_var(false)
                    };
                    init_vars += 1;
                    let al = Lit::new(a, true);
                    self.add_binary(!al, qt);
                    self.add_binary(!al, r);
                    self.vars.set_witness_weight(a, tweights[j]);
                    w_cur += tweights[j];
                }
                self.local_trans[v].push(qt);
                if !self.seen[v] {
                    self.seen[v] = true;
                    self.encode_items.push(v);
                }
            }
            // residual achievable utility of each item of the transaction
            for &item in titems.iter() {
                self.occ[Var::from_idx(item)] += w_cur;
            }
        }

        for i in 0..self.encode_items.len() {
            let v = self.encode_items[i];
            self.seen[v] = false;
        }
        for i in 0..index {
            self.seen[db.all_items[i]] = false;
        }

        // an item whose achievable utility in this subtree is below the
        // threshold can never appear in a reported itemset here
        for i in 0..self.encode_items.len() {
            let v = self.encode_items[i];
            if self.vars.value(v) == lbool::UNDEF && self.occ[v] < self.min_supp {
                self.vars.unchecked_enqueue(Lit::new(v, false), CRef::UNDEF);
                if self.propagate().is_some() {
                    self.ok = false;
                }
            }
        }

        if self.vars.total_weight >= self.min_supp {
            for &tid in scope_trans.iter() {
                self.add_support_constraints(db, tid);
            }
            if self.enum_clos {
                for i in 0..self.encode_items.len() {
                    let v = self.encode_items[i];
                    if self.vars.value(v) != lbool::TRUE {
                        self.add_closure_constraints(Some(Lit::new(v, true)), &current_db, v);
                    }
                }
                // itemsets whose closure contains an earlier pivot belong to
                // that pivot's subtree and must not be re-reported here
                for i in self.div_begining..index - 1 {
                    let v = db.all_items[i];
                    if self.occ[v] >= self.min_supp {
                        self.add_closure_constraints(None, &current_db, v);
                    }
                }
            }
        }

        // reorder the heap with the unassigned items of the subtree, keyed so
        // that items covering more transactions are decided first
        let mut vs: Vec<Var> = Vec::with_capacity(self.encode_items.len());
        for i in 0..self.encode_items.len() {
            let v = self.encode_items[i];
            if self.vars.value(v) == lbool::UNDEF {
                self.vars.activity[v] = (current_db_size - self.local_trans[v].len()) as f64;
                vs.push(v);
            }
        }
        self.order_heap_data
            .promote(VarOrder {
                activity: &self.vars.activity,
            })
            .build(&vs);

        for i in 0..self.nb_items {
            let v = Var::from_idx(i);
            self.local_trans[v].clear();
            self.occ[v] = 0;
        }

        self.run_garbage_budget();

        true
    }

    /// Tie transaction `tid`'s variable to the subtree scope: selecting any
    /// scope item outside the transaction refutes coverage, and if no such
    /// item is selected the transaction covers the itemset.
    fn add_support_constraints(&mut self, db: &TransactionDb, tid: u32) {
        let qt = Lit::new(Var::from_idx(self.nb_items + tid), true);
        let titems = &db.transactions[tid as usize];
        for &item in titems.iter() {
            self.seen[Var::from_idx(item)] = true;
        }

        let mut liste: Vec<Lit> = vec![];
        for i in 0..self.encode_items.len() {
            let v = self.encode_items[i];
            if !self.seen[v] && self.vars.value(v) != lbool::FALSE {
                liste.push(Lit::new(v, true));
            }
        }
        liste.push(qt);
        self.add_clause_reuse(&mut liste);

        for i in 0..self.encode_items.len() {
            let v = self.encode_items[i];
            if !self.seen[v] && self.vars.value(v) != lbool::FALSE {
                self.add_binary(!qt, Lit::new(v, false));
            }
        }

        for &item in titems.iter() {
            self.seen[Var::from_idx(item)] = false;
        }
    }

    /// Closure constraint for `v`: some covering transaction must avoid `v`,
    /// or `v` itself is part of the itemset (when `item` is given).
    fn add_closure_constraints(&mut self, item: Option<Lit>, current_db: &[Lit], v: Var) {
        let app = mem::replace(&mut self.local_trans[v], vec![]);
        for &qt in app.iter() {
            self.seen[qt.var()] = true;
        }

        let mut liste: Vec<Lit> = vec![];
        for &qt in current_db.iter() {
            if !self.seen[qt.var()] {
                liste.push(qt);
            }
        }
        if let Some(q) = item {
            liste.push(q);
        }
        self.add_clause_reuse(&mut liste);

        for &qt in app.iter() {
            self.seen[qt.var()] = false;
        }
        self.local_trans[v] = app;
    }
}
