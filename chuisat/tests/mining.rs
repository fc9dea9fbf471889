//! End-to-end enumeration checks on small hand-built databases.

use chuisat::{lbool, portfolio, BasicCallbacks, Cooperation, Solver, SolverOpts, TransactionDb};

fn run(db: &TransactionDb, min_supp: i64, closed: bool) -> Vec<Vec<u32>> {
    let coop = Cooperation::new(1, min_supp, closed);
    let mut solver = Solver::new(SolverOpts::default(), BasicCallbacks::new());
    solver.init_mining(db, &coop, 0);
    let status = solver.solve(db, &coop);
    assert_eq!(status, lbool::FALSE, "enumeration must run to completion");
    let mut found = solver.patterns();
    for p in found.iter_mut() {
        p.sort();
    }
    found.sort();
    found
}

/// Utility of `itemset` over the database, summed over covering transactions.
fn utility(db: &TransactionDb, itemset: &[u32]) -> i64 {
    let mut total = 0;
    for (titems, tweights) in db.transactions.iter().zip(db.weights.iter()) {
        if itemset.iter().all(|i| titems.contains(i)) {
            for (j, it) in titems.iter().enumerate() {
                if itemset.contains(it) {
                    total += tweights[j];
                }
            }
        }
    }
    total
}

/// T1 = {1:5, 2:3}, T2 = {1:4, 3:2}
fn two_transactions() -> TransactionDb {
    TransactionDb::from_rows(vec![(vec![0, 1], vec![5, 3]), (vec![0, 2], vec![4, 2])])
}

/// Three identical transactions {1:2, 2:2}
fn three_identical() -> TransactionDb {
    TransactionDb::from_rows(vec![
        (vec![0, 1], vec![2, 2]),
        (vec![0, 1], vec![2, 2]),
        (vec![0, 1], vec![2, 2]),
    ])
}

#[test]
fn closed_mining_two_transactions() {
    let db = two_transactions();
    // expected: {1} with utility 9 and {1,2} with utility 8;
    // not {2} (3), not {3} (2), not {1,3} (6)
    let found = run(&db, 7, true);
    assert_eq!(found, vec![vec![0], vec![0, 1]]);
    assert_eq!(utility(&db, &[0]), 9);
    assert_eq!(utility(&db, &[0, 1]), 8);
    assert_eq!(utility(&db, &[0, 2]), 6);
}

#[test]
fn single_transaction_single_item() {
    let db = TransactionDb::from_rows(vec![(vec![0], vec![10])]);
    assert_eq!(run(&db, 5, true), vec![vec![0]]);
}

#[test]
fn closure_absorbs_subsumed_items() {
    let db = three_identical();
    // {1} and {2} (utility 6 each) are not closed: every transaction
    // containing one also contains the other
    assert_eq!(run(&db, 5, true), vec![vec![0, 1]]);
    assert_eq!(utility(&db, &[0, 1]), 12);
}

#[test]
fn open_mode_reports_subsumed_items() {
    let db = three_identical();
    assert_eq!(
        run(&db, 5, false),
        vec![vec![0], vec![0, 1], vec![1]]
    );
}

#[test]
fn empty_database_yields_nothing() {
    let db = TransactionDb::from_rows(vec![]);
    assert_eq!(run(&db, 1, true), Vec::<Vec<u32>>::new());
}

#[test]
fn unreachable_threshold_yields_nothing() {
    let db = two_transactions();
    // larger than the sum of all utilities
    assert_eq!(run(&db, 1_000_000, true), Vec::<Vec<u32>>::new());
    assert_eq!(run(&db, i64::max_value(), true), Vec::<Vec<u32>>::new());
}

#[test]
fn zero_threshold_enumerates_all_subsets_open_mode() {
    let db = TransactionDb::from_rows(vec![(vec![0, 1], vec![1, 1])]);
    assert_eq!(
        run(&db, 0, false),
        vec![vec![0], vec![0, 1], vec![1]]
    );
}

#[test]
fn every_reported_itemset_reaches_the_threshold() {
    let db = TransactionDb::from_rows(vec![
        (vec![0, 1, 2], vec![4, 1, 3]),
        (vec![0, 2, 3], vec![2, 6, 1]),
        (vec![1, 3], vec![5, 5]),
        (vec![0, 1, 3], vec![1, 2, 2]),
    ]);
    for &min_supp in &[1i64, 5, 8, 12] {
        for &closed in &[true, false] {
            let found = run(&db, min_supp, closed);
            // no duplicates across the guiding-path partition
            let mut dedup = found.clone();
            dedup.dedup();
            assert_eq!(found, dedup);
            for p in &found {
                assert!(
                    utility(&db, p) >= min_supp,
                    "itemset {:?} below threshold {}",
                    p,
                    min_supp
                );
            }
        }
    }
}

#[test]
fn open_mode_matches_exhaustive_reference() {
    let db = TransactionDb::from_rows(vec![
        (vec![0, 1, 2], vec![4, 1, 3]),
        (vec![0, 2, 3], vec![2, 6, 1]),
        (vec![1, 3], vec![5, 5]),
        (vec![0, 1, 3], vec![1, 2, 2]),
    ]);
    let min_supp = 5;

    // brute force over all non-empty subsets of the four items
    let mut expected: Vec<Vec<u32>> = vec![];
    for mask in 1u32..16 {
        let subset: Vec<u32> = (0..4).filter(|i| mask & (1 << i) != 0).collect();
        if utility(&db, &subset) >= min_supp {
            expected.push(subset);
        }
    }
    expected.sort();

    assert_eq!(run(&db, min_supp, false), expected);
}

#[test]
fn closed_itemsets_have_no_equal_support_superset() {
    let db = TransactionDb::from_rows(vec![
        (vec![0, 1, 2], vec![4, 1, 3]),
        (vec![0, 2, 3], vec![2, 6, 1]),
        (vec![1, 3], vec![5, 5]),
        (vec![0, 1, 3], vec![1, 2, 2]),
    ]);
    let cover = |itemset: &[u32]| -> Vec<usize> {
        db.transactions
            .iter()
            .enumerate()
            .filter(|(_, t)| itemset.iter().all(|i| t.contains(i)))
            .map(|(tid, _)| tid)
            .collect()
    };
    let found = run(&db, 5, true);
    assert!(!found.is_empty());
    for a in &found {
        for b in &found {
            if a != b && a.iter().all(|x| b.contains(x)) {
                assert_ne!(cover(a), cover(b), "{:?} is not closed against {:?}", a, b);
            }
        }
    }
}

#[test]
fn portfolio_matches_single_thread() {
    let db = TransactionDb::from_rows(vec![
        (vec![0, 1, 2], vec![4, 1, 3]),
        (vec![0, 2, 3], vec![2, 6, 1]),
        (vec![1, 3], vec![5, 5]),
        (vec![0, 1, 3], vec![1, 2, 2]),
        (vec![2, 3], vec![3, 4]),
    ]);
    let single = run(&db, 6, true);

    let coop = Cooperation::new(2, 6, true);
    let result = portfolio::mine(&db, &coop, &SolverOpts::default());
    assert_eq!(result.status, lbool::FALSE);
    let mut found = result.patterns;
    for p in found.iter_mut() {
        p.sort();
    }
    found.sort();
    assert_eq!(found, single);
}

#[test]
fn geometric_restarts_reach_the_same_set() {
    let db = two_transactions();
    let mut opts = SolverOpts::default();
    opts.luby_restart = false;
    opts.restart_first = 1;
    let coop = Cooperation::new(1, 7, true);
    let mut solver = Solver::new(opts, BasicCallbacks::new());
    solver.init_mining(&db, &coop, 0);
    assert_eq!(solver.solve(&db, &coop), lbool::FALSE);
    let mut found = solver.patterns();
    found.sort();
    assert_eq!(found, vec![vec![0], vec![0, 1]]);
}

#[test]
fn interrupt_reports_undef() {
    let db = two_transactions();
    let coop = Cooperation::new(1, 1, true);
    let mut cb = BasicCallbacks::new();
    cb.set_stop(|| true);
    let mut solver = Solver::new(SolverOpts::default(), cb);
    solver.init_mining(&db, &coop, 0);
    assert_eq!(solver.solve(&db, &coop), lbool::UNDEF);
}
