/*****************************************************************************************[db.rs]
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

//! Weighted transaction database and its text-format loader.
//!
//! Each input line is one transaction, three fields separated by `-1` tokens
//! and terminated by `0`:
//!
//! ```text
//! <items...> -1 <TWU> -1 <per-item-utilities...> 0
//! ```
//!
//! Items are 1-based; the i-th utility belongs to the i-th item.

use crate::clause::Var;
use std::io::{self, BufRead};

/// Read-only description of the mining problem, shared by all solver
/// instances of a portfolio.
#[derive(Debug, Clone, Default)]
pub struct TransactionDb {
    /// Number of distinct items (the largest item index seen).
    pub nb_items: usize,
    /// Per-transaction item lists, 0-based item indices.
    pub transactions: Vec<Vec<u32>>,
    /// Per-transaction utilities, parallel to `transactions`.
    pub weights: Vec<Vec<i64>>,
    /// Total utility of each item over the whole database.
    pub wocc: Vec<i64>,
    /// Inverted index: `appear_trans[item]` lists the transactions containing it.
    pub appear_trans: Vec<Vec<u32>>,
    /// Guiding order over item variables, descending total utility.
    pub all_items: Vec<Var>,
}

impl TransactionDb {
    pub fn nb_trans(&self) -> usize {
        self.transactions.len()
    }

    /// Build a database from `(items, utilities)` rows with 0-based items.
    ///
    /// This is the programmatic entry point; the file parser feeds it too.
    pub fn from_rows(rows: Vec<(Vec<u32>, Vec<i64>)>) -> TransactionDb {
        let mut db = TransactionDb::default();
        for (items, utils) in rows {
            debug_assert_eq!(items.len(), utils.len());
            let tid = db.transactions.len() as u32;
            for (j, &it) in items.iter().enumerate() {
                let it = it as usize;
                if it >= db.nb_items {
                    db.nb_items = it + 1;
                    db.wocc.resize(db.nb_items, 0);
                    db.appear_trans.resize(db.nb_items, Vec::new());
                }
                db.wocc[it] += utils[j];
                db.appear_trans[it].push(tid);
            }
            db.transactions.push(items);
            db.weights.push(utils);
        }
        db.build_guiding_order();
        db
    }

    /// Order item variables by descending total utility, ties by index.
    fn build_guiding_order(&mut self) {
        let mut order: Vec<u32> = (0..self.nb_items as u32).collect();
        let wocc = &self.wocc;
        order.sort_by(|&a, &b| {
            wocc[b as usize]
                .cmp(&wocc[a as usize])
                .then_with(|| a.cmp(&b))
        });
        self.all_items = order.into_iter().map(Var::from_idx).collect();
    }
}

/// `parse(input)` reads a whole utility-transaction file.
pub fn parse<R: BufRead>(input: &mut R) -> io::Result<TransactionDb> {
    let mut rows = vec![];
    let mut line = String::new();
    let mut lineno = 0usize;
    loop {
        line.clear();
        if input.read_line(&mut line)? == 0 {
            break;
        }
        lineno += 1;
        let trimmed = line.trim();
        if trimmed.is_empty() || trimmed.starts_with('#') || trimmed.starts_with('%') {
            continue;
        }
        rows.push(parse_transaction(trimmed, lineno)?);
    }
    Ok(TransactionDb::from_rows(rows))
}

fn parse_transaction(line: &str, lineno: usize) -> io::Result<(Vec<u32>, Vec<i64>)> {
    let mut items: Vec<u32> = vec![];
    let mut utils: Vec<i64> = vec![];
    let mut twu_seen = false;

    // 0 = items, 1 = transaction-weighted utility, 2 = per-item utilities
    let mut field = 0;
    let mut terminated = false;
    for tok in line.split_whitespace() {
        if terminated {
            return parse_error(format!("line {}: trailing data after terminator", lineno));
        }
        let val: i64 = tok
            .parse()
            .map_err(|_| parse_error_raw(format!("line {}: bad token '{}'", lineno, tok)))?;
        match (field, val) {
            (f, -1) if f < 2 => field += 1,
            (2, 0) => terminated = true,
            (0, v) if v >= 1 => items.push((v - 1) as u32),
            (1, v) if v >= 0 => twu_seen = true,
            (2, v) if v >= 0 => utils.push(v),
            _ => {
                return parse_error(format!("line {}: unexpected token '{}'", lineno, tok));
            }
        }
    }
    if !terminated {
        return parse_error(format!("line {}: missing '0' terminator", lineno));
    }
    if !twu_seen {
        return parse_error(format!("line {}: missing TWU field", lineno));
    }
    if items.is_empty() {
        return parse_error(format!("line {}: empty transaction", lineno));
    }
    if items.len() != utils.len() {
        return parse_error(format!(
            "line {}: {} items but {} utilities",
            lineno,
            items.len(),
            utils.len()
        ));
    }
    Ok((items, utils))
}

fn parse_error<T>(message: String) -> io::Result<T> {
    Err(parse_error_raw(message))
}

fn parse_error_raw(message: String) -> io::Error {
    io::Error::new(io::ErrorKind::InvalidInput, message)
}

#[cfg(test)]
mod test {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn test_parse_simple() {
        let input = "1 2 -1 8 -1 5 3 0\n1 3 -1 6 -1 4 2 0\n";
        let db = parse(&mut Cursor::new(input)).unwrap();
        assert_eq!(db.nb_items, 3);
        assert_eq!(db.nb_trans(), 2);
        assert_eq!(db.transactions[0], vec![0, 1]);
        assert_eq!(db.weights[1], vec![4, 2]);
        assert_eq!(db.wocc, vec![9, 3, 2]);
        assert_eq!(db.appear_trans[0], vec![0, 1]);
        assert_eq!(db.appear_trans[2], vec![1]);
        // item 1 carries the most utility, so it leads the guiding order
        let order: Vec<u32> = db.all_items.iter().map(|v| v.idx()).collect();
        assert_eq!(order, vec![0, 1, 2]);
    }

    #[test]
    fn test_parse_skips_comments_and_blanks() {
        let input = "# header\n\n% note\n5 -1 10 -1 10 0\n";
        let db = parse(&mut Cursor::new(input)).unwrap();
        assert_eq!(db.nb_trans(), 1);
        assert_eq!(db.nb_items, 5);
        assert_eq!(db.transactions[0], vec![4]);
    }

    #[test]
    fn test_parse_rejects_count_mismatch() {
        let input = "1 2 -1 8 -1 5 0\n";
        let err = parse(&mut Cursor::new(input)).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::InvalidInput);
    }

    #[test]
    fn test_parse_rejects_missing_terminator() {
        let input = "1 2 -1 8 -1 5 3\n";
        assert!(parse(&mut Cursor::new(input)).is_err());
    }

    #[test]
    fn test_guiding_order_breaks_ties_by_index() {
        let input = "1 2 -1 4 -1 2 2 0\n1 2 -1 4 -1 2 2 0\n";
        let db = parse(&mut Cursor::new(input)).unwrap();
        let order: Vec<u32> = db.all_items.iter().map(|v| v.idx()).collect();
        assert_eq!(order, vec![0, 1]);
    }
}
