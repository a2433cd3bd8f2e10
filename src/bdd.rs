//! Reduced ordered BDD with attributed (complement) edges.
//!
//! A single terminal (Base, the constant true) exists; the constant
//! false is a complement edge to it. The complement bit lives on the
//! [`Ref`] handle, and [`mk_node`][Bdd::mk_node] restores canonicity by
//! flipping a negated high edge, so a function has exactly one
//! representation. Variable order equals the variable index.
//!
//! The BDD serves as an intermediate representation on one of the two
//! cut-set construction paths; [`Zbdd::from_bdd`][crate::zbdd::Zbdd::from_bdd]
//! reads its node shape and edge convention.

use std::collections::HashMap;

use log::debug;

use crate::cache::Cache;
use crate::graph::{FaultTree, GateState, GateType};
use crate::reference::Ref;
use crate::storage::Storage;
use crate::utils::{pairing3, MyHash};

/// An if-then-else vertex. The stored high edge is never negated.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub struct IteNode {
    pub variable: u32,
    pub high: Ref,
    pub low: Ref,
}

impl Default for IteNode {
    fn default() -> Self {
        Self {
            variable: 0,
            high: Ref::INVALID,
            low: Ref::INVALID,
        }
    }
}

impl MyHash for IteNode {
    fn hash(&self) -> u64 {
        pairing3(
            self.variable as u64,
            self.high.unsigned() as u64,
            self.low.unsigned() as u64,
        )
    }
}

/// The BDD manager: owns the node storage, the unique table, and the
/// ITE compute table. All operations go through the manager.
pub struct Bdd {
    storage: Storage<IteNode>,
    ite_cache: Cache<(Ref, Ref, Ref), Ref>,
    one: Ref,
    zero: Ref,
    root: Ref,
}

impl Default for Bdd {
    fn default() -> Self {
        Self::new(16)
    }
}

impl Bdd {
    pub fn new(bits: usize) -> Self {
        let mut storage = Storage::with_sentry(bits);
        // The single terminal node (Base).
        let terminal = storage.alloc(IteNode::default());
        assert_eq!(terminal, 1);
        let one = Ref::positive(1);
        Self {
            storage,
            ite_cache: Cache::new(bits.min(16)),
            one,
            zero: -one,
            root: one,
        }
    }

    /// Builds the BDD of a preprocessed Boolean graph. Module gates are
    /// expanded inline; only AND, OR, and pass-through operators are
    /// expected.
    pub fn from_graph(graph: &FaultTree) -> Self {
        let mut bdd = Bdd::default();
        let root_gate = graph.root();
        bdd.root = match graph.gate(root_gate).state() {
            GateState::Null => bdd.zero,
            GateState::Unity => bdd.one,
            GateState::Normal => {
                let mut gates = HashMap::new();
                bdd.convert_gate(graph, root_gate, &mut gates)
            }
        };
        bdd
    }

    fn convert_gate(
        &mut self,
        graph: &FaultTree,
        index: u32,
        gates: &mut HashMap<u32, Ref>,
    ) -> Ref {
        if let Some(&result) = gates.get(&index) {
            return result;
        }
        let gate_type = graph.gate(index).gate_type();
        let args: Vec<i32> = graph.gate(index).args().iter().copied().collect();
        let result = match gate_type {
            GateType::Null => match args.first() {
                Some(&arg) => self.convert_arg(graph, arg, gates),
                None => self.zero,
            },
            GateType::And | GateType::Or => {
                let mut acc: Option<Ref> = None;
                for signed in args {
                    let f = self.convert_arg(graph, signed, gates);
                    acc = Some(match acc {
                        None => f,
                        Some(acc) if gate_type == GateType::And => self.apply_and(acc, f),
                        Some(acc) => self.apply_or(acc, f),
                    });
                }
                acc.expect("gates have arguments")
            }
            other => unreachable!("a {:?} gate in a preprocessed graph", other),
        };
        gates.insert(index, result);
        result
    }

    fn convert_arg(&mut self, graph: &FaultTree, signed: i32, gates: &mut HashMap<u32, Ref>) -> Ref {
        let index = signed.unsigned_abs();
        let f = if graph.is_variable(index) {
            self.mk_var(index)
        } else {
            self.convert_gate(graph, index, gates)
        };
        if signed < 0 {
            -f
        } else {
            f
        }
    }

    /// The function this BDD was built for.
    pub fn root(&self) -> Ref {
        self.root
    }

    pub fn one(&self) -> Ref {
        self.one
    }
    pub fn zero(&self) -> Ref {
        self.zero
    }

    pub fn is_zero(&self, node: Ref) -> bool {
        node == self.zero
    }
    pub fn is_one(&self, node: Ref) -> bool {
        node == self.one
    }
    pub fn is_terminal(&self, node: Ref) -> bool {
        node.index() == 1
    }

    pub fn variable(&self, index: u32) -> u32 {
        self.storage.value(index as usize).variable
    }
    pub fn high(&self, index: u32) -> Ref {
        self.storage.value(index as usize).high
    }
    pub fn low(&self, index: u32) -> Ref {
        self.storage.value(index as usize).low
    }
}

impl Bdd {
    /// Interns an ITE node, restoring canonicity: the high edge must
    /// not be negated, and redundant tests collapse.
    pub fn mk_node(&mut self, variable: u32, low: Ref, high: Ref) -> Ref {
        assert_ne!(variable, 0, "Variable index must not be zero");
        if high.is_negated() {
            return -self.mk_node(variable, -low, -high);
        }
        if low == high {
            return low;
        }
        let index = self.storage.put(IteNode { variable, high, low });
        Ref::positive(index as u32)
    }

    pub fn mk_var(&mut self, variable: u32) -> Ref {
        self.mk_node(variable, self.zero, self.one)
    }

    /// Cofactors of the function with respect to the given top
    /// variable: `(f | v=0, f | v=1)`.
    pub fn top_cofactors(&self, node: Ref, variable: u32) -> (Ref, Ref) {
        debug_assert_ne!(variable, 0);
        let index = node.index();
        if self.is_terminal(node) || variable < self.variable(index) {
            return (node, node);
        }
        debug_assert_eq!(variable, self.variable(index));
        if node.is_negated() {
            (-self.low(index), -self.high(index))
        } else {
            (self.low(index), self.high(index))
        }
    }

    /// The ITE operation: `ite(f, g, h) = (f ∧ g) ∨ (¬f ∧ h)`.
    pub fn apply_ite(&mut self, f: Ref, g: Ref, h: Ref) -> Ref {
        debug!("apply_ite({}, {}, {})", f, g, h);

        // Terminal tests.
        if self.is_one(f) {
            return g;
        }
        if self.is_zero(f) {
            return h;
        }
        debug_assert!(!self.is_terminal(f));

        if g == h {
            return g;
        }
        if self.is_one(g) && self.is_zero(h) {
            return f;
        }
        if self.is_zero(g) && self.is_one(h) {
            return -f;
        }

        // Standard triples reduce to fewer distinct arguments.
        if g == f {
            return self.apply_ite(f, self.one, h);
        }
        if g == -f {
            return self.apply_ite(f, self.zero, h);
        }
        if h == f {
            return self.apply_ite(f, g, self.zero);
        }
        if h == -f {
            return self.apply_ite(f, g, self.one);
        }

        // Canonical form: the first argument and the "then" branch are
        // regular, so complement variants share one cache entry.
        let (mut f, mut g, mut h) = (f, g, h);
        if f.is_negated() {
            f = -f;
            std::mem::swap(&mut g, &mut h);
        }
        let mut negate_result = false;
        if g.is_negated() {
            negate_result = true;
            g = -g;
            h = -h;
        }

        if let Some(&result) = self.ite_cache.get(&(f, g, h)) {
            return if negate_result { -result } else { result };
        }

        // Decompose on the top variable.
        let mut top = self.variable(f.index());
        let j = self.variable(g.index());
        let k = self.variable(h.index());
        if j != 0 {
            top = top.min(j);
        }
        if k != 0 {
            top = top.min(k);
        }
        debug_assert_ne!(top, 0);

        let (f0, f1) = self.top_cofactors(f, top);
        let (g0, g1) = self.top_cofactors(g, top);
        let (h0, h1) = self.top_cofactors(h, top);

        let low = self.apply_ite(f0, g0, h0);
        let high = self.apply_ite(f1, g1, h1);
        let result = self.mk_node(top, low, high);

        self.ite_cache.insert((f, g, h), result);
        if negate_result {
            -result
        } else {
            result
        }
    }

    pub fn apply_and(&mut self, u: Ref, v: Ref) -> Ref {
        self.apply_ite(u, v, self.zero)
    }

    pub fn apply_or(&mut self, u: Ref, v: Ref) -> Ref {
        self.apply_ite(u, self.one, v)
    }

    pub fn apply_xor(&mut self, u: Ref, v: Ref) -> Ref {
        self.apply_ite(u, -v, v)
    }

    /// Evaluates the function under a valuation of variables.
    pub fn evaluate(&self, f: Ref, assignment: &dyn Fn(u32) -> bool) -> bool {
        let mut node = f;
        loop {
            if self.is_terminal(node) {
                return !node.is_negated();
            }
            let variable = self.variable(node.index());
            let (f0, f1) = self.top_cofactors(node, variable);
            node = if assignment(variable) { f1 } else { f0 };
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::preprocessor::Preprocessor;

    use test_log::test;

    #[test]
    fn test_apply_ite_terminal_cases() {
        let mut bdd = Bdd::default();
        let g = bdd.mk_var(2);
        let h = bdd.mk_var(3);
        let (one, zero) = (bdd.one(), bdd.zero());
        assert_eq!(bdd.apply_ite(one, g, h), g);
        assert_eq!(bdd.apply_ite(zero, g, h), h);

        let f = bdd.mk_var(5);
        assert_eq!(bdd.apply_ite(f, g, g), g);
        assert_eq!(bdd.apply_ite(f, one, zero), f);
        assert_eq!(bdd.apply_ite(f, zero, one), -f);
    }

    #[test]
    fn test_apply_commutes_through_complements() {
        let mut bdd = Bdd::default();
        let x = bdd.mk_var(1);
        let y = bdd.mk_var(2);
        // De Morgan: ~(x ∧ y) == ~x ∨ ~y
        let lhs = -bdd.apply_and(x, y);
        let rhs = {
            let nx = -x;
            let ny = -y;
            bdd.apply_or(nx, ny)
        };
        assert_eq!(lhs, rhs);
    }

    #[test]
    fn test_xor_truth_table() {
        let mut bdd = Bdd::default();
        let x = bdd.mk_var(1);
        let y = bdd.mk_var(2);
        let f = bdd.apply_xor(x, y);
        for (a, b) in [(false, false), (false, true), (true, false), (true, true)] {
            let expected = a ^ b;
            let value = bdd.evaluate(f, &|v| if v == 1 { a } else { b });
            assert_eq!(value, expected, "xor({}, {})", a, b);
        }
    }

    #[test]
    fn test_from_graph_matches_graph_semantics() {
        let mut tree = FaultTree::new();
        let v1 = tree.add_variable();
        let v2 = tree.add_variable();
        let v3 = tree.add_variable();
        let and = tree.add_gate(GateType::And);
        let root = tree.add_gate(GateType::Or);
        tree.add_arg(and, v1 as i32).unwrap();
        tree.add_arg(and, v2 as i32).unwrap();
        tree.add_arg(root, and as i32).unwrap();
        tree.add_arg(root, v3 as i32).unwrap();
        tree.set_root(root);
        Preprocessor::new(&mut tree).process();

        let bdd = Bdd::from_graph(&tree);
        for bits in 0..8u32 {
            let assignment = |v: u32| bits & (1 << (v - 1)) != 0;
            assert_eq!(
                bdd.evaluate(bdd.root(), &assignment),
                tree.evaluate(&assignment),
                "mismatch at {:03b}",
                bits
            );
        }
    }
}
