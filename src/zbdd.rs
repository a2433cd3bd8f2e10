//! Zero-Suppressed BDD engine for minimal cut set generation.
//!
//! A ZBDD node family is built either directly from a preprocessed
//! Boolean graph or by converting a reduced ordered BDD. The engine
//! then minimizes the family to an antichain (no product contains
//! another) and enumerates it into cut sets of basic-event indices.
//!
//! # Terminal semantics
//!
//! - Empty (∅): no products at all; the top event never happens.
//! - Base ({∅}): the single empty product; the top event always holds.
//!
//! # Literals and modules
//!
//! A positive basic-event literal `+k` maps to node index `2k`, a
//! complemented literal `−k` to `2k + 1`, and an independent module
//! gate `g` to a proxy with index `2g`. Node order equals the index;
//! graph indices already form a topological variable order. Module
//! graphs are converted lazily, minimized separately, and expanded
//! during enumeration.
//!
//! # Order budget
//!
//! Every node tracks the fewest literals on any path to Base. A high
//! branch whose cheapest product would exceed the configured
//! `limit_order` is truncated to Empty right in `mk_node`, so the
//! cut-off applies uniformly to both construction paths. The
//! truncation is silent; the absence of larger cut sets is a
//! deliberate output.

use hashbrown::{HashMap, HashSet};
use log::debug;
use num_bigint::BigUint;
use num_traits::{One, Zero};

use crate::bdd::Bdd;
use crate::cache::Cache;
use crate::graph::{FaultTree, GateState, GateType};
use crate::reference::Ref;
use crate::settings::Settings;
use crate::storage::Storage;
use crate::utils::{pairing3, MyHash};

/// A cut set: signed basic-event indices, sorted by magnitude, free of
/// duplicates. Negative entries are complemented events.
pub type CutSet = Vec<i32>;

/// A non-terminal ZBDD vertex. Edges are plain (never complemented);
/// zero-suppression guarantees `high` is never Empty in a stored node.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub struct SetNode {
    pub index: u32,
    pub order: u32,
    pub high: Ref,
    pub low: Ref,
}

impl Default for SetNode {
    fn default() -> Self {
        Self {
            index: 0,
            order: 0,
            high: Ref::INVALID,
            low: Ref::INVALID,
        }
    }
}

impl MyHash for SetNode {
    fn hash(&self) -> u64 {
        pairing3(
            self.index as u64,
            self.high.unsigned() as u64,
            self.low.unsigned() as u64,
        )
    }
}

/// Canonical signature of an apply operation. Commutative operands are
/// ordered by id, so `apply(op, a, b)` and `apply(op, b, a)` share one
/// entry.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
struct OpKey(u8, Ref, Ref);

impl OpKey {
    fn new(op: GateType, a: Ref, b: Ref) -> Self {
        let tag = match op {
            GateType::And => 0,
            GateType::Or => 1,
            other => unreachable!("a {:?} apply operation", other),
        };
        if a.unsigned() <= b.unsigned() {
            Self(tag, a, b)
        } else {
            Self(tag, b, a)
        }
    }
}

impl MyHash for OpKey {
    fn hash(&self) -> u64 {
        pairing3(self.0 as u64, self.1.unsigned() as u64, self.2.unsigned() as u64)
    }
}

const fn literal_index(signed: i32) -> u32 {
    2 * signed.unsigned_abs() + (signed < 0) as u32
}

const fn decode_literal(index: u32) -> i32 {
    let magnitude = (index / 2) as i32;
    if index % 2 == 1 {
        -magnitude
    } else {
        magnitude
    }
}

/// The ZBDD manager: node storage with the unique table, the compute
/// and subsume tables, module registry, and the generated cut sets.
pub struct Zbdd {
    storage: Storage<SetNode>,
    compute_table: Cache<OpKey, Ref>,
    subsume_table: HashMap<(Ref, Ref), Ref>,
    /// Minimization results per vertex, so the work is done at most
    /// once per subgraph.
    minimal_results: HashMap<Ref, Ref>,
    /// Fewest literals on any path from the node to Base.
    min_order: Vec<u32>,
    /// Converted module graphs keyed by their proxy index.
    modules: HashMap<u32, Ref>,
    /// Module proxy indices, dependencies before dependents.
    module_order: Vec<u32>,
    module_products: HashMap<u32, Vec<CutSet>>,
    products: HashMap<Ref, Vec<CutSet>>,
    settings: Settings,
    limit_order: u32,
    empty: Ref,
    base: Ref,
    root: Ref,
    cut_sets: Vec<CutSet>,
}

impl Zbdd {
    fn new(settings: &Settings) -> Self {
        let mut storage = Storage::with_sentry(16);
        let empty = Ref::positive(storage.alloc(SetNode::default()) as u32);
        let base = Ref::positive(storage.alloc(SetNode::default()) as u32);
        Self {
            storage,
            compute_table: Cache::new(16),
            subsume_table: HashMap::new(),
            minimal_results: HashMap::new(),
            min_order: vec![0, u32::MAX, 0],
            modules: HashMap::new(),
            module_order: Vec::new(),
            module_products: HashMap::new(),
            products: HashMap::new(),
            settings: *settings,
            limit_order: settings.limit_order(),
            empty,
            base,
            root: empty,
            cut_sets: Vec::new(),
        }
    }

    /// Builds the ZBDD of a preprocessed Boolean graph directly.
    /// Module gates become proxy variables; their own graphs are
    /// converted on first use.
    pub fn from_graph(graph: &FaultTree, settings: &Settings) -> Self {
        let mut zbdd = Zbdd::new(settings);
        let mut gates = HashMap::new();
        zbdd.root = zbdd.convert_gate(graph, graph.root(), &mut gates);
        debug!(
            "Constructed a ZBDD of {} nodes from the Boolean graph",
            zbdd.storage.size()
        );
        zbdd
    }

    /// Converts a reduced ordered BDD with attributed edges. The
    /// remaining order budget shrinks along high edges, so no product
    /// beyond `limit_order` is ever constructed.
    pub fn from_bdd(bdd: &Bdd, settings: &Settings) -> Self {
        let mut zbdd = Zbdd::new(settings);
        let limit_order = zbdd.limit_order;
        let mut ites = HashMap::new();
        zbdd.root = zbdd.convert_bdd(bdd, bdd.root(), false, limit_order, &mut ites);
        debug!(
            "Converted the BDD into a ZBDD of {} nodes",
            zbdd.storage.size()
        );
        zbdd
    }

    pub fn root(&self) -> Ref {
        self.root
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    /// Cut sets produced by [`analyze`][Zbdd::analyze].
    pub fn cut_sets(&self) -> &[CutSet] {
        &self.cut_sets
    }

    /// Minimizes the family and enumerates the cut sets: modules first
    /// in dependency order, then the top graph with module proxies
    /// substituted by their product sets.
    pub fn analyze(&mut self) {
        debug!("Minimizing the ZBDD...");
        let root = self.root;
        self.root = self.minimize(root);

        let module_order = self.module_order.clone();
        for index in module_order {
            let vertex = self.modules[&index];
            let minimal = self.minimize(vertex);
            self.modules.insert(index, minimal);
            let products = self.generate_cut_sets(minimal);
            debug!("Module {} yields {} products", index, products.len());
            self.module_products.insert(index, products);
        }

        let root = self.root;
        self.cut_sets = self.generate_cut_sets(root);
        debug!("Generated {} cut sets", self.cut_sets.len());
    }
}

// Terminals and node construction.
impl Zbdd {
    pub fn is_terminal(&self, vertex: Ref) -> bool {
        vertex == self.empty || vertex == self.base
    }

    fn node(&self, vertex: Ref) -> SetNode {
        *self.storage.value(vertex.index() as usize)
    }

    fn min_order_of(&self, vertex: Ref) -> u32 {
        self.min_order[vertex.index() as usize]
    }

    fn intern(&mut self, node: SetNode) -> Ref {
        let before = self.storage.size();
        let index = self.storage.put(node);
        if index == before {
            // A genuinely new node; record its cheapest product size.
            let through_high = self.min_order_of(node.high).saturating_add(1);
            let through_low = self.min_order_of(node.low);
            self.min_order.push(through_high.min(through_low));
        }
        Ref::positive(index as u32)
    }

    /// Makes a reduced, interned node. The high branch is truncated to
    /// Empty when even its cheapest product would exceed the order
    /// budget; zero-suppression then returns the low branch.
    fn mk_node(&mut self, index: u32, order: u32, high: Ref, low: Ref) -> Ref {
        debug_assert!(!high.is_negated() && !low.is_negated());
        debug_assert!(self.is_terminal(high) || self.node(high).order > order);
        debug_assert!(self.is_terminal(low) || self.node(low).order > order);
        let high = if self.min_order_of(high).saturating_add(1) > self.limit_order {
            self.empty
        } else {
            high
        };
        if high == self.empty {
            return low; // Zero-suppression.
        }
        self.intern(SetNode {
            index,
            order,
            high,
            low,
        })
    }

    /// The singleton family of one literal: {{lit}}.
    fn literal(&mut self, signed: i32) -> Ref {
        debug_assert_ne!(signed, 0);
        let index = literal_index(signed);
        self.mk_node(index, index, self.base, self.empty)
    }
}

// Conversion from the Boolean graph and from the BDD.
impl Zbdd {
    fn convert_gate(
        &mut self,
        graph: &FaultTree,
        index: u32,
        gates: &mut HashMap<u32, Ref>,
    ) -> Ref {
        if let Some(&result) = gates.get(&index) {
            return result;
        }
        let result = match graph.gate(index).state() {
            GateState::Null => self.empty,
            GateState::Unity => self.base,
            GateState::Normal => {
                let gate_type = graph.gate(index).gate_type();
                let args: Vec<i32> = graph.gate(index).args().iter().copied().collect();
                match gate_type {
                    GateType::Null => {
                        // A pass-through root over a single leaf.
                        match args.first() {
                            Some(&arg) => self.convert_arg(graph, arg, gates),
                            None => self.empty,
                        }
                    }
                    GateType::And | GateType::Or => {
                        let mut acc: Option<Ref> = None;
                        for signed in args {
                            let f = self.convert_arg(graph, signed, gates);
                            acc = Some(match acc {
                                None => f,
                                Some(acc) => self.apply(gate_type, acc, f),
                            });
                        }
                        acc.expect("gates have arguments")
                    }
                    other => unreachable!("a {:?} gate in a preprocessed graph", other),
                }
            }
        };
        gates.insert(index, result);
        result
    }

    fn convert_arg(
        &mut self,
        graph: &FaultTree,
        signed: i32,
        gates: &mut HashMap<u32, Ref>,
    ) -> Ref {
        let index = signed.unsigned_abs();
        if graph.is_variable(index) {
            return self.literal(signed);
        }
        debug_assert!(
            signed > 0,
            "complemented gate arguments must not survive preprocessing"
        );
        if graph.gate(index).is_module() {
            return self.module_proxy(graph, index, gates);
        }
        self.convert_gate(graph, index, gates)
    }

    /// A module gate becomes an atomic proxy variable; the module's own
    /// family is built once and registered for later expansion.
    fn module_proxy(
        &mut self,
        graph: &FaultTree,
        gate: u32,
        gates: &mut HashMap<u32, Ref>,
    ) -> Ref {
        let index = 2 * gate;
        if !self.modules.contains_key(&index) {
            let converted = self.convert_gate(graph, gate, gates);
            // Nested modules registered themselves during the
            // conversion above, so the order stays dependencies-first.
            self.modules.insert(index, converted);
            self.module_order.push(index);
        }
        self.mk_node(index, index, self.base, self.empty)
    }

    fn convert_bdd(
        &mut self,
        bdd: &Bdd,
        vertex: Ref,
        complement: bool,
        limit_order: u32,
        ites: &mut HashMap<(u32, bool, u32), Ref>,
    ) -> Ref {
        let complement = complement ^ vertex.is_negated();
        if bdd.is_terminal(vertex) {
            return if complement { self.empty } else { self.base };
        }
        let key = (vertex.index(), complement, limit_order);
        if let Some(&result) = ites.get(&key) {
            return result;
        }
        let high = if limit_order == 0 {
            self.empty
        } else {
            // The stored BDD high edge is never negated.
            self.convert_bdd(bdd, bdd.high(vertex.index()), complement, limit_order - 1, ites)
        };
        let low = self.convert_bdd(bdd, bdd.low(vertex.index()), complement, limit_order, ites);
        let index = 2 * bdd.variable(vertex.index());
        let result = self.mk_node(index, index, high, low);
        ites.insert(key, result);
        result
    }
}

// The apply operation.
impl Zbdd {
    /// Applies a Boolean set operation: OR is family union, AND is the
    /// element-wise union of products (the failure combinations of a
    /// conjunction). Results are reduced, interned, and memoized under
    /// a canonical commutative signature.
    fn apply(&mut self, op: GateType, a: Ref, b: Ref) -> Ref {
        if a == b {
            return a;
        }
        match op {
            GateType::Or => {
                if a == self.empty {
                    return b;
                }
                if b == self.empty {
                    return a;
                }
                if a == self.base {
                    return self.unite_base(b);
                }
                if b == self.base {
                    return self.unite_base(a);
                }
            }
            GateType::And => {
                if a == self.empty || b == self.empty {
                    return self.empty;
                }
                if a == self.base {
                    return b;
                }
                if b == self.base {
                    return a;
                }
            }
            other => unreachable!("a {:?} apply operation", other),
        }

        let key = OpKey::new(op, a, b);
        if let Some(&result) = self.compute_table.get(&key) {
            return result;
        }

        let (na, nb) = (self.node(a), self.node(b));
        let result = if na.order == nb.order {
            debug_assert_eq!(na.index, nb.index);
            match op {
                GateType::Or => {
                    let high = self.apply(GateType::Or, na.high, nb.high);
                    let low = self.apply(GateType::Or, na.low, nb.low);
                    self.mk_node(na.index, na.order, high, low)
                }
                _ => {
                    // Products with the label come from any pairing that
                    // touches a high branch; the subsumed cross terms
                    // fall to minimization later.
                    let hh = self.apply(GateType::And, na.high, nb.high);
                    let hl = self.apply(GateType::And, na.high, nb.low);
                    let lh = self.apply(GateType::And, na.low, nb.high);
                    let cross = self.apply(GateType::Or, hh, hl);
                    let high = self.apply(GateType::Or, cross, lh);
                    let low = self.apply(GateType::And, na.low, nb.low);
                    self.mk_node(na.index, na.order, high, low)
                }
            }
        } else {
            // Decompose on the smaller-order argument.
            let (nx, y) = if na.order < nb.order { (na, b) } else { (nb, a) };
            match op {
                GateType::Or => {
                    let low = self.apply(GateType::Or, nx.low, y);
                    self.mk_node(nx.index, nx.order, nx.high, low)
                }
                _ => {
                    let high = self.apply(GateType::And, nx.high, y);
                    let low = self.apply(GateType::And, nx.low, y);
                    self.mk_node(nx.index, nx.order, high, low)
                }
            }
        };

        self.compute_table.insert(key, result);
        result
    }

    /// Union with Base: the family plus the empty product.
    fn unite_base(&mut self, vertex: Ref) -> Ref {
        if self.is_terminal(vertex) {
            return self.base;
        }
        let node = self.node(vertex);
        let low = self.unite_base(node.low);
        self.mk_node(node.index, node.order, node.high, low)
    }
}

// Minimization.
impl Zbdd {
    /// Reduces the family to its minimal antichain: no product remains
    /// that contains another product as a subset.
    fn minimize(&mut self, vertex: Ref) -> Ref {
        if self.is_terminal(vertex) {
            return vertex;
        }
        if let Some(&result) = self.minimal_results.get(&vertex) {
            return result;
        }
        let node = self.node(vertex);
        let high = self.minimize(node.high);
        let low = self.minimize(node.low);
        let high = self.subsume(high, low);
        let result = self.mk_node(node.index, node.order, high, low);
        self.minimal_results.insert(vertex, result);
        result
    }

    /// Removes from `high` every product that contains some product of
    /// `low` as a subset.
    fn subsume(&mut self, high: Ref, low: Ref) -> Ref {
        if low == self.base {
            return self.empty; // Every product contains the empty one.
        }
        if high == self.empty {
            return self.empty;
        }
        if low == self.empty {
            return high;
        }
        if high == self.base {
            return self.base; // ∅ is a superset of ∅ only; handled above.
        }
        if high == low {
            return self.empty;
        }

        let key = (high, low);
        if let Some(&result) = self.subsume_table.get(&key) {
            return result;
        }

        let (nh, nl) = (self.node(high), self.node(low));
        let result = if nl.order < nh.order {
            // No product in high carries the low label; only the
            // label-free part of low can subsume anything.
            self.subsume(high, nl.low)
        } else if nh.order < nl.order {
            let new_high = self.subsume(nh.high, low);
            let new_low = self.subsume(nh.low, low);
            self.mk_node(nh.index, nh.order, new_high, new_low)
        } else {
            debug_assert_eq!(nh.index, nl.index);
            let new_high = self.subsume(nh.high, nl.high);
            let new_high = self.subsume(new_high, nl.low);
            let new_low = self.subsume(nh.low, nl.low);
            self.mk_node(nh.index, nh.order, new_high, new_low)
        };

        self.subsume_table.insert(key, result);
        result
    }
}

// Enumeration and statistics.
impl Zbdd {
    /// Enumerates the products of the (minimized) family. Module
    /// proxies expand by Cartesian product with the module's own
    /// products; anything beyond the order limit is dropped at the
    /// point where its last literal is attached.
    fn generate_cut_sets(&mut self, vertex: Ref) -> Vec<CutSet> {
        if vertex == self.empty {
            return Vec::new();
        }
        if vertex == self.base {
            return vec![Vec::new()];
        }
        if let Some(products) = self.products.get(&vertex) {
            return products.clone();
        }
        let node = self.node(vertex);
        let mut result = self.generate_cut_sets(node.low);
        let tail = self.generate_cut_sets(node.high);
        let limit = self.limit_order as usize;
        if let Some(expansions) = self.module_products.get(&node.index) {
            for product in &tail {
                for expansion in expansions {
                    let mut combined = Vec::with_capacity(expansion.len() + product.len());
                    combined.extend_from_slice(expansion);
                    combined.extend_from_slice(product);
                    combined.sort_unstable_by_key(|&lit| (lit.unsigned_abs(), lit < 0));
                    if combined.len() <= limit {
                        result.push(combined);
                    }
                }
            }
        } else {
            let literal = decode_literal(node.index);
            for product in &tail {
                let mut combined = Vec::with_capacity(product.len() + 1);
                combined.push(literal);
                combined.extend_from_slice(product);
                combined.sort_unstable_by_key(|&lit| (lit.unsigned_abs(), lit < 0));
                if combined.len() <= limit {
                    result.push(combined);
                }
            }
        }
        self.products.insert(vertex, result.clone());
        result
    }

    /// Counts the distinct set nodes reachable from the vertex, module
    /// contents included. A pure statistic for progress reporting.
    pub fn count_set_nodes(&self, vertex: Ref) -> usize {
        let mut visited: HashSet<Ref> = HashSet::new();
        let mut expanded_modules: HashSet<u32> = HashSet::new();
        let mut stack = vec![vertex];
        let mut count = 0;
        while let Some(v) = stack.pop() {
            if self.is_terminal(v) || !visited.insert(v) {
                continue;
            }
            count += 1;
            let node = self.node(v);
            if let Some(&module) = self.modules.get(&node.index) {
                if expanded_modules.insert(node.index) {
                    stack.push(module);
                }
            }
            stack.push(node.high);
            stack.push(node.low);
        }
        count
    }

    /// Counts the products of the family with module proxies expanded.
    /// The count can be astronomically large, hence the big integer.
    pub fn count_cut_sets(&self, vertex: Ref) -> BigUint {
        let mut cache = HashMap::new();
        self.count_products(vertex, &mut cache)
    }

    fn count_products(&self, vertex: Ref, cache: &mut HashMap<Ref, BigUint>) -> BigUint {
        if vertex == self.empty {
            return BigUint::zero();
        }
        if vertex == self.base {
            return BigUint::one();
        }
        if let Some(count) = cache.get(&vertex) {
            return count.clone();
        }
        let node = self.node(vertex);
        let multiplier = match self.modules.get(&node.index) {
            Some(&module) => self.count_products(module, cache),
            None => BigUint::one(),
        };
        let result = multiplier * self.count_products(node.high, cache)
            + self.count_products(node.low, cache);
        cache.insert(vertex, result.clone());
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use test_log::test;

    fn zbdd() -> Zbdd {
        Zbdd::new(&Settings::default())
    }

    #[test]
    fn test_literal_encoding_roundtrip() {
        assert_eq!(literal_index(3), 6);
        assert_eq!(literal_index(-3), 7);
        assert_eq!(decode_literal(6), 3);
        assert_eq!(decode_literal(7), -3);
    }

    #[test]
    fn test_mk_node_zero_suppression() {
        let mut z = zbdd();
        let (base, empty) = (z.base, z.empty);
        let low = z.mk_node(2, 2, base, empty);
        let reduced = z.mk_node(4, 4, empty, low);
        assert_eq!(reduced, low);
    }

    #[test]
    fn test_unique_table_shares_nodes() {
        let mut z = zbdd();
        let a = z.literal(1);
        let b = z.literal(1);
        assert_eq!(a, b);
    }

    #[test]
    fn test_apply_or_and_products() {
        let mut z = zbdd();
        let x = z.literal(1);
        let y = z.literal(2);
        let union = z.apply(GateType::Or, x, y);
        assert_eq!(z.count_cut_sets(union), 2u32.into());
        let product = z.apply(GateType::And, x, y);
        assert_eq!(z.count_cut_sets(product), 1u32.into());
        assert_eq!(z.generate_cut_sets(product), vec![vec![1, 2]]);
    }

    #[test]
    fn test_apply_is_commutative_in_the_cache() {
        let mut z = zbdd();
        let x = z.literal(1);
        let y = z.literal(2);
        assert_eq!(z.apply(GateType::Or, x, y), z.apply(GateType::Or, y, x));
        assert_eq!(z.apply(GateType::And, x, y), z.apply(GateType::And, y, x));
    }

    #[test]
    fn test_or_with_base_keeps_zero_suppression() {
        let mut z = zbdd();
        let x = z.literal(1);
        let base = z.base;
        let family = z.apply(GateType::Or, x, base);
        // {∅, {1}}: the empty product coexists with the literal.
        let mut products = z.generate_cut_sets(family);
        products.sort();
        assert_eq!(products, vec![vec![], vec![1]]);
    }

    #[test]
    fn test_minimize_removes_supersets() {
        let mut z = zbdd();
        let x = z.literal(1);
        let y = z.literal(2);
        let xy = z.apply(GateType::And, x, y);
        let family = z.apply(GateType::Or, x, xy);
        let minimal = z.minimize(family);
        assert_eq!(z.generate_cut_sets(minimal), vec![vec![1]]);
    }

    #[test]
    fn test_subsume_keeps_incomparable_products() {
        let mut z = zbdd();
        let x = z.literal(1);
        let y = z.literal(2);
        let w = z.literal(3);
        let xy = z.apply(GateType::And, x, y);
        let yw = z.apply(GateType::And, y, w);
        let family = z.apply(GateType::Or, xy, yw);
        let minimal = z.minimize(family);
        let mut products = z.generate_cut_sets(minimal);
        products.sort();
        assert_eq!(products, vec![vec![1, 2], vec![2, 3]]);
    }

    #[test]
    fn test_order_budget_truncates_large_products() {
        let mut z = Zbdd::new(&Settings::default().with_limit_order(1));
        let x = z.literal(1);
        let y = z.literal(2);
        let product = z.apply(GateType::And, x, y);
        assert_eq!(product, z.empty);
    }

    #[test]
    fn test_count_matches_enumeration() {
        let mut z = zbdd();
        let x = z.literal(1);
        let y = z.literal(2);
        let w = z.literal(3);
        let xy = z.apply(GateType::And, x, y);
        let family = z.apply(GateType::Or, xy, w);
        let generated = z.generate_cut_sets(family);
        assert_eq!(
            z.count_cut_sets(family),
            BigUint::from(generated.len()),
        );
        assert!(z.count_set_nodes(family) > 0);
    }
}
