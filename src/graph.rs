use std::collections::BTreeSet;

use log::debug;

use crate::error::GraphError;

/// Logic connective of a gate.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash, PartialOrd, Ord)]
pub enum GateType {
    And,
    Or,
    Nand,
    Nor,
    Not,
    /// Single-argument pass-through. Transient: the preprocessor removes
    /// these, except for a root that wraps a lone variable or a constant
    /// state.
    Null,
    Xor,
    /// K-out-of-N voting gate; carries a `vote_number`.
    AtLeast,
}

/// Constant state of a gate. `Null` is constant false, `Unity` is
/// constant true. A non-`Normal` gate has no arguments.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum GateState {
    Normal,
    Null,
    Unity,
}

#[derive(Debug, Clone)]
pub(crate) enum NodeKind {
    Variable,
    Constant { value: bool },
    Gate(Gate),
}

/// A node of the indexed Boolean graph.
///
/// Carries the non-owning parent back-links and the per-traversal
/// scratch (visit timestamps, optimization value). Scratch must be
/// cleared by the pass that relies on it; the clear routines live on
/// the [`Preprocessor`][crate::preprocessor::Preprocessor].
#[derive(Debug, Clone)]
pub(crate) struct Node {
    pub(crate) parents: BTreeSet<u32>,
    pub(crate) enter_time: i32,
    pub(crate) exit_time: i32,
    pub(crate) last_visit: i32,
    pub(crate) opti_value: i32,
    pub(crate) kind: NodeKind,
}

impl Node {
    fn new(kind: NodeKind) -> Self {
        Self {
            parents: BTreeSet::new(),
            enter_time: 0,
            exit_time: 0,
            last_visit: 0,
            opti_value: 0,
            kind,
        }
    }

    /// First visit registers the entry time, second the exit time, any
    /// later visit only bumps the last-visit time. Returns true iff the
    /// node had already been entered and exited.
    pub(crate) fn visit(&mut self, time: i32) -> bool {
        if self.enter_time == 0 {
            self.enter_time = time;
            false
        } else if self.exit_time == 0 {
            self.exit_time = time;
            false
        } else {
            self.last_visit = time;
            true
        }
    }

    pub(crate) fn revisited(&self) -> bool {
        self.last_visit != 0
    }

    /// The most recent visit time.
    pub(crate) fn last_time(&self) -> i32 {
        if self.last_visit != 0 {
            self.last_visit
        } else if self.exit_time != 0 {
            self.exit_time
        } else {
            self.enter_time
        }
    }

    pub(crate) fn clear_visits(&mut self) {
        self.enter_time = 0;
        self.exit_time = 0;
        self.last_visit = 0;
    }

    /// Lower bound of the visit-time range of the subtree below this
    /// node. Gates store the computed value; leaves are their own range.
    pub(crate) fn min_time(&self) -> i32 {
        match &self.kind {
            NodeKind::Gate(gate) => gate.min_time,
            _ => self.enter_time,
        }
    }

    pub(crate) fn max_time(&self) -> i32 {
        match &self.kind {
            NodeKind::Gate(gate) => gate.max_time,
            _ => self.last_time(),
        }
    }
}

/// An internal node of the Boolean graph.
///
/// Arguments are signed indices: a positive index asserts the child, a
/// negative one complements it. The union set `args` is mirrored by one
/// set per argument kind so passes can iterate gates, variables, and
/// constants separately.
#[derive(Debug, Clone)]
pub struct Gate {
    pub(crate) gate_type: GateType,
    pub(crate) state: GateState,
    pub(crate) vote_number: u32,
    pub(crate) module: bool,
    pub(crate) mark: bool,
    pub(crate) min_time: i32,
    pub(crate) max_time: i32,
    pub(crate) failed_args: usize,
    pub(crate) args: BTreeSet<i32>,
    pub(crate) gate_args: BTreeSet<i32>,
    pub(crate) variable_args: BTreeSet<i32>,
    pub(crate) constant_args: BTreeSet<i32>,
}

impl Gate {
    fn new(gate_type: GateType, vote_number: u32) -> Self {
        Self {
            gate_type,
            state: GateState::Normal,
            vote_number,
            module: false,
            mark: false,
            min_time: 0,
            max_time: 0,
            failed_args: 0,
            args: BTreeSet::new(),
            gate_args: BTreeSet::new(),
            variable_args: BTreeSet::new(),
            constant_args: BTreeSet::new(),
        }
    }

    pub fn gate_type(&self) -> GateType {
        self.gate_type
    }
    pub fn state(&self) -> GateState {
        self.state
    }
    pub fn vote_number(&self) -> u32 {
        self.vote_number
    }
    pub fn is_module(&self) -> bool {
        self.module
    }
    /// All signed argument indices.
    pub fn args(&self) -> &BTreeSet<i32> {
        &self.args
    }
    pub fn gate_args(&self) -> &BTreeSet<i32> {
        &self.gate_args
    }
    pub fn variable_args(&self) -> &BTreeSet<i32> {
        &self.variable_args
    }
    pub fn constant_args(&self) -> &BTreeSet<i32> {
        &self.constant_args
    }
    pub fn num_args(&self) -> usize {
        self.args.len()
    }

    /// Notification that one of the arguments hypothetically failed.
    /// Sets the optimization value through the gate logic.
    fn arg_failed(&mut self, opti_value: &mut i32) {
        if *opti_value == 1 {
            return;
        }
        debug_assert_eq!(*opti_value, 0);
        debug_assert!(self.failed_args < self.args.len());
        self.failed_args += 1;
        match self.gate_type {
            GateType::Null | GateType::Or => *opti_value = 1,
            GateType::And => {
                if self.failed_args == self.args.len() {
                    *opti_value = 1;
                }
            }
            GateType::AtLeast => {
                if self.failed_args == self.vote_number as usize {
                    *opti_value = 1;
                }
            }
            _ => unreachable!("failure propagation through a {:?} gate", self.gate_type),
        }
    }
}

/// The indexed Boolean graph of a fault tree.
///
/// Owns every node in an arena; nodes reference each other by index.
/// Children are reached through signed argument indices, parents
/// through the back-link sets, so no ownership cycle exists. Detached
/// nodes simply become unreachable from the root.
///
/// Indices are positive, stable, and shared by variables, gates, and
/// constants; zero is reserved.
pub struct FaultTree {
    nodes: Vec<Node>,
    root: u32,
    coherent: bool,
    normal: bool,
    constants: bool,
}

impl Default for FaultTree {
    fn default() -> Self {
        Self::new()
    }
}

impl FaultTree {
    pub fn new() -> Self {
        Self {
            // Slot 0 is a sentry; indices start at 1.
            nodes: vec![Node::new(NodeKind::Constant { value: false })],
            root: 0,
            coherent: true,
            normal: true,
            constants: false,
        }
    }

    fn push(&mut self, kind: NodeKind) -> u32 {
        let index = self.nodes.len() as u32;
        self.nodes.push(Node::new(kind));
        index
    }

    /// Registers a new basic-event variable and returns its index.
    pub fn add_variable(&mut self) -> u32 {
        self.push(NodeKind::Variable)
    }

    /// Registers a constant house event.
    pub fn add_constant(&mut self, value: bool) -> u32 {
        self.constants = true;
        self.push(NodeKind::Constant { value })
    }

    /// Registers a new gate of any type but ATLEAST.
    pub fn add_gate(&mut self, gate_type: GateType) -> u32 {
        assert!(
            gate_type != GateType::AtLeast,
            "ATLEAST gates require a vote number; use add_atleast_gate"
        );
        match gate_type {
            GateType::And | GateType::Or | GateType::Null => {}
            GateType::Not | GateType::Nand | GateType::Nor | GateType::Xor => {
                self.normal = false;
                self.coherent = false;
            }
            GateType::AtLeast => unreachable!(),
        }
        self.push(NodeKind::Gate(Gate::new(gate_type, 0)))
    }

    /// Registers a new ATLEAST (K-out-of-N) gate.
    pub fn add_atleast_gate(&mut self, vote_number: u32) -> Result<u32, GraphError> {
        let index = self.nodes.len() as u32;
        if vote_number < 2 {
            return Err(GraphError::InvalidVoteNumber { index, vote_number });
        }
        self.normal = false;
        Ok(self.push(NodeKind::Gate(Gate::new(GateType::AtLeast, vote_number))))
    }

    /// Adds a signed argument to a gate. Positive asserts the child,
    /// negative complements it; zero is invalid.
    pub fn add_arg(&mut self, parent: u32, arg: i32) -> Result<(), GraphError> {
        if arg == 0 {
            return Err(GraphError::ZeroIndex);
        }
        let child = arg.unsigned_abs();
        if child as usize >= self.nodes.len() || child == parent {
            return Err(GraphError::UnknownNode(child));
        }
        assert!(self.is_gate(parent), "Parent {} is not a gate", parent);
        let gate = self.gate(parent);
        if gate.args.contains(&arg) {
            return Err(GraphError::DuplicateArgument(arg));
        }
        if gate.args.contains(&-arg) {
            return Err(GraphError::ComplementArgument(arg));
        }
        if arg < 0 {
            self.coherent = false;
        }
        self.insert_arg(parent, arg);
        Ok(())
    }

    pub fn set_root(&mut self, gate: u32) {
        assert!(self.is_gate(gate), "The root must be a gate");
        self.root = gate;
    }

    pub fn root(&self) -> u32 {
        assert_ne!(self.root, 0, "The root gate is not set");
        self.root
    }

    pub fn coherent(&self) -> bool {
        self.coherent
    }
    pub fn normal(&self) -> bool {
        self.normal
    }
    pub fn constants(&self) -> bool {
        self.constants
    }

    pub fn set_coherent(&mut self, coherent: bool) {
        self.coherent = coherent;
    }
    pub fn set_normal(&mut self, normal: bool) {
        self.normal = normal;
    }
    pub(crate) fn set_constants(&mut self, constants: bool) {
        self.constants = constants;
    }

    /// Evaluates the root's Boolean function under the given valuation
    /// of basic events. Constants and gate states participate with
    /// their fixed values. Intended for validation and testing; the
    /// analysis proper goes through the decision diagrams.
    pub fn evaluate(&self, assignment: &dyn Fn(u32) -> bool) -> bool {
        self.eval_node(self.root() as i32, assignment)
    }

    fn eval_node(&self, signed: i32, assignment: &dyn Fn(u32) -> bool) -> bool {
        let index = signed.unsigned_abs();
        let value = if self.is_variable(index) {
            assignment(index)
        } else if self.is_constant(index) {
            self.constant_value(index)
        } else {
            let gate = self.gate(index);
            match gate.state() {
                GateState::Null => false,
                GateState::Unity => true,
                GateState::Normal => {
                    let mut values = gate.args().iter().map(|&a| self.eval_node(a, assignment));
                    match gate.gate_type() {
                        GateType::And => values.all(|v| v),
                        GateType::Or => values.any(|v| v),
                        GateType::Nand => !values.all(|v| v),
                        GateType::Nor => !values.any(|v| v),
                        GateType::Not | GateType::Null => {
                            let value = values.next().expect("a single argument");
                            debug_assert!(values.next().is_none());
                            (gate.gate_type() == GateType::Null) == value
                        }
                        GateType::Xor => values.fold(false, |acc, v| acc ^ v),
                        GateType::AtLeast => {
                            values.filter(|&v| v).count() >= gate.vote_number() as usize
                        }
                    }
                }
            }
        };
        if signed < 0 {
            !value
        } else {
            value
        }
    }

    /// Checks gate arities against their types and the root against its
    /// no-parent requirement, the way the external model layer would
    /// before handing the graph over for analysis.
    pub fn validate(&self) -> Result<(), GraphError> {
        if !self.node(self.root()).parents.is_empty() {
            return Err(GraphError::RootWithParents);
        }
        for index in 1..self.nodes.len() as u32 {
            let gate = match &self.nodes[index as usize].kind {
                NodeKind::Gate(gate) => gate,
                _ => continue,
            };
            let n = gate.args.len();
            let fail = |expected: &'static str| GraphError::WrongArity {
                index,
                gate_type: gate.gate_type,
                expected,
                actual: n,
            };
            match gate.gate_type {
                GateType::And | GateType::Or | GateType::Nand | GateType::Nor => {
                    if n < 2 {
                        return Err(fail("2 or more"));
                    }
                }
                GateType::Not | GateType::Null => {
                    if n != 1 {
                        return Err(fail("exactly 1"));
                    }
                }
                GateType::Xor => {
                    if n != 2 {
                        return Err(fail("exactly 2"));
                    }
                }
                GateType::AtLeast => {
                    if gate.vote_number < 2 {
                        return Err(GraphError::InvalidVoteNumber {
                            index,
                            vote_number: gate.vote_number,
                        });
                    }
                    if n <= gate.vote_number as usize {
                        return Err(fail("more than the vote number"));
                    }
                }
            }
        }
        Ok(())
    }
}

// Node access.
impl FaultTree {
    pub(crate) fn node(&self, index: u32) -> &Node {
        &self.nodes[index as usize]
    }
    pub(crate) fn node_mut(&mut self, index: u32) -> &mut Node {
        &mut self.nodes[index as usize]
    }

    pub fn gate(&self, index: u32) -> &Gate {
        match &self.nodes[index as usize].kind {
            NodeKind::Gate(gate) => gate,
            _ => panic!("Node {} is not a gate", index),
        }
    }
    pub(crate) fn gate_mut(&mut self, index: u32) -> &mut Gate {
        match &mut self.nodes[index as usize].kind {
            NodeKind::Gate(gate) => gate,
            _ => panic!("Node {} is not a gate", index),
        }
    }

    pub fn is_gate(&self, index: u32) -> bool {
        matches!(self.nodes[index as usize].kind, NodeKind::Gate(_))
    }
    pub fn is_variable(&self, index: u32) -> bool {
        matches!(self.nodes[index as usize].kind, NodeKind::Variable)
    }
    pub fn is_constant(&self, index: u32) -> bool {
        matches!(self.nodes[index as usize].kind, NodeKind::Constant { .. })
    }
    pub fn constant_value(&self, index: u32) -> bool {
        match self.nodes[index as usize].kind {
            NodeKind::Constant { value } => value,
            _ => panic!("Node {} is not a constant", index),
        }
    }

    /// A node with no parents that is not the root has been detached by
    /// the rewrites and is unreachable.
    pub(crate) fn is_detached(&self, index: u32) -> bool {
        index != self.root && self.node(index).parents.is_empty()
    }

    pub(crate) fn arg_failed(&mut self, gate: u32) {
        let node = &mut self.nodes[gate as usize];
        let mut opti_value = node.opti_value;
        match &mut node.kind {
            NodeKind::Gate(g) => g.arg_failed(&mut opti_value),
            _ => panic!("Node {} is not a gate", gate),
        }
        node.opti_value = opti_value;
    }
}

// Argument surgery used by the preprocessing passes. These operate
// under the pass contracts; broken contracts abort.
impl FaultTree {
    /// Creates a gate without touching the graph-wide flags. New gates
    /// introduced mid-preprocessing never reintroduce non-normal types.
    pub(crate) fn new_gate(&mut self, gate_type: GateType, vote_number: u32) -> u32 {
        self.push(NodeKind::Gate(Gate::new(gate_type, vote_number)))
    }

    fn kind_set(&mut self, gate: u32, child: u32) -> &mut BTreeSet<i32> {
        let kind = match self.node(child).kind {
            NodeKind::Gate(_) => 0,
            NodeKind::Variable => 1,
            NodeKind::Constant { .. } => 2,
        };
        let g = self.gate_mut(gate);
        match kind {
            0 => &mut g.gate_args,
            1 => &mut g.variable_args,
            _ => &mut g.constant_args,
        }
    }

    /// Adds a signed argument, resolving duplicates and complements
    /// algebraically: a duplicate is idempotent for AND/OR, a
    /// complement turns the gate into a constant.
    pub(crate) fn insert_arg(&mut self, gate: u32, arg: i32) {
        debug_assert_ne!(arg, 0);
        let child = arg.unsigned_abs();
        let g = self.gate(gate);
        if g.args.contains(&arg) {
            debug_assert!(
                matches!(g.gate_type, GateType::And | GateType::Or),
                "duplicate argument {} in a {:?} gate",
                arg,
                g.gate_type
            );
            return;
        }
        if g.args.contains(&-arg) {
            match g.gate_type {
                GateType::And => self.nullify(gate),
                GateType::Or => self.make_unity(gate),
                other => unreachable!("complement argument {} in a {:?} gate", arg, other),
            }
            return;
        }
        self.gate_mut(gate).args.insert(arg);
        self.kind_set(gate, child).insert(arg);
        self.node_mut(child).parents.insert(gate);
    }

    /// Drops a signed argument edge. A gate whose last parent goes away
    /// is detached for good; its own argument edges are erased in turn
    /// so that no back-link ever points at an unreachable gate.
    pub(crate) fn erase_arg(&mut self, gate: u32, arg: i32) {
        let child = arg.unsigned_abs();
        let removed = self.gate_mut(gate).args.remove(&arg);
        debug_assert!(removed, "Gate {} has no argument {}", gate, arg);
        self.kind_set(gate, child).remove(&arg);
        self.node_mut(child).parents.remove(&gate);
        if self.is_detached(child) && self.is_gate(child) {
            self.erase_all_args(child);
        }
    }

    pub(crate) fn erase_all_args(&mut self, gate: u32) {
        let args: Vec<i32> = self.gate(gate).args.iter().copied().collect();
        for arg in args {
            self.erase_arg(gate, arg);
        }
    }

    /// Flips the sign of every argument edge. Parent links are
    /// unaffected.
    pub(crate) fn invert_args(&mut self, gate: u32) {
        let g = self.gate_mut(gate);
        g.args = g.args.iter().map(|a| -a).collect();
        g.gate_args = g.gate_args.iter().map(|a| -a).collect();
        g.variable_args = g.variable_args.iter().map(|a| -a).collect();
        g.constant_args = g.constant_args.iter().map(|a| -a).collect();
    }

    pub(crate) fn invert_arg(&mut self, gate: u32, arg: i32) {
        let child = arg.unsigned_abs();
        let g = self.gate_mut(gate);
        debug_assert!(g.args.contains(&arg));
        debug_assert!(!g.args.contains(&-arg));
        g.args.remove(&arg);
        g.args.insert(-arg);
        let set = self.kind_set(gate, child);
        set.remove(&arg);
        set.insert(-arg);
    }

    /// Moves a signed argument to another gate. The recipient picks the
    /// edge up before the donor lets go, so a sole-parent child is never
    /// momentarily detached.
    pub(crate) fn transfer_arg(&mut self, gate: u32, arg: i32, recipient: u32) {
        self.insert_arg(recipient, arg);
        self.erase_arg(gate, arg);
    }

    /// Absorbs a positive same-type argument gate: its arguments move
    /// up, the child edge is dropped. May turn this gate constant
    /// through the complement algebra.
    pub(crate) fn join_gate(&mut self, gate: u32, child: u32) {
        debug_assert!(self.gate(gate).args.contains(&(child as i32)));
        let child_args: Vec<i32> = self.gate(child).args.iter().copied().collect();
        self.erase_arg(gate, child as i32);
        for arg in child_args {
            self.insert_arg(gate, arg);
            if self.gate(gate).state != GateState::Normal {
                return;
            }
        }
    }

    /// Splices out a pass-through argument gate: the edge to the NULL
    /// gate is replaced by an edge to its sole argument, with sign
    /// multiplication.
    pub(crate) fn join_null_gate(&mut self, gate: u32, arg: i32) {
        debug_assert_ne!(arg, 0);
        let child = arg.unsigned_abs();
        debug_assert_eq!(self.gate(child).gate_type, GateType::Null);
        debug_assert_eq!(self.gate(child).args.len(), 1);
        let inner = *self.gate(child).args.iter().next().unwrap();
        self.erase_arg(gate, arg);
        let sign = if arg > 0 { 1 } else { -1 };
        self.insert_arg(gate, sign * inner);
    }

    /// Turns the gate into constant false and drops its arguments.
    pub(crate) fn nullify(&mut self, gate: u32) {
        debug!("nullify({})", gate);
        debug_assert_eq!(self.gate(gate).state, GateState::Normal);
        self.gate_mut(gate).state = GateState::Null;
        self.erase_all_args(gate);
    }

    /// Turns the gate into constant true and drops its arguments.
    pub(crate) fn make_unity(&mut self, gate: u32) {
        debug!("make_unity({})", gate);
        debug_assert_eq!(self.gate(gate).state, GateState::Normal);
        self.gate_mut(gate).state = GateState::Unity;
        self.erase_all_args(gate);
    }

    pub(crate) fn set_gate_type(&mut self, gate: u32, gate_type: GateType) {
        self.gate_mut(gate).gate_type = gate_type;
    }

    pub(crate) fn set_vote_number(&mut self, gate: u32, vote_number: u32) {
        self.gate_mut(gate).vote_number = vote_number;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builder_basics() {
        let mut tree = FaultTree::new();
        let v1 = tree.add_variable();
        let v2 = tree.add_variable();
        let root = tree.add_gate(GateType::And);
        tree.add_arg(root, v1 as i32).unwrap();
        tree.add_arg(root, v2 as i32).unwrap();
        tree.set_root(root);

        assert!(tree.coherent());
        assert!(tree.normal());
        assert!(!tree.constants());
        assert_eq!(tree.gate(root).num_args(), 2);
        assert!(tree.node(v1).parents.contains(&root));
        tree.validate().unwrap();
    }

    #[test]
    fn test_builder_rejects_bad_args() {
        let mut tree = FaultTree::new();
        let v1 = tree.add_variable();
        let root = tree.add_gate(GateType::And);
        assert_eq!(tree.add_arg(root, 0), Err(GraphError::ZeroIndex));
        assert_eq!(tree.add_arg(root, 99), Err(GraphError::UnknownNode(99)));
        tree.add_arg(root, v1 as i32).unwrap();
        assert_eq!(
            tree.add_arg(root, v1 as i32),
            Err(GraphError::DuplicateArgument(v1 as i32))
        );
        assert_eq!(
            tree.add_arg(root, -(v1 as i32)),
            Err(GraphError::ComplementArgument(-(v1 as i32)))
        );
    }

    #[test]
    fn test_negative_arg_clears_coherence() {
        let mut tree = FaultTree::new();
        let v1 = tree.add_variable();
        let v2 = tree.add_variable();
        let root = tree.add_gate(GateType::Or);
        tree.add_arg(root, v1 as i32).unwrap();
        tree.add_arg(root, -(v2 as i32)).unwrap();
        assert!(!tree.coherent());
        assert!(tree.normal());
    }

    #[test]
    fn test_atleast_vote_validation() {
        let mut tree = FaultTree::new();
        assert!(matches!(
            tree.add_atleast_gate(1),
            Err(GraphError::InvalidVoteNumber { .. })
        ));
        let gate = tree.add_atleast_gate(2).unwrap();
        let v1 = tree.add_variable();
        let v2 = tree.add_variable();
        tree.add_arg(gate, v1 as i32).unwrap();
        tree.add_arg(gate, v2 as i32).unwrap();
        tree.set_root(gate);
        // Two arguments for a 2-out-of-N gate is not enough.
        assert!(matches!(
            tree.validate(),
            Err(GraphError::WrongArity { .. })
        ));
    }

    #[test]
    fn test_insert_arg_complement_makes_constant() {
        let mut tree = FaultTree::new();
        let v1 = tree.add_variable();
        let and = tree.add_gate(GateType::And);
        let or = tree.add_gate(GateType::Or);
        tree.add_arg(and, v1 as i32).unwrap();
        tree.add_arg(or, v1 as i32).unwrap();

        tree.insert_arg(and, -(v1 as i32));
        assert_eq!(tree.gate(and).state(), GateState::Null);
        assert!(tree.gate(and).args().is_empty());

        tree.insert_arg(or, -(v1 as i32));
        assert_eq!(tree.gate(or).state(), GateState::Unity);
    }

    #[test]
    fn test_join_null_gate_carries_sign() {
        let mut tree = FaultTree::new();
        let v1 = tree.add_variable();
        let null = tree.add_gate(GateType::Null);
        let root = tree.add_gate(GateType::And);
        let v2 = tree.add_variable();
        tree.add_arg(null, v1 as i32).unwrap();
        tree.add_arg(root, -(null as i32)).unwrap();
        tree.add_arg(root, v2 as i32).unwrap();
        tree.set_root(root);

        tree.join_null_gate(root, -(null as i32));
        assert!(tree.gate(root).args().contains(&-(v1 as i32)));
        assert!(!tree.gate(root).args().contains(&-(null as i32)));
        assert!(tree.node(v1).parents.contains(&root));
        assert!(tree.is_detached(null));
    }

    #[test]
    fn test_visit_protocol() {
        let mut tree = FaultTree::new();
        let v1 = tree.add_variable();
        assert!(!tree.node_mut(v1).visit(1));
        assert!(!tree.node_mut(v1).visit(2));
        assert!(tree.node_mut(v1).visit(5));
        assert!(tree.node(v1).revisited());
        assert_eq!(tree.node(v1).last_time(), 5);
        tree.node_mut(v1).clear_visits();
        assert_eq!(tree.node(v1).last_time(), 0);
    }
}
