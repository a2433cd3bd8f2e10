//! Multi-pass rewrite engine over the indexed Boolean graph.
//!
//! The passes fire in a fixed sequence and each one assumes the
//! contract left behind by its predecessors: constants are propagated
//! before normalization, complements before multiple-definition
//! detection, and module detection runs last over a graph that only
//! contains positive AND/OR gates. Every pass preserves the Boolean
//! function of the root over basic-event valuations.
//!
//! Recursion depth tracks the depth of the fault tree; callers with
//! pathologically deep models need a correspondingly sized stack.

use std::collections::{HashMap, HashSet, VecDeque};

use log::debug;

use crate::graph::{FaultTree, GateState, GateType};

/// The rewrite driver. Owns the graph exclusively for the duration of
/// [`process`][Preprocessor::process].
pub struct Preprocessor<'a> {
    graph: &'a mut FaultTree,
    /// Sign of the root polarity accumulated from negative root gates.
    root_sign: i32,
    /// Gates that became constant and await upward propagation.
    const_gates: Vec<u32>,
    /// Pass-through gates awaiting removal.
    null_gates: Vec<u32>,
}

impl<'a> Preprocessor<'a> {
    pub fn new(graph: &'a mut FaultTree) -> Self {
        Self {
            graph,
            root_sign: 1,
            const_gates: Vec::new(),
            null_gates: Vec::new(),
        }
    }

    /// Runs the full pass sequence. On return the graph is free of
    /// constants, pass-through and negative-type gates; only positive
    /// AND/OR operators remain (complemented variable edges survive for
    /// non-coherent inputs), duplicate definitions are collapsed, and
    /// independent modules are tagged.
    pub fn process(mut self) {
        let root = self.graph.root();
        assert!(
            self.graph.node(root).parents.is_empty(),
            "The root gate must not have parents"
        );
        assert!(!self.graph.gate(root).mark);
        debug!("Preprocessing...");

        if self.graph.constants() {
            debug!("Propagating constants...");
            self.propagate_constants(root);
            self.graph.set_constants(false);
            debug!("Constant propagation is done");
        }

        if self.graph.gate(self.graph.root()).state() == GateState::Normal {
            if !self.graph.normal() {
                debug!("Normalizing gates...");
                assert_eq!(self.root_sign, 1);
                self.normalize_gates();
                debug!("Finished normalizing gates");
            }
            self.remove_null_gates();
        }

        let mut root = self.graph.root();
        if self.graph.gate(root).state() != GateState::Normal {
            // The root gate has become constant.
            if self.root_sign < 0 {
                let orig_state = self.graph.gate(root).state();
                let new_root = self.graph.new_gate(GateType::Null, 0);
                self.graph.set_root(new_root);
                if orig_state == GateState::Null {
                    self.graph.make_unity(new_root);
                } else {
                    debug_assert_eq!(orig_state, GateState::Unity);
                    self.graph.nullify(new_root);
                }
                self.root_sign = 1;
            }
            self.clear_gate_marks();
            return;
        }
        if self.graph.gate(root).gate_type() == GateType::Null {
            // Unwrap a pass-through root over a gate argument.
            let gate_arg = self.graph.gate(root).gate_args().iter().next().copied();
            if let Some(signed) = gate_arg {
                debug_assert_eq!(self.graph.gate(root).num_args(), 1);
                let arg = signed.unsigned_abs();
                self.graph.set_root(arg);
                self.graph.erase_arg(root, signed);
                root = arg;
                assert!(self.graph.node(root).parents.is_empty());
                assert!(matches!(
                    self.graph.gate(root).gate_type(),
                    GateType::Or | GateType::And
                ));
                self.root_sign *= if signed > 0 { 1 } else { -1 };
            }
        }
        if !self.graph.coherent() {
            debug!("Propagating complements...");
            if self.root_sign < 0 {
                match self.graph.gate(root).gate_type() {
                    GateType::Or => self.graph.set_gate_type(root, GateType::And),
                    GateType::And => self.graph.set_gate_type(root, GateType::Or),
                    GateType::Null => {}
                    other => unreachable!("a {:?} root after normalization", other),
                }
                self.graph.invert_args(root);
                self.root_sign = 1;
            }
            self.clear_gate_marks();
            let mut complements = HashMap::new();
            self.propagate_complements(root, &mut complements);
            debug!("Complement propagation is done");
        }

        debug!("Detecting multiple definitions...");
        while self.process_multiple_definitions() {}
        debug!("Finished multi-definition detection");

        if self.graph.coherent() {
            self.clear_gate_marks();
            self.boolean_optimization();
        }

        debug!("Coalescing gates...");
        self.clear_gate_marks();
        self.remove_null_gates();
        let mut tree_changed = true;
        while tree_changed {
            debug_assert!(self.const_gates.is_empty());
            debug_assert!(self.null_gates.is_empty());
            tree_changed = false;
            self.clear_gate_marks();
            self.join_gates(self.graph.root());
            if !self.const_gates.is_empty() {
                self.clear_const_gates();
                tree_changed = true;
            }
        }
        debug!("Gate coalescence is done");

        // From here on the structure is repeating positive OR and AND
        // layers, and each gate has at least two arguments.
        let root = self.graph.root();
        if self.graph.gate(root).args().is_empty() {
            self.clear_gate_marks();
            return; // Constant root.
        }
        self.detect_modules();
        self.clear_gate_marks();
        debug!("Finished preprocessing");
    }
}

// Constant propagation.
impl Preprocessor<'_> {
    /// Depth-first constant folding. A gate with a constant argument is
    /// rewritten by the operator-specific rule; gates turned constant
    /// propagate to their own parents through the caller.
    fn propagate_constants(&mut self, gate: u32) -> bool {
        if self.graph.gate(gate).mark {
            return false;
        }
        self.graph.gate_mut(gate).mark = true;
        if self.graph.gate(gate).state() != GateState::Normal {
            return false;
        }

        let mut changed = false;
        let mut to_erase: Vec<i32> = Vec::new();
        let const_args: Vec<i32> = self.graph.gate(gate).constant_args().iter().copied().collect();
        for signed in const_args {
            let mut state = self.graph.constant_value(signed.unsigned_abs());
            if signed < 0 {
                state = !state;
            }
            if self.process_constant_arg(gate, signed, state, &mut to_erase) {
                return true; // The gate itself has become constant.
            }
        }
        let gate_args: Vec<i32> = self.graph.gate(gate).gate_args().iter().copied().collect();
        for signed in gate_args {
            let arg = signed.unsigned_abs();
            if self.propagate_constants(arg) {
                changed = true;
            }
            let arg_state = self.graph.gate(arg).state();
            if arg_state == GateState::Normal {
                continue;
            }
            let mut state = arg_state == GateState::Unity;
            if signed < 0 {
                state = !state;
            }
            if self.process_constant_arg(gate, signed, state, &mut to_erase) {
                return true;
            }
        }
        if !changed && !to_erase.is_empty() {
            changed = true;
        }
        self.remove_args(gate, &to_erase);
        changed
    }

    /// Applies the constant-argument rewrite rule of the parent
    /// operator. Returns true iff the parent itself became constant;
    /// otherwise the argument is scheduled for erasure.
    fn process_constant_arg(
        &mut self,
        gate: u32,
        arg: i32,
        state: bool,
        to_erase: &mut Vec<i32>,
    ) -> bool {
        let parent_type = self.graph.gate(gate).gate_type();
        if !state {
            match parent_type {
                GateType::Nor | GateType::Xor | GateType::Or => {
                    to_erase.push(arg);
                    return false;
                }
                GateType::Null | GateType::And => self.graph.nullify(gate),
                GateType::Nand | GateType::Not => self.graph.make_unity(gate),
                GateType::AtLeast => {
                    // K / (N - 1).
                    to_erase.push(arg);
                    let k = self.graph.gate(gate).vote_number() as usize;
                    let n = self.graph.gate(gate).num_args() - to_erase.len();
                    if k == n {
                        self.graph.set_gate_type(gate, GateType::And);
                    }
                    return false;
                }
            }
        } else {
            match parent_type {
                GateType::Null | GateType::Or => self.graph.make_unity(gate),
                GateType::Nand | GateType::And => {
                    to_erase.push(arg);
                    return false;
                }
                GateType::Nor | GateType::Not => self.graph.nullify(gate),
                GateType::Xor => {
                    // Special handling due to its internal negation.
                    debug_assert_eq!(self.graph.gate(gate).num_args(), 2);
                    if to_erase.len() == 1 {
                        // The other argument was constant false.
                        self.graph.make_unity(gate);
                    } else {
                        debug_assert!(to_erase.is_empty());
                        self.graph.set_gate_type(gate, GateType::Not);
                        to_erase.push(arg);
                        return false;
                    }
                }
                GateType::AtLeast => {
                    // (K - 1) / (N - 1).
                    let k = self.graph.gate(gate).vote_number() - 1;
                    if k == 1 {
                        self.graph.set_gate_type(gate, GateType::Or);
                    } else {
                        self.graph.set_vote_number(gate, k);
                    }
                    to_erase.push(arg);
                    return false;
                }
            }
        }
        true
    }

    /// Erases the scheduled arguments and fixes up the arity: an empty
    /// gate becomes its neutral constant, a single-argument gate turns
    /// into a pass-through or negation.
    fn remove_args(&mut self, gate: u32, to_erase: &[i32]) {
        if to_erase.is_empty() {
            return;
        }
        debug_assert!(to_erase.len() <= self.graph.gate(gate).num_args());
        for &arg in to_erase {
            self.graph.erase_arg(gate, arg);
        }
        let gate_type = self.graph.gate(gate).gate_type();
        match self.graph.gate(gate).num_args() {
            0 => match gate_type {
                GateType::Nand | GateType::Xor | GateType::Or => self.graph.nullify(gate),
                GateType::Nor | GateType::And => self.graph.make_unity(gate),
                other => unreachable!("an argument-less {:?} gate", other),
            },
            1 => match gate_type {
                GateType::Xor | GateType::Or | GateType::And => {
                    self.graph.set_gate_type(gate, GateType::Null)
                }
                GateType::Nor | GateType::Nand => self.graph.set_gate_type(gate, GateType::Not),
                GateType::Not | GateType::Null => {}
                GateType::AtLeast => unreachable!("a single-argument ATLEAST gate"),
            },
            _ => {}
        }
    }

    /// Propagates a constant gate to its parents until none remain.
    fn propagate_const_gate(&mut self, gate: u32) {
        debug_assert_ne!(self.graph.gate(gate).state(), GateState::Normal);
        loop {
            let parent = match self.graph.node(gate).parents.iter().next() {
                Some(&parent) => parent,
                None => break,
            };
            let sign = if self.graph.gate(parent).args().contains(&(gate as i32)) {
                1
            } else {
                -1
            };
            let mut state = self.graph.gate(gate).state() == GateState::Unity;
            if sign < 0 {
                state = !state;
            }
            let mut to_erase = Vec::new();
            self.process_constant_arg(parent, sign * gate as i32, state, &mut to_erase);
            self.remove_args(parent, &to_erase);

            if self.graph.gate(parent).state() != GateState::Normal {
                self.propagate_const_gate(parent);
            } else if self.graph.gate(parent).gate_type() == GateType::Null {
                self.propagate_null_gate(parent);
            }
        }
    }

    /// Splices a pass-through gate out of all its parents.
    fn propagate_null_gate(&mut self, gate: u32) {
        debug_assert_eq!(self.graph.gate(gate).gate_type(), GateType::Null);
        loop {
            let parent = match self.graph.node(gate).parents.iter().next() {
                Some(&parent) => parent,
                None => break,
            };
            let sign = if self.graph.gate(parent).args().contains(&(gate as i32)) {
                1
            } else {
                -1
            };
            self.graph.join_null_gate(parent, sign * gate as i32);

            if self.graph.gate(parent).state() != GateState::Normal {
                self.propagate_const_gate(parent);
            } else if self.graph.gate(parent).gate_type() == GateType::Null {
                self.propagate_null_gate(parent);
            }
        }
    }

    fn clear_const_gates(&mut self) {
        self.clear_gate_marks(); // New gates may come without marks.
        let gates = std::mem::take(&mut self.const_gates);
        for gate in gates {
            if self.graph.is_detached(gate) {
                continue;
            }
            self.propagate_const_gate(gate);
        }
    }

    fn clear_null_gates(&mut self) {
        self.clear_gate_marks(); // New gates may come without marks.
        let gates = std::mem::take(&mut self.null_gates);
        for gate in gates {
            if self.graph.is_detached(gate) {
                continue;
            }
            if self.graph.gate(gate).state() != GateState::Normal {
                continue; // Taken over by constant propagation.
            }
            self.propagate_null_gate(gate);
        }
    }
}

// Gate normalization.
impl Preprocessor<'_> {
    /// Rewrites negative, XOR, and voting operators into positive
    /// AND/OR structure. The root's own negative type is absorbed into
    /// `root_sign`.
    fn normalize_gates(&mut self) {
        debug_assert!(self.const_gates.is_empty());
        debug_assert!(self.null_gates.is_empty());
        let root = self.graph.root();
        match self.graph.gate(root).gate_type() {
            GateType::Nor | GateType::Nand | GateType::Not => self.root_sign = -self.root_sign,
            _ => {}
        }
        self.clear_gate_marks();
        self.notify_parents_of_negative_gates(root);

        self.clear_gate_marks();
        self.normalize_gate(root); // Registers null gates only.

        debug_assert!(self.const_gates.is_empty());
        if !self.null_gates.is_empty() {
            self.clear_null_gates();
        }
    }

    /// Absorbs the sign of NOR/NAND/NOT argument gates into the parent
    /// edge; the types themselves are rewritten afterwards.
    fn notify_parents_of_negative_gates(&mut self, gate: u32) {
        if self.graph.gate(gate).mark {
            return;
        }
        self.graph.gate_mut(gate).mark = true;
        let mut to_negate = Vec::new();
        let gate_args: Vec<i32> = self.graph.gate(gate).gate_args().iter().copied().collect();
        for signed in gate_args {
            let arg = signed.unsigned_abs();
            self.notify_parents_of_negative_gates(arg);
            match self.graph.gate(arg).gate_type() {
                GateType::Nor | GateType::Nand | GateType::Not => to_negate.push(signed),
                _ => {}
            }
        }
        for signed in to_negate {
            // Does not produce constants or duplicates.
            self.graph.invert_arg(gate, signed);
        }
    }

    fn normalize_gate(&mut self, gate: u32) {
        if self.graph.gate(gate).mark {
            return;
        }
        self.graph.gate_mut(gate).mark = true;
        debug_assert_eq!(self.graph.gate(gate).state(), GateState::Normal);
        debug_assert!(!self.graph.gate(gate).args().is_empty());

        // Depth-first traversal before the arguments may get changed.
        let gate_args: Vec<i32> = self.graph.gate(gate).gate_args().iter().copied().collect();
        for signed in gate_args {
            self.normalize_gate(signed.unsigned_abs());
        }

        match self.graph.gate(gate).gate_type() {
            // Negation is already absorbed into the edges.
            GateType::Not => {
                debug_assert_eq!(self.graph.gate(gate).num_args(), 1);
                self.graph.set_gate_type(gate, GateType::Null);
            }
            GateType::Nor | GateType::Or => {
                debug_assert!(self.graph.gate(gate).num_args() > 1);
                self.graph.set_gate_type(gate, GateType::Or);
            }
            GateType::Nand | GateType::And => {
                debug_assert!(self.graph.gate(gate).num_args() > 1);
                self.graph.set_gate_type(gate, GateType::And);
            }
            GateType::Xor => self.normalize_xor_gate(gate),
            GateType::AtLeast => self.normalize_atleast_gate(gate),
            GateType::Null => self.null_gates.push(gate), // Register for removal.
        }
    }

    /// XOR(a, b) becomes OR(AND(a, ¬b), AND(¬a, b)).
    fn normalize_xor_gate(&mut self, gate: u32) {
        debug_assert_eq!(self.graph.gate(gate).num_args(), 2);
        let gate_one = self.graph.new_gate(GateType::And, 0);
        let gate_two = self.graph.new_gate(GateType::And, 0);
        self.graph.gate_mut(gate_one).mark = true;
        self.graph.gate_mut(gate_two).mark = true;

        let args: Vec<i32> = self.graph.gate(gate).args().iter().copied().collect();
        let (first, second) = (args[0], args[1]);

        self.graph.insert_arg(gate_one, first);
        self.graph.insert_arg(gate_two, -first);
        self.graph.insert_arg(gate_one, -second);
        self.graph.insert_arg(gate_two, second);

        self.graph.set_gate_type(gate, GateType::Or);
        self.graph.erase_all_args(gate);
        self.graph.insert_arg(gate, gate_one as i32);
        self.graph.insert_arg(gate, gate_two as i32);
    }

    /// Shannon decomposition of ATLEAST(k; x1..xn) on its first
    /// argument: OR(AND(x1, ATLEAST(k-1; x2..xn)), ATLEAST(k; x2..xn)).
    /// The two fresh voting gates are normalized recursively; the base
    /// cases k = 1 and k = n degenerate to OR and AND.
    fn normalize_atleast_gate(&mut self, gate: u32) {
        debug_assert_eq!(self.graph.gate(gate).gate_type(), GateType::AtLeast);
        let vote_number = self.graph.gate(gate).vote_number();
        debug_assert!(vote_number > 0);
        debug_assert!(self.graph.gate(gate).num_args() > 1);
        if self.graph.gate(gate).num_args() == vote_number as usize {
            self.graph.set_gate_type(gate, GateType::And);
            return;
        }
        if vote_number == 1 {
            self.graph.set_gate_type(gate, GateType::Or);
            return;
        }

        let args: Vec<i32> = self.graph.gate(gate).args().iter().copied().collect();
        let first = args[0];

        let first_arg = self.graph.new_gate(GateType::And, 0);
        self.graph.insert_arg(first_arg, first);

        let grand_arg = self.graph.new_gate(GateType::AtLeast, vote_number - 1);
        self.graph.insert_arg(first_arg, grand_arg as i32);

        let second_arg = self.graph.new_gate(GateType::AtLeast, vote_number);

        for &signed in &args[1..] {
            self.graph.insert_arg(grand_arg, signed);
            self.graph.insert_arg(second_arg, signed);
        }

        self.graph.gate_mut(first_arg).mark = true;
        self.graph.gate_mut(second_arg).mark = true;
        self.graph.gate_mut(grand_arg).mark = true;

        self.graph.set_gate_type(gate, GateType::Or);
        self.graph.erase_all_args(gate);
        self.graph.insert_arg(gate, first_arg as i32);
        self.graph.insert_arg(gate, second_arg as i32);

        self.normalize_atleast_gate(grand_arg);
        self.normalize_atleast_gate(second_arg);
    }
}

// Null-gate removal.
impl Preprocessor<'_> {
    /// Gathers and splices out all pass-through gates. A lone NULL root
    /// is left alone; it wraps a single variable or the constant state.
    fn remove_null_gates(&mut self) -> bool {
        self.clear_gate_marks();
        debug_assert!(self.null_gates.is_empty());
        let root = self.graph.root();
        self.gather_null_gates(root);
        self.clear_gate_marks();
        if self.null_gates.len() == 1 && self.null_gates[0] == root {
            self.null_gates.clear();
        }
        if !self.null_gates.is_empty() {
            self.clear_null_gates();
            return true;
        }
        false
    }

    fn gather_null_gates(&mut self, gate: u32) {
        if self.graph.gate(gate).mark {
            return;
        }
        self.graph.gate_mut(gate).mark = true;
        if self.graph.gate(gate).gate_type() == GateType::Null
            && self.graph.gate(gate).state() == GateState::Normal
        {
            self.null_gates.push(gate);
        }
        let gate_args: Vec<i32> = self.graph.gate(gate).gate_args().iter().copied().collect();
        for signed in gate_args {
            self.gather_null_gates(signed.unsigned_abs());
        }
    }
}

// Complement propagation.
impl Preprocessor<'_> {
    /// Pushes negative gate edges down by constructing De Morgan
    /// complements. A sole-parent child is rewritten in place; a shared
    /// child gets a cloned complement, registered in `complements` so
    /// repeated negations share one gate.
    fn propagate_complements(&mut self, gate: u32, complements: &mut HashMap<u32, u32>) {
        if self.graph.gate(gate).mark {
            return;
        }
        self.graph.gate_mut(gate).mark = true;

        let mut to_swap = Vec::new(); // Negative args to get swapped.
        let gate_args: Vec<i32> = self.graph.gate(gate).gate_args().iter().copied().collect();
        for signed in gate_args {
            let arg = signed.unsigned_abs();
            let next = if signed < 0 {
                to_swap.push(signed);
                if let Some(&complement) = complements.get(&arg) {
                    complement
                } else {
                    let arg_type = self.graph.gate(arg).gate_type();
                    debug_assert!(matches!(arg_type, GateType::And | GateType::Or));
                    let complement_type = if arg_type == GateType::Or {
                        GateType::And
                    } else {
                        GateType::Or
                    };
                    let complement = if self.graph.node(arg).parents.len() == 1 {
                        // Only this parent; rewrite in place.
                        self.graph.set_gate_type(arg, complement_type);
                        self.graph.invert_args(arg);
                        arg
                    } else {
                        let clone = self.graph.new_gate(complement_type, 0);
                        let args: Vec<i32> =
                            self.graph.gate(arg).args().iter().copied().collect();
                        for a in args {
                            self.graph.insert_arg(clone, -a);
                        }
                        clone
                    };
                    complements.insert(arg, complement);
                    complement
                }
            } else {
                arg
            };
            self.propagate_complements(next, complements);
        }

        for signed in to_swap {
            debug_assert!(signed < 0);
            let complement = complements[&signed.unsigned_abs()];
            if complement == signed.unsigned_abs() {
                // Rewritten in place; only the edge sign flips.
                self.graph.invert_arg(gate, signed);
            } else {
                self.graph.erase_arg(gate, signed);
                self.graph.insert_arg(gate, complement as i32);
                debug_assert_eq!(self.graph.gate(gate).state(), GateState::Normal);
            }
        }
    }
}

// Multiple-definition elimination.
impl Preprocessor<'_> {
    /// Finds gates that define the same function (same operator, same
    /// signed argument set) and redirects all parents to one
    /// representative. Returns true if the graph changed.
    fn process_multiple_definitions(&mut self) -> bool {
        debug_assert!(self.null_gates.is_empty());
        debug_assert!(self.const_gates.is_empty());
        self.clear_gate_marks();
        let mut multi_def: Vec<(u32, Vec<u32>)> = Vec::new();
        let mut type_groups: HashMap<GateType, Vec<u32>> = HashMap::new();
        let root = self.graph.root();
        self.detect_multiple_definitions(root, &mut multi_def, &mut type_groups);

        if multi_def.is_empty() {
            return false;
        }
        for (original, duplicates) in multi_def {
            for duplicate in duplicates {
                if self.graph.is_detached(duplicate) {
                    continue;
                }
                let parents: Vec<u32> =
                    self.graph.node(duplicate).parents.iter().copied().collect();
                for parent in parents {
                    if !self.graph.node(duplicate).parents.contains(&parent) {
                        continue; // An earlier rewrite dropped this edge.
                    }
                    let index = duplicate as i32;
                    let sign = if self.graph.gate(parent).args().contains(&-index) {
                        -1
                    } else {
                        1
                    };
                    self.graph.erase_arg(parent, sign * index);
                    self.graph.insert_arg(parent, sign * original as i32);

                    if self.graph.gate(parent).state() != GateState::Normal {
                        self.const_gates.push(parent);
                    } else if self.graph.gate(parent).gate_type() == GateType::Null {
                        self.null_gates.push(parent);
                    }
                }
            }
        }
        if !self.const_gates.is_empty() {
            self.clear_const_gates();
        }
        if !self.null_gates.is_empty() {
            self.clear_null_gates();
        }
        true
    }

    fn detect_multiple_definitions(
        &mut self,
        gate: u32,
        multi_def: &mut Vec<(u32, Vec<u32>)>,
        type_groups: &mut HashMap<GateType, Vec<u32>>,
    ) {
        if self.graph.gate(gate).mark {
            return;
        }
        self.graph.gate_mut(gate).mark = true;
        debug_assert_eq!(self.graph.gate(gate).state(), GateState::Normal);

        let gate_type = self.graph.gate(gate).gate_type();
        if let Some(group) = type_groups.get(&gate_type) {
            for &original in group {
                debug_assert!(self.graph.gate(original).mark);
                if self.graph.gate(original).args() != self.graph.gate(gate).args() {
                    continue;
                }
                if gate_type == GateType::AtLeast
                    && self.graph.gate(original).vote_number()
                        != self.graph.gate(gate).vote_number()
                {
                    continue;
                }
                // Register this gate for replacement.
                match multi_def.iter_mut().find(|(o, _)| *o == original) {
                    Some((_, duplicates)) => duplicates.push(gate),
                    None => multi_def.push((original, vec![gate])),
                }
                return;
            }
        }
        // Not a redefinition. Children first, so this gate is never
        // compared against its own descendants.
        let gate_args: Vec<i32> = self.graph.gate(gate).gate_args().iter().copied().collect();
        for signed in gate_args {
            self.detect_multiple_definitions(signed.unsigned_abs(), multi_def, type_groups);
        }
        type_groups.entry(gate_type).or_default().push(gate);
    }
}

// Boolean optimization over common nodes.
impl Preprocessor<'_> {
    /// Redundancy detection for shared nodes in coherent graphs: a
    /// hypothetical failure of a common node is propagated upward; the
    /// parents whose failure does not matter for any failure
    /// destination drop the node, and the destinations gain it
    /// directly.
    fn boolean_optimization(&mut self) {
        self.clear_node_visits();
        self.clear_gate_marks();

        let mut common_gates = Vec::new();
        let mut common_variables = Vec::new();
        self.gather_common_nodes(&mut common_gates, &mut common_variables);

        self.clear_node_visits();
        for gate in common_gates {
            self.process_common_node(gate);
        }
        for variable in common_variables {
            self.process_common_node(variable);
        }
    }

    fn gather_common_nodes(
        &mut self,
        common_gates: &mut Vec<u32>,
        common_variables: &mut Vec<u32>,
    ) {
        let mut queue = VecDeque::new();
        queue.push_back(self.graph.root());
        while let Some(gate) = queue.pop_front() {
            let gate_args: Vec<i32> =
                self.graph.gate(gate).gate_args().iter().copied().collect();
            for signed in gate_args {
                let arg = signed.unsigned_abs();
                debug_assert_eq!(self.graph.gate(arg).state(), GateState::Normal);
                if self.graph.node(arg).enter_time != 0 {
                    continue; // Visited.
                }
                self.graph.node_mut(arg).visit(1);
                queue.push_back(arg);
                if self.graph.node(arg).parents.len() > 1 {
                    common_gates.push(arg);
                }
            }
            let variable_args: Vec<i32> =
                self.graph.gate(gate).variable_args().iter().copied().collect();
            for signed in variable_args {
                let arg = signed.unsigned_abs();
                if self.graph.node(arg).enter_time != 0 {
                    continue;
                }
                self.graph.node_mut(arg).visit(1);
                if self.graph.node(arg).parents.len() > 1 {
                    common_variables.push(arg);
                }
            }
        }
    }

    fn process_common_node(&mut self, node: u32) {
        if self.graph.is_detached(node) {
            return; // The node has been deleted.
        }
        if self.graph.node(node).parents.len() == 1 {
            return; // A parent is deleted; the node is no longer shared.
        }
        let root = self.graph.root();
        self.clear_opti_values(root);

        debug_assert_eq!(self.graph.node(node).opti_value, 0);
        self.graph.node_mut(node).opti_value = 1;
        let mut mult_tot = self.graph.node(node).parents.len() as i32;
        debug_assert!(mult_tot > 1);
        mult_tot += self.propagate_failure(node);

        let mut destinations: Vec<u32> = Vec::new();
        let num_dest;
        if self.graph.node(root).opti_value == 1 {
            // The root gate failed.
            destinations.push(root);
            num_dest = 1;
        } else {
            debug_assert_eq!(self.graph.node(root).opti_value, 0);
            num_dest = self.collect_failure_destinations(root, node, &mut destinations);
        }
        if num_dest == 0 {
            return; // No failure destination detected.
        }
        debug_assert!(!destinations.is_empty());
        if num_dest < mult_tot {
            // Redundancy detection.
            let created_constant = self.process_redundant_parents(node, &mut destinations);
            self.process_failure_destinations(node, &destinations);
            if created_constant {
                self.clear_gate_marks();
                let root = self.graph.root();
                self.propagate_constants(root);
                self.clear_gate_marks();
                self.remove_null_gates();
            }
        }
    }

    /// Notifies parents of the hypothetical failure; returns the total
    /// multiplicity of newly failed shared gates.
    fn propagate_failure(&mut self, node: u32) -> i32 {
        debug_assert_eq!(self.graph.node(node).opti_value, 1);
        let mut mult_tot = 0;
        let parents: Vec<u32> = self.graph.node(node).parents.iter().copied().collect();
        for parent in parents {
            if self.graph.node(parent).opti_value == 1 {
                continue;
            }
            self.graph.arg_failed(parent); // Send a notification.
            if self.graph.node(parent).opti_value == 1 {
                let mult = self.graph.node(parent).parents.len() as i32;
                if mult > 1 {
                    mult_tot += mult;
                }
                mult_tot += self.propagate_failure(parent);
            }
        }
        mult_tot
    }

    /// Walks the non-failed region from the root and records the
    /// topmost failed gates: the destinations where the node's failure
    /// becomes decisive. Gates directly containing the node are marked
    /// 3, other visited gates 2.
    fn collect_failure_destinations(
        &mut self,
        gate: u32,
        node: u32,
        destinations: &mut Vec<u32>,
    ) -> i32 {
        debug_assert_eq!(self.graph.node(gate).opti_value, 0);
        self.graph.node_mut(gate).opti_value =
            if self.graph.gate(gate).args().contains(&(node as i32)) {
                3
            } else {
                2
            };
        let mut num_dest = 0;
        let gate_args: Vec<i32> = self.graph.gate(gate).gate_args().iter().copied().collect();
        for signed in gate_args {
            let arg = signed.unsigned_abs();
            match self.graph.node(arg).opti_value {
                0 => num_dest += self.collect_failure_destinations(arg, node, destinations),
                1 if arg != node => {
                    num_dest += 1;
                    if !destinations.contains(&arg) {
                        destinations.push(arg);
                    }
                }
                _ => {} // Marks 2 and 3 are already processed regions.
            }
        }
        num_dest
    }

    /// The node behaves like constant false for redundant parents.
    fn process_redundant_parents(&mut self, node: u32, destinations: &mut Vec<u32>) -> bool {
        let mut redundant = Vec::new();
        let parents: Vec<u32> = self.graph.node(node).parents.iter().copied().collect();
        for parent in parents {
            if self.graph.node(parent).opti_value < 3 {
                // An OR destination that is also a parent keeps the
                // node; it is neither redundant nor in need of a new
                // edge.
                if self.graph.gate(parent).gate_type() == GateType::Or
                    && destinations.contains(&parent)
                {
                    destinations.retain(|&d| d != parent);
                    continue;
                }
                redundant.push(parent);
            }
        }
        let mut created_constant = false;
        for parent in redundant {
            if self.graph.is_detached(parent) {
                continue;
            }
            match self.graph.gate(parent).gate_type() {
                GateType::And => {
                    self.graph.nullify(parent);
                    created_constant = true;
                }
                GateType::Or => {
                    debug_assert!(self.graph.gate(parent).num_args() > 1);
                    self.graph.erase_arg(parent, node as i32);
                    if self.graph.gate(parent).num_args() == 1 {
                        self.graph.set_gate_type(parent, GateType::Null);
                    }
                }
                GateType::AtLeast => {
                    debug_assert!(self.graph.gate(parent).num_args() > 2);
                    self.graph.erase_arg(parent, node as i32);
                    if self.graph.gate(parent).num_args()
                        == self.graph.gate(parent).vote_number() as usize
                    {
                        self.graph.set_gate_type(parent, GateType::And);
                    }
                }
                other => unreachable!("a redundant {:?} parent", other),
            }
        }
        created_constant
    }

    /// Pushes the node into each destination: an OR gains it directly,
    /// an AND/ATLEAST body is wrapped into an intermediate OR first.
    fn process_failure_destinations(&mut self, node: u32, destinations: &[u32]) {
        for &target in destinations {
            if self.graph.is_detached(target) {
                continue;
            }
            match self.graph.gate(target).gate_type() {
                GateType::Or => self.graph.insert_arg(target, node as i32),
                GateType::And | GateType::AtLeast => {
                    let target_type = self.graph.gate(target).gate_type();
                    let vote_number = self.graph.gate(target).vote_number();
                    let new_gate = self.graph.new_gate(target_type, vote_number);
                    let args: Vec<i32> =
                        self.graph.gate(target).args().iter().copied().collect();
                    for arg in args {
                        self.graph.insert_arg(new_gate, arg);
                    }
                    self.graph.erase_all_args(target);
                    self.graph.set_gate_type(target, GateType::Or);
                    self.graph.insert_arg(target, new_gate as i32);
                    self.graph.insert_arg(target, node as i32);
                }
                other => unreachable!("a {:?} failure destination", other),
            }
        }
    }
}

// Coalescing.
impl Preprocessor<'_> {
    /// Merges positive same-type argument gates into their parents.
    /// Modules are not coalesced into their containing gates. Gates
    /// that turn constant through the complement algebra are registered
    /// for cascading.
    fn join_gates(&mut self, gate: u32) -> bool {
        if self.graph.gate(gate).mark {
            return false;
        }
        self.graph.gate_mut(gate).mark = true;
        let target_type = match self.graph.gate(gate).gate_type() {
            GateType::Nand | GateType::And => Some(GateType::And),
            GateType::Nor | GateType::Or => Some(GateType::Or),
            _ => None,
        };
        let mut to_join = Vec::new();
        let mut changed = false;
        let gate_args: Vec<i32> = self.graph.gate(gate).gate_args().iter().copied().collect();
        for signed in gate_args {
            let arg = signed.unsigned_abs();
            if self.join_gates(arg) {
                changed = true;
            }
            let target_type = match target_type {
                Some(target_type) => target_type,
                None => continue, // Joining with this parent is impossible.
            };
            if signed < 0 {
                continue; // Cannot join a negative argument gate.
            }
            if self.graph.gate(arg).is_module() {
                continue;
            }
            if self.graph.gate(arg).gate_type() == target_type {
                to_join.push(arg);
            }
        }

        if !to_join.is_empty() {
            changed = true;
        }
        for child in to_join {
            self.graph.join_gate(gate, child);
            if self.graph.gate(gate).state() != GateState::Normal {
                self.const_gates.push(gate); // Register for future processing.
                return true; // The parent is constant.
            }
        }
        changed
    }
}

// Module detection.
impl Preprocessor<'_> {
    /// Two-phase DFS: timestamps first, then interval analysis. A gate
    /// is an independent module iff the visit times of everything it
    /// reaches nest strictly inside its own enter/exit window.
    fn detect_modules(&mut self) {
        debug!("Detecting modules...");
        self.clear_node_visits();

        let root = self.graph.root();
        self.assign_timing(0, root);
        debug!("Timings are assigned to nodes");

        self.clear_gate_marks();
        self.find_modules(root);

        debug_assert!(!self.graph.node(root).revisited());
        debug_assert_eq!(self.graph.node(root).enter_time, 1);
        debug_assert_eq!(
            self.graph.node(root).max_time(),
            self.graph.node(root).exit_time
        );
    }

    fn assign_timing(&mut self, mut time: i32, gate: u32) -> i32 {
        time += 1;
        if self.graph.node_mut(gate).visit(time) {
            return time; // Revisited gate.
        }
        debug_assert!(self.graph.gate(gate).constant_args().is_empty());

        let gate_args: Vec<i32> = self.graph.gate(gate).gate_args().iter().copied().collect();
        for signed in gate_args {
            time = self.assign_timing(time, signed.unsigned_abs());
        }
        let variable_args: Vec<i32> =
            self.graph.gate(gate).variable_args().iter().copied().collect();
        for signed in variable_args {
            let arg = signed.unsigned_abs();
            time += 1;
            self.graph.node_mut(arg).visit(time); // Enter the leaf.
            self.graph.node_mut(arg).visit(time); // Exit at the same time.
        }
        time += 1;
        let re_visited = self.graph.node_mut(gate).visit(time); // Exit.
        debug_assert!(!re_visited, "Detected a cycle through gate {}", gate);
        time
    }

    fn find_modules(&mut self, gate: u32) {
        if self.graph.gate(gate).mark {
            return;
        }
        self.graph.gate_mut(gate).mark = true;
        let enter_time = self.graph.node(gate).enter_time;
        let exit_time = self.graph.node(gate).exit_time;
        let mut min_time = enter_time;
        let mut max_time = exit_time;

        let mut non_shared_args: Vec<(i32, u32)> = Vec::new();
        let mut modular_args: Vec<(i32, u32)> = Vec::new();
        let mut non_modular_args: Vec<(i32, u32)> = Vec::new();

        let gate_args: Vec<i32> = self.graph.gate(gate).gate_args().iter().copied().collect();
        for signed in gate_args {
            let arg = signed.unsigned_abs();
            self.find_modules(arg);
            if self.graph.gate(arg).is_module() && !self.graph.node(arg).revisited() {
                debug_assert_eq!(self.graph.node(arg).parents.len(), 1);
                debug_assert!(self.graph.node(arg).parents.contains(&gate));
                // The sub-tree's visit times nest within this gate.
                non_shared_args.push((signed, arg));
                continue;
            }
            let min = self.graph.node(arg).min_time();
            let max = self.graph.node(arg).max_time();
            debug_assert!(min > 0 && max > min);
            if min > enter_time && max < exit_time {
                modular_args.push((signed, arg));
            } else {
                non_modular_args.push((signed, arg));
            }
            min_time = min_time.min(min);
            max_time = max_time.max(max);
        }

        let variable_args: Vec<i32> =
            self.graph.gate(gate).variable_args().iter().copied().collect();
        for signed in variable_args {
            let arg = signed.unsigned_abs();
            let min = self.graph.node(arg).enter_time;
            let max = self.graph.node(arg).last_time();
            debug_assert!(min > 0 && max > 0);
            if min == max {
                // The single-parent argument.
                debug_assert!(min > enter_time && max < exit_time);
                debug_assert_eq!(self.graph.node(arg).parents.len(), 1);
                non_shared_args.push((signed, arg));
                continue;
            }
            debug_assert!(max > min);
            if min > enter_time && max < exit_time {
                modular_args.push((signed, arg));
            } else {
                non_modular_args.push((signed, arg));
            }
            min_time = min_time.min(min);
            max_time = max_time.max(max);
        }

        if min_time == enter_time && max_time == exit_time {
            debug!("Found original module: {}", gate);
            debug_assert_eq!(
                modular_args.len() + non_shared_args.len(),
                self.graph.gate(gate).num_args()
            );
            self.graph.gate_mut(gate).module = true;
        }

        let max_time = max_time.max(self.graph.node(gate).last_time());
        self.graph.gate_mut(gate).min_time = min_time;
        self.graph.gate_mut(gate).max_time = max_time;

        match self.graph.gate(gate).gate_type() {
            GateType::Nor | GateType::Or | GateType::Nand | GateType::And => {
                self.create_new_module(gate, &non_shared_args);

                self.filter_modular_args(&mut modular_args, &mut non_modular_args);
                debug_assert_ne!(modular_args.len(), 1); // A lone modular arg is non-shared.
                let mut groups = Vec::new();
                self.group_modular_args(&modular_args, &mut groups);
                self.create_new_modules(gate, &modular_args, &groups);
            }
            _ => {}
        }
    }

    /// Extracts the given arguments into a fresh module sub-gate of the
    /// parent's operator, unless they already are the whole gate.
    fn create_new_module(&mut self, gate: u32, args: &[(i32, u32)]) -> Option<u32> {
        if args.len() < 2 {
            return None;
        }
        if args.len() == self.graph.gate(gate).num_args() {
            debug_assert!(self.graph.gate(gate).is_module());
            return None;
        }
        let module_type = match self.graph.gate(gate).gate_type() {
            GateType::Nand | GateType::And => GateType::And,
            GateType::Nor | GateType::Or => GateType::Or,
            _ => return None, // Cannot create sub-modules for other types.
        };
        let module = self.graph.new_gate(module_type, 0);
        self.graph.gate_mut(module).module = true;
        self.graph.gate_mut(module).mark = true;
        for &(signed, _) in args {
            self.graph.transfer_arg(gate, signed, module);
        }
        self.graph.insert_arg(gate, module as i32);
        debug_assert!(self.graph.gate(gate).num_args() > 1);
        debug!(
            "Created a new module for gate {}: gate {} with {} arguments",
            gate,
            module,
            args.len()
        );
        Some(module)
    }

    /// Removes from the modular set any argument whose visit interval
    /// overlaps a non-modular one, to a fixpoint.
    fn filter_modular_args(
        &self,
        modular_args: &mut Vec<(i32, u32)>,
        non_modular_args: &mut Vec<(i32, u32)>,
    ) {
        if modular_args.is_empty() || non_modular_args.is_empty() {
            return;
        }
        let mut frontier: Vec<(i32, u32)> = non_modular_args.clone();
        loop {
            let mut newly_non_modular = Vec::new();
            modular_args.retain(|&(signed, node)| {
                let min = self.graph.node(node).min_time();
                let max = self.graph.node(node).max_time();
                let overlaps = frontier.iter().any(|&(_, other)| {
                    let lower = self.graph.node(other).min_time();
                    let upper = self.graph.node(other).max_time();
                    min.max(lower) <= max.min(upper)
                });
                if overlaps {
                    newly_non_modular.push((signed, node));
                }
                !overlaps
            });
            if newly_non_modular.is_empty() {
                break;
            }
            non_modular_args.extend(newly_non_modular.iter().copied());
            frontier = newly_non_modular;
        }
    }

    /// Partitions modular arguments into overlap-connected groups by
    /// visit-interval overlap.
    fn group_modular_args(
        &self,
        modular_args: &[(i32, u32)],
        groups: &mut Vec<Vec<(i32, u32)>>,
    ) {
        if modular_args.is_empty() {
            return;
        }
        debug_assert!(modular_args.len() > 1);
        let mut to_check: Vec<(i32, u32)> = modular_args.to_vec();
        while let Some(first_member) = to_check.pop() {
            let mut group = vec![first_member];
            let mut low = self.graph.node(first_member.1).min_time();
            let mut high = self.graph.node(first_member.1).max_time();

            let mut prev_size = 0;
            while prev_size < group.len() {
                prev_size = group.len();
                let mut next_check = Vec::new();
                for &(signed, node) in &to_check {
                    let min = self.graph.node(node).min_time();
                    let max = self.graph.node(node).max_time();
                    if min.max(low) <= max.min(high) {
                        // There's some overlap between the ranges.
                        group.push((signed, node));
                        low = low.min(min);
                        high = high.max(max);
                    } else {
                        next_check.push((signed, node));
                    }
                }
                to_check = next_check;
            }
            debug_assert!(group.len() > 1);
            groups.push(group);
        }
    }

    /// Extracts the shared-but-modular arguments into a sub-module per
    /// overlap group, under one main module when the gate keeps other
    /// arguments.
    fn create_new_modules(
        &mut self,
        gate: u32,
        modular_args: &[(i32, u32)],
        groups: &[Vec<(i32, u32)>],
    ) {
        if modular_args.is_empty() {
            return;
        }
        debug_assert!(modular_args.len() > 1);
        debug_assert!(!groups.is_empty());
        if modular_args.len() == self.graph.gate(gate).num_args() && groups.len() == 1 {
            debug_assert!(self.graph.gate(gate).is_module());
            return;
        }
        let main_arg = if modular_args.len() == self.graph.gate(gate).num_args() {
            debug_assert!(groups.len() > 1);
            debug_assert!(self.graph.gate(gate).is_module());
            gate
        } else {
            self.create_new_module(gate, modular_args)
                .expect("modular arguments must form a proper subset")
        };
        for group in groups {
            self.create_new_module(main_arg, group);
        }
    }
}

// Scratch clearing. These are part of the pass contract: every pass
// that reads marks, visit times, or optimization values clears them
// first.
impl Preprocessor<'_> {
    fn clear_gate_marks(&mut self) {
        self.clear_gate_marks_from(self.graph.root());
    }

    fn clear_gate_marks_from(&mut self, gate: u32) {
        if !self.graph.gate(gate).mark {
            return;
        }
        self.graph.gate_mut(gate).mark = false;
        let gate_args: Vec<i32> = self.graph.gate(gate).gate_args().iter().copied().collect();
        for signed in gate_args {
            self.clear_gate_marks_from(signed.unsigned_abs());
        }
    }

    fn clear_node_visits(&mut self) {
        let mut visited = HashSet::new();
        self.clear_node_visits_from(self.graph.root(), &mut visited);
    }

    fn clear_node_visits_from(&mut self, gate: u32, visited: &mut HashSet<u32>) {
        if !visited.insert(gate) {
            return;
        }
        self.graph.node_mut(gate).clear_visits();
        let args: Vec<i32> = self.graph.gate(gate).args().iter().copied().collect();
        for signed in args {
            let arg = signed.unsigned_abs();
            if self.graph.is_gate(arg) {
                self.clear_node_visits_from(arg, visited);
            } else {
                self.graph.node_mut(arg).clear_visits();
            }
        }
    }

    fn clear_opti_values(&mut self, gate: u32) {
        let mut visited = HashSet::new();
        self.clear_opti_values_from(gate, &mut visited);
    }

    fn clear_opti_values_from(&mut self, gate: u32, visited: &mut HashSet<u32>) {
        if !visited.insert(gate) {
            return;
        }
        self.graph.node_mut(gate).opti_value = 0;
        self.graph.gate_mut(gate).failed_args = 0;
        debug_assert!(self.graph.gate(gate).constant_args().is_empty());
        let args: Vec<i32> = self.graph.gate(gate).args().iter().copied().collect();
        for signed in args {
            let arg = signed.unsigned_abs();
            if self.graph.is_gate(arg) {
                self.clear_opti_values_from(arg, visited);
            } else {
                self.graph.node_mut(arg).opti_value = 0;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::{FaultTree, GateState, GateType};

    use test_log::test;

    /// A stable structural snapshot: (index, type, signed args) of all
    /// gates reachable from the root, in index order.
    fn structure(tree: &FaultTree) -> Vec<(u32, GateType, Vec<i32>)> {
        let mut result = Vec::new();
        let mut stack = vec![tree.root()];
        let mut seen = std::collections::HashSet::new();
        while let Some(gate) = stack.pop() {
            if !seen.insert(gate) {
                continue;
            }
            let g = tree.gate(gate);
            result.push((gate, g.gate_type(), g.args().iter().copied().collect()));
            for &signed in g.gate_args() {
                stack.push(signed.unsigned_abs());
            }
        }
        result.sort();
        result
    }

    #[test]
    fn test_constant_true_in_and() {
        let mut tree = FaultTree::new();
        let v1 = tree.add_variable();
        let k = tree.add_constant(true);
        let root = tree.add_gate(GateType::And);
        tree.add_arg(root, v1 as i32).unwrap();
        tree.add_arg(root, k as i32).unwrap();
        tree.set_root(root);

        Preprocessor::new(&mut tree).process();

        let root = tree.root();
        assert_eq!(tree.gate(root).gate_type(), GateType::Null);
        assert_eq!(tree.gate(root).args().len(), 1);
        assert!(tree.gate(root).args().contains(&(v1 as i32)));
        assert!(!tree.constants());
    }

    #[test]
    fn test_constant_false_in_and_nullifies() {
        let mut tree = FaultTree::new();
        let v1 = tree.add_variable();
        let k = tree.add_constant(false);
        let root = tree.add_gate(GateType::And);
        tree.add_arg(root, v1 as i32).unwrap();
        tree.add_arg(root, k as i32).unwrap();
        tree.set_root(root);

        Preprocessor::new(&mut tree).process();

        assert_eq!(tree.gate(tree.root()).state(), GateState::Null);
    }

    #[test]
    fn test_constant_cascades_to_unity_root() {
        // OR(v1, AND(v2, NOT false)) with the constant feeding a NOT:
        // NOT(false) = true, AND(v2, true) = v2, root = OR(v1, v2).
        let mut tree = FaultTree::new();
        let v1 = tree.add_variable();
        let v2 = tree.add_variable();
        let k = tree.add_constant(false);
        let not = tree.add_gate(GateType::Not);
        let and = tree.add_gate(GateType::And);
        let root = tree.add_gate(GateType::Or);
        tree.add_arg(not, k as i32).unwrap();
        tree.add_arg(and, v2 as i32).unwrap();
        tree.add_arg(and, not as i32).unwrap();
        tree.add_arg(root, v1 as i32).unwrap();
        tree.add_arg(root, and as i32).unwrap();
        tree.set_root(root);

        Preprocessor::new(&mut tree).process();

        let root = tree.root();
        assert_eq!(tree.gate(root).gate_type(), GateType::Or);
        let args: Vec<i32> = tree.gate(root).args().iter().copied().collect();
        assert_eq!(args, vec![v1 as i32, v2 as i32]);
    }

    #[test]
    fn test_xor_normalization_structure() {
        let mut tree = FaultTree::new();
        let v1 = tree.add_variable();
        let v2 = tree.add_variable();
        let root = tree.add_gate(GateType::Xor);
        tree.add_arg(root, v1 as i32).unwrap();
        tree.add_arg(root, v2 as i32).unwrap();
        tree.set_root(root);

        Preprocessor::new(&mut tree).process();

        let root = tree.root();
        assert_eq!(tree.gate(root).gate_type(), GateType::Or);
        assert_eq!(tree.gate(root).gate_args().len(), 2);
        for &signed in tree.gate(root).gate_args() {
            assert!(signed > 0);
            let child = tree.gate(signed.unsigned_abs());
            assert_eq!(child.gate_type(), GateType::And);
            let args: Vec<i32> = child.args().iter().copied().collect();
            assert!(
                args == vec![-(v2 as i32), v1 as i32] || args == vec![-(v1 as i32), v2 as i32],
                "unexpected XOR expansion arguments: {:?}",
                args
            );
        }
    }

    #[test]
    fn test_nor_root_absorbed_into_complemented_children() {
        // NOR(v1, v2) = AND(~v1, ~v2) after sign absorption.
        let mut tree = FaultTree::new();
        let v1 = tree.add_variable();
        let v2 = tree.add_variable();
        let root = tree.add_gate(GateType::Nor);
        tree.add_arg(root, v1 as i32).unwrap();
        tree.add_arg(root, v2 as i32).unwrap();
        tree.set_root(root);

        Preprocessor::new(&mut tree).process();

        let root = tree.root();
        assert_eq!(tree.gate(root).gate_type(), GateType::And);
        let args: Vec<i32> = tree.gate(root).args().iter().copied().collect();
        assert_eq!(args, vec![-(v2 as i32), -(v1 as i32)]);
    }

    #[test]
    fn test_complement_propagation_rewrites_sole_child_in_place() {
        // AND(v1, ~OR(v2, v3)) -> AND(v1, AND(~v2, ~v3)), coalesced to
        // AND(v1, ~v2, ~v3).
        let mut tree = FaultTree::new();
        let v1 = tree.add_variable();
        let v2 = tree.add_variable();
        let v3 = tree.add_variable();
        let or = tree.add_gate(GateType::Or);
        let root = tree.add_gate(GateType::And);
        tree.add_arg(or, v2 as i32).unwrap();
        tree.add_arg(or, v3 as i32).unwrap();
        tree.add_arg(root, v1 as i32).unwrap();
        tree.add_arg(root, -(or as i32)).unwrap();
        tree.set_root(root);

        Preprocessor::new(&mut tree).process();

        let root = tree.root();
        assert_eq!(tree.gate(root).gate_type(), GateType::And);
        let args: Vec<i32> = tree.gate(root).args().iter().copied().collect();
        assert_eq!(args, vec![-(v3 as i32), -(v2 as i32), v1 as i32]);
    }

    #[test]
    fn test_multiple_definitions_are_merged() {
        // OR(AND(v1, v2), AND(v1, v2), v3): the two ANDs are one.
        let mut tree = FaultTree::new();
        let v1 = tree.add_variable();
        let v2 = tree.add_variable();
        let v3 = tree.add_variable();
        let and_one = tree.add_gate(GateType::And);
        let and_two = tree.add_gate(GateType::And);
        let root = tree.add_gate(GateType::Or);
        tree.add_arg(and_one, v1 as i32).unwrap();
        tree.add_arg(and_one, v2 as i32).unwrap();
        tree.add_arg(and_two, v1 as i32).unwrap();
        tree.add_arg(and_two, v2 as i32).unwrap();
        tree.add_arg(root, and_one as i32).unwrap();
        tree.add_arg(root, and_two as i32).unwrap();
        tree.add_arg(root, v3 as i32).unwrap();
        tree.set_root(root);

        Preprocessor::new(&mut tree).process();

        let root = tree.root();
        assert_eq!(tree.gate(root).num_args(), 2);
        assert_eq!(tree.gate(root).gate_args().len(), 1);
    }

    #[test]
    fn test_coalescing_flattens_nested_same_type() {
        let mut tree = FaultTree::new();
        let v1 = tree.add_variable();
        let v2 = tree.add_variable();
        let v3 = tree.add_variable();
        let inner = tree.add_gate(GateType::And);
        let root = tree.add_gate(GateType::And);
        tree.add_arg(inner, v1 as i32).unwrap();
        tree.add_arg(inner, v2 as i32).unwrap();
        tree.add_arg(root, inner as i32).unwrap();
        tree.add_arg(root, v3 as i32).unwrap();
        tree.set_root(root);

        Preprocessor::new(&mut tree).process();

        let root = tree.root();
        assert_eq!(tree.gate(root).gate_type(), GateType::And);
        let args: Vec<i32> = tree.gate(root).args().iter().copied().collect();
        assert_eq!(args, vec![v1 as i32, v2 as i32, v3 as i32]);
    }

    #[test]
    fn test_boolean_optimization_removes_subsumed_branch() {
        // OR(v1, AND(v1, v2)): the AND branch is redundant.
        let mut tree = FaultTree::new();
        let v1 = tree.add_variable();
        let v2 = tree.add_variable();
        let and = tree.add_gate(GateType::And);
        let root = tree.add_gate(GateType::Or);
        tree.add_arg(and, v1 as i32).unwrap();
        tree.add_arg(and, v2 as i32).unwrap();
        tree.add_arg(root, v1 as i32).unwrap();
        tree.add_arg(root, and as i32).unwrap();
        tree.set_root(root);

        Preprocessor::new(&mut tree).process();

        let root = tree.root();
        assert_eq!(tree.gate(root).gate_type(), GateType::Null);
        let args: Vec<i32> = tree.gate(root).args().iter().copied().collect();
        assert_eq!(args, vec![v1 as i32]);
    }

    #[test]
    fn test_atleast_normalization_covers_all_pairs() {
        let mut tree = FaultTree::new();
        let v1 = tree.add_variable();
        let v2 = tree.add_variable();
        let v3 = tree.add_variable();
        let root = tree.add_atleast_gate(2).unwrap();
        tree.add_arg(root, v1 as i32).unwrap();
        tree.add_arg(root, v2 as i32).unwrap();
        tree.add_arg(root, v3 as i32).unwrap();
        tree.set_root(root);
        tree.validate().unwrap();

        Preprocessor::new(&mut tree).process();

        // No ATLEAST, XOR, NOT, or negative-type gate survives.
        for (_, gate_type, args) in structure(&tree) {
            assert!(
                matches!(gate_type, GateType::And | GateType::Or),
                "unexpected {:?} gate after preprocessing",
                gate_type
            );
            assert!(args.len() >= 2);
            assert!(args.iter().all(|&a| a > 0));
        }
    }

    #[test]
    fn test_module_detection_tags_independent_subtrees() {
        // AND(OR(v1, v2), OR(v3, v4)): both ORs are modules.
        let mut tree = FaultTree::new();
        let v1 = tree.add_variable();
        let v2 = tree.add_variable();
        let v3 = tree.add_variable();
        let v4 = tree.add_variable();
        let or_one = tree.add_gate(GateType::Or);
        let or_two = tree.add_gate(GateType::Or);
        let root = tree.add_gate(GateType::And);
        tree.add_arg(or_one, v1 as i32).unwrap();
        tree.add_arg(or_one, v2 as i32).unwrap();
        tree.add_arg(or_two, v3 as i32).unwrap();
        tree.add_arg(or_two, v4 as i32).unwrap();
        tree.add_arg(root, or_one as i32).unwrap();
        tree.add_arg(root, or_two as i32).unwrap();
        tree.set_root(root);

        Preprocessor::new(&mut tree).process();

        assert!(tree.gate(tree.root()).is_module());
        assert!(tree.gate(or_one).is_module());
        assert!(tree.gate(or_two).is_module());
    }

    #[test]
    fn test_shared_variable_blocks_module() {
        // AND(OR(v1, v2), OR(v2, v3)): v2 is shared, neither OR is
        // independent, so no child module appears.
        let mut tree = FaultTree::new();
        let v1 = tree.add_variable();
        let v2 = tree.add_variable();
        let v3 = tree.add_variable();
        let or_one = tree.add_gate(GateType::Or);
        let or_two = tree.add_gate(GateType::Or);
        let root = tree.add_gate(GateType::And);
        tree.add_arg(or_one, v1 as i32).unwrap();
        tree.add_arg(or_one, v2 as i32).unwrap();
        tree.add_arg(or_two, v2 as i32).unwrap();
        tree.add_arg(or_two, v3 as i32).unwrap();
        tree.add_arg(root, or_one as i32).unwrap();
        tree.add_arg(root, or_two as i32).unwrap();
        tree.set_root(root);

        Preprocessor::new(&mut tree).process();

        assert!(tree.gate(tree.root()).is_module());
        assert!(!tree.gate(or_one).is_module());
        assert!(!tree.gate(or_two).is_module());
    }

    #[test]
    fn test_preprocessing_is_idempotent() {
        let mut tree = FaultTree::new();
        let v1 = tree.add_variable();
        let v2 = tree.add_variable();
        let v3 = tree.add_variable();
        let or = tree.add_gate(GateType::Or);
        let root = tree.add_atleast_gate(2).unwrap();
        tree.add_arg(or, v1 as i32).unwrap();
        tree.add_arg(or, v2 as i32).unwrap();
        tree.add_arg(root, or as i32).unwrap();
        tree.add_arg(root, v2 as i32).unwrap();
        tree.add_arg(root, v3 as i32).unwrap();
        tree.set_root(root);

        Preprocessor::new(&mut tree).process();
        let first = structure(&tree);
        Preprocessor::new(&mut tree).process();
        let second = structure(&tree);
        assert_eq!(first, second);
    }

    #[test]
    fn test_tautology_becomes_unity_root() {
        let mut tree = FaultTree::new();
        let k = tree.add_constant(true);
        let v1 = tree.add_variable();
        let root = tree.add_gate(GateType::Or);
        tree.add_arg(root, k as i32).unwrap();
        tree.add_arg(root, v1 as i32).unwrap();
        tree.set_root(root);

        Preprocessor::new(&mut tree).process();

        assert_eq!(tree.gate(tree.root()).state(), GateState::Unity);
        assert!(tree.gate(tree.root()).args().is_empty());
    }
}
