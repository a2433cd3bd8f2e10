use std::collections::BTreeMap;

use crate::graph::{FaultTree, GateState, GateType};

impl FaultTree {
    /// Renders the Boolean graph in Graphviz dot format. Gates carry
    /// their operator label, variables are circles, and complemented
    /// edges are dashed. A diagnostic aid for inspecting preprocessing
    /// results.
    pub fn to_dot(&self) -> Result<String, std::fmt::Error> {
        use std::fmt::Write as _;

        let mut dot = String::new();
        writeln!(dot, "digraph fault_tree {{")?;
        writeln!(dot, "node [shape=box];")?;

        let mut variables = BTreeMap::new();
        let mut stack = vec![self.root()];
        let mut seen = std::collections::HashSet::new();
        while let Some(index) = stack.pop() {
            if !seen.insert(index) {
                continue;
            }
            let gate = self.gate(index);
            let label = match gate.state() {
                GateState::Null => "FALSE".to_string(),
                GateState::Unity => "TRUE".to_string(),
                GateState::Normal => match gate.gate_type() {
                    GateType::AtLeast => format!("ATLEAST {}/{}", gate.vote_number(), gate.num_args()),
                    other => format!("{:?}", other).to_uppercase(),
                },
            };
            if gate.is_module() {
                writeln!(dot, "{} [label=\"{}\", peripheries=2];", index, label)?;
            } else {
                writeln!(dot, "{} [label=\"{}\"];", index, label)?;
            }
            for &signed in gate.args() {
                let child = signed.unsigned_abs();
                if self.is_gate(child) {
                    stack.push(child);
                } else {
                    variables.insert(child, self.is_constant(child));
                }
                let style = if signed < 0 { " [style=dashed]" } else { "" };
                writeln!(dot, "{} -> {}{};", index, child, style)?;
            }
        }

        writeln!(dot, "{{ rank=sink")?;
        for (index, is_constant) in variables {
            if is_constant {
                let value = self.constant_value(index);
                writeln!(dot, "{} [shape=square, label=\"{}\"];", index, value)?;
            } else {
                writeln!(dot, "{} [shape=circle, label=\"e{}\"];", index, index)?;
            }
        }
        writeln!(dot, "}}")?;

        writeln!(dot, "}}")?;
        Ok(dot)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dot_lists_gates_and_edges() {
        let mut tree = FaultTree::new();
        let v1 = tree.add_variable();
        let v2 = tree.add_variable();
        let root = tree.add_gate(GateType::And);
        tree.add_arg(root, v1 as i32).unwrap();
        tree.add_arg(root, -(v2 as i32)).unwrap();
        tree.set_root(root);

        let dot = tree.to_dot().unwrap();
        assert!(dot.contains("digraph fault_tree"));
        assert!(dot.contains("label=\"AND\""));
        assert!(dot.contains(&format!("{} -> {};", root, v1)));
        assert!(dot.contains(&format!("{} -> {} [style=dashed];", root, v2)));
    }
}
