//! # cutset-rs: Minimal Cut Sets for Static Fault Trees
//!
//! **`cutset-rs`** is the analytical core of a probabilistic risk
//! assessment engine: it simplifies a logically well-formed fault tree
//! into a canonical indexed Boolean graph and extracts the minimal cut
//! sets (minimal combinations of basic-event failures that trigger the
//! top event) with a Zero-Suppressed Binary Decision Diagram.
//!
//! ## How it works
//!
//! 1. A builder hands the core an indexed Boolean graph of logic gates
//!    over basic events ([`FaultTree`][crate::graph::FaultTree]).
//! 2. The [`Preprocessor`][crate::preprocessor::Preprocessor] rewrites
//!    the graph in place: constants and complements are propagated,
//!    XOR/voting operators are expanded, duplicate definitions are
//!    collapsed, redundant branches are optimized away, and independent
//!    modules are tagged for separate analysis.
//! 3. The [`Zbdd`][crate::zbdd::Zbdd] engine builds a set family from
//!    the canonical graph, either directly or through a reduced ordered
//!    [`Bdd`][crate::bdd::Bdd] with complement edges, then minimizes it
//!    and enumerates the cut sets under a caller-supplied size limit.
//!
//! ## Basic Usage
//!
//! ```rust
//! use cutset_rs::graph::{FaultTree, GateType};
//! use cutset_rs::preprocessor::Preprocessor;
//! use cutset_rs::settings::Settings;
//! use cutset_rs::zbdd::Zbdd;
//!
//! // Top event: motor fails AND (no power OR no cooling).
//! let mut tree = FaultTree::new();
//! let motor = tree.add_variable();
//! let power = tree.add_variable();
//! let cooling = tree.add_variable();
//! let or = tree.add_gate(GateType::Or);
//! let top = tree.add_gate(GateType::And);
//! tree.add_arg(or, power as i32).unwrap();
//! tree.add_arg(or, cooling as i32).unwrap();
//! tree.add_arg(top, motor as i32).unwrap();
//! tree.add_arg(top, or as i32).unwrap();
//! tree.set_root(top);
//! tree.validate().unwrap();
//!
//! Preprocessor::new(&mut tree).process();
//!
//! let mut zbdd = Zbdd::from_graph(&tree, &Settings::default());
//! zbdd.analyze();
//!
//! let mut cut_sets: Vec<_> = zbdd.cut_sets().to_vec();
//! cut_sets.sort();
//! assert_eq!(cut_sets, vec![
//!     vec![motor as i32, power as i32],
//!     vec![motor as i32, cooling as i32],
//! ]);
//! ```
//!
//! ## Scope
//!
//! Model input (XML parsing, validation), probability numerics,
//! common-cause models, event trees, and reporting are collaborators
//! outside this crate: they hand over a validated graph and consume
//! the enumerated cut sets.

pub mod bdd;
pub mod cache;
pub mod dot;
pub mod error;
pub mod graph;
pub mod preprocessor;
pub mod reference;
pub mod settings;
pub mod storage;
pub mod utils;
pub mod zbdd;
