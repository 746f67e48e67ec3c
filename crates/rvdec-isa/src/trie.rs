//! The layered dispatch trie: opcode word → factory.
//!
//! The root is a match-list composite over the 16-bit `family` field with
//! one arm per RISC-V encoding length. Below it, one composite level per
//! opcode field dispatches on that field's value. Composites are built
//! sparse and densified after construction when well occupied.
//!
//! Two things make sibling forms with different opcode-field sets
//! coexist: an instruction that does not constrain an existing selector
//! field lands in that composite's *default* child, and lookup backtracks
//! to the default child when the exact-value child has no answer for the
//! word.

use std::fmt;
use std::sync::Arc;

use rustc_hash::FxHashMap;

use crate::error::{DecodeError, Result};
use crate::factory::{Factory, FactoryInfo};
use crate::field::Field;
use crate::form::FAMILY;
use crate::Opcode;

/// Occupancy ratio above which a sparse composite is densified.
const DENSE_THRESHOLD: f64 = 0.125;

/// Widest field a dense table is built for.
const DENSE_MAX_WIDTH: u32 = 8;

type LengthPredicate = fn(u64) -> bool;

#[derive(Debug)]
pub(crate) struct MatchArm<A> {
    label: &'static str,
    pred: LengthPredicate,
    child: Option<Box<Node<A>>>,
}

/// One node of the decode trie.
#[derive(Debug)]
pub(crate) enum Node<A> {
    /// Jump table indexed by a field's value.
    Dense {
        field: Field,
        children: Vec<Option<Box<Node<A>>>>,
        default: Option<Box<Node<A>>>,
    },
    /// Associative table on a field's value.
    Sparse {
        field: Field,
        children: FxHashMap<u64, Node<A>>,
        default: Option<Box<Node<A>>>,
    },
    /// Ordered predicate list; the first true predicate selects a child.
    MatchList {
        field: Field,
        arms: Vec<MatchArm<A>>,
    },
    Leaf(Arc<Factory<A>>),
}

impl<A> Node<A> {
    /// The trie root: the encoding-length selector.
    pub(crate) fn length_selector() -> Self {
        let arms: Vec<MatchArm<A>> = vec![
            MatchArm {
                label: "16-bit",
                pred: |w| (w & 0x3) != 0x3,
                child: None,
            },
            MatchArm {
                label: "32-bit",
                pred: |w| (w & 0x3) == 0x3 && (w & 0x1c) != 0x1c,
                child: None,
            },
            MatchArm {
                label: "48-bit",
                pred: |w| (w & 0x3f) == 0x1f,
                child: None,
            },
            MatchArm {
                label: "64-bit",
                pred: |w| (w & 0x7f) == 0x3f,
                child: None,
            },
            MatchArm {
                label: "80+16n-bit",
                pred: |w| (w & 0x7f) == 0x7f && (w & 0x7000) != 0x7000,
                child: None,
            },
            MatchArm {
                label: "192-bit",
                pred: |w| (w & 0x707f) == 0x707f,
                child: None,
            },
        ];
        Node::MatchList {
            field: FAMILY,
            arms,
        }
    }

    /// Install a factory under this node.
    ///
    /// `remaining` holds the factory's not-yet-consumed opcode fields with
    /// their stencil values, in deterministic order (bit-width descending,
    /// ties by lsb ascending). An existing composite's selector is
    /// honoured out of order when the factory constrains it.
    pub(crate) fn insert(
        &mut self,
        remaining: &mut Vec<(Field, u64)>,
        factory: Arc<Factory<A>>,
    ) -> Result<()> {
        match self {
            Node::MatchList { field, arms } => {
                let family = field.extract(factory.stencil());
                for arm in arms.iter_mut() {
                    if (arm.pred)(family) {
                        return match arm.child.as_mut() {
                            Some(child) => child.insert(remaining, factory),
                            None => {
                                arm.child = Some(Box::new(build_chain(remaining, factory)));
                                Ok(())
                            }
                        };
                    }
                }
                Err(DecodeError::BadStencil {
                    mnemonic: factory.mnemonic().to_string(),
                    stencil: factory.stencil(),
                })
            }
            Node::Leaf(existing) => {
                if remaining.is_empty() {
                    return Err(DecodeError::AmbiguousOpcode {
                        mnemonic: factory.mnemonic().to_string(),
                        existing: existing.mnemonic().to_string(),
                    });
                }
                // Split: the established leaf does not constrain the next
                // field, so it becomes the default child.
                let (field, _) = remaining[0];
                let old = std::mem::replace(
                    self,
                    Node::Sparse {
                        field,
                        children: FxHashMap::default(),
                        default: None,
                    },
                );
                if let Node::Sparse { default, .. } = self {
                    *default = Some(Box::new(old));
                }
                self.insert(remaining, factory)
            }
            Node::Sparse {
                field,
                children,
                default,
            } => {
                let pos = remaining.iter().position(|(f, _)| *f == *field);
                match pos {
                    Some(pos) => {
                        let (_, value) = remaining.remove(pos);
                        match children.get_mut(&value) {
                            Some(child) => child.insert(remaining, factory),
                            None => {
                                children.insert(value, build_chain(remaining, factory));
                                Ok(())
                            }
                        }
                    }
                    None => match default.as_mut() {
                        Some(child) => child.insert(remaining, factory),
                        None => {
                            *default = Some(Box::new(build_chain(remaining, factory)));
                            Ok(())
                        }
                    },
                }
            }
            Node::Dense { .. } => {
                // Densification runs after construction; nothing inserts
                // into a dense node.
                Err(DecodeError::AmbiguousOpcode {
                    mnemonic: factory.mnemonic().to_string(),
                    existing: "<finalized trie>".to_string(),
                })
            }
        }
    }

    /// Descend by successive field selection; `None` means the word fell
    /// off an edge.
    pub(crate) fn get_info(&self, opcode: Opcode) -> Option<Arc<FactoryInfo<A>>> {
        match self {
            Node::Leaf(factory) => Some(factory.get_info(opcode)),
            Node::MatchList { field, arms } => {
                let family = field.extract(opcode);
                arms.iter()
                    .find(|arm| (arm.pred)(family))
                    .and_then(|arm| arm.child.as_ref())
                    .and_then(|child| child.get_info(opcode))
            }
            Node::Sparse {
                field,
                children,
                default,
            } => {
                let value = field.extract(opcode);
                if let Some(child) = children.get(&value) {
                    if let Some(info) = child.get_info(opcode) {
                        return Some(info);
                    }
                }
                default.as_ref().and_then(|child| child.get_info(opcode))
            }
            Node::Dense {
                field,
                children,
                default,
            } => {
                let value = field.extract(opcode) as usize;
                if let Some(Some(child)) = children.get(value) {
                    if let Some(info) = child.get_info(opcode) {
                        return Some(info);
                    }
                }
                default.as_ref().and_then(|child| child.get_info(opcode))
            }
        }
    }

    /// Convert well-occupied sparse composites to jump tables.
    pub(crate) fn finalize(&mut self) {
        match self {
            Node::Leaf(_) => {}
            Node::MatchList { arms, .. } => {
                for arm in arms.iter_mut() {
                    if let Some(child) = arm.child.as_mut() {
                        child.finalize();
                    }
                }
            }
            Node::Dense {
                children, default, ..
            } => {
                for child in children.iter_mut().flatten() {
                    child.finalize();
                }
                if let Some(child) = default.as_mut() {
                    child.finalize();
                }
            }
            Node::Sparse {
                field,
                children,
                default,
            } => {
                for child in children.values_mut() {
                    child.finalize();
                }
                if let Some(child) = default.as_mut() {
                    child.finalize();
                }
                let range = 1usize << field.width;
                let occupancy = children.len() as f64 / range as f64;
                if field.width <= DENSE_MAX_WIDTH && occupancy >= DENSE_THRESHOLD {
                    let field = *field;
                    let children = std::mem::take(children);
                    let default = default.take();
                    let mut table: Vec<Option<Box<Node<A>>>> = Vec::with_capacity(range);
                    table.resize_with(range, || None);
                    for (value, child) in children {
                        table[value as usize] = Some(Box::new(child));
                    }
                    *self = Node::Dense {
                        field,
                        children: table,
                        default,
                    };
                }
            }
        }
    }

    /// Drop any internal memoization. Composites hold none today; the
    /// recursion is kept so node-local caches stay flushable.
    pub(crate) fn flush_caches(&mut self) {
        match self {
            Node::Leaf(_) => {}
            Node::MatchList { arms, .. } => {
                for arm in arms.iter_mut() {
                    if let Some(child) = arm.child.as_mut() {
                        child.flush_caches();
                    }
                }
            }
            Node::Sparse {
                children, default, ..
            } => {
                for child in children.values_mut() {
                    child.flush_caches();
                }
                if let Some(child) = default.as_mut() {
                    child.flush_caches();
                }
            }
            Node::Dense {
                children, default, ..
            } => {
                for child in children.iter_mut().flatten() {
                    child.flush_caches();
                }
                if let Some(child) = default.as_mut() {
                    child.flush_caches();
                }
            }
        }
    }

    fn print(&self, f: &mut fmt::Formatter<'_>, indent: usize) -> fmt::Result {
        let pad = "  ".repeat(indent);
        match self {
            Node::Leaf(factory) => writeln!(
                f,
                "{pad}{} (stencil {:#x})",
                factory.mnemonic(),
                factory.stencil()
            ),
            Node::MatchList { field, arms } => {
                writeln!(f, "{pad}match-list on {field}:")?;
                for arm in arms {
                    if let Some(child) = arm.child.as_ref() {
                        writeln!(f, "{pad}  [{}]", arm.label)?;
                        child.print(f, indent + 2)?;
                    }
                }
                Ok(())
            }
            Node::Sparse {
                field,
                children,
                default,
            } => {
                writeln!(f, "{pad}sparse on {field}:")?;
                let mut values: Vec<_> = children.keys().copied().collect();
                values.sort_unstable();
                for value in values {
                    writeln!(f, "{pad}  [{value:#x}]")?;
                    children[&value].print(f, indent + 2)?;
                }
                if let Some(child) = default {
                    writeln!(f, "{pad}  [default]")?;
                    child.print(f, indent + 2)?;
                }
                Ok(())
            }
            Node::Dense {
                field,
                children,
                default,
            } => {
                writeln!(f, "{pad}dense on {field}:")?;
                for (value, child) in children.iter().enumerate() {
                    if let Some(child) = child {
                        writeln!(f, "{pad}  [{value:#x}]")?;
                        child.print(f, indent + 2)?;
                    }
                }
                if let Some(child) = default {
                    writeln!(f, "{pad}  [default]")?;
                    child.print(f, indent + 2)?;
                }
                Ok(())
            }
        }
    }
}

/// Build a fresh chain of single-child composites ending in a leaf.
fn build_chain<A>(remaining: &mut Vec<(Field, u64)>, factory: Arc<Factory<A>>) -> Node<A> {
    if remaining.is_empty() {
        return Node::Leaf(factory);
    }
    let (field, value) = remaining.remove(0);
    let mut children = FxHashMap::default();
    children.insert(value, build_chain(remaining, factory));
    Node::Sparse {
        field,
        children,
        default: None,
    }
}

/// Deterministic opcode-field ordering: bit-width descending, ties by lsb
/// ascending.
pub(crate) fn order_fields(fields: &[Field]) -> Vec<Field> {
    let mut ordered = fields.to_vec();
    ordered.sort_by(|a, b| b.width.cmp(&a.width).then(a.lsb.cmp(&b.lsb)));
    ordered
}

impl<A> fmt::Display for Node<A> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.print(f, 0)
    }
}
