//! Generator pool: stateful value generators composed into a shared graph.
//!
//! Every generator lives in a [`Pool`] and is addressed by a copyable
//! [`GenId`]. Composite generators refer to their children by id, so the same
//! child can sit inside a tuple and also be used as a standalone argument.
//! Each generator caches its last value until it is regenerated again; when a
//! child is regenerated twice in one cycle, the last value wins everywhere.
//!
//! Bound and length generators are only read by their parents, never
//! regenerated, so they must appear earlier in the caller's regeneration
//! order.

use crate::data::Source;
use crate::error::{GTesterError, Result};
use crate::value::Value;
use rand::seq::SliceRandom;
use rand::Rng;
use std::fmt;

/// Handle to a generator inside a [`Pool`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct GenId(pub usize);

impl fmt::Display for GenId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Post-processing applied to a generated sequence.
pub type Transform = Box<dyn Fn(Vec<Value>) -> Value>;

/// User supplied leaf generator.
pub type CustomFn = Box<dyn FnMut(&mut Source) -> Value>;

/// How a fixed-length string is produced.
pub enum StringMode {
    /// Regenerate a character generator `length` times and join the pieces.
    Chars {
        char_gen: GenId,
        length: GenId,
        delimiter: String,
    },
    /// A random permutation of every character of `base`.
    Shuffle { base: Vec<char> },
    /// `length` characters drawn with replacement from `alphabet`.
    Sample {
        alphabet: Vec<char>,
        length: GenId,
        delimiter: String,
    },
}

/// Options for sequence generators.
pub struct SequenceOptions {
    shuffle: bool,
    transform: Option<Transform>,
}

impl Default for SequenceOptions {
    fn default() -> Self {
        SequenceOptions {
            shuffle: true,
            transform: None,
        }
    }
}

impl SequenceOptions {
    /// Keep elements in the order they were generated.
    pub fn keep_order(mut self) -> Self {
        self.shuffle = false;
        self
    }

    /// Post-process the collected elements.
    pub fn map<F>(mut self, f: F) -> Self
    where
        F: Fn(Vec<Value>) -> Value + 'static,
    {
        self.transform = Some(Box::new(f));
        self
    }
}

enum Kind {
    Constant,
    BoundedInt { low: GenId, high: GenId },
    Character { alphabet: Vec<char> },
    FixedString(StringMode),
    Sequence {
        element: GenId,
        length: GenId,
        options: SequenceOptions,
    },
    Tuple(Vec<GenId>),
    Custom(CustomFn),
}

impl Kind {
    fn name(&self) -> &'static str {
        match self {
            Kind::Constant => "constant",
            Kind::BoundedInt { .. } => "int",
            Kind::Character { .. } => "char",
            Kind::FixedString(StringMode::Chars { .. }) => "string",
            Kind::FixedString(StringMode::Shuffle { .. }) => "shuffled string",
            Kind::FixedString(StringMode::Sample { .. }) => "sampled string",
            Kind::Sequence { .. } => "sequence",
            Kind::Tuple(_) => "tuple",
            Kind::Custom(_) => "custom",
        }
    }
}

struct Node {
    kind: Kind,
    value: Option<Value>,
}

/// Arena owning a graph of generators.
///
/// Children must be created before their parents, which keeps the graph
/// acyclic: a parent may only refer to ids smaller than its own.
#[derive(Default)]
pub struct Pool {
    nodes: Vec<Node>,
}

impl Pool {
    /// Create an empty pool.
    pub fn new() -> Self {
        Pool { nodes: Vec::new() }
    }

    /// Number of generators, including the constants created for fixed bounds.
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// Whether no generator has been created.
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    fn push(&mut self, kind: Kind, value: Option<Value>) -> GenId {
        self.nodes.push(Node { kind, value });
        GenId(self.nodes.len() - 1)
    }

    /// A generator that always holds `value`.
    pub fn constant(&mut self, value: impl Into<Value>) -> GenId {
        self.push(Kind::Constant, Some(value.into()))
    }

    /// Uniform integer in `[low, high]`, with bounds read from other generators.
    pub fn int(&mut self, low: GenId, high: GenId) -> GenId {
        self.push(Kind::BoundedInt { low, high }, None)
    }

    /// Uniform integer in the fixed range `[low, high]`.
    pub fn int_range(&mut self, low: i64, high: i64) -> GenId {
        let low = self.constant(low);
        let high = self.constant(high);
        self.int(low, high)
    }

    /// Uniform integer in `[1, high]`.
    pub fn positive_int(&mut self, high: GenId) -> GenId {
        let one = self.constant(1);
        self.int(one, high)
    }

    /// One character drawn from `alphabet`.
    pub fn char_from(&mut self, alphabet: &str) -> GenId {
        self.push(
            Kind::Character {
                alphabet: alphabet.chars().collect(),
            },
            None,
        )
    }

    /// Fixed-length string produced according to `mode`.
    pub fn string(&mut self, mode: StringMode) -> GenId {
        self.push(Kind::FixedString(mode), None)
    }

    /// `length` regenerations of `char_gen`, joined with `delimiter`.
    pub fn string_of(&mut self, char_gen: GenId, length: GenId, delimiter: &str) -> GenId {
        self.string(StringMode::Chars {
            char_gen,
            length,
            delimiter: delimiter.to_string(),
        })
    }

    /// A random permutation of `base`.
    pub fn shuffled(&mut self, base: &str) -> GenId {
        self.string(StringMode::Shuffle {
            base: base.chars().collect(),
        })
    }

    /// `length` characters sampled with replacement from `alphabet`.
    pub fn sampled(&mut self, alphabet: &str, length: GenId, delimiter: &str) -> GenId {
        self.string(StringMode::Sample {
            alphabet: alphabet.chars().collect(),
            length,
            delimiter: delimiter.to_string(),
        })
    }

    /// `length` independently regenerated elements in shuffled order.
    pub fn sequence(&mut self, element: GenId, length: GenId) -> GenId {
        self.sequence_with(element, length, SequenceOptions::default())
    }

    /// `length` regenerations of `element`, ordered and transformed per `options`.
    pub fn sequence_with(
        &mut self,
        element: GenId,
        length: GenId,
        options: SequenceOptions,
    ) -> GenId {
        self.push(
            Kind::Sequence {
                element,
                length,
                options,
            },
            None,
        )
    }

    /// Fixed-arity tuple of heterogeneous generators.
    pub fn tuple(&mut self, elements: Vec<GenId>) -> GenId {
        self.push(Kind::Tuple(elements), None)
    }

    /// Leaf generator backed by a closure.
    pub fn from_fn<F>(&mut self, f: F) -> GenId
    where
        F: FnMut(&mut Source) -> Value + 'static,
    {
        self.push(Kind::Custom(Box::new(f)), None)
    }

    /// Short name of the generator variant.
    pub fn kind_name(&self, id: GenId) -> Result<&'static str> {
        Ok(self.node(id)?.kind.name())
    }

    /// The last generated value.
    pub fn value(&self, id: GenId) -> Result<&Value> {
        self.node(id)?
            .value
            .as_ref()
            .ok_or(GTesterError::Ungenerated { id })
    }

    /// Current values of several generators, in order.
    pub fn values(&self, ids: &[GenId]) -> Result<Vec<Value>> {
        ids.iter().map(|&id| self.value(id).cloned()).collect()
    }

    /// Regenerate every generator in `order`, in order.
    pub fn regenerate_all(&mut self, order: &[GenId], source: &mut Source) -> Result<()> {
        for &id in order {
            self.regenerate(id, source)?;
        }
        Ok(())
    }

    /// Produce a new value for `id` and cache it.
    pub fn regenerate(&mut self, id: GenId, source: &mut Source) -> Result<()> {
        let node = self.node_mut(id)?;
        if matches!(node.kind, Kind::Constant) {
            return Ok(());
        }

        // Children have smaller ids, so taking the kind out cannot be observed
        // by the recursive calls below.
        let mut kind = std::mem::replace(&mut node.kind, Kind::Constant);
        let produced = self.produce(id, &mut kind, source);
        let node = &mut self.nodes[id.0];
        node.kind = kind;
        node.value = Some(produced?);
        Ok(())
    }

    fn produce(&mut self, id: GenId, kind: &mut Kind, source: &mut Source) -> Result<Value> {
        match kind {
            Kind::Constant => self.value(id).cloned(),
            Kind::BoundedInt { low, high } => {
                let low = self.int_of(id, *low)?;
                let high = self.int_of(id, *high)?;
                if low > high {
                    return Err(GTesterError::InvalidBounds { low, high });
                }
                Ok(Value::Int(source.gen_range(low..=high)))
            }
            Kind::Character { alphabet } => {
                let c = alphabet.choose(source).ok_or(GTesterError::EmptyAlphabet)?;
                Ok(Value::from(*c))
            }
            Kind::FixedString(StringMode::Chars {
                char_gen,
                length,
                delimiter,
            }) => {
                let length = self.length_of(id, *length)?;
                let char_gen = self.child(id, *char_gen)?;
                let mut pieces = buffer(length)?;
                for _ in 0..length {
                    self.regenerate(char_gen, source)?;
                    pieces.push(self.value(char_gen)?.as_text()?.to_string());
                }
                Ok(Value::Text(pieces.join(delimiter.as_str())))
            }
            Kind::FixedString(StringMode::Shuffle { base }) => {
                let mut chars = base.clone();
                chars.shuffle(source);
                Ok(Value::Text(chars.into_iter().collect()))
            }
            Kind::FixedString(StringMode::Sample {
                alphabet,
                length,
                delimiter,
            }) => {
                let length = self.length_of(id, *length)?;
                let mut pieces = buffer(length)?;
                for _ in 0..length {
                    let c = alphabet.choose(source).ok_or(GTesterError::EmptyAlphabet)?;
                    pieces.push(c.to_string());
                }
                Ok(Value::Text(pieces.join(delimiter.as_str())))
            }
            Kind::Sequence {
                element,
                length,
                options,
            } => {
                let length = self.length_of(id, *length)?;
                let element = self.child(id, *element)?;
                let mut items = buffer(length)?;
                for _ in 0..length {
                    self.regenerate(element, source)?;
                    items.push(self.value(element)?.clone());
                }
                if options.shuffle {
                    items.shuffle(source);
                }
                Ok(match &options.transform {
                    Some(transform) => transform(items),
                    None => Value::Seq(items),
                })
            }
            Kind::Tuple(elements) => {
                let mut items = Vec::with_capacity(elements.len());
                for &element in elements.iter() {
                    let element = self.child(id, element)?;
                    self.regenerate(element, source)?;
                    items.push(self.value(element)?.clone());
                }
                Ok(Value::Tuple(items))
            }
            Kind::Custom(f) => Ok(f(source)),
        }
    }

    fn node(&self, id: GenId) -> Result<&Node> {
        self.nodes
            .get(id.0)
            .ok_or(GTesterError::UnknownGenerator { id })
    }

    fn node_mut(&mut self, id: GenId) -> Result<&mut Node> {
        self.nodes
            .get_mut(id.0)
            .ok_or(GTesterError::UnknownGenerator { id })
    }

    /// A dependency of `parent` must have been created before it.
    fn child(&self, parent: GenId, child: GenId) -> Result<GenId> {
        if child < parent {
            Ok(child)
        } else {
            Err(GTesterError::UnknownGenerator { id: child })
        }
    }

    fn int_of(&self, parent: GenId, id: GenId) -> Result<i64> {
        self.value(self.child(parent, id)?)?.as_int()
    }

    fn length_of(&self, parent: GenId, id: GenId) -> Result<usize> {
        let length = self.int_of(parent, id)?;
        usize::try_from(length).map_err(|_| GTesterError::InvalidLength { length })
    }
}

/// Storage for `length` generated parts, or `InvalidLength` when it cannot be allocated.
fn buffer<T>(length: usize) -> Result<Vec<T>> {
    let mut items = Vec::new();
    items
        .try_reserve_exact(length)
        .map_err(|_| GTesterError::InvalidLength {
            length: i64::try_from(length).unwrap_or(i64::MAX),
        })?;
    Ok(items)
}
