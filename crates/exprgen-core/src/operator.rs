//! Operator definitions and the registry that owns them.
//!
//! Operators are registered once during setup and shared read-only
//! afterwards. Tokens hold an `Arc<Operator>` handed out by the registry,
//! so the registry and every sequence built from it refer to the same
//! operator instance. That matters for [`Kernel::Stateful`] operators:
//! their memory lives in the instance, not in the sequence.

use std::collections::{BTreeMap, HashMap, VecDeque};
use std::fmt;
use std::sync::Arc;

use indexmap::IndexMap;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

use crate::error::RegistryError;
use crate::token::Value;

/// Operator category.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Category {
    /// Cross-sectional: no memory across evaluations.
    #[serde(rename = "CS")]
    CrossSection,
    /// Time-series: consumes a preceding delta-time operand and may
    /// carry memory across evaluations.
    #[serde(rename = "TS")]
    TimeSeries,
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Category::CrossSection => f.write_str("CS"),
            Category::TimeSeries => f.write_str("TS"),
        }
    }
}

/// Pure operator transform. Receives exactly `arity` arguments.
pub type Transform = Arc<dyn Fn(&[Value]) -> Value + Send + Sync>;

/// Resettable memory behind a stateful operator.
pub trait Memory: Send {
    /// Apply the operator to `args`, updating the memory.
    fn step(&mut self, args: &[Value]) -> Value;

    /// Forget everything seen so far.
    fn reset(&mut self);
}

/// The executable part of an operator.
pub enum Kernel {
    /// Pure function of its arguments.
    Stateless(Transform),
    /// Function with memory. Calls are serialized through the lock, but
    /// results still depend on call order: use one operator instance per
    /// independent evaluation stream, or reset between streams.
    Stateful(Mutex<Box<dyn Memory>>),
}

impl Kernel {
    /// Wrap a pure function.
    pub fn stateless<F>(f: F) -> Self
    where
        F: Fn(&[Value]) -> Value + Send + Sync + 'static,
    {
        Kernel::Stateless(Arc::new(f))
    }

    /// Wrap a memory.
    pub fn stateful<M: Memory + 'static>(memory: M) -> Self {
        Kernel::Stateful(Mutex::new(Box::new(memory)))
    }
}

impl fmt::Debug for Kernel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Kernel::Stateless(_) => f.write_str("Stateless"),
            Kernel::Stateful(_) => f.write_str("Stateful"),
        }
    }
}

/// A named, arity-tagged, category-tagged transform.
#[derive(Debug)]
pub struct Operator {
    name: String,
    category: Category,
    arity: usize,
    kernel: Kernel,
}

impl Operator {
    /// Create an operator outside any registry.
    ///
    /// Sequence builders only accept operators handed out by their own
    /// registry; use [`Registry::register`] for those.
    pub fn new(name: impl Into<String>, category: Category, arity: usize, kernel: Kernel) -> Self {
        Self {
            name: name.into(),
            category,
            arity,
            kernel,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn category(&self) -> Category {
        self.category
    }

    /// Number of values this operator pops from the stack.
    pub fn arity(&self) -> usize {
        self.arity
    }

    /// Number of generic operands this operator consumes.
    ///
    /// For time-series operators the last argument is the lag supplied
    /// by the preceding delta-time token, so it is excluded here. This
    /// is the arity that legality bounds are compared against.
    pub fn operand_arity(&self) -> usize {
        match self.category {
            Category::CrossSection => self.arity,
            Category::TimeSeries => self.arity.saturating_sub(1),
        }
    }

    pub fn is_stateful(&self) -> bool {
        matches!(self.kernel, Kernel::Stateful(_))
    }

    /// Apply the transform to exactly `arity` arguments.
    pub fn apply(&self, args: &[Value]) -> Value {
        debug_assert_eq!(args.len(), self.arity, "arity mismatch for {}", self.name);
        match &self.kernel {
            Kernel::Stateless(f) => (**f)(args),
            Kernel::Stateful(memory) => memory.lock().step(args),
        }
    }

    /// Clear the memory of a stateful operator. No-op for stateless ones.
    pub fn reset(&self) {
        if let Kernel::Stateful(memory) = &self.kernel {
            memory.lock().reset();
        }
    }
}

impl PartialEq for Operator {
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name && self.category == other.category && self.arity == other.arity
    }
}

impl fmt::Display for Operator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name)
    }
}

/// Bounded lag memory: returns the value seen `lag` steps ago.
///
/// Starts out filled with `fill`, so the first `lag` calls return it.
/// Only the first argument is remembered; any further arguments (the
/// delta-time operand) are ignored.
#[derive(Debug, Clone)]
pub struct LagBuffer {
    lag: usize,
    fill: Value,
    queue: VecDeque<Value>,
}

impl LagBuffer {
    pub fn new(lag: usize, fill: Value) -> Self {
        let mut buffer = Self {
            lag,
            fill,
            queue: VecDeque::with_capacity(lag + 1),
        };
        buffer.reset();
        buffer
    }
}

impl Memory for LagBuffer {
    fn step(&mut self, args: &[Value]) -> Value {
        let Some(&value) = args.first() else {
            return self.fill;
        };
        self.queue.push_back(value);
        self.queue.pop_front().unwrap_or(value)
    }

    fn reset(&mut self) {
        self.queue.clear();
        self.queue.extend(std::iter::repeat(self.fill).take(self.lag));
    }
}

/// Registry of operators, indexed by name and by (category, arity).
///
/// Built once during setup and read-only afterwards. Registration takes
/// `&mut self`, so concurrent reads during registration are ruled out by
/// the borrow checker; share a finished registry behind `&` or `Arc`.
#[derive(Debug, Default)]
pub struct Registry {
    operators: IndexMap<String, Arc<Operator>>,
    /// Names per (category, arity), in registration order.
    classes: HashMap<(Category, usize), Vec<String>>,
}

impl Registry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an operator.
    ///
    /// # Errors
    ///
    /// Returns an error if the name is taken or the arity is zero.
    pub fn register(
        &mut self,
        name: impl Into<String>,
        category: Category,
        arity: usize,
        kernel: Kernel,
    ) -> Result<Arc<Operator>, RegistryError> {
        let name = name.into();
        if arity == 0 {
            return Err(RegistryError::ZeroArity(name));
        }
        if self.operators.contains_key(&name) {
            return Err(RegistryError::DuplicateOperator(name));
        }

        tracing::debug!(operator = %name, %category, arity, "registering operator");

        Ok(self.insert(Operator::new(name, category, arity, kernel)))
    }

    /// Register a pure function.
    pub fn register_fn<F>(
        &mut self,
        name: impl Into<String>,
        category: Category,
        arity: usize,
        f: F,
    ) -> Result<Arc<Operator>, RegistryError>
    where
        F: Fn(&[Value]) -> Value + Send + Sync + 'static,
    {
        self.register(name, category, arity, Kernel::stateless(f))
    }

    /// Look up an operator by name.
    pub fn lookup(&self, name: &str) -> Result<Arc<Operator>, RegistryError> {
        self.operators
            .get(name)
            .cloned()
            .ok_or_else(|| RegistryError::UnknownOperator(name.to_string()))
    }

    pub fn get(&self, name: &str) -> Option<&Arc<Operator>> {
        self.operators.get(name)
    }

    /// Check whether `operator` is the very instance registered here.
    pub fn contains(&self, operator: &Arc<Operator>) -> bool {
        self.operators
            .get(operator.name())
            .is_some_and(|registered| Arc::ptr_eq(registered, operator))
    }

    /// Names registered under (category, arity).
    pub fn names(&self, category: Category, arity: usize) -> &[String] {
        self.classes
            .get(&(category, arity))
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// Names of one category, in registration order.
    pub fn names_in(&self, category: Category) -> Vec<&str> {
        self.operators
            .values()
            .filter(|op| op.category() == category)
            .map(|op| op.name())
            .collect()
    }

    /// Names of one category grouped by arity.
    pub fn arity_groups(&self, category: Category) -> BTreeMap<usize, Vec<&str>> {
        let mut groups: BTreeMap<usize, Vec<&str>> = BTreeMap::new();
        for op in self.operators.values().filter(|op| op.category() == category) {
            groups.entry(op.arity()).or_default().push(op.name());
        }
        groups
    }

    /// Largest arity of any registered operator, 0 when empty.
    pub fn max_arity(&self) -> usize {
        self.operators
            .values()
            .map(|op| op.arity())
            .max()
            .unwrap_or(0)
    }

    /// Iterate over operators in registration order.
    pub fn iter(&self) -> impl Iterator<Item = &Arc<Operator>> {
        self.operators.values()
    }

    pub fn len(&self) -> usize {
        self.operators.len()
    }

    pub fn is_empty(&self) -> bool {
        self.operators.is_empty()
    }

    /// Reset the memory of every stateful operator.
    pub fn reset_state(&self) {
        for op in self.operators.values() {
            op.reset();
        }
    }

    /// Registry with `+ - * /` (CS, arity 2) and `neg` (CS, arity 1).
    pub fn arithmetic() -> Self {
        let mut registry = Self::new();
        let binary: [(&str, fn(Value, Value) -> Value); 4] = [
            ("+", |a, b| a + b),
            ("-", |a, b| a - b),
            ("*", |a, b| a * b),
            ("/", |a, b| a / b),
        ];
        for (name, f) in binary {
            registry.insert(Operator::new(
                name,
                Category::CrossSection,
                2,
                Kernel::stateless(move |args| f(args[0], args[1])),
            ));
        }
        registry.insert(Operator::new(
            "neg",
            Category::CrossSection,
            1,
            Kernel::stateless(|args| -args[0]),
        ));
        registry
    }

    /// Insert without checks; callers guarantee a fresh name.
    fn insert(&mut self, operator: Operator) -> Arc<Operator> {
        let name = operator.name().to_string();
        let operator = Arc::new(operator);
        self.classes
            .entry((operator.category(), operator.arity()))
            .or_default()
            .push(name.clone());
        self.operators.insert(name, Arc::clone(&operator));
        operator
    }
}
