//! Fixed-geometry head/tail (Karva) expressions.
//!
//! A Karva expression is a flat gene list of exactly
//! `head_length + tail_length` tokens, where
//! `tail_length = head_length * (max_arity - 1) + 1`. Operators may only
//! appear in the head, which guarantees the tail holds enough terminals
//! to close every subtree the head opens.
//!
//! Trees are built depth-first: an operator gene immediately consumes
//! the genes that follow as its `arity` subtrees, left to right. So
//! `+ - * a b c d` reads as `((a * b) - c) + d`, not as the level-order
//! `(a - b) + (c * d)` of classic gene expression programming.

use std::fmt;
use std::sync::Arc;

use crate::error::{EvalError, KarvaError};
use crate::eval::{Payload, RenderStyle};
use crate::operator::{Operator, Registry};
use crate::token::{Bindings, Token, Value};

/// Expression tree.
#[derive(Debug, Clone, PartialEq)]
pub enum ExprTree {
    /// Terminal: constant, delta time or feature.
    Leaf(Token),
    /// Operator applied to `arity` subtrees.
    Node {
        op: Arc<Operator>,
        children: Vec<ExprTree>,
    },
}

impl ExprTree {
    /// Postorder fold: children first, then the operator.
    pub fn fold<P: Payload>(&self, ctx: &P::Context) -> Result<P, EvalError> {
        match self {
            ExprTree::Leaf(token) => P::operand(token, ctx),
            ExprTree::Node { op, children } => {
                let args = children
                    .iter()
                    .map(|child| child.fold(ctx))
                    .collect::<Result<Vec<P>, _>>()?;
                P::apply(op, args, ctx)
            }
        }
    }

    /// Evaluate against `bindings`.
    pub fn evaluate(&self, bindings: &Bindings) -> Result<Value, EvalError> {
        self.fold::<Value>(bindings)
    }

    /// Render as nested applications.
    pub fn render(&self, style: RenderStyle) -> String {
        match self {
            ExprTree::Leaf(token) => token.to_string(),
            ExprTree::Node { op, children } => {
                let args: Vec<String> = children.iter().map(|c| c.render(style)).collect();
                style.apply(op.name(), &args)
            }
        }
    }

    /// Number of nodes, leaves included.
    pub fn size(&self) -> usize {
        match self {
            ExprTree::Leaf(_) => 1,
            ExprTree::Node { children, .. } => {
                1 + children.iter().map(ExprTree::size).sum::<usize>()
            }
        }
    }

    /// Longest root-to-leaf path, counted in nodes.
    pub fn depth(&self) -> usize {
        match self {
            ExprTree::Leaf(_) => 1,
            ExprTree::Node { children, .. } => {
                1 + children.iter().map(ExprTree::depth).max().unwrap_or(0)
            }
        }
    }
}

impl fmt::Display for ExprTree {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.render(RenderStyle::Functional))
    }
}

/// Tail length for a head of `head_length` genes.
pub fn tail_length(head_length: usize, max_arity: usize) -> usize {
    head_length * max_arity.saturating_sub(1) + 1
}

/// A head/tail gene list over a registry.
#[derive(Debug, Clone)]
pub struct KarvaExpression<'r> {
    registry: &'r Registry,
    head_length: usize,
    tail_length: usize,
    genes: Vec<Token>,
}

impl<'r> KarvaExpression<'r> {
    /// Create an expression; the genes are checked by [`validate`](Self::validate).
    ///
    /// # Errors
    ///
    /// Returns an error if `head_length` is zero or the registry is empty.
    pub fn new(
        registry: &'r Registry,
        head_length: usize,
        genes: Vec<Token>,
    ) -> Result<Self, KarvaError> {
        if head_length == 0 {
            return Err(KarvaError::ZeroHeadLength);
        }
        if registry.is_empty() {
            return Err(KarvaError::EmptyRegistry);
        }
        Ok(Self {
            registry,
            head_length,
            tail_length: tail_length(head_length, registry.max_arity()),
            genes,
        })
    }

    pub fn head_length(&self) -> usize {
        self.head_length
    }

    pub fn tail_length(&self) -> usize {
        self.tail_length
    }

    /// Required number of genes.
    pub fn total_length(&self) -> usize {
        self.head_length + self.tail_length
    }

    pub fn genes(&self) -> &[Token] {
        &self.genes
    }

    /// Check geometry and gene placement.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - The gene count differs from `head_length + tail_length`
    /// - A marker appears anywhere
    /// - An operator appears at or after `head_length`
    /// - An operator is not from this expression's registry
    pub fn validate(&self) -> Result<(), KarvaError> {
        if self.genes.len() != self.total_length() {
            return Err(KarvaError::InvalidLength {
                expected: self.total_length(),
                actual: self.genes.len(),
            });
        }
        for (index, gene) in self.genes.iter().enumerate() {
            match gene {
                Token::Marker(_) => return Err(KarvaError::MarkerInExpression { index }),
                Token::Operator(_) if index >= self.head_length => {
                    return Err(KarvaError::NonTerminalInTail { index });
                }
                Token::Operator(op) if !self.registry.contains(op) => {
                    return Err(KarvaError::UnknownOperator(op.name().to_string()));
                }
                _ => {}
            }
        }
        Ok(())
    }

    /// Build the tree with a single forward cursor from gene 0.
    ///
    /// Genes left over once the root is closed are ignored, as in any
    /// Karva expression whose head does not use its full capacity.
    ///
    /// # Errors
    ///
    /// Returns an error if a marker is met or the genes run out.
    pub fn build_tree(&self) -> Result<ExprTree, KarvaError> {
        let (tree, _next) = build_subtree(&self.genes, 0)?;
        Ok(tree)
    }

    /// Validate, build and evaluate.
    pub fn evaluate(&self, bindings: &Bindings) -> Result<Value, KarvaError> {
        self.validate()?;
        Ok(self.build_tree()?.evaluate(bindings)?)
    }

    /// Validate, build and render.
    pub fn render(&self, style: RenderStyle) -> Result<String, KarvaError> {
        self.validate()?;
        Ok(self.build_tree()?.render(style))
    }
}

impl fmt::Display for KarvaExpression<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, gene) in self.genes.iter().enumerate() {
            match i {
                0 => {}
                i if i == self.head_length => f.write_str(" | ")?,
                _ => f.write_str(" ")?,
            }
            write!(f, "{gene}")?;
        }
        Ok(())
    }
}

/// Build the subtree rooted at `position`; returns it with the next cursor.
fn build_subtree(genes: &[Token], position: usize) -> Result<(ExprTree, usize), KarvaError> {
    let gene = genes
        .get(position)
        .ok_or(KarvaError::Truncated { position })?;
    let mut next = position + 1;

    match gene {
        Token::Operator(op) => {
            let mut children = Vec::with_capacity(op.arity());
            for _ in 0..op.arity() {
                let (child, after) = build_subtree(genes, next)?;
                children.push(child);
                next = after;
            }
            let op = Arc::clone(op);
            Ok((ExprTree::Node { op, children }, next))
        }
        Token::Constant(_) | Token::DeltaTime(_) | Token::Feature(_) => {
            Ok((ExprTree::Leaf(gene.clone()), next))
        }
        Token::Marker(_) => Err(KarvaError::MarkerInExpression { index: position }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::operator::{Category, Kernel, LagBuffer};
    use crate::token::{BEGIN, SEPARATOR};

    fn op(registry: &Registry, name: &str) -> Token {
        Token::operator(&registry.lookup(name).unwrap())
    }

    fn x() -> Token {
        Token::feature("x")
    }

    #[test]
    fn test_tail_length() {
        assert_eq!(tail_length(2, 2), 3);
        assert_eq!(tail_length(3, 3), 7);
        assert_eq!(tail_length(4, 1), 1);

        let registry = Registry::arithmetic();
        let expr = KarvaExpression::new(&registry, 2, vec![]).unwrap();
        assert_eq!(expr.tail_length(), 3);
        assert_eq!(expr.total_length(), 5);
    }

    #[test]
    fn test_neg_plus() {
        let r = Registry::arithmetic();
        let genes = vec![
            op(&r, "+"),
            op(&r, "neg"),
            x(),
            Token::Constant(2.2),
            Token::Constant(3.1),
        ];
        let expr = KarvaExpression::new(&r, 2, genes).unwrap();
        expr.validate().unwrap();

        assert_eq!(expr.render(RenderStyle::Functional).unwrap(), "+(neg($x), 2.2)");
        let bindings: Bindings = [("x".to_string(), 3.0)].into();
        let value = expr.evaluate(&bindings).unwrap();
        assert!((value - -0.8).abs() < 1e-12);
    }

    #[test]
    fn test_depth_first_construction() {
        let r = Registry::arithmetic();
        let [a, b, c, d] = ["a", "b", "c", "d"].map(Token::feature);
        let genes = vec![op(&r, "+"), op(&r, "-"), op(&r, "*"), a, b, c, d];
        let expr = KarvaExpression::new(&r, 3, genes).unwrap();
        expr.validate().unwrap();

        let tree = expr.build_tree().unwrap();
        assert_eq!(tree.render(RenderStyle::Infix), "((($a * $b) - $c) + $d)");
        assert_eq!(tree.to_string(), "+(-(*($a, $b), $c), $d)");
        assert_eq!(tree.depth(), 4);
        assert_eq!(tree.size(), 7);

        let bindings: Bindings = [("a", 2.0), ("b", 3.0), ("c", 1.0), ("d", 10.0)]
            .into_iter()
            .map(|(k, v)| (k.to_string(), v))
            .collect();
        assert_eq!(tree.evaluate(&bindings), Ok(15.0));
    }

    #[test]
    fn test_unused_head_capacity() {
        let r = Registry::arithmetic();
        // Root is a terminal; everything after it is ignored
        let genes = vec![x(), op(&r, "+"), Token::Constant(1.0), Token::Constant(2.0), x()];
        let expr = KarvaExpression::new(&r, 2, genes).unwrap();
        expr.validate().unwrap();
        assert_eq!(expr.build_tree().unwrap(), ExprTree::Leaf(x()));
    }

    #[test]
    fn test_invalid_length() {
        let r = Registry::arithmetic();
        let expr = KarvaExpression::new(&r, 2, vec![x(), x(), x(), x()]).unwrap();
        assert_eq!(
            expr.validate(),
            Err(KarvaError::InvalidLength {
                expected: 5,
                actual: 4
            })
        );

        let too_long = vec![x(); 7];
        let expr = KarvaExpression::new(&r, 2, too_long).unwrap();
        assert!(matches!(expr.validate(), Err(KarvaError::InvalidLength { .. })));
    }

    #[test]
    fn test_operator_in_tail() {
        let r = Registry::arithmetic();
        for index in 2..5 {
            let mut genes = vec![x(); 5];
            genes[index] = op(&r, "*");
            let expr = KarvaExpression::new(&r, 2, genes).unwrap();
            assert_eq!(expr.validate(), Err(KarvaError::NonTerminalInTail { index }));
        }
    }

    #[test]
    fn test_marker_rejected() {
        let r = Registry::arithmetic();
        let genes = vec![op(&r, "+"), BEGIN, x(), x(), SEPARATOR];
        let expr = KarvaExpression::new(&r, 2, genes).unwrap();
        assert_eq!(expr.validate(), Err(KarvaError::MarkerInExpression { index: 1 }));
    }

    #[test]
    fn test_truncated_tree() {
        let r = Registry::arithmetic();
        let genes = vec![op(&r, "+"), op(&r, "+"), x()];
        let expr = KarvaExpression::new(&r, 2, genes).unwrap();
        assert_eq!(expr.build_tree(), Err(KarvaError::Truncated { position: 3 }));
    }

    #[test]
    fn test_construction_errors() {
        let r = Registry::arithmetic();
        assert!(matches!(
            KarvaExpression::new(&r, 0, vec![]),
            Err(KarvaError::ZeroHeadLength)
        ));
        let empty = Registry::new();
        assert!(matches!(
            KarvaExpression::new(&empty, 2, vec![]),
            Err(KarvaError::EmptyRegistry)
        ));
    }

    #[test]
    fn test_evaluate_unbound_feature() {
        let r = Registry::arithmetic();
        let genes = vec![op(&r, "neg"), Token::feature("y"), x()];
        let expr = KarvaExpression::new(&r, 1, genes).unwrap();
        assert_eq!(
            expr.evaluate(&Bindings::new()),
            Err(KarvaError::Eval(EvalError::UnboundFeature("y".into())))
        );
    }

    #[test]
    fn test_stateful_operator_in_tree() {
        let mut r = Registry::arithmetic();
        r.register("ref", Category::TimeSeries, 2, Kernel::stateful(LagBuffer::new(1, 0.0)))
            .unwrap();
        // head 1, max arity 2 -> tail 2
        let genes = vec![op(&r, "ref"), x(), Token::DeltaTime(1)];
        let expr = KarvaExpression::new(&r, 1, genes).unwrap();

        let at = |v: Value| -> Bindings { [("x".to_string(), v)].into() };
        assert_eq!(expr.evaluate(&at(4.0)), Ok(0.0));
        assert_eq!(expr.evaluate(&at(5.0)), Ok(4.0));
    }

    #[test]
    fn test_display_marks_head() {
        let r = Registry::arithmetic();
        let genes = vec![op(&r, "+"), x(), x(), Token::Constant(1.0), x()];
        let expr = KarvaExpression::new(&r, 2, genes).unwrap();
        assert_eq!(expr.to_string(), "+ $x | $x 1.0 $x");
    }
}
