//! Compilation of expressions to numeric evaluators.
//!
//! Each expression is lowered to a postfix instruction tape over an ordered
//! list of input symbols. Evaluation is a tight stack machine with no
//! allocation beyond a reusable stack.

use crate::error::{ExprError, Result};
use crate::expr::{Expr, Func, Node, Symbol};

/// Compiled multi-output closure: maps input values to output values.
pub type CompiledFn = Box<dyn Fn(&[f64], &mut [f64]) + Send + Sync>;

#[derive(Debug, Clone, Copy)]
enum Op {
    Const(f64),
    Input(usize),
    Add(usize),
    Mul(usize),
    Pow,
    Powi(i32),
    Call(Func),
}

/// A single expression lowered to a postfix tape.
#[derive(Debug, Clone)]
pub struct CompiledExpr {
    ops: Vec<Op>,
    arity: usize,
    max_stack: usize,
}

impl CompiledExpr {
    /// Lower `expr` over the ordered `inputs`.
    ///
    /// Fails with [`ExprError::UnboundSymbol`] if the expression references a
    /// symbol that is not an input.
    pub fn new(expr: &Expr, inputs: &[Symbol]) -> Result<Self> {
        let mut ops = Vec::new();
        lower(expr, inputs, &mut ops)?;
        let max_stack = stack_depth(&ops);
        Ok(Self {
            ops,
            arity: inputs.len(),
            max_stack,
        })
    }

    /// Number of inputs expected by [`CompiledExpr::eval`].
    pub fn arity(&self) -> usize {
        self.arity
    }

    /// Evaluate at the given input values.
    pub fn eval(&self, inputs: &[f64]) -> f64 {
        let mut stack = Vec::with_capacity(self.max_stack);
        self.eval_with(inputs, &mut stack)
    }

    fn eval_with(&self, inputs: &[f64], stack: &mut Vec<f64>) -> f64 {
        assert_eq!(inputs.len(), self.arity);
        stack.clear();
        for op in &self.ops {
            match *op {
                Op::Const(c) => stack.push(c),
                Op::Input(i) => stack.push(inputs[i]),
                Op::Add(n) => {
                    let start = stack.len() - n;
                    let s: f64 = stack.drain(start..).sum();
                    stack.push(s);
                }
                Op::Mul(n) => {
                    let start = stack.len() - n;
                    let p: f64 = stack.drain(start..).product();
                    stack.push(p);
                }
                Op::Pow => {
                    let e = stack.pop().unwrap_or(f64::NAN);
                    let b = stack.pop().unwrap_or(f64::NAN);
                    stack.push(b.powf(e));
                }
                Op::Powi(k) => {
                    let b = stack.pop().unwrap_or(f64::NAN);
                    stack.push(b.powi(k));
                }
                Op::Call(func) => {
                    let a = stack.pop().unwrap_or(f64::NAN);
                    stack.push(func.eval(a));
                }
            }
        }
        stack.pop().unwrap_or(f64::NAN)
    }
}

fn lower(expr: &Expr, inputs: &[Symbol], ops: &mut Vec<Op>) -> Result<()> {
    match expr.node() {
        Node::Num(r) => {
            ops.push(Op::Const(*r.numer() as f64 / *r.denom() as f64));
        }
        Node::Sym(s) => {
            let idx = inputs
                .iter()
                .position(|input| input == s)
                .ok_or_else(|| ExprError::UnboundSymbol(s.to_string()))?;
            ops.push(Op::Input(idx));
        }
        Node::Add(terms) => {
            for t in terms {
                lower(t, inputs, ops)?;
            }
            ops.push(Op::Add(terms.len()));
        }
        Node::Mul(factors) => {
            for f in factors {
                lower(f, inputs, ops)?;
            }
            ops.push(Op::Mul(factors.len()));
        }
        Node::Pow(b, e) => {
            lower(b, inputs, ops)?;
            let small_int = e
                .as_number()
                .filter(|r| r.is_integer())
                .and_then(|r| i32::try_from(r.to_integer()).ok());
            match small_int {
                Some(k) => ops.push(Op::Powi(k)),
                None => {
                    lower(e, inputs, ops)?;
                    ops.push(Op::Pow);
                }
            }
        }
        Node::Call(func, arg) => {
            lower(arg, inputs, ops)?;
            ops.push(Op::Call(*func));
        }
    }
    Ok(())
}

fn stack_depth(ops: &[Op]) -> usize {
    let mut depth = 0usize;
    let mut max = 0usize;
    for op in ops {
        match *op {
            Op::Const(_) | Op::Input(_) => depth += 1,
            Op::Add(n) | Op::Mul(n) => depth = depth + 1 - n,
            Op::Pow => depth -= 1,
            Op::Powi(_) | Op::Call(_) => {}
        }
        max = max.max(depth);
    }
    max
}

/// Compile several expressions over the same inputs into one closure.
///
/// The closure writes `exprs.len()` outputs; `inputs` layout follows the
/// order of the `inputs` symbols.
pub fn compile_many(exprs: &[Expr], inputs: &[Symbol]) -> Result<CompiledFn> {
    let compiled = exprs
        .iter()
        .map(|e| CompiledExpr::new(e, inputs))
        .collect::<Result<Vec<_>>>()?;
    let max_stack = compiled.iter().map(|c| c.max_stack).max().unwrap_or(0);
    Ok(Box::new(move |values: &[f64], out: &mut [f64]| {
        assert_eq!(out.len(), compiled.len());
        let mut stack = Vec::with_capacity(max_stack);
        for (slot, c) in out.iter_mut().zip(&compiled) {
            *slot = c.eval_with(values, &mut stack);
        }
    }))
}

impl Expr {
    /// Evaluate numerically, binding `inputs[i]` to `values[i]`.
    pub fn eval(&self, inputs: &[Symbol], values: &[f64]) -> Result<f64> {
        let v = CompiledExpr::new(self, inputs)?.eval(values);
        if v.is_finite() {
            Ok(v)
        } else {
            Err(ExprError::NonFinite(self.to_string()))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_eval_polynomial() {
        let x = Symbol::new("x");
        let y = Symbol::new("y");
        let e = Expr::from(&x).powi(2) * Expr::from(&y) - Expr::rational(1, 2);
        let f = CompiledExpr::new(&e, &[x, y]).unwrap();
        assert_eq!(f.arity(), 2);
        assert_relative_eq!(f.eval(&[3.0, 2.0]), 17.5);
    }

    #[test]
    fn test_unbound_symbol() {
        let e = Expr::symbol("a") * Expr::symbol("x");
        let err = CompiledExpr::new(&e, &[Symbol::new("x")]).unwrap_err();
        assert_eq!(err, ExprError::UnboundSymbol("a".into()));
    }

    #[test]
    fn test_compile_many_layout() {
        let x = Symbol::new("x");
        let ex = Expr::from(&x);
        let f = compile_many(&[ex.sin(), ex.cos(), ex.exp()], &[x]).unwrap();
        let mut out = [0.0; 3];
        f(&[0.5], &mut out);
        assert_relative_eq!(out[0], 0.5_f64.sin());
        assert_relative_eq!(out[1], 0.5_f64.cos());
        assert_relative_eq!(out[2], 0.5_f64.exp());
    }

    #[test]
    fn test_eval_non_finite() {
        let x = Symbol::new("x");
        let e = Expr::from(&x).ln();
        assert!(matches!(e.eval(&[x], &[-1.0]), Err(ExprError::NonFinite(_))));
    }
}
