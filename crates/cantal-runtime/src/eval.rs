use cantal_core::{BinaryOp, CantalError, Expr, Register, UnaryOp, Value};

/// Something an expression can read by name.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Reference<'a> {
    Register(&'a Register),
    Symbol(&'a str),
}

/// Lookups an expression needs while it is evaluated.
pub trait EvalContext {
    fn constant(&self, name: &str) -> Option<Value>;

    /// Reads a register or a non-constant symbol. A miss yields [`Value::Absent`].
    fn resolve_value(&mut self, reference: Reference<'_>) -> Value;

    fn call_value_function(&mut self, name: &str, args: &[Value]) -> Result<Value, CantalError>;
}

pub fn evaluate(expr: &Expr, ctx: &mut dyn EvalContext) -> Result<Value, CantalError> {
    match expr {
        Expr::Literal { value } => Ok(value.clone()),
        Expr::Symbol { name } => match ctx.constant(name) {
            Some(value) => Ok(value),
            None => Ok(ctx.resolve_value(Reference::Symbol(name))),
        },
        Expr::Register { register } => Ok(ctx.resolve_value(Reference::Register(register))),
        Expr::Call { name, args } => {
            let values = evaluate_all(args, ctx)?;
            ctx.call_value_function(name, &values)
        }
        Expr::Unary { op, operand } => {
            let value = evaluate(operand, ctx)?;
            apply_unary(*op, value)
        }
        Expr::Binary { op, lhs, rhs } => {
            // Both operands are always evaluated, `&&` and `||` included.
            let left = evaluate(lhs, ctx)?;
            let right = evaluate(rhs, ctx)?;
            apply_binary(*op, left, right)
        }
        Expr::Ternary {
            condition,
            then_expr,
            else_expr,
        } => {
            if evaluate(condition, ctx)?.is_truthy() {
                evaluate(then_expr, ctx)
            } else {
                evaluate(else_expr, ctx)
            }
        }
    }
}

pub(crate) fn evaluate_all(args: &[Expr], ctx: &mut dyn EvalContext) -> Result<Vec<Value>, CantalError> {
    args.iter().map(|arg| evaluate(arg, ctx)).collect()
}

fn apply_unary(op: UnaryOp, value: Value) -> Result<Value, CantalError> {
    match op {
        UnaryOp::Not => Ok(Value::Bool(!value.is_truthy())),
        UnaryOp::Negate => match value {
            Value::Int(number) => number
                .checked_neg()
                .map(Value::Int)
                .ok_or_else(|| overflow("-")),
            other => Err(CantalError::TypeMismatch {
                op: "-".to_string(),
                left: other.type_name(),
                right: other.type_name(),
            }),
        },
    }
}

fn apply_binary(op: BinaryOp, left: Value, right: Value) -> Result<Value, CantalError> {
    match op {
        BinaryOp::Add => {
            if matches!(left, Value::String(_)) || matches!(right, Value::String(_)) {
                return Ok(Value::String(format!("{}{}", left.to_text(), right.to_text())));
            }
            integer_op(op, &left, &right, i64::checked_add)
        }
        BinaryOp::Subtract => integer_op(op, &left, &right, i64::checked_sub),
        BinaryOp::Multiply => integer_op(op, &left, &right, i64::checked_mul),
        BinaryOp::Divide => {
            if right == Value::Int(0) && matches!(left, Value::Int(_)) {
                return Err(CantalError::DivisionByZero);
            }
            // Rust integer division already truncates toward zero.
            integer_op(op, &left, &right, i64::checked_div)
        }
        BinaryOp::Equal => Ok(Value::Bool(left == right)),
        BinaryOp::NotEqual => Ok(Value::Bool(left != right)),
        BinaryOp::Less => compare(op, &left, &right, |a, b| a < b),
        BinaryOp::LessEqual => compare(op, &left, &right, |a, b| a <= b),
        BinaryOp::Greater => compare(op, &left, &right, |a, b| a > b),
        BinaryOp::GreaterEqual => compare(op, &left, &right, |a, b| a >= b),
        BinaryOp::And => Ok(Value::Bool(left.is_truthy() && right.is_truthy())),
        BinaryOp::Or => Ok(Value::Bool(left.is_truthy() || right.is_truthy())),
    }
}

fn integer_op(
    op: BinaryOp,
    left: &Value,
    right: &Value,
    apply: impl Fn(i64, i64) -> Option<i64>,
) -> Result<Value, CantalError> {
    match (left, right) {
        (Value::Int(a), Value::Int(b)) => apply(*a, *b)
            .map(Value::Int)
            .ok_or_else(|| overflow(op.symbol())),
        _ => Err(mismatch(op, left, right)),
    }
}

fn compare(
    op: BinaryOp,
    left: &Value,
    right: &Value,
    apply: impl Fn(i64, i64) -> bool,
) -> Result<Value, CantalError> {
    match (left, right) {
        (Value::Int(a), Value::Int(b)) => Ok(Value::Bool(apply(*a, *b))),
        _ => Err(mismatch(op, left, right)),
    }
}

fn mismatch(op: BinaryOp, left: &Value, right: &Value) -> CantalError {
    CantalError::TypeMismatch {
        op: op.symbol().to_string(),
        left: left.type_name(),
        right: right.type_name(),
    }
}

fn overflow(op: &str) -> CantalError {
    CantalError::TypeMismatch {
        op: op.to_string(),
        left: "int",
        right: "overflowing int",
    }
}
