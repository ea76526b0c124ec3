//! Binary operator evaluation.
//!
//! Direct dispatch on the operand pair. Ints and floats mix by widening the
//! int; `+` also concatenates strings and lists. Equality is defined for every
//! pair of values, ordering only for numbers and strings.

use std::cmp::Ordering;
use std::sync::Arc;

use robo_ir::errors::{integer_overflow, invalid_operands};
use robo_ir::{BinaryOp, RobotResult, Value};

pub fn evaluate_binary(left: &Value, right: &Value, op: BinaryOp) -> RobotResult<Value> {
    match op {
        BinaryOp::Equal => return Ok(Value::Bool(values_equal(left, right))),
        BinaryOp::NotEqual => return Ok(Value::Bool(!values_equal(left, right))),
        _ => {}
    }

    match (left, right) {
        (Value::Int(a), Value::Int(b)) => eval_int(*a, *b, op),
        (Value::Str(a), Value::Str(b)) => eval_str(a, b, op)
            .ok_or_else(|| invalid_operands(op, left.type_name(), right.type_name())),
        (Value::List(a), Value::List(b)) if op == BinaryOp::Add => {
            let mut items = Vec::with_capacity(a.len() + b.len());
            items.extend(a.iter().cloned());
            items.extend(b.iter().cloned());
            Ok(Value::list(items))
        }
        _ => match (left.as_number(), right.as_number()) {
            (Some(a), Some(b)) => Ok(eval_float(a, b, op)),
            _ => Err(invalid_operands(op, left.type_name(), right.type_name())),
        },
    }
}

fn eval_int(a: i64, b: i64, op: BinaryOp) -> RobotResult<Value> {
    let checked = |result: Option<i64>| result.map(Value::Int).ok_or_else(|| integer_overflow(op));
    match op {
        BinaryOp::Add => checked(a.checked_add(b)),
        BinaryOp::Subtract => checked(a.checked_sub(b)),
        BinaryOp::Multiply => checked(a.checked_mul(b)),
        _ => Ok(Value::Bool(compare(a.cmp(&b), op))),
    }
}

fn eval_float(a: f64, b: f64, op: BinaryOp) -> Value {
    match op {
        BinaryOp::Add => Value::Float(a + b),
        BinaryOp::Subtract => Value::Float(a - b),
        BinaryOp::Multiply => Value::Float(a * b),
        _ => Value::Bool(a.partial_cmp(&b).is_some_and(|ord| compare(ord, op))),
    }
}

fn eval_str(a: &Arc<str>, b: &Arc<str>, op: BinaryOp) -> Option<Value> {
    match op {
        BinaryOp::Add => Some(Value::string(format!("{a}{b}"))),
        BinaryOp::Subtract | BinaryOp::Multiply => None,
        _ => Some(Value::Bool(compare(a.cmp(b), op))),
    }
}

fn compare(ordering: Ordering, op: BinaryOp) -> bool {
    match op {
        BinaryOp::Less => ordering.is_lt(),
        BinaryOp::LessEqual => ordering.is_le(),
        BinaryOp::Greater => ordering.is_gt(),
        BinaryOp::GreaterEqual => ordering.is_ge(),
        BinaryOp::Equal => ordering.is_eq(),
        BinaryOp::NotEqual => ordering.is_ne(),
        BinaryOp::Add | BinaryOp::Subtract | BinaryOp::Multiply => false,
    }
}

/// Structural equality; ints and floats compare numerically.
#[allow(clippy::float_cmp, reason = "robot equality is exact")]
fn values_equal(left: &Value, right: &Value) -> bool {
    match (left, right) {
        (Value::Int(_), Value::Float(_)) | (Value::Float(_), Value::Int(_)) => {
            left.as_number() == right.as_number()
        }
        _ => left == right,
    }
}
