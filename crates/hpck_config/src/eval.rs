//! Expression evaluation against a namespace of variables.
//!
//! The namespace holds a `vars` object and one object per module, keyed by
//! module ID. Module outputs are not known until deployment, so they are bound
//! to [`Value::Unknown`]; anything computed from an unknown is unknown.
//! [`settle`] then puts the original expression text back wherever the
//! result stayed unknown. Escaped `\$(` in literal text stays escaped, so an
//! evaluated value can be evaluated again.

use indexmap::IndexMap;

use crate::error::{ConfigError, ConfigResult};
use crate::expression::{escape_literal, parse_template, BinaryOp, Expr, Segment, UnaryOp};
use crate::functions::{primitive_string, FunctionTable};
use crate::hint::hint_spelling;
use crate::reference::{Reference, Scope};
use crate::value::{Dict, Marked, Value};

/// Variables and functions visible to an evaluation.
#[derive(Debug, Clone)]
pub struct EvalContext<'f> {
    variables: IndexMap<String, Value>,
    functions: &'f FunctionTable,
}

impl<'f> EvalContext<'f> {
    pub fn new(functions: &'f FunctionTable) -> Self {
        Self {
            variables: IndexMap::new(),
            functions,
        }
    }

    /// Bind the `vars` object.
    pub fn with_vars(mut self, vars: Dict) -> Self {
        self.bind("vars", Value::Object(vars));
        self
    }

    pub fn bind(&mut self, name: impl Into<String>, value: Value) {
        self.variables.insert(name.into(), value);
    }

    /// Evaluate every expression in a value tree.
    ///
    /// Marked values keep their mark; everything else is built afresh.
    pub fn eval(&self, value: &Value) -> ConfigResult<Value> {
        match value {
            Value::Marked(m) => Ok(Value::Marked(Box::new(Marked {
                value: self.eval(&m.value)?,
                mark: m.mark.clone(),
            }))),
            Value::String(s) => self.eval_string(s),
            Value::List(items) => items
                .iter()
                .map(|v| self.eval(v))
                .collect::<ConfigResult<Vec<_>>>()
                .map(Value::List),
            Value::Object(map) => map
                .iter()
                .map(|(k, v)| Ok((k.clone(), self.eval(v)?)))
                .collect::<ConfigResult<Dict>>()
                .map(Value::Object),
            other => Ok(other.clone()),
        }
    }

    fn eval_string(&self, s: &str) -> ConfigResult<Value> {
        let mut segments = parse_template(s)?;
        if segments.len() == 1 {
            if let Segment::Expression { expr, .. } = &segments[0] {
                return self.eval_expr(expr);
            }
        }

        let mut out = String::new();
        for segment in segments.drain(..) {
            match segment {
                Segment::Literal(text) => out.push_str(&escape_literal(&text)),
                Segment::Expression { expr, .. } => {
                    let v = self.eval_expr(&expr)?;
                    if v.is_unknown() {
                        return Ok(Value::Unknown);
                    }
                    let text = primitive_string(&v)
                        .ok_or_else(|| ConfigError::type_mismatch("string", v.type_name()))?;
                    out.push_str(&text);
                }
            }
        }
        Ok(Value::String(out))
    }

    pub fn eval_expr(&self, expr: &Expr) -> ConfigResult<Value> {
        match expr {
            Expr::Literal(v) => Ok(v.clone()),
            Expr::Traversal(parts) => self.eval_traversal(parts),
            Expr::List(items) => items
                .iter()
                .map(|e| self.eval_expr(e))
                .collect::<ConfigResult<Vec<_>>>()
                .map(Value::List),
            Expr::Call { name, args } => {
                let args = args
                    .iter()
                    .map(|e| self.eval_expr(e))
                    .collect::<ConfigResult<Vec<_>>>()?;
                self.functions.call(name, &args)
            }
            Expr::GetAttr { target, name } => get_attr(&self.eval_expr(target)?, name),
            Expr::Index { target, key } => index(&self.eval_expr(target)?, &self.eval_expr(key)?),
            Expr::Unary { op, operand } => unary(*op, &self.eval_expr(operand)?),
            Expr::Binary { op, lhs, rhs } => {
                binary(*op, &self.eval_expr(lhs)?, &self.eval_expr(rhs)?)
            }
        }
    }

    fn eval_traversal(&self, parts: &[String]) -> ConfigResult<Value> {
        let (reference, consumed) = Reference::from_traversal(parts)?;
        let mut value = match &reference.scope {
            Scope::Global => {
                let vars = self
                    .variables
                    .get("vars")
                    .and_then(Value::as_object)
                    .ok_or_else(|| ConfigError::UnknownVariable(reference.name.clone()))?;
                vars.get(&reference.name).cloned().ok_or_else(|| {
                    hint_spelling(
                        &reference.name,
                        vars.keys(),
                        ConfigError::UnknownVariable(reference.name.clone()),
                    )
                })?
            }
            Scope::Module { module, .. } => {
                let outputs = self
                    .variables
                    .get(module.as_str())
                    .filter(|_| module.as_str() != "vars")
                    .ok_or_else(|| {
                        let ids = self.variables.keys().filter(|k| *k != "vars");
                        hint_spelling(module.as_str(), ids, ConfigError::UnknownModule(module.to_string()))
                    })?;
                match outputs.unmarked() {
                    Value::Object(map) => map.get(&reference.name).cloned().ok_or_else(|| {
                        hint_spelling(
                            &reference.name,
                            map.keys(),
                            ConfigError::UnknownOutput {
                                module: module.to_string(),
                                output: reference.name.clone(),
                            },
                        )
                    })?,
                    _ => Value::Unknown,
                }
            }
        };
        for attr in &parts[consumed..] {
            value = get_attr(&value, attr)?;
        }
        Ok(value)
    }
}

/// Restore parts of `evaluated` that are unknown from `original`.
///
/// Marks on `evaluated` are kept.
pub fn settle(original: &Value, evaluated: Value) -> Value {
    match (original, evaluated) {
        (_, Value::Unknown) => original.clone(),
        (Value::Marked(o), Value::Marked(e)) => {
            let Marked { value, mark } = *e;
            Value::Marked(Box::new(Marked {
                value: settle(&o.value, value),
                mark,
            }))
        }
        (Value::List(os), Value::List(es)) if os.len() == es.len() => {
            Value::List(os.iter().zip(es).map(|(o, e)| settle(o, e)).collect())
        }
        (Value::Object(om), Value::Object(em)) => Value::Object(
            em.into_iter()
                .map(|(k, e)| match om.get(&k) {
                    Some(o) => {
                        let settled = settle(o, e);
                        (k, settled)
                    }
                    None => (k, e),
                })
                .collect(),
        ),
        (_, e) if e.is_unknown() => original.clone(),
        (_, e) => e,
    }
}

fn get_attr(target: &Value, name: &str) -> ConfigResult<Value> {
    match target.unmarked() {
        Value::Unknown => Ok(Value::Unknown),
        Value::Object(map) => map.get(name).cloned().ok_or_else(|| {
            hint_spelling(name, map.keys(), ConfigError::UnknownAttribute(name.to_string()))
        }),
        other => Err(ConfigError::type_mismatch("object", other.type_name())),
    }
}

fn index(target: &Value, key: &Value) -> ConfigResult<Value> {
    if target.is_unknown() || key.is_unknown() {
        return Ok(Value::Unknown);
    }
    match (target.unmarked(), key.unmarked()) {
        (Value::List(items), Value::Number(n)) => n
            .as_u64()
            .and_then(|i| items.get(i as usize))
            .cloned()
            .ok_or_else(|| ConfigError::InvalidIndex {
                index: n.to_string(),
                target: format!("list of length {}", items.len()),
            }),
        (Value::Object(map), Value::String(k)) => map.get(k).cloned().ok_or_else(|| {
            hint_spelling(k, map.keys(), ConfigError::UnknownAttribute(k.clone()))
        }),
        (t, k) => Err(ConfigError::InvalidIndex {
            index: k.to_string(),
            target: t.type_name().to_string(),
        }),
    }
}

fn unary(op: UnaryOp, v: &Value) -> ConfigResult<Value> {
    if v.is_unknown() {
        return Ok(Value::Unknown);
    }
    match op {
        UnaryOp::Not => v
            .as_bool()
            .map(|b| Value::Bool(!b))
            .ok_or_else(|| ConfigError::type_mismatch("bool", v.type_name())),
        UnaryOp::Neg => v
            .as_f64()
            .map(|n| Value::number(-n))
            .ok_or_else(|| ConfigError::type_mismatch("number", v.type_name())),
    }
}

fn values_equal(a: &Value, b: &Value) -> bool {
    match (a.as_f64(), b.as_f64()) {
        (Some(x), Some(y)) => x == y,
        _ => a.strip_marks() == b.strip_marks(),
    }
}

fn binary(op: BinaryOp, lhs: &Value, rhs: &Value) -> ConfigResult<Value> {
    if lhs.is_unknown() || rhs.is_unknown() {
        return Ok(Value::Unknown);
    }
    let bools = || -> ConfigResult<(bool, bool)> {
        let l = lhs
            .as_bool()
            .ok_or_else(|| ConfigError::type_mismatch("bool", lhs.type_name()))?;
        let r = rhs
            .as_bool()
            .ok_or_else(|| ConfigError::type_mismatch("bool", rhs.type_name()))?;
        Ok((l, r))
    };
    let numbers = || -> ConfigResult<(f64, f64)> {
        let l = lhs
            .as_f64()
            .ok_or_else(|| ConfigError::type_mismatch("number", lhs.type_name()))?;
        let r = rhs
            .as_f64()
            .ok_or_else(|| ConfigError::type_mismatch("number", rhs.type_name()))?;
        Ok((l, r))
    };

    Ok(match op {
        BinaryOp::Or => {
            let (l, r) = bools()?;
            Value::Bool(l || r)
        }
        BinaryOp::And => {
            let (l, r) = bools()?;
            Value::Bool(l && r)
        }
        BinaryOp::Eq => Value::Bool(values_equal(lhs, rhs)),
        BinaryOp::Ne => Value::Bool(!values_equal(lhs, rhs)),
        BinaryOp::Lt => numbers().map(|(l, r)| Value::Bool(l < r))?,
        BinaryOp::Le => numbers().map(|(l, r)| Value::Bool(l <= r))?,
        BinaryOp::Gt => numbers().map(|(l, r)| Value::Bool(l > r))?,
        BinaryOp::Ge => numbers().map(|(l, r)| Value::Bool(l >= r))?,
        BinaryOp::Add => numbers().map(|(l, r)| Value::number(l + r))?,
        BinaryOp::Sub => numbers().map(|(l, r)| Value::number(l - r))?,
        BinaryOp::Mul => numbers().map(|(l, r)| Value::number(l * r))?,
        BinaryOp::Div | BinaryOp::Mod => {
            let (l, r) = numbers()?;
            if r == 0.0 {
                return Err(ConfigError::FunctionCall {
                    function: if op == BinaryOp::Div { "/" } else { "%" }.to_string(),
                    message: "division by zero".to_string(),
                });
            }
            Value::number(if op == BinaryOp::Div { l / r } else { l % r })
        }
    })
}
