//! Functions callable from expressions.

use std::fmt;
use std::sync::OnceLock;

use indexmap::IndexMap;

use crate::error::{ConfigError, ConfigResult};
use crate::hint::hint_spelling;
use crate::value::{Dict, Value};

/// Signature shared by every expression function.
pub type Function = fn(&[Value]) -> ConfigResult<Value>;

/// Named functions available to the evaluator.
#[derive(Clone, Default)]
pub struct FunctionTable {
    functions: IndexMap<String, Function>,
}

impl fmt::Debug for FunctionTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.functions.keys()).finish()
    }
}

impl FunctionTable {
    /// A table with no functions.
    pub fn empty() -> Self {
        Self::default()
    }

    /// The process-wide table of built-in functions.
    pub fn builtin() -> &'static FunctionTable {
        static BUILTIN: OnceLock<FunctionTable> = OnceLock::new();
        BUILTIN.get_or_init(|| {
            FunctionTable::empty()
                .with_function("abs", abs)
                .with_function("coalesce", coalesce)
                .with_function("concat", concat)
                .with_function("contains", contains)
                .with_function("flatten", flatten)
                .with_function("join", join)
                .with_function("jsonencode", jsonencode)
                .with_function("keys", keys)
                .with_function("length", length)
                .with_function("lower", lower)
                .with_function("max", max)
                .with_function("merge", merge)
                .with_function("min", min)
                .with_function("replace", replace)
                .with_function("tonumber", tonumber)
                .with_function("tostring", tostring)
                .with_function("trimspace", trimspace)
                .with_function("upper", upper)
                .with_function("values", values)
        })
    }

    pub fn with_function(mut self, name: impl Into<String>, f: Function) -> Self {
        self.functions.insert(name.into(), f);
        self
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.functions.keys().map(String::as_str)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.functions.contains_key(name)
    }

    /// Call a function by name. Any unknown argument makes the result unknown.
    pub fn call(&self, name: &str, args: &[Value]) -> ConfigResult<Value> {
        let f = self.functions.get(name).ok_or_else(|| {
            hint_spelling(
                name,
                self.functions.keys(),
                ConfigError::UnknownFunction(name.to_string()),
            )
        })?;
        if args.iter().any(Value::is_unknown) {
            return Ok(Value::Unknown);
        }
        f(args).map_err(|e| match e {
            e @ ConfigError::FunctionCall { .. } => e,
            other => ConfigError::FunctionCall {
                function: name.to_string(),
                message: other.to_string(),
            },
        })
    }
}

fn call_error(function: &str, message: impl Into<String>) -> ConfigError {
    ConfigError::FunctionCall {
        function: function.to_string(),
        message: message.into(),
    }
}

fn arity(function: &str, args: &[Value], n: usize) -> ConfigResult<()> {
    if args.len() == n {
        Ok(())
    } else {
        Err(call_error(
            function,
            format!("expected {} argument(s), got {}", n, args.len()),
        ))
    }
}

fn str_arg<'a>(function: &str, v: &'a Value) -> ConfigResult<&'a str> {
    v.as_str()
        .ok_or_else(|| call_error(function, format!("expected string, got {}", v.type_name())))
}

fn list_arg<'a>(function: &str, v: &'a Value) -> ConfigResult<&'a [Value]> {
    v.as_list()
        .ok_or_else(|| call_error(function, format!("expected list, got {}", v.type_name())))
}

fn object_arg<'a>(function: &str, v: &'a Value) -> ConfigResult<&'a Dict> {
    v.as_object()
        .ok_or_else(|| call_error(function, format!("expected object, got {}", v.type_name())))
}

fn num_arg(function: &str, v: &Value) -> ConfigResult<f64> {
    v.as_f64()
        .ok_or_else(|| call_error(function, format!("expected number, got {}", v.type_name())))
}

/// String form of a primitive value, as used by `join` and `tostring`.
pub(crate) fn primitive_string(v: &Value) -> Option<String> {
    match v.unmarked() {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

fn abs(args: &[Value]) -> ConfigResult<Value> {
    arity("abs", args, 1)?;
    Ok(Value::number(num_arg("abs", &args[0])?.abs()))
}

fn coalesce(args: &[Value]) -> ConfigResult<Value> {
    args.iter()
        .find(|v| !v.is_null() && v.as_str() != Some(""))
        .cloned()
        .ok_or_else(|| call_error("coalesce", "no non-null, non-empty argument"))
}

fn concat(args: &[Value]) -> ConfigResult<Value> {
    let mut out = Vec::new();
    for a in args {
        out.extend(list_arg("concat", a)?.iter().cloned());
    }
    Ok(Value::List(out))
}

fn contains(args: &[Value]) -> ConfigResult<Value> {
    arity("contains", args, 2)?;
    let needle = args[1].strip_marks();
    let found = list_arg("contains", &args[0])?
        .iter()
        .any(|v| v.strip_marks() == needle);
    Ok(Value::Bool(found))
}

fn flatten(args: &[Value]) -> ConfigResult<Value> {
    fn push_flat(v: &Value, out: &mut Vec<Value>) {
        match v.as_list() {
            Some(items) => items.iter().for_each(|i| push_flat(i, out)),
            None => out.push(v.clone()),
        }
    }
    arity("flatten", args, 1)?;
    let mut out = Vec::new();
    for item in list_arg("flatten", &args[0])? {
        push_flat(item, &mut out);
    }
    Ok(Value::List(out))
}

fn join(args: &[Value]) -> ConfigResult<Value> {
    arity("join", args, 2)?;
    let sep = str_arg("join", &args[0])?;
    let parts = list_arg("join", &args[1])?
        .iter()
        .map(|v| {
            primitive_string(v)
                .ok_or_else(|| call_error("join", format!("cannot join {}", v.type_name())))
        })
        .collect::<ConfigResult<Vec<_>>>()?;
    Ok(Value::String(parts.join(sep)))
}

fn jsonencode(args: &[Value]) -> ConfigResult<Value> {
    arity("jsonencode", args, 1)?;
    serde_json::to_string(&args[0])
        .map(Value::String)
        .map_err(|e| call_error("jsonencode", e.to_string()))
}

fn keys(args: &[Value]) -> ConfigResult<Value> {
    arity("keys", args, 1)?;
    let obj = object_arg("keys", &args[0])?;
    Ok(Value::list(obj.keys().map(|k| Value::string(k.as_str()))))
}

fn length(args: &[Value]) -> ConfigResult<Value> {
    arity("length", args, 1)?;
    let n = match args[0].unmarked() {
        Value::List(items) => items.len(),
        Value::Object(map) => map.len(),
        Value::String(s) => s.chars().count(),
        other => {
            return Err(call_error(
                "length",
                format!("cannot take length of {}", other.type_name()),
            ))
        }
    };
    Ok(Value::int(n as i64))
}

fn lower(args: &[Value]) -> ConfigResult<Value> {
    arity("lower", args, 1)?;
    Ok(Value::String(str_arg("lower", &args[0])?.to_lowercase()))
}

fn upper(args: &[Value]) -> ConfigResult<Value> {
    arity("upper", args, 1)?;
    Ok(Value::String(str_arg("upper", &args[0])?.to_uppercase()))
}

fn trimspace(args: &[Value]) -> ConfigResult<Value> {
    arity("trimspace", args, 1)?;
    Ok(Value::string(str_arg("trimspace", &args[0])?.trim()))
}

fn replace(args: &[Value]) -> ConfigResult<Value> {
    arity("replace", args, 3)?;
    let s = str_arg("replace", &args[0])?;
    let from = str_arg("replace", &args[1])?;
    let to = str_arg("replace", &args[2])?;
    Ok(Value::String(s.replace(from, to)))
}

fn extremum(function: &str, args: &[Value], pick: fn(f64, f64) -> f64) -> ConfigResult<Value> {
    let mut nums = args.iter().map(|a| num_arg(function, a));
    let first = nums
        .next()
        .ok_or_else(|| call_error(function, "expected at least one argument"))??;
    let best = nums.try_fold(first, |acc, n| n.map(|n| pick(acc, n)))?;
    Ok(Value::number(best))
}

fn max(args: &[Value]) -> ConfigResult<Value> {
    extremum("max", args, f64::max)
}

fn min(args: &[Value]) -> ConfigResult<Value> {
    extremum("min", args, f64::min)
}

fn merge(args: &[Value]) -> ConfigResult<Value> {
    let mut out = Dict::new();
    for a in args.iter().filter(|a| !a.is_null()) {
        for (k, v) in object_arg("merge", a)? {
            out.insert(k.clone(), v.clone());
        }
    }
    Ok(Value::Object(out))
}

fn tonumber(args: &[Value]) -> ConfigResult<Value> {
    arity("tonumber", args, 1)?;
    match args[0].unmarked() {
        Value::Null => Ok(Value::Null),
        Value::Number(n) => Ok(Value::Number(n.clone())),
        Value::String(s) => s
            .trim()
            .parse::<f64>()
            .map(Value::number)
            .map_err(|_| call_error("tonumber", format!("cannot convert {:?} to number", s))),
        other => Err(call_error(
            "tonumber",
            format!("cannot convert {} to number", other.type_name()),
        )),
    }
}

fn tostring(args: &[Value]) -> ConfigResult<Value> {
    arity("tostring", args, 1)?;
    if args[0].is_null() {
        return Ok(Value::Null);
    }
    primitive_string(&args[0])
        .map(Value::String)
        .ok_or_else(|| call_error("tostring", format!("cannot convert {} to string", args[0].type_name())))
}

fn values(args: &[Value]) -> ConfigResult<Value> {
    arity("values", args, 1)?;
    let obj = object_arg("values", &args[0])?;
    Ok(Value::list(obj.values().cloned()))
}
