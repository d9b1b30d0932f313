//! Built-in objects and native functions

use std::sync::Arc;

use chrono::{NaiveDate, TimeZone, Utc};
use rustc_hash::FxHashMap;

use crate::vm::heap::{Binding, Heap, HeapObject, ObjectId, ObjectKind, Scope};
use crate::vm::realm::{Abrupt, Completion, ErrorKind, Realm};
use crate::vm::value::{number_to_string, to_int32, Value};

/// Native function implemented by the engine
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Builtin {
    ObjectCtor,
    ObjectKeys,
    ObjectToString,
    ObjectValueOf,
    ObjectHasOwnProperty,

    FunctionCall,
    FunctionApply,
    FunctionToString,

    ArrayCtor,
    ArrayIsArray,
    ArrayPush,
    ArrayPop,
    ArrayJoin,
    ArrayIndexOf,
    ArrayForEach,
    ArrayMap,
    ArrayToString,

    StringCtor,
    StringCharAt,
    StringIndexOf,
    StringToUpperCase,
    StringToLowerCase,
    StringSubstring,
    StringValueOf,

    NumberCtor,
    NumberToString,
    BooleanCtor,

    ErrorCtor(ErrorKind),
    ErrorToString,

    DateCtor,
    DateNow,
    DateUtc,
    DateGetTime,
    DateToIsoString,
    DateToString,

    MathFloor,
    MathCeil,
    MathRound,
    MathAbs,
    MathMax,
    MathMin,
    MathPow,
    MathSqrt,

    IsNaN,
    ParseInt,
    ParseFloat,

    /// `valueOf` installed on host proxies
    HostValueOf,
    /// `toString` installed on host proxies
    HostToString,
}

impl Builtin {
    pub fn name(self) -> &'static str {
        use Builtin::*;
        match self {
            ObjectCtor => "Object",
            ObjectKeys => "keys",
            ObjectToString | FunctionToString | ArrayToString | NumberToString | ErrorToString
            | DateToString | HostToString => "toString",
            ObjectValueOf | StringValueOf | HostValueOf => "valueOf",
            ObjectHasOwnProperty => "hasOwnProperty",
            FunctionCall => "call",
            FunctionApply => "apply",
            ArrayCtor => "Array",
            ArrayIsArray => "isArray",
            ArrayPush => "push",
            ArrayPop => "pop",
            ArrayJoin => "join",
            ArrayIndexOf | StringIndexOf => "indexOf",
            ArrayForEach => "forEach",
            ArrayMap => "map",
            StringCtor => "String",
            StringCharAt => "charAt",
            StringToUpperCase => "toUpperCase",
            StringToLowerCase => "toLowerCase",
            StringSubstring => "substring",
            NumberCtor => "Number",
            BooleanCtor => "Boolean",
            ErrorCtor(kind) => kind.name(),
            DateCtor => "Date",
            DateNow => "now",
            DateUtc => "UTC",
            DateGetTime => "getTime",
            DateToIsoString => "toISOString",
            MathFloor => "floor",
            MathCeil => "ceil",
            MathRound => "round",
            MathAbs => "abs",
            MathMax => "max",
            MathMin => "min",
            MathPow => "pow",
            MathSqrt => "sqrt",
            IsNaN => "isNaN",
            ParseInt => "parseInt",
            ParseFloat => "parseFloat",
        }
    }
}

/// Objects every realm starts with
#[derive(Debug)]
pub(crate) struct Intrinsics {
    pub global: ObjectId,
    pub object_proto: ObjectId,
    pub function_proto: ObjectId,
    pub array_proto: ObjectId,
    pub string_proto: ObjectId,
    pub number_proto: ObjectId,
    pub boolean_proto: ObjectId,
    pub date_proto: ObjectId,
    pub error_protos: [ObjectId; 5],
    pub host_value_of: ObjectId,
    pub host_to_string: ObjectId,
}

impl Intrinsics {
    pub fn roots(&self) -> impl Iterator<Item = ObjectId> + '_ {
        [
            self.global,
            self.object_proto,
            self.function_proto,
            self.array_proto,
            self.string_proto,
            self.number_proto,
            self.boolean_proto,
            self.date_proto,
            self.host_value_of,
            self.host_to_string,
        ]
        .into_iter()
        .chain(self.error_protos.iter().copied())
    }
}

// ============================================================================
// Setup
// ============================================================================

struct Builder<'h> {
    heap: &'h mut Heap,
    function_proto: ObjectId,
}

impl Builder<'_> {
    fn object(&mut self, proto: Option<ObjectId>) -> ObjectId {
        self.heap.alloc(HeapObject::new(ObjectKind::Ordinary, proto))
    }

    fn native(&mut self, builtin: Builtin) -> ObjectId {
        self.heap.alloc(HeapObject::new(
            ObjectKind::Native(builtin),
            Some(self.function_proto),
        ))
    }

    fn hidden(&mut self, target: ObjectId, key: &str, value: Value) {
        if let Some(object) = self.heap.get_mut(target) {
            object.props.insert_hidden(Arc::from(key), value);
        }
    }

    fn method(&mut self, target: ObjectId, key: &str, builtin: Builtin) {
        let function = self.native(builtin);
        self.hidden(target, key, Value::Object(function));
    }

    /// Native constructor linked with its prototype object
    fn constructor(&mut self, builtin: Builtin, proto: ObjectId) -> ObjectId {
        let ctor = self.native(builtin);
        self.hidden(ctor, "prototype", Value::Object(proto));
        self.hidden(proto, "constructor", Value::Object(ctor));
        ctor
    }
}

/// Populate a fresh heap with the intrinsic objects and the global scope
pub(crate) fn install(heap: &mut Heap) -> Intrinsics {
    let object_proto = heap.alloc(HeapObject::new(ObjectKind::Ordinary, None));
    let function_proto = heap.alloc(HeapObject::new(ObjectKind::Ordinary, Some(object_proto)));
    let mut b = Builder {
        heap,
        function_proto,
    };

    b.method(object_proto, "toString", Builtin::ObjectToString);
    b.method(object_proto, "valueOf", Builtin::ObjectValueOf);
    b.method(object_proto, "hasOwnProperty", Builtin::ObjectHasOwnProperty);
    let object_ctor = b.constructor(Builtin::ObjectCtor, object_proto);
    b.method(object_ctor, "keys", Builtin::ObjectKeys);

    b.method(function_proto, "call", Builtin::FunctionCall);
    b.method(function_proto, "apply", Builtin::FunctionApply);
    b.method(function_proto, "toString", Builtin::FunctionToString);

    let array_proto = b.object(Some(object_proto));
    for (key, builtin) in [
        ("push", Builtin::ArrayPush),
        ("pop", Builtin::ArrayPop),
        ("join", Builtin::ArrayJoin),
        ("indexOf", Builtin::ArrayIndexOf),
        ("forEach", Builtin::ArrayForEach),
        ("map", Builtin::ArrayMap),
        ("toString", Builtin::ArrayToString),
    ] {
        b.method(array_proto, key, builtin);
    }
    let array_ctor = b.constructor(Builtin::ArrayCtor, array_proto);
    b.method(array_ctor, "isArray", Builtin::ArrayIsArray);

    let string_proto = b.object(Some(object_proto));
    for (key, builtin) in [
        ("charAt", Builtin::StringCharAt),
        ("indexOf", Builtin::StringIndexOf),
        ("toUpperCase", Builtin::StringToUpperCase),
        ("toLowerCase", Builtin::StringToLowerCase),
        ("substring", Builtin::StringSubstring),
        ("toString", Builtin::StringValueOf),
        ("valueOf", Builtin::StringValueOf),
    ] {
        b.method(string_proto, key, builtin);
    }
    let string_ctor = b.constructor(Builtin::StringCtor, string_proto);

    let number_proto = b.object(Some(object_proto));
    b.method(number_proto, "toString", Builtin::NumberToString);
    let number_ctor = b.constructor(Builtin::NumberCtor, number_proto);

    let boolean_proto = b.object(Some(object_proto));
    let boolean_ctor = b.constructor(Builtin::BooleanCtor, boolean_proto);

    let mut error_protos = [object_proto; 5];
    let mut error_ctors = [object_proto; 5];
    for kind in ErrorKind::ALL {
        let parent = if kind == ErrorKind::Error {
            object_proto
        } else {
            error_protos[ErrorKind::Error as usize]
        };
        let proto = b.object(Some(parent));
        b.hidden(proto, "name", Value::string(kind.name()));
        b.hidden(proto, "message", Value::string(""));
        if kind == ErrorKind::Error {
            b.method(proto, "toString", Builtin::ErrorToString);
        }
        error_protos[kind as usize] = proto;
        error_ctors[kind as usize] = b.constructor(Builtin::ErrorCtor(kind), proto);
    }

    let date_proto = b.object(Some(object_proto));
    for (key, builtin) in [
        ("getTime", Builtin::DateGetTime),
        ("valueOf", Builtin::DateGetTime),
        ("toISOString", Builtin::DateToIsoString),
        ("toString", Builtin::DateToString),
    ] {
        b.method(date_proto, key, builtin);
    }
    let date_ctor = b.constructor(Builtin::DateCtor, date_proto);
    b.method(date_ctor, "now", Builtin::DateNow);
    b.method(date_ctor, "UTC", Builtin::DateUtc);

    let math = b.object(Some(object_proto));
    for (key, builtin) in [
        ("floor", Builtin::MathFloor),
        ("ceil", Builtin::MathCeil),
        ("round", Builtin::MathRound),
        ("abs", Builtin::MathAbs),
        ("max", Builtin::MathMax),
        ("min", Builtin::MathMin),
        ("pow", Builtin::MathPow),
        ("sqrt", Builtin::MathSqrt),
    ] {
        b.method(math, key, builtin);
    }
    b.hidden(math, "PI", Value::Number(std::f64::consts::PI));

    let is_nan = b.native(Builtin::IsNaN);
    let parse_int = b.native(Builtin::ParseInt);
    let parse_float = b.native(Builtin::ParseFloat);
    let host_value_of = b.native(Builtin::HostValueOf);
    let host_to_string = b.native(Builtin::HostToString);

    let mut vars: FxHashMap<Arc<str>, Binding> = FxHashMap::default();
    let mut bind = |name: &str, value: Value, mutable: bool| {
        vars.insert(Arc::from(name), Binding { value, mutable });
    };
    bind("Object", Value::Object(object_ctor), true);
    bind("Array", Value::Object(array_ctor), true);
    bind("String", Value::Object(string_ctor), true);
    bind("Number", Value::Object(number_ctor), true);
    bind("Boolean", Value::Object(boolean_ctor), true);
    bind("Date", Value::Object(date_ctor), true);
    bind("Math", Value::Object(math), true);
    for kind in ErrorKind::ALL {
        bind(kind.name(), Value::Object(error_ctors[kind as usize]), true);
    }
    bind("isNaN", Value::Object(is_nan), true);
    bind("parseInt", Value::Object(parse_int), true);
    bind("parseFloat", Value::Object(parse_float), true);
    bind("undefined", Value::Undefined, false);
    bind("NaN", Value::Number(f64::NAN), false);
    bind("Infinity", Value::Number(f64::INFINITY), false);

    let global = b.heap.alloc(HeapObject::new(
        ObjectKind::Scope(Scope { vars, parent: None }),
        None,
    ));

    Intrinsics {
        global,
        object_proto,
        function_proto,
        array_proto,
        string_proto,
        number_proto,
        boolean_proto,
        date_proto,
        error_protos,
        host_value_of,
        host_to_string,
    }
}

// ============================================================================
// Native calls
// ============================================================================

fn arg(args: &[Value], index: usize) -> Value {
    args.get(index).cloned().unwrap_or(Value::Undefined)
}

/// ToIntegerOrInfinity
fn to_integer(n: f64) -> f64 {
    if n.is_nan() {
        0.0
    } else {
        n.trunc()
    }
}

fn now_millis() -> f64 {
    Utc::now().timestamp_millis() as f64
}

fn time_clip(time: f64) -> f64 {
    if !time.is_finite() || time.abs() > 8.64e15 {
        f64::NAN
    } else {
        time.trunc() + 0.0
    }
}

/// Milliseconds for UTC date components `[year, month, day, h, m, s, ms]`
fn utc_from_parts(parts: &[f64]) -> f64 {
    if parts.iter().any(|p| !p.is_finite()) {
        return f64::NAN;
    }
    let part = |i: usize, default: f64| parts.get(i).copied().map(f64::trunc).unwrap_or(default);
    let mut year = part(0, f64::NAN);
    if (0.0..=99.0).contains(&year) {
        year += 1900.0;
    }
    let month = part(1, 0.0);
    let year = year + (month / 12.0).floor();
    let month = month.rem_euclid(12.0);
    if year.abs() > 300_000.0 {
        return f64::NAN;
    }
    let Some(first) = NaiveDate::from_ymd_opt(year as i32, month as u32 + 1, 1) else {
        return f64::NAN;
    };
    let Some(midnight) = first.and_hms_opt(0, 0, 0) else {
        return f64::NAN;
    };
    let base = midnight.and_utc().timestamp_millis() as f64;
    time_clip(
        base + (part(2, 1.0) - 1.0) * 86_400_000.0
            + part(3, 0.0) * 3_600_000.0
            + part(4, 0.0) * 60_000.0
            + part(5, 0.0) * 1000.0
            + part(6, 0.0),
    )
}

fn parse_date(text: &str) -> f64 {
    if let Ok(parsed) = chrono::DateTime::parse_from_rfc3339(text) {
        return parsed.timestamp_millis() as f64;
    }
    if let Ok(date) = NaiveDate::parse_from_str(text, "%Y-%m-%d") {
        if let Some(midnight) = date.and_hms_opt(0, 0, 0) {
            return midnight.and_utc().timestamp_millis() as f64;
        }
    }
    f64::NAN
}

fn format_date(time: f64, pattern: &str) -> Option<String> {
    if time.is_nan() {
        return None;
    }
    Utc.timestamp_millis_opt(time as i64)
        .single()
        .map(|date| date.format(pattern).to_string())
}

fn parse_int(text: &str, radix: i32) -> f64 {
    let text = text.trim_start();
    let (negative, text) = match text.as_bytes().first() {
        Some(b'-') => (true, &text[1..]),
        Some(b'+') => (false, &text[1..]),
        _ => (false, text),
    };
    let mut radix = radix;
    let mut digits = text;
    let has_hex_prefix = text.starts_with("0x") || text.starts_with("0X");
    if radix == 0 {
        radix = if has_hex_prefix { 16 } else { 10 };
    }
    if radix == 16 && has_hex_prefix {
        digits = &text[2..];
    }
    if !(2..=36).contains(&radix) {
        return f64::NAN;
    }
    let mut result: Option<f64> = None;
    for c in digits.chars() {
        let Some(digit) = c.to_digit(radix as u32) else {
            break;
        };
        result = Some(result.unwrap_or(0.0) * radix as f64 + digit as f64);
    }
    match result {
        Some(n) if negative => -n,
        Some(n) => n,
        None => f64::NAN,
    }
}

fn parse_float(text: &str) -> f64 {
    let text = text.trim_start();
    let bytes = text.as_bytes();
    let mut end = 0;
    if matches!(bytes.first(), Some(b'+' | b'-')) {
        end = 1;
    }
    if text[end..].starts_with("Infinity") {
        return if text.starts_with('-') {
            f64::NEG_INFINITY
        } else {
            f64::INFINITY
        };
    }
    let digits_start = end;
    while end < bytes.len() && bytes[end].is_ascii_digit() {
        end += 1;
    }
    if end < bytes.len() && bytes[end] == b'.' {
        end += 1;
        while end < bytes.len() && bytes[end].is_ascii_digit() {
            end += 1;
        }
    }
    if end == digits_start || &text[digits_start..end] == "." {
        return f64::NAN;
    }
    if end < bytes.len() && matches!(bytes[end], b'e' | b'E') {
        let mut exp_end = end + 1;
        if exp_end < bytes.len() && matches!(bytes[exp_end], b'+' | b'-') {
            exp_end += 1;
        }
        let exp_digits = exp_end;
        while exp_end < bytes.len() && bytes[exp_end].is_ascii_digit() {
            exp_end += 1;
        }
        if exp_end > exp_digits {
            end = exp_end;
        }
    }
    text[..end].parse().unwrap_or(f64::NAN)
}

fn find_units(haystack: &[u16], needle: &[u16], from: usize) -> Option<usize> {
    if needle.is_empty() {
        return Some(from.min(haystack.len()));
    }
    if from >= haystack.len() {
        return None;
    }
    haystack[from..]
        .windows(needle.len())
        .position(|window| window == needle)
        .map(|i| i + from)
}

fn integer_to_radix(mut n: u64, radix: u32) -> String {
    if n == 0 {
        return "0".to_string();
    }
    let mut digits = Vec::new();
    while n > 0 {
        let digit = (n % radix as u64) as u32;
        digits.push(std::char::from_digit(digit, radix).unwrap_or('0'));
        n /= radix as u64;
    }
    digits.iter().rev().collect()
}

impl Realm {
    fn this_string(&self, this: &Value, method: &str) -> Completion<Vec<u16>> {
        if this.is_nullish() {
            return Err(self.throw_error(
                ErrorKind::Type,
                format!("String.prototype.{} called on null or undefined", method),
            ));
        }
        Ok(self.to_js_string(this)?.encode_utf16().collect())
    }

    fn this_array(&self, this: &Value, method: &str) -> Completion<ObjectId> {
        match this.as_object() {
            Some(id) if self.is_array(this) => Ok(id),
            _ => Err(self.throw_error(
                ErrorKind::Type,
                format!("Array.prototype.{} called on non-array", method),
            )),
        }
    }

    fn this_date(&self, this: &Value) -> Completion<f64> {
        let time = this.as_object().and_then(|id| {
            self.with_object(id, |o| match o.kind {
                ObjectKind::Date(t) => Some(t),
                _ => None,
            })
            .flatten()
        });
        time.ok_or_else(|| self.throw_error(ErrorKind::Type, "this is not a Date object."))
    }

    fn callback_arg(&self, args: &[Value]) -> Completion<Value> {
        let callback = arg(args, 0);
        if !self.is_callable(&callback) {
            let shown = self.to_js_string(&callback)?;
            return Err(self.throw_error(
                ErrorKind::Type,
                format!("{} is not a function", shown),
            ));
        }
        Ok(callback)
    }

    fn numbers(&self, args: &[Value]) -> Completion<Vec<f64>> {
        args.iter().map(|v| self.to_number(v)).collect()
    }

    fn math_unary(&self, args: &[Value], f: impl FnOnce(f64) -> f64) -> Completion<Value> {
        Ok(Value::Number(f(self.to_number(&arg(args, 0))?)))
    }

    pub(crate) fn call_builtin(
        &self,
        builtin: Builtin,
        this: Value,
        args: Vec<Value>,
        construct: bool,
    ) -> Completion<Value> {
        use Builtin::*;
        match builtin {
            // ================================================================
            // Object
            // ================================================================
            ObjectCtor => match arg(&args, 0) {
                value @ Value::Object(_) => Ok(value),
                _ => Ok(Value::Object(self.new_object())),
            },
            ObjectKeys => {
                let keys: Vec<Value> = match arg(&args, 0) {
                    Value::Object(id) => self
                        .own_keys(id)?
                        .into_iter()
                        .map(Value::String)
                        .collect(),
                    Value::String(s) => (0..s.encode_utf16().count())
                        .map(|i| Value::string(&i.to_string()))
                        .collect(),
                    target @ (Value::Undefined | Value::Null) => {
                        return Err(self.throw_error(
                            ErrorKind::Type,
                            format!(
                                "Cannot convert {} to object",
                                self.primitive_string(&target)
                            ),
                        ))
                    }
                    _ => Vec::new(),
                };
                Ok(Value::Object(self.new_array(keys)))
            }
            ObjectToString => {
                let tag = match &this {
                    Value::Undefined => "Undefined",
                    Value::Null => "Null",
                    Value::Bool(_) => "Boolean",
                    Value::Number(_) => "Number",
                    Value::String(_) => "String",
                    Value::Object(id) => self
                        .with_object(*id, |o| match o.kind {
                            ObjectKind::Array(_) => "Array",
                            ObjectKind::Function(_) | ObjectKind::Native(_) => "Function",
                            ObjectKind::Error(_) => "Error",
                            ObjectKind::Date(_) => "Date",
                            _ => "Object",
                        })
                        .unwrap_or("Object"),
                };
                Ok(Value::string(&format!("[object {}]", tag)))
            }
            ObjectValueOf => Ok(this),
            ObjectHasOwnProperty => {
                let key = self.to_key(&arg(&args, 0))?;
                let found = match &this {
                    Value::Object(id) => self.has_own(*id, &key),
                    Value::String(s) => {
                        &*key == "length"
                            || crate::vm::value::array_index(&key)
                                .is_some_and(|i| (i as usize) < s.encode_utf16().count())
                    }
                    _ => false,
                };
                Ok(Value::Bool(found))
            }

            // ================================================================
            // Function
            // ================================================================
            FunctionCall => {
                let receiver = arg(&args, 0);
                let rest = args.into_iter().skip(1).collect();
                self.call(this, receiver, rest)
            }
            FunctionApply => {
                let receiver = arg(&args, 0);
                let list = match arg(&args, 1) {
                    Value::Undefined | Value::Null => Vec::new(),
                    value => match value.as_object().and_then(|id| self.array_items(id)) {
                        Some(items) => items,
                        None => {
                            return Err(self.throw_error(
                                ErrorKind::Type,
                                "CreateListFromArrayLike called on non-object",
                            ))
                        }
                    },
                };
                self.call(this, receiver, list)
            }
            FunctionToString => {
                let text = this
                    .as_object()
                    .and_then(|id| {
                        self.with_object(id, |o| match &o.kind {
                            ObjectKind::Native(b) => {
                                Some(format!("function {}() {{ [native code] }}", b.name()))
                            }
                            ObjectKind::Function(closure) => Some(format!(
                                "function {}({}) {{ ... }}",
                                closure.node.name.as_deref().unwrap_or(""),
                                closure
                                    .node
                                    .params
                                    .iter()
                                    .map(|p| p.as_ref())
                                    .collect::<Vec<_>>()
                                    .join(", ")
                            )),
                            _ => None,
                        })
                        .flatten()
                    })
                    .ok_or_else(|| {
                        self.throw_error(
                            ErrorKind::Type,
                            "Function.prototype.toString requires that 'this' be a Function",
                        )
                    })?;
                Ok(Value::string(&text))
            }

            // ================================================================
            // Array
            // ================================================================
            ArrayCtor => {
                let length = match args.as_slice() {
                    [Value::Number(n)] => Some(*n),
                    _ => None,
                };
                let items = match length {
                    Some(n) if n < 0.0 || n.fract() != 0.0 || n > 1e7 => {
                        return Err(self.throw_error(ErrorKind::Range, "Invalid array length"));
                    }
                    Some(n) => vec![Value::Undefined; n as usize],
                    None => args,
                };
                Ok(Value::Object(self.new_array(items)))
            }
            ArrayIsArray => Ok(Value::Bool(self.is_array(&arg(&args, 0)))),
            ArrayPush => {
                let id = self.this_array(&this, "push")?;
                let len = self
                    .with_object_mut(id, |o| match &mut o.kind {
                        ObjectKind::Array(items) => {
                            items.extend(args);
                            items.len()
                        }
                        _ => 0,
                    })
                    .unwrap_or(0);
                Ok(Value::Number(len as f64))
            }
            ArrayPop => {
                let id = self.this_array(&this, "pop")?;
                Ok(self
                    .with_object_mut(id, |o| match &mut o.kind {
                        ObjectKind::Array(items) => items.pop(),
                        _ => None,
                    })
                    .flatten()
                    .unwrap_or(Value::Undefined))
            }
            ArrayJoin | ArrayToString => {
                let id = self.this_array(&this, "join")?;
                let separator = match (builtin, arg(&args, 0)) {
                    (ArrayJoin, Value::Undefined) | (ArrayToString, _) => Arc::from(","),
                    (_, value) => self.to_js_string(&value)?,
                };
                let items = self.array_items(id).unwrap_or_default();
                let mut parts = Vec::with_capacity(items.len());
                for item in &items {
                    parts.push(match item {
                        Value::Undefined | Value::Null => String::new(),
                        other => self.to_js_string(other)?.to_string(),
                    });
                }
                Ok(Value::string(&parts.join(&*separator)))
            }
            ArrayIndexOf => {
                let id = self.this_array(&this, "indexOf")?;
                let needle = arg(&args, 0);
                let position = self
                    .array_items(id)
                    .unwrap_or_default()
                    .iter()
                    .position(|item| item.strict_equals(&needle));
                Ok(Value::Number(position.map(|p| p as f64).unwrap_or(-1.0)))
            }
            ArrayForEach | ArrayMap => {
                let id = self.this_array(&this, builtin.name())?;
                let callback = self.callback_arg(&args)?;
                let receiver = arg(&args, 1);
                let len = self.array_items(id).map(|items| items.len()).unwrap_or(0);
                let mut mapped = Vec::new();
                for index in 0..len {
                    let item = self.ordinary_get(id, &index.to_string())?;
                    let result = self.call(
                        callback.clone(),
                        receiver.clone(),
                        vec![item, Value::Number(index as f64), this.clone()],
                    )?;
                    if builtin == ArrayMap {
                        mapped.push(result);
                    }
                }
                if builtin == ArrayMap {
                    Ok(Value::Object(self.new_array(mapped)))
                } else {
                    Ok(Value::Undefined)
                }
            }

            // ================================================================
            // String
            // ================================================================
            StringCtor => match args.first() {
                None => Ok(Value::string("")),
                Some(value) => Ok(Value::String(self.to_js_string(value)?)),
            },
            StringValueOf => match this {
                Value::String(_) => Ok(this),
                _ => Err(self.throw_error(
                    ErrorKind::Type,
                    "String.prototype.valueOf requires that 'this' be a String",
                )),
            },
            StringCharAt => {
                let units = self.this_string(&this, "charAt")?;
                let position = to_integer(self.to_number(&arg(&args, 0))?);
                let text = if position >= 0.0 && (position as usize) < units.len() {
                    String::from_utf16_lossy(&units[position as usize..position as usize + 1])
                } else {
                    String::new()
                };
                Ok(Value::string(&text))
            }
            StringIndexOf => {
                let units = self.this_string(&this, "indexOf")?;
                let needle: Vec<u16> = self.to_js_string(&arg(&args, 0))?.encode_utf16().collect();
                let from = to_integer(self.to_number(&arg(&args, 1))?).max(0.0) as usize;
                let position = find_units(&units, &needle, from);
                Ok(Value::Number(position.map(|p| p as f64).unwrap_or(-1.0)))
            }
            StringToUpperCase | StringToLowerCase => {
                let units = self.this_string(&this, builtin.name())?;
                let text = String::from_utf16_lossy(&units);
                Ok(Value::string(&if builtin == StringToUpperCase {
                    text.to_uppercase()
                } else {
                    text.to_lowercase()
                }))
            }
            StringSubstring => {
                let units = self.this_string(&this, "substring")?;
                let len = units.len() as f64;
                let clamp = |n: f64| to_integer(n).clamp(0.0, len) as usize;
                let start = clamp(self.to_number(&arg(&args, 0))?);
                let end = match arg(&args, 1) {
                    Value::Undefined => units.len(),
                    value => clamp(self.to_number(&value)?),
                };
                let (start, end) = (start.min(end), start.max(end));
                Ok(Value::string(&String::from_utf16_lossy(&units[start..end])))
            }

            // ================================================================
            // Number / Boolean
            // ================================================================
            NumberCtor => match args.first() {
                None => Ok(Value::Number(0.0)),
                Some(value) => Ok(Value::Number(self.to_number(value)?)),
            },
            NumberToString => {
                let Value::Number(n) = this else {
                    return Err(self.throw_error(
                        ErrorKind::Type,
                        "Number.prototype.toString requires that 'this' be a Number",
                    ));
                };
                let radix = match arg(&args, 0) {
                    Value::Undefined => 10,
                    value => to_int32(self.to_number(&value)?),
                };
                if !(2..=36).contains(&radix) {
                    return Err(self.throw_error(
                        ErrorKind::Range,
                        "toString() radix must be between 2 and 36",
                    ));
                }
                if radix == 10 || !n.is_finite() || n.fract() != 0.0 || n.abs() >= 9.007_199_254_740_992e15 {
                    return Ok(Value::string(&number_to_string(n)));
                }
                let digits = integer_to_radix(n.abs() as u64, radix as u32);
                let sign = if n < 0.0 { "-" } else { "" };
                Ok(Value::string(&format!("{}{}", sign, digits)))
            }
            BooleanCtor => Ok(Value::Bool(arg(&args, 0).truthy())),

            // ================================================================
            // Errors
            // ================================================================
            ErrorCtor(kind) => {
                let message = match arg(&args, 0) {
                    Value::Undefined => None,
                    value => Some(self.to_js_string(&value)?),
                };
                Ok(Value::Object(self.make_error(kind, message)))
            }
            ErrorToString => {
                if !matches!(this, Value::Object(_)) {
                    return Err(self.throw_error(
                        ErrorKind::Type,
                        "Error.prototype.toString requires that 'this' be an Object",
                    ));
                }
                let name = match self.get(&this, "name")? {
                    Value::Undefined => Arc::from("Error"),
                    value => self.to_js_string(&value)?,
                };
                let message = match self.get(&this, "message")? {
                    Value::Undefined => Arc::from(""),
                    value => self.to_js_string(&value)?,
                };
                let text = match (name.is_empty(), message.is_empty()) {
                    (true, _) => message.to_string(),
                    (false, true) => name.to_string(),
                    (false, false) => format!("{}: {}", name, message),
                };
                Ok(Value::string(&text))
            }

            // ================================================================
            // Date
            // ================================================================
            DateCtor => {
                if !construct {
                    let text = format_date(now_millis(), DATE_STRING_FORMAT).unwrap_or_default();
                    return Ok(Value::string(&text));
                }
                let time = match args.as_slice() {
                    [] => now_millis(),
                    [Value::String(text)] => parse_date(text),
                    [value] => {
                        let value = match value {
                            Value::Object(_) => {
                                self.to_primitive(value.clone(), crate::vm::realm::Hint::Default)?
                            }
                            other => other.clone(),
                        };
                        match value {
                            Value::String(text) => parse_date(&text),
                            other => time_clip(self.to_number(&other)?),
                        }
                    }
                    parts => utc_from_parts(&self.numbers(parts)?),
                };
                Ok(Value::Object(self.new_date(time)))
            }
            DateNow => Ok(Value::Number(now_millis())),
            DateUtc => Ok(Value::Number(utc_from_parts(&self.numbers(&args)?))),
            DateGetTime => Ok(Value::Number(self.this_date(&this)?)),
            DateToIsoString => {
                let time = self.this_date(&this)?;
                format_date(time, "%Y-%m-%dT%H:%M:%S%.3fZ")
                    .map(|text| Value::string(&text))
                    .ok_or_else(|| self.throw_error(ErrorKind::Range, "Invalid time value"))
            }
            DateToString => {
                let time = self.this_date(&this)?;
                let text = format_date(time, DATE_STRING_FORMAT)
                    .unwrap_or_else(|| "Invalid Date".to_string());
                Ok(Value::string(&text))
            }

            // ================================================================
            // Math
            // ================================================================
            MathFloor => self.math_unary(&args, f64::floor),
            MathCeil => self.math_unary(&args, f64::ceil),
            MathAbs => self.math_unary(&args, f64::abs),
            MathSqrt => self.math_unary(&args, f64::sqrt),
            MathRound => self.math_unary(&args, |x| {
                if !x.is_finite() || x.fract() == 0.0 {
                    x
                } else {
                    (x + 0.5).floor()
                }
            }),
            MathPow => {
                let base = self.to_number(&arg(&args, 0))?;
                let exponent = self.to_number(&arg(&args, 1))?;
                Ok(Value::Number(base.powf(exponent)))
            }
            MathMax | MathMin => {
                let numbers = self.numbers(&args)?;
                let initial = if builtin == MathMax {
                    f64::NEG_INFINITY
                } else {
                    f64::INFINITY
                };
                let result = numbers.into_iter().fold(initial, |acc, n| {
                    if acc.is_nan() || n.is_nan() {
                        f64::NAN
                    } else if builtin == MathMax {
                        acc.max(n)
                    } else {
                        acc.min(n)
                    }
                });
                Ok(Value::Number(result))
            }

            // ================================================================
            // Globals
            // ================================================================
            IsNaN => Ok(Value::Bool(self.to_number(&arg(&args, 0))?.is_nan())),
            ParseInt => {
                let text = self.to_js_string(&arg(&args, 0))?;
                let radix = to_int32(self.to_number(&arg(&args, 1))?);
                Ok(Value::Number(parse_int(&text, radix)))
            }
            ParseFloat => {
                let text = self.to_js_string(&arg(&args, 0))?;
                Ok(Value::Number(parse_float(&text)))
            }

            HostValueOf => self.proxy_value_of(this),
            HostToString => self.proxy_to_string(this),
        }
    }

    /// Throw `TypeError: <what> is not a constructor`
    pub(crate) fn not_a_constructor(&self, what: &str) -> Abrupt {
        self.throw_error(ErrorKind::Type, format!("{} is not a constructor", what))
    }
}

const DATE_STRING_FORMAT: &str = "%a %b %d %Y %H:%M:%S GMT+0000 (Coordinated Universal Time)";

/// Whether a native function may be used with `new`
pub(crate) fn is_constructor(builtin: Builtin) -> bool {
    matches!(
        builtin,
        Builtin::ObjectCtor
            | Builtin::ArrayCtor
            | Builtin::StringCtor
            | Builtin::NumberCtor
            | Builtin::BooleanCtor
            | Builtin::ErrorCtor(_)
            | Builtin::DateCtor
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_int() {
        assert_eq!(parse_int("  42px", 0), 42.0);
        assert_eq!(parse_int("-0x1F", 0), -31.0);
        assert_eq!(parse_int("101", 2), 5.0);
        assert!(parse_int("zz", 10).is_nan());
        assert!(parse_int("1", 1).is_nan());
    }

    #[test]
    fn test_parse_float() {
        assert_eq!(parse_float("3.25abc"), 3.25);
        assert_eq!(parse_float("  -1e3x"), -1000.0);
        assert_eq!(parse_float("2e"), 2.0);
        assert_eq!(parse_float("-Infinity"), f64::NEG_INFINITY);
        assert!(parse_float(".").is_nan());
        assert!(parse_float("abc").is_nan());
    }

    #[test]
    fn test_utc_from_parts() {
        assert_eq!(utc_from_parts(&[1970.0, 0.0, 1.0]), 0.0);
        assert_eq!(utc_from_parts(&[2000.0, 0.0, 1.0]), 946_684_800_000.0);
        // Month overflow rolls into the next year
        assert_eq!(
            utc_from_parts(&[1999.0, 12.0, 1.0]),
            utc_from_parts(&[2000.0, 0.0, 1.0])
        );
        assert!(utc_from_parts(&[f64::NAN]).is_nan());
    }

    #[test]
    fn test_format_date() {
        assert_eq!(
            format_date(0.0, "%Y-%m-%dT%H:%M:%S%.3fZ").as_deref(),
            Some("1970-01-01T00:00:00.000Z")
        );
        assert_eq!(format_date(f64::NAN, "%Y"), None);
    }

    #[test]
    fn test_find_units() {
        let hay: Vec<u16> = "hello".encode_utf16().collect();
        let needle: Vec<u16> = "ll".encode_utf16().collect();
        assert_eq!(find_units(&hay, &needle, 0), Some(2));
        assert_eq!(find_units(&hay, &needle, 3), None);
        assert_eq!(find_units(&hay, &[], 9), Some(5));
    }

    #[test]
    fn test_integer_to_radix() {
        assert_eq!(integer_to_radix(255, 16), "ff");
        assert_eq!(integer_to_radix(5, 2), "101");
        assert_eq!(integer_to_radix(0, 8), "0");
    }
}
