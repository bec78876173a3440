use std::fmt::{self, Display, Formatter};

use crate::object::{LoxStr, Obj, ObjRef};

pub type Number = f64;

#[derive(Debug, Clone)]
pub enum Value {
    Boolean(bool),
    Nil,
    Number(Number),
    Object(ObjRef),
}

impl Value {
    /// `nil` and `false` are falsey, everything else (including `0` and `""`) is truthy.
    pub fn is_falsey(&self) -> bool {
        matches!(self, Value::Nil | Value::Boolean(false))
    }

    pub fn as_number(&self) -> Option<Number> {
        match self {
            Value::Number(num) => Some(*num),
            _ => None,
        }
    }

    pub fn as_lox_str(&self) -> Option<&LoxStr> {
        match self {
            Value::Object(obj) => obj.as_lox_str(),
            _ => None,
        }
    }
}

/// Values of different variants are never equal. Strings compare by content.
impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::Nil, Value::Nil) => true,
            (Value::Boolean(lhs), Value::Boolean(rhs)) => lhs == rhs,
            (Value::Number(lhs), Value::Number(rhs)) => lhs == rhs,
            (Value::Object(lhs), Value::Object(rhs)) => **lhs == **rhs,
            _ => false,
        }
    }
}

impl Display for Value {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            Value::Boolean(boolean) => write!(f, "{}", boolean),
            Value::Nil => write!(f, "nil"),
            Value::Number(num) => f.write_str(&format_number(*num)),
            Value::Object(obj) => write!(f, "{}", obj),
        }
    }
}

/// Significant digits printed for a number.
const PRECISION: i32 = 6;

/// Formats `num` the way C's `%g` does: six significant digits, trailing zeros dropped,
/// and scientific notation when the decimal exponent is below -4 or at least six.
pub fn format_number(num: Number) -> String {
    if num.is_nan() {
        return "nan".to_owned();
    }
    if num.is_infinite() {
        return if num > 0.0 { "inf" } else { "-inf" }.to_owned();
    }

    // Rounding to the target precision first settles the exponent, e.g. 999999.5 -> 1e+06.
    let scientific = format!("{:.*e}", (PRECISION - 1) as usize, num);
    let (mantissa, exponent) = match scientific.split_once('e') {
        Some((mantissa, exponent)) => (mantissa, exponent.parse::<i32>().unwrap_or(0)),
        None => (scientific.as_str(), 0),
    };

    if exponent < -4 || exponent >= PRECISION {
        let sign = if exponent < 0 { '-' } else { '+' };
        format!(
            "{}e{}{:02}",
            strip_trailing_zeros(mantissa),
            sign,
            exponent.abs()
        )
    } else {
        let decimals = (PRECISION - 1 - exponent) as usize;
        strip_trailing_zeros(&format!("{:.*}", decimals, num)).to_owned()
    }
}

fn strip_trailing_zeros(digits: &str) -> &str {
    if digits.contains('.') {
        digits.trim_end_matches('0').trim_end_matches('.')
    } else {
        digits
    }
}

impl From<Number> for Value {
    fn from(num: Number) -> Self {
        Value::Number(num)
    }
}

impl From<bool> for Value {
    fn from(boolean: bool) -> Self {
        Value::Boolean(boolean)
    }
}

impl From<ObjRef> for Value {
    fn from(obj: ObjRef) -> Self {
        Value::Object(obj)
    }
}

impl From<Obj> for Value {
    fn from(obj: Obj) -> Self {
        Value::Object(ObjRef::new(obj))
    }
}

impl TryFrom<&Value> for Number {
    type Error = ();

    fn try_from(value: &Value) -> Result<Self, Self::Error> {
        value.as_number().ok_or(())
    }
}
