//! Dynamically typed parameter values and their textual form.
//!
//! Every parameter is stored as a [`Value`] whose [`ValueKind`] is fixed when
//! the parameter is declared. Text is parsed with [`ValueKind::parse`] and
//! written back with [`Value::to_text`]; the two are inverse for every kind.
//!
//! | kind  | accepted on load                    | written on save |
//! |-------|-------------------------------------|-----------------|
//! | str   | verbatim                            | verbatim        |
//! | bool  | `true false 1 0 yes no`             | `true` `false`  |
//! | int   | decimal `i32`                       | decimal         |
//! | float | any `f64` literal                   | shortest exact  |
//! | vec3  | `x y z`                             | `x y z`         |
//! | quat  | `roll pitch yaw` (degrees), `w x y z` | `w x y z`     |

use std::fmt;

use glam::{DQuat, DVec3, EulerRot};

/// The declared type of a parameter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValueKind {
    Str,
    Bool,
    Int,
    Float,
    Vec3,
    Quat,
}

/// A parameter value of any supported kind.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Str(String),
    Bool(bool),
    Int(i32),
    Float(f64),
    Vec3(DVec3),
    Quat(DQuat),
}

impl ValueKind {
    /// Name used in error messages.
    pub fn type_name(self) -> &'static str {
        match self {
            ValueKind::Str => "string",
            ValueKind::Bool => "bool",
            ValueKind::Int => "int",
            ValueKind::Float => "float",
            ValueKind::Vec3 => "3-vector",
            ValueKind::Quat => "quaternion",
        }
    }

    /// Parse text as a value of this kind. `None` if the text does not fit.
    ///
    /// Strings are taken verbatim; every other kind ignores surrounding
    /// whitespace.
    pub fn parse(self, text: &str) -> Option<Value> {
        if self == ValueKind::Str {
            return Some(Value::Str(text.to_string()));
        }
        let text = text.trim();
        match self {
            ValueKind::Str => None,
            ValueKind::Bool => parse_bool(text).map(Value::Bool),
            ValueKind::Int => text.parse::<i32>().ok().map(Value::Int),
            ValueKind::Float => text.parse::<f64>().ok().map(Value::Float),
            ValueKind::Vec3 => match parse_floats(text)?.as_slice() {
                [x, y, z] => Some(Value::Vec3(DVec3::new(*x, *y, *z))),
                _ => None,
            },
            ValueKind::Quat => match parse_floats(text)?.as_slice() {
                [roll, pitch, yaw] => Some(Value::Quat(quat_from_rpy_degrees(*roll, *pitch, *yaw))),
                [w, x, y, z] => Some(Value::Quat(DQuat::from_xyzw(*x, *y, *z, *w))),
                _ => None,
            },
        }
    }
}

fn parse_bool(text: &str) -> Option<bool> {
    match text.to_ascii_lowercase().as_str() {
        "true" | "1" | "yes" => Some(true),
        "false" | "0" | "no" => Some(false),
        _ => None,
    }
}

fn parse_floats(text: &str) -> Option<Vec<f64>> {
    text.split_whitespace()
        .map(|part| part.parse::<f64>().ok())
        .collect()
}

/// Build a rotation from roll/pitch/yaw given in degrees.
pub fn quat_from_rpy_degrees(roll: f64, pitch: f64, yaw: f64) -> DQuat {
    DQuat::from_euler(
        EulerRot::ZYX,
        yaw.to_radians(),
        pitch.to_radians(),
        roll.to_radians(),
    )
}

impl Value {
    /// The kind of this value.
    pub fn kind(&self) -> ValueKind {
        match self {
            Value::Str(_) => ValueKind::Str,
            Value::Bool(_) => ValueKind::Bool,
            Value::Int(_) => ValueKind::Int,
            Value::Float(_) => ValueKind::Float,
            Value::Vec3(_) => ValueKind::Vec3,
            Value::Quat(_) => ValueKind::Quat,
        }
    }

    /// Text form accepted back by [`ValueKind::parse`].
    pub fn to_text(&self) -> String {
        self.to_string()
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Str(s) => f.write_str(s),
            Value::Bool(b) => write!(f, "{b}"),
            Value::Int(i) => write!(f, "{i}"),
            Value::Float(v) => write!(f, "{v}"),
            Value::Vec3(v) => write!(f, "{} {} {}", v.x, v.y, v.z),
            Value::Quat(q) => write!(f, "{} {} {} {}", q.w, q.x, q.y, q.z),
        }
    }
}

/// Rust types that can be stored in a parameter.
pub trait ParamValue: Clone + Default + Send + Sync + 'static {
    const KIND: ValueKind;

    fn into_value(self) -> Value;

    fn from_value(value: &Value) -> Option<Self>;
}

macro_rules! impl_param_value {
    ($ty:ty, $variant:ident) => {
        impl ParamValue for $ty {
            const KIND: ValueKind = ValueKind::$variant;

            fn into_value(self) -> Value {
                Value::$variant(self)
            }

            fn from_value(value: &Value) -> Option<Self> {
                match value {
                    Value::$variant(v) => Some(v.clone()),
                    _ => None,
                }
            }
        }
    };
}

impl_param_value!(String, Str);
impl_param_value!(bool, Bool);
impl_param_value!(i32, Int);
impl_param_value!(f64, Float);
impl_param_value!(DVec3, Vec3);
impl_param_value!(DQuat, Quat);
