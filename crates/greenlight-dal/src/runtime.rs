use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize, de};

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("invalid runtime format")]
pub struct InvalidRuntimeFormat;

/// Movie duration in minutes, represented in JSON as `"<n> mins"`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord)]
pub struct Runtime(pub i32);

impl Runtime {
    pub fn minutes(self) -> i32 {
        self.0
    }

    pub fn is_zero(&self) -> bool {
        self.0 == 0
    }
}

impl From<i32> for Runtime {
    fn from(value: i32) -> Self {
        Runtime(value)
    }
}

impl fmt::Display for Runtime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} mins", self.0)
    }
}

impl FromStr for Runtime {
    type Err = InvalidRuntimeFormat;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let parts: Vec<&str> = s.split(' ').collect();
        match parts.as_slice() {
            [number, "mins"] => number
                .parse::<i32>()
                .map(Runtime)
                .map_err(|_| InvalidRuntimeFormat),
            _ => Err(InvalidRuntimeFormat),
        }
    }
}

impl Serialize for Runtime {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.collect_str(self)
    }
}

struct RuntimeVisitor;

impl RuntimeVisitor {
    fn reject<E: de::Error>(self) -> Result<Runtime, E> {
        Err(E::custom(InvalidRuntimeFormat))
    }
}

// Anything but a string is reported as a format error, not as a type mismatch.
impl<'de> de::Visitor<'de> for RuntimeVisitor {
    type Value = Runtime;

    fn expecting(&self, formatter: &mut fmt::Formatter) -> fmt::Result {
        formatter.write_str("a string like \"<number> mins\"")
    }

    fn visit_str<E: de::Error>(self, v: &str) -> Result<Self::Value, E> {
        v.parse().map_err(E::custom)
    }

    fn visit_bool<E: de::Error>(self, _v: bool) -> Result<Self::Value, E> {
        self.reject()
    }

    fn visit_i64<E: de::Error>(self, _v: i64) -> Result<Self::Value, E> {
        self.reject()
    }

    fn visit_u64<E: de::Error>(self, _v: u64) -> Result<Self::Value, E> {
        self.reject()
    }

    fn visit_f64<E: de::Error>(self, _v: f64) -> Result<Self::Value, E> {
        self.reject()
    }

    fn visit_unit<E: de::Error>(self) -> Result<Self::Value, E> {
        self.reject()
    }

    fn visit_seq<A: de::SeqAccess<'de>>(self, _seq: A) -> Result<Self::Value, A::Error> {
        self.reject()
    }

    fn visit_map<A: de::MapAccess<'de>>(self, _map: A) -> Result<Self::Value, A::Error> {
        self.reject()
    }
}

impl<'de> Deserialize<'de> for Runtime {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        deserializer.deserialize_any(RuntimeVisitor)
    }
}
