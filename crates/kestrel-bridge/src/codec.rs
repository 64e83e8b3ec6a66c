//! Structural codec between JSON messages and runtime values.
//!
//! Inbound JSON decodes to plain runtime values: arrays become
//! `List<dynamic>`, objects become immutable `Map<String, dynamic>` views
//! whose key list is computed on first use, and primitives pass through.
//!
//! Outbound values encode structurally where JSON has a shape for them.
//! Everything else (instances, closures, records, host objects, futures)
//! is replaced by an opaque marker naming its runtime type:
//!
//! ```text
//! {"$opaque": "Future<int>"}
//! ```

use crate::error::BridgeError;
use indexmap::IndexMap;
use kestrel_common::limits::MAX_MESSAGE_DEPTH;
use kestrel_rti::{Arguments, MapKey, MapValue, RuntimeError, Thrown, TypeId, TypeUniverse, Value};
use serde_json::{Map as JsonMap, Number, Value as Json};
use std::rc::Rc;
use tracing::trace;

/// Key of the marker object that stands in for a non-structural value.
pub const OPAQUE_KEY: &str = "$opaque";

/// Converts between JSON and runtime values using one type universe.
#[derive(Clone)]
pub struct MessageCodec {
    universe: Rc<TypeUniverse>,
}

impl MessageCodec {
    pub fn new(universe: Rc<TypeUniverse>) -> Self {
        Self { universe }
    }

    pub fn universe(&self) -> &Rc<TypeUniverse> {
        &self.universe
    }

    // =========================================================================
    // Decoding
    // =========================================================================

    /// Parse message text and decode it.
    pub fn decode_str(&self, text: &str) -> Result<Value, BridgeError> {
        let json: Json = serde_json::from_str(text)?;
        Ok(self.decode(&json))
    }

    pub fn decode(&self, json: &Json) -> Value {
        match json {
            Json::Null => Value::Null,
            Json::Bool(b) => Value::Bool(*b),
            Json::Number(n) => decode_number(n),
            Json::String(s) => Value::str(s),
            Json::Array(items) => {
                let items = items.iter().map(|item| self.decode(item)).collect();
                Value::list(TypeId::DYNAMIC, items)
            }
            Json::Object(fields) => {
                let entries: IndexMap<MapKey, Value> = fields
                    .iter()
                    .map(|(key, field)| (MapKey::from(key.as_str()), self.decode(field)))
                    .collect();
                trace!(fields = entries.len(), "decoded host object");
                Value::Map(Rc::new(MapValue::from_host(entries)))
            }
        }
    }

    /// Wrap a host function as a `dynamic Function(dynamic, ...)` closure.
    ///
    /// Arguments reach the host as JSON and the host's answer is decoded
    /// back, so the function only ever sees structural data.
    pub fn host_function(
        &self,
        name: &str,
        arity: usize,
        function: impl Fn(Vec<Json>) -> Result<Json, String> + 'static,
    ) -> Result<Value, RuntimeError> {
        let params = vec!["@"; arity].join(",");
        let signature = format!("@({params})");
        let codec = self.clone();
        let label = name.to_string();
        self.universe.static_tear_off(name, &signature, move |args: &Arguments| {
            let encoded = args
                .positional
                .iter()
                .map(|arg| codec.encode(arg))
                .collect::<Result<Vec<_>, _>>()
                .map_err(|err| Thrown::from(RuntimeError::argument(err.to_string())))?;
            match function(encoded) {
                Ok(result) => Ok(codec.decode(&result)),
                Err(message) => Err(Thrown::from(RuntimeError::state(format!(
                    "host function '{label}' failed: {message}"
                )))),
            }
        })
    }

    // =========================================================================
    // Encoding
    // =========================================================================

    pub fn encode_to_string(&self, value: &Value) -> Result<String, BridgeError> {
        Ok(serde_json::to_string(&self.encode(value)?)?)
    }

    pub fn encode(&self, value: &Value) -> Result<Json, BridgeError> {
        self.encode_at(value, 0)
    }

    fn encode_at(&self, value: &Value, depth: usize) -> Result<Json, BridgeError> {
        if depth > MAX_MESSAGE_DEPTH {
            return Err(BridgeError::TooDeep {
                limit: MAX_MESSAGE_DEPTH,
            });
        }
        let json = match value {
            Value::Null => Json::Null,
            Value::Bool(b) => Json::Bool(*b),
            Value::Int(i) => Json::Number(Number::from(*i)),
            Value::Double(d) => match Number::from_f64(*d) {
                Some(n) => Json::Number(n),
                // NaN and the infinities have no JSON spelling.
                None => self.opaque(value),
            },
            Value::Str(s) => Json::String(s.to_string()),
            Value::List(list) => Json::Array(
                list.to_vec()
                    .iter()
                    .map(|item| self.encode_at(item, depth + 1))
                    .collect::<Result<_, _>>()?,
            ),
            Value::Map(map) => {
                let entries = map.entries();
                if !entries.iter().all(|(key, _)| matches!(key, MapKey::Str(_))) {
                    return Ok(self.opaque(value));
                }
                let mut object = JsonMap::with_capacity(entries.len());
                for (key, field) in entries {
                    if let MapKey::Str(key) = key {
                        object.insert(key.to_string(), self.encode_at(&field, depth + 1)?);
                    }
                }
                Json::Object(object)
            }
            _ => self.opaque(value),
        };
        Ok(json)
    }

    fn opaque(&self, value: &Value) -> Json {
        let ty = self.universe.runtime_type_of(value);
        let mut marker = JsonMap::new();
        marker.insert(
            OPAQUE_KEY.to_string(),
            Json::String(self.universe.display(ty)),
        );
        Json::Object(marker)
    }
}

fn decode_number(n: &Number) -> Value {
    match n.as_i64() {
        Some(i) => Value::Int(i),
        None => Value::Double(n.as_f64().unwrap_or(f64::NAN)),
    }
}

#[cfg(test)]
#[path = "../tests/codec_tests.rs"]
mod tests;
