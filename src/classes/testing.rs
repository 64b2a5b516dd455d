/*!

A minimal `Instance` used across the crate's test suites, standing in for a "real" domain
object (a `Hummer`, a `PlainObject`, a `Tricycle`) without each module needing to define
its own throwaway struct.

*/

use std::collections::HashMap;
use std::sync::Arc;

use super::class_id::ClassId;
use super::instance::{Instance, Value};
use super::registry::CLASS_REGISTRY;
use crate::adapt::ProtocolId;

#[derive(Debug)]
pub struct FixedAttrs {
  class: ClassId,
  attrs: HashMap<String, Value>,
}

impl FixedAttrs {
  /// A one-attribute instance of an ad hoc class named after the attribute, registered
  /// with no bases beyond the universal root.
  pub fn new(attr_name: &str, value: Value) -> FixedAttrs {
    let class = CLASS_REGISTRY.register(format!("Test_{attr_name}"), &[]);
    let mut attrs = HashMap::new();
    attrs.insert(attr_name.to_string(), value);
    FixedAttrs { class, attrs }
  }

  pub fn with_class(class: ClassId, attrs: Vec<(&str, Value)>) -> FixedAttrs {
    FixedAttrs {
      class,
      attrs: attrs.into_iter().map(|(k, v)| (k.to_string(), v)).collect(),
    }
  }
}

impl Instance for FixedAttrs {
  fn class(&self) -> ClassId {
    self.class
  }

  fn get_attr(&self, name: &str) -> Option<Value> {
    self.attrs.get(name).cloned()
  }
}

pub fn object(attr_name: &str, value: Value) -> Value {
  Value::object(Arc::new(FixedAttrs::new(attr_name, value)))
}

pub fn object_of_class(class: ClassId, attrs: Vec<(&str, Value)>) -> Value {
  Value::object(Arc::new(FixedAttrs::with_class(class, attrs)))
}

#[derive(Debug)]
pub struct ConformingInstance {
  class: ClassId,
  conformed: HashMap<String, Value>,
}

impl ConformingInstance {
  pub fn new(class: ClassId) -> ConformingInstance {
    ConformingInstance { class, conformed: HashMap::new() }
  }

  pub fn conforms_to(mut self, protocol: &str, value: Value) -> Self {
    self.conformed.insert(protocol.to_string(), value);
    self
  }
}

impl Instance for ConformingInstance {
  fn class(&self) -> ClassId {
    self.class
  }

  fn conform(&self, protocol: ProtocolId) -> Option<Value> {
    self.conformed.get(&protocol.name().to_string()).cloned()
  }
}
