use std::{
    collections::{BTreeMap, HashSet},
    rc::Rc,
};

pub type TagValue = Rc<str>;

/// Ordered so that serialization is stable and tag sets compare cheaply.
pub type Tags = BTreeMap<String, TagValue>;

/// Shares identical tag values between elements. Owned by one conversion run.
#[derive(Default)]
pub struct ValueCache {
    values: HashSet<Rc<str>>,
}

impl ValueCache {
    pub fn new() -> Self {
        Self {
            values: HashSet::new(),
        }
    }

    pub fn intern(&mut self, value: &str) -> TagValue {
        if let Some(existing) = self.values.get(value) {
            return existing.clone();
        }
        let value: Rc<str> = Rc::from(value);
        self.values.insert(value.clone());
        value
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }
}

pub fn tag_value(value: &str) -> TagValue {
    Rc::from(value)
}
