//! Typed, named parameters bound to configuration nodes.
//!
//! An owner (model, body, joint, controller) declares its parameters once in
//! a [`ParamTable`] and keeps the returned [`ParamKey`]s for typed access. The
//! table loads every entry from a [`ConfigNode`], saves every entry back as
//! `name="value"` lines, and accepts runtime updates by key or by name.
//!
//! An entry may carry a hook of the table's hook type `H`. Hooks are not
//! called by the table itself: `load`, `set` and `set_by_name` hand each hook
//! to a caller-supplied `fire` closure together with the new value, so the
//! owner decides what state the hook can reach. A hook fires exactly once per
//! successful load or set of its entry and never when that operation fails.
//!
//! Optional entries model "absent means unset": when missing from the node
//! they keep their default, do not fire, are reported as not explicit, and
//! are skipped on save.

pub mod value;

use std::marker::PhantomData;

use quick_xml::escape::escape;

use crate::configtree::ConfigNode;
use crate::error::{Result, SimError};
use value::{ParamValue, Value};

/// Typed handle to one entry of a [`ParamTable`].
pub struct ParamKey<T> {
    index: usize,
    _marker: PhantomData<fn() -> T>,
}

impl<T> Clone for ParamKey<T> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<T> Copy for ParamKey<T> {}

impl<T> std::fmt::Debug for ParamKey<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "ParamKey({})", self.index)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Presence {
    Normal,
    Required,
    Optional,
}

#[derive(Debug, Clone)]
struct ParamEntry<H> {
    name: &'static str,
    default: Value,
    value: Value,
    presence: Presence,
    explicit: bool,
    hook: Option<H>,
}

/// Ordered table of parameter descriptors and their current values.
#[derive(Debug, Clone)]
pub struct ParamTable<H = ()> {
    entries: Vec<ParamEntry<H>>,
}

impl<H: Copy> Default for ParamTable<H> {
    fn default() -> Self {
        Self::new()
    }
}

impl<H: Copy> ParamTable<H> {
    pub fn new() -> Self {
        Self {
            entries: Vec::new(),
        }
    }

    fn push<T: ParamValue>(&mut self, name: &'static str, default: T, presence: Presence) -> ParamKey<T> {
        let default = default.into_value();
        self.entries.push(ParamEntry {
            name,
            value: default.clone(),
            default,
            presence,
            explicit: false,
            hook: None,
        });
        ParamKey {
            index: self.entries.len() - 1,
            _marker: PhantomData,
        }
    }

    /// Declare a parameter that falls back to `default` when absent.
    pub fn declare<T: ParamValue>(&mut self, name: &'static str, default: T) -> ParamKey<T> {
        self.push(name, default, Presence::Normal)
    }

    /// Declare a parameter whose absence fails the load.
    pub fn declare_required<T: ParamValue>(&mut self, name: &'static str, default: T) -> ParamKey<T> {
        self.push(name, default, Presence::Required)
    }

    /// Declare a parameter that stays unset when absent.
    pub fn declare_optional<T: ParamValue>(&mut self, name: &'static str, default: T) -> ParamKey<T> {
        self.push(name, default, Presence::Optional)
    }

    /// Attach the post-set hook of an entry.
    pub fn with_hook<T>(&mut self, key: ParamKey<T>, hook: H) -> ParamKey<T> {
        self.entries[key.index].hook = Some(hook);
        key
    }

    /// Current value of an entry.
    pub fn get<T: ParamValue>(&self, key: ParamKey<T>) -> T {
        T::from_value(&self.entries[key.index].value).unwrap_or_default()
    }

    /// Declared name of an entry.
    pub fn name_of<T>(&self, key: ParamKey<T>) -> &'static str {
        self.entries[key.index].name
    }

    /// Whether an entry was given a value by a node or a set call.
    pub fn is_explicit<T>(&self, key: ParamKey<T>) -> bool {
        self.entries[key.index].explicit
    }

    /// Current value by name.
    pub fn value(&self, name: &str) -> Option<&Value> {
        self.entries.iter().find(|e| e.name == name).map(|e| &e.value)
    }

    /// Declared names, in declaration order.
    pub fn names(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.entries.iter().map(|e| e.name)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn load_index(&mut self, index: usize, node: &ConfigNode, fire: &mut impl FnMut(H, &Value)) -> Result<()> {
        let entry = &mut self.entries[index];
        match node.raw_value(entry.name) {
            Some(raw) => {
                let parsed = entry.default.kind().parse(raw).ok_or_else(|| SimError::InvalidParameter {
                    param: entry.name.to_string(),
                    value: raw.to_string(),
                    expected: entry.default.kind().type_name(),
                })?;
                entry.value = parsed;
                entry.explicit = true;
            }
            None => match entry.presence {
                Presence::Required => {
                    return Err(SimError::MissingRequiredParameter {
                        param: entry.name.to_string(),
                        element: node.tag(),
                    });
                }
                Presence::Optional => {
                    entry.value = entry.default.clone();
                    entry.explicit = false;
                    return Ok(());
                }
                Presence::Normal => {
                    entry.value = entry.default.clone();
                    entry.explicit = false;
                }
            },
        }
        if let Some(hook) = entry.hook {
            fire(hook, &entry.value);
        }
        Ok(())
    }

    /// Load one entry from `node`.
    pub fn load<T: ParamValue>(
        &mut self,
        key: ParamKey<T>,
        node: &ConfigNode,
        mut fire: impl FnMut(H, &Value),
    ) -> Result<()> {
        self.load_index(key.index, node, &mut fire)
    }

    /// Load every entry in declaration order, stopping at the first failure.
    pub fn load_all(&mut self, node: &ConfigNode, mut fire: impl FnMut(H, &Value)) -> Result<()> {
        for index in 0..self.entries.len() {
            self.load_index(index, node, &mut fire)?;
        }
        Ok(())
    }

    /// Store a new value and fire the entry's hook.
    pub fn set<T: ParamValue>(&mut self, key: ParamKey<T>, value: T, mut fire: impl FnMut(H, &Value)) {
        let entry = &mut self.entries[key.index];
        entry.value = value.into_value();
        entry.explicit = true;
        if let Some(hook) = entry.hook {
            fire(hook, &entry.value);
        }
    }

    /// Store a new value without firing the hook.
    pub fn store<T: ParamValue>(&mut self, key: ParamKey<T>, value: T) {
        let entry = &mut self.entries[key.index];
        entry.value = value.into_value();
        entry.explicit = true;
    }

    /// Parse `text` into the named entry and fire its hook.
    pub fn set_by_name(&mut self, name: &str, text: &str, mut fire: impl FnMut(H, &Value)) -> Result<()> {
        let entry = self
            .entries
            .iter_mut()
            .find(|e| e.name == name)
            .ok_or_else(|| SimError::UnknownParameter(name.to_string()))?;
        let kind = entry.default.kind();
        entry.value = kind.parse(text).ok_or_else(|| SimError::InvalidParameter {
            param: name.to_string(),
            value: text.to_string(),
            expected: kind.type_name(),
        })?;
        entry.explicit = true;
        if let Some(hook) = entry.hook {
            fire(hook, &entry.value);
        }
        Ok(())
    }

    /// Append one `name="value"` line per entry, each preceded by `prefix`.
    pub fn save(&self, prefix: &str, out: &mut String) {
        for entry in &self.entries {
            if entry.presence == Presence::Optional && !entry.explicit {
                continue;
            }
            let text = entry.value.to_text();
            out.push_str(prefix);
            out.push_str(entry.name);
            out.push_str("=\"");
            out.push_str(&escape(text.as_str()));
            out.push_str("\"\n");
        }
    }
}
