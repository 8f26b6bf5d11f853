use std::collections::HashMap;
use std::rc::Rc;

use crate::dataloop::DataLoop;

/// A string-to-id interner for the typed-property ("POD") system used by
/// general node property/format/parameter blobs. The core treats the
/// blobs themselves as opaque (§1); `TypeMap` is the one piece of that
/// system nodes are expected to depend on, since it's how a node turns a
/// property key name into the small integer id its blob encoding uses.
pub trait TypeMap {
    /// Intern `name`, returning a stable id. Interning the same name twice
    /// returns the same id.
    fn id_of(&mut self, name: &str) -> u32;

    /// Reverse lookup, for debugging/logging.
    fn name_of(&self, id: u32) -> Option<&str>;
}

/// A minimal in-process `TypeMap`, sufficient for tests and simple hosts
/// that don't need to interoperate with an external registry.
#[derive(Default)]
pub struct LocalTypeMap {
    by_name: HashMap<String, u32>,
    by_id: Vec<String>,
}

impl TypeMap for LocalTypeMap {
    fn id_of(&mut self, name: &str) -> u32 {
        if let Some(&id) = self.by_name.get(name) {
            return id;
        }
        let id = self.by_id.len() as u32;
        self.by_id.push(name.to_string());
        self.by_name.insert(name.to_string(), id);
        id
    }

    fn name_of(&self, id: u32) -> Option<&str> {
        self.by_id.get(id as usize).map(|s| s.as_str())
    }
}

/// A logging handle scoped to one node. Rather than a custom sink
/// abstraction, this is a thin wrapper over the `log` facade crate that
/// tags every record with the owning node's debug name so multi-node
/// graphs produce attributable log lines — the sink itself (format,
/// destination) stays entirely a host concern, configured by whatever
/// backend the host installs as the global `log` logger.
#[derive(Clone, Copy)]
pub struct Log {
    node_name: &'static str,
}

impl Log {
    pub fn new(node_name: &'static str) -> Self {
        Self { node_name }
    }

    pub fn error(&self, msg: &str) {
        log::error!(target: "mediagraph::node", "[{}] {}", self.node_name, msg);
    }

    pub fn warn(&self, msg: &str) {
        log::warn!(target: "mediagraph::node", "[{}] {}", self.node_name, msg);
    }

    pub fn debug(&self, msg: &str) {
        log::debug!(target: "mediagraph::node", "[{}] {}", self.node_name, msg);
    }

    pub fn trace(&self, msg: &str) {
        log::trace!(target: "mediagraph::node", "[{}] {}", self.node_name, msg);
    }
}

/// The keyed bag of named services a node may require at construction
/// (spec §6). A node refuses to initialize without a `TypeMap`; it refuses
/// to accept callbacks that require asynchronous completion without a
/// `DataLoop`.
#[derive(Clone)]
pub struct Support {
    type_map: Rc<std::cell::RefCell<dyn TypeMap>>,
    data_loop: Option<Rc<dyn DataLoop>>,
}

impl Support {
    pub fn new(type_map: Rc<std::cell::RefCell<dyn TypeMap>>) -> Self {
        Self {
            type_map,
            data_loop: None,
        }
    }

    pub fn with_data_loop(mut self, data_loop: Rc<dyn DataLoop>) -> Self {
        self.data_loop = Some(data_loop);
        self
    }

    pub fn type_map(&self) -> &Rc<std::cell::RefCell<dyn TypeMap>> {
        &self.type_map
    }

    pub fn data_loop(&self) -> Option<&Rc<dyn DataLoop>> {
        self.data_loop.as_ref()
    }
}
