use std::sync::RwLock;

use dashmap::DashMap;

/// Local message handlers: `name -> handler`, plus one default handler for
/// calls that carry no `handlerName`.
pub struct HandlerRegistry<H> {
    named: DashMap<String, H>,
    default: RwLock<Option<H>>,
}

impl<H> Default for HandlerRegistry<H> {
    fn default() -> Self {
        Self::new()
    }
}

impl<H> HandlerRegistry<H> {
    pub fn new() -> Self {
        Self {
            named: DashMap::new(),
            default: RwLock::new(None),
        }
    }

    /// Last writer wins. Returns the replaced handler, if any.
    pub fn register(&self, name: impl Into<String>, handler: H) -> Option<H> {
        self.named.insert(name.into(), handler)
    }

    pub fn set_default(&self, handler: H) {
        let mut slot = self.default.write().unwrap_or_else(|e| e.into_inner());
        *slot = Some(handler);
    }

    pub fn has_default(&self) -> bool {
        self.default
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .is_some()
    }

    pub fn registered_names(&self) -> Vec<String> {
        self.named.iter().map(|e| e.key().clone()).collect()
    }

    pub fn clear(&self) {
        self.named.clear();
        self.default
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .take();
    }
}

impl<H: Clone> HandlerRegistry<H> {
    pub fn lookup(&self, name: &str) -> Option<H> {
        self.named.get(name).map(|e| e.value().clone())
    }

    pub fn default_handler(&self) -> Option<H> {
        self.default
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    /// Named lookup when `name` is given, the default handler otherwise.
    /// A named miss does not fall back to the default.
    pub fn resolve(&self, name: Option<&str>) -> Option<H> {
        match name {
            Some(name) => self.lookup(name),
            None => self.default_handler(),
        }
    }
}
