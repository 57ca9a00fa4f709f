//! Named update functions, registered once at startup and dispatched by
//! name from `update_cell`. Avoids loading or evaluating arbitrary code on
//! the hot path: every callable a trunk can invoke is a plain Rust closure
//! known ahead of time.

use std::collections::HashMap;

use crate::error::{NebError, Result};
use crate::value::{CellMap, CellValue};

pub type UpdateFn = Box<dyn Fn(&CellMap, &[CellValue]) -> Result<CellMap> + Send + Sync>;

pub struct FunctionRegistry {
    functions: HashMap<String, UpdateFn>,
}

impl FunctionRegistry {
    pub fn new() -> Self {
        Self { functions: HashMap::new() }
    }

    pub fn register(&mut self, name: impl Into<String>, f: UpdateFn) {
        self.functions.insert(name.into(), f);
    }

    pub fn call(&self, name: &str, current: &CellMap, args: &[CellValue]) -> Result<CellMap> {
        let f = self.functions.get(name).ok_or_else(|| NebError::FunctionNotFound(name.to_string()))?;
        f(current, args)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.functions.contains_key(name)
    }
}

impl Default for FunctionRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn set_field(name: &'static str) -> UpdateFn {
        Box::new(move |current, args| {
            let mut next = current.clone();
            let value = args.first().cloned().ok_or_else(|| NebError::Codec("missing argument".into()))?;
            next.insert(name.to_string(), value);
            Ok(next)
        })
    }

    #[test]
    fn call_dispatches_to_registered_function() {
        let mut registry = FunctionRegistry::new();
        registry.register("set_count", set_field("count"));

        let current: CellMap = [("count".to_string(), CellValue::Int(1))].into_iter().collect();
        let updated = registry.call("set_count", &current, &[CellValue::Int(5)]).unwrap();
        assert_eq!(updated.get("count"), Some(&CellValue::Int(5)));
    }

    #[test]
    fn call_unknown_function_errors() {
        let registry = FunctionRegistry::new();
        let current: CellMap = CellMap::new();
        let err = registry.call("missing", &current, &[]);
        assert!(matches!(err, Err(NebError::FunctionNotFound(_))));
    }
}
