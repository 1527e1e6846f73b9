// library.rs — Function library: named function definitions
//
// Owns every `FunctionDef` reachable by name from a program. The pass
// threads one library handle through all recursive calls; there is no
// global registry.
//
// Preconditions: none.
// Postconditions: every stored definition's signature name equals its key.
// Failure modes: lookup of an unknown name, insertion of a conflicting
//                definition → library errors.
// Side effects: none.

use std::collections::{BTreeMap, BTreeSet};

use crate::attr::{AttrMap, AttrValue, NameAttrList};
use crate::error::{RearrangeError, Result};
use crate::function::{FunctionBody, FunctionDef};
use crate::graph::Graph;

#[derive(Debug, Clone, Default)]
pub struct FunctionLibrary {
    functions: BTreeMap<String, FunctionDef>,
}

impl FunctionLibrary {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_defs(defs: impl IntoIterator<Item = FunctionDef>) -> Result<Self> {
        let mut library = FunctionLibrary::new();
        for fdef in defs {
            library.add_function_def(fdef)?;
        }
        Ok(library)
    }

    pub fn len(&self) -> usize {
        self.functions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.functions.is_empty()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.functions.contains_key(name)
    }

    pub fn find(&self, name: &str) -> Option<&FunctionDef> {
        self.functions.get(name)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.functions.keys().map(String::as_str)
    }

    pub fn functions(&self) -> impl Iterator<Item = &FunctionDef> {
        self.functions.values()
    }

    /// Return `prefix` followed by the smallest counter that does not name
    /// an existing function. The name is not reserved until a definition is
    /// added under it.
    pub fn unique_function_name(&self, prefix: &str) -> String {
        let mut counter = 0usize;
        loop {
            let candidate = format!("{}{}", prefix, counter);
            if !self.functions.contains_key(&candidate) {
                return candidate;
            }
            counter += 1;
        }
    }

    /// Insert a new function. Re-adding an identical definition is a no-op.
    pub fn add_function_def(&mut self, fdef: FunctionDef) -> Result<()> {
        match self.functions.get(fdef.name()) {
            Some(existing) if *existing == fdef => Ok(()),
            Some(_) => Err(RearrangeError::DuplicateFunction {
                name: fdef.name().to_string(),
            }),
            None => {
                self.functions.insert(fdef.name().to_string(), fdef);
                Ok(())
            }
        }
    }

    /// Replace the definition stored under `name`.
    pub fn replace_function(&mut self, name: &str, mut fdef: FunctionDef) -> Result<()> {
        let slot = self
            .functions
            .get_mut(name)
            .ok_or_else(|| RearrangeError::FunctionNotFound {
                name: name.to_string(),
            })?;
        fdef.signature.name = name.to_string();
        *slot = fdef;
        Ok(())
    }

    pub fn remove_function(&mut self, name: &str) -> Option<FunctionDef> {
        self.functions.remove(name)
    }

    /// Instantiate `name` with `attrs` bound.
    pub fn instantiate(&self, name: &str, attrs: &AttrMap) -> Result<FunctionBody> {
        let fdef = self.find(name).ok_or_else(|| RearrangeError::FunctionNotFound {
            name: name.to_string(),
        })?;
        FunctionBody::instantiate(fdef, attrs)
    }

    /// Names of library functions an op with these attributes refers to.
    pub fn referenced_functions(&self, op: &str, attrs: &AttrMap) -> Vec<String> {
        let mut names = Vec::new();
        if self.contains(op) {
            names.push(op.to_string());
        }
        for value in attrs.values() {
            collect_func_names(value, &mut names);
        }
        names
    }

    /// Drop every function not transitively reachable from `graph`.
    /// Returns the removed names in order.
    pub fn prune_unreachable(&mut self, graph: &Graph) -> Vec<String> {
        let mut reachable = BTreeSet::new();
        let mut worklist: Vec<String> = graph
            .nodes()
            .flat_map(|n| self.referenced_functions(n.kind.op(), &n.attrs))
            .collect();
        while let Some(name) = worklist.pop() {
            if !reachable.insert(name.clone()) {
                continue;
            }
            if let Some(fdef) = self.functions.get(&name) {
                for node in &fdef.nodes {
                    worklist.extend(self.referenced_functions(&node.op, &node.attrs));
                }
            }
        }
        let removed: Vec<String> = self
            .functions
            .keys()
            .filter(|name| !reachable.contains(*name))
            .cloned()
            .collect();
        for name in &removed {
            self.functions.remove(name);
        }
        removed
    }

    /// Compact JSON of all definitions in name order.
    pub fn canonical_json(&self) -> String {
        let defs: Vec<&FunctionDef> = self.functions.values().collect();
        serde_json::to_string(&defs).unwrap_or_default()
    }

    /// SHA-256 of `canonical_json()`.
    pub fn fingerprint(&self) -> [u8; 32] {
        use sha2::{Digest, Sha256};

        let mut hasher = Sha256::new();
        hasher.update(self.canonical_json().as_bytes());
        let result = hasher.finalize();
        let mut hash = [0u8; 32];
        hash.copy_from_slice(&result);
        hash
    }

    pub fn fingerprint_hex(&self) -> String {
        let mut s = String::with_capacity(64);
        for b in self.fingerprint() {
            use std::fmt::Write;
            let _ = write!(s, "{:02x}", b);
        }
        s
    }

    pub fn to_defs(&self) -> Vec<FunctionDef> {
        self.functions.values().cloned().collect()
    }
}

fn collect_func_names(value: &AttrValue, out: &mut Vec<String>) {
    match value {
        AttrValue::Func(f) => collect_from_ref(f, out),
        AttrValue::FuncList(fs) => {
            for f in fs {
                collect_from_ref(f, out);
            }
        }
        _ => {}
    }
}

fn collect_from_ref(func: &NameAttrList, out: &mut Vec<String>) {
    out.push(func.name.clone());
    for value in func.attrs.values() {
        collect_func_names(value, out);
    }
}
