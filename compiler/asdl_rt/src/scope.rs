//! Symbol tables.
//!
//! A [`SymbolTable`] maps names to symbol nodes in insertion order. Tables
//! form a tree: each one is owned by exactly one node (a function, a module,
//! a block) and keeps a plain [`ScopeId`] to its enclosing table for name
//! resolution. All tables of a compilation unit live in one [`Scopes`] arena.
//!
//! Every table also carries a `counter`, a number unique within its
//! [`Scopes`] that survives serialization and is how symbol references and
//! `parent_symtab` fields are written on the wire.

use std::fmt;
use std::ops::Index;

use indexmap::IndexMap;
use rustc_hash::FxHashMap;

use crate::arena::Idx;
use crate::ice;

/// Handle to a table in a [`Scopes`] arena.
#[derive(Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[repr(transparent)]
pub struct ScopeId(u32);

impl ScopeId {
    #[inline]
    pub const fn from_raw(raw: u32) -> Self {
        ScopeId(raw)
    }

    #[inline]
    pub const fn raw(self) -> u32 {
        self.0
    }

    #[inline]
    pub const fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Debug for ScopeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "scope#{}", self.0)
    }
}

/// An insertion-ordered name to symbol mapping.
///
/// `S` is the symbol node type, `O` the handle type used to name the node
/// that owns this table.
#[derive(Clone, Debug)]
pub struct SymbolTable<S, O> {
    counter: u64,
    parent: Option<ScopeId>,
    owner: Option<O>,
    symbols: IndexMap<String, Idx<S>>,
}

impl<S, O> SymbolTable<S, O> {
    /// Stable id of this table, written wherever the table is referenced.
    pub fn counter(&self) -> u64 {
        self.counter
    }

    /// Enclosing table. Not an ownership relation.
    pub fn parent(&self) -> Option<ScopeId> {
        self.parent
    }

    /// Node whose owning `symbol_table` field holds this table.
    pub fn owner(&self) -> Option<&O> {
        self.owner.as_ref()
    }

    pub fn get(&self, name: &str) -> Option<Idx<S>> {
        self.symbols.get(name).copied()
    }

    pub fn len(&self) -> usize {
        self.symbols.len()
    }

    pub fn is_empty(&self) -> bool {
        self.symbols.is_empty()
    }

    /// Entries in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, Idx<S>)> {
        self.symbols.iter().map(|(name, &sym)| (name.as_str(), sym))
    }
}

/// Arena of every symbol table in a compilation unit.
#[derive(Clone, Debug)]
pub struct Scopes<S, O> {
    tables: Vec<SymbolTable<S, O>>,
    by_counter: FxHashMap<u64, ScopeId>,
    /// Table and name each symbol was last inserted under.
    homes: FxHashMap<Idx<S>, (ScopeId, String)>,
    /// One past the largest counter in use; `None` once `u64::MAX` is taken.
    next_counter: Option<u64>,
}

impl<S, O> Default for Scopes<S, O> {
    fn default() -> Self {
        Self::new()
    }
}

impl<S, O> Scopes<S, O> {
    pub fn new() -> Self {
        Scopes {
            tables: Vec::new(),
            by_counter: FxHashMap::default(),
            homes: FxHashMap::default(),
            next_counter: Some(1),
        }
    }

    /// Create a table with a fresh counter.
    ///
    /// Fresh counters are handed out above the largest one in use, so once a
    /// table holds `u64::MAX` there are none left; asking for one then is an
    /// internal error.
    pub fn new_scope(&mut self, parent: Option<ScopeId>) -> ScopeId {
        let Some(counter) = self.next_counter else {
            ice::counters_exhausted()
        };
        self.push(parent, counter)
    }

    /// Create a table with a caller-chosen counter.
    ///
    /// Returns `None` if the counter is already taken. Fresh counters handed
    /// out afterwards never collide with it.
    pub fn new_scope_with_counter(&mut self, parent: Option<ScopeId>, counter: u64) -> Option<ScopeId> {
        if self.by_counter.contains_key(&counter) {
            return None;
        }
        Some(self.push(parent, counter))
    }

    fn push(&mut self, parent: Option<ScopeId>, counter: u64) -> ScopeId {
        let Ok(raw) = u32::try_from(self.tables.len()) else {
            ice::arena_overflow("SymbolTable")
        };
        let id = ScopeId(raw);
        self.tables.push(SymbolTable {
            counter,
            parent,
            owner: None,
            symbols: IndexMap::new(),
        });
        self.by_counter.insert(counter, id);
        self.next_counter = match (self.next_counter, counter.checked_add(1)) {
            (Some(next), Some(after)) => Some(next.max(after)),
            _ => None,
        };
        id
    }

    /// Drop every table created after the first `len`, along with the
    /// entries they hold. Counters they used become free again.
    ///
    /// Tables are only ever appended, so this undoes a batch of
    /// [`Scopes::new_scope`] calls such as a failed decode.
    pub fn truncate(&mut self, len: usize) {
        if len >= self.tables.len() {
            return;
        }
        self.tables.truncate(len);
        self.by_counter.retain(|_, scope| scope.index() < len);
        self.homes.retain(|_, (scope, _)| scope.index() < len);
        self.next_counter = match self.by_counter.keys().max() {
            Some(max) => max.checked_add(1),
            None => Some(1),
        };
    }

    pub fn get(&self, scope: ScopeId) -> Option<&SymbolTable<S, O>> {
        self.tables.get(scope.index())
    }

    fn table_mut(&mut self, scope: ScopeId) -> &mut SymbolTable<S, O> {
        match self.tables.get_mut(scope.index()) {
            Some(table) => table,
            None => ice::unknown_scope(scope.raw()),
        }
    }

    /// Find a table by its counter.
    pub fn by_counter(&self, counter: u64) -> Option<ScopeId> {
        self.by_counter.get(&counter).copied()
    }

    /// Record the node owning `scope`.
    pub fn set_owner(&mut self, scope: ScopeId, owner: O) {
        self.table_mut(scope).owner = Some(owner);
    }

    /// Insert `sym` under `name`, returning the symbol it replaces.
    ///
    /// Replacing keeps the entry's position.
    pub fn add_symbol(&mut self, scope: ScopeId, name: impl Into<String>, sym: Idx<S>) -> Option<Idx<S>> {
        let name = name.into();
        let previous = self.table_mut(scope).symbols.insert(name.clone(), sym);
        if let Some(old) = previous {
            self.homes.remove(&old);
        }
        self.homes.insert(sym, (scope, name));
        previous
    }

    pub fn remove_symbol(&mut self, scope: ScopeId, name: &str) -> Option<Idx<S>> {
        let removed = self.table_mut(scope).symbols.shift_remove(name)?;
        self.homes.remove(&removed);
        Some(removed)
    }

    /// Move an entry to the end of its table's iteration order.
    pub fn move_to_end(&mut self, scope: ScopeId, name: &str) {
        let table = self.table_mut(scope);
        if let Some(sym) = table.symbols.shift_remove(name) {
            table.symbols.insert(name.to_string(), sym);
        }
    }

    /// Look `name` up in `scope` only.
    pub fn lookup(&self, scope: ScopeId, name: &str) -> Option<Idx<S>> {
        self.get(scope)?.get(name)
    }

    /// Look `name` up in `scope`, then in each enclosing table.
    pub fn resolve(&self, scope: ScopeId, name: &str) -> Option<Idx<S>> {
        let mut current = Some(scope);
        while let Some(id) = current {
            let table = self.get(id)?;
            if let Some(sym) = table.get(name) {
                return Some(sym);
            }
            current = table.parent;
        }
        None
    }

    /// The table and name a symbol is stored under.
    pub fn home(&self, sym: Idx<S>) -> Option<(ScopeId, &str)> {
        self.homes
            .get(&sym)
            .map(|(scope, name)| (*scope, name.as_str()))
    }

    pub fn len(&self) -> usize {
        self.tables.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tables.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (ScopeId, &SymbolTable<S, O>)> {
        self.tables
            .iter()
            .enumerate()
            .filter_map(|(i, table)| Some((ScopeId(u32::try_from(i).ok()?), table)))
    }
}

impl<S, O> Index<ScopeId> for Scopes<S, O> {
    type Output = SymbolTable<S, O>;

    fn index(&self, scope: ScopeId) -> &SymbolTable<S, O> {
        match self.get(scope) {
            Some(table) => table,
            None => ice::unknown_scope(scope.raw()),
        }
    }
}
