use crate::intern::Symbol;
use crate::value::ValueType;

/// A single local variable slot within a `ScopeUnit`. `depth` is the lexical
/// nesting depth (the scanner's indentation `depth`, not a byte offset) at
/// which this local was declared; it is used to know which locals go out of
/// scope when a block ends.
#[derive(Debug, Clone)]
pub struct Local {
    pub name: Symbol,
    pub value_type: ValueType,
    pub depth: u32,
}

/// One scope unit: the compiler's locals table for the current block nest.
/// The top-level script is itself a `ScopeUnit` with `scope_depth == 0`.
#[derive(Debug, Default)]
pub struct ScopeUnit {
    pub locals: Vec<Local>,
    pub scope_depth: u32,
}

impl ScopeUnit {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn begin_scope(&mut self) {
        self.scope_depth += 1;
    }

    /// Ends the current block, returning the number of locals that fell out
    /// of scope so the caller can emit a matching number of `POP`s.
    pub fn end_scope(&mut self) -> usize {
        self.scope_depth -= 1;
        let mut popped = 0;
        while let Some(local) = self.locals.last() {
            if local.depth > self.scope_depth {
                self.locals.pop();
                popped += 1;
            } else {
                break;
            }
        }
        popped
    }

    pub fn declare(&mut self, name: Symbol, value_type: ValueType) -> Option<u8> {
        if self.locals.len() >= u8::MAX as usize {
            return None;
        }
        self.locals.push(Local { name, value_type, depth: self.scope_depth });
        Some((self.locals.len() - 1) as u8)
    }

    /// Resolves `name` to a local slot, searching innermost-first so
    /// shadowing works the way block-scoped locals are expected to.
    pub fn resolve(&self, name: Symbol) -> Option<(u8, ValueType)> {
        self.locals
            .iter()
            .enumerate()
            .rev()
            .find(|(_, l)| l.name == name)
            .map(|(i, l)| (i as u8, l.value_type))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn declare_then_resolve_finds_the_local() {
        let mut scope = ScopeUnit::new();
        let sym = Symbol::EMPTY;
        scope.declare(sym, ValueType::Zahl);
        let (slot, ty) = scope.resolve(sym).unwrap();
        assert_eq!(slot, 0);
        assert_eq!(ty, ValueType::Zahl);
    }

    #[test]
    fn end_scope_pops_locals_declared_in_the_block() {
        let mut scope = ScopeUnit::new();
        scope.begin_scope();
        scope.declare(Symbol::EMPTY, ValueType::Zahl);
        let popped = scope.end_scope();
        assert_eq!(popped, 1);
        assert!(scope.locals.is_empty());
    }

    #[test]
    fn resolve_prefers_innermost_shadow() {
        let mut scope = ScopeUnit::new();
        scope.declare(Symbol::EMPTY, ValueType::Zahl);
        scope.begin_scope();
        scope.declare(Symbol::EMPTY, ValueType::Text);
        let (slot, ty) = scope.resolve(Symbol::EMPTY).unwrap();
        assert_eq!(slot, 1);
        assert_eq!(ty, ValueType::Text);
    }
}
