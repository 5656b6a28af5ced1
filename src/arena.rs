use bumpalo::Bump;

/// Single-lifetime bulk allocator for the AST.
///
/// Every statement, expression, type, and inner slice of a parse lives here;
/// nodes hold plain `&'a` references into it and are freed together when the
/// arena is dropped. The stored values never implement `Drop`.
pub struct Arena {
    bump: Bump,
}

impl Arena {
    pub fn new() -> Self {
        Arena { bump: Bump::new() }
    }

    pub fn alloc<T>(&self, value: T) -> &T {
        self.bump.alloc(value)
    }

    pub fn alloc_slice<T, I>(&self, items: I) -> &[T]
    where
        I: IntoIterator<Item = T>,
        I::IntoIter: ExactSizeIterator,
    {
        self.bump.alloc_slice_fill_iter(items)
    }
}

impl Default for Arena {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn alloc_returns_stable_references() {
        let arena = Arena::new();
        let a = arena.alloc(41i64);
        let b = arena.alloc(42i64);
        assert_eq!(*a, 41);
        assert_eq!(*b, 42);
    }

    #[test]
    fn references_remain_valid_after_many_allocations() {
        let arena = Arena::new();
        let refs: Vec<&i32> = (0..10_000).map(|i| arena.alloc(i)).collect();
        for (i, r) in refs.iter().enumerate() {
            assert_eq!(**r, i as i32);
        }
    }

    #[test]
    fn alloc_slice_from_vec() {
        let arena = Arena::new();
        let slice = arena.alloc_slice(vec![10, 20, 30]);
        assert_eq!(slice, &[10, 20, 30]);
    }

    #[test]
    fn alloc_empty_slice() {
        let arena = Arena::new();
        let empty: Vec<i32> = vec![];
        assert!(arena.alloc_slice(empty).is_empty());
    }
}
