use std::{cell::Cell, rc::Rc};

use tracing::trace;

use crate::object::{LoxStr, Obj, ObjRef};

/// Allocator for the objects of one interpretation.
///
/// The heap does not own what it hands out; it only counts it. Every object is
/// reference counted and disappears with the last value that refers to it, so
/// dropping the chunk and resetting the VM stack releases everything an
/// interpretation created. No strings are interned.
#[derive(Debug, Default)]
pub struct Heap {
    objects: Cell<usize>,
    bytes: Cell<usize>,
}

impl Heap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Copies `chars` into a new string object.
    pub fn alloc_string(&self, chars: impl AsRef<str>) -> ObjRef {
        self.manage(LoxStr::from(chars.as_ref()))
    }

    /// Builds a new string object holding `lhs` followed by `rhs`.
    pub fn concatenate(&self, lhs: &LoxStr, rhs: &LoxStr) -> ObjRef {
        let mut acc = String::with_capacity(lhs.len() + rhs.len());
        acc.push_str(lhs);
        acc.push_str(rhs);
        self.manage(LoxStr::from(acc))
    }

    pub fn objects_allocated(&self) -> usize {
        self.objects.get()
    }

    pub fn bytes_allocated(&self) -> usize {
        self.bytes.get()
    }

    fn manage(&self, string: LoxStr) -> ObjRef {
        let size = std::mem::size_of::<Obj>() + string.len();
        self.objects.set(self.objects.get() + 1);
        self.bytes.set(self.bytes.get() + size);

        trace!(size, "allocate string");
        Rc::new(Obj::String(string))
    }
}

impl Drop for Heap {
    fn drop(&mut self) {
        trace!(
            objects = self.objects.get(),
            bytes = self.bytes.get(),
            "heap released"
        );
    }
}

#[cfg(test)]
mod tests {
    use std::rc::Rc;

    use super::Heap;

    #[test]
    fn concatenation_allocates_a_fresh_string() {
        let heap = Heap::new();
        let lhs = heap.alloc_string("ab");
        let rhs = heap.alloc_string("cd");

        let joined = heap.concatenate(
            lhs.as_lox_str().unwrap(),
            rhs.as_lox_str().unwrap(),
        );

        assert_eq!(joined.as_lox_str().unwrap().as_str(), "abcd");
        assert_eq!(heap.objects_allocated(), 3);
        assert!(heap.bytes_allocated() >= 8);
    }

    #[test]
    fn equal_strings_are_not_deduplicated() {
        let heap = Heap::new();
        let a = heap.alloc_string("x");
        let b = heap.alloc_string("x");

        assert!(!Rc::ptr_eq(&a, &b));
        assert_eq!(a, b);
        assert_eq!(heap.objects_allocated(), 2);
    }

    #[test]
    fn objects_outlive_the_heap_that_counted_them() {
        let string = {
            let heap = Heap::new();
            heap.alloc_string("kept")
        };
        assert_eq!(Rc::strong_count(&string), 1);
        assert_eq!(string.to_string(), "kept");
    }
}
