use std::{
    fmt::{self, Display, Formatter},
    ops::Deref,
    rc::Rc,
};

/// Shared handle to a heap object.
///
/// Objects are released when the last `Value` holding them is dropped. Equality goes
/// through to the payload, so two handles to equal strings compare equal even when they
/// point at distinct allocations.
pub type ObjRef = Rc<Obj>;

#[derive(Debug, PartialEq, Eq)]
pub enum Obj {
    String(LoxStr),
}

impl Obj {
    pub fn as_lox_str(&self) -> Option<&LoxStr> {
        match self {
            Obj::String(string) => Some(string),
        }
    }
}

impl Display for Obj {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            Obj::String(string) => string.fmt(f),
        }
    }
}

/// Immutable string payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoxStr {
    val: Box<str>,
}

impl LoxStr {
    pub fn as_str(&self) -> &str {
        &self.val
    }

    /// Length in bytes.
    pub fn len(&self) -> usize {
        self.val.len()
    }

    pub fn is_empty(&self) -> bool {
        self.val.is_empty()
    }
}

impl Display for LoxStr {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        self.val.fmt(f)
    }
}

impl<T> From<T> for LoxStr
where
    Box<str>: From<T>,
{
    fn from(val: T) -> Self {
        let val: Box<str> = val.into();
        Self { val }
    }
}

impl Deref for LoxStr {
    type Target = str;
    fn deref(&self) -> &Self::Target {
        self.as_str()
    }
}

#[cfg(test)]
mod tests {
    use std::rc::Rc;

    use super::{LoxStr, Obj};

    #[test]
    fn strings_compare_by_content() {
        let a = Rc::new(Obj::String(LoxStr::from("same")));
        let b = Rc::new(Obj::String(LoxStr::from(String::from("same"))));

        assert!(!Rc::ptr_eq(&a, &b));
        assert_eq!(a, b);
        assert_ne!(a, Rc::new(Obj::String(LoxStr::from("other"))));
    }

    #[test]
    fn length_is_in_bytes() {
        let string = LoxStr::from("héllo");
        assert_eq!(string.len(), 6);
        assert!(!string.is_empty());
        assert!(LoxStr::from("").is_empty());
    }
}
