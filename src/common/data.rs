use std::fmt::{self, Debug, Display, Formatter};

/// An opaque handle into the managed heap. Handles are plain integers
/// handed out by the allocator; they carry no lifetime and say nothing
/// about whether the block they name is still live.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Handle(pub usize);

impl Display for Handle {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// A runtime value. Scalars are held by value and copied freely; composite
/// values (lists) live on the managed heap and are referred to by handle.
/// `Data` doubles as the constant-pool entry type, where the dedup rule is
/// this type's structural equality.
#[derive(Debug, Clone, PartialEq)]
pub enum Data {
    Number(f64),
    Boolean(bool),
    String(String),
    List(Handle),
    Unit,
}

impl Data {
    /// The conditional-jump test: `false`, `0`, and `()` are falsy,
    /// everything else is truthy.
    pub fn is_truthy(&self) -> bool {
        match self {
            Data::Boolean(b) => *b,
            Data::Number(n) => *n != 0.0,
            Data::Unit => false,
            _ => true,
        }
    }

    /// A short name for the value's type, used in type-error messages.
    pub fn type_name(&self) -> &'static str {
        match self {
            Data::Number(_) => "number",
            Data::Boolean(_) => "boolean",
            Data::String(_) => "string",
            Data::List(_) => "list",
            Data::Unit => "unit",
        }
    }
}

impl Display for Data {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            Data::Number(n) => write!(f, "{}", n),
            Data::Boolean(b) => write!(f, "{}", if *b { "true" } else { "false" }),
            Data::String(s) => write!(f, "{}", s),
            Data::List(handle) => write!(f, "list{}", handle),
            Data::Unit => write!(f, "()"),
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn truthiness() {
        assert!(Data::Number(1.0).is_truthy());
        assert!(Data::String(String::new()).is_truthy());
        assert!(!Data::Number(0.0).is_truthy());
        assert!(!Data::Boolean(false).is_truthy());
        assert!(!Data::Unit.is_truthy());
    }

    #[test]
    fn display() {
        assert_eq!(format!("{}", Data::Number(4.5)), "4.5");
        assert_eq!(format!("{}", Data::Boolean(true)), "true");
        assert_eq!(format!("{}", Data::Unit), "()");
    }
}
