/*!
 * Transforms
 * Pure string functions each party applies to what it receives
 */

/// Deterministic string transform
pub trait Transform {
    fn apply(&self, input: &str) -> String;

    /// Human-readable operand, if the transform has one
    fn label(&self) -> Option<&str> {
        None
    }
}

/// Appends a fixed suffix
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Concat(pub String);

impl Concat {
    pub fn new(suffix: impl Into<String>) -> Self {
        Self(suffix.into())
    }
}

impl Transform for Concat {
    fn apply(&self, input: &str) -> String {
        let mut out = String::with_capacity(input.len() + self.0.len());
        out.push_str(input);
        out.push_str(&self.0);
        out
    }

    fn label(&self) -> Option<&str> {
        Some(&self.0)
    }
}

impl<F> Transform for F
where
    F: Fn(&str) -> String,
{
    fn apply(&self, input: &str) -> String {
        self(input)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_concat() {
        let t = Concat::new("howard.edu");
        assert_eq!(t.apply("cse"), "csehoward.edu");
        assert_eq!(t.label(), Some("howard.edu"));
    }

    #[test]
    fn test_closure_transform() {
        let upper = |s: &str| s.to_uppercase();
        assert_eq!(upper.apply("abc"), "ABC");
        assert_eq!(upper.label(), None);
    }
}
