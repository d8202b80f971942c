
use std::fmt;

#[derive(Clone, Copy, Debug, PartialEq)]
pub enum Value {
    Int(i64),
    Float(f64),
}

impl Value {
    // Assembly literals carry no tag; a dot means float.
    pub fn from_literal(s: &str) -> Option<Value> {
        if s.contains('.') {
            s.parse::<f64>().ok().map(Value::Float)
        } else {
            s.parse::<i64>().ok().map(Value::Int)
        }
    }

    pub fn as_f64(self) -> f64 {
        match self {
            Value::Int(n) => n as f64,
            Value::Float(x) => x,
        }
    }

    // Coercion for contexts that require integer semantics: addressing,
    // pc targets, branch tests, argument counts, exit codes.
    pub fn as_int_lossy(self, what: &str) -> i64 {
        match self {
            Value::Int(n) => n,
            Value::Float(x) => {
                eprintln!("warning: float {x} truncated to int for {what}");
                x as i64
            }
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Int(n) => write!(f, "{n}"),
            Value::Float(x) => write!(f, "{x}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn literal_tag_follows_the_dot() {
        assert_eq!(Value::from_literal("42"), Some(Value::Int(42)));
        assert_eq!(Value::from_literal("-3"), Some(Value::Int(-3)));
        assert_eq!(Value::from_literal("2.5"), Some(Value::Float(2.5)));
        assert_eq!(Value::from_literal("17.0"), Some(Value::Float(17.0)));
        assert_eq!(Value::from_literal("bp"), None);
    }

    #[test]
    fn display_matches_the_wire_format() {
        assert_eq!(Value::Int(7).to_string(), "7");
        assert_eq!(Value::Float(7.0).to_string(), "7");
        assert_eq!(Value::Float(2.5).to_string(), "2.5");
    }

    #[test]
    fn lossy_coercion_truncates() {
        assert_eq!(Value::Float(3.9).as_int_lossy("test"), 3);
        assert_eq!(Value::Int(11).as_int_lossy("test"), 11);
    }
}
