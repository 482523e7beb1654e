//! Temporaries and labels

use std::fmt;

/// Number of temps reserved for machine registers; `TempGen` starts here.
pub const FIRST_TEMP: u32 = 100;

/// An abstract register
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Temp(pub u32);

impl fmt::Display for Temp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "t{}", self.0)
    }
}

/// An abstract machine-code address
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Label {
    /// Compiler-generated, printed as `L<n>`
    Anon(u32),
    /// Function entry points and runtime routines
    Named(String),
}

impl Label {
    pub fn named(name: impl Into<String>) -> Self {
        Label::Named(name.into())
    }
}

impl fmt::Display for Label {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Label::Anon(n) => write!(f, "L{}", n),
            Label::Named(name) => write!(f, "{}", name),
        }
    }
}

/// Hands out fresh temps and labels for one compilation
#[derive(Debug, Clone)]
pub struct TempGen {
    next_temp: u32,
    next_label: u32,
}

impl TempGen {
    pub fn new() -> Self {
        Self {
            next_temp: FIRST_TEMP,
            next_label: 0,
        }
    }

    pub fn new_temp(&mut self) -> Temp {
        let t = Temp(self.next_temp);
        self.next_temp += 1;
        t
    }

    pub fn new_label(&mut self) -> Label {
        let l = Label::Anon(self.next_label);
        self.next_label += 1;
        l
    }

    /// A unique label that keeps `prefix` readable, e.g. `f_3`
    pub fn new_named_label(&mut self, prefix: &str) -> Label {
        let l = Label::Named(format!("{}_{}", prefix, self.next_label));
        self.next_label += 1;
        l
    }
}

impl Default for TempGen {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fresh_values_are_distinct() {
        let mut temps = TempGen::new();
        let a = temps.new_temp();
        let b = temps.new_temp();
        assert_ne!(a, b);
        assert!(a.0 >= FIRST_TEMP);

        let l1 = temps.new_label();
        let l2 = temps.new_named_label("f");
        assert_ne!(l1, l2);
        assert_eq!(l1.to_string(), "L0");
        assert_eq!(l2.to_string(), "f_1");
    }
}
