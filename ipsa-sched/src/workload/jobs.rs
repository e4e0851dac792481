/*
SPDX-FileCopyrightText: Copyright 2026 LG Electronics Inc.
SPDX-License-Identifier: MIT
*/

//! Application payloads of the four periodic transmitters.
//!
//! Pure computations; their only side effect is the returned console line.

use super::Job;

/// Prints a fixed label ("Working 1").
#[derive(Debug, Clone)]
pub struct Working {
    label: String,
}

impl Working {
    pub fn new(label: impl Into<String>) -> Self {
        Self {
            label: label.into(),
        }
    }
}

impl Job for Working {
    fn run(&mut self) -> String {
        self.label.clone()
    }
}

/// Fahrenheit → Celsius conversion of a fixed reading.
#[derive(Debug, Clone, Copy)]
pub struct Temperature {
    fahrenheit: f32,
}

impl Temperature {
    pub fn new(fahrenheit: f32) -> Self {
        Self { fahrenheit }
    }

    pub fn celsius(&self) -> f32 {
        (self.fahrenheit - 32.0) * 5.0 / 9.0
    }
}

impl Job for Temperature {
    fn run(&mut self) -> String {
        format!(
            "Fahrenheit: {:.6}, Celsius: {:.6}",
            self.fahrenheit,
            self.celsius()
        )
    }
}

/// 64-bit product of two fixed operands.
#[derive(Debug, Clone, Copy)]
pub struct Multiply {
    lhs: u64,
    rhs: u64,
}

impl Multiply {
    pub fn new(lhs: u64, rhs: u64) -> Self {
        Self { lhs, rhs }
    }

    /// `None` when the product does not fit in 64 bits.
    pub fn product(&self) -> Option<u64> {
        self.lhs.checked_mul(self.rhs)
    }
}

impl Job for Multiply {
    fn run(&mut self) -> String {
        match self.product() {
            Some(result) => format!("Result: {}", result),
            None => format!("Result: {} * {} overflows 64 bits", self.lhs, self.rhs),
        }
    }
}

/// Binary search for `key` in the sorted sequence `1..=len`.
#[derive(Debug, Clone)]
pub struct Search {
    list: Vec<i32>,
    key: i32,
}

impl Search {
    pub fn new(len: i32, key: i32) -> Self {
        Self {
            list: (1..=len).collect(),
            key,
        }
    }

    /// Index of `key`, if present.
    pub fn find(&self) -> Option<usize> {
        self.list.binary_search(&self.key).ok()
    }
}

impl Job for Search {
    fn run(&mut self) -> String {
        match self.find() {
            Some(index) => format!("Element {} found at index {}", self.key, index),
            None => format!("Element {} not found", self.key),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn working_prints_its_label() {
        assert_eq!(Working::new("Working 1").run(), "Working 1");
    }

    #[test]
    fn boiling_point_of_100f() {
        let mut t = Temperature::new(100.0);
        assert!((t.celsius() - 37.777_78).abs() < 1e-4);
        assert_eq!(t.run(), "Fahrenheit: 100.000000, Celsius: 37.777779");
    }

    #[test]
    fn multiply_fits_in_u64() {
        let mut m = Multiply::new(9_876_543_210, 1_234_567_890);
        assert_eq!(m.product(), Some(12_193_263_111_263_526_900));
        assert_eq!(m.run(), "Result: 12193263111263526900");
    }

    #[test]
    fn multiply_reports_overflow() {
        let mut m = Multiply::new(u64::MAX, 2);
        assert_eq!(m.product(), None);
        assert!(m.run().contains("overflows"));
    }

    #[test]
    fn search_finds_25_at_index_24() {
        let mut s = Search::new(50, 25);
        assert_eq!(s.find(), Some(24));
        assert_eq!(s.run(), "Element 25 found at index 24");
    }

    #[test]
    fn search_reports_missing_key() {
        assert_eq!(Search::new(50, 51).find(), None);
        assert_eq!(Search::new(0, 1).run(), "Element 1 not found");
    }
}
