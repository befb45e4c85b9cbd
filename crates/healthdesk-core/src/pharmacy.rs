//! Demo pharmacy: a fixed catalog and a per-session cart.

use std::collections::BTreeMap;

use crate::error::{DeskError, DeskResult};

pub const MAX_QTY: u32 = 10;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Medicine {
    pub name: &'static str,
    pub dosage: &'static str,
    /// Whole rupees
    pub price: u32,
}

pub fn catalog() -> Vec<Medicine> {
    vec![
        Medicine { name: "Paracetamol", dosage: "500mg", price: 50 },
        Medicine { name: "Ibuprofen", dosage: "400mg", price: 80 },
        Medicine { name: "Vitamin D3", dosage: "1000 IU", price: 200 },
    ]
}

pub fn format_rupees(amount: u32) -> String {
    format!("₹{}", amount)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CartLine {
    pub qty: u32,
    pub total: u32,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Order {
    pub lines: Vec<(String, CartLine)>,
    pub total: u32,
}

#[derive(Debug, Clone, Default)]
pub struct Cart {
    lines: BTreeMap<String, CartLine>,
}

impl Cart {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the quantity for a medicine; re-adding replaces the previous line.
    pub fn add(&mut self, medicine: &Medicine, qty: u32) -> DeskResult<()> {
        if qty == 0 {
            return Err(DeskError::validation("Choose a quantity first."));
        }
        if qty > MAX_QTY {
            return Err(DeskError::validation(format!("At most {} of each item.", MAX_QTY)));
        }
        self.lines.insert(
            medicine.name.to_string(),
            CartLine { qty, total: medicine.price * qty },
        );
        Ok(())
    }

    pub fn lines(&self) -> impl Iterator<Item = (&str, &CartLine)> {
        self.lines.iter().map(|(name, line)| (name.as_str(), line))
    }

    pub fn total(&self) -> u32 {
        self.lines.values().map(|l| l.total).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    pub fn checkout(&mut self) -> DeskResult<Order> {
        if self.lines.is_empty() {
            return Err(DeskError::validation("Your cart is empty."));
        }
        let total = self.total();
        let lines = std::mem::take(&mut self.lines).into_iter().collect();
        Ok(Order { lines, total })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_add_replace_and_total() {
        let items = catalog();
        let mut cart = Cart::new();
        cart.add(&items[0], 2).unwrap();
        cart.add(&items[2], 1).unwrap();
        assert_eq!(cart.total(), 300);

        cart.add(&items[0], 3).unwrap();
        assert_eq!(cart.total(), 350);
        let names: Vec<&str> = cart.lines().map(|(n, _)| n).collect();
        assert_eq!(names, vec!["Paracetamol", "Vitamin D3"]);
    }

    #[test]
    fn test_quantity_bounds() {
        let items = catalog();
        let mut cart = Cart::new();
        assert!(cart.add(&items[1], 0).is_err());
        assert!(cart.add(&items[1], 11).is_err());
        assert!(cart.is_empty());
        cart.add(&items[1], 10).unwrap();
        assert_eq!(cart.total(), 800);
    }

    #[test]
    fn test_checkout_empties_cart() {
        let items = catalog();
        let mut cart = Cart::new();
        assert!(cart.checkout().is_err());
        cart.add(&items[1], 1).unwrap();
        let order = cart.checkout().unwrap();
        assert_eq!(order.total, 80);
        assert_eq!(order.lines.len(), 1);
        assert!(cart.is_empty());
        assert_eq!(format_rupees(order.total), "₹80");
    }
}
