//! Per-user shopping cart with an editing cursor.
//!
//! A cart is an ordered list of lines, unique by product id, plus a cursor
//! pointing at the line the user is currently editing. Invariants:
//!
//! - every line has `quantity >= 1`
//! - no two lines share a product id
//! - the cursor is `Some(i)` with `i < lines.len()` iff the cart is non-empty
//!
//! All operations are total; none of them can fail or leave the invariants
//! broken.

use crate::catalog::Product;
use crate::order::OrderItem;

/// A product and its quantity in a cart.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CartLine {
    pub product: &'static Product,
    pub quantity: u32,
}

/// Cursor movement direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Prev,
    Next,
}

/// Outcome of a quantity adjustment at the cursor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QuantityChange {
    /// Quantity was updated to the contained value.
    Changed(u32),
    /// The change would drop the quantity below one; nothing changed.
    Rejected,
    /// The cart is empty.
    NoLine,
}

/// A user's in-progress selection.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Cart {
    lines: Vec<CartLine>,
    cursor: Option<usize>,
}

impl Cart {
    #[must_use]
    pub const fn new() -> Self {
        Self {
            lines: Vec::new(),
            cursor: None,
        }
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.lines.len()
    }

    /// Index of the line being edited, if the cart is non-empty.
    #[must_use]
    pub const fn cursor(&self) -> Option<usize> {
        self.cursor
    }

    /// The line under the cursor.
    #[must_use]
    pub fn current(&self) -> Option<&CartLine> {
        self.cursor.and_then(|i| self.lines.get(i))
    }

    /// Add `amount` of `product`, merging with an existing line.
    ///
    /// The cursor moves to the affected line. An `amount` of zero is treated
    /// as one so the line invariant holds.
    pub fn add_or_increment(&mut self, product: &'static Product, amount: u32) -> usize {
        let amount = amount.max(1);
        let index = if let Some(i) = self.lines.iter().position(|l| l.product.id == product.id) {
            if let Some(line) = self.lines.get_mut(i) {
                line.quantity = line.quantity.saturating_add(amount);
            }
            i
        } else {
            self.lines.push(CartLine {
                product,
                quantity: amount,
            });
            self.lines.len() - 1
        };
        self.cursor = Some(index);
        index
    }

    /// Apply `delta` to the quantity of the line under the cursor.
    ///
    /// A change that would leave the quantity below one is rejected; use
    /// [`Cart::remove_current`] to drop a line.
    pub fn set_quantity_delta(&mut self, delta: i32) -> QuantityChange {
        let Some(line) = self.cursor.and_then(|i| self.lines.get_mut(i)) else {
            return QuantityChange::NoLine;
        };

        let updated = i64::from(line.quantity) + i64::from(delta);
        match u32::try_from(updated) {
            Ok(quantity) if quantity >= 1 => {
                line.quantity = quantity;
                QuantityChange::Changed(quantity)
            }
            _ => QuantityChange::Rejected,
        }
    }

    /// Remove the line under the cursor.
    ///
    /// The cursor is re-clamped to `min(old, len - 1)`, or cleared when the
    /// cart becomes empty. Returns the removed line.
    pub fn remove_current(&mut self) -> Option<CartLine> {
        let index = self.cursor?;
        if index >= self.lines.len() {
            self.cursor = self.lines.len().checked_sub(1);
            return None;
        }

        let removed = self.lines.remove(index);
        self.cursor = self
            .lines
            .len()
            .checked_sub(1)
            .map(|last| index.min(last));
        Some(removed)
    }

    /// Cyclic cursor navigation. Returns whether the cursor moved.
    pub fn move_cursor(&mut self, direction: Direction) -> bool {
        let len = self.lines.len();
        let Some(index) = self.cursor else {
            return false;
        };
        if len < 2 {
            return false;
        }

        self.cursor = Some(match direction {
            Direction::Next => (index + 1) % len,
            Direction::Prev => (index + len - 1) % len,
        });
        true
    }

    /// An owned, read-only copy for rendering.
    #[must_use]
    pub fn snapshot(&self) -> CartSnapshot {
        CartSnapshot {
            lines: self.lines.clone(),
            cursor: self.cursor,
        }
    }

    /// Freeze the cart contents into order items.
    #[must_use]
    pub fn to_order_items(&self) -> Vec<OrderItem> {
        self.lines
            .iter()
            .map(|line| OrderItem {
                product: line.product.snapshot(),
                quantity: line.quantity,
            })
            .collect()
    }

    /// Drop every line.
    pub fn clear(&mut self) {
        self.lines.clear();
        self.cursor = None;
    }
}

/// Immutable view of a cart.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CartSnapshot {
    pub lines: Vec<CartLine>,
    pub cursor: Option<usize>,
}

impl CartSnapshot {
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    /// Lines paired with whether they are under the cursor.
    pub fn iter_marked(&self) -> impl Iterator<Item = (bool, &CartLine)> {
        self.lines
            .iter()
            .enumerate()
            .map(|(i, line)| (Some(i) == self.cursor, line))
    }
}
