use bigdecimal::{BigDecimal, Zero};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Upper bound for a single cart line.
pub const MAX_LINE_QUANTITY: u32 = 999;

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum CartError {
    #[error("cart is empty")]
    Empty,
    #[error("menu item {0} is not in the cart")]
    UnknownItem(Uuid),
    #[error("quantity must be between 1 and {MAX_LINE_QUANTITY}")]
    InvalidQuantity,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct CartLine {
    pub menu_item_id: Uuid,
    pub name: String,
    pub unit_price: BigDecimal,
    pub quantity: u32,
    pub special_instructions: Option<String>,
}

impl CartLine {
    pub fn line_total(&self) -> BigDecimal {
        &self.unit_price * BigDecimal::from(self.quantity)
    }
}

/// Menu items picked by a customer before the order exists.
///
/// Lines keep insertion order and there is at most one line per menu item.
#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq)]
pub struct Cart {
    lines: Vec<CartLine>,
}

/// A cart frozen at submission time.
#[derive(Clone, Debug, PartialEq)]
pub struct Checkout {
    pub lines: Vec<CartLine>,
    pub total: BigDecimal,
}

impl Cart {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds one unit of an item, returning the new quantity of its line.
    pub fn add(
        &mut self,
        menu_item_id: Uuid,
        name: impl Into<String>,
        unit_price: BigDecimal,
    ) -> Result<u32, CartError> {
        self.add_quantity(menu_item_id, name, unit_price, 1)
    }

    pub fn add_quantity(
        &mut self,
        menu_item_id: Uuid,
        name: impl Into<String>,
        unit_price: BigDecimal,
        quantity: u32,
    ) -> Result<u32, CartError> {
        if quantity == 0 {
            return Err(CartError::InvalidQuantity);
        }
        match self.position(menu_item_id) {
            Some(idx) => {
                let line = &mut self.lines[idx];
                let updated = line
                    .quantity
                    .checked_add(quantity)
                    .filter(|q| *q <= MAX_LINE_QUANTITY)
                    .ok_or(CartError::InvalidQuantity)?;
                line.quantity = updated;
                Ok(updated)
            }
            None => {
                if quantity > MAX_LINE_QUANTITY {
                    return Err(CartError::InvalidQuantity);
                }
                self.lines.push(CartLine {
                    menu_item_id,
                    name: name.into(),
                    unit_price,
                    quantity,
                    special_instructions: None,
                });
                Ok(quantity)
            }
        }
    }

    /// Removes one unit; the line disappears when it reaches zero.
    pub fn decrement(&mut self, menu_item_id: Uuid) -> Result<u32, CartError> {
        let idx = self
            .position(menu_item_id)
            .ok_or(CartError::UnknownItem(menu_item_id))?;
        let remaining = self.lines[idx].quantity - 1;
        if remaining == 0 {
            self.lines.remove(idx);
        } else {
            self.lines[idx].quantity = remaining;
        }
        Ok(remaining)
    }

    /// Setting a quantity of zero drops the line.
    pub fn set_quantity(&mut self, menu_item_id: Uuid, quantity: u32) -> Result<(), CartError> {
        if quantity > MAX_LINE_QUANTITY {
            return Err(CartError::InvalidQuantity);
        }
        let idx = self
            .position(menu_item_id)
            .ok_or(CartError::UnknownItem(menu_item_id))?;
        if quantity == 0 {
            self.lines.remove(idx);
        } else {
            self.lines[idx].quantity = quantity;
        }
        Ok(())
    }

    pub fn set_instructions(
        &mut self,
        menu_item_id: Uuid,
        instructions: Option<String>,
    ) -> Result<(), CartError> {
        let idx = self
            .position(menu_item_id)
            .ok_or(CartError::UnknownItem(menu_item_id))?;
        self.lines[idx].special_instructions = instructions.filter(|s| !s.trim().is_empty());
        Ok(())
    }

    /// Applies a quantity and/or instructions change to one line. Both are
    /// checked before either is applied, so a rejected edit leaves the line
    /// as it was.
    pub fn edit_line(
        &mut self,
        menu_item_id: Uuid,
        quantity: Option<u32>,
        instructions: Option<String>,
    ) -> Result<(), CartError> {
        if quantity.is_some_and(|q| q > MAX_LINE_QUANTITY) {
            return Err(CartError::InvalidQuantity);
        }
        if self.position(menu_item_id).is_none() {
            return Err(CartError::UnknownItem(menu_item_id));
        }
        if instructions.is_some() {
            self.set_instructions(menu_item_id, instructions)?;
        }
        if let Some(quantity) = quantity {
            self.set_quantity(menu_item_id, quantity)?;
        }
        Ok(())
    }

    pub fn remove(&mut self, menu_item_id: Uuid) -> bool {
        match self.position(menu_item_id) {
            Some(idx) => {
                self.lines.remove(idx);
                true
            }
            None => false,
        }
    }

    pub fn clear(&mut self) {
        self.lines.clear();
    }

    pub fn lines(&self) -> &[CartLine] {
        &self.lines
    }

    pub fn get(&self, menu_item_id: Uuid) -> Option<&CartLine> {
        self.lines.iter().find(|l| l.menu_item_id == menu_item_id)
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    pub fn item_count(&self) -> u32 {
        self.lines.iter().map(|l| l.quantity).sum()
    }

    pub fn total(&self) -> BigDecimal {
        self.lines
            .iter()
            .map(CartLine::line_total)
            .fold(BigDecimal::zero(), |acc, t| acc + t)
    }

    pub fn into_checkout(self) -> Result<Checkout, CartError> {
        if self.is_empty() {
            return Err(CartError::Empty);
        }
        let total = self.total();
        Ok(Checkout {
            lines: self.lines,
            total,
        })
    }

    fn position(&self, menu_item_id: Uuid) -> Option<usize> {
        self.lines
            .iter()
            .position(|l| l.menu_item_id == menu_item_id)
    }
}
