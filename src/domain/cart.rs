use uuid::Uuid;

use crate::error::{AppError, AppResult};

/// A cart line: one product variant with the price captured when it was added.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Line {
    pub product_id: Uuid,
    pub size: String,
    pub color: String,
    pub quantity: i32,
    pub unit_price: i64,
}

impl Line {
    pub fn is_variant(&self, product_id: Uuid, size: &str, color: &str) -> bool {
        self.product_id == product_id && self.size == size && self.color == color
    }

    pub fn subtotal(&self) -> i64 {
        self.unit_price * i64::from(self.quantity)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Totals {
    pub total_items: i32,
    pub total_price: i64,
}

/// Catalog facts needed to admit a quantity into the cart.
#[derive(Debug, Clone, Copy)]
pub struct StockView {
    pub product_id: Uuid,
    pub price: i64,
    pub stock: i32,
}

/// Every mutator calls this before the cart is written back.
pub fn recompute_totals(lines: &[Line]) -> Totals {
    lines.iter().fold(Totals::default(), |acc, line| Totals {
        total_items: acc.total_items + line.quantity,
        total_price: acc.total_price + line.subtotal(),
    })
}

/// Adds `quantity` of a variant, merging into an existing line for the same
/// (product, size, color) instead of appending a duplicate.
pub fn add_line(
    lines: &mut Vec<Line>,
    product: &StockView,
    size: &str,
    color: &str,
    quantity: i32,
) -> AppResult<()> {
    if quantity < 1 {
        return Err(AppError::Validation(
            "quantity must be greater than 0".to_string(),
        ));
    }

    if let Some(line) = lines
        .iter_mut()
        .find(|line| line.is_variant(product.product_id, size, color))
    {
        let combined = line.quantity.saturating_add(quantity);
        ensure_stock(product.product_id, combined, product.stock)?;
        line.quantity = combined;
        return Ok(());
    }

    ensure_stock(product.product_id, quantity, product.stock)?;
    lines.push(Line {
        product_id: product.product_id,
        size: size.to_string(),
        color: color.to_string(),
        quantity,
        unit_price: product.price,
    });
    Ok(())
}

/// Edits the line for `product_id`.
///
/// An exact variant match gets the new quantity. Without one, the first
/// line of the same product is moved to the requested variant in place.
/// A quantity of zero or less removes whichever line was matched.
pub fn update_line(
    lines: &mut Vec<Line>,
    product_id: Uuid,
    size: &str,
    color: &str,
    new_quantity: i32,
    available: i32,
) -> AppResult<()> {
    let index = lines
        .iter()
        .position(|line| line.is_variant(product_id, size, color))
        .or_else(|| lines.iter().position(|line| line.product_id == product_id))
        .ok_or(AppError::NotFound("cart item"))?;

    if new_quantity <= 0 {
        lines.remove(index);
        return Ok(());
    }

    ensure_stock(product_id, new_quantity, available)?;
    if let Some(line) = lines.get_mut(index) {
        line.size = size.to_string();
        line.color = color.to_string();
        line.quantity = new_quantity;
    }
    Ok(())
}

pub fn remove_line(lines: &mut Vec<Line>, product_id: Uuid, size: &str, color: &str) -> AppResult<()> {
    let before = lines.len();
    lines.retain(|line| !line.is_variant(product_id, size, color));
    if lines.len() == before {
        return Err(AppError::NotFound("cart item"));
    }
    Ok(())
}

fn ensure_stock(product_id: Uuid, wanted: i32, available: i32) -> AppResult<()> {
    if wanted > available {
        return Err(AppError::InsufficientStock {
            product_id,
            available: available.max(0),
        });
    }
    Ok(())
}
