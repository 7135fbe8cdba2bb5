//! Receipt

use std::{fmt::Write, io};

use decimal_percentage::Percentage;
use rust_decimal::Decimal;
use rusty_money::{Money, iso::Currency};
use smallvec::{SmallVec, smallvec};
use tabled::{
    builder::Builder,
    grid::config::HorizontalLine,
    settings::{
        Alignment, Color, Style, Theme,
        object::{Columns, Rows},
    },
};
use thiserror::Error;

use crate::{
    calculator::CalculatorError,
    cart::ShoppingCart,
    items::{LineItemKey, LineItems},
    recurring::FrequencyAndRecurringPrice,
    snapshot::{ShoppingCartTaxSnapshot, SnapshotError},
};

/// Errors that can occur when rendering a receipt.
#[derive(Debug, Error)]
pub enum ReceiptError {
    /// Error reading the pricing snapshot.
    #[error(transparent)]
    Snapshot(#[from] SnapshotError),

    /// Error computing a line amount.
    #[error(transparent)]
    Calculator(#[from] CalculatorError),

    /// A cart item has no line in the snapshot.
    #[error("Missing line item")]
    MissingItem(LineItemKey),

    /// IO error
    #[error("IO error")]
    IO,
}

/// Printable view of a priced and taxed cart.
#[derive(Debug, Clone, Copy)]
pub struct Receipt<'s, 'a> {
    snapshot: &'s ShoppingCartTaxSnapshot<'a>,
    cart: &'s ShoppingCart<'a>,
    recurring: &'s [FrequencyAndRecurringPrice<'a>],
}

impl<'s, 'a> Receipt<'s, 'a> {
    /// Create a receipt for `cart` as priced by `snapshot`.
    pub fn new(snapshot: &'s ShoppingCartTaxSnapshot<'a>, cart: &'s ShoppingCart<'a>) -> Self {
        Self {
            snapshot,
            cart,
            recurring: &[],
        }
    }

    /// Also list recurring charges below the totals.
    #[must_use]
    pub fn with_recurring(mut self, recurring: &'s [FrequencyAndRecurringPrice<'a>]) -> Self {
        self.recurring = recurring;
        self
    }

    /// Currency used for all monetary values
    pub fn currency(&self) -> &'a Currency {
        self.snapshot.pricing().currency()
    }

    /// Prints the receipt.
    ///
    /// # Errors
    ///
    /// Returns an error if a line cannot be priced or the output cannot be written.
    pub fn write_to(&self, mut out: impl io::Write) -> Result<(), ReceiptError> {
        let mut builder = Builder::default();

        builder.push_record([
            "",
            "Item",
            "Qty",
            "Unit Price",
            "Line Price",
            "Discount",
            "Total",
            "Promotions",
        ]);

        let mut root_rows: SmallVec<[usize; 16]> = smallvec![];
        let mut color_ops: SmallVec<[(usize, usize, Color); 32]> = smallvec![];
        let mut row = 1;

        let items = self.cart.items();

        for (index, root) in items.roots().iter().enumerate() {
            root_rows.push(row);

            for key in items.subtree(*root) {
                let label = if key == *root {
                    format!("#{:<3}", index + 1)
                } else {
                    String::new()
                };

                let constituent = items.is_bundle_constituent(key);

                builder.push_record(self.item_cells(items, key, label)?);

                if constituent {
                    color_ops.push((row, 1, color_dark_grey()));
                }

                color_ops.push((row, 5, Color::FG_GREEN));

                row += 1;
            }
        }

        write_receipt_table(&mut out, builder, &root_rows, color_ops)?;

        self.write_summary(&mut out)
    }

    fn item_cells(
        &self,
        items: &LineItems<'a>,
        key: LineItemKey,
        label: String,
    ) -> Result<[String; 8], ReceiptError> {
        let pricing = self.snapshot.pricing();
        let item = items.get(key).ok_or(ReceiptError::MissingItem(key))?;
        let snapshot = pricing.shopping_item_pricing_snapshot(key)?;

        let depth = depth(items, key);
        let name = if depth == 0 {
            item.sku_code().to_string()
        } else {
            format!("{}└ {}", "  ".repeat(depth - 1), item.sku_code())
        };

        let total = if items.is_bundle_constituent(key) {
            pricing
                .apportioned_leaf_items()
                .iter()
                .find(|leaf| leaf.line_item() == key)
                .map(|leaf| leaf.total().to_string())
                .unwrap_or_default()
        } else {
            money_cell(snapshot.total())?
        };

        let discount = if snapshot.has_discount() {
            format!("-{}", snapshot.discount())
        } else {
            String::new()
        };

        let mut rules: SmallVec<[_; 4]> = pricing
            .promotion_record_container()
            .applied_rules_by_line_item(item.id())
            .into_iter()
            .collect();

        rules.sort_unstable();

        let promotions = rules
            .iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .join(", ");

        Ok([
            label,
            name,
            item.quantity().to_string(),
            snapshot
                .lowest_unit_price()
                .map(|price| price.to_string())
                .unwrap_or_default(),
            money_cell(snapshot.price_calc().money())?,
            discount,
            total,
            promotions,
        ])
    }

    fn write_summary(&self, out: &mut impl io::Write) -> Result<(), ReceiptError> {
        let pricing = self.snapshot.pricing();
        let savings = pricing.savings()?;
        let savings_percent_points =
            percent_points_from_fractional_percentage(pricing.savings_percent()?);

        let mut lines = vec![(" Subtotal:".to_string(), format!("{}  ", pricing.subtotal()))];

        if pricing.has_subtotal_discount() {
            lines.push((
                " Discount:".to_string(),
                format!("-{}  ", pricing.subtotal_discount()),
            ));
        }

        if let Some(option) = pricing.selected_shipping_option() {
            lines.push((
                format!(" Shipping ({option}):"),
                format!("{}  ", pricing.shipping_cost()),
            ));
        }

        for (name, amount) in self.snapshot.localized_tax_map() {
            lines.push((format!(" {name}:"), format!("{amount}  ")));
        }

        lines.push((
            " \x1b[1mTotal:\x1b[0m".to_string(),
            format!("\x1b[1m{}  \x1b[0m", self.snapshot.total()),
        ));

        lines.push((
            " Savings:".to_string(),
            format!("({savings_percent_points:.2}%) {savings}  "),
        ));

        for charge in self.recurring {
            lines.push((
                format!(" {} ({}):", charge.name(), charge.frequency()),
                format!("{}  ", charge.amount()),
            ));
        }

        let label_width = lines
            .iter()
            .map(|(label, _)| visible_width(label))
            .max()
            .unwrap_or(0);

        let value_width = lines
            .iter()
            .map(|(_, value)| visible_width(value))
            .max()
            .unwrap_or(0);

        for (label, value) in &lines {
            write_summary_line(out, label, value, label_width, value_width)?;
        }

        writeln!(out).map_err(|_err| ReceiptError::IO)
    }
}

fn depth(items: &LineItems<'_>, key: LineItemKey) -> usize {
    let mut depth = 0;
    let mut current = key;

    while let Some(parent) = items.parent(current) {
        depth += 1;
        current = parent;
    }

    depth
}

/// Formats a calculator result, leaving the cell blank for unpriced lines.
fn money_cell(result: Result<Money<'_, Currency>, CalculatorError>) -> Result<String, CalculatorError> {
    match result {
        Ok(money) => Ok(money.to_string()),
        Err(CalculatorError::NoPrice) => Ok(String::new()),
        Err(error) => Err(error),
    }
}

fn write_receipt_table(
    out: &mut impl io::Write,
    builder: Builder,
    root_rows: &[usize],
    color_ops: SmallVec<[(usize, usize, Color); 32]>,
) -> Result<(), ReceiptError> {
    let mut table = builder.build();
    let mut theme = Theme::from(Style::modern_rounded());
    let separator = HorizontalLine::new(Some('─'), Some('┼'), Some('├'), Some('┤'));

    theme.remove_horizontal_lines();
    theme.insert_horizontal_line(1, separator);

    for &row in root_rows {
        if row > 1 {
            theme.insert_horizontal_line(row, separator);
        }
    }

    table.with(theme);
    table.modify(Rows::first(), Color::BOLD);
    table.modify(Columns::new(2..7), Alignment::right());

    for (row, col, color) in color_ops {
        table.modify((row, col), color);
    }

    let table_str = colorize_borders(&table.to_string());

    writeln!(out, "\n{table_str}").map_err(|_err| ReceiptError::IO)
}

/// Converts a fractional percentage to percent points for display.
fn percent_points_from_fractional_percentage(percentage: Percentage) -> Decimal {
    ((percentage * Decimal::ONE) * Decimal::ONE_HUNDRED).round_dp(2)
}

/// Wraps runs of box-drawing characters (U+2500..U+257F) in ANSI dark grey.
fn colorize_borders(table: &str) -> String {
    let mut out = String::with_capacity(table.len() + 256);
    let mut in_run = false;

    for ch in table.chars() {
        let box_char = ('\u{2500}'..='\u{257F}').contains(&ch);

        if box_char && !in_run {
            _ = out.write_str("\x1b[90m");
            in_run = true;
        } else if !box_char && in_run {
            _ = out.write_str("\x1b[0m");
            in_run = false;
        }

        out.push(ch);
    }

    if in_run {
        _ = out.write_str("\x1b[0m");
    }

    out
}

/// Returns the visible (non-ANSI) width of a string.
fn visible_width(s: &str) -> usize {
    let mut width = 0usize;
    let mut in_escape = false;

    for ch in s.chars() {
        if in_escape {
            if ch.is_ascii_alphabetic() {
                in_escape = false;
            }
        } else if ch == '\x1b' {
            in_escape = true;
        } else {
            width += 1;
        }
    }

    width
}

/// Writes a right-aligned label followed by a fixed-width value column.
fn write_summary_line(
    out: &mut impl io::Write,
    label: &str,
    value: &str,
    label_col_width: usize,
    value_col_width: usize,
) -> Result<(), ReceiptError> {
    let label_pad = label_col_width.saturating_sub(visible_width(label));
    let value_pad = value_col_width.saturating_sub(visible_width(value));

    writeln!(
        out,
        "{:>label_pad$}{label}  {value_pad}{value}",
        "",
        value_pad = " ".repeat(value_pad)
    )
    .map_err(|_err| ReceiptError::IO)
}

/// ANSI dark grey foreground.
fn color_dark_grey() -> Color {
    Color::new("\x1b[90m", "\x1b[0m")
}
