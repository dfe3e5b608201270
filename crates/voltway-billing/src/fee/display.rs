//! Currency formatting for the display surface
//!
//! The service bills in a single fixed currency; there is no locale
//! negotiation here.

use rust_decimal::Decimal;

/// Billing currency ISO code
pub const CURRENCY: &str = "EUR";

/// Symbol used for user-facing amounts
pub const CURRENCY_SYMBOL: &str = "\u{20ac}";

/// Format a monetary amount with the fixed currency symbol and two decimals
pub fn format_currency(amount: Decimal) -> String {
    format!("{}{:.2}", CURRENCY_SYMBOL, amount)
}
