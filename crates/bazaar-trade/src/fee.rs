//! Fee policy for escrowed trades, in the smallest ledger unit.

/// Security deposit each party locks into the deposit tx.
pub const SECURITY_DEPOSIT: u64 = 1_000_000;

/// Fixed mining fee reserved for the trade transactions.
pub const FIXED_TRADE_FEE: u64 = 50_000;

/// Amount the deposit-funding party must cover: security deposit plus the
/// fixed fee plus the trade amount itself.
pub fn deposit_funding_amount(trade_amount: u64) -> u64 {
    SECURITY_DEPOSIT + FIXED_TRADE_FEE + trade_amount
}
