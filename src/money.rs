// Exact unit conversion between an asset's smallest denomination and its
// display denomination. On-chain amounts exceed f64 precision, so every
// conversion and comparison goes through Decimal.

use rust_decimal::Decimal;

pub const STX_DECIMALS: u32 = 6;
pub const BTC_DECIMALS: u32 = 8;

pub fn unit_factor(decimals: u32) -> Decimal {
    Decimal::from_i128_with_scale(10i128.pow(decimals), 0)
}

// Smallest unit -> display unit. Multiplying by a negative power of ten
// only shifts the scale, so the result is exact.
pub fn to_display_units(base: Decimal, decimals: u32) -> Decimal {
    base * Decimal::new(1, decimals)
}

// Display unit -> smallest unit. Returns None when the value carries more
// fractional digits than the asset supports.
pub fn to_base_units(display: Decimal, decimals: u32) -> Option<Decimal> {
    let scaled = display * unit_factor(decimals);
    if scaled.normalize().scale() > 0 {
        return None;
    }
    Some(scaled.normalize())
}

pub fn micro_stx_to_stx(micro: Decimal) -> Decimal {
    to_display_units(micro, STX_DECIMALS)
}

pub fn fractional_digits(value: Decimal) -> u32 {
    value.normalize().scale()
}
