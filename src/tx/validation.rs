//! Fee validation rules
//!
//! Pure predicate checks run before every signed construction. These are the
//! last line of defense: other checks exist upstream, but these make sure we
//! never create an invalid attempt.

use crate::config::FeeConfig;
use crate::error::{TxError, TxResult};
use crate::price::Wei;

use ethers::types::Address;

/// Check a legacy gas price against the per-key ceiling and the global floor
pub fn validate_legacy_gas(config: &dyn FeeConfig, gas_price: Wei, from: Address) -> TxResult<()> {
    let ceiling = config.price_max_key(from);
    if gas_price > ceiling {
        return Err(TxError::GasPriceAboveCeiling {
            price: gas_price,
            ceiling,
            key: from,
        });
    }

    let floor = config.price_min();
    if gas_price < floor {
        return Err(TxError::GasPriceBelowFloor {
            price: gas_price,
            floor,
            key: from,
        });
    }

    Ok(())
}

/// Check a dynamic fee cap / tip cap pair for internal consistency and
/// against the configured bounds.
///
/// A transaction offering to pay less in total than its tip is incoherent,
/// so fee cap >= tip cap is checked first.
pub fn validate_dynamic_fee_gas(
    config: &dyn FeeConfig,
    fee_cap: Wei,
    tip_cap: Wei,
    from: Address,
) -> TxResult<()> {
    if fee_cap < tip_cap {
        return Err(TxError::FeeCapBelowTipCap { fee_cap, tip_cap });
    }

    let ceiling = config.price_max_key(from);
    if fee_cap > ceiling {
        return Err(TxError::GasPriceAboveCeiling {
            price: fee_cap,
            ceiling,
            key: from,
        });
    }

    let tip_floor = config.tip_cap_min();
    if tip_cap < tip_floor {
        return Err(TxError::TipCapBelowMinimum {
            tip_cap,
            floor: tip_floor,
            key: from,
        });
    }

    Ok(())
}
