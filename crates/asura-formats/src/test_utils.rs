//! Test utilities for format round-trip testing
//!
//! All helpers use the default registry, so every chunk goes through the raw
//! fallback codec.

use crate::AsuraFormat;
use crate::registry::ChunkRegistry;
use std::fmt::Debug;

/// Test round-trip serialization for a format instance
///
/// # Returns
/// * `Ok(())` if round-trip succeeds and values match
/// * `Err` if serialization, deserialization, or comparison fails
pub fn test_round_trip<T>(original: &T) -> Result<(), Box<dyn std::error::Error>>
where
    T: AsuraFormat + PartialEq + Debug,
{
    let registry = ChunkRegistry::default();
    let data = original.build(&registry)?;
    let parsed = T::parse(&data, &registry)?;

    if original != &parsed {
        return Err(format!(
            "Round-trip verification failed:\nOriginal: {:?}\nParsed: {:?}",
            original, parsed
        )
        .into());
    }

    Ok(())
}

/// Test round-trip with existing binary data
///
/// Parses, rebuilds and reparses, then compares the two parsed values.
pub fn test_round_trip_with_data<T>(data: &[u8]) -> Result<(), Box<dyn std::error::Error>>
where
    T: AsuraFormat + PartialEq + Debug,
{
    let registry = ChunkRegistry::default();
    let parsed = T::parse(data, &registry)?;
    let rebuilt = parsed.build(&registry)?;
    let reparsed = T::parse(&rebuilt, &registry)?;

    if parsed != reparsed {
        return Err(format!(
            "Round-trip with data failed:\nParsed: {:?}\nReparsed: {:?}",
            parsed, reparsed
        )
        .into());
    }

    Ok(())
}
