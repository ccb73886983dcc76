// src/snap.rs
use crate::error::{EditError, EditResult};
use crate::time::Time;

/// Quantizes `time` to the nearest multiple of `grid_interval`, rounding
/// halves up.
///
/// ```
/// use cutline_lib::snap::snap;
/// use cutline_lib::time::Time;
/// let grid = Time::from_whole_secs(1);
/// assert_eq!(snap(Time::from_secs(4.3), grid).unwrap(), Time::from_whole_secs(4));
/// assert_eq!(snap(Time::from_secs(4.5), grid).unwrap(), Time::from_whole_secs(5));
/// assert!(snap(Time::from_secs(1.0), Time::ZERO).is_err());
/// ```
pub fn snap(time: Time, grid_interval: Time) -> EditResult<Time> {
    if !grid_interval.is_positive() {
        return Err(EditError::InvalidConfiguration(format!(
            "grid interval must be positive, got {grid_interval}"
        )));
    }
    let g = grid_interval.micros();
    let t = time.micros().saturating_add(g / 2);
    Ok(Time::from_micros(t.div_euclid(g).saturating_mul(g)))
}

/// Applies `snap` only when the session policy asks for it.
pub fn snap_if(enabled: bool, time: Time, grid_interval: Time) -> EditResult<Time> {
    if enabled {
        snap(time, grid_interval)
    } else {
        Ok(time)
    }
}
