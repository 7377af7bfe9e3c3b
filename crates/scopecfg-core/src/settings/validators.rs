//! Reusable validation rules for setting definitions

use super::types::SettingValue;
use crate::prelude::*;

/// Integer within `min..=max`
pub fn int_range(min: i64, max: i64) -> impl Fn(&SettingValue) -> ClResult<()> + Send + Sync {
	move |value| match value {
		SettingValue::Int(i) if (min..=max).contains(i) => Ok(()),
		SettingValue::Int(i) => Err(Error::ValidationFailed(format!(
			"{} is outside the allowed range {}..={}",
			i, min, max
		))),
		v => Err(Error::ValidationFailed(format!("expected int, got {}", v.type_name()))),
	}
}

/// String of at most `max` characters
pub fn string_max_len(max: usize) -> impl Fn(&SettingValue) -> ClResult<()> + Send + Sync {
	move |value| match value {
		SettingValue::String(s) if s.chars().count() <= max => Ok(()),
		SettingValue::String(_) => {
			Err(Error::ValidationFailed(format!("longer than {} characters", max)))
		}
		v => Err(Error::ValidationFailed(format!("expected string, got {}", v.type_name()))),
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn test_int_range() {
		let check = int_range(1, 1440);
		assert!(check(&SettingValue::Int(1)).is_ok());
		assert!(check(&SettingValue::Int(1440)).is_ok());
		assert!(matches!(check(&SettingValue::Int(0)), Err(Error::ValidationFailed(_))));
		assert!(check(&SettingValue::Bool(true)).is_err());
	}

	#[test]
	fn test_string_max_len() {
		let check = string_max_len(3);
		assert!(check(&SettingValue::String("abc".into())).is_ok());
		assert!(check(&SettingValue::String("abcd".into())).is_err());
	}
}

// vim: ts=4
