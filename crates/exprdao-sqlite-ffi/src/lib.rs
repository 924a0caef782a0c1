use std::ffi::CStr;

pub mod ffi;

pub fn sqlite_lib_version_number() -> i32 {
	unsafe { ffi::sqlite3_libversion_number() }
}

pub fn sqlite_lib_version() -> String {
	unsafe { CStr::from_ptr(ffi::sqlite3_libversion()).to_string_lossy().into_owned() }
}

pub fn sqlite_source_id() -> String {
	unsafe { CStr::from_ptr(ffi::sqlite3_sourceid()).to_string_lossy().into_owned() }
}

/// Whether the linked library was compiled with mutexes, which cross-thread
/// interrupts rely on.
pub fn sqlite_is_threadsafe() -> bool {
	unsafe { ffi::sqlite3_threadsafe() != 0 }
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn has_sqlite_version_number() {
		assert!(sqlite_lib_version_number() >= 3_000_000);
	}

	#[test]
	fn version_text_matches_number() {
		let number = sqlite_lib_version_number();
		let major = number / 1_000_000;
		assert!(sqlite_lib_version().starts_with(&format!("{major}.")));
	}

	#[test]
	fn has_source_id() {
		assert!(!sqlite_source_id().is_empty());
	}

	#[test]
	fn linked_library_is_threadsafe() {
		assert!(sqlite_is_threadsafe());
	}
}
