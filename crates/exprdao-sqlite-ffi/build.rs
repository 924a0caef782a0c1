use std::env;
use std::path::PathBuf;

fn main() {
	if env::var_os("CARGO_FEATURE_BUNDLED_SQLITE").is_some() {
		build_bundled();
	} else {
		link_system();
	}
}

fn build_bundled() {
	let manifest_dir =
		PathBuf::from(env::var("CARGO_MANIFEST_DIR").expect("CARGO_MANIFEST_DIR not set"));
	let sqlite_dir = manifest_dir.join("..").join("..").join("sqlite3");
	let sqlite_c = sqlite_dir.join("sqlite3.c");

	assert!(
		sqlite_c.exists(),
		"bundled-sqlite needs the SQLite amalgamation at {}",
		sqlite_c.display()
	);

	println!("cargo:rerun-if-changed={}", sqlite_c.display());
	println!("cargo:rerun-if-env-changed=LIBSQLITE3_FLAGS");

	let mut build = cc::Build::new();
	build.file(&sqlite_c).include(&sqlite_dir).warnings(false);

	// Serialized threading is required: cancel tokens call sqlite3_interrupt
	// from watchdog threads.
	for (name, value) in [
		("SQLITE_CORE", None),
		("SQLITE_DEFAULT_FOREIGN_KEYS", Some("1")),
		("SQLITE_ENABLE_API_ARMOR", None),
		("SQLITE_ENABLE_JSON1", None),
		("SQLITE_ENABLE_STAT4", None),
		("SQLITE_OMIT_LOAD_EXTENSION", None),
		("SQLITE_THREADSAFE", Some("1")),
		("SQLITE_USE_URI", None),
		("HAVE_ISNAN", None),
		("HAVE_USLEEP", Some("1")),
	] {
		build.define(name, value);
	}

	if !env::var("CARGO_CFG_WINDOWS").is_ok_and(|v| !v.is_empty()) {
		build.define("HAVE_LOCALTIME_R", None);
	}

	if let Ok(extras) = env::var("LIBSQLITE3_FLAGS") {
		for extra in extras.split_whitespace() {
			if let Some(rest) = extra.strip_prefix("-D") {
				define_flag(&mut build, rest);
			}
		}
	}

	build.compile("sqlite3");
}

fn link_system() {
	println!("cargo:rerun-if-env-changed=SQLITE3_LIB_DIR");
	if let Some(dir) = env::var_os("SQLITE3_LIB_DIR") {
		println!("cargo:rustc-link-search=native={}", PathBuf::from(dir).display());
		println!("cargo:rustc-link-lib=dylib=sqlite3");
		return;
	}

	let linked = pkg_config::Config::new()
		.atleast_version("3.22.0")
		.print_system_libs(false)
		.probe("sqlite3")
		.is_ok();

	if !linked {
		println!("cargo:rustc-link-lib=dylib=sqlite3");
	}
}

fn define_flag(build: &mut cc::Build, define: &str) {
	if let Some((name, value)) = define.split_once('=') {
		build.define(name, Some(value));
	} else {
		build.define(define, None);
	}
}
