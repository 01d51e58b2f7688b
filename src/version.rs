mod build_info {
    include!(concat!(env!("OUT_DIR"), "/built.rs"));
}

/// Returns the main version identifier, e.g. `v1.2`. A trailing `.0` patch
/// version is omitted.
pub(crate) fn identifier() -> String {
    let version = build_info::PKG_VERSION;
    format!("v{}", version.strip_suffix(".0").unwrap_or(version))
}

/// Returns an RFC 2822 formatted date of the build time in UTC.
pub(crate) fn build_time_utc() -> &'static str {
    build_info::BUILT_TIME_UTC
}

/// Returns a string containing all version-related information.
pub(crate) fn full() -> String {
    format!("{} ({} build), built {}", identifier(), build_info::PROFILE, build_time_utc())
}
