//! Resource name handling.

/// Turn a dot- or slash-delimited resource name into a URL path.
pub fn normalize_resource(resource: &str) -> String {
    resource.replace('.', "/")
}
