mod auth;
mod health_check;
mod index;
mod links;
mod profile;

pub use auth::{change_password, login, logout, me, signup};
pub use health_check::{health_check, route_not_found};
pub use index::index;
pub use links::{create_link, delete_link, list_links, update_link};
pub use profile::get_profile;

/// Trimmed, non-empty field value
fn present(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|v| !v.is_empty())
}

/// Non-empty secret, taken verbatim
fn present_secret(value: &Option<String>) -> Option<&str> {
    value.as_deref().filter(|v| !v.is_empty())
}

fn missing_fields(checks: &[(&'static str, bool)]) -> Vec<&'static str> {
    checks
        .iter()
        .filter(|(_, missing)| *missing)
        .map(|(field, _)| *field)
        .collect()
}
