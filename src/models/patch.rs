//! Partial-update helpers.
//!
//! Update requests carry optional fields. A field that is absent or blank
//! leaves the stored value untouched; anything else overwrites it.

/// Returns the trimmed value when it is present and not blank
pub fn provided(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}

/// True when a required field is absent or blank
pub fn is_blank(value: Option<&str>) -> bool {
    provided(value).is_none()
}

/// Collapse a blank field to `None`
pub fn normalize(value: Option<String>) -> Option<String> {
    provided(value.as_deref()).map(str::to_string)
}

/// Update requests whose blank fields mean "no change"
pub trait Patch: Sized {
    /// Drop blank fields so only present-and-non-blank values remain
    fn normalized(self) -> Self;

    /// True when nothing would be changed
    fn is_empty(&self) -> bool;
}
