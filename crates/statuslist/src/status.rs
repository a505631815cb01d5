use crate::ListId;

/// Status purpose advertised for every list issued by this crate.
pub const PURPOSE_REVOCATION: &str = "revocation";

/// The list type issued by this crate.
pub const STATUS_LIST_2021: &str = "StatusList2021";

/// Outcome of an index allocation.
///
/// `status_url` is a path, derived only from the tenant and list identifier,
/// under which the list can be fetched. Callers prefix it with their public
/// origin to build a dereferenceable location.
///
/// # Example
///
/// ```
/// use statuslist::StatusData;
///
/// let data = StatusData::new("42", 1, 3);
/// assert_eq!(data.index, 3);
/// assert_eq!(data.status_url, "/status/42/1");
/// ```
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "camelCase"))]
pub struct StatusData {
    pub index: usize,
    pub status_url: String,
}

impl StatusData {
    pub fn new(tenant_id: &str, list_id: ListId, index: usize) -> Self {
        Self {
            index,
            status_url: status_path(tenant_id, list_id),
        }
    }
}

/// The path under which list `list_id` of `tenant_id` is served.
pub fn status_path(tenant_id: &str, list_id: ListId) -> String {
    format!("/status/{tenant_id}/{list_id}")
}
