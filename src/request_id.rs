use uuid::Uuid;

/// Generate an `x-request-id` correlation id.
///
/// Format: a random version-4 UUID string, e.g.
/// `3f2b8c1e-9a4d-4e7f-b0c2-5d6e7f8a9b0c`.
pub fn generate_request_id() -> String {
    Uuid::new_v4().to_string()
}
