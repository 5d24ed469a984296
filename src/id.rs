use uuid::Uuid;

/// Allocates a fresh image id: a random 128-bit UUID in hyphenated form.
pub fn allocate() -> String {
    Uuid::new_v4().hyphenated().to_string()
}
