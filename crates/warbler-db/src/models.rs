/// Database row types. These map directly to SQLite rows and stay distinct
/// from the warbler-types view models.

#[derive(Debug, Clone)]
pub struct UserRow {
    pub id: String,
    pub username: String,
    pub email: String,
    /// Argon2 PHC string, never plaintext.
    pub password: String,
    pub image_url: String,
    pub header_image_url: String,
    pub bio: Option<String>,
    pub location: Option<String>,
    pub created_at: String,
}

/// Input for a new user. `image_url` of `None` keeps the column default.
pub struct NewUser<'a> {
    pub id: &'a str,
    pub username: &'a str,
    pub email: &'a str,
    pub password_hash: &'a str,
    pub image_url: Option<&'a str>,
}

/// Partial profile update; `None` leaves a column untouched.
#[derive(Debug, Default)]
pub struct UserUpdate<'a> {
    pub username: Option<&'a str>,
    pub email: Option<&'a str>,
    pub image_url: Option<&'a str>,
    pub header_image_url: Option<&'a str>,
    pub bio: Option<&'a str>,
    pub location: Option<&'a str>,
}

/// A message joined with its author's display fields.
#[derive(Debug, Clone)]
pub struct MessageRow {
    pub id: String,
    pub text: String,
    pub user_id: String,
    pub author_username: String,
    pub author_image_url: String,
    pub created_at: String,
}
