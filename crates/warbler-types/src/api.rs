use serde::Deserialize;

// -- Accounts --

/// Signup input as submitted by a form. Every field may be missing; the
/// account service and the store decide which absences are errors.
#[derive(Debug, Default, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SignupForm {
    pub username: Option<String>,
    pub email: Option<String>,
    pub password: Option<String>,
    pub image_url: Option<String>,
}

impl SignupForm {
    pub fn new(username: &str, email: &str, password: &str) -> Self {
        Self {
            username: Some(username.to_string()),
            email: Some(email.to_string()),
            password: Some(password.to_string()),
            image_url: None,
        }
    }

    pub fn with_image_url(mut self, image_url: &str) -> Self {
        self.image_url = Some(image_url.to_string());
        self
    }
}

// -- Profile --

/// Profile edit. `None` leaves a field untouched; a blank image URL resets it
/// to the default.
#[derive(Debug, Default, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ProfileUpdate {
    pub username: Option<String>,
    pub email: Option<String>,
    pub image_url: Option<String>,
    pub header_image_url: Option<String>,
    pub bio: Option<String>,
    pub location: Option<String>,
}
