use tracing::{debug, info};
use uuid::Uuid;

use warbler_db::models::{NewUser, UserChanges};
use warbler_db::{Database, Session};
use warbler_types::api::{ProfileUpdate, SignupForm};
use warbler_types::models::{DEFAULT_HEADER_IMAGE_URL, DEFAULT_IMAGE_URL, User};

use crate::error::{Error, Result};
use crate::hasher::{Argon2Hasher, CredentialHasher};

/// Signup, login and profile maintenance.
pub struct Accounts<H = Argon2Hasher> {
    hasher: H,
}

impl<H: CredentialHasher> Accounts<H> {
    pub fn new(hasher: H) -> Self {
        Self { hasher }
    }

    /// Hash the password and stage a new user on `session`.
    ///
    /// Nothing is committed: a taken or missing username/email surfaces as a
    /// constraint violation from `session.commit()`.
    ///
    /// The returned user reflects the staged row and is provisional until the
    /// commit succeeds. A missing username or email shows up in it as an empty
    /// string; that commit will fail.
    pub fn signup(&self, session: &mut Session<'_>, form: SignupForm) -> Result<User> {
        let password = form
            .password
            .as_deref()
            .filter(|p| !p.is_empty())
            .ok_or(Error::Validation("password must not be empty"))?;

        let password_hash = self.hasher.hash(password)?;
        let image_url = non_blank(form.image_url).unwrap_or_else(|| DEFAULT_IMAGE_URL.to_string());
        let id = Uuid::new_v4();

        session.add_user(NewUser {
            id,
            username: form.username.clone(),
            email: form.email.clone(),
            password_hash,
            image_url: image_url.clone(),
        });
        debug!("Staged signup for {:?}", form.username);

        Ok(User {
            id,
            username: form.username.unwrap_or_default(),
            email: form.email.unwrap_or_default(),
            image_url,
            header_image_url: DEFAULT_HEADER_IMAGE_URL.to_string(),
            bio: None,
            location: None,
        })
    }

    /// `Some(user)` when the credentials match, `None` for an unknown
    /// username and for a wrong password alike.
    ///
    /// An unknown username returns without hashing, so response time still
    /// tells the two cases apart.
    pub fn authenticate(&self, db: &Database, username: &str, password: &str) -> Result<Option<User>> {
        let Some(row) = db.get_user_row_by_username(username)? else {
            return Ok(None);
        };

        if !self.hasher.verify(password, &row.password) {
            return Ok(None);
        }

        Ok(Some(row.into_user()?))
    }

    /// Re-check the current password, then stage the requested changes.
    /// Returns `None` if the password does not match.
    pub fn update_profile(
        &self,
        session: &mut Session<'_>,
        user_id: Uuid,
        password: &str,
        update: ProfileUpdate,
    ) -> Result<Option<User>> {
        let row = session
            .database()
            .get_user_row_by_id(user_id)?
            .ok_or(Error::NotFound { kind: "user", id: user_id })?;

        if !self.hasher.verify(password, &row.password) {
            return Ok(None);
        }

        if update.username.as_deref().is_some_and(|v| v.trim().is_empty()) {
            return Err(Error::Validation("username must not be blank"));
        }
        if update.email.as_deref().is_some_and(|v| v.trim().is_empty()) {
            return Err(Error::Validation("email must not be blank"));
        }

        let mut user = row.into_user()?;
        let changes = UserChanges {
            username: update.username,
            email: update.email,
            image_url: update
                .image_url
                .map(|url| non_blank(Some(url)).unwrap_or_else(|| DEFAULT_IMAGE_URL.to_string())),
            header_image_url: update
                .header_image_url
                .map(|url| non_blank(Some(url)).unwrap_or_else(|| DEFAULT_HEADER_IMAGE_URL.to_string())),
            bio: update.bio.map(|bio| non_blank(Some(bio))),
            location: update.location.map(|loc| non_blank(Some(loc))),
        };

        if let Some(v) = &changes.username {
            user.username = v.clone();
        }
        if let Some(v) = &changes.email {
            user.email = v.clone();
        }
        if let Some(v) = &changes.image_url {
            user.image_url = v.clone();
        }
        if let Some(v) = &changes.header_image_url {
            user.header_image_url = v.clone();
        }
        if let Some(v) = &changes.bio {
            user.bio = v.clone();
        }
        if let Some(v) = &changes.location {
            user.location = v.clone();
        }

        session.update_user(user_id, changes);
        Ok(Some(user))
    }

    /// Stage removal of the account. Messages, follow edges and likes go with it.
    pub fn delete_account(&self, session: &mut Session<'_>, user_id: Uuid) -> Result<()> {
        if session.database().get_user_by_id(user_id)?.is_none() {
            return Err(Error::NotFound { kind: "user", id: user_id });
        }
        session.delete_user(user_id);
        info!("Staged deletion of user {}", user_id);
        Ok(())
    }
}

impl Default for Accounts<Argon2Hasher> {
    fn default() -> Self {
        Self::new(Argon2Hasher::default())
    }
}

fn non_blank(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}
