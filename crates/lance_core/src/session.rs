use serde::Deserialize;

/// The signed-in user as returned by `/users/me/`.
#[derive(Debug, Clone, PartialEq, Eq, Default, Deserialize)]
#[serde(default)]
pub struct User {
    pub username: String,
    pub full_name: Option<String>,
    pub email: String,
}

impl User {
    pub fn display_name(&self) -> &str {
        self.full_name
            .as_deref()
            .filter(|name| !name.is_empty())
            .unwrap_or(&self.username)
    }
}

/// Explicit session store owned by the app state and handed to the views
/// that need it.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct SessionState {
    user: Option<User>,
    loading: bool,
}

impl SessionState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Marks the session as being fetched. Returns false if a fetch is
    /// already in flight.
    pub fn begin_loading(&mut self) -> bool {
        if self.loading {
            return false;
        }
        self.loading = true;
        true
    }

    pub fn loaded(&mut self, user: Option<User>) {
        self.user = user;
        self.loading = false;
    }

    /// Clears the user. Returns the user that was signed in, if any.
    pub fn logout(&mut self) -> Option<User> {
        self.loading = false;
        self.user.take()
    }

    pub fn user(&self) -> Option<&User> {
        self.user.as_ref()
    }

    pub fn is_loading(&self) -> bool {
        self.loading
    }
}
