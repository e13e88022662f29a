use tracing::{debug, info};

use crate::auth::dto::{AuthResponse, PublicUser};
use crate::plants::dto::Plant;

use super::api::{ApiClient, ClientError, PlantDraft};
use super::storage::SessionStorage;

pub const TOKEN_KEY: &str = "token";
pub const USER_KEY: &str = "usuario";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Session {
    pub token: String,
    pub user: PublicUser,
}

/// Views the client can show.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Route {
    Home,
    Login,
    Register,
    AddPlant,
}

impl Route {
    fn is_public(self) -> bool {
        matches!(self, Route::Login | Route::Register)
    }
}

/// Explicit holder of the logged-in state, passed to every view.
#[derive(Debug, Default, Clone)]
pub struct SessionContext {
    session: Option<Session>,
}

impl SessionContext {
    /// Restores a session from storage. Anything missing or unreadable means
    /// "logged out".
    pub fn hydrate(storage: &dyn SessionStorage) -> Self {
        let token = storage.get(TOKEN_KEY).ok().flatten();
        let raw_user = storage.get(USER_KEY).ok().flatten();

        let session = match (token, raw_user) {
            (Some(token), Some(raw)) if !token.is_empty() => {
                match serde_json::from_str::<PublicUser>(&raw) {
                    Ok(user) => Some(Session { token, user }),
                    Err(e) => {
                        debug!(error = %e, "stored user is malformed; starting logged out");
                        None
                    }
                }
            }
            _ => None,
        };
        Self { session }
    }

    pub fn establish(
        &mut self,
        storage: &dyn SessionStorage,
        auth: AuthResponse,
    ) -> Result<(), ClientError> {
        let user_json = serde_json::to_string(&auth.user).map_err(anyhow::Error::from)?;
        storage.set(TOKEN_KEY, &auth.token)?;
        storage.set(USER_KEY, &user_json)?;
        info!(user_id = %auth.user.id, "session established");
        self.session = Some(Session {
            token: auth.token,
            user: auth.user,
        });
        Ok(())
    }

    /// Logs in through the API and persists the resulting session.
    pub async fn login(
        &mut self,
        api: &ApiClient,
        storage: &dyn SessionStorage,
        email: &str,
        password: &str,
    ) -> Result<(), ClientError> {
        let auth = api.login(email, password).await?;
        self.establish(storage, auth)
    }

    pub fn logout(&mut self, storage: &dyn SessionStorage) -> Result<(), ClientError> {
        storage.remove(TOKEN_KEY)?;
        storage.remove(USER_KEY)?;
        self.session = None;
        Ok(())
    }

    pub fn is_authenticated(&self) -> bool {
        self.session.is_some()
    }

    pub fn session(&self) -> Option<&Session> {
        self.session.as_ref()
    }

    pub fn user(&self) -> Option<&PublicUser> {
        self.session.as_ref().map(|s| &s.user)
    }

    /// An API client carrying this session's token.
    pub fn api(&self, base: &ApiClient) -> ApiClient {
        base.clone()
            .with_token(self.session.as_ref().map(|s| s.token.clone()))
    }

    /// Submits the add-plant form on behalf of the logged-in user.
    pub async fn add_plant(
        &self,
        base: &ApiClient,
        draft: PlantDraft,
    ) -> Result<Plant, ClientError> {
        let session = self.session.as_ref().ok_or(ClientError::NotAuthenticated)?;
        self.api(base).create_plant(session.user.id, draft).await
    }

    /// Where a request for `requested` actually lands.
    pub fn resolve(&self, requested: Route) -> Route {
        match (self.is_authenticated(), requested.is_public()) {
            (true, true) => Route::Home,
            (false, false) => Route::Login,
            _ => requested,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::storage::MemoryStorage;
    use uuid::Uuid;

    fn auth() -> AuthResponse {
        AuthResponse {
            token: "tok".into(),
            user: PublicUser {
                id: Uuid::new_v4(),
                nome: "A".into(),
                email: "a@x.com".into(),
            },
        }
    }

    #[test]
    fn empty_storage_means_logged_out() {
        let ctx = SessionContext::hydrate(&MemoryStorage::default());
        assert!(!ctx.is_authenticated());
    }

    #[test]
    fn malformed_user_is_swallowed() {
        let storage = MemoryStorage::default();
        storage.set(TOKEN_KEY, "tok").unwrap();
        storage.set(USER_KEY, "{not json").unwrap();
        let ctx = SessionContext::hydrate(&storage);
        assert!(!ctx.is_authenticated());
    }

    #[test]
    fn token_without_user_is_no_session() {
        let storage = MemoryStorage::default();
        storage.set(TOKEN_KEY, "tok").unwrap();
        assert!(!SessionContext::hydrate(&storage).is_authenticated());
    }

    #[test]
    fn establish_then_hydrate_restores_session() {
        let storage = MemoryStorage::default();
        let a = auth();
        let user = a.user.clone();

        let mut ctx = SessionContext::default();
        ctx.establish(&storage, a).unwrap();
        assert!(ctx.is_authenticated());

        let restored = SessionContext::hydrate(&storage);
        assert_eq!(restored.user(), Some(&user));
        assert_eq!(restored.session().unwrap().token, "tok");
    }

    #[test]
    fn logout_clears_everything() {
        let storage = MemoryStorage::default();
        let mut ctx = SessionContext::default();
        ctx.establish(&storage, auth()).unwrap();

        ctx.logout(&storage).unwrap();
        assert!(!ctx.is_authenticated());
        assert_eq!(storage.get(TOKEN_KEY).unwrap(), None);
        assert_eq!(storage.get(USER_KEY).unwrap(), None);
        assert!(!SessionContext::hydrate(&storage).is_authenticated());
    }

    #[test]
    fn gate_redirects_by_auth_state() {
        let logged_out = SessionContext::default();
        assert_eq!(logged_out.resolve(Route::Home), Route::Login);
        assert_eq!(logged_out.resolve(Route::AddPlant), Route::Login);
        assert_eq!(logged_out.resolve(Route::Login), Route::Login);
        assert_eq!(logged_out.resolve(Route::Register), Route::Register);

        let mut logged_in = SessionContext::default();
        logged_in.establish(&MemoryStorage::default(), auth()).unwrap();
        assert_eq!(logged_in.resolve(Route::Login), Route::Home);
        assert_eq!(logged_in.resolve(Route::Register), Route::Home);
        assert_eq!(logged_in.resolve(Route::Home), Route::Home);
        assert_eq!(logged_in.resolve(Route::AddPlant), Route::AddPlant);
    }
}
