//! Phone number → persona.

use crate::directory::UserDirectory;
use edubridge_core::persona::{Persona, PersonaContext};
use std::sync::Arc;
use tracing::{info, warn};

/// Resolves a caller's persona from the user directory.
///
/// Never fails: lookup errors, unknown phones, missing attributes, and
/// unrecognized values all resolve to [`Persona::Student`].
#[derive(Clone)]
pub struct PersonaResolver {
    directory: Arc<dyn UserDirectory>,
}

impl PersonaResolver {
    pub fn new(directory: Arc<dyn UserDirectory>) -> Self {
        Self { directory }
    }

    /// Directory phone format: a leading `+`.
    pub fn lookup_key(phone: &str) -> String {
        if phone.starts_with('+') {
            phone.to_string()
        } else {
            format!("+{phone}")
        }
    }

    pub async fn resolve(&self, phone: &str) -> PersonaContext {
        let key = Self::lookup_key(phone);

        let user = match self.directory.find_by_phone(&key).await {
            Ok(Some(user)) => user,
            Ok(None) => {
                info!(phone = %key, "No directory user for phone, defaulting to student");
                return PersonaContext::new(Persona::Student);
            }
            Err(e) => {
                warn!(phone = %key, error = %e, "Directory lookup failed, defaulting to student");
                return PersonaContext::new(Persona::Student);
            }
        };

        let persona = match user.persona.as_deref() {
            None | Some("") => Persona::Student,
            Some(raw) => Persona::parse(raw).unwrap_or_else(|| {
                warn!(value = raw, "Unrecognized persona attribute, defaulting to student");
                Persona::Student
            }),
        };
        info!(phone = %key, persona = %persona, "Persona resolved");

        let ctx = PersonaContext::new(persona);
        match user.name {
            Some(name) => ctx.with_display_name(name),
            None => ctx,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::directory::{DirectoryUser, StaticDirectory};
    use async_trait::async_trait;
    use edubridge_core::error::DirectoryError;

    struct FailingDirectory;

    #[async_trait]
    impl UserDirectory for FailingDirectory {
        async fn find_by_phone(
            &self,
            _phone: &str,
        ) -> Result<Option<DirectoryUser>, DirectoryError> {
            Err(DirectoryError::RequestFailed("connection refused".into()))
        }
    }

    fn user(phone: &str, persona: Option<&str>) -> DirectoryUser {
        DirectoryUser {
            username: phone.into(),
            phone_number: phone.into(),
            persona: persona.map(String::from),
            name: Some("Maria".into()),
        }
    }

    fn resolver() -> PersonaResolver {
        PersonaResolver::new(Arc::new(StaticDirectory::new(vec![
            user("+5511000000001", Some("professor")),
            user("+5511000000002", Some("administrator")),
            user("+5511000000003", None),
            user("+5511000000004", Some("janitor")),
        ])))
    }

    #[tokio::test]
    async fn unknown_phone_is_student() {
        let ctx = resolver().resolve("5599999999999").await;
        assert_eq!(ctx.persona, Persona::Student);
        assert!(ctx.display_name.is_none());
    }

    #[tokio::test]
    async fn professor_maps_to_teacher_without_plus() {
        let ctx = resolver().resolve("5511000000001").await;
        assert_eq!(ctx.persona, Persona::Teacher);
        assert_eq!(ctx.display_name.as_deref(), Some("Maria"));
    }

    #[tokio::test]
    async fn administrator_with_plus() {
        let ctx = resolver().resolve("+5511000000002").await;
        assert_eq!(ctx.persona, Persona::Administrator);
    }

    #[tokio::test]
    async fn missing_or_unknown_attribute_is_student() {
        assert_eq!(resolver().resolve("5511000000003").await.persona, Persona::Student);
        assert_eq!(resolver().resolve("5511000000004").await.persona, Persona::Student);
    }

    #[tokio::test]
    async fn lookup_failure_is_student() {
        let r = PersonaResolver::new(Arc::new(FailingDirectory));
        assert_eq!(r.resolve("+1").await.persona, Persona::Student);
    }
}
