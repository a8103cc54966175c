use tracing::info;

use crate::backend::AuthApi;
use crate::error::ClientResult;
use crate::session::Session;
use crate::utils::validation::{validate_email, validate_full_name};

pub async fn sign_up<A: AuthApi>(
    auth: &A,
    email: &str,
    password: &str,
    full_name: &str,
) -> ClientResult<Session> {
    let email = email.trim();
    validate_email(email)?;
    validate_full_name(full_name)?;

    let session = auth.sign_up(email, password, full_name.trim()).await?;
    info!("Signed up {}", session.user_id());
    Ok(session)
}

pub async fn sign_in<A: AuthApi>(auth: &A, email: &str, password: &str) -> ClientResult<Session> {
    let session = auth.sign_in(email.trim(), password).await?;
    info!("Signed in {}", session.user_id());
    Ok(session)
}

/// Ends the session; the value is consumed so it cannot be reused.
pub async fn sign_out<A: AuthApi>(auth: &A, session: Session) -> ClientResult<()> {
    auth.sign_out(&session).await?;
    info!("Signed out {}", session.user_id());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::MemoryBackend;
    use crate::error::{BackendError, ClientError};

    #[tokio::test]
    async fn test_sign_up_validates_before_calling() {
        let backend = MemoryBackend::new();

        assert!(matches!(
            sign_up(&backend, "nope", "pw", "Ada").await,
            Err(ClientError::Validation(_))
        ));
        assert!(matches!(
            sign_up(&backend, "ada@example.com", "pw", "  ").await,
            Err(ClientError::Validation(_))
        ));
        assert_eq!(backend.call_count(), 0);
    }

    #[tokio::test]
    async fn test_sign_up_in_out() {
        let backend = MemoryBackend::new();
        let created = sign_up(&backend, " ada@example.com ", "pw", "Ada").await.unwrap();
        assert_eq!(created.account.email, "ada@example.com");

        let session = sign_in(&backend, "ada@example.com", "pw").await.unwrap();
        assert_eq!(session.user_id(), created.user_id());
        sign_out(&backend, session).await.unwrap();

        assert!(matches!(
            sign_up(&backend, "ada@example.com", "pw", "Ada").await,
            Err(ClientError::Backend(BackendError::Conflict { .. }))
        ));
    }
}
