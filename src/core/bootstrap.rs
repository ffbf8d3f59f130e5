use uuid::Uuid;

use crate::core::security;
use crate::core::state::AppState;
use crate::core::time::primitive_now_utc;
use crate::db::types::AdminRole;
use crate::repositories;

/// Creates the configured bootstrap admin on first start so a fresh deployment
/// has a working admin login. Re-runs keep the account active and in sync with
/// the configured password.
pub(crate) async fn ensure_first_admin(state: &AppState) -> anyhow::Result<()> {
    let admin = state.settings().admin();
    if admin.first_admin_password.is_empty() {
        tracing::warn!("FIRST_ADMIN_PASSWORD not configured; skipping bootstrap admin creation");
        return Ok(());
    }

    let email = admin.first_admin_email.as_str();
    let now = primitive_now_utc();

    if let Some(existing) = repositories::admins::find_by_email(state.db(), email).await? {
        let password_ok =
            security::verify_password(&admin.first_admin_password, &existing.hashed_password)
                .unwrap_or(false);

        if password_ok && existing.is_active && existing.role == AdminRole::Superadmin {
            tracing::info!("Bootstrap admin already up to date");
            return Ok(());
        }

        let hashed_password = if password_ok {
            existing.hashed_password.clone()
        } else {
            security::hash_password(&admin.first_admin_password)?
        };

        sqlx::query(
            "UPDATE admins
             SET hashed_password = $1, role = $2, is_active = TRUE, updated_at = $3
             WHERE id = $4",
        )
        .bind(hashed_password)
        .bind(AdminRole::Superadmin)
        .bind(now)
        .bind(&existing.id)
        .execute(state.db())
        .await?;

        tracing::info!("Updated bootstrap admin {email}");
        return Ok(());
    }

    let hashed_password = security::hash_password(&admin.first_admin_password)?;

    sqlx::query(
        "INSERT INTO admins (id, email, hashed_password, full_name, role, is_active, created_at, updated_at)
         VALUES ($1,$2,$3,$4,$5,$6,$7,$8)",
    )
    .bind(Uuid::new_v4().to_string())
    .bind(email)
    .bind(hashed_password)
    .bind("Platform Admin")
    .bind(AdminRole::Superadmin)
    .bind(true)
    .bind(now)
    .bind(now)
    .execute(state.db())
    .await?;

    tracing::info!("Created bootstrap admin {email}");
    Ok(())
}
