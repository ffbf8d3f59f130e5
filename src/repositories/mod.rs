pub(crate) mod admins;
pub(crate) mod carts;
pub(crate) mod courses;
pub(crate) mod enrollments;
pub(crate) mod instructors;
pub(crate) mod lessons;
pub(crate) mod products;
pub(crate) mod purchases;
pub(crate) mod students;

use sqlx::PgPool;

/// Email uniqueness is enforced per kind by the store; the application
/// additionally treats it as global across all three principal kinds.
pub(crate) async fn email_taken(pool: &PgPool, email: &str) -> Result<bool, sqlx::Error> {
    if students::exists_by_email(pool, email).await?.is_some() {
        return Ok(true);
    }
    if instructors::exists_by_email(pool, email).await?.is_some() {
        return Ok(true);
    }
    Ok(admins::exists_by_email(pool, email).await?.is_some())
}
