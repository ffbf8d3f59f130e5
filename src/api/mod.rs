pub(crate) mod auth;
pub(crate) mod cart;
pub(crate) mod courses;
pub(crate) mod enrollments;
pub(crate) mod errors;
pub(crate) mod guards;
pub(crate) mod handlers;
pub(crate) mod products;
pub(crate) mod purchases;
pub(crate) mod router;
pub(crate) mod users;
pub(crate) mod validation;
